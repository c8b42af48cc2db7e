//! Construction of wire-protocol backends

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use ferrox_config::SessionConfig;
use ferrox_types::{BoundProtocol, FileSystemBackend, Result, SessionUi};

use crate::tunnel::{TunnelTarget, TunnelTransport};

/// An authenticated SSH connection not yet bound to a file protocol
pub trait SecureShell: Send {
    /// Whether the SFTP subsystem was refused and the shell fell back to a
    /// plain command channel
    fn ssh_fallback_command(&self) -> bool;
}

/// Factory of backends and tunnels
///
/// The UI handle passed in is the session's guarded proxy; connectors use it
/// for credential prompts, banners and host key questions.
pub trait Connector {
    /// Connect over FTP
    fn connect_ftp(
        &self,
        config: &SessionConfig,
        ui: Arc<dyn SessionUi>,
    ) -> Result<Box<dyn FileSystemBackend>>;

    /// Open and authenticate an SSH connection
    fn connect_shell(
        &self,
        config: &SessionConfig,
        ui: Arc<dyn SessionUi>,
    ) -> Result<Box<dyn SecureShell>>;

    /// Bind an SSH connection to SCP or SFTP
    fn bind_shell(
        &self,
        shell: Box<dyn SecureShell>,
        protocol: BoundProtocol,
    ) -> Result<Box<dyn FileSystemBackend>>;

    /// Open the SSH connection carrying a port forward
    fn open_tunnel(
        &self,
        target: &TunnelTarget,
        ui: Arc<dyn SessionUi>,
    ) -> Result<Box<dyn TunnelTransport>>;
}

/// Source of monotonic time for reconnect timeouts
pub trait Clock: fmt::Debug + Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
