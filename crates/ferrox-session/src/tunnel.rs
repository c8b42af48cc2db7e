//! Local port forwarding through a second SSH connection
//!
//! The tunnel connection is serviced by a background thread that idles the
//! transport on a fixed interval until asked to stop. Callbacks the transport
//! makes from that thread never reach the user.

use std::fmt;
use std::net::TcpListener;
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use ferrox_config::{SessionConfig, TunnelConfig};
use ferrox_types::{
    CancelStatus, Error, FileList, OnceDoneOperation, Operation, OperationProgress, OperationSide,
    Prompt, Query, QueryAnswer, Result, SessionUi,
};
use tracing::{debug, warn};

/// Interval between two idle calls of the tunnel thread
pub const TUNNEL_IDLE_INTERVAL: Duration = Duration::from_millis(250);

/// The connection carrying a port forward
pub trait TunnelTransport: Send {
    /// Service pending traffic
    fn idle(&mut self) -> Result<()>;

    /// Close the connection
    fn close(&mut self);

    /// Whether the connection is up
    fn is_active(&self) -> bool;

    /// Last error reported by the connection
    fn last_error(&self) -> Option<String> {
        None
    }
}

/// What the tunnel connection logs into and forwards
#[derive(Debug, Clone, PartialEq)]
pub struct TunnelTarget {
    /// Login settings of the tunnel host
    pub session: SessionConfig,
    /// Port forward, `L<local port>\t<host>:<port>`
    pub port_forward: String,
    /// Local end of the forward
    pub local_port: u16,
}

impl TunnelTarget {
    /// Forward `local_port` to the server `config` connects to
    pub fn new(config: &SessionConfig, local_port: u16) -> Self {
        let tunnel = &config.tunnel;
        let session = SessionConfig {
            name: format!("Tunnel for {}", config.session_name()),
            host_name: tunnel.host_name.clone(),
            port_number: tunnel.port_number,
            user_name: tunnel.user_name.clone(),
            password: tunnel.password.clone(),
            cache_directories: false,
            cache_directory_changes: false,
            lookup_user_groups: false,
            tunnel: TunnelConfig::default(),
            ..SessionConfig::default()
        };
        Self {
            session,
            port_forward: format!("L{}\t{}:{}", local_port, config.host_name, config.port_number),
            local_port,
        }
    }
}

/// First local port in `low..=high` that can be bound on the loopback interface
pub fn find_free_port(low: u16, high: u16) -> Option<u16> {
    (low..=high).find(|port| TcpListener::bind(("127.0.0.1", *port)).is_ok())
}

/// Running tunnel
pub struct Tunnel {
    local_port: u16,
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<Box<dyn TunnelTransport>>>,
}

impl fmt::Debug for Tunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tunnel")
            .field("local_port", &self.local_port)
            .field("running", &self.thread.is_some())
            .finish()
    }
}

impl Tunnel {
    /// Start servicing an opened transport
    pub fn start(
        mut transport: Box<dyn TunnelTransport>,
        local_port: u16,
        interval: Duration,
    ) -> Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let thread = thread::Builder::new()
            .name(format!("tunnel-{}", local_port))
            .spawn(move || {
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if let Err(error) = transport.idle() {
                                warn!("Tunnel connection failed: {}", error);
                                transport.close();
                                break;
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                transport
            })
            .map_err(|e| Error::tunnel(format!("Failed to start tunnel thread: {}", e)))?;
        debug!("Tunnel thread started for local port {}", local_port);
        Ok(Self {
            local_port,
            stop: Some(stop),
            thread: Some(thread),
        })
    }

    /// Local end of the forward
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Whether the servicing thread is still running
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Stop the thread, close the transport and return its last error
    pub fn stop(&mut self) -> Option<String> {
        if let Some(stop) = self.stop.take() {
            // The thread may have exited already
            let _ = stop.send(());
        }
        let thread = self.thread.take()?;
        match thread.join() {
            Ok(mut transport) => {
                let error = transport.last_error();
                transport.close();
                debug!("Tunnel on local port {} closed", self.local_port);
                error
            }
            Err(_) => Some("Tunnel thread panicked".to_string()),
        }
    }
}

impl Drop for Tunnel {
    fn drop(&mut self) {
        self.stop();
    }
}

/// UI handed to the tunnel connection
///
/// Calls made on the thread that opened the tunnel are forwarded; calls from
/// the tunnel thread get unattended answers.
pub struct TunnelUi {
    inner: Arc<dyn SessionUi>,
    owner: ThreadId,
}

impl fmt::Debug for TunnelUi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelUi").field("owner", &self.owner).finish()
    }
}

impl TunnelUi {
    /// Forward to `inner` when called on the current thread
    pub fn new(inner: Arc<dyn SessionUi>) -> Self {
        Self {
            inner,
            owner: thread::current().id(),
        }
    }

    fn on_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }
}

impl SessionUi for TunnelUi {
    fn query_user(&self, query: &Query) -> Result<QueryAnswer> {
        if self.on_owner_thread() {
            self.inner.query_user(query)
        } else {
            Ok(query.answers.abort_answer())
        }
    }

    fn prompt_user(&self, prompt: &Prompt) -> Result<Option<Vec<String>>> {
        if self.on_owner_thread() {
            self.inner.prompt_user(prompt)
        } else {
            Ok(None)
        }
    }

    fn display_banner(&self, session_name: &str, banner: &str) -> Result<()> {
        if self.on_owner_thread() {
            self.inner.display_banner(session_name, banner)
        } else {
            Ok(())
        }
    }

    fn information(&self, text: &str, status: bool, active: bool) -> Result<()> {
        if self.on_owner_thread() {
            self.inner.information(text, status, active)
        } else {
            Ok(())
        }
    }

    fn progress(&self, _progress: &OperationProgress) -> Result<CancelStatus> {
        Ok(CancelStatus::Continue)
    }

    fn finished(
        &self,
        _operation: Operation,
        _side: OperationSide,
        _file_name: &str,
        _success: bool,
    ) -> Result<OnceDoneOperation> {
        Ok(OnceDoneOperation::Idle)
    }

    fn show_extended_exception(&self, error: &Error) -> Result<()> {
        if self.on_owner_thread() {
            self.inner.show_extended_exception(error)
        } else {
            warn!("Tunnel: {}", error);
            Ok(())
        }
    }

    fn directory_read(&self, _list: &FileList, _reload_only: bool) -> Result<()> {
        Ok(())
    }

    fn delete_local_file(&self, _path: &Path, _alternative: bool) -> Result<bool> {
        Ok(false)
    }
}
