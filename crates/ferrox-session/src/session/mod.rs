//! The session engine
//!
//! A [`Session`] owns one logical connection. It decides when the wire
//! backend is called and when the caches answer instead, defers listing
//! refreshes inside transactions, resolves errors through the user and keeps
//! the connection alive through reconnects.
//!
//! The implementation is split by concern:
//!
//! - `lifecycle`: open, close, reopen and the tunnel
//! - `errors`: fatal/command error resolution and retry loops
//! - `directory`: current directory, listings, caches and transactions
//! - `files`: batch processing and file operations
//! - `transfer`: uploads and downloads
//! - `command`: the secondary shell session

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use ferrox_config::{EngineConfig, SessionConfig};
use ferrox_types::{
    unix_path, BoundProtocol, Capability, Error, FileList, FileSystemBackend, OperationProgress,
    Result, SessionStatus, SessionUi,
};

use crate::cache::{DirectoryCache, DirectoryChangesCache, DirectoryChangesStore};
use crate::callbacks::SessionCallbacks;
use crate::connector::{Clock, Connector, SystemClock};
use crate::log::{LogSink, SessionLog};
use crate::transaction::TransactionState;
use crate::tunnel::Tunnel;

mod command;
mod directory;
mod errors;
mod files;
mod lifecycle;
mod transfer;

/// One logical connection to a remote server
pub struct Session {
    config: SessionConfig,
    engine: EngineConfig,
    connector: Rc<dyn Connector>,
    callbacks: Arc<SessionCallbacks>,
    log: SessionLog,
    clock: Arc<dyn Clock>,
    changes_store: Option<Rc<dyn DirectoryChangesStore>>,
    status: SessionStatus,
    backend: Option<Box<dyn FileSystemBackend>>,
    tunnel: Option<Tunnel>,
    tunnel_error: Option<String>,
    current_directory: String,
    lock_directory: String,
    last_directory_change: String,
    files: FileList,
    directory_cache: Rc<RefCell<DirectoryCache>>,
    changes_cache: Option<DirectoryChangesCache>,
    transaction: TransactionState,
    exception_on_fail: u32,
    auto_read_directory: bool,
    users_groups_looked_up: bool,
    command_session: Option<Box<Session>>,
    is_command_session: bool,
    progress: Option<OperationProgress>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.config.session_name())
            .field("status", &self.status)
            .field("current_directory", &self.current_directory)
            .field("transaction", &self.transaction)
            .field("command_session", &self.command_session.is_some())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a closed session
    pub fn new(
        config: SessionConfig,
        engine: EngineConfig,
        connector: Rc<dyn Connector>,
        ui: Arc<dyn SessionUi>,
    ) -> Self {
        let callbacks = Arc::new(SessionCallbacks::new(ui, config.remember_password));
        Self::with_callbacks(config, engine, connector, callbacks)
    }

    fn with_callbacks(
        config: SessionConfig,
        engine: EngineConfig,
        connector: Rc<dyn Connector>,
        callbacks: Arc<SessionCallbacks>,
    ) -> Self {
        let log = SessionLog::new(config.session_name());
        Self {
            config,
            engine,
            connector,
            callbacks,
            log,
            clock: Arc::new(SystemClock),
            changes_store: None,
            status: SessionStatus::Closed,
            backend: None,
            tunnel: None,
            tunnel_error: None,
            current_directory: String::new(),
            lock_directory: String::new(),
            last_directory_change: String::new(),
            files: FileList::new(""),
            directory_cache: Rc::new(RefCell::new(DirectoryCache::new())),
            changes_cache: None,
            transaction: TransactionState::default(),
            exception_on_fail: 0,
            auto_read_directory: true,
            users_groups_looked_up: false,
            command_session: None,
            is_command_session: false,
            progress: None,
        }
    }

    /// Also write the session log to `sink`
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log = self.log.with_sink(sink);
        self
    }

    /// Use `clock` for reconnect timeouts
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Persist remembered directory changes in `store`
    pub fn with_changes_store(mut self, store: Rc<dyn DirectoryChangesStore>) -> Self {
        self.changes_store = Some(store);
        self
    }

    /// Connection settings
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Engine policy
    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    /// Session log
    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    /// Name used in logs and prompts
    pub fn session_name(&self) -> String {
        self.config.session_name()
    }

    /// Lifecycle state
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Whether the backend connection is up
    pub fn is_active(&self) -> bool {
        self.backend
            .as_ref()
            .is_some_and(|backend| backend.is_active())
    }

    /// Protocol the backend is bound to
    pub fn protocol(&self) -> Option<BoundProtocol> {
        self.backend.as_ref().map(|backend| backend.protocol())
    }

    /// Whether the backend supports an optional operation
    pub fn is_capable(&self, capability: Capability) -> bool {
        self.backend
            .as_ref()
            .is_some_and(|backend| backend.is_capable(capability))
    }

    /// Listing snapshot of the current directory
    pub fn files(&self) -> &FileList {
        &self.files
    }

    /// Current directory as presented to the user, without contacting the server
    ///
    /// Empty while the session is closed.
    pub fn peek_current_directory(&self) -> String {
        if self.status == SessionStatus::Closed {
            return String::new();
        }
        unix_path::translate_locked(&self.current_directory, &self.lock_directory, true)
    }

    /// Root the user is locked in, empty when not locked
    pub fn lock_directory(&self) -> &str {
        &self.lock_directory
    }

    /// Whether refreshes are currently deferred
    pub fn in_transaction(&self) -> bool {
        self.transaction.in_transaction()
    }

    /// Transaction nesting depth
    pub fn transaction_depth(&self) -> u32 {
        self.transaction.depth()
    }

    /// Whether listings are read automatically after directory changes
    pub fn auto_read_directory(&self) -> bool {
        self.auto_read_directory
    }

    /// Enable or disable automatic listing reads
    pub fn set_auto_read_directory(&mut self, value: bool) {
        self.auto_read_directory = value;
    }

    /// Cached listing of a directory
    pub fn cached_file_list(&self, directory: &str) -> Option<FileList> {
        self.directory_cache.borrow().get(directory)
    }

    /// Remembered directory changes
    pub fn directory_changes_cache(&self) -> Option<&DirectoryChangesCache> {
        self.changes_cache.as_ref()
    }

    /// Local port of the running tunnel
    pub fn tunnel_local_port(&self) -> Option<u16> {
        self.tunnel.as_ref().map(Tunnel::local_port)
    }

    /// Whether this is the secondary session of another one
    pub fn is_command_session(&self) -> bool {
        self.is_command_session
    }

    /// Whether the secondary shell session is connected
    pub fn command_session_opened(&self) -> bool {
        self.command_session
            .as_ref()
            .is_some_and(|session| session.is_active())
    }

    /// Errors are raised instead of being presented while the counter is positive
    pub fn exception_on_fail(&self) -> bool {
        self.exception_on_fail > 0
    }

    /// Nest an "errors are raised" region; mirrored to the command session
    pub fn set_exception_on_fail(&mut self, value: bool) -> Result<()> {
        if value {
            self.exception_on_fail += 1;
        } else {
            if self.exception_on_fail == 0 {
                return Err(Error::other("ExceptionOnFail is already zero."));
            }
            self.exception_on_fail -= 1;
        }
        if let Some(session) = self.command_session.as_deref_mut() {
            session.exception_on_fail = self.exception_on_fail;
        }
        Ok(())
    }

    /// Run `action` with errors raised instead of presented
    pub(crate) fn with_exception_on_fail<T>(
        &mut self,
        action: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.set_exception_on_fail(true)?;
        let result = action(self);
        self.set_exception_on_fail(false)?;
        result
    }

    /// Keep the connection alive
    pub fn idle(&mut self) -> Result<()> {
        if let Some(session) = self.command_session.as_deref_mut() {
            if session.is_active() {
                if let Err(error) = session.idle() {
                    self.log.warning(format!("Command session dropped: {}", error));
                    self.command_session = None;
                }
            }
        }
        if !self.is_active() {
            return Ok(());
        }
        match self.backend_mut()?.idle() {
            Ok(()) => Ok(()),
            Err(error) if error.is_fatal() => Err(self.fatal_error(error, "")),
            Err(error) => Err(error),
        }
    }

    /// Whether `name` is a leftover of an interrupted transfer
    pub fn temporary_transfer_file(&self, name: &str) -> bool {
        self.backend
            .as_ref()
            .is_some_and(|backend| backend.temporary_transfer_file(name))
    }

    /// UI handle routed through the callback guard
    pub fn ui_handle(&self) -> Arc<dyn SessionUi> {
        Arc::clone(&self.callbacks) as Arc<dyn SessionUi>
    }

    pub(crate) fn backend_mut(&mut self) -> Result<&mut Box<dyn FileSystemBackend>> {
        self.backend
            .as_mut()
            .ok_or_else(|| Error::fatal("Session is not connected"))
    }

    pub(crate) fn progress_continuing(&self) -> bool {
        self.progress
            .as_ref()
            .map_or(true, OperationProgress::is_continuing)
    }

    pub(crate) fn set_progress_file(&mut self, file_name: &str) -> Result<()> {
        match self.progress.as_mut() {
            Some(progress) => progress.set_file(file_name),
            None => Ok(()),
        }
    }
}
