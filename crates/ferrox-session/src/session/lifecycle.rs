//! Opening, closing and reopening the connection

use std::sync::Arc;
use std::time::{Duration, Instant};

use ferrox_config::SessionConfig;
use ferrox_types::{
    Answers, BoundProtocol, Error, FileList, FileSystemBackend, FsProtocol, OnceDoneOperation,
    OperationProgress, Query, QueryAnswer, QueryKind, ReopenParams, Result, SessionStatus,
    SessionUi,
};

use super::Session;
use crate::cache::DirectoryChangesCache;
use crate::tunnel::{find_free_port, Tunnel, TunnelTarget, TunnelUi, TUNNEL_IDLE_INTERVAL};

impl Session {
    /// Connect, authenticate and run the startup sequence
    ///
    /// Any failure is escalated to a fatal error after the tunnel and a
    /// partially built backend were torn down.
    pub fn open(&mut self) -> Result<()> {
        self.reset_connection();
        self.status = SessionStatus::Opening;
        self.log.startup_info(&self.config, &self.engine);

        let had_backend = self.backend.is_some();
        let result = match self.open_connection() {
            Ok(()) => Ok(()),
            Err(error) => {
                self.changes_cache = None;
                let error = self.fatal_error(error, "");
                if !had_backend && !self.is_active() {
                    self.backend = None;
                }
                if self.status != SessionStatus::Closed {
                    self.closed();
                }
                Err(error)
            }
        };

        let information = if self.callbacks.any_information() {
            self.callbacks.information("", true, false)
        } else {
            Ok(())
        };
        result.and(information)
    }

    fn open_connection(&mut self) -> Result<()> {
        let mut target = self.config.clone();
        if self.config.tunnel.enabled {
            self.callbacks.information("Opening tunnel...", true, true)?;
            let local_port = self.open_tunnel()?;
            target.host_name = "127.0.0.1".to_string();
            target.port_number = local_port;
            // The forward may land on a different local port than last time
            self.backend = None;
        }

        match self.backend.as_mut() {
            Some(backend) => backend.open()?,
            None => {
                self.callbacks.information("Connecting to host...", true, true)?;
                let backend = self.connect(&target)?;
                self.backend = Some(backend);
            }
        }

        if self.config.cache_directory_changes {
            let mut cache = DirectoryChangesCache::new(self.engine.cache_directory_changes_max_size);
            if self.config.preserve_directory_changes {
                if let Some(store) = &self.changes_store {
                    if let Some(entries) = store.load(&self.config.storage_key())? {
                        cache.restore(entries);
                    }
                }
            }
            self.changes_cache = Some(cache);
        }

        self.do_startup()?;
        self.callbacks.information("Session started.", true, true)?;
        self.status = SessionStatus::Opened;
        self.log.info("Session started.");
        Ok(())
    }

    fn connect(&self, target: &SessionConfig) -> Result<Box<dyn FileSystemBackend>> {
        let ui = self.ui_handle();
        if target.protocol == FsProtocol::Ftp {
            self.log.info(format!("Connecting to {} using FTP", target.host_name));
            return self.connector.connect_ftp(target, ui);
        }
        self.log
            .info(format!("Looking up host \"{}\"", target.host_name));
        let shell = self.connector.connect_shell(target, ui)?;
        let protocol = if target.protocol == FsProtocol::Scp
            || (target.protocol == FsProtocol::Sftp && shell.ssh_fallback_command())
        {
            BoundProtocol::Scp
        } else {
            BoundProtocol::Sftp
        };
        self.log.info(format!("Using {:?} protocol.", protocol));
        self.connector.bind_shell(shell, protocol)
    }

    fn open_tunnel(&mut self) -> Result<u16> {
        let low = self.engine.tunnel_local_port_number_low;
        let high = self.engine.tunnel_local_port_number_high;
        let local_port = match self.config.tunnel.local_port_number {
            0 => find_free_port(low, high).ok_or_else(|| {
                Error::fatal(format!(
                    "Cannot find free local port number for tunnel in range {} to {}.",
                    low, high
                ))
            })?,
            port => port,
        };
        let target = TunnelTarget::new(&self.config, local_port);
        self.log.info(format!(
            "Opening tunnel on local port {} via {}",
            local_port, target.session.host_name
        ));
        self.tunnel_error = None;
        let ui = Arc::new(TunnelUi::new(self.ui_handle()));
        let transport = match self.connector.open_tunnel(&target, ui) {
            Ok(transport) => transport,
            Err(error) => {
                self.tunnel_error = Some(error.to_string());
                return Err(error);
            }
        };
        self.tunnel = Some(Tunnel::start(transport, local_port, TUNNEL_IDLE_INTERVAL)?);
        Ok(local_port)
    }

    fn close_tunnel(&mut self) {
        if let Some(mut tunnel) = self.tunnel.take() {
            self.log.info("Closing tunnel");
            if let Some(error) = tunnel.stop() {
                self.tunnel_error = Some(error);
            }
        }
    }

    fn do_startup(&mut self) -> Result<()> {
        self.begin_transaction();
        let result = self.startup_steps();
        let ended = self.end_transaction();
        result.and(ended)
    }

    fn startup_steps(&mut self) -> Result<()> {
        self.callbacks
            .information("Starting the session...", true, true)?;
        self.transaction.mark_read_current_directory();
        if self.auto_read_directory {
            self.transaction.mark_read_directory();
        }
        self.backend_mut()?.do_startup()?;
        self.lookup_users_groups()?;
        self.callbacks
            .information("Reading remote directory...", true, true)?;
        if !self.config.remote_directory.is_empty() {
            let directory = self.config.remote_directory.clone();
            self.change_directory(&directory)?;
        }
        Ok(())
    }

    fn reset_connection(&mut self) {
        self.callbacks.reset_information();
        self.tunnel_error = None;
        self.users_groups_looked_up = false;
        self.current_directory.clear();
        self.lock_directory.clear();
        self.files = FileList::new("");
    }

    /// Drop the connection and the secondary session
    pub fn close(&mut self) {
        self.save_directory_changes();
        if let Some(session) = self.command_session.as_deref_mut() {
            session.close();
        }
        self.command_session = None;
        let was_active = self.is_active();
        if let Some(backend) = self.backend.as_mut() {
            backend.close();
        }
        if was_active || self.status != SessionStatus::Closed {
            self.closed();
        }
    }

    fn closed(&mut self) {
        self.close_tunnel();
        if let Err(error) = self.callbacks.closed() {
            self.log.warning(format!("Closed notification failed: {}", error));
        }
        self.status = SessionStatus::Closed;
        self.log.info("Session closed.");
    }

    fn save_directory_changes(&self) {
        if !(self.config.cache_directory_changes && self.config.preserve_directory_changes) {
            return;
        }
        if let (Some(cache), Some(store)) = (&self.changes_cache, &self.changes_store) {
            if let Err(error) = store.save(&self.config.storage_key(), &cache.entries()) {
                self.log
                    .warning(format!("Failed to save directory changes: {}", error));
            }
        }
    }

    /// Close and open again, keeping the user's place
    ///
    /// The protocol actually bound is pinned and the current directory becomes
    /// the startup directory. Pending refreshes, the exception-on-fail count
    /// and the auto-read flag survive the reopen.
    pub fn reopen(&mut self, params: ReopenParams) -> Result<()> {
        let saved_protocol = self.config.protocol;
        let saved_remote_directory = self.config.remote_directory.clone();
        let saved_pending = self.transaction.pending();
        let saved_exception_on_fail = self.exception_on_fail;
        let saved_auto_read_directory = self.auto_read_directory;

        self.transaction.clear_pending();
        self.transaction.set_suspended(true);
        self.exception_on_fail = 0;
        if params.no_read_directory {
            self.auto_read_directory = false;
        }
        if !self.current_directory.is_empty() {
            self.config.remote_directory = self.current_directory.clone();
        }
        if self.config.protocol == FsProtocol::Sftp {
            match self.protocol() {
                Some(BoundProtocol::Scp) => self.config.protocol = FsProtocol::Scp,
                Some(BoundProtocol::Sftp) => self.config.protocol = FsProtocol::SftpOnly,
                _ => {}
            }
        }

        if self.is_active() {
            self.close();
        }
        let result = self.open();

        self.config.protocol = saved_protocol;
        self.config.remote_directory = saved_remote_directory;
        self.transaction.set_suspended(false);
        self.transaction.set_pending(saved_pending);
        self.exception_on_fail = saved_exception_on_fail;
        self.auto_read_directory = saved_auto_read_directory;
        result
    }

    /// Offer to reconnect after a fatal error and keep trying while the user agrees
    ///
    /// A given error is offered at most once. Attempts stop once the reopen
    /// timeout has elapsed since the first one.
    pub fn query_reopen(
        &mut self,
        error: &mut Error,
        params: ReopenParams,
        mut progress: Option<&mut OperationProgress>,
    ) -> Result<bool> {
        if let Some(progress) = progress.as_deref_mut() {
            progress.suspend();
        }
        let started = self.clock.now();
        let result = self.reopen_loop(error, params, started);
        if let Some(progress) = progress {
            progress.resume();
        }
        result
    }

    fn reopen_loop(
        &mut self,
        error: &mut Error,
        params: ReopenParams,
        started: Instant,
    ) -> Result<bool> {
        let timeout = self.engine.session_reopen_timeout();
        let mut result = self.do_query_reopen(error)?;
        while result {
            match self.reopen(params) {
                Ok(()) => {}
                Err(mut reopen_error) => {
                    if self.is_active() {
                        return Err(reopen_error);
                    }
                    let elapsed = self.clock.now().saturating_duration_since(started);
                    result = within(timeout, elapsed) && self.do_query_reopen(&mut reopen_error)?;
                }
            }
            if self.is_active() {
                break;
            }
        }
        Ok(result)
    }

    fn do_query_reopen(&mut self, error: &mut Error) -> Result<bool> {
        if error.reopen_queried() {
            return Ok(false);
        }
        self.log.exception(error);
        self.log.info("Connection was lost, asking what to do.");
        let mut query = Query::new(
            error.to_string(),
            Answers::of(&[QueryAnswer::Retry, QueryAnswer::Abort]),
        )
        .more_messages(error.details().to_vec())
        .kind(QueryKind::Error);
        if let Some(delay) = self.engine.session_reopen_auto() {
            query = query.timeout(delay, QueryAnswer::Retry);
        }
        let answer = self.callbacks.query_user(&query);
        error.mark_reopen_queried();
        Ok(answer? == QueryAnswer::Retry)
    }

    /// Close the session because a finished batch asked for it
    pub(crate) fn close_on_completion(&mut self, operation: OnceDoneOperation) -> Error {
        self.log
            .info("Closing session after completed operation (as requested by user)");
        self.close();
        Error::Terminate {
            message: "Session was closed on completion of the operation.".to_string(),
            operation,
        }
    }
}

fn within(timeout: Option<Duration>, elapsed: Duration) -> bool {
    timeout.map_or(true, |timeout| elapsed < timeout)
}
