//! The secondary shell session

use std::rc::Rc;
use std::sync::Arc;

use ferrox_types::{Capability, Error, FsCommand, FsProtocol, Result};

use super::Session;
use crate::callbacks::SessionCallbacks;

impl Session {
    /// Secondary shell session, connected on first use
    ///
    /// A command session that lost its connection is replaced. One created
    /// inside a transaction starts at the primary's depth.
    pub fn command_session(&mut self) -> Result<&mut Self> {
        if self
            .command_session
            .as_ref()
            .is_some_and(|session| !session.is_active())
        {
            self.log.debug("Dropping disconnected command session.");
            self.command_session = None;
        }

        if self.command_session.is_none() {
            let mut session = self.create_command_session();
            self.log.info("Opening command session.");
            if let Err(error) = session.open() {
                return Err(if error.is_abort() {
                    error
                } else {
                    Error::command_with(&error, "Error opening command session.")
                });
            }
            session.transaction.align_depth(self.transaction.depth());
            self.command_session = Some(Box::new(session));
        }

        self.command_session
            .as_deref_mut()
            .ok_or_else(|| Error::other("Command session is not available"))
    }

    fn create_command_session(&self) -> Self {
        let mut config = self.config.clone();
        config.name = format!("{} (shell)", self.session_name());
        config.protocol = FsProtocol::Scp;
        config.remote_directory.clone_from(&self.current_directory);
        config.lookup_user_groups = false;
        config.preserve_directory_changes = false;

        let callbacks = Arc::new(SessionCallbacks::secondary(
            self.callbacks.ui(),
            self.callbacks.remembered_password(),
        ));
        let mut session = Self::with_callbacks(
            config,
            self.engine.clone(),
            Rc::clone(&self.connector),
            callbacks,
        );
        if let Some(sink) = self.log.sink() {
            session.log = session.log.with_sink(Arc::clone(sink));
        }
        session.clock = Arc::clone(&self.clock);
        session.directory_cache = Rc::clone(&self.directory_cache);
        session.auto_read_directory = false;
        session.exception_on_fail = self.exception_on_fail;
        session.is_command_session = true;
        session
    }

    /// Run `action` on the command session
    ///
    /// A fatal failure there drops the command session and reaches the
    /// primary as a command error.
    pub(crate) fn run_on_command_session<T>(
        &mut self,
        action: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let result = {
            let session = self.command_session()?;
            match action(session) {
                Err(error) if error.is_fatal() => Err(session.fatal_error(error, "")),
                other => other,
            }
        };
        match result {
            Err(error) if error.is_fatal() => {
                self.command_session = None;
                Err(Error::command_with(&error, "Connection of the command session was lost."))
            }
            other => other,
        }
    }

    /// Bring this session into `directory` unless it is there already
    pub(crate) fn sync_directory(&mut self, directory: &str) -> Result<()> {
        if self.current_directory != directory {
            self.change_directory(directory)?;
            self.read_current_directory()?;
        }
        Ok(())
    }

    /// Run a shell command on the backend, or on the command session when
    /// the backend cannot run commands
    pub(crate) fn execute_command(&mut self, command: &str, output: &mut dyn FnMut(&str, bool)) -> Result<()> {
        if self.is_capable(Capability::AnyCommand) {
            return self.backend_mut()?.any_command(command, output);
        }
        let directory = self.current_directory.clone();
        self.run_on_command_session(|session| {
            session.sync_directory(&directory)?;
            session.backend_mut()?.any_command(command, output)
        })
    }

    /// Run an arbitrary shell command in the current directory
    ///
    /// Output lines reach `output` flagged when they come from the error
    /// stream. Afterwards the session follows a directory change the command
    /// made. Failures are shown to the user unless errors are raised.
    pub fn any_command(&mut self, command: &str, output: &mut dyn FnMut(&str, bool)) -> Result<()> {
        match self.do_any_command(command, output) {
            Ok(()) => Ok(()),
            Err(error) if error.is_fatal() => Err(self.fatal_error(error, "")),
            Err(error) if error.is_abort() || self.exception_on_fail() => Err(error),
            Err(error) => self.handle_extended_exception(&error),
        }
    }

    fn do_any_command(&mut self, command: &str, output: &mut dyn FnMut(&str, bool)) -> Result<()> {
        let directory = self.current_directory.clone();
        self.directory_modified(&directory, false);

        if self.is_capable(Capability::AnyCommand) {
            self.log
                .info(format!("Executing user defined command \"{}\".", command));
            self.backend_mut()?.any_command(command, output)?;
        } else {
            self.log.info(format!(
                "Executing user defined command \"{}\" on command session.",
                command
            ));
            let target = self.run_on_command_session(|session| {
                session.sync_directory(&directory)?;
                let backend = session.backend_mut()?;
                backend.any_command(command, output)?;
                backend.read_current_directory()?;
                Ok(backend.current_directory())
            })?;
            // Follow a directory change the command made
            self.change_directory(&target)?;
        }
        self.react_on_command(FsCommand::AnyCommand)
    }
}
