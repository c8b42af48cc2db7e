//! A set of sessions sharing one connector and UI

use std::rc::Rc;
use std::sync::Arc;

use ferrox_config::{EngineConfig, SessionConfig};
use ferrox_types::{Error, Result, SessionUi};
use tracing::debug;

use crate::connector::Connector;
use crate::session::Session;

/// Owner of several sessions
pub struct SessionList {
    engine: EngineConfig,
    connector: Rc<dyn Connector>,
    ui: Arc<dyn SessionUi>,
    sessions: Vec<Session>,
}

impl std::fmt::Debug for SessionList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionList")
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

impl SessionList {
    /// Create an empty list
    pub fn new(engine: EngineConfig, connector: Rc<dyn Connector>, ui: Arc<dyn SessionUi>) -> Self {
        Self {
            engine,
            connector,
            ui,
            sessions: Vec::new(),
        }
    }

    /// Add a closed session for `config` and return it
    pub fn new_session(&mut self, config: SessionConfig) -> &mut Session {
        let session = Session::new(
            config,
            self.engine.clone(),
            Rc::clone(&self.connector),
            Arc::clone(&self.ui),
        );
        let index = self.sessions.len();
        self.sessions.push(session);
        &mut self.sessions[index]
    }

    /// Close and drop the session at `index`
    pub fn free_session(&mut self, index: usize) -> Result<()> {
        if index >= self.sessions.len() {
            return Err(Error::other(format!("No session at index {}", index)));
        }
        let mut session = self.sessions.remove(index);
        if session.is_active() {
            session.close();
        }
        debug!("Freed session {}", session.session_name());
        Ok(())
    }

    /// Session at `index`
    pub fn get(&self, index: usize) -> Option<&Session> {
        self.sessions.get(index)
    }

    /// Mutable session at `index`
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Session> {
        self.sessions.get_mut(index)
    }

    /// Number of sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the list holds no session
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of connected sessions
    pub fn active_count(&self) -> usize {
        self.sessions.iter().filter(|session| session.is_active()).count()
    }

    /// Keep every connected session alive
    ///
    /// A failure of one session is shown to the user and does not stop the
    /// others. Only an error raised by the UI itself is returned.
    pub fn idle(&mut self) -> Result<()> {
        for session in self.sessions.iter_mut().filter(|session| session.is_active()) {
            if let Err(error) = session.idle() {
                if error.is_abort() {
                    continue;
                }
                session.handle_extended_exception(&error)?;
            }
        }
        Ok(())
    }
}
