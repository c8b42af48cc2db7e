//! Guarded forwarding of UI callbacks
//!
//! The session never calls the user's [`SessionUi`] directly. Every call goes
//! through [`SessionCallbacks`], which runs it inside the session's callback
//! guard and remembers passwords for secondary connections.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use ferrox_types::{
    CancelStatus, Error, FileList, GuardSlot, OnceDoneOperation, Operation, OperationProgress,
    OperationSide, Prompt, Query, QueryAnswer, Result, SessionUi,
};

/// Password shared between a primary session and its secondary connections
pub type SharedPassword = Arc<Mutex<Option<String>>>;

/// UI proxy owned by one session
pub struct SessionCallbacks {
    ui: Arc<dyn SessionUi>,
    guard: GuardSlot,
    remember_password: bool,
    password: SharedPassword,
    primary_password: Option<SharedPassword>,
    primary_password_tried: AtomicBool,
    any_information: AtomicBool,
}

impl fmt::Debug for SessionCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCallbacks")
            .field("remember_password", &self.remember_password)
            .field("secondary", &self.primary_password.is_some())
            .finish_non_exhaustive()
    }
}

impl SessionCallbacks {
    /// Callbacks of a primary session
    pub fn new(ui: Arc<dyn SessionUi>, remember_password: bool) -> Self {
        Self {
            ui,
            guard: GuardSlot::new(),
            remember_password,
            password: Arc::new(Mutex::new(None)),
            primary_password: None,
            primary_password_tried: AtomicBool::new(false),
            any_information: AtomicBool::new(false),
        }
    }

    /// Callbacks of a secondary session that first tries the primary's password
    pub fn secondary(ui: Arc<dyn SessionUi>, primary_password: SharedPassword) -> Self {
        Self {
            primary_password: Some(primary_password),
            ..Self::new(ui, false)
        }
    }

    /// The wrapped UI
    pub fn ui(&self) -> Arc<dyn SessionUi> {
        Arc::clone(&self.ui)
    }

    /// Guard all callbacks run under
    pub fn guard(&self) -> &GuardSlot {
        &self.guard
    }

    /// Password remembered at login, shared with secondary sessions
    pub fn remembered_password(&self) -> SharedPassword {
        Arc::clone(&self.password)
    }

    /// Forget the remembered password
    pub fn forget_password(&self) {
        if let Ok(mut password) = self.password.lock() {
            *password = None;
        }
    }

    /// Forget which status messages were shown
    pub fn reset_information(&self) {
        self.any_information.store(false, Ordering::Relaxed);
    }

    /// Whether a status message was shown since the last reset
    pub fn any_information(&self) -> bool {
        self.any_information.load(Ordering::Relaxed)
    }

    fn try_primary_password(&self) -> Option<String> {
        let primary = self.primary_password.as_ref()?;
        if self.primary_password_tried.swap(true, Ordering::Relaxed) {
            return None;
        }
        primary.lock().ok().and_then(|password| password.clone())
    }
}

impl SessionUi for SessionCallbacks {
    fn query_user(&self, query: &Query) -> Result<QueryAnswer> {
        self.guard.guarded(|| self.ui.query_user(query))
    }

    fn prompt_user(&self, prompt: &Prompt) -> Result<Option<Vec<String>>> {
        if prompt.is_password() {
            if let Some(password) = self.try_primary_password() {
                return Ok(Some(vec![password]));
            }
        }
        let response = self.guard.guarded(|| self.ui.prompt_user(prompt))?;
        if self.remember_password && prompt.is_password() {
            if let Some(password) = response.as_ref().and_then(|values| values.first()) {
                if let Ok(mut remembered) = self.password.lock() {
                    *remembered = Some(password.clone());
                }
            }
        }
        Ok(response)
    }

    fn display_banner(&self, session_name: &str, banner: &str) -> Result<()> {
        self.guard
            .guarded(|| self.ui.display_banner(session_name, banner))
    }

    fn information(&self, text: &str, status: bool, active: bool) -> Result<()> {
        if active {
            self.any_information.store(true, Ordering::Relaxed);
        }
        self.guard
            .guarded(|| self.ui.information(text, status, active))
    }

    fn progress(&self, progress: &OperationProgress) -> Result<CancelStatus> {
        self.guard.guarded(|| self.ui.progress(progress))
    }

    fn finished(
        &self,
        operation: Operation,
        side: OperationSide,
        file_name: &str,
        success: bool,
    ) -> Result<OnceDoneOperation> {
        self.guard
            .guarded(|| self.ui.finished(operation, side, file_name, success))
    }

    fn show_extended_exception(&self, error: &Error) -> Result<()> {
        self.guard.guarded(|| self.ui.show_extended_exception(error))
    }

    fn directory_changed(&self, directory: &str) -> Result<()> {
        self.guard.guarded(|| self.ui.directory_changed(directory))
    }

    fn read_directory_started(&self) -> Result<()> {
        self.guard.guarded(|| self.ui.read_directory_started())
    }

    fn directory_read(&self, list: &FileList, reload_only: bool) -> Result<()> {
        self.guard
            .guarded(|| self.ui.directory_read(list, reload_only))
    }

    fn delete_local_file(&self, path: &Path, alternative: bool) -> Result<bool> {
        self.guard
            .guarded(|| self.ui.delete_local_file(path, alternative))
    }

    fn closed(&self) -> Result<()> {
        self.guard.guarded(|| self.ui.closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrox_types::{Answers, UnattendedUi};

    struct Typing(&'static str);

    impl SessionUi for Typing {
        fn prompt_user(&self, _prompt: &Prompt) -> Result<Option<Vec<String>>> {
            Ok(Some(vec![self.0.to_string()]))
        }
    }

    struct Failing;

    impl SessionUi for Failing {
        fn query_user(&self, _query: &Query) -> Result<QueryAnswer> {
            Err(Error::fatal("UI lost its connection"))
        }
    }

    #[test]
    fn test_password_remembered_for_secondary() {
        let primary = SessionCallbacks::new(Arc::new(Typing("secret")), true);
        primary.prompt_user(&Prompt::password("alice")).unwrap();

        let secondary =
            SessionCallbacks::secondary(Arc::new(UnattendedUi), primary.remembered_password());
        let first = secondary.prompt_user(&Prompt::password("alice")).unwrap();
        assert_eq!(first, Some(vec!["secret".to_string()]));
        let second = secondary.prompt_user(&Prompt::password("alice")).unwrap();
        assert_eq!(second, None);
    }

    #[test]
    fn test_password_not_remembered_when_disabled() {
        let primary = SessionCallbacks::new(Arc::new(Typing("secret")), false);
        primary.prompt_user(&Prompt::password("alice")).unwrap();
        assert_eq!(*primary.remembered_password().lock().unwrap(), None);
    }

    #[test]
    fn test_fatal_callback_error_surfaces_once() {
        let callbacks = SessionCallbacks::new(Arc::new(Failing), true);
        let query = Query::new("Continue?", Answers::of(&[QueryAnswer::Yes]));
        let error = callbacks.query_user(&query).unwrap_err();
        assert!(error.is_fatal());
        assert!(!callbacks.guard().is_active());
    }

    #[test]
    fn test_information_tracking() {
        let callbacks = SessionCallbacks::new(Arc::new(UnattendedUi), true);
        assert!(!callbacks.any_information());
        callbacks.information("Connecting", true, true).unwrap();
        assert!(callbacks.any_information());
        callbacks.reset_information();
        assert!(!callbacks.any_information());
    }
}
