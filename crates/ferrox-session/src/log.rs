//! Session log
//!
//! Every entry goes to `tracing` with the session name attached. A
//! [`LogSink`] can be installed to keep a per-session transcript as well.

use std::fmt;
use std::sync::Arc;

use ferrox_config::{EngineConfig, SessionConfig};
use ferrox_types::Error;
use tracing::{debug, error, info, warn};

/// Importance of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Engine internals
    Debug,
    /// Normal progress
    Info,
    /// Unexpected but handled
    Warning,
    /// Failures
    Error,
}

/// Receiver of session log entries
pub trait LogSink: Send + Sync {
    /// Record a line
    fn add(&self, level: LogLevel, message: &str);

    /// Record an error with its details
    fn add_exception(&self, error: &Error) {
        self.add(LogLevel::Error, &error.to_string());
        for detail in error.details() {
            self.add(LogLevel::Error, detail);
        }
    }

    /// Record a separator between connection attempts
    fn add_separator(&self) {
        self.add(LogLevel::Info, "--------------------------------------------------------------------------");
    }
}

/// Log handle owned by a session
#[derive(Clone)]
pub struct SessionLog {
    session: String,
    sink: Option<Arc<dyn LogSink>>,
}

impl fmt::Debug for SessionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionLog")
            .field("session", &self.session)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl SessionLog {
    /// Log for the named session
    pub fn new(session: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            sink: None,
        }
    }

    /// Also send entries to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Installed sink, if any
    pub fn sink(&self) -> Option<&Arc<dyn LogSink>> {
        self.sink.as_ref()
    }

    /// Record a line
    pub fn add(&self, level: LogLevel, message: &str) {
        let session = self.session.as_str();
        match level {
            LogLevel::Debug => debug!(session, "{}", message),
            LogLevel::Info => info!(session, "{}", message),
            LogLevel::Warning => warn!(session, "{}", message),
            LogLevel::Error => error!(session, "{}", message),
        }
        if let Some(sink) = &self.sink {
            sink.add(level, message);
        }
    }

    /// Record an engine detail
    pub fn debug(&self, message: impl AsRef<str>) {
        self.add(LogLevel::Debug, message.as_ref());
    }

    /// Record normal progress
    pub fn info(&self, message: impl AsRef<str>) {
        self.add(LogLevel::Info, message.as_ref());
    }

    /// Record a handled problem
    pub fn warning(&self, message: impl AsRef<str>) {
        self.add(LogLevel::Warning, message.as_ref());
    }

    /// Record an error with its details
    pub fn exception(&self, error: &Error) {
        let session = self.session.as_str();
        error!(session, details = ?error.details(), "{}", error);
        if let Some(sink) = &self.sink {
            sink.add_exception(error);
        }
    }

    /// Record a separator
    pub fn separator(&self) {
        if let Some(sink) = &self.sink {
            sink.add_separator();
        }
    }

    /// Record the settings a connection is opened with
    pub fn startup_info(&self, config: &SessionConfig, engine: &EngineConfig) {
        self.separator();
        self.info(format!("Session name: {}", config.session_name()));
        self.info(format!(
            "Host name: {} (Port: {})",
            config.host_name, config.port_number
        ));
        self.info(format!(
            "User name: {} (Password: {})",
            config.user_name,
            if config.password.is_some() { "Yes" } else { "No" }
        ));
        self.info(format!("Protocol: {:?}", config.protocol));
        if config.tunnel.enabled {
            self.info(format!(
                "Tunnel: {}@{}:{} (Local port: {})",
                config.tunnel.user_name,
                config.tunnel.host_name,
                config.tunnel.port_number,
                if config.tunnel.local_port_number == 0 {
                    "auto".to_string()
                } else {
                    config.tunnel.local_port_number.to_string()
                }
            ));
        }
        self.info(format!(
            "Cache directories: {}; Cache directory changes: {}; Permanent: {}",
            yes_no(config.cache_directories),
            yes_no(config.cache_directory_changes),
            yes_no(config.preserve_directory_changes)
        ));
        self.info(format!(
            "Lock in home: {}; Resolve symlinks: {}; Recycle bin: {}",
            yes_no(config.lock_in_home),
            yes_no(config.resolve_symlinks),
            if config.delete_to_recycle_bin {
                config.recycle_bin_path.as_str()
            } else {
                "No"
            }
        ));
        self.info(format!(
            "Reconnect: auto {} ms, timeout {} ms",
            engine.session_reopen_auto_ms, engine.session_reopen_timeout_ms
        ));
        self.separator();
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<(LogLevel, String)>>);

    impl LogSink for Collect {
        fn add(&self, level: LogLevel, message: &str) {
            self.0.lock().unwrap().push((level, message.to_string()));
        }
    }

    #[test]
    fn test_entries_reach_sink() {
        let sink = Arc::new(Collect::default());
        let log = SessionLog::new("test").with_sink(sink.clone());
        log.info("Connecting");
        log.debug("detail");
        let entries = sink.0.lock().unwrap();
        assert_eq!(entries[0], (LogLevel::Info, "Connecting".to_string()));
        assert_eq!(entries[1].0, LogLevel::Debug);
    }

    #[test]
    fn test_exception_includes_details() {
        let sink = Arc::new(Collect::default());
        let log = SessionLog::new("test").with_sink(sink.clone());
        let cause = Error::other("socket closed");
        log.exception(&Error::fatal_with(&cause, "Connection lost"));
        let messages: Vec<String> = sink.0.lock().unwrap().iter().map(|(_, m)| m.clone()).collect();
        assert_eq!(messages, vec!["Connection lost", "socket closed"]);
    }

    #[test]
    fn test_startup_info_hides_password() {
        let sink = Arc::new(Collect::default());
        let log = SessionLog::new("test").with_sink(sink.clone());
        let config = SessionConfig {
            host_name: "example.com".to_string(),
            user_name: "alice".to_string(),
            password: Some("secret".to_string()),
            ..SessionConfig::default()
        };
        log.startup_info(&config, &EngineConfig::default());
        let entries = sink.0.lock().unwrap();
        assert!(entries.iter().all(|(_, m)| !m.contains("secret")));
        assert!(entries.iter().any(|(_, m)| m == "User name: alice (Password: Yes)"));
    }
}
