//! Error taxonomy for the session engine
//!
//! Errors fall into four families that drive engine control flow:
//! fatal errors end the connection, command errors fail a single operation,
//! aborts cancel the current batch and skips drop a single item of a batch.
//! The remaining variants describe where a failure came from.

use crate::model::OnceDoneOperation;

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Low severity - the batch can continue
    Low,
    /// Medium severity - the operation may be retried
    Medium,
    /// High severity - the operation should be abandoned
    High,
    /// Critical severity - the connection is gone
    Critical,
}

/// Main error type for session operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// Connection-ending failure, resumable only through a reopen
    #[error("{message}")]
    Fatal {
        /// Error message
        message: String,
        /// Additional messages collected from the cause chain
        details: Vec<String>,
        /// Set once the user was asked whether to reconnect after this error
        reopen_queried: bool,
    },

    /// Recoverable failure of a single operation
    #[error("{message}")]
    Command {
        /// Error message
        message: String,
        /// Additional messages collected from the cause chain
        details: Vec<String>,
    },

    /// User or policy cancellation of the current batch
    #[error("Operation aborted")]
    Abort,

    /// Silent abort raised after a fatal error was captured by a callback guard
    #[error("Operation aborted by callback guard")]
    CallbackGuardAbort,

    /// Skip the current item of a batch and continue with the next one
    #[error("{message}")]
    Skip {
        /// Reason the item was skipped
        message: String,
    },

    /// The session was closed on completion of an operation
    #[error("{message}")]
    Terminate {
        /// Error message
        message: String,
        /// Action requested once the operation finished
        operation: OnceDoneOperation,
    },

    /// Failure of the background tunnel
    #[error("Tunnel error: {message}")]
    Tunnel {
        /// Error message
        message: String,
    },

    /// Local I/O failure
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection-ending errors
    Fatal,
    /// Single operation failures
    Command,
    /// Cancellation, including callback guard aborts
    Abort,
    /// Per-item skips
    Skip,
    /// Close on completion
    Terminate,
    /// Tunnel failures
    Tunnel,
    /// I/O related errors
    Io,
    /// Configuration errors
    Config,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fatal { .. } => ErrorKind::Fatal,
            Self::Command { .. } => ErrorKind::Command,
            Self::Abort | Self::CallbackGuardAbort => ErrorKind::Abort,
            Self::Skip { .. } => ErrorKind::Skip,
            Self::Terminate { .. } => ErrorKind::Terminate,
            Self::Tunnel { .. } => ErrorKind::Tunnel,
            Self::Io { .. } => ErrorKind::Io,
            Self::Config { .. } => ErrorKind::Config,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Fatal { .. } | Self::Terminate { .. } => ErrorSeverity::Critical,
            Self::Tunnel { .. } | Self::Config { .. } => ErrorSeverity::High,
            Self::Command { .. } | Self::Io { .. } | Self::Other { .. } => ErrorSeverity::Medium,
            Self::Abort | Self::CallbackGuardAbort | Self::Skip { .. } => ErrorSeverity::Low,
        }
    }

    /// Whether the error ends the connection
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. } | Self::Terminate { .. })
    }

    /// Whether the error cancels the current batch
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Abort | Self::CallbackGuardAbort)
    }

    /// Whether the error skips a single batch item
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip { .. })
    }

    /// Check if the failed operation can be retried on the same connection
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Command { .. } | Self::Skip { .. } | Self::Io { .. } | Self::Other { .. }
        )
    }

    /// Additional messages carried by fatal and command errors
    pub fn details(&self) -> &[String] {
        match self {
            Self::Fatal { details, .. } | Self::Command { details, .. } => details,
            _ => &[],
        }
    }

    /// Whether a reconnect was already offered for this fatal error
    pub fn reopen_queried(&self) -> bool {
        matches!(self, Self::Fatal { reopen_queried: true, .. })
    }

    /// Remember that a reconnect was offered for this fatal error
    pub fn mark_reopen_queried(&mut self) {
        if let Self::Fatal { reopen_queried, .. } = self {
            *reopen_queried = true;
        }
    }

    /// Convert any error into a fatal one, keeping its message
    pub fn into_fatal(self) -> Self {
        match self {
            Self::Fatal { .. } | Self::Terminate { .. } => self,
            Self::Command { message, details } => Self::Fatal {
                message,
                details,
                reopen_queried: false,
            },
            other => Self::fatal(other.to_string()),
        }
    }

    /// Create a new fatal error
    pub fn fatal<S: Into<String>>(message: S) -> Self {
        Self::Fatal {
            message: message.into(),
            details: Vec::new(),
            reopen_queried: false,
        }
    }

    /// Create a fatal error that wraps a cause under a new message
    ///
    /// An empty message keeps the cause's own message.
    pub fn fatal_with<S: Into<String>>(cause: &Error, message: S) -> Self {
        let (message, details) = wrap(cause, message.into());
        Self::Fatal {
            message,
            details,
            reopen_queried: false,
        }
    }

    /// Create a new command error
    pub fn command<S: Into<String>>(message: S) -> Self {
        Self::Command {
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Create a command error that wraps a cause under a new message
    pub fn command_with<S: Into<String>>(cause: &Error, message: S) -> Self {
        let (message, details) = wrap(cause, message.into());
        Self::Command { message, details }
    }

    /// Create a new skip error
    pub fn skip<S: Into<String>>(message: S) -> Self {
        Self::Skip {
            message: message.into(),
        }
    }

    /// Create a new tunnel error
    pub fn tunnel<S: Into<String>>(message: S) -> Self {
        Self::Tunnel {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

fn wrap(cause: &Error, message: String) -> (String, Vec<String>) {
    let cause_message = cause.to_string();
    if message.is_empty() || message == cause_message {
        return (cause_message, cause.details().to_vec());
    }
    let mut details = Vec::with_capacity(cause.details().len() + 1);
    details.push(cause_message);
    details.extend_from_slice(cause.details());
    (message, details)
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}
