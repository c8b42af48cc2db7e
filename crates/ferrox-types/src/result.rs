//! Result type alias for session operations

use crate::Error;

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, Error>;
