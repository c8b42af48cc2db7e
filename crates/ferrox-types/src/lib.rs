//! Core types and collaborator contracts for the Ferrox session engine
//!
//! This crate provides the foundational pieces shared by the session engine,
//! the synchronizer and the tools built on them:
//!
//! - **Error handling**: the fatal/command/abort/skip taxonomy and the batch [`Outcome`]
//! - **Model**: remote files, directory snapshots, time precision and masks
//! - **Progress**: per-batch counters, cancellation and overwrite policy
//! - **Callback guard**: single-slot capture of fatal errors raised by callbacks
//! - **Traits**: the [`FileSystemBackend`] and [`SessionUi`] contracts
//!
//! # Features
//!
//! - `std` (default): Enable standard library features
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use ferrox_types::{Error, Outcome, Result};
//!
//! fn process(name: &str) -> Result<()> {
//!     if name.ends_with(".lock") {
//!         return Err(Error::skip(format!("{} is locked", name)));
//!     }
//!     Ok(())
//! }
//!
//! assert!(Outcome::from_result(process("a.txt")).is_continue());
//! assert!(matches!(Outcome::from_result(process("a.lock")), Outcome::Skip(_)));
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod guard;
pub mod mask;
pub mod model;
pub mod outcome;
pub mod params;
pub mod progress;
pub mod query;
pub mod result;
pub mod traits;
pub mod unix_path;

// Re-export commonly used types
pub use error::{Error, ErrorKind, ErrorSeverity};
pub use guard::{CallbackGuard, GuardSlot};
pub use mask::{mask_file_name, FileMasks};
pub use model::*;
pub use outcome::Outcome;
pub use params::{CopyParam, DeleteParams, RemoteProperties, ReopenParams};
pub use progress::{BatchOverwrite, CancelStatus, OperationProgress, OverwriteFileParams};
pub use query::{Answers, Prompt, PromptField, PromptKind, Query, QueryAnswer, QueryKind};
pub use result::Result;
pub use traits::{FileSystemBackend, SessionUi, SpaceAvailable, UnattendedUi};
