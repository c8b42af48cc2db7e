//! Local/remote directory synchronization for Ferrox
//!
//! This crate compares a local directory tree with a remote one reached
//! through a [`ferrox_session::Session`] and applies the differences with the
//! session's regular file operations:
//!
//! - **Collect**: name-keyed comparison at the coarser side's time precision, optionally by size
//! - **Checklist**: sorted, checkable list of proposed uploads, downloads and deletions
//! - **Apply**: one transaction, batched per directory pair and action kind
//! - **Timestamp mode**: align modification times without transferring content
//!
//! # Examples
//!
//! ```rust,no_run
//! use ferrox_config::{EngineConfig, SessionConfig};
//! use ferrox_session::{LoopbackConnector, Session};
//! use ferrox_sync::{SyncMode, SyncParams, SynchronizeEngine};
//! use ferrox_types::{CopyParam, UnattendedUi};
//! use std::path::Path;
//! use std::rc::Rc;
//! use std::sync::Arc;
//!
//! # fn example() -> ferrox_types::Result<()> {
//! let mut session = Session::new(
//!     SessionConfig::default(),
//!     EngineConfig::default(),
//!     Rc::new(LoopbackConnector::new("/srv/mirror")),
//!     Arc::new(UnattendedUi),
//! );
//! session.open()?;
//!
//! let params = SyncParams {
//!     no_confirmation: true,
//!     ..SyncParams::default()
//! };
//! let copy_param = CopyParam::default();
//! let mut engine = SynchronizeEngine::new(&mut session);
//! let checklist = engine.collect(Path::new("/home/me/site"), "/", SyncMode::Remote, &copy_param, params, None)?;
//! println!("{} actions proposed", checklist.checked_count());
//! engine.apply(&checklist, &copy_param, params)?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod checklist;
pub mod engine;
pub mod options;

pub use checklist::{Checklist, ChecklistAction, ChecklistItem, FileInfo};
pub use engine::SynchronizeEngine;
pub use options::{SyncMode, SyncOptions, SyncParams};
