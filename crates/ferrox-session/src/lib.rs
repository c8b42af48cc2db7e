//! Session engine for Ferrox
//!
//! This crate provides the [`Session`]: one logical connection to a remote
//! file server that sits between the caller and a pluggable wire backend.
//!
//! # Features
//!
//! - **Lifecycle**: open, close and reopen with reconnect timeouts and an optional SSH tunnel
//! - **Caching**: directory listings and resolved directory changes
//! - **Transactions**: nested scopes that defer listing refreshes to the outermost end
//! - **Error resolution**: fatal/command/abort/skip handling with retry and skip-all
//! - **Batch operations**: delete, rename, move, copy, properties, size and custom commands
//! - **Command session**: a lazily opened shell session for commands the backend cannot run
//! - **Loopback backend**: a local directory served as the remote tree
//!
//! # Examples
//!
//! ```rust,no_run
//! use ferrox_config::{EngineConfig, SessionConfig};
//! use ferrox_session::{LoopbackConnector, Session};
//! use ferrox_types::UnattendedUi;
//! use std::rc::Rc;
//! use std::sync::Arc;
//!
//! # fn example() -> ferrox_types::Result<()> {
//! let connector = Rc::new(LoopbackConnector::new("/srv/data"));
//! let mut session = Session::new(
//!     SessionConfig::default(),
//!     EngineConfig::default(),
//!     connector,
//!     Arc::new(UnattendedUi),
//! );
//! session.open()?;
//! for file in session.files().files() {
//!     println!("{} {}", file.size, file.file_name);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod callbacks;
pub mod connector;
pub mod log;
pub mod loopback;
pub mod session;
pub mod session_list;
pub mod transaction;
pub mod tunnel;

pub use cache::{DirectoryCache, DirectoryChange, DirectoryChangesCache, DirectoryChangesStore, JsonChangesStore};
pub use callbacks::SessionCallbacks;
pub use connector::{Clock, Connector, SecureShell, SystemClock};
pub use log::{LogLevel, LogSink, SessionLog};
pub use loopback::{LoopbackBackend, LoopbackConnector, LoopbackShell};
pub use session::Session;
pub use session_list::SessionList;
pub use transaction::{PendingRefresh, TransactionState};
pub use tunnel::{Tunnel, TunnelTarget, TunnelTransport, TunnelUi};
