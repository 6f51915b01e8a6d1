//! Priority/weight routed file storage.
//!
//! Depot takes an incoming file, picks one of several configured storage
//! backends, writes the file there, and returns the URI it can be fetched
//! from. Administrators give each backend a priority and a weight;
//! selection follows the SRV-record rules of RFC 2782: a lower priority
//! value always wins, and backends sharing a priority are ordered by
//! weighted random draw. When a backend's readiness probe fails, the
//! router falls through to the next candidate.
//!
//! # Architecture
//!
//! ```text
//! configuration ──▶ [BackendDescriptor, ...]
//!                          │
//!                          ▼
//!                   WeightedSelector ── fresh SRV ordering per route
//!                          │
//!                          ▼
//!                    StorageRouter ── prepare ▶ store ▶ URI
//!                          │
//!               ┌──────────┴──────────┐
//!               ▼                     ▼
//!         LocalBackend           SftpBackend
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use depot::{BackendRegistry, Config, FileSource, StorageRouter};
//! use std::sync::Arc;
//!
//! # async fn example() -> depot::Result<()> {
//! let registry = Arc::new(BackendRegistry::builtin());
//! let config = Arc::new(Config::load("/etc/depot.toml", &registry)?);
//! let router = StorageRouter::new(registry, config);
//!
//! let file = FileSource::open("./note.txt").await?;
//! let uri = router.route_store(&file).await?;
//! println!("stored at {uri}");
//! # Ok(())
//! # }
//! ```
//!
//! Or, with the configuration file named by the `DEPOT_CONFIG_FILE`
//! environment variable:
//!
//! ```no_run
//! # async fn example() -> depot::Result<()> {
//! let file = depot::FileSource::open("./note.txt").await?;
//! let uri = depot::route_store(&file).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Extending
//!
//! New backend types implement [`Backend`] and are registered explicitly
//! at startup with [`BackendRegistry::register`], together with the
//! schema of extra attributes their config sections carry.

mod config;
mod error;
mod local;
mod naming;
mod registry;
mod router;
mod selector;
mod sftp;
mod traits;

pub use config::{BackendDescriptor, Config, RESERVED_SECTION};
pub use error::{Result, StoreError};
pub use local::LocalBackend;
pub use naming::{NamingPolicy, MAX_ATTEMPTS};
pub use registry::{AttrField, BackendCtor, BackendRegistry};
pub use router::{route_store, store_with_config, StorageRouter, CONFIG_ENV};
pub use selector::order_backends;
pub use sftp::SftpBackend;
pub use traits::{Backend, FileSource};

// Re-export bytes for convenience
pub use bytes::Bytes;
