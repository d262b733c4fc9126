//! # Locus Core Library
//!
//! This crate keeps an always-current list of the files under a directory
//! whose names match a glob pattern, so lookups never touch the disk. The
//! list is seeded by a walk, kept fresh by filesystem notifications and
//! rebuilt from scratch whenever the notification stream can no longer be
//! trusted.
//!
//! ## Architecture
//!
//! - **Types** (`types`): Root descriptor, change events, lifecycle states
//! - **Store** (`store`): The lock-protected path cache and its mutations
//! - **Walk** (`walk`): Synchronous enumeration used for snapshots
//! - **Queue** (`queue`): FIFO handoff from watch callbacks to the reconciler
//! - **Reconciler** (`reconciler`): The single writer applying changes
//! - **Backend** (`backend`): Traits between the index and a notification source
//! - **Watcher** (`watcher`): `notify`-based backend
//! - **Index** (`index`): Lifecycle, self-heal and the public lookup surface
//! - **Config** (`config`): Configuration management
//!
//! ## Example
//!
//! ```rust,no_run
//! use locus_core::FileIndex;
//! use regex::Regex;
//!
//! let index = FileIndex::open("/srv/music", "*.mp3", true)?;
//!
//! let re = Regex::new(r"Beethoven.*\.mp3$").unwrap();
//! if let Some(path) = index.find_regex(&re) {
//!     println!("{}", path.display());
//! }
//!
//! index.stop();
//! # Ok::<(), locus_core::LocusError>(())
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod index;
pub mod queue;
pub mod reconciler;
pub mod store;
pub mod types;
pub mod walk;
pub mod watcher;

// Re-export commonly used types
pub use backend::{ChangeHandler, WatchBackend, WatchHandle};
pub use config::Config;
pub use error::{LocusError, Result};
pub use index::{FileIndex, RestartPolicy};
pub use queue::ChangeQueue;
pub use store::CacheStore;
pub use types::{ChangeEvent, LifecycleState, RootDescriptor};
pub use watcher::NotifyBackend;
