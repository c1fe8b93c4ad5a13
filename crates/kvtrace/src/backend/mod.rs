//! Key-value backends.
//!
//! The cache talks to storage only through [`KvBackend`], reached via a
//! [`BackendHandle`] that also says whether the store is genuinely connected.
//! - [`SqliteBackend`]: persistent, file-based store
//! - [`MemoryBackend`]: in-process store for tests and stand-ins

mod handle;
mod memory;
mod sqlite;
mod traits;

pub use handle::{BackendHandle, Liveness};
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;
pub use traits::KvBackend;
