//! kvtrace - key-value cache with transparent call instrumentation.
//!
//! A [`Cache`] stores scalar values under freshly minted UUID keys in a
//! key-value backend. Its `store` operation is wrapped by two layers:
//! - [`CallCounter`]: increments a counter named after the operation
//! - [`CallRecorder`]: appends the call's arguments and result to two lists
//!
//! [`replay()`] reads that state back and prints the call history.
//!
//! # Example
//!
//! ```rust,ignore
//! use kvtrace::{replay, BackendHandle, Cache, SqliteBackend};
//!
//! fn main() -> kvtrace::Result<()> {
//!     let backend = BackendHandle::connected(SqliteBackend::new("cache.sqlite")?);
//!     let cache = Cache::new(backend)?;
//!
//!     cache.store("Hello")?;
//!     cache.store(98)?;
//!     cache.store(b"bytes")?;
//!
//!     // Cache.store was called 3 times:
//!     // Cache.store(*('Hello',)) -> 1f0c...
//!     replay(Some(&cache.store_operation()));
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod instrument;
pub mod replay;
pub mod value;

// Re-export commonly used types
pub use backend::{BackendHandle, KvBackend, Liveness, MemoryBackend, SqliteBackend};
pub use cache::Cache;
pub use config::{KeyspaceConfig, SqliteBackendConfig};
pub use error::{KvError, Result};
pub use instrument::{BoundOperation, CallCounter, CallRecorder, Layer, Operation};
pub use replay::{replay, replay_to, CallHistory, Replayable};
pub use value::{CallArgs, CallOutput, Key, StoredValue};
