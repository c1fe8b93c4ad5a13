//! Backend handle with an explicit liveness flag.

use super::traits::KvBackend;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Whether a handle talks to a genuine store.
///
/// Instrumentation and replay only issue their own round-trips through
/// `Connected` handles. A `Detached` handle still serves primary reads and
/// writes, which is what test doubles rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    Connected,
    Detached,
}

/// Shared handle to a key-value backend.
///
/// Cheap to clone; every clone refers to the same backend.
#[derive(Clone)]
pub struct BackendHandle {
    backend: Arc<dyn KvBackend>,
    liveness: Liveness,
}

impl BackendHandle {
    /// Handle to a live store. Instrumentation is recorded.
    pub fn connected(backend: impl KvBackend + 'static) -> Self {
        Self::from_arc(Arc::new(backend), Liveness::Connected)
    }

    /// Handle to a stand-in store. Instrumentation is skipped.
    pub fn detached(backend: impl KvBackend + 'static) -> Self {
        Self::from_arc(Arc::new(backend), Liveness::Detached)
    }

    pub fn from_arc(backend: Arc<dyn KvBackend>, liveness: Liveness) -> Self {
        Self { backend, liveness }
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness
    }

    pub fn is_connected(&self) -> bool {
        self.liveness == Liveness::Connected
    }

    /// The underlying backend.
    pub fn backend(&self) -> &dyn KvBackend {
        self.backend.as_ref()
    }
}

impl fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendHandle")
            .field("liveness", &self.liveness)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    #[test]
    fn test_liveness_flag() {
        let live = BackendHandle::connected(MemoryBackend::new());
        assert!(live.is_connected());
        assert_eq!(live.liveness(), Liveness::Connected);

        let stub = BackendHandle::detached(MemoryBackend::new());
        assert!(!stub.is_connected());
    }

    #[test]
    fn test_clones_share_backend() {
        let handle = BackendHandle::connected(MemoryBackend::new());
        let clone = handle.clone();

        handle.backend().set("k", b"v").unwrap();
        assert_eq!(clone.backend().get("k").unwrap(), Some(b"v".to_vec()));
    }
}
