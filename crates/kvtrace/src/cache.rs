//! Cache facade.
//!
//! `store` is the only instrumented operation; retrieval goes straight to the
//! backend.

use crate::backend::BackendHandle;
use crate::config::KeyspaceConfig;
use crate::error::{KvError, Result};
use crate::instrument::{BoundOperation, CallCounter, CallRecorder, Operation};
use crate::replay::CallHistory;
use crate::value::{Key, StoredValue};
use std::fmt::Display;
use tracing::debug;

/// Stores scalar values under freshly minted keys.
///
/// Every `store` is counted under `Cache.store` and recorded in the
/// `Cache.store:inputs` / `Cache.store:outputs` lists. The cache does not
/// serialize concurrent callers; each backend round-trip is atomic on its
/// own, but the three round-trips of one `store` are not.
///
/// # Example
///
/// ```rust,ignore
/// use kvtrace::{BackendHandle, Cache, SqliteBackend};
///
/// let backend = BackendHandle::connected(SqliteBackend::new("cache.sqlite")?);
/// let cache = Cache::new(backend)?; // wipes the keyspace
///
/// let key = cache.store("Hello")?;
/// assert_eq!(cache.retrieve_as_text(&key)?, "Hello");
///
/// kvtrace::replay(Some(&cache.store_operation()));
/// ```
#[derive(Debug)]
pub struct Cache {
    backend: BackendHandle,
    store_op: Operation<StoredValue, Key>,
}

impl Cache {
    /// Create a cache over `backend` and reset it.
    ///
    /// Destructive: everything the backend held is flushed, including call
    /// counters and history from earlier instances.
    pub fn new(backend: BackendHandle) -> Result<Self> {
        let cache = Self::attach(backend);
        cache.reset()?;
        Ok(cache)
    }

    /// Create a cache over `backend` without touching existing data.
    pub fn attach(backend: BackendHandle) -> Self {
        let store_op = Operation::new(KeyspaceConfig::STORE_OPERATION, raw_store)
            .layer(&CallCounter)
            .layer(&CallRecorder);

        Self { backend, store_op }
    }

    /// Flush the backend's whole keyspace, synchronously.
    pub fn reset(&self) -> Result<()> {
        self.backend.backend().flush_all(true)?;
        debug!("Cache backend reset");
        Ok(())
    }

    /// Store `value` under a new key and return the key.
    pub fn store(&self, value: impl Into<StoredValue>) -> Result<Key> {
        self.store_op.invoke(&self.backend, &value.into())
    }

    /// Raw stored bytes for `key`, or `None` if nothing was stored there.
    pub fn retrieve(&self, key: impl AsRef<str>) -> Result<Option<Vec<u8>>> {
        self.backend.backend().get(key.as_ref())
    }

    /// Stored value for `key` passed through `decode`.
    ///
    /// Absence is still `Ok(None)`; a decoder failure becomes
    /// [`KvError::Decode`] naming the key and target type.
    pub fn retrieve_with<T, E, F>(&self, key: impl AsRef<str>, decode: F) -> Result<Option<T>>
    where
        F: FnOnce(&[u8]) -> std::result::Result<T, E>,
        E: Display,
    {
        let key = key.as_ref();
        match self.retrieve(key)? {
            None => Ok(None),
            Some(raw) => decode(&raw).map(Some).map_err(|e| KvError::Decode {
                key: key.to_string(),
                target: short_type_name::<T>(),
                message: e.to_string(),
            }),
        }
    }

    /// Stored value for `key` as UTF-8 text.
    pub fn retrieve_as_text(&self, key: impl AsRef<str>) -> Result<String> {
        let key = key.as_ref();
        self.retrieve_with(key, |raw| String::from_utf8(raw.to_vec()))?
            .ok_or_else(|| absent(key))
    }

    /// Stored value for `key` parsed as a decimal integer.
    pub fn retrieve_as_integer(&self, key: impl AsRef<str>) -> Result<i64> {
        let key = key.as_ref();
        self.retrieve_with(key, |raw| parse_text::<i64>(raw))?
            .ok_or_else(|| absent(key))
    }

    /// Stored value for `key` parsed as a floating point number.
    pub fn retrieve_as_float(&self, key: impl AsRef<str>) -> Result<f64> {
        let key = key.as_ref();
        self.retrieve_with(key, |raw| parse_text::<f64>(raw))?
            .ok_or_else(|| absent(key))
    }

    /// The instrumented store, bound to this cache's backend.
    pub fn store_operation(&self) -> BoundOperation<'_, StoredValue, Key> {
        self.store_op.bind(&self.backend)
    }

    /// Number of recorded calls to `operation`; zero if never called.
    pub fn call_count(&self, operation: &str) -> Result<i64> {
        Ok(self.backend.backend().get_counter(operation)?.unwrap_or(0))
    }

    /// Recorded count and input/output history of `operation`.
    pub fn call_history(&self, operation: &str) -> Result<CallHistory> {
        CallHistory::load(self.backend.backend(), operation)
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }
}

/// Uninstrumented store: mint a key, write the value under it.
fn raw_store(backend: &BackendHandle, value: &StoredValue) -> Result<Key> {
    let key = Key::generate();
    backend.backend().set(key.as_str(), &value.encode())?;
    debug!("Stored {} value under {}", value.kind(), key);
    Ok(key)
}

fn absent(key: &str) -> KvError {
    KvError::AbsentValue {
        key: key.to_string(),
    }
}

fn parse_text<T>(raw: &[u8]) -> std::result::Result<T, String>
where
    T: std::str::FromStr,
    T::Err: Display,
{
    let text = std::str::from_utf8(raw).map_err(|e| e.to_string())?;
    text.trim().parse::<T>().map_err(|e| e.to_string())
}

/// Last path segment of a type name (`alloc::string::String` → `String`).
fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, SqliteBackend};
    use tempfile::TempDir;

    fn create_test_cache() -> (TempDir, Cache) {
        let temp_dir = TempDir::new().unwrap();
        let backend = SqliteBackend::new(temp_dir.path().join("cache.sqlite")).unwrap();
        let cache = Cache::new(BackendHandle::connected(backend)).unwrap();
        (temp_dir, cache)
    }

    #[test]
    fn test_store_and_retrieve() {
        let (_temp, cache) = create_test_cache();

        let key = cache.store("Hello").unwrap();
        assert_eq!(cache.retrieve(&key).unwrap(), Some(b"Hello".to_vec()));
        assert_eq!(cache.retrieve_as_text(&key).unwrap(), "Hello");
    }

    #[test]
    fn test_each_store_gets_a_new_key() {
        let (_temp, cache) = create_test_cache();

        let a = cache.store("same").unwrap();
        let b = cache.store("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_retrieve_missing_key_is_none() {
        let (_temp, cache) = create_test_cache();
        assert_eq!(cache.retrieve("never-stored").unwrap(), None);
        assert_eq!(
            cache
                .retrieve_with("never-stored", |raw| String::from_utf8(raw.to_vec()))
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_empty_value_is_not_absent() {
        let (_temp, cache) = create_test_cache();

        let key = cache.store("").unwrap();
        assert_eq!(cache.retrieve(&key).unwrap(), Some(Vec::new()));
        assert_eq!(cache.retrieve_as_text(&key).unwrap(), "");
    }

    #[test]
    fn test_typed_retrieval() {
        let (_temp, cache) = create_test_cache();

        let int_key = cache.store(98).unwrap();
        let float_key = cache.store(2.5).unwrap();
        assert_eq!(cache.retrieve_as_integer(&int_key).unwrap(), 98);
        assert_eq!(cache.retrieve_as_float(&float_key).unwrap(), 2.5);
        assert_eq!(cache.retrieve_as_float(&int_key).unwrap(), 98.0);
    }

    #[test]
    fn test_retrieve_as_integer_rejects_text() {
        let (_temp, cache) = create_test_cache();

        let key = cache.store("not a number").unwrap();
        let err = cache.retrieve_as_integer(&key).unwrap_err();
        match err {
            KvError::Decode { key: k, target, .. } => {
                assert_eq!(k, key.as_str());
                assert_eq!(target, "i64");
            }
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_absent_distinct_from_malformed() {
        let (_temp, cache) = create_test_cache();

        assert!(matches!(
            cache.retrieve_as_integer("missing"),
            Err(KvError::AbsentValue { .. })
        ));
        assert!(matches!(
            cache.retrieve_as_text("missing"),
            Err(KvError::AbsentValue { .. })
        ));

        let key = cache.store(vec![0xffu8, 0xfe]).unwrap();
        let err = cache.retrieve_as_text(&key).unwrap_err();
        assert!(matches!(err, KvError::Decode { target: "String", .. }));
    }

    #[test]
    fn test_store_is_instrumented() {
        let (_temp, cache) = create_test_cache();

        let key = cache.store("Hello").unwrap();
        assert_eq!(cache.call_count(KeyspaceConfig::STORE_OPERATION).unwrap(), 1);

        let history = cache.call_history(KeyspaceConfig::STORE_OPERATION).unwrap();
        assert_eq!(history.inputs, vec!["('Hello',)"]);
        assert_eq!(history.outputs, vec![key.to_string()]);
    }

    #[test]
    fn test_retrieve_is_not_instrumented() {
        let (_temp, cache) = create_test_cache();

        let key = cache.store(1).unwrap();
        cache.retrieve(&key).unwrap();
        cache.retrieve_as_integer(&key).unwrap();
        assert_eq!(cache.call_count(KeyspaceConfig::STORE_OPERATION).unwrap(), 1);
    }

    #[test]
    fn test_new_resets_attach_keeps() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("shared.sqlite");

        let first = Cache::new(BackendHandle::connected(SqliteBackend::new(&path).unwrap())).unwrap();
        let key = first.store("kept").unwrap();
        drop(first);

        let attached = Cache::attach(BackendHandle::connected(SqliteBackend::new(&path).unwrap()));
        assert_eq!(attached.retrieve_as_text(&key).unwrap(), "kept");
        assert_eq!(attached.call_count(KeyspaceConfig::STORE_OPERATION).unwrap(), 1);
        drop(attached);

        let fresh = Cache::new(BackendHandle::connected(SqliteBackend::new(&path).unwrap())).unwrap();
        assert_eq!(fresh.retrieve(&key).unwrap(), None);
        assert_eq!(fresh.call_count(KeyspaceConfig::STORE_OPERATION).unwrap(), 0);
    }

    #[test]
    fn test_detached_cache_stores_without_instrumentation() {
        let cache = Cache::new(BackendHandle::detached(MemoryBackend::new())).unwrap();

        let key = cache.store("quiet").unwrap();
        assert_eq!(cache.retrieve_as_text(&key).unwrap(), "quiet");
        assert!(!cache
            .backend()
            .backend()
            .exists(KeyspaceConfig::STORE_OPERATION)
            .unwrap());
        assert_eq!(cache.call_count(KeyspaceConfig::STORE_OPERATION).unwrap(), 0);
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<String>(), "String");
        assert_eq!(short_type_name::<i64>(), "i64");
        assert_eq!(short_type_name::<Vec<u8>>(), "Vec<u8>");
    }
}
