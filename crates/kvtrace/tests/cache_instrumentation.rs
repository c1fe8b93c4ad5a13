//! Integration tests for the instrumented cache.
//!
//! These run the cache against real SQLite databases and check counters,
//! history lists, and replay output together.
//!
//! Concurrent callers share one backend without a transaction around the
//! three instrumentation round-trips of a `store`. Counts are only compared
//! with list lengths after all callers have finished.

use kvtrace::{
    replay_to, BackendHandle, Cache, KeyspaceConfig, KvBackend, KvError, MemoryBackend,
    SqliteBackend, StoredValue,
};
use proptest::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

const STORE: &str = KeyspaceConfig::STORE_OPERATION;

/// Create a fresh cache over a SQLite file in a temp directory.
fn create_test_cache() -> (TempDir, Cache) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let backend = SqliteBackend::new(temp_dir.path().join("kvtrace.sqlite"))
        .expect("Failed to open backend");
    let cache = Cache::new(BackendHandle::connected(backend)).expect("Failed to create cache");
    (temp_dir, cache)
}

fn list(cache: &Cache, key: &str) -> Vec<String> {
    cache
        .backend()
        .backend()
        .get_range(key, 0, -1)
        .unwrap()
        .into_iter()
        .map(|raw| String::from_utf8(raw).unwrap())
        .collect()
}

/// Backend whose plain writes always fail; lists and counters work.
struct RejectingWrites {
    inner: MemoryBackend,
}

impl KvBackend for RejectingWrites {
    fn set(&self, _key: &str, _value: &[u8]) -> kvtrace::Result<()> {
        Err(KvError::BackendUnavailable {
            message: "connection reset".into(),
            source: None,
        })
    }

    fn get(&self, key: &str) -> kvtrace::Result<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn exists(&self, key: &str) -> kvtrace::Result<bool> {
        self.inner.exists(key)
    }

    fn increment(&self, key: &str) -> kvtrace::Result<i64> {
        self.inner.increment(key)
    }

    fn get_counter(&self, key: &str) -> kvtrace::Result<Option<i64>> {
        self.inner.get_counter(key)
    }

    fn append(&self, key: &str, value: &[u8]) -> kvtrace::Result<u64> {
        self.inner.append(key, value)
    }

    fn get_range(&self, key: &str, start: i64, end: i64) -> kvtrace::Result<Vec<Vec<u8>>> {
        self.inner.get_range(key, start, end)
    }

    fn flush_all(&self, synchronous: bool) -> kvtrace::Result<()> {
        self.inner.flush_all(synchronous)
    }
}

#[test]
fn test_store_scenario_from_fresh_cache() {
    let (_temp, cache) = create_test_cache();

    let k1 = cache.store("Hello").unwrap();
    let k2 = cache.store(98).unwrap();
    let k3 = cache.store(b"bytes").unwrap();

    assert_ne!(k1, k2);
    assert_ne!(k2, k3);
    assert_ne!(k1, k3);

    assert_eq!(cache.call_count(STORE).unwrap(), 3);
    assert_eq!(
        list(&cache, "Cache.store:inputs"),
        vec!["('Hello',)", "(98,)", "(b'bytes',)"]
    );
    assert_eq!(
        list(&cache, "Cache.store:outputs"),
        vec![k1.to_string(), k2.to_string(), k3.to_string()]
    );

    assert_eq!(cache.retrieve_as_text(&k1).unwrap(), "Hello");
    assert_eq!(cache.retrieve_as_integer(&k2).unwrap(), 98);
    assert_eq!(cache.retrieve(&k3).unwrap(), Some(b"bytes".to_vec()));
}

#[test]
fn test_each_store_advances_counter_and_history() {
    let (_temp, cache) = create_test_cache();

    for value in [
        StoredValue::from("a"),
        StoredValue::from(1),
        StoredValue::from(1.5),
        StoredValue::from(vec![0u8, 1]),
    ] {
        let before = cache.call_history(STORE).unwrap();
        let key = cache.store(value).unwrap();
        let after = cache.call_history(STORE).unwrap();

        assert_eq!(after.call_count, before.call_count + 1);
        assert_eq!(after.inputs.len(), before.inputs.len() + 1);
        assert_eq!(after.outputs.len(), before.outputs.len() + 1);
        assert_eq!(after.outputs.last().unwrap(), key.as_str());
        assert!(after.is_consistent());
    }
}

#[test]
fn test_replay_output_after_scenario() {
    let (_temp, cache) = create_test_cache();

    let k1 = cache.store("Hello").unwrap();
    let k2 = cache.store(98).unwrap();
    let k3 = cache.store(b"bytes").unwrap();

    let mut out = Vec::new();
    replay_to(Some(&cache.store_operation()), &mut out).unwrap();

    let expected = format!(
        "Cache.store was called 3 times:\n\
         Cache.store(*('Hello',)) -> {}\n\
         Cache.store(*(98,)) -> {}\n\
         Cache.store(*(b'bytes',)) -> {}\n",
        k1, k2, k3
    );
    assert_eq!(String::from_utf8(out).unwrap(), expected);
}

#[test]
fn test_backend_failure_propagates_and_leaves_unmatched_input() {
    let backend = RejectingWrites {
        inner: MemoryBackend::new(),
    };
    let cache = Cache::new(BackendHandle::connected(backend)).unwrap();

    let err = cache.store("doomed").unwrap_err();
    assert!(matches!(err, KvError::BackendUnavailable { .. }));
    assert!(err.is_backend_failure());

    let history = cache.call_history(STORE).unwrap();
    assert_eq!(history.call_count, 1);
    assert_eq!(history.inputs, vec!["('doomed',)"]);
    assert!(history.outputs.is_empty());
    assert_eq!(history.unmatched_inputs(), 1);
}

#[test]
fn test_concurrent_stores_settle_consistently() {
    let (_temp, cache) = create_test_cache();
    let cache = Arc::new(cache);
    let threads = 8;
    let per_thread = 10;

    std::thread::scope(|scope| {
        for t in 0..threads {
            let cache = Arc::clone(&cache);
            scope.spawn(move || {
                for i in 0..per_thread {
                    cache.store(format!("{}-{}", t, i)).unwrap();
                }
            });
        }
    });

    let history = cache.call_history(STORE).unwrap();
    let total = (threads * per_thread) as i64;
    assert_eq!(history.call_count, total);
    assert_eq!(history.inputs.len() as i64, total);
    assert_eq!(history.outputs.len() as i64, total);

    for key in &history.outputs {
        assert!(cache.retrieve(key).unwrap().is_some());
    }
}

#[test]
fn test_history_persists_across_attach() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("persist.sqlite");

    {
        let cache = Cache::new(BackendHandle::connected(SqliteBackend::new(&path).unwrap())).unwrap();
        cache.store("first").unwrap();
    }

    let cache = Cache::attach(BackendHandle::connected(SqliteBackend::new(&path).unwrap()));
    cache.store("second").unwrap();

    let history = cache.call_history(STORE).unwrap();
    assert_eq!(history.call_count, 2);
    assert_eq!(history.inputs, vec!["('first',)", "('second',)"]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_text_round_trip(text in ".*") {
        let cache = Cache::new(BackendHandle::connected(SqliteBackend::in_memory().unwrap())).unwrap();
        let key = cache.store(text.as_str()).unwrap();
        prop_assert_eq!(cache.retrieve(&key).unwrap(), Some(text.as_bytes().to_vec()));
        prop_assert_eq!(cache.retrieve_as_text(&key).unwrap(), text);
    }

    #[test]
    fn prop_integer_round_trip(n in any::<i64>()) {
        let cache = Cache::new(BackendHandle::connected(SqliteBackend::in_memory().unwrap())).unwrap();
        let key = cache.store(n).unwrap();
        prop_assert_eq!(cache.retrieve_as_integer(&key).unwrap(), n);
    }

    #[test]
    fn prop_float_round_trip(f in any::<f64>().prop_filter("finite", |f| f.is_finite())) {
        let cache = Cache::new(BackendHandle::connected(SqliteBackend::in_memory().unwrap())).unwrap();
        let key = cache.store(f).unwrap();
        prop_assert_eq!(cache.retrieve_as_float(&key).unwrap(), f);
    }

    #[test]
    fn prop_bytes_round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let cache = Cache::new(BackendHandle::connected(SqliteBackend::in_memory().unwrap())).unwrap();
        let key = cache.store(bytes.clone()).unwrap();
        prop_assert_eq!(cache.retrieve(&key).unwrap(), Some(bytes));
    }
}
