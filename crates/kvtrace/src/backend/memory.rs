//! In-process backend.
//!
//! Holds everything in a mutex-guarded map. Used for tests, both behind a
//! connected handle and as a detached stand-in.

use super::traits::{parse_counter, resolve_range, KvBackend};
use crate::error::{KvError, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Clone)]
enum Entry {
    Value(Vec<u8>),
    List(Vec<Vec<u8>>),
}

/// Memory-backed key-value store.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries.lock().map_err(|e| KvError::BackendUnavailable {
            message: format!("Failed to lock memory store: {}", e),
            source: None,
        })
    }
}

impl KvBackend for MemoryBackend {
    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.lock()?
            .insert(key.to_string(), Entry::Value(value.to_vec()));
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.lock()?.get(key) {
            None => Ok(None),
            Some(Entry::Value(value)) => Ok(Some(value.clone())),
            Some(Entry::List(_)) => Err(KvError::read_failed("get", key, "key holds a list")),
        }
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(key))
    }

    fn increment(&self, key: &str) -> Result<i64> {
        let mut entries = self.lock()?;
        let current = match entries.get(key) {
            None => 0,
            Some(Entry::Value(raw)) => parse_counter(raw)
                .ok_or_else(|| KvError::write_failed("increment", key, "value is not an integer"))?,
            Some(Entry::List(_)) => {
                return Err(KvError::write_failed("increment", key, "key holds a list"))
            }
        };

        let next = current
            .checked_add(1)
            .ok_or_else(|| KvError::write_failed("increment", key, "counter overflow"))?;
        entries.insert(key.to_string(), Entry::Value(next.to_string().into_bytes()));
        Ok(next)
    }

    fn get_counter(&self, key: &str) -> Result<Option<i64>> {
        match self.get(key)? {
            None => Ok(None),
            Some(raw) => parse_counter(&raw)
                .map(Some)
                .ok_or_else(|| KvError::read_failed("get_counter", key, "value is not an integer")),
        }
    }

    fn append(&self, key: &str, value: &[u8]) -> Result<u64> {
        let mut entries = self.lock()?;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::List(Vec::new()));

        match entry {
            Entry::List(items) => {
                items.push(value.to_vec());
                Ok(items.len() as u64)
            }
            Entry::Value(_) => Err(KvError::write_failed("append", key, "key holds a value")),
        }
    }

    fn get_range(&self, key: &str, start: i64, end: i64) -> Result<Vec<Vec<u8>>> {
        match self.lock()?.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::List(items)) => Ok(resolve_range(items.len(), start, end)
                .map(|(from, to)| items[from..to].to_vec())
                .unwrap_or_default()),
            Some(Entry::Value(_)) => Err(KvError::read_failed("get_range", key, "key holds a value")),
        }
    }

    fn flush_all(&self, _synchronous: bool) -> Result<()> {
        let mut entries = self.lock()?;
        let removed = entries.len();
        entries.clear();
        debug!("Flushed {} keys from memory store", removed);
        Ok(())
    }
}
