//! Key-value backend trait.

use crate::error::Result;

/// Protocol of the persistent key-value store the cache delegates to.
///
/// A key holds either a plain value (string, blob, or counter) or an
/// ordered list. All operations are synchronous and individually atomic;
/// sequences of calls are not.
pub trait KvBackend: Send + Sync {
    /// Write a plain value, replacing whatever the key held.
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Read a plain value. Returns `None` if the key doesn't exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Check whether the key holds anything (value or list).
    fn exists(&self, key: &str) -> Result<bool>;

    /// Increment the integer counter at `key`, creating it at 0 first.
    ///
    /// Returns the new value. Fails if the key holds a non-integer value.
    fn increment(&self, key: &str) -> Result<i64>;

    /// Read a counter written by [`KvBackend::increment`].
    fn get_counter(&self, key: &str) -> Result<Option<i64>>;

    /// Append to the list at `key`, creating it if needed.
    ///
    /// Returns the new list length.
    fn append(&self, key: &str, value: &[u8]) -> Result<u64>;

    /// Read list entries between `start` and `end`, both inclusive.
    ///
    /// Negative indices count from the tail (`-1` is the last entry), so
    /// `get_range(key, 0, -1)` returns the whole list. A missing key reads
    /// as an empty list.
    fn get_range(&self, key: &str, start: i64, end: i64) -> Result<Vec<Vec<u8>>>;

    /// Remove every key.
    ///
    /// With `synchronous` set the call returns only after the removal is
    /// durable.
    fn flush_all(&self, synchronous: bool) -> Result<()>;
}

/// Resolve inclusive, possibly negative list bounds against a list of
/// length `len`. Returns the half-open `[from, to)` slice bounds, or `None`
/// when the range selects nothing.
pub(crate) fn resolve_range(len: usize, start: i64, end: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let end = if end < 0 { len + end } else { end.min(len - 1) };

    if len == 0 || start > end || start >= len {
        return None;
    }

    Some((start as usize, end as usize + 1))
}

/// Parse a counter stored as decimal text.
pub(crate) fn parse_counter(raw: &[u8]) -> Option<i64> {
    std::str::from_utf8(raw).ok()?.trim().parse().ok()
}
