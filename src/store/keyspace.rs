//! The key → entry map with lazy expiry and typed access.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use super::value::{Entry, Value};
use crate::error::CommandError;

/// Every key the server holds.
///
/// Expired entries are invisible to readers. Mutating accessors also delete
/// them on the way past; the active expiry task catches the rest.
#[derive(Debug, Default)]
pub struct Keyspace {
    entries: HashMap<Bytes, Entry>,
}

impl Keyspace {
    /// Creates an empty keyspace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live entry for `key`.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&Entry> {
        let now = Instant::now();
        self.entries.get(key).filter(|e| !e.is_expired(now))
    }

    /// Returns the live entry for `key`, deleting it first if it has expired.
    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Entry> {
        let now = Instant::now();
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(key);
            return None;
        }
        self.entries.get_mut(key)
    }

    /// Stores `value` under `key`, replacing any previous value and TTL.
    pub fn insert(&mut self, key: Bytes, value: Value) {
        self.entries.insert(key, Entry::new(value));
    }

    /// Deletes `key`. Returns `true` if a live key was removed.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        let now = Instant::now();
        self.entries
            .remove(key)
            .is_some_and(|e| !e.is_expired(now))
    }

    /// Deletes `key` if it holds an aggregate with no elements.
    pub fn remove_if_empty(&mut self, key: &[u8]) {
        if self
            .entries
            .get(key)
            .is_some_and(|e| e.value.is_empty_aggregate())
        {
            self.entries.remove(key);
        }
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.values().filter(|e| !e.is_expired(now)).count()
    }

    /// Returns `true` if no live key exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deletes every key.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Deletes every entry whose deadline is at or before `now`.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        before - self.entries.len()
    }

    /// Sets the deadline of a live key. Returns `false` if the key is missing.
    pub fn set_deadline(&mut self, key: &[u8], deadline: Instant) -> bool {
        self.get_mut(key)
            .map(|e| e.expires_at = Some(deadline))
            .is_some()
    }

    /// Clears the deadline of a live key. Returns `true` if one was cleared.
    pub fn persist(&mut self, key: &[u8]) -> bool {
        self.get_mut(key)
            .and_then(|e| e.expires_at.take())
            .is_some()
    }

    /// Remaining lifetime of `key`.
    ///
    /// `None` if the key does not exist, `Some(None)` if it never expires.
    #[must_use]
    pub fn time_to_live(&self, key: &[u8]) -> Option<Option<Duration>> {
        let now = Instant::now();
        self.get(key)
            .map(|e| e.expires_at.map(|deadline| deadline.saturating_duration_since(now)))
    }

    /// Borrows the value under `key` as type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::WrongType`] if the key holds another type.
    pub fn read<T: ?Sized>(
        &self,
        key: &[u8],
        pick: fn(&Value) -> Option<&T>,
    ) -> Result<Option<&T>, CommandError> {
        match self.get(key) {
            None => Ok(None),
            Some(e) => pick(&e.value).map(Some).ok_or(CommandError::WrongType),
        }
    }

    /// Mutably borrows the value under `key` as type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::WrongType`] if the key holds another type.
    pub fn write<T: ?Sized>(
        &mut self,
        key: &[u8],
        pick: fn(&mut Value) -> Option<&mut T>,
    ) -> Result<Option<&mut T>, CommandError> {
        match self.get_mut(key) {
            None => Ok(None),
            Some(e) => pick(&mut e.value).map(Some).ok_or(CommandError::WrongType),
        }
    }

    /// Mutably borrows the value under `key`, creating it with `make` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::WrongType`] if the key holds another type.
    pub fn write_or_insert<T: ?Sized>(
        &mut self,
        key: &Bytes,
        make: fn() -> Value,
        pick: fn(&mut Value) -> Option<&mut T>,
    ) -> Result<&mut T, CommandError> {
        if self.get_mut(key).is_none() {
            self.entries.insert(key.clone(), Entry::new(make()));
        }
        let entry = self
            .entries
            .get_mut(&key[..])
            .ok_or(CommandError::NoSuchKey)?;
        pick(&mut entry.value).ok_or(CommandError::WrongType)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn key(s: &'static str) -> Bytes {
        Bytes::from_static(s.as_bytes())
    }

    #[tokio::test(start_paused = true)]
    async fn expired_keys_are_invisible() {
        let mut ks = Keyspace::new();
        ks.insert(key("k"), Value::String(key("v")));
        assert!(ks.set_deadline(b"k", Instant::now() + Duration::from_secs(1)));
        assert!(ks.get(b"k").is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(ks.get(b"k").is_none());
        assert_eq!(ks.len(), 0);
        assert!(ks.get_mut(b"k").is_none());
        assert_eq!(ks.purge_expired(Instant::now()), 0, "get_mut already purged it");
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired() {
        let mut ks = Keyspace::new();
        ks.insert(key("a"), Value::String(key("1")));
        ks.insert(key("b"), Value::String(key("2")));
        ks.set_deadline(b"a", Instant::now() + Duration::from_millis(10));

        tokio::time::advance(Duration::from_millis(20)).await;
        assert_eq!(ks.purge_expired(Instant::now()), 1);
        assert_eq!(ks.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn insert_clears_ttl() {
        let mut ks = Keyspace::new();
        ks.insert(key("k"), Value::String(key("v")));
        ks.set_deadline(b"k", Instant::now() + Duration::from_secs(5));
        ks.insert(key("k"), Value::String(key("w")));
        assert_eq!(ks.time_to_live(b"k"), Some(None));
    }

    #[test]
    fn typed_access_reports_wrong_type() {
        let mut ks = Keyspace::new();
        ks.insert(key("s"), Value::String(key("v")));
        assert_eq!(
            ks.read(b"s", Value::as_list).unwrap_err(),
            CommandError::WrongType
        );
        assert_eq!(ks.read(b"missing", Value::as_list).unwrap(), None);
        assert_eq!(
            ks.write_or_insert(&key("s"), || Value::List(VecDeque::new()), Value::as_list_mut)
                .unwrap_err(),
            CommandError::WrongType
        );
    }

    #[test]
    fn remove_if_empty_drops_drained_aggregates() {
        let mut ks = Keyspace::new();
        let list = ks
            .write_or_insert(&key("l"), || Value::List(VecDeque::new()), Value::as_list_mut)
            .unwrap();
        list.push_back(key("x"));
        list.pop_back();
        ks.remove_if_empty(b"l");
        assert!(ks.get(b"l").is_none());
    }
}
