//! Values held by the keyspace.

use std::collections::VecDeque;

use bytes::Bytes;
use indexmap::{IndexMap, IndexSet};
use tokio::time::Instant;

use super::sorted_set::SortedSet;

/// A typed value stored under a key.
#[derive(Debug)]
pub enum Value {
    /// Binary-safe string
    String(Bytes),
    /// Double-ended list
    List(VecDeque<Bytes>),
    /// Field/value map, insertion ordered
    Hash(IndexMap<Bytes, Bytes>),
    /// Unordered unique members, insertion ordered for stable replies
    Set(IndexSet<Bytes>),
    /// Score-ordered unique members
    ZSet(SortedSet),
}

impl Value {
    /// Name reported by `TYPE`.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Hash(_) => "hash",
            Self::Set(_) => "set",
            Self::ZSet(_) => "zset",
        }
    }

    /// Returns `true` for an aggregate with no elements left.
    ///
    /// Strings are never empty in this sense; an empty string is a value.
    #[must_use]
    pub fn is_empty_aggregate(&self) -> bool {
        match self {
            Self::String(_) => false,
            Self::List(l) => l.is_empty(),
            Self::Hash(h) => h.is_empty(),
            Self::Set(s) => s.is_empty(),
            Self::ZSet(z) => z.is_empty(),
        }
    }

    pub(crate) const fn as_string(&self) -> Option<&Bytes> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) const fn as_string_mut(&mut self) -> Option<&mut Bytes> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) const fn as_list(&self) -> Option<&VecDeque<Bytes>> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    pub(crate) const fn as_list_mut(&mut self) -> Option<&mut VecDeque<Bytes>> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    pub(crate) const fn as_hash(&self) -> Option<&IndexMap<Bytes, Bytes>> {
        match self {
            Self::Hash(h) => Some(h),
            _ => None,
        }
    }

    pub(crate) const fn as_hash_mut(&mut self) -> Option<&mut IndexMap<Bytes, Bytes>> {
        match self {
            Self::Hash(h) => Some(h),
            _ => None,
        }
    }

    pub(crate) const fn as_set(&self) -> Option<&IndexSet<Bytes>> {
        match self {
            Self::Set(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) const fn as_set_mut(&mut self) -> Option<&mut IndexSet<Bytes>> {
        match self {
            Self::Set(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) const fn as_zset(&self) -> Option<&SortedSet> {
        match self {
            Self::ZSet(z) => Some(z),
            _ => None,
        }
    }

    pub(crate) const fn as_zset_mut(&mut self) -> Option<&mut SortedSet> {
        match self {
            Self::ZSet(z) => Some(z),
            _ => None,
        }
    }
}

/// A value plus its optional expiry deadline.
#[derive(Debug)]
pub struct Entry {
    /// Stored value
    pub value: Value,
    /// When the key stops existing, if ever
    pub expires_at: Option<Instant>,
}

impl Entry {
    /// Wraps a value with no expiry.
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    /// Returns `true` once the deadline has been reached.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}
