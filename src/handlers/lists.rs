//! List commands, including the non-blocking half of `BRPOP`.

use std::collections::VecDeque;

use bytes::Bytes;

use super::{normalize_index, normalize_range};
use crate::error::CommandError;
use crate::resp::Frame;
use crate::store::{Keyspace, Value};

/// Which end of a list an operation works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum End {
    Left,
    Right,
}

const fn empty_list() -> Value {
    Value::List(VecDeque::new())
}

/// `LPUSH`/`RPUSH`. Returns the new length.
///
/// `LPUSH k a b c` leaves the list as `c b a`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-list keys.
pub fn handle_push(
    ks: &mut Keyspace,
    key: &Bytes,
    values: &[Bytes],
    end: End,
) -> Result<Frame, CommandError> {
    let list = ks.write_or_insert(key, empty_list, Value::as_list_mut)?;
    for value in values {
        match end {
            End::Left => list.push_front(value.clone()),
            End::Right => list.push_back(value.clone()),
        }
    }
    Ok(Frame::count(list.len()))
}

/// `LPOP`/`RPOP`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-list keys.
pub fn handle_pop(ks: &mut Keyspace, key: &Bytes, end: End) -> Result<Frame, CommandError> {
    Ok(pop(ks, key, end)?.map_or(Frame::Null, Frame::Bulk))
}

fn pop(ks: &mut Keyspace, key: &[u8], end: End) -> Result<Option<Bytes>, CommandError> {
    let Some(list) = ks.write(key, Value::as_list_mut)? else {
        return Ok(None);
    };
    let value = match end {
        End::Left => list.pop_front(),
        End::Right => list.pop_back(),
    };
    ks.remove_if_empty(key);
    Ok(value)
}

/// One non-blocking `BRPOP` attempt over `keys`, in order.
///
/// Replies `[key, value]` from the first non-empty list, or a null array.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] if a key checked before the first
/// non-empty list holds another type.
pub fn handle_brpop_once(ks: &mut Keyspace, keys: &[Bytes]) -> Result<Frame, CommandError> {
    for key in keys {
        if let Some(value) = pop(ks, key, End::Right)? {
            return Ok(Frame::Array(vec![Frame::Bulk(key.clone()), Frame::Bulk(value)]));
        }
    }
    Ok(Frame::NullArray)
}

/// `LLEN`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-list keys.
pub fn handle_llen(ks: &Keyspace, key: &Bytes) -> Result<Frame, CommandError> {
    Ok(Frame::count(ks.read(key, Value::as_list)?.map_or(0, VecDeque::len)))
}

/// `LRANGE key start stop`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-list keys.
pub fn handle_lrange(
    ks: &Keyspace,
    key: &Bytes,
    start: i64,
    stop: i64,
) -> Result<Frame, CommandError> {
    let Some(list) = ks.read(key, Value::as_list)? else {
        return Ok(Frame::Array(Vec::new()));
    };
    let items = normalize_range(start, stop, list.len())
        .map(|(from, to)| list.range(from..=to).cloned().collect::<Vec<_>>())
        .unwrap_or_default();
    Ok(Frame::bulks(items))
}

/// `LINDEX key index`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-list keys.
pub fn handle_lindex(ks: &Keyspace, key: &Bytes, index: i64) -> Result<Frame, CommandError> {
    let value = ks
        .read(key, Value::as_list)?
        .and_then(|list| normalize_index(index, list.len()).and_then(|i| list.get(i)));
    Ok(value.map_or(Frame::Null, |v| Frame::Bulk(v.clone())))
}

/// `LSET key index value`.
///
/// # Errors
///
/// [`CommandError::NoSuchKey`] for a missing key,
/// [`CommandError::IndexOutOfRange`] for a bad index.
pub fn handle_lset(
    ks: &mut Keyspace,
    key: &Bytes,
    index: i64,
    value: &Bytes,
) -> Result<Frame, CommandError> {
    let list = ks
        .write(key, Value::as_list_mut)?
        .ok_or(CommandError::NoSuchKey)?;
    let slot = normalize_index(index, list.len())
        .and_then(|i| list.get_mut(i))
        .ok_or(CommandError::IndexOutOfRange)?;
    *slot = value.clone();
    Ok(Frame::ok())
}

/// `LTRIM key start stop`. Trimming to nothing deletes the key.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-list keys.
pub fn handle_ltrim(
    ks: &mut Keyspace,
    key: &Bytes,
    start: i64,
    stop: i64,
) -> Result<Frame, CommandError> {
    let Some(list) = ks.write(key, Value::as_list_mut)? else {
        return Ok(Frame::ok());
    };
    match normalize_range(start, stop, list.len()) {
        Some((from, to)) => {
            list.truncate(to + 1);
            list.drain(..from);
        }
        None => list.clear(),
    }
    ks.remove_if_empty(key);
    Ok(Frame::ok())
}
