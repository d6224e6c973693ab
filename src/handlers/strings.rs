//! String commands.

use bytes::{Bytes, BytesMut};

use crate::command::parse_int;
use crate::error::CommandError;
use crate::resp::Frame;
use crate::store::{Keyspace, Value};

/// `GET key`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-string keys.
pub fn handle_get(ks: &Keyspace, key: &Bytes) -> Result<Frame, CommandError> {
    Ok(ks
        .read(key, Value::as_string)?
        .map_or(Frame::Null, |s| Frame::Bulk(s.clone())))
}

/// `SET key value`. Replaces any value and clears the deadline.
pub fn handle_set(ks: &mut Keyspace, key: &Bytes, value: &Bytes) -> Frame {
    ks.insert(key.clone(), Value::String(value.clone()));
    Frame::ok()
}

/// `APPEND key value`. Returns the new length.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-string keys.
pub fn handle_append(ks: &mut Keyspace, key: &Bytes, value: &Bytes) -> Result<Frame, CommandError> {
    let current = ks.write_or_insert(key, empty_string, Value::as_string_mut)?;
    let mut buf = BytesMut::with_capacity(current.len() + value.len());
    buf.extend_from_slice(&current[..]);
    buf.extend_from_slice(value);
    *current = buf.freeze();
    Ok(Frame::count(current.len()))
}

/// `STRLEN key`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-string keys.
pub fn handle_strlen(ks: &Keyspace, key: &Bytes) -> Result<Frame, CommandError> {
    Ok(Frame::count(ks.read(key, Value::as_string)?.map_or(0, Bytes::len)))
}

/// `GETSET key value`. Returns the old value and clears the deadline.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-string keys.
pub fn handle_getset(ks: &mut Keyspace, key: &Bytes, value: &Bytes) -> Result<Frame, CommandError> {
    let old = ks
        .read(key, Value::as_string)?
        .map_or(Frame::Null, |s| Frame::Bulk(s.clone()));
    ks.insert(key.clone(), Value::String(value.clone()));
    Ok(old)
}

/// `INCR`, `INCRBY`, `DECR`, `DECRBY`. A missing key counts as `0`.
///
/// # Errors
///
/// Returns [`CommandError::NotInteger`] if the stored value is not an
/// integer and [`CommandError::Overflow`] if the result does not fit.
pub fn handle_incr_by(ks: &mut Keyspace, key: &Bytes, delta: i64) -> Result<Frame, CommandError> {
    let current = ks.read(key, Value::as_string)?.map(|s| parse_int(s)).transpose()?;
    let next = current
        .unwrap_or(0)
        .checked_add(delta)
        .ok_or(CommandError::Overflow)?;
    let slot = ks.write_or_insert(key, empty_string, Value::as_string_mut)?;
    *slot = Bytes::from(next.to_string());
    Ok(Frame::Integer(next))
}

pub fn handle_mset(ks: &mut Keyspace, pairs: &[(Bytes, Bytes)]) -> Frame {
    for (key, value) in pairs {
        ks.insert(key.clone(), Value::String(value.clone()));
    }
    Frame::ok()
}

/// `MGET`. Missing and non-string keys both yield nil.
#[must_use]
pub fn handle_mget(ks: &Keyspace, keys: &[Bytes]) -> Frame {
    Frame::Array(
        keys.iter()
            .map(|k| match ks.read(k, Value::as_string) {
                Ok(Some(s)) => Frame::Bulk(s.clone()),
                _ => Frame::Null,
            })
            .collect(),
    )
}

const fn empty_string() -> Value {
    Value::String(Bytes::new())
}
