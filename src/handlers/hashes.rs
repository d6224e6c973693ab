//! Hash commands.

use bytes::Bytes;
use indexmap::IndexMap;

use crate::error::CommandError;
use crate::resp::Frame;
use crate::store::{Keyspace, Value};

fn empty_hash() -> Value {
    Value::Hash(IndexMap::new())
}

/// `HSET key field value [field value ...]`. Returns the number of new fields.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-hash keys.
pub fn handle_hset(
    ks: &mut Keyspace,
    key: &Bytes,
    pairs: &[(Bytes, Bytes)],
) -> Result<Frame, CommandError> {
    let hash = ks.write_or_insert(key, empty_hash, Value::as_hash_mut)?;
    let added = pairs
        .iter()
        .filter(|(field, value)| hash.insert(field.clone(), value.clone()).is_none())
        .count();
    Ok(Frame::count(added))
}

/// `HDEL key field [field ...]`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-hash keys.
pub fn handle_hdel(ks: &mut Keyspace, key: &Bytes, fields: &[Bytes]) -> Result<Frame, CommandError> {
    let Some(hash) = ks.write(key, Value::as_hash_mut)? else {
        return Ok(Frame::Integer(0));
    };
    let removed = fields
        .iter()
        .filter(|f| hash.swap_remove(&f[..]).is_some())
        .count();
    ks.remove_if_empty(key);
    Ok(Frame::count(removed))
}

/// `HGET key field`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-hash keys.
pub fn handle_hget(ks: &Keyspace, key: &Bytes, field: &Bytes) -> Result<Frame, CommandError> {
    let value = ks
        .read(key, Value::as_hash)?
        .and_then(|h| h.get(&field[..]));
    Ok(value.map_or(Frame::Null, |v| Frame::Bulk(v.clone())))
}

/// `HGETALL key`: fields and values interleaved.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-hash keys.
pub fn handle_hgetall(ks: &Keyspace, key: &Bytes) -> Result<Frame, CommandError> {
    let Some(hash) = ks.read(key, Value::as_hash)? else {
        return Ok(Frame::Array(Vec::new()));
    };
    Ok(Frame::bulks(
        hash.iter().flat_map(|(f, v)| [f.clone(), v.clone()]),
    ))
}

/// `HMGET key field [field ...]`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-hash keys.
pub fn handle_hmget(ks: &Keyspace, key: &Bytes, fields: &[Bytes]) -> Result<Frame, CommandError> {
    let hash = ks.read(key, Value::as_hash)?;
    Ok(Frame::Array(
        fields
            .iter()
            .map(|f| {
                hash.and_then(|h| h.get(&f[..]))
                    .map_or(Frame::Null, |v| Frame::Bulk(v.clone()))
            })
            .collect(),
    ))
}

/// `HEXISTS key field`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-hash keys.
pub fn handle_hexists(ks: &Keyspace, key: &Bytes, field: &Bytes) -> Result<Frame, CommandError> {
    let present = ks
        .read(key, Value::as_hash)?
        .is_some_and(|h| h.contains_key(&field[..]));
    Ok(Frame::bool(present))
}

/// `HLEN key`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-hash keys.
pub fn handle_hlen(ks: &Keyspace, key: &Bytes) -> Result<Frame, CommandError> {
    Ok(Frame::count(ks.read(key, Value::as_hash)?.map_or(0, IndexMap::len)))
}

/// `HKEYS key`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-hash keys.
pub fn handle_hkeys(ks: &Keyspace, key: &Bytes) -> Result<Frame, CommandError> {
    let keys: Vec<Bytes> = ks
        .read(key, Value::as_hash)?
        .map(|h| h.keys().cloned().collect())
        .unwrap_or_default();
    Ok(Frame::bulks(keys))
}

/// `HVALS key`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-hash keys.
pub fn handle_hvals(ks: &Keyspace, key: &Bytes) -> Result<Frame, CommandError> {
    let values: Vec<Bytes> = ks
        .read(key, Value::as_hash)?
        .map(|h| h.values().cloned().collect())
        .unwrap_or_default();
    Ok(Frame::bulks(values))
}
