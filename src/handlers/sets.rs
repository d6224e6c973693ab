//! Set commands and set algebra.

use bytes::Bytes;
use indexmap::IndexSet;

use crate::error::CommandError;
use crate::resp::Frame;
use crate::store::{Keyspace, Value};

fn empty_set() -> Value {
    Value::Set(IndexSet::new())
}

/// `SADD key member [member ...]`. Returns how many were new.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-set keys.
pub fn handle_sadd(ks: &mut Keyspace, key: &Bytes, members: &[Bytes]) -> Result<Frame, CommandError> {
    let set = ks.write_or_insert(key, empty_set, Value::as_set_mut)?;
    let added = members.iter().filter(|m| set.insert((*m).clone())).count();
    Ok(Frame::count(added))
}

/// `SREM key member [member ...]`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-set keys.
pub fn handle_srem(ks: &mut Keyspace, key: &Bytes, members: &[Bytes]) -> Result<Frame, CommandError> {
    let Some(set) = ks.write(key, Value::as_set_mut)? else {
        return Ok(Frame::Integer(0));
    };
    let removed = members.iter().filter(|m| set.swap_remove(&m[..])).count();
    ks.remove_if_empty(key);
    Ok(Frame::count(removed))
}

/// `SMEMBERS key`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-set keys.
pub fn handle_smembers(ks: &Keyspace, key: &Bytes) -> Result<Frame, CommandError> {
    let members: Vec<Bytes> = ks
        .read(key, Value::as_set)?
        .map(|s| s.iter().cloned().collect())
        .unwrap_or_default();
    Ok(Frame::bulks(members))
}

/// `SISMEMBER key member`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-set keys.
pub fn handle_sismember(ks: &Keyspace, key: &Bytes, member: &Bytes) -> Result<Frame, CommandError> {
    let present = ks
        .read(key, Value::as_set)?
        .is_some_and(|s| s.contains(&member[..]));
    Ok(Frame::bool(present))
}

/// `SCARD key`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-set keys.
pub fn handle_scard(ks: &Keyspace, key: &Bytes) -> Result<Frame, CommandError> {
    Ok(Frame::count(ks.read(key, Value::as_set)?.map_or(0, IndexSet::len)))
}

/// Looks up every key as a set; missing keys are `None`.
fn operands<'a>(
    ks: &'a Keyspace,
    keys: &[Bytes],
) -> Result<Vec<Option<&'a IndexSet<Bytes>>>, CommandError> {
    keys.iter().map(|k| ks.read(k, Value::as_set)).collect()
}

/// `SUNION key [key ...]`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] if any key is not a set.
pub fn handle_sunion(ks: &Keyspace, keys: &[Bytes]) -> Result<Frame, CommandError> {
    let mut out: IndexSet<Bytes> = IndexSet::new();
    for set in operands(ks, keys)?.into_iter().flatten() {
        out.extend(set.iter().cloned());
    }
    Ok(Frame::bulks(out))
}

/// `SINTER key [key ...]`. Any missing key makes the result empty.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] if any key is not a set.
pub fn handle_sinter(ks: &Keyspace, keys: &[Bytes]) -> Result<Frame, CommandError> {
    let sets = operands(ks, keys)?;
    let Some(sets) = sets.into_iter().collect::<Option<Vec<_>>>() else {
        return Ok(Frame::Array(Vec::new()));
    };
    let Some((first, rest)) = sets.split_first() else {
        return Ok(Frame::Array(Vec::new()));
    };
    let members: Vec<Bytes> = first
        .iter()
        .filter(|m| rest.iter().all(|s| s.contains(&m[..])))
        .cloned()
        .collect();
    Ok(Frame::bulks(members))
}

/// `SDIFF key [key ...]`: members of the first set found in none of the others.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] if any key is not a set.
pub fn handle_sdiff(ks: &Keyspace, keys: &[Bytes]) -> Result<Frame, CommandError> {
    let sets = operands(ks, keys)?;
    let Some((Some(first), rest)) = sets.split_first() else {
        return Ok(Frame::Array(Vec::new()));
    };
    let members: Vec<Bytes> = first
        .iter()
        .filter(|m| rest.iter().flatten().all(|s| !s.contains(&m[..])))
        .cloned()
        .collect();
    Ok(Frame::bulks(members))
}
