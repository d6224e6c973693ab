//! Keyspace commands: `DEL`, `EXISTS`, `EXPIRE`, `PEXPIREAT`, `PERSIST`,
//! `TTL`, `TYPE`, `FLUSHDB`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio::time::Instant;

use crate::error::CommandError;
use crate::resp::Frame;
use crate::store::Keyspace;

/// Milliseconds since the Unix epoch, per the wall clock.
#[must_use]
pub fn unix_now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

pub fn handle_del(ks: &mut Keyspace, keys: &[Bytes]) -> Frame {
    Frame::count(keys.iter().filter(|k| ks.remove(k)).count())
}

#[must_use]
pub fn handle_exists(ks: &Keyspace, keys: &[Bytes]) -> Frame {
    Frame::count(keys.iter().filter(|k| ks.get(k).is_some()).count())
}

pub fn handle_flushdb(ks: &mut Keyspace) -> Frame {
    ks.clear();
    Frame::ok()
}

/// `EXPIRE key seconds`. A non-positive lifetime deletes the key.
///
/// # Errors
///
/// Returns [`CommandError::InvalidExpireTime`] if the deadline overflows.
pub fn handle_expire(ks: &mut Keyspace, key: &Bytes, seconds: i64) -> Result<Frame, CommandError> {
    let millis = seconds
        .checked_mul(1000)
        .ok_or_else(|| CommandError::InvalidExpireTime("expire".to_string()))?;
    expire_in(ks, key, millis, "expire")
}

/// `PEXPIREAT key unix-ms`. A deadline in the past deletes the key.
///
/// # Errors
///
/// Returns [`CommandError::InvalidExpireTime`] if the deadline overflows.
pub fn handle_pexpireat(
    ks: &mut Keyspace,
    key: &Bytes,
    unix_ms: i64,
) -> Result<Frame, CommandError> {
    let millis = unix_ms.saturating_sub(unix_now_ms());
    expire_in(ks, key, millis, "pexpireat")
}

fn expire_in(
    ks: &mut Keyspace,
    key: &Bytes,
    millis: i64,
    command: &str,
) -> Result<Frame, CommandError> {
    if ks.get_mut(key).is_none() {
        return Ok(Frame::Integer(0));
    }
    let Ok(millis) = u64::try_from(millis) else {
        ks.remove(key);
        return Ok(Frame::Integer(1));
    };
    if millis == 0 {
        ks.remove(key);
        return Ok(Frame::Integer(1));
    }
    let deadline = Instant::now()
        .checked_add(Duration::from_millis(millis))
        .ok_or_else(|| CommandError::InvalidExpireTime(command.to_string()))?;
    Ok(Frame::bool(ks.set_deadline(key, deadline)))
}

pub fn handle_persist(ks: &mut Keyspace, key: &Bytes) -> Frame {
    Frame::bool(ks.persist(key))
}

/// `TTL key`: `-2` if missing, `-1` without a deadline, else whole seconds
/// rounded to nearest.
#[must_use]
pub fn handle_ttl(ks: &Keyspace, key: &Bytes) -> Frame {
    match ks.time_to_live(key) {
        None => Frame::Integer(-2),
        Some(None) => Frame::Integer(-1),
        Some(Some(left)) => {
            let secs = (left.as_millis() + 500) / 1000;
            Frame::Integer(i64::try_from(secs).unwrap_or(i64::MAX))
        }
    }
}

#[must_use]
pub fn handle_type(ks: &Keyspace, key: &Bytes) -> Frame {
    let name = ks.get(key).map_or("none", |e| e.value.type_name());
    Frame::Simple(name.to_string())
}
