//! Sorted set commands.

use bytes::Bytes;

use super::normalize_range;
use crate::error::CommandError;
use crate::resp::Frame;
use crate::store::sorted_set::format_score;
use crate::store::{Keyspace, ScoreRange, SortedSet, Value};

fn empty_zset() -> Value {
    Value::ZSet(SortedSet::new())
}

fn reply_members(members: Vec<(Bytes, f64)>, with_scores: bool) -> Frame {
    if with_scores {
        Frame::bulks(
            members
                .into_iter()
                .flat_map(|(m, s)| [m, Bytes::from(format_score(s))]),
        )
    } else {
        Frame::bulks(members.into_iter().map(|(m, _)| m))
    }
}

/// `ZADD key score member [score member ...]`. Returns how many were new.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-zset keys.
pub fn handle_zadd(
    ks: &mut Keyspace,
    key: &Bytes,
    entries: &[(f64, Bytes)],
) -> Result<Frame, CommandError> {
    let zset = ks.write_or_insert(key, empty_zset, Value::as_zset_mut)?;
    let added = entries
        .iter()
        .filter(|(score, member)| zset.insert(*score, member.clone()))
        .count();
    Ok(Frame::count(added))
}

/// `ZREM key member [member ...]`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-zset keys.
pub fn handle_zrem(ks: &mut Keyspace, key: &Bytes, members: &[Bytes]) -> Result<Frame, CommandError> {
    let Some(zset) = ks.write(key, Value::as_zset_mut)? else {
        return Ok(Frame::Integer(0));
    };
    let removed = members.iter().filter(|m| zset.remove(m)).count();
    ks.remove_if_empty(key);
    Ok(Frame::count(removed))
}

/// `ZRANGE`/`ZREVRANGE key start stop [WITHSCORES]`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-zset keys.
pub fn handle_zrange(
    ks: &Keyspace,
    key: &Bytes,
    start: i64,
    stop: i64,
    with_scores: bool,
    reverse: bool,
) -> Result<Frame, CommandError> {
    let Some(zset) = ks.read(key, Value::as_zset)? else {
        return Ok(Frame::Array(Vec::new()));
    };
    let members = normalize_range(start, stop, zset.len())
        .map(|(from, to)| zset.range_by_rank(from, to, reverse))
        .unwrap_or_default();
    Ok(reply_members(members, with_scores))
}

/// `ZCARD key`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-zset keys.
pub fn handle_zcard(ks: &Keyspace, key: &Bytes) -> Result<Frame, CommandError> {
    Ok(Frame::count(ks.read(key, Value::as_zset)?.map_or(0, SortedSet::len)))
}

/// `ZSCORE key member`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-zset keys.
pub fn handle_zscore(ks: &Keyspace, key: &Bytes, member: &Bytes) -> Result<Frame, CommandError> {
    let score = ks.read(key, Value::as_zset)?.and_then(|z| z.score(member));
    Ok(score.map_or(Frame::Null, |s| Frame::bulk(format_score(s))))
}

/// `ZRANGEBYSCORE key min max [WITHSCORES]`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-zset keys.
pub fn handle_zrangebyscore(
    ks: &Keyspace,
    key: &Bytes,
    range: &ScoreRange,
    with_scores: bool,
) -> Result<Frame, CommandError> {
    let members = match ks.read(key, Value::as_zset)? {
        Some(zset) if !range.is_empty() => zset.range_by_score(range),
        _ => Vec::new(),
    };
    Ok(reply_members(members, with_scores))
}

/// `ZREMRANGEBYSCORE key min max`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-zset keys.
pub fn handle_zremrangebyscore(
    ks: &mut Keyspace,
    key: &Bytes,
    range: &ScoreRange,
) -> Result<Frame, CommandError> {
    let Some(zset) = ks.write(key, Value::as_zset_mut)? else {
        return Ok(Frame::Integer(0));
    };
    let removed = if range.is_empty() {
        0
    } else {
        zset.remove_range_by_score(range)
    };
    ks.remove_if_empty(key);
    Ok(Frame::count(removed))
}

/// `ZRANK`/`ZREVRANK key member`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-zset keys.
pub fn handle_zrank(
    ks: &Keyspace,
    key: &Bytes,
    member: &Bytes,
    reverse: bool,
) -> Result<Frame, CommandError> {
    let rank = ks.read(key, Value::as_zset)?.and_then(|z| {
        if reverse {
            z.rev_rank(member)
        } else {
            z.rank(member)
        }
    });
    Ok(rank.map_or(Frame::Null, Frame::count))
}

/// `ZCOUNT key min max`.
///
/// # Errors
///
/// Returns [`CommandError::WrongType`] for non-zset keys.
pub fn handle_zcount(ks: &Keyspace, key: &Bytes, range: &ScoreRange) -> Result<Frame, CommandError> {
    let count = match ks.read(key, Value::as_zset)? {
        Some(zset) if !range.is_empty() => zset.count(range),
        _ => 0,
    };
    Ok(Frame::count(count))
}
