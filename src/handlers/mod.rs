//! Command handlers.
//!
//! Each submodule implements one data type's commands against a
//! [`Keyspace`]. [`execute`] is the write path and needs exclusive access;
//! [`query`] serves read-only commands under a shared borrow. Neither blocks:
//! `BRPOP` is attempted once here and the waiting lives in [`crate::db::Db`].

pub mod hashes;
pub mod keys;
pub mod lists;
pub mod sets;
pub mod strings;
pub mod zsets;

use crate::command::Command;
use crate::error::CommandError;
use crate::resp::Frame;
use crate::store::Keyspace;

/// Runs any command with exclusive access to the keyspace.
#[must_use]
pub fn execute(ks: &mut Keyspace, cmd: &Command) -> Frame {
    let result = match cmd {
        Command::FlushDb => Ok(keys::handle_flushdb(ks)),
        Command::Del(targets) => Ok(keys::handle_del(ks, targets)),
        Command::Expire { key, seconds } => keys::handle_expire(ks, key, *seconds),
        Command::PExpireAt { key, unix_ms } => keys::handle_pexpireat(ks, key, *unix_ms),
        Command::Persist(key) => Ok(keys::handle_persist(ks, key)),

        Command::Set { key, value } => Ok(strings::handle_set(ks, key, value)),
        Command::Append { key, value } => strings::handle_append(ks, key, value),
        Command::GetSet { key, value } => strings::handle_getset(ks, key, value),
        Command::IncrBy { key, delta } => strings::handle_incr_by(ks, key, *delta),
        Command::MSet(pairs) => Ok(strings::handle_mset(ks, pairs)),

        Command::LPush { key, values } => lists::handle_push(ks, key, values, lists::End::Left),
        Command::RPush { key, values } => lists::handle_push(ks, key, values, lists::End::Right),
        Command::LPop(key) => lists::handle_pop(ks, key, lists::End::Left),
        Command::RPop(key) => lists::handle_pop(ks, key, lists::End::Right),
        Command::LSet { key, index, value } => lists::handle_lset(ks, key, *index, value),
        Command::LTrim { key, start, stop } => lists::handle_ltrim(ks, key, *start, *stop),
        Command::BRPop { keys, .. } => lists::handle_brpop_once(ks, keys),

        Command::HSet { key, pairs } => hashes::handle_hset(ks, key, pairs),
        Command::HDel { key, fields } => hashes::handle_hdel(ks, key, fields),

        Command::SAdd { key, members } => sets::handle_sadd(ks, key, members),
        Command::SRem { key, members } => sets::handle_srem(ks, key, members),

        Command::ZAdd { key, entries } => zsets::handle_zadd(ks, key, entries),
        Command::ZRem { key, members } => zsets::handle_zrem(ks, key, members),
        Command::ZRemRangeByScore { key, range } => zsets::handle_zremrangebyscore(ks, key, range),

        read => return query(ks, read),
    };
    into_reply(result)
}

/// Runs a read-only command.
///
/// Write commands are refused; route them through [`execute`].
#[must_use]
pub fn query(ks: &Keyspace, cmd: &Command) -> Frame {
    let result = match cmd {
        Command::Ping(None) => Ok(Frame::Simple("PONG".to_string())),
        Command::Ping(Some(msg)) | Command::Echo(msg) => Ok(Frame::Bulk(msg.clone())),
        Command::Quit => Ok(Frame::ok()),
        Command::CommandDocs => Ok(Frame::Array(Vec::new())),
        Command::DbSize => Ok(Frame::count(ks.len())),

        Command::Exists(targets) => Ok(keys::handle_exists(ks, targets)),
        Command::Ttl(key) => Ok(keys::handle_ttl(ks, key)),
        Command::Type(key) => Ok(keys::handle_type(ks, key)),

        Command::Get(key) => strings::handle_get(ks, key),
        Command::StrLen(key) => strings::handle_strlen(ks, key),
        Command::MGet(targets) => Ok(strings::handle_mget(ks, targets)),

        Command::LLen(key) => lists::handle_llen(ks, key),
        Command::LRange { key, start, stop } => lists::handle_lrange(ks, key, *start, *stop),
        Command::LIndex { key, index } => lists::handle_lindex(ks, key, *index),

        Command::HGet { key, field } => hashes::handle_hget(ks, key, field),
        Command::HGetAll(key) => hashes::handle_hgetall(ks, key),
        Command::HMGet { key, fields } => hashes::handle_hmget(ks, key, fields),
        Command::HExists { key, field } => hashes::handle_hexists(ks, key, field),
        Command::HLen(key) => hashes::handle_hlen(ks, key),
        Command::HKeys(key) => hashes::handle_hkeys(ks, key),
        Command::HVals(key) => hashes::handle_hvals(ks, key),

        Command::SMembers(key) => sets::handle_smembers(ks, key),
        Command::SIsMember { key, member } => sets::handle_sismember(ks, key, member),
        Command::SCard(key) => sets::handle_scard(ks, key),
        Command::SUnion(targets) => sets::handle_sunion(ks, targets),
        Command::SInter(targets) => sets::handle_sinter(ks, targets),
        Command::SDiff(targets) => sets::handle_sdiff(ks, targets),

        Command::ZRange {
            key,
            start,
            stop,
            with_scores,
            reverse,
        } => zsets::handle_zrange(ks, key, *start, *stop, *with_scores, *reverse),
        Command::ZCard(key) => zsets::handle_zcard(ks, key),
        Command::ZScore { key, member } => zsets::handle_zscore(ks, key, member),
        Command::ZRangeByScore {
            key,
            range,
            with_scores,
        } => zsets::handle_zrangebyscore(ks, key, range, *with_scores),
        Command::ZRank {
            key,
            member,
            reverse,
        } => zsets::handle_zrank(ks, key, member, *reverse),
        Command::ZCount { key, range } => zsets::handle_zcount(ks, key, range),

        write => Err(CommandError::InvalidRequest(format!(
            "'{}' needs write access",
            write.name()
        ))),
    };
    into_reply(result)
}

fn into_reply(result: Result<Frame, CommandError>) -> Frame {
    result.unwrap_or_else(|err| Frame::Error(err.to_string()))
}

/// Resolves a Redis-style inclusive `start..=stop` pair against `len`.
///
/// Negative indexes count from the end. Out-of-range ends are clamped;
/// `None` means the range selects nothing.
#[must_use]
pub fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((usize::try_from(start).ok()?, usize::try_from(stop).ok()?))
}

/// Resolves a single possibly-negative index against `len`.
#[must_use]
pub fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { len + index } else { index };
    if (0..len).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}
