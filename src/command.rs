//! Request decoding.
//!
//! A client request arrives as a RESP array of strings. [`Command::try_from`]
//! turns it into a typed [`Command`], checking arity and argument syntax so
//! the handlers only ever see well-formed input.

use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use crate::error::CommandError;
use crate::resp::Frame;
use crate::store::sorted_set::{ScoreBound, ScoreRange, format_score, parse_score};

/// Every command name the server understands, lowercase.
pub const COMMAND_NAMES: &[&str] = &[
    "ping",
    "echo",
    "quit",
    "command",
    "dbsize",
    "flushdb",
    "del",
    "exists",
    "expire",
    "pexpireat",
    "persist",
    "ttl",
    "type",
    "get",
    "set",
    "append",
    "strlen",
    "getset",
    "incr",
    "incrby",
    "decr",
    "decrby",
    "mset",
    "mget",
    "lpush",
    "rpush",
    "lpop",
    "rpop",
    "llen",
    "lrange",
    "lindex",
    "lset",
    "ltrim",
    "brpop",
    "hset",
    "hget",
    "hdel",
    "hgetall",
    "hmget",
    "hexists",
    "hlen",
    "hkeys",
    "hvals",
    "sadd",
    "srem",
    "smembers",
    "sismember",
    "scard",
    "sunion",
    "sinter",
    "sdiff",
    "zadd",
    "zrem",
    "zrange",
    "zrevrange",
    "zcard",
    "zscore",
    "zrangebyscore",
    "zremrangebyscore",
    "zrank",
    "zrevrank",
    "zcount",
];

/// A decoded client request.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Connection and server
    Ping(Option<Bytes>),
    Echo(Bytes),
    Quit,
    CommandDocs,
    DbSize,
    FlushDb,

    // Keyspace
    Del(Vec<Bytes>),
    Exists(Vec<Bytes>),
    Expire { key: Bytes, seconds: i64 },
    PExpireAt { key: Bytes, unix_ms: i64 },
    Persist(Bytes),
    Ttl(Bytes),
    Type(Bytes),

    // Strings
    Get(Bytes),
    Set { key: Bytes, value: Bytes },
    Append { key: Bytes, value: Bytes },
    StrLen(Bytes),
    GetSet { key: Bytes, value: Bytes },
    IncrBy { key: Bytes, delta: i64 },
    MSet(Vec<(Bytes, Bytes)>),
    MGet(Vec<Bytes>),

    // Lists
    LPush { key: Bytes, values: Vec<Bytes> },
    RPush { key: Bytes, values: Vec<Bytes> },
    LPop(Bytes),
    RPop(Bytes),
    LLen(Bytes),
    LRange { key: Bytes, start: i64, stop: i64 },
    LIndex { key: Bytes, index: i64 },
    LSet { key: Bytes, index: i64, value: Bytes },
    LTrim { key: Bytes, start: i64, stop: i64 },
    /// `timeout: None` blocks until a value arrives.
    BRPop {
        keys: Vec<Bytes>,
        timeout: Option<Duration>,
    },

    // Hashes
    HSet { key: Bytes, pairs: Vec<(Bytes, Bytes)> },
    HGet { key: Bytes, field: Bytes },
    HDel { key: Bytes, fields: Vec<Bytes> },
    HGetAll(Bytes),
    HMGet { key: Bytes, fields: Vec<Bytes> },
    HExists { key: Bytes, field: Bytes },
    HLen(Bytes),
    HKeys(Bytes),
    HVals(Bytes),

    // Sets
    SAdd { key: Bytes, members: Vec<Bytes> },
    SRem { key: Bytes, members: Vec<Bytes> },
    SMembers(Bytes),
    SIsMember { key: Bytes, member: Bytes },
    SCard(Bytes),
    SUnion(Vec<Bytes>),
    SInter(Vec<Bytes>),
    SDiff(Vec<Bytes>),

    // Sorted sets
    ZAdd { key: Bytes, entries: Vec<(f64, Bytes)> },
    ZRem { key: Bytes, members: Vec<Bytes> },
    ZRange {
        key: Bytes,
        start: i64,
        stop: i64,
        with_scores: bool,
        reverse: bool,
    },
    ZCard(Bytes),
    ZScore { key: Bytes, member: Bytes },
    ZRangeByScore {
        key: Bytes,
        range: ScoreRange,
        with_scores: bool,
    },
    ZRemRangeByScore { key: Bytes, range: ScoreRange },
    ZRank {
        key: Bytes,
        member: Bytes,
        reverse: bool,
    },
    ZCount { key: Bytes, range: ScoreRange },
}

impl Command {
    /// Lowercase command name, as used in error replies and metric labels.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ping(_) => "ping",
            Self::Echo(_) => "echo",
            Self::Quit => "quit",
            Self::CommandDocs => "command",
            Self::DbSize => "dbsize",
            Self::FlushDb => "flushdb",
            Self::Del(_) => "del",
            Self::Exists(_) => "exists",
            Self::Expire { .. } => "expire",
            Self::PExpireAt { .. } => "pexpireat",
            Self::Persist(_) => "persist",
            Self::Ttl(_) => "ttl",
            Self::Type(_) => "type",
            Self::Get(_) => "get",
            Self::Set { .. } => "set",
            Self::Append { .. } => "append",
            Self::StrLen(_) => "strlen",
            Self::GetSet { .. } => "getset",
            Self::IncrBy { .. } => "incrby",
            Self::MSet(_) => "mset",
            Self::MGet(_) => "mget",
            Self::LPush { .. } => "lpush",
            Self::RPush { .. } => "rpush",
            Self::LPop(_) => "lpop",
            Self::RPop(_) => "rpop",
            Self::LLen(_) => "llen",
            Self::LRange { .. } => "lrange",
            Self::LIndex { .. } => "lindex",
            Self::LSet { .. } => "lset",
            Self::LTrim { .. } => "ltrim",
            Self::BRPop { .. } => "brpop",
            Self::HSet { .. } => "hset",
            Self::HGet { .. } => "hget",
            Self::HDel { .. } => "hdel",
            Self::HGetAll(_) => "hgetall",
            Self::HMGet { .. } => "hmget",
            Self::HExists { .. } => "hexists",
            Self::HLen(_) => "hlen",
            Self::HKeys(_) => "hkeys",
            Self::HVals(_) => "hvals",
            Self::SAdd { .. } => "sadd",
            Self::SRem { .. } => "srem",
            Self::SMembers(_) => "smembers",
            Self::SIsMember { .. } => "sismember",
            Self::SCard(_) => "scard",
            Self::SUnion(_) => "sunion",
            Self::SInter(_) => "sinter",
            Self::SDiff(_) => "sdiff",
            Self::ZAdd { .. } => "zadd",
            Self::ZRem { .. } => "zrem",
            Self::ZRange { reverse: false, .. } => "zrange",
            Self::ZRange { reverse: true, .. } => "zrevrange",
            Self::ZCard(_) => "zcard",
            Self::ZScore { .. } => "zscore",
            Self::ZRangeByScore { .. } => "zrangebyscore",
            Self::ZRemRangeByScore { .. } => "zremrangebyscore",
            Self::ZRank { reverse: false, .. } => "zrank",
            Self::ZRank { reverse: true, .. } => "zrevrank",
            Self::ZCount { .. } => "zcount",
        }
    }

    /// Returns `true` if the command may modify the keyspace.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(
            self,
            Self::FlushDb
                | Self::Del(_)
                | Self::Expire { .. }
                | Self::PExpireAt { .. }
                | Self::Persist(_)
                | Self::Set { .. }
                | Self::Append { .. }
                | Self::GetSet { .. }
                | Self::IncrBy { .. }
                | Self::MSet(_)
                | Self::LPush { .. }
                | Self::RPush { .. }
                | Self::LPop(_)
                | Self::RPop(_)
                | Self::LSet { .. }
                | Self::LTrim { .. }
                | Self::BRPop { .. }
                | Self::HSet { .. }
                | Self::HDel { .. }
                | Self::SAdd { .. }
                | Self::SRem { .. }
                | Self::ZAdd { .. }
                | Self::ZRem { .. }
                | Self::ZRemRangeByScore { .. }
        )
    }

    /// Key that blocked `BRPOP` readers should be woken for.
    #[must_use]
    pub const fn pushed_key(&self) -> Option<&Bytes> {
        match self {
            Self::LPush { key, .. } | Self::RPush { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Canonical request form, as written to the append-only file.
    #[must_use]
    pub fn to_frame(&self) -> Frame {
        let mut parts: Vec<Bytes> = vec![Bytes::from(self.name().to_ascii_uppercase())];
        match self {
            Self::Ping(msg) => parts.extend(msg.iter().cloned()),
            Self::Quit | Self::CommandDocs | Self::DbSize | Self::FlushDb => {}
            Self::Echo(key)
            | Self::Persist(key)
            | Self::Ttl(key)
            | Self::Type(key)
            | Self::Get(key)
            | Self::StrLen(key)
            | Self::LPop(key)
            | Self::RPop(key)
            | Self::LLen(key)
            | Self::HGetAll(key)
            | Self::HLen(key)
            | Self::HKeys(key)
            | Self::HVals(key)
            | Self::SMembers(key)
            | Self::SCard(key)
            | Self::ZCard(key) => parts.push(key.clone()),
            Self::Del(keys)
            | Self::Exists(keys)
            | Self::MGet(keys)
            | Self::SUnion(keys)
            | Self::SInter(keys)
            | Self::SDiff(keys) => parts.extend(keys.iter().cloned()),
            Self::Expire { key, seconds: n }
            | Self::PExpireAt { key, unix_ms: n }
            | Self::IncrBy { key, delta: n }
            | Self::LIndex { key, index: n } => {
                parts.push(key.clone());
                parts.push(int_arg(*n));
            }
            Self::Set { key, value }
            | Self::Append { key, value }
            | Self::GetSet { key, value }
            | Self::HGet { key, field: value }
            | Self::HExists { key, field: value }
            | Self::SIsMember { key, member: value }
            | Self::ZScore { key, member: value }
            | Self::ZRank { key, member: value, .. } => {
                parts.push(key.clone());
                parts.push(value.clone());
            }
            Self::MSet(pairs) => {
                for (k, v) in pairs {
                    parts.push(k.clone());
                    parts.push(v.clone());
                }
            }
            Self::LPush { key, values: items }
            | Self::RPush { key, values: items }
            | Self::HDel { key, fields: items }
            | Self::HMGet { key, fields: items }
            | Self::SAdd { key, members: items }
            | Self::SRem { key, members: items }
            | Self::ZRem { key, members: items } => {
                parts.push(key.clone());
                parts.extend(items.iter().cloned());
            }
            Self::LRange { key, start, stop } | Self::LTrim { key, start, stop } => {
                parts.push(key.clone());
                parts.push(int_arg(*start));
                parts.push(int_arg(*stop));
            }
            Self::LSet { key, index, value } => {
                parts.push(key.clone());
                parts.push(int_arg(*index));
                parts.push(value.clone());
            }
            Self::BRPop { keys, timeout } => {
                parts.extend(keys.iter().cloned());
                let secs = timeout.map_or(0.0, |t| t.as_secs_f64());
                parts.push(Bytes::from(format_score(secs)));
            }
            Self::HSet { key, pairs } => {
                parts.push(key.clone());
                for (f, v) in pairs {
                    parts.push(f.clone());
                    parts.push(v.clone());
                }
            }
            Self::ZAdd { key, entries } => {
                parts.push(key.clone());
                for (score, member) in entries {
                    parts.push(Bytes::from(format_score(*score)));
                    parts.push(member.clone());
                }
            }
            Self::ZRange {
                key,
                start,
                stop,
                with_scores,
                ..
            } => {
                parts.push(key.clone());
                parts.push(int_arg(*start));
                parts.push(int_arg(*stop));
                if *with_scores {
                    parts.push(Bytes::from_static(b"WITHSCORES"));
                }
            }
            Self::ZRangeByScore {
                key,
                range,
                with_scores,
            } => {
                parts.push(key.clone());
                parts.push(Bytes::from(range.min.to_string()));
                parts.push(Bytes::from(range.max.to_string()));
                if *with_scores {
                    parts.push(Bytes::from_static(b"WITHSCORES"));
                }
            }
            Self::ZRemRangeByScore { key, range } | Self::ZCount { key, range } => {
                parts.push(key.clone());
                parts.push(Bytes::from(range.min.to_string()));
                parts.push(Bytes::from(range.max.to_string()));
            }
        }
        Frame::bulks(parts)
    }
}

fn int_arg(n: i64) -> Bytes {
    Bytes::from(n.to_string())
}

impl TryFrom<Frame> for Command {
    type Error = CommandError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let Frame::Array(items) = frame else {
            return Err(CommandError::InvalidRequest(
                "request must be an array of bulk strings".to_string(),
            ));
        };

        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Frame::Bulk(b) => parts.push(b),
                Frame::Simple(s) => parts.push(Bytes::from(s)),
                _ => {
                    return Err(CommandError::InvalidRequest(
                        "request must be an array of bulk strings".to_string(),
                    ));
                }
            }
        }

        let mut parts = parts.into_iter();
        let Some(raw_name) = parts.next() else {
            return Err(CommandError::InvalidRequest("empty command".to_string()));
        };
        let name = String::from_utf8_lossy(&raw_name).to_ascii_lowercase();
        let mut args = Args {
            name: &name,
            items: parts.collect(),
            pos: 0,
        };

        let command = match name.as_str() {
            "ping" => {
                args.at_most(1)?;
                Self::Ping(args.optional())
            }
            "echo" => {
                args.exact(1)?;
                Self::Echo(args.next()?)
            }
            "quit" => Self::Quit,
            "command" => Self::CommandDocs,
            "dbsize" => {
                args.exact(0)?;
                Self::DbSize
            }
            "flushdb" => {
                args.exact(0)?;
                Self::FlushDb
            }

            "del" => {
                args.at_least(1)?;
                Self::Del(args.rest())
            }
            "exists" => {
                args.at_least(1)?;
                Self::Exists(args.rest())
            }
            "expire" => {
                args.exact(2)?;
                Self::Expire {
                    key: args.next()?,
                    seconds: args.int()?,
                }
            }
            "pexpireat" => {
                args.exact(2)?;
                Self::PExpireAt {
                    key: args.next()?,
                    unix_ms: args.int()?,
                }
            }
            "persist" => Self::Persist(args.single()?),
            "ttl" => Self::Ttl(args.single()?),
            "type" => Self::Type(args.single()?),

            "get" => Self::Get(args.single()?),
            "set" => {
                args.exact(2)?;
                Self::Set {
                    key: args.next()?,
                    value: args.next()?,
                }
            }
            "append" => {
                args.exact(2)?;
                Self::Append {
                    key: args.next()?,
                    value: args.next()?,
                }
            }
            "strlen" => Self::StrLen(args.single()?),
            "getset" => {
                args.exact(2)?;
                Self::GetSet {
                    key: args.next()?,
                    value: args.next()?,
                }
            }
            "incr" => Self::IncrBy {
                key: args.single()?,
                delta: 1,
            },
            "decr" => Self::IncrBy {
                key: args.single()?,
                delta: -1,
            },
            "incrby" => {
                args.exact(2)?;
                Self::IncrBy {
                    key: args.next()?,
                    delta: args.int()?,
                }
            }
            "decrby" => {
                args.exact(2)?;
                let key = args.next()?;
                let delta = args.int()?.checked_neg().ok_or(CommandError::Overflow)?;
                Self::IncrBy { key, delta }
            }
            "mset" => {
                args.pairs()?;
                Self::MSet(args.rest_pairs())
            }
            "mget" => {
                args.at_least(1)?;
                Self::MGet(args.rest())
            }

            "lpush" | "rpush" => {
                args.at_least(2)?;
                let key = args.next()?;
                let values = args.rest();
                if name == "lpush" {
                    Self::LPush { key, values }
                } else {
                    Self::RPush { key, values }
                }
            }
            "lpop" => Self::LPop(args.single()?),
            "rpop" => Self::RPop(args.single()?),
            "llen" => Self::LLen(args.single()?),
            "lrange" | "ltrim" => {
                args.exact(3)?;
                let key = args.next()?;
                let start = args.int()?;
                let stop = args.int()?;
                if name == "lrange" {
                    Self::LRange { key, start, stop }
                } else {
                    Self::LTrim { key, start, stop }
                }
            }
            "lindex" => {
                args.exact(2)?;
                Self::LIndex {
                    key: args.next()?,
                    index: args.int()?,
                }
            }
            "lset" => {
                args.exact(3)?;
                Self::LSet {
                    key: args.next()?,
                    index: args.int()?,
                    value: args.next()?,
                }
            }
            "brpop" => {
                args.at_least(2)?;
                let mut keys = args.rest();
                let raw_timeout = keys.pop().ok_or_else(|| args.arity())?;
                Self::BRPop {
                    keys,
                    timeout: parse_timeout(&raw_timeout)?,
                }
            }

            "hset" => {
                args.at_least(3)?;
                let key = args.next()?;
                args.pairs()?;
                Self::HSet {
                    key,
                    pairs: args.rest_pairs(),
                }
            }
            "hget" | "hexists" => {
                args.exact(2)?;
                let key = args.next()?;
                let field = args.next()?;
                if name == "hget" {
                    Self::HGet { key, field }
                } else {
                    Self::HExists { key, field }
                }
            }
            "hdel" | "hmget" => {
                args.at_least(2)?;
                let key = args.next()?;
                let fields = args.rest();
                if name == "hdel" {
                    Self::HDel { key, fields }
                } else {
                    Self::HMGet { key, fields }
                }
            }
            "hgetall" => Self::HGetAll(args.single()?),
            "hlen" => Self::HLen(args.single()?),
            "hkeys" => Self::HKeys(args.single()?),
            "hvals" => Self::HVals(args.single()?),

            "sadd" | "srem" => {
                args.at_least(2)?;
                let key = args.next()?;
                let members = args.rest();
                if name == "sadd" {
                    Self::SAdd { key, members }
                } else {
                    Self::SRem { key, members }
                }
            }
            "smembers" => Self::SMembers(args.single()?),
            "sismember" => {
                args.exact(2)?;
                Self::SIsMember {
                    key: args.next()?,
                    member: args.next()?,
                }
            }
            "scard" => Self::SCard(args.single()?),
            "sunion" | "sinter" | "sdiff" => {
                args.at_least(1)?;
                let keys = args.rest();
                match name.as_str() {
                    "sunion" => Self::SUnion(keys),
                    "sinter" => Self::SInter(keys),
                    _ => Self::SDiff(keys),
                }
            }

            "zadd" => {
                args.at_least(3)?;
                let key = args.next()?;
                if args.remaining() % 2 != 0 {
                    return Err(CommandError::Syntax);
                }
                let mut entries = Vec::with_capacity(args.remaining() / 2);
                while args.remaining() > 0 {
                    let score = parse_score(&args.next()?).ok_or(CommandError::NotFloat)?;
                    entries.push((score, args.next()?));
                }
                Self::ZAdd { key, entries }
            }
            "zrem" => {
                args.at_least(2)?;
                Self::ZRem {
                    key: args.next()?,
                    members: args.rest(),
                }
            }
            "zrange" | "zrevrange" => {
                args.at_least(3)?;
                args.at_most(4)?;
                let key = args.next()?;
                let start = args.int()?;
                let stop = args.int()?;
                Self::ZRange {
                    key,
                    start,
                    stop,
                    with_scores: args.with_scores()?,
                    reverse: name == "zrevrange",
                }
            }
            "zcard" => Self::ZCard(args.single()?),
            "zscore" => {
                args.exact(2)?;
                Self::ZScore {
                    key: args.next()?,
                    member: args.next()?,
                }
            }
            "zrangebyscore" => {
                args.at_least(3)?;
                args.at_most(4)?;
                let key = args.next()?;
                let range = args.score_range()?;
                Self::ZRangeByScore {
                    key,
                    range,
                    with_scores: args.with_scores()?,
                }
            }
            "zremrangebyscore" | "zcount" => {
                args.exact(3)?;
                let key = args.next()?;
                let range = args.score_range()?;
                if name == "zcount" {
                    Self::ZCount { key, range }
                } else {
                    Self::ZRemRangeByScore { key, range }
                }
            }
            "zrank" | "zrevrank" => {
                args.exact(2)?;
                Self::ZRank {
                    key: args.next()?,
                    member: args.next()?,
                    reverse: name == "zrevrank",
                }
            }

            _ => return Err(unknown_command(&raw_name, args.rest())),
        };

        Ok(command)
    }
}

/// Cursor over the arguments that follow the command name.
struct Args<'a> {
    name: &'a str,
    items: Vec<Bytes>,
    pos: usize,
}

impl Args<'_> {
    fn arity(&self) -> CommandError {
        CommandError::WrongArity(self.name.to_string())
    }

    const fn remaining(&self) -> usize {
        self.items.len() - self.pos
    }

    fn exact(&self, n: usize) -> Result<(), CommandError> {
        if self.remaining() == n {
            Ok(())
        } else {
            Err(self.arity())
        }
    }

    fn at_least(&self, n: usize) -> Result<(), CommandError> {
        if self.remaining() >= n {
            Ok(())
        } else {
            Err(self.arity())
        }
    }

    fn at_most(&self, n: usize) -> Result<(), CommandError> {
        if self.remaining() <= n {
            Ok(())
        } else {
            Err(self.arity())
        }
    }

    /// At least one pair remains and the count is even.
    fn pairs(&self) -> Result<(), CommandError> {
        if self.remaining() >= 2 && self.remaining() % 2 == 0 {
            Ok(())
        } else {
            Err(self.arity())
        }
    }

    fn next(&mut self) -> Result<Bytes, CommandError> {
        let item = self.items.get(self.pos).cloned().ok_or_else(|| self.arity())?;
        self.pos += 1;
        Ok(item)
    }

    fn optional(&mut self) -> Option<Bytes> {
        self.next().ok()
    }

    fn single(&mut self) -> Result<Bytes, CommandError> {
        self.exact(1)?;
        self.next()
    }

    fn int(&mut self) -> Result<i64, CommandError> {
        parse_int(&self.next()?)
    }

    fn rest(&mut self) -> Vec<Bytes> {
        let rest = self.items.split_off(self.pos.min(self.items.len()));
        self.pos = self.items.len();
        rest
    }

    fn rest_pairs(&mut self) -> Vec<(Bytes, Bytes)> {
        let rest = self.rest();
        rest.chunks_exact(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect()
    }

    fn score_range(&mut self) -> Result<ScoreRange, CommandError> {
        let min = ScoreBound::parse(&self.next()?).ok_or(CommandError::InvalidScoreRange)?;
        let max = ScoreBound::parse(&self.next()?).ok_or(CommandError::InvalidScoreRange)?;
        Ok(ScoreRange::new(min, max))
    }

    /// Consumes a trailing `WITHSCORES` option if present.
    fn with_scores(&mut self) -> Result<bool, CommandError> {
        match self.optional() {
            None => Ok(false),
            Some(opt) if opt.eq_ignore_ascii_case(b"withscores") => Ok(true),
            Some(_) => Err(CommandError::Syntax),
        }
    }
}

/// Parses a base-10 signed 64-bit integer argument.
///
/// # Errors
///
/// Returns [`CommandError::NotInteger`] for anything else.
pub fn parse_int(raw: &[u8]) -> Result<i64, CommandError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(CommandError::NotInteger)
}

fn parse_timeout(raw: &[u8]) -> Result<Option<Duration>, CommandError> {
    let secs = std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|s| s.is_finite())
        .ok_or(CommandError::InvalidTimeout)?;
    if secs < 0.0 {
        return Err(CommandError::NegativeTimeout);
    }
    if secs == 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|_| CommandError::InvalidTimeout)
}

fn unknown_command(raw_name: &[u8], args: Vec<Bytes>) -> CommandError {
    let name = String::from_utf8_lossy(raw_name).into_owned();
    let lower = name.to_ascii_lowercase();
    if let Some(close) = COMMAND_NAMES
        .iter()
        .map(|known| (known, strsim::jaro_winkler(&lower, known)))
        .filter(|(_, score)| *score > 0.85)
        .max_by(|a, b| a.1.total_cmp(&b.1))
    {
        debug!(command = %name, suggestion = %close.0, "unknown command");
    }

    let mut quoted = String::new();
    for arg in &args {
        if quoted.len() >= 128 {
            break;
        }
        quoted.push('\'');
        quoted.push_str(&String::from_utf8_lossy(arg));
        quoted.push_str("' ");
    }
    CommandError::UnknownCommand { name, args: quoted }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(parts: &[&str]) -> Frame {
        Frame::bulks(parts.iter().map(|p| Bytes::copy_from_slice(p.as_bytes())))
    }

    fn parse(parts: &[&str]) -> Result<Command, CommandError> {
        Command::try_from(req(parts))
    }

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!(parse(&["gEt", "k"]).unwrap(), Command::Get(b("k")));
        assert_eq!(parse(&["PING"]).unwrap(), Command::Ping(None));
    }

    #[test]
    fn arity_errors_name_the_command() {
        assert_eq!(
            parse(&["GET"]).unwrap_err().to_string(),
            "ERR wrong number of arguments for 'get' command"
        );
        assert_eq!(
            parse(&["SET", "k"]).unwrap_err(),
            CommandError::WrongArity("set".to_string())
        );
        assert_eq!(
            parse(&["MSET", "a", "1", "b"]).unwrap_err(),
            CommandError::WrongArity("mset".to_string())
        );
    }

    #[test]
    fn integer_arguments_are_checked() {
        assert_eq!(
            parse(&["INCRBY", "k", "x"]).unwrap_err(),
            CommandError::NotInteger
        );
        assert_eq!(
            parse(&["DECRBY", "k", "-9223372036854775808"]).unwrap_err(),
            CommandError::Overflow
        );
        assert_eq!(
            parse(&["DECR", "k"]).unwrap(),
            Command::IncrBy {
                key: b("k"),
                delta: -1
            }
        );
    }

    #[test]
    fn unknown_command_quotes_arguments() {
        let err = parse(&["FOO", "a", "b"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ERR unknown command 'FOO', with args beginning with: 'a' 'b' "
        );
    }

    #[test]
    fn rejects_non_array_requests() {
        assert!(matches!(
            Command::try_from(Frame::Integer(1)),
            Err(CommandError::InvalidRequest(_))
        ));
        assert!(matches!(
            Command::try_from(Frame::Array(vec![])),
            Err(CommandError::InvalidRequest(_))
        ));
    }

    #[test]
    fn brpop_timeout() {
        assert_eq!(
            parse(&["BRPOP", "a", "b", "0"]).unwrap(),
            Command::BRPop {
                keys: vec![b("a"), b("b")],
                timeout: None
            }
        );
        assert_eq!(
            parse(&["BRPOP", "a", "0.5"]).unwrap(),
            Command::BRPop {
                keys: vec![b("a")],
                timeout: Some(Duration::from_millis(500))
            }
        );
        assert_eq!(
            parse(&["BRPOP", "a", "-1"]).unwrap_err(),
            CommandError::NegativeTimeout
        );
        assert_eq!(
            parse(&["BRPOP", "a", "soon"]).unwrap_err(),
            CommandError::InvalidTimeout
        );
    }

    #[test]
    fn zadd_and_score_ranges() {
        assert_eq!(
            parse(&["ZADD", "z", "1.5", "a", "2", "b"]).unwrap(),
            Command::ZAdd {
                key: b("z"),
                entries: vec![(1.5, b("a")), (2.0, b("b"))]
            }
        );
        assert_eq!(
            parse(&["ZADD", "z", "1", "a", "2"]).unwrap_err(),
            CommandError::Syntax
        );
        assert_eq!(
            parse(&["ZADD", "z", "one", "a"]).unwrap_err(),
            CommandError::NotFloat
        );
        assert_eq!(
            parse(&["ZCOUNT", "z", "(1", "abc"]).unwrap_err(),
            CommandError::InvalidScoreRange
        );
        assert!(matches!(
            parse(&["ZRANGEBYSCORE", "z", "-inf", "+inf", "withscores"]).unwrap(),
            Command::ZRangeByScore {
                with_scores: true,
                ..
            }
        ));
        assert_eq!(
            parse(&["ZRANGE", "z", "0", "1", "SCORES"]).unwrap_err(),
            CommandError::Syntax
        );
    }

    #[test]
    fn write_classification() {
        assert!(parse(&["SET", "k", "v"]).unwrap().is_write());
        assert!(parse(&["BRPOP", "k", "1"]).unwrap().is_write());
        assert!(!parse(&["GET", "k"]).unwrap().is_write());
        assert!(!parse(&["ZRANGE", "z", "0", "-1"]).unwrap().is_write());
    }

    #[test]
    fn to_frame_reparses_to_the_same_command() {
        let cases: &[&[&str]] = &[
            &["SET", "k", "v"],
            &["LPUSH", "l", "a", "b"],
            &["HSET", "h", "f", "v", "g", "w"],
            &["ZADD", "z", "1.5", "m", "-inf", "n"],
            &["ZREMRANGEBYSCORE", "z", "(1", "+inf"],
            &["ZREVRANGE", "z", "0", "-1", "WITHSCORES"],
            &["PEXPIREAT", "k", "1700000000000"],
            &["MSET", "a", "1", "b", "2"],
        ];
        for case in cases {
            let cmd = parse(case).unwrap();
            assert_eq!(Command::try_from(cmd.to_frame()).unwrap(), cmd, "{case:?}");
        }
    }

    #[test]
    fn every_known_name_parses() {
        for name in COMMAND_NAMES {
            let err = parse(&[name]).err();
            assert!(
                !matches!(err, Some(CommandError::UnknownCommand { .. })),
                "{name} was not recognised"
            );
        }
    }
}
