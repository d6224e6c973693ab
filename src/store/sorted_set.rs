//! Sorted set backed by an arena-allocated skip list.
//!
//! Nodes live in a `Vec` and link to each other by index, so the structure
//! needs no reference counting or interior mutability. Every forward link
//! carries a span (how many level-0 steps it skips), which makes rank
//! lookups and rank-indexed ranges logarithmic.

use std::cmp::Ordering;
use std::collections::HashMap;

use bytes::Bytes;
use rand::Rng;

const MAX_LEVEL: usize = 32;
const P: f64 = 0.25;
const HEAD: usize = 0;

/// One end of a score interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBound {
    /// The bound value itself is inside the interval.
    Inclusive(f64),
    /// The bound value itself is outside the interval (`(1.5` on the wire).
    Exclusive(f64),
}

impl ScoreBound {
    /// Parses `1.5`, `(1.5`, `-inf`, `+inf` style bounds. NaN is rejected.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(raw).ok()?;
        let (exclusive, number) = text
            .strip_prefix('(')
            .map_or((false, text), |rest| (true, rest));
        let value = parse_score(number.as_bytes())?;
        Some(if exclusive {
            Self::Exclusive(value)
        } else {
            Self::Inclusive(value)
        })
    }

    const fn value(self) -> f64 {
        match self {
            Self::Inclusive(v) | Self::Exclusive(v) => v,
        }
    }
}

impl std::fmt::Display for ScoreBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inclusive(v) => write!(f, "{}", format_score(*v)),
            Self::Exclusive(v) => write!(f, "({}", format_score(*v)),
        }
    }
}

/// Parses a score, accepting `inf`/`+inf`/`-inf` and rejecting NaN.
#[must_use]
pub fn parse_score(raw: &[u8]) -> Option<f64> {
    std::str::from_utf8(raw)
        .ok()?
        .parse::<f64>()
        .ok()
        .filter(|v| !v.is_nan())
}

/// Formats a score the way replies carry it (`1`, `2.5`, `inf`, `-inf`).
#[must_use]
pub fn format_score(score: f64) -> String {
    if score.is_infinite() {
        let text = if score > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else {
        format!("{score}")
    }
}

/// A closed, open or half-open score interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRange {
    /// Lower bound.
    pub min: ScoreBound,
    /// Upper bound.
    pub max: ScoreBound,
}

impl ScoreRange {
    /// Creates a range from its two bounds.
    #[must_use]
    pub const fn new(min: ScoreBound, max: ScoreBound) -> Self {
        Self { min, max }
    }

    fn above_min(&self, score: f64) -> bool {
        match self.min {
            ScoreBound::Inclusive(m) => score >= m,
            ScoreBound::Exclusive(m) => score > m,
        }
    }

    fn below_max(&self, score: f64) -> bool {
        match self.max {
            ScoreBound::Inclusive(m) => score <= m,
            ScoreBound::Exclusive(m) => score < m,
        }
    }

    /// Returns `true` if no score can satisfy both bounds.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let (lo, hi) = (self.min.value(), self.max.value());
        lo > hi
            || (lo == hi
                && (matches!(self.min, ScoreBound::Exclusive(_))
                    || matches!(self.max, ScoreBound::Exclusive(_))))
    }

    /// Returns `true` if `score` lies inside the range.
    #[must_use]
    pub fn contains(&self, score: f64) -> bool {
        self.above_min(score) && self.below_max(score)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Link {
    next: Option<usize>,
    span: usize,
}

#[derive(Debug)]
struct Node {
    member: Bytes,
    score: f64,
    backward: Option<usize>,
    links: Vec<Link>,
}

/// Skip list ordered by `(score, member)`.
#[derive(Debug)]
struct SkipList {
    nodes: Vec<Node>,
    free: Vec<usize>,
    tail: Option<usize>,
    level: usize,
    len: usize,
}

fn compare(a_score: f64, a_member: &[u8], b_score: f64, b_member: &[u8]) -> Ordering {
    a_score
        .partial_cmp(&b_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a_member.cmp(b_member))
}

fn random_level() -> usize {
    let mut rng = rand::rng();
    let mut level = 1;
    while level < MAX_LEVEL && rng.random_bool(P) {
        level += 1;
    }
    level
}

impl SkipList {
    fn new() -> Self {
        let head = Node {
            member: Bytes::new(),
            score: f64::NEG_INFINITY,
            backward: None,
            links: vec![Link::default(); MAX_LEVEL],
        };
        Self {
            nodes: vec![head],
            free: Vec::new(),
            tail: None,
            level: 1,
            len: 0,
        }
    }

    fn next(&self, node: usize, level: usize) -> Option<usize> {
        self.nodes[node].links[level].next
    }

    fn precedes(&self, node: usize, score: f64, member: &[u8]) -> bool {
        let n = &self.nodes[node];
        compare(n.score, &n.member, score, member) == Ordering::Less
    }

    fn alloc(&mut self, node: Node) -> usize {
        if let Some(slot) = self.free.pop() {
            self.nodes[slot] = node;
            slot
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    /// Inserts a member that is known not to be present.
    fn insert(&mut self, score: f64, member: Bytes) {
        let mut update = [HEAD; MAX_LEVEL];
        let mut rank = [0usize; MAX_LEVEL];

        let mut x = HEAD;
        for i in (0..self.level).rev() {
            rank[i] = if i == self.level - 1 { 0 } else { rank[i + 1] };
            while let Some(n) = self.next(x, i) {
                if !self.precedes(n, score, &member) {
                    break;
                }
                rank[i] += self.nodes[x].links[i].span;
                x = n;
            }
            update[i] = x;
        }

        let level = random_level();
        if level > self.level {
            for i in self.level..level {
                rank[i] = 0;
                update[i] = HEAD;
                self.nodes[HEAD].links[i].span = self.len;
            }
            self.level = level;
        }

        let new = self.alloc(Node {
            member,
            score,
            backward: None,
            links: vec![Link::default(); level],
        });

        for i in 0..level {
            let prev = update[i];
            let prev_link = self.nodes[prev].links[i];
            self.nodes[new].links[i] = Link {
                next: prev_link.next,
                span: prev_link.span - (rank[0] - rank[i]),
            };
            self.nodes[prev].links[i] = Link {
                next: Some(new),
                span: rank[0] - rank[i] + 1,
            };
        }
        for i in level..self.level {
            self.nodes[update[i]].links[i].span += 1;
        }

        self.nodes[new].backward = (update[0] != HEAD).then_some(update[0]);
        match self.next(new, 0) {
            Some(n) => self.nodes[n].backward = Some(new),
            None => self.tail = Some(new),
        }
        self.len += 1;
    }

    /// Removes the node holding `(score, member)`. Returns `false` if absent.
    fn remove(&mut self, score: f64, member: &[u8]) -> bool {
        let mut update = [HEAD; MAX_LEVEL];
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            while let Some(n) = self.next(x, i) {
                if !self.precedes(n, score, member) {
                    break;
                }
                x = n;
            }
            update[i] = x;
        }

        let Some(target) = self.next(x, 0) else {
            return false;
        };
        {
            let t = &self.nodes[target];
            if compare(t.score, &t.member, score, member) != Ordering::Equal {
                return false;
            }
        }

        for (i, &prev) in update.iter().enumerate().take(self.level) {
            if self.nodes[prev].links[i].next == Some(target) {
                let removed = self.nodes[target].links[i];
                let link = &mut self.nodes[prev].links[i];
                link.span = link.span + removed.span - 1;
                link.next = removed.next;
            } else {
                self.nodes[prev].links[i].span -= 1;
            }
        }

        let backward = self.nodes[target].backward;
        match self.next(target, 0) {
            Some(n) => self.nodes[n].backward = backward,
            None => self.tail = backward,
        }
        while self.level > 1 && self.nodes[HEAD].links[self.level - 1].next.is_none() {
            self.level -= 1;
        }

        self.nodes[target].member = Bytes::new();
        self.nodes[target].links.clear();
        self.free.push(target);
        self.len -= 1;
        true
    }

    /// 1-based rank of `(score, member)`, if present.
    fn rank(&self, score: f64, member: &[u8]) -> Option<usize> {
        let mut rank = 0;
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            while let Some(n) = self.next(x, i) {
                let node = &self.nodes[n];
                if compare(node.score, &node.member, score, member) == Ordering::Greater {
                    break;
                }
                rank += self.nodes[x].links[i].span;
                x = n;
            }
            if x != HEAD && self.nodes[x].member == member {
                return Some(rank);
            }
        }
        None
    }

    /// Node at 1-based `rank`.
    fn by_rank(&self, rank: usize) -> Option<usize> {
        let mut traversed = 0;
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            while let Some(n) = self.next(x, i) {
                let span = self.nodes[x].links[i].span;
                if traversed + span > rank {
                    break;
                }
                traversed += span;
                x = n;
            }
            if traversed == rank {
                return (x != HEAD).then_some(x);
            }
        }
        None
    }

    /// First node inside `range` with its 1-based rank.
    fn first_in(&self, range: &ScoreRange) -> Option<(usize, usize)> {
        if range.is_empty() {
            return None;
        }
        let mut rank = 0;
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            while let Some(n) = self.next(x, i) {
                if range.above_min(self.nodes[n].score) {
                    break;
                }
                rank += self.nodes[x].links[i].span;
                x = n;
            }
        }
        let n = self.next(x, 0)?;
        range
            .below_max(self.nodes[n].score)
            .then_some((n, rank + 1))
    }

    /// Last node inside `range` with its 1-based rank.
    fn last_in(&self, range: &ScoreRange) -> Option<(usize, usize)> {
        if range.is_empty() {
            return None;
        }
        let mut rank = 0;
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            while let Some(n) = self.next(x, i) {
                if !range.below_max(self.nodes[n].score) {
                    break;
                }
                rank += self.nodes[x].links[i].span;
                x = n;
            }
        }
        (x != HEAD && range.above_min(self.nodes[x].score)).then_some((x, rank))
    }

    fn entry(&self, node: usize) -> (Bytes, f64) {
        let n = &self.nodes[node];
        (n.member.clone(), n.score)
    }
}

/// Members ordered by score, ties broken by member bytes.
#[derive(Debug)]
pub struct SortedSet {
    list: SkipList,
    scores: HashMap<Bytes, f64>,
}

impl Default for SortedSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SortedSet {
    /// Creates an empty sorted set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            list: SkipList::new(),
            scores: HashMap::new(),
        }
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Returns `true` if the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Adds `member` or moves it to `score`. Returns `true` if it was new.
    pub fn insert(&mut self, score: f64, member: Bytes) -> bool {
        match self.scores.get(&member).copied() {
            Some(old) if old == score => false,
            Some(old) => {
                self.list.remove(old, &member);
                self.list.insert(score, member.clone());
                self.scores.insert(member, score);
                false
            }
            None => {
                self.list.insert(score, member.clone());
                self.scores.insert(member, score);
                true
            }
        }
    }

    /// Removes `member`. Returns `true` if it was present.
    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self.scores.remove(member) {
            Some(score) => self.list.remove(score, member),
            None => false,
        }
    }

    /// Score of `member`.
    #[must_use]
    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// 0-based position of `member` in ascending order.
    #[must_use]
    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let score = self.score(member)?;
        self.list.rank(score, member).map(|r| r - 1)
    }

    /// 0-based position of `member` in descending order.
    #[must_use]
    pub fn rev_rank(&self, member: &[u8]) -> Option<usize> {
        self.rank(member).map(|r| self.len() - 1 - r)
    }

    /// Members at 0-based positions `start..=stop`, ascending or descending.
    ///
    /// Indexes must already be normalized and within bounds.
    #[must_use]
    pub fn range_by_rank(&self, start: usize, stop: usize, reverse: bool) -> Vec<(Bytes, f64)> {
        if start > stop || stop >= self.len() {
            return Vec::new();
        }
        let first_rank = if reverse {
            self.len() - start
        } else {
            start + 1
        };
        let mut out = Vec::with_capacity(stop - start + 1);
        let mut cursor = self.list.by_rank(first_rank);
        while let Some(node) = cursor {
            if out.len() > stop - start {
                break;
            }
            out.push(self.list.entry(node));
            cursor = if reverse {
                self.list.nodes[node].backward
            } else {
                self.list.next(node, 0)
            };
        }
        out
    }

    /// Members whose score lies in `range`, ascending.
    #[must_use]
    pub fn range_by_score(&self, range: &ScoreRange) -> Vec<(Bytes, f64)> {
        let mut out = Vec::new();
        let mut cursor = self.list.first_in(range).map(|(node, _)| node);
        while let Some(node) = cursor {
            if !range.below_max(self.list.nodes[node].score) {
                break;
            }
            out.push(self.list.entry(node));
            cursor = self.list.next(node, 0);
        }
        out
    }

    /// Number of members whose score lies in `range`.
    #[must_use]
    pub fn count(&self, range: &ScoreRange) -> usize {
        match (self.list.first_in(range), self.list.last_in(range)) {
            (Some((_, first)), Some((_, last))) if last >= first => last - first + 1,
            _ => 0,
        }
    }

    /// Removes every member whose score lies in `range`. Returns how many.
    pub fn remove_range_by_score(&mut self, range: &ScoreRange) -> usize {
        let doomed = self.range_by_score(range);
        for (member, _) in &doomed {
            self.remove(member);
        }
        doomed.len()
    }

    /// All members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (Bytes, f64)> + '_ {
        std::iter::successors(self.list.next(HEAD, 0), |&n| self.list.next(n, 0))
            .map(|n| self.list.entry(n))
    }
}
