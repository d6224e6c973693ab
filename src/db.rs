//! Shared database handle.
//!
//! [`Db`] owns the keyspace behind a `tokio::sync::RwLock`, routes each
//! command to the read or write path, journals successful writes and parks
//! `BRPOP` callers until a push lands on one of their keys.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use futures_util::future::select_all;
use tokio::sync::{Notify, RwLock};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::aof::{Aof, journal_frame};
use crate::command::Command;
use crate::handlers;
use crate::resp::Frame;
use crate::store::Keyspace;

/// The server's single database.
#[derive(Debug, Default)]
pub struct Db {
    keyspace: RwLock<Keyspace>,
    waiters: DashMap<Bytes, Arc<Notify>>,
    journal: Option<Arc<Aof>>,
}

impl Db {
    /// Creates an empty database with no journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches an append-only file; successful writes are appended to it.
    #[must_use]
    pub fn with_journal(mut self, aof: Arc<Aof>) -> Self {
        self.journal = Some(aof);
        self
    }

    /// The attached append-only file, if any.
    #[must_use]
    pub const fn journal(&self) -> Option<&Arc<Aof>> {
        self.journal.as_ref()
    }

    /// Runs one client command and returns its reply.
    ///
    /// `BRPOP` may wait here until its timeout elapses.
    pub async fn apply(&self, cmd: &Command) -> Frame {
        match cmd {
            Command::BRPop { keys, timeout } => self.brpop(cmd, keys, *timeout).await,
            write if write.is_write() => {
                let mut ks = self.keyspace.write().await;
                let reply = handlers::execute(&mut ks, write);
                self.after_write(write, &reply);
                reply
            }
            read => handlers::query(&*self.keyspace.read().await, read),
        }
    }

    /// Applies a command from the append-only file: never blocks, never journals.
    pub async fn replay(&self, cmd: &Command) -> Frame {
        let mut ks = self.keyspace.write().await;
        handlers::execute(&mut ks, cmd)
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        self.keyspace.read().await.len()
    }

    /// Returns `true` if no live key exists.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Removes every expired key. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.keyspace.write().await.purge_expired(Instant::now())
    }

    /// Must run with the keyspace write lock still held so blocked readers
    /// cannot miss the wake-up.
    fn after_write(&self, cmd: &Command, reply: &Frame) {
        if reply.is_error() {
            return;
        }
        if let Some(aof) = &self.journal {
            if let Some(frame) = journal_frame(cmd, reply) {
                aof.append(&frame);
            }
        }
        if let Some(key) = cmd.pushed_key() {
            if let Some(notify) = self.waiters.get(key) {
                trace!(key = %String::from_utf8_lossy(key), "waking blocked readers");
                notify.notify_waiters();
            }
        }
    }

    async fn brpop(&self, cmd: &Command, keys: &[Bytes], timeout: Option<Duration>) -> Frame {
        if keys.is_empty() {
            return Frame::NullArray;
        }
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let _release = WaiterRelease { db: self, keys };

        loop {
            let mut ks = self.keyspace.write().await;
            let reply = handlers::execute(&mut ks, cmd);
            if reply != Frame::NullArray {
                self.after_write(cmd, &reply);
                return reply;
            }

            let notifies: Vec<Arc<Notify>> = keys
                .iter()
                .map(|k| Arc::clone(&*self.waiters.entry(k.clone()).or_default()))
                .collect();
            let mut waits: Vec<_> = notifies.iter().map(|n| Box::pin(n.notified())).collect();
            for wait in &mut waits {
                wait.as_mut().enable();
            }
            drop(ks);

            debug!(keys = keys.len(), ?timeout, "blocking on empty lists");
            let woken = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, select_all(waits))
                    .await
                    .is_ok(),
                None => {
                    select_all(waits).await;
                    true
                }
            };
            if !woken {
                return Frame::NullArray;
            }
        }
    }

    fn release_waiters(&self, keys: &[Bytes]) {
        for key in keys {
            self.waiters
                .remove_if(key, |_, notify| Arc::strong_count(notify) == 1);
        }
    }
}

/// Drops idle `Notify` handles once a `BRPOP` returns or is abandoned.
struct WaiterRelease<'a> {
    db: &'a Db,
    keys: &'a [Bytes],
}

impl Drop for WaiterRelease<'_> {
    fn drop(&mut self) {
        self.db.release_waiters(self.keys);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(words: &[&str]) -> Command {
        Command::try_from(Frame::bulks(
            words.iter().map(|w| Bytes::copy_from_slice(w.as_bytes())),
        ))
        .unwrap()
    }

    fn bulk(s: &str) -> Frame {
        Frame::Bulk(Bytes::copy_from_slice(s.as_bytes()))
    }

    #[tokio::test]
    async fn routes_reads_and_writes() {
        let db = Db::new();
        assert_eq!(db.apply(&cmd(&["SET", "k", "v"])).await, Frame::ok());
        assert_eq!(db.apply(&cmd(&["GET", "k"])).await, bulk("v"));
        assert_eq!(db.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn brpop_times_out_with_null_array() {
        let db = Db::new();
        let started = Instant::now();
        let reply = db.apply(&cmd(&["BRPOP", "q", "1.5"])).await;
        assert_eq!(reply, Frame::NullArray);
        assert!(started.elapsed() >= Duration::from_millis(1500));
        assert!(db.waiters.is_empty());
        assert!(db.is_empty().await, "blocking must not create keys");
    }

    #[tokio::test]
    async fn brpop_wakes_on_push() {
        let db = Arc::new(Db::new());
        let blocked = tokio::spawn({
            let db = Arc::clone(&db);
            async move { db.apply(&cmd(&["BRPOP", "a", "b", "0"])).await }
        });

        // Wait until the reader has registered.
        while db.waiters.len() < 2 {
            tokio::task::yield_now().await;
        }
        db.apply(&cmd(&["LPUSH", "b", "x"])).await;

        let reply = blocked.await.unwrap();
        assert_eq!(reply, Frame::Array(vec![bulk("b"), bulk("x")]));
        assert!(db.is_empty().await);
        assert!(db.waiters.is_empty());
    }

    #[tokio::test]
    async fn brpop_only_one_reader_gets_each_value() {
        let db = Arc::new(Db::new());
        let spawn_reader = |db: Arc<Db>| {
            tokio::spawn(async move { db.apply(&cmd(&["BRPOP", "q", "0.5"])).await })
        };
        let first = spawn_reader(Arc::clone(&db));
        let second = spawn_reader(Arc::clone(&db));

        while db.waiters.get(&b"q"[..]).is_none_or(|n| Arc::strong_count(&n) < 3) {
            tokio::task::yield_now().await;
        }
        db.apply(&cmd(&["RPUSH", "q", "only"])).await;

        let replies = [first.await.unwrap(), second.await.unwrap()];
        let served = replies.iter().filter(|r| **r != Frame::NullArray).count();
        assert_eq!(served, 1);
    }

    #[tokio::test]
    async fn brpop_reports_wrong_type() {
        let db = Db::new();
        db.apply(&cmd(&["SET", "s", "v"])).await;
        assert!(db.apply(&cmd(&["BRPOP", "s", "0"])).await.is_error());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_expired_counts_removed_keys() {
        let db = Db::new();
        db.apply(&cmd(&["SET", "a", "1"])).await;
        db.apply(&cmd(&["SET", "b", "1"])).await;
        db.apply(&cmd(&["EXPIRE", "a", "1"])).await;
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(db.purge_expired().await, 1);
        assert_eq!(db.len().await, 1);
    }
}
