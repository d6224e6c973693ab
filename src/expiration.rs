//! Active expiry.
//!
//! Reads already hide expired keys; this task reclaims their memory so a
//! key nobody touches again does not live forever.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::db::Db;
use crate::observability::metrics;

/// Starts the expiry task, ticking every `interval` until `cancel` fires.
pub fn spawn(db: Arc<Db>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("expiry task cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = db.purge_expired().await;
                    if removed > 0 {
                        trace!(removed, "expired keys purged");
                        metrics::record_expired_keys(removed);
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::resp::Frame;
    use bytes::Bytes;

    fn cmd(words: &[&str]) -> Command {
        Command::try_from(Frame::bulks(
            words.iter().map(|w| Bytes::copy_from_slice(w.as_bytes())),
        ))
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn purges_expired_keys_in_the_background() {
        let db = Arc::new(Db::new());
        db.apply(&cmd(&["SET", "short", "1"])).await;
        db.apply(&cmd(&["EXPIRE", "short", "1"])).await;
        db.apply(&cmd(&["SET", "long", "1"])).await;

        let cancel = CancellationToken::new();
        let handle = spawn(Arc::clone(&db), Duration::from_millis(100), cancel.clone());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(db.len().await, 1);
        // Nothing left for a manual sweep: the task already reclaimed it.
        assert_eq!(db.purge_expired().await, 0);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_cancel() {
        let cancel = CancellationToken::new();
        let handle = spawn(Arc::new(Db::new()), Duration::from_millis(10), cancel.clone());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
