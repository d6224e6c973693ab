//! TCP front end.
//!
//! [`Server`] owns the listener and the background tasks (active expiry,
//! periodic fsync) and spawns one [`connection::handle`] task per client.
//! Everything stops when the shared [`CancellationToken`] fires.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aof;
use crate::config::{FsyncPolicy, ServerConfig};
use crate::connection::{self, ConnectionContext};
use crate::db::Db;
use crate::error::{CrimsonError, ProtocolError};
use crate::expiration;
use crate::observability::metrics;

/// Reply sent to a client that connects while the server is full.
const MAX_CLIENTS_REPLY: &[u8] = b"-ERR max number of clients reached\r\n";

/// How long shutdown waits for open connections before dropping them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// A bound, not yet running, server.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    db: Arc<Db>,
    config: ServerConfig,
    cancel: CancellationToken,
}

impl Server {
    /// Binds the listener described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Bind`] if the address is unavailable.
    pub async fn bind(
        config: ServerConfig,
        db: Arc<Db>,
        cancel: CancellationToken,
    ) -> Result<Self, ProtocolError> {
        let addr = config.listen_addr();
        let bind_err = |source: std::io::Error| ProtocolError::Bind {
            addr: addr.clone(),
            source,
        };
        let listener = TcpListener::bind(&addr).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        Ok(Self {
            listener,
            local_addr,
            db,
            config,
            cancel,
        })
    }

    /// Address the listener actually bound, with any port `0` resolved.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts clients until cancelled, then drains connections and
    /// syncs the append-only file.
    ///
    /// # Errors
    ///
    /// Returns an error if the final append-only sync fails.
    pub async fn run(self) -> Result<(), CrimsonError> {
        let Self {
            listener,
            local_addr,
            db,
            config,
            cancel,
        } = self;
        info!(bound_addr = %local_addr, "server listening");

        let mut background = vec![expiration::spawn(
            Arc::clone(&db),
            config.expire_interval,
            cancel.clone(),
        )];
        if let Some(journal) = db.journal() {
            if journal.policy() == FsyncPolicy::Everysec {
                background.push(aof::spawn_fsync_task(Arc::clone(journal), cancel.clone()));
            }
        }

        let active = Arc::new(AtomicUsize::new(0));
        let next_id = AtomicU64::new(1);
        let mut connections = JoinSet::new();

        loop {
            let accepted = tokio::select! {
                () = cancel.cancelled() => {
                    info!("server shutting down");
                    break;
                }
                accepted = listener.accept() => accepted,
            };
            while connections.try_join_next().is_some() {}

            let (stream, remote_addr) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    metrics::record_error("io");
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
            };

            let Some(guard) = ConnectionGuard::acquire(&active, config.max_clients) else {
                debug!(%remote_addr, max_clients = config.max_clients, "rejecting client");
                metrics::record_connection_rejected();
                tokio::spawn(reject(stream));
                continue;
            };

            let _ = stream.set_nodelay(true);
            let connection_id = next_id.fetch_add(1, Ordering::Relaxed);
            let ctx = ConnectionContext::new(connection_id, Some(remote_addr));
            let db = Arc::clone(&db);
            let cancel = cancel.clone();
            let max_frame_size = config.max_frame_size;
            connections.spawn(async move {
                let _guard = guard;
                let result = connection::handle(stream, &db, &ctx, max_frame_size, &cancel).await;
                if let Err(e) = result {
                    debug!(connection_id, error = %e, "connection ended with error");
                }
            });
        }

        drop(listener);
        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                remaining = connections.len(),
                "connections still open after grace period, aborting"
            );
            connections.shutdown().await;
        }
        for handle in background {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task failed");
            }
        }

        if let Some(journal) = db.journal() {
            let journal = Arc::clone(journal);
            tokio::task::spawn_blocking(move || journal.sync())
                .await
                .map_err(|e| CrimsonError::Io(std::io::Error::other(e)))??;
            debug!("append-only file synced");
        }
        info!("server stopped");
        Ok(())
    }
}

/// Tells an over-limit client why it is being dropped.
async fn reject(mut stream: TcpStream) {
    if let Err(e) = stream.write_all(MAX_CLIENTS_REPLY).await {
        debug!(error = %e, "failed to send rejection");
    }
    let _ = stream.shutdown().await;
}

/// Holds one slot of the `max_clients` budget for the life of a connection.
struct ConnectionGuard {
    active: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    fn acquire(active: &Arc<AtomicUsize>, max_clients: usize) -> Option<Self> {
        let previous = active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max_clients).then_some(n + 1)
            })
            .ok()?;
        metrics::set_connections_active(previous + 1);
        Some(Self {
            active: Arc::clone(active),
        })
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let previous = self.active.fetch_sub(1, Ordering::AcqRel);
        metrics::set_connections_active(previous.saturating_sub(1));
    }
}
