//! Per-client request loop.
//!
//! A connection reads one RESP frame at a time, turns it into a
//! [`Command`], runs it against the shared [`Db`] and writes exactly one
//! reply before reading the next request.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::command::Command;
use crate::db::Db;
use crate::error::{CommandError, ProtocolError};
use crate::observability::metrics;
use crate::resp::{Frame, RespCodec};

/// Identity of one client connection, carried through its log lines.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    /// Monotonic identifier assigned at accept time.
    pub connection_id: u64,

    /// Peer address, when the transport has one.
    pub remote_addr: Option<SocketAddr>,

    /// When the connection was accepted.
    pub connected_at: Instant,
}

impl ConnectionContext {
    #[must_use]
    pub fn new(connection_id: u64, remote_addr: Option<SocketAddr>) -> Self {
        Self {
            connection_id,
            remote_addr,
            connected_at: Instant::now(),
        }
    }
}

/// Serves requests on `stream` until the client leaves, sends `QUIT`,
/// breaks the protocol, or `cancel` fires.
///
/// # Errors
///
/// Returns [`ProtocolError::Io`] if reading or writing the socket fails.
/// Malformed input is answered and ends the connection without an error.
pub async fn handle<S>(
    stream: S,
    db: &Db,
    ctx: &ConnectionContext,
    max_frame_size: usize,
    cancel: &CancellationToken,
) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, RespCodec::new(max_frame_size));
    debug!(connection_id = ctx.connection_id, remote = ?ctx.remote_addr, "client connected");

    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => {
                debug!(connection_id = ctx.connection_id, "connection cancelled");
                break;
            }
            next = framed.next() => next,
        };

        let frame = match next {
            None => break,
            Some(Ok(frame)) => frame,
            Some(Err(ProtocolError::Io(e))) => return Err(ProtocolError::Io(e)),
            Some(Err(e)) => {
                warn!(connection_id = ctx.connection_id, error = %e, "protocol error, closing");
                metrics::record_error("protocol");
                framed.send(protocol_error_reply(&e)).await?;
                break;
            }
        };

        let cmd = match Command::try_from(frame) {
            Ok(cmd) => cmd,
            Err(e) => {
                record_rejected_request(&e);
                framed.send(Frame::Error(e.to_string())).await?;
                continue;
            }
        };

        if matches!(cmd, Command::Quit) {
            framed.send(Frame::ok()).await?;
            break;
        }

        let started = Instant::now();
        let reply = tokio::select! {
            () = cancel.cancelled() => break,
            reply = db.apply(&cmd) => reply,
        };
        metrics::record_command(cmd.name(), started.elapsed());
        if reply.is_error() {
            metrics::record_error("command");
        }
        trace!(connection_id = ctx.connection_id, command = cmd.name(), "reply ready");

        framed.send(reply).await?;
    }

    debug!(
        connection_id = ctx.connection_id,
        elapsed = ?ctx.connected_at.elapsed(),
        "client disconnected"
    );
    Ok(())
}

/// Accounts for a request that failed to decode into a [`Command`].
///
/// Unknown names are counted as commands too, under the `__unknown__` label.
fn record_rejected_request(err: &CommandError) {
    if let CommandError::UnknownCommand { name, .. } = err {
        metrics::record_command(&name.to_ascii_lowercase(), Duration::ZERO);
    }
    metrics::record_error("command");
}

fn protocol_error_reply(err: &ProtocolError) -> Frame {
    let detail = match err {
        ProtocolError::Invalid(msg) => msg.clone(),
        ProtocolError::FrameTooLarge { limit, .. } => {
            format!("request exceeds {limit} bytes")
        }
        other => other.to_string(),
    };
    Frame::Error(format!("ERR Protocol error: {detail}"))
}
