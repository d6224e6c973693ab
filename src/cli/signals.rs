//! Shutdown signal handling.
//!
//! The first SIGINT/SIGTERM cancels the shared token so the server drains
//! gracefully. A second one means the operator wants out now.

use futures_util::{Stream, StreamExt};
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio_util::sync::CancellationToken;

use crate::error::ExitCode;

/// A process signal that asks `crimson` to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT (Ctrl+C)
    Interrupt,
    /// SIGTERM
    Terminate,
}

impl ShutdownSignal {
    /// Exit code for a process forced down by this signal.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Interrupt => ExitCode::INTERRUPTED,
            Self::Terminate => ExitCode::TERMINATED,
        }
    }
}

/// Installs SIGINT and SIGTERM handlers and yields each delivery.
///
/// A handler that cannot be installed is logged and skipped.
pub fn os_signals() -> impl Stream<Item = ShutdownSignal> {
    let install = |kind: SignalKind, name: &str| match signal(kind) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::warn!(error = %e, signal = name, "failed to register signal handler");
            None
        }
    };
    let handlers = (
        install(SignalKind::interrupt(), "SIGINT"),
        install(SignalKind::terminate(), "SIGTERM"),
    );

    futures_util::stream::unfold(handlers, |(mut int, mut term)| async move {
        let received = tokio::select! {
            Some(()) = recv(int.as_mut()) => ShutdownSignal::Interrupt,
            Some(()) = recv(term.as_mut()) => ShutdownSignal::Terminate,
            else => return None,
        };
        Some((received, (int, term)))
    })
}

async fn recv(signal: Option<&mut Signal>) -> Option<()> {
    match signal {
        Some(signal) => signal.recv().await,
        None => std::future::pending().await,
    }
}

/// Cancels `cancel` on the first signal and returns the forced exit code on
/// the second.
///
/// Returns `None` if the stream ends first.
pub async fn watch<S>(signals: S, cancel: CancellationToken) -> Option<i32>
where
    S: Stream<Item = ShutdownSignal>,
{
    let mut signals = std::pin::pin!(signals);

    let first = signals.next().await?;
    tracing::info!(signal = ?first, "shutdown requested");
    eprintln!("\nShutting down gracefully... (press Ctrl+C again to force)");
    cancel.cancel();

    let second = signals.next().await?;
    tracing::warn!(signal = ?second, "forced shutdown");
    Some(second.exit_code())
}
