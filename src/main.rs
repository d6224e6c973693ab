//! `crimson` - in-memory Redis-compatible key-value server

use clap::Parser;
use tokio_util::sync::CancellationToken;

use crimson::cli::args::Cli;
use crimson::cli::commands;
use crimson::cli::signals;
use crimson::error::ExitCode;
use crimson::observability::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        let _ = e.print();
        std::process::exit(ExitCode::for_usage(&e));
    });

    init_logging(cli.log_format, cli.verbose, cli.quiet, cli.color);

    // Handlers are installed before the server starts so an early signal is
    // not lost.
    let cancel = CancellationToken::new();
    let watcher = signals::watch(signals::os_signals(), cancel.clone());
    tokio::spawn(async move {
        if let Some(code) = watcher.await {
            std::process::exit(code);
        }
    });

    match commands::dispatch(cli, cancel).await {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
