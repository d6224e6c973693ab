//! `check-aof` command handler
//!
//! Scans an append-only file and reports how many commands it holds and
//! where the first problem is, without touching a running server.

use crate::aof::{self, CheckReport, ScanEnd};
use crate::cli::args::{CheckAofArgs, OutputFormat};
use crate::error::{AofError, CrimsonError};

/// Check an append-only file and print the report.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read, or an AOF error if the
/// file is truncated or corrupt. The report is printed either way.
pub fn run(args: &CheckAofArgs) -> Result<(), CrimsonError> {
    if !args.file.exists() {
        return Err(CrimsonError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("file not found: {}", args.file.display()),
        )));
    }
    tracing::info!(file = %args.file.display(), "checking append-only file");

    let report = aof::check(&args.file)?;
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Human => println!("{}", render_human(&report)),
    }

    match report.end {
        ScanEnd::Clean => Ok(()),
        ScanEnd::Truncated { offset } => Err(AofError::Truncated { offset }.into()),
        ScanEnd::Corrupt { offset, message } => Err(AofError::Corrupt { offset, message }.into()),
    }
}

fn render_human(report: &CheckReport) -> String {
    let summary = format!(
        "{}: {} commands, {} bytes",
        report.path, report.commands, report.total_bytes
    );
    match &report.end {
        ScanEnd::Clean => format!("{summary}\nOK"),
        ScanEnd::Truncated { offset } => format!(
            "{summary}\ntruncated: partial command at offset {offset} ({} bytes)",
            report.total_bytes - offset
        ),
        ScanEnd::Corrupt { offset, message } => {
            format!("{summary}\ncorrupt at offset {offset}: {message}")
        }
    }
}
