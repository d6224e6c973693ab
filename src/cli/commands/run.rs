//! `run` command handler
//!
//! Resolves the effective configuration, replays the append-only file and
//! serves clients until shutdown.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::aof::{self, Aof};
use crate::cli::args::RunArgs;
use crate::config::{ConfigLoader, ServerConfig, Validator};
use crate::db::Db;
use crate::error::{ConfigError, CrimsonError, ValidationIssue};
use crate::observability::init_metrics;
use crate::server::Server;

/// Start the server.
///
/// # Errors
///
/// Returns a config error for an invalid configuration, an AOF error if the
/// journal cannot be replayed, or a protocol error if the listener cannot
/// bind.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), CrimsonError> {
    let config = resolve_config(args)?;

    if let Some(port) = config.metrics_port {
        init_metrics(Some(port))?;
        info!(port, "Prometheus metrics endpoint started");
    }

    let mut db = Db::new();
    if config.appendonly {
        let report = aof::load(&config.appendfilename, &db).await?;
        if report.truncated_bytes > 0 {
            warn!(
                bytes = report.truncated_bytes,
                "discarded a partial command from the append-only file"
            );
        }
        let journal = Aof::open(&config.appendfilename, config.appendfsync)?;
        db = db.with_journal(Arc::new(journal));
    }

    let server = Server::bind(config, Arc::new(db), cancel).await?;
    server.run().await
}

/// Builds the effective configuration: file (or defaults), then flags,
/// then validation.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be loaded or the merged
/// configuration is invalid.
pub fn resolve_config(args: &RunArgs) -> Result<ServerConfig, ConfigError> {
    let (mut config, file_warnings) = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "loading configuration");
            let loaded = ConfigLoader::new().load(path)?;
            (loaded.config, loaded.warnings)
        }
        None => (ServerConfig::default(), Vec::new()),
    };
    apply_overrides(&mut config, args);

    let result = Validator::new().validate(&config);
    if result.has_errors() {
        return Err(ConfigError::ValidationError {
            path: args
                .config
                .as_ref()
                .map_or_else(|| "<cli>".to_string(), |p| p.display().to_string()),
            errors: result.errors,
        });
    }

    let mut warnings = file_warnings;
    for issue in result.warnings {
        if !warnings.iter().any(|w| same_issue(w, &issue)) {
            warnings.push(issue);
        }
    }
    for warning in &warnings {
        warn!(field = %warning.path, "{}", warning.message);
    }

    Ok(config)
}

fn same_issue(a: &ValidationIssue, b: &ValidationIssue) -> bool {
    a.path == b.path && a.message == b.message
}

fn apply_overrides(config: &mut ServerConfig, args: &RunArgs) {
    if let Some(bind) = &args.bind {
        config.bind.clone_from(bind);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(max_clients) = args.max_clients {
        config.max_clients = max_clients;
    }
    if let Some(max_frame_size) = args.max_frame_size {
        config.max_frame_size = max_frame_size;
    }
    if let Some(interval) = args.expire_interval {
        config.expire_interval = interval;
    }
    if let Some(appendonly) = args.appendonly {
        config.appendonly = appendonly;
    }
    if let Some(path) = &args.appendfilename {
        config.appendfilename.clone_from(path);
    }
    if let Some(policy) = args.appendfsync {
        config.appendfsync = policy;
    }
    if let Some(port) = args.metrics_port {
        config.metrics_port = Some(port);
    }
}
