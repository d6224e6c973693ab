//! Metrics collection for `crimson`.
//!
//! Provides Prometheus-compatible metrics with label cardinality protection
//! and typed convenience functions for recording measurements.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::command::COMMAND_NAMES;
use crate::error::CrimsonError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Error categories accepted as labels on `crimson_errors_total`.
const KNOWN_ERROR_CATEGORIES: [&str; 4] = ["protocol", "command", "aof", "io"];

/// Sanitizes a command name for use as a metrics label.
///
/// Client-supplied names that are not real commands are bucketed as
/// `"__unknown__"` so a client cannot grow the label set without bound.
#[must_use]
pub fn sanitize_command_label(name: &str) -> &str {
    if COMMAND_NAMES.contains(&name) {
        name
    } else {
        "__unknown__"
    }
}

fn sanitize_category_label(category: &str) -> &str {
    if KNOWN_ERROR_CATEGORIES.contains(&category) {
        category
    } else {
        "__unknown__"
    }
}

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without
/// an HTTP endpoint.
///
/// # Errors
///
/// Returns `CrimsonError::Io` if the recorder or HTTP listener
/// cannot be installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), CrimsonError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| CrimsonError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!(
        "crimson_commands_total",
        "Total number of commands processed"
    );
    describe_histogram!(
        "crimson_command_duration_ms",
        "Command processing duration in milliseconds"
    );
    describe_gauge!(
        "crimson_connections_active",
        "Number of currently connected clients"
    );
    describe_counter!(
        "crimson_connections_rejected_total",
        "Connections refused because max_clients was reached"
    );
    describe_counter!(
        "crimson_expired_keys_total",
        "Keys removed by the active expiry task"
    );
    describe_counter!(
        "crimson_errors_total",
        "Total number of errors by category"
    );
    describe_counter!(
        "crimson_aof_bytes_total",
        "Bytes appended to the append-only file"
    );
}

/// Records one processed command and how long it took.
pub fn record_command(name: &str, duration: Duration) {
    let label = sanitize_command_label(name).to_owned();
    counter!("crimson_commands_total", "command" => label.clone()).increment(1);
    histogram!("crimson_command_duration_ms", "command" => label)
        .record(duration.as_secs_f64() * 1000.0);
}

/// Sets the active connections gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_connections_active(count: usize) {
    gauge!("crimson_connections_active").set(count as f64);
}

/// Records a connection refused by the client cap.
pub fn record_connection_rejected() {
    counter!("crimson_connections_rejected_total").increment(1);
}

/// Records keys removed by active expiry.
pub fn record_expired_keys(count: usize) {
    counter!("crimson_expired_keys_total").increment(count as u64);
}

/// Records an error by category.
pub fn record_error(category: &str) {
    counter!("crimson_errors_total", "category" => sanitize_category_label(category).to_owned())
        .increment(1);
}

/// Records bytes appended to the journal.
pub fn record_aof_bytes(bytes: usize) {
    counter!("crimson_aof_bytes_total").increment(bytes as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_known_command_returns_original() {
        assert_eq!(sanitize_command_label("zrangebyscore"), "zrangebyscore");
    }

    #[test]
    fn sanitize_unknown_command_returns_unknown() {
        assert_eq!(sanitize_command_label("flushall"), "__unknown__");
        assert_eq!(sanitize_command_label(""), "__unknown__");
        assert_eq!(sanitize_command_label(&"x".repeat(10_000)), "__unknown__");
    }

    #[test]
    fn sanitize_categories() {
        assert_eq!(sanitize_category_label("aof"), "aof");
        assert_eq!(sanitize_category_label("disk"), "__unknown__");
    }

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_command("get", Duration::from_micros(15));
        record_command("nonsense", Duration::from_millis(1));
        set_connections_active(3);
        record_connection_rejected();
        record_expired_keys(7);
        record_error("protocol");
        record_aof_bytes(1024);
    }
}
