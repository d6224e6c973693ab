//! Configuration validation
//!
//! Validation collects ALL issues (doesn't stop at first) so a user fixing
//! a config file sees everything wrong with it at once.

use std::time::Duration;

use crate::config::ServerConfig;
use crate::error::{Severity, ValidationIssue};

/// Smallest frame limit that still fits ordinary requests.
const MIN_FRAME_SIZE: usize = 1024;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent startup).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns the result.
    pub fn validate(&mut self, config: &ServerConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_listener(config);
        self.validate_limits(config);
        self.validate_persistence(config);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    fn validate_listener(&mut self, config: &ServerConfig) {
        if config.bind.trim().is_empty() {
            self.add_error("bind", "bind address cannot be empty");
        }
        if let Some(metrics_port) = config.metrics_port {
            if metrics_port == 0 {
                self.add_error("metrics_port", "metrics port must be non-zero");
            } else if metrics_port == config.port {
                self.add_error("metrics_port", "metrics port collides with the server port");
            }
        }
    }

    fn validate_limits(&mut self, config: &ServerConfig) {
        if config.max_clients == 0 {
            self.add_error("max_clients", "must be at least 1");
        }
        if config.max_frame_size < MIN_FRAME_SIZE {
            self.add_error(
                "max_frame_size",
                &format!("must be at least {MIN_FRAME_SIZE} bytes"),
            );
        }
        if config.expire_interval.is_zero() {
            self.add_error("expire_interval", "must be greater than zero");
        } else if config.expire_interval > Duration::from_secs(10) {
            self.add_warning(
                "expire_interval",
                "expired keys will linger in memory between long ticks",
            );
        }
    }

    fn validate_persistence(&mut self, config: &ServerConfig) {
        if !config.appendonly {
            return;
        }
        if config.appendfilename.as_os_str().is_empty() {
            self.add_error("appendfilename", "cannot be empty when appendonly is set");
        } else if config.appendfilename.is_dir() {
            self.add_error("appendfilename", "points at a directory");
        }
    }

    /// Adds an error to the collection.
    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    /// Adds a warning to the collection.
    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}
