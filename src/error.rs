//! Error types for `crimson`
//!
//! This module provides the error hierarchy used across the server, the
//! process exit codes each error maps to, and the client-facing reply errors
//! rendered onto the wire as RESP error frames.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `crimson` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Network or wire protocol error (bind failed, malformed stream)
    pub const PROTOCOL_ERROR: i32 = 4;

    /// Append-only file error (corrupt journal, replay failure)
    pub const AOF_ERROR: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;

    /// Exit code for a command line clap rejected.
    ///
    /// `--help` and `--version` surface as clap errors but are not failures.
    #[must_use]
    pub fn for_usage(err: &clap::Error) -> i32 {
        if err.use_stderr() {
            Self::USAGE_ERROR
        } else {
            Self::SUCCESS
        }
    }
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `crimson` operations.
///
/// This enum aggregates all domain-specific errors and provides
/// a unified interface for error handling and exit code mapping.
#[derive(Debug, Error)]
pub enum CrimsonError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Wire protocol or network error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Append-only file error
    #[error(transparent)]
    Aof(#[from] AofError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CrimsonError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) => ExitCode::CONFIG_ERROR,
            Self::Protocol(_) => ExitCode::PROTOCOL_ERROR,
            Self::Aof(_) => ExitCode::AOF_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", format_issues(.errors))]
    ValidationError {
        /// Path to the configuration file, or `<cli>` for flag-only configs
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Required environment variable is not set
    #[error("environment variable '{var}' is not set: {message}")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Message from the `${VAR:?message}` reference
        message: String,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Name of the problematic field (e.g., "port")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Error - validation failure that prevents configuration from being used
    Error,
    /// Warning - potential issue that does not prevent the server from starting
    Warning,
}

// ============================================================================
// Protocol Errors
// ============================================================================

/// Wire-level errors raised while framing a RESP stream.
///
/// A protocol error poisons the connection: the server replies once with
/// `-ERR Protocol error: ...` and closes the socket.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// I/O error on the underlying socket
    #[error("protocol I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte stream is not valid RESP
    #[error("invalid frame: {0}")]
    Invalid(String),

    /// A single frame exceeds the configured size limit
    #[error("frame too large: {size} bytes (limit: {limit})")]
    FrameTooLarge {
        /// Bytes buffered so far for the frame
        size: usize,
        /// Configured limit in bytes
        limit: usize,
    },

    /// Listener could not be established
    #[error("bind failed on {addr}: {source}")]
    Bind {
        /// Address the server tried to bind
        addr: String,
        /// Underlying socket error
        source: std::io::Error,
    },
}

// ============================================================================
// Command Errors
// ============================================================================

/// Errors returned to a client in reply to a single request.
///
/// The `Display` form is the exact text of the RESP error frame, prefix
/// included. None of these close the connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Request was not a non-empty array of strings
    #[error("ERR {0}")]
    InvalidRequest(String),

    /// Command name is not recognised
    #[error("ERR unknown command '{name}', with args beginning with: {args}")]
    UnknownCommand {
        /// Command name as sent by the client
        name: String,
        /// Up to the first few arguments, each quoted
        args: String,
    },

    /// Command was given the wrong number of arguments
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),

    /// Argument or stored value is not a 64-bit integer
    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    /// Argument is not a valid float
    #[error("ERR value is not a valid float")]
    NotFloat,

    /// Score range bound is not a float
    #[error("ERR min or max is not a float")]
    InvalidScoreRange,

    /// Blocking timeout is not a number
    #[error("ERR timeout is not a float or out of range")]
    InvalidTimeout,

    /// Blocking timeout is negative
    #[error("ERR timeout is negative")]
    NegativeTimeout,

    /// Unrecognised trailing option
    #[error("ERR syntax error")]
    Syntax,

    /// Expiry deadline cannot be represented
    #[error("ERR invalid expire time in '{0}' command")]
    InvalidExpireTime(String),

    /// Key holds a value of another type
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// Integer arithmetic would overflow
    #[error("ERR increment or decrement would overflow")]
    Overflow,

    /// List index outside the list
    #[error("ERR index out of range")]
    IndexOutOfRange,

    /// Operation requires an existing key
    #[error("ERR no such key")]
    NoSuchKey,
}

// ============================================================================
// Append-Only File Errors
// ============================================================================

/// Append-only file errors.
#[derive(Debug, Error)]
pub enum AofError {
    /// I/O error opening, reading or writing the journal
    #[error("AOF I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Journal contains bytes that are not a valid command
    #[error("AOF corrupt at offset {offset}: {message}")]
    Corrupt {
        /// Byte offset of the offending frame
        offset: u64,
        /// What was wrong with it
        message: String,
    },

    /// Journal ends inside a command
    #[error("AOF truncated: partial command at offset {offset}")]
    Truncated {
        /// Byte offset where the partial command starts
        offset: u64,
    },
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `crimson` operations.
pub type Result<T> = std::result::Result<T, CrimsonError>;

// ============================================================================
// Tests
// ============================================================================
