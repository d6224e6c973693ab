//! Server configuration.
//!
//! A [`ServerConfig`] comes from an optional YAML file (see [`loader`]),
//! is overridden by command-line flags and environment variables, then
//! checked by [`validation`].

pub mod loader;
pub mod validation;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resp::DEFAULT_MAX_FRAME_SIZE;

pub use loader::{ConfigLoader, LoadResult};
pub use validation::{ValidationResult, Validator};

/// How often the append-only file is synced to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FsyncPolicy {
    /// After every write.
    Always,
    /// Once per second from a background task.
    #[default]
    Everysec,
    /// Left to the operating system.
    No,
}

impl fmt::Display for FsyncPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Always => "always",
            Self::Everysec => "everysec",
            Self::No => "no",
        })
    }
}

/// Effective server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface to listen on.
    pub bind: String,
    /// TCP port; `0` picks a free one.
    pub port: u16,
    /// Connected clients allowed at once.
    pub max_clients: usize,
    /// Largest request a client may send, in bytes.
    pub max_frame_size: usize,
    /// Active expiry tick.
    #[serde(with = "humantime_duration")]
    pub expire_interval: Duration,
    /// Journal every write to `appendfilename`.
    pub appendonly: bool,
    pub appendfilename: PathBuf,
    pub appendfsync: FsyncPolicy,
    /// Serve Prometheus metrics on `127.0.0.1:<port>`.
    pub metrics_port: Option<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 6379,
            max_clients: 10_000,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            expire_interval: Duration::from_millis(100),
            appendonly: false,
            appendfilename: PathBuf::from("appendonly.aof"),
            appendfsync: FsyncPolicy::default(),
            metrics_port: None,
        }
    }
}

impl ServerConfig {
    /// `bind:port` as passed to the listener.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        if self.bind.contains(':') {
            format!("[{}]:{}", self.bind, self.port)
        } else {
            format!("{}:{}", self.bind, self.port)
        }
    }
}

/// Serde adapter for `humantime` strings such as `100ms` or `2s`.
mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
