//! Client configuration: tracker endpoints, timeouts, and I/O tuning.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::{DfsError, Result};

/// Address of one configured tracker server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerAddr {
    pub host: String,
    pub port: u16,
}

impl TrackerAddr {
    /// Creates a tracker address from host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for TrackerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for TrackerAddr {
    type Err = DfsError;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s.rsplit_once(':').ok_or_else(|| DfsError::Configuration {
            reason: format!("tracker address '{s}' must be host:port"),
        })?;
        let port = port.parse().map_err(|_| DfsError::Configuration {
            reason: format!("tracker address '{s}' has an invalid port"),
        })?;
        Ok(Self::new(host, port))
    }
}

/// Configuration shared by every client operation.
///
/// Supplied at construction and immutable afterwards; only the failover
/// rotation index changes at runtime.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Tracker endpoints tried in round-robin order
    pub trackers: Vec<TrackerAddr>,
    /// Connect and idle timeout applied to every socket
    pub timeout: Duration,
    /// Charset used for string fields on the wire
    pub charset: &'static str,
    /// Extension used when an upload source has none
    pub default_extension: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            trackers: Vec::new(),
            timeout: Duration::from_secs(10),
            charset: "utf-8",
            default_extension: String::new(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for the given trackers with default tuning.
    pub fn new(trackers: Vec<TrackerAddr>) -> Self {
        Self {
            trackers,
            ..Self::default()
        }
    }

    /// Creates configuration with environment variable overrides.
    ///
    /// `DRIFTFS_TRACKERS` is a comma-separated `host:port` list;
    /// `DRIFTFS_TIMEOUT_SECS` overrides the socket timeout.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(list) = std::env::var("DRIFTFS_TRACKERS") {
            config.trackers = list
                .split(',')
                .filter_map(|addr| addr.trim().parse().ok())
                .collect();
        }

        if let Ok(timeout) = std::env::var("DRIFTFS_TIMEOUT_SECS") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.timeout = Duration::from_secs(seconds);
            }
        }

        config
    }

    /// Validates the configuration before any network traffic.
    ///
    /// # Errors
    /// - `DfsError::Configuration` - Empty tracker list, blank host, or zero port
    pub fn validate(&self) -> Result<()> {
        if self.trackers.is_empty() {
            return Err(DfsError::Configuration {
                reason: "tracker list is empty, at least one tracker is required".to_string(),
            });
        }

        for tracker in &self.trackers {
            if tracker.host.is_empty() || tracker.port == 0 {
                return Err(DfsError::Configuration {
                    reason: format!("tracker '{tracker}' must have a host and a non-zero port"),
                });
            }
        }

        Ok(())
    }
}
