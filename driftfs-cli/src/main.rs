//! Driftfs CLI - Command-line interface
//!
//! Provides command-line access to a tracker/storage file cluster.

mod commands;

use std::time::Duration;

use clap::Parser;
use driftfs_core::{ClientConfig, DfsClient};

#[derive(Parser)]
#[command(name = "driftfs")]
#[command(about = "A client for a tracker/storage distributed file cluster")]
struct Cli {
    /// Tracker address as host:port, repeatable for failover.
    /// Falls back to the DRIFTFS_TRACKERS environment variable.
    #[arg(short, long = "tracker", global = true)]
    trackers: Vec<String>,

    /// Socket connect and idle timeout in seconds.
    /// Falls back to DRIFTFS_TIMEOUT_SECS, then to 10 seconds.
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: commands::Commands,
}

/// Builds the client configuration from flags and the environment.
///
/// Flags win over environment variables: an explicit tracker list replaces
/// `DRIFTFS_TRACKERS`, and an explicit timeout replaces
/// `DRIFTFS_TIMEOUT_SECS`. Unset flags leave the environment values intact.
fn resolve_config(trackers: &[String], timeout: Option<u64>) -> driftfs_core::Result<ClientConfig> {
    let mut config = ClientConfig::from_env();

    if !trackers.is_empty() {
        config.trackers = trackers
            .iter()
            .map(|addr| addr.parse())
            .collect::<driftfs_core::Result<Vec<_>>>()?;
    }
    if let Some(seconds) = timeout {
        config.timeout = Duration::from_secs(seconds);
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = resolve_config(&cli.trackers, cli.timeout)?;
    tracing::debug!(
        trackers = config.trackers.len(),
        timeout_secs = config.timeout.as_secs(),
        "resolved client configuration"
    );

    let client = DfsClient::new(config)?;
    commands::handle_command(&client, cli.command).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_flag_overrides_environment() {
        // set_var is process-global; no other test touches this variable.
        unsafe { std::env::set_var("DRIFTFS_TIMEOUT_SECS", "42") };

        let from_env = resolve_config(&[], None).unwrap();
        assert_eq!(from_env.timeout, Duration::from_secs(42));

        let from_flag = resolve_config(&[], Some(5)).unwrap();
        assert_eq!(from_flag.timeout, Duration::from_secs(5));

        unsafe { std::env::remove_var("DRIFTFS_TIMEOUT_SECS") };
    }

    #[test]
    fn test_tracker_flags_replace_environment() {
        let trackers = ["10.0.0.1:22122".to_string(), "10.0.0.2:22122".to_string()];
        let config = resolve_config(&trackers, None).unwrap();
        assert_eq!(config.trackers.len(), 2);
        assert_eq!(config.trackers[0].host, "10.0.0.1");

        assert!(resolve_config(&["bad-address".to_string()], None).is_err());
    }
}
