//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── consul: ConsulConfig   # Agent address, token, datacenter, timeouts
//! ├── watch: WatchArgs       # Session options
//! └── command: Command       # get | wait | watch <key>
//! ```
//!
//! All Consul options can be provided via CLI arguments or environment
//! variables. Use `--help` to see all available options.

use clap::{Args, Parser, Subcommand};
use keywatch_consul::{ConsulConfig, ConsulConnector, ConsulProvider, PROVIDER_KIND};
use keywatch_core::{ProviderDescriptor, WatchOptions};

use crate::TRACING_TARGET_CONFIG;

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "keywatch")]
#[command(about = "Read and watch keys in a Consul KV store")]
#[command(version)]
pub struct Cli {
    /// Consul agent connection settings.
    #[clap(flatten)]
    pub consul: ConsulConfig,

    /// Watch session settings.
    #[clap(flatten)]
    pub watch: WatchArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Watch session settings.
#[derive(Debug, Clone, Args)]
pub struct WatchArgs {
    /// Report a final error when a running watch fails instead of ending quietly
    #[arg(long = "background-errors", env = "KEYWATCH_BACKGROUND_ERRORS")]
    pub background_errors: bool,
}

/// Operation to run against a key.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the current value of a key
    Get {
        /// Key path, e.g. `service/config.json`
        key: String,
    },
    /// Wait for the first observed value of a key and print it
    Wait {
        /// Key path, e.g. `service/config.json`
        key: String,
    },
    /// Print every observed value of a key until interrupted
    Watch {
        /// Key path, e.g. `service/config.json`
        key: String,
    },
}

impl Command {
    /// Returns the key the command operates on.
    pub fn key(&self) -> &str {
        match self {
            Self::Get { key } | Self::Wait { key } | Self::Watch { key } => key,
        }
    }
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Builds the Consul provider described by the configuration.
    pub fn provider(&self) -> ConsulProvider {
        let options = WatchOptions::default()
            .with_wait_time(self.consul.wait_time())
            .with_background_errors(self.watch.background_errors);
        ConsulConnector::new(self.consul.clone())
            .into_provider()
            .with_options(options)
    }

    /// Returns the descriptor of the key named by the command.
    pub fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor::new(
            PROVIDER_KIND,
            self.consul.consul_address.clone(),
            self.command.key(),
        )
    }

    /// Logs the effective configuration.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            address = %self.consul.consul_address,
            datacenter = self.consul.consul_datacenter.as_deref(),
            token = self.consul.consul_token.is_some(),
            wait_secs = self.consul.wait_time().as_secs(),
            background_errors = self.watch.background_errors,
            key = self.command.key(),
            "consul configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_parse_watch_command() {
        let cli = Cli::try_parse_from([
            "keywatch",
            "--consul-address",
            "consul.local:8500",
            "--consul-datacenter",
            "dc2",
            "--consul-wait",
            "60",
            "watch",
            "service/config.json",
        ])
        .unwrap();

        assert!(matches!(cli.command, Command::Watch { .. }));
        assert_eq!(cli.command.key(), "service/config.json");
        assert_eq!(cli.consul.consul_datacenter.as_deref(), Some("dc2"));

        let descriptor = cli.descriptor();
        assert_eq!(descriptor.provider_kind(), "consul");
        assert_eq!(descriptor.endpoint(), "consul.local:8500");
        assert_eq!(cli.provider().options().wait_time, Duration::from_secs(60));
    }

    #[test]
    fn test_background_errors_flag() {
        let cli = Cli::try_parse_from(["keywatch", "--background-errors", "get", "key"]).unwrap();
        assert!(cli.provider().options().report_background_errors);
    }

    #[test]
    fn test_command_requires_key() {
        assert!(Cli::try_parse_from(["keywatch", "get"]).is_err());
        assert!(Cli::try_parse_from(["keywatch"]).is_err());
    }
}
