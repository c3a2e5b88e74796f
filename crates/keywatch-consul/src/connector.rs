//! Connector that builds Consul clients per endpoint.

use keywatch_core::{Connector, Result, WatchOptions, WatchProvider};

use crate::{ConsulClient, ConsulConfig, TRACING_TARGET};

/// Provider kind served by [`ConsulConnector`].
pub const PROVIDER_KIND: &str = "consul";

/// Watch provider backed by Consul.
pub type ConsulProvider = WatchProvider<ConsulConnector>;

/// Builds [`ConsulClient`]s from a shared configuration.
///
/// The endpoint passed to [`connect`](Connector::connect) replaces the
/// configured address; token, datacenter and timeouts are shared.
#[derive(Debug, Clone, Default)]
pub struct ConsulConnector {
    config: ConsulConfig,
}

impl ConsulConnector {
    /// Creates a connector with the given configuration.
    pub fn new(config: ConsulConfig) -> Self {
        Self { config }
    }

    /// Returns the shared configuration.
    pub fn config(&self) -> &ConsulConfig {
        &self.config
    }

    /// Wraps this connector in a provider whose sessions use the configured wait.
    pub fn into_provider(self) -> ConsulProvider {
        let options = WatchOptions::default().with_wait_time(self.config.wait_time());
        WatchProvider::new(self).with_options(options)
    }
}

impl Connector for ConsulConnector {
    const PROVIDER_KIND: &'static str = PROVIDER_KIND;

    type Client = ConsulClient;

    fn connect(&self, endpoint: &str) -> Result<ConsulClient> {
        tracing::debug!(target: TRACING_TARGET, endpoint, "Connecting to consul agent");
        ConsulClient::new(self.config.clone().with_address(endpoint))
    }
}
