//! Consul client configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Default agent address.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:8500";

/// Default long-poll wait: 5 minutes.
pub const DEFAULT_WAIT_SECS: u64 = 300;

/// Default timeout for non-blocking requests: 30 seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration shared by every Consul client a connector builds.
///
/// The address is overridden per endpoint by
/// [`ConsulConnector`](crate::ConsulConnector); everything else applies to
/// all endpoints.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct ConsulConfig {
    /// Consul agent address, `host:port` or a full `http(s)://` URL
    #[cfg_attr(
        feature = "config",
        arg(
            long = "consul-address",
            env = "CONSUL_HTTP_ADDR",
            default_value = DEFAULT_ADDRESS
        )
    )]
    #[serde(default = "default_address")]
    pub consul_address: String,

    /// URI scheme used when the address carries none (`http` or `https`)
    #[cfg_attr(feature = "config", arg(long = "consul-scheme", env = "CONSUL_SCHEME"))]
    #[serde(default)]
    pub consul_scheme: Option<String>,

    /// ACL token sent as `X-Consul-Token`
    #[cfg_attr(
        feature = "config",
        arg(long = "consul-token", env = "CONSUL_HTTP_TOKEN", hide_env_values = true)
    )]
    #[serde(default)]
    pub consul_token: Option<String>,

    /// Datacenter to query instead of the agent's own
    #[cfg_attr(
        feature = "config",
        arg(long = "consul-datacenter", env = "CONSUL_DATACENTER")
    )]
    #[serde(default)]
    pub consul_datacenter: Option<String>,

    /// Long-poll wait in seconds
    #[cfg_attr(
        feature = "config",
        arg(long = "consul-wait", env = "CONSUL_WAIT_SECS", default_value = "300")
    )]
    #[serde(default = "default_wait_secs")]
    pub consul_wait_secs: u64,

    /// Timeout for non-blocking requests in seconds
    #[cfg_attr(
        feature = "config",
        arg(
            long = "consul-timeout",
            env = "CONSUL_TIMEOUT_SECS",
            default_value = "30"
        )
    )]
    #[serde(default = "default_timeout_secs")]
    pub consul_timeout_secs: u64,
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_owned()
}

fn default_wait_secs() -> u64 {
    DEFAULT_WAIT_SECS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            consul_address: default_address(),
            consul_scheme: None,
            consul_token: None,
            consul_datacenter: None,
            consul_wait_secs: default_wait_secs(),
            consul_timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for ConsulConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsulConfig")
            .field("consul_address", &self.consul_address)
            .field("consul_scheme", &self.consul_scheme)
            .field("consul_token", &self.consul_token.as_ref().map(|_| "****"))
            .field("consul_datacenter", &self.consul_datacenter)
            .field("consul_wait_secs", &self.consul_wait_secs)
            .field("consul_timeout_secs", &self.consul_timeout_secs)
            .finish()
    }
}

impl ConsulConfig {
    /// Creates a configuration pointed at `address` with default settings.
    pub fn new(address: impl Into<String>) -> Self {
        Self::default().with_address(address)
    }

    /// Set the agent address.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.consul_address = address.into();
        self
    }

    /// Set the default scheme.
    #[must_use]
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.consul_scheme = Some(scheme.into());
        self
    }

    /// Set the ACL token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.consul_token = Some(token.into());
        self
    }

    /// Set the datacenter.
    #[must_use]
    pub fn with_datacenter(mut self, datacenter: impl Into<String>) -> Self {
        self.consul_datacenter = Some(datacenter.into());
        self
    }

    /// Set the long-poll wait in seconds.
    #[must_use]
    pub fn with_wait_secs(mut self, wait_secs: u64) -> Self {
        self.consul_wait_secs = wait_secs;
        self
    }

    /// Set the request timeout in seconds.
    #[must_use]
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.consul_timeout_secs = timeout_secs;
        self
    }

    /// Returns the effective long-poll wait, using the default if zero.
    pub fn wait_time(&self) -> Duration {
        match self.consul_wait_secs {
            0 => Duration::from_secs(DEFAULT_WAIT_SECS),
            secs => Duration::from_secs(secs),
        }
    }

    /// Returns the effective request timeout, using the default if zero.
    pub fn request_timeout(&self) -> Duration {
        match self.consul_timeout_secs {
            0 => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            secs => Duration::from_secs(secs),
        }
    }

    /// Returns the user agent sent with every request.
    pub fn user_agent(&self) -> String {
        format!("keywatch/{}", env!("CARGO_PKG_VERSION"))
    }

    /// Resolves the agent address into a base URL.
    ///
    /// Addresses without a scheme use [`consul_scheme`](Self::consul_scheme),
    /// `http` by default. Unix socket addresses are not supported.
    pub fn base_url(&self) -> Result<Url> {
        let address = self.consul_address.trim();
        if address.is_empty() {
            return Err(Error::InvalidAddress("address is empty".to_owned()));
        }

        let url = match address.split_once("://") {
            Some(("http" | "https", _)) => Url::parse(address)?,
            Some((scheme, _)) => {
                return Err(Error::InvalidAddress(format!(
                    "unsupported scheme '{scheme}' in '{address}'"
                )));
            }
            None => {
                let scheme = self.consul_scheme.as_deref().unwrap_or("http");
                if !matches!(scheme, "http" | "https") {
                    return Err(Error::InvalidAddress(format!(
                        "unsupported scheme '{scheme}'"
                    )));
                }
                Url::parse(&format!("{scheme}://{address}"))?
            }
        };

        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(Error::InvalidAddress(format!("'{address}' has no host")));
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConsulConfig::default();
        assert_eq!(config.consul_address, "127.0.0.1:8500");
        assert_eq!(config.wait_time(), Duration::from_secs(300));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.consul_token.is_none());
    }

    #[test]
    fn test_zero_durations_use_defaults() {
        let config = ConsulConfig::default()
            .with_wait_secs(0)
            .with_timeout_secs(0);
        assert_eq!(config.wait_time(), Duration::from_secs(DEFAULT_WAIT_SECS));
        assert_eq!(
            config.request_timeout(),
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_base_url_without_scheme() {
        let url = ConsulConfig::new("consul.local:8500").base_url().unwrap();
        assert_eq!(url.as_str(), "http://consul.local:8500/");

        let url = ConsulConfig::new("consul.local:8501")
            .with_scheme("https")
            .base_url()
            .unwrap();
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn test_base_url_with_scheme() {
        let url = ConsulConfig::new("https://consul.local")
            .base_url()
            .unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("consul.local"));
    }

    #[test]
    fn test_base_url_rejects_unsupported_addresses() {
        assert!(ConsulConfig::new("unix:///var/run/consul.sock")
            .base_url()
            .is_err());
        assert!(ConsulConfig::new("   ").base_url().is_err());
        assert!(ConsulConfig::new("consul.local")
            .with_scheme("ftp")
            .base_url()
            .is_err());
    }

    #[test]
    fn test_debug_hides_token() {
        let config = ConsulConfig::default().with_token("secret-token");
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("****"));
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: ConsulConfig =
            serde_json::from_str(r#"{"consul_datacenter":"dc2"}"#).unwrap();
        assert_eq!(config.consul_address, DEFAULT_ADDRESS);
        assert_eq!(config.consul_datacenter.as_deref(), Some("dc2"));
        assert_eq!(config.consul_wait_secs, DEFAULT_WAIT_SECS);
    }
}
