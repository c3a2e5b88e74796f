#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod client;
mod config;
mod connector;
mod error;

#[cfg(test)]
mod testing;

pub use client::{ConsulClient, INDEX_HEADER, TOKEN_HEADER};
pub use config::{ConsulConfig, DEFAULT_ADDRESS, DEFAULT_TIMEOUT_SECS, DEFAULT_WAIT_SECS};
pub use connector::{ConsulConnector, ConsulProvider, PROVIDER_KIND};
pub use error::{Error, Result};

/// Tracing target for Consul client operations.
pub const TRACING_TARGET: &str = "keywatch_consul::client";
