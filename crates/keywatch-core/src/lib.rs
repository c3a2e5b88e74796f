#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for client cache operations.
///
/// Use this target for logging client creation and construction failures.
pub const TRACING_TARGET_CACHE: &str = "keywatch_core::cache";

/// Tracing target for watch sessions.
///
/// Use this target for logging long-poll loop lifecycle and background errors.
pub const TRACING_TARGET_WATCH: &str = "keywatch_core::watch";

/// Tracing target for provider operations.
pub const TRACING_TARGET_PROVIDER: &str = "keywatch_core::provider";

mod cache;
mod descriptor;
mod error;
mod message;
mod provider;

pub mod store;
pub mod watch;

#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub mod mock;

pub use cache::ClientCache;
pub use descriptor::ProviderDescriptor;
pub use error::{BoxedError, Error, ErrorKind, Result};
pub use message::WatchMessage;
pub use provider::{RemoteProvider, RemoteService, WatchProvider};
pub use store::{BlockingResponse, Connector, KvPair, StoreClient, WatchIndex};
pub use watch::{ChangeStream, SessionState, WatchHandle, WatchOptions, WatchPlan};
