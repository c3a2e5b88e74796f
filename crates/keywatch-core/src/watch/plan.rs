//! Watch specifications.

use std::collections::BTreeMap;

use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result};

/// Watch types a store may offer. Only [`WatchKind::Key`] can be run here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum WatchKind {
    /// A single key.
    Key,
    /// Every key under a prefix.
    KeyPrefix,
    /// The service catalog.
    Services,
    /// The node catalog.
    Nodes,
    /// Instances of one service.
    Service,
    /// Health checks.
    Checks,
    /// User events.
    Event,
}

/// Parameters accepted by [`WatchPlan::parse`].
pub type WatchParams = BTreeMap<String, String>;

/// A validated single-key watch specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchPlan {
    kind: WatchKind,
    key: String,
}

impl WatchPlan {
    /// Builds a plan watching `key`.
    pub fn key(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(Error::watch_setup().with_message("key watch requires a key"));
        }
        if key.starts_with('/') {
            return Err(Error::watch_setup()
                .with_message("key must not begin with a '/'")
                .with_context(key));
        }
        Ok(Self {
            kind: WatchKind::Key,
            key,
        })
    }

    /// Builds a plan from a parameter map such as `{type: key, key: config.json}`.
    ///
    /// Unknown parameters and watch types other than `key` are rejected.
    pub fn parse(params: &WatchParams) -> Result<Self> {
        let kind = params
            .get("type")
            .ok_or_else(|| Error::watch_setup().with_message("watch type must be specified"))?;
        let kind: WatchKind = kind.parse().map_err(|_| {
            Error::watch_setup()
                .with_message("unknown watch type")
                .with_context(kind.clone())
        })?;
        if kind != WatchKind::Key {
            return Err(Error::watch_setup()
                .with_message("unsupported watch type")
                .with_context(kind.to_string()));
        }

        let unknown: Vec<&str> = params
            .keys()
            .map(String::as_str)
            .filter(|name| !matches!(*name, "type" | "key"))
            .collect();
        if !unknown.is_empty() {
            return Err(Error::watch_setup()
                .with_message("invalid parameters")
                .with_context(unknown.join(", ")));
        }

        Self::key(params.get("key").cloned().unwrap_or_default())
    }

    /// Returns the watch type.
    #[inline]
    pub fn kind(&self) -> WatchKind {
        self.kind
    }

    /// Returns the watched key.
    #[inline]
    pub fn watched_key(&self) -> &str {
        &self.key
    }
}
