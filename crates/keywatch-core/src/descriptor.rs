//! Caller-supplied identification of a watched key.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Identifies a single key on a remote store.
///
/// The descriptor is an immutable value: it is built by the caller for each
/// request and never retained by the provider beyond the call. Client reuse is
/// keyed on [`endpoint`](Self::endpoint) alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    provider_kind: String,
    endpoint: String,
    key_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secret_ref: Option<String>,
}

impl ProviderDescriptor {
    /// Creates a descriptor for `key_path` on the store at `endpoint`.
    pub fn new(
        provider_kind: impl Into<String>,
        endpoint: impl Into<String>,
        key_path: impl Into<String>,
    ) -> Self {
        Self {
            provider_kind: provider_kind.into(),
            endpoint: endpoint.into(),
            key_path: key_path.into(),
            secret_ref: None,
        }
    }

    /// Attaches a reference to a secret (for example a keyring path).
    #[must_use]
    pub fn with_secret_ref(mut self, secret_ref: impl Into<String>) -> Self {
        self.secret_ref = Some(secret_ref.into());
        self
    }

    /// Returns the provider kind, e.g. `consul`.
    #[inline]
    pub fn provider_kind(&self) -> &str {
        &self.provider_kind
    }

    /// Returns the store endpoint address.
    #[inline]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the key path.
    #[inline]
    pub fn key_path(&self) -> &str {
        &self.key_path
    }

    /// Returns the secret reference, if any.
    #[inline]
    pub fn secret_ref(&self) -> Option<&str> {
        self.secret_ref.as_deref()
    }

    /// Checks that the descriptor names an endpoint and a key.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::invalid_input().with_message("endpoint must not be empty"));
        }
        if self.key_path.trim().is_empty() {
            return Err(Error::invalid_input().with_message("key path must not be empty"));
        }
        Ok(())
    }
}
