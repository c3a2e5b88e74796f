//! Reqwest-based client for the Consul KV HTTP API.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use keywatch_core::{BlockingResponse, KvPair, StoreClient, WatchIndex};
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::{ConsulConfig, Error, Result, TRACING_TARGET};

/// Response header carrying the blocking-query cursor.
pub const INDEX_HEADER: &str = "X-Consul-Index";

/// Request header carrying the ACL token.
pub const TOKEN_HEADER: &str = "X-Consul-Token";

/// Longest error body kept in [`Error::Status`].
const MAX_ERROR_BODY: usize = 512;

/// One entry of a `GET /v1/kv/<key>` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KvEntry {
    key: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    create_index: u64,
    #[serde(default)]
    modify_index: u64,
    #[serde(default)]
    flags: u64,
}

impl KvEntry {
    fn into_pair(self) -> Result<KvPair> {
        let value = match self.value {
            Some(encoded) => Bytes::from(STANDARD.decode(encoded)?),
            None => Bytes::new(),
        };

        Ok(KvPair {
            key: self.key,
            value,
            create_index: self.create_index,
            modify_index: self.modify_index,
            flags: self.flags,
        })
    }
}

/// Inner client that holds the HTTP client and configuration.
struct ConsulClientInner {
    http: Client,
    base_url: Url,
    config: ConsulConfig,
}

/// Client for one Consul agent.
///
/// Cloning is cheap and shares the underlying connection pool.
///
/// # Examples
///
/// ```rust,ignore
/// use keywatch_consul::{ConsulClient, ConsulConfig};
/// use keywatch_core::StoreClient;
///
/// let client = ConsulClient::new(ConsulConfig::new("127.0.0.1:8500"))?;
/// let pair = client.get("service/config.json").await?;
/// ```
#[derive(Clone)]
pub struct ConsulClient {
    inner: Arc<ConsulClientInner>,
}

impl std::fmt::Debug for ConsulClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsulClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl ConsulClient {
    /// Creates a client for the agent named by `config.consul_address`.
    ///
    /// No request is made until the first call.
    pub fn new(config: ConsulConfig) -> keywatch_core::Result<Self> {
        Ok(Self::build(config)?)
    }

    fn build(config: ConsulConfig) -> Result<Self> {
        let base_url = config.base_url()?;

        // Blocking queries set their own timeout per request.
        let http = Client::builder()
            .user_agent(config.user_agent())
            .connect_timeout(config.request_timeout())
            .build()?;

        tracing::debug!(
            target: TRACING_TARGET,
            base_url = %base_url,
            datacenter = config.consul_datacenter.as_deref(),
            "Created consul client"
        );

        let inner = ConsulClientInner {
            http,
            base_url,
            config,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ConsulConfig {
        &self.inner.config
    }

    /// Returns the resolved agent URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn kv_url(&self, key: &str) -> Result<Url> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidAddress(format!("'{}' has no host", self.inner.base_url)))?
            .pop_if_empty()
            .extend(["v1", "kv"])
            .extend(key.split('/'));
        Ok(url)
    }

    fn request(&self, key: &str, timeout: Duration) -> Result<RequestBuilder> {
        let config = &self.inner.config;
        let mut request = self.inner.http.get(self.kv_url(key)?).timeout(timeout);

        if let Some(datacenter) = config.consul_datacenter.as_deref() {
            request = request.query(&[("dc", datacenter)]);
        }
        if let Some(token) = config.consul_token.as_deref() {
            request = request.header(TOKEN_HEADER, token);
        }
        Ok(request)
    }

    /// Sends a prepared KV read and decodes the first entry.
    async fn read(
        &self,
        request: RequestBuilder,
    ) -> Result<(Option<WatchIndex>, Option<KvPair>)> {
        let response = request.send().await?;
        let status = response.status();
        let index = parse_index(response.headers());

        match status {
            StatusCode::NOT_FOUND => Ok((index, None)),
            status if status.is_success() => {
                let body = response.bytes().await?;
                let entries: Vec<KvEntry> = serde_json::from_slice(&body)?;
                let pair = entries.into_iter().next().map(KvEntry::into_pair).transpose()?;
                Ok((index, pair))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::Status {
                    status: status.as_u16(),
                    body: body.chars().take(MAX_ERROR_BODY).collect(),
                })
            }
        }
    }
}

#[async_trait::async_trait]
impl StoreClient for ConsulClient {
    async fn get(&self, key: &str) -> keywatch_core::Result<Option<KvPair>> {
        let request = self.request(key, self.inner.config.request_timeout())?;
        let (_, pair) = self.read(request).await?;

        tracing::trace!(
            target: TRACING_TARGET,
            key,
            found = pair.is_some(),
            "Read key"
        );
        Ok(pair)
    }

    async fn blocking_watch(
        &self,
        key: &str,
        cursor: WatchIndex,
        wait: Duration,
    ) -> keywatch_core::Result<BlockingResponse> {
        // The agent adds up to wait/16 of jitter on top of the requested wait.
        let timeout = wait + wait / 16 + self.inner.config.request_timeout();
        let request = self.request(key, timeout)?.query(&[
            ("index", cursor.get().to_string()),
            ("wait", format!("{}ms", wait.as_millis())),
        ]);

        let (index, pair) = self.read(request).await?;
        let index = index.ok_or(Error::MissingIndex)?;

        tracing::trace!(
            target: TRACING_TARGET,
            key,
            cursor = cursor.get(),
            index = index.get(),
            found = pair.is_some(),
            "Blocking query returned"
        );
        Ok(BlockingResponse { index, pair })
    }
}

fn parse_index(headers: &HeaderMap) -> Option<WatchIndex> {
    headers
        .get(INDEX_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(WatchIndex::new)
}
