//! In-memory store implementations for testing.
//!
//! [`MemoryStore`] implements [`StoreClient`] with the same blocking-query
//! contract a real store offers: an existing key carries the index of its
//! last write, a missing key reports the store-wide index (as Consul does), a
//! query with a stale cursor returns at once, and a query with a current
//! cursor parks until the index moves or the wait elapses.
//!
//! # Feature Flag
//!
//! This module is only available when the `test-utils` feature is enabled:
//!
//! ```toml
//! [dev-dependencies]
//! keywatch-core = { version = "...", features = ["test-utils"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use keywatch_core::mock::{MemoryConnector, MemoryStore};
//! use keywatch_core::WatchProvider;
//!
//! let store = MemoryStore::default();
//! store.put("key1", "value").await;
//!
//! let provider = WatchProvider::new(MemoryConnector::new(store.clone()));
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{RwLock, watch};
use tokio::time::Instant;

use crate::store::{BlockingResponse, Connector, KvPair, StoreClient, WatchIndex};
use crate::{Error, Result};

#[derive(Debug, Default)]
struct MemoryState {
    last_index: u64,
    entries: HashMap<String, KvPair>,
}

impl MemoryState {
    fn snapshot(&self, key: &str) -> BlockingResponse {
        let pair = self.entries.get(key).cloned();
        let index = pair
            .as_ref()
            .map_or(self.last_index, |pair| pair.modify_index)
            .max(1);
        BlockingResponse {
            index: WatchIndex::new(index),
            pair,
        }
    }
}

#[derive(Debug)]
struct MemoryStoreInner {
    state: RwLock<MemoryState>,
    changes: watch::Sender<u64>,
    available: AtomicBool,
    watch_calls: AtomicUsize,
}

/// In-memory key-value store with blocking-query support.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(MemoryStoreInner {
                state: RwLock::new(MemoryState::default()),
                changes,
                available: AtomicBool::new(true),
                watch_calls: AtomicUsize::new(0),
            }),
        }
    }
}

impl MemoryStore {
    /// Writes `value` under `key` and returns the new index.
    pub async fn put(&self, key: &str, value: impl Into<Bytes>) -> u64 {
        let mut state = self.inner.state.write().await;
        state.last_index += 1;
        let index = state.last_index;

        let create_index = state
            .entries
            .get(key)
            .map_or(index, |pair| pair.create_index);
        state.entries.insert(
            key.to_owned(),
            KvPair {
                key: key.to_owned(),
                value: value.into(),
                create_index,
                modify_index: index,
                flags: 0,
            },
        );
        drop(state);

        self.inner.changes.send_replace(index);
        index
    }

    /// Deletes `key`; returns false if it did not exist.
    pub async fn delete(&self, key: &str) -> bool {
        let mut state = self.inner.state.write().await;
        if state.entries.remove(key).is_none() {
            return false;
        }
        state.last_index += 1;
        let index = state.last_index;
        drop(state);

        self.inner.changes.send_replace(index);
        true
    }

    /// Makes every subsequent call fail with a connection error, or restores service.
    ///
    /// Parked blocking queries are woken so that they observe the change.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
        self.inner.changes.send_modify(|_| {});
    }

    /// Returns the number of blocking queries started so far.
    pub fn watch_calls(&self) -> usize {
        self.inner.watch_calls.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> Result<()> {
        if self.inner.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::connection().with_message("memory store unavailable"))
        }
    }
}

#[async_trait::async_trait]
impl StoreClient for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<KvPair>> {
        self.ensure_available()?;
        Ok(self.inner.state.read().await.entries.get(key).cloned())
    }

    async fn blocking_watch(
        &self,
        key: &str,
        cursor: WatchIndex,
        wait: Duration,
    ) -> Result<BlockingResponse> {
        self.inner.watch_calls.fetch_add(1, Ordering::SeqCst);
        let deadline = Instant::now() + wait;
        let mut changes = self.inner.changes.subscribe();

        loop {
            self.ensure_available()?;

            let response = self.inner.state.read().await.snapshot(key);
            if response.index != cursor {
                return Ok(response);
            }

            match tokio::time::timeout_at(deadline, changes.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => {
                    return Err(Error::connection().with_message("memory store dropped"));
                }
                Err(_) => return Ok(response),
            }
        }
    }
}

/// Connector handing out [`MemoryStore`] handles.
///
/// Every endpoint shares one store. Endpoints registered with
/// [`refuse`](Self::refuse) fail construction with a connection error.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    store: MemoryStore,
    refused: Arc<HashSet<String>>,
    connects: Arc<AtomicUsize>,
}

impl MemoryConnector {
    /// Creates a connector serving `store`.
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            ..Default::default()
        }
    }

    /// Makes construction fail for `endpoint`.
    #[must_use]
    pub fn refuse(mut self, endpoint: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.refused).insert(endpoint.into());
        self
    }

    /// Returns the number of construction attempts.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Connector for MemoryConnector {
    type Client = MemoryStore;

    const PROVIDER_KIND: &'static str = "memory";

    fn connect(&self, endpoint: &str) -> Result<Self::Client> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refused.contains(endpoint) {
            return Err(Error::connection()
                .with_message("connection refused")
                .with_context(endpoint.to_owned()));
        }
        Ok(self.store.clone())
    }
}
