//! Per-endpoint store client cache.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::store::Connector;
use crate::{Error, Result, TRACING_TARGET_CACHE};

/// Maps endpoint addresses to lazily created, shared store clients.
///
/// At most one client exists per distinct endpoint string. Lookup and
/// creation happen under a single lock; [`Connector::connect`] performs no
/// network I/O, so the lock is never held across a request. Entries are never
/// evicted.
pub struct ClientCache<C: Connector> {
    connector: C,
    clients: Mutex<HashMap<String, Arc<C::Client>>>,
}

impl<C: Connector> ClientCache<C> {
    /// Creates an empty cache that builds clients with `connector`.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the client for `endpoint`, creating it on first use.
    ///
    /// A failed construction is returned as is and leaves no entry behind.
    pub async fn resolve(&self, endpoint: &str) -> Result<Arc<C::Client>> {
        if endpoint.trim().is_empty() {
            return Err(Error::invalid_input().with_message("endpoint must not be empty"));
        }

        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(endpoint) {
            return Ok(Arc::clone(client));
        }

        let client = match self.connector.connect(endpoint) {
            Ok(client) => Arc::new(client),
            Err(err) => {
                tracing::warn!(
                    target: TRACING_TARGET_CACHE,
                    endpoint = %endpoint,
                    error = %err,
                    "Failed to create store client"
                );
                return Err(err);
            }
        };

        clients.insert(endpoint.to_owned(), Arc::clone(&client));

        tracing::debug!(
            target: TRACING_TARGET_CACHE,
            endpoint = %endpoint,
            provider = C::PROVIDER_KIND,
            cached = clients.len(),
            "Created store client"
        );

        Ok(client)
    }

    /// Returns the number of cached clients.
    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Returns true if no client has been created yet.
    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }
}

impl<C: Connector + std::fmt::Debug> std::fmt::Debug for ClientCache<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCache")
            .field("connector", &self.connector)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::mock::MemoryConnector;

    #[tokio::test]
    async fn test_same_endpoint_shares_client() {
        let connector = MemoryConnector::default();
        let cache = ClientCache::new(connector.clone());

        let first = cache.resolve("127.0.0.1:8500").await.unwrap();
        let second = cache.resolve("127.0.0.1:8500").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(connector.connects(), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_distinct_endpoints_get_distinct_clients() {
        let cache = ClientCache::new(MemoryConnector::default());

        let first = cache.resolve("10.0.0.1:8500").await.unwrap();
        let second = cache.resolve("10.0.0.2:8500").await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_resolution_creates_one_client() {
        let connector = MemoryConnector::default();
        let cache = Arc::new(ClientCache::new(connector.clone()));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.resolve("127.0.0.1:8500").await })
            })
            .collect();

        let mut clients = Vec::new();
        for task in tasks {
            clients.push(task.await.unwrap().unwrap());
        }

        assert_eq!(connector.connects(), 1);
        assert!(clients.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn test_failed_connect_is_not_cached() {
        let connector = MemoryConnector::default().refuse("dead:8500");
        let cache = ClientCache::new(connector.clone());

        let error = cache.resolve("dead:8500").await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Connection);
        assert!(cache.is_empty().await);

        let error = cache.resolve("dead:8500").await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Connection);
        assert_eq!(connector.connects(), 2);
    }

    #[tokio::test]
    async fn test_empty_endpoint_is_rejected() {
        let cache = ClientCache::new(MemoryConnector::default());
        let error = cache.resolve("").await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::InvalidInput);
    }
}
