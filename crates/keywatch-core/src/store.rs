//! Store client abstraction consumed by the cache, the reader and the watch loop.
//!
//! A store offers two calls per key: a plain lookup and a blocking query that
//! returns once the key changes relative to a cursor or after a wait timeout.
//! [`Connector`] builds clients for an endpoint so that
//! [`ClientCache`](crate::ClientCache) can reuse them.

use std::time::Duration;

use bytes::Bytes;
use derive_more::{Display, From, Into};

use crate::Result;

/// A key and the raw value stored under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    /// Full key path.
    pub key: String,
    /// Raw value; may be empty for an existing key.
    pub value: Bytes,
    /// Index at which the key was created.
    pub create_index: u64,
    /// Index of the last modification of the key.
    pub modify_index: u64,
    /// Opaque flags attached by the writer.
    pub flags: u64,
}

/// Long-poll cursor returned by a blocking query.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Display, From, Into)]
pub struct WatchIndex(u64);

impl WatchIndex {
    /// Cursor of a query with no prior observation; the store answers at once.
    pub const ZERO: Self = Self(0);

    /// Creates a cursor from a raw index.
    #[inline]
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns true for the initial cursor.
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Computes the cursor for the next query from the index just observed.
    ///
    /// An index lower than the current cursor means the store was reset or
    /// restored, so the cursor starts over from zero.
    #[must_use]
    pub fn advance(self, observed: WatchIndex) -> WatchIndex {
        if observed < self { Self::ZERO } else { observed }
    }
}

/// Result of one blocking query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockingResponse {
    /// Index to carry into the next query.
    pub index: WatchIndex,
    /// Current pair, `None` if the key is absent.
    pub pair: Option<KvPair>,
}

/// Client for a single store endpoint.
#[async_trait::async_trait]
pub trait StoreClient: Send + Sync + 'static {
    /// Looks up `key` without blocking.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<KvPair>>;

    /// Blocks until `key` changes relative to `cursor` or `wait` elapses.
    ///
    /// A zero cursor returns immediately with the current state. When `wait`
    /// elapses without change the returned index equals `cursor`. Dropping
    /// the future cancels the call.
    async fn blocking_watch(
        &self,
        key: &str,
        cursor: WatchIndex,
        wait: Duration,
    ) -> Result<BlockingResponse>;
}

/// Builds store clients for endpoints.
pub trait Connector: Send + Sync + 'static {
    /// Provider kind served by this connector, e.g. `consul`.
    const PROVIDER_KIND: &'static str;

    /// Client type produced by [`connect`](Self::connect).
    type Client: StoreClient;

    /// Creates a client pointed at `endpoint`.
    ///
    /// Implementations must not perform network I/O here: the call is made
    /// while holding the client cache lock.
    fn connect(&self, endpoint: &str) -> Result<Self::Client>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_moves_forward() {
        let cursor = WatchIndex::new(10);
        assert_eq!(cursor.advance(WatchIndex::new(12)), WatchIndex::new(12));
        assert_eq!(cursor.advance(WatchIndex::new(10)), cursor);
    }

    #[test]
    fn test_advance_resets_when_index_goes_backwards() {
        let cursor = WatchIndex::new(10);
        assert_eq!(cursor.advance(WatchIndex::new(3)), WatchIndex::ZERO);
    }

    #[test]
    fn test_conversions() {
        let cursor = WatchIndex::from(42);
        assert_eq!(u64::from(cursor), 42);
        assert_eq!(cursor.to_string(), "42");
        assert!(WatchIndex::default().is_zero());
    }
}
