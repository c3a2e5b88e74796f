//! Remote provider: snapshot reads, one-shot waits and change streams.

use std::sync::Arc;

use bytes::Bytes;

use crate::cache::ClientCache;
use crate::store::{Connector, StoreClient};
use crate::watch::{
    ChangeStream, WatchHandle, WatchKind, WatchOptions, WatchParams, WatchPlan, WatchSession,
};
use crate::{Error, ProviderDescriptor, Result, TRACING_TARGET_PROVIDER};

/// Operations a configuration loader needs from a remote key-value source.
#[async_trait::async_trait]
pub trait RemoteProvider: Send + Sync {
    /// Reads the current value of the described key.
    ///
    /// Fails with [`ErrorKind::NotFound`](crate::ErrorKind::NotFound) if the
    /// key does not exist; an existing key with an empty value succeeds.
    async fn fetch_once(&self, descriptor: &ProviderDescriptor) -> Result<Bytes>;

    /// Opens a change stream, takes its first message and cancels it.
    ///
    /// Without a prior cursor the first message reflects the *current*
    /// value, not necessarily a future one. An absent key yields an empty
    /// value rather than an error.
    async fn wait_for_change(&self, descriptor: &ProviderDescriptor) -> Result<Bytes>;

    /// Opens a change stream over the described key.
    ///
    /// Setup failures are delivered as the only message of an already-closed
    /// stream. Failures after the stream is running end it without a
    /// terminal message; callers that need resilience open a new stream.
    async fn open_change_stream(
        &self,
        descriptor: &ProviderDescriptor,
    ) -> (ChangeStream, WatchHandle);
}

/// [`RemoteProvider`] backed by a [`ClientCache`] of store clients.
///
/// Several providers may share one cache to reuse clients across them.
pub struct WatchProvider<C: Connector> {
    cache: Arc<ClientCache<C>>,
    options: WatchOptions,
}

impl<C: Connector> WatchProvider<C> {
    /// Creates a provider with its own cache.
    pub fn new(connector: C) -> Self {
        Self::with_cache(Arc::new(ClientCache::new(connector)))
    }

    /// Creates a provider over an existing cache.
    pub fn with_cache(cache: Arc<ClientCache<C>>) -> Self {
        Self {
            cache,
            options: WatchOptions::default(),
        }
    }

    /// Sets the options applied to every watch session.
    #[must_use]
    pub fn with_options(mut self, options: WatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the client cache.
    pub fn cache(&self) -> &Arc<ClientCache<C>> {
        &self.cache
    }

    /// Returns the watch options.
    pub fn options(&self) -> &WatchOptions {
        &self.options
    }

    /// Converts this provider into a [`RemoteService`].
    pub fn into_service(self) -> RemoteService {
        RemoteService::new(self)
    }

    fn check(&self, descriptor: &ProviderDescriptor) -> Result<()> {
        descriptor.validate()?;
        if !descriptor
            .provider_kind()
            .eq_ignore_ascii_case(C::PROVIDER_KIND)
        {
            return Err(Error::invalid_input()
                .with_message(format!(
                    "provider kind '{}' is not served by the {} provider",
                    descriptor.provider_kind(),
                    C::PROVIDER_KIND
                ))
                .with_context(descriptor.key_path().to_owned()));
        }
        Ok(())
    }

    async fn prepare(
        &self,
        descriptor: &ProviderDescriptor,
    ) -> Result<(Arc<C::Client>, WatchPlan)> {
        self.check(descriptor)?;
        let client = self.cache.resolve(descriptor.endpoint()).await?;
        let params = WatchParams::from([
            ("type".to_owned(), WatchKind::Key.to_string()),
            ("key".to_owned(), descriptor.key_path().to_owned()),
        ]);
        let plan = WatchPlan::parse(&params)?;
        Ok((client, plan))
    }
}

#[async_trait::async_trait]
impl<C: Connector> RemoteProvider for WatchProvider<C> {
    async fn fetch_once(&self, descriptor: &ProviderDescriptor) -> Result<Bytes> {
        self.check(descriptor)?;
        let client = self.cache.resolve(descriptor.endpoint()).await?;

        let pair = client.get(descriptor.key_path()).await?;
        let Some(pair) = pair else {
            tracing::debug!(
                target: TRACING_TARGET_PROVIDER,
                endpoint = %descriptor.endpoint(),
                key = %descriptor.key_path(),
                "Key not found"
            );
            return Err(Error::key_not_found(descriptor.key_path()));
        };

        tracing::debug!(
            target: TRACING_TARGET_PROVIDER,
            endpoint = %descriptor.endpoint(),
            key = %descriptor.key_path(),
            size_bytes = pair.value.len(),
            modify_index = pair.modify_index,
            "Fetched key"
        );
        Ok(pair.value)
    }

    async fn wait_for_change(&self, descriptor: &ProviderDescriptor) -> Result<Bytes> {
        let (mut stream, handle) = self.open_change_stream(descriptor).await;
        let message = stream.recv().await;
        handle.cancel();

        let Some(message) = message else {
            return Err(Error::background()
                .with_message("watch closed before delivering a value")
                .with_context(descriptor.key_path().to_owned()));
        };

        Ok(message.into_result()?.unwrap_or_default())
    }

    async fn open_change_stream(
        &self,
        descriptor: &ProviderDescriptor,
    ) -> (ChangeStream, WatchHandle) {
        match self.prepare(descriptor).await {
            Ok((client, plan)) => {
                tracing::debug!(
                    target: TRACING_TARGET_PROVIDER,
                    endpoint = %descriptor.endpoint(),
                    key = %descriptor.key_path(),
                    "Opening change stream"
                );
                WatchSession::start(client, plan, self.options.clone())
            }
            Err(err) => {
                tracing::warn!(
                    target: TRACING_TARGET_PROVIDER,
                    endpoint = %descriptor.endpoint(),
                    key = %descriptor.key_path(),
                    error = %err,
                    "Failed to open change stream"
                );
                WatchSession::<C::Client>::failed(err)
            }
        }
    }
}

impl<C: Connector> Clone for WatchProvider<C> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            options: self.options.clone(),
        }
    }
}

impl<C: Connector + std::fmt::Debug> std::fmt::Debug for WatchProvider<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchProvider")
            .field("cache", &self.cache)
            .field("options", &self.options)
            .finish()
    }
}

/// Cloneable, type-erased [`RemoteProvider`] for dependency injection.
#[derive(Clone)]
pub struct RemoteService {
    inner: Arc<dyn RemoteProvider>,
}

impl RemoteService {
    /// Wraps a provider.
    pub fn new(provider: impl RemoteProvider + 'static) -> Self {
        Self {
            inner: Arc::new(provider),
        }
    }
}

impl std::fmt::Debug for RemoteService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteService").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl RemoteProvider for RemoteService {
    async fn fetch_once(&self, descriptor: &ProviderDescriptor) -> Result<Bytes> {
        self.inner.fetch_once(descriptor).await
    }

    async fn wait_for_change(&self, descriptor: &ProviderDescriptor) -> Result<Bytes> {
        self.inner.wait_for_change(descriptor).await
    }

    async fn open_change_stream(
        &self,
        descriptor: &ProviderDescriptor,
    ) -> (ChangeStream, WatchHandle) {
        self.inner.open_change_stream(descriptor).await
    }
}
