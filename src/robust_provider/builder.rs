use std::{pin::Pin, time::Duration};

use alloy::network::Network;

use crate::robust_provider::{
    IntoRootProvider, RobustProvider,
    provider::{Endpoint, Error},
};

type BoxedEndpointFuture<N> = Pin<Box<dyn Future<Output = Result<Endpoint<N>, Error>> + Send>>;

// RPC retry and timeout settings
/// Default timeout used by `RobustProvider`
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);
/// Default maximum number of retry attempts.
pub const DEFAULT_MAX_RETRIES: usize = 3;
/// Default base delay between retries.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(1);

async fn connect_endpoint<N: Network, P: IntoRootProvider<N>>(
    provider: P,
) -> Result<Endpoint<N>, Error> {
    let url = provider.endpoint_url();
    let provider = provider.into_root_provider().await?;
    Ok(Endpoint { url, provider })
}

/// Builder for constructing a [`RobustProvider`].
///
/// Use this to configure timeouts, retry/backoff, and one or more fallback providers.
pub struct RobustProviderBuilder<N: Network, P: IntoRootProvider<N>> {
    primary_provider: P,
    fallback_providers: Vec<BoxedEndpointFuture<N>>,
    call_timeout: Duration,
    max_retries: usize,
    min_delay: Duration,
}

impl<N: Network, P: IntoRootProvider<N>> RobustProviderBuilder<N, P> {
    /// Create a new [`RobustProvider`] with default settings.
    ///
    /// The provided provider is treated as the primary provider.
    /// Any type implementing [`IntoRootProvider`] can be used.
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self {
            primary_provider: provider,
            fallback_providers: vec![],
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            min_delay: DEFAULT_MIN_DELAY,
        }
    }

    /// Create a new [`RobustProvider`] with no retry attempts and only timeout set.
    ///
    /// The provided provider is treated as the primary provider.
    #[must_use]
    pub fn fragile(provider: P) -> Self {
        Self::new(provider).max_retries(0).min_delay(Duration::ZERO)
    }

    /// Add a fallback provider to the list.
    ///
    /// Fallback providers are used when the primary provider times out or fails.
    #[must_use]
    pub fn fallback<F: IntoRootProvider<N> + Send + 'static>(mut self, provider: F) -> Self {
        self.fallback_providers.push(Box::pin(connect_endpoint(provider)));
        self
    }

    /// Set the maximum timeout for RPC operations.
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the maximum number of retry attempts.
    #[must_use]
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay for exponential backoff retries.
    #[must_use]
    pub fn min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    /// Build the `RobustProvider`.
    ///
    /// Final builder method: consumes the builder and returns the built [`RobustProvider`].
    ///
    /// # Errors
    ///
    /// Returns an error if any of the providers fail to connect.
    pub async fn build(self) -> Result<RobustProvider<N>, Error> {
        debug!(
            call_timeout_ms = self.call_timeout.as_millis(),
            max_retries = self.max_retries,
            fallback_count = self.fallback_providers.len(),
            "Building RobustProvider"
        );

        let primary = connect_endpoint(self.primary_provider).await?;

        let mut fallbacks = Vec::with_capacity(self.fallback_providers.len());
        for (idx, fallback) in self.fallback_providers.into_iter().enumerate() {
            trace!(fallback_index = idx, "Connecting fallback provider");
            fallbacks.push(fallback.await?);
        }

        info!("RobustProvider initialized");

        Ok(RobustProvider::from_endpoints(
            primary,
            fallbacks,
            self.call_timeout,
            self.max_retries,
            self.min_delay,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::{network::Ethereum, providers::RootProvider, transports::http::reqwest::Url};

    #[tokio::test]
    async fn builder_accepts_mixed_fallback_types() -> anyhow::Result<()> {
        let url: Url = "http://localhost:8545".parse()?;
        let root_provider = RootProvider::<Ethereum>::new_http(url.clone());

        let robust = RobustProviderBuilder::new(root_provider)
            .fallback(RootProvider::<Ethereum>::new_http(url.clone()))
            .fallback(url)
            .call_timeout(Duration::from_secs(5))
            .build()
            .await?;

        assert_eq!(robust.fallback_count(), 2);
        assert_eq!(robust.call_timeout, Duration::from_secs(5));

        Ok(())
    }

    #[tokio::test]
    async fn fragile_disables_retries() -> anyhow::Result<()> {
        let url: Url = "http://localhost:8545".parse()?;
        let robust = RobustProviderBuilder::fragile(RootProvider::<Ethereum>::new_http(url))
            .build()
            .await?;

        assert_eq!(robust.max_retries, 0);
        assert_eq!(robust.min_delay, Duration::ZERO);

        Ok(())
    }
}
