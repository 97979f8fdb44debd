use std::{
    fmt::Debug,
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use alloy::{
    network::{Ethereum, Network},
    providers::{Provider, RootProvider},
    rpc::types::{Filter, Log},
    transports::{RpcError, TransportErrorKind, http::reqwest::Url},
};
use backon::{ExponentialBuilder, Retryable};
use thiserror::Error;
use tokio::time::{error::Elapsed, timeout};

/// Errors returned by [`RobustProvider`] calls.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The whole operation, retries included, exceeded the call timeout.
    #[error("Operation timed out")]
    Timeout,

    /// The node returned a transport or RPC error after all retries and fallbacks.
    #[error("RPC error: {0}")]
    RpcError(Arc<RpcError<TransportErrorKind>>),
}

impl From<RpcError<TransportErrorKind>> for Error {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        Error::RpcError(Arc::new(err))
    }
}

impl From<Elapsed> for Error {
    fn from(_: Elapsed) -> Self {
        Error::Timeout
    }
}

/// One node connection, plus where to dial it again.
#[derive(Clone, Debug)]
pub(crate) struct Endpoint<N: Network> {
    pub(crate) url: Option<Url>,
    pub(crate) provider: RootProvider<N>,
}

#[derive(Debug)]
pub(crate) struct Endpoints<N: Network> {
    pub(crate) primary: Endpoint<N>,
    pub(crate) fallbacks: Vec<Endpoint<N>>,
}

/// Provider wrapper with built-in retry and timeout mechanisms.
///
/// Every call is bounded by `call_timeout`, retried with exponential backoff on the primary
/// endpoint and then tried once per fallback endpoint, in the order they were added.
/// Endpoints built from a URL can be re-dialed with [`RobustProvider::reconnect`].
#[derive(Clone, Debug)]
pub struct RobustProvider<N: Network = Ethereum> {
    pub(crate) endpoints: Arc<RwLock<Endpoints<N>>>,
    pub(crate) call_timeout: Duration,
    pub(crate) max_retries: usize,
    pub(crate) min_delay: Duration,
}

impl<N: Network> RobustProvider<N> {
    pub(crate) fn from_endpoints(
        primary: Endpoint<N>,
        fallbacks: Vec<Endpoint<N>>,
        call_timeout: Duration,
        max_retries: usize,
        min_delay: Duration,
    ) -> Self {
        Self {
            endpoints: Arc::new(RwLock::new(Endpoints { primary, fallbacks })),
            call_timeout,
            max_retries,
            min_delay,
        }
    }

    /// Get a handle to the current primary provider
    #[must_use]
    pub fn primary(&self) -> RootProvider<N> {
        self.endpoints.read().unwrap_or_else(PoisonError::into_inner).primary.provider.clone()
    }

    /// Number of configured fallback endpoints.
    #[must_use]
    pub fn fallback_count(&self) -> usize {
        self.endpoints.read().unwrap_or_else(PoisonError::into_inner).fallbacks.len()
    }

    /// Fetch the latest block number with retry and timeout.
    ///
    /// # Errors
    ///
    /// See [retry errors](#retry-errors).
    pub async fn get_block_number(&self) -> Result<u64, Error> {
        debug!("eth_blockNumber called");
        let result = self
            .try_operation_with_failover(move |provider| async move {
                provider.get_block_number().await
            })
            .await;
        if let Err(e) = &result {
            error!(error = %e, "eth_blockNumber failed");
        }
        result
    }

    /// Fetch logs for the given [`Filter`] with retry and timeout.
    ///
    /// # Errors
    ///
    /// See [retry errors](#retry-errors).
    pub async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, Error> {
        debug!("eth_getLogs called");
        let result = self
            .try_operation_with_failover(move |provider| async move {
                provider.get_logs(filter).await
            })
            .await;
        if let Err(e) = &result {
            error!(error = %e, "eth_getLogs failed");
        }
        result
    }

    /// Drops every connection that was built from a URL and dials it again.
    ///
    /// Endpoints handed over as ready providers are kept as they are. A node that silently
    /// stopped answering on a long-lived connection is picked up again on the next call.
    ///
    /// # Errors
    ///
    /// Returns the first dial error; endpoints dialed before it stay replaced.
    pub async fn reconnect(&self) -> Result<(), Error> {
        let (primary_url, fallback_urls) = {
            let endpoints = self.endpoints.read().unwrap_or_else(PoisonError::into_inner);
            let fallback_urls: Vec<Option<Url>> =
                endpoints.fallbacks.iter().map(|endpoint| endpoint.url.clone()).collect();
            (endpoints.primary.url.clone(), fallback_urls)
        };

        if let Some(url) = primary_url {
            let provider = RootProvider::<N>::connect(url.as_str()).await?;
            self.endpoints.write().unwrap_or_else(PoisonError::into_inner).primary.provider =
                provider;
            info!(endpoint = %url, "Primary provider reconnected");
        }

        for (idx, url) in fallback_urls.into_iter().enumerate() {
            let Some(url) = url else { continue };
            let provider = RootProvider::<N>::connect(url.as_str()).await?;
            let mut endpoints = self.endpoints.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(endpoint) = endpoints.fallbacks.get_mut(idx) {
                endpoint.provider = provider;
            }
            info!(provider_num = idx + 1, "Fallback provider reconnected");
        }

        Ok(())
    }

    fn snapshot(&self) -> (RootProvider<N>, Vec<RootProvider<N>>) {
        let endpoints = self.endpoints.read().unwrap_or_else(PoisonError::into_inner);
        (
            endpoints.primary.provider.clone(),
            endpoints.fallbacks.iter().map(|endpoint| endpoint.provider.clone()).collect(),
        )
    }

    /// Execute `operation` with exponential backoff and a total timeout.
    ///
    /// Wraps the retry logic with `tokio::time::timeout(self.call_timeout, ...)` so
    /// the entire operation (including time spent inside the RPC call) cannot exceed
    /// `call_timeout`.
    ///
    /// If the primary provider fails and fallback providers are available, each fallback is
    /// attempted in sequence.
    ///
    /// # Errors
    /// <a name="retry-errors"></a>
    ///
    /// * Returns [`Error::Timeout`] if the last attempted provider timed out.
    /// * Propagates the last [`RpcError<TransportErrorKind>`] otherwise.
    pub(crate) async fn try_operation_with_failover<T: Debug, F, Fut>(
        &self,
        operation: F,
    ) -> Result<T, Error>
    where
        F: Fn(RootProvider<N>) -> Fut,
        Fut: Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        let (primary, fallbacks) = self.snapshot();
        let result = self.try_provider_with_timeout(&primary, &operation).await;

        let last_error = match result {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        self.try_fallback_providers(&fallbacks, &operation, last_error).await
    }

    async fn try_fallback_providers<T: Debug, F, Fut>(
        &self,
        fallbacks: &[RootProvider<N>],
        operation: F,
        mut last_error: Error,
    ) -> Result<T, Error>
    where
        F: Fn(RootProvider<N>) -> Fut,
        Fut: Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        let num_fallbacks = fallbacks.len();
        if num_fallbacks > 0 {
            info!("Primary provider failed, trying fallback provider(s)");
        }

        for (fallback_idx, provider) in fallbacks.iter().enumerate() {
            info!(provider_num = fallback_idx + 1, total = num_fallbacks, "Attempting fallback provider");

            match self.try_provider_with_timeout(provider, &operation).await {
                Ok(value) => {
                    info!(provider_num = fallback_idx + 1, "Fallback provider succeeded");
                    return Ok(value);
                }
                Err(e) => {
                    error!(provider_num = fallback_idx + 1, err = %e, "Fallback provider failed");
                    last_error = e;
                }
            }
        }

        if num_fallbacks > 0 {
            error!("All providers failed or timed out");
        }
        Err(last_error)
    }

    /// Try executing an operation with a specific provider with retry and timeout.
    async fn try_provider_with_timeout<T, F, Fut>(
        &self,
        provider: &RootProvider<N>,
        operation: F,
    ) -> Result<T, Error>
    where
        F: Fn(RootProvider<N>) -> Fut,
        Fut: Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        let retry_strategy = ExponentialBuilder::default()
            .with_max_times(self.max_retries)
            .with_min_delay(self.min_delay);

        timeout(
            self.call_timeout,
            (|| operation(provider.clone()))
                .retry(retry_strategy)
                .notify(|err: &RpcError<TransportErrorKind>, dur: Duration| {
                    info!(error = %err, delay = ?dur, "RPC error, retrying");
                })
                .sleep(tokio::time::sleep),
        )
        .await
        .map_err(Error::from)?
        .map_err(Error::from)
    }
}
