use alloy::{
    network::{Ethereum, Network},
    providers::RootProvider,
    transports::http::reqwest::Url,
};

use crate::robust_provider::provider::Error;

/// Endpoints a [`RobustProviderBuilder`](crate::robust_provider::RobustProviderBuilder) can be
/// built from: an already connected [`RootProvider`] or a connection string.
///
/// Connection strings are remembered so the endpoint can be dialed again after a transport
/// failure.
pub trait IntoRootProvider<N: Network = Ethereum> {
    /// Convert `self` into a [`RootProvider`].
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying provider cannot be constructed or connected.
    fn into_root_provider(self) -> impl Future<Output = Result<RootProvider<N>, Error>> + Send;

    /// Where the provider can be dialed again, if it was built from a connection string.
    ///
    /// [`RobustProvider::reconnect`](crate::robust_provider::RobustProvider::reconnect) only
    /// replaces endpoints that report a URL.
    fn endpoint_url(&self) -> Option<Url> {
        None
    }
}

impl<N: Network> IntoRootProvider<N> for RootProvider<N> {
    async fn into_root_provider(self) -> Result<RootProvider<N>, Error> {
        Ok(self)
    }
}

impl<N: Network> IntoRootProvider<N> for &str {
    async fn into_root_provider(self) -> Result<RootProvider<N>, Error> {
        Ok(RootProvider::connect(self).await?)
    }

    fn endpoint_url(&self) -> Option<Url> {
        self.parse().ok()
    }
}

impl<N: Network> IntoRootProvider<N> for String {
    async fn into_root_provider(self) -> Result<RootProvider<N>, Error> {
        Ok(RootProvider::connect(&self).await?)
    }

    fn endpoint_url(&self) -> Option<Url> {
        self.parse().ok()
    }
}

impl<N: Network> IntoRootProvider<N> for Url {
    async fn into_root_provider(self) -> Result<RootProvider<N>, Error> {
        Ok(RootProvider::connect(self.as_str()).await?)
    }

    fn endpoint_url(&self) -> Option<Url> {
        Some(self.clone())
    }
}
