//! Robust, retrying wrapper around Alloy providers.
//!
//! This module exposes [`RobustProvider`], a small wrapper around Alloy's
//! [`RootProvider`](alloy::providers::RootProvider) that adds:
//! * bounded per-call timeouts
//! * exponential backoff retries
//! * transparent failover between a primary and one or more fallback providers
//! * re-dialing of URL-backed endpoints after the monitor reports a transport failure
//!
//! Use [`RobustProviderBuilder`] to construct a provider from connection strings or connected
//! [`RootProvider`](alloy::providers::RootProvider)s, see [`IntoRootProvider`].
//!
//! # How it works
//!
//! All RPC calls performed through [`RobustProvider`] are wrapped in a total
//! timeout and retried with exponential backoff up to `max_retries`. If the
//! primary provider keeps failing, the call is retried against the configured
//! fallback providers in the order they were added.
//!
//! # Examples
//!
//! ```rust,no_run
//! use alloy::network::Ethereum;
//! use channel_monitor::robust_provider::{RobustProvider, RobustProviderBuilder};
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let robust: RobustProvider<Ethereum> = RobustProviderBuilder::new("http://localhost:8545")
//!     .fallback("http://localhost:8546")
//!     .call_timeout(Duration::from_secs(30))
//!     .build()
//!     .await?;
//!
//! let block_number = robust.get_block_number().await?;
//! println!("Current block: {block_number}");
//!
//! // Drop and re-dial both endpoints.
//! robust.reconnect().await?;
//! # Ok(()) }
//! ```

pub mod builder;
pub mod provider;
pub mod provider_conversion;

pub use builder::*;
pub use provider::{Error, RobustProvider};
pub use provider_conversion::IntoRootProvider;
