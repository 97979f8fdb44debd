use std::sync::Arc;

use thiserror::Error;

use crate::{robust_provider::Error as RobustProviderError, store::StoreError};

/// Errors returned by monitor cycles and by [`MonitorBuilder::build`](crate::MonitorBuilder).
///
/// Cycle errors never stop the monitor: the failing cycle is abandoned without committing
/// partial progress and the next tick tries again. Transport and configuration failures of collect
/// are additionally reported to the error sink, see [`MonitorError::is_transport`] and
/// [`MonitorError::is_configuration`].
#[derive(Error, Debug, Clone)]
pub enum MonitorError {
    /// The chain node could not return logs for a query.
    #[error("failed to fetch logs: {0}")]
    FetchLogs(#[source] RobustProviderError),

    /// The chain node could not report its latest block.
    #[error("failed to fetch latest block: {0}")]
    LatestBlock(#[source] RobustProviderError),

    /// A required runtime setting is absent from the settings store.
    #[error("setting {0} is not set")]
    MissingSetting(&'static str),

    /// A runtime setting holds a value that is not a valid number.
    #[error("setting {key} has invalid value {value:?}")]
    InvalidSetting { key: &'static str, value: String },

    /// The persistence collaborator failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A job payload could not be encoded.
    #[error("failed to encode job payload: {0}")]
    Payload(Arc<serde_json::Error>),

    /// A collect cycle or schedule sweep exceeded the cycle timeout.
    #[error("cycle timed out")]
    CycleTimeout,

    /// The monitor was stopped while a cycle was waiting on the chain or the job queue.
    #[error("monitor cancelled")]
    Cancelled,

    /// Collect and schedule intervals must be greater than zero.
    #[error("Monitor interval must be greater than 0")]
    InvalidInterval,

    /// The cycle timeout must be greater than zero.
    #[error("Cycle timeout must be greater than 0")]
    InvalidCycleTimeout,

    /// The error sink capacity must be greater than zero.
    #[error("Error sink capacity must be greater than 0")]
    InvalidErrorSinkCapacity,

    /// The ratings period must be greater than zero.
    #[error("Rate after must be greater than 0")]
    InvalidRateAfter,
}

impl MonitorError {
    /// Errors that point at the chain connection and warrant a reconnect.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            MonitorError::FetchLogs(_) | MonitorError::LatestBlock(_) | MonitorError::CycleTimeout
        )
    }

    /// Errors caused by missing or malformed runtime settings.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, MonitorError::MissingSetting(_) | MonitorError::InvalidSetting { .. })
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(error: serde_json::Error) -> Self {
        MonitorError::Payload(Arc::new(error))
    }
}
