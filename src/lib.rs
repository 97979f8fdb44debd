//! Channel-Monitor watches the payment-channel contracts on an EVM chain and turns their logs
//! into jobs for the rest of the node.
//!
//! The main entry point is [`Monitor`], built via [`MonitorBuilder`] for one [`Role`] (agent or
//! client) and wired to three collaborators:
//!
//! * a [`ChainClient`], usually a [`robust_provider::RobustProvider`]
//! * a [`Store`] for settings, the collected logs, and the local entities they refer to
//! * a [`JobQueue`] that receives the produced jobs
//!
//! # Pipeline
//!
//! Work happens in two phases that run on their own timers:
//!
//! 1. **Collect** computes the next confirmed block window from the stored checkpoint, fetches
//!    the logs relevant to the node's local accounts, and stores them together with the new
//!    checkpoint in one transaction.
//! 2. **Schedule** sweeps the stored logs that have no job reference yet, maps each one to the
//!    jobs the role requires, submits them, and records the outcome.
//!
//! A log that needs no work is marked with [`IGNORED_JOB_ID`]. A log whose jobs could not be
//! submitted keeps no job reference, its failure counter is increased, and the next sweep
//! retries it.
//!
//! # Confirmations and reorgs
//!
//! Only blocks with at least `eth.min.confirmations` confirmations are collected, so shallow
//! reorganizations are never observed. Logs flagged as removed by the node are dropped.
//!
//! # Runtime settings
//!
//! Confirmations, freshness and the window cap are read from the store on every cycle (see
//! [`settings`]), so they can be changed without restarting the monitor.
//!
//! # Connection recovery
//!
//! Transport and configuration failures during collect are forwarded to an error sink. Transport
//! failures make it reset the chain client's connections. The failed cycle is simply retried on
//! the next tick.

#[macro_use]
mod logging;

pub mod chain;
pub mod contracts;
pub mod job;
pub mod monitor;
pub mod robust_provider;
pub mod settings;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;

mod error;

pub use chain::ChainClient;
pub use contracts::{Contracts, EventKind};
pub use error::MonitorError;
pub use job::{JobQueue, JobSpec, JobType, QueueError};
pub use monitor::{
    CollectOutcome, DEFAULT_COLLECT_INTERVAL, DEFAULT_CYCLE_TIMEOUT, DEFAULT_ERROR_SINK_CAPACITY,
    DEFAULT_RATE_AFTER, DEFAULT_SCHEDULE_INTERVAL, Monitor, MonitorBuilder, MonitorHandle,
    ScheduleReport,
};
pub use store::{MemoryStore, Store, StoreError};
pub use types::{IGNORED_JOB_ID, Role};
