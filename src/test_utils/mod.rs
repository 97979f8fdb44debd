//! Fixtures for exercising a monitor without a node or a job service.
//!
//! * [`MockChain`] serves scripted logs and a scripted head, and can be told to fail.
//! * [`RecordingQueue`] accepts jobs, remembers them, and can reject chosen job types.
//! * [`LogBuilder`] encodes contract events into [`LogEvent`](crate::types::LogEvent)s.

mod chain;
mod logs;
pub mod macros;
mod queue;

pub use chain::MockChain;
pub use logs::LogBuilder;
pub use queue::RecordingQueue;
