//! Mediarelay event channel.
//!
//! - [`EventBus`]: in-process live tail backed by
//!   `tokio::sync::broadcast`.
//! - [`LogEvent`]: the job-scoped, typed log record delivered to every
//!   connected observer.

pub mod bus;

pub use bus::{DownloadLink, EventBus, LogEvent};
pub use mediarelay_core::types::Severity;
