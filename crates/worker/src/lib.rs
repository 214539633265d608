//! Job orchestration engine.
//!
//! Owns the registry of in-flight subprocesses, streams their output
//! through the line classifier onto the [`EventBus`](mediarelay_events::EventBus),
//! and tears every job down cleanly on completion, cancellation, or
//! shutdown.
//!
//! - [`Orchestrator`]: starts, cancels and shuts down jobs.
//! - [`JobRegistry`]: single-writer map of running jobs.
//! - [`job`]: job state machine and outcome types.

mod emitter;
pub mod job;
pub mod orchestrator;
pub mod plan;
mod process;
pub mod registry;
mod runner;

pub use job::{FailureReason, JobOutcome, JobResult, JobState};
pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorError, StartedJob};
pub use plan::JobParameters;
pub use registry::{JobRegistry, JobSummary, RegistryError};
