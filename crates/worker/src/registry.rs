//! Registry of running jobs.
//!
//! [`JobRegistry`] is the only shared mutable structure in the engine.
//! Every mutation goes through its write lock, so inserts, removals and
//! bulk termination are serialized. Each entry carries the job's
//! termination handle; signalling it is idempotent.

use std::collections::HashMap;

use chrono::Utc;
use mediarelay_core::types::{JobId, JobKind, Timestamp};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Errors from registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A job with this id is already registered. Never expected at runtime.
    #[error("Duplicate job id: {0}")]
    DuplicateJobId(JobId),

    #[error("Job not found: {0}")]
    NotFound(JobId),
}

/// Public view of one running job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub job_id: JobId,
    pub kind: JobKind,
    pub started_at: Timestamp,
}

/// Internal bookkeeping for a single job.
struct JobEntry {
    kind: JobKind,
    started_at: Timestamp,
    /// Termination handle, a child of the orchestrator's master token.
    cancel: CancellationToken,
}

impl JobEntry {
    fn summary(&self, job_id: &JobId) -> JobSummary {
        JobSummary {
            job_id: job_id.clone(),
            kind: self.kind,
            started_at: self.started_at,
        }
    }
}

/// Map from job id to live job handle.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, JobEntry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a job. Fails if the id is already present.
    pub async fn register(
        &self,
        job_id: JobId,
        kind: JobKind,
        cancel: CancellationToken,
    ) -> Result<(), RegistryError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job_id) {
            return Err(RegistryError::DuplicateJobId(job_id));
        }
        jobs.insert(
            job_id,
            JobEntry {
                kind,
                started_at: Utc::now(),
                cancel,
            },
        );
        Ok(())
    }

    /// Remove a job and return its summary.
    ///
    /// Returns [`RegistryError::NotFound`] if the job was already removed,
    /// e.g. by [`JobRegistry::terminate_all`] racing a natural exit.
    pub async fn unregister(&self, job_id: &JobId) -> Result<JobSummary, RegistryError> {
        let mut jobs = self.jobs.write().await;
        jobs.remove(job_id)
            .map(|entry| entry.summary(job_id))
            .ok_or_else(|| RegistryError::NotFound(job_id.clone()))
    }

    /// Signal one job to terminate. The entry stays until the job
    /// unregisters itself.
    pub async fn terminate(&self, job_id: &JobId) -> Result<(), RegistryError> {
        let jobs = self.jobs.read().await;
        let entry = jobs
            .get(job_id)
            .ok_or_else(|| RegistryError::NotFound(job_id.clone()))?;
        entry.cancel.cancel();
        Ok(())
    }

    /// Signal every registered job to terminate and clear the registry.
    ///
    /// Entries are drained under the lock and signalled after it is
    /// released, so each entry is visited exactly once. Returns the
    /// number of jobs signalled.
    pub async fn terminate_all(&self) -> usize {
        let drained: Vec<(JobId, JobEntry)> = self.jobs.write().await.drain().collect();

        for (job_id, entry) in &drained {
            tracing::info!(job_id = %job_id, kind = %entry.kind, "Terminating job");
            entry.cancel.cancel();
        }

        drained.len()
    }

    pub async fn contains(&self, job_id: &JobId) -> bool {
        self.jobs.read().await.contains_key(job_id)
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Snapshot of running jobs, oldest first.
    pub async fn snapshot(&self) -> Vec<JobSummary> {
        let jobs = self.jobs.read().await;
        let mut list: Vec<JobSummary> = jobs.iter().map(|(id, e)| e.summary(id)).collect();
        list.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.job_id.as_str().cmp(b.job_id.as_str()))
        });
        list
    }
}
