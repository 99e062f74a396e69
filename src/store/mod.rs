//! Persistent job store contract, plus an in-memory reference implementation
//! and a PostgreSQL-backed implementation.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PostgresConfig, PostgresStore};

use std::collections::BTreeSet;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::job::{Job, JobId, State};

/// Errors raised by a [`Store`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No job exists with the given id.
    #[error("no such job: {0}")]
    NotFound(JobId),
    /// The underlying backend rejected the operation.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Either filter jobs by archived status, or return every job regardless of
/// it. If both id lists on a query are empty and the caller does not
/// request "all", the query returns empty rather than the whole table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchivedFilter {
    /// Only archived jobs.
    Only,
    /// Only non-archived jobs.
    Exclude,
    /// Either.
    Any,
}

/// A query against [`Store::by_ids`].
#[derive(Debug, Clone, Default)]
pub struct JobQuery {
    /// Local ids to match.
    pub local_ids: BTreeSet<JobId>,
    /// Cluster ids to match.
    pub cluster_ids: BTreeSet<String>,
    /// Archived filter. `None` defaults to [`ArchivedFilter::Exclude`].
    pub archived: Option<ArchivedFilter>,
    /// If true, ignore `local_ids`/`cluster_ids` and return every job
    /// matching the archived filter. This is the only way to get "every
    /// job" out of `by_ids` — empty id lists alone return nothing.
    pub all: bool,
}

impl JobQuery {
    /// A query that requests every (non-archived, by default) job.
    pub fn all() -> Self {
        Self {
            all: true,
            ..Default::default()
        }
    }

    /// A query for exactly these local ids.
    pub fn by_local_ids(ids: impl IntoIterator<Item = JobId>) -> Self {
        Self {
            local_ids: ids.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Include archived jobs alongside non-archived ones, or restrict to
    /// only archived jobs.
    pub fn with_archived(mut self, filter: ArchivedFilter) -> Self {
        self.archived = Some(filter);
        self
    }
}

/// The persistent job store. `insert`/`update`/`delete` plus the two
/// queries the core needs: `by_ids` (id/cluster-id/archived filtering with
/// range expansion handled by the caller via [`crate::ids::resolve_job_range`])
/// and `active_with_outputs` (the Reconciler's output-collision check).
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist a batch of jobs atomically, assigning each a local id.
    /// Returns the assigned ids in the same order as `jobs`.
    async fn insert(&self, jobs: &mut [Job]) -> Result<(), StoreError>;

    /// Persist an update to an already-inserted job (state, cluster_id, ...).
    async fn update(&self, job: &Job) -> Result<(), StoreError>;

    /// Delete a job. If `clean_logs` is set, also best-effort remove its
    /// declared log files.
    async fn delete(&self, id: JobId, clean_logs: bool) -> Result<(), StoreError>;

    /// Query jobs by id/cluster-id/archived status. Never silently returns
    /// the whole table: if both id sets are empty and `query.all` is false,
    /// returns an empty vector.
    async fn by_ids(&self, query: &JobQuery) -> Result<Vec<Job>, StoreError>;

    /// All jobs in `{Queued, Running, Hold}`, for the Reconciler's
    /// output-collision check.
    async fn active_with_outputs(&self) -> Result<Vec<Job>, StoreError>;
}

pub(crate) fn job_is_active(job: &Job) -> bool {
    State::is_active(job.state)
}

pub(crate) fn log_paths(job: &Job) -> Vec<PathBuf> {
    vec![
        job.working_directory.join(format!("{}.out", job.name)),
        job.working_directory.join(format!("{}.err", job.name)),
    ]
}
