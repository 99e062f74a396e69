//! In-memory [`Store`] implementation: used by the Local Execution Engine
//! and throughout the test suite.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::job::{Job, JobId};
use crate::store::{log_paths, ArchivedFilter, JobQuery, Store, StoreError};

/// In-memory job store. Not durable across process restarts; intended for
/// local runs and tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
    next_id: Arc<AtomicI64>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }
}

fn matches_archived(job: &Job, filter: ArchivedFilter) -> bool {
    match filter {
        ArchivedFilter::Only => job.archived,
        ArchivedFilter::Exclude => !job.archived,
        ArchivedFilter::Any => true,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert(&self, jobs: &mut [Job]) -> Result<(), StoreError> {
        let mut mapping = HashMap::new();
        let mut fresh_ids = Vec::with_capacity(jobs.len());
        for job in jobs.iter() {
            let new_id = self.next_id.fetch_add(1, Ordering::SeqCst);
            if let Some(old_id) = job.id {
                mapping.insert(old_id, new_id);
            }
            fresh_ids.push(new_id);
        }
        crate::job::remap_ids(jobs, &mapping);
        // Jobs that arrived with no id (not built via the graph builder)
        // still need one; remap_ids only rewrites ids present in the
        // mapping's *keys*, so backfill the rest positionally.
        for (job, fresh_id) in jobs.iter_mut().zip(fresh_ids) {
            if job.id.is_none() {
                job.id = Some(fresh_id);
            }
        }

        let mut guard = self.jobs.write().await;
        for job in jobs.iter() {
            guard.insert(job.id.expect("every job now has an id"), job.clone());
        }
        Ok(())
    }

    async fn update(&self, job: &Job) -> Result<(), StoreError> {
        let id = job.id.ok_or_else(|| {
            StoreError::Backend("cannot update a job with no assigned id".to_string())
        })?;
        let mut guard = self.jobs.write().await;
        if !guard.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        guard.insert(id, job.clone());
        Ok(())
    }

    async fn delete(&self, id: JobId, clean_logs: bool) -> Result<(), StoreError> {
        let mut guard = self.jobs.write().await;
        let job = guard.remove(&id).ok_or(StoreError::NotFound(id))?;
        if clean_logs {
            for path in log_paths(&job) {
                let _ = std::fs::remove_file(path);
            }
        }
        Ok(())
    }

    async fn by_ids(&self, query: &JobQuery) -> Result<Vec<Job>, StoreError> {
        if !query.all && query.local_ids.is_empty() && query.cluster_ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = query.archived.unwrap_or(ArchivedFilter::Exclude);
        let guard = self.jobs.read().await;
        let mut out: Vec<Job> = guard
            .values()
            .filter(|j| matches_archived(j, filter))
            .filter(|j| {
                query.all
                    || j.id.map(|id| query.local_ids.contains(&id)).unwrap_or(false)
                    || j.cluster_id
                        .as_ref()
                        .map(|cid| query.cluster_ids.contains(cid))
                        .unwrap_or(false)
            })
            .cloned()
            .collect();
        out.sort_by_key(|j| j.id);
        Ok(out)
    }

    async fn active_with_outputs(&self) -> Result<Vec<Job>, StoreError> {
        let guard = self.jobs.read().await;
        Ok(guard
            .values()
            .filter(|j| !j.archived && crate::store::job_is_active(j))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Job;

    #[tokio::test]
    async fn by_ids_with_no_ids_and_no_all_returns_empty() {
        let store = MemoryStore::new();
        let mut job = Job::new("p", "a", "bash", "echo", "/tmp");
        store.insert(std::slice::from_mut(&mut job)).await.unwrap();

        let result = store.by_ids(&JobQuery::default()).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn query_all_returns_everything_non_archived() {
        let store = MemoryStore::new();
        let mut jobs = vec![
            Job::new("p", "a", "bash", "echo", "/tmp"),
            Job::new("p", "b", "bash", "echo", "/tmp"),
        ];
        store.insert(&mut jobs).await.unwrap();

        let result = store.by_ids(&JobQuery::all()).await.unwrap();
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn archived_jobs_excluded_by_default() {
        let store = MemoryStore::new();
        let mut job = Job::new("p", "a", "bash", "echo", "/tmp");
        job.archived = true;
        store.insert(std::slice::from_mut(&mut job)).await.unwrap();

        let result = store.by_ids(&JobQuery::all()).await.unwrap();
        assert!(result.is_empty());

        let result = store
            .by_ids(&JobQuery::all().with_archived(ArchivedFilter::Only))
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn active_with_outputs_excludes_terminal_states() {
        let store = MemoryStore::new();
        let mut jobs = vec![
            Job::new("p", "a", "bash", "echo", "/tmp"),
            Job::new("p", "b", "bash", "echo", "/tmp"),
        ];
        jobs[1].state = crate::job::State::Done;
        store.insert(&mut jobs).await.unwrap();

        let active = store.active_with_outputs().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "a");
    }
}
