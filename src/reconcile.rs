//! The Reconciler: decides which of a freshly built job set actually needs
//! to run, given persisted state and filesystem outputs.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use thiserror::Error;

use crate::graph::{parents, subgraph};
use crate::job::{Job, JobId};
use crate::store::Store;

/// Errors specific to reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A parent's subgraph referenced a job id not present in the built set.
    #[error(transparent)]
    Graph(#[from] crate::graph::GraphError),
    /// The store could not be queried.
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
}

/// A parent whose subgraph was skipped because one of its outputs collides
/// with an already-active job's output, recorded for reporting rather than
/// silently dropped.
#[derive(Debug, Clone)]
pub struct Conflict {
    /// The skipped parent job.
    pub parent: JobId,
    /// The already-active job whose output path collided.
    pub existing_job: JobId,
}

/// The result of reconciling a job set against persisted state.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// Jobs that actually need to run, in topological order.
    pub runnable: Vec<JobId>,
    /// Parents skipped because their whole subgraph is already `Done`.
    pub skipped_done: Vec<JobId>,
    /// Parents skipped because of an output-path collision with an active job.
    pub conflicts: Vec<Conflict>,
}

/// Reconcile `jobs` against the store's active jobs. `force=true` bypasses
/// both the done-skip and the collision-skip, returning every job.
pub async fn reconcile(
    jobs: &[Job],
    store: &dyn Store,
    force: bool,
) -> Result<ReconcileReport, ReconcileError> {
    if force {
        return Ok(ReconcileReport {
            runnable: jobs.iter().filter_map(|j| j.id).collect(),
            skipped_done: Vec::new(),
            conflicts: Vec::new(),
        });
    }

    let active = store.active_with_outputs().await?;
    let mut output_owner: HashMap<PathBuf, JobId> = HashMap::new();
    for job in &active {
        if let Some(id) = job.id {
            for path in job.resolved_output_files() {
                output_owner.insert(path, id);
            }
        }
    }

    let parent_ids = parents(jobs);
    let mut report = ReconcileReport::default();
    let mut runnable: HashSet<JobId> = HashSet::new();

    for parent in parent_ids {
        let members = subgraph(jobs, parent)?;
        let by_id: HashMap<JobId, &Job> = jobs
            .iter()
            .filter_map(|j| j.id.map(|id| (id, j)))
            .collect();

        let all_done = members
            .iter()
            .all(|id| by_id.get(id).map(|j| j.state == crate::job::State::Done).unwrap_or(false));
        if all_done {
            report.skipped_done.push(parent);
            continue;
        }

        let mut collision = None;
        'members: for id in &members {
            let Some(job) = by_id.get(id) else { continue };
            for path in job.resolved_output_files() {
                if let Some(&existing) = output_owner.get(&path) {
                    collision = Some(existing);
                    break 'members;
                }
            }
        }

        if let Some(existing_job) = collision {
            report.conflicts.push(Conflict { parent, existing_job });
            continue;
        }

        runnable.extend(members);
    }

    // Preserve topological order among the union of surviving subgraphs.
    report.runnable = jobs
        .iter()
        .filter_map(|j| j.id)
        .filter(|id| runnable.contains(id))
        .collect();

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Job, State};
    use crate::store::MemoryStore;

    fn job_with_output(id: JobId, name: &str, deps: &[JobId], state: State) -> Job {
        let mut j = Job::new("p", name, "bash", "true", "/w");
        j.id = Some(id);
        j.dependencies = deps.iter().copied().collect();
        j.state = state;
        j
    }

    #[tokio::test]
    async fn done_subgraph_is_skipped_without_force() {
        let jobs = vec![
            job_with_output(1, "a", &[], State::Done),
            job_with_output(2, "b", &[1], State::Done),
        ];
        let store = MemoryStore::new();
        let report = reconcile(&jobs, &store, false).await.unwrap();
        assert!(report.runnable.is_empty());
        assert_eq!(report.skipped_done, vec![1]);
    }

    #[tokio::test]
    async fn force_bypasses_done_skip() {
        let jobs = vec![
            job_with_output(1, "a", &[], State::Done),
            job_with_output(2, "b", &[1], State::Done),
        ];
        let store = MemoryStore::new();
        let report = reconcile(&jobs, &store, true).await.unwrap();
        assert_eq!(report.runnable.len(), 2);
    }

    #[tokio::test]
    async fn non_done_parent_is_runnable() {
        let jobs = vec![
            job_with_output(1, "a", &[], State::Hold),
            job_with_output(2, "b", &[1], State::Hold),
        ];
        let store = MemoryStore::new();
        let report = reconcile(&jobs, &store, false).await.unwrap();
        assert_eq!(report.runnable, vec![1, 2]);
        assert!(report.conflicts.is_empty());
    }
}
