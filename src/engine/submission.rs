//! The Submission Engine: persist a built job set and submit it to a
//! cluster backend in topological order, propagating `cluster_id` within
//! each group and rolling back the whole persisted batch on failure.

use tracing::{info, warn};

use crate::context::Context;
use crate::graph::ordered_groups;
use crate::job::{Job, JobId, State};
use crate::reconcile::{reconcile, Conflict};

/// Flags accepted by [`submit`]. Per-tool scheduling hints (threads, queue,
/// priority, ...) are already captured on each `Job` by the Graph Builder,
/// not separate submission-time knobs, so they aren't repeated here.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionFlags {
    /// Bypass the Reconciler's skip logic entirely.
    pub force: bool,
    /// Persist the batch but leave every job in `Hold`; do not submit.
    pub hold: bool,
    /// On a later failed local run reusing these jobs, keep declared
    /// outputs instead of cleaning them up. Unused by submission itself;
    /// carried through for symmetry with the Local Execution Engine's flags.
    pub keep: bool,
}

/// Outcome of one [`submit`] call.
#[derive(Debug, Clone, Default)]
pub struct SubmissionReport {
    /// Jobs actually persisted and submitted (or left in `Hold`).
    pub submitted: Vec<JobId>,
    /// Parents whose subgraph was already fully `Done`.
    pub skipped_done: Vec<JobId>,
    /// Parents skipped due to an output-path collision with an active job.
    pub conflicts: Vec<Conflict>,
}

/// Persist and submit `jobs` to the named cluster backend.
///
/// 1. Resolve the cluster backend.
/// 2. Run the Reconciler; if nothing is runnable, return early.
/// 3. Persist the surviving jobs in one batch.
/// 4. If `flags.hold`, stop here — jobs remain `Hold`.
/// 5. Submit each group's head, copy its `cluster_id` to followers.
/// 6. On any submission failure, delete everything this call persisted and
///    best-effort cancel whatever the backend had already accepted, then
///    surface the original error.
pub async fn submit(
    mut jobs: Vec<Job>,
    cluster_name: &str,
    ctx: &Context,
    flags: SubmissionFlags,
) -> crate::Result<SubmissionReport> {
    let cluster = ctx.resolve_cluster(cluster_name)?;

    let report = reconcile(&jobs, ctx.store.as_ref(), flags.force).await.map_err(|e| match e {
        crate::reconcile::ReconcileError::Graph(g) => crate::Error::Graph(g),
        crate::reconcile::ReconcileError::Store(s) => crate::Error::Store(s),
    })?;

    if report.runnable.is_empty() {
        info!(skipped = report.skipped_done.len(), conflicts = report.conflicts.len(), "nothing to submit");
        return Ok(SubmissionReport {
            submitted: Vec::new(),
            skipped_done: report.skipped_done,
            conflicts: report.conflicts,
        });
    }

    let runnable: std::collections::HashSet<JobId> = report.runnable.iter().copied().collect();
    jobs.retain(|j| j.id.map(|id| runnable.contains(&id)).unwrap_or(false));

    ctx.store.insert(&mut jobs).await?;
    let persisted_ids: Vec<JobId> = jobs.iter().filter_map(|j| j.id).collect();

    if flags.hold {
        info!(count = persisted_ids.len(), "persisted batch, holding");
        return Ok(SubmissionReport {
            submitted: persisted_ids,
            skipped_done: report.skipped_done,
            conflicts: report.conflicts,
        });
    }

    match submit_groups(&mut jobs, cluster.as_ref(), ctx, flags.force).await {
        Ok(()) => Ok(SubmissionReport {
            submitted: persisted_ids,
            skipped_done: report.skipped_done,
            conflicts: report.conflicts,
        }),
        Err(e) => {
            warn!(error = %e, "submission failed, rolling back batch");
            rollback(&jobs, cluster.as_ref(), ctx).await;
            Err(e)
        }
    }
}

async fn submit_groups(
    jobs: &mut [Job],
    cluster: &dyn crate::cluster::Cluster,
    ctx: &Context,
    force: bool,
) -> crate::Result<()> {
    let groups = ordered_groups(jobs)?;

    for group in &groups {
        let head_id = group.members[0];
        let head_idx = jobs.iter().position(|j| j.id == Some(head_id)).expect("head is in jobs");

        if jobs[head_idx].state == State::Done && !force {
            continue;
        }

        jobs[head_idx].transition(State::Queued).map_err(|e| crate::Error::StateConflict(e.to_string()))?;
        ctx.store.update(&jobs[head_idx]).await?;

        let cluster_id = cluster
            .submit(&jobs[head_idx])
            .await
            .map_err(|e| crate::Error::Submission(e.to_string()))?;
        jobs[head_idx].cluster_id = Some(cluster_id.clone());
        ctx.store.update(&jobs[head_idx]).await?;
        info!(job = %jobs[head_idx], cluster_id = %cluster_id, "submitted group head");

        for &follower_id in &group.members[1..] {
            let idx = jobs.iter().position(|j| j.id == Some(follower_id)).expect("follower is in jobs");
            jobs[idx].cluster_id = Some(cluster_id.clone());
            ctx.store.update(&jobs[idx]).await?;
        }
    }

    Ok(())
}

async fn rollback(jobs: &[Job], cluster: &dyn crate::cluster::Cluster, ctx: &Context) {
    for job in jobs {
        if let Some(cluster_id) = &job.cluster_id {
            // Best-effort: a cancel failure never masks the original
            // submission error, and deletion proceeds regardless.
            let _ = cluster.cancel(cluster_id).await;
        }
        if let Some(id) = job.id {
            let _ = ctx.store.delete(id, true).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ClusterRegistry, MockCluster};
    use crate::context::Defaults;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn job(name: &str, deps: &[JobId]) -> Job {
        let mut j = Job::new("p", name, "bash", "true", "/tmp");
        j.dependencies = deps.iter().copied().collect();
        j
    }

    fn registry_with(name: &'static str, cluster: Arc<dyn crate::cluster::Cluster>) -> ClusterRegistry {
        let mut registry = ClusterRegistry::empty();
        registry.register(name, move |_ctx| Ok(cluster.clone()));
        registry
    }

    #[tokio::test]
    async fn submits_in_topological_order_and_assigns_cluster_ids() {
        let mock = Arc::new(MockCluster::always_succeeds());
        let registry = registry_with("mock", mock.clone());
        let ctx = Context::new(Arc::new(MemoryStore::new()), registry, Defaults::default());

        let mut a = job("a", &[]);
        a.id = Some(1);
        let mut b = job("b", &[1]);
        b.id = Some(2);

        let report = submit(vec![a, b], "mock", &ctx, SubmissionFlags::default()).await.unwrap();
        assert_eq!(report.submitted.len(), 2);
        assert_eq!(mock.accepted_ids().len(), 2);
    }

    #[tokio::test]
    async fn hold_flag_persists_without_submitting() {
        let mock = Arc::new(MockCluster::always_succeeds());
        let registry = registry_with("mock", mock.clone());
        let ctx = Context::new(Arc::new(MemoryStore::new()), registry, Defaults::default());

        let mut a = job("a", &[]);
        a.id = Some(1);

        let report = submit(vec![a], "mock", &ctx, SubmissionFlags { hold: true, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(report.submitted.len(), 1);
        assert!(mock.accepted_ids().is_empty());
    }

    #[tokio::test]
    async fn mid_batch_failure_rolls_back_entire_persisted_set() {
        let mock = Arc::new(MockCluster::fails_on_nth(3));
        let registry = registry_with("mock", mock.clone());
        let store = Arc::new(MemoryStore::new());
        let ctx = Context::new(store.clone(), registry, Defaults::default());

        let mut a = job("a", &[]);
        a.id = Some(1);
        let mut b = job("b", &[]);
        b.id = Some(2);
        let mut c = job("c", &[]);
        c.id = Some(3);
        let mut d = job("d", &[]);
        d.id = Some(4);
        let mut e = job("e", &[]);
        e.id = Some(5);

        let result = submit(vec![a, b, c, d, e], "mock", &ctx, SubmissionFlags::default()).await;
        assert!(result.is_err());

        let remaining = store.by_ids(&crate::store::JobQuery::all()).await.unwrap();
        assert!(remaining.is_empty(), "rollback must remove every persisted job");
        assert_eq!(mock.accepted_ids().len(), 2);
    }
}
