//! The Local Execution Engine: runs a built job set in-process, driving
//! jobs through their states and collecting exit status without going
//! through a [`crate::cluster::Cluster`] backend.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Command as StdCommand, ExitStatus, Stdio};

use tracing::{info, warn};

use crate::graph::{check_output_collisions, ordered_groups, topological_order};
use crate::job::{remap_ids, Job, JobId, State};

/// Flags accepted by [`run`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRunFlags {
    /// Re-run group heads already `Done`.
    pub force: bool,
    /// Leave a failed job's declared outputs on disk for inspection instead
    /// of removing them.
    pub keep: bool,
}

/// Outcome of one [`run`] call.
#[derive(Debug, Clone, Default)]
pub struct LocalRunReport {
    /// Jobs that reached `Done`, in the order they completed.
    pub completed: Vec<JobId>,
    /// The job that failed and aborted the run, if any.
    pub failed: Option<JobId>,
}

struct GroupMemberSpec {
    job_id: JobId,
    interpreter: String,
    command: String,
    working_directory: PathBuf,
    out_path: PathBuf,
    err_path: PathBuf,
}

/// Run `jobs` to completion locally.
///
/// 1. Assign local ids 1..N in topological order.
/// 2. Validate output-file collisions (same check the builder runs).
/// 3. Run each group's pipeline in order; on the first job failure, abort
///    the whole run without attempting downstream groups.
pub async fn run(jobs: Vec<Job>, flags: LocalRunFlags) -> crate::Result<LocalRunReport> {
    let order = topological_order(&jobs)?;
    let mapping: HashMap<JobId, JobId> = order
        .iter()
        .enumerate()
        .map(|(i, &old)| (old, (i + 1) as JobId))
        .collect();

    let mut by_old_id: HashMap<JobId, Job> = jobs.into_iter().filter_map(|j| j.id.map(|id| (id, j))).collect();
    let mut jobs: Vec<Job> = order
        .iter()
        .map(|old_id| by_old_id.remove(old_id).expect("topological_order only returns known ids"))
        .collect();
    remap_ids(&mut jobs, &mapping);

    check_output_collisions(&jobs)?;

    let groups = ordered_groups(&jobs)?;
    let mut report = LocalRunReport::default();

    'groups: for group in &groups {
        let head_idx = jobs
            .iter()
            .position(|j| j.id == Some(group.members[0]))
            .expect("group head is in jobs");

        if jobs[head_idx].state == State::Done && !flags.force {
            report.completed.extend(group.members.iter().copied());
            continue;
        }

        let specs: Vec<GroupMemberSpec> = group
            .members
            .iter()
            .map(|&id| {
                let idx = jobs.iter().position(|j| j.id == Some(id)).expect("member is in jobs");
                let job = &jobs[idx];
                GroupMemberSpec {
                    job_id: id,
                    interpreter: job.interpreter.clone(),
                    command: job.command.clone(),
                    working_directory: job.working_directory.clone(),
                    out_path: job.working_directory.join(format!("{}.out", job.name)),
                    err_path: job.working_directory.join(format!("{}.err", job.name)),
                }
            })
            .collect();

        for &id in &group.members {
            let idx = jobs.iter().position(|j| j.id == Some(id)).unwrap();
            jobs[idx]
                .transition(State::Queued)
                .map_err(|e| crate::Error::StateConflict(e.to_string()))?;
            jobs[idx]
                .transition(State::Running)
                .map_err(|e| crate::Error::StateConflict(e.to_string()))?;
        }

        let statuses = tokio::task::spawn_blocking(move || run_pipeline(&specs))
            .await
            .map_err(|e| crate::Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;

        for (member_idx, &id) in group.members.iter().enumerate() {
            let idx = jobs.iter().position(|j| j.id == Some(id)).unwrap();
            let succeeded = statuses.get(member_idx).map(|s| s.success()).unwrap_or(false);
            if succeeded {
                jobs[idx]
                    .transition(State::Done)
                    .map_err(|e| crate::Error::StateConflict(e.to_string()))?;
                report.completed.push(id);
                info!(job = %jobs[idx], "job completed");
            } else {
                jobs[idx]
                    .transition(State::Failed)
                    .map_err(|e| crate::Error::StateConflict(e.to_string()))?;
                warn!(job = %jobs[idx], "job failed, aborting run");
                if !flags.keep {
                    for path in jobs[idx].resolved_output_files() {
                        let _ = std::fs::remove_file(path);
                    }
                }
                report.failed = Some(id);
                break 'groups;
            }
        }
    }

    Ok(report)
}

/// Spawn `members` as a real OS pipeline: each non-head member's stdin is
/// the previous member's stdout. Every member's stderr (and the tail
/// member's stdout) is redirected to its own log file; a non-tail member's
/// stdout feeds the pipe instead of a file, matching shell-pipe semantics.
fn run_pipeline(members: &[GroupMemberSpec]) -> std::io::Result<Vec<ExitStatus>> {
    let mut children = Vec::with_capacity(members.len());
    let mut previous_stdout = None;

    for (i, member) in members.iter().enumerate() {
        let is_tail = i + 1 == members.len();
        let err_file = std::fs::File::create(&member.err_path)?;

        let mut cmd = StdCommand::new(&member.interpreter);
        cmd.arg("-c").arg(&member.command).current_dir(&member.working_directory);
        cmd.stderr(Stdio::from(err_file));
        cmd.stdin(previous_stdout.take().map(Stdio::from).unwrap_or(Stdio::null()));

        if is_tail {
            let out_file = std::fs::File::create(&member.out_path)?;
            cmd.stdout(Stdio::from(out_file));
        } else {
            cmd.stdout(Stdio::piped());
        }

        let mut child = cmd.spawn()?;
        previous_stdout = child.stdout.take();
        children.push((member.job_id, child));
    }

    children
        .into_iter()
        .map(|(_, mut child)| child.wait())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Job;
    use tempfile::tempdir;

    #[tokio::test]
    async fn single_job_runs_to_done() {
        let dir = tempdir().unwrap();
        let mut job = Job::new("p", "echoer", "bash", "echo hi", dir.path());
        job.id = Some(1);

        let report = run(vec![job], LocalRunFlags::default()).await.unwrap();
        assert_eq!(report.completed, vec![1]);
        assert!(report.failed.is_none());
        assert!(dir.path().join("echoer.out").exists());
    }

    #[tokio::test]
    async fn failing_job_aborts_run_and_marks_failed() {
        let dir = tempdir().unwrap();
        let mut a = Job::new("p", "boom", "bash", "exit 1", dir.path());
        a.id = Some(1);
        let mut b = Job::new("p", "never", "bash", "echo should-not-run", dir.path());
        b.id = Some(2);
        b.dependencies.insert(1);

        let report = run(vec![a, b], LocalRunFlags::default()).await.unwrap();
        assert_eq!(report.failed, Some(1));
        assert!(!report.completed.contains(&2));
    }

    #[tokio::test]
    async fn done_head_is_skipped_without_force() {
        let dir = tempdir().unwrap();
        let mut job = Job::new("p", "already", "bash", "echo hi", dir.path());
        job.id = Some(1);
        job.state = State::Done;

        let report = run(vec![job], LocalRunFlags::default()).await.unwrap();
        assert_eq!(report.completed, vec![1]);
    }
}
