//! A reference `Cluster` backend that submits by spawning the job's command
//! directly on the local machine, bypassing groups/pipes entirely. Useful
//! for tests and single-machine use; not a production scheduler.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::process::Command;
use uuid::Uuid;

use crate::cluster::{Cluster, ClusterError};
use crate::job::{Job, State};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Succeeded,
    Failed,
}

/// Spawns each submitted job's command as its own child process and waits
/// for it to exit before returning, recording the outcome under a generated
/// external id for later `update`/`cancel` calls.
pub struct LocalThreadCluster {
    outcomes: Mutex<HashMap<String, Outcome>>,
}

impl LocalThreadCluster {
    /// A fresh backend with no recorded submissions.
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for LocalThreadCluster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cluster for LocalThreadCluster {
    async fn submit(&self, job: &Job) -> Result<String, ClusterError> {
        let status = Command::new(&job.interpreter)
            .arg("-c")
            .arg(&job.command)
            .current_dir(&job.working_directory)
            .status()
            .await
            .map_err(|e| ClusterError::SubmissionRejected(e.to_string()))?;

        let cluster_id = Uuid::new_v4().to_string();
        let outcome = if status.success() {
            Outcome::Succeeded
        } else {
            Outcome::Failed
        };
        self.outcomes.lock().unwrap().insert(cluster_id.clone(), outcome);
        Ok(cluster_id)
    }

    async fn cancel(&self, cluster_id: &str) -> Result<(), ClusterError> {
        // The job has already run to completion by the time submit()
        // returns, so cancellation after the fact is a no-op; idempotent by
        // construction since there is nothing left to stop.
        self.outcomes.lock().unwrap().entry(cluster_id.to_string()).or_insert(Outcome::Failed);
        Ok(())
    }

    async fn update(&self, job: &mut Job) -> Result<(), ClusterError> {
        let Some(cluster_id) = job.cluster_id.clone() else {
            return Ok(());
        };
        let outcome = self.outcomes.lock().unwrap().get(&cluster_id).copied();
        let Some(outcome) = outcome else {
            return Ok(());
        };
        if job.state == State::Queued {
            let _ = job.transition(State::Running);
        }
        match outcome {
            Outcome::Succeeded => {
                let _ = job.transition(State::Done);
            }
            Outcome::Failed => {
                let _ = job.transition(State::Failed);
            }
        }
        Ok(())
    }
}
