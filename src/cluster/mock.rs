//! A scriptable cluster backend used only by tests, to exercise the
//! Submission Engine's rollback path on a mid-batch submission failure.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::cluster::{Cluster, ClusterError};
use crate::job::Job;

/// Accepts every submission except the `fail_at`-th (1-indexed), which
/// raises a [`ClusterError::SubmissionRejected`].
pub struct MockCluster {
    fail_at: Option<usize>,
    submissions: AtomicUsize,
    pub(crate) submitted: Mutex<Vec<String>>,
    pub(crate) canceled: Mutex<Vec<String>>,
}

impl MockCluster {
    /// A backend that accepts every submission.
    pub fn always_succeeds() -> Self {
        Self {
            fail_at: None,
            submissions: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
            canceled: Mutex::new(Vec::new()),
        }
    }

    /// A backend that fails on the `n`-th submission (1-indexed), accepting
    /// every submission before it.
    pub fn fails_on_nth(n: usize) -> Self {
        Self {
            fail_at: Some(n),
            submissions: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
            canceled: Mutex::new(Vec::new()),
        }
    }

    /// The external ids this backend has accepted so far.
    pub fn accepted_ids(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    /// The external ids `cancel` has been called with so far.
    pub fn canceled_ids(&self) -> Vec<String> {
        self.canceled.lock().unwrap().clone()
    }
}

#[async_trait]
impl Cluster for MockCluster {
    async fn submit(&self, _job: &Job) -> Result<String, ClusterError> {
        let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_at == Some(n) {
            return Err(ClusterError::SubmissionRejected(format!("mock rejected submission #{n}")));
        }
        let id = Uuid::new_v4().to_string();
        self.submitted.lock().unwrap().push(id.clone());
        Ok(id)
    }

    async fn cancel(&self, cluster_id: &str) -> Result<(), ClusterError> {
        self.canceled.lock().unwrap().push(cluster_id.to_string());
        Ok(())
    }

    async fn update(&self, _job: &mut Job) -> Result<(), ClusterError> {
        Ok(())
    }
}
