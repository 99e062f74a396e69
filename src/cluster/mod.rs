//! The cluster backend contract: `submit`/`cancel`/`update` plus a registry
//! keyed by configuration string.

mod local;

#[cfg(test)]
mod mock;

pub use local::LocalThreadCluster;

#[cfg(test)]
pub use mock::MockCluster;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::Context;
use crate::job::Job;

/// Errors raised resolving or talking to a cluster backend.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The requested backend name has no registered factory.
    #[error("unknown cluster backend: {0}")]
    Unknown(String),
    /// The backend's configuration was invalid.
    #[error("cluster misconfigured: {0}")]
    Misconfigured(String),
    /// The backend rejected a submission.
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),
}

/// A cluster backend: anything that can accept, cancel, and refresh jobs.
/// Concrete implementations are data (factory functions in the registry),
/// not an inheritance hierarchy.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Submit `job` and return the backend's opaque external id. `submit`
    /// returning `Ok` means "accepted by the scheduler", not "done".
    async fn submit(&self, job: &Job) -> Result<String, ClusterError>;

    /// Cancel a job by its external id. Idempotent: safe to call on an
    /// already-terminal or already-canceled job.
    async fn cancel(&self, cluster_id: &str) -> Result<(), ClusterError>;

    /// Refresh `job`'s state from the backend's view of `cluster_id`.
    async fn update(&self, job: &mut Job) -> Result<(), ClusterError>;
}

type ClusterFactory = Box<dyn Fn(&Context) -> Result<Arc<dyn Cluster>, ClusterError> + Send + Sync>;

/// Factory registry for cluster backends, keyed by configuration string.
/// Populated at construction time rather than via a process-wide static.
pub struct ClusterRegistry {
    factories: HashMap<&'static str, ClusterFactory>,
}

impl ClusterRegistry {
    /// A registry with the `local` reference backend registered.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("local", |_ctx| Ok(Arc::new(LocalThreadCluster::new()) as Arc<dyn Cluster>));
        registry
    }

    /// An empty registry, for callers who want to register their own backends.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory under `name`, replacing any existing entry.
    pub fn register(
        &mut self,
        name: &'static str,
        factory: impl Fn(&Context) -> Result<Arc<dyn Cluster>, ClusterError> + Send + Sync + 'static,
    ) {
        self.factories.insert(name, Box::new(factory));
    }

    /// Resolve the named backend, or `ClusterUnavailable` if it isn't
    /// registered or its factory fails.
    pub fn resolve(&self, name: &str, ctx: &Context) -> crate::Result<Arc<dyn Cluster>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| crate::Error::ClusterUnavailable(format!("no such backend: {name}")))?;
        factory(ctx).map_err(|e| crate::Error::ClusterUnavailable(e.to_string()))
    }
}

impl Default for ClusterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
