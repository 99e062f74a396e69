//! Explicit execution context threaded through every component.
//!
//! Rather than reaching for process-wide configuration and an implicit
//! database path, every entry point takes an explicit [`Context`] value:
//! builder, reconciler, submission engine and local engine all take one, and
//! none of them reach for global state.

use std::path::PathBuf;
use std::sync::Arc;

use crate::cluster::{Cluster, ClusterRegistry};
use crate::store::Store;

/// Default scheduling hints applied to a job when neither a profile spec
/// entry nor an explicit caller override supplies one.
#[derive(Debug, Clone)]
pub struct Defaults {
    /// Default thread count.
    pub threads: u32,
    /// Default queue name.
    pub queue: Option<String>,
    /// Default priority.
    pub priority: Option<i32>,
    /// Default max wall time, in minutes.
    pub max_time: Option<u32>,
    /// Default max memory, in megabytes.
    pub max_memory: Option<u32>,
    /// Default account/project to bill.
    pub account: Option<String>,
    /// Default working directory, used when a job does not specify one.
    pub working_directory: PathBuf,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            threads: num_cpus::get() as u32,
            queue: None,
            priority: None,
            max_time: None,
            max_memory: None,
            account: None,
            working_directory: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

/// The value threaded through the builder, reconciler, submission engine,
/// and local execution engine. Carries the job store, the cluster backend
/// registry, and the scheduling defaults — nothing here is process-global.
#[derive(Clone)]
pub struct Context {
    /// The persistent job store.
    pub store: Arc<dyn Store>,
    /// Registry of cluster backends, keyed by configuration string.
    pub clusters: Arc<ClusterRegistry>,
    /// Scheduling defaults applied when a profile spec doesn't override them.
    pub defaults: Defaults,
}

impl Context {
    /// Build a context from its three parts.
    pub fn new(store: Arc<dyn Store>, clusters: ClusterRegistry, defaults: Defaults) -> Self {
        Self {
            store,
            clusters: Arc::new(clusters),
            defaults,
        }
    }

    /// Resolve the named cluster backend.
    pub fn resolve_cluster(&self, name: &str) -> crate::Result<Arc<dyn Cluster>> {
        self.clusters.resolve(name, self)
    }
}
