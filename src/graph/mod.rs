//! Graph construction, group detection, and graph algorithms.

pub mod algo;
pub mod builder;
pub mod group;

pub use algo::{ordered_groups, parents, subgraph, topological_order};
pub use builder::build_jobs;
pub use group::{create_groups, Group};

use thiserror::Error;

use crate::job::JobId;

/// Errors specific to graph construction/traversal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// The dependency relation contains a cycle.
    #[error("dependency cycle detected")]
    Cycle,
    /// A referenced job id is not part of the input set.
    #[error("unknown job id: {0}")]
    UnknownJob(JobId),
    /// Two or more jobs would write the same resolved output path.
    #[error("output path collision: {path} is written by both {a} and {b}")]
    OutputCollision {
        /// The colliding path.
        path: String,
        /// One job writing it.
        a: String,
        /// The other job writing it.
        b: String,
    },
    /// A pipeline node referenced a tool/edge endpoint that does not exist.
    #[error("unknown pipeline node: {0}")]
    UnknownNode(String),
}
