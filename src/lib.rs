//! # pipeflow
//!
//! Job graph construction, persistent-state reconciliation, and the
//! submission/execution engine for a pipeline job orchestrator.
//!
//! A user-authored pipeline (a set of [`tool::Tool`] instances wired together
//! by [`tool::Pipeline`] edges) is expanded by the [`graph::builder`]
//! into a DAG of [`job::Job`] values, trimmed against persisted state by
//! [`reconcile`], and driven to completion either by [`engine::submission`]
//! (external cluster) or [`engine::local`] (in-process).
//!
//! The crate intentionally does not parse pipeline scripts, render tables, or
//! implement a concrete cluster scheduler — those are external collaborators
//! satisfying the [`tool::Tool`], [`tool::Pipeline`] and [`cluster::Cluster`]
//! contracts respectively.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

use thiserror::Error;

/// Result type used throughout pipeflow.
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error taxonomy.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed tool/pipeline input.
    #[error("parser error: {0}")]
    Parser(String),

    /// Options present but semantically invalid (missing required, unreadable
    /// input file, output collision).
    #[error("validation error: {0}")]
    Validation(String),

    /// A named tool could not be found by the (external) search paths.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// The cluster backend could not be resolved or is misconfigured.
    #[error("cluster unavailable: {0}")]
    ClusterUnavailable(String),

    /// The cluster backend rejected a job at submission time.
    #[error("submission error: {0}")]
    Submission(String),

    /// An illegal state transition was attempted (e.g. restarting a `Done` job).
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// Graph-structural error (cycle, unknown job, bad grouping).
    #[error("graph error: {0}")]
    Graph(#[from] graph::GraphError),

    /// Job store error.
    #[error("store error: {0}")]
    Store(#[from] store::StoreError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic I/O error (log files, working directories, config loading).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Explicit, threaded configuration. No ambient/global state: every entry
/// point (builder, reconciler, submission engine, local engine) takes a
/// `&Context` rather than reaching for process-wide configuration.
pub mod context;

/// Crate-wide tracing/logging setup.
pub mod logging;

/// Job-id range syntax.
pub mod ids;

/// The `Job` entity and its state machine.
pub mod job;

/// Persistent job store contract plus in-memory and PostgreSQL-backed
/// implementations.
pub mod store;

/// The `Tool` and `Pipeline` contracts consumed by the graph builder, plus
/// scheduling profiles.
pub mod tool;

/// Graph construction, group detection, and graph algorithms.
pub mod graph;

/// The reconciler: decides which of a freshly built job set actually needs
/// to run.
pub mod reconcile;

/// The cluster backend contract plus reference implementations.
pub mod cluster;

/// Submission and local execution engines.
pub mod engine;
