//! The `Job` entity and its state machine.

mod state;

pub use state::{State, StateError};

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tool::Tool;

/// Monotonic local identifier. Assigned on persistence, or, for local runs,
/// sequentially starting at 1.
pub type JobId = i64;

/// The scheduling profile applied to a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulingProfile {
    /// Queue name.
    pub queue: Option<String>,
    /// Scheduler priority.
    pub priority: Option<i32>,
    /// Thread count.
    pub threads: u32,
    /// Max wall time, in minutes.
    pub max_time: Option<u32>,
    /// Max memory, in megabytes.
    pub max_memory: Option<u32>,
    /// Account/project to bill.
    pub account: Option<String>,
    /// Absolute working directory.
    pub working_directory: PathBuf,
}

/// The central entity: a single executable unit with a state, a command,
/// inputs, outputs, and dependencies.
#[derive(Clone, Serialize, Deserialize)]
pub struct Job {
    /// Monotonic local identifier. `None` until persisted/assigned.
    pub id: Option<JobId>,
    /// The opaque identifier returned by the cluster backend. Unset until submitted.
    pub cluster_id: Option<String>,
    /// The pipeline grouping tag shared by jobs created from one script invocation.
    pub pipeline: String,
    /// Human label.
    pub name: String,
    /// Current lifecycle state.
    pub state: State,
    /// Tombstone flag; hides the job from default queries.
    pub archived: bool,
    /// The interpreter used to execute `command` (e.g. `bash`, `python`).
    pub interpreter: String,
    /// The rendered command line.
    pub command: String,
    /// Absolute path the job treats as CWD.
    pub working_directory: PathBuf,
    /// Scheduling profile applied to this job.
    pub profile: SchedulingProfile,
    /// Upstream jobs that must reach `Done` before this job may run.
    pub dependencies: HashSet<JobId>,
    /// If set, this job is the continuation of a streamed group: the id of
    /// the job whose output this job's input reads from.
    pub group_from: Option<JobId>,
    /// If set, the id of the job this job's output streams into.
    pub group_to: Option<JobId>,
    /// Extra inputs beyond those inferred from the tool.
    pub additional_options: Vec<String>,
    /// This job's declared input file paths, as reported by its tool at
    /// build time. Stored on the job itself (not read back through `tool`)
    /// so that a job reloaded from a [`crate::store::Store`] still knows
    /// its inputs even though `tool` does not survive a round-trip.
    #[serde(default)]
    pub declared_inputs: Vec<PathBuf>,
    /// This job's declared output file paths, as reported by its tool at
    /// build time. See `declared_inputs` for why this is a plain field
    /// rather than read through `tool`.
    #[serde(default)]
    pub declared_outputs: Vec<PathBuf>,
    /// When this job record was first created.
    pub created_at: DateTime<Utc>,
    /// When this job record was last modified (state change, cluster_id
    /// assignment, ...).
    pub updated_at: DateTime<Utc>,
    /// Reference to the tool descriptor that produced this job. Not
    /// persisted; a job loaded back from a store has this unset, which is
    /// why `declared_inputs`/`declared_outputs` exist as plain fields.
    #[serde(skip)]
    pub tool: Option<Arc<dyn Tool>>,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("cluster_id", &self.cluster_id)
            .field("pipeline", &self.pipeline)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("archived", &self.archived)
            .field("dependencies", &self.dependencies)
            .field("group_from", &self.group_from)
            .field("group_to", &self.group_to)
            .finish()
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{}#{}", self.name, id),
            None => write!(f, "{}", self.name),
        }
    }
}

impl Job {
    /// Create a new, not-yet-persisted job with the given name, interpreter,
    /// command, and working directory. Starts in `Hold`.
    pub fn new(
        pipeline: impl Into<String>,
        name: impl Into<String>,
        interpreter: impl Into<String>,
        command: impl Into<String>,
        working_directory: impl Into<PathBuf>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            cluster_id: None,
            pipeline: pipeline.into(),
            name: name.into(),
            state: State::Hold,
            archived: false,
            interpreter: interpreter.into(),
            command: command.into(),
            working_directory: working_directory.into(),
            profile: SchedulingProfile::default(),
            dependencies: HashSet::new(),
            group_from: None,
            group_to: None,
            additional_options: Vec::new(),
            declared_inputs: Vec::new(),
            declared_outputs: Vec::new(),
            created_at: now,
            updated_at: now,
            tool: None,
        }
    }

    /// Copy `tool`'s declared input/output paths onto `declared_inputs`/
    /// `declared_outputs` and attach `tool` itself. Called by the Graph
    /// Builder once a job's tool is resolved; a job loaded back from a
    /// store never calls this and relies on the plain fields alone.
    pub fn attach_tool(&mut self, tool: Arc<dyn Tool>) {
        self.declared_inputs = tool.get_input_files();
        self.declared_outputs = tool.get_output_files();
        self.tool = Some(tool);
    }

    /// Whether this job is a group head (not a continuation of another job's
    /// pipe/stream output).
    pub fn is_group_head(&self) -> bool {
        self.group_from.is_none()
    }

    /// Output file paths declared by this job, resolved against the job's
    /// working directory when relative. Backed by `declared_outputs`, which
    /// survives a store round-trip even though `tool` does not.
    pub fn resolved_output_files(&self) -> Vec<PathBuf> {
        self.declared_outputs
            .iter()
            .map(|p| resolve_against(&self.working_directory, p))
            .collect()
    }

    /// Input file paths declared by this job, resolved the same way.
    pub fn resolved_input_files(&self) -> Vec<PathBuf> {
        self.declared_inputs
            .iter()
            .map(|p| resolve_against(&self.working_directory, p))
            .collect()
    }

    /// Attempt the given state transition, returning the previous state on
    /// success or a [`StateError`] if the transition is illegal.
    pub fn transition(&mut self, to: State) -> Result<State, StateError> {
        let from = self.state;
        state::validate_transition(from, to)?;
        self.state = to;
        self.updated_at = Utc::now();
        Ok(from)
    }

    /// Reset a terminal job back to `Queued` so it can be resubmitted,
    /// clearing its cluster id. Only `Failed` and `Canceled` are restartable.
    pub fn restart(&mut self) -> Result<(), StateError> {
        match self.state {
            State::Failed | State::Canceled => {
                self.state = State::Queued;
                self.cluster_id = None;
                self.updated_at = Utc::now();
                Ok(())
            }
            other => Err(StateError::NotRestartable(other)),
        }
    }
}

/// Resolve `path` against `base` unless `path` is already absolute.
pub(crate) fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Rewrite every job's `id`, `dependencies`, `group_from` and `group_to`
/// through `mapping`. Ids not present in `mapping` are left untouched — they
/// refer to jobs outside this batch (e.g. already-persisted dependencies
/// from an earlier build) whose ids are already final.
///
/// Used whenever a job set's ids are finalized after the fact: the Store
/// assigns real ids at persistence time, and the Local Execution Engine
/// assigns ids 1..N in topological order.
pub fn remap_ids(jobs: &mut [Job], mapping: &std::collections::HashMap<JobId, JobId>) {
    for job in jobs.iter_mut() {
        if let Some(id) = job.id {
            if let Some(&new_id) = mapping.get(&id) {
                job.id = Some(new_id);
            }
        }
        job.dependencies = job
            .dependencies
            .iter()
            .map(|d| mapping.get(d).copied().unwrap_or(*d))
            .collect();
        if let Some(gf) = job.group_from {
            job.group_from = Some(mapping.get(&gf).copied().unwrap_or(gf));
        }
        if let Some(gt) = job.group_to {
            job.group_to = Some(mapping.get(&gt).copied().unwrap_or(gt));
        }
    }
}
