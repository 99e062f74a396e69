//! The `Tool` and `Pipeline` contracts consumed by the Graph Builder, plus
//! scheduling profiles loaded from a profile spec file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::job::SchedulingProfile;

/// A single named option on a tool, as exposed to the builder for
/// validation and rendering. The option/argument model's own validation
/// rules are an external collaborator; the builder only needs
/// `raw()`/`default` to decide whether an option was explicitly set.
pub trait ToolOption {
    /// The option's name.
    fn name(&self) -> &str;
    /// The option's current raw value, as rendered on the command line.
    fn raw(&self) -> serde_json::Value;
    /// The option's default value.
    fn default(&self) -> serde_json::Value;
}

/// External collaborator: a resolved tool instance, as produced by the (out
/// of scope) script parser. Provides everything the builder needs to turn a
/// pipeline node into a [`crate::job::Job`].
pub trait Tool: Send + Sync {
    /// The tool's name, used to key profile-spec lookups.
    fn name(&self) -> &str;
    /// The interpreter the rendered command should run under (`bash`, `python`, ...).
    fn interpreter(&self) -> &str;
    /// The fully rendered command line.
    fn command(&self) -> String;
    /// This tool's declared input file paths (relative or absolute).
    fn get_input_files(&self) -> Vec<PathBuf>;
    /// This tool's declared output file paths (relative or absolute).
    fn get_output_files(&self) -> Vec<PathBuf>;
    /// Validate the tool's current option values. Returns the first
    /// validation failure, if any.
    fn validate(&self) -> Result<(), String>;
}

/// A producer → consumer edge between two pipeline nodes, on named
/// output/input options.
#[derive(Debug, Clone)]
pub struct PipelineEdge {
    /// Name of the producer node.
    pub from: String,
    /// Name of the consumer node.
    pub to: String,
    /// Whether this edge represents a group/pipe link rather than an
    /// ordinary file dependency.
    pub is_group_link: bool,
}

/// External collaborator: a pipeline description with resolved tool
/// instances as nodes and producer→consumer edges. Produced by the (out of
/// scope) pipeline parser.
pub trait Pipeline {
    /// The pipeline's tag, shared by every job built from it.
    fn name(&self) -> &str;
    /// The node names, in the order the parser declared them.
    fn node_names(&self) -> Vec<String>;
    /// Look up a node's tool instance by name.
    fn node(&self, name: &str) -> Option<Arc<dyn Tool>>;
    /// All producer→consumer edges.
    fn edges(&self) -> Vec<PipelineEdge>;
}

/// A set of scheduler hints for one tool, as read from a [`ProfileSpec`]
/// file. Unknown keys in the source file are ignored by the loader;
/// unspecified keys here inherit [`crate::context::Defaults`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileEntry {
    /// Thread count override.
    pub threads: Option<u32>,
    /// Queue name override.
    pub queue: Option<String>,
    /// Priority override.
    pub priority: Option<i32>,
    /// Max wall time override, in minutes.
    pub max_time: Option<u32>,
    /// Max memory override, in megabytes.
    pub max_memory: Option<u32>,
    /// Account override.
    pub account: Option<String>,
    /// Working directory override.
    pub working_directory: Option<PathBuf>,
}

/// A keyed structure mapping tool name → subset of scheduler hints, as
/// loaded from a profile spec file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileSpec {
    #[serde(flatten)]
    entries: HashMap<String, ProfileEntry>,
}

impl ProfileSpec {
    /// Load a profile spec from a TOML file on disk.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| crate::Error::Parser(e.to_string()))
    }

    /// Look up the entry for a tool by name, if any.
    pub fn get(&self, tool_name: &str) -> Option<&ProfileEntry> {
        self.entries.get(tool_name)
    }
}

/// Caller-supplied profile overrides. An explicit `threads` override here
/// always wins over both the profile spec entry and the global default.
#[derive(Debug, Clone, Default)]
pub struct ProfileOverrides {
    /// Explicit thread-count override, if the caller passed one.
    pub threads: Option<u32>,
}

/// Merge global defaults, an optional profile-spec entry for this tool, and
/// caller overrides into one [`SchedulingProfile`], in that priority order
/// (caller override > spec entry > global default) except for `threads`,
/// which always prefers the explicit caller override over everything else.
pub fn resolve_profile(
    defaults: &crate::context::Defaults,
    spec_entry: Option<&ProfileEntry>,
    overrides: &ProfileOverrides,
) -> SchedulingProfile {
    let spec_threads = spec_entry.and_then(|e| e.threads);
    let threads = overrides
        .threads
        .or(spec_threads)
        .unwrap_or(defaults.threads);

    SchedulingProfile {
        queue: spec_entry
            .and_then(|e| e.queue.clone())
            .or_else(|| defaults.queue.clone()),
        priority: spec_entry.and_then(|e| e.priority).or(defaults.priority),
        threads,
        max_time: spec_entry.and_then(|e| e.max_time).or(defaults.max_time),
        max_memory: spec_entry
            .and_then(|e| e.max_memory)
            .or(defaults.max_memory),
        account: spec_entry
            .and_then(|e| e.account.clone())
            .or_else(|| defaults.account.clone()),
        working_directory: spec_entry
            .and_then(|e| e.working_directory.clone())
            .unwrap_or_else(|| defaults.working_directory.clone()),
    }
}
