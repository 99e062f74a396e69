//! Convert a [`Pipeline`] description into a DAG of [`Job`]s.

use std::collections::{HashMap, HashSet};

use crate::context::Context;
use crate::graph::GraphError;
use crate::job::{Job, JobId};
use crate::tool::{resolve_profile, Pipeline, ProfileOverrides, ProfileSpec};

/// Build one [`Job`] per pipeline node, wire up dependencies from the
/// pipeline's edges, apply the scheduling profile, validate every job, and
/// reject output-path collisions, in that order.
///
/// Pure with respect to persistent state: no `Store`/`Cluster` call is made.
/// Local ids are assigned sequentially in the order pipeline nodes were
/// declared; the builder does not consult the database, so these ids are
/// provisional until the caller persists the batch.
pub fn build_jobs(
    pipeline: &dyn Pipeline,
    ctx: &Context,
    profile_spec: Option<&ProfileSpec>,
    overrides: &ProfileOverrides,
) -> crate::Result<Vec<Job>> {
    let node_names = pipeline.node_names();
    let mut name_to_id: HashMap<String, JobId> = HashMap::new();
    let mut jobs = Vec::with_capacity(node_names.len());

    // Step 1: materialize one Job per node, assigning provisional local ids.
    for (idx, name) in node_names.iter().enumerate() {
        let tool = pipeline
            .node(name)
            .ok_or_else(|| GraphError::UnknownNode(name.clone()))?;

        let profile = resolve_profile(
            &ctx.defaults,
            profile_spec.and_then(|s| s.get(tool.name())),
            overrides,
        );

        let mut job = Job::new(
            pipeline.name(),
            name.clone(),
            tool.interpreter(),
            tool.command(),
            profile.working_directory.clone(),
        );
        job.profile = profile;
        let id = (idx + 1) as JobId;
        job.id = Some(id);
        job.attach_tool(tool);
        name_to_id.insert(name.clone(), id);
        jobs.push(job);
    }

    // Step 2: wire dependencies from pipeline edges. Group-link edges also
    // set group_from/group_to, which is what group detection walks.
    for edge in pipeline.edges() {
        let from_id = *name_to_id
            .get(&edge.from)
            .ok_or_else(|| GraphError::UnknownNode(edge.from.clone()))?;
        let to_id = *name_to_id
            .get(&edge.to)
            .ok_or_else(|| GraphError::UnknownNode(edge.to.clone()))?;

        let to_idx = jobs
            .iter()
            .position(|j| j.id == Some(to_id))
            .expect("to_id was just resolved from name_to_id");
        jobs[to_idx].dependencies.insert(from_id);

        if edge.is_group_link {
            jobs[to_idx].group_from = Some(from_id);
            let from_idx = jobs
                .iter()
                .position(|j| j.id == Some(from_id))
                .expect("from_id was just resolved from name_to_id");
            jobs[from_idx].group_to = Some(to_id);
        }
    }

    // Reject cycles before any further processing depends on acyclicity.
    reject_cycles(&jobs)?;

    // Step 4: validate every job's options; abort on the first error.
    for job in &jobs {
        if let Some(tool) = &job.tool {
            tool.validate()
                .map_err(|e| crate::Error::Validation(format!("{job}: {e}")))?;
        }
    }

    // Step 5: reject output-path collisions between any two jobs in this build.
    check_output_collisions(&jobs)?;

    Ok(jobs)
}

fn reject_cycles(jobs: &[Job]) -> Result<(), GraphError> {
    let mut in_degree: HashMap<JobId, usize> = HashMap::new();
    let mut by_id: HashMap<JobId, &Job> = HashMap::new();
    for job in jobs {
        let id = job.id.expect("builder assigns ids to every job");
        by_id.insert(id, job);
        in_degree.entry(id).or_insert(0);
    }
    for job in jobs {
        for _dep in &job.dependencies {
            *in_degree.get_mut(&job.id.unwrap()).unwrap() += 1;
        }
    }

    let mut queue: Vec<JobId> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();
    let mut visited = HashSet::new();

    while let Some(id) = queue.pop() {
        if !visited.insert(id) {
            continue;
        }
        for job in jobs {
            let jid = job.id.unwrap();
            if job.dependencies.contains(&id) {
                let deg = in_degree.get_mut(&jid).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    queue.push(jid);
                }
            }
        }
    }

    if visited.len() != jobs.len() {
        Err(GraphError::Cycle)
    } else {
        Ok(())
    }
}

/// Check that no two jobs in `jobs` declare the same resolved output path.
/// Reused verbatim by the Local Execution Engine's own pre-flight check.
pub fn check_output_collisions(jobs: &[Job]) -> Result<(), GraphError> {
    let mut seen: HashMap<std::path::PathBuf, &Job> = HashMap::new();
    for job in jobs {
        for path in job.resolved_output_files() {
            if let Some(other) = seen.get(&path) {
                return Err(GraphError::OutputCollision {
                    path: path.display().to_string(),
                    a: other.to_string(),
                    b: job.to_string(),
                });
            }
            seen.insert(path, job);
        }
    }
    Ok(())
}
