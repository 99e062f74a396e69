//! Pure graph traversals over a job set: parents, subgraph, and topological
//! order. All three are diamond-safe — every node is visited once regardless
//! of how many paths lead to it.

use std::collections::{HashMap, HashSet};

use crate::graph::group::{create_groups, Group};
use crate::graph::GraphError;
use crate::job::{Job, JobId};

fn index_by_id(jobs: &[Job]) -> HashMap<JobId, &Job> {
    jobs.iter()
        .filter_map(|j| j.id.map(|id| (id, j)))
        .collect()
}

/// The jobs in `jobs` with no incoming dependency from another job *within
/// `jobs`*. A graph need not be connected, so more than one parent is normal.
pub fn parents(jobs: &[Job]) -> Vec<JobId> {
    let ids: HashSet<JobId> = jobs.iter().filter_map(|j| j.id).collect();
    jobs.iter()
        .filter_map(|j| j.id)
        .filter(|id| {
            let job = jobs.iter().find(|j| j.id == Some(*id)).unwrap();
            job.dependencies.iter().all(|dep| !ids.contains(dep))
        })
        .collect()
}

/// The transitive closure of `start`'s children (inverse of `dependencies`),
/// including `start` itself.
pub fn subgraph(jobs: &[Job], start: JobId) -> Result<Vec<JobId>, GraphError> {
    let by_id = index_by_id(jobs);
    if !by_id.contains_key(&start) {
        return Err(GraphError::UnknownJob(start));
    }

    // children(id) = every job that lists `id` in its own dependencies.
    let mut children: HashMap<JobId, Vec<JobId>> = HashMap::new();
    for job in jobs {
        let Some(id) = job.id else { continue };
        for dep in &job.dependencies {
            children.entry(*dep).or_default().push(id);
        }
    }

    let mut visited = HashSet::new();
    let mut order = Vec::new();
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        order.push(id);
        if let Some(kids) = children.get(&id) {
            for &kid in kids {
                if !visited.contains(&kid) {
                    stack.push(kid);
                }
            }
        }
    }
    Ok(order)
}

/// A linear extension of the dependency DAG in which group members remain
/// contiguous and in head-to-tail order.
///
/// Built by first detecting groups, then running Kahn's algorithm over the
/// *group* dependency graph (a group's external dependencies are the union
/// of its members' dependencies minus the members themselves), and finally
/// flattening each group in its internal head-to-tail order.
pub fn topological_order(jobs: &[Job]) -> Result<Vec<JobId>, GraphError> {
    let groups = ordered_groups(jobs)?;
    let order: Vec<JobId> = groups.iter().flat_map(|g| g.members.iter().copied()).collect();
    Ok(order)
}

/// Order groups so the sequence across groups respects the external
/// dependency DAG, via Kahn's algorithm over the group-level dependency
/// graph. Used directly by the Submission/Local Execution Engines, which
/// need group boundaries, not just a flat job order.
pub fn ordered_groups(jobs: &[Job]) -> Result<Vec<Group>, GraphError> {
    let groups = create_groups(jobs)?;
    let member_to_group: HashMap<JobId, usize> = groups
        .iter()
        .enumerate()
        .flat_map(|(gi, g)| g.members.iter().map(move |&id| (id, gi)))
        .collect();

    let mut in_degree = vec![0usize; groups.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); groups.len()];
    for (gi, group) in groups.iter().enumerate() {
        for dep in &group.external_dependencies {
            let Some(&dep_gi) = member_to_group.get(dep) else {
                continue;
            };
            if dep_gi != gi {
                dependents[dep_gi].push(gi);
                in_degree[gi] += 1;
            }
        }
    }

    let mut queue: Vec<usize> = (0..groups.len()).filter(|&gi| in_degree[gi] == 0).collect();
    queue.sort_unstable();
    let mut visited = vec![false; groups.len()];
    let mut order = Vec::with_capacity(groups.len());
    while let Some(gi) = queue.pop() {
        if visited[gi] {
            continue;
        }
        visited[gi] = true;
        order.push(gi);
        for &dep_gi in &dependents[gi] {
            in_degree[dep_gi] -= 1;
            if in_degree[dep_gi] == 0 {
                queue.push(dep_gi);
            }
        }
        queue.sort_unstable();
    }

    if order.len() != groups.len() {
        return Err(GraphError::Cycle);
    }

    let total_jobs: usize = groups.iter().map(|g| g.members.len()).sum();
    if total_jobs != jobs.len() {
        return Err(GraphError::Cycle);
    }

    let mut groups = groups;
    // Pull groups out in dependency order without cloning, by index.
    let mut slots: Vec<Option<Group>> = groups.drain(..).map(Some).collect();
    Ok(order.into_iter().map(|gi| slots[gi].take().unwrap()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Job;

    fn job(id: JobId, deps: &[JobId]) -> Job {
        let mut j = Job::new("p", format!("j{id}"), "bash", "true", "/tmp");
        j.id = Some(id);
        j.dependencies = deps.iter().copied().collect();
        j
    }

    #[test]
    fn parents_are_jobs_with_no_internal_dependency() {
        let jobs = vec![job(1, &[]), job(2, &[1]), job(3, &[])];
        let mut p = parents(&jobs);
        p.sort_unstable();
        assert_eq!(p, vec![1, 3]);
    }

    #[test]
    fn subgraph_of_root_includes_whole_diamond_once() {
        let jobs = vec![job(1, &[]), job(2, &[1]), job(3, &[1]), job(4, &[2, 3])];
        let mut s = subgraph(&jobs, 1).unwrap();
        s.sort_unstable();
        assert_eq!(s, vec![1, 2, 3, 4]);
    }

    #[test]
    fn subgraph_of_unknown_job_errors() {
        let jobs = vec![job(1, &[])];
        assert!(matches!(subgraph(&jobs, 99), Err(GraphError::UnknownJob(99))));
    }

    #[test]
    fn topological_order_respects_diamond_edges() {
        let jobs = vec![job(1, &[]), job(2, &[1]), job(3, &[1]), job(4, &[2, 3])];
        let order = topological_order(&jobs).unwrap();
        assert_eq!(order.len(), 4);
        let pos = |id: JobId| order.iter().position(|&x| x == id).unwrap();
        assert!(pos(1) < pos(2));
        assert!(pos(1) < pos(3));
        assert!(pos(2) < pos(4));
        assert!(pos(3) < pos(4));
    }
}
