//! Group detection: a group is a maximal chain of jobs linked by
//! `group_from`/`group_to`, representing a shell pipeline (`a | b | c`) that
//! must submit and run as a single cluster entry.

use std::collections::{HashMap, HashSet};

use crate::graph::GraphError;
use crate::job::{Job, JobId};

/// One group: its members head-to-tail, and its externally visible
/// dependencies/children (members excluded from both).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Members in head-to-tail order. `members[0]` has `group_from == None`.
    pub members: Vec<JobId>,
    /// `(⋃ deps of members) \ members`.
    pub external_dependencies: HashSet<JobId>,
    /// `(⋃ children of members) \ members`.
    pub external_children: HashSet<JobId>,
}

impl Group {
    /// Render the group the way a piped shell group is shown to a user:
    /// each member joined by `|`, looked up by id against `jobs`.
    pub fn render(&self, jobs: &[Job]) -> String {
        self.members
            .iter()
            .map(|id| {
                jobs.iter()
                    .find(|j| j.id == Some(*id))
                    .map(|j| j.to_string())
                    .unwrap_or_else(|| id.to_string())
            })
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Partition `jobs` into groups. Every job belongs to exactly one group.
/// A lone job with no `group_from`/`group_to` is a group of one.
pub fn create_groups(jobs: &[Job]) -> Result<Vec<Group>, GraphError> {
    let by_id: HashMap<JobId, &Job> = jobs
        .iter()
        .filter_map(|j| j.id.map(|id| (id, j)))
        .collect();

    // children(id) = every job that lists `id` in its own dependencies;
    // used only to compute each group's externally visible children.
    let mut children: HashMap<JobId, Vec<JobId>> = HashMap::new();
    for job in jobs {
        let Some(id) = job.id else { continue };
        for dep in &job.dependencies {
            children.entry(*dep).or_default().push(id);
        }
    }

    let heads: Vec<JobId> = jobs
        .iter()
        .filter(|j| j.is_group_head())
        .filter_map(|j| j.id)
        .collect();

    let mut groups = Vec::with_capacity(heads.len());
    let mut seen = HashSet::new();

    for head in heads {
        let mut members = Vec::new();
        let mut cursor = Some(head);
        while let Some(id) = cursor {
            if !seen.insert(id) {
                return Err(GraphError::Cycle);
            }
            members.push(id);
            cursor = by_id.get(&id).and_then(|j| j.group_to);
        }

        let member_set: HashSet<JobId> = members.iter().copied().collect();
        let mut external_dependencies = HashSet::new();
        let mut external_children = HashSet::new();
        for &id in &members {
            let job = by_id.get(&id).ok_or(GraphError::UnknownJob(id))?;
            external_dependencies.extend(job.dependencies.iter().filter(|d| !member_set.contains(d)));
            if let Some(kids) = children.get(&id) {
                external_children.extend(kids.iter().filter(|c| !member_set.contains(c)));
            }
        }

        groups.push(Group {
            members,
            external_dependencies,
            external_children,
        });
    }

    if seen.len() != jobs.iter().filter(|j| j.id.is_some()).count() {
        // A job claimed group_from pointing at something that isn't a head's
        // chain (e.g. group_from references a job that is itself a follower
        // of a different chain, or an id outside this set) — not a valid
        // grouping.
        return Err(GraphError::Cycle);
    }

    Ok(groups)
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
    fn lone_jobs_are_groups_of_one() {
        let jobs = vec![job(1, &[]), job(2, &[1])];
        let groups = create_groups(&jobs).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups.iter().map(|g| g.members.len()).sum::<usize>(), 2);
    }

    #[test]
    fn piped_chain_becomes_one_group_head_to_tail() {
        let mut a = job(1, &[]);
        let mut b = job(2, &[]);
        b.group_from = Some(1);
        a.group_to = Some(2);
        let mut c = job(3, &[]);
        c.group_from = Some(2);
        b.group_to = Some(3);

        let jobs = vec![a, b, c];
        let groups = create_groups(&jobs).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members, vec![1, 2, 3]);
    }

    #[test]
    fn render_joins_piped_members_with_pipe() {
        let mut a = job(1, &[]);
        let mut b = job(2, &[]);
        b.group_from = Some(1);
        a.group_to = Some(2);
        let jobs = vec![a, b];
        let groups = create_groups(&jobs).unwrap();
        assert_eq!(groups[0].render(&jobs), "j1#1|j2#2");
    }

    #[test]
    fn external_dependencies_exclude_internal_links() {
        let mut upstream = job(1, &[]);
        let mut head = job(2, &[1]);
        let mut tail = job(3, &[]);
        tail.group_from = Some(2);
        head.group_to = Some(3);
        upstream.group_to = None;

        let jobs = vec![upstream, head, tail];
        let groups = create_groups(&jobs).unwrap();
        let piped = groups.iter().find(|g| g.members.contains(&2)).unwrap();
        assert_eq!(piped.members, vec![2, 3]);
        assert_eq!(piped.external_dependencies, [1].into_iter().collect());
    }
}
