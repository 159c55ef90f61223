//! Converts a schedule-agnostic [`TaskDAG`] into an execution plan.
//!
//! For a single worker, scheduling is a no-op: [`linearize`] only checks
//! that the DAG's declared task order is actually topological. For
//! multiple workers, [`partition`] additionally assigns each task to a
//! host with enough spare memory, using a deterministic first-fit search
//! so that the same DAG and the same host list always produce the same
//! placement.

pub mod errors;

use std::collections::HashSet;

use log::debug;
use specifications::task::TaskDAG;

use crate::errors::SchedError;


/***** LIBRARY *****/
/// A worker host available to place tasks onto.
#[derive(Clone, Debug)]
pub struct Host {
    pub id: String,
    pub memory_mb: u64,
}

/// A task's assigned host, keyed by task name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub task_name: String,
    pub host_id: String,
}

/// Checks that `dag.tasks` is already in topological order: every dataset a
/// task consumes must be produced by a task that precedes it. This is a
/// placeholder for more elaborate reordering strategies; today's
/// `TaskDAGBuilder::materialize` always produces an already-ordered DAG, so
/// there is nothing to do beyond validating the invariant.
pub fn linearize(dag: &TaskDAG) -> Result<&TaskDAG, SchedError> {
    let mut produced: HashSet<&str> = HashSet::new();
    for task in &dag.tasks {
        for dataset in task.dataset_inputs_kw.values().chain(task.dataset_inputs_ps.values()) {
            if !produced.contains(dataset.as_str()) {
                return Err(SchedError::OutOfOrder { task: task.name.clone(), dataset: dataset.to_string() });
            }
        }
        if let Some(out) = &task.output_name { produced.insert(out.as_str()); }
    }
    Ok(dag)
}

/// Assigns each task in `dag` to one of `hosts`, in DAG order.
///
/// A task that names a pinned host (`task.host`) is checked against that
/// host alone: unknown id is [`SchedError::UnknownHost`], insufficient
/// capacity is [`SchedError::CapacityExceeded`]. An unpinned task uses
/// deterministic first-fit: hosts are tried in ascending id order, and the
/// first host with at least `task_memory_mb(task)` remaining capacity wins.
/// Ties (equal remaining capacity) are broken by host id, which first-fit
/// over a stably sorted host list already guarantees.
///
/// Deliberately simple: it does not try to pack tasks optimally (e.g. via
/// bin-packing heuristics), and it assigns greedily without backtracking.
/// This is adequate for a small-scale engine; a cluster-scale scheduler
/// would need a real bin-packing or priority-based allocator instead.
pub fn partition(dag: &TaskDAG, hosts: &[Host], task_memory_mb: impl Fn(&str) -> u64) -> Result<Vec<Placement>, SchedError> {
    linearize(dag)?;

    if hosts.is_empty() { return Err(SchedError::NoHosts); }

    let mut sorted_hosts: Vec<&Host> = hosts.iter().collect();
    sorted_hosts.sort_by(|a, b| a.id.cmp(&b.id));

    let mut remaining: Vec<u64> = sorted_hosts.iter().map(|h| h.memory_mb).collect();
    let mut placements = Vec::with_capacity(dag.tasks.len());

    for task in &dag.tasks {
        let needed = task_memory_mb(&task.name);

        let slot = match &task.host {
            Some(pinned) => match sorted_hosts.iter().position(|h| &h.id == pinned) {
                Some(i) => {
                    if remaining[i] < needed { return Err(SchedError::CapacityExceeded { task: task.name.clone(), needed_mb: needed }); }
                    i
                }
                None => return Err(SchedError::UnknownHost { task: task.name.clone(), host: pinned.clone() }),
            },
            None => match remaining.iter().position(|&avail| avail >= needed) {
                Some(i) => i,
                None => return Err(SchedError::CapacityExceeded { task: task.name.clone(), needed_mb: needed }),
            },
        };

        remaining[slot] -= needed;
        debug!("placed task '{}' ({needed}MB) on host '{}' ({}MB left)", task.name, sorted_hosts[slot].id, remaining[slot]);
        placements.push(Placement { task_name: task.name.clone(), host_id: sorted_hosts[slot].id.clone() });
    }

    Ok(placements)
}
