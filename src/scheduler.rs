//! Readiness computation over a [`TaskGraph`].
//!
//! A task is ready when it is `pending` and every dependency id is in the
//! graph's completed set. Ready tasks keep graph order; priority sorting is a
//! presentation concern handled by [`by_priority`].

use std::collections::{BTreeMap, HashMap};

use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::task::{Task, TaskGraph, TaskStatus};

/// Non-fatal findings from [`validate`].
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct GraphReport {
    /// `(task, dependency)` pairs naming ids absent from the graph.
    pub unknown_dependencies: Vec<(String, String)>,
}

/// Check the dependency graph before any readiness computation.
///
/// Self-dependencies and cycles are fatal. Dependencies on unknown ids are
/// returned as warnings; those tasks can never become ready and surface as a
/// stalled sprint.
pub fn validate(graph: &TaskGraph) -> Result<GraphReport> {
    let mut dag: DiGraph<&str, ()> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
    for task in graph.iter() {
        if task.dependencies.contains(&task.id) {
            return Err(Error::SelfDependency(task.id.clone()));
        }
        nodes.insert(task.id.as_str(), dag.add_node(task.id.as_str()));
    }

    let mut report = GraphReport::default();
    for task in graph.iter() {
        let to = nodes[task.id.as_str()];
        for dependency in &task.dependencies {
            match nodes.get(dependency.as_str()) {
                Some(&from) => {
                    dag.add_edge(from, to, ());
                }
                // finished outside the graph
                None if graph.is_completed(dependency) => {}
                None => {
                    warn!(task = %task.id, dependency = %dependency, "dependency not in task graph");
                    report
                        .unknown_dependencies
                        .push((task.id.clone(), dependency.clone()));
                }
            }
        }
    }

    if is_cyclic_directed(&dag) {
        let mut members: Vec<String> = tarjan_scc(&dag)
            .into_iter()
            .filter(|component| component.len() > 1)
            .flatten()
            .map(|index| dag[index].to_string())
            .collect();
        members.sort();
        return Err(Error::CycleDetected { members });
    }

    debug!(tasks = graph.len(), "task graph validated");
    Ok(report)
}

/// Tasks eligible for dispatch right now, in graph order.
pub fn ready_set(graph: &TaskGraph) -> Vec<&Task> {
    graph
        .iter()
        .filter(|task| task.status() == TaskStatus::Pending)
        .filter(|task| {
            task.dependencies
                .iter()
                .all(|dependency| graph.is_completed(dependency))
        })
        .collect()
}

/// Stable sort by priority for display. Equal priorities keep input order.
pub fn by_priority<'a>(tasks: &[&'a Task]) -> Vec<&'a Task> {
    let mut sorted = tasks.to_vec();
    sorted.sort_by_key(|task| task.priority.rank());
    sorted
}

/// Aggregate counts for a task sequence.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Progress {
    pub total: usize,
    pub by_status: BTreeMap<TaskStatus, usize>,
    pub percent_complete: f64,
}

impl Progress {
    pub fn compute<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut by_status: BTreeMap<TaskStatus, usize> =
            TaskStatus::ALL.into_iter().map(|status| (status, 0)).collect();
        let mut total = 0;
        for task in tasks {
            total += 1;
            *by_status.entry(task.status()).or_insert(0) += 1;
        }
        let complete = by_status[&TaskStatus::Complete];
        let percent_complete = if total == 0 {
            0.0
        } else {
            complete as f64 / total as f64 * 100.0
        };
        Self {
            total,
            by_status,
            percent_complete,
        }
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Where a sprint stands after a readiness check.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SprintState {
    /// Every task is complete.
    Complete,
    /// Nothing is ready but work remains (blocked or unsatisfiable).
    Stalled,
    /// At least one task is ready.
    Active,
}

pub fn sprint_state(graph: &TaskGraph) -> SprintState {
    if graph
        .iter()
        .all(|task| task.status() == TaskStatus::Complete)
    {
        SprintState::Complete
    } else if ready_set(graph).is_empty() {
        SprintState::Stalled
    } else {
        SprintState::Active
    }
}
