//! tasksmith status command implementation
//!
//! Single-pane summary of the sprint: progress, ready work, blocked tasks.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::cli::Project;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::scheduler::{self, Progress, SprintState};
use crate::task::TaskStatus;

pub struct StatusOptions {
    pub root: Option<PathBuf>,
    pub output: OutputOptions,
}

#[derive(serde::Serialize)]
struct StatusReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    sprint: Option<String>,
    state: SprintState,
    progress: Progress,
    ready: Vec<String>,
    blocked: Vec<BlockedTask>,
    discovered: usize,
    unknown_dependencies: Vec<(String, String)>,
    analysis_fresh: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_code_analysis: Option<DateTime<Utc>>,
}

#[derive(serde::Serialize)]
struct BlockedTask {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

pub fn run(options: StatusOptions) -> Result<()> {
    let project = Project::open(options.root)?;
    let loaded = project.store.load()?;
    let snapshot = loaded.snapshot;
    let graph = &snapshot.active_tasks;
    let graph_report = scheduler::validate(graph)?;

    let progress = Progress::compute(graph.iter());
    let state = scheduler::sprint_state(graph);
    let ready_tasks = scheduler::ready_set(graph);
    let ready: Vec<String> = scheduler::by_priority(&ready_tasks)
        .iter()
        .map(|task| task.id.clone())
        .collect();
    let blocked: Vec<BlockedTask> = graph
        .iter()
        .filter(|task| task.status() == TaskStatus::Blocked)
        .map(|task| BlockedTask {
            id: task.id.clone(),
            reason: task.history().last().and_then(|change| change.reason.clone()),
        })
        .collect();

    let mut human = HumanOutput::new(match &snapshot.sprint_name {
        Some(name) => format!("tasksmith status: {name}"),
        None => "tasksmith status".to_string(),
    });
    human.push_summary(
        "progress",
        format!(
            "{}/{} complete ({:.0}%)",
            progress.count(TaskStatus::Complete),
            progress.total,
            progress.percent_complete
        ),
    );
    for status in TaskStatus::ALL {
        let count = progress.count(status);
        if count > 0 && status != TaskStatus::Complete {
            human.push_summary(status.as_str(), count.to_string());
        }
    }
    human.push_summary("state", format!("{state:?}").to_lowercase());
    human.push_summary("discovered", snapshot.discovered_tasks.len().to_string());
    human.push_summary(
        "analysis",
        if loaded.fresh { "fresh" } else { "stale" },
    );
    for task in scheduler::by_priority(&ready_tasks) {
        human.push_detail(format!(
            "ready {} [{}] {} ({})",
            task.id, task.role, task.title, task.priority
        ));
    }
    for task in &blocked {
        human.push_detail(match &task.reason {
            Some(reason) => format!("blocked {}: {reason}", task.id),
            None => format!("blocked {}", task.id),
        });
    }
    for (task, dependency) in &graph_report.unknown_dependencies {
        human.push_warning(format!("{task} depends on unknown task {dependency}"));
    }
    match state {
        SprintState::Active => human.push_next_step("tasksmith run"),
        SprintState::Stalled if !blocked.is_empty() => {
            human.push_next_step(format!("tasksmith retry {}", blocked[0].id));
        }
        _ => {}
    }
    if !snapshot.discovered_tasks.is_empty() {
        human.push_next_step("tasksmith task list --discovered");
    }

    let report = StatusReport {
        sprint: snapshot.sprint_name.clone(),
        state,
        progress,
        ready,
        blocked,
        discovered: snapshot.discovered_tasks.len(),
        unknown_dependencies: graph_report.unknown_dependencies,
        analysis_fresh: loaded.fresh,
        last_code_analysis: snapshot.last_code_analysis,
    };
    emit_success(options.output, "status", &report, Some(&human))
}
