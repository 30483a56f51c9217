//! tasksmith task subcommands

use std::path::PathBuf;

use crate::cli::Project;
use crate::context::ContextSnapshot;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::scheduler;
use crate::sprint;
use crate::task::{AgentRole, Priority, Task, TaskStatus};

fn task_line(task: &Task) -> String {
    format!(
        "{} [{}] {} ({}, {})",
        task.id,
        task.status(),
        task.title,
        task.role,
        task.priority
    )
}

pub struct AddOptions {
    pub id: String,
    pub title: String,
    pub description: String,
    pub role: Option<String>,
    pub priority: String,
    pub depends: Vec<String>,
    pub deliverables: Vec<String>,
    pub context: Vec<String>,
    pub root: Option<PathBuf>,
    pub output: OutputOptions,
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let id = options.id.trim().to_string();
    if id.is_empty() {
        return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
    }
    if options.title.trim().is_empty() {
        return Err(Error::InvalidArgument("task title cannot be empty".to_string()));
    }
    let role = match options.role.as_deref() {
        Some(role) => role.parse::<AgentRole>()?,
        None => AgentRole::infer(&format!("{} {}", options.title, options.description)),
    };
    let priority: Priority = options.priority.parse()?;

    let project = Project::open(options.root)?;
    let _lock = project.state_lock()?;
    let mut snapshot = project.store.load()?.snapshot;
    let task = Task::new(id.clone(), options.title.trim(), role)
        .with_description(options.description)
        .with_priority(priority)
        .with_dependencies(options.depends)
        .with_deliverables(options.deliverables)
        .with_context_artifacts(options.context);
    snapshot.active_tasks.insert(task)?;
    let graph_report = scheduler::validate(&snapshot.active_tasks)?;
    project.store.save(&snapshot)?;

    let task = snapshot
        .active_tasks
        .get(&id)
        .ok_or_else(|| Error::TaskNotFound(id.clone()))?;
    let mut human = HumanOutput::new(format!("tasksmith task add: {id}"));
    human.push_summary("role", task.role.as_str());
    human.push_summary("priority", task.priority.as_str());
    if !task.dependencies.is_empty() {
        human.push_summary(
            "depends on",
            task.dependencies.iter().cloned().collect::<Vec<_>>().join(", "),
        );
    }
    for (_, dependency) in graph_report
        .unknown_dependencies
        .iter()
        .filter(|(task, _)| *task == id)
    {
        human.push_warning(format!("dependency {dependency} is not in the task graph"));
    }
    human.push_next_step("tasksmith run");

    emit_success(options.output, "task add", task, Some(&human))
}

pub struct ListOptions {
    pub status: Option<String>,
    pub discovered: bool,
    pub root: Option<PathBuf>,
    pub output: OutputOptions,
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let status = options
        .status
        .as_deref()
        .map(str::parse::<TaskStatus>)
        .transpose()?;
    let project = Project::open(options.root)?;
    let snapshot = project.store.load()?.snapshot;

    let tasks: Vec<&Task> = if options.discovered {
        snapshot.discovered_tasks.iter().collect()
    } else {
        snapshot.active_tasks.iter().collect()
    };
    let tasks: Vec<&Task> = tasks
        .into_iter()
        .filter(|task| status.map_or(true, |status| task.status() == status))
        .collect();

    let header = if options.discovered {
        "tasksmith task list: discovered"
    } else {
        "tasksmith task list"
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("tasks", tasks.len().to_string());
    for task in &tasks {
        human.push_detail(task_line(task));
    }
    if options.discovered && !tasks.is_empty() {
        human.push_next_step("tasksmith task triage <id>");
    }

    emit_success(options.output, "task list", &tasks, Some(&human))
}

pub struct ShowOptions {
    pub id: String,
    pub root: Option<PathBuf>,
    pub output: OutputOptions,
}

fn find<'a>(snapshot: &'a ContextSnapshot, id: &str) -> Result<&'a Task> {
    snapshot
        .active_tasks
        .get(id)
        .or_else(|| snapshot.discovered(id))
        .ok_or_else(|| Error::TaskNotFound(id.to_string()))
}

pub fn run_show(options: ShowOptions) -> Result<()> {
    let project = Project::open(options.root)?;
    let snapshot = project.store.load()?.snapshot;
    let task = find(&snapshot, &options.id)?;

    let mut human = HumanOutput::new(format!("{}: {}", task.id, task.title));
    human.push_summary("status", task.status().as_str());
    human.push_summary("role", task.role.as_str());
    human.push_summary("priority", task.priority.as_str());
    human.push_summary("attempts", task.attempts().to_string());
    if let Some(origin) = &task.origin_artifact {
        human.push_summary("origin", origin.clone());
    }
    if !task.dependencies.is_empty() {
        let deps: Vec<String> = task
            .dependencies
            .iter()
            .map(|dep| {
                if snapshot.active_tasks.is_completed(dep) {
                    format!("{dep} (done)")
                } else {
                    dep.clone()
                }
            })
            .collect();
        human.push_summary("depends on", deps.join(", "));
    }
    if !task.deliverables.is_empty() {
        human.push_summary("deliverables", task.deliverables.join(", "));
    }
    if !task.description.is_empty() {
        human.push_detail(task.description.clone());
    }
    for change in task.history() {
        let mut line = format!(
            "{} {} -> {}",
            change.at.format("%Y-%m-%d %H:%M:%S"),
            change.from,
            change.to
        );
        if let Some(reason) = &change.reason {
            line.push_str(&format!(": {reason}"));
        }
        human.push_detail(line);
    }
    if let Some(attempt) = task.last_attempt() {
        if !attempt.missing_deliverables.is_empty() {
            human.push_warning(format!(
                "last attempt missing: {}",
                attempt.missing_deliverables.join(", ")
            ));
        }
    }
    match task.status() {
        TaskStatus::Detected => human.push_next_step(format!("tasksmith task triage {}", task.id)),
        TaskStatus::Blocked => {
            human.push_next_step(format!("tasksmith retry {}", task.id));
            human.push_next_step(format!("tasksmith task review {}", task.id));
        }
        TaskStatus::Review => {
            human.push_next_step(format!("tasksmith task approve {}", task.id));
            human.push_next_step(format!("tasksmith task reject {}", task.id));
        }
        _ => {}
    }

    emit_success(options.output, "task show", task, Some(&human))
}

pub struct TriageOptions {
    pub ids: Vec<String>,
    pub all: bool,
    pub root: Option<PathBuf>,
    pub output: OutputOptions,
}

#[derive(serde::Serialize)]
struct TriageReport {
    promoted: Vec<String>,
}

pub fn run_triage(options: TriageOptions) -> Result<()> {
    let project = Project::open(options.root)?;
    let _lock = project.state_lock()?;
    let mut snapshot = project.store.load()?.snapshot;

    let ids: Vec<String> = if options.all {
        snapshot
            .discovered_tasks
            .iter()
            .map(|task| task.id.clone())
            .collect()
    } else {
        options.ids
    };

    let mut promoted = Vec::new();
    for id in ids {
        snapshot.promote(&id)?;
        promoted.push(id);
    }
    scheduler::validate(&snapshot.active_tasks)?;
    project.store.save(&snapshot)?;

    let mut human = HumanOutput::new("tasksmith task triage");
    human.push_summary("promoted", promoted.len().to_string());
    human.push_summary("remaining", snapshot.discovered_tasks.len().to_string());
    for id in &promoted {
        human.push_detail(id.clone());
    }
    if !promoted.is_empty() {
        human.push_next_step("tasksmith run");
    }

    emit_success(
        options.output,
        "task triage",
        &TriageReport { promoted },
        Some(&human),
    )
}

pub struct ImportOptions {
    pub file: PathBuf,
    pub root: Option<PathBuf>,
    pub output: OutputOptions,
}

pub fn run_import(options: ImportOptions) -> Result<()> {
    let project = Project::open(options.root)?;
    let _lock = project.state_lock()?;
    let definition = sprint::load(&options.file)?;
    let mut snapshot = project.store.load()?.snapshot;
    let report = sprint::import(&mut snapshot, definition)?;
    project.store.save(&snapshot)?;

    let mut human = HumanOutput::new(match &snapshot.sprint_name {
        Some(name) => format!("tasksmith task import: {name}"),
        None => "tasksmith task import".to_string(),
    });
    human.push_summary("added", report.added.len().to_string());
    human.push_summary("skipped", report.skipped.len().to_string());
    if !report.seeded.is_empty() {
        human.push_summary("already complete", report.seeded.join(", "));
    }
    for id in &report.skipped {
        human.push_warning(format!("{id} already exists; left unchanged"));
    }
    human.push_next_step("tasksmith status");

    emit_success(options.output, "task import", &report, Some(&human))
}

#[derive(Debug, Clone, Copy)]
pub enum ReviewAction {
    Review,
    Approve,
    Reject,
}

impl ReviewAction {
    fn target(self) -> TaskStatus {
        match self {
            ReviewAction::Review => TaskStatus::Review,
            ReviewAction::Approve => TaskStatus::Complete,
            ReviewAction::Reject => TaskStatus::Blocked,
        }
    }

    fn command(self) -> &'static str {
        match self {
            ReviewAction::Review => "task review",
            ReviewAction::Approve => "task approve",
            ReviewAction::Reject => "task reject",
        }
    }

    fn default_reason(self) -> &'static str {
        match self {
            ReviewAction::Review => "sent to review",
            ReviewAction::Approve => "approved in review",
            ReviewAction::Reject => "rejected in review",
        }
    }
}

pub struct TransitionOptions {
    pub action: ReviewAction,
    pub id: String,
    pub reason: Option<String>,
    pub root: Option<PathBuf>,
    pub output: OutputOptions,
}

/// Review transitions only; dispatch transitions belong to the control loop
pub fn run_transition(options: TransitionOptions) -> Result<()> {
    let action = options.action;
    let project = Project::open(options.root)?;
    let _lock = project.state_lock()?;
    let mut snapshot = project.store.load()?.snapshot;

    let reason = options
        .reason
        .unwrap_or_else(|| action.default_reason().to_string());
    snapshot
        .active_tasks
        .transition(&options.id, action.target(), reason)?;
    if action.target() == TaskStatus::Complete {
        snapshot.discovered_tasks.retain(|task| task.id != options.id);
    }
    project.store.save(&snapshot)?;

    let task = snapshot
        .active_tasks
        .get(&options.id)
        .ok_or_else(|| Error::TaskNotFound(options.id.clone()))?;
    let mut human = HumanOutput::new(format!("tasksmith {}: {}", action.command(), task.id));
    human.push_summary("status", task.status().as_str());
    if task.status() == TaskStatus::Complete {
        human.push_next_step("tasksmith run");
    }

    emit_success(options.output, action.command(), task, Some(&human))
}
