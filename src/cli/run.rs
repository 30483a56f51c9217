//! tasksmith run and retry command implementations

use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::{runtime, Project};
use crate::error::Result;
use crate::executor::{CommandExecutor, Executor};
use crate::orchestrator::{DispatchResult, Orchestrator, RunOptions, RunOutcome};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::shutdown;
use crate::task::TaskStatus;

pub struct RunCommandOptions {
    pub once: bool,
    pub max_stalled_checks: Option<u32>,
    pub root: Option<PathBuf>,
    pub output: OutputOptions,
}

fn orchestrator(project: Project) -> Result<Orchestrator> {
    let executor: Arc<dyn Executor> =
        Arc::new(CommandExecutor::from_config(&project.config.executor));
    Orchestrator::new(project.root, project.config, project.store, executor)
}

fn describe(result: &DispatchResult) -> String {
    let mut line = format!("{} [{}] -> {}", result.task, result.role, result.status);
    if let Some(error) = &result.error {
        line.push_str(&format!(" ({error})"));
    } else if !result.executor_success {
        line.push_str(" (executor reported failure)");
    } else if !result.missing_deliverables.is_empty() {
        line.push_str(&format!(" (missing {})", result.missing_deliverables.join(", ")));
    }
    line
}

pub fn run(options: RunCommandOptions) -> Result<()> {
    let project = Project::open(options.root)?;
    let mut run_options = RunOptions::from_config(&project.config)?;
    run_options.once = options.once;
    if let Some(max) = options.max_stalled_checks {
        run_options.max_stalled_checks = max;
    }

    let _lock = project.state_lock()?;
    let rt = runtime()?;
    let report = rt.block_on(async {
        let mut orchestrator = orchestrator(project)?;
        let cancel = shutdown::install_signal_handlers();
        orchestrator.run(cancel, &run_options).await
    })?;

    let header = match report.outcome {
        RunOutcome::Complete => "tasksmith run: sprint complete",
        RunOutcome::Stalled => "tasksmith run: stalled, no task is ready",
        RunOutcome::Cancelled => "tasksmith run: cancelled",
        RunOutcome::Paused => "tasksmith run: cycle finished",
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("cycles", report.cycles.to_string());
    human.push_summary("dispatched", report.dispatched.len().to_string());
    human.push_summary(
        "progress",
        format!(
            "{}/{} complete ({:.0}%)",
            report.progress.count(TaskStatus::Complete),
            report.progress.total,
            report.progress.percent_complete
        ),
    );
    for result in &report.dispatched {
        human.push_detail(describe(result));
    }
    let blocked = report.progress.count(TaskStatus::Blocked);
    if blocked > 0 {
        human.push_warning(format!("{blocked} task(s) blocked"));
        human.push_next_step("tasksmith status");
    }
    if report.outcome == RunOutcome::Paused {
        human.push_next_step("tasksmith run");
    }

    emit_success(options.output, "run", &report, Some(&human))
}

pub struct RetryOptions {
    pub id: String,
    pub root: Option<PathBuf>,
    pub output: OutputOptions,
}

pub fn run_retry(options: RetryOptions) -> Result<()> {
    let project = Project::open(options.root)?;
    let _lock = project.state_lock()?;
    let rt = runtime()?;
    let result = rt.block_on(async {
        let mut orchestrator = orchestrator(project)?;
        orchestrator.retry(&options.id).await
    })?;

    let header = if result.status == TaskStatus::Complete {
        format!("tasksmith retry: {} complete", result.task)
    } else {
        format!("tasksmith retry: {} still blocked", result.task)
    };
    let mut human = HumanOutput::new(header);
    human.push_detail(describe(&result));
    if result.status == TaskStatus::Complete {
        human.push_next_step("tasksmith run");
    } else {
        human.push_next_step(format!("tasksmith task show {}", result.task));
    }

    emit_success(options.output, "retry", &result, Some(&human))
}
