//! tasksmith direction subcommands

use std::path::PathBuf;

use crate::cli::{runtime, Project};
use crate::direction;
use crate::error::{Error, Result};
use crate::executor::CommandExecutor;
use crate::output::{emit_success, HumanOutput, OutputOptions};

#[derive(serde::Serialize)]
struct DirectionReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    documents: Option<usize>,
}

pub struct SetOptions {
    pub text: String,
    pub root: Option<PathBuf>,
    pub output: OutputOptions,
}

pub fn run_set(options: SetOptions) -> Result<()> {
    let project = Project::open(options.root)?;
    let _lock = project.state_lock()?;
    let mut snapshot = project.store.load()?.snapshot;
    direction::set(&mut snapshot, &options.text)?;
    project.store.save(&snapshot)?;

    let mut human = HumanOutput::new("tasksmith direction set");
    human.push_summary("length", format!("{} chars", options.text.trim().len()));
    emit_success(
        options.output,
        "direction set",
        &DirectionReport {
            direction: snapshot.project_direction,
            documents: None,
        },
        Some(&human),
    )
}

pub struct AnalyzeOptions {
    pub root: Option<PathBuf>,
    pub output: OutputOptions,
}

pub fn run_analyze(options: AnalyzeOptions) -> Result<()> {
    let project = Project::open(options.root)?;
    let _lock = project.state_lock()?;
    let docs_dir = project.root.join(&project.config.analysis.docs_dir);
    let executor = CommandExecutor::from_config(&project.config.executor);
    let mut snapshot = project.store.load()?.snapshot;

    let rt = runtime()?;
    let documents = rt.block_on(direction::analyze(
        &mut snapshot,
        &project.root,
        &docs_dir,
        &executor,
    ))?;
    project.store.save(&snapshot)?;

    let mut human = HumanOutput::new("tasksmith direction analyze: direction updated");
    human.push_summary("documents", documents.to_string());
    human.push_summary("docs dir", docs_dir.display().to_string());
    human.push_next_step("tasksmith direction show");
    emit_success(
        options.output,
        "direction analyze",
        &DirectionReport {
            direction: snapshot.project_direction,
            documents: Some(documents),
        },
        Some(&human),
    )
}

pub struct ShowOptions {
    pub root: Option<PathBuf>,
    pub output: OutputOptions,
}

pub fn run_show(options: ShowOptions) -> Result<()> {
    let project = Project::open(options.root)?;
    let snapshot = project.store.load()?.snapshot;
    let direction = snapshot.project_direction.ok_or_else(|| {
        Error::InvalidArgument(
            "no project direction stored; run `tasksmith direction set` or `tasksmith direction analyze`"
                .to_string(),
        )
    })?;

    let mut human = HumanOutput::new("tasksmith direction");
    if let Some(at) = snapshot.last_doc_analysis {
        human.push_summary("analyzed", at.format("%Y-%m-%d %H:%M:%S").to_string());
    }
    for line in direction.lines().filter(|line| !line.trim().is_empty()) {
        human.push_detail(line.to_string());
    }
    emit_success(
        options.output,
        "direction show",
        &DirectionReport {
            direction: Some(direction),
            documents: None,
        },
        Some(&human),
    )
}
