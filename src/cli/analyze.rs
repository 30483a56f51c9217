//! tasksmith analyze and survey command implementations

use std::path::PathBuf;

use crate::analyzer::survey::SurveySummary;
use crate::analyzer::{CodeIntelligence, Gap};
use crate::cli::Project;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::task::Task;

pub struct AnalyzeOptions {
    pub force: bool,
    pub root: Option<PathBuf>,
    pub output: OutputOptions,
}

#[derive(serde::Serialize)]
struct AnalyzeReport {
    analyzed: bool,
    gaps: Vec<Gap>,
    discovered: Vec<Task>,
    skipped_areas: Vec<String>,
    already_tracked: usize,
}

pub fn run_analyze(options: AnalyzeOptions) -> Result<()> {
    let project = Project::open(options.root)?;
    let _lock = project.state_lock()?;
    let intelligence = CodeIntelligence::new(&project.root, &project.config);
    let (snapshot, discovery) = project.store.load_or_analyze(&intelligence, options.force)?;

    let report = match discovery {
        Some(discovery) => AnalyzeReport {
            analyzed: true,
            gaps: discovery.gaps,
            discovered: snapshot.discovered_tasks.clone(),
            skipped_areas: discovery.skipped_areas,
            already_tracked: discovery.already_tracked,
        },
        None => AnalyzeReport {
            analyzed: false,
            gaps: Vec::new(),
            discovered: snapshot.discovered_tasks.clone(),
            skipped_areas: Vec::new(),
            already_tracked: 0,
        },
    };

    let header = if report.analyzed {
        "tasksmith analyze: analysis complete"
    } else {
        "tasksmith analyze: analysis is fresh, reusing discovered tasks"
    };
    let mut human = HumanOutput::new(header);
    if report.analyzed {
        human.push_summary("areas", project.config.areas.len().to_string());
        human.push_summary("gaps", report.gaps.len().to_string());
        human.push_summary("already tracked", report.already_tracked.to_string());
    }
    human.push_summary("discovered", report.discovered.len().to_string());
    for task in &report.discovered {
        human.push_detail(format!("{} [{}] {} ({})", task.id, task.role, task.title, task.priority));
    }
    for area in &report.skipped_areas {
        human.push_warning(format!("area '{area}' has no role; its gaps were not turned into tasks"));
    }
    if project.config.areas.is_empty() {
        human.push_warning("no [[areas]] configured; nothing to analyze");
    }
    if !report.discovered.is_empty() {
        human.push_next_step("tasksmith task triage --all");
    }
    if !report.analyzed {
        human.push_next_step("tasksmith analyze --force");
    }

    emit_success(options.output, "analyze", &report, Some(&human))
}

pub struct SurveyOptions {
    pub root: Option<PathBuf>,
    pub output: OutputOptions,
}

#[derive(serde::Serialize)]
struct SurveyReport {
    root: PathBuf,
    summary: SurveySummary,
    artifacts: Vec<SurveyArtifact>,
}

#[derive(serde::Serialize)]
struct SurveyArtifact {
    path: PathBuf,
    kind: String,
    capabilities: usize,
    markers: usize,
    signals: Vec<String>,
}

pub fn run_survey(options: SurveyOptions) -> Result<()> {
    let project = Project::open(options.root)?;
    let survey = CodeIntelligence::new(&project.root, &project.config).survey()?;
    let summary = survey.summary();

    let artifacts: Vec<SurveyArtifact> = survey
        .artifacts
        .iter()
        .map(|result| SurveyArtifact {
            path: result
                .path
                .strip_prefix(&survey.root)
                .unwrap_or(&result.path)
                .to_path_buf(),
            kind: result.kind.to_string(),
            capabilities: result.capabilities.len(),
            markers: result.markers.len(),
            signals: result.signals.clone(),
        })
        .collect();

    let mut human = HumanOutput::new("tasksmith survey");
    human.push_summary("root", survey.root.display().to_string());
    human.push_summary("artifacts", summary.artifacts.to_string());
    for (kind, count) in &summary.by_kind {
        human.push_summary(kind.to_string(), count.to_string());
    }
    human.push_summary("capabilities", summary.capabilities.to_string());
    human.push_summary("markers", summary.markers.to_string());
    for artifact in &artifacts {
        let mut line = format!(
            "{} [{}] {} capabilities, {} markers",
            artifact.path.display(),
            artifact.kind,
            artifact.capabilities,
            artifact.markers
        );
        if !artifact.signals.is_empty() {
            line.push_str(&format!(" ({})", artifact.signals.join("; ")));
        }
        human.push_detail(line);
    }
    for path in &summary.suspect {
        human.push_warning(format!("{} looks unimplemented", path.display()));
    }

    let report = SurveyReport {
        root: survey.root.clone(),
        summary,
        artifacts,
    };
    emit_success(options.output, "survey", &report, Some(&human))
}
