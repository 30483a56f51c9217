//! Gap detection and task synthesis.
//!
//! A gap is a difference between what a configured area requires and what
//! the analyzer found in the area's representative artifact.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use super::{analyze, AnalysisResult, Presence};
use crate::config::AreaConfig;
use crate::error::Result;
use crate::task::{Priority, Task, TaskGraph};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GapKind {
    MissingArtifact,
    UnreadableArtifact { reason: String },
    MissingCapability { capability: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Gap {
    pub area: String,
    pub artifact: String,
    #[serde(flatten)]
    pub kind: GapKind,
}

impl Gap {
    pub fn title(&self) -> String {
        match &self.kind {
            GapKind::MissingArtifact => format!("Create {} for {}", self.artifact, self.area),
            GapKind::UnreadableArtifact { .. } => {
                format!("Repair unreadable {} for {}", self.artifact, self.area)
            }
            GapKind::MissingCapability { capability } => {
                format!("Implement {} in {}", capability, self.artifact)
            }
        }
    }

    pub fn description(&self) -> String {
        match &self.kind {
            GapKind::MissingArtifact => format!(
                "The {} area has no {}. Create it with the capabilities the area requires.",
                self.area, self.artifact
            ),
            GapKind::UnreadableArtifact { reason } => format!(
                "{} could not be read ({}). Restore it so the {} area can be analyzed.",
                self.artifact, reason, self.area
            ),
            GapKind::MissingCapability { capability } => format!(
                "The {} area requires '{}' but {} does not define it.",
                self.area, capability, self.artifact
            ),
        }
    }
}

/// Gaps for one area given its analysis result
pub fn gaps_for_area(area: &AreaConfig, result: &AnalysisResult) -> Vec<Gap> {
    let gap = |kind| Gap {
        area: area.name.clone(),
        artifact: area.artifact.clone(),
        kind,
    };

    match &result.presence {
        Presence::Missing => vec![gap(GapKind::MissingArtifact)],
        Presence::Unreadable { reason } => vec![gap(GapKind::UnreadableArtifact {
            reason: reason.clone(),
        })],
        Presence::Present => {
            let required: BTreeSet<&str> = area.required.iter().map(String::as_str).collect();
            required
                .into_iter()
                .filter(|name| !result.has_capability(name))
                .map(|name| {
                    gap(GapKind::MissingCapability {
                        capability: name.to_string(),
                    })
                })
                .collect()
        }
    }
}

/// Analyze every configured area under `root` and collect its gaps
///
/// Areas whose `root` guard directory is absent are skipped.
pub fn find_gaps(root: &Path, areas: &[AreaConfig]) -> Result<Vec<Gap>> {
    let mut gaps = Vec::new();
    for area in areas {
        if let Some(guard) = &area.root {
            if !root.join(guard).is_dir() {
                debug!(area = %area.name, guard = %guard, "area root absent, skipping");
                continue;
            }
        }
        let kind = area.artifact_kind()?;
        let result = analyze(&root.join(&area.artifact), kind);
        let found = gaps_for_area(area, &result);
        debug!(area = %area.name, gaps = found.len(), "area analyzed");
        gaps.extend(found);
    }
    Ok(gaps)
}

#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    pub id_prefix: String,
    pub priority: Priority,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            id_prefix: "DETECTED".to_string(),
            priority: Priority::High,
        }
    }
}

/// Tasks synthesized from one analysis run
#[derive(Debug, Clone, Default, Serialize)]
pub struct Discovery {
    pub gaps: Vec<Gap>,
    pub tasks: Vec<Task>,
    /// Areas with gaps but no role mapping
    pub skipped_areas: Vec<String>,
    /// Gaps already tracked by an active task
    pub already_tracked: usize,
}

/// Turn gaps into `detected` tasks
///
/// Ids are `{prefix}_{NNN}`, numbered in gap order and skipping ids the
/// active graph already uses. A gap whose title matches an active task is
/// not emitted again.
pub fn synthesize_tasks(
    gaps: &[Gap],
    areas: &[AreaConfig],
    active: &TaskGraph,
    options: &SynthesisOptions,
) -> Discovery {
    let reserved: HashSet<&str> = active
        .iter()
        .map(|task| task.id.as_str())
        .chain(active.completed().iter().map(String::as_str))
        .collect();
    let tracked: HashSet<&str> = active.iter().map(|task| task.title.as_str()).collect();

    let mut discovery = Discovery {
        gaps: gaps.to_vec(),
        ..Discovery::default()
    };
    let mut next = 1usize;

    for gap in gaps {
        let role = areas
            .iter()
            .find(|area| area.name == gap.area)
            .and_then(|area| area.role);
        let Some(role) = role else {
            if !discovery.skipped_areas.contains(&gap.area) {
                warn!(area = %gap.area, "no role mapped for area; gaps not turned into tasks");
                discovery.skipped_areas.push(gap.area.clone());
            }
            continue;
        };

        let title = gap.title();
        if tracked.contains(title.as_str()) {
            discovery.already_tracked += 1;
            continue;
        }

        let id = loop {
            let candidate = format!("{}_{:03}", options.id_prefix, next);
            next += 1;
            if !reserved.contains(candidate.as_str()) {
                break candidate;
            }
        };

        let task = Task::detected(id, title, role, gap.artifact.clone())
            .with_description(gap.description())
            .with_priority(options.priority)
            .with_deliverables([gap.artifact.clone()])
            .with_context_artifacts(match gap.kind {
                GapKind::MissingCapability { .. } => vec![gap.artifact.clone()],
                _ => Vec::new(),
            });
        discovery.tasks.push(task);
    }

    discovery
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ArtifactKind;
    use crate::task::{AgentRole, TaskSource, TaskStatus};
    use tempfile::TempDir;

    fn area(name: &str, artifact: &str, required: &[&str], role: Option<AgentRole>) -> AreaConfig {
        AreaConfig {
            name: name.to_string(),
            artifact: artifact.to_string(),
            kind: None,
            root: None,
            required: required.iter().map(|s| s.to_string()).collect(),
            role,
        }
    }

    #[test]
    fn missing_artifact_yields_single_gap() {
        let temp = TempDir::new().unwrap();
        let areas = [area(
            "backend",
            "server/quote.js",
            &["calculateEstimate", "createQuote"],
            Some(AgentRole::Backend),
        )];

        let gaps = find_gaps(temp.path(), &areas).unwrap();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].kind, GapKind::MissingArtifact);
        assert_eq!(gaps[0].title(), "Create server/quote.js for backend");
    }

    #[test]
    fn missing_capabilities_in_sorted_order() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("quote.js"),
            "class Quote {\n    createQuote(x) {\n        return x;\n    }\n}\n",
        )
        .unwrap();
        let areas = [area(
            "backend",
            "quote.js",
            &["validateQuote", "createQuote", "calculateEstimate"],
            Some(AgentRole::Backend),
        )];

        let gaps = find_gaps(temp.path(), &areas).unwrap();
        let missing: Vec<String> = gaps
            .iter()
            .map(|gap| match &gap.kind {
                GapKind::MissingCapability { capability } => capability.clone(),
                other => panic!("unexpected gap {other:?}"),
            })
            .collect();
        assert_eq!(missing, vec!["calculateEstimate", "validateQuote"]);
    }

    #[test]
    fn repeated_analysis_synthesizes_identical_tasks() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("quote.js"),
            "function createQuote(x) {\n    // TODO: validate\n    return x;\n}\n",
        )
        .unwrap();
        let areas = [
            area(
                "backend",
                "quote.js",
                &["listQuotes", "createQuote", "deleteQuote"],
                Some(AgentRole::Backend),
            ),
            area("database", "db/schema.sql", &["quotes"], Some(AgentRole::Database)),
        ];
        let active = TaskGraph::new();
        let options = SynthesisOptions::default();

        let first_gaps = find_gaps(temp.path(), &areas).unwrap();
        let first = synthesize_tasks(&first_gaps, &areas, &active, &options);
        let second_gaps = find_gaps(temp.path(), &areas).unwrap();
        let second = synthesize_tasks(&second_gaps, &areas, &active, &options);

        assert_eq!(first_gaps, second_gaps);
        assert_eq!(first.tasks, second.tasks);
        let titles: Vec<&str> = first.tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Implement deleteQuote in quote.js",
                "Implement listQuotes in quote.js",
                "Create db/schema.sql for database",
            ]
        );
    }

    #[test]
    fn guard_directory_skips_area() {
        let temp = TempDir::new().unwrap();
        let mut guarded = area("mobile", "ios/App.swift", &["AppView"], Some(AgentRole::Mobile));
        guarded.root = Some("ios".to_string());

        assert!(find_gaps(temp.path(), &[guarded.clone()]).unwrap().is_empty());

        std::fs::create_dir(temp.path().join("ios")).unwrap();
        let gaps = find_gaps(temp.path(), &[guarded]).unwrap();
        assert_eq!(gaps[0].kind, GapKind::MissingArtifact);
    }

    #[test]
    fn unknown_kind_is_config_error() {
        let temp = TempDir::new().unwrap();
        let areas = [area("docs", "README.md", &[], Some(AgentRole::General))];
        assert!(find_gaps(temp.path(), &areas).is_err());

        let mut explicit = areas[0].clone();
        explicit.kind = Some(ArtifactKind::Script);
        assert_eq!(find_gaps(temp.path(), &[explicit]).unwrap().len(), 1);
    }

    #[test]
    fn synthesis_numbers_ids_and_sets_metadata() {
        let gaps = vec![
            Gap {
                area: "backend".to_string(),
                artifact: "quote.js".to_string(),
                kind: GapKind::MissingCapability {
                    capability: "calculateEstimate".to_string(),
                },
            },
            Gap {
                area: "database".to_string(),
                artifact: "schema.sql".to_string(),
                kind: GapKind::MissingArtifact,
            },
        ];
        let areas = [
            area("backend", "quote.js", &[], Some(AgentRole::Backend)),
            area("database", "schema.sql", &[], Some(AgentRole::Database)),
        ];

        let discovery =
            synthesize_tasks(&gaps, &areas, &TaskGraph::new(), &SynthesisOptions::default());
        let ids: Vec<&str> = discovery.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["DETECTED_001", "DETECTED_002"]);

        let first = &discovery.tasks[0];
        assert_eq!(first.status(), TaskStatus::Detected);
        assert_eq!(first.source, TaskSource::Detected);
        assert_eq!(first.priority, Priority::High);
        assert_eq!(first.role, AgentRole::Backend);
        assert_eq!(first.origin_artifact.as_deref(), Some("quote.js"));
        assert_eq!(first.title, "Implement calculateEstimate in quote.js");
        assert_eq!(discovery.tasks[1].role, AgentRole::Database);
    }

    #[test]
    fn synthesis_skips_unmapped_areas_and_reserved_ids() {
        let gaps = vec![
            Gap {
                area: "misc".to_string(),
                artifact: "misc.js".to_string(),
                kind: GapKind::MissingArtifact,
            },
            Gap {
                area: "backend".to_string(),
                artifact: "api.js".to_string(),
                kind: GapKind::MissingArtifact,
            },
            Gap {
                area: "backend".to_string(),
                artifact: "quote.js".to_string(),
                kind: GapKind::MissingArtifact,
            },
        ];
        let areas = [
            area("misc", "misc.js", &[], None),
            area("backend", "api.js", &[], Some(AgentRole::Backend)),
        ];
        let active = TaskGraph::from_tasks([
            Task::new("DETECTED_001", "Create api.js for backend", AgentRole::Backend),
        ])
        .unwrap();

        let discovery = synthesize_tasks(&gaps, &areas, &active, &SynthesisOptions::default());
        assert_eq!(discovery.skipped_areas, vec!["misc"]);
        assert_eq!(discovery.already_tracked, 1);
        assert_eq!(discovery.tasks.len(), 1);
        assert_eq!(discovery.tasks[0].id, "DETECTED_002");
        assert_eq!(discovery.tasks[0].title, "Create quote.js for backend");
    }
}
