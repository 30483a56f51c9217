//! Static sprint definitions.
//!
//! A sprint file declares tasks up front, plus ids already finished
//! elsewhere that later tasks may depend on:
//!
//! ```toml
//! [sprint]
//! name = "Quoting MVP"
//! completed = ["DB001"]
//!
//! [[tasks]]
//! id = "BE001"
//! title = "Quote API"
//! role = "backend"
//! dependencies = ["DB001"]
//! deliverables = ["backend/src/routes/quotes.js"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::context::ContextSnapshot;
use crate::error::Result;
use crate::scheduler;
use crate::task::{AgentRole, Priority, Task};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SprintFile {
    #[serde(default)]
    pub sprint: SprintHeader,
    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SprintHeader {
    #[serde(default)]
    pub name: Option<String>,
    /// Ids finished before this sprint
    #[serde(default)]
    pub completed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Inferred from title and description when omitted
    #[serde(default)]
    pub role: Option<AgentRole>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub deliverables: Vec<String>,
    #[serde(default)]
    pub context_artifacts: Vec<String>,
}

impl TaskDefinition {
    pub fn into_task(self) -> Task {
        let role = self
            .role
            .unwrap_or_else(|| AgentRole::infer(&format!("{} {}", self.title, self.description)));
        Task::new(self.id, self.title, role)
            .with_description(self.description)
            .with_priority(self.priority)
            .with_dependencies(self.dependencies)
            .with_deliverables(self.deliverables)
            .with_context_artifacts(self.context_artifacts)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub added: Vec<String>,
    /// Ids already present in the active graph
    pub skipped: Vec<String>,
    pub seeded: Vec<String>,
}

pub fn load(path: &Path) -> Result<SprintFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge a sprint into the active graph
///
/// Existing ids are left untouched. The snapshot is unchanged if the merged
/// graph would be invalid.
pub fn import(snapshot: &mut ContextSnapshot, sprint: SprintFile) -> Result<ImportReport> {
    let mut graph = snapshot.active_tasks.clone();
    let mut report = ImportReport::default();

    for id in sprint.sprint.completed {
        graph.seed_completed(id.clone())?;
        report.seeded.push(id);
    }
    for definition in sprint.tasks {
        if graph.contains(&definition.id) {
            warn!(task = %definition.id, "task already active, skipping");
            report.skipped.push(definition.id);
            continue;
        }
        let task = definition.into_task();
        report.added.push(task.id.clone());
        graph.insert(task)?;
    }
    scheduler::validate(&graph)?;

    snapshot.active_tasks = graph;
    if sprint.sprint.name.is_some() {
        snapshot.sprint_name = sprint.sprint.name;
    }
    info!(added = report.added.len(), skipped = report.skipped.len(), "sprint imported");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::task::TaskStatus;

    const SPRINT: &str = r#"
[sprint]
name = "Quoting MVP"
completed = ["DB001"]

[[tasks]]
id = "BE001"
title = "Quote API endpoint"
dependencies = ["DB001"]
deliverables = ["backend/routes/quotes.js"]

[[tasks]]
id = "IOS001"
title = "Quote screen"
role = "ios"
priority = "high"
dependencies = ["BE001"]
"#;

    #[test]
    fn import_adds_tasks_and_seeds_completed() {
        let mut snapshot = ContextSnapshot::default();
        let sprint: SprintFile = toml::from_str(SPRINT).unwrap();

        let report = import(&mut snapshot, sprint).unwrap();
        assert_eq!(report.added, vec!["BE001", "IOS001"]);
        assert_eq!(report.seeded, vec!["DB001"]);
        assert_eq!(snapshot.sprint_name.as_deref(), Some("Quoting MVP"));

        let api = snapshot.active_tasks.get("BE001").unwrap();
        assert_eq!(api.role, AgentRole::Backend);
        assert_eq!(api.status(), TaskStatus::Pending);
        let screen = snapshot.active_tasks.get("IOS001").unwrap();
        assert_eq!(screen.role, AgentRole::Mobile);
        assert_eq!(screen.priority, Priority::High);

        let ready: Vec<&str> = scheduler::ready_set(&snapshot.active_tasks)
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ready, vec!["BE001"]);
    }

    #[test]
    fn reimport_skips_existing() {
        let mut snapshot = ContextSnapshot::default();
        import(&mut snapshot, toml::from_str(SPRINT).unwrap()).unwrap();
        let report = import(&mut snapshot, toml::from_str(SPRINT).unwrap()).unwrap();
        assert!(report.added.is_empty());
        assert_eq!(report.skipped, vec!["BE001", "IOS001"]);
        assert_eq!(snapshot.active_tasks.len(), 2);
    }

    #[test]
    fn completed_id_cannot_also_be_a_pending_task() {
        let mut snapshot = ContextSnapshot::default();
        let sprint: SprintFile = toml::from_str(
            r#"
[sprint]
completed = ["X"]

[[tasks]]
id = "X"
title = "X"

[[tasks]]
id = "Y"
title = "Y"
dependencies = ["X"]
"#,
        )
        .unwrap();

        let err = import(&mut snapshot, sprint).unwrap_err();
        assert!(matches!(err, Error::IllegalTransition { ref task, .. } if task == "X"));
        assert!(snapshot.active_tasks.is_empty());
        assert!(scheduler::ready_set(&snapshot.active_tasks).is_empty());
    }

    #[test]
    fn cyclic_sprint_leaves_snapshot_unchanged() {
        let mut snapshot = ContextSnapshot::default();
        let sprint: SprintFile = toml::from_str(
            r#"
[[tasks]]
id = "A"
title = "A"
dependencies = ["B"]

[[tasks]]
id = "B"
title = "B"
dependencies = ["A"]
"#,
        )
        .unwrap();

        let err = import(&mut snapshot, sprint).unwrap_err();
        assert!(matches!(err, Error::CycleDetected { .. }));
        assert!(snapshot.active_tasks.is_empty());
    }
}
