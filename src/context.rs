//! Persistent context store.
//!
//! The whole [`ContextSnapshot`] is one JSON document at
//! `.tasksmith/context.json`. Every save replaces it atomically, so a reader
//! sees either the previous snapshot or the new one.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analyzer::{CodeIntelligence, Discovery};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::scheduler;
use crate::storage::Storage;
use crate::task::{Task, TaskGraph, TaskStatus};

/// Current on-disk layout version
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_code_analysis: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_doc_analysis: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprint_name: Option<String>,
    /// Analyzer output awaiting triage
    #[serde(default)]
    pub discovered_tasks: Vec<Task>,
    #[serde(default)]
    pub active_tasks: TaskGraph,
}

impl Default for ContextSnapshot {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            last_code_analysis: None,
            last_doc_analysis: None,
            project_direction: None,
            sprint_name: None,
            discovered_tasks: Vec::new(),
            active_tasks: TaskGraph::new(),
        }
    }
}

impl ContextSnapshot {
    /// True when the last code analysis is younger than `window`
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.last_code_analysis
            .is_some_and(|analyzed| now - analyzed < window)
    }

    pub fn discovered(&self, id: &str) -> Option<&Task> {
        self.discovered_tasks.iter().find(|task| task.id == id)
    }

    /// Replace the discovered pool. Active tasks are never touched; a
    /// discovered task whose id is already active is dropped.
    pub fn replace_discovered(&mut self, tasks: Vec<Task>) {
        let active = &self.active_tasks;
        self.discovered_tasks = tasks
            .into_iter()
            .filter(|task| !active.contains(&task.id))
            .collect();
    }

    /// Move a discovered task into the active graph as `pending`
    pub fn promote(&mut self, id: &str) -> Result<&Task> {
        let index = self
            .discovered_tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        if self.discovered_tasks[index].status() != TaskStatus::Detected {
            return Err(Error::IllegalTransition {
                task: id.to_string(),
                from: self.discovered_tasks[index].status(),
                to: TaskStatus::Pending,
            });
        }

        let task = self.discovered_tasks.remove(index);
        if let Err(err) = self.active_tasks.insert(task.clone()) {
            self.discovered_tasks.insert(index, task);
            return Err(err);
        }
        self.active_tasks
            .transition(id, TaskStatus::Pending, "triaged")
    }
}

/// Result of [`ContextStore::load`]
#[derive(Debug, Clone)]
pub struct Loaded {
    pub snapshot: ContextSnapshot,
    /// Whether the stored code analysis is within the freshness window
    pub fresh: bool,
}

#[derive(Debug, Clone)]
pub struct ContextStore {
    storage: Storage,
    freshness: Duration,
}

impl ContextStore {
    pub fn new(storage: Storage, freshness: Duration) -> Self {
        Self { storage, freshness }
    }

    pub fn from_config(storage: Storage, config: &Config) -> Result<Self> {
        Ok(Self::new(storage, config.freshness_window()?))
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Load the snapshot, or a default one when nothing is stored yet
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load(&self) -> Result<Loaded> {
        let path = self.storage.context_file();
        if !path.exists() {
            debug!(path = %path.display(), "no stored context");
            return Ok(Loaded {
                snapshot: ContextSnapshot::default(),
                fresh: false,
            });
        }

        let mut snapshot: ContextSnapshot = self
            .storage
            .read_json(&path)
            .map_err(|err| Error::persistence(&path, err))?;
        if snapshot.schema_version > SCHEMA_VERSION {
            return Err(Error::persistence(
                &path,
                format!(
                    "schema version {} is newer than supported version {}",
                    snapshot.schema_version, SCHEMA_VERSION
                ),
            ));
        }
        snapshot.active_tasks.sync_completed();
        scheduler::validate(&snapshot.active_tasks)?;

        let fresh = snapshot.is_fresh(Utc::now(), self.freshness);
        debug!(
            active = snapshot.active_tasks.len(),
            discovered = snapshot.discovered_tasks.len(),
            fresh,
            "context loaded"
        );
        Ok(Loaded { snapshot, fresh })
    }

    pub fn save(&self, snapshot: &ContextSnapshot) -> Result<()> {
        let path = self.storage.context_file();
        self.storage
            .init()
            .and_then(|_| self.storage.write_json(&path, snapshot))
            .map_err(|err| Error::persistence(&path, err))
    }

    /// Load, re-running discovery when the stored analysis is stale or `force` is set
    ///
    /// Returns the discovery when one ran.
    pub fn load_or_analyze(
        &self,
        intelligence: &CodeIntelligence,
        force: bool,
    ) -> Result<(ContextSnapshot, Option<Discovery>)> {
        let Loaded { mut snapshot, fresh } = self.load()?;
        if fresh && !force {
            debug!("code analysis is fresh, reusing discovered tasks");
            return Ok((snapshot, None));
        }

        let discovery = intelligence.discover(&snapshot.active_tasks)?;
        snapshot.replace_discovered(discovery.tasks.clone());
        snapshot.last_code_analysis = Some(Utc::now());
        self.save(&snapshot)?;
        info!(
            gaps = discovery.gaps.len(),
            discovered = snapshot.discovered_tasks.len(),
            "code analysis complete"
        );
        Ok((snapshot, Some(discovery)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AreaConfig;
    use crate::task::{AgentRole, Priority};
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> ContextStore {
        ContextStore::new(Storage::new(temp.path()), Duration::hours(1))
    }

    fn intelligence(temp: &TempDir) -> CodeIntelligence {
        let mut config = Config::default();
        config.areas.push(AreaConfig {
            name: "database".to_string(),
            artifact: "db/schema.sql".to_string(),
            kind: None,
            root: None,
            required: vec!["customers".to_string()],
            role: Some(AgentRole::Database),
        });
        CodeIntelligence::new(temp.path(), &config)
    }

    #[test]
    fn missing_file_loads_default_stale() {
        let temp = TempDir::new().unwrap();
        let loaded = store(&temp).load().unwrap();
        assert!(!loaded.fresh);
        assert_eq!(loaded.snapshot, ContextSnapshot::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let mut snapshot = ContextSnapshot::default();
        snapshot.project_direction = Some("Ship quoting".to_string());
        snapshot.last_code_analysis = Some(Utc::now());
        snapshot
            .active_tasks
            .insert(Task::new("A", "Build A", AgentRole::Backend))
            .unwrap();
        snapshot
            .active_tasks
            .transition("A", TaskStatus::InProgress, "dispatched")
            .unwrap();
        snapshot
            .active_tasks
            .transition("A", TaskStatus::Complete, "")
            .unwrap();
        snapshot.discovered_tasks.push(
            Task::detected(
                "DETECTED_001",
                "Create db/schema.sql for database",
                AgentRole::Database,
                "db/schema.sql",
            )
            .with_priority(Priority::High)
            .with_deliverables(["db/schema.sql"]),
        );
        store.save(&snapshot).unwrap();

        let loaded = store.load().unwrap();
        assert!(loaded.fresh);
        assert_eq!(loaded.snapshot, snapshot);
        assert!(loaded.snapshot.active_tasks.is_completed("A"));
        let detected = loaded.snapshot.discovered("DETECTED_001").unwrap();
        assert_eq!(detected.status(), TaskStatus::Detected);
        assert_eq!(detected.origin_artifact.as_deref(), Some("db/schema.sql"));
    }

    #[test]
    fn stale_analysis_is_not_fresh() {
        let mut snapshot = ContextSnapshot::default();
        let now = Utc::now();
        snapshot.last_code_analysis = Some(now - Duration::minutes(61));
        assert!(!snapshot.is_fresh(now, Duration::hours(1)));
        snapshot.last_code_analysis = Some(now - Duration::minutes(59));
        assert!(snapshot.is_fresh(now, Duration::hours(1)));
    }

    #[test]
    fn corrupt_file_is_persistence_error() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.storage().init().unwrap();
        std::fs::write(store.storage().context_file(), "{ not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
    }

    #[test]
    fn newer_schema_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.storage().init().unwrap();
        std::fs::write(
            store.storage().context_file(),
            r#"{ "schema_version": 99 }"#,
        )
        .unwrap();
        assert!(matches!(store.load(), Err(Error::Persistence { .. })));
    }

    #[test]
    fn stored_cycle_is_rejected_on_load() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let mut snapshot = ContextSnapshot::default();
        snapshot
            .active_tasks
            .insert(Task::new("A", "A", AgentRole::General).with_dependencies(["B"]))
            .unwrap();
        snapshot
            .active_tasks
            .insert(Task::new("B", "B", AgentRole::General).with_dependencies(["A"]))
            .unwrap();
        store.save(&snapshot).unwrap();

        assert!(matches!(store.load(), Err(Error::CycleDetected { .. })));
    }

    #[test]
    fn promote_moves_task_and_keeps_active() {
        let mut snapshot = ContextSnapshot::default();
        snapshot
            .active_tasks
            .insert(Task::new("A", "Manual", AgentRole::Backend))
            .unwrap();
        snapshot.replace_discovered(vec![
            Task::detected("A", "Shadowed", AgentRole::Backend, "a.js"),
            Task::detected("DETECTED_001", "Create b.js", AgentRole::Backend, "b.js"),
        ]);
        assert_eq!(snapshot.discovered_tasks.len(), 1);

        let promoted = snapshot.promote("DETECTED_001").unwrap();
        assert_eq!(promoted.status(), TaskStatus::Pending);
        assert!(snapshot.discovered_tasks.is_empty());
        assert_eq!(snapshot.active_tasks.len(), 2);
        assert!(matches!(
            snapshot.promote("DETECTED_001"),
            Err(Error::TaskNotFound(_))
        ));

        snapshot.replace_discovered(Vec::new());
        assert_eq!(snapshot.active_tasks.len(), 2);
    }

    #[test]
    fn load_or_analyze_reuses_fresh_analysis() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let intel = intelligence(&temp);

        let (snapshot, discovery) = store.load_or_analyze(&intel, false).unwrap();
        let discovery = discovery.expect("first run analyzes");
        assert_eq!(discovery.tasks.len(), 1);
        assert_eq!(snapshot.discovered_tasks[0].id, "DETECTED_001");
        assert!(snapshot.last_code_analysis.is_some());

        let (again, discovery) = store.load_or_analyze(&intel, false).unwrap();
        assert!(discovery.is_none());
        assert_eq!(again.discovered_tasks, snapshot.discovered_tasks);

        let (_, forced) = store.load_or_analyze(&intel, true).unwrap();
        assert!(forced.is_some());
    }
}
