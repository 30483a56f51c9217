//! Task model for tasksmith.
//!
//! A [`Task`] is a unit of work assigned to an [`AgentRole`]. Its status only
//! changes through [`TaskGraph::transition`], which checks the transition
//! table and records every change in the task history.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Capability class required to perform a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    #[serde(alias = "database-engineer")]
    Database,
    #[serde(alias = "backend-engineer")]
    Backend,
    #[serde(alias = "ios", alias = "ios-developer")]
    Mobile,
    #[serde(alias = "ml-engineer")]
    Ml,
    #[serde(alias = "integration-engineer")]
    Integration,
    Devops,
    General,
}

/// Keywords that route free-text task descriptions to a role.
/// Earlier rows win when several match.
const ROLE_KEYWORDS: &[(AgentRole, &[&str])] = &[
    (AgentRole::Backend, &["api", "server", "backend", "node", "endpoint"]),
    (AgentRole::Mobile, &["ios", "swift", "swiftui", "ar", "android", "mobile"]),
    (AgentRole::Database, &["sql", "database", "schema", "postgres", "migration"]),
    (AgentRole::Ml, &["ml", "gemini", "ai", "vision", "model"]),
    (AgentRole::Devops, &["deploy", "docker", "ci", "pipeline", "kubernetes"]),
    (AgentRole::Integration, &["integration", "webhook", "sync"]),
];

impl AgentRole {
    pub const ALL: [AgentRole; 7] = [
        AgentRole::Database,
        AgentRole::Backend,
        AgentRole::Mobile,
        AgentRole::Ml,
        AgentRole::Integration,
        AgentRole::Devops,
        AgentRole::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Database => "database",
            AgentRole::Backend => "backend",
            AgentRole::Mobile => "mobile",
            AgentRole::Ml => "ml",
            AgentRole::Integration => "integration",
            AgentRole::Devops => "devops",
            AgentRole::General => "general",
        }
    }

    /// Pick a role for a free-text description.
    ///
    /// Falls back to [`AgentRole::General`] when no keyword matches.
    pub fn infer(text: &str) -> AgentRole {
        let words: Vec<String> = text
            .split(|ch: char| !ch.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
            .map(|word| word.to_ascii_lowercase())
            .collect();
        ROLE_KEYWORDS
            .iter()
            .find(|(_, keywords)| words.iter().any(|word| keywords.contains(&word.as_str())))
            .map(|(role, _)| *role)
            .unwrap_or(AgentRole::General)
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        let role = match normalized.as_str() {
            "database" | "database-engineer" | "db" => AgentRole::Database,
            "backend" | "backend-engineer" => AgentRole::Backend,
            "mobile" | "ios" | "ios-developer" => AgentRole::Mobile,
            "ml" | "ml-engineer" => AgentRole::Ml,
            "integration" | "integration-engineer" => AgentRole::Integration,
            "devops" => AgentRole::Devops,
            "general" => AgentRole::General,
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "unknown agent role '{}' (expected one of: {})",
                    s.trim(),
                    AgentRole::ALL.map(|role| role.as_str()).join(", ")
                )))
            }
        };
        Ok(role)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Complete,
    Blocked,
    Review,
    Detected,
}

/// Every legal status change. Anything not listed is rejected.
const TRANSITIONS: &[(TaskStatus, TaskStatus)] = &[
    (TaskStatus::Detected, TaskStatus::Pending),
    (TaskStatus::Pending, TaskStatus::InProgress),
    (TaskStatus::InProgress, TaskStatus::Complete),
    (TaskStatus::InProgress, TaskStatus::Blocked),
    (TaskStatus::InProgress, TaskStatus::Pending),
    (TaskStatus::Blocked, TaskStatus::InProgress),
    (TaskStatus::Blocked, TaskStatus::Review),
    (TaskStatus::Review, TaskStatus::Complete),
    (TaskStatus::Review, TaskStatus::Blocked),
];

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Complete,
        TaskStatus::Blocked,
        TaskStatus::Review,
        TaskStatus::Detected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Complete => "complete",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Review => "review",
            TaskStatus::Detected => "detected",
        }
    }

    pub fn can_transition_to(self, to: TaskStatus) -> bool {
        TRANSITIONS.contains(&(self, to))
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown task status '{}'", s.trim())))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    /// Lower rank sorts first.
    pub fn rank(&self) -> usize {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(Error::InvalidArgument(format!(
                "unknown priority '{other}' (expected critical, high, medium, low)"
            ))),
        }
    }
}

/// Where a task came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    #[default]
    Manual,
    Detected,
}

/// One recorded status change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusChange {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Result of the most recent dispatch of a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptRecord {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_deliverables: Vec<String>,
    #[serde(default)]
    pub output: String,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub role: AgentRole,
    status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    #[serde(default)]
    pub deliverables: Vec<String>,
    #[serde(default)]
    pub context_artifacts: Vec<String>,
    #[serde(default)]
    pub source: TaskSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_artifact: Option<String>,
    #[serde(default)]
    attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_attempt: Option<AttemptRecord>,
    #[serde(default)]
    history: Vec<StatusChange>,
}

impl Task {
    /// Create a manually authored task in `pending` status.
    pub fn new(id: impl Into<String>, title: impl Into<String>, role: AgentRole) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            role,
            status: TaskStatus::Pending,
            priority: Priority::default(),
            dependencies: BTreeSet::new(),
            deliverables: Vec::new(),
            context_artifacts: Vec::new(),
            source: TaskSource::Manual,
            origin_artifact: None,
            attempts: 0,
            last_attempt: None,
            history: Vec::new(),
        }
    }

    /// Create an analyzer-synthesized task in `detected` status.
    pub fn detected(
        id: impl Into<String>,
        title: impl Into<String>,
        role: AgentRole,
        origin_artifact: impl Into<String>,
    ) -> Self {
        let mut task = Self::new(id, title, role);
        task.status = TaskStatus::Detected;
        task.source = TaskSource::Detected;
        task.origin_artifact = Some(origin_artifact.into());
        task
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_deliverables<I, S>(mut self, deliverables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deliverables = deliverables.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_context_artifacts<I, S>(mut self, artifacts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context_artifacts = artifacts.into_iter().map(Into::into).collect();
        self
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn history(&self) -> &[StatusChange] {
        &self.history
    }

    /// Number of times the task has been handed to an executor.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_attempt(&self) -> Option<&AttemptRecord> {
        self.last_attempt.as_ref()
    }

    fn transition(&mut self, to: TaskStatus, reason: Option<String>) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(Error::IllegalTransition {
                task: self.id.clone(),
                from: self.status,
                to,
            });
        }
        if to == TaskStatus::InProgress {
            self.attempts += 1;
        }
        self.history.push(StatusChange {
            from: self.status,
            to,
            at: Utc::now(),
            reason,
        });
        self.status = to;
        Ok(())
    }
}

/// An ordered set of tasks plus the ids that reached `complete`.
///
/// Task order is insertion order and is preserved by every query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskGraph {
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    completed: BTreeSet<String>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from tasks, rejecting duplicates and self-dependencies.
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Result<Self> {
        let mut graph = Self::new();
        for task in tasks {
            graph.insert(task)?;
        }
        Ok(graph)
    }

    pub fn insert(&mut self, task: Task) -> Result<()> {
        if self.contains(&task.id) {
            return Err(Error::DuplicateTask(task.id));
        }
        if task.dependencies.contains(&task.id) {
            return Err(Error::SelfDependency(task.id));
        }
        // a seeded id must stay complete or its dependents run too early
        if task.status != TaskStatus::Complete && self.completed.contains(&task.id) {
            return Err(Error::IllegalTransition {
                task: task.id,
                from: TaskStatus::Complete,
                to: task.status,
            });
        }
        if task.status == TaskStatus::Complete {
            self.completed.insert(task.id.clone());
        }
        self.tasks.push(task);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Mutable access to everything but status, which only moves through
    /// [`TaskGraph::transition`].
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn completed(&self) -> &BTreeSet<String> {
        &self.completed
    }

    pub fn is_completed(&self, id: &str) -> bool {
        self.completed.contains(id)
    }

    /// Move a task to a new status.
    ///
    /// Fails with [`Error::IllegalTransition`] when the transition table does
    /// not allow the change, leaving the task untouched.
    pub fn transition(
        &mut self,
        id: &str,
        to: TaskStatus,
        reason: impl Into<String>,
    ) -> Result<&Task> {
        let index = self.index_of(id)?;
        let reason = reason.into();
        let reason = if reason.trim().is_empty() {
            None
        } else {
            Some(reason)
        };
        self.tasks[index].transition(to, reason)?;
        if to == TaskStatus::Complete {
            self.completed.insert(id.to_string());
        }
        Ok(&self.tasks[index])
    }

    /// Record an id finished outside this graph, e.g. a prerequisite from an
    /// earlier sprint. Ids of tasks in the graph must complete via `transition`.
    pub fn seed_completed(&mut self, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        if let Some(task) = self.get(&id) {
            if task.status != TaskStatus::Complete {
                return Err(Error::IllegalTransition {
                    task: id,
                    from: task.status,
                    to: TaskStatus::Complete,
                });
            }
        }
        self.completed.insert(id);
        Ok(())
    }

    pub(crate) fn record_attempt(&mut self, id: &str, attempt: AttemptRecord) -> Result<()> {
        let task = self
            .get_mut(id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        task.last_attempt = Some(attempt);
        Ok(())
    }

    /// Bring the completed-id set in line with task statuses after a load.
    pub(crate) fn sync_completed(&mut self) {
        for task in &self.tasks {
            if task.status == TaskStatus::Complete {
                self.completed.insert(task.id.clone());
            }
        }
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }
}
