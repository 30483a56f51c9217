//! Orchestration control loop.
//!
//! Each cycle validates the graph, picks at most one ready task per idle
//! role, persists the `in_progress` marks, dispatches the batch concurrently
//! and applies each result. Every status change is persisted before the next
//! ready set is computed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::context::{ContextSnapshot, ContextStore};
use crate::error::{Error, Result};
use crate::executor::{build_instruction, ExecutionOutcome, Executor};
use crate::scheduler::{self, Progress, SprintState};
use crate::task::{AgentRole, AttemptRecord, TaskStatus};

const REQUEUE_REASON: &str = "requeued after interrupted dispatch";

/// What happened to one dispatched task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    pub task: String,
    pub role: AgentRole,
    pub status: TaskStatus,
    pub executor_success: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_deliverables: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub dispatched: Vec<DispatchResult>,
    pub progress: Progress,
    pub state: SprintState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every task is complete
    Complete,
    /// Nothing became ready within the allowed stalled checks
    Stalled,
    /// A shutdown was requested
    Cancelled,
    /// Single-cycle mode ended with work remaining
    Paused,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub cycles: usize,
    pub dispatched: Vec<DispatchResult>,
    pub progress: Progress,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub once: bool,
    pub max_stalled_checks: u32,
    pub stall_interval: Duration,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            once: false,
            max_stalled_checks: config.scheduler.max_stalled_checks,
            stall_interval: config.stall_interval()?,
        })
    }
}

pub struct Orchestrator {
    root: PathBuf,
    config: Config,
    store: ContextStore,
    snapshot: ContextSnapshot,
    executor: Arc<dyn Executor>,
    /// Role to the task it is working on
    busy: BTreeMap<AgentRole, String>,
}

impl Orchestrator {
    /// Load the stored context and requeue any interrupted dispatches
    pub fn new(
        root: impl Into<PathBuf>,
        config: Config,
        store: ContextStore,
        executor: Arc<dyn Executor>,
    ) -> Result<Self> {
        let snapshot = store.load()?.snapshot;
        let mut orchestrator = Self::with_snapshot(root, config, store, executor, snapshot);
        orchestrator.recover_interrupted()?;
        Ok(orchestrator)
    }

    /// Build around an already-loaded snapshot without touching disk
    pub fn with_snapshot(
        root: impl Into<PathBuf>,
        config: Config,
        store: ContextStore,
        executor: Arc<dyn Executor>,
        snapshot: ContextSnapshot,
    ) -> Self {
        Self {
            root: root.into(),
            config,
            store,
            snapshot,
            executor,
            busy: BTreeMap::new(),
        }
    }

    pub fn snapshot(&self) -> &ContextSnapshot {
        &self.snapshot
    }

    pub fn into_snapshot(self) -> ContextSnapshot {
        self.snapshot
    }

    pub fn progress(&self) -> Progress {
        Progress::compute(self.snapshot.active_tasks.iter())
    }

    fn output_dir(&self) -> PathBuf {
        self.root.join(&self.config.executor.output_dir)
    }

    fn persist(&self) -> Result<()> {
        self.store.save(&self.snapshot)
    }

    /// Requeue tasks left `in_progress` by an interrupted run. Returns their ids.
    pub fn recover_interrupted(&mut self) -> Result<Vec<String>> {
        let interrupted: Vec<String> = self
            .snapshot
            .active_tasks
            .iter()
            .filter(|task| task.status() == TaskStatus::InProgress)
            .map(|task| task.id.clone())
            .collect();
        if interrupted.is_empty() {
            return Ok(interrupted);
        }

        for id in &interrupted {
            self.snapshot
                .active_tasks
                .transition(id, TaskStatus::Pending, REQUEUE_REASON)?;
            warn!(task = %id, "requeued interrupted task");
        }
        self.busy.clear();
        self.persist()?;
        Ok(interrupted)
    }

    /// Pick at most one ready task per idle role, in graph order
    fn select_batch(&self) -> Vec<(String, AgentRole)> {
        let mut batch: Vec<(String, AgentRole)> = Vec::new();
        for task in scheduler::ready_set(&self.snapshot.active_tasks) {
            let role_taken = self.busy.contains_key(&task.role)
                || batch.iter().any(|(_, role)| *role == task.role);
            if !role_taken {
                batch.push((task.id.clone(), task.role));
            }
        }
        batch
    }

    fn mark_dispatched(&mut self, id: &str, role: AgentRole, reason: &str) -> Result<String> {
        self.snapshot
            .active_tasks
            .transition(id, TaskStatus::InProgress, reason)?;
        let task = self
            .snapshot
            .active_tasks
            .get(id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        let instruction = build_instruction(
            task,
            self.snapshot.project_direction.as_deref(),
            self.config.role_profile(role),
            &self.root,
        );
        self.busy.insert(role, id.to_string());
        self.persist()?;
        debug!(task = %id, role = %role, "dispatched");
        Ok(instruction)
    }

    async fn dispatch(&self, batch: &[(String, String)]) -> Vec<Result<ExecutionOutcome>> {
        let output_dir = self.output_dir();
        if batch.is_empty() {
            return Vec::new();
        }
        if let Err(err) = tokio::fs::create_dir_all(&output_dir).await {
            let message = format!(
                "cannot create output directory {}: {err}",
                output_dir.display()
            );
            warn!(error = %message, "dispatch skipped");
            return batch
                .iter()
                .map(|_| Err(Error::OperationFailed(message.clone())))
                .collect();
        }
        let calls = batch.iter().map(|(_, instruction)| {
            let executor = Arc::clone(&self.executor);
            let output_dir = output_dir.clone();
            async move { executor.execute(instruction, &output_dir).await }
        });
        join_all(calls).await
    }

    /// Run one scheduling cycle
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        scheduler::validate(&self.snapshot.active_tasks)?;

        let mut instructions: Vec<(String, String)> = Vec::new();
        for (id, role) in self.select_batch() {
            let instruction = self.mark_dispatched(&id, role, "dispatched")?;
            instructions.push((id, instruction));
        }

        let results = self.dispatch(&instructions).await;

        let mut dispatched = Vec::with_capacity(results.len());
        for ((id, _), result) in instructions.iter().zip(results) {
            dispatched.push(self.apply_result(id, result)?);
        }

        let progress = self.progress();
        let state = scheduler::sprint_state(&self.snapshot.active_tasks);
        info!(
            dispatched = dispatched.len(),
            complete = progress.count(TaskStatus::Complete),
            total = progress.total,
            "cycle finished"
        );
        Ok(CycleReport {
            dispatched,
            progress,
            state,
        })
    }

    /// Apply an executor result to an `in_progress` task and persist
    ///
    /// The task completes only when the executor reported success and every
    /// deliverable exists under the project root. Anything else blocks it.
    pub fn apply_result(
        &mut self,
        id: &str,
        result: Result<ExecutionOutcome>,
    ) -> Result<DispatchResult> {
        let task = self
            .snapshot
            .active_tasks
            .get(id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        if task.status() != TaskStatus::InProgress {
            return Err(Error::IllegalTransition {
                task: id.to_string(),
                from: task.status(),
                to: TaskStatus::Complete,
            });
        }
        let role = task.role;
        let missing: Vec<String> = task
            .deliverables
            .iter()
            .filter(|deliverable| !self.store.storage().resolve(deliverable).exists())
            .cloned()
            .collect();

        let (success, output, error) = match result {
            Ok(outcome) => (outcome.success, outcome.output, None),
            Err(err) => (false, String::new(), Some(err.to_string())),
        };

        let (status, reason) = if let Some(error) = &error {
            (TaskStatus::Blocked, format!("executor error: {error}"))
        } else if !success {
            (TaskStatus::Blocked, "executor reported failure".to_string())
        } else if !missing.is_empty() {
            (
                TaskStatus::Blocked,
                format!("missing deliverables: {}", missing.join(", ")),
            )
        } else {
            (TaskStatus::Complete, String::new())
        };

        self.snapshot.active_tasks.transition(id, status, reason.as_str())?;
        self.snapshot.active_tasks.record_attempt(
            id,
            AttemptRecord {
                success,
                missing_deliverables: missing.clone(),
                output,
                finished_at: Utc::now(),
            },
        )?;
        if status == TaskStatus::Complete {
            self.snapshot.discovered_tasks.retain(|task| task.id != id);
            info!(task = %id, "task complete");
        } else {
            warn!(task = %id, reason = %reason, "task blocked");
        }
        self.busy.remove(&role);
        self.persist()?;

        Ok(DispatchResult {
            task: id.to_string(),
            role,
            status,
            executor_success: success,
            missing_deliverables: missing,
            error,
        })
    }

    /// Explicitly retry a blocked task
    pub async fn retry(&mut self, id: &str) -> Result<DispatchResult> {
        let task = self
            .snapshot
            .active_tasks
            .get(id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        if task.status() != TaskStatus::Blocked {
            return Err(Error::IllegalTransition {
                task: id.to_string(),
                from: task.status(),
                to: TaskStatus::InProgress,
            });
        }
        let role = task.role;
        if let Some(holder) = self.busy.get(&role) {
            return Err(Error::InvalidArgument(format!(
                "role {role} is busy with {holder}"
            )));
        }

        let instruction = self.mark_dispatched(id, role, "retry requested")?;
        let batch = [(id.to_string(), instruction)];
        let result = self
            .dispatch(&batch)
            .await
            .pop()
            .unwrap_or_else(|| Err(Error::Execution("no result from executor".to_string())));
        self.apply_result(id, result)
    }

    /// Run cycles until the sprint completes, stalls, or `cancel` fires
    pub async fn run(
        &mut self,
        mut cancel: watch::Receiver<bool>,
        options: &RunOptions,
    ) -> Result<RunReport> {
        let max_stalled = options.max_stalled_checks.max(1);
        let mut stalled_checks = 0u32;
        let mut cycles = 0usize;
        let mut dispatched = Vec::new();

        let outcome = loop {
            if *cancel.borrow() {
                break RunOutcome::Cancelled;
            }

            let report = self.run_cycle().await?;
            cycles += 1;
            let idle = report.dispatched.is_empty();
            dispatched.extend(report.dispatched);

            match report.state {
                SprintState::Complete => break RunOutcome::Complete,
                _ if options.once => break RunOutcome::Paused,
                SprintState::Stalled if idle => {
                    stalled_checks += 1;
                    let remaining = self.snapshot.active_tasks.len()
                        - report.progress.count(TaskStatus::Complete);
                    warn!(
                        check = stalled_checks,
                        max = max_stalled,
                        remaining,
                        "no task is ready"
                    );
                    if stalled_checks >= max_stalled {
                        break RunOutcome::Stalled;
                    }
                    if wait_or_cancel(&mut cancel, options.stall_interval).await {
                        break RunOutcome::Cancelled;
                    }
                }
                _ => stalled_checks = 0,
            }
        };

        info!(outcome = ?outcome, cycles, "run finished");
        Ok(RunReport {
            outcome,
            cycles,
            dispatched,
            progress: self.progress(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Sleep for `interval`; returns true if cancellation arrived first
async fn wait_or_cancel(cancel: &mut watch::Receiver<bool>, interval: Duration) -> bool {
    if *cancel.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(interval) => false,
        changed = cancel.changed() => match changed {
            Ok(()) => *cancel.borrow(),
            Err(_) => {
                tokio::time::sleep(interval).await;
                false
            }
        },
    }
}
