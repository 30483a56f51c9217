//! External code-generation tool.
//!
//! The orchestrator only sees the [`Executor`] trait. [`CommandExecutor`]
//! runs a configured program with the instruction in a temporary file.

use std::io::Write as _;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::{ExecutorConfig, RoleProfile};
use crate::error::{Error, Result};
use crate::task::Task;

/// What the tool reported for one instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub output: String,
}

impl ExecutionOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

#[async_trait]
pub trait Executor: Send + Sync {
    /// Run one instruction. An `Err` means the tool could not be run at all.
    async fn execute(&self, instruction: &str, output_dir: &Path) -> Result<ExecutionOutcome>;
}

/// Runs an external program, passing the instruction through a prompt file
///
/// `{prompt_file}` and `{output_dir}` are substituted in each argument.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    program: String,
    args: Vec<String>,
}

impl CommandExecutor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    fn render_args(&self, prompt_file: &Path, output_dir: &Path) -> Vec<String> {
        let prompt_file = prompt_file.display().to_string();
        let output_dir = output_dir.display().to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{prompt_file}", &prompt_file)
                    .replace("{output_dir}", &output_dir)
            })
            .collect()
    }
}

#[async_trait]
impl Executor for CommandExecutor {
    async fn execute(&self, instruction: &str, output_dir: &Path) -> Result<ExecutionOutcome> {
        let mut prompt = tempfile::Builder::new()
            .prefix("tasksmith-prompt-")
            .suffix(".md")
            .tempfile()
            .map_err(|err| Error::Execution(format!("failed to create prompt file: {err}")))?;
        write_prompt(&mut prompt, instruction)?;

        let args = self.render_args(prompt.path(), output_dir);
        debug!(program = %self.program, args = ?args, dir = %output_dir.display(), "running executor");

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(output_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| Error::Execution(format!("failed to start {}: {err}", self.program)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(ExecutionOutcome::success(stdout));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(program = %self.program, status = %output.status, "executor reported failure");
        Ok(ExecutionOutcome::failure(format!("{stderr}{stdout}")))
    }
}

fn write_prompt(file: &mut NamedTempFile, instruction: &str) -> Result<()> {
    file.write_all(instruction.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|err| Error::Execution(format!("failed to write prompt file: {err}")))
}

/// Render the instruction handed to the executor for `task`
///
/// Context artifacts that exist under `root` are inlined; missing ones are
/// listed as absent.
pub fn build_instruction(
    task: &Task,
    direction: Option<&str>,
    profile: Option<&RoleProfile>,
    root: &Path,
) -> String {
    let mut lines = vec![
        format!("# Task {}: {}", task.id, task.title),
        String::new(),
        format!("Role: {}", task.role),
        format!("Priority: {}", task.priority),
    ];

    if let Some(profile) = profile {
        if !profile.context.trim().is_empty() {
            push_section(&mut lines, "## Role context", profile.context.trim());
        }
        if !profile.expertise.is_empty() {
            lines.push(format!("Expertise: {}", profile.expertise.join(", ")));
        }
    }

    if let Some(direction) = direction.filter(|d| !d.trim().is_empty()) {
        push_section(&mut lines, "## Project direction", direction.trim());
    }

    if !task.description.trim().is_empty() {
        push_section(&mut lines, "## Description", task.description.trim());
    }

    if !task.deliverables.is_empty() {
        lines.push(String::new());
        lines.push("## Deliverables".to_string());
        lines.extend(task.deliverables.iter().map(|d| format!("- {d}")));
    }

    for artifact in &task.context_artifacts {
        lines.push(String::new());
        match std::fs::read_to_string(root.join(artifact)) {
            Ok(content) => {
                lines.push(format!("## Context: {artifact}"));
                lines.push("```".to_string());
                lines.push(content.trim_end().to_string());
                lines.push("```".to_string());
            }
            Err(_) => lines.push(format!("## Context: {artifact} (not present yet)")),
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn push_section(lines: &mut Vec<String>, heading: &str, body: &str) {
    lines.push(String::new());
    lines.push(heading.to_string());
    lines.push(body.to_string());
}
