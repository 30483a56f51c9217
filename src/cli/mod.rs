//! Command-line interface for tasksmith
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand is implemented in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::config::Config;
use crate::context::ContextStore;
use crate::error::{Error, Result};
use crate::lock::FileLock;
use crate::output::OutputOptions;
use crate::storage::Storage;

mod analyze;
mod direction;
mod init;
mod run;
mod status;
mod task;

/// tasksmith - local developer-workflow orchestrator
///
/// Tracks a task graph with role assignments, discovers work by inspecting
/// source artifacts, and hands ready tasks to an external code generator.
#[derive(Parser, Debug)]
#[command(name = "tasksmith")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Project root (defaults to current directory)
    #[arg(long, global = true, env = "TASKSMITH_ROOT")]
    pub root: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create .tasksmith.toml and the state directory
    Init,

    /// Detect gaps in tracked areas and refresh discovered tasks
    Analyze {
        /// Re-analyze even if the last analysis is still fresh
        #[arg(long)]
        force: bool,
    },

    /// Scan every tracked artifact below the analysis root
    Survey,

    /// Show progress, ready work and blocked tasks
    Status,

    /// Dispatch ready tasks until the sprint completes or stalls
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,

        /// Stalled readiness checks before giving up
        #[arg(long)]
        max_stalled_checks: Option<u32>,
    },

    /// Re-dispatch a blocked task
    Retry {
        /// Task id
        id: String,
    },

    /// Task management
    #[command(subcommand)]
    Task(TaskCommands),

    /// Project direction summary
    #[command(subcommand)]
    Direction(DirectionCommands),
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Add a task to the active graph
    Add {
        /// Task id
        id: String,

        /// Task title
        title: String,

        /// Longer description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Role: database, backend, mobile, ml, integration, devops, general
        /// (inferred from the title when omitted)
        #[arg(short, long)]
        role: Option<String>,

        /// Priority: critical, high, medium, low
        #[arg(short, long, default_value = "medium")]
        priority: String,

        /// Task ids that must complete first
        #[arg(long = "depends", value_name = "ID")]
        depends: Vec<String>,

        /// Paths that must exist for the task to complete
        #[arg(long = "deliverable", value_name = "PATH")]
        deliverables: Vec<String>,

        /// Files whose contents are included in the instruction
        #[arg(long = "context", value_name = "PATH")]
        context: Vec<String>,
    },

    /// List active (or discovered) tasks
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,

        /// List discovered tasks awaiting triage instead
        #[arg(long)]
        discovered: bool,
    },

    /// Show one task with its history
    Show {
        /// Task id
        id: String,
    },

    /// Accept discovered tasks into the active graph
    Triage {
        /// Discovered task ids
        #[arg(required_unless_present = "all")]
        ids: Vec<String>,

        /// Accept every discovered task
        #[arg(long)]
        all: bool,
    },

    /// Import tasks from a sprint definition file
    Import {
        /// TOML sprint file
        file: PathBuf,
    },

    /// Send a blocked task to human review
    Review {
        /// Task id
        id: String,

        /// Note recorded in the task history
        #[arg(long)]
        reason: Option<String>,
    },

    /// Approve a task under review
    Approve {
        /// Task id
        id: String,

        /// Note recorded in the task history
        #[arg(long)]
        reason: Option<String>,
    },

    /// Reject a task under review back to blocked
    Reject {
        /// Task id
        id: String,

        /// Note recorded in the task history
        #[arg(long)]
        reason: Option<String>,
    },
}

/// Direction subcommands
#[derive(Subcommand, Debug)]
pub enum DirectionCommands {
    /// Store a direction summary
    Set {
        /// Summary text
        text: String,
    },

    /// Summarize the docs directory with the executor
    Analyze,

    /// Print the stored direction
    Show,
}

/// Resolved project root with its configuration and context store
pub(crate) struct Project {
    pub root: PathBuf,
    pub config: Config,
    pub store: ContextStore,
}

impl Project {
    pub(crate) fn open(root: Option<PathBuf>) -> Result<Self> {
        let root = match root {
            Some(path) => path,
            None => std::env::current_dir()?,
        };
        let config = Config::load_from_root(&root)?;
        let store = ContextStore::from_config(Storage::new(root.clone()), &config)?;
        Ok(Self {
            root,
            config,
            store,
        })
    }

    /// Exclusive hold on the project state for dispatching or editing.
    ///
    /// A running dispatcher owns the context snapshot in memory, so any
    /// other writer fails fast instead of racing its next save.
    pub(crate) fn state_lock(&self) -> Result<FileLock> {
        let path = self.store.storage().run_lock_file();
        let lock = FileLock::try_acquire(&path)?.ok_or_else(|| {
            Error::OperationFailed(format!(
                "another tasksmith process is dispatching tasks (lock held on {})",
                path.display()
            ))
        })?;
        debug!(lock = %lock.path().display(), "state lock acquired");
        Ok(lock)
    }
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let output = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };
        match self.command {
            Commands::Init => init::run(init::InitOptions {
                root: self.root,
                output,
            }),
            Commands::Analyze { force } => analyze::run_analyze(analyze::AnalyzeOptions {
                force,
                root: self.root,
                output,
            }),
            Commands::Survey => analyze::run_survey(analyze::SurveyOptions {
                root: self.root,
                output,
            }),
            Commands::Status => status::run(status::StatusOptions {
                root: self.root,
                output,
            }),
            Commands::Run {
                once,
                max_stalled_checks,
            } => run::run(run::RunCommandOptions {
                once,
                max_stalled_checks,
                root: self.root,
                output,
            }),
            Commands::Retry { id } => run::run_retry(run::RetryOptions {
                id,
                root: self.root,
                output,
            }),
            Commands::Task(cmd) => match cmd {
                TaskCommands::Add {
                    id,
                    title,
                    description,
                    role,
                    priority,
                    depends,
                    deliverables,
                    context,
                } => task::run_add(task::AddOptions {
                    id,
                    title,
                    description,
                    role,
                    priority,
                    depends,
                    deliverables,
                    context,
                    root: self.root,
                    output,
                }),
                TaskCommands::List { status, discovered } => task::run_list(task::ListOptions {
                    status,
                    discovered,
                    root: self.root,
                    output,
                }),
                TaskCommands::Show { id } => task::run_show(task::ShowOptions {
                    id,
                    root: self.root,
                    output,
                }),
                TaskCommands::Triage { ids, all } => task::run_triage(task::TriageOptions {
                    ids,
                    all,
                    root: self.root,
                    output,
                }),
                TaskCommands::Import { file } => task::run_import(task::ImportOptions {
                    file,
                    root: self.root,
                    output,
                }),
                TaskCommands::Review { id, reason } => task::run_transition(task::TransitionOptions {
                    action: task::ReviewAction::Review,
                    id,
                    reason,
                    root: self.root,
                    output,
                }),
                TaskCommands::Approve { id, reason } => {
                    task::run_transition(task::TransitionOptions {
                        action: task::ReviewAction::Approve,
                        id,
                        reason,
                        root: self.root,
                        output,
                    })
                }
                TaskCommands::Reject { id, reason } => task::run_transition(task::TransitionOptions {
                    action: task::ReviewAction::Reject,
                    id,
                    reason,
                    root: self.root,
                    output,
                }),
            },
            Commands::Direction(cmd) => match cmd {
                DirectionCommands::Set { text } => direction::run_set(direction::SetOptions {
                    text,
                    root: self.root,
                    output,
                }),
                DirectionCommands::Analyze => direction::run_analyze(direction::AnalyzeOptions {
                    root: self.root,
                    output,
                }),
                DirectionCommands::Show => direction::run_show(direction::ShowOptions {
                    root: self.root,
                    output,
                }),
            },
        }
    }
}
