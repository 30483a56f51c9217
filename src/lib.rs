//! tasksmith - Task Orchestration Library
//!
//! This library provides the core functionality for the tasksmith CLI tool,
//! which drives a sprint of tasks through role-specialized code generators.
//!
//! # Core Concepts
//!
//! - **Tasks**: Units of work with a role, priority, dependencies and deliverables
//! - **State Machine**: Every status change is checked against a transition table
//! - **Readiness**: A task is ready once all of its dependencies are complete
//! - **Code Intelligence**: Pattern-based artifact analysis that discovers gaps
//! - **Context Store**: One atomically replaced JSON snapshot per project
//! - **Control Loop**: Dispatches ready tasks, one per role, until the sprint ends
//!
//! # Module Organization
//!
//! - `analyzer`: Artifact analysis, gap detection and task synthesis
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `.tasksmith.toml`
//! - `context`: Persistent context snapshot and freshness
//! - `direction`: Project direction summary
//! - `error`: Error types and result aliases
//! - `executor`: External code-generator seam
//! - `lock`: File locking and atomic writes
//! - `orchestrator`: Dispatch cycles and the run loop
//! - `output`: Human and JSON output
//! - `scheduler`: Graph validation, readiness and progress
//! - `shutdown`: Cooperative cancellation
//! - `sprint`: Static sprint definition files
//! - `storage`: State directory layout
//! - `task`: Task model and status transitions

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod context;
pub mod direction;
pub mod error;
pub mod executor;
pub mod lock;
pub mod orchestrator;
pub mod output;
pub mod scheduler;
pub mod shutdown;
pub mod sprint;
pub mod storage;
pub mod task;

pub use error::{Error, Result};
