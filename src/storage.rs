//! Storage layer for tasksmith
//!
//! All persistent state lives under the project root:
//!
//! ```text
//! .tasksmith.toml               # Configuration (optional)
//! .tasksmith/                   # State directory (ignored by VCS)
//!   context.json                # ContextSnapshot, replaced atomically
//!   context.json.lock           # Advisory lock guarding context.json
//!   run.lock                    # Held by the process dispatching tasks
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::lock::{self, DEFAULT_LOCK_TIMEOUT_MS};

/// Name of the state directory
pub const STATE_DIR: &str = ".tasksmith";

/// Name of the persisted context file
pub const CONTEXT_FILE: &str = "context.json";

/// Name of the dispatch lock file
pub const RUN_LOCK_FILE: &str = "run.lock";

/// Storage manager rooted at a project directory
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the `.tasksmith/` state directory
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    /// Path to the persisted context snapshot
    pub fn context_file(&self) -> PathBuf {
        self.state_dir().join(CONTEXT_FILE)
    }

    /// Path to the lock held while tasks are being dispatched
    pub fn run_lock_file(&self) -> PathBuf {
        self.state_dir().join(RUN_LOCK_FILE)
    }

    /// Resolve a project-relative path
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        let relative = relative.as_ref();
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.root.join(relative)
        }
    }

    /// Create the state directory. Returns true if it was created.
    pub fn init(&self) -> Result<bool> {
        let dir = self.state_dir();
        if dir.is_dir() {
            return Ok(false);
        }
        fs::create_dir_all(&dir)?;
        Ok(true)
    }

    /// Serialize to pretty JSON and replace `path` atomically under its lock
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        lock::write_atomic_locked(path, json.as_bytes(), DEFAULT_LOCK_TIMEOUT_MS)?;
        debug!(path = %path.display(), bytes = json.len(), "wrote json");
        Ok(())
    }

    /// Read JSON from `path` under its lock
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let bytes = lock::read_locked(path, DEFAULT_LOCK_TIMEOUT_MS)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Ensure the state directory is listed in `.gitignore`. Returns true if updated.
pub fn ensure_gitignore(root: &Path) -> io::Result<bool> {
    let gitignore_path = root.join(".gitignore");
    let pattern = format!("/{}/", STATE_DIR);

    let existing = if gitignore_path.exists() {
        fs::read_to_string(&gitignore_path)?
    } else {
        String::new()
    };

    let already_ignored = existing.lines().any(|line| {
        let trimmed = line.trim().trim_start_matches('/').trim_end_matches('/');
        trimmed == STATE_DIR
    });
    if already_ignored {
        return Ok(false);
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&gitignore_path)?;

    if !existing.is_empty() && !existing.ends_with('\n') {
        writeln!(file)?;
    }

    writeln!(file, "# tasksmith state")?;
    writeln!(file, "{}", pattern)?;
    Ok(true)
}
