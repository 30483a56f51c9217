//! tasksmith init command implementation
//!
//! Creates the default config, the state directory and an empty context.

use std::path::{Path, PathBuf};

use crate::config::{Config, CONFIG_FILE};
use crate::context::ContextSnapshot;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::{ensure_gitignore, Storage, STATE_DIR};

pub struct InitOptions {
    pub root: Option<PathBuf>,
    pub output: OutputOptions,
}

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    created: InitCreated,
    updated: InitUpdated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    config: bool,
    state_dir: bool,
    context: bool,
}

#[derive(serde::Serialize)]
struct InitUpdated {
    gitignore: bool,
}

pub fn run(options: InitOptions) -> Result<()> {
    let root = match options.root {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    if !root.is_dir() {
        return Err(Error::InvalidArgument(format!(
            "project root is not a directory: {}",
            root.display()
        )));
    }

    let created_config = ensure_config(&root)?;
    let config = Config::load_from_root(&root)?;
    let storage = Storage::new(root.clone());
    let created_state_dir = storage.init()?;

    let store = crate::context::ContextStore::from_config(storage.clone(), &config)?;
    let created_context = if storage.context_file().exists() {
        false
    } else {
        store.save(&ContextSnapshot::default())?;
        true
    };
    let updated_gitignore = ensure_gitignore(&root)?;

    let report = InitReport {
        root: root.clone(),
        created: InitCreated {
            config: created_config,
            state_dir: created_state_dir,
            context: created_context,
        },
        updated: InitUpdated {
            gitignore: updated_gitignore,
        },
    };

    let mut created_items = Vec::new();
    if created_config {
        created_items.push(CONFIG_FILE.to_string());
    }
    if created_state_dir {
        created_items.push(format!("{STATE_DIR}/"));
    }
    if created_context {
        created_items.push(format!("{STATE_DIR}/context.json"));
    }

    let header = if created_items.is_empty() && !updated_gitignore {
        "tasksmith init: nothing to do"
    } else {
        "tasksmith init: initialized project"
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("root", root.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    human.push_summary(
        "updated",
        if updated_gitignore { ".gitignore" } else { "none" },
    );
    human.push_next_step(format!("add [[areas]] to {CONFIG_FILE}"));
    human.push_next_step("tasksmith analyze");
    human.push_next_step("tasksmith task add <id> <title>");

    emit_success(options.output, "init", &report, Some(&human))
}

fn ensure_config(root: &Path) -> Result<bool> {
    let config_path = root.join(CONFIG_FILE);
    if config_path.exists() {
        if !config_path.is_file() {
            return Err(Error::OperationFailed(format!(
                "{CONFIG_FILE} exists but is not a file: {}",
                config_path.display()
            )));
        }
        return Ok(false);
    }

    Config::default().save(&config_path)?;
    Ok(true)
}
