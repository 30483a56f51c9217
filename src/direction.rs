//! Project direction: a short summary of where the project is heading,
//! included in every instruction.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::context::ContextSnapshot;
use crate::error::{Error, Result};
use crate::executor::Executor;

/// Markdown files below `docs_dir`, sorted by path
pub fn collect_docs(docs_dir: &Path) -> Vec<PathBuf> {
    if !docs_dir.is_dir() {
        return Vec::new();
    }
    let mut docs: Vec<PathBuf> = WalkDir::new(docs_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
        })
        .collect();
    docs.sort();
    docs
}

/// Prompt asking the executor to summarize the documentation set
pub fn build_prompt(root: &Path, docs: &[PathBuf]) -> Result<String> {
    let mut prompt = String::from(
        "Summarize the direction of this project from its documentation. \
         Cover goals, current priorities and constraints in a few short paragraphs.\n",
    );
    for doc in docs {
        let content = std::fs::read_to_string(doc)?;
        let name = doc.strip_prefix(root).unwrap_or(doc);
        prompt.push_str(&format!("\n## {}\n\n{}\n", name.display(), content.trim_end()));
    }
    Ok(prompt)
}

/// Ask the executor for a direction summary and store it on success
///
/// Returns the number of documents read.
pub async fn analyze(
    snapshot: &mut ContextSnapshot,
    root: &Path,
    docs_dir: &Path,
    executor: &dyn Executor,
) -> Result<usize> {
    let docs = collect_docs(docs_dir);
    if docs.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "no markdown documents found in {}",
            docs_dir.display()
        )));
    }
    debug!(docs = docs.len(), "analyzing documentation");

    let prompt = build_prompt(root, &docs)?;
    let outcome = executor.execute(&prompt, root).await?;
    if !outcome.success {
        warn!("documentation analysis failed");
        return Err(Error::Execution(format!(
            "documentation analysis failed: {}",
            outcome.output.trim()
        )));
    }

    set(snapshot, &outcome.output)?;
    snapshot.last_doc_analysis = Some(Utc::now());
    info!(docs = docs.len(), "project direction updated");
    Ok(docs.len())
}

/// Store a manual direction summary
pub fn set(snapshot: &mut ContextSnapshot, text: &str) -> Result<()> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::InvalidArgument(
            "project direction cannot be empty".to_string(),
        ));
    }
    snapshot.project_direction = Some(text.to_string());
    Ok(())
}
