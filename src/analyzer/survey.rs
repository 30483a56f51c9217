//! Whole-tree scan of the analysis root.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::Serialize;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use super::{analyze, AnalysisResult, ArtifactKind};
use crate::error::{Error, Result};

/// Result of scanning every tracked artifact below a root
#[derive(Debug, Clone, Serialize)]
pub struct Survey {
    pub root: PathBuf,
    /// Sorted by path
    pub artifacts: Vec<AnalysisResult>,
}

/// Totals for presentation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SurveySummary {
    pub artifacts: usize,
    pub by_kind: BTreeMap<ArtifactKind, usize>,
    pub capabilities: usize,
    pub markers: usize,
    /// Artifacts that carry stub evidence or define nothing
    pub suspect: Vec<PathBuf>,
}

impl Survey {
    pub fn summary(&self) -> SurveySummary {
        let mut summary = SurveySummary {
            artifacts: self.artifacts.len(),
            ..SurveySummary::default()
        };
        for result in &self.artifacts {
            *summary.by_kind.entry(result.kind).or_insert(0) += 1;
            summary.capabilities += result.capabilities.len();
            summary.markers += result.markers.len();
            if result.looks_unimplemented() {
                summary.suspect.push(self.relative(&result.path));
            }
        }
        summary
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

struct Excludes {
    files: Vec<Pattern>,
    /// `dir/**` patterns reduced to `dir`, used to prune whole subtrees
    dirs: Vec<Pattern>,
}

impl Excludes {
    fn new(patterns: &[String]) -> Result<Self> {
        let compile = |pattern: &str| {
            Pattern::new(pattern)
                .map_err(|err| Error::InvalidConfig(format!("exclude '{pattern}': {err}")))
        };
        let mut excludes = Excludes {
            files: Vec::new(),
            dirs: Vec::new(),
        };
        for pattern in patterns {
            excludes.files.push(compile(pattern)?);
            if let Some(dir) = pattern.strip_suffix("/**") {
                excludes.dirs.push(compile(dir)?);
            }
        }
        Ok(excludes)
    }

    fn prunes(&self, relative: &Path, is_dir: bool) -> bool {
        if is_dir {
            self.dirs.iter().any(|pattern| pattern.matches_path(relative))
        } else {
            self.files.iter().any(|pattern| pattern.matches_path(relative))
        }
    }
}

/// Analyze every file of a known kind below `root`, skipping `exclude` globs
///
/// Globs match paths relative to `root`.
pub fn survey(root: &Path, exclude: &[String]) -> Result<Survey> {
    if !root.is_dir() {
        return Err(Error::InvalidArgument(format!(
            "scanning root {} is not a directory",
            root.display()
        )));
    }
    let excludes = Excludes::new(exclude)?;
    let keep = |entry: &DirEntry| {
        let Ok(relative) = entry.path().strip_prefix(root) else {
            return true;
        };
        relative.as_os_str().is_empty() || !excludes.prunes(relative, entry.file_type().is_dir())
    };

    let mut artifacts = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name().into_iter().filter_entry(keep) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(kind) = ArtifactKind::from_path(entry.path()) {
            artifacts.push(analyze(entry.path(), kind));
        }
    }
    artifacts.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(root = %root.display(), artifacts = artifacts.len(), "survey complete");

    Ok(Survey {
        root: root.to_path_buf(),
        artifacts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn survey_sorted_with_excludes() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "server/quote.js", "function quote() {\n  return computeTotal(1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13);\n}\n");
        write(root, "db/schema.sql", "CREATE TABLE quotes (id int);\n-- TODO: indexes\n");
        write(root, "ml/model.py", "");
        write(root, "node_modules/lib/index.js", "function x() {}\n");
        write(root, "dist/bundle.js", "function y() {}\n");
        write(root, "README.md", "# readme\n");

        let excludes = vec!["**/node_modules/**".to_string(), "dist/**".to_string()];
        let survey = survey(root, &excludes).unwrap();

        let paths: Vec<PathBuf> = survey
            .artifacts
            .iter()
            .map(|a| a.path.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("db/schema.sql"),
                PathBuf::from("ml/model.py"),
                PathBuf::from("server/quote.js"),
            ]
        );

        let summary = survey.summary();
        assert_eq!(summary.artifacts, 3);
        assert_eq!(summary.by_kind[&ArtifactKind::Schema], 1);
        assert_eq!(summary.markers, 1);
        assert_eq!(summary.suspect, vec![PathBuf::from("ml/model.py")]);
    }

    #[test]
    fn survey_rejects_missing_root() {
        let temp = TempDir::new().unwrap();
        assert!(survey(&temp.path().join("nope"), &[]).is_err());
    }
}
