//! Code intelligence: pattern inspection of source artifacts.
//!
//! Analysis is heuristic. It never parses or executes code; each artifact
//! kind is described by a pattern table in [`patterns`].

pub mod gaps;
pub mod patterns;
pub mod survey;

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::task::TaskGraph;

pub use gaps::{Discovery, Gap, GapKind};
pub use survey::Survey;

/// Artifact categories the analyzer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Scripting-language source (JavaScript, TypeScript)
    Script,
    /// Definition source (Python)
    Definition,
    /// Typed interface source (Swift)
    Interface,
    /// Relational schema (SQL)
    Schema,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::Script,
        ArtifactKind::Definition,
        ArtifactKind::Interface,
        ArtifactKind::Schema,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Script => "script",
            ArtifactKind::Definition => "definition",
            ArtifactKind::Interface => "interface",
            ArtifactKind::Schema => "schema",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ArtifactKind::Script => &["js", "mjs", "cjs", "ts", "jsx", "tsx"],
            ArtifactKind::Definition => &["py"],
            ArtifactKind::Interface => &["swift"],
            ArtifactKind::Schema => &["sql"],
        }
    }

    /// Infer the kind from a file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<ArtifactKind> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        ArtifactKind::ALL
            .into_iter()
            .find(|kind| kind.extensions().contains(&ext.as_str()))
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ArtifactKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "unknown artifact kind '{s}' (expected script, definition, interface, schema)"
                ))
            })
    }
}

/// Whether the artifact could be inspected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Presence {
    Present,
    Missing,
    Unreadable { reason: String },
}

/// A named construct found in an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capability {
    pub category: &'static str,
    pub name: String,
}

/// A TODO-style comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Marker {
    pub tag: String,
    pub text: String,
    /// 1-based
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub presence: Presence,
    pub capabilities: Vec<Capability>,
    pub markers: Vec<Marker>,
    /// Stub evidence such as "3 possible stub functions"
    pub signals: Vec<String>,
    pub facts: BTreeMap<&'static str, bool>,
}

impl AnalysisResult {
    fn empty(path: &Path, kind: ArtifactKind, presence: Presence) -> Self {
        Self {
            path: path.to_path_buf(),
            kind,
            presence,
            capabilities: Vec::new(),
            markers: Vec::new(),
            signals: Vec::new(),
            facts: BTreeMap::new(),
        }
    }

    pub fn is_present(&self) -> bool {
        self.presence == Presence::Present
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|cap| cap.name == name)
    }

    /// Names captured for one category, in match order
    pub fn names_in(&self, category: &str) -> Vec<&str> {
        self.capabilities
            .iter()
            .filter(|cap| cap.category == category)
            .map(|cap| cap.name.as_str())
            .collect()
    }

    pub fn fact(&self, name: &str) -> bool {
        self.facts.get(name).copied().unwrap_or(false)
    }

    /// True when the artifact carries stub evidence or no capabilities at all
    pub fn looks_unimplemented(&self) -> bool {
        self.is_present() && (!self.signals.is_empty() || self.capabilities.is_empty())
    }
}

/// Inspects one artifact kind
pub trait Analyzer {
    fn kind(&self) -> ArtifactKind;

    /// Pure inspection of already-read text
    fn analyze_text(&self, path: &Path, text: &str) -> AnalysisResult;

    /// Read and inspect a file. Never fails; problems become [`Presence`].
    fn analyze_path(&self, path: &Path) -> AnalysisResult {
        match std::fs::read(path) {
            Ok(bytes) => self.analyze_text(path, &String::from_utf8_lossy(&bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                AnalysisResult::empty(path, self.kind(), Presence::Missing)
            }
            Err(err) => {
                debug!(path = %path.display(), error = %err, "artifact unreadable");
                AnalysisResult::empty(
                    path,
                    self.kind(),
                    Presence::Unreadable {
                        reason: err.to_string(),
                    },
                )
            }
        }
    }
}

/// Table-driven analyzer used for every built-in kind
#[derive(Debug, Clone, Copy)]
pub struct PatternAnalyzer {
    kind: ArtifactKind,
}

impl PatternAnalyzer {
    pub fn new(kind: ArtifactKind) -> Self {
        Self { kind }
    }
}

impl Analyzer for PatternAnalyzer {
    fn kind(&self) -> ArtifactKind {
        self.kind
    }

    fn analyze_text(&self, path: &Path, text: &str) -> AnalysisResult {
        let table = patterns::table_for(self.kind);
        let mut result = AnalysisResult::empty(path, self.kind, Presence::Present);

        let mut seen: HashSet<(&'static str, String)> = HashSet::new();
        for (category, regex) in &table.capabilities {
            for caps in regex.captures_iter(text) {
                let Some(name) = caps.iter().skip(1).flatten().next() else {
                    continue;
                };
                let name = name.as_str();
                if table.ignored_names.contains(&name) {
                    continue;
                }
                if seen.insert((*category, name.to_string())) {
                    result.capabilities.push(Capability {
                        category: *category,
                        name: name.to_string(),
                    });
                }
            }
        }

        for caps in table.marker.captures_iter(text) {
            let (Some(whole), Some(tag)) = (caps.get(0), caps.name("tag")) else {
                continue;
            };
            result.markers.push(Marker {
                tag: tag.as_str().to_ascii_uppercase(),
                text: caps
                    .name("text")
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default(),
                line: line_of(text, whole.start()),
            });
        }

        for (signal, regex) in &table.signals {
            if signal.counted {
                let count = regex.find_iter(text).count();
                if count > 0 {
                    result.signals.push(format!("{count} {}", signal.label));
                }
            } else if regex.is_match(text) {
                result.signals.push(signal.label.to_string());
            }
        }

        for (name, regex) in &table.facts {
            result.facts.insert(*name, regex.is_match(text));
        }

        result
    }
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].bytes().filter(|&b| b == b'\n').count() + 1
}

/// Analyze one file with the analyzer for `kind`
pub fn analyze(path: &Path, kind: ArtifactKind) -> AnalysisResult {
    PatternAnalyzer::new(kind).analyze_path(path)
}

/// Project-level code intelligence: gap detection and task discovery
#[derive(Debug, Clone)]
pub struct CodeIntelligence {
    root: PathBuf,
    config: Config,
}

impl CodeIntelligence {
    pub fn new(root: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            root: root.into(),
            config: config.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn find_gaps(&self) -> Result<Vec<Gap>> {
        gaps::find_gaps(&self.root, &self.config.areas)
    }

    /// Detect gaps and synthesize `detected` tasks not already tracked by `active`
    pub fn discover(&self, active: &TaskGraph) -> Result<Discovery> {
        let gaps = self.find_gaps()?;
        let options = gaps::SynthesisOptions {
            id_prefix: self.config.analysis.id_prefix.clone(),
            priority: self.config.analysis.default_priority,
        };
        Ok(gaps::synthesize_tasks(&gaps, &self.config.areas, active, &options))
    }

    /// Inspect every tracked artifact below the scanning root
    pub fn survey(&self) -> Result<Survey> {
        let scan_root = self.root.join(&self.config.analysis.root);
        survey::survey(&scan_root, &self.config.analysis.exclude)
    }
}
