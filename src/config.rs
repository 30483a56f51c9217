//! Configuration loading and management
//!
//! Handles parsing of `.tasksmith.toml` configuration files. Every field has
//! a default, so a missing file or a partial file is valid.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::analyzer::ArtifactKind;
use crate::error::{Error, Result};
use crate::task::{AgentRole, Priority};

/// Name of the configuration file at the project root
pub const CONFIG_FILE: &str = ".tasksmith.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Persistent context settings
    #[serde(default)]
    pub context: ContextConfig,

    /// Control loop settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// External executor settings
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Code intelligence settings
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Tracked component areas used for gap detection
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub areas: Vec<AreaConfig>,

    /// Per-role briefing included in every instruction for that role
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub roles: BTreeMap<String, RoleProfile>,
}

/// Standing context handed to the executor for one role
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleProfile {
    /// Free-text briefing (stack, conventions, constraints)
    #[serde(default)]
    pub context: String,

    /// Areas of expertise listed in the instruction
    #[serde(default)]
    pub expertise: Vec<String>,
}

/// Persistent context configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// How long a code analysis stays fresh (e.g. "1h")
    #[serde(default = "default_freshness")]
    pub freshness: String,
}

fn default_freshness() -> String {
    "1h".to_string()
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            freshness: default_freshness(),
        }
    }
}

/// Control loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Wait between readiness checks while the sprint is stalled
    #[serde(default = "default_stall_interval")]
    pub stall_interval: String,

    /// Stalled checks before `run` gives up
    #[serde(default = "default_max_stalled_checks")]
    pub max_stalled_checks: u32,
}

fn default_stall_interval() -> String {
    "30s".to_string()
}

fn default_max_stalled_checks() -> u32 {
    3
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            stall_interval: default_stall_interval(),
            max_stalled_checks: default_max_stalled_checks(),
        }
    }
}

/// External code-generation tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Program to invoke
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments; `{prompt_file}` and `{output_dir}` are substituted
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Directory the tool writes into, relative to the project root
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_program() -> String {
    "gemini".to_string()
}

fn default_args() -> Vec<String> {
    vec!["@{prompt_file}".to_string()]
}

fn default_output_dir() -> String {
    ".".to_string()
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            output_dir: default_output_dir(),
        }
    }
}

/// Code intelligence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Scanning root, relative to the project root
    #[serde(default = "default_scan_root")]
    pub root: String,

    /// Glob patterns excluded from scanning
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Priority given to synthesized tasks
    #[serde(default = "default_detected_priority")]
    pub default_priority: Priority,

    /// Prefix for synthesized task ids
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,

    /// Documentation directory used for project direction
    #[serde(default = "default_docs_dir")]
    pub docs_dir: String,
}

fn default_scan_root() -> String {
    ".".to_string()
}

fn default_exclude() -> Vec<String> {
    vec![
        ".git/**".to_string(),
        ".tasksmith/**".to_string(),
        "target/**".to_string(),
        "build/**".to_string(),
        "dist/**".to_string(),
        "**/node_modules/**".to_string(),
    ]
}

fn default_detected_priority() -> Priority {
    Priority::High
}

fn default_id_prefix() -> String {
    "DETECTED".to_string()
}

fn default_docs_dir() -> String {
    "docs".to_string()
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            root: default_scan_root(),
            exclude: default_exclude(),
            default_priority: default_detected_priority(),
            id_prefix: default_id_prefix(),
            docs_dir: default_docs_dir(),
        }
    }
}

/// A tracked component area and the capabilities it must expose
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AreaConfig {
    /// Area name (e.g. "backend")
    pub name: String,

    /// Representative artifact, relative to the project root
    pub artifact: String,

    /// Artifact kind; inferred from the extension when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ArtifactKind>,

    /// Directory that must exist for the area to be tracked at all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,

    /// Capability names expected in the artifact
    #[serde(default)]
    pub required: Vec<String>,

    /// Role that owns gaps in this area; unmapped areas yield no tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<AgentRole>,
}

impl AreaConfig {
    /// Resolve the artifact kind, falling back to the file extension
    pub fn artifact_kind(&self) -> Result<ArtifactKind> {
        if let Some(kind) = self.kind {
            return Ok(kind);
        }
        ArtifactKind::from_path(Path::new(&self.artifact)).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "areas.{}: cannot infer artifact kind for '{}'; set kind explicitly",
                self.name, self.artifact
            ))
        })
    }
}

impl Config {
    /// Load configuration from a `.tasksmith.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the project root, or return defaults when absent
    pub fn load_from_root(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &PathBuf) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Profile for a role, if one is configured
    pub fn role_profile(&self, role: AgentRole) -> Option<&RoleProfile> {
        self.roles
            .iter()
            .find(|(key, _)| key.parse::<AgentRole>().ok() == Some(role))
            .map(|(_, profile)| profile)
    }

    /// Analysis freshness window
    pub fn freshness_window(&self) -> Result<Duration> {
        parse_duration(&self.context.freshness)
    }

    /// Wait between stalled readiness checks
    pub fn stall_interval(&self) -> Result<std::time::Duration> {
        parse_duration(&self.scheduler.stall_interval)?
            .to_std()
            .map_err(|_| {
                Error::InvalidConfig("scheduler.stall_interval must not be negative".to_string())
            })
    }

    fn validate(&self) -> Result<()> {
        parse_duration(&self.context.freshness)
            .map_err(|err| Error::InvalidConfig(format!("context.freshness: {err}")))?;
        parse_duration(&self.scheduler.stall_interval)
            .map_err(|err| Error::InvalidConfig(format!("scheduler.stall_interval: {err}")))?;

        if self.executor.program.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "executor.program cannot be empty".to_string(),
            ));
        }

        let prefix = self.analysis.id_prefix.trim();
        if prefix.is_empty() {
            return Err(Error::InvalidConfig(
                "analysis.id_prefix cannot be empty".to_string(),
            ));
        }
        if !prefix
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            return Err(Error::InvalidConfig(
                "analysis.id_prefix must be alphanumeric".to_string(),
            ));
        }
        for pattern in &self.analysis.exclude {
            glob::Pattern::new(pattern).map_err(|err| {
                Error::InvalidConfig(format!("analysis.exclude '{pattern}': {err}"))
            })?;
        }

        let mut seen = HashSet::new();
        for area in &self.areas {
            let name = area.name.trim();
            if name.is_empty() {
                return Err(Error::InvalidConfig(
                    "areas cannot include an empty name".to_string(),
                ));
            }
            if !seen.insert(name.to_string()) {
                return Err(Error::InvalidConfig(format!(
                    "areas has duplicate entry '{name}'"
                )));
            }
            if area.artifact.trim().is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "areas.{name}: artifact cannot be empty"
                )));
            }
            area.artifact_kind()?;
        }

        for key in self.roles.keys() {
            key.parse::<AgentRole>()
                .map_err(|err| Error::InvalidConfig(format!("roles.{key}: {err}")))?;
        }

        Ok(())
    }
}

/// Parse a duration like "30s", "15m", "1h", "2d" or "1w"
///
/// A bare number is read as minutes.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    if s.is_empty() {
        return Err(Error::InvalidArgument("Duration cannot be empty".to_string()));
    }

    let (num_str, unit) = if let Some(pos) = s.find(|c: char| !c.is_ascii_digit()) {
        (&s[..pos], &s[pos..])
    } else {
        (s, "m")
    };

    let num: i64 = num_str.parse().map_err(|_| {
        Error::InvalidArgument(format!("Invalid duration number: {}", num_str))
    })?;

    let duration = match unit.trim().to_lowercase().as_str() {
        "s" | "sec" | "second" | "seconds" => Duration::try_seconds(num),
        "m" | "min" | "minute" | "minutes" => Duration::try_minutes(num),
        "h" | "hr" | "hour" | "hours" => Duration::try_hours(num),
        "d" | "day" | "days" => Duration::try_days(num),
        "w" | "week" | "weeks" => Duration::try_weeks(num),
        _ => {
            return Err(Error::InvalidArgument(format!(
                "Invalid duration unit '{}'. Expected: s, m, h, d, w",
                unit
            )));
        }
    };

    duration.ok_or_else(|| Error::InvalidArgument(format!("Duration out of range: {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_expected() {
        let cfg = Config::default();
        assert_eq!(cfg.context.freshness, "1h");
        assert_eq!(cfg.scheduler.stall_interval, "30s");
        assert_eq!(cfg.scheduler.max_stalled_checks, 3);
        assert_eq!(cfg.executor.program, "gemini");
        assert_eq!(cfg.executor.args, vec!["@{prompt_file}".to_string()]);
        assert_eq!(cfg.executor.output_dir, ".");
        assert_eq!(cfg.analysis.root, ".");
        assert_eq!(cfg.analysis.default_priority, Priority::High);
        assert_eq!(cfg.analysis.id_prefix, "DETECTED");
        assert!(cfg.analysis.exclude.contains(&"**/node_modules/**".to_string()));
        assert!(cfg.areas.is_empty());
        assert_eq!(cfg.freshness_window().expect("window"), Duration::hours(1));
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
[context]
freshness = "15m"

[scheduler]
stall_interval = "5s"
max_stalled_checks = 1

[executor]
program = "codegen"
args = ["--prompt", "{prompt_file}", "--out", "{output_dir}"]
output_dir = "generated"

[analysis]
exclude = ["vendor/**"]
default_priority = "critical"
id_prefix = "GAP"

[[areas]]
name = "backend"
artifact = "backend/src/services/engine.js"
root = "backend"
required = ["calculateEstimate", "applyFinishLevels"]
role = "backend"

[[areas]]
name = "schema"
artifact = "db/schema.txt"
kind = "schema"
"#;
        fs::write(&path, content.trim()).expect("write config");

        let cfg = Config::load(&path).expect("load config");
        assert_eq!(cfg.freshness_window().expect("window"), Duration::minutes(15));
        assert_eq!(
            cfg.stall_interval().expect("interval"),
            std::time::Duration::from_secs(5)
        );
        assert_eq!(cfg.scheduler.max_stalled_checks, 1);
        assert_eq!(cfg.executor.program, "codegen");
        assert_eq!(cfg.executor.args.len(), 4);
        assert_eq!(cfg.analysis.exclude, vec!["vendor/**".to_string()]);
        assert_eq!(cfg.analysis.default_priority, Priority::Critical);
        assert_eq!(cfg.analysis.id_prefix, "GAP");
        assert_eq!(cfg.areas.len(), 2);
        assert_eq!(cfg.areas[0].role, Some(AgentRole::Backend));
        assert_eq!(cfg.areas[0].artifact_kind().expect("kind"), ArtifactKind::Script);
        assert_eq!(cfg.areas[1].artifact_kind().expect("kind"), ArtifactKind::Schema);
        assert!(cfg.areas[1].role.is_none());
    }

    #[test]
    fn role_profiles_resolve_aliases() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
[roles.ios]
context = "SwiftUI app targeting iOS 17"
expertise = ["SwiftUI", "ARKit"]
"#;
        fs::write(&path, content.trim()).expect("write config");

        let cfg = Config::load(&path).expect("load config");
        let profile = cfg.role_profile(AgentRole::Mobile).expect("profile");
        assert_eq!(profile.expertise, vec!["SwiftUI", "ARKit"]);
        assert!(cfg.role_profile(AgentRole::Backend).is_none());

        fs::write(&path, "[roles.chef]\ncontext = \"cooking\"").expect("write config");
        assert!(matches!(Config::load(&path), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn invalid_durations_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[context]\nfreshness = \"soon\"").expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        match err {
            Error::InvalidConfig(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn area_without_inferable_kind_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
[[areas]]
name = "docs"
artifact = "README"
"#;
        fs::write(&path, content.trim()).expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn duplicate_areas_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
[[areas]]
name = "backend"
artifact = "a.js"

[[areas]]
name = "backend"
artifact = "b.js"
"#;
        fs::write(&path, content.trim()).expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn load_from_root_defaults_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from_root(dir.path()).expect("config");
        assert_eq!(cfg.executor.program, "gemini");
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("30s").expect("s"), Duration::seconds(30));
        assert_eq!(parse_duration("2h").expect("h"), Duration::hours(2));
        assert_eq!(parse_duration("45").expect("bare"), Duration::minutes(45));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("3y").is_err());
    }

    #[test]
    fn out_of_range_duration_is_an_error() {
        let err = parse_duration("9999999999999999h").expect_err("too large");
        assert!(matches!(err, Error::InvalidArgument(message) if message.contains("out of range")));

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[context]\nfreshness = \"9999999999999999h\"").expect("write config");
        assert!(matches!(Config::load(&path), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn save_writes_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.toml");
        let cfg = Config::default();
        cfg.save(&path).expect("save config");

        let written = fs::read_to_string(&path).expect("read config");
        assert!(written.contains("freshness = \"1h\""));
        assert!(written.contains("program = \"gemini\""));
    }
}
