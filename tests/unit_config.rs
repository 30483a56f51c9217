use std::fs;

use tasksmith::config::{Config, CONFIG_FILE};
use tasksmith::error::Error;
use tasksmith::task::{AgentRole, Priority};

#[test]
fn config_defaults_when_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config::load_from_root(dir.path()).expect("defaults");

    assert_eq!(config.context.freshness, "1h");
    assert_eq!(config.scheduler.max_stalled_checks, 3);
    assert_eq!(config.executor.program, "gemini");
    assert_eq!(config.analysis.id_prefix, "DETECTED");
    assert_eq!(config.analysis.docs_dir, "docs");
    assert!(config.areas.is_empty());
    assert!(config.roles.is_empty());
}

#[test]
fn config_overrides_from_toml() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let toml = r#"
[context]
freshness = "30m"

[scheduler]
stall_interval = "5s"
max_stalled_checks = 10

[executor]
program = "claude"
args = ["-p", "{prompt_file}"]
output_dir = "generated"

[analysis]
id_prefix = "GAP"
default_priority = "critical"
exclude = ["vendor/**"]

[[areas]]
name = "database"
artifact = "db/schema.sql"
required = ["quotes", "customers"]
role = "database-engineer"

[roles.ios-developer]
context = "SwiftUI app targeting iOS 17"
expertise = ["SwiftUI", "ARKit"]
"#;
    fs::write(dir.path().join(CONFIG_FILE), toml)?;

    let config = Config::load_from_root(dir.path())?;
    assert_eq!(config.freshness_window()?, chrono::Duration::minutes(30));
    assert_eq!(config.stall_interval()?, std::time::Duration::from_secs(5));
    assert_eq!(config.scheduler.max_stalled_checks, 10);
    assert_eq!(config.executor.program, "claude");
    assert_eq!(config.executor.output_dir, "generated");
    assert_eq!(config.analysis.id_prefix, "GAP");
    assert_eq!(config.analysis.default_priority, Priority::Critical);
    assert_eq!(config.areas[0].role, Some(AgentRole::Database));

    let profile = config.role_profile(AgentRole::Mobile).expect("mobile profile");
    assert_eq!(profile.expertise, vec!["SwiftUI", "ARKit"]);
    assert!(config.role_profile(AgentRole::Backend).is_none());

    Ok(())
}

#[test]
fn config_load_rejects_invalid_toml() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join(CONFIG_FILE);
    fs::write(&config_path, "this = [not valid").expect("write config");

    let result = Config::load(&config_path);
    assert!(result.is_err());
}

#[test]
fn config_rejects_unknown_role_profile() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join(CONFIG_FILE);
    fs::write(&config_path, "[roles.chef]\ncontext = \"cook\"\n").expect("write config");

    let err = Config::load(&config_path).expect_err("unknown role");
    assert!(matches!(err, Error::InvalidConfig(message) if message.contains("roles.chef")));
}

#[test]
fn default_config_round_trips_through_save() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(CONFIG_FILE);
    Config::default().save(&path).expect("save");

    let loaded = Config::load(&path).expect("load");
    assert_eq!(loaded.executor.args, Config::default().executor.args);
    assert_eq!(loaded.analysis.exclude, Config::default().analysis.exclude);
}
