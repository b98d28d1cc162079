//! Coverage for config parsing and env overrides.

use std::path::Path;

use plugboard::config::PlugboardConfig;

fn parse(toml_str: &str) -> PlugboardConfig {
    match PlugboardConfig::from_toml(toml_str) {
        Ok(config) => config,
        Err(err) => panic!("config should parse: {err:#}"),
    }
}

#[test]
fn defaults() {
    let config = PlugboardConfig::default();
    assert!(config.hotplug.enabled);
    assert_eq!(config.core.app, "core");
    assert_eq!(config.paths.state_db, "plugboard-state.db");
    assert_eq!(config.paths.logs_dir, "logs");
    assert_eq!(config.logging.level, "info");
}

#[test]
fn parse_full_config() {
    let config = parse(
        r#"
[hotplug]
enabled = false

[core]
app = "system"

[paths]
state_db = "/var/lib/plugboard/state.db"
logs_dir = "/var/log/plugboard"

[logging]
level = "debug"
"#,
    );
    assert!(!config.hotplug.enabled);
    assert_eq!(config.core.app, "system");
    assert_eq!(
        config.paths.state_db_path(),
        Path::new("/var/lib/plugboard/state.db")
    );
    assert_eq!(config.paths.logs_dir_path(), Path::new("/var/log/plugboard"));
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn parse_partial_config_uses_defaults() {
    let config = parse("[core]\napp = \"system\"\n");
    assert_eq!(config.core.app, "system");
    assert!(config.hotplug.enabled);
    assert_eq!(config.paths.state_db, "plugboard-state.db");
}

#[test]
fn parse_empty_config_uses_defaults() {
    assert_eq!(parse(""), PlugboardConfig::default());
}

#[test]
fn mistyped_value_is_rejected() {
    assert!(PlugboardConfig::from_toml("[hotplug]\nenabled = \"sometimes\"\n").is_err());
}

#[test]
fn env_overrides_config_values() {
    let mut config = PlugboardConfig::default();
    config.apply_overrides(|key| match key {
        "PLUGBOARD_HOTPLUG" => Some("off".to_owned()),
        "PLUGBOARD_CORE_APP" => Some("system".to_owned()),
        "PLUGBOARD_STATE_DB" => Some("/tmp/state.db".to_owned()),
        "PLUGBOARD_LOGS_DIR" => Some("/tmp/logs".to_owned()),
        "PLUGBOARD_LOG_LEVEL" => Some("plugboard=trace".to_owned()),
        _ => None,
    });
    assert!(!config.hotplug.enabled);
    assert_eq!(config.core.app, "system");
    assert_eq!(config.paths.state_db, "/tmp/state.db");
    assert_eq!(config.paths.logs_dir, "/tmp/logs");
    assert_eq!(config.logging.level, "plugboard=trace");
}

#[test]
fn invalid_env_overrides_are_ignored() {
    let mut config = PlugboardConfig::default();
    config.apply_overrides(|key| match key {
        "PLUGBOARD_HOTPLUG" => Some("maybe".to_owned()),
        "PLUGBOARD_CORE_APP" => Some("Not Valid".to_owned()),
        "PLUGBOARD_LOG_LEVEL" => Some(String::new()),
        _ => None,
    });
    assert_eq!(config, PlugboardConfig::default());
}

#[test]
fn load_reads_file_named_by_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("custom.toml");
    std::fs::write(&path, "[hotplug]\nenabled = false\n[core]\napp = \"system\"\n")
        .expect("write config");
    let path_str = path.display().to_string();

    let config = PlugboardConfig::load_with(|key| match key {
        "PLUGBOARD_CONFIG_PATH" => Some(path_str.clone()),
        "PLUGBOARD_CORE_APP" => Some("device".to_owned()),
        _ => None,
    })
    .expect("load");
    assert!(!config.hotplug.enabled);
    assert_eq!(config.core.app, "device");
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("absent.toml");
    let config = PlugboardConfig::load_from_file(&missing).expect("load");
    assert_eq!(config, PlugboardConfig::default());
}

#[test]
fn malformed_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[hotplug\n").expect("write config");
    let err = PlugboardConfig::load_from_file(&path).expect_err("malformed");
    assert!(format!("{err:#}").contains("bad.toml"));
}
