use super::*;

#[test]
fn test_parse_minimal_config() {
    let config = EvolveConfig::from_yaml("keyspace: app").unwrap();
    assert_eq!(config.keyspace, "app");
    assert_eq!(config.metadata_table, "migrations");
    assert_eq!(config.lock_table(), "migrations_lock");
    assert_eq!(config.delimiter, ";");
    assert_eq!(config.lock_poll_interval(), Duration::from_secs(1));
    assert_eq!(config.lock_wait_timeout(), None);
}

#[test]
fn test_empty_config_uses_defaults() {
    let config = EvolveConfig::from_yaml("").unwrap();
    assert_eq!(config, EvolveConfig::default());
}

#[test]
fn test_parse_full_config() {
    let yaml = r#"
keyspace: inventory
metadata_table: schema_history
script_path: db/scripts
script_extension: cql
delimiter: "$$"
lock_poll_interval_ms: 250
lock_wait_timeout_secs: 600
database:
  path: "./inventory.duckdb"
"#;
    let config = EvolveConfig::from_yaml(yaml).unwrap();
    assert_eq!(config.keyspace, "inventory");
    assert_eq!(config.lock_table(), "schema_history_lock");
    assert_eq!(config.script_extension, "cql");
    assert_eq!(config.delimiter, "$$");
    assert_eq!(config.lock_poll_interval(), Duration::from_millis(250));
    assert_eq!(config.lock_wait_timeout(), Some(Duration::from_secs(600)));
    assert_eq!(config.database.path, "./inventory.duckdb");

    let root = PathBuf::from("/srv/app");
    assert_eq!(config.script_dir(&root), root.join("db/scripts"));
}

#[test]
fn test_absolute_script_path_is_kept() {
    let config = EvolveConfig::from_yaml("script_path: /opt/scripts").unwrap();
    assert_eq!(
        config.script_dir(Path::new("/srv/app")),
        PathBuf::from("/opt/scripts")
    );
}

#[test]
fn test_unknown_field_rejected() {
    let err = EvolveConfig::from_yaml("keyspace: app\nbogus: true").unwrap_err();
    assert!(matches!(err, CoreError::YamlParse(_)));
}

#[test]
fn test_invalid_keyspace_rejected() {
    let err = EvolveConfig::from_yaml("keyspace: \"app; drop\"").unwrap_err();
    assert!(matches!(err, CoreError::ConfigInvalid { .. }));
    assert!(err.to_string().contains("[E002]"));
}

#[test]
fn test_empty_delimiter_rejected() {
    let err = EvolveConfig::from_yaml("delimiter: \"\"").unwrap_err();
    assert!(err.to_string().contains("delimiter"));
}

#[test]
fn test_zero_poll_interval_rejected() {
    let err = EvolveConfig::from_yaml("lock_poll_interval_ms: 0").unwrap_err();
    assert!(err.to_string().contains("lock_poll_interval_ms"));
}

#[test]
fn test_dotted_extension_rejected() {
    let err = EvolveConfig::from_yaml("script_extension: .sql").unwrap_err();
    assert!(matches!(err, CoreError::ConfigInvalid { .. }));
}

#[test]
fn test_load_from_dir_prefers_yml() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("evolve.yml"), "keyspace: from_yml").unwrap();
    std::fs::write(dir.path().join("evolve.yaml"), "keyspace: from_yaml").unwrap();
    let config = EvolveConfig::load_from_dir(dir.path()).unwrap();
    assert_eq!(config.keyspace, "from_yml");
}

#[test]
fn test_load_from_dir_missing() {
    let dir = tempfile::tempdir().unwrap();
    let err = EvolveConfig::load_from_dir(dir.path()).unwrap_err();
    assert!(matches!(err, CoreError::ConfigNotFound { .. }));
}

// These tests modify environment variables and must run serially
use serial_test::serial;

#[test]
#[serial]
fn test_resolve_database_cli_takes_precedence() {
    let original = std::env::var(DATABASE_ENV_VAR).ok();
    std::env::set_var(DATABASE_ENV_VAR, "env.duckdb");
    let config = EvolveConfig::default();
    assert_eq!(config.resolve_database(Some("cli.duckdb")), "cli.duckdb");
    match original {
        Some(v) => std::env::set_var(DATABASE_ENV_VAR, v),
        None => std::env::remove_var(DATABASE_ENV_VAR),
    }
}

#[test]
#[serial]
fn test_resolve_database_uses_env_var() {
    let original = std::env::var(DATABASE_ENV_VAR).ok();
    std::env::set_var(DATABASE_ENV_VAR, "env.duckdb");
    let config = EvolveConfig::default();
    assert_eq!(config.resolve_database(None), "env.duckdb");
    match original {
        Some(v) => std::env::set_var(DATABASE_ENV_VAR, v),
        None => std::env::remove_var(DATABASE_ENV_VAR),
    }
}

#[test]
#[serial]
fn test_resolve_database_falls_back_to_config() {
    let original = std::env::var(DATABASE_ENV_VAR).ok();
    std::env::remove_var(DATABASE_ENV_VAR);
    let config = EvolveConfig::from_yaml("database:\n  path: cfg.duckdb").unwrap();
    assert_eq!(config.resolve_database(None), "cfg.duckdb");
    if let Some(v) = original {
        std::env::set_var(DATABASE_ENV_VAR, v);
    }
}
