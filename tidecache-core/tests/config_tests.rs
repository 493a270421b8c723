// Configuration Tests
// YAML loading, defaults and validation of cluster configs

use std::fs;
use std::time::Duration;
use tidecache::{CacheFileConfig, LoggingConfig, MergeStrategy, SchedulePolicy};

const SAMPLE: &str = r#"
logging:
  level: debug
  format: json
clusters:
  workspace:
    allow: [projects, members]
    merge_strategy: merge-deep
    persistence_name: "workspace:cache"
    timestamps_name: "workspace:stamps"
    headers_name: "workspace:headers"
    schedule_policy: coalesce
  minimal:
    persistence_name: "minimal:cache"
"#;

#[test]
fn test_config_from_yaml() {
    let config = CacheFileConfig::from_yaml_str(SAMPLE).unwrap();

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "json");

    let workspace = config.cluster("workspace").unwrap();
    assert_eq!(workspace.allow, vec!["projects", "members"]);
    assert_eq!(workspace.merge_strategy, Some(MergeStrategy::MergeDeep));
    assert_eq!(workspace.schedule_policy, SchedulePolicy::Coalesce);
    assert_eq!(workspace.slots().timestamps.as_deref(), Some("workspace:stamps"));
}

#[test]
fn test_config_defaults_for_minimal_cluster() {
    let config = CacheFileConfig::from_yaml_str(SAMPLE).unwrap();
    let minimal = config.cluster("minimal").unwrap();

    assert!(minimal.allow.is_empty());
    assert!(minimal.merge_strategy.is_none());
    assert!(minimal.timestamps_name.is_none());
    assert!(minimal.headers_name.is_none());
    assert_eq!(minimal.persist_delay(), Duration::from_millis(100));
    assert_eq!(minimal.headers_delay(), Duration::from_millis(1000));
    assert_eq!(minimal.schedule_policy, SchedulePolicy::Queue);
}

#[test]
fn test_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.yml");
    fs::write(&path, SAMPLE).unwrap();

    let config = CacheFileConfig::from_file(&path).unwrap();
    assert_eq!(config.clusters.len(), 2);
}

#[test]
fn test_config_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(CacheFileConfig::from_file(dir.path().join("absent.yml")).is_err());
}

#[test]
fn test_config_rejects_invalid_cluster() {
    let yaml = r#"
clusters:
  broken:
    persistence_name: "same"
    timestamps_name: "same"
"#;
    let err = CacheFileConfig::from_yaml_str(yaml).unwrap_err();
    assert!(err.to_string().contains("broken"));
}

#[test]
fn test_config_rejects_unknown_merge_strategy() {
    let yaml = r#"
clusters:
  odd:
    persistence_name: "odd"
    merge_strategy: sideways
"#;
    assert!(CacheFileConfig::from_yaml_str(yaml).is_err());
}

#[test]
fn test_logging_defaults() {
    let config = CacheFileConfig::from_yaml_str("clusters: {}").unwrap();
    assert_eq!(config.logging, LoggingConfig::default());
    assert_eq!(config.logging.level, "info");
}
