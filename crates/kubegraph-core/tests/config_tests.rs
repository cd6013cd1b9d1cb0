use kubegraph_core::config::{
    DEFAULT_DATA_DIR, DEFAULT_INTAKE_CAPACITY, DEFAULT_LAYOUT_STRATEGY, DEFAULT_MAX_NODES,
    DEFAULT_SNAPSHOTS_DIR,
};
use kubegraph_core::layout::StrategyKind;
use kubegraph_core::{Config, LayoutEngine, LayoutSeed};
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.engine.intake_capacity, DEFAULT_INTAKE_CAPACITY);
    assert_eq!(config.layout.strategy, DEFAULT_LAYOUT_STRATEGY);
    assert_eq!(config.export.max_nodes, DEFAULT_MAX_NODES);
    assert_eq!(
        config.storage.snapshots_path(),
        PathBuf::from(DEFAULT_DATA_DIR).join(DEFAULT_SNAPSHOTS_DIR)
    );
}

#[test]
fn test_default_config_string_parses() {
    let text = Config::default_config_string();
    assert!(text.contains("[engine]"));
    assert!(text.contains("[layout]"));
    assert!(text.contains("[storage]"));
    assert!(text.contains("[export]"));

    let parsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(parsed.engine.max_batch, Config::default().engine.max_batch);
    assert_eq!(parsed.layout.strategy, DEFAULT_LAYOUT_STRATEGY);
}

#[test]
fn test_config_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("kubegraph.toml");
    std::fs::write(
        &path,
        r#"
[layout]
strategy = "layered"
seed = "42"

[storage]
data_dir = ".custom-kubegraph"
max_snapshots = 5
"#,
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.layout.strategy_kind().unwrap(), StrategyKind::Layered);
    assert_eq!(config.layout.seed(), Some(LayoutSeed::from_u64(42)));
    assert_eq!(config.storage.data_dir, ".custom-kubegraph");
    assert_eq!(config.storage.max_snapshots, 5);
    assert_eq!(config.engine.intake_capacity, DEFAULT_INTAKE_CAPACITY);

    let engine = LayoutEngine::from_config(&config.layout).unwrap();
    assert_eq!(engine.kind(), StrategyKind::Layered);
}

#[test]
fn test_invalid_file_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("kubegraph.toml");

    std::fs::write(&path, "[export]\nmax_nodes = 0\n").unwrap();
    assert!(Config::from_file(&path).is_err());

    std::fs::write(&path, "[layout]\nstrategy = \"spiral\"\n").unwrap();
    assert!(Config::from_file(&path).is_err());

    std::fs::write(&path, "[layout\n").unwrap();
    assert!(Config::from_file(&path).is_err());

    assert!(Config::from_file(temp_dir.path().join("missing.toml")).is_err());
}
