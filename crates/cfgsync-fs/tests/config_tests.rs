use cfgsync_fs::{ConfigStore, Error, NormalizedPath};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct TestConfig {
    name: String,
    count: i32,
}

#[test]
fn test_load_toml() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("config.toml");
    fs::write(&file_path, "name = \"test\"\ncount = 42").unwrap();

    let store = ConfigStore::new();
    let config: TestConfig = store.load(&NormalizedPath::new(&file_path)).unwrap();

    assert_eq!(config, TestConfig { name: "test".into(), count: 42 });
}

#[test]
fn test_load_json() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("config.json");
    fs::write(&file_path, r#"{"name": "test", "count": 42}"#).unwrap();

    let store = ConfigStore::new();
    let config: TestConfig = store.load(&NormalizedPath::new(&file_path)).unwrap();

    assert_eq!(config.count, 42);
}

#[test]
fn test_unsupported_extension() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("config.yaml");
    fs::write(&file_path, "name: test").unwrap();

    let result: Result<TestConfig, _> = ConfigStore::new().load(&NormalizedPath::new(&file_path));
    assert!(matches!(result, Err(Error::UnsupportedFormat { .. })));
}

#[test]
fn test_malformed_json_reports_parse_error() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("broken.json");
    fs::write(&file_path, "{ not json").unwrap();

    let result: Result<TestConfig, _> = ConfigStore::new().load(&NormalizedPath::new(&file_path));
    match result {
        Err(Error::ConfigParse { format, .. }) => assert_eq!(format, "JSON"),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn test_load_optional_missing_file() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("absent.toml"));

    let loaded: Option<TestConfig> = ConfigStore::new().load_optional(&path).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn test_save_json_is_reproducible() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("mapping.json"));

    let mut value: BTreeMap<String, BTreeMap<u64, u64>> = BTreeMap::new();
    value.entry("queue".into()).or_default().insert(100, 9100);
    value.entry("schema".into()).or_default().insert(200, 9200);

    let store = ConfigStore::new();
    store.save(&path, &value).unwrap();
    let first = fs::read(path.to_native()).unwrap();
    store.save(&path, &value).unwrap();
    let second = fs::read(path.to_native()).unwrap();

    assert_eq!(first, second);
    assert!(first.ends_with(b"\n"));

    let loaded: BTreeMap<String, BTreeMap<u64, u64>> = store.load(&path).unwrap();
    assert_eq!(loaded, value);
}
