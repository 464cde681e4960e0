//! Tests for configuration loading.

use dbcalc::autosize::SearchConfig;
use dbcalc::config::Config;
use dbcalc::types::OutputFormat;
use std::fs;
use tempfile::tempdir;

fn sample_config_toml() -> &'static str {
    r#"
address = "127.0.0.1"
port = 9090
search_floor = 60
search_step = 20
max_search_iterations = 200
recalculate_explicit = false
default_output = "json"
"#
}

#[test]
fn test_load_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, sample_config_toml()).unwrap();

    let cfg = Config::load(Some(path)).unwrap();
    assert_eq!(cfg.address, "127.0.0.1");
    assert_eq!(cfg.port, 9090);
    assert_eq!(cfg.search_floor, 60);
    assert_eq!(cfg.search_step, 20);
    assert_eq!(cfg.max_search_iterations, 200);
    assert!(!cfg.recalculate_explicit);
    assert_eq!(cfg.default_output, OutputFormat::Json);
    assert_eq!(cfg.bind_addr(), "127.0.0.1:9090");
}

#[test]
fn test_partial_file_keeps_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "port = 8181\n").unwrap();

    let cfg = Config::load(Some(path)).unwrap();
    let defaults = Config::default();
    assert_eq!(cfg.port, 8181);
    assert_eq!(cfg.address, defaults.address);
    assert_eq!(cfg.search_step, defaults.search_step);
    assert_eq!(cfg.default_output, OutputFormat::Human);
}

#[test]
fn test_defaults_match_search_defaults() {
    let cfg = Config::default();
    assert_eq!(cfg.address, "0.0.0.0");
    assert_eq!(cfg.port, 8080);
    assert!(cfg.recalculate_explicit);
    assert_eq!(cfg.search(), SearchConfig::default());
}

#[test]
fn test_search_config_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, sample_config_toml()).unwrap();

    let search = Config::load(Some(path)).unwrap().search();
    assert_eq!(search.floor, 60);
    assert_eq!(search.step, 20);
    assert_eq!(search.max_iterations, 200);
    assert!(!search.recalculate_explicit);
}

#[test]
fn test_invalid_output_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "default_output = \"xml\"\n").unwrap();
    assert!(Config::load(Some(path)).is_err());
}

#[test]
fn test_zero_step_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "search_step = 0\n").unwrap();
    let err = Config::load(Some(path)).unwrap_err();
    assert!(err.to_string().contains("search_step"));
}

#[test]
fn test_missing_file_errors() {
    let dir = tempdir().unwrap();
    assert!(Config::load(Some(dir.path().join("absent.toml"))).is_err());
}

#[test]
fn test_malformed_toml_errors() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "port = \"not a number\"\n").unwrap();
    assert!(Config::load(Some(path)).is_err());
}
