use std::io::Write;

use tempfile::NamedTempFile;
use tracing::Level;

use super::*;

#[test]
fn test_defaults_match_constants() {
    let config = AppConfig::default();
    assert_eq!(config.history.max_undo, MAX_UNDO_DEPTH);
    assert_eq!(config.history.max_redo, MAX_REDO_DEPTH);
    assert_eq!(config.level().unwrap(), Level::INFO);
}

#[test]
fn test_empty_toml_uses_defaults() {
    let config = AppConfig::from_toml("").unwrap();
    assert_eq!(config, AppConfig::default());
}

#[test]
fn test_partial_history_table() {
    let config = AppConfig::from_toml("[history]\nmax_undo = 5\n").unwrap();
    assert_eq!(config.history, HistoryLimits::new(5, MAX_REDO_DEPTH));
}

#[test]
fn test_zero_limits_are_allowed() {
    let config = AppConfig::from_toml("[history]\nmax_undo = 0\nmax_redo = 0\n").unwrap();
    assert_eq!(config.history, HistoryLimits::new(0, 0));
}

#[test]
fn test_unknown_log_level_rejected() {
    let err = AppConfig::from_toml("log_level = \"loud\"").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn test_malformed_toml_rejected() {
    let err = AppConfig::from_toml("[history\nmax_undo = ").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_from_file() {
    let mut file = NamedTempFile::with_suffix(".toml").unwrap();
    writeln!(file, "log_level = \"debug\"").unwrap();
    writeln!(file, "[history]").unwrap();
    writeln!(file, "max_undo = 8").unwrap();
    writeln!(file, "max_redo = 4").unwrap();

    let config = AppConfig::from_file(file.path()).unwrap();
    assert_eq!(config.history, HistoryLimits::new(8, 4));
    assert_eq!(config.level().unwrap(), Level::DEBUG);
}

#[test]
fn test_missing_file() {
    let err = AppConfig::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_rendered_config_parses_back() {
    let config = AppConfig {
        log_level: "warn".to_string(),
        history: HistoryLimits::new(5, 2),
    };
    let text = config.to_toml().unwrap();
    assert!(text.contains("max_undo = 5"));
    assert_eq!(AppConfig::from_toml(&text).unwrap(), config);
}
