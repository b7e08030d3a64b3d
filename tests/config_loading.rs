use std::io::Write;

use grafsim_core::config::AppConfig;
use grafsim_core::error::GrafsimError;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[simulation]
tick_ms = 50
max_ticks = 200
ticks_per_scenario = 4

[analysis]
warnings_as_errors = true

[log]
filter = "grafsim=debug"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.simulation.tick_ms, 50);
    assert_eq!(config.simulation.max_ticks, 200);
    assert_eq!(config.simulation.ticks_per_scenario, 4);
    assert!(config.analysis.warnings_as_errors);
    assert_eq!(config.log.filter.as_deref(), Some("grafsim=debug"));
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("GRAFSIM_TEST_LOG_FILTER", "grafsim_engine=trace");

    let toml_content = r#"
[log]
filter = "${GRAFSIM_TEST_LOG_FILTER}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.log.filter.as_deref(), Some("grafsim_engine=trace"));

    std::env::remove_var("GRAFSIM_TEST_LOG_FILTER");
}

#[test]
fn test_empty_config_uses_defaults() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"").expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.simulation.tick_ms, 100);
    assert_eq!(config.simulation.max_ticks, 1000);
    assert_eq!(config.simulation.ticks_per_scenario, 1);
    assert!(!config.analysis.warnings_as_errors);
    assert!(config.log.filter.is_none());
}

#[test]
fn test_zero_tick_period_rejected() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[simulation]\ntick_ms = 0\n").expect("write toml");

    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(matches!(err, GrafsimError::Config(_)));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("grafsim.toml");

    assert!(matches!(
        AppConfig::load(&path),
        Err(GrafsimError::ConfigNotFound(_))
    ));
    let config = AppConfig::load_or_default(&path).expect("defaults");
    assert_eq!(config.simulation.tick_ms, 100);
}
