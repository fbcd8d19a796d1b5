use std::io::Write;

use crate::models::{AppConfig, LogLevel};
use crate::{ConfigError, ConfigValidator};

#[test]
fn test_load_from_file_with_env_override() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[worker]
poll_interval_ms = 100

[logging]
level = "warn"

[[tasks]]
label = "Level"
action = "log"
addr = 3
recurrence = 10.0
"#
    )
    .unwrap();

    std::env::set_var("DEVICE_SCHEDULER_WORKER__POLL_INTERVAL_MS", "75");
    let config = AppConfig::load(file.path().to_str());
    std::env::remove_var("DEVICE_SCHEDULER_WORKER__POLL_INTERVAL_MS");

    let config = config.unwrap();
    assert_eq!(config.worker.poll_interval_ms, 75);
    assert_eq!(config.logging.level, LogLevel::Warn);
    assert_eq!(config.tasks.len(), 1);
    assert_eq!(config.tasks[0].task_id(), "Level");
}

#[test]
fn test_validation_error_names_field() {
    let mut config = AppConfig::default();
    config.storage.data_path = " ".to_string();

    match config.validate() {
        Err(ConfigError::Validation(message)) => assert!(message.contains("storage.data_path")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_parse_error_conversion() {
    let err: ConfigError = toml::from_str::<AppConfig>("worker = 3").unwrap_err().into();
    assert!(matches!(err, ConfigError::Parse(_)));
}
