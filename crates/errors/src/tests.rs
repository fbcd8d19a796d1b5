use crate::*;

#[test]
fn test_scheduler_error_display() {
    let format_error = SchedulerError::InvalidFormat("REAL16".to_string());
    assert_eq!(format_error.to_string(), "无效的寄存器格式: REAL16");

    let transport_error = SchedulerError::transport("timeout on /dev/ttyUSB0");
    assert_eq!(
        transport_error.to_string(),
        "设备通信错误: timeout on /dev/ttyUSB0"
    );

    let duplicate = SchedulerError::duplicate_task("flow_read");
    assert_eq!(duplicate.to_string(), "周期任务已存在: flow_read");

    let callback = SchedulerError::callback_error("flow_read", "record_and_log", "disk full");
    assert_eq!(
        callback.to_string(),
        "回调执行错误 [record_and_log] 任务 flow_read: disk full"
    );

    let short = SchedulerError::InsufficientRegisters {
        format: "float64".to_string(),
        expected: 4,
        actual: 2,
    };
    assert_eq!(
        short.to_string(),
        "寄存器数量不足: 格式 float64 需要 4 个寄存器, 实际 2 个"
    );
}

#[test]
fn test_is_fatal() {
    assert!(SchedulerError::Internal("Critical error".to_string()).is_fatal());
    assert!(SchedulerError::Configuration("Invalid config".to_string()).is_fatal());
    assert!(SchedulerError::InvalidFormat("REAL16".to_string()).is_fatal());

    assert!(!SchedulerError::transport("no response").is_fatal());
    assert!(!SchedulerError::persistence("read-only fs").is_fatal());
    assert!(!SchedulerError::duplicate_task("a").is_fatal());
}

#[test]
fn test_is_retryable() {
    assert!(SchedulerError::transport("no response").is_retryable());
    assert!(SchedulerError::persistence("read-only fs").is_retryable());

    assert!(!SchedulerError::invalid_params("count must be positive").is_retryable());
    assert!(!SchedulerError::duplicate_task("a").is_retryable());
    assert!(!SchedulerError::InvalidFormat("REAL16".to_string()).is_retryable());
}

#[test]
fn test_error_conversions() {
    let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let scheduler_error: SchedulerError = json_error.into();
    assert!(matches!(scheduler_error, SchedulerError::Serialization(_)));

    let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let scheduler_error: SchedulerError = io_error.into();
    assert!(matches!(scheduler_error, SchedulerError::Persistence(_)));

    let anyhow_error = anyhow::anyhow!("boom");
    let scheduler_error: SchedulerError = anyhow_error.into();
    assert!(matches!(scheduler_error, SchedulerError::Internal(_)));
}
