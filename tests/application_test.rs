use std::path::Path;
use std::time::Duration;

use device_scheduler::Application;
use scheduler_config::AppConfig;
use tempfile::TempDir;

fn config(data_path: &Path) -> AppConfig {
    AppConfig::from_toml(&format!(
        r#"
        [worker]
        poll_interval_ms = 10

        [storage]
        data_path = "{}"

        [[tasks]]
        label = "Flow rate"
        addr = 1
        nb_reg = 2
        format = "float32"
        recurrence = 60.0
        file = "flow.csv"

        [[tasks]]
        label = "Diameter"
        action = "log"
        op = "write"
        addr = 61
        value = 17
        urgent = true
        "#,
        data_path.display()
    ))
    .unwrap()
}

#[tokio::test]
async fn test_configured_tasks_run_and_record() {
    let dir = TempDir::new().unwrap();
    let app = Application::new(config(dir.path())).unwrap();
    app.device().set_registers(1, &[0x0000, 0x4120]);

    assert_eq!(app.run().await.unwrap(), 2);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(app.device().register(61), 17);
    assert_eq!(app.worker().get_active_task_ids().await, vec!["Flow_rate"]);

    let recorded = std::fs::read_to_string(dir.path().join("flow.csv")).unwrap();
    assert_eq!(recorded.lines().count(), 1);
    assert!(recorded.trim_end().ends_with(",10"));

    app.shutdown().await;
    assert!(!app.worker().is_running());
    assert!(dir.path().join("worker_state.json").exists());
}

#[tokio::test]
async fn test_restart_restores_instead_of_duplicating() {
    let dir = TempDir::new().unwrap();

    let first = Application::new(config(dir.path())).unwrap();
    first.run().await.unwrap();
    first.shutdown().await;

    let second = Application::new(config(dir.path())).unwrap();
    // the periodic task comes back from the state file, only the write is new
    assert_eq!(second.run().await.unwrap(), 1);
    assert_eq!(second.worker().get_active_task_ids().await, vec!["Flow_rate"]);
    second.shutdown().await;
}
