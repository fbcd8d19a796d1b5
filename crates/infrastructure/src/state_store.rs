use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use scheduler_domain::entities::PersistedTask;
use scheduler_domain::ports::StateStore;
use scheduler_errors::{SchedulerError, SchedulerResult};
use tracing::{debug, info, warn};

/// JSON 文件状态存储
///
/// 文件内容是以任务ID为键的JSON对象。写入时先写同目录下的临时文件再重命名,
/// 进程在写入中途崩溃也不会留下截断的状态文件。
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    async fn save(&self, tasks: &[PersistedTask]) -> SchedulerResult<()> {
        let state: BTreeMap<&str, &PersistedTask> = tasks
            .iter()
            .map(|task| (task.task_id.as_str(), task))
            .collect();
        let body = serde_json::to_string_pretty(&state)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    SchedulerError::persistence(format!(
                        "创建状态目录失败 {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, body.as_bytes()).await.map_err(|e| {
            SchedulerError::persistence(format!("写入临时状态文件失败 {}: {e}", temp.display()))
        })?;
        tokio::fs::rename(&temp, &self.path).await.map_err(|e| {
            SchedulerError::persistence(format!("替换状态文件失败 {}: {e}", self.path.display()))
        })?;

        info!(
            path = %self.path.display(),
            "Saved {} periodic tasks",
            state.len()
        );
        Ok(())
    }

    async fn load(&self) -> SchedulerResult<Vec<PersistedTask>> {
        let body = match tokio::fs::read_to_string(&self.path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No saved state file found");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(SchedulerError::persistence(format!(
                    "读取状态文件失败 {}: {e}",
                    self.path.display()
                )))
            }
        };

        let state: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(&body).map_err(|e| {
                SchedulerError::persistence(format!(
                    "状态文件格式错误 {}: {e}",
                    self.path.display()
                ))
            })?;

        // 单条记录损坏只丢弃该条
        let mut tasks = Vec::with_capacity(state.len());
        for (key, record) in state {
            match serde_json::from_value::<PersistedTask>(record) {
                Ok(task) => tasks.push(task),
                Err(e) => warn!(
                    path = %self.path.display(),
                    task_id = %key,
                    "Skipping unreadable task record: {}",
                    e
                ),
            }
        }

        debug!(path = %self.path.display(), "Loaded {} task records", tasks.len());
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_domain::entities::{DeviceOperation, RegisterFormat};
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn record(id: &str, recurrence: f64) -> PersistedTask {
        PersistedTask {
            task_id: id.to_string(),
            modbus_param: DeviceOperation::read(1, 2, RegisterFormat::Float32),
            parameters: HashMap::from([("operation".to_string(), json!("Flow(l/s)"))]),
            recurrence,
            urgent: false,
            callback_name: Some("record_and_log".to_string()),
        }
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStateStore::new(dir.path().join("TUFState"));

        let tasks = vec![record("flow_read", 2.0), record("velocity_read", 3.0)];
        store.save(&tasks).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, tasks);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStateStore::new(dir.path().join("absent.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_file_is_a_persistence_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ truncated").unwrap();

        let store = JsonFileStateStore::new(&path);
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, SchedulerError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_file_is_keyed_by_task_id() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStateStore::new(dir.path().join("nested").join("state.json"));
        store.save(&[record("flow_read", 2.0)]).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["flow_read"]["task_id"], json!("flow_read"));
        assert_eq!(raw["flow_read"]["modbus_param"]["format"], json!("float32"));
    }

    #[tokio::test]
    async fn test_bad_record_is_skipped_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            r#"{
              "good": {
                "task_id": "good",
                "modbus_param": {"op": "read", "addr": 1, "nbreg": 2, "format": "REAL4"},
                "recurrence": 5.0,
                "callback_name": "cb"
              },
              "mixed_case": {
                "task_id": "mixed_case",
                "modbus_param": {"op": "read", "addr": 3, "nbreg": 2, "format": "Real4"},
                "recurrence": 5.0,
                "callback_name": "cb"
              },
              "unknown_op": {
                "task_id": "unknown_op",
                "modbus_param": {"op": "erase", "addr": 1},
                "recurrence": 5.0,
                "callback_name": "cb"
              },
              "no_operation": {
                "task_id": "no_operation",
                "recurrence": 5.0
              }
            }"#,
        )
        .unwrap();

        let loaded = JsonFileStateStore::new(&path).load().await.unwrap();
        let mut ids: Vec<&str> = loaded.iter().map(|t| t.task_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["good", "mixed_case"]);
    }

    #[tokio::test]
    async fn test_reads_legacy_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("TUFState");
        std::fs::write(
            &path,
            r#"{
              "Flow": {
                "task_id": "Flow",
                "modbus_param": {"op": "read", "addr": 1, "nbreg": 2, "format": "REAL4"},
                "parameters": {"target_id": "status_0", "file": "flow.csv"},
                "recurrence": 5.0,
                "urgent": false,
                "callback_name": "record_and_log"
              }
            }"#,
        )
        .unwrap();

        let loaded = JsonFileStateStore::new(&path).load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(
            loaded[0].modbus_param,
            DeviceOperation::read(1, 2, RegisterFormat::Float32)
        );
        assert_eq!(loaded[0].parameters["file"], json!("flow.csv"));
    }
}
