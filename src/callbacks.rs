use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scheduler_domain::ports::{CallbackInvocation, TaskCallback};
use scheduler_domain::CallbackRegistry;
use tokio::io::AsyncWriteExt;
use tracing::info;

pub const RECORD_AND_LOG: &str = "record_and_log";
pub const LOG_VALUE: &str = "log_value";

/// 追加 `timestamp,value` 行到数据目录下的记录文件, 然后记录日志
pub struct RecordAndLog {
    data_dir: PathBuf,
}

impl RecordAndLog {
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[async_trait]
impl TaskCallback for RecordAndLog {
    async fn call(&self, invocation: &CallbackInvocation) -> Result<()> {
        let file = invocation
            .parameter_str("file")
            .with_context(|| format!("task '{}' has no 'file' parameter", invocation.task_id))?;
        invocation
            .parameter_str("target_id")
            .with_context(|| format!("task '{}' has no 'target_id' parameter", invocation.task_id))?;

        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .with_context(|| format!("创建数据目录失败: {}", self.data_dir.display()))?;

        let path = self.data_dir.join(&file);
        let value = invocation
            .value
            .map(|value| value.to_string())
            .unwrap_or_else(|| "None".to_string());
        let line = format!("{},{}\n", invocation.formatted_timestamp(), value);

        let mut handle = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("打开记录文件失败: {}", path.display()))?;
        handle
            .write_all(line.as_bytes())
            .await
            .with_context(|| format!("写入记录文件失败: {}", path.display()))?;

        log_value(invocation)
    }
}

pub fn log_value(invocation: &CallbackInvocation) -> Result<()> {
    let value = invocation
        .value
        .map(|value| value.to_string())
        .unwrap_or_else(|| "none".to_string());
    info!(
        task_id = %invocation.task_id,
        target_id = %invocation.parameter_str("target_id").unwrap_or_default(),
        timestamp = %invocation.formatted_timestamp(),
        "Device result: {}",
        value
    );
    Ok(())
}

/// Register the built-in callbacks under their configuration names.
pub fn register_builtin(registry: &CallbackRegistry, data_dir: &Path) {
    registry.register(RECORD_AND_LOG, Arc::new(RecordAndLog::new(data_dir)));
    registry.register_fn(LOG_VALUE, log_value);
}
