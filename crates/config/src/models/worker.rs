use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::validation::{ensure, ConfigValidator};
use crate::ConfigResult;

/// 默认状态文件名, 位于数据目录下
pub const DEFAULT_STATE_FILE_NAME: &str = "worker_state.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkerConfig {
    /// 空队列轮询间隔(毫秒)
    pub poll_interval_ms: u64,
    /// 周期任务状态文件; 未设置时放在数据目录下
    pub state_file: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            state_file: None,
        }
    }
}

impl ConfigValidator for WorkerConfig {
    fn validate(&self) -> ConfigResult<()> {
        ensure(
            self.poll_interval_ms > 0,
            "worker.poll_interval_ms",
            "must be greater than 0",
        )?;
        if let Some(state_file) = &self.state_file {
            ensure(
                !state_file.trim().is_empty(),
                "worker.state_file",
                "cannot be empty",
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// 记录文件目录
    pub data_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_path: "data".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_path)
    }
}

impl ConfigValidator for StorageConfig {
    fn validate(&self) -> ConfigResult<()> {
        ensure(
            !self.data_path.trim().is_empty(),
            "storage.data_path",
            "cannot be empty",
        )
    }
}
