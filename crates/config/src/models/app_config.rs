use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{
    logging::LogConfig,
    tasks::TaskDefinition,
    worker::{StorageConfig, WorkerConfig, DEFAULT_STATE_FILE_NAME},
};
use crate::validation::ConfigValidator;
use crate::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub logging: LogConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [
                "config/device-scheduler.toml",
                "device-scheduler.toml",
                "/etc/device-scheduler/config.toml",
            ];

            let mut config_file_found = false;
            for path in &default_paths {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    config_file_found = true;
                    break;
                }
            }

            if !config_file_found {
                builder = builder
                    .set_default("worker.poll_interval_ms", 50)?
                    .set_default("logging.level", "info")?
                    .set_default("logging.format", "pretty")?
                    .set_default("storage.data_path", "data")?;
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("DEVICE_SCHEDULER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// Explicit `worker.state_file`, or a file inside the data directory.
    pub fn state_file_path(&self) -> PathBuf {
        match &self.worker.state_file {
            Some(path) => PathBuf::from(path),
            None => self.storage.data_dir().join(DEFAULT_STATE_FILE_NAME),
        }
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.worker.validate()?;
        self.storage.validate()?;

        let mut seen = HashSet::new();
        for task in &self.tasks {
            task.validate()?;
            if task.recurrence > 0.0 && !seen.insert(task.task_id()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate periodic task id: {}",
                    task.task_id()
                )));
            }
        }
        Ok(())
    }
}
