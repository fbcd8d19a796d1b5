use std::sync::Arc;

use anyhow::{Context, Result};
use scheduler_config::AppConfig;
use scheduler_domain::{CallbackRegistry, DeviceTransport};
use scheduler_infrastructure::SimulatedDevice;
use scheduler_worker::WorkerService;
use tracing::{error, info, warn};

use crate::callbacks::register_builtin;

/// 主应用程序
///
/// Wires the device transport, the built-in callbacks and the worker from an
/// [`AppConfig`], then submits the configured tasks on [`run`](Self::run).
pub struct Application {
    config: AppConfig,
    device: Arc<SimulatedDevice>,
    worker: WorkerService,
}

impl Application {
    /// 创建新的应用实例
    pub fn new(config: AppConfig) -> Result<Self> {
        let registry = Arc::new(CallbackRegistry::new());
        register_builtin(&registry, &config.storage.data_dir());

        let device = Arc::new(SimulatedDevice::new());
        let state_file = config.state_file_path();
        info!("状态文件: {}", state_file.display());

        let transport: Arc<dyn DeviceTransport> = device.clone();
        let worker = WorkerService::builder(transport)
            .registry(registry)
            .state_file(state_file)
            .poll_interval_ms(config.worker.poll_interval_ms)
            .build()
            .context("创建Worker服务失败")?;

        Ok(Self {
            config,
            device,
            worker,
        })
    }

    /// Start the worker (restoring persisted tasks first), then submit every
    /// task declared in the configuration. Returns how many were accepted.
    pub async fn run(&self) -> Result<usize> {
        self.worker.start().await.context("启动Worker失败")?;

        let mut accepted = 0;
        for definition in &self.config.tasks {
            let task = match definition.to_task() {
                Ok(task) => task,
                Err(e) => {
                    error!(label = %definition.label, "Invalid task definition: {}", e);
                    continue;
                }
            };
            let task_id = task.id.clone();
            match self.worker.create_task(task).await {
                Ok(true) => accepted += 1,
                Ok(false) => {
                    info!(task_id = %task_id, "Task already restored from state file");
                }
                Err(e) => warn!(task_id = %task_id, "Error creating task: {}", e),
            }
        }

        info!(
            "Worker running, {} configured tasks submitted, active: {:?}",
            accepted,
            self.worker.get_active_task_ids().await
        );
        Ok(accepted)
    }

    pub async fn shutdown(&self) {
        info!("开始关闭应用...");
        self.worker.stop().await;
    }

    pub fn worker(&self) -> &WorkerService {
        &self.worker
    }

    pub fn device(&self) -> &Arc<SimulatedDevice> {
        &self.device
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
