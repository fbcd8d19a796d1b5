use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use scheduler_errors::SchedulerResult;

use crate::entities::{PersistedTask, RegisterValue};

/// 设备传输层 (串口/寄存器协议客户端)
///
/// 调度器保证同一时刻只有一个操作在进行, 实现无需可重入。
/// 连接管理、重试和线协议都由实现方负责。
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    async fn read_registers(&self, address: u16, count: u16) -> SchedulerResult<Vec<u16>>;

    async fn write_register(&self, address: u16, value: u16) -> SchedulerResult<()>;
}

/// Arguments handed to a callback once a task completes.
#[derive(Debug, Clone)]
pub struct CallbackInvocation {
    pub task_id: String,
    pub value: Option<RegisterValue>,
    pub timestamp: DateTime<Local>,
    pub parameters: HashMap<String, serde_json::Value>,
}

impl CallbackInvocation {
    /// `YYYY-MM-DD HH:MM:SS`, the layout used in recorded data files.
    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    pub fn parameter(&self, key: &str) -> Option<&serde_json::Value> {
        self.parameters.get(key)
    }

    /// String parameter lookup; non-string JSON values are rendered as JSON.
    pub fn parameter_str(&self, key: &str) -> Option<String> {
        self.parameters.get(key).map(|value| match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

#[async_trait]
pub trait TaskCallback: Send + Sync {
    async fn call(&self, invocation: &CallbackInvocation) -> anyhow::Result<()>;
}

#[async_trait]
impl<F> TaskCallback for F
where
    F: Fn(&CallbackInvocation) -> anyhow::Result<()> + Send + Sync,
{
    async fn call(&self, invocation: &CallbackInvocation) -> anyhow::Result<()> {
        self(invocation)
    }
}

/// 周期任务状态的持久化存储
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save(&self, tasks: &[PersistedTask]) -> SchedulerResult<()>;

    /// Missing state is not an error and yields an empty list.
    async fn load(&self) -> SchedulerResult<Vec<PersistedTask>>;
}
