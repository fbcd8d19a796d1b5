use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use scheduler_errors::{SchedulerError, SchedulerResult};
use serde::{Deserialize, Serialize};

use crate::ports::TaskCallback;

/// 寄存器块的解码格式
///
/// Deserializes through [`FromStr`], so stored names are matched without
/// regard to case (`REAL4`, `Real4`, `float32`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum RegisterFormat {
    /// 单个16位寄存器, 原样返回
    #[default]
    Int16,
    /// 两个寄存器, 有符号32位整数
    Int32,
    /// 两个寄存器, IEEE-754 单精度
    Float32,
    /// 四个寄存器, IEEE-754 双精度
    Float64,
}

impl RegisterFormat {
    /// Number of 16-bit words the format consumes.
    pub fn register_count(&self) -> usize {
        match self {
            RegisterFormat::Int16 => 1,
            RegisterFormat::Int32 | RegisterFormat::Float32 => 2,
            RegisterFormat::Float64 => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterFormat::Int16 => "int16",
            RegisterFormat::Int32 => "int32",
            RegisterFormat::Float32 => "float32",
            RegisterFormat::Float64 => "float64",
        }
    }
}

impl FromStr for RegisterFormat {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "int16" | "integer" => Ok(RegisterFormat::Int16),
            "int32" | "long" => Ok(RegisterFormat::Int32),
            "float32" | "real4" => Ok(RegisterFormat::Float32),
            "float64" | "real8" => Ok(RegisterFormat::Float64),
            _ => Err(SchedulerError::InvalidFormat(s.to_string())),
        }
    }
}

impl TryFrom<String> for RegisterFormat {
    type Error = SchedulerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for RegisterFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_register_count() -> u16 {
    1
}

/// 单次设备操作, 序列化后即为持久化记录中的 `modbus_param`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum DeviceOperation {
    Read {
        #[serde(rename = "addr")]
        address: u16,
        #[serde(rename = "nbreg", default = "default_register_count")]
        count: u16,
        #[serde(default)]
        format: RegisterFormat,
    },
    Write {
        #[serde(rename = "addr")]
        address: u16,
        value: u16,
    },
}

impl DeviceOperation {
    pub fn read(address: u16, count: u16, format: RegisterFormat) -> Self {
        DeviceOperation::Read {
            address,
            count,
            format,
        }
    }

    pub fn write(address: u16, value: u16) -> Self {
        DeviceOperation::Write { address, value }
    }

    pub fn address(&self) -> u16 {
        match self {
            DeviceOperation::Read { address, .. } | DeviceOperation::Write { address, .. } => {
                *address
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DeviceOperation::Read { .. } => "read",
            DeviceOperation::Write { .. } => "write",
        }
    }
}

/// Decoded (or written) register value handed to callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegisterValue {
    Integer(i64),
    Float(f64),
}

impl RegisterValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            RegisterValue::Integer(v) => *v as f64,
            RegisterValue::Float(v) => *v,
        }
    }
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterValue::Integer(v) => write!(f, "{v}"),
            RegisterValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// 调度任务。创建后不再修改, 队列和定时器之间以克隆传递。
#[derive(Clone)]
pub struct Task {
    pub id: String,
    pub operation: DeviceOperation,
    pub callback: Option<Arc<dyn TaskCallback>>,
    pub callback_name: Option<String>,
    pub parameters: HashMap<String, serde_json::Value>,
    pub recurrence_seconds: f64,
    pub urgent: bool,
}

impl Task {
    pub fn new<S: Into<String>>(id: S, operation: DeviceOperation) -> Self {
        Self {
            id: id.into(),
            operation,
            callback: None,
            callback_name: None,
            parameters: HashMap::new(),
            recurrence_seconds: 0.0,
            urgent: false,
        }
    }

    pub fn with_callback(mut self, callback: Arc<dyn TaskCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn with_callback_name<S: Into<String>>(mut self, name: S) -> Self {
        self.callback_name = Some(name.into());
        self
    }

    pub fn with_parameter<K: Into<String>>(mut self, key: K, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn with_parameters(mut self, parameters: HashMap<String, serde_json::Value>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn with_recurrence(mut self, seconds: f64) -> Self {
        self.recurrence_seconds = seconds;
        self
    }

    pub fn urgent(mut self, urgent: bool) -> Self {
        self.urgent = urgent;
        self
    }

    pub fn is_periodic(&self) -> bool {
        self.recurrence_seconds > 0.0
    }

    /// Timer interval of a periodic task. `None` for one-shot tasks.
    pub fn recurrence(&self) -> Option<Duration> {
        if self.is_periodic() {
            Duration::try_from_secs_f64(self.recurrence_seconds).ok()
        } else {
            None
        }
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        if self.id.trim().is_empty() {
            return Err(SchedulerError::invalid_params("task id cannot be empty"));
        }
        if !self.recurrence_seconds.is_finite() || self.recurrence_seconds < 0.0 {
            return Err(SchedulerError::invalid_params(format!(
                "task '{}': recurrence must be a finite number >= 0, got {}",
                self.id, self.recurrence_seconds
            )));
        }
        if Duration::try_from_secs_f64(self.recurrence_seconds).is_err() {
            return Err(SchedulerError::invalid_params(format!(
                "task '{}': recurrence {} is out of range",
                self.id, self.recurrence_seconds
            )));
        }
        if let DeviceOperation::Read { count: 0, .. } = self.operation {
            return Err(SchedulerError::invalid_params(format!(
                "task '{}': register count must be positive",
                self.id
            )));
        }
        Ok(())
    }

    pub fn to_persisted(&self) -> PersistedTask {
        PersistedTask {
            task_id: self.id.clone(),
            modbus_param: self.operation.clone(),
            parameters: self.parameters.clone(),
            recurrence: self.recurrence_seconds,
            urgent: self.urgent,
            callback_name: self.callback_name.clone(),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("operation", &self.operation)
            .field("callback_name", &self.callback_name)
            .field("has_callback", &self.callback.is_some())
            .field("parameters", &self.parameters)
            .field("recurrence_seconds", &self.recurrence_seconds)
            .field("urgent", &self.urgent)
            .finish()
    }
}

/// 状态文件中的一条周期任务记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedTask {
    pub task_id: String,
    pub modbus_param: DeviceOperation,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub recurrence: f64,
    #[serde(default)]
    pub urgent: bool,
    pub callback_name: Option<String>,
}

impl PersistedTask {
    /// Rebuild a task around an already-resolved callback handle.
    pub fn into_task(self, callback: Option<Arc<dyn TaskCallback>>) -> Task {
        Task {
            id: self.task_id,
            operation: self.modbus_param,
            callback,
            callback_name: self.callback_name,
            parameters: self.parameters,
            recurrence_seconds: self.recurrence,
            urgent: self.urgent,
        }
    }
}
