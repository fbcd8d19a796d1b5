use std::collections::HashMap;

use scheduler_domain::entities::{DeviceOperation, RegisterFormat, Task};
use serde::{Deserialize, Serialize};

use crate::validation::{ensure, ConfigValidator};
use crate::{ConfigError, ConfigResult};

/// 任务完成后调用的内置回调
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// 追加到数据文件并记录日志
    #[default]
    Record,
    /// 仅记录日志
    Log,
}

impl ActionKind {
    pub fn callback_name(&self) -> &'static str {
        match self {
            ActionKind::Record => "record_and_log",
            ActionKind::Log => "log_value",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[default]
    Read,
    Write,
}

fn default_register_count() -> u16 {
    1
}

/// 配置文件中声明的启动任务
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDefinition {
    pub label: String,
    #[serde(default)]
    pub action: ActionKind,
    #[serde(default)]
    pub op: OperationKind,
    pub addr: u16,
    #[serde(default = "default_register_count", alias = "nbReg")]
    pub nb_reg: u16,
    #[serde(default)]
    pub format: RegisterFormat,
    /// 写操作的寄存器值
    #[serde(default)]
    pub value: Option<u16>,
    /// 周期(秒), 0 表示只执行一次
    #[serde(default)]
    pub recurrence: f64,
    #[serde(default)]
    pub urgent: bool,
    /// 记录文件名, 相对于 `storage.data_path`
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

impl TaskDefinition {
    /// Labels may contain spaces; ids may not.
    pub fn task_id(&self) -> String {
        self.label.replace(' ', "_")
    }

    pub fn operation(&self) -> ConfigResult<DeviceOperation> {
        match self.op {
            OperationKind::Read => Ok(DeviceOperation::read(self.addr, self.nb_reg, self.format)),
            OperationKind::Write => {
                let value = self.value.ok_or_else(|| {
                    ConfigError::Validation(format!(
                        "task '{}': write operation requires a value",
                        self.label
                    ))
                })?;
                Ok(DeviceOperation::write(self.addr, value))
            }
        }
    }

    /// Build the scheduler task. The callback is referenced by name and is
    /// bound against the registry when the task is submitted.
    pub fn to_task(&self) -> ConfigResult<Task> {
        self.validate()?;
        let task_id = self.task_id();

        let mut parameters = self.parameters.clone();
        parameters.insert("label".to_string(), self.label.clone().into());
        parameters.insert(
            "target_id".to_string(),
            self.target_id.clone().unwrap_or_else(|| task_id.clone()).into(),
        );
        if let Some(file) = &self.file {
            parameters.insert("file".to_string(), file.clone().into());
        }

        Ok(Task::new(task_id, self.operation()?)
            .with_callback_name(self.action.callback_name())
            .with_parameters(parameters)
            .with_recurrence(self.recurrence)
            .urgent(self.urgent))
    }
}

impl ConfigValidator for TaskDefinition {
    fn validate(&self) -> ConfigResult<()> {
        ensure(!self.label.trim().is_empty(), "tasks.label", "cannot be empty")?;
        ensure(
            self.recurrence.is_finite() && self.recurrence >= 0.0,
            &format!("tasks.{}.recurrence", self.label),
            "must be a finite number >= 0",
        )?;

        match self.op {
            OperationKind::Read => ensure(
                usize::from(self.nb_reg) >= self.format.register_count(),
                &format!("tasks.{}.nb_reg", self.label),
                &format!(
                    "format {} needs at least {} registers",
                    self.format,
                    self.format.register_count()
                ),
            )?,
            OperationKind::Write => ensure(
                self.value.is_some(),
                &format!("tasks.{}.value", self.label),
                "required for write operations",
            )?,
        }

        if self.action == ActionKind::Record {
            ensure(
                self.file.as_deref().is_some_and(|f| !f.trim().is_empty()),
                &format!("tasks.{}.file", self.label),
                "required for record actions",
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> TaskDefinition {
        TaskDefinition {
            label: "Flow rate".to_string(),
            action: ActionKind::Record,
            op: OperationKind::Read,
            addr: 1,
            nb_reg: 2,
            format: RegisterFormat::Float32,
            value: None,
            recurrence: 5.0,
            urgent: false,
            file: Some("flow.csv".to_string()),
            target_id: None,
            parameters: HashMap::new(),
        }
    }

    #[test]
    fn test_to_task() {
        let task = definition().to_task().unwrap();
        assert_eq!(task.id, "Flow_rate");
        assert_eq!(task.operation, DeviceOperation::read(1, 2, RegisterFormat::Float32));
        assert_eq!(task.callback_name.as_deref(), Some("record_and_log"));
        assert_eq!(task.parameters["file"], "flow.csv");
        assert_eq!(task.parameters["target_id"], "Flow_rate");
        assert_eq!(task.parameters["label"], "Flow rate");
        assert_eq!(task.recurrence_seconds, 5.0);
        assert!(task.callback.is_none());
    }

    #[test]
    fn test_record_requires_file() {
        let mut def = definition();
        def.file = None;
        assert!(def.to_task().is_err());

        def.action = ActionKind::Log;
        assert_eq!(
            def.to_task().unwrap().callback_name.as_deref(),
            Some("log_value")
        );
    }

    #[test]
    fn test_write_requires_value() {
        let mut def = definition();
        def.op = OperationKind::Write;
        assert!(def.validate().is_err());

        def.value = Some(17);
        assert_eq!(
            def.to_task().unwrap().operation,
            DeviceOperation::write(1, 17)
        );
    }

    #[test]
    fn test_register_count_must_fit_format() {
        let mut def = definition();
        def.format = RegisterFormat::Float64;
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_negative_recurrence_rejected() {
        let mut def = definition();
        def.recurrence = -1.0;
        assert!(def.validate().is_err());
    }
}
