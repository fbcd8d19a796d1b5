use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("无效的寄存器格式: {0}")]
    InvalidFormat(String),
    #[error("寄存器数量不足: 格式 {format} 需要 {expected} 个寄存器, 实际 {actual} 个")]
    InsufficientRegisters {
        format: String,
        expected: usize,
        actual: usize,
    },
    #[error("设备通信错误: {0}")]
    Transport(String),
    #[error("回调执行错误 [{callback}] 任务 {task_id}: {message}")]
    Callback {
        task_id: String,
        callback: String,
        message: String,
    },
    #[error("状态持久化错误: {0}")]
    Persistence(String),
    #[error("周期任务已存在: {id}")]
    DuplicateTask { id: String },
    #[error("无效的任务参数: {0}")]
    InvalidTaskParams(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

impl SchedulerError {
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }
    pub fn persistence<S: Into<String>>(msg: S) -> Self {
        Self::Persistence(msg.into())
    }
    pub fn invalid_params<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTaskParams(msg.into())
    }
    pub fn duplicate_task<S: Into<String>>(id: S) -> Self {
        Self::DuplicateTask { id: id.into() }
    }
    pub fn callback_error<S: Into<String>>(task_id: &str, callback: &str, msg: S) -> Self {
        Self::Callback {
            task_id: task_id.to_string(),
            callback: callback.to_string(),
            message: msg.into(),
        }
    }
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SchedulerError::Internal(_)
                | SchedulerError::Configuration(_)
                | SchedulerError::InvalidFormat(_)
        )
    }
    /// 设备或磁盘的瞬时故障。调度器本身不做自动重试, 周期任务会在下一次触发时再次执行。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SchedulerError::Transport(_) | SchedulerError::Persistence(_)
        )
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SchedulerError {
    fn from(err: std::io::Error) -> Self {
        SchedulerError::Persistence(err.to_string())
    }
}

impl From<anyhow::Error> for SchedulerError {
    fn from(err: anyhow::Error) -> Self {
        SchedulerError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests;
