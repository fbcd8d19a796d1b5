use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use futures::FutureExt;
use scheduler_domain::codec::decode_registers;
use scheduler_domain::entities::{DeviceOperation, RegisterValue, Task};
use scheduler_domain::ports::{CallbackInvocation, DeviceTransport};
use scheduler_domain::CallbackRegistry;
use scheduler_errors::{SchedulerError, SchedulerResult};
use tracing::{debug, error};

/// 回调执行结果
#[derive(Debug)]
pub enum CallbackOutcome {
    /// 任务未附带回调
    Skipped,
    Completed,
    Failed(SchedulerError),
}

#[derive(Debug)]
pub struct ExecutionReport {
    pub task_id: String,
    pub value: Option<RegisterValue>,
    pub duration: Duration,
    pub callback: CallbackOutcome,
}

/// 执行单个设备操作并分发回调。
///
/// Only the worker loop calls this, which is what keeps the transport free of
/// concurrent use.
pub struct TaskExecutionManager {
    transport: Arc<dyn DeviceTransport>,
    registry: Arc<CallbackRegistry>,
}

impl TaskExecutionManager {
    pub fn new(transport: Arc<dyn DeviceTransport>, registry: Arc<CallbackRegistry>) -> Self {
        Self {
            transport,
            registry,
        }
    }

    /// Run the device operation, then the callback.
    ///
    /// Transport and decode failures are returned and no callback is invoked.
    /// Callback failures (errors or panics) are logged and reported in the
    /// [`ExecutionReport`], never returned as `Err`.
    pub async fn execute_task(&self, task: &Task) -> SchedulerResult<ExecutionReport> {
        let started = Instant::now();

        let value = match &task.operation {
            DeviceOperation::Read {
                address,
                count,
                format,
            } => {
                let registers = self.transport.read_registers(*address, *count).await?;
                let value = decode_registers(&registers, *format)?;
                debug!(
                    task_id = %task.id,
                    address,
                    count,
                    ?value,
                    "Device read holding registers"
                );
                value
            }
            DeviceOperation::Write { address, value } => {
                debug!(task_id = %task.id, address, value, "Device write register");
                self.transport.write_register(*address, *value).await?;
                Some(RegisterValue::Integer(i64::from(*value)))
            }
        };
        metrics::counter!("device_tasks_executed_total").increment(1);

        let invocation = CallbackInvocation {
            task_id: task.id.clone(),
            value,
            timestamp: Local::now(),
            parameters: task.parameters.clone(),
        };
        let callback = self.dispatch_callback(task, &invocation).await;

        Ok(ExecutionReport {
            task_id: task.id.clone(),
            value,
            duration: started.elapsed(),
            callback,
        })
    }

    async fn dispatch_callback(&self, task: &Task, invocation: &CallbackInvocation) -> CallbackOutcome {
        let Some(callback) = &task.callback else {
            return CallbackOutcome::Skipped;
        };

        let callback_name = task
            .callback_name
            .clone()
            .or_else(|| self.registry.reverse_lookup(callback))
            .unwrap_or_else(|| "<unregistered>".to_string());

        debug!(
            task_id = %task.id,
            callback = %callback_name,
            timestamp = %invocation.formatted_timestamp(),
            value = ?invocation.value,
            parameters = ?invocation.parameters,
            "Calling callback"
        );

        let message = match AssertUnwindSafe(callback.call(invocation))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => return CallbackOutcome::Completed,
            Ok(Err(e)) => format!("{e:#}"),
            Err(panic) => format!("callback panicked: {}", panic_message(panic.as_ref())),
        };

        metrics::counter!("device_callback_failures_total").increment(1);
        error!(
            task_id = %task.id,
            callback = %callback_name,
            parameters = ?task.parameters,
            "Callback error: {}",
            message
        );
        CallbackOutcome::Failed(SchedulerError::callback_error(
            &task.id,
            &callback_name,
            message,
        ))
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
