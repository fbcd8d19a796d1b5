use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use scheduler_errors::{SchedulerError, SchedulerResult};
use scheduler_infrastructure::TaskQueue;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::task_execution::panic_message;
use super::TaskExecutionManager;

/// 单消费者 worker 循环
///
/// Pops from the head of the queue and executes one task at a time. An
/// empty queue is polled again after `poll_interval`. The loop exits once
/// the shared running flag is cleared; a task already popped still runs to
/// completion first.
pub struct WorkerLifecycle {
    queue: Arc<TaskQueue>,
    task_execution_manager: Arc<TaskExecutionManager>,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl WorkerLifecycle {
    pub fn new(
        queue: Arc<TaskQueue>,
        task_execution_manager: Arc<TaskExecutionManager>,
        running: Arc<AtomicBool>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            task_execution_manager,
            running,
            poll_interval,
            loop_handle: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    pub async fn start(&self) -> SchedulerResult<()> {
        let mut loop_handle = self.loop_handle.lock().await;
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::Internal(
                "Worker loop already started".to_string(),
            ));
        }
        if !self.running.load(Ordering::SeqCst) {
            return Err(SchedulerError::Internal(
                "Worker has been stopped and cannot be restarted".to_string(),
            ));
        }

        let queue = Arc::clone(&self.queue);
        let manager = Arc::clone(&self.task_execution_manager);
        let running = Arc::clone(&self.running);
        let poll_interval = self.poll_interval;

        *loop_handle = Some(tokio::spawn(async move {
            Self::run_loop(queue, manager, running, poll_interval).await;
        }));
        info!("Worker started, poll interval {:?}", self.poll_interval);
        Ok(())
    }

    async fn run_loop(
        queue: Arc<TaskQueue>,
        manager: Arc<TaskExecutionManager>,
        running: Arc<AtomicBool>,
        poll_interval: Duration,
    ) {
        while running.load(Ordering::SeqCst) {
            let Some(task) = queue.pop_front() else {
                tokio::time::sleep(poll_interval).await;
                continue;
            };

            match AssertUnwindSafe(manager.execute_task(&task))
                .catch_unwind()
                .await
            {
                Ok(Ok(report)) => {
                    debug!(
                        task_id = %report.task_id,
                        value = ?report.value,
                        "Task finished in {:?}",
                        report.duration
                    );
                }
                Ok(Err(e)) => {
                    metrics::counter!("device_tasks_failed_total").increment(1);
                    error!(
                        task_id = %task.id,
                        operation = task.operation.kind(),
                        address = task.operation.address(),
                        retryable = e.is_retryable(),
                        "Error executing task: {}",
                        e
                    );
                }
                Err(panic) => {
                    metrics::counter!("device_tasks_failed_total").increment(1);
                    error!(
                        task_id = %task.id,
                        "Task execution panicked: {}",
                        panic_message(panic.as_ref())
                    );
                }
            }
        }
        info!("Worker loop stopped");
    }

    /// Wait for the loop to exit. Callers clear the running flag first.
    pub async fn join(&self) {
        let handle = self.loop_handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Worker loop terminated abnormally: {}", e);
            }
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}
