use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use scheduler_domain::entities::{PersistedTask, Task};
use scheduler_domain::ports::{DeviceTransport, StateStore};
use scheduler_domain::CallbackRegistry;
use scheduler_errors::{SchedulerError, SchedulerResult};
use scheduler_infrastructure::{JsonFileStateStore, QueueStats, TaskQueue};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::components::{TaskExecutionManager, WorkerLifecycle};
use crate::scheduler::TaskScheduler;

/// 默认空队列轮询间隔
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Worker服务构建器
pub struct WorkerServiceBuilder {
    transport: Arc<dyn DeviceTransport>,
    registry: Arc<CallbackRegistry>,
    state_store: Option<Arc<dyn StateStore>>,
    poll_interval_ms: u64,
}

impl WorkerServiceBuilder {
    /// 创建新的构建器
    pub fn new(transport: Arc<dyn DeviceTransport>) -> Self {
        Self {
            transport,
            registry: Arc::new(CallbackRegistry::new()),
            state_store: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }

    /// 设置回调注册表
    pub fn registry(mut self, registry: Arc<CallbackRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// 设置状态存储
    pub fn state_store(mut self, state_store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(state_store);
        self
    }

    /// 使用JSON文件作为状态存储
    pub fn state_file<P: Into<PathBuf>>(self, path: P) -> Self {
        self.state_store(Arc::new(JsonFileStateStore::new(path)))
    }

    /// 设置轮询间隔
    pub fn poll_interval_ms(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// 构建Worker服务
    pub fn build(self) -> SchedulerResult<WorkerService> {
        if self.poll_interval_ms == 0 {
            return Err(SchedulerError::Configuration(
                "poll interval must be greater than 0".to_string(),
            ));
        }

        let queue = Arc::new(TaskQueue::new());
        let running = Arc::new(AtomicBool::new(true));
        let scheduler = TaskScheduler::new(Arc::clone(&queue), Arc::clone(&running));
        let task_execution_manager = Arc::new(TaskExecutionManager::new(
            self.transport,
            Arc::clone(&self.registry),
        ));
        let lifecycle = WorkerLifecycle::new(
            Arc::clone(&queue),
            task_execution_manager,
            running,
            Duration::from_millis(self.poll_interval_ms),
        );

        Ok(WorkerService {
            queue,
            scheduler,
            lifecycle,
            registry: self.registry,
            state_store: self.state_store,
            persist_lock: Mutex::new(()),
        })
    }
}

/// 设备任务Worker
///
/// Public surface for callers: create and delete tasks, inspect the active
/// set and the pending queue, start and stop the worker. Periodic tasks are
/// written to the state store on every create/delete and replayed from it on
/// [`start`](Self::start).
pub struct WorkerService {
    queue: Arc<TaskQueue>,
    scheduler: TaskScheduler,
    lifecycle: WorkerLifecycle,
    registry: Arc<CallbackRegistry>,
    state_store: Option<Arc<dyn StateStore>>,
    persist_lock: Mutex<()>,
}

impl WorkerService {
    pub fn builder(transport: Arc<dyn DeviceTransport>) -> WorkerServiceBuilder {
        WorkerServiceBuilder::new(transport)
    }

    /// Restore persisted periodic tasks, then start the worker loop.
    pub async fn start(&self) -> SchedulerResult<()> {
        if self.lifecycle.is_started() {
            return Err(SchedulerError::Internal(
                "Worker service already running".to_string(),
            ));
        }
        let restored = self.restore_state().await;
        if restored > 0 {
            info!("Restored {} periodic tasks", restored);
        }
        self.lifecycle.start().await
    }

    pub async fn create_task(&self, task: Task) -> SchedulerResult<bool> {
        self.create_task_with(task, true).await
    }

    /// Submit a task. Returns `Ok(false)` when a periodic task with the same
    /// id is already active; the request is then ignored. With `persist` the
    /// periodic set is written to the state store afterwards.
    pub async fn create_task_with(&self, mut task: Task, persist: bool) -> SchedulerResult<bool> {
        self.bind_callback(&mut task);
        let task_id = task.id.clone();

        match self.scheduler.schedule(task).await {
            Ok(()) => {}
            Err(SchedulerError::DuplicateTask { id }) => {
                warn!(task_id = %id, "Task already exists, ignoring create request");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        if persist {
            info!(task_id = %task_id, "Task created, saving state");
            self.persist_state().await;
        } else {
            debug!(task_id = %task_id, "Task created");
        }
        Ok(true)
    }

    // Fill in whichever half of the callback name/handle pair is missing.
    fn bind_callback(&self, task: &mut Task) {
        match (&task.callback, &task.callback_name) {
            (Some(callback), None) => {
                task.callback_name = self.registry.reverse_lookup(callback);
                if task.callback_name.is_none() && task.is_periodic() {
                    warn!(
                        task_id = %task.id,
                        "Callback is not registered, task will not be restorable after restart"
                    );
                }
            }
            (None, Some(name)) => {
                task.callback = self.registry.resolve(name);
                if task.callback.is_none() {
                    warn!(task_id = %task.id, callback = %name, "Unknown callback name");
                }
            }
            _ => {}
        }
    }

    pub async fn delete_task(&self, task: &Task) -> bool {
        self.delete_task_by_id(&task.id).await
    }

    /// Cancel a task's future firings and persist the remaining set. Unknown
    /// ids are a no-op. Returns whether the id was active.
    pub async fn delete_task_by_id(&self, task_id: &str) -> bool {
        let removed = self.scheduler.cancel(task_id).await;
        info!(task_id = %task_id, removed, "Task stopped, saving state");
        self.persist_state().await;
        removed
    }

    /// Cancel every timer and stop the worker loop. Pending queue entries are
    /// abandoned; a task already executing finishes first.
    pub async fn stop(&self) {
        self.scheduler.stop().await;
        self.lifecycle.join().await;
        info!("Worker stopped");
    }

    pub async fn get_active_task_ids(&self) -> Vec<String> {
        self.scheduler.active_task_ids().await
    }

    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_started() && self.scheduler.is_running()
    }

    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    /// 保存周期任务状态。失败只记录日志, 不影响内存中的调度。
    async fn persist_state(&self) {
        let Some(store) = &self.state_store else {
            return;
        };

        let _guard = self.persist_lock.lock().await;
        let records: Vec<PersistedTask> = self
            .scheduler
            .periodic_snapshot()
            .await
            .iter()
            .map(Task::to_persisted)
            .collect();

        if let Err(e) = store.save(&records).await {
            error!("Error saving worker state: {}", e);
        }
    }

    /// 从状态存储恢复周期任务, 返回恢复的任务数
    async fn restore_state(&self) -> usize {
        let Some(store) = &self.state_store else {
            return 0;
        };

        let records = match store.load().await {
            Ok(records) => records,
            Err(e) => {
                error!("Error loading worker state: {}", e);
                return 0;
            }
        };

        let mut restored = 0;
        for record in records {
            let task_id = record.task_id.clone();
            let Some(name) = record.callback_name.clone() else {
                warn!(task_id = %task_id, "No callback name recorded, skipping");
                continue;
            };
            let Some(callback) = self.registry.resolve(&name) else {
                warn!(task_id = %task_id, callback = %name, "Unknown callback, skipping");
                continue;
            };

            match self
                .create_task_with(record.into_task(Some(callback)), false)
                .await
            {
                Ok(true) => {
                    info!(task_id = %task_id, callback = %name, "Restored task");
                    restored += 1;
                }
                Ok(false) => {}
                Err(e) => error!(task_id = %task_id, "Error restoring task: {}", e),
            }
        }
        restored
    }
}

impl Drop for WorkerService {
    fn drop(&mut self) {
        // detached timer and loop tasks exit on their next check
        self.scheduler.halt();
    }
}
