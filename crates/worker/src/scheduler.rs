use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scheduler_domain::entities::Task;
use scheduler_errors::{SchedulerError, SchedulerResult};
use scheduler_infrastructure::TaskQueue;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 活跃任务表与定时器句柄表, 由同一把锁保护
#[derive(Default)]
struct SchedulerState {
    tasks: HashMap<String, Task>,
    timers: HashMap<String, JoinHandle<()>>,
}

/// 定时调度层
///
/// Every periodic task owns one timer loop. Each pulse sleeps for the task's
/// recurrence, then re-checks under the table lock that the scheduler is
/// still running and the task is still registered before enqueueing. The
/// next interval starts after that pulse, so recurrence is fixed-delay.
pub struct TaskScheduler {
    queue: Arc<TaskQueue>,
    state: Arc<Mutex<SchedulerState>>,
    running: Arc<AtomicBool>,
}

impl TaskScheduler {
    pub fn new(queue: Arc<TaskQueue>, running: Arc<AtomicBool>) -> Self {
        Self {
            queue,
            state: Arc::new(Mutex::new(SchedulerState::default())),
            running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Register a task, dispatch it once right away and, for periodic tasks,
    /// arm its timer. A periodic id that is already active is rejected with
    /// [`SchedulerError::DuplicateTask`] and the existing timer is untouched.
    pub async fn schedule(&self, task: Task) -> SchedulerResult<()> {
        task.validate()?;

        let mut state = self.state.lock().await;
        if task.is_periodic() && state.tasks.contains_key(&task.id) {
            return Err(SchedulerError::duplicate_task(&task.id));
        }

        // 一次性任务不进入活跃任务表, 入队后即由队列持有
        if task.is_periodic() {
            state.tasks.insert(task.id.clone(), task.clone());
        }

        if !self.is_running() {
            warn!(task_id = %task.id, "Scheduler stopped, task recorded but not dispatched");
            return Ok(());
        }

        self.queue.push(task.clone());
        metrics::counter!("device_tasks_enqueued_total").increment(1);

        if let Some(interval) = task.recurrence() {
            let task_id = task.id.clone();
            let timer = self.arm_timer(task, interval);
            if let Some(stale) = state.timers.insert(task_id, timer) {
                stale.abort();
            }
        }

        Ok(())
    }

    fn arm_timer(&self, task: Task, interval: Duration) -> JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.running);

        debug!(task_id = %task.id, ?interval, "Arming periodic timer");
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                let state = state.lock().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                if !state.tasks.contains_key(&task.id) {
                    debug!(task_id = %task.id, "Timer for deleted task exiting");
                    break;
                }
                queue.push(task.clone());
                metrics::counter!("device_tasks_enqueued_total").increment(1);
            }
        })
    }

    /// Forget a task and cancel its timer. Returns whether the id was known.
    /// An instance already queued or executing is not retracted.
    pub async fn cancel(&self, task_id: &str) -> bool {
        let mut state = self.state.lock().await;
        let removed = state.tasks.remove(task_id).is_some();
        if let Some(timer) = state.timers.remove(task_id) {
            timer.abort();
        }
        removed
    }

    /// Clear the running flag without waiting for the table lock.
    pub fn halt(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// 停止所有定时器。队列中已有的任务不清空。
    pub async fn stop(&self) {
        self.halt();

        let mut state = self.state.lock().await;
        let count = state.timers.len();
        for (_, timer) in state.timers.drain() {
            timer.abort();
        }
        info!("Scheduler stopped, cancelled {} timers", count);
    }

    /// Ids of the active periodic tasks, sorted.
    pub async fn active_task_ids(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut ids: Vec<String> = state.tasks.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn contains(&self, task_id: &str) -> bool {
        self.state.lock().await.tasks.contains_key(task_id)
    }

    pub async fn armed_timer_count(&self) -> usize {
        self.state.lock().await.timers.len()
    }

    /// Periodic tasks currently registered, sorted by id.
    pub async fn periodic_snapshot(&self) -> Vec<Task> {
        let state = self.state.lock().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|task| task.is_periodic())
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        tasks
    }
}
