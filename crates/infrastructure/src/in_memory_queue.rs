use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use scheduler_domain::entities::Task;
use tracing::debug;

/// 内存任务队列
///
/// 双端队列: 普通任务从尾部进入, 紧急任务插到头部, 消费端只从头部取出。
/// 所有操作都在同一把互斥锁内完成, 生产者 (定时器、外部调用方) 与唯一的
/// 消费者 (worker 循环) 共享同一个实例。
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: Mutex<VecDeque<Task>>,
    /// 入队总数统计
    enqueued: AtomicU64,
    /// 紧急入队总数统计
    urgent_enqueued: AtomicU64,
}

/// 队列统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: usize,
    pub total_enqueued: u64,
    pub urgent_enqueued: u64,
}

impl TaskQueue {
    /// 创建空队列
    pub fn new() -> Self {
        Self::default()
    }

    /// 普通任务: 追加到尾部
    pub fn push_back(&self, task: Task) {
        debug!(task_id = %task.id, "Enqueue task at tail");
        self.lock().push_back(task);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// 紧急任务: 插入头部, 排在所有等待中的普通任务之前
    pub fn push_front(&self, task: Task) {
        debug!(task_id = %task.id, "Enqueue urgent task at head");
        self.lock().push_front(task);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.urgent_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// 按紧急程度入队
    pub fn push(&self, task: Task) {
        if task.urgent {
            self.push_front(task);
        } else {
            self.push_back(task);
        }
    }

    /// 从头部取出, 队列为空时立即返回 `None`, 不阻塞
    pub fn pop_front(&self) -> Option<Task> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 获取队列统计信息
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.len(),
            total_enqueued: self.enqueued.load(Ordering::Relaxed),
            urgent_enqueued: self.urgent_enqueued.load(Ordering::Relaxed),
        }
    }

    // A panic while holding the lock cannot leave the deque half-modified,
    // so a poisoned lock is still usable.
    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Task>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }
}
