//! Deferred task queue.
//!
//! Tasks posted here run on the next task turn of the event loop, after the
//! code that posted them has returned. This is the "next tick" used to arm
//! listeners outside the event dispatch that created them.

use std::collections::VecDeque;
use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// A unique identifier for a deferred task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Get the raw u64 value of this task ID.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Global counter for generating unique task IDs.
static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

fn next_task_id() -> TaskId {
    TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
}

/// A boxed task closure.
pub(crate) type BoxedTask = Box<dyn FnOnce() + Send + 'static>;

/// Internal task data.
struct TaskData {
    id: TaskId,
    task: BoxedTask,
}

/// Manages the deferred task queue.
pub(crate) struct TaskQueue {
    /// Pending tasks to execute, in posting order.
    tasks: VecDeque<TaskData>,
}

impl TaskQueue {
    /// Create a new task queue.
    pub(crate) fn new() -> Self {
        Self {
            tasks: VecDeque::new(),
        }
    }

    /// Post a task to run on the next turn.
    pub(crate) fn post(&mut self, task: BoxedTask) -> TaskId {
        let id = next_task_id();
        self.tasks.push_back(TaskData { id, task });
        id
    }

    /// Cancel a pending task.
    ///
    /// Returns `true` if the task was found and cancelled.
    pub(crate) fn cancel(&mut self, id: TaskId) -> bool {
        if let Some(pos) = self.tasks.iter().position(|t| t.id == id) {
            self.tasks.remove(pos);
            true
        } else {
            false
        }
    }

    /// Check whether a task is still queued.
    pub(crate) fn contains(&self, id: TaskId) -> bool {
        self.tasks.iter().any(|t| t.id == id)
    }

    /// Take the oldest pending task. The caller runs it without the lock.
    pub(crate) fn pop(&mut self) -> Option<(TaskId, BoxedTask)> {
        self.tasks.pop_front().map(|data| (data.id, data.task))
    }

    /// Get the number of pending tasks.
    pub(crate) fn pending_count(&self) -> usize {
        self.tasks.len()
    }
}

/// Handle to a posted task.
///
/// Unlike [`Timer`](crate::Timer), dropping the handle does not cancel the
/// task; posting is fire-and-forget unless [`cancel`](Self::cancel) is called.
pub struct TaskHandle {
    id: TaskId,
    tasks: Weak<Mutex<TaskQueue>>,
}

impl TaskHandle {
    pub(crate) fn new(id: TaskId, tasks: Weak<Mutex<TaskQueue>>) -> Self {
        Self { id, tasks }
    }

    /// The identifier of this task.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Whether the task is still waiting to run.
    pub fn is_pending(&self) -> bool {
        self.tasks
            .upgrade()
            .is_some_and(|tasks| tasks.lock().contains(self.id))
    }

    /// Cancel the task if it has not run yet. Safe to call repeatedly.
    pub fn cancel(&self) {
        if let Some(tasks) = self.tasks.upgrade() {
            tasks.lock().cancel(self.id);
        }
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tasks_pop_in_posting_order() {
        let mut queue = TaskQueue::new();
        let a = queue.post(Box::new(|| {}));
        let b = queue.post(Box::new(|| {}));

        assert_eq!(queue.pending_count(), 2);
        assert_eq!(queue.pop().map(|t| t.0), Some(a));
        assert_eq!(queue.pop().map(|t| t.0), Some(b));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_cancel_removes_task() {
        let mut queue = TaskQueue::new();
        let id = queue.post(Box::new(|| {}));

        assert!(queue.contains(id));
        assert!(queue.cancel(id));
        assert!(!queue.cancel(id));
        assert_eq!(queue.pending_count(), 0);
    }
}
