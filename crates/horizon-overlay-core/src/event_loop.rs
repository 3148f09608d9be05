//! Cooperative single-threaded event loop.
//!
//! The [`EventLoop`] owns a clock, a timer queue and a deferred task queue.
//! Time only moves when the host calls [`EventLoop::tick`] (wall clock) or
//! [`EventLoop::advance`] (virtual time, used by tests and deterministic hosts).
//! Callbacks never run while an internal lock is held, so they may freely
//! schedule or cancel other timers and tasks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::task::{TaskHandle, TaskQueue};
use crate::timer::{Timer, TimerManager};

/// Shared state behind an [`EventLoop`] handle.
struct LoopInner {
    /// Wall-clock reference for [`EventLoop::tick`].
    epoch: Instant,
    /// Current loop time, measured from `epoch`.
    now: Mutex<Duration>,
    timers: Arc<Mutex<TimerManager>>,
    tasks: Arc<Mutex<TaskQueue>>,
}

/// A cloneable handle to a cooperative event loop.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::time::Duration;
/// use horizon_overlay_core::EventLoop;
///
/// let event_loop = EventLoop::new();
/// let fired = Arc::new(AtomicBool::new(false));
///
/// let flag = fired.clone();
/// let _timer = event_loop.start_timer(Duration::from_millis(100), move || {
///     flag.store(true, Ordering::SeqCst);
/// });
///
/// event_loop.advance(Duration::from_millis(99));
/// assert!(!fired.load(Ordering::SeqCst));
///
/// event_loop.advance(Duration::from_millis(1));
/// assert!(fired.load(Ordering::SeqCst));
/// ```
#[derive(Clone)]
pub struct EventLoop {
    inner: Arc<LoopInner>,
}

impl EventLoop {
    /// Create a new event loop with its clock at zero.
    pub fn new() -> Self {
        crate::overlay_debug!("event loop created");
        Self {
            inner: Arc::new(LoopInner {
                epoch: Instant::now(),
                now: Mutex::new(Duration::ZERO),
                timers: Arc::new(Mutex::new(TimerManager::new())),
                tasks: Arc::new(Mutex::new(TaskQueue::new())),
            }),
        }
    }

    /// Current loop time.
    pub fn now(&self) -> Duration {
        *self.inner.now.lock()
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Schedule `callback` to run once after `delay`.
    ///
    /// The returned [`Timer`] cancels the callback when cancelled or dropped.
    pub fn start_timer<F>(&self, delay: Duration, callback: F) -> Timer
    where
        F: FnOnce() + Send + 'static,
    {
        let due = self.now() + delay;
        let id = self
            .inner
            .timers
            .lock()
            .start_one_shot(due, Box::new(callback));
        tracing::trace!(target: "horizon_overlay_core::timer", ?id, ?delay, "timer started");
        Timer::new(id, due, Arc::downgrade(&self.inner.timers))
    }

    /// Post a task to run on the next task turn.
    pub fn post_task<F>(&self, task: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.inner.tasks.lock().post(Box::new(task));
        tracing::trace!(target: "horizon_overlay_core::task", id = id.as_u64(), "task posted");
        TaskHandle::new(id, Arc::downgrade(&self.inner.tasks))
    }

    // =========================================================================
    // Driving the loop
    // =========================================================================

    /// Run every queued task, including tasks posted while draining.
    ///
    /// Returns the number of tasks executed.
    pub fn run_pending_tasks(&self) -> usize {
        let mut count = 0;
        loop {
            let next = self.inner.tasks.lock().pop();
            let Some((id, task)) = next else {
                break;
            };
            tracing::trace!(target: "horizon_overlay_core::task", id = id.as_u64(), "running task");
            task();
            count += 1;
        }
        count
    }

    /// Advance virtual time by `by`, firing every timer that becomes due.
    ///
    /// Timers fire in due-time order. Before each callback the clock is set to
    /// that timer's due time, and pending tasks are drained after it. Timers
    /// scheduled by callbacks that fall inside the window fire as well.
    ///
    /// Returns the number of timers fired. Must not be called from inside a
    /// timer or task callback.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now() + by;
        self.advance_to(target)
    }

    /// Advance virtual time to `target`. Earlier targets only drain tasks.
    pub fn advance_to(&self, target: Duration) -> usize {
        self.run_pending_tasks();

        let mut fired = 0;
        loop {
            let next = self.inner.timers.lock().pop_expired(target);
            let Some((_, due, callback)) = next else {
                break;
            };
            {
                let mut now = self.inner.now.lock();
                if due > *now {
                    *now = due;
                }
            }
            callback();
            fired += 1;
            self.run_pending_tasks();
        }

        {
            let mut now = self.inner.now.lock();
            if target > *now {
                *now = target;
            }
        }
        self.run_pending_tasks();
        fired
    }

    /// Advance to the wall-clock time elapsed since the loop was created.
    ///
    /// Hosts call this from their native timer or frame callback.
    pub fn tick(&self) -> usize {
        let elapsed = self.inner.epoch.elapsed();
        let fired = self.advance_to(elapsed);
        if fired > 0 {
            crate::overlay_trace!(fired, ?elapsed, "tick");
        }
        fired
    }

    /// Time until the earliest pending timer fires, if any.
    pub fn time_until_next(&self) -> Option<Duration> {
        let due = self.inner.timers.lock().next_due()?;
        Some(due.saturating_sub(self.now()))
    }

    /// Number of timers that can still fire.
    pub fn pending_timer_count(&self) -> usize {
        self.inner.timers.lock().active_count()
    }

    /// Number of tasks waiting for the next turn.
    pub fn pending_task_count(&self) -> usize {
        self.inner.tasks.lock().pending_count()
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("now", &self.now())
            .field("pending_timers", &self.pending_timer_count())
            .field("pending_tasks", &self.pending_task_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(EventLoop: Send, Sync, Clone);
