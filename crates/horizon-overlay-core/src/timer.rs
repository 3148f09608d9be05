//! Timer system for Horizon Overlay.
//!
//! Provides one-shot timers that integrate with the [`EventLoop`](crate::EventLoop).
//! Every scheduling call returns an owned [`Timer`] value; cancelling or dropping
//! that value guarantees the callback never runs.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Weak;
use std::time::Duration;

use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// A unique identifier for a timer.
    pub struct TimerId;
}

/// A boxed timer callback.
pub(crate) type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Internal timer data.
struct TimerData {
    /// Virtual time at which this timer fires.
    due: Duration,
    /// The callback, taken when the timer fires.
    callback: TimerCallback,
}

/// An entry in the timer queue (min-heap by due time, then scheduling order).
#[derive(Debug, Clone, Copy)]
struct TimerQueueEntry {
    id: TimerId,
    due: Duration,
    seq: u64,
}

impl PartialEq for TimerQueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for TimerQueueEntry {}

impl PartialOrd for TimerQueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerQueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap (BinaryHeap is max-heap by default).
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Manages all pending timers of one event loop.
pub(crate) struct TimerManager {
    /// All registered timers.
    timers: SlotMap<TimerId, TimerData>,
    /// Priority queue of pending timer fires.
    queue: BinaryHeap<TimerQueueEntry>,
    /// Monotonic counter keeping equal due times in scheduling order.
    next_seq: u64,
}

impl TimerManager {
    /// Create a new timer manager.
    pub(crate) fn new() -> Self {
        Self {
            timers: SlotMap::with_key(),
            queue: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Register a one-shot timer firing at `due`.
    pub(crate) fn start_one_shot(&mut self, due: Duration, callback: TimerCallback) -> TimerId {
        let id = self.timers.insert(TimerData { due, callback });
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(TimerQueueEntry { id, due, seq });
        id
    }

    /// Stop and remove a timer.
    ///
    /// Returns `true` if the timer was still pending.
    pub(crate) fn stop(&mut self, id: TimerId) -> bool {
        self.timers.remove(id).is_some()
    }

    /// Check if a timer is still pending.
    pub(crate) fn is_active(&self, id: TimerId) -> bool {
        self.timers.contains_key(id)
    }

    /// Drop queue entries whose timers were stopped.
    fn prune(&mut self) {
        while let Some(entry) = self.queue.peek() {
            if self.timers.contains_key(entry.id) {
                break;
            }
            self.queue.pop();
        }
    }

    /// Due time of the earliest pending timer.
    pub(crate) fn next_due(&mut self) -> Option<Duration> {
        self.prune();
        self.queue.peek().map(|entry| entry.due)
    }

    /// Remove and return the earliest timer due at or before `deadline`.
    ///
    /// The caller invokes the callback after releasing the lock.
    #[tracing::instrument(skip(self), target = "horizon_overlay_core::timer", level = "trace")]
    pub(crate) fn pop_expired(
        &mut self,
        deadline: Duration,
    ) -> Option<(TimerId, Duration, TimerCallback)> {
        self.prune();
        let entry = *self.queue.peek()?;
        if entry.due > deadline {
            return None;
        }
        self.queue.pop();
        let data = self.timers.remove(entry.id)?;
        tracing::trace!(target: "horizon_overlay_core::timer", id = ?entry.id, due = ?data.due, "timer fired");
        Some((entry.id, data.due, data.callback))
    }

    /// Get the number of pending timers.
    pub(crate) fn active_count(&self) -> usize {
        self.timers.len()
    }
}

/// An owned, cancellable one-shot timer.
///
/// Returned by [`EventLoop::start_timer`](crate::EventLoop::start_timer).
/// Dropping the value cancels the timer, so replacing a stored `Option<Timer>`
/// is enough to supersede a pending transition.
#[must_use = "dropping a Timer cancels it"]
pub struct Timer {
    id: TimerId,
    due: Duration,
    timers: Weak<Mutex<TimerManager>>,
}

impl Timer {
    pub(crate) fn new(id: TimerId, due: Duration, timers: Weak<Mutex<TimerManager>>) -> Self {
        Self { id, due, timers }
    }

    /// The identifier of this timer.
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// The virtual time at which this timer fires.
    pub fn due(&self) -> Duration {
        self.due
    }

    /// Whether the timer can still fire.
    pub fn is_pending(&self) -> bool {
        self.timers
            .upgrade()
            .is_some_and(|timers| timers.lock().is_active(self.id))
    }

    /// Cancel the timer. Calling this more than once is a no-op.
    pub fn cancel(&self) {
        if let Some(timers) = self.timers.upgrade()
            && timers.lock().stop(self.id)
        {
            tracing::trace!(target: "horizon_overlay_core::timer", id = ?self.id, "timer cancelled");
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("id", &self.id)
            .field("due", &self.due)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> TimerCallback {
        Box::new(|| {})
    }

    #[test]
    fn test_pop_expired_orders_by_due_then_sequence() {
        let mut manager = TimerManager::new();
        let late = manager.start_one_shot(Duration::from_millis(20), noop());
        let first = manager.start_one_shot(Duration::from_millis(10), noop());
        let second = manager.start_one_shot(Duration::from_millis(10), noop());

        let deadline = Duration::from_millis(30);
        assert_eq!(manager.pop_expired(deadline).map(|t| t.0), Some(first));
        assert_eq!(manager.pop_expired(deadline).map(|t| t.0), Some(second));
        assert_eq!(manager.pop_expired(deadline).map(|t| t.0), Some(late));
        assert!(manager.pop_expired(deadline).is_none());
    }

    #[test]
    fn test_pop_expired_respects_deadline() {
        let mut manager = TimerManager::new();
        manager.start_one_shot(Duration::from_millis(100), noop());

        assert!(manager.pop_expired(Duration::from_millis(99)).is_none());
        assert!(manager.pop_expired(Duration::from_millis(100)).is_some());
    }

    #[test]
    fn test_stopped_timers_are_skipped() {
        let mut manager = TimerManager::new();
        let id = manager.start_one_shot(Duration::from_millis(5), noop());

        assert!(manager.stop(id));
        assert!(!manager.stop(id));
        assert!(!manager.is_active(id));
        assert_eq!(manager.next_due(), None);
        assert_eq!(manager.active_count(), 0);
    }
}
