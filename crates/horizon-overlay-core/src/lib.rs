//! Core systems for Horizon Overlay.
//!
//! This crate provides the cooperative runtime the overlay controllers are
//! built on:
//!
//! - **Event Loop**: a single-threaded loop with a virtual clock, driven by
//!   the host through [`EventLoop::tick`] or by tests through
//!   [`EventLoop::advance`]
//! - **Timers**: owned, cancellable one-shot [`Timer`] values
//! - **Task Queue**: next-turn deferred tasks
//! - **Signal/Slot System**: type-safe change notification
//!
//! # Timer Example
//!
//! ```
//! use std::time::Duration;
//! use horizon_overlay_core::EventLoop;
//!
//! let event_loop = EventLoop::new();
//!
//! let pending = event_loop.start_timer(Duration::from_millis(300), || {
//!     println!("delay elapsed");
//! });
//!
//! // Superseding a transition is just cancelling (or dropping) the old timer.
//! pending.cancel();
//! assert_eq!(event_loop.advance(Duration::from_secs(1)), 0);
//! ```

mod event_loop;
pub mod logging;
pub mod signal;
mod task;
mod timer;

pub use event_loop::EventLoop;
pub use signal::{ConnectionGuard, ConnectionId, Signal};
pub use task::{TaskHandle, TaskId};
pub use timer::{Timer, TimerId};
