//! Logging facilities for Horizon Overlay.
//!
//! Horizon Overlay uses the `tracing` crate for instrumentation. To see logs,
//! install a tracing subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_overlay=debug,horizon_overlay_core=trace")
//!     .init();
//! ```
//!
//! State transitions (open, close, group switches) log at `debug`. Timer and
//! task plumbing logs at `trace`. Recoverable anomalies such as a detached
//! trigger at positioning time log at `warn`.

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core framework target.
    pub const CORE: &str = "horizon_overlay_core";
    /// Timer system target.
    pub const TIMER: &str = "horizon_overlay_core::timer";
    /// Deferred task target.
    pub const TASK: &str = "horizon_overlay_core::task";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_overlay_core::signal";
    /// Placement computation and continuous repositioning.
    pub const POSITIONING: &str = "horizon_overlay::positioning";
    /// Disclosure state transitions.
    pub const DISCLOSURE: &str = "horizon_overlay::disclosure";
    /// Outside-pointer and Escape dismissal.
    pub const DISMISSAL: &str = "horizon_overlay::dismissal";
    /// Roving focus and typeahead.
    pub const NAVIGATION: &str = "horizon_overlay::navigation";
    /// Group coordination (menubar, navigation menu).
    pub const GROUP: &str = "horizon_overlay::group";
    /// Host adapters.
    pub const WIDGETS: &str = "horizon_overlay::widgets";
}

/// Macros for common tracing patterns.
///
/// These are thin wrappers around the `tracing` crate macros with the core
/// target applied.
#[macro_export]
macro_rules! overlay_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "horizon_overlay_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! overlay_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "horizon_overlay_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! overlay_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "horizon_overlay_core", $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::targets;

    #[test]
    fn test_targets_are_namespaced() {
        for target in [
            targets::TIMER,
            targets::TASK,
            targets::SIGNAL,
            targets::POSITIONING,
            targets::DISCLOSURE,
            targets::DISMISSAL,
            targets::NAVIGATION,
            targets::GROUP,
            targets::WIDGETS,
        ] {
            assert!(target.starts_with("horizon_overlay"), "{target}");
        }
    }

    #[test]
    fn test_macros_expand_with_subscriber() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            overlay_trace!(value = 1, "trace message");
            overlay_debug!("debug message");
            overlay_warn!("warn message");
        });
    }
}
