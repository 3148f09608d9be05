//! The open/close state machine for one trigger/panel pair.
//!
//! A [`Disclosure`] mediates open and close requests from every input source
//! (hover, click, keyboard, API) with optional delays:
//!
//! ```text
//! Closed -> OpeningPending -> Open -> ClosingPending -> Closed
//! ```
//!
//! At most one transition timer is outstanding. A new request always replaces
//! a conflicting pending one, so the most recent request wins. Opening starts
//! continuous positioning and a dismissal layer before `open_changed(true)` is
//! emitted; closing tears both down before `open_changed(false)`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use horizon_overlay::{Disclosure, DisclosureOptions, EventLoop, HeadlessDocument, Phase, Rect};
//!
//! let document = Arc::new(HeadlessDocument::new(Rect::new(0.0, 0.0, 800.0, 600.0)));
//! let event_loop = EventLoop::new();
//! let trigger = document.create_element(None, Rect::new(10.0, 10.0, 80.0, 24.0));
//! let panel = document.create_element(None, Rect::new(0.0, 0.0, 160.0, 120.0));
//!
//! let disclosure = Disclosure::builder(document.clone(), event_loop.clone())
//!     .trigger(trigger)
//!     .panel(panel)
//!     .options(DisclosureOptions::default().with_open_delay(Duration::from_millis(100)))
//!     .build()
//!     .unwrap();
//!
//! disclosure.open();
//! assert_eq!(disclosure.phase(), Phase::OpeningPending);
//!
//! event_loop.advance(Duration::from_millis(100));
//! assert!(disclosure.is_open());
//! ```

use std::sync::{Arc, Weak};
use std::time::Duration;

use horizon_overlay_core::logging::targets;
use horizon_overlay_core::{ConnectionId, EventLoop, Signal, Timer};
use parking_lot::Mutex;

use crate::dismissal::{DismissGuard, DismissReason, DismissalLayers};
use crate::error::{OverlayError, Result};
use crate::platform::{ElementId, Platform};
use crate::positioning::{start_auto_reposition, Placement, PlacementConfig, RepositionHandle};

/// Phase of a disclosure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// Panel hidden, nothing pending.
    #[default]
    Closed,
    /// Open requested; the open delay is running.
    OpeningPending,
    /// Panel positioned and visible.
    Open,
    /// Close requested; the close delay is running. The panel is still visible.
    ClosingPending,
}

impl Phase {
    /// Whether the panel is visible in this phase.
    pub fn is_visible(self) -> bool {
        matches!(self, Phase::Open | Phase::ClosingPending)
    }

    /// Whether a transition timer is outstanding.
    pub fn is_pending(self) -> bool {
        matches!(self, Phase::OpeningPending | Phase::ClosingPending)
    }

    /// The value hosts reflect as `data-state`.
    pub fn data_state(self) -> &'static str {
        if self.is_visible() { "open" } else { "closed" }
    }
}

/// Per-disclosure options.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisclosureOptions {
    /// Delay used by [`Disclosure::open`].
    pub open_delay: Duration,
    /// Delay used by [`Disclosure::close`].
    pub close_delay: Duration,
    /// A disabled trigger ignores open requests.
    pub disabled: bool,
    /// Panel placement.
    pub placement: PlacementConfig,
}

impl DisclosureOptions {
    /// Set the open delay.
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Set the close delay.
    pub fn with_close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = delay;
        self
    }

    /// Set the disabled flag.
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Set the placement.
    pub fn with_placement(mut self, placement: PlacementConfig) -> Self {
        self.placement = placement;
        self
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Registers a trigger and a panel and produces a [`Disclosure`].
pub struct DisclosureBuilder {
    platform: Arc<dyn Platform>,
    event_loop: EventLoop,
    layers: Option<DismissalLayers>,
    trigger: Option<ElementId>,
    panel: Option<ElementId>,
    options: DisclosureOptions,
}

impl DisclosureBuilder {
    /// Register the trigger element.
    pub fn trigger(mut self, trigger: ElementId) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Register the panel element.
    pub fn panel(mut self, panel: ElementId) -> Self {
        self.panel = Some(panel);
        self
    }

    /// Set the options.
    pub fn options(mut self, options: DisclosureOptions) -> Self {
        self.options = options;
        self
    }

    /// Share a dismissal registry with other disclosures.
    ///
    /// Nested panels must share one registry so a dismissal inside a child
    /// panel does not close its parent.
    pub fn layers(mut self, layers: DismissalLayers) -> Self {
        self.layers = Some(layers);
        self
    }

    /// Validate the registration and create the disclosure.
    pub fn build(self) -> Result<Disclosure> {
        let trigger = self.trigger.ok_or(OverlayError::MissingTrigger)?;
        let panel = self.panel.ok_or(OverlayError::MissingPanel)?;
        if trigger == panel {
            return Err(OverlayError::SameElement(trigger));
        }
        for element in [trigger, panel] {
            if !self.platform.is_connected(element) {
                return Err(OverlayError::ElementNotConnected(element));
            }
        }

        let layers = self
            .layers
            .unwrap_or_else(|| DismissalLayers::new(self.platform.clone(), self.event_loop.clone()));

        tracing::debug!(target: targets::DISCLOSURE, ?trigger, ?panel, "disclosure registered");

        Ok(Disclosure {
            inner: Arc::new(DisclosureInner {
                trigger,
                panel,
                platform: self.platform,
                event_loop: self.event_loop,
                layers,
                state: Mutex::new(DisclosureState {
                    phase: Phase::Closed,
                    pending: None,
                    generation: 0,
                    reposition: None,
                    dismiss: None,
                    placement: None,
                    alive: true,
                    options: self.options,
                }),
                open_changed: Signal::new(),
                placement_changed: Signal::new(),
                dismissed: Signal::new(),
            }),
        })
    }
}

// ============================================================================
// Disclosure
// ============================================================================

struct DisclosureState {
    phase: Phase,
    /// Set iff the phase is pending.
    pending: Option<Timer>,
    /// Identifies the current pending timer; stale callbacks compare against it.
    generation: u64,
    reposition: Option<RepositionHandle>,
    dismiss: Option<DismissGuard>,
    placement: Option<Placement>,
    alive: bool,
    options: DisclosureOptions,
}

struct DisclosureInner {
    trigger: ElementId,
    panel: ElementId,
    platform: Arc<dyn Platform>,
    event_loop: EventLoop,
    layers: DismissalLayers,
    state: Mutex<DisclosureState>,
    open_changed: Signal<bool>,
    placement_changed: Signal<Placement>,
    dismissed: Signal<DismissReason>,
}

/// Pending transition kind, for timer callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Open,
    Close,
}

/// Open/close state machine for one trigger/panel pair.
///
/// `Disclosure` is a cheap cloneable handle. Dropping the last handle tears
/// the machine down like [`destroy`](Self::destroy).
#[derive(Clone)]
pub struct Disclosure {
    inner: Arc<DisclosureInner>,
}

impl Disclosure {
    /// Start registering a disclosure.
    pub fn builder(platform: Arc<dyn Platform>, event_loop: EventLoop) -> DisclosureBuilder {
        DisclosureBuilder {
            platform,
            event_loop,
            layers: None,
            trigger: None,
            panel: None,
            options: DisclosureOptions::default(),
        }
    }

    fn from_weak(weak: &Weak<DisclosureInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn downgrade(&self) -> Weak<DisclosureInner> {
        Arc::downgrade(&self.inner)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The trigger element.
    pub fn trigger(&self) -> ElementId {
        self.inner.trigger
    }

    /// The panel element.
    pub fn panel(&self) -> ElementId {
        self.inner.panel
    }

    /// The current phase.
    pub fn phase(&self) -> Phase {
        self.inner.state.lock().phase
    }

    /// Whether the panel is visible (`Open` or `ClosingPending`).
    pub fn is_open(&self) -> bool {
        self.phase().is_visible()
    }

    /// The current placement. `None` while closed.
    pub fn placement(&self) -> Option<Placement> {
        self.inner.state.lock().placement
    }

    /// The current options.
    pub fn options(&self) -> DisclosureOptions {
        self.inner.state.lock().options
    }

    /// Whether [`destroy`](Self::destroy) has not been called.
    pub fn is_alive(&self) -> bool {
        self.inner.state.lock().alive
    }

    /// Replace the options. Placement changes apply from the next open.
    pub fn set_options(&self, options: DisclosureOptions) {
        let disabled = options.disabled;
        self.inner.state.lock().options = options;
        if disabled {
            self.cancel_pending_open();
        }
    }

    /// Mark the trigger disabled or enabled.
    ///
    /// Disabling drops a pending open; an already open panel stays open.
    pub fn set_disabled(&self, disabled: bool) {
        self.inner.state.lock().options.disabled = disabled;
        if disabled {
            self.cancel_pending_open();
        }
    }

    /// Whether two handles refer to the same machine.
    pub fn ptr_eq(&self, other: &Disclosure) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // =========================================================================
    // Signals
    // =========================================================================

    /// Emitted with `true` after opening and `false` after closing.
    pub fn open_changed(&self) -> &Signal<bool> {
        &self.inner.open_changed
    }

    /// Emitted whenever the placement changes while open.
    pub fn placement_changed(&self) -> &Signal<Placement> {
        &self.inner.placement_changed
    }

    /// Emitted when the dismissal layer closed the panel, after the close.
    pub fn dismissed(&self) -> &Signal<DismissReason> {
        &self.inner.dismissed
    }

    /// Connect a state-change callback receiving the new open state.
    pub fn on_state_change<F>(&self, callback: F) -> ConnectionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.open_changed.connect(move |open| callback(*open))
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Open after the configured open delay.
    pub fn open(&self) {
        let delay = self.options().open_delay;
        self.request_open(delay);
    }

    /// Close after the configured close delay.
    pub fn close(&self) {
        let delay = self.options().close_delay;
        self.request_close(delay);
    }

    /// Open immediately.
    pub fn open_now(&self) {
        self.request_open(Duration::ZERO);
    }

    /// Close immediately.
    pub fn close_now(&self) {
        self.request_close(Duration::ZERO);
    }

    /// Close if open or opening, open otherwise. Both immediately.
    pub fn toggle(&self) {
        match self.phase() {
            Phase::Open | Phase::OpeningPending => self.close_now(),
            Phase::Closed | Phase::ClosingPending => self.open_now(),
        }
    }

    /// Request an open after `delay`.
    ///
    /// - `Closed`: schedules the open, or opens synchronously for a zero delay.
    /// - `OpeningPending`: a zero delay completes the open now; otherwise the
    ///   running delay is kept.
    /// - `ClosingPending`: the pending close is cancelled and the panel stays
    ///   open without a notification.
    /// - `Open`: no-op.
    ///
    /// Ignored while disabled or after [`destroy`](Self::destroy).
    pub fn request_open(&self, delay: Duration) {
        let open_now = {
            let mut state = self.inner.state.lock();
            if !state.alive {
                return;
            }
            if state.options.disabled {
                tracing::debug!(target: targets::DISCLOSURE, trigger = ?self.inner.trigger, "open ignored: trigger disabled");
                return;
            }
            match state.phase {
                Phase::Open => false,
                Phase::ClosingPending => {
                    state.pending = None;
                    state.phase = Phase::Open;
                    tracing::debug!(target: targets::DISCLOSURE, trigger = ?self.inner.trigger, "pending close cancelled");
                    false
                }
                Phase::OpeningPending => {
                    if delay.is_zero() {
                        state.pending = None;
                        true
                    } else {
                        false
                    }
                }
                Phase::Closed => {
                    if delay.is_zero() {
                        true
                    } else {
                        self.schedule(&mut state, Transition::Open, delay);
                        false
                    }
                }
            }
        };
        if open_now {
            self.apply_open();
        }
    }

    /// Request a close after `delay`.
    ///
    /// Symmetric to [`request_open`](Self::request_open): a close while
    /// `OpeningPending` cancels the open and stays closed without a
    /// notification. Works while disabled.
    pub fn request_close(&self, delay: Duration) {
        let close_now = {
            let mut state = self.inner.state.lock();
            if !state.alive {
                return;
            }
            match state.phase {
                Phase::Closed => false,
                Phase::OpeningPending => {
                    state.pending = None;
                    state.phase = Phase::Closed;
                    tracing::debug!(target: targets::DISCLOSURE, trigger = ?self.inner.trigger, "pending open cancelled");
                    false
                }
                Phase::ClosingPending => {
                    if delay.is_zero() {
                        state.pending = None;
                        true
                    } else {
                        false
                    }
                }
                Phase::Open => {
                    if delay.is_zero() {
                        true
                    } else {
                        self.schedule(&mut state, Transition::Close, delay);
                        false
                    }
                }
            }
        };
        if close_now {
            self.apply_close();
        }
    }

    /// Tear the machine down.
    ///
    /// Cancels the pending timer, positioning and the dismissal layer. Emits
    /// nothing; later requests and stale timer callbacks are ignored.
    pub fn destroy(&self) {
        let released = {
            let mut state = self.inner.state.lock();
            if !state.alive {
                return;
            }
            state.alive = false;
            state.phase = Phase::Closed;
            state.placement = None;
            (
                state.pending.take(),
                state.reposition.take(),
                state.dismiss.take(),
            )
        };
        drop(released);
        tracing::debug!(target: targets::DISCLOSURE, trigger = ?self.inner.trigger, "disclosure destroyed");
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    fn schedule(&self, state: &mut DisclosureState, transition: Transition, delay: Duration) {
        state.generation = state.generation.wrapping_add(1);
        let generation = state.generation;
        let weak = self.downgrade();
        let timer = self.inner.event_loop.start_timer(delay, move || {
            if let Some(disclosure) = Disclosure::from_weak(&weak) {
                disclosure.timer_fired(transition, generation);
            }
        });
        state.pending = Some(timer);
        state.phase = match transition {
            Transition::Open => Phase::OpeningPending,
            Transition::Close => Phase::ClosingPending,
        };
        tracing::debug!(
            target: targets::DISCLOSURE,
            trigger = ?self.inner.trigger,
            ?transition,
            ?delay,
            "transition scheduled"
        );
    }

    fn timer_fired(&self, transition: Transition, generation: u64) {
        let expected = match transition {
            Transition::Open => Phase::OpeningPending,
            Transition::Close => Phase::ClosingPending,
        };
        {
            let mut state = self.inner.state.lock();
            if !state.alive || state.generation != generation || state.phase != expected {
                tracing::trace!(target: targets::DISCLOSURE, ?transition, "stale transition timer ignored");
                return;
            }
            state.pending = None;
        }
        if !self.is_attached() {
            tracing::debug!(target: targets::DISCLOSURE, trigger = ?self.inner.trigger, "element detached before transition");
            self.destroy();
            return;
        }
        match transition {
            Transition::Open => self.apply_open(),
            Transition::Close => self.apply_close(),
        }
    }

    fn cancel_pending_open(&self) {
        let mut state = self.inner.state.lock();
        if state.phase == Phase::OpeningPending {
            state.pending = None;
            state.phase = Phase::Closed;
        }
    }

    /// Whether both trigger and panel are still in the document.
    fn is_attached(&self) -> bool {
        let platform = &self.inner.platform;
        platform.is_connected(self.inner.trigger) && platform.is_connected(self.inner.panel)
    }

    fn apply_open(&self) {
        if !self.is_attached() {
            tracing::debug!(target: targets::DISCLOSURE, trigger = ?self.inner.trigger, "open on detached element");
            self.destroy();
            return;
        }
        let placement_config = {
            let mut state = self.inner.state.lock();
            if !state.alive || state.phase.is_visible() {
                return;
            }
            state.phase = Phase::Open;
            state.pending = None;
            state.options.placement
        };

        let weak = self.downgrade();
        let reposition = start_auto_reposition(
            self.inner.platform.clone(),
            self.inner.trigger,
            self.inner.panel,
            placement_config,
            Arc::new(move |placement: &Placement| {
                if let Some(disclosure) = Disclosure::from_weak(&weak) {
                    disclosure.placement_updated(*placement);
                }
            }),
        );

        let weak = self.downgrade();
        let dismiss = self.inner.layers.watch(
            self.inner.panel,
            self.inner.trigger,
            Arc::new(move |reason| {
                if let Some(disclosure) = Disclosure::from_weak(&weak) {
                    disclosure.dismiss(reason);
                }
            }),
        );

        let (stale, still_open) = {
            let mut state = self.inner.state.lock();
            if state.alive && state.phase.is_visible() && state.reposition.is_none() {
                state.reposition = Some(reposition);
                state.dismiss = Some(dismiss);
                (None, true)
            } else {
                (Some((reposition, dismiss)), false)
            }
        };
        drop(stale);

        if still_open {
            tracing::debug!(target: targets::DISCLOSURE, trigger = ?self.inner.trigger, "opened");
            self.inner.open_changed.emit(true);
        }
    }

    fn apply_close(&self) {
        let released = {
            let mut state = self.inner.state.lock();
            if !state.alive || !state.phase.is_visible() {
                return;
            }
            state.phase = Phase::Closed;
            state.placement = None;
            (
                state.pending.take(),
                state.reposition.take(),
                state.dismiss.take(),
            )
        };
        drop(released);

        tracing::debug!(target: targets::DISCLOSURE, trigger = ?self.inner.trigger, "closed");
        self.inner.open_changed.emit(false);
    }

    fn placement_updated(&self, placement: Placement) {
        {
            let mut state = self.inner.state.lock();
            if !state.alive || !state.phase.is_visible() {
                return;
            }
            state.placement = Some(placement);
        }
        self.inner.placement_changed.emit(placement);
    }

    fn dismiss(&self, reason: DismissReason) {
        if !self.phase().is_visible() {
            return;
        }
        self.close_now();
        self.inner.dismissed.emit(reason);
    }
}

impl std::fmt::Debug for Disclosure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Disclosure")
            .field("trigger", &self.inner.trigger)
            .field("panel", &self.inner.panel)
            .field("phase", &state.phase)
            .field("alive", &state.alive)
            .finish()
    }
}

static_assertions::assert_impl_all!(Disclosure: Send, Sync, Clone);
