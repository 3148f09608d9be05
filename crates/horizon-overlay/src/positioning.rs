//! Panel placement relative to a trigger.
//!
//! [`compute_placement`] is a pure function of layout state: it places the
//! panel on the preferred side of the trigger, flips to the opposite side when
//! the preferred one overflows the viewport, shifts along the cross axis to
//! stay inside the collision padding, and clamps the panel height to the room
//! left on the resolved side.
//!
//! [`start_auto_reposition`] keeps a placement current while a panel is open by
//! observing the trigger, the panel and the viewport through the
//! [`Platform`].
//!
//! # Example
//!
//! ```
//! use horizon_overlay::{compute_placement, PlacementConfig, Rect, Side, Size};
//!
//! let viewport = Rect::new(0.0, 0.0, 800.0, 600.0);
//! // A trigger close to the bottom edge: a 200px panel only fits above it.
//! let trigger = Rect::new(100.0, 540.0, 120.0, 32.0);
//!
//! let placement = compute_placement(
//!     trigger,
//!     Size::new(160.0, 200.0),
//!     viewport,
//!     &PlacementConfig::default(),
//! );
//!
//! assert_eq!(placement.side, Side::Top);
//! assert_eq!(placement.y, 540.0 - 4.0 - 200.0);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use glam::Vec2;
use horizon_overlay_core::logging::targets;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::geometry::{Insets, Rect, Size};
use crate::platform::{ElementId, PanelGeometry, Platform, Subscription};

// ============================================================================
// Side / Align
// ============================================================================

/// The side of the trigger a panel is placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Right,
    #[default]
    Bottom,
    Left,
}

impl Side {
    /// The side across the trigger.
    pub fn opposite(self) -> Self {
        match self {
            Side::Top => Side::Bottom,
            Side::Bottom => Side::Top,
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// Whether the main axis is vertical (top or bottom).
    pub fn is_vertical(self) -> bool {
        matches!(self, Side::Top | Side::Bottom)
    }

    /// The value hosts reflect as `data-side`.
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Top => "top",
            Side::Right => "right",
            Side::Bottom => "bottom",
            Side::Left => "left",
        }
    }
}

/// Alignment of the panel along the trigger's cross axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Start,
    Center,
    End,
}

impl Align {
    /// The value hosts reflect as `data-align`.
    pub fn as_str(self) -> &'static str {
        match self {
            Align::Start => "start",
            Align::Center => "center",
            Align::End => "end",
        }
    }
}

// ============================================================================
// Configuration and result
// ============================================================================

/// Placement preferences for one panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Preferred side.
    pub side: Side,
    /// Preferred alignment. Never flipped.
    pub align: Align,
    /// Gap between trigger and panel along the side's normal.
    pub side_offset: f32,
    /// Offset along the cross axis. Negated for [`Align::End`].
    pub align_offset: f32,
    /// Minimum distance kept from the viewport edges.
    pub collision_padding: f32,
    /// Enables flip and shift.
    pub avoid_collisions: bool,
    /// Upper bound on the panel height; the applied maximum is further clamped
    /// to the room on the resolved side. `None` leaves the height alone.
    pub max_panel_height: Option<f32>,
    /// Use the trigger width as the panel's minimum width.
    pub match_trigger_width: bool,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            side: Side::Bottom,
            align: Align::Start,
            side_offset: 4.0,
            align_offset: 0.0,
            collision_padding: 8.0,
            avoid_collisions: true,
            max_panel_height: None,
            match_trigger_width: false,
        }
    }
}

impl PlacementConfig {
    /// Set the preferred side.
    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    /// Set the preferred alignment.
    pub fn with_align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    /// Set the side offset.
    pub fn with_side_offset(mut self, offset: f32) -> Self {
        self.side_offset = offset;
        self
    }

    /// Set the align offset.
    pub fn with_align_offset(mut self, offset: f32) -> Self {
        self.align_offset = offset;
        self
    }

    /// Set the collision padding.
    pub fn with_collision_padding(mut self, padding: f32) -> Self {
        self.collision_padding = padding;
        self
    }

    /// Set the maximum panel height.
    pub fn with_max_panel_height(mut self, height: f32) -> Self {
        self.max_panel_height = Some(height);
        self
    }

    /// Match the trigger width.
    pub fn with_trigger_width(mut self) -> Self {
        self.match_trigger_width = true;
        self
    }
}

/// A resolved placement in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// The side actually used (after flipping).
    pub side: Side,
    /// The alignment used.
    pub align: Align,
    /// Panel left edge.
    pub x: f32,
    /// Panel top edge.
    pub y: f32,
    /// Applied maximum height, when one was configured.
    pub max_height: Option<f32>,
    /// Applied minimum width, when matching the trigger width.
    pub min_width: Option<f32>,
    /// Room along the main axis (vertical sides) or the padded viewport width.
    pub available_width: f32,
    /// Room along the main axis (horizontal sides) or the padded viewport height.
    pub available_height: f32,
}

impl Placement {
    /// Best-effort placement when nothing can be measured: anchored at the
    /// origin on the preferred side.
    pub fn anchored_at_origin(config: &PlacementConfig, viewport: Rect) -> Self {
        Self {
            side: config.side,
            align: config.align,
            x: 0.0,
            y: 0.0,
            max_height: config.max_panel_height,
            min_width: None,
            available_width: viewport.width(),
            available_height: viewport.height(),
        }
    }

    /// The geometry written to the panel.
    pub fn to_geometry(&self) -> PanelGeometry {
        PanelGeometry {
            x: self.x,
            y: self.y,
            min_width: self.min_width,
            max_height: self.max_height,
        }
    }
}

// ============================================================================
// Pure computation
// ============================================================================

/// Room between the trigger (plus offset) and the padded bounds on `side`.
fn space_on(side: Side, trigger: Rect, bounds: Rect, offset: f32) -> f32 {
    match side {
        Side::Top => trigger.top() - offset - bounds.top(),
        Side::Bottom => bounds.bottom() - (trigger.bottom() + offset),
        Side::Left => trigger.left() - offset - bounds.left(),
        Side::Right => bounds.right() - (trigger.right() + offset),
    }
}

fn main_extent(side: Side, size: Size) -> f32 {
    if side.is_vertical() {
        size.height
    } else {
        size.width
    }
}

fn resolve_side(trigger: Rect, panel: Size, bounds: Rect, config: &PlacementConfig) -> Side {
    let preferred = config.side;
    if !config.avoid_collisions {
        return preferred;
    }

    let needed = main_extent(preferred, panel);
    let preferred_room = space_on(preferred, trigger, bounds, config.side_offset);
    if preferred_room >= needed {
        return preferred;
    }

    let opposite = preferred.opposite();
    let opposite_room = space_on(opposite, trigger, bounds, config.side_offset);
    if opposite_room >= needed || opposite_room > preferred_room {
        opposite
    } else {
        preferred
    }
}

/// Compute where a panel of size `panel` goes relative to `trigger`.
pub fn compute_placement(
    trigger: Rect,
    panel: Size,
    viewport: Rect,
    config: &PlacementConfig,
) -> Placement {
    let bounds = viewport.inset(Insets::uniform(config.collision_padding));
    // Flip against the height the panel renders at, not its natural height.
    let mut capped = panel;
    if let Some(limit) = config.max_panel_height {
        capped.height = capped.height.min(limit);
    }
    let side = resolve_side(trigger, capped, bounds, config);
    let room = space_on(side, trigger, bounds, config.side_offset).max(0.0);

    let (available_width, available_height) = if side.is_vertical() {
        (bounds.width(), room)
    } else {
        (room, bounds.height())
    };

    let max_height = config
        .max_panel_height
        .map(|limit| limit.min(available_height).max(0.0));
    let min_width = config.match_trigger_width.then_some(trigger.width());

    // Size as rendered once the constraints apply.
    let mut size = panel;
    if let Some(max_height) = max_height {
        size.height = size.height.min(max_height);
    }
    if let Some(min_width) = min_width {
        size.width = size.width.max(min_width);
    }

    let offset = config.side_offset;
    let align_offset = match config.align {
        Align::End => -config.align_offset,
        _ => config.align_offset,
    };

    let mut pos = if side.is_vertical() {
        let x = match config.align {
            Align::Start => trigger.left(),
            Align::Center => trigger.center().x - size.width / 2.0,
            Align::End => trigger.right() - size.width,
        } + align_offset;
        let y = match side {
            Side::Top => trigger.top() - offset - size.height,
            _ => trigger.bottom() + offset,
        };
        Vec2::new(x, y)
    } else {
        let y = match config.align {
            Align::Start => trigger.top(),
            Align::Center => trigger.center().y - size.height / 2.0,
            Align::End => trigger.bottom() - size.height,
        } + align_offset;
        let x = match side {
            Side::Left => trigger.left() - offset - size.width,
            _ => trigger.right() + offset,
        };
        Vec2::new(x, y)
    };

    if config.avoid_collisions {
        // Shift along the cross axis only; the leading edge wins when the
        // panel is larger than the bounds.
        let lower = Vec2::new(bounds.left(), bounds.top());
        let upper = Vec2::new(bounds.right(), bounds.bottom()) - size.to_vec2();
        let shifted = pos.min(upper).max(lower);
        if side.is_vertical() {
            pos.x = shifted.x;
        } else {
            pos.y = shifted.y;
        }
    }

    Placement {
        side,
        align: config.align,
        x: pos.x,
        y: pos.y,
        max_height,
        min_width,
        available_width,
        available_height,
    }
}

// ============================================================================
// Continuous repositioning
// ============================================================================

/// Callback invoked with each new placement.
pub type PlacementCallback = Arc<dyn Fn(&Placement) + Send + Sync>;

struct RepositionInner {
    platform: Arc<dyn Platform>,
    trigger: ElementId,
    panel: ElementId,
    config: PlacementConfig,
    on_update: PlacementCallback,
    last: Mutex<Option<Placement>>,
    subscriptions: Mutex<Vec<Subscription>>,
    active: AtomicBool,
}

impl RepositionInner {
    fn measure(&self) -> Placement {
        let viewport = self.platform.viewport();
        let Some(trigger) = self.platform.bounding_rect(self.trigger) else {
            tracing::warn!(
                target: targets::POSITIONING,
                trigger = ?self.trigger,
                "trigger is not attached; keeping last placement"
            );
            return (*self.last.lock())
                .unwrap_or_else(|| Placement::anchored_at_origin(&self.config, viewport));
        };
        let panel = self
            .platform
            .bounding_rect(self.panel)
            .map(|rect| rect.size)
            .unwrap_or_default();
        compute_placement(trigger, panel, viewport, &self.config)
    }

    fn update(&self) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        let placement = self.measure();
        self.platform
            .apply_panel_geometry(self.panel, &placement.to_geometry());

        let changed = {
            let mut last = self.last.lock();
            let changed = *last != Some(placement);
            *last = Some(placement);
            changed
        };
        if changed {
            tracing::trace!(
                target: targets::POSITIONING,
                side = placement.side.as_str(),
                x = placement.x,
                y = placement.y,
                "placement updated"
            );
            (self.on_update)(&placement);
        }
    }
}

/// Keeps a panel positioned while it is open.
///
/// Cancelling (or dropping) the handle removes every observer it installed.
#[must_use = "dropping a RepositionHandle stops repositioning"]
pub struct RepositionHandle {
    inner: Arc<RepositionInner>,
}

impl RepositionHandle {
    /// The most recent placement.
    pub fn placement(&self) -> Option<Placement> {
        *self.inner.last.lock()
    }

    /// Recompute now.
    pub fn update(&self) {
        self.inner.update();
    }

    /// Whether the observers are still installed.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Stop observing. Calling this more than once is a no-op.
    pub fn cancel(&self) {
        if !self.inner.active.swap(false, Ordering::AcqRel) {
            return;
        }
        let subscriptions = std::mem::take(&mut *self.inner.subscriptions.lock());
        tracing::trace!(
            target: targets::POSITIONING,
            observers = subscriptions.len(),
            "auto reposition cancelled"
        );
        drop(subscriptions);
    }
}

impl Drop for RepositionHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for RepositionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositionHandle")
            .field("trigger", &self.inner.trigger)
            .field("panel", &self.inner.panel)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Place `panel` now and keep it placed until the handle is cancelled.
///
/// The first placement is computed and applied before this returns, and
/// `on_update` has already seen it. Later recomputations run on trigger layout
/// changes, panel layout changes and viewport changes; `on_update` only fires
/// when the placement actually changed.
pub fn start_auto_reposition(
    platform: Arc<dyn Platform>,
    trigger: ElementId,
    panel: ElementId,
    config: PlacementConfig,
    on_update: PlacementCallback,
) -> RepositionHandle {
    let inner = Arc::new(RepositionInner {
        platform: platform.clone(),
        trigger,
        panel,
        config,
        on_update,
        last: Mutex::new(None),
        subscriptions: Mutex::new(Vec::new()),
        active: AtomicBool::new(true),
    });

    inner.update();

    let listener = |weak: Weak<RepositionInner>| -> Arc<dyn Fn() + Send + Sync> {
        Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.update();
            }
        })
    };
    let subscriptions = vec![
        platform.observe_layout(trigger, listener(Arc::downgrade(&inner))),
        platform.observe_layout(panel, listener(Arc::downgrade(&inner))),
        platform.on_viewport_change(listener(Arc::downgrade(&inner))),
    ];
    *inner.subscriptions.lock() = subscriptions;

    RepositionHandle { inner }
}

static_assertions::assert_impl_all!(RepositionHandle: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::HeadlessDocument;

    fn viewport() -> Rect {
        Rect::new(0.0, 0.0, 800.0, 600.0)
    }

    fn config() -> PlacementConfig {
        PlacementConfig::default()
            .with_side_offset(0.0)
            .with_collision_padding(0.0)
    }

    #[test]
    fn test_preferred_side_when_it_fits() {
        let trigger = Rect::new(100.0, 100.0, 80.0, 20.0);
        let placement = compute_placement(trigger, Size::new(100.0, 50.0), viewport(), &config());

        assert_eq!(placement.side, Side::Bottom);
        assert_eq!((placement.x, placement.y), (100.0, 120.0));
    }

    #[test]
    fn test_flip_to_top_near_bottom_edge() {
        let trigger = Rect::new(100.0, 550.0, 80.0, 20.0);
        let cfg = config().with_collision_padding(10.0);
        let panel = Size::new(100.0, 200.0);

        let placement = compute_placement(trigger, panel, viewport(), &cfg);

        assert_eq!(placement.side, Side::Top);
        assert_eq!(placement.y, 350.0);
        let rect = Rect::new(placement.x, placement.y, panel.width, panel.height);
        assert!(viewport().inset(Insets::uniform(10.0)).contains_rect(&rect));
    }

    #[test]
    fn test_flip_horizontal() {
        let trigger = Rect::new(700.0, 100.0, 80.0, 20.0);
        let cfg = config().with_side(Side::Right);

        let placement = compute_placement(trigger, Size::new(150.0, 100.0), viewport(), &cfg);

        assert_eq!(placement.side, Side::Left);
        assert_eq!(placement.x, 550.0);
    }

    #[test]
    fn test_takes_roomier_side_when_neither_fits() {
        // 250px above, 330px below; the panel needs 400px.
        let trigger = Rect::new(100.0, 250.0, 80.0, 20.0);
        let cfg = config().with_side(Side::Top);

        let placement = compute_placement(trigger, Size::new(100.0, 400.0), viewport(), &cfg);

        assert_eq!(placement.side, Side::Bottom);
    }

    #[test]
    fn test_shift_never_flips_alignment() {
        let trigger = Rect::new(760.0, 100.0, 30.0, 20.0);
        let cfg = config().with_collision_padding(8.0);

        let placement = compute_placement(trigger, Size::new(200.0, 50.0), viewport(), &cfg);

        assert_eq!(placement.align, Align::Start);
        assert_eq!(placement.x, 800.0 - 8.0 - 200.0);
    }

    #[test]
    fn test_no_collision_avoidance() {
        let trigger = Rect::new(760.0, 580.0, 30.0, 20.0);
        let mut cfg = config();
        cfg.avoid_collisions = false;

        let placement = compute_placement(trigger, Size::new(200.0, 50.0), viewport(), &cfg);

        assert_eq!(placement.side, Side::Bottom);
        assert_eq!((placement.x, placement.y), (760.0, 600.0));
    }

    #[test]
    fn test_alignment_and_offsets() {
        let trigger = Rect::new(200.0, 100.0, 100.0, 20.0);
        let panel = Size::new(60.0, 40.0);

        let center = config().with_align(Align::Center).with_align_offset(5.0);
        assert_eq!(compute_placement(trigger, panel, viewport(), &center).x, 225.0);

        let end = config().with_align(Align::End).with_align_offset(5.0);
        assert_eq!(compute_placement(trigger, panel, viewport(), &end).x, 235.0);

        let offset = config().with_side_offset(6.0);
        assert_eq!(compute_placement(trigger, panel, viewport(), &offset).y, 126.0);
    }

    #[test]
    fn test_max_height_clamped_to_room() {
        let trigger = Rect::new(100.0, 400.0, 80.0, 20.0);
        let cfg = config().with_max_panel_height(384.0);

        // 180px below, 400px above: the 500px panel flips up and is clamped.
        let placement = compute_placement(trigger, Size::new(100.0, 500.0), viewport(), &cfg);

        assert_eq!(placement.side, Side::Top);
        assert_eq!(placement.max_height, Some(384.0));
        assert_eq!(placement.y, 400.0 - 384.0);
        assert_eq!(placement.available_height, 400.0);
    }

    #[test]
    fn test_capped_panel_keeps_preferred_side() {
        // 260px below; the 500px panel renders at 200px and fits there.
        let trigger = Rect::new(100.0, 320.0, 80.0, 20.0);
        let cfg = config().with_max_panel_height(200.0);

        let placement = compute_placement(trigger, Size::new(100.0, 500.0), viewport(), &cfg);

        assert_eq!(placement.side, Side::Bottom);
        assert_eq!(placement.y, 340.0);
        assert_eq!(placement.max_height, Some(200.0));
    }

    #[test]
    fn test_match_trigger_width() {
        let trigger = Rect::new(100.0, 100.0, 240.0, 20.0);
        let cfg = config().with_trigger_width();

        let placement = compute_placement(trigger, Size::new(100.0, 50.0), viewport(), &cfg);

        assert_eq!(placement.min_width, Some(240.0));
        assert_eq!(placement.to_geometry().min_width, Some(240.0));
    }

    #[test]
    fn test_zero_size_trigger_is_not_fatal() {
        let placement = compute_placement(Rect::ZERO, Size::ZERO, viewport(), &config());
        assert_eq!(placement.side, Side::Bottom);
        assert_eq!((placement.x, placement.y), (0.0, 0.0));
    }

    #[test]
    fn test_config_deserializes_lowercase() {
        let cfg: PlacementConfig = toml::from_str(
            r#"
            side = "right"
            align = "end"
            side_offset = 2.0
            "#,
        )
        .unwrap();

        assert_eq!(cfg.side, Side::Right);
        assert_eq!(cfg.align, Align::End);
        assert_eq!(cfg.side_offset, 2.0);
        assert!(cfg.avoid_collisions);
    }

    struct Fixture {
        doc: Arc<HeadlessDocument>,
        trigger: ElementId,
        panel: ElementId,
        updates: Arc<Mutex<Vec<Placement>>>,
    }

    fn fixture() -> Fixture {
        let doc = Arc::new(HeadlessDocument::new(viewport()));
        let trigger = doc.create_element(None, Rect::new(100.0, 100.0, 80.0, 20.0));
        let panel = doc.create_element(None, Rect::new(0.0, 0.0, 120.0, 60.0));
        Fixture {
            doc,
            trigger,
            panel,
            updates: Arc::new(Mutex::new(Vec::new())),
        }
    }

    impl Fixture {
        fn start(&self) -> RepositionHandle {
            let updates = self.updates.clone();
            start_auto_reposition(
                self.doc.clone(),
                self.trigger,
                self.panel,
                config(),
                Arc::new(move |p: &Placement| updates.lock().push(*p)),
            )
        }
    }

    #[test]
    fn test_auto_reposition_places_synchronously() {
        let f = fixture();
        let handle = f.start();

        assert_eq!(f.updates.lock().len(), 1);
        let geometry = f.doc.panel_geometry(f.panel).unwrap();
        assert_eq!((geometry.x, geometry.y), (100.0, 120.0));
        assert_eq!(handle.placement().map(|p| p.y), Some(120.0));
    }

    #[test]
    fn test_auto_reposition_tracks_scroll_and_resize() {
        let f = fixture();
        let _handle = f.start();

        f.doc.scroll_by(0.0, 50.0);
        assert_eq!(f.updates.lock().last().map(|p| p.y), Some(70.0));

        f.doc.set_rect(f.trigger, Rect::new(300.0, 100.0, 80.0, 20.0));
        assert_eq!(f.updates.lock().last().map(|p| p.x), Some(300.0));
    }

    #[test]
    fn test_cancel_removes_every_observer() {
        let f = fixture();
        let handle = f.start();
        assert_eq!(f.doc.layout_observer_count(), 2);
        assert_eq!(f.doc.viewport_listener_count(), 1);

        handle.cancel();
        handle.cancel();

        assert!(!handle.is_active());
        assert_eq!(f.doc.layout_observer_count(), 0);
        assert_eq!(f.doc.viewport_listener_count(), 0);

        f.doc.scroll_by(0.0, 10.0);
        assert_eq!(f.updates.lock().len(), 1);
    }

    #[test]
    fn test_drop_cancels() {
        let f = fixture();
        drop(f.start());
        assert_eq!(f.doc.layout_observer_count(), 0);
        assert_eq!(f.doc.viewport_listener_count(), 0);
    }

    #[test]
    fn test_detached_trigger_keeps_last_known_good() {
        let f = fixture();
        let handle = f.start();
        let before = handle.placement();

        f.doc.remove_element(f.trigger);
        handle.update();

        assert_eq!(handle.placement(), before);
    }
}
