//! Host adapters.
//!
//! Each adapter wires host elements to the overlay engines and reflects the
//! resulting state as ARIA and data attributes:
//!
//! - [`Select`]: a listbox picker committing one value
//! - [`Menu`]: a dropdown menu with checkbox, radio and nested submenu items
//! - [`Menubar`]: a row of menus with hover takeover
//! - [`NavigationMenu`]: hover-driven navigation panels with a skip-delay window
//!
//! Adapters share one [`OverlayContext`] per document, so every panel they
//! open lands in the same dismissal layer stack.

mod menu;
mod menubar;
mod navigation_menu;
mod select;

pub use menu::{Menu, MenuItem, MenuItemKind, MenuSelection};
pub use menubar::{Menubar, MenubarMenu};
pub use navigation_menu::{NavigationItem, NavigationMenu};
pub use select::{Select, SelectOption};

use std::sync::Arc;

use horizon_overlay_core::EventLoop;
use slotmap::Key;

use crate::config::OverlayConfig;
use crate::disclosure::{Disclosure, DisclosureOptions};
use crate::dismissal::DismissalLayers;
use crate::error::Result;
use crate::platform::{ElementId, Platform};
use crate::positioning::Placement;

/// Everything an adapter needs from its environment.
#[derive(Clone)]
pub struct OverlayContext {
    platform: Arc<dyn Platform>,
    event_loop: EventLoop,
    layers: DismissalLayers,
    config: Arc<OverlayConfig>,
}

impl OverlayContext {
    /// Create a context with the default configuration.
    pub fn new(platform: Arc<dyn Platform>, event_loop: EventLoop) -> Self {
        Self::with_config(platform, event_loop, OverlayConfig::default())
    }

    /// Create a context with an explicit configuration.
    pub fn with_config(
        platform: Arc<dyn Platform>,
        event_loop: EventLoop,
        config: OverlayConfig,
    ) -> Self {
        let layers = DismissalLayers::new(platform.clone(), event_loop.clone());
        Self {
            platform,
            event_loop,
            layers,
            config: Arc::new(config),
        }
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    pub fn layers(&self) -> &DismissalLayers {
        &self.layers
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Build a disclosure sharing this context's dismissal layers.
    pub fn disclosure(
        &self,
        trigger: ElementId,
        panel: ElementId,
        options: DisclosureOptions,
    ) -> Result<Disclosure> {
        Disclosure::builder(self.platform.clone(), self.event_loop.clone())
            .trigger(trigger)
            .panel(panel)
            .options(options)
            .layers(self.layers.clone())
            .build()
    }
}

impl std::fmt::Debug for OverlayContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayContext")
            .field("event_loop", &self.event_loop)
            .field("layers", &self.layers)
            .finish()
    }
}

// ============================================================================
// Attribute reflection
// ============================================================================

/// The `id` attribute value used for an element.
pub fn dom_id(element: ElementId) -> String {
    format!("horizon-overlay-{}", element.data().as_ffi())
}

/// Static wiring between a trigger and its panel.
fn link(platform: &dyn Platform, trigger: ElementId, panel: ElementId, popup: Option<&str>) {
    let panel_id = dom_id(panel);
    platform.set_attribute(panel, "id", Some(&panel_id));
    platform.set_attribute(trigger, "aria-haspopup", popup);
    platform.set_attribute(trigger, "aria-controls", Some(&panel_id));
}

/// Reflect the open state on a trigger/panel pair.
fn reflect_open(platform: &dyn Platform, trigger: ElementId, panel: ElementId, open: bool) {
    let state = if open { "open" } else { "closed" };
    platform.set_attribute(trigger, "aria-expanded", Some(if open { "true" } else { "false" }));
    platform.set_attribute(trigger, "data-state", Some(state));
    platform.set_attribute(panel, "data-state", Some(state));
    platform.set_attribute(panel, "hidden", (!open).then_some(""));
    if !open {
        platform.set_attribute(panel, "data-side", None);
        platform.set_attribute(panel, "data-align", None);
    }
}

/// Reflect the resolved side and alignment on a panel.
fn reflect_placement(platform: &dyn Platform, panel: ElementId, placement: &Placement) {
    platform.set_attribute(panel, "data-side", Some(placement.side.as_str()));
    platform.set_attribute(panel, "data-align", Some(placement.align.as_str()));
}

/// Mark exactly one item as highlighted.
fn reflect_highlight(
    platform: &dyn Platform,
    items: impl IntoIterator<Item = ElementId>,
    highlighted: Option<ElementId>,
) {
    for item in items {
        let value = (Some(item) == highlighted).then_some("");
        platform.set_attribute(item, "data-highlighted", value);
    }
}

/// Reflect an item's disabled flag.
fn reflect_disabled(platform: &dyn Platform, item: ElementId, disabled: bool) {
    platform.set_attribute(item, "aria-disabled", disabled.then_some("true"));
    platform.set_attribute(item, "data-disabled", disabled.then_some(""));
}

/// Keep `data-side`/`data-align` current while the disclosure is open.
fn wire_placement(disclosure: &Disclosure, platform: Arc<dyn Platform>) {
    let panel = disclosure.panel();
    disclosure
        .placement_changed()
        .connect(move |placement| reflect_placement(platform.as_ref(), panel, placement));
}

fn bool_attr(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::HeadlessDocument;
    use crate::geometry::Rect;

    #[test]
    fn test_link_and_reflect() {
        let doc = Arc::new(HeadlessDocument::new(Rect::new(0.0, 0.0, 800.0, 600.0)));
        let trigger = doc.create_element(None, Rect::ZERO);
        let panel = doc.create_element(None, Rect::ZERO);

        link(doc.as_ref(), trigger, panel, Some("menu"));
        reflect_open(doc.as_ref(), trigger, panel, false);

        assert_eq!(doc.attribute(trigger, "aria-controls"), Some(dom_id(panel)));
        assert_eq!(doc.attribute(panel, "id"), Some(dom_id(panel)));
        assert_eq!(doc.attribute(trigger, "aria-expanded").as_deref(), Some("false"));
        assert!(doc.has_attribute(panel, "hidden"));

        reflect_open(doc.as_ref(), trigger, panel, true);
        assert_eq!(doc.attribute(panel, "data-state").as_deref(), Some("open"));
        assert!(!doc.has_attribute(panel, "hidden"));
    }

    #[test]
    fn test_context_shares_layers() {
        let doc = Arc::new(HeadlessDocument::new(Rect::new(0.0, 0.0, 800.0, 600.0)));
        let ctx = OverlayContext::new(doc.clone(), EventLoop::new());
        let a = ctx
            .disclosure(
                doc.create_element(None, Rect::ZERO),
                doc.create_element(None, Rect::ZERO),
                DisclosureOptions::default(),
            )
            .unwrap();
        let b = ctx
            .disclosure(
                doc.create_element(None, Rect::ZERO),
                doc.create_element(None, Rect::ZERO),
                DisclosureOptions::default(),
            )
            .unwrap();

        a.open_now();
        b.open_now();
        assert_eq!(ctx.layers().layer_count(), 2);
        assert_eq!(doc.pointer_listener_count(), 1);
    }
}
