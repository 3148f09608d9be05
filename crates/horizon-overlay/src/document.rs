//! In-memory document implementing [`Platform`].
//!
//! [`HeadlessDocument`] models exactly what the overlay controllers consume:
//! an element tree with rectangles and attributes, focus, and document-level
//! listener registries. It is the fixed-geometry stub for tests and a usable
//! backend for hosts that render overlays themselves.
//!
//! Panel geometry written by the core moves the panel (and applies min-width
//! and max-height to its rendered size) but is not reported to layout
//! observers: only host-driven changes ([`set_rect`](HeadlessDocument::set_rect),
//! [`scroll_by`](HeadlessDocument::scroll_by),
//! [`set_viewport`](HeadlessDocument::set_viewport)) count as layout changes.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};

use crate::geometry::{Point, Rect};
use crate::keyboard::KeyEvent;
use crate::platform::{
    ElementId, KeyListener, LayoutListener, PanelGeometry, Platform, PointerDownEvent,
    PointerListener, Subscription,
};

new_key_type! {
    struct ListenerId;
}

/// One node of the document tree.
#[derive(Debug, Default)]
struct Element {
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    /// Host-provided layout (natural size and position).
    natural: Rect,
    /// Geometry last written by the positioning engine.
    geometry: Option<PanelGeometry>,
    attributes: BTreeMap<String, String>,
}

impl Element {
    /// The rectangle as rendered, with panel geometry applied.
    fn rendered(&self) -> Rect {
        let Some(geometry) = self.geometry else {
            return self.natural;
        };
        let mut width = self.natural.width();
        if let Some(min_width) = geometry.min_width {
            width = width.max(min_width);
        }
        let mut height = self.natural.height();
        if let Some(max_height) = geometry.max_height {
            height = height.min(max_height);
        }
        Rect::new(geometry.x, geometry.y, width, height)
    }
}

#[derive(Default)]
struct DocumentState {
    elements: SlotMap<ElementId, Element>,
    viewport: Rect,
    focused: Option<ElementId>,
    pointer_listeners: SlotMap<ListenerId, PointerListener>,
    key_listeners: SlotMap<ListenerId, KeyListener>,
    layout_observers: SlotMap<ListenerId, (ElementId, LayoutListener)>,
    viewport_listeners: SlotMap<ListenerId, LayoutListener>,
}

/// A headless, in-memory document.
///
/// # Example
///
/// ```
/// use horizon_overlay::{HeadlessDocument, Platform, Rect};
///
/// let document = HeadlessDocument::new(Rect::new(0.0, 0.0, 800.0, 600.0));
/// let menu = document.create_element(None, Rect::new(10.0, 10.0, 120.0, 200.0));
/// let item = document.create_element(Some(menu), Rect::new(10.0, 10.0, 120.0, 24.0));
///
/// assert!(document.contains(menu, item));
/// assert!(!document.contains(item, menu));
/// ```
pub struct HeadlessDocument {
    state: Arc<Mutex<DocumentState>>,
}

impl HeadlessDocument {
    /// Create an empty document with the given viewport.
    pub fn new(viewport: Rect) -> Self {
        Self {
            state: Arc::new(Mutex::new(DocumentState {
                viewport,
                ..DocumentState::default()
            })),
        }
    }

    fn weak_state(&self) -> Weak<Mutex<DocumentState>> {
        Arc::downgrade(&self.state)
    }

    // =========================================================================
    // Tree
    // =========================================================================

    /// Create an element, optionally as a child of `parent`.
    ///
    /// A parent that is not in the document is ignored (the element becomes a
    /// root, like a portal).
    pub fn create_element(&self, parent: Option<ElementId>, rect: Rect) -> ElementId {
        let mut state = self.state.lock();
        let parent = parent.filter(|p| state.elements.contains_key(*p));
        let id = state.elements.insert(Element {
            parent,
            natural: rect,
            ..Element::default()
        });
        if let Some(parent) = parent
            && let Some(parent) = state.elements.get_mut(parent)
        {
            parent.children.push(id);
        }
        id
    }

    /// Remove an element and its whole subtree.
    pub fn remove_element(&self, element: ElementId) {
        let mut state = self.state.lock();
        let Some(removed) = state.elements.remove(element) else {
            return;
        };
        if let Some(parent) = removed.parent
            && let Some(parent) = state.elements.get_mut(parent)
        {
            parent.children.retain(|child| *child != element);
        }

        let mut stack = removed.children;
        while let Some(child) = stack.pop() {
            if let Some(node) = state.elements.remove(child) {
                stack.extend(node.children);
            }
        }

        if state
            .focused
            .is_some_and(|focused| !state.elements.contains_key(focused))
        {
            state.focused = None;
        }
        let state = &mut *state;
        let elements = &state.elements;
        state
            .layout_observers
            .retain(|_, (observed, _)| elements.contains_key(*observed));
    }

    /// The parent of an element.
    pub fn parent(&self, element: ElementId) -> Option<ElementId> {
        self.state.lock().elements.get(element)?.parent
    }

    // =========================================================================
    // Layout
    // =========================================================================

    /// Set an element's layout rectangle and notify its observers.
    pub fn set_rect(&self, element: ElementId, rect: Rect) {
        let listeners: Vec<LayoutListener> = {
            let mut state = self.state.lock();
            let Some(node) = state.elements.get_mut(element) else {
                return;
            };
            if node.natural == rect {
                return;
            }
            node.natural = rect;
            state
                .layout_observers
                .values()
                .filter(|(observed, _)| *observed == element)
                .map(|(_, listener)| listener.clone())
                .collect()
        };
        for listener in listeners {
            listener();
        }
    }

    /// Scroll the document: every element moves by `(-dx, -dy)`.
    ///
    /// Notifies every layout observer and viewport listener.
    pub fn scroll_by(&self, dx: f32, dy: f32) {
        let listeners: Vec<LayoutListener> = {
            let mut state = self.state.lock();
            for node in state.elements.values_mut() {
                node.natural = node.natural.translate(-dx, -dy);
                if let Some(geometry) = node.geometry.as_mut() {
                    geometry.x -= dx;
                    geometry.y -= dy;
                }
            }
            state
                .layout_observers
                .values()
                .map(|(_, listener)| listener.clone())
                .chain(state.viewport_listeners.values().cloned())
                .collect()
        };
        for listener in listeners {
            listener();
        }
    }

    /// Resize the viewport and notify viewport listeners.
    pub fn set_viewport(&self, viewport: Rect) {
        let listeners: Vec<LayoutListener> = {
            let mut state = self.state.lock();
            state.viewport = viewport;
            state.viewport_listeners.values().cloned().collect()
        };
        for listener in listeners {
            listener();
        }
    }

    /// The geometry last applied to a panel.
    pub fn panel_geometry(&self, panel: ElementId) -> Option<PanelGeometry> {
        self.state.lock().elements.get(panel)?.geometry
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Read an attribute.
    pub fn attribute(&self, element: ElementId, name: &str) -> Option<String> {
        self.state
            .lock()
            .elements
            .get(element)?
            .attributes
            .get(name)
            .cloned()
    }

    /// Check whether an attribute is present.
    pub fn has_attribute(&self, element: ElementId, name: &str) -> bool {
        self.attribute(element, name).is_some()
    }

    // =========================================================================
    // Event dispatch
    // =========================================================================

    /// Dispatch a pointer-down on `target` (or on empty space with `None`).
    pub fn dispatch_pointer_down(&self, target: Option<ElementId>) {
        let (position, listeners) = {
            let state = self.state.lock();
            let position = target
                .and_then(|t| state.elements.get(t))
                .map(|node| node.rendered().center())
                .unwrap_or(Point::ZERO);
            let listeners: Vec<PointerListener> =
                state.pointer_listeners.values().cloned().collect();
            (position, listeners)
        };
        let event = PointerDownEvent { target, position };
        for listener in listeners {
            listener(&event);
        }
    }

    /// Dispatch a key-down to the document.
    ///
    /// The event's target defaults to the focused element. Returns `true` when
    /// any listener handled the key.
    pub fn dispatch_key_down(&self, event: KeyEvent) -> bool {
        let (event, listeners) = {
            let state = self.state.lock();
            let event = KeyEvent {
                target: event.target.or(state.focused),
                ..event
            };
            let listeners: Vec<KeyListener> = state.key_listeners.values().cloned().collect();
            (event, listeners)
        };
        let mut handled = false;
        for listener in listeners {
            handled |= listener(&event);
        }
        handled
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Number of document-level pointer-down listeners.
    pub fn pointer_listener_count(&self) -> usize {
        self.state.lock().pointer_listeners.len()
    }

    /// Number of document-level key-down listeners.
    pub fn key_listener_count(&self) -> usize {
        self.state.lock().key_listeners.len()
    }

    /// Number of element layout observers.
    pub fn layout_observer_count(&self) -> usize {
        self.state.lock().layout_observers.len()
    }

    /// Number of viewport listeners.
    pub fn viewport_listener_count(&self) -> usize {
        self.state.lock().viewport_listeners.len()
    }
}

impl Platform for HeadlessDocument {
    fn is_connected(&self, element: ElementId) -> bool {
        self.state.lock().elements.contains_key(element)
    }

    fn bounding_rect(&self, element: ElementId) -> Option<Rect> {
        self.state
            .lock()
            .elements
            .get(element)
            .map(Element::rendered)
    }

    fn viewport(&self) -> Rect {
        self.state.lock().viewport
    }

    fn contains(&self, ancestor: ElementId, node: ElementId) -> bool {
        let state = self.state.lock();
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = state.elements.get(id).and_then(|n| n.parent);
        }
        false
    }

    fn apply_panel_geometry(&self, panel: ElementId, geometry: &PanelGeometry) {
        if let Some(node) = self.state.lock().elements.get_mut(panel) {
            node.geometry = Some(*geometry);
        }
    }

    fn focus(&self, element: ElementId) {
        let mut state = self.state.lock();
        if state.elements.contains_key(element) {
            state.focused = Some(element);
        }
    }

    fn focused(&self) -> Option<ElementId> {
        self.state.lock().focused
    }

    fn set_attribute(&self, element: ElementId, name: &str, value: Option<&str>) {
        let mut state = self.state.lock();
        let Some(node) = state.elements.get_mut(element) else {
            return;
        };
        match value {
            Some(value) => {
                node.attributes.insert(name.to_owned(), value.to_owned());
            }
            None => {
                node.attributes.remove(name);
            }
        }
    }

    fn on_pointer_down(&self, listener: PointerListener) -> Subscription {
        let id = self.state.lock().pointer_listeners.insert(listener);
        let weak = self.weak_state();
        Subscription::new(move || {
            if let Some(state) = weak.upgrade() {
                state.lock().pointer_listeners.remove(id);
            }
        })
    }

    fn on_key_down(&self, listener: KeyListener) -> Subscription {
        let id = self.state.lock().key_listeners.insert(listener);
        let weak = self.weak_state();
        Subscription::new(move || {
            if let Some(state) = weak.upgrade() {
                state.lock().key_listeners.remove(id);
            }
        })
    }

    fn observe_layout(&self, element: ElementId, listener: LayoutListener) -> Subscription {
        let id = self
            .state
            .lock()
            .layout_observers
            .insert((element, listener));
        let weak = self.weak_state();
        Subscription::new(move || {
            if let Some(state) = weak.upgrade() {
                state.lock().layout_observers.remove(id);
            }
        })
    }

    fn on_viewport_change(&self, listener: LayoutListener) -> Subscription {
        let id = self.state.lock().viewport_listeners.insert(listener);
        let weak = self.weak_state();
        Subscription::new(move || {
            if let Some(state) = weak.upgrade() {
                state.lock().viewport_listeners.remove(id);
            }
        })
    }
}

impl std::fmt::Debug for HeadlessDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("HeadlessDocument")
            .field("elements", &state.elements.len())
            .field("viewport", &state.viewport)
            .field("focused", &state.focused)
            .finish()
    }
}
