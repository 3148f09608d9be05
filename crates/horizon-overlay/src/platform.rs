//! Platform abstraction.
//!
//! The overlay controllers never reach into a live document. Everything they
//! need from the host (geometry reads, containment checks, document-level
//! pointer and key events, layout observation, focus) goes through the
//! [`Platform`] trait. A browser host implements it over the DOM; tests and
//! headless hosts use [`HeadlessDocument`](crate::HeadlessDocument).

use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::new_key_type;

use crate::geometry::{Point, Rect};
use crate::keyboard::KeyEvent;

new_key_type! {
    /// Opaque handle to a host element (a trigger, a panel, a panel item).
    pub struct ElementId;
}

/// A pointer-down anywhere in the document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerDownEvent {
    /// The innermost element under the pointer, if any.
    pub target: Option<ElementId>,
    /// Viewport-relative pointer position.
    pub position: Point,
}

/// Geometry the core writes to a panel so positioning takes visual effect.
///
/// This is the only presentation state the core touches; ARIA and data
/// attributes are the host adapter's job.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PanelGeometry {
    /// Viewport-relative left coordinate.
    pub x: f32,
    /// Viewport-relative top coordinate.
    pub y: f32,
    /// Minimum width, e.g. the trigger width for select-like panels.
    pub min_width: Option<f32>,
    /// Maximum height the panel may grow to on its resolved side.
    pub max_height: Option<f32>,
}

/// Listener for document-level pointer-down events.
pub type PointerListener = Arc<dyn Fn(&PointerDownEvent) + Send + Sync>;

/// Listener for document-level key-down events.
///
/// Returns `true` when the event was handled (the host then prevents the
/// default action).
pub type KeyListener = Arc<dyn Fn(&KeyEvent) -> bool + Send + Sync>;

/// Listener for layout changes (element resize or move, viewport scroll or
/// resize).
pub type LayoutListener = Arc<dyn Fn() + Send + Sync>;

/// The host environment the overlay controllers run against.
pub trait Platform: Send + Sync {
    /// Whether the element is attached to the document.
    fn is_connected(&self, element: ElementId) -> bool;

    /// The element's viewport-relative bounding rectangle, or `None` when the
    /// element is not attached.
    fn bounding_rect(&self, element: ElementId) -> Option<Rect>;

    /// The visible viewport rectangle.
    fn viewport(&self) -> Rect;

    /// Whether `node` is `ancestor` or one of its descendants.
    fn contains(&self, ancestor: ElementId, node: ElementId) -> bool;

    /// Write positioning geometry to a panel.
    fn apply_panel_geometry(&self, panel: ElementId, geometry: &PanelGeometry);

    /// Move keyboard focus to an element.
    fn focus(&self, element: ElementId);

    /// The currently focused element.
    fn focused(&self) -> Option<ElementId>;

    /// Set (`Some`) or remove (`None`) an attribute. Used by host adapters only.
    fn set_attribute(&self, element: ElementId, name: &str, value: Option<&str>);

    /// Listen for pointer-down anywhere in the document (capture phase).
    fn on_pointer_down(&self, listener: PointerListener) -> Subscription;

    /// Listen for key-down anywhere in the document.
    fn on_key_down(&self, listener: KeyListener) -> Subscription;

    /// Observe size and position changes of one element.
    fn observe_layout(&self, element: ElementId, listener: LayoutListener) -> Subscription;

    /// Observe viewport scroll and resize.
    fn on_viewport_change(&self, listener: LayoutListener) -> Subscription;
}

/// An active listener registration.
///
/// [`unsubscribe`](Self::unsubscribe) is idempotent, and dropping the value
/// unsubscribes.
#[must_use = "dropping a Subscription removes the listener"]
pub struct Subscription {
    remove: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    /// Wrap the closure that removes the listener.
    pub fn new<F>(remove: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            remove: Mutex::new(Some(Box::new(remove))),
        }
    }

    /// A subscription with nothing to remove.
    pub fn empty() -> Self {
        Self {
            remove: Mutex::new(None),
        }
    }

    /// Whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        self.remove.lock().is_some()
    }

    /// Remove the listener. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        let remove = self.remove.lock().take();
        if let Some(remove) = remove {
            remove();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

static_assertions::assert_impl_all!(Subscription: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_unsubscribes_once() {
        let count = Arc::new(Mutex::new(0));
        let count_clone = count.clone();
        let subscription = Subscription::new(move || *count_clone.lock() += 1);

        assert!(subscription.is_active());
        subscription.unsubscribe();
        subscription.unsubscribe();
        drop(subscription);

        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_subscription_drop_unsubscribes() {
        let count = Arc::new(Mutex::new(0));
        let count_clone = count.clone();
        drop(Subscription::new(move || *count_clone.lock() += 1));

        assert_eq!(*count.lock(), 1);
    }
}
