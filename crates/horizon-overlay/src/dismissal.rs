//! Outside-pointer and Escape dismissal.
//!
//! Every open panel registers a layer with a shared [`DismissalLayers`]
//! registry. The registry owns the only document-level pointer-down and
//! key-down subscriptions, installed while at least one layer exists.
//!
//! Layers form a stack (parent menu below its submenu). A pointer-down walks
//! the stack from the innermost layer outwards:
//!
//! - a layer whose panel or trigger contains the target stops the walk, so a
//!   click inside a submenu never reaches the parent menu;
//! - the first armed layer that does not contain the target is dismissed and
//!   the walk stops, so a click outside a whole chain dismisses exactly one
//!   layer.
//!
//! A layer arms one task turn after it is registered so the pointer-down that
//! opened the panel cannot close it again. Escape always dismisses only the
//! innermost layer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use horizon_overlay_core::logging::targets;
use horizon_overlay_core::{EventLoop, TaskHandle};
use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};

use crate::keyboard::{Key, KeyEvent};
use crate::platform::{ElementId, Platform, PointerDownEvent, Subscription};

new_key_type! {
    /// Identifies one registered dismissal layer.
    pub struct LayerId;
}

/// Why a layer was dismissed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DismissReason {
    /// A pointer-down landed outside the panel and its trigger.
    PointerDownOutside,
    /// The Escape key was pressed.
    Escape,
}

/// Callback invoked when a layer is dismissed.
pub type DismissCallback = Arc<dyn Fn(DismissReason) + Send + Sync>;

struct Layer {
    panel: ElementId,
    trigger: ElementId,
    armed: bool,
    on_dismiss: DismissCallback,
    arm_task: Option<TaskHandle>,
}

#[derive(Default)]
struct LayersState {
    layers: SlotMap<LayerId, Layer>,
    /// Outermost first.
    order: Vec<LayerId>,
    pointer_subscription: Option<Subscription>,
    key_subscription: Option<Subscription>,
}

struct LayersInner {
    platform: Arc<dyn Platform>,
    event_loop: EventLoop,
    state: Mutex<LayersState>,
}

/// Shared registry of open, dismissable panels.
#[derive(Clone)]
pub struct DismissalLayers {
    inner: Arc<LayersInner>,
}

impl DismissalLayers {
    /// Create a registry over a platform.
    pub fn new(platform: Arc<dyn Platform>, event_loop: EventLoop) -> Self {
        Self {
            inner: Arc::new(LayersInner {
                platform,
                event_loop,
                state: Mutex::new(LayersState::default()),
            }),
        }
    }

    /// Register a layer on top of the stack.
    ///
    /// `on_dismiss` is invoked (with no registry lock held) when the layer is
    /// dismissed. The layer stays registered until the guard is cancelled or
    /// dropped; dismissal itself does not unregister it.
    pub fn watch(
        &self,
        panel: ElementId,
        trigger: ElementId,
        on_dismiss: DismissCallback,
    ) -> DismissGuard {
        let weak = Arc::downgrade(&self.inner);

        let (id, needs_listeners) = {
            let mut state = self.inner.state.lock();
            let id = state.layers.insert(Layer {
                panel,
                trigger,
                armed: false,
                on_dismiss,
                arm_task: None,
            });
            state.order.push(id);
            (id, state.pointer_subscription.is_none())
        };

        let arm_weak = weak.clone();
        let arm_task = self.inner.event_loop.post_task(move || {
            if let Some(inner) = arm_weak.upgrade()
                && let Some(layer) = inner.state.lock().layers.get_mut(id)
            {
                layer.armed = true;
                layer.arm_task = None;
            }
        });

        let subscriptions = needs_listeners.then(|| self.subscribe(weak.clone()));

        let mut discard = None;
        {
            let mut state = self.inner.state.lock();
            if let Some(layer) = state.layers.get_mut(id) {
                layer.arm_task = Some(arm_task);
            }
            if let Some((pointer, key)) = subscriptions {
                if state.pointer_subscription.is_none() && !state.layers.is_empty() {
                    state.pointer_subscription = Some(pointer);
                    state.key_subscription = Some(key);
                } else {
                    discard = Some((pointer, key));
                }
            }
        }
        drop(discard);

        tracing::debug!(target: targets::DISMISSAL, ?panel, depth = self.layer_count(), "layer registered");

        DismissGuard {
            layers: weak,
            id,
            active: AtomicBool::new(true),
        }
    }

    fn subscribe(&self, weak: Weak<LayersInner>) -> (Subscription, Subscription) {
        let pointer_weak = weak.clone();
        let pointer = self
            .inner
            .platform
            .on_pointer_down(Arc::new(move |event: &PointerDownEvent| {
                if let Some(inner) = pointer_weak.upgrade() {
                    inner.pointer_down(event);
                }
            }));
        let key = self
            .inner
            .platform
            .on_key_down(Arc::new(move |event: &KeyEvent| {
                weak.upgrade().is_some_and(|inner| inner.key_down(event))
            }));
        (pointer, key)
    }

    /// Number of registered layers.
    pub fn layer_count(&self) -> usize {
        self.inner.state.lock().order.len()
    }

    /// Whether no layer is registered.
    pub fn is_empty(&self) -> bool {
        self.layer_count() == 0
    }

    /// Whether the document-level listeners are installed.
    pub fn is_listening(&self) -> bool {
        self.inner.state.lock().pointer_subscription.is_some()
    }
}

impl LayersInner {
    fn pointer_down(&self, event: &PointerDownEvent) {
        let dismiss = {
            let state = self.state.lock();
            let mut hit = None;
            for id in state.order.iter().rev() {
                let Some(layer) = state.layers.get(*id) else {
                    continue;
                };
                let inside = event.target.is_some_and(|target| {
                    self.platform.contains(layer.panel, target)
                        || self.platform.contains(layer.trigger, target)
                });
                if inside {
                    break;
                }
                if layer.armed {
                    hit = Some((layer.panel, layer.on_dismiss.clone()));
                    break;
                }
            }
            hit
        };

        if let Some((panel, on_dismiss)) = dismiss {
            tracing::debug!(target: targets::DISMISSAL, ?panel, "dismissed by outside pointer-down");
            on_dismiss(DismissReason::PointerDownOutside);
        }
    }

    fn key_down(&self, event: &KeyEvent) -> bool {
        if event.key != Key::Escape {
            return false;
        }
        let innermost = {
            let state = self.state.lock();
            state
                .order
                .last()
                .and_then(|id| state.layers.get(*id))
                .map(|layer| (layer.panel, layer.on_dismiss.clone()))
        };
        let Some((panel, on_dismiss)) = innermost else {
            return false;
        };
        tracing::debug!(target: targets::DISMISSAL, ?panel, "dismissed by Escape");
        on_dismiss(DismissReason::Escape);
        true
    }

    fn remove(&self, id: LayerId) {
        let released = {
            let mut state = self.state.lock();
            let Some(layer) = state.layers.remove(id) else {
                return;
            };
            state.order.retain(|other| *other != id);
            let listeners = if state.layers.is_empty() {
                (
                    state.pointer_subscription.take(),
                    state.key_subscription.take(),
                )
            } else {
                (None, None)
            };
            (layer, listeners)
        };
        let (layer, listeners) = released;
        if let Some(task) = &layer.arm_task {
            task.cancel();
        }
        drop(listeners);
        tracing::trace!(target: targets::DISMISSAL, panel = ?layer.panel, "layer removed");
    }
}

impl std::fmt::Debug for DismissalLayers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DismissalLayers")
            .field("layers", &self.layer_count())
            .field("listening", &self.is_listening())
            .finish()
    }
}

/// Registration of one dismissal layer.
///
/// [`cancel`](Self::cancel) is idempotent; dropping the guard cancels.
#[must_use = "dropping a DismissGuard unregisters the layer"]
pub struct DismissGuard {
    layers: Weak<LayersInner>,
    id: LayerId,
    active: AtomicBool,
}

impl DismissGuard {
    /// The layer this guard registered.
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Whether the layer is still registered through this guard.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Unregister the layer.
    pub fn cancel(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(inner) = self.layers.upgrade() {
            inner.remove(self.id);
        }
    }
}

impl Drop for DismissGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for DismissGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DismissGuard")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

static_assertions::assert_impl_all!(DismissalLayers: Send, Sync, Clone);
static_assertions::assert_impl_all!(DismissGuard: Send, Sync);
