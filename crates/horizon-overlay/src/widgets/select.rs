//! Listbox select.
//!
//! A [`Select`] owns a trigger (`role="combobox"`) and a listbox panel. Opening
//! highlights the selected option, or the first enabled one, and moves focus
//! to it once the panel has been positioned. Activating an option commits its
//! value, emits [`Select::value_changed`], closes the panel and returns focus
//! to the trigger.

use std::sync::Arc;

use horizon_overlay_core::logging::targets;
use horizon_overlay_core::Signal;
use parking_lot::Mutex;

use super::{
    OverlayContext, bool_attr, link, reflect_disabled, reflect_highlight, reflect_open,
    wire_placement,
};
use crate::disclosure::Disclosure;
use crate::dismissal::DismissReason;
use crate::error::Result;
use crate::keyboard::{Key, KeyEvent};
use crate::navigation::{NavItem, NavOutcome, RovingFocus};
use crate::platform::{ElementId, Subscription};

/// One option of a [`Select`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub element: ElementId,
    pub value: String,
    /// Text shown and matched by typeahead.
    pub label: String,
    pub disabled: bool,
}

impl SelectOption {
    /// Create an enabled option.
    pub fn new(element: ElementId, value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            element,
            value: value.into(),
            label: label.into(),
            disabled: false,
        }
    }

    /// Set the disabled flag.
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    fn nav_item(&self) -> NavItem {
        NavItem::new(self.element, self.label.clone())
            .with_value(self.value.clone())
            .with_disabled(self.disabled)
    }
}

struct SelectState {
    options: Vec<SelectOption>,
    value: Option<String>,
    nav: RovingFocus,
}

struct SelectInner {
    ctx: OverlayContext,
    disclosure: Disclosure,
    state: Mutex<SelectState>,
    value_changed: Signal<String>,
    key_subscription: Mutex<Option<Subscription>>,
}

/// A single-value listbox picker.
#[derive(Clone)]
pub struct Select {
    inner: Arc<SelectInner>,
}

impl Select {
    /// Wire `trigger`, `panel` and `options` into a select.
    pub fn new(
        ctx: &OverlayContext,
        trigger: ElementId,
        panel: ElementId,
        options: Vec<SelectOption>,
    ) -> Result<Self> {
        let config = ctx.config();
        let disclosure = ctx.disclosure(trigger, panel, config.select.disclosure_options())?;
        let nav = RovingFocus::default().with_typeahead_timeout(config.typeahead_timeout());

        let select = Self {
            inner: Arc::new(SelectInner {
                ctx: ctx.clone(),
                disclosure,
                state: Mutex::new(SelectState {
                    options,
                    value: None,
                    nav,
                }),
                value_changed: Signal::new(),
                key_subscription: Mutex::new(None),
            }),
        };
        select.connect();
        Ok(select)
    }

    fn connect(&self) {
        let platform = self.inner.ctx.platform().clone();
        let trigger = self.trigger();
        let panel = self.panel();

        platform.set_attribute(trigger, "role", Some("combobox"));
        platform.set_attribute(panel, "role", Some("listbox"));
        link(platform.as_ref(), trigger, panel, Some("listbox"));
        reflect_open(platform.as_ref(), trigger, panel, false);
        self.reflect_options();
        wire_placement(&self.inner.disclosure, platform.clone());

        let weak = Arc::downgrade(&self.inner);
        self.inner.disclosure.on_state_change(move |open| {
            if let Some(inner) = weak.upgrade() {
                Select { inner }.open_changed(open);
            }
        });

        let weak = Arc::downgrade(&self.inner);
        self.inner.disclosure.dismissed().connect(move |reason| {
            if *reason == DismissReason::Escape
                && let Some(inner) = weak.upgrade()
            {
                inner.ctx.platform().focus(inner.disclosure.trigger());
            }
        });

        let weak = Arc::downgrade(&self.inner);
        let subscription = platform.on_key_down(Arc::new(move |event: &KeyEvent| {
            weak.upgrade()
                .is_some_and(|inner| Select { inner }.handle_key(event))
        }));
        *self.inner.key_subscription.lock() = Some(subscription);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn trigger(&self) -> ElementId {
        self.inner.disclosure.trigger()
    }

    pub fn panel(&self) -> ElementId {
        self.inner.disclosure.panel()
    }

    /// The underlying disclosure.
    pub fn disclosure(&self) -> &Disclosure {
        &self.inner.disclosure
    }

    pub fn is_open(&self) -> bool {
        self.inner.disclosure.is_open()
    }

    /// The committed value.
    pub fn value(&self) -> Option<String> {
        self.inner.state.lock().value.clone()
    }

    /// Label of the committed option.
    pub fn selected_label(&self) -> Option<String> {
        let state = self.inner.state.lock();
        let value = state.value.as_deref()?;
        state
            .options
            .iter()
            .find(|option| option.value == value)
            .map(|option| option.label.clone())
    }

    pub fn options(&self) -> Vec<SelectOption> {
        self.inner.state.lock().options.clone()
    }

    /// The highlighted option element while open.
    pub fn highlighted(&self) -> Option<ElementId> {
        self.inner
            .state
            .lock()
            .nav
            .highlighted_item()
            .map(|item| item.element)
    }

    /// Emitted with the new value when the user commits a different option.
    pub fn value_changed(&self) -> &Signal<String> {
        &self.inner.value_changed
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Set the committed value without emitting [`value_changed`](Self::value_changed).
    ///
    /// Returns `false` (and changes nothing) when no option carries `value`.
    pub fn set_value(&self, value: Option<&str>) -> bool {
        {
            let mut state = self.inner.state.lock();
            if let Some(value) = value
                && !state.options.iter().any(|option| option.value == value)
            {
                return false;
            }
            state.value = value.map(str::to_owned);
        }
        self.reflect_options();
        true
    }

    /// Replace the options.
    ///
    /// The committed value is kept only if an option still carries it.
    pub fn set_options(&self, options: Vec<SelectOption>) {
        {
            let mut state = self.inner.state.lock();
            let keep = state
                .value
                .as_ref()
                .is_none_or(|value| options.iter().any(|option| &option.value == value));
            if !keep {
                state.value = None;
            }
            let items: Vec<NavItem> = options.iter().map(SelectOption::nav_item).collect();
            state.options = options;
            state.nav.set_items(items);
        }
        self.reflect_options();
        self.show_highlight();
    }

    // =========================================================================
    // Input
    // =========================================================================

    /// Open immediately.
    pub fn open(&self) {
        self.inner.disclosure.open_now();
    }

    /// Close immediately.
    pub fn close(&self) {
        self.inner.disclosure.close_now();
    }

    /// A click on the trigger.
    pub fn trigger_clicked(&self) {
        self.inner.disclosure.toggle();
    }

    /// The pointer moved onto an option.
    pub fn pointer_enter_option(&self, element: ElementId) {
        if !self.is_open() {
            return;
        }
        let moved = self.inner.state.lock().nav.highlight_element(element);
        if moved {
            self.show_highlight();
            self.inner.ctx.platform().focus(element);
        }
    }

    /// A click on an option.
    pub fn option_clicked(&self, element: ElementId) {
        if !self.is_open() {
            return;
        }
        let index = self
            .inner
            .state
            .lock()
            .options
            .iter()
            .position(|option| option.element == element);
        if let Some(index) = index {
            self.commit(index);
        }
    }

    /// Handle a key press on the trigger or inside the panel.
    ///
    /// Returns `true` when the key was consumed.
    pub fn handle_key(&self, event: &KeyEvent) -> bool {
        let Some(target) = event.target else {
            return false;
        };
        let platform = self.inner.ctx.platform();
        let on_trigger = target == self.trigger();
        if !on_trigger && !platform.contains(self.panel(), target) {
            return false;
        }

        if !self.is_open() {
            let opens = on_trigger
                && matches!(event.key, Key::ArrowDown | Key::ArrowUp | Key::Enter | Key::Space);
            if opens {
                self.inner.disclosure.open_now();
            }
            return opens;
        }

        let now = self.inner.ctx.event_loop().now();
        let outcome = self.inner.state.lock().nav.handle_key(event, now);
        match outcome {
            NavOutcome::Highlighted(_) => {
                self.show_highlight();
                if let Some(element) = self.highlighted() {
                    platform.focus(element);
                }
                true
            }
            NavOutcome::Activate(index) => {
                self.commit(index);
                true
            }
            NavOutcome::TabSuppressed => true,
            NavOutcome::OpenSubmenu(_) | NavOutcome::CloseSubmenu | NavOutcome::Ignored => false,
        }
    }

    /// Release the listeners and tear down the disclosure.
    pub fn destroy(&self) {
        let subscription = self.inner.key_subscription.lock().take();
        drop(subscription);
        self.inner.disclosure.destroy();
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn open_changed(&self, open: bool) {
        let platform = self.inner.ctx.platform();
        reflect_open(platform.as_ref(), self.trigger(), self.panel(), open);

        if open {
            let highlighted = {
                let mut state = self.inner.state.lock();
                let items: Vec<NavItem> = state.options.iter().map(SelectOption::nav_item).collect();
                state.nav.set_items(items);
                let value = state.value.clone();
                state.nav.reset_highlight(value.as_deref());
                state.nav.highlighted_item().map(|item| item.element)
            };
            self.show_highlight();
            platform.focus(highlighted.unwrap_or(self.panel()));
        } else {
            self.inner.state.lock().nav.clear_highlight();
            self.show_highlight();
        }
    }

    fn commit(&self, index: usize) {
        let changed = {
            let mut state = self.inner.state.lock();
            let Some(option) = state.options.get(index) else {
                return;
            };
            if option.disabled {
                return;
            }
            let value = option.value.clone();
            if state.value.as_deref() == Some(value.as_str()) {
                None
            } else {
                state.value = Some(value.clone());
                Some(value)
            }
        };

        self.reflect_options();
        if let Some(value) = changed {
            tracing::debug!(target: targets::WIDGETS, %value, "select value committed");
            self.inner.value_changed.emit(value);
        }
        self.inner.disclosure.close_now();
        self.inner.ctx.platform().focus(self.trigger());
    }

    fn show_highlight(&self) {
        let (elements, highlighted) = {
            let state = self.inner.state.lock();
            let elements: Vec<ElementId> = state.options.iter().map(|option| option.element).collect();
            (elements, state.nav.highlighted_item().map(|item| item.element))
        };
        reflect_highlight(self.inner.ctx.platform().as_ref(), elements, highlighted);
    }

    fn reflect_options(&self) {
        let (options, value) = {
            let state = self.inner.state.lock();
            (state.options.clone(), state.value.clone())
        };
        let platform = self.inner.ctx.platform();
        for option in &options {
            let selected = value.as_deref() == Some(option.value.as_str());
            platform.set_attribute(option.element, "role", Some("option"));
            platform.set_attribute(option.element, "aria-selected", Some(bool_attr(selected)));
            platform.set_attribute(
                option.element,
                "data-state",
                Some(if selected { "checked" } else { "unchecked" }),
            );
            reflect_disabled(platform.as_ref(), option.element, option.disabled);
        }
        platform.set_attribute(self.trigger(), "data-placeholder", value.is_none().then_some(""));
    }
}

impl std::fmt::Debug for Select {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Select")
            .field("disclosure", &self.inner.disclosure)
            .field("value", &self.value())
            .finish()
    }
}

static_assertions::assert_impl_all!(Select: Send, Sync, Clone);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::HeadlessDocument;
    use crate::geometry::Rect;
    use crate::platform::Platform;
    use horizon_overlay_core::EventLoop;

    struct Fixture {
        doc: Arc<HeadlessDocument>,
        event_loop: EventLoop,
        select: Select,
        trigger: ElementId,
        options: Vec<ElementId>,
    }

    fn fixture() -> Fixture {
        let doc = Arc::new(HeadlessDocument::new(Rect::new(0.0, 0.0, 800.0, 600.0)));
        let event_loop = EventLoop::new();
        let ctx = OverlayContext::new(doc.clone(), event_loop.clone());

        let trigger = doc.create_element(None, Rect::new(100.0, 100.0, 120.0, 24.0));
        let panel = doc.create_element(None, Rect::new(0.0, 0.0, 100.0, 96.0));
        let labels = [
            ("apple", "Apple", false),
            ("banana", "Banana", false),
            ("cherry", "Cherry", true),
            ("date", "Date", false),
        ];
        let mut elements = Vec::new();
        let mut options = Vec::new();
        for (i, (value, label, disabled)) in labels.into_iter().enumerate() {
            let element = doc.create_element(Some(panel), Rect::new(0.0, i as f32 * 24.0, 100.0, 24.0));
            elements.push(element);
            options.push(SelectOption::new(element, value, label).with_disabled(disabled));
        }

        let select = Select::new(&ctx, trigger, panel, options).unwrap();
        Fixture {
            doc,
            event_loop,
            select,
            trigger,
            options: elements,
        }
    }

    fn press(f: &Fixture, key: Key) -> bool {
        f.doc.dispatch_key_down(KeyEvent::new(key))
    }

    #[test]
    fn test_open_focuses_selected_option_after_positioning() {
        let f = fixture();
        assert!(f.select.set_value(Some("banana")));

        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        let doc = f.doc.clone();
        let panel = f.select.panel();
        f.select.disclosure().on_state_change(move |open| {
            if open {
                *seen_clone.lock() = Some((doc.panel_geometry(panel), doc.focused()));
            }
        });

        f.select.trigger_clicked();

        let (geometry, focused) = seen.lock().take().unwrap();
        let geometry = geometry.expect("positioned before focus");
        assert_eq!((geometry.x, geometry.y), (100.0, 128.0));
        assert_eq!(geometry.min_width, Some(120.0));
        assert_eq!(focused, Some(f.options[1]));
        assert!(f.doc.has_attribute(f.options[1], "data-highlighted"));
    }

    #[test]
    fn test_keyboard_commit() {
        let f = fixture();
        let changes = Arc::new(Mutex::new(Vec::new()));
        let changes_clone = changes.clone();
        f.select
            .value_changed()
            .connect(move |value| changes_clone.lock().push(value.clone()));

        f.doc.focus(f.trigger);
        assert!(press(&f, Key::ArrowDown));
        assert!(f.select.is_open());
        assert_eq!(f.doc.focused(), Some(f.options[0]));

        // Cherry is disabled and skipped.
        press(&f, Key::ArrowDown);
        press(&f, Key::ArrowDown);
        assert_eq!(f.doc.focused(), Some(f.options[3]));

        assert!(press(&f, Key::Enter));
        assert!(!f.select.is_open());
        assert_eq!(f.select.value().as_deref(), Some("date"));
        assert_eq!(f.select.selected_label().as_deref(), Some("Date"));
        assert_eq!(*changes.lock(), vec!["date".to_owned()]);
        assert_eq!(f.doc.focused(), Some(f.trigger));
        assert_eq!(f.doc.attribute(f.options[3], "aria-selected").as_deref(), Some("true"));
        assert_eq!(f.doc.attribute(f.options[0], "aria-selected").as_deref(), Some("false"));
        assert!(!f.doc.has_attribute(f.trigger, "data-placeholder"));
    }

    #[test]
    fn test_recommitting_same_value_is_silent() {
        let f = fixture();
        f.select.set_value(Some("apple"));
        let count = Arc::new(Mutex::new(0));
        let count_clone = count.clone();
        f.select.value_changed().connect(move |_| *count_clone.lock() += 1);

        f.select.trigger_clicked();
        f.select.option_clicked(f.options[0]);

        assert!(!f.select.is_open());
        assert_eq!(*count.lock(), 0);
    }

    #[test]
    fn test_disabled_option_click_is_ignored() {
        let f = fixture();
        f.select.trigger_clicked();
        f.select.option_clicked(f.options[2]);

        assert!(f.select.is_open());
        assert_eq!(f.select.value(), None);
    }

    #[test]
    fn test_attributes_follow_state() {
        let f = fixture();
        let panel = f.select.panel();
        assert_eq!(f.doc.attribute(f.trigger, "role").as_deref(), Some("combobox"));
        assert_eq!(f.doc.attribute(f.trigger, "aria-expanded").as_deref(), Some("false"));
        assert!(f.doc.has_attribute(panel, "hidden"));
        assert!(f.doc.has_attribute(f.trigger, "data-placeholder"));
        assert!(f.doc.has_attribute(f.options[2], "data-disabled"));

        f.select.open();
        assert_eq!(f.doc.attribute(f.trigger, "aria-expanded").as_deref(), Some("true"));
        assert_eq!(f.doc.attribute(panel, "data-state").as_deref(), Some("open"));
        assert_eq!(f.doc.attribute(panel, "data-side").as_deref(), Some("bottom"));
        assert!(!f.doc.has_attribute(panel, "hidden"));

        f.select.close();
        assert_eq!(f.doc.attribute(panel, "data-state").as_deref(), Some("closed"));
        assert!(!f.doc.has_attribute(panel, "data-side"));
        assert!(f.options.iter().all(|o| !f.doc.has_attribute(*o, "data-highlighted")));
    }

    #[test]
    fn test_escape_returns_focus_and_outside_click_does_not_commit() {
        let f = fixture();
        f.select.trigger_clicked();
        assert!(press(&f, Key::Escape));
        assert!(!f.select.is_open());
        assert_eq!(f.doc.focused(), Some(f.trigger));

        let outside = f.doc.create_element(None, Rect::new(600.0, 500.0, 10.0, 10.0));
        f.select.trigger_clicked();
        f.event_loop.run_pending_tasks();
        f.doc.dispatch_pointer_down(Some(outside));
        assert!(!f.select.is_open());
        assert_eq!(f.select.value(), None);
    }

    #[test]
    fn test_tab_and_typeahead_while_open() {
        let f = fixture();
        f.select.trigger_clicked();

        assert!(press(&f, Key::Tab));
        assert!(f.select.is_open());

        press(&f, Key::Character('d'));
        assert_eq!(f.select.highlighted(), Some(f.options[3]));
        // Cherry is disabled, so typeahead skips it.
        f.event_loop.advance(std::time::Duration::from_secs(2));
        press(&f, Key::Character('c'));
        assert_eq!(f.select.highlighted(), Some(f.options[3]));
    }

    #[test]
    fn test_pointer_highlight_and_set_options() {
        let f = fixture();
        f.select.set_value(Some("banana"));
        f.select.trigger_clicked();
        f.select.pointer_enter_option(f.options[3]);
        assert_eq!(f.select.highlighted(), Some(f.options[3]));
        f.select.pointer_enter_option(f.options[2]);
        assert_eq!(f.select.highlighted(), Some(f.options[3]));

        let kept: Vec<SelectOption> = f
            .select
            .options()
            .into_iter()
            .filter(|option| option.value != "banana")
            .collect();
        f.select.set_options(kept);
        assert_eq!(f.select.value(), None);
        assert_eq!(f.select.highlighted(), Some(f.options[3]));
        assert!(!f.select.set_value(Some("banana")));
    }

    #[test]
    fn test_destroy_releases_listeners() {
        let f = fixture();
        f.select.open();
        assert_eq!(f.doc.key_listener_count(), 2);

        f.select.destroy();
        assert_eq!(f.doc.key_listener_count(), 0);
        assert_eq!(f.doc.pointer_listener_count(), 0);
        assert!(!press(&f, Key::ArrowDown));
    }
}
