//! Navigation menu: hover-driven site navigation panels.
//!
//! Items open on hover after the configured open delay and close after the
//! close delay once the pointer leaves both the trigger and the panel. Moving
//! from one open item to another switches immediately, and so does reopening
//! within the skip-delay window after a close.
//!
//! From the keyboard, ArrowLeft/ArrowRight move between triggers. While an
//! item is open they open the neighbor immediately and focus its trigger;
//! otherwise only focus moves. Enter, Space and ArrowDown open the focused
//! item and move focus to its first link.

use std::sync::Arc;

use horizon_overlay_core::logging::targets;
use horizon_overlay_core::Signal;
use parking_lot::Mutex;

use super::{OverlayContext, link, reflect_highlight, reflect_open, wire_placement};
use crate::disclosure::{Disclosure, Phase};
use crate::dismissal::DismissReason;
use crate::error::{OverlayError, Result};
use crate::group::{Direction, GroupCoordinator};
use crate::keyboard::{Key, KeyEvent};
use crate::navigation::{NavItem, NavOutcome, RovingFocus};
use crate::platform::{ElementId, Subscription};

/// Description of one navigation item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationItem {
    pub trigger: ElementId,
    pub panel: ElementId,
    /// Focusable links inside the panel, in order.
    pub links: Vec<NavItem>,
}

impl NavigationItem {
    pub fn new(trigger: ElementId, panel: ElementId) -> Self {
        Self {
            trigger,
            panel,
            links: Vec::new(),
        }
    }

    /// Set the links reachable with the arrow keys.
    pub fn with_links(mut self, links: Vec<NavItem>) -> Self {
        self.links = links;
        self
    }
}

struct NavigationState {
    /// Index of the trigger holding the roving tab stop.
    focused: usize,
    links: Vec<RovingFocus>,
    /// Item whose next open should focus its first link.
    focus_first_on_open: Option<usize>,
}

struct NavigationInner {
    ctx: OverlayContext,
    root: ElementId,
    group: GroupCoordinator,
    state: Mutex<NavigationState>,
    link_activated: Signal<ElementId>,
    key_subscription: Mutex<Option<Subscription>>,
}

/// A row of hover-driven navigation panels.
#[derive(Clone)]
pub struct NavigationMenu {
    inner: Arc<NavigationInner>,
}

impl NavigationMenu {
    /// Build a navigation menu in `root` from `items`.
    ///
    /// Fails with [`OverlayError::EmptyGroup`] when `items` is empty.
    pub fn new(ctx: &OverlayContext, root: ElementId, items: Vec<NavigationItem>) -> Result<Self> {
        if items.is_empty() {
            return Err(OverlayError::EmptyGroup);
        }
        let config = &ctx.config().navigation_menu;
        let members = items
            .iter()
            .map(|item| ctx.disclosure(item.trigger, item.panel, config.disclosure_options()))
            .collect::<Result<Vec<_>>>()?;
        let group = GroupCoordinator::new(
            ctx.event_loop().clone(),
            ctx.platform().clone(),
            members,
            config.group_options(),
        )?;

        let typeahead_timeout = ctx.config().typeahead_timeout();
        let links = items
            .into_iter()
            .map(|item| {
                let mut nav = RovingFocus::default().with_typeahead_timeout(typeahead_timeout);
                nav.set_items(item.links);
                nav
            })
            .collect();

        let menu = Self {
            inner: Arc::new(NavigationInner {
                ctx: ctx.clone(),
                root,
                group,
                state: Mutex::new(NavigationState {
                    focused: 0,
                    links,
                    focus_first_on_open: None,
                }),
                link_activated: Signal::new(),
                key_subscription: Mutex::new(None),
            }),
        };
        menu.connect();
        Ok(menu)
    }

    fn connect(&self) {
        let platform = self.inner.ctx.platform().clone();
        platform.set_attribute(self.inner.root, "data-orientation", Some("horizontal"));
        self.reflect_tab_stop();

        for (index, member) in self.members().enumerate() {
            link(platform.as_ref(), member.trigger(), member.panel(), None);
            reflect_open(platform.as_ref(), member.trigger(), member.panel(), false);
            wire_placement(member, platform.clone());

            let weak = Arc::downgrade(&self.inner);
            member.on_state_change(move |open| {
                if let Some(inner) = weak.upgrade() {
                    NavigationMenu { inner }.open_changed(index, open);
                }
            });

            let weak = Arc::downgrade(&self.inner);
            member.dismissed().connect(move |reason| {
                if *reason == DismissReason::Escape
                    && let Some(inner) = weak.upgrade()
                    && let Some(member) = inner.group.member(index)
                {
                    inner.ctx.platform().focus(member.trigger());
                }
            });
        }

        let weak = Arc::downgrade(&self.inner);
        let subscription = platform.on_key_down(Arc::new(move |event: &KeyEvent| {
            weak.upgrade()
                .is_some_and(|inner| NavigationMenu { inner }.handle_key(event))
        }));
        *self.inner.key_subscription.lock() = Some(subscription);
    }

    fn members(&self) -> impl Iterator<Item = &Disclosure> {
        (0..self.inner.group.len()).filter_map(|index| self.inner.group.member(index))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The root element.
    pub fn root(&self) -> ElementId {
        self.inner.root
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.inner.group.len()
    }

    /// Always `false`; construction rejects empty navigation menus.
    pub fn is_empty(&self) -> bool {
        self.inner.group.is_empty()
    }

    /// The disclosure of item `index`.
    pub fn item(&self, index: usize) -> Option<&Disclosure> {
        self.inner.group.member(index)
    }

    /// The open item.
    pub fn open_index(&self) -> Option<usize> {
        self.inner.group.open_index()
    }

    /// The trigger holding the roving tab stop.
    pub fn focused_index(&self) -> usize {
        self.inner.state.lock().focused
    }

    /// The highlighted link of item `index`.
    pub fn highlighted_link(&self, index: usize) -> Option<ElementId> {
        let state = self.inner.state.lock();
        state
            .links
            .get(index)
            .and_then(RovingFocus::highlighted_item)
            .map(|item| item.element)
    }

    /// The coordinator keeping the items exclusive.
    pub fn group(&self) -> &GroupCoordinator {
        &self.inner.group
    }

    /// Emitted when a link is activated from the keyboard.
    pub fn link_activated(&self) -> &Signal<ElementId> {
        &self.inner.link_activated
    }

    // =========================================================================
    // Pointer input
    // =========================================================================

    /// The pointer entered the trigger of item `index`.
    pub fn pointer_enter_trigger(&self, index: usize) {
        self.inner.group.pointer_enter(index);
    }

    /// The pointer left the trigger of item `index`.
    pub fn pointer_leave_trigger(&self, index: usize) {
        self.inner.group.pointer_leave(index);
    }

    /// The pointer entered the panel of item `index`; cancels a pending close.
    pub fn pointer_enter_panel(&self, index: usize) {
        if let Some(member) = self.item(index)
            && member.phase() == Phase::ClosingPending
        {
            member.open();
        }
    }

    /// The pointer left the panel of item `index`.
    pub fn pointer_leave_panel(&self, index: usize) {
        self.inner.group.pointer_leave(index);
    }

    /// A click on the trigger of item `index`.
    pub fn trigger_clicked(&self, index: usize) {
        if let Err(error) = self.inner.group.toggle(index) {
            tracing::warn!(target: targets::WIDGETS, %error, "navigation click ignored");
        }
    }

    /// Close whichever item is open.
    pub fn close(&self) {
        self.inner.group.close_all();
    }

    // =========================================================================
    // Keyboard input
    // =========================================================================

    /// Handle a key press on a trigger or inside an open panel.
    ///
    /// Returns `true` when the key was consumed.
    pub fn handle_key(&self, event: &KeyEvent) -> bool {
        let Some(target) = event.target else {
            return false;
        };
        let platform = self.inner.ctx.platform();

        for (index, member) in self.members().enumerate() {
            if member.trigger() == target {
                return self.trigger_key(index, event);
            }
            if member.is_open() && platform.contains(member.panel(), target) {
                return self.panel_key(index, event);
            }
        }
        false
    }

    fn trigger_key(&self, index: usize, event: &KeyEvent) -> bool {
        let group = &self.inner.group;
        match event.key {
            Key::ArrowRight | Key::ArrowLeft => {
                let direction = if event.key == Key::ArrowRight {
                    Direction::Next
                } else {
                    Direction::Previous
                };
                if self.open_index().is_some() {
                    group.navigate(index, direction);
                } else if let Some(next) = group.adjacent(index, direction) {
                    self.focus_trigger(next);
                }
                true
            }
            Key::Home => {
                self.focus_trigger(0);
                true
            }
            Key::End => {
                self.focus_trigger(self.len() - 1);
                true
            }
            Key::Enter | Key::Space if self.open_index() == Some(index) => {
                if let Some(member) = group.member(index) {
                    member.close_now();
                }
                true
            }
            Key::ArrowDown | Key::Enter | Key::Space => {
                if self.open_index() == Some(index) {
                    self.highlight_first_link(index);
                    return true;
                }
                self.inner.state.lock().focus_first_on_open = Some(index);
                if let Err(error) = group.open_immediately(index) {
                    tracing::warn!(target: targets::WIDGETS, %error, "navigation open ignored");
                }
                self.inner.state.lock().focus_first_on_open = None;
                true
            }
            _ => false,
        }
    }

    fn panel_key(&self, index: usize, event: &KeyEvent) -> bool {
        let now = self.inner.ctx.event_loop().now();
        let outcome = {
            let mut state = self.inner.state.lock();
            match state.links.get_mut(index) {
                Some(nav) => nav.handle_key(event, now),
                None => NavOutcome::Ignored,
            }
        };
        match outcome {
            NavOutcome::Highlighted(_) => {
                self.show_highlight(index);
                if let Some(element) = self.highlighted_link(index) {
                    self.inner.ctx.platform().focus(element);
                }
                true
            }
            NavOutcome::Activate(_) => {
                let Some(element) = self.highlighted_link(index) else {
                    return false;
                };
                tracing::debug!(target: targets::WIDGETS, link = ?element, "navigation link activated");
                self.inner.link_activated.emit(element);
                if let Some(member) = self.item(index) {
                    member.close_now();
                    self.inner.ctx.platform().focus(member.trigger());
                }
                true
            }
            NavOutcome::TabSuppressed => true,
            NavOutcome::OpenSubmenu(_) | NavOutcome::CloseSubmenu | NavOutcome::Ignored => false,
        }
    }

    /// Release the listeners and tear down every item.
    pub fn destroy(&self) {
        let subscription = self.inner.key_subscription.lock().take();
        drop(subscription);
        self.inner.group.destroy();
        for member in self.members() {
            member.destroy();
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn open_changed(&self, index: usize, open: bool) {
        let Some(member) = self.item(index) else {
            return;
        };
        let platform = self.inner.ctx.platform();
        reflect_open(platform.as_ref(), member.trigger(), member.panel(), open);

        let focus_first = {
            let mut state = self.inner.state.lock();
            if open {
                state.focused = index;
            }
            let focus_first = open && state.focus_first_on_open == Some(index);
            if let Some(nav) = state.links.get_mut(index) {
                nav.clear_highlight();
            }
            focus_first
        };
        if open {
            self.reflect_tab_stop();
        }
        if focus_first {
            self.highlight_first_link(index);
        } else {
            self.show_highlight(index);
        }
    }

    fn highlight_first_link(&self, index: usize) {
        let element = {
            let mut state = self.inner.state.lock();
            state.links.get_mut(index).and_then(|nav| {
                nav.highlight_first();
                nav.highlighted_item().map(|item| item.element)
            })
        };
        self.show_highlight(index);
        if let Some(element) = element {
            self.inner.ctx.platform().focus(element);
        }
    }

    fn show_highlight(&self, index: usize) {
        let (elements, highlighted) = {
            let state = self.inner.state.lock();
            let Some(nav) = state.links.get(index) else {
                return;
            };
            let elements: Vec<ElementId> = nav.items().iter().map(|item| item.element).collect();
            (elements, nav.highlighted_item().map(|item| item.element))
        };
        reflect_highlight(self.inner.ctx.platform().as_ref(), elements, highlighted);
    }

    fn focus_trigger(&self, index: usize) {
        let Some(member) = self.item(index) else {
            return;
        };
        self.inner.state.lock().focused = index;
        self.reflect_tab_stop();
        self.inner.ctx.platform().focus(member.trigger());
    }

    fn reflect_tab_stop(&self) {
        let focused = self.focused_index();
        let platform = self.inner.ctx.platform();
        for (index, member) in self.members().enumerate() {
            let tabindex = if index == focused { "0" } else { "-1" };
            platform.set_attribute(member.trigger(), "tabindex", Some(tabindex));
        }
    }
}

impl std::fmt::Debug for NavigationMenu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationMenu")
            .field("items", &self.len())
            .field("open_index", &self.open_index())
            .finish()
    }
}

static_assertions::assert_impl_all!(NavigationMenu: Send, Sync, Clone);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::HeadlessDocument;
    use crate::geometry::Rect;
    use crate::platform::Platform;
    use horizon_overlay_core::EventLoop;
    use std::time::Duration;

    struct Fixture {
        doc: Arc<HeadlessDocument>,
        event_loop: EventLoop,
        menu: NavigationMenu,
        root: ElementId,
        triggers: Vec<ElementId>,
        /// Links of the first two items.
        links: Vec<Vec<ElementId>>,
    }

    fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("horizon_overlay=debug")
            .with_test_writer()
            .try_init();
    }

    fn fixture() -> Fixture {
        init_logging();
        let doc = Arc::new(HeadlessDocument::new(Rect::new(0.0, 0.0, 1024.0, 768.0)));
        let event_loop = EventLoop::new();
        let ctx = OverlayContext::new(doc.clone(), event_loop.clone());
        let root = doc.create_element(None, Rect::new(0.0, 0.0, 1024.0, 40.0));

        let mut triggers = Vec::new();
        let mut links = Vec::new();
        let mut items = Vec::new();
        for (i, name) in ["Products", "Solutions", "Pricing"].into_iter().enumerate() {
            let trigger = doc.create_element(Some(root), Rect::new(100.0 + i as f32 * 120.0, 8.0, 100.0, 24.0));
            let panel = doc.create_element(None, Rect::new(0.0, 0.0, 400.0, 200.0));
            let panel_links: Vec<ElementId> = if i < 2 {
                (0..3)
                    .map(|j| doc.create_element(Some(panel), Rect::new(0.0, j as f32 * 30.0, 400.0, 30.0)))
                    .collect()
            } else {
                Vec::new()
            };
            let nav_items = panel_links
                .iter()
                .enumerate()
                .map(|(j, link)| NavItem::new(*link, format!("{name} {j}")))
                .collect();
            items.push(NavigationItem::new(trigger, panel).with_links(nav_items));
            triggers.push(trigger);
            links.push(panel_links);
        }

        let menu = NavigationMenu::new(&ctx, root, items).unwrap();
        Fixture {
            doc,
            event_loop,
            menu,
            root,
            triggers,
            links,
        }
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn press(f: &Fixture, key: Key) -> bool {
        f.doc.dispatch_key_down(KeyEvent::new(key))
    }

    fn phase(f: &Fixture, index: usize) -> Phase {
        f.menu.item(index).unwrap().phase()
    }

    #[test]
    fn test_hover_open_and_close_delays() {
        let f = fixture();

        f.menu.pointer_enter_trigger(0);
        f.event_loop.advance(ms(199));
        assert_eq!(phase(&f, 0), Phase::OpeningPending);
        f.event_loop.advance(ms(1));
        assert_eq!(f.menu.open_index(), Some(0));

        f.menu.pointer_leave_trigger(0);
        f.event_loop.advance(ms(149));
        assert_eq!(phase(&f, 0), Phase::ClosingPending);
        f.event_loop.advance(ms(1));
        assert_eq!(f.menu.open_index(), None);
    }

    #[test]
    fn test_leaving_before_open_delay_never_opens() {
        let f = fixture();
        let opened = Arc::new(Mutex::new(false));
        let opened_clone = opened.clone();
        f.menu
            .item(0)
            .unwrap()
            .on_state_change(move |open| *opened_clone.lock() |= open);

        f.menu.pointer_enter_trigger(0);
        f.event_loop.advance(ms(100));
        f.menu.pointer_leave_trigger(0);
        f.event_loop.advance(ms(1000));

        assert!(!*opened.lock());
        assert_eq!(phase(&f, 0), Phase::Closed);
    }

    #[test]
    fn test_moving_to_sibling_switches_immediately() {
        let f = fixture();
        f.menu.pointer_enter_trigger(0);
        f.event_loop.advance(ms(200));

        f.menu.pointer_leave_trigger(0);
        f.menu.pointer_enter_trigger(1);

        assert_eq!(phase(&f, 0), Phase::Closed);
        assert_eq!(phase(&f, 1), Phase::Open);
        assert_eq!(f.menu.open_index(), Some(1));
    }

    #[test]
    fn test_skip_delay_window() {
        let f = fixture();
        f.menu.pointer_enter_trigger(0);
        f.event_loop.advance(ms(200));
        f.menu.pointer_leave_trigger(0);
        f.event_loop.advance(ms(150));
        assert_eq!(f.menu.open_index(), None);
        assert!(f.menu.group().is_skip_delay_active());

        // Within the window the next item opens at once.
        f.event_loop.advance(ms(100));
        f.menu.pointer_enter_trigger(1);
        assert_eq!(phase(&f, 1), Phase::Open);

        // After the window the open delay applies again.
        f.menu.pointer_leave_trigger(1);
        f.event_loop.advance(ms(150 + 300));
        assert!(!f.menu.group().is_skip_delay_active());
        f.menu.pointer_enter_trigger(2);
        assert_eq!(phase(&f, 2), Phase::OpeningPending);
    }

    #[test]
    fn test_entering_panel_cancels_close() {
        let f = fixture();
        f.menu.pointer_enter_trigger(0);
        f.event_loop.advance(ms(200));

        f.menu.pointer_leave_trigger(0);
        f.menu.pointer_enter_panel(0);
        f.event_loop.advance(ms(500));
        assert_eq!(phase(&f, 0), Phase::Open);

        f.menu.pointer_leave_panel(0);
        f.event_loop.advance(ms(150));
        assert_eq!(phase(&f, 0), Phase::Closed);
    }

    #[test]
    fn test_keyboard_navigation() {
        let f = fixture();
        let activated = Arc::new(Mutex::new(Vec::new()));
        let activated_clone = activated.clone();
        f.menu
            .link_activated()
            .connect(move |link| activated_clone.lock().push(*link));
        f.doc.focus(f.triggers[0]);

        assert!(press(&f, Key::ArrowRight));
        assert_eq!(f.doc.focused(), Some(f.triggers[1]));
        assert_eq!(f.menu.open_index(), None);
        assert_eq!(f.doc.attribute(f.triggers[1], "tabindex").as_deref(), Some("0"));

        assert!(press(&f, Key::Enter));
        assert_eq!(f.menu.open_index(), Some(1));
        assert_eq!(f.doc.focused(), Some(f.links[1][0]));

        assert!(press(&f, Key::ArrowDown));
        assert_eq!(f.doc.focused(), Some(f.links[1][1]));
        assert!(f.doc.has_attribute(f.links[1][1], "data-highlighted"));

        assert!(press(&f, Key::Enter));
        assert_eq!(*activated.lock(), vec![f.links[1][1]]);
        assert_eq!(f.menu.open_index(), None);
        assert_eq!(f.doc.focused(), Some(f.triggers[1]));
    }

    #[test]
    fn test_arrow_keys_open_neighbor_while_open() {
        let f = fixture();
        f.menu.trigger_clicked(0);
        f.doc.focus(f.triggers[0]);

        assert!(press(&f, Key::ArrowRight));
        assert_eq!(f.menu.open_index(), Some(1));
        assert_eq!(phase(&f, 0), Phase::Closed);
        assert_eq!(f.doc.focused(), Some(f.triggers[1]));
        assert_eq!(f.menu.focused_index(), 1);
        assert_eq!(f.doc.attribute(f.triggers[1], "tabindex").as_deref(), Some("0"));

        // Wraps from the first item to the last, with no delay.
        assert!(press(&f, Key::ArrowLeft));
        assert!(press(&f, Key::ArrowLeft));
        assert_eq!(f.menu.open_index(), Some(2));
        assert_eq!(f.doc.focused(), Some(f.triggers[2]));
        assert_eq!(f.event_loop.pending_timer_count(), 0);
    }

    #[test]
    fn test_escape_refocuses_trigger() {
        let f = fixture();
        f.doc.focus(f.triggers[2]);
        press(&f, Key::ArrowDown);
        assert_eq!(f.menu.open_index(), Some(2));
        // No links: focus stays on the trigger.
        assert_eq!(f.doc.focused(), Some(f.triggers[2]));

        assert!(press(&f, Key::Escape));
        assert_eq!(f.menu.open_index(), None);
        assert_eq!(f.doc.focused(), Some(f.triggers[2]));
    }

    #[test]
    fn test_attributes() {
        let f = fixture();
        let panel = f.menu.item(0).unwrap().panel();
        assert_eq!(f.doc.attribute(f.root, "data-orientation").as_deref(), Some("horizontal"));
        assert!(!f.doc.has_attribute(f.triggers[0], "aria-haspopup"));
        assert_eq!(f.doc.attribute(f.triggers[0], "aria-controls"), f.doc.attribute(panel, "id"));

        let panel = f.menu.item(1).unwrap().panel();
        f.menu.trigger_clicked(1);
        assert_eq!(f.doc.attribute(f.triggers[1], "aria-expanded").as_deref(), Some("true"));
        assert_eq!(f.doc.attribute(panel, "data-align").as_deref(), Some("center"));

        f.menu.trigger_clicked(1);
        assert!(f.doc.has_attribute(panel, "hidden"));
    }

    #[test]
    fn test_destroy_releases_everything() {
        let f = fixture();
        f.menu.pointer_enter_trigger(0);
        f.event_loop.advance(ms(200));
        f.menu.pointer_leave_trigger(0);

        f.menu.destroy();
        assert_eq!(f.event_loop.pending_timer_count(), 0);
        assert_eq!(f.doc.key_listener_count(), 0);
        assert_eq!(f.doc.pointer_listener_count(), 0);
        assert_eq!(f.doc.layout_observer_count(), 0);
    }
}
