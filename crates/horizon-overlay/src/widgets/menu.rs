//! Dropdown menus with nested submenus.
//!
//! A [`Menu`] is a tree: every submenu item owns a child `Menu` whose trigger
//! is the item itself. All menus of a tree share the context's dismissal
//! layers, so Escape or an outside click closes the innermost open level
//! first.
//!
//! Keyboard input is routed from the root to the deepest open menu whose panel
//! contains the focused element:
//!
//! | Key | Effect |
//! |-----|--------|
//! | ArrowUp / ArrowDown, Home / End | move the highlight, skipping disabled items |
//! | ArrowRight, Enter, Space on a submenu item | open the submenu, focus its first item |
//! | ArrowLeft in a submenu | close it, refocus the parent item |
//! | Enter / Space | activate the highlighted item |
//! | Tab | swallowed while open |
//!
//! Activating an action, checkbox or radio item emits [`Menu::triggered`] on
//! the item's menu and on every ancestor, then closes the whole tree.

use std::sync::{Arc, Weak};

use horizon_overlay_core::logging::targets;
use horizon_overlay_core::Signal;
use parking_lot::Mutex;

use super::{
    OverlayContext, bool_attr, link, reflect_disabled, reflect_highlight, reflect_open,
    wire_placement,
};
use crate::disclosure::{Disclosure, DisclosureOptions, Phase};
use crate::dismissal::DismissReason;
use crate::error::Result;
use crate::keyboard::{Key, KeyEvent};
use crate::navigation::{NavItem, NavOutcome, RovingFocus};
use crate::platform::{ElementId, Subscription};

/// What a menu item does when activated.
#[derive(Debug, Clone, PartialEq)]
pub enum MenuItemKind {
    /// A plain command.
    Action,
    /// Toggles its checked state.
    Checkbox { checked: bool },
    /// Checks itself and unchecks the other items of `group` in the same menu.
    Radio { group: String, checked: bool },
    /// Opens a nested menu in `panel`.
    Submenu { panel: ElementId, items: Vec<MenuItem> },
}

/// Description of one menu item.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuItem {
    pub element: ElementId,
    pub label: String,
    pub disabled: bool,
    pub kind: MenuItemKind,
}

impl MenuItem {
    fn with_kind(element: ElementId, label: impl Into<String>, kind: MenuItemKind) -> Self {
        Self {
            element,
            label: label.into(),
            disabled: false,
            kind,
        }
    }

    /// A plain command item.
    pub fn action(element: ElementId, label: impl Into<String>) -> Self {
        Self::with_kind(element, label, MenuItemKind::Action)
    }

    /// A checkbox item.
    pub fn checkbox(element: ElementId, label: impl Into<String>, checked: bool) -> Self {
        Self::with_kind(element, label, MenuItemKind::Checkbox { checked })
    }

    /// A radio item belonging to `group`.
    pub fn radio(
        element: ElementId,
        label: impl Into<String>,
        group: impl Into<String>,
        checked: bool,
    ) -> Self {
        let group = group.into();
        Self::with_kind(element, label, MenuItemKind::Radio { group, checked })
    }

    /// An item opening a nested menu.
    pub fn submenu(
        element: ElementId,
        label: impl Into<String>,
        panel: ElementId,
        items: Vec<MenuItem>,
    ) -> Self {
        Self::with_kind(element, label, MenuItemKind::Submenu { panel, items })
    }

    /// Set the disabled flag.
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// Payload of [`Menu::triggered`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuSelection {
    /// The activated item.
    pub element: ElementId,
    pub label: String,
    /// The new checked state for checkbox and radio items.
    pub checked: Option<bool>,
}

enum EntryKind {
    Action,
    Checkbox(bool),
    Radio { group: String, checked: bool },
    Submenu(Menu),
}

struct Entry {
    element: ElementId,
    label: String,
    disabled: bool,
    kind: EntryKind,
}

impl Entry {
    fn nav_item(&self) -> NavItem {
        let item = NavItem::new(self.element, self.label.clone()).with_disabled(self.disabled);
        match self.kind {
            EntryKind::Submenu(_) => item.with_submenu(),
            _ => item,
        }
    }

    fn submenu(&self) -> Option<&Menu> {
        match &self.kind {
            EntryKind::Submenu(menu) => Some(menu),
            _ => None,
        }
    }
}

enum Activation {
    OpenSubmenu(Menu),
    Select(MenuSelection),
}

struct MenuState {
    entries: Vec<Entry>,
    nav: RovingFocus,
    /// Highlight and focus the first item on the next open.
    focus_first_on_open: bool,
}

struct MenuInner {
    ctx: OverlayContext,
    disclosure: Disclosure,
    /// Empty for the root of a tree.
    parent: Mutex<Weak<MenuInner>>,
    nested: bool,
    /// Whether the menu handles key presses on its own trigger.
    owns_trigger_keys: bool,
    state: Mutex<MenuState>,
    triggered: Signal<MenuSelection>,
    key_subscription: Mutex<Option<Subscription>>,
}

/// A dropdown menu.
#[derive(Clone)]
pub struct Menu {
    inner: Arc<MenuInner>,
}

impl Menu {
    /// Build a standalone dropdown menu opened from `trigger`.
    ///
    /// The menu listens for key presses on its trigger and inside its panels.
    pub fn new(
        ctx: &OverlayContext,
        trigger: ElementId,
        panel: ElementId,
        items: Vec<MenuItem>,
    ) -> Result<Self> {
        let options = ctx.config().menu.disclosure_options();
        let menu = Self::build(ctx, trigger, panel, items, options, false, true)?;

        let weak = Arc::downgrade(&menu.inner);
        let subscription = ctx.platform().on_key_down(Arc::new(move |event: &KeyEvent| {
            weak.upgrade()
                .is_some_and(|inner| Menu { inner }.handle_key(event))
        }));
        *menu.inner.key_subscription.lock() = Some(subscription);
        Ok(menu)
    }

    /// Build a top-level menu whose trigger keys are handled by a menubar.
    pub(crate) fn for_menubar(
        ctx: &OverlayContext,
        trigger: ElementId,
        panel: ElementId,
        items: Vec<MenuItem>,
    ) -> Result<Self> {
        let options = ctx.config().menubar.disclosure_options();
        Self::build(ctx, trigger, panel, items, options, false, false)
    }

    fn build(
        ctx: &OverlayContext,
        trigger: ElementId,
        panel: ElementId,
        items: Vec<MenuItem>,
        options: DisclosureOptions,
        nested: bool,
        owns_trigger_keys: bool,
    ) -> Result<Self> {
        let config = ctx.config();
        let disclosure = ctx.disclosure(trigger, panel, options)?;

        let mut entries = Vec::with_capacity(items.len());
        for MenuItem {
            element,
            label,
            disabled,
            kind,
        } in items
        {
            let kind = match kind {
                MenuItemKind::Action => EntryKind::Action,
                MenuItemKind::Checkbox { checked } => EntryKind::Checkbox(checked),
                MenuItemKind::Radio { group, checked } => EntryKind::Radio { group, checked },
                MenuItemKind::Submenu {
                    panel: sub_panel,
                    items: sub_items,
                } => {
                    let options = config.menu.submenu_options().with_disabled(disabled);
                    let submenu =
                        Self::build(ctx, element, sub_panel, sub_items, options, true, false)?;
                    EntryKind::Submenu(submenu)
                }
            };
            entries.push(Entry {
                element,
                label,
                disabled,
                kind,
            });
        }

        let nav = RovingFocus::default()
            .with_looping(config.menu.loop_navigation)
            .with_nested(nested)
            .with_typeahead_timeout(config.typeahead_timeout());

        let menu = Self {
            inner: Arc::new(MenuInner {
                ctx: ctx.clone(),
                disclosure,
                parent: Mutex::new(Weak::new()),
                nested,
                owns_trigger_keys,
                state: Mutex::new(MenuState {
                    entries,
                    nav,
                    focus_first_on_open: false,
                }),
                triggered: Signal::new(),
                key_subscription: Mutex::new(None),
            }),
        };
        menu.connect();
        Ok(menu)
    }

    fn connect(&self) {
        let platform = self.inner.ctx.platform().clone();
        let trigger = self.trigger();
        let panel = self.panel();

        platform.set_attribute(panel, "role", Some("menu"));
        link(platform.as_ref(), trigger, panel, Some("menu"));
        reflect_open(platform.as_ref(), trigger, panel, false);
        self.reflect_items();
        wire_placement(&self.inner.disclosure, platform);

        for submenu in self.submenus() {
            *submenu.inner.parent.lock() = Arc::downgrade(&self.inner);
            let weak = Arc::downgrade(&self.inner);
            submenu.triggered().connect(move |selection| {
                if let Some(parent) = weak.upgrade() {
                    parent.triggered.emit(selection.clone());
                }
            });
        }

        let weak = Arc::downgrade(&self.inner);
        self.inner.disclosure.on_state_change(move |open| {
            if let Some(inner) = weak.upgrade() {
                Menu { inner }.open_changed(open);
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

    /// Whether this menu is a submenu.
    pub fn is_nested(&self) -> bool {
        self.inner.nested
    }

    /// Emitted when an item of this menu or of any submenu is activated.
    pub fn triggered(&self) -> &Signal<MenuSelection> {
        &self.inner.triggered
    }

    /// The highlighted item of this menu.
    pub fn highlighted(&self) -> Option<ElementId> {
        self.inner
            .state
            .lock()
            .nav
            .highlighted_item()
            .map(|item| item.element)
    }

    /// The submenu opened by `item`, searching the whole tree.
    pub fn submenu(&self, item: ElementId) -> Option<Menu> {
        let (index, menu) = self.find_item(item)?;
        let state = menu.inner.state.lock();
        state.entries.get(index).and_then(Entry::submenu).cloned()
    }

    /// The checked state of a checkbox or radio item in the tree.
    pub fn is_checked(&self, item: ElementId) -> Option<bool> {
        let (index, menu) = self.find_item(item)?;
        let state = menu.inner.state.lock();
        match state.entries.get(index)?.kind {
            EntryKind::Checkbox(checked) | EntryKind::Radio { checked, .. } => Some(checked),
            _ => None,
        }
    }

    fn submenus(&self) -> Vec<Menu> {
        let state = self.inner.state.lock();
        state.entries.iter().filter_map(Entry::submenu).cloned().collect()
    }

    fn root(&self) -> Menu {
        let mut menu = self.clone();
        loop {
            let parent = menu.inner.parent.lock().upgrade();
            match parent {
                Some(inner) => menu = Menu { inner },
                None => return menu,
            }
        }
    }

    /// The menu owning `item` and the item's index in it.
    fn find_item(&self, item: ElementId) -> Option<(usize, Menu)> {
        let index = {
            let state = self.inner.state.lock();
            state.entries.iter().position(|entry| entry.element == item)
        };
        match index {
            Some(index) => Some((index, self.clone())),
            None => self
                .submenus()
                .iter()
                .find_map(|submenu| submenu.find_item(item)),
        }
    }

    /// Whether an open panel of the tree contains `target`.
    pub(crate) fn contains(&self, target: ElementId) -> bool {
        if !self.is_open() {
            return false;
        }
        self.inner.ctx.platform().contains(self.panel(), target)
            || self.submenus().iter().any(|submenu| submenu.contains(target))
    }

    fn find_panel(&self, panel: ElementId) -> Option<Menu> {
        if self.panel() == panel {
            return Some(self.clone());
        }
        self.submenus()
            .iter()
            .find_map(|submenu| submenu.find_panel(panel))
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Open immediately, focusing the panel.
    pub fn open(&self) {
        self.inner.disclosure.open_now();
    }

    /// Open immediately and highlight the first enabled item.
    pub fn open_and_focus_first(&self) {
        if self.is_open() {
            self.highlight_first();
            return;
        }
        self.prepare_focus_first();
        self.inner.disclosure.open_now();
        if !self.is_open() {
            self.inner.state.lock().focus_first_on_open = false;
        }
    }

    /// Close this menu and its submenus.
    pub fn close(&self) {
        self.inner.disclosure.close_now();
    }

    /// Make the next open highlight the first item.
    pub(crate) fn prepare_focus_first(&self) {
        self.inner.state.lock().focus_first_on_open = true;
    }

    // =========================================================================
    // Pointer input
    // =========================================================================

    /// A click on the trigger of a standalone menu.
    pub fn trigger_clicked(&self) {
        self.inner.disclosure.toggle();
    }

    /// A click on an item anywhere in the tree.
    pub fn item_clicked(&self, item: ElementId) {
        if let Some((index, menu)) = self.find_item(item)
            && menu.is_open()
        {
            menu.activate(index);
        }
    }

    /// The pointer moved onto an item anywhere in the tree.
    ///
    /// Highlights the item, starts opening its submenu and starts closing the
    /// sibling submenus.
    pub fn pointer_enter_item(&self, item: ElementId) {
        let Some((index, menu)) = self.find_item(item) else {
            return;
        };
        if !menu.is_open() {
            return;
        }
        let (moved, target) = {
            let mut state = menu.inner.state.lock();
            let moved = state.nav.highlight(index);
            (moved, state.entries.get(index).and_then(Entry::submenu).cloned())
        };
        if moved {
            menu.show_highlight();
            self.inner.ctx.platform().focus(item);
        }
        menu.close_submenus_except(target.as_ref(), false);
        if let Some(submenu) = target {
            submenu.inner.disclosure.open();
        }
    }

    /// The pointer left an item anywhere in the tree.
    pub fn pointer_leave_item(&self, item: ElementId) {
        let Some((index, menu)) = self.find_item(item) else {
            return;
        };
        let submenu = {
            let mut state = menu.inner.state.lock();
            if state.nav.highlighted() == Some(index) {
                state.nav.clear_highlight();
            }
            state.entries.get(index).and_then(Entry::submenu).cloned()
        };
        menu.show_highlight();
        if let Some(submenu) = submenu {
            submenu.inner.disclosure.close();
        }
    }

    /// The pointer entered a panel of the tree; cancels its pending close.
    pub fn pointer_enter_panel(&self, panel: ElementId) {
        if let Some(menu) = self.find_panel(panel)
            && menu.inner.disclosure.phase() == Phase::ClosingPending
        {
            menu.inner.disclosure.open();
        }
    }

    // =========================================================================
    // Keyboard input
    // =========================================================================

    /// Route a key press to the deepest open menu containing its target.
    ///
    /// Returns `true` when the key was consumed. Unconsumed horizontal arrows
    /// are left to an enclosing menubar.
    pub fn handle_key(&self, event: &KeyEvent) -> bool {
        let Some(target) = event.target else {
            return false;
        };
        for submenu in self.submenus() {
            if submenu.is_open() && submenu.handle_key(event) {
                return true;
            }
        }
        if self.is_open() && self.inner.ctx.platform().contains(self.panel(), target) {
            return self.panel_key(event);
        }
        if self.inner.owns_trigger_keys && target == self.trigger() {
            return self.trigger_key(event);
        }
        false
    }

    fn trigger_key(&self, event: &KeyEvent) -> bool {
        match event.key {
            Key::Enter | Key::Space if self.is_open() => {
                self.close();
                true
            }
            Key::ArrowDown | Key::Enter | Key::Space => {
                self.open_and_focus_first();
                true
            }
            _ => false,
        }
    }

    fn panel_key(&self, event: &KeyEvent) -> bool {
        let now = self.inner.ctx.event_loop().now();
        let outcome = self.inner.state.lock().nav.handle_key(event, now);
        match outcome {
            NavOutcome::Highlighted(_) => {
                self.show_highlight();
                if let Some(element) = self.highlighted() {
                    self.inner.ctx.platform().focus(element);
                }
                true
            }
            NavOutcome::Activate(index) | NavOutcome::OpenSubmenu(index) => {
                self.activate(index);
                true
            }
            NavOutcome::CloseSubmenu => {
                self.close();
                self.inner.ctx.platform().focus(self.trigger());
                true
            }
            NavOutcome::TabSuppressed => true,
            NavOutcome::Ignored => false,
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn highlight_first(&self) {
        let element = {
            let mut state = self.inner.state.lock();
            state.nav.highlight_first();
            state.nav.highlighted_item().map(|item| item.element)
        };
        self.show_highlight();
        if let Some(element) = element {
            self.inner.ctx.platform().focus(element);
        }
    }

    fn activate(&self, index: usize) {
        let activation = {
            let mut state = self.inner.state.lock();
            let Some(entry) = state.entries.get_mut(index) else {
                return;
            };
            if entry.disabled {
                return;
            }
            let element = entry.element;
            let label = entry.label.clone();
            let (activation, radio_group) = match &mut entry.kind {
                EntryKind::Submenu(menu) => (Activation::OpenSubmenu(menu.clone()), None),
                EntryKind::Action => {
                    let selection = MenuSelection { element, label, checked: None };
                    (Activation::Select(selection), None)
                }
                EntryKind::Checkbox(checked) => {
                    *checked = !*checked;
                    let selection = MenuSelection { element, label, checked: Some(*checked) };
                    (Activation::Select(selection), None)
                }
                EntryKind::Radio { group, checked } => {
                    *checked = true;
                    let selection = MenuSelection { element, label, checked: Some(true) };
                    (Activation::Select(selection), Some(group.clone()))
                }
            };
            if let Some(group) = radio_group {
                for (i, other) in state.entries.iter_mut().enumerate() {
                    if i != index
                        && let EntryKind::Radio { group: other_group, checked } = &mut other.kind
                        && *other_group == group
                    {
                        *checked = false;
                    }
                }
            }
            activation
        };

        match activation {
            Activation::OpenSubmenu(submenu) => {
                self.close_submenus_except(Some(&submenu), true);
                submenu.open_and_focus_first();
            }
            Activation::Select(selection) => {
                self.reflect_items();
                tracing::debug!(target: targets::WIDGETS, item = ?selection.element, label = %selection.label, "menu item activated");
                self.inner.triggered.emit(selection);
                let root = self.root();
                root.close();
                self.inner.ctx.platform().focus(root.trigger());
            }
        }
    }

    fn close_submenus_except(&self, keep: Option<&Menu>, immediately: bool) {
        for submenu in self.submenus() {
            if keep.is_some_and(|keep| Arc::ptr_eq(&keep.inner, &submenu.inner)) {
                continue;
            }
            if immediately {
                submenu.close();
            } else {
                submenu.inner.disclosure.close();
            }
        }
    }

    fn open_changed(&self, open: bool) {
        let platform = self.inner.ctx.platform();
        reflect_open(platform.as_ref(), self.trigger(), self.panel(), open);

        if open {
            let (focus_first, highlighted) = {
                let mut state = self.inner.state.lock();
                let items: Vec<NavItem> = state.entries.iter().map(Entry::nav_item).collect();
                state.nav.set_items(items);
                let focus_first = std::mem::take(&mut state.focus_first_on_open);
                if focus_first {
                    state.nav.highlight_first();
                } else {
                    state.nav.clear_highlight();
                }
                (focus_first, state.nav.highlighted_item().map(|item| item.element))
            };
            self.show_highlight();
            match highlighted {
                Some(element) => platform.focus(element),
                // Hover-opened submenus leave focus on their parent item.
                None if !focus_first && self.inner.nested => {}
                None => platform.focus(self.panel()),
            }
        } else {
            {
                let mut state = self.inner.state.lock();
                state.nav.clear_highlight();
                state.focus_first_on_open = false;
            }
            self.show_highlight();
            for submenu in self.submenus() {
                submenu.close();
            }
        }
    }

    fn show_highlight(&self) {
        let (elements, highlighted) = {
            let state = self.inner.state.lock();
            let elements: Vec<ElementId> = state.entries.iter().map(|entry| entry.element).collect();
            (elements, state.nav.highlighted_item().map(|item| item.element))
        };
        reflect_highlight(self.inner.ctx.platform().as_ref(), elements, highlighted);
    }

    fn reflect_items(&self) {
        let platform = self.inner.ctx.platform();
        let state = self.inner.state.lock();
        for entry in &state.entries {
            let (role, checked) = match entry.kind {
                EntryKind::Action | EntryKind::Submenu(_) => ("menuitem", None),
                EntryKind::Checkbox(checked) => ("menuitemcheckbox", Some(checked)),
                EntryKind::Radio { checked, .. } => ("menuitemradio", Some(checked)),
            };
            platform.set_attribute(entry.element, "role", Some(role));
            platform.set_attribute(entry.element, "aria-checked", checked.map(bool_attr));
            platform.set_attribute(
                entry.element,
                "data-state",
                checked.map(|checked| if checked { "checked" } else { "unchecked" }),
            );
            reflect_disabled(platform.as_ref(), entry.element, entry.disabled);
        }
    }

    /// Release the listeners and tear down every disclosure of the tree.
    pub fn destroy(&self) {
        let subscription = self.inner.key_subscription.lock().take();
        drop(subscription);
        for submenu in self.submenus() {
            submenu.destroy();
        }
        self.inner.disclosure.destroy();
    }
}

impl std::fmt::Debug for Menu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Menu")
            .field("disclosure", &self.inner.disclosure)
            .field("nested", &self.inner.nested)
            .finish()
    }
}

static_assertions::assert_impl_all!(Menu: Send, Sync, Clone);
