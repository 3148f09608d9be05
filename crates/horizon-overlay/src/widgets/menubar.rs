//! Menubar: a horizontal row of menus.
//!
//! The menus of a [`Menubar`] form one [`GroupCoordinator`] in
//! [`HoverMode::TakeoverOnly`](crate::HoverMode::TakeoverOnly) mode: clicking
//! a trigger opens its menu, and once a menu is open, hovering another trigger
//! switches to it immediately.
//!
//! With no menu open, ArrowLeft/ArrowRight move a roving tab stop between the
//! triggers. With a menu open, they switch to the adjacent menu and focus its
//! first item; horizontal arrows a menu does not consume itself (ArrowLeft in
//! a top-level menu, ArrowRight on a plain item) do the same.

use std::sync::Arc;

use horizon_overlay_core::logging::targets;
use parking_lot::Mutex;

use super::OverlayContext;
use super::menu::{Menu, MenuItem};
use crate::error::{OverlayError, Result};
use crate::group::{Direction, GroupCoordinator};
use crate::keyboard::{Key, KeyEvent};
use crate::platform::{ElementId, Subscription};

/// Description of one top-level menu.
#[derive(Debug, Clone, PartialEq)]
pub struct MenubarMenu {
    pub trigger: ElementId,
    pub panel: ElementId,
    pub items: Vec<MenuItem>,
}

impl MenubarMenu {
    pub fn new(trigger: ElementId, panel: ElementId, items: Vec<MenuItem>) -> Self {
        Self {
            trigger,
            panel,
            items,
        }
    }
}

struct MenubarInner {
    ctx: OverlayContext,
    bar: ElementId,
    menus: Vec<Menu>,
    group: GroupCoordinator,
    /// Index of the trigger holding the roving tab stop.
    focused: Mutex<usize>,
    key_subscription: Mutex<Option<Subscription>>,
}

/// A row of mutually exclusive menus.
#[derive(Clone)]
pub struct Menubar {
    inner: Arc<MenubarInner>,
}

impl Menubar {
    /// Build a menubar in `bar` from `menus`.
    ///
    /// Fails with [`OverlayError::EmptyGroup`] when `menus` is empty.
    pub fn new(ctx: &OverlayContext, bar: ElementId, menus: Vec<MenubarMenu>) -> Result<Self> {
        if menus.is_empty() {
            return Err(OverlayError::EmptyGroup);
        }
        let menus = menus
            .into_iter()
            .map(|menu| Menu::for_menubar(ctx, menu.trigger, menu.panel, menu.items))
            .collect::<Result<Vec<_>>>()?;
        let members = menus.iter().map(|menu| menu.disclosure().clone()).collect();
        let group = GroupCoordinator::new(
            ctx.event_loop().clone(),
            ctx.platform().clone(),
            members,
            ctx.config().menubar.group_options(),
        )?;

        let menubar = Self {
            inner: Arc::new(MenubarInner {
                ctx: ctx.clone(),
                bar,
                menus,
                group,
                focused: Mutex::new(0),
                key_subscription: Mutex::new(None),
            }),
        };
        menubar.connect();
        Ok(menubar)
    }

    fn connect(&self) {
        let platform = self.inner.ctx.platform().clone();
        platform.set_attribute(self.inner.bar, "role", Some("menubar"));
        for menu in &self.inner.menus {
            platform.set_attribute(menu.trigger(), "role", Some("menuitem"));
        }
        self.reflect_tab_stop();

        for (index, menu) in self.inner.menus.iter().enumerate() {
            let weak = Arc::downgrade(&self.inner);
            menu.disclosure().on_state_change(move |open| {
                if open && let Some(inner) = weak.upgrade() {
                    *inner.focused.lock() = index;
                    Menubar { inner }.reflect_tab_stop();
                }
            });
        }

        let weak = Arc::downgrade(&self.inner);
        let subscription = platform.on_key_down(Arc::new(move |event: &KeyEvent| {
            weak.upgrade()
                .is_some_and(|inner| Menubar { inner }.handle_key(event))
        }));
        *self.inner.key_subscription.lock() = Some(subscription);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The menubar element.
    pub fn bar(&self) -> ElementId {
        self.inner.bar
    }

    /// Number of top-level menus.
    pub fn len(&self) -> usize {
        self.inner.menus.len()
    }

    /// Always `false`; construction rejects empty menubars.
    pub fn is_empty(&self) -> bool {
        self.inner.menus.is_empty()
    }

    /// The top-level menu at `index`.
    pub fn menu(&self, index: usize) -> Option<&Menu> {
        self.inner.menus.get(index)
    }

    /// The open top-level menu.
    pub fn open_index(&self) -> Option<usize> {
        self.inner.group.open_index()
    }

    /// The trigger holding the roving tab stop.
    pub fn focused_index(&self) -> usize {
        *self.inner.focused.lock()
    }

    /// The coordinator keeping the menus exclusive.
    pub fn group(&self) -> &GroupCoordinator {
        &self.inner.group
    }

    // =========================================================================
    // Input
    // =========================================================================

    /// A click on the trigger of menu `index`.
    pub fn trigger_clicked(&self, index: usize) {
        if let Err(error) = self.inner.group.toggle(index) {
            tracing::warn!(target: targets::WIDGETS, %error, "menubar click ignored");
        }
    }

    /// The pointer entered the trigger of menu `index`.
    pub fn pointer_enter_trigger(&self, index: usize) {
        self.inner.group.pointer_enter(index);
    }

    /// Close whichever menu is open.
    pub fn close(&self) {
        self.inner.group.close_all();
    }

    /// Handle a key press on a trigger or inside an open menu.
    ///
    /// Returns `true` when the key was consumed.
    pub fn handle_key(&self, event: &KeyEvent) -> bool {
        let Some(target) = event.target else {
            return false;
        };

        for (index, menu) in self.inner.menus.iter().enumerate() {
            if !menu.is_open() {
                continue;
            }
            if menu.handle_key(event) {
                return true;
            }
            if menu.contains(target) {
                return match event.key {
                    Key::ArrowRight => self.switch(index, Direction::Next),
                    Key::ArrowLeft => self.switch(index, Direction::Previous),
                    _ => false,
                };
            }
        }

        match self.inner.menus.iter().position(|menu| menu.trigger() == target) {
            Some(index) => self.trigger_key(index, event),
            None => false,
        }
    }

    /// Release the listeners and tear down every menu.
    pub fn destroy(&self) {
        let subscription = self.inner.key_subscription.lock().take();
        drop(subscription);
        self.inner.group.destroy();
        for menu in &self.inner.menus {
            menu.destroy();
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn trigger_key(&self, index: usize, event: &KeyEvent) -> bool {
        let direction = match event.key {
            Key::ArrowRight => Direction::Next,
            Key::ArrowLeft => Direction::Previous,
            Key::Home | Key::End => {
                let mut indices = 0..self.len();
                let found = if event.key == Key::Home {
                    indices.find(|&i| self.is_enabled(i))
                } else {
                    indices.rfind(|&i| self.is_enabled(i))
                };
                if let Some(found) = found {
                    self.focus_trigger(found);
                }
                return true;
            }
            Key::ArrowDown | Key::Enter | Key::Space => {
                self.open_focus_first(index);
                return true;
            }
            _ => return false,
        };

        let Some(next) = self.adjacent(index, direction) else {
            return true;
        };
        if self.open_index().is_some() {
            // Open the neighbor at once; focus stays on the bar.
            tracing::debug!(target: targets::WIDGETS, from = index, to = next, "menubar navigate");
            self.inner.group.navigate(index, direction);
        } else {
            self.focus_trigger(next);
        }
        true
    }

    fn is_enabled(&self, index: usize) -> bool {
        !self.inner.menus[index].disclosure().options().disabled
    }

    /// The adjacent enabled menu, honoring the loop setting.
    fn adjacent(&self, from: usize, direction: Direction) -> Option<usize> {
        let next = self.inner.group.adjacent(from, direction)?;
        let wrapped = match direction {
            Direction::Next => next <= from,
            Direction::Previous => next >= from,
        };
        if wrapped && !self.inner.ctx.config().menubar.loop_navigation {
            return None;
        }
        Some(next)
    }

    /// Move from the open menu `from` to its neighbor.
    fn switch(&self, from: usize, direction: Direction) -> bool {
        let Some(target) = self.adjacent(from, direction) else {
            return true;
        };
        tracing::debug!(target: targets::WIDGETS, from, to = target, "menubar switch");
        self.open_focus_first(target);
        true
    }

    fn open_focus_first(&self, index: usize) {
        let Some(menu) = self.inner.menus.get(index) else {
            return;
        };
        if menu.is_open() {
            menu.open_and_focus_first();
            return;
        }
        menu.prepare_focus_first();
        if let Err(error) = self.inner.group.open_immediately(index) {
            tracing::warn!(target: targets::WIDGETS, %error, "menubar open ignored");
        }
    }

    fn focus_trigger(&self, index: usize) {
        *self.inner.focused.lock() = index;
        self.reflect_tab_stop();
        self.inner
            .ctx
            .platform()
            .focus(self.inner.menus[index].trigger());
    }

    fn reflect_tab_stop(&self) {
        let focused = self.focused_index();
        let platform = self.inner.ctx.platform();
        for (index, menu) in self.inner.menus.iter().enumerate() {
            let tabindex = if index == focused { "0" } else { "-1" };
            platform.set_attribute(menu.trigger(), "tabindex", Some(tabindex));
        }
    }
}

impl std::fmt::Debug for Menubar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Menubar")
            .field("menus", &self.len())
            .field("open_index", &self.open_index())
            .finish()
    }
}

static_assertions::assert_impl_all!(Menubar: Send, Sync, Clone);
