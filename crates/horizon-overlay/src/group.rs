//! Coordination of sibling disclosures (menubar, navigation menu).
//!
//! A [`GroupCoordinator`] keeps at most one member open. Opening a member
//! closes every sibling synchronously first, so no observer ever sees two
//! members open at once.
//!
//! Two rules make moving between members feel immediate:
//!
//! - **hover takeover**: while a member is open, opening a sibling bypasses the
//!   sibling's open delay;
//! - **skip-delay window**: after a member closes without a sibling taking
//!   over, opens within the window are immediate as well.
//!
//! The skip-delay window belongs to one coordinator; closing a member of one
//! group never speeds up another group.

use std::sync::{Arc, Weak};
use std::time::Duration;

use horizon_overlay_core::logging::targets;
use horizon_overlay_core::{ConnectionId, EventLoop, Timer};
use parking_lot::Mutex;

use crate::disclosure::Disclosure;
use crate::error::{OverlayError, Result};
use crate::platform::Platform;

/// How pointer hover drives the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HoverMode {
    /// Hover opens members after their open delay (navigation menu).
    #[default]
    OpenOnHover,
    /// Hover only switches members while one is already open (menubar).
    TakeoverOnly,
}

/// Group behavior options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupOptions {
    /// Length of the skip-delay window.
    pub skip_delay: Duration,
    pub hover_mode: HoverMode,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            skip_delay: Duration::from_millis(300),
            hover_mode: HoverMode::OpenOnHover,
        }
    }
}

/// Direction for arrow-key movement between members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Previous,
    Next,
}

struct GroupState {
    open_index: Option<usize>,
    skip_delay: Option<Timer>,
    skip_generation: u64,
    /// Set while `open` closes siblings; those closes do not start the window.
    switching: bool,
    alive: bool,
}

struct GroupInner {
    members: Vec<Disclosure>,
    platform: Arc<dyn Platform>,
    event_loop: EventLoop,
    options: GroupOptions,
    state: Mutex<GroupState>,
    connections: Mutex<Vec<ConnectionId>>,
}

/// Keeps sibling disclosures mutually exclusive.
#[derive(Clone)]
pub struct GroupCoordinator {
    inner: Arc<GroupInner>,
}

impl GroupCoordinator {
    /// Coordinate `members`.
    ///
    /// Fails with [`OverlayError::EmptyGroup`] when `members` is empty.
    pub fn new(
        event_loop: EventLoop,
        platform: Arc<dyn Platform>,
        members: Vec<Disclosure>,
        options: GroupOptions,
    ) -> Result<Self> {
        if members.is_empty() {
            return Err(OverlayError::EmptyGroup);
        }

        let open_index = members.iter().position(Disclosure::is_open);
        let inner = Arc::new(GroupInner {
            members,
            platform,
            event_loop,
            options,
            state: Mutex::new(GroupState {
                open_index,
                skip_delay: None,
                skip_generation: 0,
                switching: false,
                alive: true,
            }),
            connections: Mutex::new(Vec::new()),
        });

        let connections = inner
            .members
            .iter()
            .enumerate()
            .map(|(index, member)| {
                let weak = Arc::downgrade(&inner);
                member.on_state_change(move |open| {
                    if let Some(inner) = weak.upgrade() {
                        GroupCoordinator { inner }.member_changed(index, open);
                    }
                })
            })
            .collect();
        *inner.connections.lock() = connections;

        tracing::debug!(target: targets::GROUP, members = inner.members.len(), ?options, "group created");
        Ok(Self { inner })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of members.
    pub fn len(&self) -> usize {
        self.inner.members.len()
    }

    /// Whether the group has no members. Construction rejects empty groups.
    pub fn is_empty(&self) -> bool {
        self.inner.members.is_empty()
    }

    /// The member at `index`.
    pub fn member(&self, index: usize) -> Option<&Disclosure> {
        self.inner.members.get(index)
    }

    /// The group options.
    pub fn options(&self) -> GroupOptions {
        self.inner.options
    }

    /// The open member, if any.
    pub fn open_index(&self) -> Option<usize> {
        self.inner.state.lock().open_index
    }

    /// Whether the skip-delay window is running.
    pub fn is_skip_delay_active(&self) -> bool {
        self.inner
            .state
            .lock()
            .skip_delay
            .as_ref()
            .is_some_and(Timer::is_pending)
    }

    fn checked(&self, index: usize) -> Result<&Disclosure> {
        self.inner
            .members
            .get(index)
            .ok_or_else(|| OverlayError::out_of_range(index, self.inner.members.len()))
    }

    /// Whether opening `index` now should bypass its open delay.
    fn is_takeover(&self, index: usize) -> bool {
        let state = self.inner.state.lock();
        let sibling_open = state.open_index.is_some_and(|open| open != index);
        let window = state.skip_delay.as_ref().is_some_and(Timer::is_pending);
        drop(state);
        sibling_open
            || window
            || self
                .inner
                .members
                .iter()
                .enumerate()
                .any(|(i, member)| i != index && member.is_open())
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Open member `index`, closing every sibling first.
    ///
    /// The member's own open delay applies unless hover takeover or the
    /// skip-delay window is in effect. Opening a disabled member changes
    /// nothing.
    pub fn open(&self, index: usize) -> Result<()> {
        let member = self.checked(index)?;
        if member.options().disabled {
            return Ok(());
        }
        let immediate = self.is_takeover(index);
        self.close_siblings(index);
        if immediate {
            tracing::debug!(target: targets::GROUP, index, "takeover open");
            member.open_now();
        } else {
            member.open();
        }
        Ok(())
    }

    /// Open member `index` immediately, closing every sibling first.
    pub fn open_immediately(&self, index: usize) -> Result<()> {
        let member = self.checked(index)?;
        if member.options().disabled {
            return Ok(());
        }
        self.close_siblings(index);
        member.open_now();
        Ok(())
    }

    /// Click semantics: close member `index` if open, else open it
    /// immediately.
    pub fn toggle(&self, index: usize) -> Result<()> {
        let member = self.checked(index)?;
        if member.is_open() {
            member.close_now();
            Ok(())
        } else {
            self.open_immediately(index)
        }
    }

    /// The pointer entered the trigger of member `index`.
    pub fn pointer_enter(&self, index: usize) {
        if index >= self.len() {
            return;
        }
        let result = match self.inner.options.hover_mode {
            HoverMode::OpenOnHover => self.open(index),
            HoverMode::TakeoverOnly => {
                let other_open = self
                    .open_index()
                    .is_some_and(|open| open != index);
                if other_open {
                    self.open_immediately(index)
                } else {
                    Ok(())
                }
            }
        };
        if let Err(error) = result {
            tracing::warn!(target: targets::GROUP, %error, "pointer enter ignored");
        }
    }

    /// The pointer left the trigger (or panel) of member `index`.
    pub fn pointer_leave(&self, index: usize) {
        if self.inner.options.hover_mode != HoverMode::OpenOnHover {
            return;
        }
        if let Some(member) = self.member(index) {
            member.close();
        }
    }

    /// Close whichever member is open (Escape or outside click at group
    /// level).
    pub fn close_all(&self) {
        for member in &self.inner.members {
            member.close_now();
        }
    }

    /// The adjacent enabled member in `direction`, wrapping.
    pub fn adjacent(&self, from: usize, direction: Direction) -> Option<usize> {
        let count = self.len();
        if from >= count {
            return None;
        }
        (1..count)
            .map(|offset| match direction {
                Direction::Next => (from + offset) % count,
                Direction::Previous => (from + count - offset) % count,
            })
            .find(|&index| !self.inner.members[index].options().disabled)
    }

    /// Arrow-key movement at the top level: open the adjacent member
    /// immediately and focus its trigger.
    pub fn navigate(&self, from: usize, direction: Direction) -> Option<usize> {
        let target = self.adjacent(from, direction)?;
        if let Err(error) = self.open_immediately(target) {
            tracing::warn!(target: targets::GROUP, %error, "navigation ignored");
            return None;
        }
        self.inner
            .platform
            .focus(self.inner.members[target].trigger());
        Some(target)
    }

    /// Detach from the members and stop the skip-delay window.
    pub fn destroy(&self) {
        let timer = {
            let mut state = self.inner.state.lock();
            state.alive = false;
            state.skip_delay.take()
        };
        drop(timer);
        self.inner.disconnect();
    }

    fn close_siblings(&self, index: usize) {
        self.inner.state.lock().switching = true;
        for (i, member) in self.inner.members.iter().enumerate() {
            if i != index {
                member.close_now();
            }
        }
        self.inner.state.lock().switching = false;
    }

    // =========================================================================
    // Member notifications
    // =========================================================================

    fn member_changed(&self, index: usize, open: bool) {
        if open {
            let stale = {
                let mut state = self.inner.state.lock();
                if !state.alive {
                    return;
                }
                state.open_index = Some(index);
                state.skip_delay.take()
            };
            drop(stale);
            tracing::debug!(target: targets::GROUP, index, "member opened");

            // A member opened outside `open` still excludes its siblings.
            for (i, member) in self.inner.members.iter().enumerate() {
                if i != index && member.is_open() {
                    member.close_now();
                }
            }
            return;
        }

        let mut state = self.inner.state.lock();
        if !state.alive || state.open_index != Some(index) {
            return;
        }
        state.open_index = None;
        if state.switching || self.inner.options.skip_delay.is_zero() {
            return;
        }

        state.skip_generation = state.skip_generation.wrapping_add(1);
        let generation = state.skip_generation;
        let weak: Weak<GroupInner> = Arc::downgrade(&self.inner);
        let timer = self
            .inner
            .event_loop
            .start_timer(self.inner.options.skip_delay, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.skip_delay_elapsed(generation);
                }
            });
        let previous = state.skip_delay.replace(timer);
        drop(state);
        drop(previous);
        tracing::debug!(target: targets::GROUP, index, "member closed, skip-delay window started");
    }
}

impl GroupInner {
    fn skip_delay_elapsed(&self, generation: u64) {
        let timer = {
            let mut state = self.state.lock();
            if !state.alive || state.skip_generation != generation {
                return;
            }
            state.skip_delay.take()
        };
        drop(timer);
        tracing::trace!(target: targets::GROUP, "skip-delay window elapsed");
    }

    fn disconnect(&self) {
        let connections = std::mem::take(&mut *self.connections.lock());
        for (member, id) in self.members.iter().zip(connections) {
            member.open_changed().disconnect(id);
        }
    }
}

impl Drop for GroupInner {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for GroupCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupCoordinator")
            .field("members", &self.len())
            .field("open_index", &self.open_index())
            .field("options", &self.inner.options)
            .finish()
    }
}

static_assertions::assert_impl_all!(GroupCoordinator: Send, Sync, Clone);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disclosure::{DisclosureOptions, Phase};
    use crate::dismissal::DismissalLayers;
    use crate::document::HeadlessDocument;
    use crate::geometry::Rect;
    use crate::keyboard::{Key, KeyEvent};

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    struct Fixture {
        doc: Arc<HeadlessDocument>,
        event_loop: EventLoop,
        layers: DismissalLayers,
    }

    fn fixture() -> Fixture {
        let doc = Arc::new(HeadlessDocument::new(Rect::new(0.0, 0.0, 1024.0, 768.0)));
        let event_loop = EventLoop::new();
        let layers = DismissalLayers::new(doc.clone(), event_loop.clone());
        Fixture {
            doc,
            event_loop,
            layers,
        }
    }

    impl Fixture {
        fn member(&self, x: f32, options: DisclosureOptions) -> Disclosure {
            let trigger = self.doc.create_element(None, Rect::new(x, 0.0, 80.0, 24.0));
            let panel = self.doc.create_element(None, Rect::new(0.0, 0.0, 200.0, 150.0));
            Disclosure::builder(self.doc.clone(), self.event_loop.clone())
                .trigger(trigger)
                .panel(panel)
                .options(options)
                .layers(self.layers.clone())
                .build()
                .unwrap()
        }

        fn group(&self, delays: &[u64], options: GroupOptions) -> GroupCoordinator {
            let members = delays
                .iter()
                .enumerate()
                .map(|(i, delay)| {
                    self.member(
                        i as f32 * 100.0,
                        DisclosureOptions::default()
                            .with_open_delay(ms(*delay))
                            .with_close_delay(ms(150)),
                    )
                })
                .collect();
            GroupCoordinator::new(self.event_loop.clone(), self.doc.clone(), members, options)
                .unwrap()
        }
    }

    fn open_members(group: &GroupCoordinator) -> usize {
        (0..group.len())
            .filter(|i| group.member(*i).is_some_and(Disclosure::is_open))
            .count()
    }

    #[test]
    fn test_new_rejects_empty_group() {
        let f = fixture();
        let result = GroupCoordinator::new(
            f.event_loop.clone(),
            f.doc.clone(),
            Vec::new(),
            GroupOptions::default(),
        );
        assert!(matches!(result, Err(OverlayError::EmptyGroup)));
    }

    #[test]
    fn test_out_of_range() {
        let f = fixture();
        let group = f.group(&[0, 0], GroupOptions::default());
        assert!(matches!(
            group.open(5),
            Err(OverlayError::IndexOutOfRange { index: 5, len: 2 })
        ));
    }

    #[test]
    fn test_hover_takeover_opens_immediately() {
        let f = fixture();
        let group = f.group(&[300, 300], GroupOptions::default());
        group.open_immediately(0).unwrap();
        assert_eq!(group.open_index(), Some(0));

        group.open(1).unwrap();

        assert_eq!(group.member(1).unwrap().phase(), Phase::Open);
        assert_eq!(group.member(0).unwrap().phase(), Phase::Closed);
        assert_eq!(group.open_index(), Some(1));
        assert!(!group.is_skip_delay_active());
    }

    #[test]
    fn test_skip_delay_window() {
        let f = fixture();
        let group = f.group(&[150, 150], GroupOptions::default());
        group.open_immediately(0).unwrap();

        group.member(0).unwrap().close_now();
        assert_eq!(group.open_index(), None);
        assert!(group.is_skip_delay_active());

        f.event_loop.advance(ms(100));
        group.open(1).unwrap();
        assert_eq!(group.member(1).unwrap().phase(), Phase::Open);
    }

    #[test]
    fn test_open_after_skip_delay_uses_member_delay() {
        let f = fixture();
        let group = f.group(&[150, 150], GroupOptions::default());
        group.open_immediately(0).unwrap();
        group.close_all();

        f.event_loop.advance(ms(300));
        assert!(!group.is_skip_delay_active());

        group.open(1).unwrap();
        assert_eq!(group.member(1).unwrap().phase(), Phase::OpeningPending);
        f.event_loop.advance(ms(150));
        assert_eq!(group.member(1).unwrap().phase(), Phase::Open);
    }

    #[test]
    fn test_skip_delay_is_scoped_per_group() {
        let f = fixture();
        let first = f.group(&[150], GroupOptions::default());
        let second = f.group(&[150], GroupOptions::default());

        first.open_immediately(0).unwrap();
        first.close_all();
        assert!(first.is_skip_delay_active());

        second.open(0).unwrap();
        assert!(!second.is_skip_delay_active());
        assert_eq!(second.member(0).unwrap().phase(), Phase::OpeningPending);
    }

    #[test]
    fn test_mutual_exclusion_at_every_notification() {
        let f = fixture();
        let group = f.group(&[100, 0, 250], GroupOptions::default());
        let violations = Arc::new(Mutex::new(0));

        for i in 0..group.len() {
            let observed = group.clone();
            let violations = violations.clone();
            group.member(i).unwrap().on_state_change(move |_| {
                if open_members(&observed) > 1 {
                    *violations.lock() += 1;
                }
            });
        }

        group.open(0).unwrap();
        f.event_loop.advance(ms(50));
        group.open(2).unwrap();
        f.event_loop.advance(ms(300));
        group.pointer_enter(1);
        group.pointer_enter(0);
        group.toggle(2).unwrap();
        group.navigate(2, Direction::Next);
        group.member(1).unwrap().open_now();
        group.pointer_leave(1);
        f.event_loop.advance(ms(100));
        group.pointer_enter(2);
        f.event_loop.advance(ms(1000));
        group.close_all();

        assert_eq!(*violations.lock(), 0);
        assert!(open_members(&group) <= 1);
    }

    #[test]
    fn test_takeover_only_mode() {
        let f = fixture();
        let group = f.group(
            &[0, 0],
            GroupOptions {
                hover_mode: HoverMode::TakeoverOnly,
                ..GroupOptions::default()
            },
        );

        group.pointer_enter(0);
        assert_eq!(group.open_index(), None);

        group.toggle(0).unwrap();
        group.pointer_enter(1);
        assert_eq!(group.open_index(), Some(1));

        group.pointer_leave(1);
        assert_eq!(group.open_index(), Some(1));

        group.toggle(1).unwrap();
        assert_eq!(group.open_index(), None);
    }

    #[test]
    fn test_hover_open_and_close_delays() {
        let f = fixture();
        let group = f.group(&[200, 200], GroupOptions::default());
        let first = group.member(0).unwrap().clone();

        group.pointer_enter(0);
        f.event_loop.advance(ms(200));
        assert_eq!(first.phase(), Phase::Open);

        group.pointer_leave(0);
        f.event_loop.advance(ms(100));
        assert_eq!(first.phase(), Phase::ClosingPending);

        // Coming back cancels the pending close.
        group.pointer_enter(0);
        f.event_loop.advance(ms(500));
        assert_eq!(first.phase(), Phase::Open);
    }

    #[test]
    fn test_leaving_before_open_delay_cancels() {
        let f = fixture();
        let group = f.group(&[200, 200], GroupOptions::default());

        group.pointer_enter(0);
        f.event_loop.advance(ms(100));
        group.pointer_leave(0);
        f.event_loop.advance(ms(500));

        assert_eq!(group.open_index(), None);
        assert!(!group.is_skip_delay_active());
    }

    #[test]
    fn test_navigate_wraps_skips_disabled_and_focuses() {
        let f = fixture();
        let group = f.group(&[0, 0, 0], GroupOptions::default());
        group.member(1).unwrap().set_disabled(true);

        assert_eq!(group.navigate(0, Direction::Next), Some(2));
        assert_eq!(group.open_index(), Some(2));
        assert_eq!(
            f.doc.focused(),
            Some(group.member(2).unwrap().trigger())
        );

        assert_eq!(group.navigate(0, Direction::Previous), Some(2));
        assert_eq!(group.navigate(2, Direction::Next), Some(0));
        assert_eq!(group.open_index(), Some(0));
    }

    #[test]
    fn test_escape_resets_open_index() {
        let f = fixture();
        let group = f.group(&[0, 0], GroupOptions::default());
        group.open_immediately(1).unwrap();

        assert!(f.doc.dispatch_key_down(KeyEvent::new(Key::Escape)));

        assert_eq!(group.open_index(), None);
        assert_eq!(open_members(&group), 0);
    }

    #[test]
    fn test_destroy_makes_skip_timer_inert() {
        let f = fixture();
        let group = f.group(&[0, 0], GroupOptions::default());
        group.open_immediately(0).unwrap();
        group.close_all();
        assert!(group.is_skip_delay_active());

        group.destroy();
        f.event_loop.advance(ms(1000));

        assert!(!group.is_skip_delay_active());
        group.member(0).unwrap().open_now();
        assert_eq!(group.open_index(), None);
    }
}
