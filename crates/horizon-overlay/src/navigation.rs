//! Roving focus and typeahead over the items of an open panel.
//!
//! [`RovingFocus`] owns the highlighted index of an [`ItemList`]. It never
//! points at a disabled item: arrow keys skip disabled entries (wrapping
//! unless looping is off), Home/End jump to the first/last enabled entry, and
//! an empty or all-disabled list keeps the highlight at `None`.
//!
//! Key handling is pure: [`RovingFocus::handle_key`] updates the highlight and
//! returns a [`NavOutcome`] telling the host what else to do (activate an
//! item, open or close a submenu, swallow Tab).

use std::time::Duration;

use horizon_overlay_core::logging::targets;

use crate::keyboard::{Key, KeyEvent};
use crate::platform::ElementId;

/// Default time after which the typeahead buffer resets.
pub const DEFAULT_TYPEAHEAD_TIMEOUT: Duration = Duration::from_millis(1000);

/// Axis the arrow keys move along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    /// Up/Down move; Right/Left open and close submenus.
    #[default]
    Vertical,
    /// Left/Right move (menubar triggers).
    Horizontal,
}

/// One focusable entry of a panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavItem {
    pub element: ElementId,
    /// Text matched by typeahead.
    pub label: String,
    /// Value for select-like panels.
    pub value: Option<String>,
    pub disabled: bool,
    /// Whether the item opens a submenu.
    pub has_submenu: bool,
}

impl NavItem {
    /// Create an enabled item.
    pub fn new(element: ElementId, label: impl Into<String>) -> Self {
        Self {
            element,
            label: label.into(),
            value: None,
            disabled: false,
            has_submenu: false,
        }
    }

    /// Set the value.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the disabled flag.
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Mark the item as a submenu trigger.
    pub fn with_submenu(mut self) -> Self {
        self.has_submenu = true;
        self
    }
}

/// Ordered list of panel entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemList {
    items: Vec<NavItem>,
}

impl ItemList {
    /// Create a list.
    pub fn new(items: Vec<NavItem>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&NavItem> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NavItem> {
        self.items.iter()
    }

    /// Whether `index` refers to an enabled item.
    pub fn is_enabled(&self, index: usize) -> bool {
        self.items.get(index).is_some_and(|item| !item.disabled)
    }

    /// Index of the item for `element`.
    pub fn position_of(&self, element: ElementId) -> Option<usize> {
        self.items.iter().position(|item| item.element == element)
    }

    /// Index of the enabled item carrying `value`.
    pub fn position_of_value(&self, value: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| !item.disabled && item.value.as_deref() == Some(value))
    }

    /// First enabled index.
    pub fn first_enabled(&self) -> Option<usize> {
        self.items.iter().position(|item| !item.disabled)
    }

    /// Last enabled index.
    pub fn last_enabled(&self) -> Option<usize> {
        self.items.iter().rposition(|item| !item.disabled)
    }

    /// The next enabled index after `start` (exclusive), wrapping if `looping`.
    fn next_enabled(&self, start: Option<usize>, looping: bool) -> Option<usize> {
        let count = self.items.len();
        let Some(current) = start else {
            return self.first_enabled();
        };
        for offset in 1..=count {
            let raw = current + offset;
            if raw >= count && !looping {
                break;
            }
            let index = raw % count;
            if self.is_enabled(index) {
                return Some(index);
            }
        }
        start.filter(|i| self.is_enabled(*i))
    }

    /// The previous enabled index before `start` (exclusive), wrapping if
    /// `looping`.
    fn previous_enabled(&self, start: Option<usize>, looping: bool) -> Option<usize> {
        let count = self.items.len();
        let Some(current) = start else {
            return self.last_enabled();
        };
        for offset in 1..=count {
            if offset > current && !looping {
                break;
            }
            let index = (current + count - offset) % count;
            if self.is_enabled(index) {
                return Some(index);
            }
        }
        start.filter(|i| self.is_enabled(*i))
    }
}

impl From<Vec<NavItem>> for ItemList {
    fn from(items: Vec<NavItem>) -> Self {
        Self::new(items)
    }
}

/// What a key press means for the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    /// The highlight is now on this item (it may not have moved).
    Highlighted(usize),
    /// Activate this item, as a click would.
    Activate(usize),
    /// Open the submenu of this item.
    OpenSubmenu(usize),
    /// Close this (sub)panel and return focus to its parent item.
    CloseSubmenu,
    /// Tab was swallowed while the panel is open.
    TabSuppressed,
    /// The key means nothing here.
    Ignored,
}

impl NavOutcome {
    /// Whether the host should prevent the key's default action.
    pub fn is_handled(&self) -> bool {
        !matches!(self, NavOutcome::Ignored)
    }
}

#[derive(Debug, Clone)]
struct Typeahead {
    buffer: String,
    last_input: Option<Duration>,
    timeout: Duration,
}

impl Typeahead {
    fn push(&mut self, ch: char, now: Duration) -> &str {
        if self
            .last_input
            .is_some_and(|last| now.saturating_sub(last) >= self.timeout)
        {
            self.buffer.clear();
        }
        self.buffer.extend(ch.to_lowercase());
        self.last_input = Some(now);
        &self.buffer
    }

    fn is_active(&self, now: Duration) -> bool {
        !self.buffer.is_empty()
            && self
                .last_input
                .is_some_and(|last| now.saturating_sub(last) < self.timeout)
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.last_input = None;
    }
}

/// Highlight state for one panel.
#[derive(Debug, Clone)]
pub struct RovingFocus {
    items: ItemList,
    highlighted: Option<usize>,
    orientation: Orientation,
    looping: bool,
    /// Whether this list lives in a submenu (ArrowLeft closes it).
    nested: bool,
    typeahead: Typeahead,
}

impl Default for RovingFocus {
    fn default() -> Self {
        Self::new(Orientation::Vertical)
    }
}

impl RovingFocus {
    /// Create an empty navigator.
    pub fn new(orientation: Orientation) -> Self {
        Self {
            items: ItemList::default(),
            highlighted: None,
            orientation,
            looping: true,
            nested: false,
            typeahead: Typeahead {
                buffer: String::new(),
                last_input: None,
                timeout: DEFAULT_TYPEAHEAD_TIMEOUT,
            },
        }
    }

    /// Enable or disable wrapping at the ends.
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Mark the list as belonging to a submenu.
    pub fn with_nested(mut self, nested: bool) -> Self {
        self.nested = nested;
        self
    }

    /// Set the typeahead reset timeout.
    pub fn with_typeahead_timeout(mut self, timeout: Duration) -> Self {
        self.typeahead.timeout = timeout;
        self
    }

    pub fn items(&self) -> &ItemList {
        &self.items
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// The highlighted index. Always an enabled item.
    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    /// The highlighted item.
    pub fn highlighted_item(&self) -> Option<&NavItem> {
        self.highlighted.and_then(|index| self.items.get(index))
    }

    /// Replace the items.
    ///
    /// The highlight follows its element when it is still present and
    /// enabled; otherwise it is cleared.
    pub fn set_items(&mut self, items: impl Into<ItemList>) {
        let previous = self.highlighted_item().map(|item| item.element);
        self.items = items.into();
        self.highlighted = previous
            .and_then(|element| self.items.position_of(element))
            .filter(|index| self.items.is_enabled(*index));
    }

    /// Highlight `index`. Returns `false` (and changes nothing) for disabled
    /// or out-of-range indices.
    pub fn highlight(&mut self, index: usize) -> bool {
        if !self.items.is_enabled(index) {
            return false;
        }
        self.set_highlighted(Some(index));
        true
    }

    /// Highlight the item for `element`, e.g. on pointer hover.
    pub fn highlight_element(&mut self, element: ElementId) -> bool {
        self.items
            .position_of(element)
            .is_some_and(|index| self.highlight(index))
    }

    /// Clear the highlight.
    pub fn clear_highlight(&mut self) {
        self.set_highlighted(None);
    }

    /// Initial highlight on open: the enabled item carrying
    /// `selected_value`, else the first enabled item.
    pub fn reset_highlight(&mut self, selected_value: Option<&str>) -> Option<usize> {
        self.typeahead.clear();
        let index = selected_value
            .and_then(|value| self.items.position_of_value(value))
            .or_else(|| self.items.first_enabled());
        self.set_highlighted(index);
        index
    }

    /// Highlight the first enabled item.
    pub fn highlight_first(&mut self) -> Option<usize> {
        let index = self.items.first_enabled();
        self.set_highlighted(index);
        index
    }

    /// Highlight the last enabled item.
    pub fn highlight_last(&mut self) -> Option<usize> {
        let index = self.items.last_enabled();
        self.set_highlighted(index);
        index
    }

    /// Move to the next enabled item.
    pub fn highlight_next(&mut self) -> Option<usize> {
        let index = self.items.next_enabled(self.highlighted, self.looping);
        self.set_highlighted(index);
        index
    }

    /// Move to the previous enabled item.
    pub fn highlight_previous(&mut self) -> Option<usize> {
        let index = self.items.previous_enabled(self.highlighted, self.looping);
        self.set_highlighted(index);
        index
    }

    fn set_highlighted(&mut self, index: Option<usize>) {
        if self.highlighted != index {
            tracing::trace!(target: targets::NAVIGATION, from = ?self.highlighted, to = ?index, "highlight moved");
            self.highlighted = index;
        }
    }

    fn moved(index: Option<usize>) -> NavOutcome {
        index.map_or(NavOutcome::Ignored, NavOutcome::Highlighted)
    }

    /// Interpret a key press. `now` drives the typeahead timeout.
    pub fn handle_key(&mut self, event: &KeyEvent, now: Duration) -> NavOutcome {
        let (next_key, previous_key) = match self.orientation {
            Orientation::Vertical => (Key::ArrowDown, Key::ArrowUp),
            Orientation::Horizontal => (Key::ArrowRight, Key::ArrowLeft),
        };

        match event.key {
            key if key == next_key => Self::moved(self.highlight_next()),
            key if key == previous_key => Self::moved(self.highlight_previous()),
            Key::Home | Key::PageUp => Self::moved(self.highlight_first()),
            Key::End | Key::PageDown => Self::moved(self.highlight_last()),
            Key::ArrowRight if self.orientation == Orientation::Vertical => {
                match self.highlighted_item() {
                    Some(item) if item.has_submenu => self
                        .highlighted
                        .map_or(NavOutcome::Ignored, NavOutcome::OpenSubmenu),
                    _ => NavOutcome::Ignored,
                }
            }
            Key::ArrowLeft if self.orientation == Orientation::Vertical && self.nested => {
                NavOutcome::CloseSubmenu
            }
            Key::Space if self.typeahead.is_active(now) => self.type_char(' ', now),
            Key::Enter | Key::Space => {
                let Some(index) = self.highlighted else {
                    return NavOutcome::Ignored;
                };
                if self.items.get(index).is_some_and(|item| item.has_submenu) {
                    NavOutcome::OpenSubmenu(index)
                } else {
                    NavOutcome::Activate(index)
                }
            }
            Key::Tab => NavOutcome::TabSuppressed,
            Key::Character(ch) if !event.modifiers.has_command() => self.type_char(ch, now),
            _ => NavOutcome::Ignored,
        }
    }

    fn type_char(&mut self, ch: char, now: Duration) -> NavOutcome {
        let buffer = self.typeahead.push(ch, now).to_owned();
        match self.typeahead_match(&buffer) {
            Some(index) => {
                self.set_highlighted(Some(index));
                NavOutcome::Highlighted(index)
            }
            None => NavOutcome::Ignored,
        }
    }

    /// Find the next enabled item whose label starts with `buffer`.
    ///
    /// A buffer of one repeated character ("aaa") searches for that single
    /// character and starts after the current item, so repeated presses cycle
    /// through the matches.
    fn typeahead_match(&self, buffer: &str) -> Option<usize> {
        let mut chars = buffer.chars();
        let first = chars.next()?;
        let repeated = chars.all(|ch| ch == first);
        let query = if repeated {
            first.to_string()
        } else {
            buffer.to_owned()
        };

        let count = self.items.len();
        let start = match self.highlighted {
            Some(index) if repeated => index + 1,
            Some(index) => index,
            None => 0,
        };
        (0..count)
            .map(|offset| (start + offset) % count)
            .find(|&index| {
                self.items.get(index).is_some_and(|item| {
                    !item.disabled && item.label.to_lowercase().starts_with(&query)
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn elements(count: usize) -> Vec<ElementId> {
        let mut map: SlotMap<ElementId, ()> = SlotMap::with_key();
        (0..count).map(|_| map.insert(())).collect()
    }

    fn list(disabled: &[bool]) -> Vec<NavItem> {
        elements(disabled.len())
            .into_iter()
            .zip(disabled)
            .enumerate()
            .map(|(i, (element, disabled))| {
                NavItem::new(element, format!("Item {i}")).with_disabled(*disabled)
            })
            .collect()
    }

    fn labelled(labels: &[&str]) -> Vec<NavItem> {
        elements(labels.len())
            .into_iter()
            .zip(labels)
            .map(|(element, label)| NavItem::new(element, *label))
            .collect()
    }

    fn press(nav: &mut RovingFocus, key: Key) -> NavOutcome {
        nav.handle_key(&KeyEvent::new(key), Duration::ZERO)
    }

    #[test]
    fn test_arrow_down_skips_disabled() {
        let mut nav = RovingFocus::default();
        nav.set_items(list(&[false, true, false]));
        nav.highlight(0);

        assert_eq!(press(&mut nav, Key::ArrowDown), NavOutcome::Highlighted(2));
        assert_eq!(nav.highlighted(), Some(2));
    }

    #[test]
    fn test_wrapping_and_no_looping() {
        let mut nav = RovingFocus::default();
        nav.set_items(list(&[false, false, true]));
        nav.highlight(1);

        press(&mut nav, Key::ArrowDown);
        assert_eq!(nav.highlighted(), Some(0));
        press(&mut nav, Key::ArrowUp);
        assert_eq!(nav.highlighted(), Some(1));

        let mut nav = RovingFocus::default().with_looping(false);
        nav.set_items(list(&[false, false, true]));
        nav.highlight(1);
        press(&mut nav, Key::ArrowDown);
        assert_eq!(nav.highlighted(), Some(1));
        nav.highlight(0);
        press(&mut nav, Key::ArrowUp);
        assert_eq!(nav.highlighted(), Some(0));
    }

    #[test]
    fn test_home_end() {
        let mut nav = RovingFocus::default();
        nav.set_items(list(&[true, false, false, true]));

        assert_eq!(press(&mut nav, Key::End), NavOutcome::Highlighted(2));
        assert_eq!(press(&mut nav, Key::Home), NavOutcome::Highlighted(1));
    }

    #[test]
    fn test_all_disabled_and_empty_lists() {
        let mut nav = RovingFocus::default();
        nav.set_items(list(&[true, true]));

        for key in [Key::ArrowDown, Key::ArrowUp, Key::Home, Key::End, Key::Enter, Key::Space] {
            assert_eq!(press(&mut nav, key), NavOutcome::Ignored);
            assert_eq!(nav.highlighted(), None);
        }
        assert!(!nav.highlight(0));

        nav.set_items(Vec::new());
        assert_eq!(press(&mut nav, Key::Enter), NavOutcome::Ignored);
        assert_eq!(nav.reset_highlight(None), None);
    }

    #[test]
    fn test_roving_invariant_over_key_sequences() {
        let layouts: [&[bool]; 4] = [
            &[false, true, false, true, false],
            &[true, false, true],
            &[true, true, true, false],
            &[false],
        ];
        let keys = [
            Key::ArrowDown,
            Key::ArrowDown,
            Key::End,
            Key::ArrowUp,
            Key::Home,
            Key::ArrowUp,
            Key::ArrowDown,
            Key::PageDown,
            Key::ArrowDown,
        ];

        for layout in layouts {
            for looping in [true, false] {
                let mut nav = RovingFocus::default().with_looping(looping);
                nav.set_items(list(layout));
                for key in keys {
                    press(&mut nav, key);
                    if let Some(index) = nav.highlighted() {
                        assert!(!layout[index], "{layout:?} highlighted disabled {index}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_activation() {
        let mut nav = RovingFocus::default();
        nav.set_items(list(&[false, false]));
        nav.highlight(1);

        assert_eq!(press(&mut nav, Key::Enter), NavOutcome::Activate(1));
        assert_eq!(press(&mut nav, Key::Space), NavOutcome::Activate(1));
    }

    #[test]
    fn test_tab_is_suppressed() {
        let mut nav = RovingFocus::default();
        assert_eq!(press(&mut nav, Key::Tab), NavOutcome::TabSuppressed);
        assert!(NavOutcome::TabSuppressed.is_handled());
    }

    #[test]
    fn test_submenu_keys() {
        let ids = elements(2);
        let items = vec![
            NavItem::new(ids[0], "Copy"),
            NavItem::new(ids[1], "Share").with_submenu(),
        ];

        let mut nav = RovingFocus::default();
        nav.set_items(items.clone());
        nav.highlight(0);
        assert_eq!(press(&mut nav, Key::ArrowRight), NavOutcome::Ignored);
        nav.highlight(1);
        assert_eq!(press(&mut nav, Key::ArrowRight), NavOutcome::OpenSubmenu(1));
        assert_eq!(press(&mut nav, Key::Enter), NavOutcome::OpenSubmenu(1));
        assert_eq!(press(&mut nav, Key::ArrowLeft), NavOutcome::Ignored);

        let mut sub = RovingFocus::default().with_nested(true);
        sub.set_items(items);
        assert_eq!(press(&mut sub, Key::ArrowLeft), NavOutcome::CloseSubmenu);
    }

    #[test]
    fn test_horizontal_orientation() {
        let mut nav = RovingFocus::new(Orientation::Horizontal);
        nav.set_items(list(&[false, false]));

        assert_eq!(press(&mut nav, Key::ArrowRight), NavOutcome::Highlighted(0));
        assert_eq!(press(&mut nav, Key::ArrowRight), NavOutcome::Highlighted(1));
        assert_eq!(press(&mut nav, Key::ArrowLeft), NavOutcome::Highlighted(0));
        assert_eq!(press(&mut nav, Key::ArrowDown), NavOutcome::Ignored);
    }

    #[test]
    fn test_reset_highlight_prefers_selected_value() {
        let ids = elements(3);
        let mut nav = RovingFocus::default();
        nav.set_items(vec![
            NavItem::new(ids[0], "Apple").with_value("apple"),
            NavItem::new(ids[1], "Banana").with_value("banana"),
            NavItem::new(ids[2], "Cherry")
                .with_value("cherry")
                .with_disabled(true),
        ]);

        assert_eq!(nav.reset_highlight(Some("banana")), Some(1));
        assert_eq!(nav.reset_highlight(Some("cherry")), Some(0));
        assert_eq!(nav.reset_highlight(None), Some(0));
    }

    #[test]
    fn test_set_items_follows_highlighted_element() {
        let ids = elements(3);
        let mut nav = RovingFocus::default();
        nav.set_items(vec![NavItem::new(ids[0], "a"), NavItem::new(ids[1], "b")]);
        nav.highlight(1);

        nav.set_items(vec![
            NavItem::new(ids[2], "c"),
            NavItem::new(ids[0], "a"),
            NavItem::new(ids[1], "b"),
        ]);
        assert_eq!(nav.highlighted(), Some(2));

        nav.set_items(vec![NavItem::new(ids[1], "b").with_disabled(true)]);
        assert_eq!(nav.highlighted(), None);
    }

    #[test]
    fn test_typeahead_prefix_and_timeout() {
        let mut nav = RovingFocus::default();
        nav.set_items(labelled(&["Apple", "Banana", "Blueberry", "Cherry"]));

        let t = Duration::from_millis;
        let typed = |nav: &mut RovingFocus, ch: char, at: u64| {
            nav.handle_key(&KeyEvent::new(Key::Character(ch)), t(at))
        };

        assert_eq!(typed(&mut nav, 'b', 0), NavOutcome::Highlighted(1));
        assert_eq!(typed(&mut nav, 'l', 100), NavOutcome::Highlighted(2));

        // After the timeout the buffer starts over.
        assert_eq!(typed(&mut nav, 'c', 2000), NavOutcome::Highlighted(3));
        assert_eq!(typed(&mut nav, 'z', 3500), NavOutcome::Ignored);
        assert_eq!(nav.highlighted(), Some(3));
    }

    #[test]
    fn test_typeahead_repeated_character_cycles() {
        let mut nav = RovingFocus::default();
        nav.set_items(labelled(&["Banana", "Apple", "Blueberry", "Boysenberry"]));

        let mut at = 0;
        let mut typed = |nav: &mut RovingFocus| {
            at += 10;
            nav.handle_key(
                &KeyEvent::new(Key::Character('B')),
                Duration::from_millis(at),
            )
        };

        assert_eq!(typed(&mut nav), NavOutcome::Highlighted(0));
        assert_eq!(typed(&mut nav), NavOutcome::Highlighted(2));
        assert_eq!(typed(&mut nav), NavOutcome::Highlighted(3));
        assert_eq!(typed(&mut nav), NavOutcome::Highlighted(0));
    }

    #[test]
    fn test_typeahead_space_continues_search() {
        let mut nav = RovingFocus::default();
        nav.set_items(labelled(&["New File", "New Window", "Open"]));

        let at = |ms| Duration::from_millis(ms);
        nav.handle_key(&KeyEvent::new(Key::Character('n')), at(0));
        nav.handle_key(&KeyEvent::new(Key::Character('e')), at(10));
        nav.handle_key(&KeyEvent::new(Key::Character('w')), at(20));
        assert_eq!(nav.handle_key(&KeyEvent::new(Key::Space), at(30)), NavOutcome::Highlighted(0));
        assert_eq!(
            nav.handle_key(&KeyEvent::new(Key::Character('w')), at(40)),
            NavOutcome::Highlighted(1)
        );

        // Once the buffer expires, Space activates again.
        assert_eq!(nav.handle_key(&KeyEvent::new(Key::Space), at(5000)), NavOutcome::Activate(1));
    }
}
