//! Horizon Overlay - headless controllers for floating panels.
//!
//! The crate drives popovers, selects, menus, menubars and navigation menus
//! without owning any rendering. A host implements [`Platform`] over its
//! element tree; the controllers compute placement, run open/close
//! transitions on the shared [`EventLoop`], dismiss on Escape or outside
//! clicks, and move a roving highlight through panel items.
//!
//! - [`positioning`]: placement of a panel next to its anchor with flip,
//!   shift and size constraints
//! - [`disclosure`]: the open/close state machine with delays and
//!   controlled mode
//! - [`dismissal`]: a shared stack of dismissable layers
//! - [`navigation`]: roving focus and typeahead inside a panel
//! - [`group`]: mutual exclusion and hover takeover among sibling panels
//! - [`widgets`]: adapters reflecting all of the above as ARIA attributes
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use horizon_overlay::{Disclosure, DisclosureOptions, EventLoop, HeadlessDocument, Phase, Rect};
//!
//! let doc = Arc::new(HeadlessDocument::new(Rect::new(0.0, 0.0, 800.0, 600.0)));
//! let trigger = doc.create_element(None, Rect::new(100.0, 100.0, 80.0, 24.0));
//! let panel = doc.create_element(None, Rect::new(0.0, 0.0, 200.0, 120.0));
//!
//! let event_loop = EventLoop::new();
//! let popover = Disclosure::builder(doc.clone(), event_loop.clone())
//!     .trigger(trigger)
//!     .panel(panel)
//!     .options(DisclosureOptions::default().with_open_delay(Duration::from_millis(200)))
//!     .build()?;
//!
//! popover.open();
//! assert_eq!(popover.phase(), Phase::OpeningPending);
//! event_loop.advance(Duration::from_millis(200));
//! assert!(popover.is_open());
//! # Ok::<(), horizon_overlay::OverlayError>(())
//! ```

pub mod config;
pub mod disclosure;
pub mod dismissal;
pub mod document;
pub mod error;
pub mod geometry;
pub mod group;
pub mod keyboard;
pub mod navigation;
pub mod platform;
pub mod positioning;
pub mod widgets;

pub use horizon_overlay_core::{
    ConnectionGuard, ConnectionId, EventLoop, Signal, TaskHandle, TaskId, Timer, TimerId,
};

pub use config::{
    MenuConfig, MenubarConfig, NavigationMenuConfig, OverlayConfig, SelectConfig,
};
pub use disclosure::{Disclosure, DisclosureBuilder, DisclosureOptions, Phase};
pub use dismissal::{DismissGuard, DismissReason, DismissalLayers};
pub use document::HeadlessDocument;
pub use error::{OverlayError, Result};
pub use geometry::{Insets, Point, Rect, Size};
pub use group::{Direction, GroupCoordinator, GroupOptions, HoverMode};
pub use keyboard::{Key, KeyEvent, KeyboardModifiers};
pub use navigation::{ItemList, NavItem, NavOutcome, Orientation, RovingFocus};
pub use platform::{
    ElementId, KeyListener, LayoutListener, PanelGeometry, Platform, PointerDownEvent,
    PointerListener, Subscription,
};
pub use positioning::{
    Align, Placement, PlacementConfig, RepositionHandle, Side, compute_placement,
    start_auto_reposition,
};
pub use widgets::{
    Menu, MenuItem, MenuItemKind, MenuSelection, Menubar, MenubarMenu, NavigationItem,
    NavigationMenu, OverlayContext, Select, SelectOption,
};
