//! Overlay configuration.
//!
//! [`OverlayConfig`] collects the timing and placement defaults of every host
//! adapter. Every field has a default, so a configuration file only needs the
//! values it changes:
//!
//! ```toml
//! typeahead_timeout_ms = 800
//!
//! [navigation_menu]
//! open_delay_ms = 150
//! skip_delay_ms = 500
//!
//! [select.placement]
//! side = "top"
//! max_panel_height = 300.0
//! ```
//!
//! Delays are stored as milliseconds and converted to the runtime
//! [`DisclosureOptions`] and [`GroupOptions`] by the section accessors.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::disclosure::DisclosureOptions;
use crate::error::{OverlayError, Result};
use crate::group::{GroupOptions, HoverMode};
use crate::positioning::{Align, PlacementConfig, Side};

/// Select (listbox) defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectConfig {
    pub placement: PlacementConfig,
}

impl Default for SelectConfig {
    fn default() -> Self {
        Self {
            placement: PlacementConfig::default()
                .with_side(Side::Bottom)
                .with_align(Align::Start)
                .with_side_offset(4.0)
                .with_max_panel_height(384.0)
                .with_trigger_width(),
        }
    }
}

impl SelectConfig {
    /// Options for the select disclosure.
    pub fn disclosure_options(&self) -> DisclosureOptions {
        DisclosureOptions::default().with_placement(self.placement)
    }
}

/// Dropdown menu and submenu defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuConfig {
    /// Hover delay before a submenu opens.
    pub submenu_open_delay_ms: u64,
    /// Delay before a submenu closes once the pointer leaves its item.
    pub submenu_close_delay_ms: u64,
    /// Wrap arrow-key navigation at the ends.
    pub loop_navigation: bool,
    pub placement: PlacementConfig,
    pub submenu_placement: PlacementConfig,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            submenu_open_delay_ms: 100,
            submenu_close_delay_ms: 100,
            loop_navigation: true,
            placement: PlacementConfig::default().with_side_offset(4.0),
            submenu_placement: PlacementConfig::default()
                .with_side(Side::Right)
                .with_align(Align::Start)
                .with_side_offset(0.0)
                .with_align_offset(-4.0),
        }
    }
}

impl MenuConfig {
    /// Options for a top-level menu.
    pub fn disclosure_options(&self) -> DisclosureOptions {
        DisclosureOptions::default().with_placement(self.placement)
    }

    /// Options for a submenu.
    pub fn submenu_options(&self) -> DisclosureOptions {
        DisclosureOptions::default()
            .with_open_delay(Duration::from_millis(self.submenu_open_delay_ms))
            .with_close_delay(Duration::from_millis(self.submenu_close_delay_ms))
            .with_placement(self.submenu_placement)
    }
}

/// Menubar defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenubarConfig {
    /// Skip-delay window after a menu closes.
    pub skip_delay_ms: u64,
    /// Wrap arrow-key movement between top-level menus.
    pub loop_navigation: bool,
    pub placement: PlacementConfig,
}

impl Default for MenubarConfig {
    fn default() -> Self {
        Self {
            skip_delay_ms: 0,
            loop_navigation: true,
            placement: PlacementConfig::default().with_side_offset(8.0),
        }
    }
}

impl MenubarConfig {
    /// Options for each top-level menu.
    pub fn disclosure_options(&self) -> DisclosureOptions {
        DisclosureOptions::default().with_placement(self.placement)
    }

    /// Group options; a menubar only switches menus on hover once one is open.
    pub fn group_options(&self) -> GroupOptions {
        GroupOptions {
            skip_delay: Duration::from_millis(self.skip_delay_ms),
            hover_mode: HoverMode::TakeoverOnly,
        }
    }
}

/// Navigation menu defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationMenuConfig {
    pub open_delay_ms: u64,
    pub close_delay_ms: u64,
    pub skip_delay_ms: u64,
    pub placement: PlacementConfig,
}

impl Default for NavigationMenuConfig {
    fn default() -> Self {
        Self {
            open_delay_ms: 200,
            close_delay_ms: 150,
            skip_delay_ms: 300,
            placement: PlacementConfig::default()
                .with_align(Align::Center)
                .with_side_offset(0.0),
        }
    }
}

impl NavigationMenuConfig {
    /// Options for each navigation item.
    pub fn disclosure_options(&self) -> DisclosureOptions {
        DisclosureOptions::default()
            .with_open_delay(Duration::from_millis(self.open_delay_ms))
            .with_close_delay(Duration::from_millis(self.close_delay_ms))
            .with_placement(self.placement)
    }

    /// Group options; hover opens items.
    pub fn group_options(&self) -> GroupOptions {
        GroupOptions {
            skip_delay: Duration::from_millis(self.skip_delay_ms),
            hover_mode: HoverMode::OpenOnHover,
        }
    }
}

/// Configuration for every host adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Idle time after which the typeahead buffer resets.
    pub typeahead_timeout_ms: u64,
    pub select: SelectConfig,
    pub menu: MenuConfig,
    pub menubar: MenubarConfig,
    pub navigation_menu: NavigationMenuConfig,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            typeahead_timeout_ms: 1000,
            select: SelectConfig::default(),
            menu: MenuConfig::default(),
            menubar: MenubarConfig::default(),
            navigation_menu: NavigationMenuConfig::default(),
        }
    }
}

impl OverlayConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Read a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| OverlayError::io(path, e))?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(
            target: horizon_overlay_core::logging::targets::WIDGETS,
            path = %path.display(),
            "overlay configuration loaded"
        );
        Ok(config)
    }

    /// Serialize to pretty-printed TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The typeahead reset timeout.
    pub fn typeahead_timeout(&self) -> Duration {
        Duration::from_millis(self.typeahead_timeout_ms)
    }
}
