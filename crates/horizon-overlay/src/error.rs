//! Error types for Horizon Overlay.

use std::path::PathBuf;

use crate::platform::ElementId;

/// Result type alias for overlay operations.
pub type Result<T> = std::result::Result<T, OverlayError>;

/// Errors raised by overlay construction and configuration.
///
/// Registration mistakes are programmer errors. They are reported as loud
/// errors at construction time instead of producing a disclosure that silently
/// never opens.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    /// A disclosure was built without a trigger element.
    #[error("disclosure has a panel but no trigger was registered")]
    MissingTrigger,

    /// A disclosure was built without a panel element.
    #[error("disclosure has a trigger but no panel was registered")]
    MissingPanel,

    /// A registered element is not attached to the document.
    #[error("element {0:?} is not connected to the document")]
    ElementNotConnected(ElementId),

    /// Trigger and panel are the same element.
    #[error("trigger and panel must be distinct elements, got {0:?} twice")]
    SameElement(ElementId),

    /// A group member index was out of range.
    #[error("member index {index} is out of range for a group of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A group was created without members.
    #[error("a group needs at least one member")]
    EmptyGroup,

    /// Configuration could not be parsed.
    #[error("invalid overlay configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration could not be serialized.
    #[error("failed to serialize overlay configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Configuration file could not be read.
    #[error("failed to read configuration '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OverlayError {
    /// Create an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an out-of-range error.
    pub fn out_of_range(index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { index, len }
    }
}
