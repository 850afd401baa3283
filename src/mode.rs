//! Overlay mode and the handle display surfaces use to read it

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Display state of the main overlay window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverlayMode {
    /// Regular desktop window
    #[default]
    Normal,
    /// Transparent, always-on-top, hidden from the taskbar
    Overlay,
}

impl OverlayMode {
    /// The mode a toggle leads to
    pub fn toggled(self) -> Self {
        match self {
            OverlayMode::Normal => OverlayMode::Overlay,
            OverlayMode::Overlay => OverlayMode::Normal,
        }
    }

    pub fn is_overlay(self) -> bool {
        self == OverlayMode::Overlay
    }

    pub fn from_overlay_flag(is_overlay: bool) -> Self {
        if is_overlay {
            OverlayMode::Overlay
        } else {
            OverlayMode::Normal
        }
    }

    /// Label for a toggle button showing this mode
    pub fn toggle_label(self) -> &'static str {
        match self {
            OverlayMode::Normal => "Enter Overlay Mode",
            OverlayMode::Overlay => "Exit Overlay Mode",
        }
    }
}

impl fmt::Display for OverlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlayMode::Normal => write!(f, "normal"),
            OverlayMode::Overlay => write!(f, "overlay"),
        }
    }
}

/// The authoritative mode cell. Only the controller holds one of these;
/// everyone else gets a [`ModeReader`].
#[derive(Debug, Default)]
pub(crate) struct SharedMode {
    cell: Arc<RwLock<OverlayMode>>,
}

impl SharedMode {
    pub(crate) fn get(&self) -> OverlayMode {
        *self.cell.read()
    }

    pub(crate) fn set(&self, mode: OverlayMode) {
        *self.cell.write() = mode;
    }

    pub(crate) fn reader(&self) -> ModeReader {
        ModeReader {
            cell: Arc::clone(&self.cell),
        }
    }
}

/// Read-only view of the controller's current mode
#[derive(Debug, Clone)]
pub struct ModeReader {
    cell: Arc<RwLock<OverlayMode>>,
}

impl ModeReader {
    pub fn get(&self) -> OverlayMode {
        *self.cell.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_is_involution() {
        assert_eq!(OverlayMode::Normal.toggled(), OverlayMode::Overlay);
        assert_eq!(OverlayMode::Overlay.toggled(), OverlayMode::Normal);
        assert_eq!(OverlayMode::Normal.toggled().toggled(), OverlayMode::Normal);
    }

    #[test]
    fn test_reader_sees_writes() {
        let shared = SharedMode::default();
        let reader = shared.reader();
        assert_eq!(reader.get(), OverlayMode::Normal);

        shared.set(OverlayMode::Overlay);
        assert_eq!(reader.get(), OverlayMode::Overlay);
        assert!(reader.get().is_overlay());
    }

    #[test]
    fn test_toggle_label() {
        assert_eq!(OverlayMode::Normal.toggle_label(), "Enter Overlay Mode");
        assert_eq!(
            OverlayMode::from_overlay_flag(true).toggle_label(),
            "Exit Overlay Mode"
        );
    }
}
