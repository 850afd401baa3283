//! Game Overlay Library
//!
//! Overlay-mode control shared by the overlay shell and the question client.
//!
//! Architecture:
//! - The controller owns the main window and the authoritative overlay mode
//! - Display surfaces talk to it through the mode bridge (ipc module)
//! - Out-of-process surfaces reach the bridge through the stdio relay

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod hotkey;
pub mod ipc;
pub mod mode;
pub mod relay;
pub mod surface;
pub mod window;

pub use controller::{OverlayController, OverlayStyle, ShortcutBinding, StartupWarning};
pub use error::{OverlayError, OverlayResult};
pub use ipc::{BridgeEvent, BridgeMessage, DisplayLink, Subscription};
pub use mode::OverlayMode;
