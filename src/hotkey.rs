//! Global shortcut parsing and registration
//!
//! Uses the global-hotkey crate for cross-platform hotkey handling.
//! On Windows, pressed events only arrive while a Win32 message loop runs on
//! the thread that created the manager (the winit event loop does this).

use crate::error::{OverlayError, OverlayResult};
use global_hotkey::{
    hotkey::{Code, HotKey, Modifiers},
    GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// What a registered shortcut does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShortcutAction {
    ToggleOverlay,
    ToggleDevPanel,
}

impl fmt::Display for ShortcutAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShortcutAction::ToggleOverlay => write!(f, "toggle overlay"),
            ShortcutAction::ToggleDevPanel => write!(f, "toggle developer panel"),
        }
    }
}

/// Key combination such as `F2` or `Ctrl+Shift+O`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShortcutCombo {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub win: bool,
    /// Main key (A-Z, 0-9, F1-F12), upper case
    pub key: String,
}

impl ShortcutCombo {
    /// A single key without modifiers
    pub fn single(key: &str) -> OverlayResult<Self> {
        let key = key.trim().to_uppercase();
        if string_to_code(&key).is_none() {
            return Err(OverlayError::InvalidShortcut(key));
        }
        Ok(Self {
            ctrl: false,
            alt: false,
            shift: false,
            win: false,
            key,
        })
    }

    /// The global-hotkey form of this combination
    pub fn to_hotkey(&self) -> OverlayResult<HotKey> {
        let code = string_to_code(&self.key)
            .ok_or_else(|| OverlayError::InvalidShortcut(self.to_string()))?;
        let mods = to_hotkey_modifiers(self.ctrl, self.alt, self.shift, self.win);
        Ok(HotKey::new(Some(mods), code))
    }
}

impl fmt::Display for ShortcutCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.alt {
            f.write_str("Alt+")?;
        }
        if self.shift {
            f.write_str("Shift+")?;
        }
        if self.win {
            f.write_str("Win+")?;
        }
        f.write_str(&self.key)
    }
}

impl FromStr for ShortcutCombo {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || OverlayError::InvalidShortcut(s.to_string());

        let mut parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let key = parts.pop().filter(|k| !k.is_empty()).ok_or_else(invalid)?;
        let mut combo = ShortcutCombo::single(key).map_err(|_| invalid())?;

        for part in parts {
            match part.to_lowercase().as_str() {
                "ctrl" | "control" => combo.ctrl = true,
                "alt" | "option" => combo.alt = true,
                "shift" => combo.shift = true,
                "win" | "super" | "meta" | "cmd" => combo.win = true,
                _ => return Err(invalid()),
            }
        }

        Ok(combo)
    }
}

impl TryFrom<String> for ShortcutCombo {
    type Error = OverlayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ShortcutCombo> for String {
    fn from(combo: ShortcutCombo) -> Self {
        combo.to_string()
    }
}

/// Convert modifier flags to global-hotkey Modifiers
fn to_hotkey_modifiers(ctrl: bool, alt: bool, shift: bool, win: bool) -> Modifiers {
    let mut mods = Modifiers::empty();
    if ctrl {
        mods |= Modifiers::CONTROL;
    }
    if alt {
        mods |= Modifiers::ALT;
    }
    if shift {
        mods |= Modifiers::SHIFT;
    }
    if win {
        mods |= Modifiers::META;
    }
    mods
}

/// Convert an upper-case key name to a global-hotkey Code
fn string_to_code(key: &str) -> Option<Code> {
    let code = match key {
        "A" => Code::KeyA,
        "B" => Code::KeyB,
        "C" => Code::KeyC,
        "D" => Code::KeyD,
        "E" => Code::KeyE,
        "F" => Code::KeyF,
        "G" => Code::KeyG,
        "H" => Code::KeyH,
        "I" => Code::KeyI,
        "J" => Code::KeyJ,
        "K" => Code::KeyK,
        "L" => Code::KeyL,
        "M" => Code::KeyM,
        "N" => Code::KeyN,
        "O" => Code::KeyO,
        "P" => Code::KeyP,
        "Q" => Code::KeyQ,
        "R" => Code::KeyR,
        "S" => Code::KeyS,
        "T" => Code::KeyT,
        "U" => Code::KeyU,
        "V" => Code::KeyV,
        "W" => Code::KeyW,
        "X" => Code::KeyX,
        "Y" => Code::KeyY,
        "Z" => Code::KeyZ,
        "0" => Code::Digit0,
        "1" => Code::Digit1,
        "2" => Code::Digit2,
        "3" => Code::Digit3,
        "4" => Code::Digit4,
        "5" => Code::Digit5,
        "6" => Code::Digit6,
        "7" => Code::Digit7,
        "8" => Code::Digit8,
        "9" => Code::Digit9,
        "F1" => Code::F1,
        "F2" => Code::F2,
        "F3" => Code::F3,
        "F4" => Code::F4,
        "F5" => Code::F5,
        "F6" => Code::F6,
        "F7" => Code::F7,
        "F8" => Code::F8,
        "F9" => Code::F9,
        "F10" => Code::F10,
        "F11" => Code::F11,
        "F12" => Code::F12,
        _ => return None,
    };
    Some(code)
}

/// System-wide shortcut registration
pub trait ShortcutRegistrar {
    /// Claim `combo` for this process and return its event id
    fn register(&mut self, combo: &ShortcutCombo) -> OverlayResult<u32>;
    fn unregister(&mut self, id: u32) -> OverlayResult<()>;
}

/// [`ShortcutRegistrar`] backed by the OS through global-hotkey.
///
/// If the manager can't be created (no X server, sandbox, ...) the registrar
/// still exists and every registration fails with `BindingUnavailable`, so
/// the failure reaches the user through the normal startup warnings.
pub struct GlobalHotkeyRegistrar {
    manager: Result<GlobalHotKeyManager, String>,
    hotkeys: HashMap<u32, HotKey>,
}

impl GlobalHotkeyRegistrar {
    pub fn new() -> Self {
        let manager = GlobalHotKeyManager::new().map_err(|e| {
            warn!("Failed to create hotkey manager: {}", e);
            e.to_string()
        });
        if manager.is_ok() {
            info!("Hotkey manager initialized");
        }
        Self {
            manager,
            hotkeys: HashMap::new(),
        }
    }
}

impl Default for GlobalHotkeyRegistrar {
    fn default() -> Self {
        Self::new()
    }
}

impl ShortcutRegistrar for GlobalHotkeyRegistrar {
    fn register(&mut self, combo: &ShortcutCombo) -> OverlayResult<u32> {
        let manager = self
            .manager
            .as_ref()
            .map_err(|reason| OverlayError::BindingUnavailable(reason.clone()))?;

        let hotkey = combo.to_hotkey()?;
        match manager.register(hotkey) {
            Ok(()) => {
                debug!("Registered hotkey {}: {:?}", combo, hotkey);
                self.hotkeys.insert(hotkey.id(), hotkey);
                Ok(hotkey.id())
            }
            Err(global_hotkey::Error::AlreadyRegistered(_))
            | Err(global_hotkey::Error::FailedToRegister(_)) => {
                Err(OverlayError::BindingConflict(combo.to_string()))
            }
            Err(e) => Err(OverlayError::BindingUnavailable(e.to_string())),
        }
    }

    fn unregister(&mut self, id: u32) -> OverlayResult<()> {
        let hotkey = self
            .hotkeys
            .remove(&id)
            .ok_or(OverlayError::UnknownBinding(id))?;
        if let Ok(manager) = &self.manager {
            manager
                .unregister(hotkey)
                .map_err(|e| OverlayError::BindingUnavailable(e.to_string()))?;
        }
        Ok(())
    }
}

/// Ids of shortcuts pressed since the last call. Releases are ignored.
pub fn drain_pressed() -> Vec<u32> {
    GlobalHotKeyEvent::receiver()
        .try_iter()
        .filter(|event| event.state == HotKeyState::Pressed)
        .map(|event| {
            debug!("Hotkey event received: {:?}", event);
            event.id
        })
        .collect()
}

/// In-memory registrar. `claimed` combos behave as if another process
/// already owns them.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemoryRegistrar {
    pub claimed: Vec<ShortcutCombo>,
    pub unavailable: bool,
    pub registered: HashMap<u32, ShortcutCombo>,
    next_id: u32,
}

#[cfg(test)]
impl MemoryRegistrar {
    /// A registrar where `combos` are already taken by someone else
    pub fn claiming(combos: Vec<ShortcutCombo>) -> Self {
        Self {
            claimed: combos,
            ..Default::default()
        }
    }

    /// A registrar that refuses every registration
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
impl ShortcutRegistrar for MemoryRegistrar {
    fn register(&mut self, combo: &ShortcutCombo) -> OverlayResult<u32> {
        if self.unavailable {
            return Err(OverlayError::BindingUnavailable("no display".into()));
        }
        if self.claimed.contains(combo) || self.registered.values().any(|c| c == combo) {
            return Err(OverlayError::BindingConflict(combo.to_string()));
        }
        self.next_id += 1;
        self.registered.insert(self.next_id, combo.clone());
        Ok(self.next_id)
    }

    fn unregister(&mut self, id: u32) -> OverlayResult<()> {
        self.registered
            .remove(&id)
            .map(|_| ())
            .ok_or(OverlayError::UnknownBinding(id))
    }
}
