//! Overlay Controller
//!
//! Owns the main display surface and the authoritative [`OverlayMode`].
//! Every mode flip, whether it comes from a global shortcut or from a
//! display surface's toggle request, goes through [`OverlayController::toggle_mode`],
//! which holds one lock across the whole property-apply sequence.

use crate::config::OverlayConfig;
use crate::error::{OverlayError, OverlayResult};
use crate::hotkey::{ShortcutAction, ShortcutCombo, ShortcutRegistrar};
use crate::ipc::{ControlRequest, DisplayLink, ModeBridge};
use crate::mode::{OverlayMode, SharedMode};
use crate::surface::{DisplaySurface, SurfaceProperties};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Opacity used while in overlay mode unless configured otherwise
pub const DEFAULT_OVERLAY_OPACITY: f32 = 0.8;

/// Visual settings applied when entering overlay mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub opacity: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        OverlayStyle {
            opacity: DEFAULT_OVERLAY_OPACITY,
        }
    }
}

impl OverlayStyle {
    pub fn from_config(config: &OverlayConfig) -> Self {
        OverlayStyle {
            opacity: config.overlay_opacity.clamp(0.0, 1.0),
        }
    }
}

/// A shortcut this controller currently holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutBinding {
    pub id: u32,
    pub combo: ShortcutCombo,
    pub action: ShortcutAction,
}

/// A shortcut that could not be registered at startup
#[derive(Debug)]
pub struct StartupWarning {
    pub combo: ShortcutCombo,
    pub action: ShortcutAction,
    pub error: OverlayError,
}

impl fmt::Display for StartupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "The {} shortcut ({}) is not available: {}",
            self.action, self.combo, self.error
        )
    }
}

struct ControllerState<S, R> {
    surface: S,
    registrar: R,
    bindings: HashMap<u32, ShortcutBinding>,
}

pub struct OverlayController<S: DisplaySurface, R: ShortcutRegistrar> {
    state: Mutex<ControllerState<S, R>>,
    mode: SharedMode,
    bridge: ModeBridge,
    style: OverlayStyle,
}

impl<S: DisplaySurface, R: ShortcutRegistrar> OverlayController<S, R> {
    /// Take ownership of the surface. The surface is assumed to be in its
    /// normal-mode state; the controller starts in [`OverlayMode::Normal`].
    pub fn new(surface: S, registrar: R, style: OverlayStyle) -> Self {
        let mode = SharedMode::default();
        let bridge = ModeBridge::new(mode.reader());
        Self {
            state: Mutex::new(ControllerState {
                surface,
                registrar,
                bindings: HashMap::new(),
            }),
            mode,
            bridge,
            style,
        }
    }

    pub fn current_mode(&self) -> OverlayMode {
        self.mode.get()
    }

    /// A new display-side endpoint of the mode bridge
    pub fn display_link(&self) -> DisplayLink {
        self.bridge.link()
    }

    /// Flip the mode and apply the matching window properties.
    ///
    /// On a rejected property write every property already changed is put
    /// back to its value from before the call, the mode stays as it was and
    /// nobody is notified. Notifications go out in toggle order.
    pub fn toggle_mode(&self) -> OverlayResult<OverlayMode> {
        let next = {
            let mut state = self.state.lock();
            let current = self.mode.get();
            let next = current.toggled();
            let before = state.surface.properties();

            if let Err(e) = apply_mode(&mut state.surface, next, self.style) {
                error!("Failed to enter {} mode: {}", next, e);
                restore_properties(&mut state.surface, &before);
                return Err(e);
            }

            self.mode.set(next);
            self.bridge.enqueue_mode(next);
            next
        };

        info!("Overlay mode is now {}", next);
        self.bridge.flush();
        Ok(next)
    }

    /// Let mouse input pass through the main window, or stop doing so.
    /// Entering overlay mode turns click-through off again.
    pub fn set_click_through(&self, passthrough: bool) -> OverlayResult<()> {
        let mut state = self.state.lock();
        state.surface.set_ignore_input(passthrough)?;
        info!("Click-through {}", if passthrough { "on" } else { "off" });
        Ok(())
    }

    /// Handle the requests queued on the bridge when called. Returns how many
    /// were processed, including ones that failed. Requests sent by handlers
    /// while this runs are left for the next call.
    pub fn process_requests(&self) -> usize {
        let mut handled = 0;
        for request in self.bridge.pending() {
            match request {
                ControlRequest::ToggleOverlay => {
                    debug!("Toggle requested by display surface");
                    if let Err(e) = self.toggle_mode() {
                        error!("Toggle request failed: {}", e);
                    }
                }
                ControlRequest::SetClickThrough(passthrough) => {
                    if let Err(e) = self.set_click_through(passthrough) {
                        error!("Click-through request failed: {}", e);
                    }
                }
            }
            handled += 1;
        }
        handled
    }

    /// Bind `combo` system-wide to toggle overlay mode
    pub fn register_global_toggle_shortcut(
        &self,
        combo: &ShortcutCombo,
    ) -> OverlayResult<ShortcutBinding> {
        self.register_shortcut(combo, ShortcutAction::ToggleOverlay)
    }

    /// Bind `combo` system-wide to `action`. A combination can hold one
    /// binding at a time.
    pub fn register_shortcut(
        &self,
        combo: &ShortcutCombo,
        action: ShortcutAction,
    ) -> OverlayResult<ShortcutBinding> {
        let mut state = self.state.lock();

        if state.bindings.values().any(|binding| &binding.combo == combo) {
            return Err(OverlayError::BindingConflict(combo.to_string()));
        }

        let id = state.registrar.register(combo)?;
        let binding = ShortcutBinding {
            id,
            combo: combo.clone(),
            action,
        };
        state.bindings.insert(id, binding.clone());
        info!("Registered {} for {}", combo, action);
        Ok(binding)
    }

    /// Register the shortcuts named in `config`. Failures don't stop
    /// startup; they come back as warnings for the shell to show.
    pub fn register_configured_shortcuts(&self, config: &OverlayConfig) -> Vec<StartupWarning> {
        let mut wanted = vec![(config.toggle_shortcut.clone(), ShortcutAction::ToggleOverlay)];
        if let Some(combo) = &config.dev_panel_shortcut {
            wanted.push((combo.clone(), ShortcutAction::ToggleDevPanel));
        }

        wanted
            .into_iter()
            .filter_map(|(combo, action)| match self.register_shortcut(&combo, action) {
                Ok(_) => None,
                Err(error) => {
                    warn!("Could not register {} for {}: {}", combo, action, error);
                    Some(StartupWarning {
                        combo,
                        action,
                        error,
                    })
                }
            })
            .collect()
    }

    /// React to a pressed global shortcut. Toggles overlay mode for the
    /// toggle binding; every other action is returned for the caller.
    pub fn on_shortcut_pressed(&self, id: u32) -> OverlayResult<Option<ShortcutAction>> {
        let action = self.state.lock().bindings.get(&id).map(|b| b.action);
        match action {
            Some(ShortcutAction::ToggleOverlay) => {
                self.toggle_mode()?;
                Ok(Some(ShortcutAction::ToggleOverlay))
            }
            Some(other) => Ok(Some(other)),
            None => {
                debug!("Ignoring unbound hotkey id {}", id);
                Ok(None)
            }
        }
    }

    pub fn bindings(&self) -> Vec<ShortcutBinding> {
        let mut bindings: Vec<_> = self.state.lock().bindings.values().cloned().collect();
        bindings.sort_by_key(|b| b.id);
        bindings
    }

    pub fn surface_properties(&self) -> SurfaceProperties {
        self.state.lock().surface.properties()
    }

    /// Run `f` against the surface while holding the controller lock
    pub fn inspect_surface<T>(&self, f: impl FnOnce(&S) -> T) -> T {
        f(&self.state.lock().surface)
    }

    /// Release every shortcut. Safe to call more than once.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if state.bindings.is_empty() {
            return;
        }

        let ControllerState {
            registrar,
            bindings,
            ..
        } = &mut *state;
        for (id, binding) in bindings.drain() {
            if let Err(e) = registrar.unregister(id) {
                warn!("Failed to unregister {}: {}", binding.combo, e);
            }
        }
        info!("Overlay controller shut down, shortcuts released");
    }
}

impl<S: DisplaySurface, R: ShortcutRegistrar> Drop for OverlayController<S, R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Write the fixed property set for `mode`
fn apply_mode<S: DisplaySurface>(
    surface: &mut S,
    mode: OverlayMode,
    style: OverlayStyle,
) -> OverlayResult<()> {
    match mode {
        OverlayMode::Overlay => {
            surface.set_visible(true)?;
            surface.set_always_on_top(true)?;
            surface.set_ignore_input(false)?;
            surface.set_resizable(false)?;
            surface.set_skip_taskbar(true)?;
            surface.set_opacity(style.opacity)?;
            surface.set_transparent_background(true)?;
        }
        OverlayMode::Normal => {
            surface.set_always_on_top(false)?;
            surface.set_skip_taskbar(false)?;
            surface.set_minimized(true)?;
            surface.set_opacity(1.0)?;
        }
    }
    Ok(())
}

/// Write back every property that differs from `snapshot`. Failures are
/// logged and the rest are still attempted.
fn restore_properties<S: DisplaySurface>(surface: &mut S, snapshot: &SurfaceProperties) {
    let now = surface.properties();
    let mut results = Vec::new();

    if now.opacity != snapshot.opacity {
        results.push(surface.set_opacity(snapshot.opacity));
    }
    if now.transparent_background != snapshot.transparent_background {
        results.push(surface.set_transparent_background(snapshot.transparent_background));
    }
    if now.skip_taskbar != snapshot.skip_taskbar {
        results.push(surface.set_skip_taskbar(snapshot.skip_taskbar));
    }
    if now.resizable != snapshot.resizable {
        results.push(surface.set_resizable(snapshot.resizable));
    }
    if now.ignore_input != snapshot.ignore_input {
        results.push(surface.set_ignore_input(snapshot.ignore_input));
    }
    if now.always_on_top != snapshot.always_on_top {
        results.push(surface.set_always_on_top(snapshot.always_on_top));
    }
    // Showing a window un-minimizes it, so visibility goes first
    if now.visible != snapshot.visible {
        results.push(surface.set_visible(snapshot.visible));
    }
    if surface.properties().minimized != snapshot.minimized {
        results.push(surface.set_minimized(snapshot.minimized));
    }

    for e in results.into_iter().filter_map(Result::err) {
        warn!("Failed to restore window state: {}", e);
    }
}
