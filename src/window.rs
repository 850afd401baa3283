//! winit-backed overlay window
//!
//! winit covers visibility, window level, resizing, minimizing and input
//! hit-testing. Taskbar exclusion and whole-window opacity need the Win32 API;
//! on other platforms those two are recorded but not applied.

use crate::config::OverlayConfig;
use crate::error::{OverlayError, OverlayResult};
use crate::surface::{DisplaySurface, SurfaceProperties, SurfaceProperty};
use anyhow::{Context, Result};
use winit::dpi::LogicalSize;
use winit::event_loop::EventLoopWindowTarget;
use winit::window::{Window, WindowBuilder, WindowId, WindowLevel};

pub const MAIN_WINDOW_TITLE: &str = "Game Overlay";
pub const DEV_PANEL_TITLE: &str = "Developer Data Import";

/// Create the main window: frameless, transparent, resizable, not on top
pub fn build_main_window<T: 'static>(
    target: &EventLoopWindowTarget<T>,
    config: &OverlayConfig,
) -> Result<Window> {
    WindowBuilder::new()
        .with_title(MAIN_WINDOW_TITLE)
        .with_inner_size(LogicalSize::new(
            config.window_width as f64,
            config.window_height as f64,
        ))
        .with_decorations(false)
        .with_transparent(true)
        .with_resizable(true)
        .with_window_level(WindowLevel::Normal)
        .build(target)
        .context("Failed to create overlay window")
}

/// Create the developer panel window
pub fn build_dev_panel<T: 'static>(target: &EventLoopWindowTarget<T>) -> Result<Window> {
    WindowBuilder::new()
        .with_title(DEV_PANEL_TITLE)
        .with_inner_size(LogicalSize::new(450.0, 600.0))
        .with_decorations(false)
        .with_transparent(true)
        .with_resizable(true)
        .build(target)
        .context("Failed to create developer panel")
}

/// The main window as a [`DisplaySurface`]
pub struct WinitSurface {
    window: Window,
    props: SurfaceProperties,
}

impl WinitSurface {
    pub fn new(window: Window) -> Self {
        Self {
            window,
            props: SurfaceProperties::default(),
        }
    }

    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }
}

impl DisplaySurface for WinitSurface {
    fn set_visible(&mut self, visible: bool) -> OverlayResult<()> {
        self.window.set_visible(visible);
        if visible {
            self.window.set_minimized(false);
            self.window.focus_window();
            self.props.minimized = false;
        }
        self.props.visible = visible;
        Ok(())
    }

    fn set_always_on_top(&mut self, on_top: bool) -> OverlayResult<()> {
        let level = if on_top {
            WindowLevel::AlwaysOnTop
        } else {
            WindowLevel::Normal
        };
        self.window.set_window_level(level);
        self.props.always_on_top = on_top;
        Ok(())
    }

    fn set_ignore_input(&mut self, ignore: bool) -> OverlayResult<()> {
        self.window
            .set_cursor_hittest(!ignore)
            .map_err(|e| OverlayError::property(SurfaceProperty::IgnoreInput, e.to_string()))?;
        self.props.ignore_input = ignore;
        Ok(())
    }

    fn set_resizable(&mut self, resizable: bool) -> OverlayResult<()> {
        self.window.set_resizable(resizable);
        self.props.resizable = resizable;
        Ok(())
    }

    fn set_skip_taskbar(&mut self, skip: bool) -> OverlayResult<()> {
        #[cfg(windows)]
        {
            use winit::platform::windows::WindowExtWindows;
            self.window.set_skip_taskbar(skip);
        }
        #[cfg(not(windows))]
        tracing::debug!("Taskbar exclusion not supported on this platform (skip={})", skip);

        self.props.skip_taskbar = skip;
        Ok(())
    }

    fn set_opacity(&mut self, opacity: f32) -> OverlayResult<()> {
        #[cfg(windows)]
        win32::set_window_alpha(&self.window, opacity)?;
        #[cfg(not(windows))]
        tracing::debug!("Window opacity not supported on this platform ({})", opacity);

        self.props.opacity = opacity;
        Ok(())
    }

    fn set_transparent_background(&mut self, transparent: bool) -> OverlayResult<()> {
        self.window.set_transparent(transparent);
        self.props.transparent_background = transparent;
        Ok(())
    }

    fn set_minimized(&mut self, minimized: bool) -> OverlayResult<()> {
        self.window.set_minimized(minimized);
        self.props.minimized = minimized;
        Ok(())
    }

    fn properties(&self) -> SurfaceProperties {
        self.props
    }
}

#[cfg(windows)]
mod win32 {
    use crate::error::{OverlayError, OverlayResult};
    use crate::surface::SurfaceProperty;
    use raw_window_handle::{HasWindowHandle, RawWindowHandle};
    use windows::Win32::Foundation::{COLORREF, HWND};
    use windows::Win32::UI::WindowsAndMessaging::{
        GetWindowLongPtrW, SetLayeredWindowAttributes, SetWindowLongPtrW, GWL_EXSTYLE,
        LWA_ALPHA, WS_EX_LAYERED,
    };
    use winit::window::Window;

    /// Apply whole-window alpha through a layered window
    pub(super) fn set_window_alpha(window: &Window, opacity: f32) -> OverlayResult<()> {
        let handle = window
            .window_handle()
            .map_err(|e| OverlayError::property(SurfaceProperty::Opacity, e.to_string()))?;

        let hwnd = match handle.as_raw() {
            RawWindowHandle::Win32(h) => HWND(h.hwnd.get()),
            _ => {
                return Err(OverlayError::property(
                    SurfaceProperty::Opacity,
                    "not a Win32 window",
                ))
            }
        };

        let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;

        unsafe {
            let ex_style = GetWindowLongPtrW(hwnd, GWL_EXSTYLE);
            SetWindowLongPtrW(hwnd, GWL_EXSTYLE, ex_style | WS_EX_LAYERED.0 as isize);
            SetLayeredWindowAttributes(hwnd, COLORREF(0), alpha, LWA_ALPHA)
                .map_err(|e| OverlayError::property(SurfaceProperty::Opacity, e.to_string()))?;
        }

        Ok(())
    }
}
