//! Display surfaces
//!
//! A [`DisplaySurface`] is the one window the controller mutates. The winit
//! implementation lives in [`crate::window`]; [`HeadlessSurface`] keeps the
//! same properties in memory for headless runs and tests.

use crate::error::{OverlayError, OverlayResult};
use std::fmt;

/// A single window property the controller writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceProperty {
    Visible,
    AlwaysOnTop,
    IgnoreInput,
    Resizable,
    SkipTaskbar,
    Opacity,
    TransparentBackground,
    Minimized,
}

impl fmt::Display for SurfaceProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SurfaceProperty::Visible => "visible",
            SurfaceProperty::AlwaysOnTop => "always-on-top",
            SurfaceProperty::IgnoreInput => "ignore-input",
            SurfaceProperty::Resizable => "resizable",
            SurfaceProperty::SkipTaskbar => "skip-taskbar",
            SurfaceProperty::Opacity => "opacity",
            SurfaceProperty::TransparentBackground => "transparent-background",
            SurfaceProperty::Minimized => "minimized",
        };
        f.write_str(name)
    }
}

/// Snapshot of every property a surface tracks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceProperties {
    pub visible: bool,
    pub always_on_top: bool,
    pub opacity: f32,
    pub resizable: bool,
    pub skip_taskbar: bool,
    pub ignore_input: bool,
    pub transparent_background: bool,
    pub minimized: bool,
}

impl Default for SurfaceProperties {
    /// Matches a freshly created main window
    fn default() -> Self {
        SurfaceProperties {
            visible: true,
            always_on_top: false,
            opacity: 1.0,
            resizable: true,
            skip_taskbar: false,
            ignore_input: false,
            transparent_background: true,
            minimized: false,
        }
    }
}

/// Window operations the overlay controller needs
pub trait DisplaySurface {
    fn set_visible(&mut self, visible: bool) -> OverlayResult<()>;
    fn set_always_on_top(&mut self, on_top: bool) -> OverlayResult<()>;
    fn set_ignore_input(&mut self, ignore: bool) -> OverlayResult<()>;
    fn set_resizable(&mut self, resizable: bool) -> OverlayResult<()>;
    fn set_skip_taskbar(&mut self, skip: bool) -> OverlayResult<()>;
    /// `opacity` is already clamped to `[0, 1]`
    fn set_opacity(&mut self, opacity: f32) -> OverlayResult<()>;
    fn set_transparent_background(&mut self, transparent: bool) -> OverlayResult<()>;
    fn set_minimized(&mut self, minimized: bool) -> OverlayResult<()>;

    fn properties(&self) -> SurfaceProperties;
}

/// One recorded property write on a [`HeadlessSurface`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyWrite {
    pub property: SurfaceProperty,
    pub value: f32,
}

/// In-memory surface. Records every write in a journal and can be told to
/// reject a property to simulate the OS refusing a change.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    props: SurfaceProperties,
    journal: Vec<PropertyWrite>,
    rejected: Option<SurfaceProperty>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write to `property` fail until [`Self::accept_all`]
    pub fn reject(&mut self, property: SurfaceProperty) {
        self.rejected = Some(property);
    }

    pub fn accept_all(&mut self) {
        self.rejected = None;
    }

    /// Writes in the order they were applied
    pub fn journal(&self) -> &[PropertyWrite] {
        &self.journal
    }

    fn write(&mut self, property: SurfaceProperty, value: f32) -> OverlayResult<()> {
        if self.rejected == Some(property) {
            return Err(OverlayError::property(property, "rejected by headless surface"));
        }
        self.journal.push(PropertyWrite { property, value });
        Ok(())
    }
}

fn flag(value: bool) -> f32 {
    if value {
        1.0
    } else {
        0.0
    }
}

impl DisplaySurface for HeadlessSurface {
    fn set_visible(&mut self, visible: bool) -> OverlayResult<()> {
        self.write(SurfaceProperty::Visible, flag(visible))?;
        self.props.visible = visible;
        if visible {
            self.props.minimized = false;
        }
        Ok(())
    }

    fn set_always_on_top(&mut self, on_top: bool) -> OverlayResult<()> {
        self.write(SurfaceProperty::AlwaysOnTop, flag(on_top))?;
        self.props.always_on_top = on_top;
        Ok(())
    }

    fn set_ignore_input(&mut self, ignore: bool) -> OverlayResult<()> {
        self.write(SurfaceProperty::IgnoreInput, flag(ignore))?;
        self.props.ignore_input = ignore;
        Ok(())
    }

    fn set_resizable(&mut self, resizable: bool) -> OverlayResult<()> {
        self.write(SurfaceProperty::Resizable, flag(resizable))?;
        self.props.resizable = resizable;
        Ok(())
    }

    fn set_skip_taskbar(&mut self, skip: bool) -> OverlayResult<()> {
        self.write(SurfaceProperty::SkipTaskbar, flag(skip))?;
        self.props.skip_taskbar = skip;
        Ok(())
    }

    fn set_opacity(&mut self, opacity: f32) -> OverlayResult<()> {
        self.write(SurfaceProperty::Opacity, opacity)?;
        self.props.opacity = opacity;
        Ok(())
    }

    fn set_transparent_background(&mut self, transparent: bool) -> OverlayResult<()> {
        self.write(SurfaceProperty::TransparentBackground, flag(transparent))?;
        self.props.transparent_background = transparent;
        Ok(())
    }

    fn set_minimized(&mut self, minimized: bool) -> OverlayResult<()> {
        self.write(SurfaceProperty::Minimized, flag(minimized))?;
        self.props.minimized = minimized;
        Ok(())
    }

    fn properties(&self) -> SurfaceProperties {
        self.props
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_defaults() {
        let surface = HeadlessSurface::new();
        let props = surface.properties();
        assert!(props.visible);
        assert!(!props.always_on_top);
        assert_eq!(props.opacity, 1.0);
        assert!(surface.journal().is_empty());
    }

    #[test]
    fn test_headless_records_writes() {
        let mut surface = HeadlessSurface::new();
        surface.set_always_on_top(true).unwrap();
        surface.set_opacity(0.5).unwrap();

        assert!(surface.properties().always_on_top);
        assert_eq!(surface.properties().opacity, 0.5);
        assert_eq!(
            surface.journal(),
            &[
                PropertyWrite { property: SurfaceProperty::AlwaysOnTop, value: 1.0 },
                PropertyWrite { property: SurfaceProperty::Opacity, value: 0.5 },
            ]
        );
    }

    #[test]
    fn test_rejected_property_is_not_applied() {
        let mut surface = HeadlessSurface::new();
        surface.reject(SurfaceProperty::SkipTaskbar);

        let err = surface.set_skip_taskbar(true).unwrap_err();
        assert!(matches!(
            err,
            OverlayError::PropertyApplyFailure { property: SurfaceProperty::SkipTaskbar, .. }
        ));
        assert!(!surface.properties().skip_taskbar);

        surface.accept_all();
        surface.set_skip_taskbar(true).unwrap();
        assert!(surface.properties().skip_taskbar);
    }

    #[test]
    fn test_show_clears_minimized() {
        let mut surface = HeadlessSurface::new();
        surface.set_minimized(true).unwrap();
        assert!(surface.properties().minimized);
        surface.set_visible(true).unwrap();
        assert!(!surface.properties().minimized);
    }
}
