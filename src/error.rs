//! Error types for overlay control
//!
//! One enum covers shortcut registration and window-property failures so the
//! controller can return a single error type from every operation.

use crate::surface::SurfaceProperty;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OverlayError {
    /// The combination is already bound, here or by another process
    #[error("shortcut {0} is already claimed")]
    BindingConflict(String),

    /// The environment refuses global key capture
    #[error("global shortcuts are unavailable: {0}")]
    BindingUnavailable(String),

    /// The OS rejected a window property write
    #[error("failed to apply {property}: {reason}")]
    PropertyApplyFailure {
        property: SurfaceProperty,
        reason: String,
    },

    #[error("invalid shortcut '{0}'")]
    InvalidShortcut(String),

    #[error("no shortcut registered with id {0}")]
    UnknownBinding(u32),
}

pub type OverlayResult<T> = Result<T, OverlayError>;

impl OverlayError {
    /// Shorthand for a rejected property write
    pub fn property(property: SurfaceProperty, reason: impl Into<String>) -> Self {
        OverlayError::PropertyApplyFailure {
            property,
            reason: reason.into(),
        }
    }

    /// Whether this failure came from shortcut registration
    pub fn is_binding_error(&self) -> bool {
        matches!(
            self,
            OverlayError::BindingConflict(_) | OverlayError::BindingUnavailable(_)
        )
    }
}
