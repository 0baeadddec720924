use std::fmt;

use thiserror::Error;

use crate::types::{Color, ScreenRegion};

/// Fatal errors of the planning phase, and actuator failures surfaced by a session.
#[derive(Debug, Error)]
pub enum DrawError {
    #[error("no image loaded")]
    NoImage,
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("no palette supplied")]
    NoPalette,
    #[error("invalid option: {0}")]
    InvalidOption(String),
    #[error(transparent)]
    Actuator(#[from] ActuatorError),
}

/// A pointer or color-selection call that the OS (or stub) refused.
/// Never retried: the session aborts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActuatorError {
    #[error("pointer actuator failed: {0}")]
    Pointer(String),
    #[error("color selection failed: {0}")]
    ColorSelection(String),
}

/// Non-fatal conditions reported alongside a successful result.
/// Components return these; the session decides how to log them.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Palette had no entries, colors are drawn as-is.
    EmptyPalette,
    /// No screen region was supplied, a centered one was used.
    MissingRegion { defaulted: ScreenRegion },
    Resized { width: u32, height: u32, multiplier: f32 },
    BackgroundMarked { marked: usize, total: usize },
    /// The vector style ran its plain smoothing fallback.
    BilateralUnavailable,
    NoOutlinePixels,
    /// Dark pixels exist but none has a dark neighbour, so there is no stroke.
    OnlyIsolatedPixels { isolated: usize },
    /// The color could not be selected; `skipped` drawing actions were dropped.
    ColorPositionUnknown { color: Color, skipped: usize },
}

impl Notice {
    /// Whether the notice should surface as a warning rather than info.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Notice::EmptyPalette
                | Notice::MissingRegion { .. }
                | Notice::BilateralUnavailable
                | Notice::OnlyIsolatedPixels { .. }
                | Notice::ColorPositionUnknown { .. }
        )
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::EmptyPalette => write!(f, "palette is empty, drawing colors unmatched"),
            Notice::MissingRegion { defaulted } => {
                write!(f, "no drawing area set, centered on screen at {}", defaulted)
            }
            Notice::Resized { width, height, multiplier } => {
                write!(f, "resized image to {}x{} (resolution: {}x)", width, height, multiplier)
            }
            Notice::BackgroundMarked { marked, total } => {
                let pct = if *total == 0 { 0.0 } else { *marked as f64 * 100.0 / *total as f64 };
                write!(f, "marked {} background pixels ({:.1}% of image)", marked, pct)
            }
            Notice::BilateralUnavailable => {
                write!(f, "edge-preserving smoothing unavailable, used plain smoothing")
            }
            Notice::NoOutlinePixels => write!(f, "no outline pixels found in the image"),
            Notice::OnlyIsolatedPixels { isolated } => {
                write!(f, "{} outline pixels found but all isolated, nothing to stroke", isolated)
            }
            Notice::ColorPositionUnknown { color, skipped } => {
                write!(f, "position unknown for color {}, skipped {} actions", color, skipped)
            }
        }
    }
}
