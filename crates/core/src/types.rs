use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DrawError;

/// An 8-bit RGB color. Serialized as `[r, g, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Sum of the three channels; the darkness measure used for ordering
    /// color groups and for the outline predicate.
    pub fn channel_sum(&self) -> u32 {
        self.r as u32 + self.g as u32 + self.b as u32
    }
}

impl From<[u8; 3]> for Color {
    fn from(c: [u8; 3]) -> Self {
        Color::new(c[0], c[1], c[2])
    }
}

impl From<Color> for [u8; 3] {
    fn from(c: Color) -> Self {
        [c.r, c.g, c.b]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Parses `r,g,b` and the legacy `(r, g, b)` form used in saved color positions.
impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s.trim().trim_start_matches('(').trim_end_matches(')');
        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(format!("expected r,g,b but got \"{}\"", s));
        }
        let mut channels = [0u8; 3];
        for (slot, part) in channels.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|e| format!("invalid channel \"{}\" in \"{}\": {}", part, s, e))?;
        }
        Ok(Color::from(channels))
    }
}

/// Absolute device (screen) coordinate. Serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct DevicePoint {
    pub x: i32,
    pub y: i32,
}

impl DevicePoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<[i32; 2]> for DevicePoint {
    fn from(p: [i32; 2]) -> Self {
        DevicePoint::new(p[0], p[1])
    }
}

impl From<DevicePoint> for [i32; 2] {
    fn from(p: DevicePoint) -> Self {
        [p.x, p.y]
    }
}

/// Where in the target application each palette color can be picked.
/// May be partial.
pub type ColorPositions = HashMap<Color, DevicePoint>;

/// Screen rectangle the bitmap is drawn into. Always `x1 < x2`, `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[i32; 4]", into = "[i32; 4]")]
pub struct ScreenRegion {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

impl ScreenRegion {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Self, DrawError> {
        if x1 >= x2 || y1 >= y2 {
            return Err(DrawError::InvalidOption(format!(
                "screen region ({}, {}, {}, {}) must satisfy x1 < x2 and y1 < y2",
                x1, y1, x2, y2
            )));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// A region of exactly `width`×`height` device units centered on a
    /// surface of `surface_w`×`surface_h`. Zero sizes are widened to 1.
    pub fn centered(surface_w: u32, surface_h: u32, width: u32, height: u32) -> Self {
        let (w, h) = (width.max(1) as i32, height.max(1) as i32);
        let x1 = (surface_w as i32 - w) / 2;
        let y1 = (surface_h as i32 - h) / 2;
        Self { x1, y1, x2: x1 + w, y2: y1 + h }
    }

    pub fn x1(&self) -> i32 { self.x1 }
    pub fn y1(&self) -> i32 { self.y1 }
    pub fn x2(&self) -> i32 { self.x2 }
    pub fn y2(&self) -> i32 { self.y2 }
    pub fn width(&self) -> i32 { self.x2 - self.x1 }
    pub fn height(&self) -> i32 { self.y2 - self.y1 }

    /// Device units per bitmap pixel along each axis.
    pub fn scale_for(&self, bitmap_w: u32, bitmap_h: u32) -> (f64, f64) {
        (
            self.width() as f64 / bitmap_w.max(1) as f64,
            self.height() as f64 / bitmap_h.max(1) as f64,
        )
    }

    /// Device-space center of bitmap pixel `(x, y)` for the given scale.
    pub fn pixel_center(&self, x: u32, y: u32, scale: (f64, f64)) -> (f64, f64) {
        (
            self.x1 as f64 + x as f64 * scale.0 + scale.0 / 2.0,
            self.y1 as f64 + y as f64 * scale.1 + scale.1 / 2.0,
        )
    }
}

impl TryFrom<[i32; 4]> for ScreenRegion {
    type Error = DrawError;

    fn try_from(r: [i32; 4]) -> Result<Self, Self::Error> {
        ScreenRegion::new(r[0], r[1], r[2], r[3])
    }
}

impl From<ScreenRegion> for [i32; 4] {
    fn from(r: ScreenRegion) -> Self {
        [r.x1, r.y1, r.x2, r.y2]
    }
}

impl fmt::Display for ScreenRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

/// Drawing style; selects both the preprocessing transform and the planning strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawStyle {
    #[default]
    Pixel,
    Outline,
    Vector,
}

impl FromStr for DrawStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pixel" => Ok(DrawStyle::Pixel),
            "outline" => Ok(DrawStyle::Outline),
            "vector" => Ok(DrawStyle::Vector),
            other => Err(format!("unknown style \"{}\" (pixel, outline, vector)", other)),
        }
    }
}

impl fmt::Display for DrawStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DrawStyle::Pixel => "pixel",
            DrawStyle::Outline => "outline",
            DrawStyle::Vector => "vector",
        };
        f.write_str(s)
    }
}

/// One step of a drawing. The planner's only output, the executor's only input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    SelectColor(Color),
    MoveTo(DevicePoint),
    Click,
    PressDown,
    DragTo(DevicePoint),
    Release,
}

/// Lifecycle of one draw request, shared with the front end.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Planning,
    Executing,
    Cancelled,
    Completed,
    Failed(String),
}

impl SessionState {
    pub fn is_busy(&self) -> bool {
        matches!(self, SessionState::Planning | SessionState::Executing)
    }
}

/// Executor progress event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub elapsed: Duration,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 * 100.0 / self.total as f64
        }
    }
}

/// Command from the front end to the session thread
pub enum Command {
    Start,
    Quit,
}

/// Stop request shared between the cancel source (hotkey, TUI) and the executor.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}
