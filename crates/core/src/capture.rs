//! Recording screen positions from wherever the user leaves the mouse: the
//! spot of a color in the paint program's palette, or the drawing area's
//! corners.

use std::time::Duration;

use crate::error::{ActuatorError, DrawError};
use crate::platform::PointerActuator;
use crate::sleep::Sleeper;
use crate::types::{DevicePoint, ScreenRegion};

/// Seconds the user gets to place the mouse.
pub const CAPTURE_COUNTDOWN: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    BottomRight,
}

impl Corner {
    pub fn label(self) -> &'static str {
        match self {
            Corner::TopLeft => "top-left",
            Corner::BottomRight => "bottom-right",
        }
    }
}

/// Count down from `seconds` (calling `tick` with the seconds left), then
/// read the pointer position.
pub fn capture_point(
    pointer: &dyn PointerActuator,
    seconds: u32,
    sleeper: &mut dyn Sleeper,
    mut tick: impl FnMut(u32),
) -> Result<DevicePoint, ActuatorError> {
    for left in (1..=seconds).rev() {
        tick(left);
        sleeper.sleep(Duration::from_secs(1));
    }
    pointer.current_position()
}

/// Capture two opposite corners. They may be given in either order; a zero
/// width or height is an error.
pub fn capture_region(
    pointer: &dyn PointerActuator,
    seconds: u32,
    sleeper: &mut dyn Sleeper,
    mut tick: impl FnMut(Corner, u32),
) -> Result<ScreenRegion, DrawError> {
    let a = capture_point(pointer, seconds, sleeper, |n| tick(Corner::TopLeft, n))?;
    let b = capture_point(pointer, seconds, sleeper, |n| tick(Corner::BottomRight, n))?;
    ScreenRegion::new(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y))
}
