pub mod stub;
pub mod hotkey;
pub mod selector;

#[cfg(target_os = "macos")]
pub mod darwin;

#[cfg(target_os = "windows")]
pub mod win32;

use crate::error::ActuatorError;
use crate::logger;
use crate::types::{Color, DevicePoint};

/// Device-level mouse. Every call is blocking and may fail; callers never retry.
pub trait PointerActuator: Send {
    fn move_to(&mut self, point: DevicePoint) -> Result<(), ActuatorError>;
    fn click(&mut self) -> Result<(), ActuatorError>;
    fn press_down(&mut self) -> Result<(), ActuatorError>;
    /// Move with the button held.
    fn drag_to(&mut self, point: DevicePoint) -> Result<(), ActuatorError>;
    fn release(&mut self) -> Result<(), ActuatorError>;
    fn current_position(&self) -> Result<DevicePoint, ActuatorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Selected,
    /// The target application offers no known way to pick this color.
    Unknown,
}

/// Selects a drawing color in the target application, typically by
/// clicking somewhere with the same pointer that draws.
pub trait ColorSelector: Send {
    fn select(
        &mut self,
        color: Color,
        pointer: &mut dyn PointerActuator,
    ) -> Result<Selection, ActuatorError>;
}

/// OS-level entry point: hands out pointers and reports the screen size.
pub trait Platform: Send {
    fn pointer(&self) -> Box<dyn PointerActuator>;
    fn screen_size(&self) -> (u32, u32);
}

/// Create the platform appropriate for the current OS.
pub fn create_platform(force_stub: bool) -> Box<dyn Platform> {
    if force_stub {
        logger::register_prefix("stub", logger::COLOR_GRAY);
        return Box::new(stub::StubPlatform::default());
    }
    #[cfg(target_os = "macos")]
    {
        logger::register_prefix("darwin", logger::COLOR_GRAY);
        return Box::new(darwin::DarwinPlatform::new());
    }
    #[cfg(target_os = "windows")]
    {
        logger::register_prefix("windows", logger::COLOR_GRAY);
        return Box::new(win32::WindowsPlatform::new());
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        logger::register_prefix("stub", logger::COLOR_GRAY);
        logger::warn("no pointer backend for this OS, using the stub");
        return Box::new(stub::StubPlatform::default());
    }
}
