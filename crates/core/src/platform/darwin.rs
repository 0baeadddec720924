use core_graphics::display::CGDisplay;
use core_graphics::event::*;
use core_graphics::event_source::*;
use core_graphics::geometry::*;

use crate::error::ActuatorError;
use crate::logger;
use crate::types::DevicePoint;
use super::{Platform, PointerActuator};

/// Gap between button down and up of a click.
const CLICK_HOLD_MS: u64 = 15;

pub struct DarwinPlatform;

impl DarwinPlatform {
    pub fn new() -> Self {
        DarwinPlatform
    }
}

impl Platform for DarwinPlatform {
    fn pointer(&self) -> Box<dyn PointerActuator> {
        Box::new(DarwinPointer::default())
    }

    fn screen_size(&self) -> (u32, u32) {
        let bounds = CGDisplay::main().bounds();
        (bounds.size.width as u32, bounds.size.height as u32)
    }
}

/// Posts synthetic HID mouse events for the left button.
#[derive(Default)]
pub struct DarwinPointer {
    held: bool,
}

impl DarwinPointer {
    fn post(&self, kind: CGEventType, point: CGPoint) -> Result<(), ActuatorError> {
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| ActuatorError::Pointer("failed to create event source".into()))?;
        let event = CGEvent::new_mouse_event(source, kind, point, CGMouseButton::Left)
            .map_err(|_| ActuatorError::Pointer(format!("failed to create {:?} event", kind)))?;
        event.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn location(&self) -> Result<CGPoint, ActuatorError> {
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| ActuatorError::Pointer("failed to create event source".into()))?;
        let event = CGEvent::new(source)
            .map_err(|_| ActuatorError::Pointer("failed to read pointer location".into()))?;
        Ok(event.location())
    }
}

fn cg_point(p: DevicePoint) -> CGPoint {
    CGPoint::new(p.x as f64, p.y as f64)
}

impl PointerActuator for DarwinPointer {
    fn move_to(&mut self, point: DevicePoint) -> Result<(), ActuatorError> {
        self.post(CGEventType::MouseMoved, cg_point(point))
    }

    fn click(&mut self) -> Result<(), ActuatorError> {
        let at = self.location()?;
        self.post(CGEventType::LeftMouseDown, at)?;
        std::thread::sleep(std::time::Duration::from_millis(CLICK_HOLD_MS));
        self.post(CGEventType::LeftMouseUp, at)
    }

    fn press_down(&mut self) -> Result<(), ActuatorError> {
        let at = self.location()?;
        self.post(CGEventType::LeftMouseDown, at)?;
        self.held = true;
        Ok(())
    }

    fn drag_to(&mut self, point: DevicePoint) -> Result<(), ActuatorError> {
        // Apps only extend a stroke on dragged events while the button is down.
        let kind = if self.held { CGEventType::LeftMouseDragged } else { CGEventType::MouseMoved };
        self.post(kind, cg_point(point))
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        let at = self.location()?;
        self.post(CGEventType::LeftMouseUp, at)?;
        self.held = false;
        Ok(())
    }

    fn current_position(&self) -> Result<DevicePoint, ActuatorError> {
        let at = self.location()?;
        Ok(DevicePoint::new(at.x.round() as i32, at.y.round() as i32))
    }
}

impl Drop for DarwinPointer {
    fn drop(&mut self) {
        if self.held {
            logger::warn_p("darwin", "pointer dropped with button held, releasing");
            self.release().ok();
        }
    }
}
