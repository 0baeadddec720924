use std::mem::size_of;

use windows::Win32::Foundation::POINT;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
    MOUSEINPUT, MOUSE_EVENT_FLAGS,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetCursorPos, GetSystemMetrics, SetCursorPos, SM_CXSCREEN, SM_CYSCREEN,
};

use crate::error::ActuatorError;
use crate::logger;
use crate::types::DevicePoint;
use super::{Platform, PointerActuator};

const CLICK_HOLD_MS: u64 = 15;

pub struct WindowsPlatform;

impl WindowsPlatform {
    pub fn new() -> Self {
        WindowsPlatform
    }
}

impl Platform for WindowsPlatform {
    fn pointer(&self) -> Box<dyn PointerActuator> {
        Box::new(WindowsPointer::default())
    }

    fn screen_size(&self) -> (u32, u32) {
        let (w, h) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        (w.max(0) as u32, h.max(0) as u32)
    }
}

#[derive(Default)]
pub struct WindowsPointer {
    held: bool,
}

fn send_button(flags: MOUSE_EVENT_FLAGS) -> Result<(), ActuatorError> {
    let input = INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT { dx: 0, dy: 0, mouseData: 0, dwFlags: flags, time: 0, dwExtraInfo: 0 },
        },
    };
    let sent = unsafe { SendInput(&[input], size_of::<INPUT>() as i32) };
    if sent == 1 {
        Ok(())
    } else {
        Err(ActuatorError::Pointer(format!("SendInput rejected {:?}", flags)))
    }
}

fn set_cursor(point: DevicePoint) -> Result<(), ActuatorError> {
    unsafe { SetCursorPos(point.x, point.y) }
        .map_err(|e| ActuatorError::Pointer(format!("SetCursorPos({}, {}): {}", point.x, point.y, e)))
}

impl PointerActuator for WindowsPointer {
    fn move_to(&mut self, point: DevicePoint) -> Result<(), ActuatorError> {
        set_cursor(point)
    }

    fn click(&mut self) -> Result<(), ActuatorError> {
        send_button(MOUSEEVENTF_LEFTDOWN)?;
        std::thread::sleep(std::time::Duration::from_millis(CLICK_HOLD_MS));
        send_button(MOUSEEVENTF_LEFTUP)
    }

    fn press_down(&mut self) -> Result<(), ActuatorError> {
        send_button(MOUSEEVENTF_LEFTDOWN)?;
        self.held = true;
        Ok(())
    }

    fn drag_to(&mut self, point: DevicePoint) -> Result<(), ActuatorError> {
        set_cursor(point)
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        send_button(MOUSEEVENTF_LEFTUP)?;
        self.held = false;
        Ok(())
    }

    fn current_position(&self) -> Result<DevicePoint, ActuatorError> {
        let mut pt = POINT::default();
        unsafe { GetCursorPos(&mut pt) }
            .map_err(|e| ActuatorError::Pointer(format!("GetCursorPos: {}", e)))?;
        Ok(DevicePoint::new(pt.x, pt.y))
    }
}

impl Drop for WindowsPointer {
    fn drop(&mut self) {
        if self.held {
            logger::warn_p("windows", "pointer dropped with button held, releasing");
            self.release().ok();
        }
    }
}
