use std::sync::{Arc, Mutex};

use crate::error::ActuatorError;
use crate::logger;
use crate::types::DevicePoint;
use super::{Platform, PointerActuator};

/// One call received by the stub pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerCall {
    MoveTo(DevicePoint),
    Click,
    PressDown,
    DragTo(DevicePoint),
    Release,
}

/// Shared record of stub pointer calls. Clones see the same record.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<PointerCall>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PointerCall> {
        self.0.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, call: PointerCall) {
        if let Ok(mut c) = self.0.lock() {
            c.push(call);
        }
    }
}

#[derive(Default)]
pub struct StubPlatform {
    log: CallLog,
}

impl StubPlatform {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

impl Platform for StubPlatform {
    fn pointer(&self) -> Box<dyn PointerActuator> {
        logger::info_p("stub", "pointer()");
        Box::new(StubPointer::new(self.log.clone()))
    }

    fn screen_size(&self) -> (u32, u32) {
        (1920, 1080)
    }
}

/// Pointer that moves nothing. Records each call, and can be told to fail
/// at a given call index.
pub struct StubPointer {
    log: CallLog,
    position: DevicePoint,
    held: bool,
    fail_at: Option<usize>,
    quiet: bool,
}

impl StubPointer {
    pub fn new(log: CallLog) -> Self {
        Self { log, position: DevicePoint::new(0, 0), held: false, fail_at: None, quiet: false }
    }

    /// The call with this zero-based index returns an error and is not recorded.
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Skip the per-call log lines.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    fn record(&mut self, call: PointerCall) -> Result<(), ActuatorError> {
        if self.fail_at == Some(self.log.len()) {
            return Err(ActuatorError::Pointer(format!("stub refused {:?}", call)));
        }
        if !self.quiet {
            logger::info_p("stub", &format!("{:?}", call));
        }
        self.log.push(call);
        Ok(())
    }
}

impl PointerActuator for StubPointer {
    fn move_to(&mut self, point: DevicePoint) -> Result<(), ActuatorError> {
        self.record(PointerCall::MoveTo(point))?;
        self.position = point;
        Ok(())
    }

    fn click(&mut self) -> Result<(), ActuatorError> {
        self.record(PointerCall::Click)
    }

    fn press_down(&mut self) -> Result<(), ActuatorError> {
        self.record(PointerCall::PressDown)?;
        self.held = true;
        Ok(())
    }

    fn drag_to(&mut self, point: DevicePoint) -> Result<(), ActuatorError> {
        self.record(PointerCall::DragTo(point))?;
        self.position = point;
        Ok(())
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        self.record(PointerCall::Release)?;
        self.held = false;
        Ok(())
    }

    fn current_position(&self) -> Result<DevicePoint, ActuatorError> {
        Ok(self.position)
    }
}
