use crate::error::ActuatorError;
use crate::types::{Color, ColorPositions};
use super::{ColorSelector, PointerActuator, Selection};

/// Picks colors by clicking their saved screen position in the target
/// application's palette.
pub struct PositionSelector {
    positions: ColorPositions,
}

impl PositionSelector {
    pub fn new(positions: ColorPositions) -> Self {
        Self { positions }
    }

    pub fn positions(&self) -> &ColorPositions {
        &self.positions
    }
}

impl ColorSelector for PositionSelector {
    fn select(
        &mut self,
        color: Color,
        pointer: &mut dyn PointerActuator,
    ) -> Result<Selection, ActuatorError> {
        let Some(pos) = self.positions.get(&color).copied() else {
            return Ok(Selection::Unknown);
        };
        let wrap = |e: ActuatorError| {
            ActuatorError::ColorSelection(format!("clicking {} at {:?}: {}", color, pos, e))
        };
        pointer.move_to(pos).map_err(wrap)?;
        pointer.click().map_err(wrap)?;
        Ok(Selection::Selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::stub::{CallLog, PointerCall, StubPointer};
    use crate::types::DevicePoint;

    #[test]
    fn test_known_color_is_clicked() {
        let red = Color::new(255, 0, 0);
        let mut positions = ColorPositions::new();
        positions.insert(red, DevicePoint::new(40, 12));
        let mut selector = PositionSelector::new(positions);

        let log = CallLog::new();
        let mut pointer = StubPointer::new(log.clone()).quiet();
        assert_eq!(selector.select(red, &mut pointer).unwrap(), Selection::Selected);
        assert_eq!(
            log.calls(),
            vec![PointerCall::MoveTo(DevicePoint::new(40, 12)), PointerCall::Click]
        );
    }

    #[test]
    fn test_unknown_color_touches_nothing() {
        let mut selector = PositionSelector::new(ColorPositions::new());
        let log = CallLog::new();
        let mut pointer = StubPointer::new(log.clone()).quiet();
        assert_eq!(selector.select(Color::BLACK, &mut pointer).unwrap(), Selection::Unknown);
        assert!(log.is_empty());
    }

    #[test]
    fn test_pointer_failure_is_selection_error() {
        let mut positions = ColorPositions::new();
        positions.insert(Color::BLACK, DevicePoint::new(1, 1));
        let mut selector = PositionSelector::new(positions);
        let mut pointer = StubPointer::new(CallLog::new()).quiet().failing_at(0);
        let err = selector.select(Color::BLACK, &mut pointer).unwrap_err();
        assert!(matches!(err, ActuatorError::ColorSelection(_)));
    }
}
