//! Sequential, cancellable replay of a planned action stream against the
//! pointer and color-selection actuators.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::error::{ActuatorError, DrawError, Notice};
use crate::platform::{ColorSelector, PointerActuator, Selection};
use crate::sleep::Sleeper;
use crate::types::{CancelFlag, Color, PlannedAction, Progress};

/// Lower bound for the pause after selecting a color.
pub const SETTLE_FLOOR: Duration = Duration::from_millis(200);
pub const DEFAULT_PROGRESS_EVERY: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct ExecOptions {
    /// Pause after every pointer move or drag.
    pub delay: Duration,
    /// Emit a progress event every this many processed actions.
    pub progress_every: usize,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self { delay: Duration::from_millis(10), progress_every: DEFAULT_PROGRESS_EVERY }
    }
}

/// Pause after a color switch: twice the move delay, never below the floor.
pub fn settle_delay(delay: Duration) -> Duration {
    delay.saturating_mul(2).max(SETTLE_FLOOR)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecState {
    Ready,
    Running,
    /// Cancelled by the stop flag. A partial drawing, not a failure.
    Stopped,
    Finished,
    Error(ActuatorError),
}

#[derive(Debug, Clone)]
pub struct ExecReport {
    pub state: ExecState,
    /// Actions processed, including ones skipped for an unknown color.
    pub completed: usize,
    pub total: usize,
    pub elapsed: Duration,
    /// The button was left down (a stroke was interrupted).
    pub pointer_held: bool,
    pub notices: Vec<Notice>,
}

impl ExecReport {
    pub fn progress(&self) -> Progress {
        Progress { completed: self.completed, total: self.total, elapsed: self.elapsed }
    }

    pub fn actions_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { self.completed as f64 / secs } else { 0.0 }
    }
}

pub struct Executor<'a> {
    pointer: &'a mut dyn PointerActuator,
    selector: &'a mut dyn ColorSelector,
    sleeper: &'a mut dyn Sleeper,
    cancel: CancelFlag,
    options: ExecOptions,
    progress_tx: Option<mpsc::Sender<Progress>>,
    state: ExecState,
}

impl<'a> Executor<'a> {
    pub fn new(
        pointer: &'a mut dyn PointerActuator,
        selector: &'a mut dyn ColorSelector,
        sleeper: &'a mut dyn Sleeper,
        cancel: CancelFlag,
        options: ExecOptions,
    ) -> Self {
        Self { pointer, selector, sleeper, cancel, options, progress_tx: None, state: ExecState::Ready }
    }

    pub fn with_progress(mut self, tx: mpsc::Sender<Progress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn state(&self) -> &ExecState {
        &self.state
    }

    fn report_progress(&self, completed: usize, total: usize, started: Instant) {
        if let Some(tx) = &self.progress_tx {
            tx.send(Progress { completed, total, elapsed: started.elapsed() }).ok();
        }
    }

    /// Apply `actions` in order. Returns `Err` only if this executor already ran;
    /// actuator failures and cancellation end up in the report's state.
    pub fn run(&mut self, actions: Vec<PlannedAction>) -> Result<ExecReport, DrawError> {
        if self.state != ExecState::Ready {
            return Err(DrawError::InvalidOption("executor already used".into()));
        }
        self.state = ExecState::Running;

        let total = actions.len();
        let started = Instant::now();
        let every = self.options.progress_every.max(1);
        let settle = settle_delay(self.options.delay);

        let mut completed = 0;
        let mut held = false;
        // Entry in `skipped` for the color whose actions are being dropped.
        let mut skipping: Option<usize> = None;
        let mut skipped: Vec<(Color, usize)> = Vec::new();

        for action in actions {
            if self.cancel.is_set() {
                self.state = ExecState::Stopped;
                break;
            }

            let result = match action {
                PlannedAction::SelectColor(color) => {
                    skipping = None;
                    match self.selector.select(color, &mut *self.pointer) {
                        Ok(Selection::Selected) => {
                            self.sleeper.sleep(settle);
                            Ok(())
                        }
                        Ok(Selection::Unknown) => {
                            let idx = match skipped.iter().position(|(c, _)| *c == color) {
                                Some(idx) => idx,
                                None => {
                                    skipped.push((color, 0));
                                    skipped.len() - 1
                                }
                            };
                            skipping = Some(idx);
                            Ok(())
                        }
                        Err(e) => Err(e),
                    }
                }
                _ if skipping.is_some() => {
                    if let Some(i) = skipping {
                        skipped[i].1 += 1;
                    }
                    Ok(())
                }
                PlannedAction::MoveTo(p) => self.pointer.move_to(p).map(|_| self.sleeper.sleep(self.options.delay)),
                PlannedAction::Click => self.pointer.click(),
                PlannedAction::PressDown => self.pointer.press_down().map(|_| held = true),
                PlannedAction::DragTo(p) => self.pointer.drag_to(p).map(|_| self.sleeper.sleep(self.options.delay)),
                PlannedAction::Release => self.pointer.release().map(|_| held = false),
            };

            if let Err(e) = result {
                self.state = ExecState::Error(e);
                break;
            }

            completed += 1;
            if completed % every == 0 && completed < total {
                self.report_progress(completed, total, started);
            }
        }

        if self.state == ExecState::Running {
            self.state = ExecState::Finished;
        }
        self.report_progress(completed, total, started);

        let notices = skipped
            .into_iter()
            .map(|(color, skipped)| Notice::ColorPositionUnknown { color, skipped })
            .collect();

        Ok(ExecReport {
            state: self.state.clone(),
            completed,
            total,
            elapsed: started.elapsed(),
            pointer_held: held,
            notices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::selector::PositionSelector;
    use crate::platform::stub::{CallLog, PointerCall, StubPointer};
    use crate::types::{ColorPositions, DevicePoint};

    const RED: Color = Color::new(255, 0, 0);
    const BLUE: Color = Color::new(0, 0, 255);

    #[derive(Default)]
    struct RecordingSleeper(Vec<Duration>);

    impl Sleeper for RecordingSleeper {
        fn sleep(&mut self, d: Duration) {
            self.0.push(d);
        }
    }

    /// Sets the cancel flag once the pointer has received `after` calls.
    struct CancelAfter {
        inner: StubPointer,
        flag: CancelFlag,
        after: usize,
        calls: usize,
    }

    impl CancelAfter {
        fn tick(&mut self) {
            self.calls += 1;
            if self.calls == self.after {
                self.flag.set();
            }
        }
    }

    impl PointerActuator for CancelAfter {
        fn move_to(&mut self, p: DevicePoint) -> Result<(), ActuatorError> {
            self.inner.move_to(p)?;
            self.tick();
            Ok(())
        }
        fn click(&mut self) -> Result<(), ActuatorError> {
            self.inner.click()?;
            self.tick();
            Ok(())
        }
        fn press_down(&mut self) -> Result<(), ActuatorError> {
            self.inner.press_down()?;
            self.tick();
            Ok(())
        }
        fn drag_to(&mut self, p: DevicePoint) -> Result<(), ActuatorError> {
            self.inner.drag_to(p)?;
            self.tick();
            Ok(())
        }
        fn release(&mut self) -> Result<(), ActuatorError> {
            self.inner.release()?;
            self.tick();
            Ok(())
        }
        fn current_position(&self) -> Result<DevicePoint, ActuatorError> {
            self.inner.current_position()
        }
    }

    fn pt(x: i32, y: i32) -> DevicePoint {
        DevicePoint::new(x, y)
    }

    fn positions(entries: &[(Color, DevicePoint)]) -> PositionSelector {
        PositionSelector::new(entries.iter().copied().collect::<ColorPositions>())
    }

    fn pixel_actions(color: Color, points: &[DevicePoint]) -> Vec<PlannedAction> {
        let mut actions = vec![PlannedAction::SelectColor(color)];
        for p in points {
            actions.push(PlannedAction::MoveTo(*p));
            actions.push(PlannedAction::Click);
        }
        actions
    }

    #[test]
    fn test_settle_delay_floor() {
        assert_eq!(settle_delay(Duration::ZERO), SETTLE_FLOOR);
        assert_eq!(settle_delay(Duration::from_millis(50)), SETTLE_FLOOR);
        assert_eq!(settle_delay(Duration::from_millis(300)), Duration::from_millis(600));
    }

    #[test]
    fn test_settle_delay_saturates() {
        assert_eq!(settle_delay(Duration::MAX), Duration::MAX);
        let huge = Duration::from_secs(u64::MAX / 2 + 1);
        assert_eq!(settle_delay(huge), Duration::MAX);
    }

    #[test]
    fn test_runs_all_actions_in_order() {
        let log = CallLog::new();
        let mut pointer = StubPointer::new(log.clone()).quiet();
        let mut selector = positions(&[(RED, pt(900, 10))]);
        let mut sleeper = RecordingSleeper::default();
        let options = ExecOptions { delay: Duration::from_millis(10), ..Default::default() };

        let mut exec = Executor::new(&mut pointer, &mut selector, &mut sleeper, CancelFlag::new(), options);
        let report = exec.run(pixel_actions(RED, &[pt(1, 1), pt(2, 1)])).unwrap();

        assert_eq!(report.state, ExecState::Finished);
        assert_eq!(report.completed, 5);
        assert_eq!(report.total, 5);
        assert!(!report.pointer_held);
        assert!(report.notices.is_empty());
        assert_eq!(
            log.calls(),
            vec![
                PointerCall::MoveTo(pt(900, 10)),
                PointerCall::Click,
                PointerCall::MoveTo(pt(1, 1)),
                PointerCall::Click,
                PointerCall::MoveTo(pt(2, 1)),
                PointerCall::Click,
            ]
        );
        assert_eq!(
            sleeper.0,
            vec![SETTLE_FLOOR, Duration::from_millis(10), Duration::from_millis(10)]
        );
    }

    #[test]
    fn test_cancel_halts_within_one_action() {
        let actions = pixel_actions(RED, &[pt(1, 1), pt(2, 2), pt(3, 3), pt(4, 4), pt(5, 5)]);
        let total = actions.len();
        let flag = CancelFlag::new();
        let log = CallLog::new();
        let mut pointer = CancelAfter {
            inner: StubPointer::new(log.clone()).quiet(),
            flag: flag.clone(),
            after: 5,
            calls: 0,
        };
        let mut selector = positions(&[(RED, pt(0, 0))]);
        let mut sleeper = RecordingSleeper::default();

        let mut exec = Executor::new(&mut pointer, &mut selector, &mut sleeper, flag, ExecOptions::default());
        let report = exec.run(actions).unwrap();

        // Calls 1-2 select the color, so the flag is raised by the third planned move.
        assert_eq!(report.state, ExecState::Stopped);
        assert!(report.completed < total);
        assert_eq!(log.len(), 5);
        assert!(report.completed <= 4);
    }

    #[test]
    fn test_cancel_before_start_does_nothing() {
        let flag = CancelFlag::new();
        flag.set();
        let log = CallLog::new();
        let mut pointer = StubPointer::new(log.clone()).quiet();
        let mut selector = positions(&[(RED, pt(0, 0))]);
        let mut sleeper = RecordingSleeper::default();
        let mut exec = Executor::new(&mut pointer, &mut selector, &mut sleeper, flag, ExecOptions::default());

        let report = exec.run(pixel_actions(RED, &[pt(1, 1)])).unwrap();
        assert_eq!(report.state, ExecState::Stopped);
        assert_eq!(report.completed, 0);
        assert!(log.is_empty());
    }

    #[test]
    fn test_unknown_color_is_skipped_and_counted() {
        let mut actions = pixel_actions(BLUE, &[pt(1, 1), pt(2, 2)]);
        actions.extend(pixel_actions(RED, &[pt(3, 3)]));
        let log = CallLog::new();
        let mut pointer = StubPointer::new(log.clone()).quiet();
        let mut selector = positions(&[(RED, pt(50, 0))]);
        let mut sleeper = RecordingSleeper::default();

        let mut exec = Executor::new(&mut pointer, &mut selector, &mut sleeper, CancelFlag::new(), ExecOptions::default());
        let report = exec.run(actions).unwrap();

        assert_eq!(report.state, ExecState::Finished);
        assert_eq!(report.completed, 8);
        assert_eq!(report.notices, vec![Notice::ColorPositionUnknown { color: BLUE, skipped: 4 }]);
        assert_eq!(
            log.calls(),
            vec![
                PointerCall::MoveTo(pt(50, 0)),
                PointerCall::Click,
                PointerCall::MoveTo(pt(3, 3)),
                PointerCall::Click,
            ]
        );
    }

    #[test]
    fn test_actuator_failure_aborts_without_retry() {
        let log = CallLog::new();
        // Index 2 is the first planned move after the color click.
        let mut pointer = StubPointer::new(log.clone()).quiet().failing_at(2);
        let mut selector = positions(&[(RED, pt(0, 0))]);
        let mut sleeper = RecordingSleeper::default();

        let mut exec = Executor::new(&mut pointer, &mut selector, &mut sleeper, CancelFlag::new(), ExecOptions::default());
        let report = exec.run(pixel_actions(RED, &[pt(1, 1), pt(2, 2)])).unwrap();

        assert!(matches!(report.state, ExecState::Error(ActuatorError::Pointer(_))));
        assert_eq!(report.completed, 1);
        assert_eq!(log.len(), 2);
        assert!(matches!(exec.state(), ExecState::Error(_)));
    }

    #[test]
    fn test_held_button_reported_on_stop() {
        let flag = CancelFlag::new();
        let log = CallLog::new();
        let mut pointer = CancelAfter {
            inner: StubPointer::new(log.clone()).quiet(),
            flag: flag.clone(),
            after: 4,
            calls: 0,
        };
        let mut selector = positions(&[(Color::BLACK, pt(0, 0))]);
        let mut sleeper = RecordingSleeper::default();
        let actions = vec![
            PlannedAction::SelectColor(Color::BLACK),
            PlannedAction::MoveTo(pt(1, 1)),
            PlannedAction::PressDown,
            PlannedAction::DragTo(pt(2, 1)),
            PlannedAction::DragTo(pt(3, 1)),
            PlannedAction::Release,
        ];

        let mut exec = Executor::new(&mut pointer, &mut selector, &mut sleeper, flag, ExecOptions::default());
        let report = exec.run(actions).unwrap();
        assert_eq!(report.state, ExecState::Stopped);
        assert!(report.pointer_held);
        assert_eq!(log.calls().last(), Some(&PointerCall::PressDown));
    }

    #[test]
    fn test_progress_cadence() {
        let (tx, rx) = mpsc::channel();
        let mut pointer = StubPointer::new(CallLog::new()).quiet();
        let mut selector = positions(&[(RED, pt(0, 0))]);
        let mut sleeper = RecordingSleeper::default();
        let options = ExecOptions { progress_every: 2, ..Default::default() };

        let mut exec = Executor::new(&mut pointer, &mut selector, &mut sleeper, CancelFlag::new(), options)
            .with_progress(tx);
        exec.run(pixel_actions(RED, &[pt(1, 1), pt(2, 2)])).unwrap();
        drop(exec);

        let seen: Vec<(usize, usize)> = rx.try_iter().map(|p| (p.completed, p.total)).collect();
        assert_eq!(seen, vec![(2, 5), (4, 5), (5, 5)]);
    }

    #[test]
    fn test_executor_runs_once() {
        let mut pointer = StubPointer::new(CallLog::new()).quiet();
        let mut selector = positions(&[]);
        let mut sleeper = RecordingSleeper::default();
        let mut exec = Executor::new(&mut pointer, &mut selector, &mut sleeper, CancelFlag::new(), ExecOptions::default());
        assert_eq!(exec.state(), &ExecState::Ready);
        let report = exec.run(Vec::new()).unwrap();
        assert_eq!(report.state, ExecState::Finished);
        assert_eq!(report.progress().percent(), 100.0);
        assert!(exec.run(Vec::new()).is_err());
    }
}
