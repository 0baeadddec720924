//! Drives one drawing from source image to pointer actions. The only place
//! pipeline results are turned into log lines.

use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use image::RgbaImage;

use crate::color::color_name;
use crate::error::{DrawError, Notice};
use crate::executor::{ExecOptions, ExecReport, ExecState, Executor};
use crate::logger;
use crate::palette::Palette;
use crate::planner::{Plan, PlanOptions, PlanStats, Planner};
use crate::platform::selector::PositionSelector;
use crate::platform::{Platform, PointerActuator};
use crate::preprocess::{preprocess, PreprocessOptions};
use crate::sleep::{Sleeper, ThreadSleeper};
use crate::types::*;

/// Everything needed to draw one image. Shared read-only with the planning worker.
#[derive(Debug, Clone, Default)]
pub struct DrawRequest {
    pub image: Option<RgbaImage>,
    pub palette: Option<Palette>,
    pub region: Option<ScreenRegion>,
    pub positions: ColorPositions,
    pub preprocess: PreprocessOptions,
    pub plan: PlanOptions,
    pub exec: ExecOptions,
}

impl DrawRequest {
    /// Use one style for both preprocessing and planning.
    pub fn set_style(&mut self, style: DrawStyle) {
        self.preprocess.style = style;
        self.plan.style = style;
    }
}

#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub state: SessionState,
    pub stats: Option<PlanStats>,
    pub report: Option<ExecReport>,
}

impl SessionOutcome {
    fn failed(reason: String) -> Self {
        Self { state: SessionState::Failed(reason), stats: None, report: None }
    }
}

/// Preprocess and plan. Notices from both stages are merged into the plan,
/// preprocessing ones first.
pub fn plan_drawing(request: &DrawRequest, surface: (u32, u32)) -> Result<Plan, DrawError> {
    let pre = preprocess(request.image.as_ref(), &request.preprocess)?;
    let mut plan = Planner::new(request.plan.clone()).plan(
        Some(&pre.bitmap),
        request.palette.as_ref(),
        request.region,
        surface,
    )?;
    let mut notices = pre.notices;
    notices.append(&mut plan.notices);
    plan.notices = notices;
    Ok(plan)
}

fn set_state(shared: &Mutex<SessionState>, state: SessionState) {
    if let Ok(mut s) = shared.lock() {
        *s = state;
    }
}

fn log_plan(plan: &Plan) {
    for n in &plan.notices {
        logger::notice("plan", n);
    }
    let colors: Vec<String> = plan
        .actions
        .iter()
        .filter_map(|a| match a {
            PlannedAction::SelectColor(c) => Some(color_name(*c)),
            _ => None,
        })
        .collect();
    if !colors.is_empty() {
        logger::info_p("plan", &format!("colors: {}", colors.join(", ")));
    }
    let s = &plan.stats;
    logger::info_p(
        "plan",
        &format!(
            "{} actions, {} points, {} segments, {} background pixels skipped, region {}",
            plan.actions.len(),
            s.points,
            s.segments,
            s.background,
            plan.region
        ),
    );
    if s.isolated > 0 {
        logger::info_p("plan", &format!("dropped {} isolated outline pixels", s.isolated));
    }
}

/// Plan on a worker thread, then execute on the calling thread.
/// `progress_tx` receives executor progress; it is also logged.
pub fn run_session(
    request: Arc<DrawRequest>,
    platform: &dyn Platform,
    state: &Mutex<SessionState>,
    cancel: &CancelFlag,
    progress_tx: Option<mpsc::Sender<Progress>>,
    sleeper: &mut dyn Sleeper,
) -> SessionOutcome {
    set_state(state, SessionState::Planning);
    logger::info_p("plan", &format!("planning {} drawing", request.plan.style));

    let surface = platform.screen_size();
    let worker_request = Arc::clone(&request);
    let planned = thread::spawn(move || plan_drawing(&worker_request, surface)).join();

    let plan = match planned {
        Ok(Ok(plan)) => plan,
        Ok(Err(e)) => {
            logger::error_p("plan", &e.to_string());
            set_state(state, SessionState::Failed(e.to_string()));
            return SessionOutcome::failed(e.to_string());
        }
        Err(_) => {
            let reason = "planning worker panicked".to_string();
            logger::error_p("plan", &reason);
            set_state(state, SessionState::Failed(reason.clone()));
            return SessionOutcome::failed(reason);
        }
    };
    log_plan(&plan);

    if cancel.is_set() {
        logger::warn_p("draw", "stopped before drawing started");
        set_state(state, SessionState::Cancelled);
        return SessionOutcome { state: SessionState::Cancelled, stats: Some(plan.stats), report: None };
    }

    set_state(state, SessionState::Executing);
    logger::info_p("draw", &format!("drawing {} actions, press Esc to stop", plan.actions.len()));

    let mut pointer = platform.pointer();
    let mut selector = PositionSelector::new(request.positions.clone());

    // Relay progress to the caller and the log.
    let (relay_tx, relay_rx) = mpsc::channel::<Progress>();
    let relay = thread::spawn(move || {
        for p in relay_rx {
            logger::info_p(
                "draw",
                &format!("progress {:.1}% ({}/{})", p.percent(), p.completed, p.total),
            );
            if let Some(tx) = &progress_tx {
                tx.send(p).ok();
            }
        }
    });

    let stats = plan.stats.clone();
    let result = Executor::new(
        pointer.as_mut(),
        &mut selector,
        sleeper,
        cancel.clone(),
        request.exec.clone(),
    )
    .with_progress(relay_tx)
    .run(plan.actions);
    relay.join().ok();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            logger::error_p("draw", &e.to_string());
            set_state(state, SessionState::Failed(e.to_string()));
            return SessionOutcome { state: SessionState::Failed(e.to_string()), stats: Some(stats), report: None };
        }
    };

    for n in &report.notices {
        logger::notice("draw", n);
    }
    if report.pointer_held {
        release_held(pointer.as_mut());
    }

    let final_state = match &report.state {
        ExecState::Finished => {
            logger::info_p(
                "draw",
                &format!(
                    "finished {} actions in {:.1}s ({:.0} actions/s)",
                    report.completed,
                    report.elapsed.as_secs_f64(),
                    report.actions_per_second()
                ),
            );
            SessionState::Completed
        }
        ExecState::Stopped => {
            logger::warn_p(
                "draw",
                &format!("stopped by user after {}/{} actions", report.completed, report.total),
            );
            SessionState::Cancelled
        }
        ExecState::Error(e) => {
            let err = DrawError::Actuator(e.clone());
            logger::error_p(
                "draw",
                &format!("{} (after {}/{} actions)", err, report.completed, report.total),
            );
            SessionState::Failed(err.to_string())
        }
        ExecState::Ready | ExecState::Running => SessionState::Failed("executor did not finish".into()),
    };

    set_state(state, final_state.clone());
    SessionOutcome { state: final_state, stats: Some(stats), report: Some(report) }
}

fn release_held(pointer: &mut dyn PointerActuator) {
    match pointer.release() {
        Ok(()) => logger::warn_p("draw", "released mouse button held by the interrupted stroke"),
        Err(e) => logger::error_p("draw", &format!("failed to release mouse button: {}", e)),
    }
}

/// Session loop. Runs on a background thread, drawing once per `Start`
/// until `Quit` or the command channel closes.
pub fn serve(
    request: DrawRequest,
    state: Arc<Mutex<SessionState>>,
    platform: Box<dyn Platform>,
    cmd_rx: mpsc::Receiver<Command>,
    progress_tx: mpsc::Sender<Progress>,
    cancel: CancelFlag,
) {
    logger::register_prefix("plan", logger::COLOR_BLUE);
    logger::register_prefix("draw", logger::COLOR_MAGENTA);

    let request = Arc::new(request);
    let mut sleeper = ThreadSleeper;

    for cmd in cmd_rx {
        match cmd {
            Command::Quit => {
                logger::info("shutting down");
                return;
            }
            Command::Start => {
                let busy = state.lock().map(|s| s.is_busy()).unwrap_or(false);
                if busy {
                    continue;
                }
                cancel.clear();
                run_session(
                    Arc::clone(&request),
                    platform.as_ref(),
                    &state,
                    &cancel,
                    Some(progress_tx.clone()),
                    &mut sleeper,
                );
                // Leave the pointer alone for a moment before accepting another start.
                thread::sleep(Duration::from_millis(100));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::stub::{CallLog, PointerCall, StubPlatform};
    use image::Rgba;

    struct NoSleep;

    impl Sleeper for NoSleep {
        fn sleep(&mut self, _: Duration) {}
    }

    fn red_white_request() -> DrawRequest {
        let img = RgbaImage::from_fn(2, 2, |_, y| {
            if y == 0 { Rgba([255, 0, 0, 255]) } else { Rgba([255, 255, 255, 255]) }
        });
        let red = Color::new(255, 0, 0);
        let mut positions = ColorPositions::new();
        positions.insert(red, DevicePoint::new(500, 5));
        DrawRequest {
            image: Some(img),
            palette: Some(Palette::new([red, Color::BLACK])),
            region: Some(ScreenRegion::new(0, 0, 20, 20).unwrap()),
            positions,
            ..Default::default()
        }
    }

    #[test]
    fn test_plan_drawing_merges_notices() {
        let mut request = red_white_request();
        request.region = None;
        let plan = plan_drawing(&request, (100, 100)).unwrap();
        assert!(matches!(plan.notices[0], Notice::BackgroundMarked { marked: 2, total: 4 }));
        assert!(matches!(plan.notices.last(), Some(Notice::MissingRegion { .. })));
    }

    #[test]
    fn test_session_completes() {
        let log = CallLog::new();
        let platform = StubPlatform::new(log.clone());
        let state = Mutex::new(SessionState::Idle);
        let (tx, rx) = mpsc::channel();

        let outcome = run_session(
            Arc::new(red_white_request()),
            &platform,
            &state,
            &CancelFlag::new(),
            Some(tx),
            &mut NoSleep,
        );

        assert_eq!(outcome.state, SessionState::Completed);
        assert_eq!(*state.lock().unwrap(), SessionState::Completed);
        assert_eq!(log.len(), 6);
        let last = rx.try_iter().last().unwrap();
        assert_eq!((last.completed, last.total), (5, 5));
    }

    #[test]
    fn test_session_without_image_fails() {
        let mut request = red_white_request();
        request.image = None;
        let state = Mutex::new(SessionState::Idle);
        let outcome = run_session(
            Arc::new(request),
            &StubPlatform::default(),
            &state,
            &CancelFlag::new(),
            None,
            &mut NoSleep,
        );
        assert_eq!(outcome.state, SessionState::Failed(DrawError::NoImage.to_string()));
        assert!(outcome.report.is_none());
    }

    #[test]
    fn test_session_cancelled_before_drawing() {
        let log = CallLog::new();
        let cancel = CancelFlag::new();
        cancel.set();
        let state = Mutex::new(SessionState::Idle);
        let outcome = run_session(
            Arc::new(red_white_request()),
            &StubPlatform::new(log.clone()),
            &state,
            &cancel,
            None,
            &mut NoSleep,
        );
        assert_eq!(outcome.state, SessionState::Cancelled);
        assert!(log.is_empty());
    }

    #[test]
    fn test_held_button_released_after_stop() {
        // A 3-pixel dark line in outline style; stop once the stroke has begun.
        struct StopOnDrag {
            flag: CancelFlag,
            moves: usize,
        }
        impl Sleeper for StopOnDrag {
            fn sleep(&mut self, d: Duration) {
                // Moves and drags sleep for the plain delay: the first is the
                // move to the stroke start, the second the first drag.
                if d < crate::executor::SETTLE_FLOOR {
                    self.moves += 1;
                    if self.moves == 2 {
                        self.flag.set();
                    }
                }
            }
        }

        let img = RgbaImage::from_fn(5, 3, |x, y| {
            if y == 1 && (1..4).contains(&x) { Rgba([0, 0, 0, 255]) } else { Rgba([255, 255, 255, 255]) }
        });
        let mut positions = ColorPositions::new();
        positions.insert(Color::BLACK, DevicePoint::new(0, 0));
        let mut request = DrawRequest {
            image: Some(img),
            palette: Some(Palette::new([Color::BLACK])),
            region: Some(ScreenRegion::new(0, 0, 5, 3).unwrap()),
            positions,
            ..Default::default()
        };
        // Pixel preprocessing keeps the source line intact for outline tracing.
        request.preprocess.skip_background = false;
        request.plan.style = DrawStyle::Outline;

        let log = CallLog::new();
        let cancel = CancelFlag::new();
        let state = Mutex::new(SessionState::Idle);
        let outcome = run_session(
            Arc::new(request),
            &StubPlatform::new(log.clone()),
            &state,
            &cancel,
            None,
            &mut StopOnDrag { flag: cancel.clone(), moves: 0 },
        );

        assert_eq!(outcome.state, SessionState::Cancelled);
        let calls = log.calls();
        assert_eq!(calls.last(), Some(&PointerCall::Release));
        assert!(calls.contains(&PointerCall::PressDown));
    }
}
