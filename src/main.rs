mod settings;

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use crossterm::{
    execute,
    event::{EnableMouseCapture, DisableMouseCapture},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use autodraw_core::{logger, preprocess, session};
use autodraw_core::platform::{create_platform, hotkey};
use autodraw_core::capture::CAPTURE_COUNTDOWN;
use autodraw_core::sleep::{sleep_ms, ThreadSleeper};
use autodraw_core::types::{CancelFlag, Color, Command, DrawStyle, Progress, ScreenRegion, SessionState};

use settings::{load_palette_file, Settings};

/// Draw an image into a paint program by driving the mouse.
#[derive(Parser, Debug)]
#[command(name = "autodraw", about = "Redraw an image with the mouse, one palette color at a time")]
struct Cli {
    /// Image to draw (PNG, JPEG, GIF, BMP).
    image: Option<PathBuf>,
    /// Target application, selects the built-in palette (mspaint, gartic, ...).
    #[arg(long)]
    target: Option<String>,
    #[arg(long, value_parser = parse_style, value_name = "pixel|outline|vector")]
    style: Option<DrawStyle>,
    /// Scale factor applied to the image before drawing.
    #[arg(long)]
    resolution: Option<f32>,
    /// Seconds to pause after each pointer move.
    #[arg(long)]
    speed: Option<f64>,
    /// Palette file (.json or .csv).
    #[arg(long)]
    palette: Option<PathBuf>,
    /// Drawing area on screen.
    #[arg(long, value_parser = parse_region, value_name = "x1,y1,x2,y2")]
    region: Option<ScreenRegion>,
    /// Pixels with every channel at or above this are skipped.
    #[arg(long)]
    white_threshold: Option<u8>,
    /// Cell size (screen pixels) bounding the stroke ordering search.
    #[arg(long)]
    cell_size: Option<f64>,
    /// Draw near-white pixels too.
    #[arg(long, action = ArgAction::SetTrue)]
    no_skip_white: bool,
    /// Settings file. Defaults to ./settings.json.
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Log pointer calls instead of moving the mouse.
    #[arg(long, action = ArgAction::SetTrue)]
    stub: bool,
    /// No TUI: start after a countdown and print logs to stdout.
    #[arg(long, action = ArgAction::SetTrue)]
    headless: bool,
    /// Write the merged settings back to the settings file.
    #[arg(long, action = ArgAction::SetTrue)]
    save: bool,
    /// Record where a palette color sits on screen, then save. Repeatable.
    #[arg(long, value_parser = parse_color, value_name = "r,g,b", action = ArgAction::Append)]
    capture_color: Vec<Color>,
    /// Record the drawing area from two mouse corners, then save.
    #[arg(long, action = ArgAction::SetTrue)]
    capture_area: bool,
}

fn parse_style(s: &str) -> Result<DrawStyle, String> {
    s.parse()
}

fn parse_color(s: &str) -> Result<Color, String> {
    s.parse()
}

fn parse_region(s: &str) -> Result<ScreenRegion, String> {
    let v: Vec<i32> = s
        .split(',')
        .map(|p| p.trim().parse::<i32>().map_err(|e| format!("\"{}\": {}", p, e)))
        .collect::<Result<_, _>>()?;
    if v.len() != 4 {
        return Err("expected x1,y1,x2,y2".into());
    }
    ScreenRegion::new(v[0], v[1], v[2], v[3]).map_err(|e| e.to_string())
}

impl Cli {
    /// Command line values win over saved settings.
    fn apply(&self, s: &mut Settings) {
        if let Some(t) = &self.target {
            s.target_app = t.clone();
        }
        if let Some(style) = self.style {
            s.style = style;
        }
        if let Some(r) = self.resolution {
            s.resolution = r;
        }
        if let Some(speed) = self.speed {
            s.speed = speed;
        }
        if let Some(region) = self.region {
            s.canvas_area = Some(region);
        }
        if let Some(t) = self.white_threshold {
            s.drawing.white_threshold = t;
        }
        if let Some(c) = self.cell_size {
            s.drawing.cell_size = c;
        }
        if self.no_skip_white {
            s.drawing.skip_white = false;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    logger::init(&cwd.join("logs")).context("failed to open log file")?;

    let settings_path = cli.settings.clone().unwrap_or_else(|| cwd.join("settings.json"));
    let (mut settings, loaded) = match Settings::load(&settings_path) {
        Ok(s) => (s, true),
        Err(e) => {
            logger::error(&format!("{:#}, using default settings", e));
            eprintln!("warning: {:#}, using default settings", e);
            (Settings::default(), false)
        }
    };
    cli.apply(&mut settings);

    if let Some(path) = &cli.palette {
        let palette = load_palette_file(path)?;
        settings.palette = palette.colors().to_vec();
    }

    let capturing = !cli.capture_color.is_empty() || cli.capture_area;
    if (cli.save || capturing) && !loaded {
        bail!("refusing to overwrite {}, fix or remove it first", settings_path.display());
    }
    if capturing {
        let platform = create_platform(cli.stub);
        let pointer = platform.pointer();
        settings.capture(
            pointer.as_ref(),
            &cli.capture_color,
            cli.capture_area,
            CAPTURE_COUNTDOWN,
            &mut ThreadSleeper,
            |line| {
                println!("{}", line);
                logger::info(line);
            },
        )?;
        settings.save(&settings_path)?;
        println!("saved {}", settings_path.display());
        return Ok(());
    }
    if cli.save {
        settings.save(&settings_path)?;
    }

    let mut request = settings.draw_request();
    let mut summary = vec![
        ("target".to_string(), settings.target_app.clone()),
        ("style".to_string(), settings.style.to_string()),
        ("resolution".to_string(), format!("{}x", settings.resolution)),
        ("speed".to_string(), format!("{}s per move", settings.speed)),
        (
            "palette".to_string(),
            format!("{} colors", request.palette.as_ref().map_or(0, |p| p.len())),
        ),
        (
            "area".to_string(),
            settings.canvas_area.map_or("centered on screen".to_string(), |r| r.to_string()),
        ),
        ("color spots".to_string(), format!("{} known", settings.color_positions.len())),
    ];

    if let Some(path) = &cli.image {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let image = preprocess::decode(&bytes).with_context(|| format!("decoding {}", path.display()))?;
        summary.insert(
            0,
            (
                "image".to_string(),
                format!("{} ({}x{})", path.display(), image.width(), image.height()),
            ),
        );
        request.image = Some(image);
    }

    let platform = create_platform(cli.stub);

    // Shared state
    let state = Arc::new(Mutex::new(SessionState::Idle));
    let cancel = CancelFlag::new();

    // Channels
    let (log_tx, log_rx) = mpsc::channel::<String>();
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
    let (progress_tx, progress_rx) = mpsc::channel::<Progress>();

    logger::set_tui_sender(log_tx);
    logger::info("autodraw started");

    // Spawn the drawing session on a background thread
    let session_state = Arc::clone(&state);
    let session_cancel = cancel.clone();
    let session = thread::spawn(move || {
        session::serve(request, session_state, platform, cmd_rx, progress_tx, session_cancel);
    });

    // Global Esc stops a drawing from any window
    hotkey::start_cancel_listener(cancel.clone());

    if cli.headless {
        return run_headless(state, cmd_tx, log_rx, progress_rx, session);
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = autodraw_tui::App::new(
        Arc::clone(&state),
        summary,
        log_rx,
        progress_rx,
        cmd_tx,
        cancel,
    );

    // Run TUI event loop on main thread
    let result = autodraw_tui::event::run(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    session.join().ok();
    result
}

const COUNTDOWN_SECS: u64 = 3;

/// Print log lines and draw once, after giving the user time to focus the
/// target application.
fn run_headless(
    state: Arc<Mutex<SessionState>>,
    cmd_tx: mpsc::Sender<Command>,
    log_rx: mpsc::Receiver<String>,
    progress_rx: mpsc::Receiver<Progress>,
    session: thread::JoinHandle<()>,
) -> Result<()> {
    // Progress is already logged by the session.
    drop(progress_rx);
    let printer = thread::spawn(move || {
        for line in log_rx {
            let parts: Vec<&str> = line.splitn(5, '\x1f').collect();
            match parts.as_slice() {
                [level, prefix, _, ts, msg] if prefix.is_empty() => println!("{} {:5} {}", ts, level, msg),
                [level, prefix, _, ts, msg] => println!("{} {:5} [{}] {}", ts, level, prefix, msg),
                _ => println!("{}", line),
            }
        }
    });

    for n in (1..=COUNTDOWN_SECS).rev() {
        logger::info(&format!("drawing starts in {}s, switch to the target application", n));
        sleep_ms(1000);
    }
    cmd_tx.send(Command::Start).ok();
    cmd_tx.send(Command::Quit).ok();
    session.join().ok();

    // Drop the logger's channel end by replacing it so the printer can finish.
    let (idle_tx, _) = mpsc::channel();
    logger::set_tui_sender(idle_tx);
    printer.join().ok();

    let final_state = state.lock().map(|s| s.clone()).unwrap_or_default();
    match final_state {
        SessionState::Failed(reason) => bail!("drawing failed: {}", reason),
        _ => Ok(()),
    }
}
