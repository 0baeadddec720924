//! Process-wide log sink: a plain-text file plus an optional channel feeding
//! the TUI log panel.
//!
//! Channel lines are `level\x1fprefix\x1fcolor\x1ftimestamp\x1fmessage`; the
//! color is the index registered for the prefix (0 when none).

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{mpsc, Mutex, OnceLock};

use chrono::Local;

use crate::error::Notice;

pub const COLOR_GRAY: u8 = 1;
pub const COLOR_BLUE: u8 = 2;
pub const COLOR_MAGENTA: u8 = 3;

pub const LOG_FILE: &str = "autodraw.log";

const FIELD_SEP: char = '\x1f';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

struct Sink {
    file: File,
    tui: Option<mpsc::Sender<String>>,
    colors: HashMap<String, u8>,
}

static SINK: OnceLock<Mutex<Sink>> = OnceLock::new();

/// Open (and truncate) `log_dir/autodraw.log`. Only the first call takes
/// effect; anything logged before it, including from unit tests, is dropped.
pub fn init(log_dir: &Path) -> io::Result<()> {
    fs::create_dir_all(log_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_dir.join(LOG_FILE))?;
    let _ = SINK.set(Mutex::new(Sink { file, tui: None, colors: HashMap::new() }));
    Ok(())
}

fn with_sink(f: impl FnOnce(&mut Sink)) {
    if let Some(Ok(mut sink)) = SINK.get().map(Mutex::lock) {
        f(&mut sink);
    }
}

/// Route log lines to the TUI. Replacing the sender drops the previous one.
pub fn set_tui_sender(tx: mpsc::Sender<String>) {
    with_sink(|s| s.tui = Some(tx));
}

pub fn register_prefix(prefix: &str, color: u8) {
    with_sink(|s| {
        s.colors.insert(prefix.to_string(), color);
    });
}

fn file_line(ts: &str, level: Level, prefix: &str, msg: &str) -> String {
    if prefix.is_empty() {
        format!("[{}] [{}] {}", ts, level.as_str(), msg)
    } else {
        format!("[{}] [{}] [{}] {}", ts, level.as_str(), prefix, msg)
    }
}

fn channel_line(ts: &str, level: Level, prefix: &str, color: u8, msg: &str) -> String {
    [level.as_str(), prefix, &color.to_string(), ts, msg].join(&FIELD_SEP.to_string())
}

pub fn log(level: Level, prefix: &str, msg: &str) {
    let ts = Local::now().format("%H:%M:%S").to_string();
    with_sink(|s| {
        let _ = writeln!(s.file, "{}", file_line(&ts, level, prefix, msg));
        if let Some(tx) = &s.tui {
            let color = s.colors.get(prefix).copied().unwrap_or(0);
            let _ = tx.send(channel_line(&ts, level, prefix, color, msg));
        }
    });
}

pub fn info(msg: &str) {
    log(Level::Info, "", msg);
}

pub fn warn(msg: &str) {
    log(Level::Warn, "", msg);
}

pub fn error(msg: &str) {
    log(Level::Error, "", msg);
}

pub fn info_p(prefix: &str, msg: &str) {
    log(Level::Info, prefix, msg);
}

pub fn warn_p(prefix: &str, msg: &str) {
    log(Level::Warn, prefix, msg);
}

pub fn error_p(prefix: &str, msg: &str) {
    log(Level::Error, prefix, msg);
}

/// Log a pipeline notice at the level it calls for.
pub fn notice(prefix: &str, notice: &Notice) {
    let level = if notice.is_warning() { Level::Warn } else { Level::Info };
    log(level, prefix, &notice.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_line() {
        assert_eq!(file_line("09:00:00", Level::Info, "", "hi"), "[09:00:00] [INFO] hi");
        assert_eq!(
            file_line("09:00:00", Level::Warn, "draw", "hi"),
            "[09:00:00] [WARN] [draw] hi"
        );
    }

    #[test]
    fn test_channel_line_fields() {
        let line = channel_line("09:00:00", Level::Error, "plan", COLOR_BLUE, "a\x1fb");
        let parts: Vec<&str> = line.splitn(5, FIELD_SEP).collect();
        assert_eq!(parts, ["ERROR", "plan", "2", "09:00:00", "a\x1fb"]);
    }
}
