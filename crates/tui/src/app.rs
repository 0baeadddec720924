use std::sync::{Arc, Mutex, mpsc};

use autodraw_core::types::{CancelFlag, Command, Progress, SessionState};

use crate::confirm::ConfirmDialog;

pub struct App {
    pub state: Arc<Mutex<SessionState>>,
    /// Static facts about the drawing, shown as `label: value` rows.
    pub summary: Vec<(String, String)>,
    pub progress: Option<Progress>,
    pub progress_rx: mpsc::Receiver<Progress>,
    pub log_visible: bool,
    pub log_messages: Vec<String>,
    pub log_scroll: usize, // scroll offset from bottom (0 = latest)
    pub log_rx: mpsc::Receiver<String>,
    pub cmd_tx: mpsc::Sender<Command>,
    pub cancel: CancelFlag,
    pub confirm: Option<ConfirmDialog>,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        state: Arc<Mutex<SessionState>>,
        summary: Vec<(String, String)>,
        log_rx: mpsc::Receiver<String>,
        progress_rx: mpsc::Receiver<Progress>,
        cmd_tx: mpsc::Sender<Command>,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            state,
            summary,
            progress: None,
            progress_rx,
            log_visible: true,
            log_messages: Vec::new(),
            log_scroll: 0,
            log_rx,
            cmd_tx,
            cancel,
            confirm: None,
            should_quit: false,
        }
    }

    pub fn session_state(&self) -> SessionState {
        self.state.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn drain_logs(&mut self) {
        while let Ok(msg) = self.log_rx.try_recv() {
            self.log_messages.push(msg);
        }
    }

    /// Keep only the newest progress event.
    pub fn drain_progress(&mut self) {
        while let Ok(p) = self.progress_rx.try_recv() {
            self.progress = Some(p);
        }
    }

    pub fn scroll_log_up(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_add(n);
    }

    pub fn scroll_log_down(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(n);
    }

    /// Ask for confirmation before drawing. Ignored while a drawing runs.
    pub fn request_start(&mut self) {
        if self.session_state().is_busy() || self.confirm.is_some() {
            return;
        }
        self.confirm = Some(
            ConfirmDialog::new("Start drawing now?")
                .with_detail("Focus the target application first.")
                .with_detail("Hands off the mouse. Esc stops."),
        );
    }

    /// Answer the open dialog with its current selection.
    pub fn confirm_selected(&mut self) {
        let Some(dialog) = self.confirm.take() else { return };
        if dialog.selected {
            self.progress = None;
            self.cmd_tx.send(Command::Start).ok();
        }
    }

    pub fn dismiss_confirm(&mut self) {
        self.confirm = None;
    }

    pub fn toggle_confirm(&mut self) {
        if let Some(dialog) = &mut self.confirm {
            dialog.toggle();
        }
    }

    pub fn stop(&mut self) {
        if self.session_state().is_busy() {
            self.cancel.set();
        }
    }

    pub fn toggle_log(&mut self) {
        self.log_visible = !self.log_visible;
    }

    pub fn quit(&mut self) {
        self.cancel.set();
        self.cmd_tx.send(Command::Quit).ok();
        self.should_quit = true;
    }
}
