use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, MouseEventKind};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::App;
use crate::ui;

pub fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> anyhow::Result<()> {
    loop {
        if app.should_quit {
            return Ok(());
        }

        app.drain_logs();
        app.drain_progress();

        terminal.draw(|f| ui::draw(f, app))?;

        // Poll for events with 100ms timeout (keeps TUI responsive)
        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if app.confirm.is_some() {
                        match key.code {
                            KeyCode::Left | KeyCode::Right | KeyCode::Tab
                            | KeyCode::Char('h') | KeyCode::Char('l') => app.toggle_confirm(),
                            KeyCode::Enter => app.confirm_selected(),
                            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => app.dismiss_confirm(),
                            KeyCode::Char('y') | KeyCode::Char('Y') => {
                                if let Some(d) = &mut app.confirm {
                                    d.selected = true;
                                }
                                app.confirm_selected();
                            }
                            _ => {}
                        }
                        continue;
                    }
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') => {
                            app.quit();
                        }
                        KeyCode::Char('s') | KeyCode::Char('S') | KeyCode::Enter => {
                            app.request_start();
                        }
                        KeyCode::Esc | KeyCode::Char('x') | KeyCode::Char('X') => {
                            app.stop();
                        }
                        KeyCode::Char('l') | KeyCode::Char('L') => {
                            app.toggle_log();
                        }
                        _ => {}
                    }
                }
                Event::Mouse(mouse) => {
                    match mouse.kind {
                        MouseEventKind::ScrollUp => {
                            app.scroll_log_up(3);
                        }
                        MouseEventKind::ScrollDown => {
                            app.scroll_log_down(3);
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }
    }
}
