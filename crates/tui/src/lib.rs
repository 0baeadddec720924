mod app;
mod ui;
pub mod confirm;
pub mod event;

pub use app::App;
