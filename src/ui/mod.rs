//! TUI module for the vocabulary trainer.

mod app;
mod theme;
mod widgets;

pub use app::App;
