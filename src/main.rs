//! Vocab - spaced repetition vocabulary trainer TUI
//!
//! Quiz, revision and flashcard sessions over your own word list, scheduled with SM-2.

mod badges;
mod config;
mod error;
mod history;
mod judge;
mod models;
mod selector;
mod session;
mod sm2;
mod storage;
mod ui;

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;
use history::QuizHistory;
use storage::{ImportPolicy, JsonHistoryStore, JsonWordStore};
use ui::App;

// ══════════════════════════════════════════════════════════════════════════
// CLI Arguments
// ══════════════════════════════════════════════════════════════════════════

#[derive(Parser, Debug)]
#[command(name = "vocab")]
#[command(author, version, about = "Spaced repetition vocabulary trainer TUI", long_about = None)]
struct Args {
    /// Directory holding words.json and history.json
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Log file (defaults to vocab.log in the data directory)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Import words from a JSON file and exit
    #[arg(short, long, conflicts_with = "export")]
    import: Option<PathBuf>,

    /// Export words to a JSON file and exit
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// On import, replace existing words whose content differs
    #[arg(long, requires = "import")]
    overwrite: bool,
}

// ══════════════════════════════════════════════════════════════════════════
// Main Entry Point
// ══════════════════════════════════════════════════════════════════════════

fn main() -> Result<()> {
    let args = Args::parse();

    let data_dir = args.data_dir.unwrap_or_else(storage::default_data_dir);
    let log_file = args.log_file.unwrap_or_else(|| data_dir.join("vocab.log"));
    init_logging(&log_file)?;

    let config_path = Config::default_path();
    let config = Config::load_from(&config_path).unwrap_or_else(|e| {
        tracing::warn!("using default config: {:#}", e);
        Config::default()
    });

    let mut store = JsonWordStore::open(&data_dir)
        .with_context(|| format!("Failed to open word store in {:?}", data_dir))?;

    if let Some(path) = args.import {
        let policy = if args.overwrite {
            ImportPolicy::Overwrite
        } else {
            ImportPolicy::KeepExisting
        };
        let report = storage::import_words(&mut store, &path, policy)
            .with_context(|| format!("Failed to import {:?}", path))?;

        println!(
            "✓ Imported {}: {} added, {} updated, {} unchanged, {} invalid",
            path.display(),
            report.added,
            report.updated,
            report.unchanged,
            report.invalid
        );
        if !report.conflicts.is_empty() {
            println!(
                "  {} kept as they were (use --overwrite to replace): {}",
                report.conflicts.len(),
                report.conflicts.join(", ")
            );
        }
        return Ok(());
    }

    if let Some(path) = args.export {
        let count = storage::export_words(&store, &path)
            .with_context(|| format!("Failed to export to {:?}", path))?;
        println!("✓ Exported {} words to {}", count, path.display());
        return Ok(());
    }

    let history_store = JsonHistoryStore::open(&data_dir)
        .with_context(|| format!("Failed to open history in {:?}", data_dir))?;
    let history = QuizHistory::new(history_store, config.history_retention_days);

    info!(data_dir = %data_dir.display(), "starting");
    run_tui(App::new(store, history, config, config_path))
}

/// Logs go to a file because the terminal belongs to the UI.
fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {:?}", parent))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {:?}", path))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(EnvFilter::try_from_env("VOCAB_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    Ok(())
}

fn run_tui(mut app: App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        tracing::error!("{:#}", err);
        eprintln!("Error: {}", err);
        return Err(err);
    }

    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    while app.running {
        app.tick();
        terminal.draw(|frame| app.render(frame))?;
        app.handle_events()?;
    }
    Ok(())
}
