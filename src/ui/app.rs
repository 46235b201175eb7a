//! Main application state and logic.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{block::BorderType, Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use tracing::{debug, info, warn};

use super::theme::{icons, Theme};
use super::widgets::{truncate, AnswerOptions, CompletionScreen, FlashcardWidget, KeyHints, Logo, StatsBar};
use crate::badges::{self, local_day};
use crate::config::{self, Config};
use crate::history::{HistoryEntry, QuizHistory};
use crate::judge::MAX_TYPING_ATTEMPTS;
use crate::models::{parse_tags, Word, WordDraft, WordId, WordStats, WordUpdate};
use crate::selector;
use crate::session::{AnswerOutcome, Face, Phase, QuestionFormat, Session, SessionSetup};
use crate::sm2::{format_interval, Scheduler};
use crate::storage::{self, JsonHistoryStore, JsonWordStore, WordRepository};

// ══════════════════════════════════════════════════════════════════════════
// Application State
// ══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    WordList,
    WordForm,
    Setup,
    Session,
    Complete,
    History,
    Stats,
}

const FORM_LABELS: [&str; 6] = [
    "Word",
    "Meaning",
    "Part of speech",
    "Sample sentence",
    "Mnemonic",
    "Tags (comma separated)",
];

const SETUP_ROWS: usize = 7;

/// Add/edit form contents.
#[derive(Debug, Default)]
pub struct WordForm {
    pub fields: [String; 6],
    pub focus: usize,
    pub editing: Option<WordId>,
}

impl WordForm {
    fn for_word(word: &Word) -> Self {
        let draft = word.draft();
        let tags: Vec<&str> = draft.tags.iter().map(String::as_str).collect();
        let tags = tags.join(", ");
        Self {
            fields: [
                draft.word,
                draft.meaning,
                draft.part_of_speech,
                draft.sample_sentence,
                draft.mnemonic,
                tags,
            ],
            focus: 0,
            editing: Some(word.id),
        }
    }

    fn draft(&self) -> WordDraft {
        WordDraft {
            word: self.fields[0].trim().to_string(),
            meaning: self.fields[1].trim().to_string(),
            part_of_speech: self.fields[2].trim().to_string(),
            sample_sentence: self.fields[3].trim().to_string(),
            mnemonic: self.fields[4].trim().to_string(),
            tags: parse_tags(&self.fields[5]),
        }
    }
}

pub struct App {
    pub screen: Screen,
    pub running: bool,

    // Config and theme
    pub config: Config,
    config_path: PathBuf,
    pub theme: Theme,

    // Storage
    pub store: JsonWordStore,
    pub history: QuizHistory<JsonHistoryStore>,
    pub scheduler: Scheduler,

    // Word list
    pub words: Vec<Word>,
    pub word_list_state: ListState,
    pub delete_pending: bool,

    // Add/edit form
    pub form: WordForm,

    // Session setup
    pub setup: SessionSetup,
    pub setup_cursor: usize,

    // Running session
    pub session: Option<Session>,
    pub option_cursor: usize,
    pub typed: String,
    pub feedback_since: Option<Instant>,
    pub session_start: Option<Instant>,

    // History
    pub history_entries: Vec<HistoryEntry>,
    pub history_list_state: ListState,
    pub history_delete_pending: bool,
    pub history_clear_pending: bool,

    // Status message (shown temporarily)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    pub fn new(
        store: JsonWordStore,
        history: QuizHistory<JsonHistoryStore>,
        config: Config,
        config_path: PathBuf,
    ) -> Self {
        let theme = Theme::from_name(&config.theme);
        let scheduler = Scheduler::new(config.interval_growth);
        let setup = SessionSetup {
            format: config.question_format,
            direction: config.direction,
            limit: config.quiz_limit,
            ..Default::default()
        };

        let mut app = Self {
            screen: Screen::WordList,
            running: true,
            config,
            config_path,
            theme,
            store,
            history,
            scheduler,
            words: Vec::new(),
            word_list_state: ListState::default(),
            delete_pending: false,
            form: WordForm::default(),
            setup,
            setup_cursor: 0,
            session: None,
            option_cursor: 0,
            typed: String::new(),
            feedback_since: None,
            session_start: None,
            history_entries: Vec::new(),
            history_list_state: ListState::default(),
            history_delete_pending: false,
            history_clear_pending: false,
            status_message: None,
        };
        app.refresh_words();
        app.refresh_history();
        app
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    fn save_config(&mut self) {
        if let Err(e) = self.config.save_to(&self.config_path) {
            warn!("could not save config: {:#}", e);
            self.set_status("Could not save settings");
        }
    }

    pub fn cycle_theme(&mut self) {
        let new_theme_name = self.theme.name.next();
        self.theme = Theme::new(new_theme_name);
        self.config.theme = new_theme_name.as_str().to_string();
        self.save_config();
    }

    pub fn refresh_words(&mut self) {
        match self.store.list() {
            Ok(mut words) => {
                words.sort_by_key(|w| w.key());
                self.words = words;
            }
            Err(e) => {
                warn!("could not load words: {}", e);
                self.set_status(format!("Could not load words: {}", e));
            }
        }

        // Keep the selection inside the list
        match self.word_list_state.selected() {
            _ if self.words.is_empty() => self.word_list_state.select(None),
            Some(i) if i >= self.words.len() => self.word_list_state.select(Some(self.words.len() - 1)),
            None => self.word_list_state.select(Some(0)),
            _ => {}
        }
    }

    pub fn refresh_history(&mut self) {
        match self.history.load(Utc::now()) {
            Ok(entries) => self.history_entries = entries,
            Err(e) => {
                warn!("could not load history: {}", e);
                self.set_status(format!("Could not load history: {}", e));
            }
        }
        if self.history_entries.is_empty() {
            self.history_list_state.select(None);
        } else {
            let i = self.history_list_state.selected().unwrap_or(0);
            self.history_list_state.select(Some(i.min(self.history_entries.len() - 1)));
        }
    }

    fn selected_word(&self) -> Option<&Word> {
        self.word_list_state.selected().and_then(|i| self.words.get(i))
    }

    // ══════════════════════════════════════════════════════════════════════
    // Word Management
    // ══════════════════════════════════════════════════════════════════════

    pub fn open_add_form(&mut self) {
        self.form = WordForm::default();
        self.screen = Screen::WordForm;
    }

    pub fn open_edit_form(&mut self) {
        if let Some(word) = self.selected_word() {
            self.form = WordForm::for_word(word);
            self.screen = Screen::WordForm;
        }
    }

    pub fn save_form(&mut self) {
        let draft = self.form.draft();
        if !draft.is_valid() {
            self.set_status("A word needs both a word and a meaning");
            return;
        }

        let result = match self.form.editing {
            Some(id) => self.store.update(id, WordUpdate::Content(draft)),
            None => self.store.add(draft).map(|_| ()),
        };

        match result {
            Ok(()) => {
                let verb = if self.form.editing.is_some() { "Updated" } else { "Added" };
                self.set_status(format!("{} '{}'", verb, self.form.fields[0].trim()));
                self.form = WordForm::default();
                self.refresh_words();
                self.screen = Screen::WordList;
            }
            Err(e) => {
                warn!("could not save word: {}", e);
                self.set_status(format!("Could not save word: {}", e));
            }
        }
    }

    pub fn delete_selected_word(&mut self) {
        self.delete_pending = false;
        let Some((id, name)) = self.selected_word().map(|w| (w.id, w.word.clone())) else {
            return;
        };
        match self.store.delete(id) {
            Ok(()) => self.set_status(format!("Deleted '{}'", name)),
            Err(e) => self.set_status(format!("Could not delete: {}", e)),
        }
        self.refresh_words();
    }

    fn toggle_flag(&mut self, favorite: bool) {
        let Some(word) = self.selected_word() else {
            return;
        };
        let update = if favorite {
            WordUpdate::Flags {
                favorite: Some(!word.is_favorite),
                difficult: None,
            }
        } else {
            WordUpdate::Flags {
                favorite: None,
                difficult: Some(!word.is_difficult),
            }
        };
        let id = word.id;
        if let Err(e) = self.store.update(id, update) {
            self.set_status(format!("Could not update: {}", e));
        }
        self.refresh_words();
    }

    pub fn export_words(&mut self) {
        let path = self.store.path().with_file_name("vocab-export.json");
        match storage::export_words(&self.store, &path) {
            Ok(count) => self.set_status(format!("Exported {} words to {}", count, path.display())),
            Err(e) => self.set_status(format!("Export failed: {}", e)),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Sessions
    // ══════════════════════════════════════════════════════════════════════

    fn change_setup_value(&mut self) {
        match self.setup_cursor {
            0 => self.setup.mode = self.setup.mode.next(),
            1 => self.setup.format = self.setup.format.next(),
            2 => self.setup.direction = self.setup.direction.flipped(),
            3 => self.setup.limit = config::next_quiz_limit(self.setup.limit),
            4 => {
                let tags = selector::all_tags(&self.words);
                self.setup.filter.tag = match &self.setup.filter.tag {
                    None => tags.first().cloned(),
                    Some(current) => tags
                        .iter()
                        .position(|t| t == current)
                        .and_then(|i| tags.get(i + 1))
                        .cloned(),
                };
            }
            5 => self.setup.filter.favorites_only = !self.setup.filter.favorites_only,
            6 => self.setup.filter.difficult_only = !self.setup.filter.difficult_only,
            _ => {}
        }
    }

    pub fn start_session(&mut self) {
        let mut rng = rand::rng();
        let result = Session::start(
            &self.words,
            self.setup.clone(),
            self.scheduler,
            Utc::now(),
            &mut rng,
        );

        match result {
            Ok(session) => {
                self.session = Some(session);
                self.option_cursor = 0;
                self.typed.clear();
                self.feedback_since = None;
                self.session_start = Some(Instant::now());
                self.screen = Screen::Session;

                self.config.quiz_limit = self.setup.limit;
                self.config.question_format = self.setup.format;
                self.config.direction = self.setup.direction;
                self.save_config();
            }
            Err(e) => {
                info!("session not started: {}", e);
                self.set_status(e.to_string());
            }
        }
    }

    pub fn choose_option(&mut self, index: usize) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.choose(index, &mut self.store, Utc::now()) {
            Ok(outcome) => self.after_answer(outcome),
            Err(e) => debug!("choice ignored: {}", e),
        }
    }

    pub fn submit_typed(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.submit_typed(&self.typed, &mut self.store, Utc::now()) {
            Ok(outcome) => self.after_answer(outcome),
            Err(e) => self.set_status(e.to_string()),
        }
    }

    fn after_answer(&mut self, outcome: AnswerOutcome) {
        self.typed.clear();
        if let Some(e) = outcome.write_error {
            self.set_status(format!("Progress not saved: {}", e));
        }
        if outcome.retry {
            self.set_status("Not quite. One more try");
            return;
        }
        self.feedback_since = Some(Instant::now());
    }

    /// Move past the feedback for the current question.
    pub fn advance_session(&mut self) {
        self.feedback_since = None;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.advance() {
            Ok(Phase::Complete) => self.finish_session(),
            Ok(_) => self.option_cursor = 0,
            Err(e) => debug!("advance ignored: {}", e),
        }
    }

    fn finish_session(&mut self) {
        let now = Utc::now();
        if let Some(entry) = self.session.as_ref().and_then(|s| s.finish_entry(now)) {
            if let Err(e) = self.history.record(entry, now) {
                warn!("could not record history: {}", e);
                self.set_status(format!("History not saved: {}", e));
            }
        }
        self.refresh_words();
        self.refresh_history();
        self.screen = Screen::Complete;
    }

    pub fn leave_session(&mut self) {
        self.session = None;
        self.feedback_since = None;
        self.refresh_words();
        self.screen = Screen::WordList;
    }

    /// Timer hook for the event loop: feedback advances on its own after the delay.
    pub fn tick(&mut self) {
        let delay = Duration::from_millis(self.config.feedback_delay_ms);
        if matches!(self.feedback_since, Some(since) if since.elapsed() >= delay) {
            self.advance_session();
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Event Handling
    // ══════════════════════════════════════════════════════════════════════

    pub fn handle_events(&mut self) -> anyhow::Result<()> {
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    self.handle_key(key.code);
                }
            }
        }
        Ok(())
    }

    pub fn handle_key(&mut self, key: KeyCode) {
        match self.screen {
            Screen::WordList => self.handle_word_list_keys(key),
            Screen::WordForm => self.handle_form_keys(key),
            Screen::Setup => self.handle_setup_keys(key),
            Screen::Session => self.handle_session_keys(key),
            Screen::Complete => self.handle_complete_keys(key),
            Screen::History => self.handle_history_keys(key),
            Screen::Stats => self.handle_stats_keys(key),
        }
    }

    fn handle_word_list_keys(&mut self, key: KeyCode) {
        if self.delete_pending {
            if key == KeyCode::Char('d') {
                self.delete_selected_word();
            } else {
                self.delete_pending = false;
            }
            return;
        }

        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Char('t') => self.cycle_theme(),
            KeyCode::Up | KeyCode::Char('k') => {
                if !self.words.is_empty() {
                    let i = self.word_list_state.selected().unwrap_or(0);
                    let new_i = if i == 0 { self.words.len() - 1 } else { i - 1 };
                    self.word_list_state.select(Some(new_i));
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if !self.words.is_empty() {
                    let i = self.word_list_state.selected().unwrap_or(0);
                    let new_i = if i + 1 >= self.words.len() { 0 } else { i + 1 };
                    self.word_list_state.select(Some(new_i));
                }
            }
            KeyCode::Enter => {
                self.setup_cursor = 0;
                self.screen = Screen::Setup;
            }
            KeyCode::Char('a') => self.open_add_form(),
            KeyCode::Char('e') => self.open_edit_form(),
            KeyCode::Char('d') => {
                if self.selected_word().is_some() {
                    self.delete_pending = true;
                }
            }
            KeyCode::Char('f') => self.toggle_flag(true),
            KeyCode::Char('m') => self.toggle_flag(false),
            KeyCode::Char('x') => self.export_words(),
            KeyCode::Char('h') => {
                self.refresh_history();
                self.screen = Screen::History;
            }
            KeyCode::Char('s') => {
                self.refresh_history();
                self.screen = Screen::Stats;
            }
            _ => {}
        }
    }

    fn handle_form_keys(&mut self, key: KeyCode) {
        let focus = self.form.focus;
        match key {
            KeyCode::Esc => {
                self.form = WordForm::default();
                self.screen = Screen::WordList;
            }
            KeyCode::Tab | KeyCode::Down => {
                self.form.focus = (focus + 1) % FORM_LABELS.len();
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.form.focus = (focus + FORM_LABELS.len() - 1) % FORM_LABELS.len();
            }
            KeyCode::Enter => self.save_form(),
            KeyCode::Char(c) => self.form.fields[focus].push(c),
            KeyCode::Backspace => {
                self.form.fields[focus].pop();
            }
            _ => {}
        }
    }

    fn handle_setup_keys(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc | KeyCode::Char('q') => self.screen = Screen::WordList,
            KeyCode::Up | KeyCode::Char('k') => {
                self.setup_cursor = (self.setup_cursor + SETUP_ROWS - 1) % SETUP_ROWS;
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.setup_cursor = (self.setup_cursor + 1) % SETUP_ROWS;
            }
            KeyCode::Char(' ') | KeyCode::Right | KeyCode::Left | KeyCode::Char('l') | KeyCode::Char('h') => {
                self.change_setup_value();
            }
            KeyCode::Enter => self.start_session(),
            _ => {}
        }
    }

    fn handle_session_keys(&mut self, key: KeyCode) {
        let Some(session) = self.session.as_ref() else {
            self.screen = Screen::WordList;
            return;
        };
        let graded = session.setup().mode.is_graded();
        let format = session.setup().format;
        let phase = session.phase();
        let option_count = session.options().len();

        if key == KeyCode::Esc {
            self.leave_session();
            return;
        }

        match phase {
            Phase::Feedback { .. } => {
                if matches!(key, KeyCode::Enter | KeyCode::Char(' ')) {
                    self.advance_session();
                }
            }
            Phase::Complete => self.screen = Screen::Complete,
            Phase::Answering if !graded => self.handle_flashcard_keys(key),
            Phase::Answering if format == QuestionFormat::Typing => match key {
                KeyCode::Enter => self.submit_typed(),
                KeyCode::Backspace => {
                    self.typed.pop();
                }
                KeyCode::Char(c) => self.typed.push(c),
                _ => {}
            },
            Phase::Answering => match key {
                KeyCode::Char(c @ '1'..='9') => {
                    let index = c as usize - '1' as usize;
                    self.choose_option(index);
                }
                KeyCode::Up | KeyCode::Char('k') if option_count > 0 => {
                    self.option_cursor = (self.option_cursor + option_count - 1) % option_count;
                }
                KeyCode::Down | KeyCode::Char('j') if option_count > 0 => {
                    self.option_cursor = (self.option_cursor + 1) % option_count;
                }
                KeyCode::Enter => self.choose_option(self.option_cursor),
                _ => {}
            },
        }
    }

    fn handle_flashcard_keys(&mut self, key: KeyCode) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let result = match key {
            KeyCode::Char(' ') | KeyCode::Enter => session.flip().map(|_| None),
            KeyCode::Right | KeyCode::Char('l') | KeyCode::Char('n') => session.next_card().map(Some),
            KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('p') => session.previous_card().map(|_| None),
            _ => Ok(None),
        };
        match result {
            Ok(Some(Phase::Complete)) => self.finish_session(),
            Ok(_) => {}
            Err(e) => debug!("flashcard key ignored: {}", e),
        }
    }

    fn handle_complete_keys(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => self.leave_session(),
            KeyCode::Char('r') => self.start_session(),
            _ => {}
        }
    }

    fn handle_history_keys(&mut self, key: KeyCode) {
        if self.history_delete_pending || self.history_clear_pending {
            let (delete, clear) = (self.history_delete_pending, self.history_clear_pending);
            self.history_delete_pending = false;
            self.history_clear_pending = false;

            let result = match key {
                KeyCode::Char('d') if delete => self
                    .history_list_state
                    .selected()
                    .and_then(|i| self.history_entries.get(i))
                    .map(|e| e.id.clone())
                    .map(|id| self.history.delete(&id)),
                KeyCode::Char('D') if clear => Some(self.history.clear()),
                _ => None,
            };
            if let Some(Err(e)) = result {
                self.set_status(format!("Could not update history: {}", e));
            }
            self.refresh_history();
            return;
        }

        match key {
            KeyCode::Esc | KeyCode::Char('q') => self.screen = Screen::WordList,
            KeyCode::Char('t') => self.cycle_theme(),
            KeyCode::Up | KeyCode::Char('k') => {
                if !self.history_entries.is_empty() {
                    let i = self.history_list_state.selected().unwrap_or(0);
                    let new_i = if i == 0 { self.history_entries.len() - 1 } else { i - 1 };
                    self.history_list_state.select(Some(new_i));
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if !self.history_entries.is_empty() {
                    let i = self.history_list_state.selected().unwrap_or(0);
                    let new_i = if i + 1 >= self.history_entries.len() { 0 } else { i + 1 };
                    self.history_list_state.select(Some(new_i));
                }
            }
            KeyCode::Char('d') if !self.history_entries.is_empty() => self.history_delete_pending = true,
            KeyCode::Char('D') if !self.history_entries.is_empty() => self.history_clear_pending = true,
            _ => {}
        }
    }

    fn handle_stats_keys(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc | KeyCode::Char('q') => self.screen = Screen::WordList,
            KeyCode::Char('t') => self.cycle_theme(),
            _ => {}
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Rendering
    // ══════════════════════════════════════════════════════════════════════

    pub fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();

        // Clear with background
        frame.render_widget(Clear, area);
        frame.render_widget(
            Block::default().style(Style::default().bg(self.theme.colors.bg_dark)),
            area,
        );

        match self.screen {
            Screen::WordList => self.render_word_list(frame, area),
            Screen::WordForm => self.render_form(frame, area),
            Screen::Setup => self.render_setup(frame, area),
            Screen::Session => self.render_session(frame, area),
            Screen::Complete => self.render_complete(frame, area),
            Screen::History => self.render_history(frame, area),
            Screen::Stats => self.render_stats(frame, area),
        }
    }

    fn panel<'a>(&self, title: &'a str, color: ratatui::style::Color) -> Block<'a> {
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(color))
            .title(title)
            .title_style(Style::default().fg(color).add_modifier(Modifier::BOLD))
    }

    /// Recent status message, if any, on a single line.
    fn render_status(&self, frame: &mut Frame, area: Rect) {
        if let Some((ref msg, time)) = self.status_message {
            if time.elapsed().as_secs() < 5 {
                let status = Paragraph::new(msg.as_str())
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(self.theme.colors.warning));
                frame.render_widget(status, area);
            }
        }
    }

    fn render_word_list(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::vertical([
            Constraint::Length(1),   // Top padding
            Constraint::Length(6),   // Logo
            Constraint::Length(1),   // Stats
            Constraint::Length(1),   // Word of the day
            Constraint::Length(1),   // Spacing
            Constraint::Min(5),      // List + details
            Constraint::Length(1),   // Status
            Constraint::Length(2),   // Hints
        ])
        .split(area);

        frame.render_widget(Logo::new(&self.theme), chunks[1]);

        let now = Utc::now();
        let stats = WordStats::collect(&self.words, now);
        frame.render_widget(StatsBar::new(stats, &self.theme), chunks[2]);

        if let Some(word) = selector::word_of_the_day(&self.words, Local::now().date_naive()) {
            let line = Line::from(vec![
                Span::styled("Word of the day: ", self.theme.subtitle()),
                Span::styled(&word.word, self.theme.highlight()),
                Span::styled(format!("  {}", word.meaning), Style::default().fg(self.theme.colors.text_muted)),
            ]);
            frame.render_widget(Paragraph::new(line).alignment(Alignment::Center), chunks[3]);
        }

        let main_chunks = Layout::horizontal([
            Constraint::Percentage(40),  // Word list
            Constraint::Percentage(60),  // Details
        ])
        .split(centered_rect(90, 100, chunks[5]));

        let name_width = main_chunks[0].width.saturating_sub(16) as usize;
        let items: Vec<ListItem> = self
            .words
            .iter()
            .map(|word| {
                let status = word.status(now);
                let mut spans = vec![
                    Span::styled("● ", self.theme.status(status)),
                    Span::styled(
                        truncate(&word.word, name_width),
                        Style::default().fg(self.theme.colors.text).add_modifier(Modifier::BOLD),
                    ),
                ];
                if word.is_favorite {
                    spans.push(Span::styled(format!(" {}", icons::STAR), Style::default().fg(self.theme.colors.warning)));
                }
                if word.is_difficult {
                    spans.push(Span::styled(format!(" {}", icons::FLAG), Style::default().fg(self.theme.colors.error)));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();

        let list = List::new(items)
            .block(self.panel(" Words ", self.theme.colors.primary))
            .highlight_style(self.theme.selected())
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, main_chunks[0], &mut self.word_list_state);

        if let Some(word) = self.selected_word() {
            self.render_word_details(frame, main_chunks[1], word);
        } else {
            let empty = Paragraph::new("No words yet. Press 'a' to add one.")
                .alignment(Alignment::Center)
                .block(self.panel(" Details ", self.theme.colors.text_dim));
            frame.render_widget(empty, main_chunks[1]);
        }

        if self.delete_pending {
            let msg = Paragraph::new("Press d again to delete, any other key to cancel")
                .alignment(Alignment::Center)
                .style(Style::default().fg(self.theme.colors.error));
            frame.render_widget(msg, chunks[6]);
        } else {
            self.render_status(frame, chunks[6]);
        }

        let theme_hint = format!("[{}]", self.theme.name.display_name());
        let hints_data: [(&str, &str); 11] = [
            ("j/k", "nav"),
            ("Enter", "session"),
            ("a", "add"),
            ("e", "edit"),
            ("d", "del"),
            ("f", "fav"),
            ("m", "difficult"),
            ("h", "history"),
            ("s", "stats"),
            ("t", &theme_hint),
            ("q", "quit"),
        ];
        frame.render_widget(KeyHints::new(&hints_data, &self.theme), chunks[7]);
    }

    fn render_word_details(&self, frame: &mut Frame, area: Rect, word: &Word) {
        let chunks = Layout::vertical([
            Constraint::Min(6),      // Content
            Constraint::Length(9),   // Schedule
        ])
        .split(area);

        let muted = Style::default().fg(self.theme.colors.text_muted);
        let text = Style::default().fg(self.theme.colors.text);

        let mut lines = vec![
            Line::from(vec![
                Span::styled(&word.word, self.theme.title()),
                Span::styled(
                    if word.part_of_speech.is_empty() {
                        String::new()
                    } else {
                        format!("  ({})", word.part_of_speech)
                    },
                    muted,
                ),
            ]),
            Line::from(Span::styled(&word.meaning, text)),
        ];
        for (label, value) in [("Example", &word.sample_sentence), ("Mnemonic", &word.mnemonic)] {
            if !value.is_empty() {
                lines.push(Line::from(""));
                lines.push(Line::from(vec![
                    Span::styled(format!("{}: ", label), muted),
                    Span::styled(value.as_str(), text),
                ]));
            }
        }
        if !word.tags.is_empty() {
            lines.push(Line::from(""));
            let tags: Vec<&str> = word.tags.iter().map(String::as_str).collect();
            lines.push(Line::from(vec![
                Span::styled("Tags: ", muted),
                Span::styled(tags.join(", "), Style::default().fg(self.theme.colors.secondary)),
            ]));
        }

        let content = Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(self.panel(" Word ", self.theme.colors.accent));
        frame.render_widget(content, chunks[0]);

        let now = Utc::now();
        let status = word.status(now);
        let next = match word.next_review {
            None => "not scheduled".to_string(),
            Some(at) => {
                let days = at.signed_duration_since(now).num_days();
                if at <= now {
                    "due now".to_string()
                } else if days == 0 {
                    "later today".to_string()
                } else {
                    format!("in {}", format_interval(days as u32))
                }
            }
        };
        let (hit, miss) = self.scheduler.preview(word, now);

        let schedule = vec![
            Line::from(vec![
                Span::styled("Status: ", muted),
                Span::styled(status.label(), self.theme.status(status)),
            ]),
            Line::from(vec![
                Span::styled("Next review: ", muted),
                Span::styled(next, Style::default().fg(self.theme.colors.primary)),
            ]),
            Line::from(vec![
                Span::styled("Ease: ", muted),
                Span::styled(format!("{:.2}", word.easiness_factor), text),
                Span::styled("   Streak: ", muted),
                Span::styled(word.streak.to_string(), text),
                Span::styled("   Points: ", muted),
                Span::styled(word.points.to_string(), text),
            ]),
            Line::from(vec![
                Span::styled("If right: ", muted),
                Span::styled(format_interval(hit), Style::default().fg(self.theme.colors.success)),
                Span::styled("   If wrong: ", muted),
                Span::styled(format_interval(miss), Style::default().fg(self.theme.colors.error)),
            ]),
        ];
        let schedule_block = Paragraph::new(schedule).block(self.panel(" Schedule ", self.theme.colors.text_dim));
        frame.render_widget(schedule_block, chunks[1]);
    }

    fn render_form(&mut self, frame: &mut Frame, area: Rect) {
        let mut constraints = vec![Constraint::Length(3), Constraint::Length(1)];
        constraints.extend([Constraint::Length(3); 6]);
        constraints.extend([Constraint::Min(1), Constraint::Length(1), Constraint::Length(2)]);
        let chunks = Layout::vertical(constraints).split(centered_rect(60, 100, area));

        let heading = if self.form.editing.is_some() { "Edit Word" } else { "Add Word" };
        let title = Paragraph::new(heading)
            .alignment(Alignment::Center)
            .style(self.theme.title());
        frame.render_widget(title, chunks[0]);

        for (i, label) in FORM_LABELS.iter().enumerate() {
            let focused = self.form.focus == i;
            let style = self.theme.input(focused);
            let field_area = chunks[2 + i];
            let input = Paragraph::new(self.form.fields[i].as_str()).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(style)
                    .title(format!(" {} ", label))
                    .title_style(style),
            );
            frame.render_widget(input, field_area);

            if focused {
                let inner_width = field_area.width.saturating_sub(2) as usize;
                let col = self.form.fields[i].chars().count().min(inner_width.saturating_sub(1));
                frame.set_cursor_position((field_area.x + 1 + col as u16, field_area.y + 1));
            }
        }

        self.render_status(frame, chunks[9]);

        let hints = KeyHints::new(&[
            ("Tab", "next field"),
            ("Enter", "save"),
            ("Esc", "cancel"),
        ], &self.theme);
        frame.render_widget(hints, chunks[10]);
    }

    fn render_setup(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::vertical([
            Constraint::Length(3),   // Title
            Constraint::Length(1),   // Spacing
            Constraint::Length(SETUP_ROWS as u16 + 2),
            Constraint::Length(1),   // Spacing
            Constraint::Length(2),   // Availability
            Constraint::Min(1),      // Spacer
            Constraint::Length(1),   // Status
            Constraint::Length(2),   // Hints
        ])
        .split(centered_rect(60, 100, area));

        let title = Paragraph::new("New Session")
            .alignment(Alignment::Center)
            .style(self.theme.title());
        frame.render_widget(title, chunks[0]);

        let on_off = |b: bool| (if b { "on" } else { "off" }).to_string();
        let rows: [(&str, String); SETUP_ROWS] = [
            ("Mode", self.setup.mode.name().to_string()),
            ("Answer by", self.setup.format.name().to_string()),
            ("Direction", self.setup.direction.name().to_string()),
            ("Questions", self.setup.limit.to_string()),
            ("Tag", self.setup.filter.tag.clone().unwrap_or_else(|| "all".into())),
            ("Favorites only", on_off(self.setup.filter.favorites_only)),
            ("Difficult only", on_off(self.setup.filter.difficult_only)),
        ];

        let items: Vec<ListItem> = rows
            .into_iter()
            .map(|(label, value)| {
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{:<16}", label), Style::default().fg(self.theme.colors.text_muted)),
                    Span::styled(value, self.theme.highlight()),
                ]))
            })
            .collect();
        let mut state = ListState::default().with_selected(Some(self.setup_cursor));
        let list = List::new(items)
            .block(self.panel(" Options ", self.theme.colors.primary))
            .highlight_style(self.theme.selected())
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, chunks[2], &mut state);

        let available = selector::filter_words(&self.words, &self.setup.filter).len();
        let required = self.setup.mode.minimum_vocabulary();
        let noun = if self.setup.filter.is_empty() { "words" } else { "matching words" };
        let (note, color) = if available >= required {
            (format!("{} {}", available, noun), self.theme.colors.success)
        } else {
            (
                format!("{} {}, this mode needs at least {}", available, noun, required),
                self.theme.colors.error,
            )
        };
        let availability = Paragraph::new(note)
            .alignment(Alignment::Center)
            .style(Style::default().fg(color));
        frame.render_widget(availability, chunks[4]);

        self.render_status(frame, chunks[6]);

        let hints = KeyHints::new(&[
            ("j/k", "nav"),
            ("Space", "change"),
            ("Enter", "start"),
            ("Esc", "back"),
        ], &self.theme);
        frame.render_widget(hints, chunks[7]);
    }

    fn render_session(&mut self, frame: &mut Frame, area: Rect) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let setup = session.setup();
        let graded = setup.mode.is_graded();
        let typing = graded && setup.format == QuestionFormat::Typing;
        let answer_height = if !graded {
            0
        } else if typing {
            3
        } else {
            session.options().len() as u16 * 3
        };

        let chunks = Layout::vertical([
            Constraint::Length(3),              // Header
            Constraint::Length(1),              // Progress
            Constraint::Length(1),              // Separator
            Constraint::Min(7),                 // Card
            Constraint::Length(1),              // Separator
            Constraint::Length(answer_height),  // Options / input
            Constraint::Length(2),              // Feedback
            Constraint::Length(2),              // Hints
        ])
        .split(area);

        let header = Paragraph::new(Line::from(vec![
            Span::styled(setup.mode.name(), self.theme.title()),
            Span::styled(
                if graded { format!("  ·  {}", setup.format.name()) } else { String::new() },
                self.theme.subtitle(),
            ),
        ]))
        .alignment(Alignment::Center);
        frame.render_widget(header, chunks[0]);

        let (position, total) = session.progress();
        let score = session.score();
        let progress = if graded {
            format!("Question {} of {}   Score {}/{}", position, total, score.correct, score.total)
        } else {
            format!("Card {} of {}", position, total)
        };
        frame.render_widget(
            Paragraph::new(progress)
                .alignment(Alignment::Center)
                .style(Style::default().fg(self.theme.colors.text_muted)),
            chunks[1],
        );

        let Some(word) = session.current() else {
            return;
        };
        let card_area = centered_rect(80, 100, chunks[3]);
        let revealed = matches!(session.phase(), Phase::Feedback { .. }) || session.face() == Face::Back;

        let card = if revealed {
            let answer = if graded {
                session.expected_answer().unwrap_or_default()
            } else {
                setup.direction.answer(word).unwrap_or_default()
            };
            FlashcardWidget::new(answer, false, &self.theme)
                .detail("Example", &word.sample_sentence)
                .detail("Mnemonic", &word.mnemonic)
        } else {
            FlashcardWidget::new(session.prompt().unwrap_or_default(), true, &self.theme)
                .detail("Part of speech", &word.part_of_speech)
        };
        frame.render_widget(card, card_area);

        let answer_area = centered_rect(70, 100, chunks[5]);
        if typing {
            let style = self.theme.input(session.phase() == Phase::Answering);
            let title = format!(
                " Your answer (attempt {} of {}) ",
                (session.typing_attempts() + 1).min(MAX_TYPING_ATTEMPTS),
                MAX_TYPING_ATTEMPTS
            );
            let shown = match session.phase() {
                Phase::Answering => self.typed.as_str(),
                _ => session.last_answer().unwrap_or_default(),
            };
            let input = Paragraph::new(shown).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(style)
                    .title(title)
                    .title_style(style),
            );
            frame.render_widget(input, answer_area);
            if session.phase() == Phase::Answering {
                let col = self.typed.chars().count().min(answer_area.width.saturating_sub(3) as usize);
                frame.set_cursor_position((answer_area.x + 1 + col as u16, answer_area.y + 1));
            }
        } else if graded {
            let mut options = AnswerOptions::new(session.options(), self.option_cursor, &self.theme);
            if let Phase::Feedback { .. } = session.phase() {
                options = options.reveal(session.expected_answer(), session.last_answer());
            }
            frame.render_widget(options, answer_area);
        }

        if let Phase::Feedback { correct } = session.phase() {
            let verdict = if correct {
                format!("{} Correct!", icons::CHECK)
            } else {
                format!(
                    "{} The answer is {}",
                    icons::CROSS,
                    session.expected_answer().unwrap_or_default()
                )
            };
            let lines = vec![
                Line::from(Span::styled(verdict, self.theme.verdict(correct))),
                Line::from(Span::styled(
                    format!("Next review in {}", format_interval(word.repetition)),
                    Style::default().fg(self.theme.colors.text_muted),
                )),
            ];
            frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), chunks[6]);
        } else {
            self.render_status(frame, chunks[6]);
        }

        let hints_data: &[(&str, &str)] = match session.phase() {
            Phase::Feedback { .. } => &[("Enter", "next"), ("Esc", "quit")],
            _ if !graded => &[("Space", "flip"), ("h/l", "prev/next"), ("Esc", "quit")],
            _ if typing => &[("Enter", "submit"), ("Esc", "quit")],
            _ => &[("1-4", "answer"), ("j/k", "move"), ("Enter", "pick"), ("Esc", "quit")],
        };
        frame.render_widget(KeyHints::new(hints_data, &self.theme), chunks[7]);
    }

    fn render_complete(&mut self, frame: &mut Frame, area: Rect) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let card_area = centered_rect(60, 80, area);

        let duration_mins = self
            .session_start
            .map(|s| s.elapsed().as_secs() / 60)
            .unwrap_or(0);

        let screen = if session.setup().mode.is_graded() {
            CompletionScreen::graded(session.score(), session.results(), duration_mins, &self.theme)
        } else {
            CompletionScreen::flashcards(session.progress().1, duration_mins, &self.theme)
        };
        frame.render_widget(screen, card_area);
    }

    fn render_history(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::vertical([
            Constraint::Length(3),   // Header
            Constraint::Length(1),   // Spacing
            Constraint::Min(8),      // Main content
            Constraint::Length(1),   // Status
            Constraint::Length(2),   // Hints
        ])
        .split(area);

        let title = Paragraph::new(format!(
            "Quiz History (last {} days)",
            self.config.history_retention_days
        ))
        .alignment(Alignment::Center)
        .style(self.theme.title());
        frame.render_widget(title, chunks[0]);

        let main_chunks = Layout::horizontal([
            Constraint::Percentage(40),
            Constraint::Percentage(60),
        ])
        .split(chunks[2]);

        let items: Vec<ListItem> = self
            .history_entries
            .iter()
            .map(|entry| {
                let date = entry
                    .date
                    .map(|d| d.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "undated".into());
                let mode = entry.mode.map(|m| m.name()).unwrap_or("Quiz");
                ListItem::new(Line::from(vec![
                    Span::styled(date, Style::default().fg(self.theme.colors.text)),
                    Span::styled(format!("  {} ", mode), Style::default().fg(self.theme.colors.text_muted)),
                    Span::styled(
                        format!("{}/{}", entry.score.correct, entry.score.total),
                        self.theme.verdict(entry.score.percent() >= 50),
                    ),
                ]))
            })
            .collect();
        let list = List::new(items)
            .block(self.panel(" Sessions ", self.theme.colors.primary))
            .highlight_style(self.theme.selected())
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, main_chunks[0], &mut self.history_list_state);

        let results: Vec<Line> = self
            .history_list_state
            .selected()
            .and_then(|i| self.history_entries.get(i))
            .map(|entry| {
                entry
                    .results
                    .iter()
                    .map(|r| {
                        let (icon, style) = if r.is_correct {
                            (icons::CHECK, self.theme.verdict(true))
                        } else {
                            (icons::CROSS, self.theme.verdict(false))
                        };
                        Line::from(vec![
                            Span::styled(format!("{} ", icon), style),
                            Span::styled(r.word.word.clone(), Style::default().fg(self.theme.colors.text)),
                            Span::styled(
                                format!("  {}", r.selected_answer),
                                Style::default().fg(self.theme.colors.text_dim),
                            ),
                        ])
                    })
                    .collect()
            })
            .unwrap_or_default();
        let detail = Paragraph::new(results)
            .wrap(Wrap { trim: true })
            .block(self.panel(" Answers ", self.theme.colors.accent));
        frame.render_widget(detail, main_chunks[1]);

        if self.history_delete_pending {
            let msg = Paragraph::new("Press d again to delete this session")
                .alignment(Alignment::Center)
                .style(Style::default().fg(self.theme.colors.error));
            frame.render_widget(msg, chunks[3]);
        } else if self.history_clear_pending {
            let msg = Paragraph::new("Press D again to delete all history")
                .alignment(Alignment::Center)
                .style(Style::default().fg(self.theme.colors.error));
            frame.render_widget(msg, chunks[3]);
        } else {
            self.render_status(frame, chunks[3]);
        }

        let hints = KeyHints::new(&[
            ("j/k", "nav"),
            ("d", "delete"),
            ("D", "clear all"),
            ("Esc", "back"),
        ], &self.theme);
        frame.render_widget(hints, chunks[4]);
    }

    fn render_stats(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::vertical([
            Constraint::Length(3),   // Title
            Constraint::Length(1),   // Spacing
            Constraint::Min(10),     // Stats content
            Constraint::Length(2),   // Hints
        ])
        .split(area);

        let title = Paragraph::new("Stats")
            .alignment(Alignment::Center)
            .style(self.theme.title());
        frame.render_widget(title, chunks[0]);

        let stats = WordStats::collect(&self.words, Utc::now());
        let today = local_day(Utc::now());
        let days: HashSet<NaiveDate> = self
            .history_entries
            .iter()
            .filter_map(|e| e.date)
            .map(local_day)
            .collect();
        let streak = daily_streak(&days, today);
        let (correct, total) = self
            .history_entries
            .iter()
            .fold((0, 0), |(c, t), e| (c + e.score.correct, t + e.score.total));
        let accuracy = if total == 0 { 0 } else { correct * 100 / total };

        let content_area = centered_rect(70, 100, chunks[2]);
        let stat_chunks = Layout::vertical([
            Constraint::Length(10),  // Overview
            Constraint::Length(1),   // Spacing
            Constraint::Min(7),      // Badges
        ])
        .split(content_area);

        let muted = Style::default().fg(self.theme.colors.text_muted);
        let strong = Style::default()
            .fg(self.theme.colors.primary)
            .add_modifier(Modifier::BOLD);
        let overview_lines = vec![
            Line::from(vec![
                Span::styled("Words: ", muted),
                Span::styled(stats.total.to_string(), strong),
                Span::styled("   Learned: ", muted),
                Span::styled(stats.learned.to_string(), strong),
                Span::styled("   Due: ", muted),
                Span::styled(stats.due.to_string(), strong),
            ]),
            Line::from(vec![
                Span::styled("Favorites: ", muted),
                Span::styled(stats.favorites.to_string(), strong),
                Span::styled("   Difficult: ", muted),
                Span::styled(stats.difficult.to_string(), strong),
            ]),
            Line::from(vec![
                Span::styled("Points: ", muted),
                Span::styled(stats.total_points.to_string(), strong),
                Span::styled("   Intervals: ", muted),
                Span::styled(self.scheduler.growth().as_str(), Style::default().fg(self.theme.colors.secondary)),
            ]),
            Line::from(""),
            Line::from(vec![
                Span::styled("Sessions: ", muted),
                Span::styled(self.history_entries.len().to_string(), strong),
                Span::styled(format!(" in the last {} days", self.config.history_retention_days), muted),
            ]),
            Line::from(vec![
                Span::styled("Accuracy: ", muted),
                Span::styled(format!("{}%", accuracy), strong),
            ]),
            Line::from(vec![
                Span::styled("Daily Streak: ", muted),
                Span::styled(
                    format!("{} day{}", streak, if streak == 1 { "" } else { "s" }),
                    Style::default().fg(if streak > 0 { self.theme.colors.success } else { self.theme.colors.text_dim }),
                ),
            ]),
        ];
        let overview = Paragraph::new(overview_lines).block(self.panel(" Overview ", self.theme.colors.primary));
        frame.render_widget(overview, stat_chunks[0]);

        let badge_lines: Vec<Line> = badges::evaluate(&self.words, &self.history_entries, today)
            .into_iter()
            .map(|(badge, earned)| {
                let (icon, style) = if earned {
                    (icons::TROPHY, Style::default().fg(self.theme.colors.warning).add_modifier(Modifier::BOLD))
                } else {
                    (icons::LOCK, Style::default().fg(self.theme.colors.text_dim))
                };
                Line::from(vec![
                    Span::styled(format!("{} {}", icon, badge.name()), style),
                    Span::styled(format!("  {}", badge.description()), Style::default().fg(self.theme.colors.text_dim)),
                ])
            })
            .collect();
        let badge_block = Paragraph::new(badge_lines).block(self.panel(" Badges ", self.theme.colors.accent));
        frame.render_widget(badge_block, stat_chunks[2]);

        let hints = KeyHints::new(&[
            ("t", "theme"),
            ("Esc", "back"),
        ], &self.theme);
        frame.render_widget(hints, chunks[3]);
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Helper Functions
// ══════════════════════════════════════════════════════════════════════════

/// Create a centered rectangle.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(r);

    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}

/// Consecutive days with a session, ending today or yesterday.
fn daily_streak(days: &HashSet<NaiveDate>, today: NaiveDate) -> u32 {
    let one_day = chrono::Duration::days(1);
    let mut check = if days.contains(&today) { today } else { today - one_day };

    let mut streak = 0;
    while days.contains(&check) {
        streak += 1;
        check -= one_day;
    }
    streak
}
