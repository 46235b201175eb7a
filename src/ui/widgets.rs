//! Custom widgets for the vocabulary TUI.

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{block::BorderType, Block, Borders, Paragraph, Widget, Wrap},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::theme::{icons, Theme};
use crate::history::{QuizResult, Score};
use crate::models::{WordStats, WordStatus};

/// Cut `text` to at most `width` terminal columns, marking the cut with `…`.
pub fn truncate(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}

// ══════════════════════════════════════════════════════════════════════════
// Logo Widget
// ══════════════════════════════════════════════════════════════════════════

pub struct Logo<'a> {
    theme: &'a Theme,
}

impl<'a> Logo<'a> {
    const ART: &'static str = r#"
╭──────────────────────────────────────╮
│ __   __              _               │
│ \ \ / /__   ___ __ _| |__            │
│  \ V / _ \ / __/ _` | '_ \           │
│   | | (_) | (_| (_| | |_) |  words,  │
│   |_|\___/ \___\__,_|_.__/  spaced.  │
╰──────────────────────────────────────╯"#;

    pub fn new(theme: &'a Theme) -> Self {
        Self { theme }
    }
}

impl Widget for Logo<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let lines: Vec<Line> = Self::ART
            .lines()
            .skip(1)
            .map(|line| Line::from(Span::styled(line, Style::default().fg(self.theme.colors.primary))))
            .collect();

        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .render(area, buf);
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Stats Bar Widget
// ══════════════════════════════════════════════════════════════════════════

pub struct StatsBar<'a> {
    stats: WordStats,
    theme: &'a Theme,
}

impl<'a> StatsBar<'a> {
    pub fn new(stats: WordStats, theme: &'a Theme) -> Self {
        Self { stats, theme }
    }

    fn cell(&self, status: WordStatus, count: usize) -> Line<'static> {
        Line::from(vec![
            Span::styled("● ", self.theme.status(status)),
            Span::styled(
                format!("{}: ", status.label()),
                Style::default().fg(self.theme.colors.text_muted),
            ),
            Span::styled(count.to_string(), self.theme.status(status)),
        ])
    }
}

impl Widget for StatsBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::horizontal([Constraint::Ratio(1, 5); 5]).split(area);

        let cells = [
            self.cell(WordStatus::New, self.stats.new),
            self.cell(WordStatus::Due, self.stats.due),
            self.cell(WordStatus::Scheduled, self.stats.scheduled),
            self.cell(WordStatus::Learned, self.stats.learned),
        ];
        for (cell, chunk) in cells.into_iter().zip(chunks.iter()) {
            Paragraph::new(cell)
                .alignment(Alignment::Center)
                .render(*chunk, buf);
        }

        let points = Line::from(vec![
            Span::styled(format!("{} ", icons::STAR), Style::default().fg(self.theme.colors.warning)),
            Span::styled(
                self.stats.total_points.to_string(),
                Style::default().fg(self.theme.colors.text_dim),
            ),
        ]);
        Paragraph::new(points)
            .alignment(Alignment::Center)
            .render(chunks[4], buf);
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Flashcard Widget
// ══════════════════════════════════════════════════════════════════════════

/// One side of a card: a headline plus optional detail lines.
pub struct FlashcardWidget<'a> {
    headline: &'a str,
    details: Vec<(&'a str, &'a str)>,
    is_front: bool,
    theme: &'a Theme,
}

impl<'a> FlashcardWidget<'a> {
    pub fn new(headline: &'a str, is_front: bool, theme: &'a Theme) -> Self {
        Self {
            headline,
            details: Vec::new(),
            is_front,
            theme,
        }
    }

    /// Add a labelled line; blank values are skipped.
    pub fn detail(mut self, label: &'a str, value: &'a str) -> Self {
        if !value.trim().is_empty() {
            self.details.push((label, value));
        }
        self
    }
}

impl Widget for FlashcardWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (label, label_style, border_style) = if self.is_front {
            ("FRONT", self.theme.card_front(), Style::default().fg(self.theme.colors.accent))
        } else {
            ("BACK", self.theme.card_back(), Style::default().fg(self.theme.colors.success))
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(border_style)
            .title(Line::from(vec![
                Span::raw(" "),
                Span::styled(label, label_style),
                Span::raw(" "),
            ]))
            .title_alignment(Alignment::Center);

        let inner = block.inner(area);
        block.render(area, buf);

        let mut lines = vec![Line::from(Span::styled(
            self.headline,
            Style::default()
                .fg(self.theme.colors.text)
                .add_modifier(Modifier::BOLD),
        ))];
        if !self.details.is_empty() {
            lines.push(Line::from(""));
        }
        for (label, value) in &self.details {
            lines.push(Line::from(vec![
                Span::styled(format!("{}: ", label), Style::default().fg(self.theme.colors.text_muted)),
                Span::styled(*value, Style::default().fg(self.theme.colors.text)),
            ]));
        }

        // Center vertically
        let content_height = lines.len() as u16;
        let vertical_padding = inner.height.saturating_sub(content_height) / 2;
        let content_area = Rect {
            x: inner.x + 2,
            y: inner.y + vertical_padding,
            width: inner.width.saturating_sub(4),
            height: inner.height.saturating_sub(vertical_padding),
        };

        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(content_area, buf);
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Answer Options Widget
// ══════════════════════════════════════════════════════════════════════════

/// Multiple-choice options. After answering, the correct option turns green
/// and a wrong pick turns red.
pub struct AnswerOptions<'a> {
    options: &'a [String],
    cursor: usize,
    answer: Option<&'a str>,
    picked: Option<&'a str>,
    revealed: bool,
    theme: &'a Theme,
}

impl<'a> AnswerOptions<'a> {
    pub fn new(options: &'a [String], cursor: usize, theme: &'a Theme) -> Self {
        Self {
            options,
            cursor,
            answer: None,
            picked: None,
            revealed: false,
            theme,
        }
    }

    pub fn reveal(mut self, answer: Option<&'a str>, picked: Option<&'a str>) -> Self {
        self.answer = answer;
        self.picked = picked;
        self.revealed = true;
        self
    }
}

impl Widget for AnswerOptions<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let rows = Layout::vertical(vec![Constraint::Length(3); self.options.len()]).split(area);

        for (i, (option, row)) in self.options.iter().zip(rows.iter()).enumerate() {
            let is_answer = self.answer == Some(option.as_str());
            let is_picked = self.picked == Some(option.as_str());

            let (color, marker) = if self.revealed && is_answer {
                (self.theme.colors.success, icons::CHECK)
            } else if self.revealed && is_picked {
                (self.theme.colors.error, icons::CROSS)
            } else if !self.revealed && i == self.cursor {
                (self.theme.colors.accent, ">")
            } else {
                (self.theme.colors.text_dim, " ")
            };

            let block = Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(color));
            let inner = block.inner(*row);
            block.render(*row, buf);

            let text = truncate(option, inner.width.saturating_sub(6) as usize);
            let line = Line::from(vec![
                Span::styled(format!("{} ", marker), Style::default().fg(color)),
                Span::styled(
                    format!("{} ", i + 1),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
                Span::styled(text, Style::default().fg(self.theme.colors.text)),
            ]);
            Paragraph::new(line).render(inner, buf);
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Key Hints Widget
// ══════════════════════════════════════════════════════════════════════════

pub struct KeyHints<'a> {
    hints: &'a [(&'a str, &'a str)],
    theme: &'a Theme,
}

impl<'a> KeyHints<'a> {
    pub fn new(hints: &'a [(&'a str, &'a str)], theme: &'a Theme) -> Self {
        Self { hints, theme }
    }
}

impl Widget for KeyHints<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let spans: Vec<Span> = self
            .hints
            .iter()
            .flat_map(|(key, desc)| {
                vec![
                    Span::styled(*key, self.theme.key_highlight()),
                    Span::styled(format!(" {} ", desc), self.theme.key_hint()),
                    Span::styled("│ ", Style::default().fg(self.theme.colors.text_dim)),
                ]
            })
            .collect();

        Paragraph::new(Line::from(spans))
            .alignment(Alignment::Center)
            .render(area, buf);
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Completion Screen Widget
// ══════════════════════════════════════════════════════════════════════════

/// Final score and a per-question breakdown.
pub struct CompletionScreen<'a> {
    score: Option<Score>,
    results: &'a [QuizResult],
    cards_seen: usize,
    duration_mins: u64,
    theme: &'a Theme,
}

impl<'a> CompletionScreen<'a> {
    pub fn graded(score: Score, results: &'a [QuizResult], duration_mins: u64, theme: &'a Theme) -> Self {
        Self {
            score: Some(score),
            results,
            cards_seen: results.len(),
            duration_mins,
            theme,
        }
    }

    pub fn flashcards(cards_seen: usize, duration_mins: u64, theme: &'a Theme) -> Self {
        Self {
            score: None,
            results: &[],
            cards_seen,
            duration_mins,
            theme,
        }
    }
}

impl Widget for CompletionScreen<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(self.theme.colors.success))
            .title(Line::from(vec![
                Span::raw(" "),
                Span::styled("SESSION COMPLETE", self.theme.card_back()),
                Span::raw(" "),
            ]))
            .title_alignment(Alignment::Center);

        let inner = block.inner(area);
        block.render(area, buf);

        let muted = Style::default().fg(self.theme.colors.text_muted);
        let strong = Style::default()
            .fg(self.theme.colors.primary)
            .add_modifier(Modifier::BOLD);

        let mut text = vec![Line::from("")];
        match self.score {
            Some(score) => {
                let cheer = if score.is_perfect() { "Perfect score!" } else { "Session saved." };
                text.push(Line::from(Span::styled(cheer, self.theme.verdict(true))));
                text.push(Line::from(""));
                text.push(Line::from(vec![
                    Span::styled("Score: ", muted),
                    Span::styled(
                        format!("{}/{} ({}%)", score.correct, score.total, score.percent()),
                        strong,
                    ),
                ]));
            }
            None => {
                text.push(Line::from(vec![
                    Span::styled("Cards reviewed: ", muted),
                    Span::styled(self.cards_seen.to_string(), strong),
                ]));
            }
        }
        text.push(Line::from(vec![
            Span::styled("Time: ", muted),
            Span::styled(format!("{} minutes", self.duration_mins), strong),
        ]));
        text.push(Line::from(""));

        let width = inner.width.saturating_sub(8) as usize;
        for result in self.results {
            let (icon, style) = if result.is_correct {
                (icons::CHECK, self.theme.verdict(true))
            } else {
                (icons::CROSS, self.theme.verdict(false))
            };
            let mut spans = vec![
                Span::styled(format!("{} ", icon), style),
                Span::styled(truncate(&result.word.word, width / 2), Style::default().fg(self.theme.colors.text)),
            ];
            if !result.is_correct {
                spans.push(Span::styled(
                    format!("  you said: {}", truncate(&result.selected_answer, width / 2)),
                    Style::default().fg(self.theme.colors.text_dim),
                ));
            }
            text.push(Line::from(spans));
        }

        text.push(Line::from(""));
        text.push(Line::from(vec![
            Span::styled("Press ", Style::default().fg(self.theme.colors.text_dim)),
            Span::styled("ESC", self.theme.key_highlight()),
            Span::styled(" to return", Style::default().fg(self.theme.colors.text_dim)),
        ]));

        Paragraph::new(text)
            .alignment(Alignment::Center)
            .render(inner, buf);
    }
}
