//! Quiz history: finished sessions and age-based pruning.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::Word;
use crate::selector::SessionMode;
use crate::storage::HistoryRepository;

/// Default retention window in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub correct: usize,
    pub total: usize,
}

impl Score {
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            0
        } else {
            self.correct * 100 / self.total
        }
    }

    pub fn is_perfect(&self) -> bool {
        self.total > 0 && self.correct == self.total
    }
}

/// One answered question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    /// The word as it was when the question was asked.
    pub word: Word,
    pub selected_answer: String,
    pub is_correct: bool,
}

/// A finished, graded session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default = "new_entry_id")]
    pub id: String,
    /// Entries without a readable date are dropped on the next prune.
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<DateTime<Utc>>,
    pub score: Score,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<SessionMode>,
    #[serde(default)]
    pub results: Vec<QuizResult>,
}

impl HistoryEntry {
    pub fn new(date: Option<DateTime<Utc>>, score: Score, results: Vec<QuizResult>) -> Self {
        Self {
            id: new_entry_id(),
            date,
            score,
            mode: None,
            results,
        }
    }

    pub fn with_mode(mut self, mode: SessionMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

fn new_entry_id() -> String {
    Uuid::new_v4().to_string()
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|d| d.with_timezone(&Utc))
    }))
}

/// Keep entries dated no more than `days` before `now`. Undated entries are dropped.
pub fn filter_old_history(
    history: Vec<HistoryEntry>,
    days: u32,
    now: DateTime<Utc>,
) -> Vec<HistoryEntry> {
    let window = Duration::days(i64::from(days));
    history
        .into_iter()
        .filter(|entry| match entry.date {
            Some(date) => now.signed_duration_since(date) <= window,
            None => false,
        })
        .collect()
}

/// History operations on top of a wholesale blob store.
pub struct QuizHistory<R: HistoryRepository> {
    repo: R,
    retention_days: u32,
}

impl<R: HistoryRepository> QuizHistory<R> {
    pub fn new(repo: R, retention_days: u32) -> Self {
        Self {
            repo,
            retention_days,
        }
    }

    /// Read, prune and persist the pruned list if anything was dropped. Newest first.
    pub fn load(&mut self, now: DateTime<Utc>) -> StoreResult<Vec<HistoryEntry>> {
        let stored = self.repo.read()?;
        let before = stored.len();
        let mut recent = filter_old_history(stored, self.retention_days, now);

        if recent.len() != before {
            info!(pruned = before - recent.len(), "pruned old quiz history");
            self.repo.write(&recent)?;
        }

        recent.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(recent)
    }

    /// Prepend a finished session and drop anything past the retention window.
    pub fn record(&mut self, entry: HistoryEntry, now: DateTime<Utc>) -> StoreResult<()> {
        let mut history = filter_old_history(self.repo.read()?, self.retention_days, now);
        history.insert(0, entry);
        self.repo.write(&history)
    }

    pub fn delete(&mut self, id: &str) -> StoreResult<()> {
        let mut history = self.repo.read()?;
        let before = history.len();
        history.retain(|e| e.id != id);
        if history.len() == before {
            return Err(StoreError::EntryNotFound(id.to_string()));
        }
        self.repo.write(&history)
    }

    pub fn clear(&mut self) -> StoreResult<()> {
        self.repo.write(&[])
    }
}
