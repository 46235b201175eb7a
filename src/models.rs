//! Data models for vocabulary words.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::sm2::MAX_INTERVAL_DAYS;

/// Easiness factor given to words that have never been scheduled.
pub const DEFAULT_EASINESS: f64 = 2.5;
/// SM-2 floor for the easiness factor.
pub const MIN_EASINESS: f64 = 1.3;
/// Consecutive correct answers needed before a word counts as learned.
pub const LEARNED_STREAK: u32 = 10;
/// Points awarded per correct answer.
pub const POINTS_PER_CORRECT: u32 = 10;

/// Identifier assigned by the word store. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WordId(pub u64);

impl fmt::Display for WordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

fn default_easiness() -> f64 {
    DEFAULT_EASINESS
}

/// Treats an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_easiness<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(DEFAULT_EASINESS))
}

/// A vocabulary word together with its scheduling state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub id: WordId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub word: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub meaning: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub part_of_speech: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sample_sentence: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mnemonic: String,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: BTreeSet<String>,

    // Scheduling state, written only through `WordUpdate::Review`
    #[serde(default = "default_easiness", deserialize_with = "null_as_easiness")]
    pub easiness_factor: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub repetition: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub streak: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reviewed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_review: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_learned: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub points: u32,

    // User flags
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_favorite: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_difficult: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Word {
    /// Build a fresh word from a draft with defaulted scheduling fields.
    pub fn from_draft(id: WordId, draft: WordDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            word: draft.word,
            meaning: draft.meaning,
            part_of_speech: draft.part_of_speech,
            sample_sentence: draft.sample_sentence,
            mnemonic: draft.mnemonic,
            tags: draft.tags,
            easiness_factor: DEFAULT_EASINESS,
            repetition: 0,
            streak: 0,
            last_reviewed: None,
            next_review: None,
            is_learned: false,
            points: 0,
            is_favorite: false,
            is_difficult: false,
            created_at: Some(now),
            updated_at: Some(now),
        }
        .normalized()
    }

    /// The one place where loaded or imported records get their defaults fixed up.
    pub fn normalized(mut self) -> Self {
        self.word = self.word.trim().to_string();
        self.meaning = self.meaning.trim().to_string();
        self.part_of_speech = self.part_of_speech.trim().to_string();
        self.sample_sentence = self.sample_sentence.trim().to_string();
        self.mnemonic = self.mnemonic.trim().to_string();
        self.tags = clean_tags(std::mem::take(&mut self.tags));

        if !self.easiness_factor.is_finite() {
            self.easiness_factor = DEFAULT_EASINESS;
        }
        self.easiness_factor = self.easiness_factor.max(MIN_EASINESS);
        self.repetition = self.repetition.min(MAX_INTERVAL_DAYS);
        self.is_learned = self.streak >= LEARNED_STREAK;

        if let (Some(last), Some(next)) = (self.last_reviewed, self.next_review) {
            if next < last {
                self.next_review = Some(last);
            }
        }
        self
    }

    /// Merge a partial update. Review updates never touch content and vice versa.
    pub fn apply(&mut self, update: WordUpdate, now: DateTime<Utc>) {
        match update {
            WordUpdate::Review(review) => {
                self.easiness_factor = review.easiness_factor.max(MIN_EASINESS);
                self.repetition = review.repetition;
                self.streak = review.streak;
                self.next_review = Some(review.next_review);
                self.is_learned = review.is_learned;
                self.last_reviewed = Some(review.last_reviewed);
                self.points = review.points;
            }
            WordUpdate::Content(draft) => {
                self.word = draft.word.trim().to_string();
                self.meaning = draft.meaning.trim().to_string();
                self.part_of_speech = draft.part_of_speech.trim().to_string();
                self.sample_sentence = draft.sample_sentence.trim().to_string();
                self.mnemonic = draft.mnemonic.trim().to_string();
                self.tags = clean_tags(draft.tags);
            }
            WordUpdate::Flags { favorite, difficult } => {
                if let Some(favorite) = favorite {
                    self.is_favorite = favorite;
                }
                if let Some(difficult) = difficult {
                    self.is_difficult = difficult;
                }
            }
        }
        self.updated_at = Some(now);
    }

    pub fn status(&self, now: DateTime<Utc>) -> WordStatus {
        if self.last_reviewed.is_none() {
            return WordStatus::New;
        }
        if self.is_learned {
            return WordStatus::Learned;
        }
        match self.next_review {
            Some(next) if next > now => WordStatus::Scheduled,
            _ => WordStatus::Due,
        }
    }

    pub fn draft(&self) -> WordDraft {
        WordDraft {
            word: self.word.clone(),
            meaning: self.meaning.clone(),
            part_of_speech: self.part_of_speech.clone(),
            sample_sentence: self.sample_sentence.clone(),
            mnemonic: self.mnemonic.clone(),
            tags: self.tags.clone(),
        }
    }

    /// Key used to match words on import: trimmed and lower-cased.
    pub fn key(&self) -> String {
        word_key(&self.word)
    }
}

pub fn word_key(word: &str) -> String {
    word.trim().to_lowercase()
}

/// Where a word sits relative to the review schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordStatus {
    New,
    Due,
    Scheduled,
    Learned,
}

impl WordStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Due => "due",
            Self::Scheduled => "scheduled",
            Self::Learned => "learned",
        }
    }
}

/// User-editable content of a word.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordDraft {
    #[serde(default, deserialize_with = "null_as_default")]
    pub word: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub meaning: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub part_of_speech: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sample_sentence: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mnemonic: String,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: BTreeSet<String>,
}

impl WordDraft {
    pub fn new(word: impl Into<String>, meaning: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            meaning: meaning.into(),
            ..Default::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.word.trim().is_empty() && !self.meaning.trim().is_empty()
    }

    /// Compare content the way import does: word by key, tags as sets, the rest trimmed.
    pub fn same_content(&self, word: &Word) -> bool {
        word_key(&self.word) == word.key()
            && self.meaning.trim() == word.meaning
            && self.part_of_speech.trim() == word.part_of_speech
            && self.sample_sentence.trim() == word.sample_sentence
            && self.mnemonic.trim() == word.mnemonic
            && clean_tags(self.tags.clone()) == word.tags
    }
}

/// Scheduling fields written back after an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewUpdate {
    pub easiness_factor: f64,
    pub repetition: u32,
    pub streak: u32,
    pub next_review: DateTime<Utc>,
    pub is_learned: bool,
    pub last_reviewed: DateTime<Utc>,
    pub points: u32,
}

/// Partial updates accepted by the word store.
#[derive(Debug, Clone, PartialEq)]
pub enum WordUpdate {
    Review(ReviewUpdate),
    Content(WordDraft),
    Flags {
        favorite: Option<bool>,
        difficult: Option<bool>,
    },
}

/// Parse a comma-separated tag list. Blanks are dropped, duplicates collapse.
pub fn parse_tags(input: &str) -> BTreeSet<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn clean_tags(tags: BTreeSet<String>) -> BTreeSet<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Tags arrive either as an array or as one comma-separated string.
fn deserialize_tags<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        List(Vec<Option<String>>),
        Text(String),
    }

    Ok(match Option::<Tags>::deserialize(deserializer)? {
        None => BTreeSet::new(),
        Some(Tags::Text(text)) => parse_tags(&text),
        Some(Tags::List(list)) => clean_tags(list.into_iter().flatten().collect()),
    })
}

/// Counts across the whole vocabulary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WordStats {
    pub total: usize,
    pub new: usize,
    pub due: usize,
    pub scheduled: usize,
    pub learned: usize,
    pub favorites: usize,
    pub difficult: usize,
    pub total_points: u64,
}

impl WordStats {
    pub fn collect(words: &[Word], now: DateTime<Utc>) -> Self {
        let mut stats = WordStats {
            total: words.len(),
            ..Default::default()
        };

        for word in words {
            match word.status(now) {
                WordStatus::New => stats.new += 1,
                WordStatus::Due => stats.due += 1,
                WordStatus::Scheduled => stats.scheduled += 1,
                WordStatus::Learned => stats.learned += 1,
            }
            if word.is_favorite {
                stats.favorites += 1;
            }
            if word.is_difficult {
                stats.difficult += 1;
            }
            stats.total_points += u64::from(word.points);
        }

        stats
    }
}
