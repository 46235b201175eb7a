//! Error types for the store and session layers.

use thiserror::Error;

use crate::models::WordId;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Word not found: {0}")]
    WordNotFound(WordId),

    #[error("History entry not found: {0}")]
    EntryNotFound(String),

    #[error("Invalid data: {0}")]
    Invalid(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Raised before any selection or scheduling happens.
    #[error("Not enough words: this session needs at least {required}, you have {available}")]
    InsufficientVocabulary { required: usize, available: usize },

    #[error("No question is waiting for an answer")]
    NotAnswering,

    #[error("The current question has not been answered yet")]
    AwaitingAnswer,

    #[error("There is no option {0}")]
    InvalidChoice(usize),

    #[error("Type an answer first")]
    BlankAnswer,

    #[error("Only flashcard sessions can flip cards")]
    NotFlashcards,

    #[error("Session is already complete")]
    Finished,
}
