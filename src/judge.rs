//! Grading for typed answers.

use crate::sm2::Quality;

/// Submissions allowed per typing question: the first try and one retry.
pub const MAX_TYPING_ATTEMPTS: u32 = 2;

/// Case-insensitive, whitespace-trimmed exact match.
pub fn is_correct(typed: &str, target: &str) -> bool {
    let target = target.trim();
    !target.is_empty() && typed.trim().to_lowercase() == target.to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingVerdict {
    Correct(Quality),
    /// Wrong, but another attempt is allowed.
    Retry,
    Incorrect,
}

/// Attempt counter for one typing question.
#[derive(Debug, Clone, Default)]
pub struct TypingAttempt {
    attempts: u32,
}

impl TypingAttempt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Blank input does not count as an attempt.
    pub fn submit(&mut self, typed: &str, target: &str) -> Option<TypingVerdict> {
        if typed.trim().is_empty() || self.attempts >= MAX_TYPING_ATTEMPTS {
            return None;
        }
        self.attempts += 1;

        let verdict = if is_correct(typed, target) {
            TypingVerdict::Correct(Quality::from_typing(true, self.attempts))
        } else if self.attempts < MAX_TYPING_ATTEMPTS {
            TypingVerdict::Retry
        } else {
            TypingVerdict::Incorrect
        };
        Some(verdict)
    }
}
