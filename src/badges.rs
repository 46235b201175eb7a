//! Achievements earned from the vocabulary and quiz history.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};

use crate::history::HistoryEntry;
use crate::models::Word;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Badge {
    FirstStep,
    WordCollector,
    DedicatedLearner,
    QuizWhiz,
    WordMaster,
}

impl Badge {
    pub const ALL: [Badge; 5] = [
        Badge::FirstStep,
        Badge::WordCollector,
        Badge::DedicatedLearner,
        Badge::QuizWhiz,
        Badge::WordMaster,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::FirstStep => "First Step",
            Self::WordCollector => "Word Collector",
            Self::DedicatedLearner => "Dedicated Learner",
            Self::QuizWhiz => "Quiz Whiz",
            Self::WordMaster => "Word Master",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::FirstStep => "Add your first word.",
            Self::WordCollector => "Add 10 words.",
            Self::DedicatedLearner => "Complete a quiz for 3 consecutive days.",
            Self::QuizWhiz => "Score 100% on a quiz.",
            Self::WordMaster => "Learn 25 words.",
        }
    }
}

/// Calendar day of a timestamp in the user's time zone.
pub fn local_day(date: DateTime<Utc>) -> NaiveDate {
    date.with_timezone(&Local).date_naive()
}

/// Every badge paired with whether it is earned.
pub fn evaluate(words: &[Word], history: &[HistoryEntry], today: NaiveDate) -> Vec<(Badge, bool)> {
    let learned = words.iter().filter(|w| w.is_learned).count();
    let days: HashSet<NaiveDate> = history.iter().filter_map(|e| e.date).map(local_day).collect();

    Badge::ALL
        .iter()
        .map(|&badge| {
            let earned = match badge {
                Badge::FirstStep => !words.is_empty(),
                Badge::WordCollector => words.len() >= 10,
                Badge::DedicatedLearner => {
                    (0..3).all(|back| days.contains(&(today - Duration::days(back))))
                }
                Badge::QuizWhiz => history.iter().any(|e| e.score.is_perfect()),
                Badge::WordMaster => learned >= 25,
            };
            (badge, earned)
        })
        .collect()
}
