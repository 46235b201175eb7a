//! Picks which words a session presents and builds multiple-choice options.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::models::{Word, WordId, WordStatus};

/// Options shown for a multiple-choice question, correct answer included.
pub const OPTION_COUNT: usize = 4;

/// The three session variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    /// Graded quiz. New and due words dominate, order fully shuffled.
    Quiz,
    /// Ungraded browsing over a uniform random sample.
    Flashcards,
    /// Graded challenge that front-loads due words.
    Revision,
}

impl SessionMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Quiz => "Quiz",
            Self::Flashcards => "Flashcards",
            Self::Revision => "Revision",
        }
    }

    /// Smallest vocabulary a session of this kind can start with.
    pub fn minimum_vocabulary(&self) -> usize {
        match self {
            Self::Quiz | Self::Revision => OPTION_COUNT,
            Self::Flashcards => 1,
        }
    }

    pub fn is_graded(&self) -> bool {
        !matches!(self, Self::Flashcards)
    }

    pub fn next(&self) -> Self {
        match self {
            Self::Quiz => Self::Revision,
            Self::Revision => Self::Flashcards,
            Self::Flashcards => Self::Quiz,
        }
    }
}

/// Which side of a word is asked and which side is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    #[default]
    WordToMeaning,
    MeaningToWord,
}

impl Direction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::WordToMeaning => "word → meaning",
            Self::MeaningToWord => "meaning → word",
        }
    }

    pub fn flipped(&self) -> Self {
        match self {
            Self::WordToMeaning => Self::MeaningToWord,
            Self::MeaningToWord => Self::WordToMeaning,
        }
    }

    pub fn prompt<'a>(&self, word: &'a Word) -> &'a str {
        match self {
            Self::WordToMeaning => &word.word,
            Self::MeaningToWord => &word.meaning,
        }
    }

    /// The answer side, or `None` when the record has nothing there.
    pub fn answer<'a>(&self, word: &'a Word) -> Option<&'a str> {
        let value = match self {
            Self::WordToMeaning => word.meaning.trim(),
            Self::MeaningToWord => word.word.trim(),
        };
        (!value.is_empty()).then_some(value)
    }
}

/// Words split by schedule status.
#[derive(Debug, Default)]
pub struct Buckets<'a> {
    pub new: Vec<&'a Word>,
    pub due: Vec<&'a Word>,
    pub not_due: Vec<&'a Word>,
    pub learned: Vec<&'a Word>,
}

impl<'a> Buckets<'a> {
    /// Partition `words`, dropping repeated ids after their first occurrence.
    pub fn partition(words: &'a [Word], now: DateTime<Utc>) -> Self {
        let mut seen = HashSet::new();
        let mut buckets = Buckets::default();

        for word in words.iter().filter(|w| seen.insert(w.id)) {
            match word.status(now) {
                WordStatus::New => buckets.new.push(word),
                WordStatus::Due => buckets.due.push(word),
                WordStatus::Scheduled => buckets.not_due.push(word),
                WordStatus::Learned => buckets.learned.push(word),
            }
        }

        buckets
    }
}

/// Choose up to `limit` distinct words for a session of the given mode.
pub fn select_for_session<R>(
    words: &[Word],
    limit: usize,
    mode: SessionMode,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<Word>
where
    R: Rng + ?Sized,
{
    let buckets = Buckets::partition(words, now);

    let selected = match mode {
        SessionMode::Flashcards => {
            let mut all: Vec<&Word> = buckets
                .new
                .into_iter()
                .chain(buckets.due)
                .chain(buckets.not_due)
                .chain(buckets.learned)
                .collect();
            all.shuffle(rng);
            all.truncate(limit);
            all
        }
        SessionMode::Quiz => {
            let layers = [buckets.new, buckets.due, buckets.not_due, buckets.learned];
            let mut picked = fill_by_layers(layers, limit, rng);
            picked.shuffle(rng);
            picked
        }
        SessionMode::Revision => {
            // Order stays layered so truly due words come first.
            let layers = [buckets.due, buckets.new, buckets.not_due, buckets.learned];
            fill_by_layers(layers, limit, rng)
        }
    };

    selected.into_iter().cloned().collect()
}

/// Take each layer in turn, shuffled, until `limit` words are collected.
fn fill_by_layers<'a, R, const N: usize>(
    layers: [Vec<&'a Word>; N],
    limit: usize,
    rng: &mut R,
) -> Vec<&'a Word>
where
    R: Rng + ?Sized,
{
    let mut picked: Vec<&Word> = Vec::with_capacity(limit);
    let mut seen: HashSet<WordId> = HashSet::new();

    for mut layer in layers {
        if picked.len() >= limit {
            break;
        }
        layer.shuffle(rng);
        for word in layer {
            if picked.len() >= limit {
                break;
            }
            if seen.insert(word.id) {
                picked.push(word);
            }
        }
    }

    picked
}

/// Build up to four unique options for `correct`, in random order.
///
/// Returns fewer than four options when the vocabulary lacks distinct
/// candidates, and nothing at all when `correct` has no answer side.
pub fn generate_options<R>(
    correct: &Word,
    all_words: &[Word],
    direction: Direction,
    rng: &mut R,
) -> Vec<String>
where
    R: Rng + ?Sized,
{
    let Some(answer) = direction.answer(correct) else {
        return Vec::new();
    };

    let mut options = vec![answer.to_string()];
    let mut candidates: Vec<&str> = all_words
        .iter()
        .filter(|w| w.id != correct.id)
        .filter_map(|w| direction.answer(w))
        .collect();
    candidates.shuffle(rng);

    for candidate in candidates {
        if options.len() >= OPTION_COUNT {
            break;
        }
        if !options.iter().any(|o| o == candidate) {
            options.push(candidate.to_string());
        }
    }

    options.shuffle(rng);
    options
}

/// Narrowing applied before selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordFilter {
    pub tag: Option<String>,
    pub favorites_only: bool,
    pub difficult_only: bool,
}

impl WordFilter {
    pub fn matches(&self, word: &Word) -> bool {
        if self.favorites_only && !word.is_favorite {
            return false;
        }
        if self.difficult_only && !word.is_difficult {
            return false;
        }
        match &self.tag {
            Some(tag) => word.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)),
            None => true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tag.is_none() && !self.favorites_only && !self.difficult_only
    }
}

pub fn filter_words(words: &[Word], filter: &WordFilter) -> Vec<Word> {
    words.iter().filter(|w| filter.matches(w)).cloned().collect()
}

/// Every tag in use, sorted.
pub fn all_tags(words: &[Word]) -> Vec<String> {
    let mut tags: Vec<String> = words
        .iter()
        .flat_map(|w| w.tags.iter().cloned())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();
    tags.sort_by_key(|t| t.to_lowercase());
    tags
}

/// Same word for the whole calendar day, rotating through the vocabulary by id.
pub fn word_of_the_day(words: &[Word], date: NaiveDate) -> Option<&Word> {
    if words.is_empty() {
        return None;
    }
    let mut ordered: Vec<&Word> = words.iter().collect();
    ordered.sort_by_key(|w| w.id);
    let day = date.num_days_from_ce().unsigned_abs() as usize;
    ordered.get(day % ordered.len()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{WordDraft, LEARNED_STREAK};
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn word(id: u64, now: DateTime<Utc>) -> Word {
        Word::from_draft(
            WordId(id),
            WordDraft::new(format!("word{}", id), format!("meaning{}", id)),
            now,
        )
    }

    fn due(id: u64, now: DateTime<Utc>) -> Word {
        let mut w = word(id, now);
        w.last_reviewed = Some(now - Duration::days(3));
        w.next_review = Some(now - Duration::days(1));
        w
    }

    fn not_due(id: u64, now: DateTime<Utc>) -> Word {
        let mut w = word(id, now);
        w.last_reviewed = Some(now - Duration::days(1));
        w.next_review = Some(now + Duration::days(5));
        w
    }

    fn learned(id: u64, now: DateTime<Utc>) -> Word {
        let mut w = not_due(id, now);
        w.streak = LEARNED_STREAK;
        w.is_learned = true;
        w
    }

    fn ids(words: &[Word]) -> Vec<u64> {
        words.iter().map(|w| w.id.0).collect()
    }

    /// 2 new, 2 due, 3 not due, 3 learned.
    fn vocabulary(now: DateTime<Utc>) -> Vec<Word> {
        vec![
            learned(1, now),
            not_due(2, now),
            due(3, now),
            word(4, now),
            learned(5, now),
            not_due(6, now),
            due(7, now),
            word(8, now),
            not_due(9, now),
            learned(10, now),
        ]
    }

    #[test]
    fn test_partition() {
        let now = Utc::now();
        let words = vocabulary(now);
        let b = Buckets::partition(&words, now);
        assert_eq!(b.new.len(), 2);
        assert_eq!(b.due.len(), 2);
        assert_eq!(b.not_due.len(), 3);
        assert_eq!(b.learned.len(), 3);
    }

    #[test]
    fn test_due_boundary_is_inclusive() {
        let now = Utc::now();
        let mut w = due(1, now);
        w.next_review = Some(now);
        let words = [w];
        assert_eq!(Buckets::partition(&words, now).due.len(), 1);
    }

    #[test]
    fn test_quiz_honours_priority() {
        let now = Utc::now();
        let words = vocabulary(now);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..20 {
            let picked = select_for_session(&words, 6, SessionMode::Quiz, now, &mut rng);
            let mut got = ids(&picked);
            got.sort();
            // all new and due, plus two of the three not-due words
            for id in [3, 4, 7, 8] {
                assert!(got.contains(&id));
            }
            assert!(!got.iter().any(|id| [1, 5, 10].contains(id)));
            assert_eq!(got.len(), 6);
            got.dedup();
            assert_eq!(got.len(), 6);
        }
    }

    #[test]
    fn test_quiz_order_varies() {
        let now = Utc::now();
        let words = vocabulary(now);
        let mut rng = StdRng::seed_from_u64(11);
        let orders: HashSet<Vec<u64>> = (0..20)
            .map(|_| ids(&select_for_session(&words, 4, SessionMode::Quiz, now, &mut rng)))
            .collect();
        assert!(orders.len() > 1);
        for order in &orders {
            let mut sorted = order.clone();
            sorted.sort();
            assert_eq!(sorted, vec![3, 4, 7, 8]);
        }
    }

    #[test]
    fn test_limit_larger_than_vocabulary() {
        let now = Utc::now();
        let words: Vec<Word> = (1..=4).map(|i| word(i, now)).collect();
        let mut rng = StdRng::seed_from_u64(1);
        for mode in [SessionMode::Quiz, SessionMode::Revision, SessionMode::Flashcards] {
            let mut got = ids(&select_for_session(&words, 10, mode, now, &mut rng));
            got.sort();
            assert_eq!(got, vec![1, 2, 3, 4]);
        }
    }

    #[test]
    fn test_duplicate_ids_collapse() {
        let now = Utc::now();
        let mut words: Vec<Word> = (1..=4).map(|i| word(i, now)).collect();
        words.push(word(2, now));
        let mut rng = StdRng::seed_from_u64(3);
        let picked = select_for_session(&words, 10, SessionMode::Quiz, now, &mut rng);
        assert_eq!(picked.len(), 4);
    }

    #[test]
    fn test_revision_front_loads_due_words() {
        let now = Utc::now();
        let words = vocabulary(now);
        let mut rng = StdRng::seed_from_u64(5);

        for _ in 0..20 {
            let picked = select_for_session(&words, 10, SessionMode::Revision, now, &mut rng);
            let got = ids(&picked);
            let mut head = got[..2].to_vec();
            head.sort();
            assert_eq!(head, vec![3, 7]);
            let mut next = got[2..4].to_vec();
            next.sort();
            assert_eq!(next, vec![4, 8]);
            assert!(got[7..].iter().all(|id| [1, 5, 10].contains(id)));
        }
    }

    #[test]
    fn test_flashcards_sample_everything() {
        let now = Utc::now();
        let words = vocabulary(now);
        let mut rng = StdRng::seed_from_u64(9);
        let mut seen = HashSet::new();
        for _ in 0..50 {
            for w in select_for_session(&words, 3, SessionMode::Flashcards, now, &mut rng) {
                seen.insert(w.id.0);
            }
        }
        // learned words are reachable too
        assert!(seen.contains(&1) || seen.contains(&5) || seen.contains(&10));
        assert!(seen.len() > 6);
    }

    #[test]
    fn test_options_are_unique_and_contain_answer_once() {
        let now = Utc::now();
        let mut words = vocabulary(now);
        // Duplicate meaning must not show up twice.
        words[1].meaning = words[2].meaning.clone();
        let mut rng = StdRng::seed_from_u64(2);

        for target in &words {
            for direction in [Direction::WordToMeaning, Direction::MeaningToWord] {
                let options = generate_options(target, &words, direction, &mut rng);
                assert_eq!(options.len(), OPTION_COUNT);
                let answer = direction.answer(target).unwrap();
                assert_eq!(options.iter().filter(|o| *o == answer).count(), 1);
                let unique: HashSet<&String> = options.iter().collect();
                assert_eq!(unique.len(), OPTION_COUNT);
            }
        }
    }

    #[test]
    fn test_options_with_small_vocabulary() {
        let now = Utc::now();
        let words: Vec<Word> = (1..=3).map(|i| word(i, now)).collect();
        let mut rng = StdRng::seed_from_u64(4);
        let options = generate_options(&words[0], &words, Direction::WordToMeaning, &mut rng);
        assert_eq!(options.len(), 3);
    }

    #[test]
    fn test_options_skip_records_without_answer_side() {
        let now = Utc::now();
        let mut words: Vec<Word> = (1..=5).map(|i| word(i, now)).collect();
        words[1].meaning.clear();
        words[2].meaning = "   ".to_string();
        let mut rng = StdRng::seed_from_u64(8);

        let options = generate_options(&words[0], &words, Direction::WordToMeaning, &mut rng);
        assert_eq!(options.len(), 3);
        assert!(options.iter().all(|o| !o.trim().is_empty()));

        let empty = generate_options(&words[1], &words, Direction::WordToMeaning, &mut rng);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_answer_position_moves() {
        let now = Utc::now();
        let words = vocabulary(now);
        let mut rng = StdRng::seed_from_u64(21);
        let positions: HashSet<usize> = (0..40)
            .map(|_| {
                let options =
                    generate_options(&words[0], &words, Direction::WordToMeaning, &mut rng);
                options.iter().position(|o| o == "meaning1").unwrap()
            })
            .collect();
        assert!(positions.len() > 1);
    }

    #[test]
    fn test_filter() {
        let now = Utc::now();
        let mut words = vocabulary(now);
        words[0].tags.insert("Travel".to_string());
        words[1].is_favorite = true;
        words[1].tags.insert("travel".to_string());

        let by_tag = WordFilter {
            tag: Some("travel".to_string()),
            ..Default::default()
        };
        assert_eq!(filter_words(&words, &by_tag).len(), 2);

        let favorites = WordFilter {
            tag: Some("travel".to_string()),
            favorites_only: true,
            ..Default::default()
        };
        assert_eq!(ids(&filter_words(&words, &favorites)), vec![2]);
        assert_eq!(all_tags(&words), vec!["Travel".to_string(), "travel".to_string()]);
    }

    #[test]
    fn test_word_of_the_day_is_stable_per_day() {
        let now = Utc::now();
        let words = vocabulary(now);
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let first = word_of_the_day(&words, today).map(|w| w.id);
        assert_eq!(first, word_of_the_day(&words, today).map(|w| w.id));
        let tomorrow = today.succ_opt().unwrap();
        assert_ne!(first, word_of_the_day(&words, tomorrow).map(|w| w.id));
        assert!(word_of_the_day(&[], today).is_none());
    }
}
