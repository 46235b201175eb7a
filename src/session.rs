//! Session controller: drives one quiz, revision or flashcard run.
//!
//! Graded sessions move through `Answering → Feedback → (next question | Complete)`.
//! Flashcard sessions stay in `Answering` and flip between faces until the last
//! card is passed. The controller owns a local snapshot of every word it asks,
//! so a failed write never disturbs the run in progress.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{SessionError, StoreError};
use crate::history::{HistoryEntry, QuizResult, Score};
use crate::judge::{TypingAttempt, TypingVerdict};
use crate::models::{Word, WordUpdate};
use crate::selector::{self, Direction, SessionMode, WordFilter};
use crate::sm2::{Quality, Scheduler};
use crate::storage::WordRepository;

/// How graded questions are answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionFormat {
    #[default]
    MultipleChoice,
    /// Meaning is shown, the word has to be typed.
    Typing,
}

impl QuestionFormat {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "Multiple choice",
            Self::Typing => "Typing",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Self::MultipleChoice => Self::Typing,
            Self::Typing => Self::MultipleChoice,
        }
    }
}

/// Everything chosen on the setup screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSetup {
    pub mode: SessionMode,
    pub format: QuestionFormat,
    pub direction: Direction,
    pub limit: usize,
    pub filter: WordFilter,
}

impl Default for SessionSetup {
    fn default() -> Self {
        Self {
            mode: SessionMode::Quiz,
            format: QuestionFormat::MultipleChoice,
            direction: Direction::WordToMeaning,
            limit: 10,
            filter: WordFilter::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Answering,
    Feedback { correct: bool },
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    Front,
    Back,
}

/// What happened after an answer was submitted.
#[derive(Debug)]
pub struct AnswerOutcome {
    pub correct: bool,
    /// Typing only: wrong, but one more attempt is allowed.
    pub retry: bool,
    pub quality: Option<Quality>,
    /// Set when the word store rejected the write. The session carries on.
    pub write_error: Option<StoreError>,
}

pub struct Session {
    setup: SessionSetup,
    scheduler: Scheduler,
    questions: Vec<Word>,
    options: Vec<Vec<String>>,
    index: usize,
    phase: Phase,
    face: Face,
    typing: TypingAttempt,
    results: Vec<QuizResult>,
    last_answer: Option<String>,
}

impl Session {
    /// Select words and prepare every question.
    ///
    /// The vocabulary check runs before any selection or scheduling work.
    pub fn start<R>(
        words: &[Word],
        mut setup: SessionSetup,
        scheduler: Scheduler,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Self, SessionError>
    where
        R: Rng + ?Sized,
    {
        let candidates = selector::filter_words(words, &setup.filter);
        let available = {
            let mut ids: Vec<_> = candidates.iter().map(|w| w.id).collect();
            ids.sort();
            ids.dedup();
            ids.len()
        };
        let required = setup.mode.minimum_vocabulary();
        if available < required {
            return Err(SessionError::InsufficientVocabulary {
                required,
                available,
            });
        }

        if setup.mode.is_graded() && setup.format == QuestionFormat::Typing {
            setup.direction = Direction::MeaningToWord;
        }

        let mut questions =
            selector::select_for_session(&candidates, setup.limit.max(1), setup.mode, now, rng);
        // Records without an answer side cannot be asked.
        questions.retain(|w| setup.direction.answer(w).is_some());
        if questions.is_empty() {
            return Err(SessionError::InsufficientVocabulary {
                required,
                available: 0,
            });
        }

        let options = if setup.mode.is_graded() && setup.format == QuestionFormat::MultipleChoice {
            questions
                .iter()
                .map(|q| selector::generate_options(q, words, setup.direction, rng))
                .collect()
        } else {
            vec![Vec::new(); questions.len()]
        };

        info!(
            mode = setup.mode.name(),
            format = setup.format.name(),
            questions = questions.len(),
            "session started"
        );

        Ok(Self {
            setup,
            scheduler,
            questions,
            options,
            index: 0,
            phase: Phase::Answering,
            face: Face::Front,
            typing: TypingAttempt::new(),
            results: Vec::new(),
            last_answer: None,
        })
    }

    pub fn setup(&self) -> &SessionSetup {
        &self.setup
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn face(&self) -> Face {
        self.face
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    pub fn current(&self) -> Option<&Word> {
        match self.phase {
            Phase::Complete => None,
            _ => self.questions.get(self.index),
        }
    }

    pub fn prompt(&self) -> Option<&str> {
        self.current().map(|w| self.setup.direction.prompt(w))
    }

    pub fn expected_answer(&self) -> Option<&str> {
        self.current().and_then(|w| self.setup.direction.answer(w))
    }

    pub fn options(&self) -> &[String] {
        match self.phase {
            Phase::Complete => &[],
            _ => self.options.get(self.index).map(Vec::as_slice).unwrap_or(&[]),
        }
    }

    /// 1-based position and total.
    pub fn progress(&self) -> (usize, usize) {
        let total = self.questions.len();
        ((self.index + 1).min(total), total)
    }

    pub fn results(&self) -> &[QuizResult] {
        &self.results
    }

    pub fn last_answer(&self) -> Option<&str> {
        self.last_answer.as_deref()
    }

    pub fn typing_attempts(&self) -> u32 {
        self.typing.attempts()
    }

    pub fn score(&self) -> Score {
        Score {
            correct: self.results.iter().filter(|r| r.is_correct).count(),
            total: self.results.len(),
        }
    }

    fn ensure_answering(&self, format: QuestionFormat) -> Result<(), SessionError> {
        match self.phase {
            Phase::Complete => Err(SessionError::Finished),
            Phase::Feedback { .. } => Err(SessionError::NotAnswering),
            Phase::Answering if !self.setup.mode.is_graded() || self.setup.format != format => {
                Err(SessionError::NotAnswering)
            }
            Phase::Answering => Ok(()),
        }
    }

    /// Answer a multiple-choice question with the option at `choice`.
    pub fn choose(
        &mut self,
        choice: usize,
        store: &mut dyn WordRepository,
        now: DateTime<Utc>,
    ) -> Result<AnswerOutcome, SessionError> {
        self.ensure_answering(QuestionFormat::MultipleChoice)?;

        let selected = self
            .options()
            .get(choice)
            .cloned()
            .ok_or(SessionError::InvalidChoice(choice))?;
        let correct = self.expected_answer() == Some(selected.as_str());

        Ok(self.grade(Quality::from_choice(correct), selected, store, now))
    }

    /// Submit a typed answer. The first miss only asks for a retry.
    pub fn submit_typed(
        &mut self,
        typed: &str,
        store: &mut dyn WordRepository,
        now: DateTime<Utc>,
    ) -> Result<AnswerOutcome, SessionError> {
        self.ensure_answering(QuestionFormat::Typing)?;

        let target = self.expected_answer().unwrap_or_default().to_string();
        let verdict = self
            .typing
            .submit(typed, &target)
            .ok_or(SessionError::BlankAnswer)?;

        match verdict {
            TypingVerdict::Retry => {
                self.last_answer = Some(typed.trim().to_string());
                Ok(AnswerOutcome {
                    correct: false,
                    retry: true,
                    quality: None,
                    write_error: None,
                })
            }
            TypingVerdict::Correct(quality) => {
                Ok(self.grade(quality, typed.trim().to_string(), store, now))
            }
            TypingVerdict::Incorrect => {
                Ok(self.grade(Quality::MISS, typed.trim().to_string(), store, now))
            }
        }
    }

    fn grade(
        &mut self,
        quality: Quality,
        selected: String,
        store: &mut dyn WordRepository,
        now: DateTime<Utc>,
    ) -> AnswerOutcome {
        let correct = quality.is_success();
        let word = &mut self.questions[self.index];
        let snapshot = word.clone();

        let update = self.scheduler.review(word, quality, now);
        word.apply(WordUpdate::Review(update.clone()), now);

        let write_error = store.update(word.id, WordUpdate::Review(update)).err();
        if let Some(ref e) = write_error {
            warn!(id = %word.id, "could not save review: {}", e);
        }

        self.results.push(QuizResult {
            word: snapshot,
            selected_answer: selected.clone(),
            is_correct: correct,
        });
        self.last_answer = Some(selected);
        self.phase = Phase::Feedback { correct };

        AnswerOutcome {
            correct,
            retry: false,
            quality: Some(quality),
            write_error,
        }
    }

    /// Leave the feedback phase: next question or completion.
    pub fn advance(&mut self) -> Result<Phase, SessionError> {
        match self.phase {
            Phase::Complete => Err(SessionError::Finished),
            Phase::Answering => Err(SessionError::AwaitingAnswer),
            Phase::Feedback { .. } => Ok(self.move_next()),
        }
    }

    fn move_next(&mut self) -> Phase {
        self.index += 1;
        self.face = Face::Front;
        self.typing = TypingAttempt::new();
        self.last_answer = None;

        self.phase = if self.index >= self.questions.len() {
            info!(
                mode = self.setup.mode.name(),
                correct = self.score().correct,
                total = self.score().total,
                "session complete"
            );
            Phase::Complete
        } else {
            Phase::Answering
        };
        self.phase
    }

    pub fn flip(&mut self) -> Result<Face, SessionError> {
        self.ensure_flashcards()?;
        self.face = match self.face {
            Face::Front => Face::Back,
            Face::Back => Face::Front,
        };
        Ok(self.face)
    }

    pub fn next_card(&mut self) -> Result<Phase, SessionError> {
        self.ensure_flashcards()?;
        Ok(self.move_next())
    }

    pub fn previous_card(&mut self) -> Result<(), SessionError> {
        self.ensure_flashcards()?;
        self.index = self.index.saturating_sub(1);
        self.face = Face::Front;
        Ok(())
    }

    fn ensure_flashcards(&self) -> Result<(), SessionError> {
        if self.setup.mode.is_graded() {
            return Err(SessionError::NotFlashcards);
        }
        if self.phase == Phase::Complete {
            return Err(SessionError::Finished);
        }
        Ok(())
    }

    /// History entry for a completed graded session.
    pub fn finish_entry(&self, now: DateTime<Utc>) -> Option<HistoryEntry> {
        if !self.is_complete() || !self.setup.mode.is_graded() || self.results.is_empty() {
            return None;
        }
        let entry = HistoryEntry::new(Some(now), self.score(), self.results.clone());
        Some(entry.with_mode(self.setup.mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreResult;
    use crate::models::{WordDraft, WordId, DEFAULT_EASINESS, POINTS_PER_CORRECT};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[derive(Default)]
    struct MemoryStore {
        words: Vec<Word>,
    }

    impl WordRepository for MemoryStore {
        fn list(&self) -> StoreResult<Vec<Word>> {
            Ok(self.words.clone())
        }

        fn add(&mut self, draft: WordDraft) -> StoreResult<WordId> {
            let id = WordId(self.words.len() as u64 + 1);
            self.words.push(Word::from_draft(id, draft, Utc::now()));
            Ok(id)
        }

        fn update(&mut self, id: WordId, update: WordUpdate) -> StoreResult<()> {
            let word = self
                .words
                .iter_mut()
                .find(|w| w.id == id)
                .ok_or(StoreError::WordNotFound(id))?;
            word.apply(update, Utc::now());
            Ok(())
        }

        fn delete(&mut self, id: WordId) -> StoreResult<()> {
            self.words.retain(|w| w.id != id);
            Ok(())
        }
    }

    struct FailingStore;

    impl WordRepository for FailingStore {
        fn list(&self) -> StoreResult<Vec<Word>> {
            Ok(Vec::new())
        }

        fn add(&mut self, _draft: WordDraft) -> StoreResult<WordId> {
            Err(StoreError::Invalid("read-only".into()))
        }

        fn update(&mut self, _id: WordId, _update: WordUpdate) -> StoreResult<()> {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }

        fn delete(&mut self, _id: WordId) -> StoreResult<()> {
            Err(StoreError::Invalid("read-only".into()))
        }
    }

    fn store_with(count: usize) -> MemoryStore {
        let mut store = MemoryStore::default();
        for i in 0..count {
            store
                .add(WordDraft::new(format!("word{}", i), format!("meaning{}", i)))
                .unwrap();
        }
        store
    }

    fn setup(mode: SessionMode, format: QuestionFormat) -> SessionSetup {
        SessionSetup {
            mode,
            format,
            ..Default::default()
        }
    }

    fn start(store: &MemoryStore, setup: SessionSetup) -> Result<Session, SessionError> {
        let mut rng = StdRng::seed_from_u64(42);
        Session::start(&store.words, setup, Scheduler::default(), Utc::now(), &mut rng)
    }

    fn correct_index(session: &Session) -> usize {
        let answer = session.expected_answer().unwrap();
        session.options().iter().position(|o| o == answer).unwrap()
    }

    #[test]
    fn test_quiz_needs_four_words() {
        let store = store_with(3);
        let err = start(&store, setup(SessionMode::Quiz, QuestionFormat::MultipleChoice))
            .err()
            .unwrap();
        assert_eq!(
            err,
            SessionError::InsufficientVocabulary {
                required: 4,
                available: 3
            }
        );
        assert!(start(&store, setup(SessionMode::Revision, QuestionFormat::Typing)).is_err());
        assert!(start(&store, setup(SessionMode::Flashcards, QuestionFormat::default())).is_ok());
        let empty = MemoryStore::default();
        assert!(start(&empty, setup(SessionMode::Flashcards, QuestionFormat::default())).is_err());
    }

    #[test]
    fn test_limit_beyond_vocabulary() {
        let store = store_with(4);
        let session = start(&store, setup(SessionMode::Quiz, QuestionFormat::MultipleChoice))
            .unwrap();
        assert_eq!(session.progress(), (1, 4));
        assert_eq!(session.options().len(), 4);
    }

    #[test]
    fn test_multiple_choice_run() {
        let mut store = store_with(5);
        let mut session = start(&store, setup(SessionMode::Quiz, QuestionFormat::MultipleChoice))
            .unwrap();
        let total = session.progress().1;

        let first = session.current().unwrap().id;
        let outcome = session.choose(correct_index(&session), &mut store, Utc::now()).unwrap();
        assert!(outcome.correct);
        assert!(outcome.write_error.is_none());
        assert_eq!(session.phase(), Phase::Feedback { correct: true });
        assert!(session.choose(0, &mut store, Utc::now()).is_err());

        let saved = store.words.iter().find(|w| w.id == first).unwrap();
        assert_eq!(saved.streak, 1);
        assert_eq!(saved.points, POINTS_PER_CORRECT);
        assert!(saved.last_reviewed.is_some());

        session.advance().unwrap();
        for _ in 1..total {
            let wrong = (correct_index(&session) + 1) % session.options().len();
            let outcome = session.choose(wrong, &mut store, Utc::now()).unwrap();
            assert!(!outcome.correct);
            session.advance().unwrap();
        }

        assert!(session.is_complete());
        assert_eq!(session.advance(), Err(SessionError::Finished));
        let entry = session.finish_entry(Utc::now()).unwrap();
        assert_eq!(entry.score, Score { correct: 1, total });
        assert_eq!(entry.results.len(), total);
        // Results hold the word as it was asked.
        assert_eq!(entry.results[0].word.streak, 0);
        assert_eq!(entry.mode, Some(SessionMode::Quiz));
    }

    #[test]
    fn test_invalid_choice_and_early_advance() {
        let mut store = store_with(4);
        let mut session = start(&store, setup(SessionMode::Quiz, QuestionFormat::MultipleChoice))
            .unwrap();
        assert_eq!(session.advance(), Err(SessionError::AwaitingAnswer));
        assert!(matches!(
            session.choose(9, &mut store, Utc::now()),
            Err(SessionError::InvalidChoice(9))
        ));
    }

    #[test]
    fn test_typing_retry_gives_quality_four() {
        let mut store = store_with(4);
        let mut session = start(&store, setup(SessionMode::Quiz, QuestionFormat::Typing)).unwrap();
        assert!(session.options().is_empty());
        assert_eq!(session.setup().direction, Direction::MeaningToWord);

        let id = session.current().unwrap().id;
        let target = session.expected_answer().unwrap().to_uppercase();

        assert!(matches!(
            session.submit_typed("  ", &mut store, Utc::now()),
            Err(SessionError::BlankAnswer)
        ));
        let first = session.submit_typed("nope", &mut store, Utc::now()).unwrap();
        assert!(first.retry);
        assert_eq!(session.phase(), Phase::Answering);

        let second = session.submit_typed(&format!(" {} ", target), &mut store, Utc::now())
            .unwrap();
        assert!(second.correct);
        assert_eq!(second.quality, Some(Quality::RETRY));

        let saved = store.words.iter().find(|w| w.id == id).unwrap();
        assert_eq!(saved.streak, 1);
        assert!((saved.easiness_factor - DEFAULT_EASINESS).abs() < 1e-9);
    }

    #[test]
    fn test_typing_two_misses() {
        let mut store = store_with(4);
        let mut session = start(&store, setup(SessionMode::Revision, QuestionFormat::Typing))
            .unwrap();
        session.submit_typed("a", &mut store, Utc::now()).unwrap();
        let outcome = session.submit_typed("b", &mut store, Utc::now()).unwrap();
        assert!(!outcome.correct);
        assert_eq!(outcome.quality, Some(Quality::MISS));
        assert_eq!(session.phase(), Phase::Feedback { correct: false });
        session.advance().unwrap();
        assert_eq!(session.typing_attempts(), 0);
    }

    #[test]
    fn test_failed_write_keeps_session_going() {
        let store = store_with(4);
        let mut session = start(&store, setup(SessionMode::Quiz, QuestionFormat::MultipleChoice))
            .unwrap();
        let mut failing = FailingStore;

        let outcome = session.choose(correct_index(&session), &mut failing, Utc::now()).unwrap();
        assert!(outcome.correct);
        assert!(matches!(outcome.write_error, Some(StoreError::Io(_))));
        // Local snapshot still moved on.
        assert_eq!(session.current().unwrap().streak, 1);
        assert_eq!(session.advance(), Ok(Phase::Answering));
    }

    #[test]
    fn test_flashcards() {
        let mut store = store_with(2);
        let mut session = start(&store, setup(SessionMode::Flashcards, QuestionFormat::default()))
            .unwrap();
        assert!(matches!(
            session.choose(0, &mut store, Utc::now()),
            Err(SessionError::NotAnswering)
        ));
        assert_eq!(session.flip(), Ok(Face::Back));
        assert_eq!(session.next_card(), Ok(Phase::Answering));
        assert_eq!(session.face(), Face::Front);
        session.previous_card().unwrap();
        assert_eq!(session.progress(), (1, 2));
        session.next_card().unwrap();
        assert_eq!(session.next_card(), Ok(Phase::Complete));
        assert!(session.finish_entry(Utc::now()).is_none());
        // Flashcards never touch the schedule.
        assert!(store.words.iter().all(|w| w.last_reviewed.is_none()));
    }

    #[test]
    fn test_flip_only_for_flashcards() {
        let store = store_with(4);
        let mut session = start(&store, setup(SessionMode::Quiz, QuestionFormat::MultipleChoice))
            .unwrap();
        assert_eq!(session.flip(), Err(SessionError::NotFlashcards));
    }

    #[test]
    fn test_filter_applies_before_vocabulary_check() {
        let mut store = store_with(6);
        for w in store.words.iter_mut().take(2) {
            w.tags.insert("travel".to_string());
        }
        let mut s = setup(SessionMode::Quiz, QuestionFormat::MultipleChoice);
        s.filter.tag = Some("travel".to_string());
        assert_eq!(
            start(&store, s).err(),
            Some(SessionError::InsufficientVocabulary {
                required: 4,
                available: 2
            })
        );
    }
}
