//! SM-2 (SuperMemo 2) review scheduling.
//!
//! After every answer the scheduler recomputes a word's easiness factor (EF),
//! its review interval and streak:
//! - Quality 3-5 counts as a success: the streak grows and the interval grows
//!   1 day → 6 days → previous interval × EF.
//! - Quality 0-2 resets the streak and brings the interval back to 1 day.
//! - EF is updated with the unmodified SM-2 formula and never drops below 1.3.
//!
//! `Word::repetition` stores the current interval in days. How the growth step
//! picks between "1 day", "6 days" and "multiply" is chosen by [`IntervalGrowth`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ReviewUpdate, Word, LEARNED_STREAK, MIN_EASINESS, POINTS_PER_CORRECT};

/// Interval given after a miss.
pub const RESET_INTERVAL_DAYS: u32 = 1;
const FIRST_INTERVAL_DAYS: u32 = 1;
const SECOND_INTERVAL_DAYS: u32 = 6;
/// Upper bound on any interval, roughly a century.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// Recall strength on the 0-5 SM-2 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(u8);

impl Quality {
    /// Multiple choice hit, or typed correctly on the first attempt.
    pub const PERFECT: Quality = Quality(5);
    /// Typed correctly after one retry.
    pub const RETRY: Quality = Quality(4);
    pub const MISS: Quality = Quality(0);

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self.0 >= 3
    }

    pub fn from_choice(correct: bool) -> Self {
        if correct {
            Self::PERFECT
        } else {
            Self::MISS
        }
    }

    /// `attempts` counts submissions including the successful one.
    pub fn from_typing(correct: bool, attempts: u32) -> Self {
        match (correct, attempts) {
            (false, _) => Self::MISS,
            (true, 0..=1) => Self::PERFECT,
            (true, _) => Self::RETRY,
        }
    }
}

/// How the interval after a success is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntervalGrowth {
    /// The post-answer streak is the repetition index: streak 1 → 1 day,
    /// streak 2 → 6 days, afterwards previous interval × EF.
    #[default]
    StreakIndexed,
    /// The stored day count doubles as the index: 0 → 1 day, 1 → 6 days,
    /// anything else × EF. A word that lapsed back to 1 day jumps straight to 6.
    DayCountIndexed,
}

impl IntervalGrowth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StreakIndexed => "streak-indexed",
            Self::DayCountIndexed => "day-count-indexed",
        }
    }

    fn next_interval(self, previous: u32, new_streak: u32, easiness: f64) -> u32 {
        let multiply = |days: u32| {
            (f64::from(days.max(1)) * easiness)
                .round()
                .min(f64::from(MAX_INTERVAL_DAYS)) as u32
        };
        let interval = match self {
            Self::StreakIndexed => match new_streak {
                0 | 1 => FIRST_INTERVAL_DAYS,
                2 => SECOND_INTERVAL_DAYS,
                _ => multiply(previous),
            },
            Self::DayCountIndexed => match previous {
                0 => FIRST_INTERVAL_DAYS,
                1 => SECOND_INTERVAL_DAYS,
                _ => multiply(previous),
            },
        };
        interval.min(MAX_INTERVAL_DAYS)
    }
}

/// Scheduling fields computed for one answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleOutcome {
    pub next_review: DateTime<Utc>,
    pub easiness_factor: f64,
    /// Interval in days, stored as `Word::repetition`.
    pub repetition: u32,
    pub streak: u32,
    pub is_learned: bool,
}

/// Stateless SM-2 scheduler configured with an interval growth policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler {
    growth: IntervalGrowth,
}

impl Scheduler {
    pub fn new(growth: IntervalGrowth) -> Self {
        Self { growth }
    }

    pub fn growth(&self) -> IntervalGrowth {
        self.growth
    }

    /// Compute the next scheduling state for `word` answered with `quality` at `now`.
    pub fn schedule(&self, word: &Word, quality: Quality, now: DateTime<Utc>) -> ScheduleOutcome {
        let easiness_factor = next_easiness(word.easiness_factor, quality);

        let (streak, interval) = if quality.is_success() {
            let streak = word.streak.saturating_add(1);
            let interval = self
                .growth
                .next_interval(word.repetition, streak, easiness_factor);
            (streak, interval)
        } else {
            (0, RESET_INTERVAL_DAYS)
        };

        ScheduleOutcome {
            next_review: now
                .checked_add_signed(Duration::days(i64::from(interval)))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            easiness_factor,
            repetition: interval,
            streak,
            is_learned: streak >= LEARNED_STREAK,
        }
    }

    /// Full write-back for an answer: scheduling fields plus review stamp and points.
    pub fn review(&self, word: &Word, quality: Quality, now: DateTime<Utc>) -> ReviewUpdate {
        let outcome = self.schedule(word, quality, now);
        let points = if quality.is_success() {
            word.points.saturating_add(POINTS_PER_CORRECT)
        } else {
            word.points
        };

        ReviewUpdate {
            easiness_factor: outcome.easiness_factor,
            repetition: outcome.repetition,
            streak: outcome.streak,
            next_review: outcome.next_review,
            is_learned: outcome.is_learned,
            last_reviewed: now,
            points,
        }
    }

    /// Intervals in days for a perfect answer and for a miss.
    pub fn preview(&self, word: &Word, now: DateTime<Utc>) -> (u32, u32) {
        let hit = self.schedule(word, Quality::PERFECT, now).repetition;
        let miss = self.schedule(word, Quality::MISS, now).repetition;
        (hit, miss)
    }
}

fn next_easiness(current: f64, quality: Quality) -> f64 {
    let current = if current.is_finite() { current } else { 2.5 };
    let q = f64::from(quality.value());
    let ef = current + (0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02));
    ef.max(MIN_EASINESS)
}

/// Human readable interval like "1 day" or "15 days".
pub fn format_interval(days: u32) -> String {
    match days {
        0 => "today".to_string(),
        1 => "1 day".to_string(),
        d if d < 60 => format!("{} days", d),
        d if d < 730 => format!("{} months", d / 30),
        d => format!("{} years", d / 365),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{WordDraft, WordId};

    fn fresh(now: DateTime<Utc>) -> Word {
        Word::from_draft(WordId(1), WordDraft::new("laconic", "using few words"), now)
    }

    fn answer(scheduler: &Scheduler, word: &mut Word, quality: Quality, now: DateTime<Utc>) {
        let update = scheduler.review(word, quality, now);
        word.apply(crate::models::WordUpdate::Review(update), now);
    }

    #[test]
    fn test_three_correct_answers() {
        let now = Utc::now();
        let scheduler = Scheduler::default();
        let mut word = fresh(now);

        answer(&scheduler, &mut word, Quality::PERFECT, now);
        assert_eq!(word.repetition, 1);
        assert_eq!(word.streak, 1);
        assert!(!word.is_learned);
        assert_eq!(word.next_review, Some(now + Duration::days(1)));

        answer(&scheduler, &mut word, Quality::PERFECT, now);
        assert_eq!(word.repetition, 6);
        assert_eq!(word.streak, 2);

        let outcome = scheduler.schedule(&word, Quality::PERFECT, now);
        assert_eq!(outcome.repetition, (6.0 * outcome.easiness_factor).round() as u32);
        assert_eq!(outcome.streak, 3);
        assert!(!outcome.is_learned);
    }

    #[test]
    fn test_correct_then_incorrect() {
        let now = Utc::now();
        let scheduler = Scheduler::default();
        let mut word = fresh(now);

        answer(&scheduler, &mut word, Quality::PERFECT, now);
        let ef_before = word.easiness_factor;
        answer(&scheduler, &mut word, Quality::MISS, now);

        assert_eq!(word.streak, 0);
        assert_eq!(word.repetition, RESET_INTERVAL_DAYS);
        assert!(word.easiness_factor < ef_before);
        assert_eq!(word.next_review, Some(now + Duration::days(1)));
    }

    #[test]
    fn test_easiness_formula() {
        assert!((next_easiness(2.5, Quality::PERFECT) - 2.6).abs() < 1e-9);
        assert!((next_easiness(2.5, Quality::RETRY) - 2.5).abs() < 1e-9);
        assert!((next_easiness(2.5, Quality(3)) - 2.36).abs() < 1e-9);
        assert!((next_easiness(2.5, Quality::MISS) - 1.7).abs() < 1e-9);
    }

    #[test]
    fn test_easiness_floor_holds_for_every_quality() {
        let now = Utc::now();
        let scheduler = Scheduler::default();
        for q in 0..=5 {
            for start in [1.3, 1.5, 2.5, 3.4] {
                let mut word = fresh(now);
                word.easiness_factor = start;
                for _ in 0..30 {
                    answer(&scheduler, &mut word, Quality(q), now);
                    assert!(word.easiness_factor >= MIN_EASINESS);
                }
            }
        }
    }

    #[test]
    fn test_miss_resets_any_streak() {
        let now = Utc::now();
        let scheduler = Scheduler::default();
        for q in 0..3 {
            let mut word = fresh(now);
            word.streak = 17;
            word.repetition = 90;
            let outcome = scheduler.schedule(&word, Quality(q), now);
            assert_eq!(outcome.streak, 0);
            assert_eq!(outcome.repetition, RESET_INTERVAL_DAYS);
            assert!(!outcome.is_learned);
        }
    }

    #[test]
    fn test_learned_iff_streak_reaches_ten() {
        let now = Utc::now();
        let scheduler = Scheduler::default();
        let mut word = fresh(now);
        for i in 1..=12 {
            answer(&scheduler, &mut word, Quality::PERFECT, now);
            assert_eq!(word.streak, i);
            assert_eq!(word.is_learned, i >= LEARNED_STREAK);
        }
        answer(&scheduler, &mut word, Quality::MISS, now);
        assert!(!word.is_learned);
    }

    #[test]
    fn test_intervals_never_shrink_on_success() {
        let now = Utc::now();
        for growth in [IntervalGrowth::StreakIndexed, IntervalGrowth::DayCountIndexed] {
            let scheduler = Scheduler::new(growth);
            let mut word = fresh(now);
            word.easiness_factor = MIN_EASINESS;
            let mut previous = 0;
            for _ in 0..15 {
                // Quality 3 lowers EF each time; it stays pinned at the floor.
                answer(&scheduler, &mut word, Quality(3), now);
                assert!(word.repetition >= previous, "{:?}", growth);
                previous = word.repetition;
            }
        }
    }

    #[test]
    fn test_long_perfect_run_stays_bounded() {
        let now = Utc::now();
        for growth in [IntervalGrowth::StreakIndexed, IntervalGrowth::DayCountIndexed] {
            let scheduler = Scheduler::new(growth);
            let mut word = fresh(now);
            let mut previous = 0;
            for _ in 0..50 {
                answer(&scheduler, &mut word, Quality::PERFECT, now);
                assert!(word.repetition >= previous, "{:?}", growth);
                assert!(word.repetition <= MAX_INTERVAL_DAYS);
                assert!(word.next_review >= Some(now));
                previous = word.repetition;
            }
            assert_eq!(word.repetition, MAX_INTERVAL_DAYS);
        }
    }

    #[test]
    fn test_extreme_stored_values_are_scheduled() {
        let scheduler = Scheduler::default();
        let mut word = fresh(Utc::now());
        word.streak = 40;
        word.repetition = u32::MAX;
        word.easiness_factor = 1e9;

        let outcome = scheduler.schedule(&word, Quality::PERFECT, Utc::now());
        assert_eq!(outcome.repetition, MAX_INTERVAL_DAYS);

        let far_future = DateTime::<Utc>::MAX_UTC - Duration::days(10);
        let outcome = scheduler.schedule(&word, Quality::PERFECT, far_future);
        assert_eq!(outcome.next_review, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_growth_policies_diverge_after_a_lapse() {
        let now = Utc::now();
        let streak_indexed = Scheduler::new(IntervalGrowth::StreakIndexed);
        let day_count = Scheduler::new(IntervalGrowth::DayCountIndexed);

        // Both agree on a clean run.
        let mut a = fresh(now);
        let mut b = fresh(now);
        for _ in 0..3 {
            answer(&streak_indexed, &mut a, Quality::PERFECT, now);
            answer(&day_count, &mut b, Quality::PERFECT, now);
            assert_eq!(a.repetition, b.repetition);
        }

        // After a miss both land on 1 day, then the policies split.
        answer(&streak_indexed, &mut a, Quality::MISS, now);
        answer(&day_count, &mut b, Quality::MISS, now);
        assert_eq!(a.repetition, 1);
        assert_eq!(b.repetition, 1);

        answer(&streak_indexed, &mut a, Quality::PERFECT, now);
        answer(&day_count, &mut b, Quality::PERFECT, now);
        assert_eq!(a.repetition, 1);
        assert_eq!(b.repetition, 6);
    }

    #[test]
    fn test_review_stamps_and_points() {
        let now = Utc::now();
        let scheduler = Scheduler::default();
        let word = fresh(now);

        let hit = scheduler.review(&word, Quality::RETRY, now);
        assert_eq!(hit.points, POINTS_PER_CORRECT);
        assert_eq!(hit.last_reviewed, now);
        assert!(hit.next_review >= hit.last_reviewed);

        let miss = scheduler.review(&word, Quality::MISS, now);
        assert_eq!(miss.points, 0);
        assert_eq!(miss.last_reviewed, now);
    }

    #[test]
    fn test_typing_quality_mapping() {
        assert_eq!(Quality::from_typing(true, 1), Quality::PERFECT);
        assert_eq!(Quality::from_typing(true, 2), Quality::RETRY);
        assert_eq!(Quality::from_typing(false, 2), Quality::MISS);
        assert_eq!(Quality::from_choice(true), Quality::PERFECT);
    }

    #[test]
    fn test_preview() {
        let now = Utc::now();
        let scheduler = Scheduler::default();
        let mut word = fresh(now);
        word.streak = 2;
        word.repetition = 6;
        let (hit, miss) = scheduler.preview(&word, now);
        assert_eq!(hit, 16);
        assert_eq!(miss, 1);
        assert_eq!(format_interval(hit), "16 days");
    }
}
