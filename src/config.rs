//! Configuration persistence for the vocabulary trainer.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::history::DEFAULT_RETENTION_DAYS;
use crate::selector::Direction;
use crate::session::QuestionFormat;
use crate::sm2::IntervalGrowth;

/// Session sizes offered on the setup screen.
pub const QUIZ_LIMITS: [usize; 4] = [5, 10, 20, 30];

/// Application configuration that persists between sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// The currently selected theme name.
    #[serde(default = "default_theme")]
    pub theme: String,

    #[serde(default = "default_quiz_limit")]
    pub quiz_limit: usize,

    /// How long answer feedback stays up before moving on.
    #[serde(default = "default_feedback_delay")]
    pub feedback_delay_ms: u64,

    #[serde(default = "default_retention")]
    pub history_retention_days: u32,

    #[serde(default)]
    pub interval_growth: IntervalGrowth,

    #[serde(default)]
    pub direction: Direction,

    #[serde(default)]
    pub question_format: QuestionFormat,
}

fn default_theme() -> String {
    "default".to_string()
}

fn default_quiz_limit() -> usize {
    10
}

fn default_feedback_delay() -> u64 {
    3200
}

fn default_retention() -> u32 {
    DEFAULT_RETENTION_DAYS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            quiz_limit: default_quiz_limit(),
            feedback_delay_ms: default_feedback_delay(),
            history_retention_days: default_retention(),
            interval_growth: IntervalGrowth::default(),
            direction: Direction::default(),
            question_format: QuestionFormat::default(),
        }
    }
}

impl Config {
    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vocab-trainer")
            .join("config.toml")
    }

    /// Load config from disk, returning default if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(content).with_context(|| "Failed to parse config file")?;
        config.quiz_limit = config
            .quiz_limit
            .clamp(QUIZ_LIMITS[0], QUIZ_LIMITS[QUIZ_LIMITS.len() - 1]);
        Ok(config)
    }

    /// Save config to disk.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }
}

/// Next offered session size after `current`, wrapping around.
pub fn next_quiz_limit(current: usize) -> usize {
    QUIZ_LIMITS
        .iter()
        .copied()
        .find(|&l| l > current)
        .unwrap_or(QUIZ_LIMITS[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = Config::parse("theme = \"kanagawa-wave\"\n").unwrap();
        assert_eq!(config.theme, "kanagawa-wave");
        assert_eq!(config.quiz_limit, 10);
        assert_eq!(config.feedback_delay_ms, 3200);
        assert_eq!(config.history_retention_days, 30);
        assert_eq!(config.interval_growth, IntervalGrowth::StreakIndexed);
    }

    #[test]
    fn test_enum_fields_and_clamp() {
        let config = Config::parse(
            "quiz_limit = 500\ninterval_growth = \"day-count-indexed\"\ndirection = \"meaning-to-word\"\nquestion_format = \"typing\"\n",
        )
        .unwrap();
        assert_eq!(config.quiz_limit, 30);
        assert_eq!(config.interval_growth, IntervalGrowth::DayCountIndexed);
        assert_eq!(config.direction, Direction::MeaningToWord);
        assert_eq!(config.question_format, QuestionFormat::Typing);

        assert_eq!(Config::parse("quiz_limit = 1").unwrap().quiz_limit, 5);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());

        let mut config = Config::default();
        config.quiz_limit = 20;
        config.theme = "kanagawa-wave".into();
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_quiz_limit_cycle() {
        assert_eq!(next_quiz_limit(10), 20);
        assert_eq!(next_quiz_limit(7), 10);
        assert_eq!(next_quiz_limit(30), 5);
    }
}
