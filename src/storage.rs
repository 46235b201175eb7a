//! Storage for words and quiz history.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::history::HistoryEntry;
use crate::models::{word_key, Word, WordDraft, WordId, WordUpdate};

/// Starter vocabulary installed on first run.
const BUNDLED_STARTER_WORDS: &str = include_str!("../bundled/starter_words.json");

const WORDS_FILE: &str = "words.json";
const HISTORY_FILE: &str = "history.json";

/// Word record store consumed by sessions and the UI.
pub trait WordRepository {
    fn list(&self) -> StoreResult<Vec<Word>>;
    fn add(&mut self, draft: WordDraft) -> StoreResult<WordId>;
    fn update(&mut self, id: WordId, update: WordUpdate) -> StoreResult<()>;
    fn delete(&mut self, id: WordId) -> StoreResult<()>;
}

/// Quiz history kept as one blob, read and written wholesale.
pub trait HistoryRepository {
    fn read(&self) -> StoreResult<Vec<HistoryEntry>>;
    fn write(&mut self, entries: &[HistoryEntry]) -> StoreResult<()>;
}

/// Get default storage location.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vocab-trainer")
}

/// On-disk layout of `words.json`.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct WordFile {
    next_id: u64,
    words: Vec<Word>,
}

/// `words.json` as read, before records are checked one by one.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWordFile {
    #[serde(default)]
    next_id: Option<u64>,
    #[serde(default)]
    words: Option<Vec<serde_json::Value>>,
}

/// Words kept in a single JSON file.
pub struct JsonWordStore {
    path: PathBuf,
}

impl JsonWordStore {
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(data_dir)?;

        let store = Self {
            path: data_dir.join(WORDS_FILE),
        };
        if !store.path.exists() {
            store.install_bundled_words()?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Seed a brand new store so there is enough vocabulary for a first quiz.
    fn install_bundled_words(&self) -> StoreResult<()> {
        let drafts: Vec<WordDraft> = serde_json::from_str(BUNDLED_STARTER_WORDS)?;
        let now = Utc::now();

        let mut file = WordFile::default();
        for draft in drafts.into_iter().filter(WordDraft::is_valid) {
            file.next_id += 1;
            file.words.push(Word::from_draft(WordId(file.next_id), draft, now));
        }

        info!(count = file.words.len(), "installed starter words");
        self.save(&file)
    }

    fn load(&self) -> StoreResult<WordFile> {
        if !self.path.exists() {
            return Ok(WordFile::default());
        }

        let json = fs::read_to_string(&self.path)?;
        let raw: RawWordFile = serde_json::from_str(&json)?;

        // A damaged record is dropped without hiding the rest of the vocabulary.
        let words: Vec<Word> = raw
            .words
            .unwrap_or_default()
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<Word>(value) {
                Ok(word) => Some(word.normalized()),
                Err(e) => {
                    warn!("skipping unreadable word record: {}", e);
                    None
                }
            })
            .collect();

        // Ids are never handed out twice, even if the counter was lost.
        let highest = words.iter().map(|w| w.id.0).max().unwrap_or(0);
        let next_id = raw.next_id.unwrap_or(0).max(highest);
        Ok(WordFile { next_id, words })
    }

    fn save(&self, file: &WordFile) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(file)?;
        write_atomic(&self.path, &json)
    }
}

impl WordRepository for JsonWordStore {
    fn list(&self) -> StoreResult<Vec<Word>> {
        Ok(self.load()?.words)
    }

    fn add(&mut self, draft: WordDraft) -> StoreResult<WordId> {
        if !draft.is_valid() {
            return Err(StoreError::Invalid("a word needs both a word and a meaning".into()));
        }

        let mut file = self.load()?;
        file.next_id += 1;
        let id = WordId(file.next_id);
        file.words.push(Word::from_draft(id, draft, Utc::now()));
        self.save(&file)?;

        info!(%id, "added word");
        Ok(id)
    }

    fn update(&mut self, id: WordId, update: WordUpdate) -> StoreResult<()> {
        let mut file = self.load()?;
        let word = file
            .words
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or(StoreError::WordNotFound(id))?;

        word.apply(update, Utc::now());
        self.save(&file)?;

        debug!(%id, "updated word");
        Ok(())
    }

    fn delete(&mut self, id: WordId) -> StoreResult<()> {
        let mut file = self.load()?;
        let before = file.words.len();
        file.words.retain(|w| w.id != id);
        if file.words.len() == before {
            return Err(StoreError::WordNotFound(id));
        }
        self.save(&file)?;

        info!(%id, "deleted word");
        Ok(())
    }
}

/// Quiz history kept in `history.json`.
pub struct JsonHistoryStore {
    path: PathBuf,
}

impl JsonHistoryStore {
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(data_dir)?;
        Ok(Self {
            path: data_dir.join(HISTORY_FILE),
        })
    }
}

impl HistoryRepository for JsonHistoryStore {
    fn read(&self) -> StoreResult<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let json = fs::read_to_string(&self.path)?;
        let raw: Vec<serde_json::Value> = serde_json::from_str(&json)?;

        // One damaged entry should not hide the rest of the history.
        let entries = raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<HistoryEntry>(value) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("skipping unreadable history entry: {}", e);
                    None
                }
            })
            .collect();
        Ok(entries)
    }

    fn write(&mut self, entries: &[HistoryEntry]) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(entries)?;
        write_atomic(&self.path, &json)
    }
}

fn write_atomic(path: &Path, contents: &str) -> StoreResult<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════
// Import / Export
// ══════════════════════════════════════════════════════════════════════════

/// What to do when an imported word already exists with different content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportPolicy {
    #[default]
    KeepExisting,
    Overwrite,
}

/// Outcome of an import.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Existing words whose content differs but were kept.
    pub conflicts: Vec<String>,
    pub invalid: usize,
}

/// Export format: content and user flags only, no ids or schedule.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedWord<'a> {
    word: &'a str,
    meaning: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    part_of_speech: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    sample_sentence: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<&'a str>,
    #[serde(skip_serializing_if = "str::is_empty")]
    mnemonic: &'a str,
    is_favorite: bool,
    is_difficult: bool,
}

/// Write every word to `path`. Returns the number exported.
pub fn export_words(store: &impl WordRepository, path: &Path) -> StoreResult<usize> {
    let words = store.list()?;
    if words.is_empty() {
        return Err(StoreError::Invalid("there are no words to export".into()));
    }

    let exported: Vec<ExportedWord> = words
        .iter()
        .map(|w| ExportedWord {
            word: &w.word,
            meaning: &w.meaning,
            part_of_speech: &w.part_of_speech,
            sample_sentence: &w.sample_sentence,
            tags: w.tags.iter().map(String::as_str).collect(),
            mnemonic: &w.mnemonic,
            is_favorite: w.is_favorite,
            is_difficult: w.is_difficult,
        })
        .collect();

    fs::write(path, serde_json::to_string_pretty(&exported)?)?;
    info!(count = exported.len(), path = %path.display(), "exported words");
    Ok(exported.len())
}

/// Merge a JSON array of words into the store, matching by word (case-insensitive).
pub fn import_words(
    store: &mut impl WordRepository,
    path: &Path,
    policy: ImportPolicy,
) -> StoreResult<ImportReport> {
    let json = fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&json)?;
    let serde_json::Value::Array(items) = value else {
        return Err(StoreError::Invalid("expected a JSON array of words".into()));
    };

    let mut existing: HashMap<String, Word> =
        store.list()?.into_iter().map(|w| (w.key(), w)).collect();
    let mut report = ImportReport::default();

    for item in items {
        let draft = match serde_json::from_value::<WordDraft>(item) {
            Ok(draft) if draft.is_valid() => draft,
            _ => {
                report.invalid += 1;
                continue;
            }
        };

        let key = word_key(&draft.word);
        match existing.get_mut(&key) {
            None => {
                let id = store.add(draft.clone())?;
                existing.insert(key, Word::from_draft(id, draft, Utc::now()));
                report.added += 1;
            }
            Some(word) if draft.same_content(word) => report.unchanged += 1,
            Some(word) => match policy {
                ImportPolicy::Overwrite => {
                    store.update(word.id, WordUpdate::Content(draft.clone()))?;
                    word.apply(WordUpdate::Content(draft), Utc::now());
                    report.updated += 1;
                }
                ImportPolicy::KeepExisting => report.conflicts.push(word.word.clone()),
            },
        }
    }

    info!(
        added = report.added,
        updated = report.updated,
        unchanged = report.unchanged,
        conflicts = report.conflicts.len(),
        invalid = report.invalid,
        "imported words"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Score;
    use tempfile::TempDir;

    fn empty_store(dir: &TempDir) -> JsonWordStore {
        let mut store = JsonWordStore::open(dir.path()).unwrap();
        for word in store.list().unwrap() {
            store.delete(word.id).unwrap();
        }
        store
    }

    #[test]
    fn test_first_open_installs_starter_words() {
        let dir = TempDir::new().unwrap();
        let store = JsonWordStore::open(dir.path()).unwrap();
        let words = store.list().unwrap();
        assert!(words.len() >= 4);
        assert!(words.iter().all(|w| w.last_reviewed.is_none()));

        // Reopening does not reinstall.
        let mut store = JsonWordStore::open(dir.path()).unwrap();
        let first = words[0].id;
        store.delete(first).unwrap();
        let reopened = JsonWordStore::open(dir.path()).unwrap();
        assert_eq!(reopened.list().unwrap().len(), words.len() - 1);
    }

    #[test]
    fn test_damaged_word_record_does_not_hide_the_rest() {
        let dir = TempDir::new().unwrap();
        let json = r#"{
            "nextId": 3,
            "words": [
                { "id": 1, "word": "stoic", "meaning": "unmoved", "easinessFactor": null },
                { "id": 2, "word": "placid", "meaning": "calm", "streak": "many" },
                { "id": 3, "word": "brusque", "meaning": "abrupt", "streak": 2 }
            ]
        }"#;
        fs::write(dir.path().join(WORDS_FILE), json).unwrap();

        let mut store = JsonWordStore::open(dir.path()).unwrap();
        let words = store.list().unwrap();
        let keys: Vec<_> = words.iter().map(Word::key).collect();
        assert_eq!(keys, vec!["stoic", "brusque"]);
        assert_eq!(words[0].easiness_factor, 2.5);

        let id = store.add(WordDraft::new("wry", "dryly humorous")).unwrap();
        assert_eq!(id, WordId(4));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let dir = TempDir::new().unwrap();
        let mut store = empty_store(&dir);
        let a = store.add(WordDraft::new("candid", "frank")).unwrap();
        store.delete(a).unwrap();
        let b = store.add(WordDraft::new("terse", "brief")).unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_add_rejects_blank_fields() {
        let dir = TempDir::new().unwrap();
        let mut store = empty_store(&dir);
        let err = store.add(WordDraft::new("lonely", "  ")).unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[test]
    fn test_update_and_missing_word() {
        let dir = TempDir::new().unwrap();
        let mut store = empty_store(&dir);
        let id = store.add(WordDraft::new("wary", "cautious")).unwrap();

        store
            .update(
                id,
                WordUpdate::Flags {
                    favorite: Some(true),
                    difficult: None,
                },
            )
            .unwrap();
        let word = store.list().unwrap().into_iter().find(|w| w.id == id).unwrap();
        assert!(word.is_favorite);
        assert!(!word.is_difficult);

        let err = store
            .update(WordId(999), WordUpdate::Content(WordDraft::new("a", "b")))
            .unwrap_err();
        assert!(matches!(err, StoreError::WordNotFound(WordId(999))));
        assert!(store.delete(WordId(999)).is_err());
    }

    #[test]
    fn test_export_strips_schedule() {
        let dir = TempDir::new().unwrap();
        let mut store = empty_store(&dir);
        store.add(WordDraft::new("ephemeral", "fleeting")).unwrap();

        let path = dir.path().join("export.json");
        assert_eq!(export_words(&store, &path).unwrap(), 1);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"meaning\": \"fleeting\""));
        for field in ["\"id\"", "streak", "lastReviewed", "nextReview"] {
            assert!(!text.contains(field), "{} leaked into export", field);
        }
    }

    #[test]
    fn test_import_merges_by_word() {
        let dir = TempDir::new().unwrap();
        let mut store = empty_store(&dir);
        store.add(WordDraft::new("Ephemeral", "fleeting")).unwrap();
        store.add(WordDraft::new("terse", "brief")).unwrap();

        let path = dir.path().join("import.json");
        fs::write(
            &path,
            r#"[
                { "word": "ephemeral ", "meaning": "fleeting" },
                { "word": "TERSE", "meaning": "sparing in words" },
                { "word": "candid", "meaning": "frank", "tags": "honesty, speech" },
                { "word": "", "meaning": "nothing" },
                42
            ]"#,
        )
        .unwrap();

        let report = import_words(&mut store, &path, ImportPolicy::KeepExisting).unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.conflicts, vec!["terse".to_string()]);
        assert_eq!(report.invalid, 2);

        let report = import_words(&mut store, &path, ImportPolicy::Overwrite).unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.unchanged, 2);

        let words = store.list().unwrap();
        assert_eq!(words.len(), 3);
        let terse = words.iter().find(|w| w.key() == "terse").unwrap();
        assert_eq!(terse.meaning, "sparing in words");
        let candid = words.iter().find(|w| w.key() == "candid").unwrap();
        assert_eq!(candid.tags.len(), 2);
    }

    #[test]
    fn test_import_rejects_non_array() {
        let dir = TempDir::new().unwrap();
        let mut store = empty_store(&dir);
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{ "word": "x" }"#).unwrap();
        assert!(matches!(
            import_words(&mut store, &path, ImportPolicy::default()),
            Err(StoreError::Invalid(_))
        ));
    }

    #[test]
    fn test_history_store_skips_damaged_entries() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonHistoryStore::open(dir.path()).unwrap();
        assert!(store.read().unwrap().is_empty());

        let entry = HistoryEntry::new(Some(Utc::now()), Score { correct: 3, total: 4 }, Vec::new());
        store.write(&[entry.clone()]).unwrap();
        assert_eq!(store.read().unwrap(), vec![entry.clone()]);

        let mut raw: Vec<serde_json::Value> =
            serde_json::from_str(&fs::read_to_string(dir.path().join(HISTORY_FILE)).unwrap())
                .unwrap();
        raw.push(serde_json::json!({ "score": "broken" }));
        fs::write(dir.path().join(HISTORY_FILE), serde_json::to_string(&raw).unwrap()).unwrap();

        assert_eq!(store.read().unwrap(), vec![entry]);
    }
}
