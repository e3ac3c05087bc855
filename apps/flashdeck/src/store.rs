//! Deck persistence.
//!
//! Every backend stores one unit per deck and overwrites it atomically:
//! a reader sees either the previous deck or the new one, never a mix.

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{StorageError, StorageResult};
use crate::models::{Card, Deck};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Extension of deck files written by [`FileStore`].
pub const DECK_EXTENSION: &str = "dck";

const FORMAT_VERSION: u32 = 1;

/// Durable mapping from deck name to deck.
pub trait DeckStore {
    /// Backend name for diagnostics.
    fn name(&self) -> &str;

    /// Load a deck; `Ok(None)` when no deck with that name exists.
    fn load(&self, name: &str) -> StorageResult<Option<Deck>>;

    /// Persist the full state of `deck` under its name.
    fn save(&self, deck: &Deck) -> StorageResult<()>;

    /// Remove a deck. Returns whether anything was removed.
    fn delete(&self, name: &str) -> StorageResult<bool>;

    /// Names of all stored decks, sorted.
    fn list(&self) -> StorageResult<Vec<String>>;

    fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.load(name)?.is_some())
    }
}

/// On-disk JSON document for one deck.
#[derive(Debug, Serialize, Deserialize)]
struct DeckDocument {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    name: String,
    #[serde(default)]
    cards: Vec<Card>,
}

fn default_version() -> u32 {
    FORMAT_VERSION
}

impl DeckDocument {
    fn from_deck(deck: &Deck) -> Self {
        Self {
            version: FORMAT_VERSION,
            saved_at: Some(Utc::now()),
            name: deck.name.clone(),
            cards: deck.cards.clone(),
        }
    }

    fn into_deck(self) -> StorageResult<Deck> {
        if self.version > FORMAT_VERSION {
            return Err(StorageError::Corrupt(format!(
                "unsupported deck format version {}",
                self.version
            )));
        }
        Ok(Deck {
            name: self.name,
            cards: self.cards,
        })
    }
}

fn write_document<W: Write>(writer: W, deck: &Deck) -> StorageResult<()> {
    serde_json::to_writer_pretty(writer, &DeckDocument::from_deck(deck))?;
    Ok(())
}

/// Write `deck` to a temporary file next to `path`, ready to be persisted.
fn write_temp(path: &Path, deck: &Deck) -> StorageResult<NamedTempFile> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    write_document(&mut tmp, deck)?;
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

/// Replace `path` with `deck` in a single rename.
fn write_atomic(path: &Path, deck: &Deck) -> StorageResult<()> {
    write_temp(path, deck)?.persist(path)?;
    Ok(())
}

/// Read a deck document from any path (used for import).
pub fn read_deck_file(path: &Path) -> StorageResult<Deck> {
    let content = fs::read_to_string(path)?;
    let document: DeckDocument = serde_json::from_str(&content)?;
    document.into_deck()
}

/// Write a deck document to a new file (used for export).
pub fn write_deck_file(path: &Path, deck: &Deck) -> StorageResult<()> {
    match write_temp(path, deck)?.persist_noclobber(path) {
        Ok(_) => Ok(()),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
            Err(StorageError::Exists(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

/// One JSON file per deck in a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Storage key for a deck name.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, DECK_EXTENSION))
    }
}

impl DeckStore for FileStore {
    fn name(&self) -> &str {
        "json"
    }

    fn load(&self, name: &str) -> StorageResult<Option<Deck>> {
        let path = self.path_for(name);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(deck = name, "no deck file");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let document: DeckDocument = serde_json::from_str(&content)?;
        let mut deck = document.into_deck()?;
        // The file name is the storage key, not the name inside the document.
        if deck.name != name {
            warn!(deck = name, stored_name = %deck.name, "deck file name differs from stored name");
            deck.name = name.to_string();
        }
        debug!(deck = name, cards = deck.len(), "loaded deck file");
        Ok(Some(deck))
    }

    fn save(&self, deck: &Deck) -> StorageResult<()> {
        let path = self.path_for(&deck.name);
        write_atomic(&path, deck)?;
        debug!(deck = %deck.name, cards = deck.len(), path = %path.display(), "saved deck file");
        Ok(())
    }

    fn delete(&self, name: &str) -> StorageResult<bool> {
        match fs::remove_file(self.path_for(name)) {
            Ok(()) => {
                info!(deck = name, "deleted deck file");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DECK_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// All decks in a single SQLite database.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> StorageResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS decks (
                name TEXT PRIMARY KEY,
                saved_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS cards (
                deck_name TEXT NOT NULL REFERENCES decks(name),
                position INTEGER NOT NULL,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                understood INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (deck_name, position)
            );
            "#,
        )?;
        Ok(())
    }
}

impl DeckStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn load(&self, name: &str) -> StorageResult<Option<Deck>> {
        let found: Option<String> = self
            .conn
            .query_row("SELECT name FROM decks WHERE name = ?1", params![name], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(name) = found else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT position, question, answer, understood FROM cards
             WHERE deck_name = ?1 ORDER BY position",
        )?;
        let rows = stmt
            .query_map(params![name], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    Card {
                        question: row.get(1)?,
                        answer: row.get(2)?,
                        understood: row.get(3)?,
                    },
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut cards = Vec::with_capacity(rows.len());
        for (expected, (position, card)) in rows.into_iter().enumerate() {
            if position != expected as i64 {
                return Err(StorageError::Corrupt(format!(
                    "deck '{}' has a gap at card position {}",
                    name, expected
                )));
            }
            cards.push(card);
        }
        debug!(deck = %name, cards = cards.len(), "loaded deck rows");
        Ok(Some(Deck { name, cards }))
    }

    fn save(&self, deck: &Deck) -> StorageResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO decks (name, saved_at) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET saved_at = excluded.saved_at",
            params![deck.name, Utc::now().to_rfc3339()],
        )?;
        tx.execute("DELETE FROM cards WHERE deck_name = ?1", params![deck.name])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO cards (deck_name, position, question, answer, understood)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (position, card) in deck.cards.iter().enumerate() {
                insert.execute(params![
                    deck.name,
                    position as i64,
                    card.question,
                    card.answer,
                    card.understood,
                ])?;
            }
        }
        tx.commit()?;
        debug!(deck = %deck.name, cards = deck.len(), "saved deck rows");
        Ok(())
    }

    fn delete(&self, name: &str) -> StorageResult<bool> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM cards WHERE deck_name = ?1", params![name])?;
        let removed = tx.execute("DELETE FROM decks WHERE name = ?1", params![name])?;
        tx.commit()?;
        if removed > 0 {
            info!(deck = name, "deleted deck rows");
        }
        Ok(removed > 0)
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM decks ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }
}

/// Open the backend selected by configuration.
pub fn open_store(config: &StorageConfig) -> StorageResult<Box<dyn DeckStore>> {
    let dir = config.data_dir();
    let store: Box<dyn DeckStore> = match config.backend {
        StorageBackend::Json => Box::new(FileStore::open(&dir)?),
        StorageBackend::Sqlite => Box::new(SqliteStore::open(&dir.join("flashdeck.db"))?),
    };
    debug!(backend = store.name(), dir = %dir.display(), "opened deck store");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn capitals() -> Deck {
        let mut deck = Deck::new("capitals")
            .with_card("France?", "Paris")
            .with_card("Japan?", "Tokyo");
        deck.cards[1].understood = true;
        deck
    }

    fn exercise_store(store: &dyn DeckStore) {
        assert!(store.load("missing_deck").unwrap().is_none());
        assert!(!store.exists("capitals").unwrap());

        let deck = capitals();
        store.save(&deck).unwrap();
        assert_eq!(store.load("capitals").unwrap(), Some(deck.clone()));

        let mut shorter = deck.clone();
        shorter.delete_card(0).unwrap();
        store.save(&shorter).unwrap();
        assert_eq!(store.load("capitals").unwrap(), Some(shorter));

        store.save(&Deck::new("empty")).unwrap();
        assert_eq!(store.list().unwrap(), vec!["capitals", "empty"]);
        assert_eq!(store.load("empty").unwrap(), Some(Deck::new("empty")));

        assert!(store.delete("capitals").unwrap());
        assert!(!store.delete("capitals").unwrap());
        assert!(store.load("capitals").unwrap().is_none());
        assert_eq!(store.list().unwrap(), vec!["empty"]);
    }

    #[test]
    fn test_file_store() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        exercise_store(&store);
    }

    #[test]
    fn test_sqlite_store() {
        let store = SqliteStore::in_memory().unwrap();
        exercise_store(&store);
    }

    #[test]
    fn test_sqlite_store_on_disk_reopens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("decks.db");
        SqliteStore::open(&path).unwrap().save(&capitals()).unwrap();
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.load("capitals").unwrap(), Some(capitals()));
    }

    #[test]
    fn test_file_store_ignores_other_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.save(&capitals()).unwrap();
        assert_eq!(store.list().unwrap(), vec!["capitals"]);
        assert!(dir.path().join("capitals.dck").exists());
    }

    #[test]
    fn test_corrupt_file_is_storage_error() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        fs::write(store.path_for("broken"), "{ not json").unwrap();
        assert!(matches!(store.load("broken"), Err(StorageError::Json(_))));
    }

    #[test]
    fn test_future_version_rejected() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        fs::write(
            store.path_for("future"),
            r#"{"version": 99, "name": "future", "cards": []}"#,
        )
        .unwrap();
        assert!(matches!(store.load("future"), Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn test_legacy_document_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.dck");
        fs::write(
            &path,
            r#"{"name": "old", "cards": [{"question": "Q", "answer": "A", "correct": true}]}"#,
        )
        .unwrap();
        let deck = read_deck_file(&path).unwrap();
        assert_eq!(deck.name, "old");
        assert!(deck.cards[0].understood);
    }

    #[test]
    fn test_renamed_file_keeps_its_own_key() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.save(&Deck::new("capitals").with_card("France?", "Paris")).unwrap();
        fs::rename(store.path_for("capitals"), store.path_for("geo")).unwrap();
        let original = Deck::new("capitals").with_card("Original?", "Yes");
        store.save(&original).unwrap();

        let mut geo = store.load("geo").unwrap().unwrap();
        assert_eq!(geo.name, "geo");
        geo.add_card("Q", "A");
        store.save(&geo).unwrap();

        assert_eq!(store.load("geo").unwrap(), Some(geo));
        assert_eq!(store.load("capitals").unwrap(), Some(original));
        assert_eq!(store.list().unwrap(), vec!["capitals", "geo"]);
    }

    #[test]
    fn test_export_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_deck_file(&path, &capitals()).unwrap();
        assert_eq!(read_deck_file(&path).unwrap(), capitals());
        assert!(matches!(
            write_deck_file(&path, &Deck::new("other")),
            Err(StorageError::Exists(_))
        ));
        assert_eq!(read_deck_file(&path).unwrap(), capitals());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_open_store_by_backend() {
        let dir = tempdir().unwrap();
        let mut config = StorageConfig {
            backend: StorageBackend::Json,
            dir: Some(dir.path().to_path_buf()),
        };
        assert_eq!(open_store(&config).unwrap().name(), "json");
        config.backend = StorageBackend::Sqlite;
        assert_eq!(open_store(&config).unwrap().name(), "sqlite");
        assert!(dir.path().join("flashdeck.db").exists());
    }

    fn arb_deck() -> impl Strategy<Value = Deck> {
        (
            "[a-z][a-z0-9_-]{0,11}",
            prop::collection::vec(("\\PC*", "\\PC*", any::<bool>()), 0..8),
        )
            .prop_map(|(name, cards)| Deck {
                name,
                cards: cards
                    .into_iter()
                    .map(|(question, answer, understood)| Card {
                        question,
                        answer,
                        understood,
                    })
                    .collect(),
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_file_round_trip(deck in arb_deck()) {
            let dir = tempdir().unwrap();
            let store = FileStore::open(dir.path()).unwrap();
            store.save(&deck).unwrap();
            prop_assert_eq!(store.load(&deck.name).unwrap(), Some(deck));
        }

        #[test]
        fn prop_sqlite_round_trip(deck in arb_deck()) {
            let store = SqliteStore::in_memory().unwrap();
            store.save(&deck).unwrap();
            prop_assert_eq!(store.load(&deck.name).unwrap(), Some(deck));
        }
    }
}
