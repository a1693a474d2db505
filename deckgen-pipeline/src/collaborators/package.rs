//! Deck packages as single-file SQLite archives
//!
//! # Layout
//! - `deck`: one row with deck and note-model ids, names, templates and CSS
//! - `fields`: field names in note order
//! - `notes`: one row per note, field values as a JSON array
//! - `media`: referenced audio files embedded as BLOBs
//!
//! The archive is assembled under a temporary name and renamed into place,
//! so a failed write never leaves a half-written package behind.

use super::{CollabResult, CollaboratorError, DeckWriter};
use async_trait::async_trait;
use rand::Rng;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};

/// Note type shared by every note of a deck
#[derive(Debug, Clone, PartialEq)]
pub struct NoteModel {
    pub name: String,
    pub fields: Vec<String>,
    pub template_name: String,
    pub question_template: String,
    pub answer_template: String,
    pub css: String,
}

/// Everything needed to write one deck
#[derive(Debug, Clone, PartialEq)]
pub struct DeckDraft {
    pub name: String,
    pub model: NoteModel,
    /// Field values per note, aligned with `model.fields`
    pub notes: Vec<Vec<String>>,
    /// Audio files referenced by the notes
    pub media: Vec<PathBuf>,
}

/// Random id in `[2^30, 2^31)`
fn random_id() -> i64 {
    rand::thread_rng().gen_range((1i64 << 30)..(1i64 << 31))
}

fn storage_error(e: sqlx::Error) -> CollaboratorError {
    CollaboratorError::Storage(e.to_string())
}

/// Archive file name: deck name plus a `yymmddHHMMSS` stamp
pub fn package_file_name(deck_name: &str) -> String {
    format!(
        "{}_{}.deckpkg",
        deckgen_common::layout::sanitize_job_name(deck_name),
        chrono::Local::now().format("%y%m%d%H%M%S")
    )
}

/// Writes decks into a directory
pub struct SqliteDeckWriter {
    output_dir: PathBuf,
}

impl SqliteDeckWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    async fn open(path: &Path) -> CollabResult<SqlitePool> {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(path)
                    .journal_mode(SqliteJournalMode::Delete)
                    .create_if_missing(true),
            )
            .await
            .map_err(storage_error)
    }

    async fn fill(pool: &SqlitePool, deck: &DeckDraft) -> CollabResult<usize> {
        let mut tx = pool.begin().await.map_err(storage_error)?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
        }

        sqlx::query(
            r#"
            INSERT INTO deck (id, name, model_id, model_name, template_name, qfmt, afmt, css, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(random_id())
        .bind(&deck.name)
        .bind(random_id())
        .bind(&deck.model.name)
        .bind(&deck.model.template_name)
        .bind(&deck.model.question_template)
        .bind(&deck.model.answer_template)
        .bind(&deck.model.css)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        for (ord, field) in deck.model.fields.iter().enumerate() {
            sqlx::query("INSERT INTO fields (ord, name) VALUES (?, ?)")
                .bind(ord as i64)
                .bind(field)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
        }

        for note in &deck.notes {
            if note.len() != deck.model.fields.len() {
                return Err(CollaboratorError::Storage(format!(
                    "note has {} fields, model '{}' declares {}",
                    note.len(),
                    deck.model.name,
                    deck.model.fields.len()
                )));
            }
            let fields = serde_json::to_string(note)
                .map_err(|e| CollaboratorError::Storage(e.to_string()))?;
            sqlx::query("INSERT INTO notes (guid, fields) VALUES (?, ?)")
                .bind(uuid::Uuid::new_v4().to_string())
                .bind(fields)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
        }

        let mut embedded = 0;
        for media in &deck.media {
            let Some(name) = media.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let data = match tokio::fs::read(media).await {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!(media = %media.display(), error = %e, "Skipping missing media file");
                    continue;
                }
            };
            sqlx::query("INSERT OR REPLACE INTO media (name, data) VALUES (?, ?)")
                .bind(name)
                .bind(data)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
            embedded += 1;
        }

        tx.commit().await.map_err(storage_error)?;
        Ok(embedded)
    }
}

const SCHEMA: [&str; 4] = [
    r#"
    CREATE TABLE deck (
        id INTEGER NOT NULL,
        name TEXT NOT NULL,
        model_id INTEGER NOT NULL,
        model_name TEXT NOT NULL,
        template_name TEXT NOT NULL,
        qfmt TEXT NOT NULL,
        afmt TEXT NOT NULL,
        css TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE TABLE fields (ord INTEGER PRIMARY KEY, name TEXT NOT NULL)",
    "CREATE TABLE notes (id INTEGER PRIMARY KEY AUTOINCREMENT, guid TEXT NOT NULL UNIQUE, fields TEXT NOT NULL)",
    "CREATE TABLE media (name TEXT PRIMARY KEY, data BLOB NOT NULL)",
];

#[async_trait]
impl DeckWriter for SqliteDeckWriter {
    async fn write(&self, deck: &DeckDraft) -> CollabResult<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let path = self.output_dir.join(package_file_name(&deck.name));
        let staging = path.with_extension("deckpkg.tmp");
        if tokio::fs::try_exists(&staging).await.unwrap_or(false) {
            tokio::fs::remove_file(&staging).await?;
        }

        let pool = Self::open(&staging).await?;
        let filled = Self::fill(&pool, deck).await;
        pool.close().await;

        let embedded = match filled {
            Ok(embedded) => embedded,
            Err(e) => {
                let _ = tokio::fs::remove_file(&staging).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&staging, &path).await?;

        tracing::info!(
            deck = %deck.name,
            path = %path.display(),
            notes = deck.notes.len(),
            media = embedded,
            "Deck package written"
        );
        Ok(path)
    }
}
