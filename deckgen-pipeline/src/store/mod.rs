//! Keyed record store with file-backed persistence
//!
//! A `KeyedStore` maps a unique key (the `word` column) to a row holding
//! exactly the columns declared by its [`Schema`]. Rows are created lazily
//! by `upsert`, which merges: columns not named in the call are untouched.
//!
//! # Persistence
//! - `store` writes a Parquet file derived from the job name. An existing
//!   file is first copied into the backup directory under a timestamped
//!   name, then replaced by an atomic rename, so a readable store file
//!   exists at every moment.
//! - `load` appends previously persisted rows after checking that the file
//!   carries exactly the declared column set. A mismatch fails the load
//!   without touching the in-memory rows.

mod backup;
mod parquet;

use crate::error::{PipelineError, Result};
use deckgen_common::RootLayout;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Column values returned by lookups, keyed by column name
pub type RowValues = BTreeMap<String, String>;

/// Fixed column list of a store, including the key column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    key_column: String,
    columns: Vec<String>,
    positions: HashMap<String, usize>,
}

impl Schema {
    /// Declare a schema; the key column must be one of `columns`
    pub fn new<I, S>(key_column: &str, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut positions = HashMap::with_capacity(columns.len());

        for (i, column) in columns.iter().enumerate() {
            if positions.insert(column.clone(), i).is_some() {
                return Err(PipelineError::Common(deckgen_common::Error::InvalidInput(
                    format!("Duplicate column '{}' in schema", column),
                )));
            }
        }

        if !positions.contains_key(key_column) {
            return Err(PipelineError::UnknownColumn(key_column.to_string()));
        }

        Ok(Self {
            key_column: key_column.to_string(),
            columns,
            positions,
        })
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// Columns in declaration order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.positions.contains_key(column)
    }

    /// Set equality against a list of column names (order ignored)
    pub fn matches(&self, names: &[String]) -> bool {
        if names.len() != self.columns.len() {
            return false;
        }
        let found: HashSet<&str> = names.iter().map(String::as_str).collect();
        found.len() == self.columns.len() && self.columns.iter().all(|c| found.contains(c.as_str()))
    }
}

/// One stored record; values are aligned with the schema columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Row {
    pub(crate) values: Vec<String>,
}

/// Directories a store persists into
#[derive(Debug, Clone)]
pub struct StoreLocation {
    stores_dir: PathBuf,
    backups_dir: PathBuf,
}

impl StoreLocation {
    pub fn new(stores_dir: impl Into<PathBuf>, backups_dir: impl Into<PathBuf>) -> Self {
        Self {
            stores_dir: stores_dir.into(),
            backups_dir: backups_dir.into(),
        }
    }

    pub fn from_layout(layout: &RootLayout) -> Self {
        Self::new(layout.stores_dir(), layout.backups_dir())
    }

    pub fn stores_dir(&self) -> &Path {
        &self.stores_dir
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// Deterministic file path for a store name
    pub fn store_path(&self, name: &str) -> PathBuf {
        self.stores_dir.join(format!("{}.parquet", store_stem(name)))
    }
}

/// Job name without a trailing `.parquet`, made safe for file names
fn store_stem(name: &str) -> String {
    let trimmed = name.trim();
    let stem = trimmed.strip_suffix(".parquet").unwrap_or(trimmed);
    deckgen_common::layout::sanitize_job_name(stem)
}

/// Schema-validated, key-indexed record store
#[derive(Debug)]
pub struct KeyedStore {
    schema: Schema,
    location: StoreLocation,
    rows: Vec<Row>,
    index: HashMap<String, usize>,
    dirty: bool,
}

impl KeyedStore {
    /// Create an empty store
    pub fn new(schema: Schema, location: StoreLocation) -> Self {
        Self {
            schema,
            location,
            rows: Vec::new(),
            index: HashMap::new(),
            dirty: false,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when rows changed since the last `store` or clean `load`
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        let key_pos = self.key_position();
        self.rows.iter().map(move |row| row.values[key_pos].as_str())
    }

    fn key_position(&self) -> usize {
        // Schema::new guarantees the key column is present
        self.schema.position(self.schema.key_column()).unwrap_or(0)
    }

    /// Append persisted rows for `name`, if a persisted copy exists
    ///
    /// Returns the number of rows read. Persisted rows whose key already
    /// exists in memory overwrite that row, keeping keys unique.
    pub fn load(&mut self, name: &str) -> Result<usize> {
        let path = self.location.store_path(name);

        if !path.exists() {
            debug!(path = %path.display(), "No persisted store, starting empty");
            return Ok(0);
        }

        let loaded = parquet::read_table(&path, &self.schema)?;
        let was_empty = self.rows.is_empty();
        let key_pos = self.key_position();
        let count = loaded.len();

        for row in loaded {
            let key = row.values[key_pos].clone();
            if key.is_empty() {
                warn!(path = %path.display(), "Skipping persisted row with empty key");
                continue;
            }
            match self.index.get(&key) {
                Some(&i) => self.rows[i] = row,
                None => {
                    self.index.insert(key, self.rows.len());
                    self.rows.push(row);
                }
            }
        }

        if !was_empty {
            self.dirty = true;
        }

        info!(
            path = %path.display(),
            rows = count,
            total = self.rows.len(),
            "Loaded persisted store"
        );
        Ok(count)
    }

    /// True iff a row with this key exists
    pub fn is_duplicate(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Merge `entries` into the row for `key`, creating it with empty
    /// defaults first if needed
    ///
    /// Every entry is validated before anything changes. Re-applying the
    /// same entries leaves the row and the dirty flag untouched.
    pub fn upsert<I, K, V>(&mut self, key: &str, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let key_column = self.schema.key_column().to_string();
        let mut updates = Vec::new();

        for (column, value) in entries {
            let column = column.as_ref();
            let value = value.into();
            let pos = self
                .schema
                .position(column)
                .ok_or_else(|| PipelineError::UnknownColumn(column.to_string()))?;

            if column == key_column {
                if value != key {
                    return Err(PipelineError::KeyRewrite {
                        column: key_column,
                        from: key.to_string(),
                        to: value,
                    });
                }
                continue;
            }
            updates.push((pos, value));
        }

        let row_index = match self.index.get(key) {
            Some(&i) => i,
            None => {
                let mut values = vec![String::new(); self.schema.len()];
                values[self.key_position()] = key.to_string();
                self.index.insert(key.to_string(), self.rows.len());
                self.rows.push(Row { values });
                self.dirty = true;
                self.rows.len() - 1
            }
        };

        let row = &mut self.rows[row_index];
        for (pos, value) in updates {
            if row.values[pos] != value {
                row.values[pos] = value;
                self.dirty = true;
            }
        }

        Ok(())
    }

    /// Requested columns of the row for `key`, or `None` if the key is absent
    pub fn get_values<S: AsRef<str>>(&self, key: &str, columns: &[S]) -> Result<Option<RowValues>> {
        let Some(&i) = self.index.get(key) else {
            return Ok(None);
        };
        let row = &self.rows[i];

        let mut values = RowValues::new();
        for column in columns {
            let column = column.as_ref();
            let pos = self
                .schema
                .position(column)
                .ok_or_else(|| PipelineError::UnknownColumn(column.to_string()))?;
            values.insert(column.to_string(), row.values[pos].clone());
        }
        Ok(Some(values))
    }

    /// Every column of the row for `key`
    pub fn row(&self, key: &str) -> Option<RowValues> {
        let &i = self.index.get(key)?;
        Some(
            self.schema
                .columns()
                .iter()
                .cloned()
                .zip(self.rows[i].values.iter().cloned())
                .collect(),
        )
    }

    /// Persist to the file derived from `name`, backing up any prior version
    pub fn store(&mut self, name: &str) -> Result<PathBuf> {
        let path = self.location.store_path(name);
        std::fs::create_dir_all(&self.location.stores_dir)?;

        let staging = path.with_extension("parquet.tmp");
        parquet::write_table(&staging, &self.schema, &self.rows)?;

        if path.exists() {
            let backup = backup::preserve(&path, &self.location.backups_dir, &store_stem(name))?;
            debug!(backup = %backup.display(), "Saved previous store version to backups");
        }
        // Replaces the previous version in one step
        std::fs::rename(&staging, &path)?;

        self.dirty = false;
        debug!(path = %path.display(), rows = self.rows.len(), "Store persisted");
        Ok(path)
    }
}
