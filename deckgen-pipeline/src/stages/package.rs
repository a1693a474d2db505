//! Deck packaging
//!
//! Items are split into sub-decks in source order. Each qualifying row
//! becomes one note: audio columns turn into `[sound:...]` references to
//! the compressed files, the grammar blob is flattened for display and the
//! spare column is left blank.

use super::{has_audio, StageKind};
use crate::collaborators::{DeckDraft, DeckWriter, NoteModel};
use crate::error::{PipelineError, Result};
use crate::layout::{SentenceLayout, GRAMMAR_COLUMN, SPARE_COLUMN, VOICE_SUFFIX};
use crate::source::{Item, SourceList};
use crate::store::{KeyedStore, RowValues};
use crate::text::flatten_grammar;
use serde::Serialize;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How items are grouped into decks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeckSplit {
    /// One deck named after the job
    #[default]
    Single,
    /// Fixed-size groups; without an explicit count, as many as needed
    Chunked {
        cards_per_deck: usize,
        deck_count: Option<usize>,
    },
    /// A fixed number of groups of equal size
    Count(usize),
}

impl DeckSplit {
    pub fn from_options(cards_per_deck: Option<usize>, deck_count: Option<usize>) -> Self {
        match (cards_per_deck, deck_count) {
            (Some(cards), count) if cards > 0 => DeckSplit::Chunked {
                cards_per_deck: cards,
                deck_count: count,
            },
            (_, Some(count)) if count > 0 => DeckSplit::Count(count),
            _ => DeckSplit::Single,
        }
    }

    /// Item ranges per deck for a list of `total` items
    ///
    /// A zero group size or count falls back to a single deck.
    pub fn ranges(&self, total: usize) -> Vec<Range<usize>> {
        let (size, count) = match *self {
            DeckSplit::Single
            | DeckSplit::Count(0)
            | DeckSplit::Chunked {
                cards_per_deck: 0, ..
            } => return vec![0..total],
            DeckSplit::Chunked {
                cards_per_deck,
                deck_count,
            } => (
                cards_per_deck,
                deck_count.unwrap_or_else(|| total.div_ceil(cards_per_deck)),
            ),
            DeckSplit::Count(count) => (total.div_ceil(count).max(1), count),
        };

        (0..count)
            .map(|n| (n * size).min(total)..((n + 1) * size).min(total))
            .collect()
    }

    fn is_single(&self) -> bool {
        matches!(
            self,
            DeckSplit::Single | DeckSplit::Count(0) | DeckSplit::Chunked { cards_per_deck: 0, .. }
        )
    }
}

/// Outcome of a packaging run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageReport {
    pub decks: Vec<PathBuf>,
    pub notes: usize,
    /// Rows left out because a required column was empty or the row missing
    pub excluded: usize,
}

pub struct DeckPackager<'a> {
    writer: &'a dyn DeckWriter,
    layout: SentenceLayout,
    media_dir: PathBuf,
    split: DeckSplit,
    force_all: bool,
}

impl<'a> DeckPackager<'a> {
    pub fn new(writer: &'a dyn DeckWriter, layout: SentenceLayout, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            writer,
            layout,
            media_dir: media_dir.into(),
            split: DeckSplit::Single,
            force_all: false,
        }
    }

    pub fn with_split(mut self, split: DeckSplit) -> Self {
        self.split = split;
        self
    }

    /// Include rows even when required columns are empty
    pub fn with_force_all(mut self, force_all: bool) -> Self {
        self.force_all = force_all;
        self
    }

    fn note_model(&self, deck_name: &str) -> NoteModel {
        NoteModel {
            name: format!("{} ({})", deck_name, self.layout),
            fields: self.layout.deck_fields(),
            template_name: self.layout.template_name().to_string(),
            question_template: self.layout.question_template(),
            answer_template: self.layout.answer_template(),
            css: self.layout.css().to_string(),
        }
    }

    /// True when every required column of the row is populated
    fn qualifies(&self, row: &RowValues) -> bool {
        self.layout
            .required_columns()
            .iter()
            .all(|column| row.get(column).is_some_and(|v| !v.trim().is_empty()))
    }

    /// Field values of one note, collecting referenced audio into `media`
    fn note_fields(&self, item: &Item, row: &RowValues, media: &mut Vec<PathBuf>) -> Vec<String> {
        self.layout
            .deck_fields()
            .iter()
            .map(|field| {
                let value = row.get(field).map(String::as_str).unwrap_or("");
                if field == SPARE_COLUMN {
                    String::new()
                } else if field == GRAMMAR_COLUMN {
                    flatten_grammar(value, item.word_type)
                } else if field.ends_with(VOICE_SUFFIX) {
                    if !has_audio(value) {
                        return String::new();
                    }
                    let compressed = compressed_name(value.trim());
                    let path = self.media_dir.join(&compressed);
                    if !media.contains(&path) {
                        media.push(path);
                    }
                    format!("[sound:{}]", compressed)
                } else {
                    value.to_string()
                }
            })
            .collect()
    }

    /// Assemble one deck from `items`; returns the draft and the number of
    /// rows left out
    pub fn build_deck(&self, name: &str, items: &[Item], store: &KeyedStore) -> Result<(DeckDraft, usize)> {
        let columns = self.layout.package_columns();
        let mut notes = Vec::new();
        let mut media = Vec::new();
        let mut excluded = 0;

        for item in items {
            let Some(row) = store.get_values(&item.word, columns.as_slice())? else {
                debug!(key = %item.word, "No row, not packaged");
                excluded += 1;
                continue;
            };
            if !self.force_all && !self.qualifies(&row) {
                debug!(key = %item.word, "Incomplete row, not packaged");
                excluded += 1;
                continue;
            }
            notes.push(self.note_fields(item, &row, &mut media));
        }

        Ok((
            DeckDraft {
                name: name.to_string(),
                model: self.note_model(name),
                notes,
                media,
            },
            excluded,
        ))
    }

    /// Write every deck for `job`
    pub async fn package(&self, job: &str, items: &SourceList, store: &KeyedStore) -> Result<PackageReport> {
        info!(job = %job, stage = %StageKind::Package, items = items.len(), force_all = self.force_all, "Stage started");
        let mut report = PackageReport::default();

        for (n, range) in self.split.ranges(items.len()).into_iter().enumerate() {
            let name = if self.split.is_single() {
                job.to_string()
            } else {
                format!("{} - {}", job, n + 1)
            };

            let (deck, excluded) = self.build_deck(&name, &items.as_slice()[range], store)?;
            report.excluded += excluded;

            if deck.notes.is_empty() {
                warn!(deck = %name, "No qualifying notes, deck not written");
                continue;
            }

            let path = self
                .writer
                .write(&deck)
                .await
                .map_err(|e| PipelineError::Package(format!("{}: {}", name, e)))?;
            report.notes += deck.notes.len();
            report.decks.push(path);
        }

        info!(
            job = %job,
            stage = %StageKind::Package,
            decks = report.decks.len(),
            notes = report.notes,
            excluded = report.excluded,
            "Stage completed"
        );
        Ok(report)
    }
}

/// File name of the compressed sibling of a recording
fn compressed_name(file: &str) -> String {
    Path::new(file).with_extension("mp3").to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CollabResult, CollaboratorError};
    use crate::source::WordType;
    use crate::store::StoreLocation;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct CapturingWriter {
        decks: Arc<Mutex<Vec<DeckDraft>>>,
        fail: bool,
    }

    #[async_trait]
    impl DeckWriter for CapturingWriter {
        async fn write(&self, deck: &DeckDraft) -> CollabResult<PathBuf> {
            if self.fail {
                return Err(CollaboratorError::Storage("disk full".into()));
            }
            self.decks.lock().unwrap().push(deck.clone());
            Ok(PathBuf::from(format!("{}.deckpkg", deck.name)))
        }
    }

    fn complete_row(store: &mut KeyedStore, word: &str) {
        store
            .upsert(
                word,
                [
                    ("word_trans", "dog"),
                    ("1_pzl", "Der .... bellt."),
                    ("1_fil", "Der Hund bellt."),
                    ("1_trans", "The dog barks."),
                    ("1_pzl_vce", "00000-a.wav"),
                    ("1_fil_vce", "00000-b.wav"),
                    ("1_trans_vce", "00000-c.wav"),
                    ("expl_1", r#"{"Nominative":{"Singular":"der Hund","Plural":"die Hunde"}}"#),
                ],
            )
            .unwrap();
    }

    fn store(dir: &Path) -> KeyedStore {
        KeyedStore::new(
            SentenceLayout::OneSentence.schema().unwrap(),
            StoreLocation::new(dir.join("stores"), dir.join("backups")),
        )
    }

    #[test]
    fn test_split_ranges() {
        assert_eq!(DeckSplit::Single.ranges(5), vec![0..5]);
        assert_eq!(DeckSplit::from_options(Some(2), None).ranges(5), vec![0..2, 2..4, 4..5]);
        assert_eq!(DeckSplit::from_options(Some(2), Some(2)).ranges(5), vec![0..2, 2..4]);
        assert_eq!(DeckSplit::from_options(None, Some(2)).ranges(5), vec![0..3, 3..5]);
        assert_eq!(DeckSplit::from_options(None, None), DeckSplit::Single);
    }

    #[test]
    fn test_zero_sized_split_is_one_deck() {
        assert_eq!(DeckSplit::Count(0).ranges(3), vec![0..3]);
        let chunked = DeckSplit::Chunked {
            cards_per_deck: 0,
            deck_count: Some(2),
        };
        assert_eq!(chunked.ranges(3), vec![0..3]);
        assert!(chunked.is_single());
    }

    #[test]
    fn test_compressed_name() {
        assert_eq!(compressed_name("00001-x.wav"), "00001-x.mp3");
        assert_eq!(compressed_name("00001-x.mp3"), "00001-x.mp3");
    }

    #[test]
    fn test_note_fields() {
        let temp = tempfile::tempdir().unwrap();
        let mut store = store(temp.path());
        complete_row(&mut store, "der Hund");
        store.upsert("der Hund", [("expl_2", "spare")]).unwrap();

        let writer = CapturingWriter::default();
        let packager = DeckPackager::new(&writer, SentenceLayout::OneSentence, "/media");
        let items = [Item::new("der Hund", WordType::Noun)];
        let (deck, excluded) = packager.build_deck("A1", &items, &store).unwrap();

        assert_eq!(excluded, 0);
        let note = &deck.notes[0];
        let field = |name: &str| {
            let pos = deck.model.fields.iter().position(|f| f == name).unwrap();
            note[pos].clone()
        };
        assert_eq!(field("word"), "der Hund");
        assert_eq!(field("1_pzl_vce"), "[sound:00000-a.mp3]");
        assert_eq!(field("expl_1"), "der Hund, die Hunde. ");
        assert_eq!(field("expl_2"), "");
        assert_eq!(deck.media.len(), 3);
        assert_eq!(deck.media[0], PathBuf::from("/media/00000-a.mp3"));
    }

    #[tokio::test]
    async fn test_chunked_decks_are_named_by_number() {
        let temp = tempfile::tempdir().unwrap();
        let mut store = store(temp.path());
        for word in ["a", "b", "c"] {
            complete_row(&mut store, word);
        }
        let items = SourceList::from_items(["a", "b", "c"].map(|w| Item::new(w, WordType::Other)));

        let writer = CapturingWriter::default();
        let report = DeckPackager::new(&writer, SentenceLayout::OneSentence, temp.path())
            .with_split(DeckSplit::from_options(Some(2), None))
            .package("A1", &items, &store)
            .await
            .unwrap();

        assert_eq!(report.notes, 3);
        let names: Vec<String> = writer.decks.lock().unwrap().iter().map(|d| d.name.clone()).collect();
        assert_eq!(names, vec!["A1 - 1", "A1 - 2"]);
    }

    #[tokio::test]
    async fn test_zero_deck_count_packages_single_deck() {
        let temp = tempfile::tempdir().unwrap();
        let mut store = store(temp.path());
        for word in ["a", "b"] {
            complete_row(&mut store, word);
        }
        let items = SourceList::from_items(["a", "b"].map(|w| Item::new(w, WordType::Other)));

        let writer = CapturingWriter::default();
        let report = DeckPackager::new(&writer, SentenceLayout::OneSentence, temp.path())
            .with_split(DeckSplit::Count(0))
            .package("A1", &items, &store)
            .await
            .unwrap();

        assert_eq!(report.notes, 2);
        let names: Vec<String> = writer.decks.lock().unwrap().iter().map(|d| d.name.clone()).collect();
        assert_eq!(names, vec!["A1"]);
    }

    #[tokio::test]
    async fn test_empty_deck_is_not_written() {
        let temp = tempfile::tempdir().unwrap();
        let store = store(temp.path());
        let items = SourceList::from_items([Item::new("a", WordType::Other)]);

        let writer = CapturingWriter::default();
        let report = DeckPackager::new(&writer, SentenceLayout::OneSentence, temp.path())
            .package("A1", &items, &store)
            .await
            .unwrap();

        assert!(report.decks.is_empty());
        assert_eq!(report.excluded, 1);
        assert!(writer.decks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_writer_failure_is_reported() {
        let temp = tempfile::tempdir().unwrap();
        let mut store = store(temp.path());
        complete_row(&mut store, "a");
        let items = SourceList::from_items([Item::new("a", WordType::Other)]);

        let writer = CapturingWriter {
            fail: true,
            ..Default::default()
        };
        let err = DeckPackager::new(&writer, SentenceLayout::OneSentence, temp.path())
            .package("A1", &items, &store)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Package(_)));
    }
}
