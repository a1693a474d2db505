//! Enrichment stages and the runner that drives them
//!
//! # Per-item algorithm
//! 1. Items a stage does not apply to are skipped
//! 2. Unless forced, items whose row already satisfies the stage's
//!    completion predicate are skipped
//! 3. Otherwise the stage calls its collaborator and upserts the result
//! 4. A failure scoped to one item is logged and the run continues
//! 5. Every `checkpoint_interval` items and at the last item the store is
//!    persisted, if it changed
//!
//! Stages that hold a collaborator session release it in [`Stage::finish`],
//! which the runner calls on every exit path.

pub mod generate;
pub mod grammar;
pub mod package;
pub mod transcode;
pub mod voice;

pub use generate::GenerateStage;
pub use grammar::GrammarStage;
pub use package::{DeckPackager, DeckSplit, PackageReport};
pub use transcode::TranscodeStage;
pub use voice::VoiceStage;

use crate::error::{PipelineError, Result};
use crate::source::{Item, SourceList};
use crate::store::KeyedStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Stages in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Generate,
    Grammar,
    Voice,
    Transcode,
    Package,
}

impl StageKind {
    pub const ALL: [StageKind; 5] = [
        StageKind::Generate,
        StageKind::Grammar,
        StageKind::Voice,
        StageKind::Transcode,
        StageKind::Package,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Generate => "generate",
            StageKind::Grammar => "grammar",
            StageKind::Voice => "voice",
            StageKind::Transcode => "transcode",
            StageKind::Package => "package",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "generate" | "sentences" => Ok(StageKind::Generate),
            "grammar" => Ok(StageKind::Grammar),
            "voice" | "speech" => Ok(StageKind::Voice),
            "transcode" => Ok(StageKind::Transcode),
            "package" | "deck" => Ok(StageKind::Package),
            other => Err(PipelineError::Common(deckgen_common::Error::InvalidInput(
                format!("Unknown stage '{}'", other),
            ))),
        }
    }
}

/// Per-item state within one stage run
///
/// `Pending -> (Skipped | InProgress -> (Upserted | Failed))`. An item whose
/// prerequisites are missing stays `Pending`; a failed item is picked up
/// again by the next run because its row was never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Pending,
    Skipped,
    InProgress,
    Upserted,
    Failed,
}

impl ItemState {
    pub fn is_success(&self) -> bool {
        matches!(self, ItemState::Skipped | ItemState::Upserted)
    }
}

/// Counts for one stage run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub skipped: usize,
    pub upserted: usize,
    pub failed: usize,
    /// Items left untouched because an earlier stage has not run for them
    pub pending: usize,
    pub checkpoints: usize,
}

impl StageReport {
    fn record(&mut self, state: ItemState) {
        match state {
            ItemState::Skipped => self.skipped += 1,
            ItemState::Upserted => self.upserted += 1,
            ItemState::Failed => self.failed += 1,
            ItemState::Pending | ItemState::InProgress => self.pending += 1,
        }
    }

    /// Add the counts of another run of the same stage
    pub fn merge(&mut self, other: &StageReport) {
        self.skipped += other.skipped;
        self.upserted += other.upserted;
        self.failed += other.failed;
        self.pending += other.pending;
        self.checkpoints += other.checkpoints;
    }

    pub fn processed(&self) -> usize {
        self.skipped + self.upserted + self.failed + self.pending
    }
}

/// Progress notifications
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum StageEvent {
    StageStarted {
        stage: StageKind,
        total: usize,
    },
    ItemFinished {
        stage: StageKind,
        index: usize,
        key: String,
        state: ItemState,
    },
    Checkpoint {
        stage: StageKind,
        index: usize,
    },
    StageCompleted {
        stage: StageKind,
        report: StageReport,
    },
}

/// Caller options for a stage run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Ignore completion predicates and recompute every item
    pub force: bool,
    /// Persist the store after this many items (0 behaves like 1)
    pub checkpoint_interval: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            force: false,
            checkpoint_interval: 25,
        }
    }
}

/// One enrichment pass over the items of a source list
#[async_trait]
pub trait Stage: Send {
    fn kind(&self) -> StageKind;

    /// Items outside the stage's scope are skipped even when forced
    fn applies_to(&self, _item: &Item) -> bool {
        true
    }

    /// Completion predicate: the row already holds this stage's output
    fn is_complete(&self, store: &KeyedStore, item: &Item) -> Result<bool>;

    /// Do the work for one item and upsert the result
    async fn process(
        &mut self,
        index: usize,
        item: &Item,
        store: &mut KeyedStore,
        force: bool,
    ) -> Result<ItemState>;

    /// Release sessions; called once after the last item, also on failure
    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Drives stages over a source list with checkpointing
pub struct StageRunner {
    job: String,
    options: RunOptions,
    event_tx: Option<mpsc::Sender<StageEvent>>,
}

impl StageRunner {
    pub fn new(job: impl Into<String>, options: RunOptions) -> Self {
        Self {
            job: job.into(),
            options,
            event_tx: None,
        }
    }

    /// Report progress on `event_tx`
    pub fn with_events(mut self, event_tx: mpsc::Sender<StageEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn options(&self) -> RunOptions {
        self.options
    }

    async fn emit_event(&self, event: StageEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    /// Run `stage` over every item of `items` in order
    ///
    /// Item-scoped failures are counted and logged. Any other error aborts
    /// the run after the stage has been finished.
    pub async fn run(
        &self,
        stage: &mut dyn Stage,
        items: &SourceList,
        store: &mut KeyedStore,
    ) -> Result<StageReport> {
        let kind = stage.kind();
        info!(job = %self.job, stage = %kind, items = items.len(), force = self.options.force, "Stage started");
        self.emit_event(StageEvent::StageStarted {
            stage: kind,
            total: items.len(),
        })
        .await;

        let mut report = StageReport::default();
        let outcome = self.run_items(stage, items, store, &mut report).await;
        let finished = stage.finish().await;

        if let Err(err) = outcome {
            if let Err(close_err) = finished {
                warn!(stage = %kind, error = %close_err, "Failed to release stage resources");
            }
            warn!(job = %self.job, stage = %kind, error = %err, "Stage aborted");
            return Err(err);
        }
        finished?;

        info!(
            job = %self.job,
            stage = %kind,
            skipped = report.skipped,
            upserted = report.upserted,
            failed = report.failed,
            pending = report.pending,
            checkpoints = report.checkpoints,
            "Stage completed"
        );
        self.emit_event(StageEvent::StageCompleted {
            stage: kind,
            report: report.clone(),
        })
        .await;
        Ok(report)
    }

    async fn run_items(
        &self,
        stage: &mut dyn Stage,
        items: &SourceList,
        store: &mut KeyedStore,
        report: &mut StageReport,
    ) -> Result<()> {
        let kind = stage.kind();
        let interval = self.options.checkpoint_interval.max(1);
        let last = items.len().saturating_sub(1);

        for (index, item) in items.iter().enumerate() {
            let state = self.run_item(stage, index, item, store).await?;
            report.record(state);
            self.emit_event(StageEvent::ItemFinished {
                stage: kind,
                index,
                key: item.word.clone(),
                state,
            })
            .await;

            if ((index + 1) % interval == 0 || index == last) && store.is_dirty() {
                store.store(&self.job)?;
                report.checkpoints += 1;
                debug!(job = %self.job, stage = %kind, index, "Checkpoint");
                self.emit_event(StageEvent::Checkpoint { stage: kind, index }).await;
            }
        }
        Ok(())
    }

    async fn run_item(
        &self,
        stage: &mut dyn Stage,
        index: usize,
        item: &Item,
        store: &mut KeyedStore,
    ) -> Result<ItemState> {
        let kind = stage.kind();

        if !stage.applies_to(item) {
            return Ok(ItemState::Skipped);
        }
        if !self.options.force && stage.is_complete(store, item)? {
            debug!(stage = %kind, index, key = %item.word, "Already complete, skipping");
            return Ok(ItemState::Skipped);
        }

        debug!(stage = %kind, index, key = %item.word, state = ?ItemState::InProgress, "Processing item");
        match stage.process(index, item, store, self.options.force).await {
            Ok(state) => Ok(state),
            Err(err) if err.is_item_scoped() => {
                warn!(stage = %kind, index, key = %item.word, error = %err, "Item failed, continuing");
                Ok(ItemState::Failed)
            }
            Err(err) => Err(err),
        }
    }
}

/// Map a session-open failure to the stage-aborting error
pub(crate) fn session_open_error(
    collaborator: &'static str,
    err: crate::collaborators::CollaboratorError,
) -> PipelineError {
    if err.is_configuration() {
        PipelineError::Collaborator(err)
    } else {
        PipelineError::SessionOpen {
            collaborator,
            message: err.to_string(),
        }
    }
}

/// True when an audio column holds a file name
pub(crate) fn has_audio(value: &str) -> bool {
    let value = value.trim();
    value.ends_with(".wav") || value.ends_with(".mp3")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::CollaboratorError;
    use crate::source::WordType;
    use crate::store::{Schema, StoreLocation};

    /// Writes `word_trans` for every item, failing for words in `failing`
    struct EchoStage {
        failing: Vec<&'static str>,
        fatal_at: Option<usize>,
        calls: usize,
        finished: bool,
    }

    impl EchoStage {
        fn new() -> Self {
            Self {
                failing: Vec::new(),
                fatal_at: None,
                calls: 0,
                finished: false,
            }
        }
    }

    #[async_trait]
    impl Stage for EchoStage {
        fn kind(&self) -> StageKind {
            StageKind::Generate
        }

        fn is_complete(&self, store: &KeyedStore, item: &Item) -> Result<bool> {
            Ok(store.is_duplicate(&item.word))
        }

        async fn process(
            &mut self,
            index: usize,
            item: &Item,
            store: &mut KeyedStore,
            _force: bool,
        ) -> Result<ItemState> {
            self.calls += 1;
            if self.fatal_at == Some(index) {
                return Err(PipelineError::UnknownColumn("bogus".into()));
            }
            if self.failing.iter().any(|w| *w == item.word) {
                return Err(CollaboratorError::Malformed("no JSON".into()).into());
            }
            store.upsert(&item.word, [("word_trans", item.word.to_uppercase())])?;
            Ok(ItemState::Upserted)
        }

        async fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    fn store_in(dir: &std::path::Path) -> KeyedStore {
        KeyedStore::new(
            Schema::new("word", ["word", "word_trans"]).unwrap(),
            StoreLocation::new(dir.join("stores"), dir.join("backups")),
        )
    }

    fn items(words: &[&str]) -> SourceList {
        SourceList::from_items(words.iter().map(|w| Item::new(*w, WordType::Other)))
    }

    #[test]
    fn test_stage_kind_parsing() {
        assert_eq!("Voice".parse::<StageKind>().unwrap(), StageKind::Voice);
        assert_eq!(" package ".parse::<StageKind>().unwrap(), StageKind::Package);
        assert!("mix".parse::<StageKind>().is_err());
        assert_eq!(StageKind::ALL[0], StageKind::Generate);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let temp = tempfile::tempdir().unwrap();
        let mut store = store_in(temp.path());
        let mut stage = EchoStage::new();
        stage.failing = vec!["b"];

        let runner = StageRunner::new("job", RunOptions::default());
        let report = runner
            .run(&mut stage, &items(&["a", "b", "c"]), &mut store)
            .await
            .unwrap();

        assert_eq!(report.upserted, 2);
        assert_eq!(report.failed, 1);
        assert!(!store.is_duplicate("b"));
        assert!(store.is_duplicate("c"));
        assert!(stage.finished);
    }

    #[tokio::test]
    async fn test_checkpoint_cadence() {
        let temp = tempfile::tempdir().unwrap();
        let mut store = store_in(temp.path());
        let mut stage = EchoStage::new();

        let runner = StageRunner::new(
            "job",
            RunOptions {
                force: false,
                checkpoint_interval: 2,
            },
        );
        let report = runner
            .run(&mut stage, &items(&["a", "b", "c", "d", "e"]), &mut store)
            .await
            .unwrap();

        // After items 2, 4 and the last one
        assert_eq!(report.checkpoints, 3);
        assert!(!store.is_dirty());
        assert!(temp.path().join("stores/job.parquet").exists());
    }

    #[tokio::test]
    async fn test_complete_items_are_skipped_unless_forced() {
        let temp = tempfile::tempdir().unwrap();
        let mut store = store_in(temp.path());
        store.upsert("a", [("word_trans", "A")]).unwrap();

        let mut stage = EchoStage::new();
        let report = StageRunner::new("job", RunOptions::default())
            .run(&mut stage, &items(&["a", "b"]), &mut store)
            .await
            .unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(stage.calls, 1);

        let mut stage = EchoStage::new();
        let report = StageRunner::new(
            "job",
            RunOptions {
                force: true,
                checkpoint_interval: 10,
            },
        )
        .run(&mut stage, &items(&["a", "b"]), &mut store)
        .await
        .unwrap();
        assert_eq!(report.skipped, 0);
        assert_eq!(stage.calls, 2);
        // Nothing changed, so nothing was written
        assert_eq!(report.checkpoints, 0);
    }

    #[tokio::test]
    async fn test_fatal_error_aborts_and_finishes() {
        let temp = tempfile::tempdir().unwrap();
        let mut store = store_in(temp.path());
        let mut stage = EchoStage::new();
        stage.fatal_at = Some(1);

        let result = StageRunner::new("job", RunOptions::default())
            .run(&mut stage, &items(&["a", "b", "c"]), &mut store)
            .await;

        assert!(result.is_err());
        assert!(stage.finished);
        assert_eq!(stage.calls, 2);
        assert!(store.is_duplicate("a"));
    }

    #[tokio::test]
    async fn test_events_are_emitted() {
        let temp = tempfile::tempdir().unwrap();
        let mut store = store_in(temp.path());
        let (tx, mut rx) = mpsc::channel(16);

        let runner = StageRunner::new("job", RunOptions::default()).with_events(tx);
        runner
            .run(&mut EchoStage::new(), &items(&["a"]), &mut store)
            .await
            .unwrap();
        drop(runner);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert!(matches!(events[0], StageEvent::StageStarted { total: 1, .. }));
        assert!(matches!(
            events[1],
            StageEvent::ItemFinished {
                state: ItemState::Upserted,
                ..
            }
        ));
        assert!(matches!(events[2], StageEvent::Checkpoint { index: 0, .. }));
        assert!(matches!(events[3], StageEvent::StageCompleted { .. }));
    }

    #[test]
    fn test_has_audio() {
        assert!(has_audio("00001-abc.wav"));
        assert!(has_audio("00001-abc.mp3"));
        assert!(!has_audio(""));
        assert!(!has_audio("nan"));
    }
}
