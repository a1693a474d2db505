//! Pipeline controller
//!
//! Owns one job's source list, store and collaborators and runs the stages
//! in order. Every stage entry point ends by persisting the store, also
//! when the stage fails, so completed work is never lost.

use crate::collaborators::{DeckWriter, GrammarFetcher, LanguageModel, SpeechSynthesizer, Transcoder};
use crate::error::{PipelineError, Result};
use crate::layout::{Language, SentenceLayout};
use crate::source::SourceList;
use crate::stages::{
    DeckPackager, DeckSplit, GenerateStage, GrammarStage, PackageReport, RunOptions, StageEvent,
    StageKind, StageReport, StageRunner, TranscodeStage, VoiceStage,
};
use crate::store::{KeyedStore, StoreLocation};
use crate::throttle::DelayPolicy;
use deckgen_common::RootLayout;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// External services used by the stages
pub struct Collaborators {
    pub model: Box<dyn LanguageModel>,
    pub speech: Box<dyn SpeechSynthesizer>,
    pub transcoder: Box<dyn Transcoder>,
    pub conjugations: Box<dyn GrammarFetcher>,
    pub declensions: Box<dyn GrammarFetcher>,
    pub deck_writer: Box<dyn DeckWriter>,
}

/// Per-job settings
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub job: String,
    pub layout: SentenceLayout,
    pub run: RunOptions,
    pub verb_delay: DelayPolicy,
    pub noun_delay: DelayPolicy,
    pub split: DeckSplit,
    /// Package rows even when required columns are empty
    pub force_all: bool,
}

impl JobSettings {
    pub fn new(job: impl Into<String>, layout: SentenceLayout) -> Self {
        Self {
            job: job.into(),
            layout,
            run: RunOptions::default(),
            verb_delay: DelayPolicy::verb_default(),
            noun_delay: DelayPolicy::noun_default(),
            split: DeckSplit::Single,
            force_all: false,
        }
    }
}

/// Reports of one `run` call, in execution order
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub stages: Vec<(StageKind, StageReport)>,
    pub package: Option<PackageReport>,
}

pub struct PipelineController {
    settings: JobSettings,
    media_dir: PathBuf,
    items: SourceList,
    store: KeyedStore,
    collaborators: Collaborators,
    event_tx: Option<mpsc::Sender<StageEvent>>,
}

impl PipelineController {
    /// Prepare the job's directories and load its persisted store
    ///
    /// A persisted store whose columns do not match the layout fails the
    /// open; nothing is overwritten.
    pub fn open(
        settings: JobSettings,
        root: &RootLayout,
        items: SourceList,
        collaborators: Collaborators,
    ) -> Result<Self> {
        root.ensure_directories()?;
        let media_dir = root.ensure_media_dir(&settings.job)?;

        let mut store = KeyedStore::new(settings.layout.schema()?, StoreLocation::from_layout(root));
        let loaded = store.load(&settings.job)?;

        info!(
            job = %settings.job,
            layout = %settings.layout,
            items = items.len(),
            rows = loaded,
            "Pipeline opened"
        );

        Ok(Self {
            settings,
            media_dir,
            items,
            store,
            collaborators,
            event_tx: None,
        })
    }

    /// Forward stage progress to `event_tx`
    pub fn with_events(mut self, event_tx: mpsc::Sender<StageEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn job(&self) -> &str {
        &self.settings.job
    }

    pub fn settings(&self) -> &JobSettings {
        &self.settings
    }

    pub fn items(&self) -> &SourceList {
        &self.items
    }

    pub fn store(&self) -> &KeyedStore {
        &self.store
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    fn runner(&self) -> StageRunner {
        let runner = StageRunner::new(self.settings.job.clone(), self.settings.run);
        match &self.event_tx {
            Some(tx) => runner.with_events(tx.clone()),
            None => runner,
        }
    }

    /// Write the store unconditionally
    pub fn persist(&mut self) -> Result<PathBuf> {
        self.store.store(&self.settings.job)
    }

    fn persist_if_dirty(&mut self) -> Result<()> {
        if self.store.is_dirty() {
            let path = self.persist()?;
            info!(job = %self.settings.job, path = %path.display(), "Store persisted");
        }
        Ok(())
    }

    /// Persist after a stage; a stage error wins over a persist error
    fn conclude<T>(&mut self, stage: StageKind, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.persist_if_dirty()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(persist_err) = self.persist_if_dirty() {
                    warn!(job = %self.settings.job, stage = %stage, error = %persist_err, "Persist after failed stage also failed");
                }
                Err(err)
            }
        }
    }

    /// Translation, sentences and puzzle text
    pub async fn generate_sentences(&mut self) -> Result<StageReport> {
        let runner = self.runner();
        let mut stage = GenerateStage::new(self.collaborators.model.as_ref(), self.settings.layout);
        let outcome = runner.run(&mut stage, &self.items, &mut self.store).await;
        drop(stage);
        self.conclude(StageKind::Generate, outcome)
    }

    /// Noun declensions, then verb conjugations
    pub async fn fetch_grammar(&mut self) -> Result<StageReport> {
        let runner = self.runner();
        let outcome = async {
            let mut report = StageReport::default();

            let mut nouns = GrammarStage::nouns(self.collaborators.declensions.as_ref(), self.settings.noun_delay);
            report.merge(&runner.run(&mut nouns, &self.items, &mut self.store).await?);

            let mut verbs = GrammarStage::verbs(self.collaborators.conjugations.as_ref(), self.settings.verb_delay);
            report.merge(&runner.run(&mut verbs, &self.items, &mut self.store).await?);

            Ok::<_, PipelineError>(report)
        }
        .await;
        self.conclude(StageKind::Grammar, outcome)
    }

    /// German voice columns, then English
    pub async fn synthesize_voices(&mut self) -> Result<StageReport> {
        let runner = self.runner();
        let outcome = async {
            let mut report = StageReport::default();
            for language in [Language::German, Language::English] {
                let mut stage = VoiceStage::new(
                    self.collaborators.speech.as_ref(),
                    self.settings.layout,
                    language,
                    &self.media_dir,
                );
                report.merge(&runner.run(&mut stage, &self.items, &mut self.store).await?);
            }
            Ok::<_, PipelineError>(report)
        }
        .await;
        self.conclude(StageKind::Voice, outcome)
    }

    /// Compress every recording
    pub async fn transcode(&mut self) -> Result<StageReport> {
        let runner = self.runner();
        let mut stage = TranscodeStage::new(
            self.collaborators.transcoder.as_ref(),
            self.settings.layout,
            &self.media_dir,
        );
        let outcome = runner.run(&mut stage, &self.items, &mut self.store).await;
        drop(stage);
        self.conclude(StageKind::Transcode, outcome)
    }

    /// Write the deck packages
    pub async fn package(&mut self) -> Result<PackageReport> {
        let packager = DeckPackager::new(
            self.collaborators.deck_writer.as_ref(),
            self.settings.layout,
            &self.media_dir,
        )
        .with_split(self.settings.split)
        .with_force_all(self.settings.force_all);

        let outcome = packager.package(&self.settings.job, &self.items, &self.store).await;
        drop(packager);
        self.conclude(StageKind::Package, outcome)
    }

    /// Run the requested stages in pipeline order
    pub async fn run(&mut self, stages: &[StageKind]) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        for kind in StageKind::ALL.into_iter().filter(|k| stages.contains(k)) {
            match kind {
                StageKind::Generate => summary.stages.push((kind, self.generate_sentences().await?)),
                StageKind::Grammar => summary.stages.push((kind, self.fetch_grammar().await?)),
                StageKind::Voice => summary.stages.push((kind, self.synthesize_voices().await?)),
                StageKind::Transcode => summary.stages.push((kind, self.transcode().await?)),
                StageKind::Package => summary.package = Some(self.package().await?),
            }
        }

        info!(job = %self.settings.job, stages = summary.stages.len(), "Pipeline run finished");
        Ok(summary)
    }
}
