//! Test doubles for the pipeline collaborators
//!
//! Every double records its calls behind `Arc<Mutex<..>>` so tests can
//! assert how often each external service was hit.

#![allow(dead_code)]

use async_trait::async_trait;
use deckgen_pipeline::collaborators::{
    CollabResult, CollaboratorError, DeckDraft, DeckWriter, GrammarFetcher, LanguageModel,
    ModelSession, SpeechSession, SpeechSynthesizer, Transcoder,
};
use deckgen_pipeline::throttle::DelayPolicy;
use deckgen_pipeline::{Collaborators, JobSettings, RunOptions, SentenceLayout};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub struct ModelLog {
    pub opened: usize,
    pub closed: usize,
    /// Translation prompts per headword
    pub translations: BTreeMap<String, usize>,
}

/// Language model answering every prompt with well-formed JSON
#[derive(Clone, Default)]
pub struct ScriptedModel {
    pub log: Arc<Mutex<ModelLog>>,
}

struct ScriptedSession {
    log: Arc<Mutex<ModelLog>>,
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn open(&self, _system_prompt: &str) -> CollabResult<Box<dyn ModelSession>> {
        self.log.lock().unwrap().opened += 1;
        Ok(Box::new(ScriptedSession {
            log: self.log.clone(),
        }))
    }
}

#[async_trait]
impl ModelSession for ScriptedSession {
    async fn shoot(&mut self, prompt: &str) -> CollabResult<Option<String>> {
        // Sentence prompts quote the translation, translation prompts do not
        if prompt.contains("(English:") {
            return Ok(Some(
                r#"{"German": "Wir lernen heute.", "English": "We are learning today."}"#.to_string(),
            ));
        }

        let word = prompt.split('\'').nth(1).unwrap_or_default().to_string();
        *self
            .log
            .lock()
            .unwrap()
            .translations
            .entry(word.clone())
            .or_default() += 1;
        Ok(Some(format!(r#"{{"German": "{}", "English": "the thing"}}"#, word)))
    }

    async fn close(self: Box<Self>) -> CollabResult<()> {
        self.log.lock().unwrap().closed += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SpeechLog {
    /// `(language, text, file name)` per synthesized clip
    pub clips: Vec<(String, String, String)>,
    pub closed: usize,
}

/// Speech engine that records requests; with `interrupt_after` it stops
/// working once that many clips were made
#[derive(Clone, Default)]
pub struct ScriptedSpeech {
    pub log: Arc<Mutex<SpeechLog>>,
    pub interrupt_after: Option<usize>,
}

struct ScriptedSpeechSession {
    language: String,
    dir: PathBuf,
    log: Arc<Mutex<SpeechLog>>,
    interrupt_after: Option<usize>,
}

#[async_trait]
impl SpeechSynthesizer for ScriptedSpeech {
    async fn open(&self, language: &str, media_dir: &Path) -> CollabResult<Box<dyn SpeechSession>> {
        Ok(Box::new(ScriptedSpeechSession {
            language: language.to_string(),
            dir: media_dir.to_path_buf(),
            log: self.log.clone(),
            interrupt_after: self.interrupt_after,
        }))
    }
}

#[async_trait]
impl SpeechSession for ScriptedSpeechSession {
    async fn shoot(&mut self, text: &str, file_name: &str) -> CollabResult<PathBuf> {
        let mut log = self.log.lock().unwrap();
        if self.interrupt_after.is_some_and(|limit| log.clips.len() >= limit) {
            return Err(CollaboratorError::UnsupportedLanguage(format!(
                "{} engine stopped",
                self.language
            )));
        }
        log.clips
            .push((self.language.clone(), text.to_string(), file_name.to_string()));
        Ok(self.dir.join(file_name))
    }

    async fn close(self: Box<Self>) -> CollabResult<()> {
        self.log.lock().unwrap().closed += 1;
        Ok(())
    }
}

/// Transcoder that only reports the target path
#[derive(Clone, Default)]
pub struct NullTranscoder {
    pub calls: Arc<Mutex<usize>>,
}

#[async_trait]
impl Transcoder for NullTranscoder {
    async fn transcode(&self, source: &Path) -> CollabResult<PathBuf> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.target_for(source))
    }
}

/// Grammar lookup with a fixed answer table
#[derive(Clone, Default)]
pub struct TableFetcher {
    pub answers: BTreeMap<String, String>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl GrammarFetcher for TableFetcher {
    async fn lookup(&self, word: &str) -> CollabResult<Option<String>> {
        self.calls.lock().unwrap().push(word.to_string());
        Ok(self.answers.get(word).cloned())
    }
}

/// Deck writer keeping drafts in memory
#[derive(Clone, Default)]
pub struct CapturingWriter {
    pub decks: Arc<Mutex<Vec<DeckDraft>>>,
}

#[async_trait]
impl DeckWriter for CapturingWriter {
    async fn write(&self, deck: &DeckDraft) -> CollabResult<PathBuf> {
        self.decks.lock().unwrap().push(deck.clone());
        Ok(PathBuf::from(format!("{}.deckpkg", deck.name)))
    }
}

/// Handles to every double wired into a controller
#[derive(Clone, Default)]
pub struct Doubles {
    pub model: ScriptedModel,
    pub speech: ScriptedSpeech,
    pub transcoder: NullTranscoder,
    pub conjugations: TableFetcher,
    pub declensions: TableFetcher,
    pub writer: CapturingWriter,
}

impl Doubles {
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            model: Box::new(self.model.clone()),
            speech: Box::new(self.speech.clone()),
            transcoder: Box::new(self.transcoder.clone()),
            conjugations: Box::new(self.conjugations.clone()),
            declensions: Box::new(self.declensions.clone()),
            deck_writer: Box::new(self.writer.clone()),
        }
    }
}

/// Settings with zero delays and a checkpoint after every item
pub fn settings(job: &str, layout: SentenceLayout) -> JobSettings {
    JobSettings {
        run: RunOptions {
            force: false,
            checkpoint_interval: 1,
        },
        verb_delay: DelayPolicy::none(),
        noun_delay: DelayPolicy::none(),
        ..JobSettings::new(job, layout)
    }
}
