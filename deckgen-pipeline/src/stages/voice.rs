//! Voice synthesis for the audio columns of one language
//!
//! Completion predicate: every audio column of the language already holds
//! a file name. Each new recording gets a fresh `NNNNN-<uuid>.wav` name so
//! a rerun never overwrites another item's audio.

use super::{has_audio, session_open_error, ItemState, Stage, StageKind};
use crate::collaborators::{SpeechSession, SpeechSynthesizer};
use crate::error::{PipelineError, Result};
use crate::layout::{text_column, Language, SentenceLayout, GRAMMAR_COLUMN, TRANSLATION_COLUMN};
use crate::source::Item;
use crate::store::{KeyedStore, RowValues};
use crate::text::flatten_grammar;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info};
use uuid::Uuid;

/// File name for a new recording of item `index`
pub fn audio_file_name(index: usize) -> String {
    format!("{:05}-{}.wav", index, Uuid::new_v4())
}

/// Phrase spoken before the text of `column`
///
/// The first filled German sentence is introduced by the grammar summary,
/// or the bare headword when there is none; the first English translation
/// by the translated headword.
fn lead_in(language: Language, column: &str, item: &Item, row: &RowValues) -> String {
    let value = |name: &str| row.get(name).map(String::as_str).unwrap_or("");

    match (language, column) {
        (Language::German, "1_fil") => {
            let grammar = flatten_grammar(value(GRAMMAR_COLUMN), item.word_type);
            if grammar.is_empty() {
                format!("{}. ", item.word)
            } else {
                grammar
            }
        }
        (Language::English, "1_trans") => format!("{}. ", value(TRANSLATION_COLUMN)),
        _ => String::new(),
    }
}

pub struct VoiceStage<'a> {
    speech: &'a dyn SpeechSynthesizer,
    language: Language,
    columns: Vec<String>,
    media_dir: PathBuf,
    session: Option<Box<dyn SpeechSession>>,
}

impl<'a> VoiceStage<'a> {
    pub fn new(
        speech: &'a dyn SpeechSynthesizer,
        layout: SentenceLayout,
        language: Language,
        media_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            speech,
            language,
            columns: layout.voice_columns(language),
            media_dir: media_dir.into(),
            session: None,
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    async fn session(&mut self) -> Result<&mut dyn SpeechSession> {
        if self.session.is_none() {
            let session = self
                .speech
                .open(self.language.code(), &self.media_dir)
                .await
                .map_err(|e| session_open_error("speech", e))?;
            self.session = Some(session);
        }

        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(PipelineError::SessionOpen {
                collaborator: "speech",
                message: "session missing after open".to_string(),
            }),
        }
    }
}

#[async_trait]
impl Stage for VoiceStage<'_> {
    fn kind(&self) -> StageKind {
        StageKind::Voice
    }

    fn is_complete(&self, store: &KeyedStore, item: &Item) -> Result<bool> {
        Ok(store
            .get_values(&item.word, self.columns.as_slice())?
            .map(|values| values.values().all(|v| has_audio(v)))
            .unwrap_or(false))
    }

    async fn process(
        &mut self,
        index: usize,
        item: &Item,
        store: &mut KeyedStore,
        force: bool,
    ) -> Result<ItemState> {
        let Some(row) = store.row(&item.word) else {
            debug!(index, key = %item.word, "No row yet, leaving voice pending");
            return Ok(ItemState::Pending);
        };

        let language = self.language;
        let mut recorded = 0;

        for column in self.columns.clone() {
            if !force && row.get(&column).is_some_and(|v| has_audio(v)) {
                continue;
            }
            let text = row.get(text_column(&column)).map(String::as_str).unwrap_or("");
            if text.trim().is_empty() {
                debug!(index, key = %item.word, column = %column, "No text to voice");
                continue;
            }

            let spoken = format!("{}{}", lead_in(language, text_column(&column), item, &row), text);
            let file_name = audio_file_name(index);
            self.session().await?.shoot(&spoken, &file_name).await?;

            // Written per column so a later failure keeps earlier audio
            store.upsert(&item.word, [(column.as_str(), file_name)])?;
            recorded += 1;
        }

        if recorded == 0 {
            Ok(ItemState::Skipped)
        } else {
            Ok(ItemState::Upserted)
        }
    }

    async fn finish(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            session.close().await?;
            info!(language = self.language.code(), "Speech session closed");
        }
        Ok(())
    }
}
