//! Sentence generation: translation, sentences and puzzle text
//!
//! Completion predicate: a row exists for the word. Items carrying a
//! reference gloss are filled from it and never reach the model.

use super::{session_open_error, ItemState, Stage, StageKind};
use crate::collaborators::{LanguageModel, ModelSession};
use crate::error::{PipelineError, Result};
use crate::layout::{SentenceLayout, TRANSLATION_COLUMN};
use crate::prompts::{self, SentenceKind, SYSTEM_PROMPT};
use crate::source::{Gloss, Item};
use crate::store::KeyedStore;
use crate::text::{obscure_closest_word, remove_article_de, remove_article_en};
use async_trait::async_trait;
use tracing::{debug, info};

/// Sentence kinds per slot
pub fn sentence_kinds(layout: SentenceLayout) -> &'static [SentenceKind] {
    match layout {
        SentenceLayout::OneSentence => &[SentenceKind::Example],
        SentenceLayout::TwoSentence => &[SentenceKind::Descriptive, SentenceKind::Example],
    }
}

/// Columns for one filled slot
fn slot_entries(slot: usize, word: &str, german: &str, english: &str) -> [(String, String); 3] {
    [
        (
            format!("{}_pzl", slot),
            obscure_closest_word(german, &remove_article_de(word)),
        ),
        (format!("{}_fil", slot), german.to_string()),
        (format!("{}_trans", slot), english.to_string()),
    ]
}

fn gloss_entries(word: &str, gloss: &Gloss) -> Vec<(String, String)> {
    let mut entries = vec![(TRANSLATION_COLUMN.to_string(), gloss.word_trans.clone())];
    entries.extend(slot_entries(1, word, &gloss.sentence, &gloss.sentence_trans));
    entries
}

pub struct GenerateStage<'a> {
    model: &'a dyn LanguageModel,
    layout: SentenceLayout,
    session: Option<Box<dyn ModelSession>>,
}

impl<'a> GenerateStage<'a> {
    pub fn new(model: &'a dyn LanguageModel, layout: SentenceLayout) -> Self {
        Self {
            model,
            layout,
            session: None,
        }
    }

    /// Open the model session on first use
    async fn session(&mut self) -> Result<&mut dyn ModelSession> {
        if self.session.is_none() {
            let session = self
                .model
                .open(SYSTEM_PROMPT)
                .await
                .map_err(|e| session_open_error("language model", e))?;
            info!("Language model session opened");
            self.session = Some(session);
        }

        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(PipelineError::SessionOpen {
                collaborator: "language model",
                message: "session missing after open".to_string(),
            }),
        }
    }

    async fn generate(&mut self, item: &Item) -> Result<Vec<(String, String)>> {
        let kinds = sentence_kinds(self.layout);
        let session = self.session().await?;

        let translation = prompts::translate(session, &item.word, item.word_type).await?;
        let word_trans = remove_article_en(&translation.english);
        debug!(key = %item.word, translation = %word_trans, "Translated");

        let mut entries = vec![(TRANSLATION_COLUMN.to_string(), word_trans.clone())];
        for (i, kind) in kinds.iter().enumerate() {
            let pair = prompts::sentence(session, *kind, &item.word, item.word_type, &word_trans).await?;
            entries.extend(slot_entries(i + 1, &item.word, &pair.german, &pair.english));
        }
        Ok(entries)
    }
}

#[async_trait]
impl Stage for GenerateStage<'_> {
    fn kind(&self) -> StageKind {
        StageKind::Generate
    }

    fn is_complete(&self, store: &KeyedStore, item: &Item) -> Result<bool> {
        Ok(store.is_duplicate(&item.word))
    }

    async fn process(
        &mut self,
        _index: usize,
        item: &Item,
        store: &mut KeyedStore,
        _force: bool,
    ) -> Result<ItemState> {
        // Everything is generated before the first upsert so a failed
        // item leaves no partial row behind
        let entries = match &item.reference {
            Some(gloss) => gloss_entries(&item.word, gloss),
            None => self.generate(item).await?,
        };

        store.upsert(&item.word, entries)?;
        Ok(ItemState::Upserted)
    }

    async fn finish(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            session.close().await?;
            info!("Language model session closed");
        }
        Ok(())
    }
}
