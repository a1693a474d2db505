//! Grammatical-info lookup for nouns and verbs
//!
//! One stage instance handles one word type with its own fetcher and
//! delay policy. Every lookup is followed by a randomized pause, whether
//! or not it found anything.

use super::{ItemState, Stage, StageKind};
use crate::collaborators::GrammarFetcher;
use crate::error::Result;
use crate::layout::GRAMMAR_COLUMN;
use crate::source::{Item, WordType};
use crate::store::KeyedStore;
use crate::text::grammar_is_complete;
use crate::throttle::DelayPolicy;
use async_trait::async_trait;
use tracing::{debug, warn};

pub struct GrammarStage<'a> {
    fetcher: &'a dyn GrammarFetcher,
    word_type: WordType,
    delay: DelayPolicy,
}

impl<'a> GrammarStage<'a> {
    pub fn new(fetcher: &'a dyn GrammarFetcher, word_type: WordType, delay: DelayPolicy) -> Self {
        Self {
            fetcher,
            word_type,
            delay,
        }
    }

    /// Noun declensions
    pub fn nouns(fetcher: &'a dyn GrammarFetcher, delay: DelayPolicy) -> Self {
        Self::new(fetcher, WordType::Noun, delay)
    }

    /// Verb conjugations
    pub fn verbs(fetcher: &'a dyn GrammarFetcher, delay: DelayPolicy) -> Self {
        Self::new(fetcher, WordType::Verb, delay)
    }
}

#[async_trait]
impl Stage for GrammarStage<'_> {
    fn kind(&self) -> StageKind {
        StageKind::Grammar
    }

    fn applies_to(&self, item: &Item) -> bool {
        item.word_type == self.word_type
    }

    fn is_complete(&self, store: &KeyedStore, item: &Item) -> Result<bool> {
        Ok(store
            .get_values(&item.word, &[GRAMMAR_COLUMN])?
            .and_then(|values| values.get(GRAMMAR_COLUMN).cloned())
            .map(|blob| grammar_is_complete(&blob, item.word_type))
            .unwrap_or(false))
    }

    async fn process(
        &mut self,
        index: usize,
        item: &Item,
        store: &mut KeyedStore,
        _force: bool,
    ) -> Result<ItemState> {
        if !store.is_duplicate(&item.word) {
            debug!(index, key = %item.word, "No row yet, leaving grammar pending");
            return Ok(ItemState::Pending);
        }

        let found = self.fetcher.lookup(&item.word).await;
        self.delay.pause().await;

        match found? {
            Some(blob) if grammar_is_complete(&blob, item.word_type) => {
                store.upsert(&item.word, [(GRAMMAR_COLUMN, blob)])?;
                Ok(ItemState::Upserted)
            }
            _ => {
                warn!(index, key = %item.word, word_type = %item.word_type, "No grammatical info found");
                Ok(ItemState::Failed)
            }
        }
    }
}
