//! Compress recorded audio
//!
//! The store is not changed: audio columns keep the `.wav` name and the
//! packager refers to the compressed sibling.

use super::{has_audio, ItemState, Stage, StageKind};
use crate::collaborators::Transcoder;
use crate::error::Result;
use crate::layout::SentenceLayout;
use crate::source::Item;
use crate::store::KeyedStore;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct TranscodeStage<'a> {
    transcoder: &'a dyn Transcoder,
    columns: Vec<String>,
    media_dir: PathBuf,
}

impl<'a> TranscodeStage<'a> {
    pub fn new(transcoder: &'a dyn Transcoder, layout: SentenceLayout, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            transcoder,
            columns: layout.all_voice_columns(),
            media_dir: media_dir.into(),
        }
    }

    /// Recorded files of an item that are not compressed yet
    fn sources(&self, store: &KeyedStore, item: &Item) -> Result<Option<Vec<PathBuf>>> {
        let Some(values) = store.get_values(&item.word, self.columns.as_slice())? else {
            return Ok(None);
        };

        Ok(Some(
            values
                .values()
                .filter(|file| has_audio(file))
                .map(|file| self.media_dir.join(file.trim()))
                .filter(|source| !is_compressed(source))
                .collect(),
        ))
    }
}

fn is_compressed(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "mp3")
}

#[async_trait]
impl Stage for TranscodeStage<'_> {
    fn kind(&self) -> StageKind {
        StageKind::Transcode
    }

    fn is_complete(&self, store: &KeyedStore, item: &Item) -> Result<bool> {
        Ok(match self.sources(store, item)? {
            Some(sources) => sources
                .iter()
                .all(|source| self.transcoder.target_for(source).exists()),
            None => false,
        })
    }

    async fn process(
        &mut self,
        index: usize,
        item: &Item,
        store: &mut KeyedStore,
        _force: bool,
    ) -> Result<ItemState> {
        let Some(sources) = self.sources(store, item)? else {
            debug!(index, key = %item.word, "No row yet, leaving transcode pending");
            return Ok(ItemState::Pending);
        };
        if sources.is_empty() {
            return Ok(ItemState::Skipped);
        }

        for source in &sources {
            let target = self.transcoder.transcode(source).await?;
            debug!(index, key = %item.word, target = %target.display(), "Audio compressed");
        }
        Ok(ItemState::Upserted)
    }
}
