//! # deckgen pipeline
//!
//! Checkpointed enrichment of vocabulary lists into flashcard decks.
//!
//! **Stages (in order):**
//! - generate: translation, descriptive/example sentences, puzzle text
//! - grammar: noun declensions and verb conjugations
//! - voice: speech synthesis for every sentence column
//! - transcode: compressed audio for the deck
//! - package: sub-decks with notes and embedded media
//!
//! Progress lives in a [`store::KeyedStore`] persisted after every
//! checkpoint, so an interrupted job resumes where it stopped.

pub mod collaborators;
pub mod controller;
pub mod error;
pub mod layout;
pub mod prompts;
pub mod source;
pub mod stages;
pub mod store;
pub mod text;
pub mod throttle;

pub use controller::{Collaborators, JobSettings, PipelineController, RunSummary};
pub use error::{PipelineError, Result};
pub use layout::SentenceLayout;
pub use source::{classify, Item, SourceList, WordType};
pub use stages::{RunOptions, StageKind, StageReport};
pub use store::KeyedStore;
