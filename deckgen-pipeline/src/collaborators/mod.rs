//! External collaborators used by the stages
//!
//! Every collaborator sits behind a trait so stages can be driven by test
//! doubles. Session-based collaborators (language model, speech) are opened
//! once per stage run and closed when the stage finishes, even on failure.

pub mod grammar;
pub mod ollama;
pub mod package;
pub mod speech;
pub mod transcoder;

pub use grammar::{ConjugationFetcher, DeclensionFetcher};
pub use ollama::OllamaModel;
pub use package::{DeckDraft, NoteModel, SqliteDeckWriter};
pub use speech::CommandSpeech;
pub use transcoder::FfmpegTranscoder;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure reported by a collaborator call
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Connection or timeout failure
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("HTTP status {status}: {message}")]
    Http { status: u16, message: String },

    /// Collaborator is not reachable or not installed
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Response could not be interpreted
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// External process exited unsuccessfully
    #[error("Process failed: {0}")]
    Process(String),

    /// Language outside the supported set
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Output archive could not be written
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollaboratorError {
    /// Worth retrying: timeouts, refused connections, 5xx and 429
    pub fn is_transient(&self) -> bool {
        match self {
            CollaboratorError::Network(_) => true,
            CollaboratorError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Misconfiguration that will fail for every item alike
    pub fn is_configuration(&self) -> bool {
        matches!(self, CollaboratorError::UnsupportedLanguage(_))
    }
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            CollaboratorError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            CollaboratorError::Malformed(err.to_string())
        } else {
            CollaboratorError::Network(err.to_string())
        }
    }
}

/// Result type for collaborator calls
pub type CollabResult<T> = std::result::Result<T, CollaboratorError>;

/// Sentence-generating language model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Open a session primed with `system_prompt`
    async fn open(&self, system_prompt: &str) -> CollabResult<Box<dyn ModelSession>>;
}

/// One open language model session
#[async_trait]
pub trait ModelSession: Send {
    /// Send one prompt; `None` when the model produced no usable answer
    async fn shoot(&mut self, prompt: &str) -> CollabResult<Option<String>>;

    /// Release the session
    async fn close(self: Box<Self>) -> CollabResult<()>;
}

/// Text-to-speech engine
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Open a session for `language` ("de" or "en") writing into `media_dir`
    async fn open(&self, language: &str, media_dir: &Path)
        -> CollabResult<Box<dyn SpeechSession>>;
}

/// One open speech session
#[async_trait]
pub trait SpeechSession: Send {
    /// Synthesize `text` into `file_name` inside the media folder
    async fn shoot(&mut self, text: &str, file_name: &str) -> CollabResult<PathBuf>;

    async fn close(self: Box<Self>) -> CollabResult<()>;
}

/// Converts a waveform file to the compressed deck format
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Produce the compressed sibling of `source`; existing outputs are kept
    async fn transcode(&self, source: &Path) -> CollabResult<PathBuf>;

    /// Path the compressed sibling of `source` will have
    fn target_for(&self, source: &Path) -> PathBuf {
        source.with_extension("mp3")
    }
}

/// Grammatical-info lookup for one word
#[async_trait]
pub trait GrammarFetcher: Send + Sync {
    /// Structured grammar as JSON text, `None` when the word is unknown
    async fn lookup(&self, word: &str) -> CollabResult<Option<String>>;
}

/// Writes a packaged deck to disk
#[async_trait]
pub trait DeckWriter: Send + Sync {
    /// Write one deck archive and return its path
    async fn write(&self, deck: &DeckDraft) -> CollabResult<PathBuf>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(CollaboratorError::Network("timeout".into()).is_transient());
        assert!(CollaboratorError::Http {
            status: 503,
            message: String::new()
        }
        .is_transient());
        assert!(CollaboratorError::Http {
            status: 429,
            message: String::new()
        }
        .is_transient());
        assert!(!CollaboratorError::Http {
            status: 404,
            message: String::new()
        }
        .is_transient());
        assert!(!CollaboratorError::Malformed("x".into()).is_transient());
    }

    #[test]
    fn test_unsupported_language_is_configuration() {
        assert!(CollaboratorError::UnsupportedLanguage("fr".into()).is_configuration());
        assert!(!CollaboratorError::Process("exit 1".into()).is_configuration());
    }
}
