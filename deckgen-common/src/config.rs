//! Bootstrap configuration and root folder resolution
//!
//! Configuration is read once at startup from a TOML file. Every field has a
//! compiled default, so a missing file only produces a warning.
//!
//! # Root folder priority
//!
//! 1. Command-line argument (highest priority)
//! 2. `DECKGEN_ROOT_FOLDER` environment variable
//! 3. `root_folder` key of the TOML file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "DECKGEN_ROOT_FOLDER";

/// Name of the bootstrap configuration file
pub const CONFIG_FILE_NAME: &str = "deckgen.toml";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Root folder for stores, media and decks (optional)
    pub root_folder: Option<PathBuf>,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Pipeline defaults
    pub pipeline: PipelineSection,

    /// Language model backend
    pub llm: LlmConfig,

    /// Text-to-speech commands keyed by language code ("de", "en")
    pub speech: BTreeMap<String, SpeechCommandConfig>,

    /// Audio transcoder
    pub transcoder: TranscoderConfig,

    /// Grammatical-info lookups
    pub grammar: GrammarConfig,

    /// Retry policy for network collaborators
    pub retry: RetryConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Pipeline defaults, overridable from the command line
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Sentence layout: "one-sentence" or "two-sentence"
    pub layout: String,
    /// Persist the store every N items
    pub checkpoint_interval: usize,
    /// Cards per packaged sub-deck (None = one deck)
    pub cards_per_deck: Option<usize>,
    /// Explicit number of sub-decks
    pub deck_count: Option<usize>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            layout: "two-sentence".to_string(),
            checkpoint_interval: 25,
            cards_per_deck: None,
            deck_count: None,
        }
    }
}

/// Language model backend settings (Ollama-compatible HTTP API)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "vicuna:7b".to_string(),
            temperature: 0.2,
            top_k: 50,
            top_p: 0.3,
            max_tokens: 256,
            timeout_secs: 120,
        }
    }
}

/// External text-to-speech command
///
/// `args` may contain the placeholders `{text}` and `{output}`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SpeechCommandConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Default speech commands (espeak-ng) for German and English
pub fn default_speech_commands() -> BTreeMap<String, SpeechCommandConfig> {
    let espeak = |voice: &str| SpeechCommandConfig {
        program: "espeak-ng".to_string(),
        args: vec![
            "-v".to_string(),
            voice.to_string(),
            "-w".to_string(),
            "{output}".to_string(),
            "{text}".to_string(),
        ],
    };

    let mut commands = BTreeMap::new();
    commands.insert("de".to_string(), espeak("de"));
    commands.insert("en".to_string(), espeak("en"));
    commands
}

/// Audio transcoder settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranscoderConfig {
    pub program: String,
    pub bitrate: String,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            bitrate: "32k".to_string(),
        }
    }
}

/// Grammatical-info lookup settings
///
/// The delay bounds throttle outbound requests to the scraped sites.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GrammarConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub conjugation_url: String,
    pub declension_url: String,
    pub verb_delay_min_secs: f64,
    pub verb_delay_max_secs: f64,
    pub noun_delay_min_secs: f64,
    pub noun_delay_max_secs: f64,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string(),
            timeout_secs: 30,
            conjugation_url: "https://conjugator.reverso.net/conjugation-german-verb-{word}.html".to_string(),
            declension_url: "https://www.collinsdictionary.com/dictionary/german-english/{word}".to_string(),
            verb_delay_min_secs: 1.0,
            verb_delay_max_secs: 5.0,
            noun_delay_min_secs: 0.2,
            noun_delay_max_secs: 3.0,
        }
    }
}

/// Retry policy for network collaborators
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl TomlConfig {
    /// Speech command for a language, falling back to the compiled defaults
    pub fn speech_command(&self, language: &str) -> Option<SpeechCommandConfig> {
        self.speech
            .get(language)
            .cloned()
            .or_else(|| default_speech_commands().remove(language))
    }
}

/// Load the bootstrap configuration
///
/// An explicit path must exist. Without one, the platform config file is
/// tried and a missing file falls back to defaults with a warning.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return read_toml_config(path);
    }

    match default_config_path() {
        Some(path) if path.exists() => read_toml_config(&path),
        Some(path) => {
            warn!(
                "No config file at {}, using compiled defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
        None => {
            warn!("Could not determine config directory, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Parse a TOML configuration file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Platform config file location (`~/.config/deckgen/deckgen.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("deckgen").join(CONFIG_FILE_NAME))
}

/// Resolve the root folder following the documented priority order
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("deckgen"))
        .unwrap_or_else(|| PathBuf::from("./deckgen_data"))
}
