//! Text-to-speech through an external command
//!
//! Each language maps to a program and an argument list. The placeholders
//! `{text}` and `{output}` are substituted per call; when `{text}` is absent
//! the text is appended as the last argument.

use super::{CollabResult, CollaboratorError, SpeechSession, SpeechSynthesizer};
use async_trait::async_trait;
use deckgen_common::config::SpeechCommandConfig;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Command-line speech synthesizer
pub struct CommandSpeech {
    commands: BTreeMap<String, SpeechCommandConfig>,
}

impl CommandSpeech {
    pub fn new(commands: BTreeMap<String, SpeechCommandConfig>) -> Self {
        Self { commands }
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSpeech {
    async fn open(
        &self,
        language: &str,
        media_dir: &Path,
    ) -> CollabResult<Box<dyn SpeechSession>> {
        let command = self
            .commands
            .get(language)
            .cloned()
            .ok_or_else(|| CollaboratorError::UnsupportedLanguage(language.to_string()))?;

        tokio::fs::create_dir_all(media_dir).await?;

        tracing::info!(
            language = %language,
            program = %command.program,
            "Speech session opened"
        );

        Ok(Box::new(CommandSession {
            language: language.to_string(),
            command,
            media_dir: media_dir.to_path_buf(),
        }))
    }
}

struct CommandSession {
    language: String,
    command: SpeechCommandConfig,
    media_dir: PathBuf,
}

/// Substitute placeholders in the configured argument list
fn render_args(args: &[String], text: &str, output: &Path) -> Vec<String> {
    let output = output.to_string_lossy();
    let mut rendered: Vec<String> = args
        .iter()
        .map(|arg| arg.replace("{text}", text).replace("{output}", &output))
        .collect();

    if !args.iter().any(|arg| arg.contains("{text}")) {
        rendered.push(text.to_string());
    }
    rendered
}

#[async_trait]
impl SpeechSession for CommandSession {
    async fn shoot(&mut self, text: &str, file_name: &str) -> CollabResult<PathBuf> {
        let output_path = self.media_dir.join(file_name);
        let args = render_args(&self.command.args, text, &output_path);

        let output = Command::new(&self.command.program)
            .args(&args)
            .output()
            .await
            .map_err(|e| {
                CollaboratorError::Unavailable(format!("{}: {}", self.command.program, e))
            })?;

        if !output.status.success() {
            return Err(CollaboratorError::Process(format!(
                "{} exited with {}: {}",
                self.command.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        if !tokio::fs::try_exists(&output_path).await.unwrap_or(false) {
            return Err(CollaboratorError::Process(format!(
                "{} wrote no audio to {}",
                self.command.program,
                output_path.display()
            )));
        }

        tracing::debug!(language = %self.language, file = %file_name, "Synthesized audio");
        Ok(output_path)
    }

    async fn close(self: Box<Self>) -> CollabResult<()> {
        tracing::info!(language = %self.language, "Speech session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn espeak() -> SpeechCommandConfig {
        SpeechCommandConfig {
            program: "espeak-ng".to_string(),
            args: vec![
                "-v".to_string(),
                "de".to_string(),
                "-w".to_string(),
                "{output}".to_string(),
                "{text}".to_string(),
            ],
        }
    }

    #[test]
    fn test_render_args_substitutes() {
        let args = render_args(&espeak().args, "Hallo Welt", Path::new("/m/00001-x.wav"));
        assert_eq!(args, vec!["-v", "de", "-w", "/m/00001-x.wav", "Hallo Welt"]);
    }

    #[test]
    fn test_render_args_appends_text() {
        let args = render_args(&["--out={output}".to_string()], "Hallo", Path::new("a.wav"));
        assert_eq!(args, vec!["--out=a.wav", "Hallo"]);
    }

    #[tokio::test]
    async fn test_unknown_language_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let mut commands = BTreeMap::new();
        commands.insert("de".to_string(), espeak());
        let speech = CommandSpeech::new(commands);

        let err = speech.open("fr", temp.path()).await.err().unwrap();
        assert!(err.is_configuration());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shoot_runs_command() {
        let temp = tempfile::tempdir().unwrap();
        let mut commands = BTreeMap::new();
        commands.insert(
            "de".to_string(),
            SpeechCommandConfig {
                program: "sh".to_string(),
                args: vec![
                    "-c".to_string(),
                    "printf '%s' \"$0\" > \"$1\"".to_string(),
                    "{text}".to_string(),
                    "{output}".to_string(),
                ],
            },
        );
        let speech = CommandSpeech::new(commands);

        let mut session = speech.open("de", temp.path()).await.unwrap();
        let path = session.shoot("Guten Tag", "00000-a.wav").await.unwrap();
        session.close().await.unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "Guten Tag");
    }
}
