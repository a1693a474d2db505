//! MP3 transcoding with ffmpeg

use super::{CollabResult, CollaboratorError, Transcoder};
use async_trait::async_trait;
use deckgen_common::config::TranscoderConfig;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Converts waveform files to constant-bitrate MP3
pub struct FfmpegTranscoder {
    program: String,
    bitrate: String,
}

impl FfmpegTranscoder {
    pub fn new(config: &TranscoderConfig) -> Self {
        Self {
            program: config.program.clone(),
            bitrate: config.bitrate.clone(),
        }
    }

    fn args(&self, source: &Path, target: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            source.to_string_lossy().into_owned(),
            "-b:a".to_string(),
            self.bitrate.clone(),
            target.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, source: &Path) -> CollabResult<PathBuf> {
        let target = self.target_for(source);
        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            return Ok(target);
        }

        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            return Err(CollaboratorError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("audio source {} does not exist", source.display()),
            )));
        }

        let output = Command::new(&self.program)
            .args(self.args(source, &target))
            .output()
            .await
            .map_err(|e| CollaboratorError::Unavailable(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            // ffmpeg may leave a truncated file behind
            let _ = tokio::fs::remove_file(&target).await;
            return Err(CollaboratorError::Process(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        tracing::debug!(source = %source.display(), target = %target.display(), "Transcoded audio");
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcoder(program: &str) -> FfmpegTranscoder {
        FfmpegTranscoder::new(&TranscoderConfig {
            program: program.to_string(),
            bitrate: "32k".to_string(),
        })
    }

    #[test]
    fn test_ffmpeg_arguments() {
        let args = transcoder("ffmpeg").args(Path::new("a.wav"), Path::new("a.mp3"));
        assert_eq!(
            args,
            vec!["-y", "-loglevel", "error", "-i", "a.wav", "-b:a", "32k", "a.mp3"]
        );
    }

    #[tokio::test]
    async fn test_existing_target_is_kept() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("00001-x.wav");
        let target = temp.path().join("00001-x.mp3");
        std::fs::write(&target, b"already there").unwrap();

        // A missing program proves no process was started
        let result = transcoder("definitely-not-ffmpeg").transcode(&source).await.unwrap();
        assert_eq!(result, target);
        assert_eq!(std::fs::read(&target).unwrap(), b"already there");
    }

    #[tokio::test]
    async fn test_missing_source_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let result = transcoder("ffmpeg")
            .transcode(&temp.path().join("nope.wav"))
            .await;
        assert!(result.is_err());
    }
}
