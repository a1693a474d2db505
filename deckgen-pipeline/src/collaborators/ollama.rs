//! Language model over the Ollama HTTP API
//!
//! `open` checks that the configured model is served, `shoot` issues one
//! non-streaming `/api/generate` call with the session's system prompt and
//! `close` asks the server to unload the model (`keep_alive: 0`).

use super::{CollabResult, CollaboratorError, LanguageModel, ModelSession};
use crate::throttle::{retry_with_jitter, RetryPolicy};
use async_trait::async_trait;
use deckgen_common::config::LlmConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: &'a GenerateOptions,
}

#[derive(Debug, Serialize)]
struct UnloadRequest<'a> {
    model: &'a str,
    keep_alive: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Ollama-backed language model
pub struct OllamaModel {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    options: GenerateOptions,
    retry: RetryPolicy,
}

impl OllamaModel {
    pub fn new(config: &LlmConfig, retry: RetryPolicy) -> CollabResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            options: GenerateOptions {
                temperature: config.temperature,
                top_k: config.top_k,
                top_p: config.top_p,
                num_predict: config.max_tokens,
            },
            retry,
        })
    }

    async fn served_models(&self) -> CollabResult<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let (client, url) = (&self.http_client, &url);
        let tags: TagsResponse = retry_with_jitter("ollama tags", &self.retry, move || async move {
            let response = client.get(url).send().await?.error_for_status()?;
            Ok::<_, CollaboratorError>(response.json().await?)
        })
        .await?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

/// "vicuna" matches "vicuna:latest"; a tagged name must match exactly
fn is_served(model: &str, served: &[String]) -> bool {
    served.iter().any(|name| {
        name == model || (!model.contains(':') && name.split(':').next() == Some(model))
    })
}

#[async_trait]
impl LanguageModel for OllamaModel {
    async fn open(&self, system_prompt: &str) -> CollabResult<Box<dyn ModelSession>> {
        let served = self.served_models().await?;
        if !is_served(&self.model, &served) {
            return Err(CollaboratorError::Unavailable(format!(
                "model '{}' is not served at {} (available: {})",
                self.model,
                self.base_url,
                served.join(", ")
            )));
        }

        tracing::info!(model = %self.model, "Language model session opened");

        Ok(Box::new(OllamaSession {
            http_client: self.http_client.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            system: system_prompt.to_string(),
            options: self.options.clone(),
            retry: self.retry,
        }))
    }
}

struct OllamaSession {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    system: String,
    options: GenerateOptions,
    retry: RetryPolicy,
}

#[async_trait]
impl ModelSession for OllamaSession {
    async fn shoot(&mut self, prompt: &str) -> CollabResult<Option<String>> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            system: &self.system,
            stream: false,
            options: &self.options,
        };

        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "Querying language model");

        let (client, url, request) = (&self.http_client, &url, &request);
        let reply: GenerateResponse = retry_with_jitter("ollama generate", &self.retry, move || async move {
            let response = client
                .post(url)
                .json(request)
                .send()
                .await?
                .error_for_status()?;
            Ok::<_, CollaboratorError>(response.json().await?)
        })
        .await?;

        let text = reply.response.trim();
        Ok(if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        })
    }

    async fn close(self: Box<Self>) -> CollabResult<()> {
        let url = format!("{}/api/generate", self.base_url);
        self.http_client
            .post(&url)
            .json(&UnloadRequest {
                model: &self.model,
                keep_alive: 0,
            })
            .send()
            .await?
            .error_for_status()?;

        tracing::info!(model = %self.model, "Language model session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_served() {
        let served = vec!["vicuna:7b".to_string(), "llama3:latest".to_string()];
        assert!(is_served("vicuna:7b", &served));
        assert!(is_served("llama3", &served));
        assert!(!is_served("vicuna:13b", &served));
        assert!(!is_served("mistral", &served));
    }

    #[test]
    fn test_generate_request_shape() {
        let options = GenerateOptions {
            temperature: 0.2,
            top_k: 50,
            top_p: 0.3,
            num_predict: 256,
        };
        let request = GenerateRequest {
            model: "vicuna:7b",
            prompt: "hi",
            system: "be precise",
            stream: false,
            options: &options,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 256);
        assert_eq!(json["system"], "be precise");
    }
}
