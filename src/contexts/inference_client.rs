use crate::data::InferenceSettings;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

/// Prefix of the text returned in place of a response when a call fails.
pub const FAILED_RESPONSE_PREFIX: &str = "generation failed: ";

/// Errors raised by a single completion request
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("endpoint returned status {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("request failed: {detail}")]
    Transport { detail: String },
    #[error("could not decode endpoint response: {detail}")]
    Decode { detail: String },
}

/// Settings shared between the orchestrator, which may replace them at any
/// time, and the client, which reads them once per call.
pub type SharedSettings = Arc<RwLock<InferenceSettings>>;

pub fn shared_settings(settings: InferenceSettings) -> SharedSettings {
    Arc::new(RwLock::new(settings))
}

/// Single-shot text completion against a model endpoint
pub trait InferenceClient: Send + Sync {
    /// Sends one prompt and returns the generated text.
    fn try_complete(&self, prompt: &str) -> Result<String, InferenceError>;

    /// Like [`InferenceClient::try_complete`] but never fails: an error is
    /// folded into a degraded response that embeds its detail, so a pipeline
    /// can carry on with the next stage.
    fn complete(&self, prompt: &str) -> String {
        match self.try_complete(prompt) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "completion failed, continuing with degraded response");
                degraded_response(&e)
            }
        }
    }
}

/// The sentinel text that stands in for a failed completion.
pub fn degraded_response(error: &InferenceError) -> String {
    format!("{}{}", FAILED_RESPONSE_PREFIX, error)
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Client for an Ollama-compatible `/generate` endpoint
#[derive(Clone)]
pub struct OllamaClient {
    settings: SharedSettings,
}

impl OllamaClient {
    pub fn new(settings: SharedSettings) -> Self {
        Self { settings }
    }

    /// Copy of the settings the next call will use.
    pub fn settings(&self) -> InferenceSettings {
        self.settings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl InferenceClient for OllamaClient {
    fn try_complete(&self, prompt: &str) -> Result<String, InferenceError> {
        // Snapshot once: an update arriving mid-call applies to the next call.
        let settings = self.settings();
        let url = settings.generate_url();

        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| InferenceError::Transport {
                detail: e.to_string(),
            })?;

        let request = GenerateRequest {
            model: &settings.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: settings.num_predict,
            },
        };

        debug!(url = %url, model = %settings.model, prompt_chars = prompt.len(), "sending completion request");
        let started = Instant::now();

        let response = client
            .post(&url)
            .json(&request)
            .send()
            .map_err(|e| InferenceError::Transport {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let body = response.text().map_err(|e| InferenceError::Transport {
            detail: e.to_string(),
        })?;
        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| InferenceError::Decode {
                detail: e.to_string(),
            })?;

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            response_chars = parsed.response.len(),
            "completion finished"
        );

        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingClient;

    impl InferenceClient for FailingClient {
        fn try_complete(&self, _prompt: &str) -> Result<String, InferenceError> {
            Err(InferenceError::Status {
                status: 500,
                detail: "model crashed".to_string(),
            })
        }
    }

    #[test]
    fn test_complete_embeds_error_detail() {
        let text = FailingClient.complete("hello");
        assert!(text.starts_with(FAILED_RESPONSE_PREFIX));
        assert!(text.contains("500"));
        assert!(text.contains("model crashed"));
    }

    #[test]
    fn test_request_body_shape() {
        let request = GenerateRequest {
            model: "m",
            prompt: "p",
            stream: false,
            options: GenerateOptions { num_predict: 4096 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 4096);
    }

    #[test]
    fn test_missing_response_field_reads_empty() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"done": true}"#).unwrap();
        assert_eq!(parsed.response, "");
    }

    #[test]
    fn test_settings_update_visible_to_client() {
        let shared = shared_settings(InferenceSettings::default());
        let client = OllamaClient::new(shared.clone());

        shared.write().unwrap().model = "qwen2.5-coder:7b".to_string();
        assert_eq!(client.settings().model, "qwen2.5-coder:7b");
    }
}
