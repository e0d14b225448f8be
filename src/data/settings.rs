use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:11434/api";
pub const DEFAULT_MODEL: &str = "deepseek-coder-v2:latest";
/// Local models are slow on large prompts; requests are never retried, so
/// the timeout is generous.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10_000;
pub const DEFAULT_NUM_PREDICT: u32 = 4096;

/// Connection settings for the inference endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InferenceSettings {
    /// Base path of the API, e.g. `http://localhost:11434/api`
    pub api_url: String,
    pub model: String,
    #[serde(rename = "timeout_secs", with = "duration_secs")]
    pub timeout: Duration,
    /// Maximum number of tokens the model may generate per call
    pub num_predict: u32,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            num_predict: DEFAULT_NUM_PREDICT,
        }
    }
}

impl InferenceSettings {
    /// Full URL of the non-streaming generate endpoint.
    pub fn generate_url(&self) -> String {
        format!("{}/generate", self.api_url.trim_end_matches('/'))
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }
}
