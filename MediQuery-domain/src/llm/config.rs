use std::env;
use std::fs;
use std::path::Path;

use tracing::{info, warn};

/// Model used when `LLM_MODEL` is not set
pub const DEFAULT_MODEL: &str = "microsoft/Phi-3-mini-4k-instruct";

/// Hugging Face inference provider route
pub const DEFAULT_BASE_URL: &str = "https://router.huggingface.co/hf-inference/models";

/// File holding the API key when `HF_API_KEY` is not set
pub const DEFAULT_API_KEY_FILE: &str = "hf_api_key.txt";

/// LLM configuration
#[derive(Clone, PartialEq)]
pub struct LlmConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

// Keep the API key out of logs
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: 256,
            temperature: 0.1,
            timeout_seconds: 60,
        }
    }
}

impl LlmConfig {
    /// Create a new LLM configuration from environment variables
    ///
    /// The API key comes from `HF_API_KEY`, or from the file named by
    /// `HF_API_KEY_FILE` (default `hf_api_key.txt`).
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let model = env::var("LLM_MODEL").unwrap_or(defaults.model);

        let api_key = env::var("HF_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .or_else(|| {
                let key_file = env::var("HF_API_KEY_FILE")
                    .unwrap_or_else(|_| DEFAULT_API_KEY_FILE.to_string());
                read_api_key_file(Path::new(&key_file))
            });

        let base_url = env::var("LLM_BASE_URL").unwrap_or(defaults.base_url);

        let max_tokens = env::var("LLM_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(defaults.max_tokens);

        let temperature = env::var("LLM_TEMPERATURE")
            .ok()
            .and_then(|s| s.parse::<f32>().ok())
            .unwrap_or(defaults.temperature);

        let timeout_seconds = env::var("LLM_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.timeout_seconds);

        if api_key.is_none() {
            warn!("No Hugging Face API key found; LLM requests will fail");
        }

        info!(
            "LLM configuration: model={}, max_tokens={}, timeout={}s",
            model, max_tokens, timeout_seconds
        );

        Self {
            model,
            api_key,
            base_url,
            max_tokens,
            temperature,
            timeout_seconds,
        }
    }

    /// True when an API key is available
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Read and trim an API key file, ignoring missing or blank files
pub fn read_api_key_file(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let key = contents.trim();
            if key.is_empty() {
                warn!("API key file {} is empty", path.display());
                None
            } else {
                Some(key.to_string())
            }
        }
        Err(_) => None,
    }
}
