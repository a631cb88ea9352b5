//! Inference collaborator: the language model that turns a prompt into an
//! intent document.
//!
//! The model is probabilistic and may return malformed JSON or fail
//! outright; the [`IntentResolver`](crate::intent::IntentResolver) absorbs
//! both. Calls are blocking and happen inside the turn loop, so a stalled
//! server stalls the assistant until the HTTP timeout fires.

use miette::Diagnostic;
use thiserror::Error;

use crate::context::ContextSnapshot;

/// Errors from the inference subsystem.
#[derive(Debug, Error, Diagnostic)]
pub enum InferenceError {
    #[error("Ollama is not available at {url}")]
    #[diagnostic(
        code(voxa::inference::unavailable),
        help("Start Ollama with `ollama serve`, or set `inference.enabled = false` for offline mode.")
    )]
    Unavailable { url: String },

    #[error("inference request failed: {message}")]
    #[diagnostic(
        code(voxa::inference::request_failed),
        help("Check that Ollama is running and the model is pulled.")
    )]
    RequestFailed { message: String },

    #[error("failed to parse inference response: {message}")]
    #[diagnostic(
        code(voxa::inference::parse_error),
        help("The server returned an unexpected response format.")
    )]
    ParseError { message: String },

    #[error("inference is disabled")]
    #[diagnostic(
        code(voxa::inference::disabled),
        help("Enable it with `inference.enabled = true` in config.toml.")
    )]
    Disabled,
}

pub type InferenceResult<T> = std::result::Result<T, InferenceError>;

/// Something that can answer a prompt with an intent document.
pub trait InferenceBackend {
    /// Run the prompt and return the model's raw text.
    fn process_query(&self, prompt: &str, context: &ContextSnapshot) -> InferenceResult<String>;
}

/// Configuration for the Ollama client.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL for the Ollama API.
    pub base_url: String,
    /// Model name to use.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "llama3.2".into(),
            timeout_secs: 60,
        }
    }
}

/// Blocking client for the Ollama `/api/generate` endpoint.
pub struct OllamaBackend {
    config: OllamaConfig,
    agent: ureq::Agent,
}

impl OllamaBackend {
    pub fn new(config: OllamaConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build();
        Self { config, agent }
    }

    /// Check that the server answers at all.
    pub fn probe(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(5))
            .build();
        matches!(agent.get(&url).call(), Ok(resp) if resp.status() == 200)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

impl InferenceBackend for OllamaBackend {
    fn process_query(&self, prompt: &str, context: &ContextSnapshot) -> InferenceResult<String> {
        let url = format!("{}/api/generate", self.config.base_url);

        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "format": "json",
            "stream": false,
        });

        tracing::debug!(
            model = %self.config.model,
            topic = ?context.topic,
            "sending inference request"
        );

        let resp = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_json(body)
            .map_err(|e| match e {
                ureq::Error::Transport(_) => InferenceError::Unavailable {
                    url: self.config.base_url.clone(),
                },
                other => InferenceError::RequestFailed {
                    message: other.to_string(),
                },
            })?;

        let json: serde_json::Value =
            resp.into_json().map_err(|e| InferenceError::ParseError {
                message: e.to_string(),
            })?;

        json["response"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| InferenceError::ParseError {
                message: "missing 'response' field".into(),
            })
    }
}

impl std::fmt::Debug for OllamaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaBackend")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

/// Backend used when inference is switched off. Every query fails, so the
/// resolver answers with its apology and only greetings and shortcuts work.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineBackend;

impl InferenceBackend for OfflineBackend {
    fn process_query(&self, _prompt: &str, _context: &ContextSnapshot) -> InferenceResult<String> {
        Err(InferenceError::Disabled)
    }
}
