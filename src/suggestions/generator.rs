//! Suggestion generation seam
//!
//! The completion call itself lives outside this crate. The pipeline only
//! sees a `SuggestionGenerator` that turns a prompt into text.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::suggestions::types::{CodeIssue, TokenUsage};

/// Errors from the generation stage
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Generation timed out after {0}s")]
    Timeout(u64),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Unusable model response: {0}")]
    Unusable(String),
}

/// Input to one completion call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub file_path: PathBuf,
    pub prompt: String,
    pub issues: Vec<CodeIssue>,
}

/// Raw completion text plus accounting
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub token_usage: TokenUsage,
}

/// Produces fix suggestions as free text
#[async_trait]
pub trait SuggestionGenerator: Send + Sync {
    /// Run one completion for one file
    async fn generate(&self, request: &GenerationRequest) -> Result<Completion, GenerationError>;

    /// Model identifier recorded in `FixResult::model_used`
    fn model_name(&self) -> &str;
}

/// Fixture-backed generator (tests and offline CLI use)
///
/// Returns a per-path response when one is registered, the default response
/// otherwise.
#[derive(Debug, Clone)]
pub struct StaticGenerator {
    /// Response returned when no per-path response matches
    pub response: String,
    /// Responses keyed by file path
    pub responses: HashMap<PathBuf, String>,
    /// Model name reported back
    pub model: String,
    /// Error to return instead of a response (if set)
    pub error: Option<GenerationError>,
    /// Artificial latency before responding
    pub delay: Option<Duration>,
}

impl StaticGenerator {
    /// Create generator with a fixed response
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            responses: HashMap::new(),
            model: "static-fixture".to_string(),
            error: None,
            delay: None,
        }
    }

    /// Create generator that always fails with a transport error
    pub fn with_error(msg: &str) -> Self {
        Self {
            error: Some(GenerationError::Transport(msg.to_string())),
            ..Self::new("")
        }
    }

    /// Register a response for one file
    pub fn for_path(mut self, path: &Path, response: &str) -> Self {
        self.responses.insert(path.to_path_buf(), response.to_string());
        self
    }

    /// Delay every response
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Override the reported model name
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

#[async_trait]
impl SuggestionGenerator for StaticGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Completion, GenerationError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(ref err) = self.error {
            return Err(err.clone());
        }
        let text = self
            .responses
            .get(&request.file_path)
            .unwrap_or(&self.response)
            .clone();
        let prompt_tokens = (request.prompt.len() / 4) as u64;
        let completion_tokens = (text.len() / 4) as u64;
        Ok(Completion {
            text,
            model: self.model.clone(),
            token_usage: TokenUsage::new(prompt_tokens, completion_tokens),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
