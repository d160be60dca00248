pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
        }
    }
}

impl Error for LlmError {}

/// Turns a question into whatever text the model answers with.
///
/// Implementations send `prompt` and `question` as two separate parts and return the
/// completion untouched: no fence stripping, no validation, no retry.
#[async_trait]
pub trait QueryTranslator: Send + Sync {
    async fn translate(&self, question: &str, prompt: &str) -> Result<String, LlmError>;
}

pub struct LlmManager {
    backend: String,
    model: String,
    translator: Box<dyn QueryTranslator>,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let translator: Box<dyn QueryTranslator> = match config.backend.as_str() {
            "gemini" => Box::new(providers::gemini::GeminiProvider::new(config)?),
            "remote" => Box::new(providers::remote::RemoteLlmProvider::new(config)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self {
            backend: config.backend.clone(),
            model: config.model.clone(),
            translator,
        })
    }

    /// Wraps an already-built translator, bypassing config.
    #[cfg(test)]
    pub fn with_translator(
        backend: impl Into<String>,
        model: impl Into<String>,
        translator: Box<dyn QueryTranslator>,
    ) -> Self {
        Self {
            backend: backend.into(),
            model: model.into(),
            translator,
        }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn translate(&self, question: &str, prompt: &str) -> Result<String, LlmError> {
        self.translator.translate(question, prompt).await
    }
}

/// Answers every question with the same canned text, or the same error.
#[cfg(test)]
pub struct FixedTranslator {
    pub answer: Result<String, String>,
    pub calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl FixedTranslator {
    pub fn answering(text: &str) -> Self {
        Self {
            answer: Ok(text.to_string()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            answer: Err(message.to_string()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl QueryTranslator for FixedTranslator {
    async fn translate(&self, _question: &str, _prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.answer
            .clone()
            .map_err(LlmError::ConnectionError)
    }
}
