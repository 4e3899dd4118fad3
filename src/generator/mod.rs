//! Answer generation boundary.
//!
//! The chat pipeline hands a query plus retrieved context to an
//! `AnswerGenerator` and gets plain text back. The boundary also owns the
//! designated fallback sentence: implementations return it (verbatim) when
//! the context does not cover the question, and the cache write path
//! checks responses against it by equality.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

pub mod gemini;

pub use gemini::GeminiGenerator;

/// The sentinel "no relevant information found" response. Never cached.
pub const FALLBACK_MESSAGE: &str = "I couldn't find anything about that in the author's \
     knowledge base. Try asking about their experience, skills, projects, or how to get in touch.";

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Produce an answer for `query` given the retrieved `context`
    /// snippets. An empty `context` is a legitimate input; the
    /// implementation decides whether to answer from general knowledge or
    /// return [`FALLBACK_MESSAGE`].
    async fn generate(&self, query: &str, context: &[String]) -> Result<String, ApiError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub model: String,
    pub base_url: String,
    /// API key fallback; the `GEMINI_API_KEY` environment variable takes
    /// precedence.
    pub api_key: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: None,
        }
    }
}
