//! Gemini-backed answer generator.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{AnswerGenerator, GeneratorConfig, FALLBACK_MESSAGE};
use crate::core::errors::ApiError;

pub struct GeminiGenerator {
    client: Client,
    config: GeneratorConfig,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self, ApiError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| config.api_key.clone())
            .ok_or_else(|| {
                ApiError::BadRequest(
                    "Missing Gemini API key: set GEMINI_API_KEY or generator.api_key".to_string(),
                )
            })?;

        Ok(Self {
            client: Client::new(),
            config,
            api_key,
        })
    }

    fn build_prompt(query: &str, context: &[String]) -> String {
        let mut prompt = String::from(
            "You are a personal assistant answering questions about the author of this \
             portfolio, using only the context below.\n",
        );

        if context.is_empty() {
            prompt.push_str("\nContext: (none)\n");
        } else {
            prompt.push_str("\nContext:\n");
            for (i, snippet) in context.iter().enumerate() {
                prompt.push_str(&format!("[{}] {}\n", i + 1, snippet));
            }
        }

        prompt.push_str(&format!(
            "\nIf the context does not answer the question, reply exactly with:\n{}\n\nQuestion: {}\n",
            FALLBACK_MESSAGE, query
        ));

        prompt
    }
}

#[async_trait]
impl AnswerGenerator for GeminiGenerator {
    async fn generate(&self, query: &str, context: &[String]) -> Result<String, ApiError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model,
            self.api_key
        );

        let body = json!({
            "contents": [{
                "parts": [{ "text": Self::build_prompt(query, context) }]
            }]
        });

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Gemini request failed ({}): {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::upstream)?;

        let text = payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Upstream("Gemini returned no candidate text".to_string()))?;

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_context_and_fallback_instruction() {
        let context = vec![
            "The author writes Rust.".to_string(),
            "The author lives in SF.".to_string(),
        ];
        let prompt = GeminiGenerator::build_prompt("Where do you live?", &context);

        assert!(prompt.contains("[1] The author writes Rust."));
        assert!(prompt.contains("[2] The author lives in SF."));
        assert!(prompt.contains(FALLBACK_MESSAGE));
        assert!(prompt.contains("Question: Where do you live?"));
    }

    #[test]
    fn prompt_marks_empty_context() {
        let prompt = GeminiGenerator::build_prompt("Anything?", &[]);
        assert!(prompt.contains("Context: (none)"));
    }
}
