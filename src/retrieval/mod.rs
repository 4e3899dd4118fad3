//! Lexical keyword-match retrieval.
//!
//! Scores chunks by counting the chunk keywords that appear as substrings
//! of the lowercased query, plus a boost when a query token also occurs in
//! the chunk content. This is a heuristic lexical matcher, NOT semantic
//! search — a keyword absent from the query scores nothing, however close
//! its meaning. The `search` signature (query in, ranked results out) is
//! the stable seam: an embedding-backed retriever can replace this
//! implementation without touching the chat pipeline.

use serde::{Deserialize, Serialize};

use crate::knowledge::KnowledgeChunk;

/// Query tokens shorter than this never trigger the content boost; they
/// are mostly stop words.
const MIN_BOOST_TOKEN_LEN: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Maximum results returned; bounds the context sent to the generator.
    pub top_k: usize,
    /// Score added when a query token occurs in the chunk content.
    pub content_boost: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            content_boost: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk: KnowledgeChunk,
    pub score: f64,
}

pub struct Retriever {
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    /// Rank `chunks` against `query`, best first.
    ///
    /// Chunks with no match are excluded; ties keep insertion order. The
    /// result is truncated to `top_k`. An empty result means the query
    /// shares nothing with the knowledge base.
    pub fn search(&self, query: &str, chunks: &[KnowledgeChunk]) -> Vec<SearchResult> {
        let normalized = query.to_lowercase();
        let query_tokens: Vec<&str> = normalized
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| token.len() >= MIN_BOOST_TOKEN_LEN)
            .collect();

        let mut results: Vec<SearchResult> = chunks
            .iter()
            .filter_map(|chunk| {
                let score = self.score(chunk, &normalized, &query_tokens);
                if score > 0.0 {
                    Some(SearchResult {
                        chunk: chunk.clone(),
                        score,
                    })
                } else {
                    None
                }
            })
            .collect();

        // Stable sort: equal scores keep knowledge-base insertion order.
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(self.config.top_k.max(1));

        results
    }

    fn score(&self, chunk: &KnowledgeChunk, normalized: &str, query_tokens: &[&str]) -> f64 {
        let keyword_hits = chunk
            .keywords
            .iter()
            .filter(|keyword| normalized.contains(keyword.as_str()))
            .count();

        let mut score = keyword_hits as f64;

        let content = chunk.content.to_lowercase();
        if query_tokens.iter().any(|token| content.contains(token)) {
            score += self.config.content_boost;
        }

        score
    }
}
