//! Fixed knowledge base about the portfolio owner.
//!
//! An ordered list of `{id, content, keywords}` records, loaded once at
//! startup from `knowledge.yml` when present, otherwise the built-in set.
//! Ids are stable references: cached answers and source rendering point at
//! them, so edits must not renumber existing entries.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub id: String,
    pub content: String,
    pub keywords: Vec<String>,
}

pub struct KnowledgeBase {
    chunks: Vec<KnowledgeChunk>,
}

impl KnowledgeBase {
    /// The default chunk set shipped with the application.
    pub fn builtin() -> Self {
        Self::from_chunks(vec![
            KnowledgeChunk {
                id: "1".to_string(),
                content: "The author is a Senior Full Stack Engineer with 8 years of experience \
                          specializing in React, Node.js, and Cloud Architecture."
                    .to_string(),
                keywords: to_strings(&["experience", "role", "job", "title", "senior", "years"]),
            },
            KnowledgeChunk {
                id: "2".to_string(),
                content: "The author is proficient in TypeScript, Python, Go, and Rust. They have \
                          extensive experience with AWS and Google Cloud Platform."
                    .to_string(),
                keywords: to_strings(&[
                    "skills",
                    "languages",
                    "tech stack",
                    "technology",
                    "aws",
                    "gcp",
                    "typescript",
                    "python",
                ]),
            },
            KnowledgeChunk {
                id: "3".to_string(),
                content: "The author created this application using the Gemini API, React, and \
                          Tailwind CSS to demonstrate RAG capabilities."
                    .to_string(),
                keywords: to_strings(&["project", "app", "demo", "gemini", "stack", "how"]),
            },
            KnowledgeChunk {
                id: "4".to_string(),
                content: "The author resides in San Francisco, CA and enjoys hiking, photography, \
                          and contributing to open source projects in their free time."
                    .to_string(),
                keywords: to_strings(&[
                    "location",
                    "city",
                    "hobbies",
                    "personal",
                    "interests",
                    "live",
                ]),
            },
            KnowledgeChunk {
                id: "5".to_string(),
                content: "You can contact the author via email at author@example.com or via \
                          LinkedIn at linkedin.com/in/author-demo."
                    .to_string(),
                keywords: to_strings(&["contact", "email", "linkedin", "reach", "message"]),
            },
        ])
    }

    /// Load chunks from a YAML file, falling back to the built-in set when
    /// the file is missing or malformed.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!(
                "No knowledge file at {}; using the built-in knowledge base",
                path.display()
            );
            return Self::builtin();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str::<Vec<KnowledgeChunk>>(&contents) {
                Ok(chunks) if !chunks.is_empty() => Self::from_chunks(chunks),
                Ok(_) => {
                    tracing::warn!(
                        "Knowledge file {} is empty; using the built-in knowledge base",
                        path.display()
                    );
                    Self::builtin()
                }
                Err(err) => {
                    tracing::warn!(
                        "Invalid knowledge file {}: {}; using the built-in knowledge base",
                        path.display(),
                        err
                    );
                    Self::builtin()
                }
            },
            Err(err) => {
                tracing::warn!(
                    "Failed to read knowledge file {}: {}; using the built-in knowledge base",
                    path.display(),
                    err
                );
                Self::builtin()
            }
        }
    }

    fn from_chunks(chunks: Vec<KnowledgeChunk>) -> Self {
        let mut seen = HashSet::new();
        for chunk in &chunks {
            if !seen.insert(chunk.id.clone()) {
                tracing::warn!("Duplicate knowledge chunk id {:?}", chunk.id);
            }
        }

        // Keywords are matched against lowercased queries, so store them
        // lowercased up front.
        let chunks = chunks
            .into_iter()
            .map(|mut chunk| {
                for keyword in &mut chunk.keywords {
                    *keyword = keyword.to_lowercase();
                }
                chunk
            })
            .collect();

        Self { chunks }
    }

    /// Chunks in insertion order.
    pub fn chunks(&self) -> &[KnowledgeChunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
