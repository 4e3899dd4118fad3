//! Backend for a portfolio Q&A assistant.
//!
//! Answers questions about the portfolio owner with a
//! retrieval-augmented-generation pipeline over a small fixed knowledge
//! base: cache lookup, lexical retrieval, language-model generation, and a
//! per-user durable chat history. Served over HTTP and WebSocket.

pub mod cache;
pub mod chat;
pub mod core;
pub mod generator;
pub mod history;
pub mod knowledge;
pub mod retrieval;
pub mod server;
pub mod session;
pub mod state;
pub mod storage;
