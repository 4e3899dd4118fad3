use std::sync::Arc;

use crate::cache::ResponseCache;
use crate::chat::ChatOrchestrator;
use crate::core::config::{AppConfig, AppPaths};
use crate::core::errors::ApiError;
use crate::generator::{AnswerGenerator, GeminiGenerator};
use crate::history::HistoryStore;
use crate::knowledge::KnowledgeBase;
use crate::retrieval::Retriever;
use crate::session::SessionStore;
use crate::storage::{KvStore, SqliteKvStore};

/// Global application state shared across all routes.
///
/// Wires together configuration, the knowledge base, the SQLite-backed
/// key-value store and the chat orchestrator. The orchestrator is the only
/// writer of conversation state; handlers read snapshots through it.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: AppConfig,
    pub knowledge: Arc<KnowledgeBase>,
    pub orchestrator: Arc<ChatOrchestrator>,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// This process includes:
    /// 1. Discovering paths and loading configuration
    /// 2. Opening the key-value store and loading the knowledge base
    /// 3. Constructing the generator and chat orchestrator
    /// 4. Restoring the persisted session and history
    pub async fn initialize() -> Result<Arc<Self>, ApiError> {
        let paths = Arc::new(AppPaths::new());
        let config = AppConfig::load(&paths);

        let kv: Arc<dyn KvStore> = Arc::new(SqliteKvStore::with_path(paths.db_path.clone()).await?);
        let knowledge = Arc::new(KnowledgeBase::load(&paths.knowledge_path));
        let generator: Arc<dyn AnswerGenerator> =
            Arc::new(GeminiGenerator::new(config.generator.clone())?);

        let orchestrator = Arc::new(ChatOrchestrator::new(
            knowledge.clone(),
            Retriever::new(config.retrieval.clone()),
            ResponseCache::new(config.cache.clone()),
            generator,
            HistoryStore::new(kv.clone(), config.chat.retention_days),
            SessionStore::new(kv),
            config.chat.clone(),
        ));
        orchestrator.bootstrap().await?;

        Ok(Arc::new(AppState {
            paths,
            config,
            knowledge,
            orchestrator,
        }))
    }
}
