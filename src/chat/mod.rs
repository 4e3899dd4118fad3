//! Chat turn pipeline: cache lookup → retrieval → generation → settle.
//!
//! The orchestrator is the single writer of conversation state. Turns are
//! serialized — a submission while one is in flight is rejected — and each
//! turn appends the user message immediately, resolves an answer, appends
//! it, and mirrors the conversation to durable storage when a user is
//! logged in.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as TokioMutex;
use tokio::time::sleep;

use crate::cache::ResponseCache;
use crate::core::errors::ApiError;
use crate::generator::{AnswerGenerator, FALLBACK_MESSAGE};
use crate::history::{HistoryStore, Message, MessageRole};
use crate::knowledge::KnowledgeBase;
use crate::retrieval::Retriever;
use crate::session::{AuthProvider, SessionStore, User};

/// Greeting seeded when no persisted session exists.
pub const GREETING: &str = "Hello! I'm the AI Assistant for the author. Ask me anything about \
     their experience, skills, or how to contact them.";

/// Greeting seeded after logout.
pub const GUEST_GREETING: &str =
    "Hello! I'm the AI Assistant. Please login to save our conversation.";

/// Fixed apology shown when retrieval or generation fails. Never cached.
pub const APOLOGY_MESSAGE: &str = "Sorry, something went wrong processing your request.";

/// Characters of chunk content shown in a source reference.
const EXCERPT_LEN: usize = 80;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Minimum latency applied to cache hits so they feel like the
    /// generated path. Configurable rather than a hidden constant.
    pub cache_hit_delay_ms: u64,
    /// History retention window applied on load.
    pub retention_days: i64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            cache_hit_delay_ms: 400,
            retention_days: 10,
        }
    }
}

/// Stable reference to a knowledge chunk used to answer a turn.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub id: String,
    pub excerpt: String,
}

/// The settled result of one chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub message: Message,
    pub sources: Vec<SourceRef>,
    pub cached: bool,
}

struct Conversation {
    user: Option<User>,
    messages: Vec<Message>,
}

pub struct ChatOrchestrator {
    knowledge: Arc<KnowledgeBase>,
    retriever: Retriever,
    cache: ResponseCache,
    generator: Arc<dyn AnswerGenerator>,
    history: HistoryStore,
    sessions: SessionStore,
    config: ChatConfig,
    conversation: Mutex<Conversation>,
    turn_lock: TokioMutex<()>,
}

impl ChatOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        knowledge: Arc<KnowledgeBase>,
        retriever: Retriever,
        cache: ResponseCache,
        generator: Arc<dyn AnswerGenerator>,
        history: HistoryStore,
        sessions: SessionStore,
        config: ChatConfig,
    ) -> Self {
        Self {
            knowledge,
            retriever,
            cache,
            generator,
            history,
            sessions,
            config,
            conversation: Mutex::new(Conversation {
                user: None,
                messages: Vec::new(),
            }),
            turn_lock: TokioMutex::new(()),
        }
    }

    /// Restore the persisted session and its pruned history, or seed the
    /// initial greeting when nobody is logged in.
    pub async fn bootstrap(&self) -> Result<(), ApiError> {
        match self.sessions.load().await? {
            Some(user) => {
                let messages = self.history.load(&user.id).await?;
                let mut conv = self.conversation()?;
                conv.user = Some(user);
                conv.messages = messages;
            }
            None => {
                let mut conv = self.conversation()?;
                conv.user = None;
                conv.messages = vec![Message::assistant(GREETING)];
            }
        }
        Ok(())
    }

    /// Run one chat turn. Empty input is ignored silently: no turn is
    /// started and `Ok(None)` is returned. A submission while another turn
    /// is in flight is rejected with [`ApiError::Busy`].
    pub async fn send_message(&self, input: &str) -> Result<Option<TurnOutcome>, ApiError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let _turn = self.turn_lock.try_lock().map_err(|_| ApiError::Busy)?;

        self.append(Message::user(trimmed)).await?;
        let outcome = self.resolve(trimmed).await;
        self.append(outcome.message.clone()).await?;

        Ok(Some(outcome))
    }

    /// Re-answer the most recent user message, replacing the last
    /// assistant message. The cache read is skipped so a fresh answer is
    /// produced; the write path still runs, so the new answer replaces the
    /// cached one.
    pub async fn regenerate(&self) -> Result<Option<TurnOutcome>, ApiError> {
        let _turn = self.turn_lock.try_lock().map_err(|_| ApiError::Busy)?;

        let query = {
            let conv = self.conversation()?;
            conv.messages
                .iter()
                .rev()
                .find(|message| message.role == MessageRole::User)
                .map(|message| message.content.clone())
        };
        let Some(query) = query else {
            return Ok(None);
        };

        let outcome = self.retrieve_and_generate(&query).await;

        {
            let mut conv = self.conversation()?;
            if conv
                .messages
                .last()
                .is_some_and(|message| message.role == MessageRole::Assistant)
            {
                conv.messages.pop();
            }
            conv.messages.push(outcome.message.clone());
        }
        self.mirror().await;

        Ok(Some(outcome))
    }

    /// Create and persist a mock user. The current conversation starts
    /// persisting under the new identity.
    pub async fn login(&self, provider: AuthProvider) -> Result<User, ApiError> {
        let user = User::mock(provider);
        self.sessions.save(&user).await?;
        {
            let mut conv = self.conversation()?;
            conv.user = Some(user.clone());
        }
        self.mirror().await;
        Ok(user)
    }

    /// Clear the active session and reset the view to the guest greeting.
    /// The stored history for the user is retained.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.sessions.clear().await?;
        let mut conv = self.conversation()?;
        conv.user = None;
        conv.messages = vec![Message::assistant(GUEST_GREETING)];
        Ok(())
    }

    /// Read-only snapshot of the conversation.
    pub fn messages(&self) -> Vec<Message> {
        self.conversation
            .lock()
            .map(|conv| conv.messages.clone())
            .unwrap_or_default()
    }

    pub fn active_user(&self) -> Option<User> {
        self.conversation
            .lock()
            .ok()
            .and_then(|conv| conv.user.clone())
    }

    async fn resolve(&self, query: &str) -> TurnOutcome {
        if let Some(cached) = self.cache.get(query) {
            sleep(Duration::from_millis(self.config.cache_hit_delay_ms)).await;
            return TurnOutcome {
                message: Message::assistant(cached),
                sources: Vec::new(),
                cached: true,
            };
        }

        self.retrieve_and_generate(query).await
    }

    async fn retrieve_and_generate(&self, query: &str) -> TurnOutcome {
        let results = self.retriever.search(query, self.knowledge.chunks());
        if results.is_empty() {
            // No context: answer with the fallback instead of invoking the
            // generator (see DESIGN.md).
            return TurnOutcome {
                message: Message::assistant(FALLBACK_MESSAGE),
                sources: Vec::new(),
                cached: false,
            };
        }

        let sources: Vec<SourceRef> = results
            .iter()
            .map(|result| SourceRef {
                id: result.chunk.id.clone(),
                excerpt: excerpt(&result.chunk.content),
            })
            .collect();
        let context: Vec<String> = results
            .iter()
            .map(|result| result.chunk.content.clone())
            .collect();

        match self.generator.generate(query, &context).await {
            Ok(response) => {
                // The cache refuses the fallback message internally.
                self.cache.put(query, &response);
                TurnOutcome {
                    message: Message::assistant(response),
                    sources,
                    cached: false,
                }
            }
            Err(err) => {
                tracing::error!("Generation failed for query {:?}: {}", query, err);
                TurnOutcome {
                    message: Message::assistant(APOLOGY_MESSAGE),
                    sources: Vec::new(),
                    cached: false,
                }
            }
        }
    }

    async fn append(&self, message: Message) -> Result<(), ApiError> {
        {
            let mut conv = self.conversation()?;
            conv.messages.push(message);
        }
        self.mirror().await;
        Ok(())
    }

    /// Mirror the conversation to durable storage when a user is logged
    /// in. Persistence is best effort: a storage failure is logged, not
    /// surfaced into the turn.
    async fn mirror(&self) {
        let snapshot = {
            let Ok(conv) = self.conversation.lock() else {
                return;
            };
            conv.user
                .clone()
                .map(|user| (user, conv.messages.clone()))
        };

        if let Some((user, messages)) = snapshot {
            if let Err(err) = self.history.save(&user.id, &messages).await {
                tracing::warn!("Failed to persist history for {}: {}", user.id, err);
            }
        }
    }

    fn conversation(&self) -> Result<MutexGuard<'_, Conversation>, ApiError> {
        self.conversation
            .lock()
            .map_err(|_| ApiError::Internal("conversation lock poisoned".to_string()))
    }
}

fn excerpt(content: &str) -> String {
    if content.chars().count() <= EXCERPT_LEN {
        return content.to_string();
    }
    let mut cut: String = content.chars().take(EXCERPT_LEN).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::cache::CacheConfig;
    use crate::retrieval::RetrievalConfig;
    use crate::storage::{KvStore, MemoryKvStore};

    enum MockBehavior {
        Echo,
        Fallback,
        Fail,
        Slow(u64),
    }

    struct MockGenerator {
        calls: AtomicUsize,
        behavior: MockBehavior,
    }

    impl MockGenerator {
        fn new(behavior: MockBehavior) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                behavior,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AnswerGenerator for MockGenerator {
        async fn generate(&self, query: &str, context: &[String]) -> Result<String, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                MockBehavior::Echo => {
                    Ok(format!("Answer to {:?} from {} snippets", query, context.len()))
                }
                MockBehavior::Fallback => Ok(FALLBACK_MESSAGE.to_string()),
                MockBehavior::Fail => Err(ApiError::Upstream("model offline".to_string())),
                MockBehavior::Slow(ms) => {
                    sleep(Duration::from_millis(ms)).await;
                    Ok("slow answer".to_string())
                }
            }
        }
    }

    fn orchestrator_on(kv: Arc<dyn KvStore>, generator: Arc<MockGenerator>) -> ChatOrchestrator {
        ChatOrchestrator::new(
            Arc::new(KnowledgeBase::builtin()),
            Retriever::new(RetrievalConfig::default()),
            ResponseCache::new(CacheConfig::default()),
            generator,
            HistoryStore::new(kv.clone(), 10),
            SessionStore::new(kv),
            ChatConfig {
                cache_hit_delay_ms: 0,
                retention_days: 10,
            },
        )
    }

    fn orchestrator(generator: Arc<MockGenerator>) -> ChatOrchestrator {
        orchestrator_on(Arc::new(MemoryKvStore::new()), generator)
    }

    #[tokio::test]
    async fn skills_query_runs_pipeline_and_caches() {
        let generator = MockGenerator::new(MockBehavior::Echo);
        let orch = orchestrator(generator.clone());

        let outcome = orch
            .send_message("What are your skills?")
            .await
            .unwrap()
            .unwrap();

        assert!(!outcome.cached);
        assert_eq!(outcome.sources[0].id, "2");
        assert_eq!(generator.calls(), 1);
        assert!(orch.cache.get("what are your skills").is_some());
    }

    #[tokio::test]
    async fn repeat_query_is_served_from_cache() {
        let generator = MockGenerator::new(MockBehavior::Echo);
        let orch = orchestrator(generator.clone());

        let first = orch
            .send_message("What are your skills?")
            .await
            .unwrap()
            .unwrap();
        let second = orch
            .send_message("  what are your SKILLS  ")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(generator.calls(), 1);
        assert!(second.cached);
        assert_eq!(second.message.content, first.message.content);
    }

    #[tokio::test]
    async fn no_overlap_short_circuits_to_fallback() {
        let generator = MockGenerator::new(MockBehavior::Echo);
        let orch = orchestrator(generator.clone());

        let outcome = orch
            .send_message("xylophone quizzical")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(generator.calls(), 0);
        assert_eq!(outcome.message.content, FALLBACK_MESSAGE);
        assert!(outcome.sources.is_empty());
        assert!(orch.cache.is_empty());
    }

    #[tokio::test]
    async fn fallback_answer_is_not_cached() {
        let generator = MockGenerator::new(MockBehavior::Fallback);
        let orch = orchestrator(generator.clone());

        let outcome = orch
            .send_message("What are your skills?")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(generator.calls(), 1);
        assert_eq!(outcome.message.content, FALLBACK_MESSAGE);
        assert!(orch.cache.is_empty());
    }

    #[tokio::test]
    async fn generator_failure_appends_single_apology() {
        let generator = MockGenerator::new(MockBehavior::Fail);
        let orch = orchestrator(generator.clone());

        let outcome = orch
            .send_message("What are your skills?")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.message.content, APOLOGY_MESSAGE);
        let messages = orch.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, APOLOGY_MESSAGE);
        assert!(orch.cache.is_empty());
    }

    #[tokio::test]
    async fn empty_input_is_ignored() {
        let generator = MockGenerator::new(MockBehavior::Echo);
        let orch = orchestrator(generator.clone());

        assert!(orch.send_message("   ").await.unwrap().is_none());
        assert!(orch.messages().is_empty());
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn concurrent_submission_is_rejected() {
        let generator = MockGenerator::new(MockBehavior::Slow(200));
        let orch = Arc::new(orchestrator(generator));

        let background = orch.clone();
        let first = tokio::spawn(async move {
            background.send_message("What are your skills?").await
        });

        sleep(Duration::from_millis(50)).await;
        let second = orch.send_message("another question about skills").await;
        assert!(matches!(second, Err(ApiError::Busy)));

        first.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn timestamps_follow_insertion_order() {
        let generator = MockGenerator::new(MockBehavior::Echo);
        let orch = orchestrator(generator);

        orch.send_message("What are your skills?").await.unwrap();
        orch.send_message("How can I contact you?").await.unwrap();

        let messages = orch.messages();
        assert_eq!(messages.len(), 4);
        for pair in messages.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn logout_retains_stored_history() {
        let generator = MockGenerator::new(MockBehavior::Echo);
        let orch = orchestrator(generator);

        let user = orch.login(AuthProvider::Google).await.unwrap();
        orch.send_message("What are your skills?").await.unwrap();
        orch.logout().await.unwrap();

        let messages = orch.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, GUEST_GREETING);
        assert!(orch.active_user().is_none());

        // The durable history outlives the session pointer.
        let stored = orch.history.load(&user.id).await.unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn bootstrap_restores_pruned_history() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let generator = MockGenerator::new(MockBehavior::Echo);

        let user = User::mock(AuthProvider::Apple);
        SessionStore::new(kv.clone()).save(&user).await.unwrap();

        let mut stale = Message::user("long forgotten");
        stale.timestamp -= 11 * 24 * 60 * 60 * 1000;
        let fresh = Message::user("still recent");
        HistoryStore::new(kv.clone(), 10)
            .save(&user.id, &[stale, fresh])
            .await
            .unwrap();

        let orch = orchestrator_on(kv, generator);
        orch.bootstrap().await.unwrap();

        let messages = orch.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "still recent");
        assert_eq!(orch.active_user().unwrap().id, user.id);
    }

    #[tokio::test]
    async fn bootstrap_without_session_seeds_greeting() {
        let generator = MockGenerator::new(MockBehavior::Echo);
        let orch = orchestrator(generator);

        orch.bootstrap().await.unwrap();

        let messages = orch.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, GREETING);
    }

    #[tokio::test]
    async fn regenerate_replaces_last_assistant_message() {
        let generator = MockGenerator::new(MockBehavior::Echo);
        let orch = orchestrator(generator.clone());

        orch.send_message("What are your skills?").await.unwrap();
        let regenerated = orch.regenerate().await.unwrap().unwrap();

        let messages = orch.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].id, regenerated.message.id);
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn regenerate_without_user_message_is_a_noop() {
        let generator = MockGenerator::new(MockBehavior::Echo);
        let orch = orchestrator(generator.clone());

        assert!(orch.regenerate().await.unwrap().is_none());
        assert_eq!(generator.calls(), 0);
    }
}
