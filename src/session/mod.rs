//! Mocked session identity.
//!
//! Login fabricates a user record rather than talking to a real identity
//! provider. The active-session pointer is persisted under its own key,
//! independent of chat history: logging out clears the pointer but keeps
//! the stored history, so a returning user finds their conversation again.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::errors::ApiError;
use crate::storage::KvStore;

const SESSION_KEY: &str = "chat_user";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthProvider {
    Google,
    Facebook,
    Apple,
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthProvider::Google => "Google",
            AuthProvider::Facebook => "Facebook",
            AuthProvider::Apple => "Apple",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
    pub provider: AuthProvider,
}

impl User {
    /// Fabricate a demo user for `provider`.
    pub fn mock(provider: AuthProvider) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self {
            id: format!("usr_{}", &suffix[..9]),
            name: "Demo User".to_string(),
            email: "user@example.com".to_string(),
            avatar: format!("https://picsum.photos/seed/{}/200", provider),
            provider,
        }
    }
}

pub struct SessionStore {
    kv: Arc<dyn KvStore>,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Restore the persisted session, if any. Corrupt data reads as a
    /// logged-out session.
    pub async fn load(&self) -> Result<Option<User>, ApiError> {
        let Some(raw) = self.kv.load(SESSION_KEY).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(err) => {
                tracing::warn!("Discarding corrupt session record: {}", err);
                Ok(None)
            }
        }
    }

    pub async fn save(&self, user: &User) -> Result<(), ApiError> {
        let raw = serde_json::to_string(user).map_err(ApiError::internal)?;
        self.kv.save(SESSION_KEY, &raw).await
    }

    /// Clear the active-session pointer. Stored histories are untouched.
    pub async fn clear(&self) -> Result<(), ApiError> {
        self.kv.remove(SESSION_KEY).await
    }
}
