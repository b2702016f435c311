//! Token store (§4.D): issuer → token, plus a secondary server-URL
//! index. Persistence is delegated to an external collaborator; the
//! default here is the in-memory implementation used until a persisted
//! backend is wired in by configuration (§6: "format opaque to the
//! core").

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::auth::types::OAuthToken;

/// The core's only dependency on token persistence: `get_by_issuer`,
/// `get_by_server`, `put`, `delete`.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get_by_issuer(&self, issuer: &str) -> Option<OAuthToken>;
    async fn get_by_server(&self, server_url: &str) -> Option<OAuthToken>;
    async fn put(&self, token: OAuthToken);
    async fn delete(&self, issuer: &str);
}

/// In-memory token store. Invariant: at most one token per issuer — `put`
/// overwrites any existing entry for the same issuer.
#[derive(Default)]
pub struct InMemoryTokenStore {
    by_issuer: RwLock<HashMap<String, OAuthToken>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get_by_issuer(&self, issuer: &str) -> Option<OAuthToken> {
        self.by_issuer.read().await.get(issuer).cloned()
    }

    async fn get_by_server(&self, server_url: &str) -> Option<OAuthToken> {
        self.by_issuer
            .read()
            .await
            .values()
            .find(|token| token.server_url == server_url)
            .cloned()
    }

    async fn put(&self, token: OAuthToken) {
        self.by_issuer.write().await.insert(token.issuer.clone(), token);
    }

    async fn delete(&self, issuer: &str) {
        self.by_issuer.write().await.remove(issuer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn token(issuer: &str) -> OAuthToken {
        OAuthToken {
            access_token: "tok".into(),
            refresh_token: None,
            issuer: issuer.into(),
            server_url: "https://agg.example/mcp".into(),
            expiry: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn missing_issuer_yields_none() {
        let store = InMemoryTokenStore::new();
        assert!(store.get_by_issuer("https://idp.example/").await.is_none());
    }

    #[tokio::test]
    async fn put_then_get_yields_the_put_value() {
        let store = InMemoryTokenStore::new();
        let t = token("https://idp.example/");
        store.put(t.clone()).await;
        assert_eq!(store.get_by_issuer("https://idp.example/").await, Some(t));
    }

    #[tokio::test]
    async fn put_overwrites_same_issuer() {
        let store = InMemoryTokenStore::new();
        store.put(token("https://idp.example/")).await;
        let mut second = token("https://idp.example/");
        second.access_token = "tok2".into();
        store.put(second.clone()).await;
        assert_eq!(
            store.get_by_issuer("https://idp.example/").await,
            Some(second)
        );
    }

    #[tokio::test]
    async fn delete_removes_the_token() {
        let store = InMemoryTokenStore::new();
        store.put(token("https://idp.example/")).await;
        store.delete("https://idp.example/").await;
        assert!(store.get_by_issuer("https://idp.example/").await.is_none());
    }
}
