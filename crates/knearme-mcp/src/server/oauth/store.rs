//! Authorization code store.
//!
//! Codes are single-use: the only way to learn whether a code is valid is to
//! consume it, which destroys it. There is no lookup that leaves a code in
//! place.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;

use super::types::{AuthorizationCode, NewAuthorizationCode};
use crate::config::defaults;
use crate::error::StoreResult;

/// Backing store for authorization codes.
#[async_trait]
pub trait AuthCodeStore: Send + Sync {
    /// Persist an approved grant and return its freshly generated code.
    async fn issue(&self, grant: NewAuthorizationCode) -> StoreResult<String>;

    /// Atomically remove and return the record for `code`.
    ///
    /// `Ok(None)` covers unknown, already consumed and expired codes alike.
    /// When several callers race on one code, at most one gets `Some`.
    async fn consume(&self, code: &str) -> StoreResult<Option<AuthorizationCode>>;
}

/// In-memory code store shared behind an `Arc`.
#[derive(Clone)]
pub struct InMemoryAuthCodeStore {
    codes: Arc<RwLock<HashMap<String, AuthorizationCode>>>,
    lifetime: Duration,
}

impl InMemoryAuthCodeStore {
    /// Store with the default 5 minute code lifetime.
    #[must_use]
    pub fn new() -> Self {
        Self::with_lifetime(defaults::AUTH_CODE_TTL)
    }

    #[must_use]
    pub fn with_lifetime(lifetime: Duration) -> Self {
        Self {
            codes: Arc::new(RwLock::new(HashMap::new())),
            lifetime,
        }
    }

    /// Generate a random code from two UUIDs (244 random bits).
    fn generate_code() -> String {
        format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
    }

    fn expiry_from(&self, issued_at: DateTime<Utc>) -> DateTime<Utc> {
        TimeDelta::from_std(self.lifetime)
            .ok()
            .and_then(|delta| issued_at.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Drop every expired code. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut codes = self.codes.write().await;
        let before = codes.len();
        codes.retain(|_, code| !code.is_expired_at(now));
        before - codes.len()
    }

    /// Start background cleanup task for expired codes.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(defaults::CODE_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let removed = self.purge_expired().await;
                if removed > 0 {
                    tracing::debug!(count = removed, "Cleaned up expired authorization codes");
                }
            }
        });
    }
}

#[async_trait]
impl AuthCodeStore for InMemoryAuthCodeStore {
    async fn issue(&self, grant: NewAuthorizationCode) -> StoreResult<String> {
        let code = Self::generate_code();
        let issued_at = Utc::now();
        let expires_at = self.expiry_from(issued_at);
        let record = AuthorizationCode::from_grant(code.clone(), grant, issued_at, expires_at);

        self.codes.write().await.insert(code.clone(), record);
        Ok(code)
    }

    async fn consume(&self, code: &str) -> StoreResult<Option<AuthorizationCode>> {
        // Removal under the write lock is the single atomic step; an expired
        // record is destroyed here too.
        let Some(record) = self.codes.write().await.remove(code) else {
            return Ok(None);
        };

        if record.is_expired_at(Utc::now()) {
            tracing::debug!(client_id = %record.client_id, "Authorization code expired before use");
            return Ok(None);
        }

        Ok(Some(record))
    }
}

impl Default for InMemoryAuthCodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryAuthCodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAuthCodeStore").field("lifetime", &self.lifetime).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::oauth::types::CodeChallengeMethod;

    fn grant() -> NewAuthorizationCode {
        NewAuthorizationCode {
            client_id: "client1".into(),
            redirect_uri: "http://localhost/callback".into(),
            code_challenge: "challenge".into(),
            code_challenge_method: CodeChallengeMethod::S256,
            user_id: "user-1".into(),
            business_id: "biz-1".into(),
            email: "owner@example.com".into(),
            scopes: vec!["mcp".into()],
        }
    }

    #[tokio::test]
    async fn test_auth_code_lifecycle() {
        let store = InMemoryAuthCodeStore::new();
        let code = store.issue(grant()).await.unwrap();

        // First consume succeeds
        let info = store.consume(&code).await.unwrap().unwrap();
        assert_eq!(info.client_id, "client1");
        assert_eq!(info.business_id, "biz-1");
        assert_eq!(info.code, code);
        assert!(info.expires_at > info.issued_at);

        // Second consume fails (already used)
        assert!(store.consume(&code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let store = InMemoryAuthCodeStore::new();
        assert!(store.consume("never-issued").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_code_not_found() {
        let store = InMemoryAuthCodeStore::with_lifetime(Duration::ZERO);
        let code = store.issue(grant()).await.unwrap();
        assert!(store.consume(&code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_codes_are_long_and_unique() {
        let store = InMemoryAuthCodeStore::new();
        let a = store.issue(grant()).await.unwrap();
        let b = store.issue(grant()).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = InMemoryAuthCodeStore::with_lifetime(Duration::ZERO);
        store.issue(grant()).await.unwrap();
        store.issue(grant()).await.unwrap();
        assert_eq!(store.purge_expired().await, 2);
        assert_eq!(store.purge_expired().await, 0);
    }

    #[tokio::test]
    async fn test_purge_keeps_live_codes() {
        let store = InMemoryAuthCodeStore::new();
        let code = store.issue(grant()).await.unwrap();
        assert_eq!(store.purge_expired().await, 0);
        assert!(store.consume(&code).await.unwrap().is_some());
    }
}
