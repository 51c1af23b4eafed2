//! Profile store collaborator.
//!
//! The refresh grant re-reads the subject's current email so a rotated
//! access token never carries a stale address. Contractor profiles live in
//! the portfolio database; this crate only needs the one lookup.

mod rest;

pub use rest::RestProfileStore;

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreResult;

/// Read access to contractor profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Current email for `subject`, or `None` when no profile exists.
    async fn current_email(&self, subject: &str) -> StoreResult<Option<String>>;
}

/// Profile store held in memory, for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    emails: RwLock<HashMap<String, String>>,
}

impl InMemoryProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store from `(subject, email)` pairs.
    #[must_use]
    pub fn with_profiles<I, S, E>(profiles: I) -> Self
    where
        I: IntoIterator<Item = (S, E)>,
        S: Into<String>,
        E: Into<String>,
    {
        let emails = profiles.into_iter().map(|(s, e)| (s.into(), e.into())).collect();
        Self { emails: RwLock::new(emails) }
    }

    pub async fn upsert(&self, subject: impl Into<String>, email: impl Into<String>) {
        self.emails.write().await.insert(subject.into(), email.into());
    }

    pub async fn remove(&self, subject: &str) {
        self.emails.write().await.remove(subject);
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn current_email(&self, subject: &str) -> StoreResult<Option<String>> {
        Ok(self.emails.read().await.get(subject).cloned())
    }
}
