//! PostgREST-backed profile lookups.
//!
//! Queries `GET {base}/contractors?auth_user_id=eq.{subject}&select=email`
//! with the service key in both `apikey` and `Authorization` headers.
//! No retries: a failed lookup fails the refresh grant.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::ProfileStore;
use crate::error::{StoreError, StoreResult};

/// Request timeout for profile lookups.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ContractorRow {
    email: Option<String>,
}

/// Profile store backed by the portfolio database's REST interface.
#[derive(Clone)]
pub struct RestProfileStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestProfileStore {
    /// Create a store pointed at `base_url` (e.g. `https://db.example.com/rest/v1`).
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: Option<String>) -> StoreResult<Self> {
        url::Url::parse(base_url)
            .map_err(|e| StoreError::backend(format!("invalid profile API URL: {e}")))?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        if let Some(ref key) = api_key {
            let value = reqwest::header::HeaderValue::from_str(key)
                .map_err(|_| StoreError::backend("profile API key is not a valid header value"))?;
            headers.insert("apikey", value);
            let bearer = reqwest::header::HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| StoreError::backend("profile API key is not a valid header value"))?;
            headers.insert(reqwest::header::AUTHORIZATION, bearer);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Map non-success statuses to store errors.
    async fn handle_response(response: reqwest::Response) -> StoreResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(StoreError::UnexpectedStatus {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ProfileStore for RestProfileStore {
    async fn current_email(&self, subject: &str) -> StoreResult<Option<String>> {
        let url = format!("{}/contractors", self.base_url);
        let params = [("auth_user_id", format!("eq.{subject}")), ("select", "email".to_string())];

        let response = self.client.get(&url).query(&params).send().await?;
        let rows: Vec<ContractorRow> = Self::handle_response(response).await?.json().await?;

        Ok(rows.into_iter().next().and_then(|row| row.email).filter(|e| !e.is_empty()))
    }
}

impl std::fmt::Debug for RestProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestProfileStore")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.has_api_key())
            .finish()
    }
}
