//! OAuth 2.1 token endpoint and discovery documents.
//!
//! Implements:
//! - RFC 6749 §4.1.3 / §6: authorization code and refresh token grants
//! - RFC 7636: PKCE verification at the token endpoint
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 9728: OAuth Protected Resource Metadata
//!
//! The authorization step itself (login and consent) happens elsewhere and
//! hands this server an approved grant through [`AuthCodeStore::issue`].
//!
//! [`AuthCodeStore::issue`]: super::AuthCodeStore::issue

use std::sync::Arc;

use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::pkce;
use super::types::TokenPair;
use crate::config::ClientCredentials;
use crate::error::{OAuthError, TokenError};
use crate::server::transport::HttpState;

// ─── RFC 9728: Protected Resource Metadata ───────────────────────────────────

/// `GET /.well-known/oauth-protected-resource`
///
/// Tells clients where to find the authorization server for this resource.
pub async fn handle_protected_resource(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let base_url = &state.config.base_url;
    Json(serde_json::json!({
        "resource": format!("{base_url}/mcp"),
        "authorization_servers": [base_url],
        "bearer_methods_supported": ["header"],
        "scopes_supported": [state.config.default_scope]
    }))
}

// ─── RFC 8414: Authorization Server Metadata ─────────────────────────────────

/// `GET /.well-known/oauth-authorization-server`
pub async fn handle_auth_server_metadata(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let base_url = &state.config.base_url;
    let auth_methods = if state.config.client.has_secret() {
        serde_json::json!(["client_secret_post", "none"])
    } else {
        serde_json::json!(["none"])
    };

    Json(serde_json::json!({
        "issuer": base_url,
        "authorization_endpoint": format!("{base_url}/authorize"),
        "token_endpoint": format!("{base_url}/token"),
        "scopes_supported": [state.config.default_scope],
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "token_endpoint_auth_methods_supported": auth_methods,
        "code_challenge_methods_supported": ["S256", "plain"]
    }))
}

// ─── Token Endpoint ──────────────────────────────────────────────────────────

/// Form body of `POST /token`. Every field is optional at parse time so that
/// missing fields surface as OAuth errors rather than extractor rejections.
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
}

/// `POST /token`
pub async fn handle_token(
    State(state): State<Arc<HttpState>>,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Response {
    let request = match form {
        Ok(Form(request)) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected token request body");
            return OAuthError::invalid_request("Body must be application/x-www-form-urlencoded")
                .into_response();
        }
    };

    match exchange(&state, &request).await {
        Ok(pair) => token_success(&pair),
        Err(e) => {
            tracing::info!(
                error = e.code(),
                grant_type = request.grant_type.as_deref().unwrap_or(""),
                "Token request refused"
            );
            e.into_response()
        }
    }
}

/// Run one token request against `state`.
pub async fn exchange(state: &HttpState, request: &TokenRequest) -> Result<TokenPair, OAuthError> {
    authenticate_client(&state.config.client, request)?;

    match request.grant_type.as_deref() {
        Some("authorization_code") => authorization_code_grant(state, request).await,
        Some("refresh_token") => refresh_token_grant(state, request).await,
        Some(other) => Err(OAuthError::UnsupportedGrantType(format!(
            "grant_type '{other}' is not supported"
        ))),
        None => Err(OAuthError::invalid_request("Missing grant_type")),
    }
}

/// The client id must match; a secret is checked only when both sides have one.
fn authenticate_client(
    client: &ClientCredentials,
    request: &TokenRequest,
) -> Result<(), OAuthError> {
    let Some(client_id) = non_empty(request.client_id.as_ref()) else {
        return Err(OAuthError::invalid_client("Missing client_id"));
    };
    if client_id != client.client_id {
        tracing::warn!(client_id, "Unknown client_id at token endpoint");
        return Err(OAuthError::invalid_client("Unknown client"));
    }

    if let (Some(expected), Some(supplied)) =
        (client.client_secret.as_deref(), non_empty(request.client_secret.as_ref()))
    {
        if !pkce::constant_time_eq(supplied, expected) {
            tracing::warn!(client_id, "Client secret mismatch");
            return Err(OAuthError::invalid_client("Client authentication failed"));
        }
    }

    Ok(())
}

async fn authorization_code_grant(
    state: &HttpState,
    request: &TokenRequest,
) -> Result<TokenPair, OAuthError> {
    let code = required(request.code.as_ref(), "code")?;
    let redirect_uri = required(request.redirect_uri.as_ref(), "redirect_uri")?;
    let code_verifier = required(request.code_verifier.as_ref(), "code_verifier")?;

    // Consuming first makes every later failure burn the code too.
    let record = match state.codes.consume(code).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return Err(OAuthError::invalid_grant("Invalid or expired authorization code"));
        }
        Err(e) => {
            tracing::error!(error = %e, "Authorization code store failed");
            return Err(OAuthError::ServerError);
        }
    };

    if request.client_id.as_deref() != Some(record.client_id.as_str()) {
        return Err(OAuthError::invalid_grant("Authorization code was issued to another client"));
    }
    if record.redirect_uri != redirect_uri {
        return Err(OAuthError::invalid_grant(
            "redirect_uri does not match the authorization request",
        ));
    }
    if !pkce::verify_with(code_verifier, &record.code_challenge, record.code_challenge_method) {
        tracing::warn!(user_id = %record.user_id, "PKCE verification failed");
        return Err(OAuthError::invalid_grant("PKCE verification failed"));
    }

    let pair = issue_pair(
        state,
        &record.user_id,
        &record.business_id,
        &record.email,
        record.scope_string(&state.config.default_scope),
    )?;

    tracing::info!(
        user_id = %record.user_id,
        business_id = %record.business_id,
        "Authorization code exchanged"
    );
    Ok(pair)
}

async fn refresh_token_grant(
    state: &HttpState,
    request: &TokenRequest,
) -> Result<TokenPair, OAuthError> {
    let presented = required(request.refresh_token.as_ref(), "refresh_token")?;

    let Some(claims) = state.issuer.verify_refresh_token(presented) else {
        return Err(OAuthError::invalid_grant("Invalid or expired refresh token"));
    };

    if let Some(ledger) = &state.ledger {
        let first_use = match claims.jti.as_deref() {
            Some(jti) => ledger.retire(jti).await,
            None => false,
        };
        if !first_use {
            tracing::warn!(user_id = %claims.sub, "Refresh token reuse rejected");
            return Err(OAuthError::invalid_grant("Invalid or expired refresh token"));
        }
    }

    let email = match state.profiles.current_email(&claims.sub).await {
        Ok(Some(email)) => email,
        Ok(None) => {
            tracing::warn!(user_id = %claims.sub, "Refresh for subject without a profile");
            return Err(OAuthError::invalid_grant("Account no longer exists"));
        }
        Err(e) => {
            tracing::error!(error = %e, "Profile lookup failed");
            return Err(OAuthError::ServerError);
        }
    };

    let scope = claims
        .scope
        .clone()
        .unwrap_or_else(|| state.config.default_scope.clone());
    let pair = issue_pair(state, &claims.sub, &claims.business_id, &email, scope)?;

    tracing::info!(user_id = %claims.sub, "Refresh token rotated");
    Ok(pair)
}

fn issue_pair(
    state: &HttpState,
    subject: &str,
    business_id: &str,
    email: &str,
    scope: String,
) -> Result<TokenPair, OAuthError> {
    let config = &state.config;
    let access_token = state
        .issuer
        .issue_access_token(subject, business_id, email, config.access_token_ttl)
        .map_err(signing_failed)?;
    let refresh_token = state
        .issuer
        .issue_refresh_token(subject, business_id, &scope, config.refresh_token_ttl)
        .map_err(signing_failed)?;

    Ok(TokenPair {
        access_token,
        refresh_token,
        expires_in: config.access_token_ttl_secs(),
        scope,
    })
}

fn signing_failed(error: TokenError) -> OAuthError {
    tracing::error!(error = %error, "Token issuance failed");
    OAuthError::ServerError
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

fn required<'a>(value: Option<&'a String>, name: &str) -> Result<&'a str, OAuthError> {
    non_empty(value).ok_or_else(|| OAuthError::invalid_request(format!("Missing {name}")))
}

// ─── Responses ───────────────────────────────────────────────────────────────

fn no_store(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

fn token_success(pair: &TokenPair) -> Response {
    no_store(
        Json(serde_json::json!({
            "access_token": pair.access_token,
            "token_type": "Bearer",
            "expires_in": pair.expires_in,
            "refresh_token": pair.refresh_token,
            "scope": pair.scope
        }))
        .into_response(),
    )
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = no_store(
            (
                status,
                Json(serde_json::json!({
                    "error": self.code(),
                    "error_description": self.description()
                })),
            )
                .into_response(),
        );
        if matches!(self, Self::InvalidClient(_)) {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"knearme-mcp\""),
            );
        }
        response
    }
}
