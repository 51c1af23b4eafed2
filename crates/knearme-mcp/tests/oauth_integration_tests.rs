//! End-to-end OAuth flow: consent hands over a code, the agent redeems it,
//! calls a tool, rotates its tokens and calls again.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tower::ServiceExt;

use knearme_mcp::config::Config;
use knearme_mcp::profile::InMemoryProfileStore;
use knearme_mcp::server::McpServer;
use knearme_mcp::server::oauth::{
    AuthCodeStore, CodeChallengeMethod, InMemoryAuthCodeStore, NewAuthorizationCode,
};
use knearme_mcp::tools;

const REDIRECT_URI: &str = "http://127.0.0.1:33418/callback";

fn grant(code_challenge: String) -> NewAuthorizationCode {
    NewAuthorizationCode {
        client_id: "test-client".into(),
        redirect_uri: REDIRECT_URI.into(),
        code_challenge,
        code_challenge_method: CodeChallengeMethod::S256,
        user_id: "6f1c0a52-user".into(),
        business_id: "b7e2-biz".into(),
        email: "roofer@example.com".into(),
        scopes: vec!["mcp".into()],
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn token_request(params: &[(&str, &str)]) -> Request<Body> {
    Request::post("/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(serde_urlencoded::to_string(params).unwrap()))
        .unwrap()
}

fn tool_call(access_token: &str) -> Request<Body> {
    Request::post("/mcp")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
        .body(Body::from(
            json!({
                "jsonrpc": "2.0",
                "id": 10,
                "method": "tools/call",
                "params": { "name": "get_account", "arguments": {} }
            })
            .to_string(),
        ))
        .unwrap()
}

#[tokio::test]
async fn test_full_oauth_http_flow() {
    let profiles =
        Arc::new(InMemoryProfileStore::with_profiles([("6f1c0a52-user", "roofer@example.com")]));
    let server =
        McpServer::new(Config::for_testing(), profiles.clone(), tools::register_all_tools());
    let app = server.router();

    // 1. Discovery
    let discovery = Request::get("/.well-known/oauth-authorization-server")
        .body(Body::empty())
        .unwrap();
    let (status, metadata) = send(&app, discovery).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metadata["token_endpoint"], "https://mcp.example.test/token");

    // 2. PKCE + consent (performed by the portfolio app)
    let code_verifier = "M25iVXpKU3puUjFaYWg3T1NDTDQtcW1ROUY5YXlwalNoc0hhakxifmZHag";
    let code_challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()));
    let code = server.code_store().issue(grant(code_challenge)).await.unwrap();

    // 3. Token exchange
    let (status, tokens) = send(
        &app,
        token_request(&[
            ("grant_type", "authorization_code"),
            ("client_id", "test-client"),
            ("client_secret", "test-secret"),
            ("code", code.as_str()),
            ("redirect_uri", REDIRECT_URI),
            ("code_verifier", code_verifier),
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tokens["scope"], "mcp");

    // 4. Tool call with the access token
    let (status, body) = send(&app, tool_call(tokens["access_token"].as_str().unwrap())).await;
    assert_eq!(status, StatusCode::OK);
    let account: Value =
        serde_json::from_str(body["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(account["business_id"], "b7e2-biz");
    assert_eq!(account["email"], "roofer@example.com");

    // 5. Contractor changes email, agent refreshes
    profiles.upsert("6f1c0a52-user", "owner@roofing.example").await;
    let (status, rotated) = send(
        &app,
        token_request(&[
            ("grant_type", "refresh_token"),
            ("client_id", "test-client"),
            ("refresh_token", tokens["refresh_token"].as_str().unwrap()),
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // 6. The new access token carries the new email
    let (status, body) = send(&app, tool_call(rotated["access_token"].as_str().unwrap())).await;
    assert_eq!(status, StatusCode::OK);
    let account: Value =
        serde_json::from_str(body["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(account["email"], "owner@roofing.example");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_code_redemption_has_one_winner() {
    let server = McpServer::new(
        Config::for_testing(),
        Arc::new(InMemoryProfileStore::new()),
        tools::register_all_tools(),
    );
    let app = server.router();

    let code_verifier = "concurrent-redemption-verifier-0123456789-abcdefghij";
    let code_challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()));
    let code = server.code_store().issue(grant(code_challenge)).await.unwrap();

    let attempts = (0..16).map(|_| {
        let app = app.clone();
        let code = code.clone();
        tokio::spawn(async move {
            let (status, _) = send(
                &app,
                token_request(&[
                    ("grant_type", "authorization_code"),
                    ("client_id", "test-client"),
                    ("code", code.as_str()),
                    ("redirect_uri", REDIRECT_URI),
                    ("code_verifier", code_verifier),
                ]),
            )
            .await;
            status
        })
    });

    let statuses: Vec<StatusCode> =
        futures::future::join_all(attempts).await.into_iter().map(Result::unwrap).collect();

    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::BAD_REQUEST).count(), 15);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_store_consume_has_one_winner() {
    let store = Arc::new(InMemoryAuthCodeStore::new());
    let code = store.issue(grant("challenge".into())).await.unwrap();

    let handles = (0..32).map(|_| {
        let store = Arc::clone(&store);
        let code = code.clone();
        tokio::spawn(async move { store.consume(&code).await.unwrap().is_some() })
    });

    let winners = futures::future::join_all(handles)
        .await
        .into_iter()
        .filter(|r| *r.as_ref().unwrap())
        .count();
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_expired_code_rejected_end_to_end() {
    let mut config = Config::for_testing();
    config.auth_code_ttl = std::time::Duration::ZERO;
    let server =
        McpServer::new(config, Arc::new(InMemoryProfileStore::new()), tools::register_all_tools());
    let app = server.router();

    let code_verifier = "expired-code-verifier-0123456789-abcdefghijklmnop";
    let code_challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()));
    let code = server.code_store().issue(grant(code_challenge)).await.unwrap();

    let (status, body) = send(
        &app,
        token_request(&[
            ("grant_type", "authorization_code"),
            ("client_id", "test-client"),
            ("code", code.as_str()),
            ("redirect_uri", REDIRECT_URI),
            ("code_verifier", code_verifier),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_grant");
}
