//! Signed access and refresh tokens.
//!
//! Tokens are HS256 JWTs. Verification needs only the signing key: signature,
//! expiry and the `token_use` claim are checked, with no store lookup. Every
//! failure collapses into `None`; the cause is logged at debug level only.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use super::types::{Claims, TokenUse};
use crate::config::SigningKey;
use crate::error::TokenError;

/// Mints and validates access and refresh tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    /// Build an issuer around an injected signing key.
    #[must_use]
    pub fn new(key: &SigningKey) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(key.as_bytes()),
            decoding_key: DecodingKey::from_secret(key.as_bytes()),
            validation,
        }
    }

    /// Issue an access token carrying the caller's identity.
    pub fn issue_access_token(
        &self,
        subject: &str,
        business_id: &str,
        email: &str,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let identity = Identity {
            email: Some(email.to_string()),
            scope: None,
        };
        self.sign(subject, business_id, identity, TokenUse::Access, ttl)
    }

    /// Issue a refresh token. It carries the granted scope, no email and a
    /// unique `jti`.
    pub fn issue_refresh_token(
        &self,
        subject: &str,
        business_id: &str,
        scope: &str,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let identity = Identity {
            email: None,
            scope: Some(scope.to_string()),
        };
        self.sign(subject, business_id, identity, TokenUse::Refresh, ttl)
    }

    /// Verify an access token. Refresh tokens never pass.
    #[must_use]
    pub fn verify_access_token(&self, token: &str) -> Option<Claims> {
        self.verify(token, TokenUse::Access)
    }

    /// Verify a refresh token. Access tokens never pass.
    #[must_use]
    pub fn verify_refresh_token(&self, token: &str) -> Option<Claims> {
        self.verify(token, TokenUse::Refresh)
    }

    fn sign(
        &self,
        subject: &str,
        business_id: &str,
        identity: Identity,
        token_use: TokenUse,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .ok_or(TokenError::LifetimeOutOfRange(ttl))?;

        // `exp` has whole-second precision; round up so a token never dies early.
        let mut exp = expires_at.timestamp();
        if expires_at.timestamp_subsec_nanos() > 0 {
            exp += 1;
        }

        let claims = Claims {
            sub: subject.to_string(),
            business_id: business_id.to_string(),
            email: identity.email,
            scope: identity.scope,
            token_use,
            iat: now.timestamp(),
            exp,
            jti: Some(uuid::Uuid::new_v4().simple().to_string()),
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    fn verify(&self, token: &str, expected: TokenUse) -> Option<Claims> {
        let claims = match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::debug!(kind = %expected, error = %e, "Token rejected");
                return None;
            }
        };

        if claims.token_use != expected {
            tracing::debug!(
                expected = %expected,
                actual = %claims.token_use,
                "Token rejected: wrong token_use"
            );
            return None;
        }

        // jsonwebtoken treats exp == now as valid; a token is dead at its exp.
        if claims.exp <= Utc::now().timestamp() {
            tracing::debug!(kind = %expected, "Token rejected: expired");
            return None;
        }

        Some(claims)
    }
}

/// Optional claims that differ between access and refresh tokens.
struct Identity {
    email: Option<String>,
    scope: Option<String>,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").field("algorithm", &"HS256").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn issuer() -> TokenIssuer {
        let key = SigningKey::new(b"unit-test-signing-key-with-32-plus-bytes".to_vec()).unwrap();
        TokenIssuer::new(&key)
    }

    #[test]
    fn test_access_token_roundtrip() {
        let issuer = issuer();
        let token = issuer.issue_access_token("user-1", "biz-1", "a@b.co", HOUR).unwrap();
        let claims = issuer.verify_access_token(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.business_id, "biz-1");
        assert_eq!(claims.email.as_deref(), Some("a@b.co"));
        assert_eq!(claims.token_use, TokenUse::Access);
        assert!((3600..=3601).contains(&(claims.exp - claims.iat)));
        assert!(claims.scope.is_none());
    }

    #[test]
    fn test_refresh_token_roundtrip() {
        let issuer = issuer();
        let token = issuer.issue_refresh_token("user-1", "biz-1", "mcp", HOUR).unwrap();
        let claims = issuer.verify_refresh_token(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.scope.as_deref(), Some("mcp"));
        assert!(claims.email.is_none());
        assert!(claims.jti.is_some());
    }

    #[test]
    fn test_cross_kind_rejected() {
        let issuer = issuer();
        let access = issuer.issue_access_token("u", "b", "e@x.co", HOUR).unwrap();
        let refresh = issuer.issue_refresh_token("u", "b", "mcp", HOUR).unwrap();
        assert!(issuer.verify_refresh_token(&access).is_none());
        assert!(issuer.verify_access_token(&refresh).is_none());
    }

    #[test]
    fn test_foreign_key_rejected() {
        let key = SigningKey::new(b"another-signing-key-also-32-bytes-long".to_vec()).unwrap();
        let other = TokenIssuer::new(&key);
        let token = other.issue_access_token("u", "b", "e@x.co", HOUR).unwrap();
        assert!(issuer().verify_access_token(&token).is_none());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let issuer = issuer();
        let token = issuer.issue_access_token("u", "b", "e@x.co", HOUR).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = r#"{"sub":"admin","business_id":"x","token_use":"access","exp":99999999999}"#;
        let forged_payload =
            base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, forged);
        parts[1] = forged_payload.as_str();
        assert!(issuer.verify_access_token(&parts.join(".")).is_none());
    }

    #[test]
    fn test_garbage_rejected() {
        let issuer = issuer();
        assert!(issuer.verify_access_token("").is_none());
        assert!(issuer.verify_access_token("not.a.jwt").is_none());
        assert!(issuer.verify_refresh_token("abc").is_none());
    }

    #[test]
    fn test_unique_jti_per_token() {
        let issuer = issuer();
        let a = issuer.issue_refresh_token("u", "b", "mcp", HOUR).unwrap();
        let b = issuer.issue_refresh_token("u", "b", "mcp", HOUR).unwrap();
        assert_ne!(
            issuer.verify_refresh_token(&a).unwrap().jti,
            issuer.verify_refresh_token(&b).unwrap().jti
        );
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let issuer = issuer();
        let token = issuer
            .issue_access_token("u", "b", "e@x.co", Duration::from_secs(2))
            .unwrap();
        assert!(issuer.verify_access_token(&token).is_some());
        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert!(issuer.verify_access_token(&token).is_none());
    }

    #[test]
    fn test_sub_second_lifetime_valid_at_issue() {
        let issuer = issuer();
        for _ in 0..40 {
            let token = issuer
                .issue_access_token("u", "b", "e@x.co", Duration::from_millis(500))
                .unwrap();
            let claims = issuer.verify_access_token(&token).unwrap();
            assert!(claims.exp > claims.iat);
        }
    }

    #[tokio::test]
    async fn test_sub_second_lifetime_expires() {
        let issuer = issuer();
        let token = issuer
            .issue_access_token("u", "b", "e@x.co", Duration::from_millis(500))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert!(issuer.verify_access_token(&token).is_none());
    }
}
