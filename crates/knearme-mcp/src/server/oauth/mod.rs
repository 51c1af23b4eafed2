//! OAuth 2.1 authorization server for MCP authentication.
//!
//! Authorization codes are approved and issued outside this crate (by the
//! portfolio app's consent flow, sharing the [`AuthCodeStore`]); this module
//! redeems them and manages the resulting tokens.
//!
//! ## Supported Standards
//! - RFC 6749: Authorization Code and Refresh Token grants
//! - RFC 7636: PKCE (S256 and plain)
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 9728: OAuth Protected Resource Metadata

pub mod handlers;
pub mod ledger;
pub mod pkce;
pub mod store;
pub mod tokens;
pub mod types;

pub use ledger::RotationLedger;
pub use store::{AuthCodeStore, InMemoryAuthCodeStore};
pub use tokens::TokenIssuer;
pub use types::{
    AuthorizationCode, Claims, CodeChallengeMethod, NewAuthorizationCode, TokenPair, TokenUse,
};
