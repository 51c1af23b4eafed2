//! Opt-in ledger of rotated-away refresh tokens.
//!
//! Refresh tokens are stateless, so a rotated token stays cryptographically
//! valid until its own `exp`. When enabled, the ledger remembers the `jti` of
//! every refresh token that has been redeemed and refuses a second redemption.
//! Entries live exactly as long as a refresh token can, then fall out.

use std::time::Duration;

use moka::future::Cache;

use crate::config::defaults;

#[derive(Clone)]
pub struct RotationLedger {
    retired: Cache<String, ()>,
}

impl RotationLedger {
    /// Ledger whose entries expire after `refresh_ttl`.
    #[must_use]
    pub fn new(refresh_ttl: Duration) -> Self {
        let retired = Cache::builder()
            .max_capacity(defaults::ROTATION_LEDGER_CAPACITY)
            .time_to_live(refresh_ttl)
            .build();
        Self { retired }
    }

    /// Mark `jti` as redeemed.
    ///
    /// Returns `true` only for the first caller; concurrent redemptions of the
    /// same token see `false`.
    pub async fn retire(&self, jti: &str) -> bool {
        self.retired.entry(jti.to_string()).or_insert(()).await.is_fresh()
    }
}

impl std::fmt::Debug for RotationLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationLedger").field("entries", &self.retired.entry_count()).finish()
    }
}
