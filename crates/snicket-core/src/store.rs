use crate::error::Result;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A stored shortening in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// The normalized original URL.
    pub url: String,
    /// The short code assigned to the URL.
    pub code: String,
    /// The domain extracted from the URL, used for per-domain counters.
    pub domain: String,
    /// When the record was created.
    pub created_at: Timestamp,
    /// When the record stops resolving.
    pub expires_at: Timestamp,
}

impl Record {
    /// Whether the record still resolves at `now`.
    pub fn is_live(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }
}

/// One entry of a top-domains ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainStat {
    /// 1-based position in the ranking.
    pub rank: u32,
    /// The domain the counter belongs to.
    pub domain: String,
    /// How many shortenings this domain accumulated over the store's lifetime.
    pub shortened: u64,
}

/// The storage contract shared by all backends.
///
/// A backend maps URLs to short codes bidirectionally, expires records after
/// a backend-configured TTL and keeps per-domain lifetime counters that
/// survive record expiry.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Checks whether a short code is currently taken by a live record.
    async fn code_exists(&self, code: &str) -> Result<bool>;

    /// Looks up the short code for a URL.
    /// Returns `None` if the URL was never shortened or its record expired.
    async fn get_code(&self, url: &str) -> Result<Option<String>>;

    /// Resolves a short code back to its URL.
    /// Returns `None` if the code is unknown or its record expired.
    async fn get_url(&self, code: &str) -> Result<Option<String>>;

    /// Stores a shortening and bumps the domain's lifetime counter.
    ///
    /// A call is a no-op while a live record for `url` exists; an expired
    /// record is overwritten in place. Calls with an empty `url`, `code` or
    /// `domain` are ignored.
    async fn save(&self, url: &str, code: &str, domain: &str) -> Result<()>;

    /// Returns up to `n` domains ordered by their lifetime counters,
    /// most shortened first. Ties break alphabetically by domain.
    async fn top_domains(&self, n: usize) -> Result<Vec<DomainStat>>;

    /// Physically removes expired records. Domain counters are kept.
    async fn purge(&self) -> Result<()>;
}
