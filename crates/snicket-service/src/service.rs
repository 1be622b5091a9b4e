use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::normalize::normalize_url;
use snicket_core::{DomainStat, Store};
use snicket_generator::generate_unique_code;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shortening and resolution on top of a [`Store`].
///
/// The service normalizes incoming URLs, generates collision-checked codes
/// and mints full short links under the configured base URL. It holds the
/// store behind an [`Arc`] so the purge task and health prober can share it.
pub struct ShortenerService<S> {
    store: Arc<S>,
    config: ServiceConfig,
}

impl<S> Clone for ShortenerService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: Store> ShortenerService<S> {
    /// Creates a service owning its store.
    pub fn new(store: S, config: ServiceConfig) -> Self {
        Self::with_shared(Arc::new(store), config)
    }

    /// Creates a service over a store shared with other parts of the
    /// application, such as the purge task.
    pub fn with_shared(store: Arc<S>, config: ServiceConfig) -> Self {
        Self { store, config }
    }

    /// The store this service writes through.
    pub fn store(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    /// Shortens `raw_url` and returns the full short link.
    ///
    /// Shortening a URL that already has a live record hands back the link
    /// it already owns instead of minting a new one.
    pub async fn shorten(&self, raw_url: &str) -> Result<String, ServiceError> {
        let (url, domain) = normalize_url(raw_url)?;

        if let Some(code) = self.store.get_code(&url).await? {
            debug!(url = %url, code = %code, "url is already shortened");
            return Ok(self.short_link(&code));
        }

        let code = generate_unique_code(
            self.config.code_length,
            self.config.max_attempts,
            |code| async move { self.store.code_exists(&code).await },
        )
        .await?;

        self.store.save(&url, &code, &domain).await?;
        info!(url = %url, code = %code, domain = %domain, "shortened url");
        Ok(self.short_link(&code))
    }

    /// Resolves a short code back to its URL.
    pub async fn resolve(&self, code: &str) -> Result<Option<String>, ServiceError> {
        let url = self.store.get_url(code).await?;
        if url.is_none() {
            warn!(code, "short code not found");
        }
        Ok(url)
    }

    /// Reports the busiest domains; `0` asks for the configured default.
    pub async fn metrics(&self, top: usize) -> Result<Vec<DomainStat>, ServiceError> {
        let n = if top == 0 {
            self.config.default_top_n
        } else {
            top
        };
        Ok(self.store.top_domains(n).await?)
    }

    fn short_link(&self, code: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::SignedDuration;
    use snicket_generator::ALPHABET;
    use snicket_storage::MemoryStore;

    fn service() -> ShortenerService<MemoryStore> {
        let store = MemoryStore::new(SignedDuration::from_hours(1));
        ShortenerService::new(store, ServiceConfig::default())
    }

    fn code_of(link: &str) -> &str {
        link.rsplit('/').next().unwrap()
    }

    #[tokio::test]
    async fn shorten_mints_a_link_under_the_base_url() {
        let service = service();

        let link = service.shorten("https://example.com/page").await.unwrap();

        assert!(link.starts_with("http://localhost:8080/"));
        let code = code_of(&link);
        assert_eq!(code.len(), 7);
        assert!(code.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[tokio::test]
    async fn shorten_is_idempotent_per_url() {
        let service = service();

        let first = service.shorten("https://example.com/page").await.unwrap();
        let second = service.shorten("https://example.com/page").await.unwrap();
        assert_eq!(first, second);

        let top = service.metrics(10).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].shortened, 1);
    }

    #[tokio::test]
    async fn shorten_normalizes_before_matching() {
        let service = service();

        let bare = service.shorten("example.com/page").await.unwrap();
        let schemed = service.shorten("http://Example.com/page").await.unwrap();
        assert_eq!(bare, schemed);
    }

    #[tokio::test]
    async fn resolve_round_trips_the_normalized_url() {
        let service = service();

        let link = service.shorten("Example.com/Some/Path").await.unwrap();
        let url = service.resolve(code_of(&link)).await.unwrap();
        assert_eq!(url.as_deref(), Some("http://example.com/Some/Path"));
    }

    #[tokio::test]
    async fn resolve_unknown_code_is_none() {
        let service = service();
        assert_eq!(service.resolve("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn shorten_rejects_invalid_urls() {
        let service = service();

        assert!(matches!(
            service.shorten("").await,
            Err(ServiceError::InvalidUrl(_))
        ));
        assert!(matches!(
            service.shorten("ftp://example.com").await,
            Err(ServiceError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn metrics_uses_the_configured_default_for_zero() {
        let service = service();

        service.shorten("http://a.com/1").await.unwrap();
        service.shorten("http://a.com/2").await.unwrap();
        service.shorten("http://b.com/1").await.unwrap();
        service.shorten("http://c.com/1").await.unwrap();
        service.shorten("http://d.com/1").await.unwrap();

        let defaulted = service.metrics(0).await.unwrap();
        assert_eq!(defaulted.len(), 3);
        assert_eq!(defaulted[0].domain, "a.com");
        assert_eq!(defaulted[0].shortened, 2);

        let explicit = service.metrics(2).await.unwrap();
        assert_eq!(explicit.len(), 2);
    }

    #[tokio::test]
    async fn base_url_trailing_slash_is_tolerated() {
        let store = MemoryStore::new(SignedDuration::from_hours(1));
        let config = ServiceConfig::builder()
            .base_url("https://sn.example/".to_string())
            .build();
        let service = ShortenerService::new(store, config);

        let link = service.shorten("https://example.com/a").await.unwrap();
        // The configured slash and the join slash must not double up.
        assert_eq!(link, format!("https://sn.example/{}", code_of(&link)));
    }
}
