//! Cache-fronted share resolution with session cookie write-back.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::cache::ResultCache;
use crate::cookies::CookieStore;
use crate::resolver::{ResolveError, ResolveOptions, ResolvedShare, ShareResolver};

/// Normalizes a user-supplied share link into its cache key.
///
/// The link is percent-decoded once (left as-is if decoding fails) and trimmed.
/// Returns `None` for blank input.
#[must_use]
pub fn normalize_share_link(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let decoded = urlencoding::decode(trimmed)
        .map_or_else(|_| trimmed.to_string(), std::borrow::Cow::into_owned);
    let normalized = decoded.trim();
    (!normalized.is_empty()).then(|| normalized.to_string())
}

/// Resolves share links through the cache, seeding and persisting the session cookie.
pub struct ShareService {
    resolver: ShareResolver,
    cache: Arc<ResultCache>,
    cookie_store: Arc<dyn CookieStore>,
    fallback_cookie: String,
}

impl ShareService {
    /// Creates a service.
    ///
    /// `fallback_cookie` seeds the session whenever the store holds nothing.
    #[must_use]
    pub fn new(
        resolver: ShareResolver,
        cache: Arc<ResultCache>,
        cookie_store: Arc<dyn CookieStore>,
        fallback_cookie: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            cache,
            cookie_store,
            fallback_cookie: fallback_cookie.into(),
        }
    }

    /// Shared result cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Resolves `link`, answering from the cache when possible.
    ///
    /// A cached entry without a direct link does not satisfy a request that
    /// needs one. Only successful resolutions are cached. A changed session
    /// cookie is saved back to the store; a failed save is logged, not returned.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::MissingInput`] for a blank link, or whatever the
    /// negotiation fails with.
    #[instrument(skip(self), fields(link = %link))]
    pub async fn resolve(
        &self,
        link: &str,
        options: ResolveOptions,
    ) -> Result<ResolvedShare, ResolveError> {
        let key = normalize_share_link(link).ok_or(ResolveError::MissingInput)?;

        if let Some(cached) = self.cache.get(&key) {
            if !options.resolve_direct_link || cached.direct_link.is_some() {
                info!(file = %cached.file_name, "serving cached resolution");
                return Ok(cached);
            }
            debug!("cached entry lacks a direct link, resolving again");
        }

        let seed = self.seed_cookie().await;
        let outcome = self.resolver.resolve(&key, &seed, options).await?;

        if outcome.cookie_changed {
            match self.cookie_store.save(&outcome.cookie).await {
                Ok(()) => debug!("session cookie updated"),
                Err(e) => warn!(error = %e, "failed to persist session cookie"),
            }
        }

        self.cache.put(key, outcome.share.clone());
        Ok(outcome.share)
    }

    async fn seed_cookie(&self) -> String {
        match self.cookie_store.load().await {
            Ok(Some(cookie)) => cookie,
            Ok(None) => self.fallback_cookie.clone(),
            Err(e) => {
                warn!(error = %e, "failed to load session cookie, using configured cookie");
                self.fallback_cookie.clone()
            }
        }
    }
}

impl std::fmt::Debug for ShareService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareService")
            .field("resolver", &self.resolver)
            .field("cache", &self.cache)
            .field("fallback_cookie", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}
