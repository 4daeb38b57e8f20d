//! HTTP front end.
//!
//! `GET /api?url=<link>` answers in one of three modes:
//! - JSON metadata (default; `nodirect` skips the direct-link step)
//! - `302` redirect to the direct link (`download`)
//! - streamed file bytes through the proxy (`proxy`, wins over `download`)
//!
//! `GET /health` reports liveness and the crate version.

mod error;

pub use error::ApiError;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header::{LOCATION, RANGE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::cache::ResultCache;
use crate::config::ServerConfig;
use crate::cookies::{CookieStore, FileCookieStore, MemoryCookieStore};
use crate::fetch::RedirectingClient;
use crate::proxy::StreamingProxy;
use crate::resolver::{ResolveError, ResolveOptions, ShareResolver, ShareSite};
use crate::service::ShareService;
use crate::user_agent;

/// Shared handler state.
#[derive(Debug)]
pub struct AppState {
    /// Cache-fronted resolver.
    pub service: ShareService,
    /// Byte relay for proxy mode.
    pub proxy: StreamingProxy,
}

impl AppState {
    /// Creates state from its parts.
    #[must_use]
    pub fn new(service: ShareService, proxy: StreamingProxy) -> Self {
        Self { service, proxy }
    }

    /// Wires clients, resolver, cache and cookie store from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when an HTTP client cannot be constructed.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let fetch = RedirectingClient::with_settings(
            config.connect_timeout(),
            config.hop_timeout(),
            config.max_hops,
        )
        .context("Failed to build upstream HTTP client")?;
        let resolver = ShareResolver::new(ShareSite::with_base_url(&config.base_url), fetch)
            .with_user_agent(&config.user_agent);

        let cookie_store: Arc<dyn CookieStore> = match &config.cookie_dir {
            Some(dir) => Arc::new(FileCookieStore::new(dir)),
            None => Arc::new(MemoryCookieStore::new()),
        };
        let cache = Arc::new(ResultCache::new(config.cache_ttl()));
        let service = ShareService::new(resolver, cache, cookie_store, config.cookie.clone());

        let proxy = StreamingProxy::with_settings(
            config.connect_timeout(),
            config.hop_timeout(),
            config.max_hops,
        )
        .context("Failed to build proxy HTTP client")?;
        Ok(Self::new(service, proxy))
    }
}

/// Builds the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(share_handler))
        .route("/api", get(share_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Serves `state` on `listener` until Ctrl-C, purging the cache in the background.
///
/// # Errors
///
/// Returns an error when the listener fails.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    let cache = Arc::clone(state.service.cache());
    let maintenance = spawn_cache_maintenance(Arc::clone(&cache), cache.ttl());

    info!(%addr, tool = %user_agent::tool_identifier(), "listening");
    let result = axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed");

    maintenance.abort();
    info!("server stopped");
    result
}

/// Periodically drops expired cache entries.
pub fn spawn_cache_maintenance(cache: Arc<ResultCache>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let purged = cache.purge_expired();
            debug!(purged, remaining = cache.len(), "cache maintenance tick");
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[derive(Debug, Deserialize)]
struct ShareQuery {
    url: Option<String>,
    download: Option<String>,
    proxy: Option<String>,
    nodirect: Option<String>,
}

/// How the resolved share is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseMode {
    Json,
    Redirect,
    Proxy,
}

impl ShareQuery {
    fn mode(&self) -> ResponseMode {
        if flag_enabled(self.proxy.as_deref()) {
            ResponseMode::Proxy
        } else if flag_enabled(self.download.as_deref()) {
            ResponseMode::Redirect
        } else {
            ResponseMode::Json
        }
    }

    fn options(&self, mode: ResponseMode) -> ResolveOptions {
        if mode == ResponseMode::Json && flag_enabled(self.nodirect.as_deref()) {
            ResolveOptions::metadata_only()
        } else {
            ResolveOptions::default()
        }
    }
}

/// A present flag counts as enabled when empty or `1`/`true`/`yes`.
fn flag_enabled(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        let v = v.trim();
        v.is_empty() || v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes")
    })
}

#[instrument(skip_all, fields(mode = tracing::field::Empty))]
async fn share_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ShareQuery>, QueryRejection>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let mode = query.mode();
    tracing::Span::current().record("mode", tracing::field::debug(mode));

    let link = query.url.as_deref().unwrap_or_default();
    let share = state.service.resolve(link, query.options(mode)).await?;

    if mode == ResponseMode::Json {
        return Ok(Json(share).into_response());
    }

    let direct_link = share
        .direct_link
        .ok_or_else(|| ResolveError::direct_link_failed("no direct link was resolved"))?;

    match mode {
        ResponseMode::Redirect => {
            let location = HeaderValue::from_str(&direct_link).map_err(|_| {
                ResolveError::direct_link_failed("direct link is not a valid header value")
            })?;
            Ok((StatusCode::FOUND, [(LOCATION, location)]).into_response())
        }
        _ => {
            let mut proxied = state.proxy.stream(&direct_link, headers.get(RANGE)).await?;
            let status = proxied.status;
            let forwarded = std::mem::take(&mut proxied.headers);
            let mut response = Response::new(Body::from_stream(proxied.into_stream()));
            *response.status_mut() = status;
            *response.headers_mut() = forwarded;
            Ok(response)
        }
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(download: Option<&str>, proxy: Option<&str>, nodirect: Option<&str>) -> ShareQuery {
        ShareQuery {
            url: Some("https://example.com/s/1abc".to_string()),
            download: download.map(ToString::to_string),
            proxy: proxy.map(ToString::to_string),
            nodirect: nodirect.map(ToString::to_string),
        }
    }

    #[test]
    fn test_flag_values() {
        for enabled in ["", "1", "true", "TRUE", "yes", " Yes "] {
            assert!(flag_enabled(Some(enabled)), "{enabled:?} should enable");
        }
        for disabled in ["0", "false", "no", "off"] {
            assert!(!flag_enabled(Some(disabled)), "{disabled:?} should not enable");
        }
        assert!(!flag_enabled(None));
    }

    #[test]
    fn test_mode_precedence() {
        assert_eq!(query(None, None, None).mode(), ResponseMode::Json);
        assert_eq!(query(Some("1"), None, None).mode(), ResponseMode::Redirect);
        assert_eq!(query(None, Some("1"), None).mode(), ResponseMode::Proxy);
        assert_eq!(query(Some("1"), Some("1"), None).mode(), ResponseMode::Proxy);
        assert_eq!(query(Some("0"), None, None).mode(), ResponseMode::Json);
    }

    #[test]
    fn test_nodirect_only_applies_to_json() {
        let q = query(None, None, Some("1"));
        assert!(!q.options(q.mode()).resolve_direct_link);

        let q = query(Some("1"), None, Some("1"));
        assert!(q.options(q.mode()).resolve_direct_link);

        let q = query(None, Some("1"), Some("1"));
        assert!(q.options(q.mode()).resolve_direct_link);
    }
}
