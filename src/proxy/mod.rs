//! Range-aware streaming proxy to a resolved direct link.
//!
//! The proxy issues a plain GET to the direct link, forwarding only the
//! client's `Range` header. Session cookies and browser identity are never
//! sent. Only content-describing headers are relayed back, plus a permissive
//! cross-origin header, and the body is streamed without buffering.

mod error;

pub use error::ProxyError;

use std::time::Duration;

use axum::body::Bytes;
use futures_util::{Stream, TryStreamExt};
use reqwest::header::{
    ACCEPT_RANGES, ACCESS_CONTROL_ALLOW_ORIGIN, HeaderMap, HeaderName, HeaderValue, RANGE,
};
use reqwest::{Client, StatusCode, redirect};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::fetch::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_HOP_TIMEOUT_SECS, DEFAULT_MAX_HOPS};

/// Returns true if an upstream response header should reach the client.
///
/// `Content-*` headers and `Accept-Ranges` are forwarded; everything else
/// (cookies, caching, server identity) is dropped.
#[must_use]
pub fn is_forwardable_header(name: &HeaderName) -> bool {
    name.as_str().starts_with("content-") || *name == ACCEPT_RANGES
}

/// An open upstream download ready to be relayed.
#[derive(Debug)]
pub struct ProxiedResponse {
    /// Upstream status (200, or 206 for a satisfied range).
    pub status: StatusCode,
    /// Filtered headers for the client response.
    pub headers: HeaderMap,
    response: reqwest::Response,
}

impl ProxiedResponse {
    /// Consumes the response into a byte stream of the upstream body.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, reqwest::Error>> + Send {
        self.response
            .bytes_stream()
            .inspect_err(|e| warn!(error = %e, "proxied body stream failed"))
    }
}

/// Opens direct links and relays their bodies.
#[derive(Debug, Clone)]
pub struct StreamingProxy {
    client: Client,
}

impl StreamingProxy {
    /// Creates a proxy with default timeouts and hop budget.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::ClientBuild`] when client construction fails.
    pub fn new() -> Result<Self, ProxyError> {
        Self::with_settings(
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            Duration::from_secs(DEFAULT_HOP_TIMEOUT_SECS),
            DEFAULT_MAX_HOPS,
        )
    }

    /// Creates a proxy with explicit timeouts and hop budget.
    ///
    /// `read_timeout` bounds each read, not the whole transfer, so long
    /// downloads are not cut off. `max_hops` counts requests the same way
    /// [`RedirectingClient`](crate::fetch::RedirectingClient) does: a budget
    /// of `n` allows `n - 1` redirects.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::ClientBuild`] when client construction fails.
    pub fn with_settings(
        connect_timeout: Duration,
        read_timeout: Duration,
        max_hops: usize,
    ) -> Result<Self, ProxyError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .redirect(redirect::Policy::limited(max_hops.max(1) - 1))
            .build()
            .map_err(|source| ProxyError::ClientBuild { source })?;
        Ok(Self { client })
    }

    /// Opens `direct_link`, forwarding `range` if the client sent one.
    ///
    /// # Errors
    ///
    /// - [`ProxyError::InvalidUrl`] for non-HTTP(S) links
    /// - [`ProxyError::Upstream`] when the upstream answers 4xx/5xx
    /// - [`ProxyError::Timeout`] / [`ProxyError::Network`] for transport failures
    #[instrument(skip(self, range), fields(has_range = range.is_some()))]
    pub async fn stream(
        &self,
        direct_link: &str,
        range: Option<&HeaderValue>,
    ) -> Result<ProxiedResponse, ProxyError> {
        let url = parse_direct_link(direct_link)?;

        let mut request = self.client.get(url.clone());
        if let Some(range) = range {
            request = request.header(RANGE, range.clone());
        }
        let response = request
            .send()
            .await
            .map_err(|e| ProxyError::from_reqwest(url.as_str(), e))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(ProxyError::Upstream {
                status,
                url: url.to_string(),
            });
        }

        let headers = forwardable_headers(response.headers());
        debug!(
            status = status.as_u16(),
            forwarded = headers.len(),
            "proxy stream opened"
        );
        Ok(ProxiedResponse {
            status,
            headers,
            response,
        })
    }
}

fn parse_direct_link(direct_link: &str) -> Result<Url, ProxyError> {
    let url = Url::parse(direct_link.trim()).map_err(|e| ProxyError::InvalidUrl {
        url: direct_link.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ProxyError::InvalidUrl {
            url: direct_link.to_string(),
            reason: format!("unsupported scheme '{scheme}'"),
        }),
    }
}

fn forwardable_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers: HeaderMap = upstream
        .iter()
        .filter(|(name, _)| is_forwardable_header(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, SET_COOKIE};

    #[test]
    fn test_forwardable_header_names() {
        assert!(is_forwardable_header(&CONTENT_TYPE));
        assert!(is_forwardable_header(&CONTENT_LENGTH));
        assert!(is_forwardable_header(&CONTENT_RANGE));
        assert!(is_forwardable_header(&HeaderName::from_static("content-disposition")));
        assert!(is_forwardable_header(&ACCEPT_RANGES));
        assert!(!is_forwardable_header(&SET_COOKIE));
        assert!(!is_forwardable_header(&HeaderName::from_static("server")));
        assert!(!is_forwardable_header(&HeaderName::from_static("x-content-id")));
    }

    #[test]
    fn test_forwardable_headers_adds_cors() {
        let mut upstream = HeaderMap::new();
        upstream.insert(CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
        upstream.insert(SET_COOKIE, HeaderValue::from_static("a=b"));
        upstream.insert("etag", HeaderValue::from_static("\"x\""));

        let headers = forwardable_headers(&upstream);
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "video/mp4");
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
        assert!(headers.get(SET_COOKIE).is_none());
        assert!(headers.get("etag").is_none());
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_parse_direct_link_rejects_non_http() {
        assert!(parse_direct_link("https://cdn.example.com/f").is_ok());
        assert!(matches!(
            parse_direct_link("file:///etc/passwd").unwrap_err(),
            ProxyError::InvalidUrl { .. }
        ));
        assert!(matches!(
            parse_direct_link("nonsense").unwrap_err(),
            ProxyError::InvalidUrl { .. }
        ));
    }
}
