//! Redirect-following HTTP client that replays session cookies between hops.
//!
//! Transport-level redirect following is disabled; this client walks the chain
//! itself so every hop's `Set-Cookie` fragments land in the caller's
//! [`CookieJar`] and are replayed on the next hop, exactly as a browser would.
//!
//! # Example
//!
//! ```no_run
//! use reqwest::Method;
//! use reqwest::header::HeaderMap;
//! use sharelink_core::cookies::CookieJar;
//! use sharelink_core::fetch::RedirectingClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RedirectingClient::new()?;
//! let mut jar = CookieJar::from_header("ndus=seed");
//! let response = client
//!     .resolve("https://example.com/s/1abc", &HeaderMap::new(), Method::GET, &mut jar)
//!     .await?;
//! println!("landed on {} after {} hop(s)", response.final_url(), response.hops().len());
//! # Ok(())
//! # }
//! ```

mod error;

pub use error::FetchError;

use std::time::Duration;

use reqwest::header::{COOKIE, HeaderMap, HeaderValue, LOCATION, SET_COOKIE};
use reqwest::{Client, ClientBuilder, Method, StatusCode, redirect};
use tracing::{debug, instrument, trace};
use url::Url;

use crate::cookies::CookieJar;

/// Default hop budget for one fetch call.
pub const DEFAULT_MAX_HOPS: usize = 10;

/// Default per-hop timeout.
pub const DEFAULT_HOP_TIMEOUT_SECS: u64 = 10;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// One request/response pair of a redirect chain.
#[derive(Debug, Clone)]
pub struct FetchHop {
    /// URL requested on this hop.
    pub url: Url,
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw `Set-Cookie` values this hop contributed.
    pub set_cookies: Vec<String>,
}

/// Terminal response of a redirect chain.
///
/// The body is left unread; callers decide whether to read text, stream or drop it.
#[derive(Debug)]
pub struct FetchResponse {
    final_url: Url,
    hops: Vec<FetchHop>,
    response: reqwest::Response,
}

impl FetchResponse {
    /// URL of the terminal hop after all redirects.
    #[must_use]
    pub fn final_url(&self) -> &Url {
        &self.final_url
    }

    /// Status of the terminal hop.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    /// Headers of the terminal hop.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    /// Every hop in order, including the terminal one.
    #[must_use]
    pub fn hops(&self) -> &[FetchHop] {
        &self.hops
    }

    /// Reads the terminal body as text.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Timeout`] or [`FetchError::Network`] when reading fails.
    pub async fn text(self) -> Result<String, FetchError> {
        let url = self.final_url.to_string();
        self.response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))
    }

    /// Gives up chain metadata and returns the raw terminal response.
    #[must_use]
    pub fn into_response(self) -> reqwest::Response {
        self.response
    }
}

/// HTTP client that follows redirects manually while threading a cookie jar.
#[derive(Debug, Clone)]
pub struct RedirectingClient {
    client: Client,
    max_hops: usize,
}

impl RedirectingClient {
    /// Creates a client with default timeouts and hop budget.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] when client construction fails.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_settings(
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            Duration::from_secs(DEFAULT_HOP_TIMEOUT_SECS),
            DEFAULT_MAX_HOPS,
        )
    }

    /// Creates a client with explicit timeouts and hop budget.
    ///
    /// `hop_timeout` bounds each request individually, body read included.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] when client construction fails.
    pub fn with_settings(
        connect_timeout: Duration,
        hop_timeout: Duration,
        max_hops: usize,
    ) -> Result<Self, FetchError> {
        let client = base_builder(connect_timeout, hop_timeout)
            .build()
            .map_err(|source| FetchError::ClientBuild { source })?;
        Ok(Self {
            client,
            max_hops: max_hops.max(1),
        })
    }

    /// Hop budget used by [`resolve`](Self::resolve).
    #[must_use]
    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    /// Follows `url` through its redirect chain with this client's hop budget.
    ///
    /// See [`resolve_with_limit`](Self::resolve_with_limit).
    ///
    /// # Errors
    ///
    /// Same as [`resolve_with_limit`](Self::resolve_with_limit).
    pub async fn resolve(
        &self,
        url: &str,
        headers: &HeaderMap,
        method: Method,
        jar: &mut CookieJar,
    ) -> Result<FetchResponse, FetchError> {
        self.resolve_with_limit(url, headers, method, jar, self.max_hops)
            .await
    }

    /// Follows `url` through at most `max_hops` requests.
    ///
    /// Each hop sends `headers` plus the current jar as `Cookie`, then merges the
    /// response's `Set-Cookie` values into `jar`. A 3xx response with a
    /// `Location` moves to the next hop; a 3xx without one is terminal.
    ///
    /// # Errors
    ///
    /// - [`FetchError::TooManyRedirects`] when the budget runs out mid-chain
    /// - [`FetchError::UnsupportedScheme`] for non-HTTP(S) targets
    /// - [`FetchError::Timeout`] / [`FetchError::Network`] for transport failures
    #[instrument(skip(self, headers, jar), fields(url = %url, method = %method))]
    pub async fn resolve_with_limit(
        &self,
        url: &str,
        headers: &HeaderMap,
        method: Method,
        jar: &mut CookieJar,
        max_hops: usize,
    ) -> Result<FetchResponse, FetchError> {
        let mut current = parse_http_url(url)?;
        let mut hops = Vec::new();

        for hop in 0..max_hops {
            let mut hop_headers = headers.clone();
            if !jar.is_empty() {
                let cookie = HeaderValue::from_str(&jar.to_header_value())
                    .map_err(|_| FetchError::InvalidCookieHeader)?;
                hop_headers.insert(COOKIE, cookie);
            }

            let response = self
                .client
                .request(method.clone(), current.clone())
                .headers(hop_headers)
                .send()
                .await
                .map_err(|e| FetchError::from_reqwest(current.as_str(), e))?;

            let status = response.status();
            let set_cookies: Vec<String> = response
                .headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|value| value.to_str().ok())
                .map(ToString::to_string)
                .collect();
            jar.merge_all(set_cookies.iter().map(String::as_str));

            debug!(
                hop = hop + 1,
                status = status.as_u16(),
                url = %current,
                cookies = set_cookies.len(),
                "fetch hop complete"
            );

            let next = if status.is_redirection() {
                response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .map(|location| resolve_location(&current, location))
                    .transpose()?
            } else {
                None
            };

            hops.push(FetchHop {
                url: current.clone(),
                status,
                headers: response.headers().clone(),
                set_cookies,
            });

            match next {
                Some(target) => {
                    trace!(from = %current, to = %target, "following redirect");
                    current = target;
                }
                None => {
                    return Ok(FetchResponse {
                        final_url: current,
                        hops,
                        response,
                    });
                }
            }
        }

        Err(FetchError::TooManyRedirects {
            url: url.to_string(),
            max_hops,
        })
    }
}

fn base_builder(connect_timeout: Duration, hop_timeout: Duration) -> ClientBuilder {
    Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(hop_timeout)
        .redirect(redirect::Policy::none())
}

fn parse_http_url(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url.trim()).map_err(|e| FetchError::invalid_url(url, e))?;
    ensure_http(parsed)
}

fn ensure_http(url: Url) -> Result<Url, FetchError> {
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(FetchError::UnsupportedScheme {
            url: url.to_string(),
        }),
    }
}

/// Resolves a `Location` header against the URL that produced it.
///
/// Absolute, scheme-relative, path-absolute and relative forms are accepted.
///
/// # Errors
///
/// Returns [`FetchError::InvalidUrl`] when the location cannot be joined, or
/// [`FetchError::UnsupportedScheme`] when it points outside HTTP(S).
pub fn resolve_location(current: &Url, location: &str) -> Result<Url, FetchError> {
    let joined = current
        .join(location.trim())
        .map_err(|e| FetchError::invalid_url(location, e))?;
    ensure_http(joined)
}
