//! Error types for the redirecting fetch client.

use thiserror::Error;

/// Errors that can occur while following a redirect chain.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request URL (or a redirect target) could not be parsed.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
        /// Why parsing failed.
        reason: String,
    },

    /// A request or redirect target uses a scheme other than HTTP(S).
    #[error("refusing to fetch non-HTTP URL '{url}'")]
    UnsupportedScheme {
        /// The rejected URL.
        url: String,
    },

    /// The hop budget was exhausted before a terminal response arrived.
    #[error("too many redirects resolving '{url}' (limit {max_hops} hops)")]
    TooManyRedirects {
        /// The URL the chain started from.
        url: String,
        /// The hop limit that was reached.
        max_hops: usize,
    },

    /// A single hop exceeded its timeout.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL of the hop that timed out.
        url: String,
    },

    /// Network-level error (DNS, connection refused, TLS, body read).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL of the failing hop.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The accumulated cookie jar cannot be encoded as a header value.
    #[error("cookie jar contains characters that are not valid in a Cookie header")]
    InvalidCookieHeader,

    /// HTTP client construction failed.
    #[error("HTTP client construction failed: {source}")]
    ClientBuild {
        /// The builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Classifies a transport error for the hop at `url`.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Returns true for errors caused by a hop timing out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
