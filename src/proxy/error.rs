//! Error types for the streaming proxy.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur while opening a proxied download.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The direct link is not a fetchable HTTP(S) URL.
    #[error("invalid direct link '{url}': {reason}")]
    InvalidUrl {
        /// The rejected link.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The upstream answered with an error status.
    #[error("upstream returned HTTP {status} for '{url}'")]
    Upstream {
        /// Upstream status, relayed to the client.
        status: StatusCode,
        /// The requested URL.
        url: String,
    },

    /// Connecting to or reading from the upstream timed out.
    #[error("upstream request timed out: {url}")]
    Timeout {
        /// The requested URL.
        url: String,
    },

    /// Any other transport failure.
    #[error("upstream request failed for '{url}': {source}")]
    Network {
        /// The requested URL.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build proxy HTTP client: {source}")]
    ClientBuild {
        /// Builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl ProxyError {
    /// Classifies a transport error for `url`.
    pub(crate) fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Stable machine-readable code for the error kind.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl { .. } => "INVALID_DIRECT_LINK",
            Self::Upstream { .. } => "UPSTREAM_STATUS",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Network { .. } | Self::ClientBuild { .. } => "UPSTREAM_ERROR",
        }
    }
}
