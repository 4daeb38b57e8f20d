//! Error types for share resolution.
//!
//! Every step of the negotiation fails the whole resolution; each variant
//! names the step's unmet precondition so callers can map it to a response.

use thiserror::Error;

use crate::fetch::FetchError;

/// Errors that can occur while resolving a share link.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// No share link was supplied.
    #[error("missing share link")]
    MissingInput,

    /// The supplied share link is not a fetchable HTTP(S) URL.
    #[error("invalid share link '{url}': {reason}")]
    InvalidLink {
        /// The rejected link.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The share page's final URL carries no share identifier.
    #[error("share identifier not found in '{url}'")]
    MissingShareIdentifier {
        /// Final URL of the share page after redirects.
        url: String,
    },

    /// No token strategy matched the share page.
    #[error("token not found on share page '{url}' (session cookie may be stale or missing)")]
    MissingToken {
        /// Final URL of the share page after redirects.
        url: String,
    },

    /// The file listing succeeded but contained no entries.
    #[error("Empty list")]
    EmptyFileList {
        /// Share identifier that was listed.
        share_id: String,
    },

    /// The file listing API answered with a non-zero `errno`.
    #[error("file list request rejected by upstream (errno {errno})")]
    FileListRejected {
        /// Upstream error number.
        errno: i64,
    },

    /// The file listing API answered with something that is not a listing.
    #[error("unexpected file list response: {reason}")]
    InvalidFileList {
        /// Parse failure description.
        reason: String,
    },

    /// The selected file's download link did not lead to a usable direct link.
    #[error("direct link resolution failed: {reason}")]
    DirectLinkResolutionFailed {
        /// Why resolution failed.
        reason: String,
    },

    /// A redirect chain exceeded its hop budget.
    #[error("too many redirects resolving '{url}' (limit {max_hops} hops)")]
    TooManyRedirects {
        /// The URL the chain started from.
        url: String,
        /// The hop limit that was reached.
        max_hops: usize,
    },

    /// An upstream request exceeded its timeout.
    #[error("upstream request timed out: {url}")]
    Timeout {
        /// The URL of the hop that timed out.
        url: String,
    },

    /// Any other transport failure.
    #[error("upstream request failed: {message}")]
    Transport {
        /// Rendered transport error.
        message: String,
    },
}

impl ResolveError {
    /// Creates a `MissingShareIdentifier` error.
    #[must_use]
    pub fn missing_share_identifier(url: impl Into<String>) -> Self {
        Self::MissingShareIdentifier { url: url.into() }
    }

    /// Creates a `MissingToken` error.
    #[must_use]
    pub fn missing_token(url: impl Into<String>) -> Self {
        Self::MissingToken { url: url.into() }
    }

    /// Creates an `InvalidFileList` error.
    #[must_use]
    pub fn invalid_file_list(reason: impl ToString) -> Self {
        Self::InvalidFileList {
            reason: reason.to_string(),
        }
    }

    /// Creates a `DirectLinkResolutionFailed` error.
    #[must_use]
    pub fn direct_link_failed(reason: impl ToString) -> Self {
        Self::DirectLinkResolutionFailed {
            reason: reason.to_string(),
        }
    }

    /// Stable machine-readable code for the error kind.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingInput => "MISSING_INPUT",
            Self::InvalidLink { .. } => "INVALID_LINK",
            Self::MissingShareIdentifier { .. } => "MISSING_SHARE_IDENTIFIER",
            Self::MissingToken { .. } => "MISSING_TOKEN",
            Self::EmptyFileList { .. } => "EMPTY_FILE_LIST",
            Self::FileListRejected { .. } => "FILE_LIST_REJECTED",
            Self::InvalidFileList { .. } => "INVALID_FILE_LIST",
            Self::DirectLinkResolutionFailed { .. } => "DIRECT_LINK_RESOLUTION_FAILED",
            Self::TooManyRedirects { .. } => "TOO_MANY_REDIRECTS",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Transport { .. } => "UPSTREAM_ERROR",
        }
    }
}

impl From<FetchError> for ResolveError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::TooManyRedirects { url, max_hops } => {
                Self::TooManyRedirects { url, max_hops }
            }
            FetchError::Timeout { url } => Self::Timeout { url },
            FetchError::InvalidUrl { url, reason } => Self::InvalidLink { url, reason },
            FetchError::UnsupportedScheme { url } => Self::InvalidLink {
                url,
                reason: "only http and https links are supported".to_string(),
            },
            other => Self::Transport {
                message: other.to_string(),
            },
        }
    }
}
