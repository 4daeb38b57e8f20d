//! HTTP error responses.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, warn};

use crate::proxy::ProxyError;
use crate::resolver::ResolveError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

/// Error rendered as `{ "error": <message>, "code": <CODE> }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: &'static str,
}

impl ApiError {
    /// HTTP status of the response.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<ResolveError> for ApiError {
    fn from(error: ResolveError) -> Self {
        let status = match &error {
            ResolveError::MissingInput
            | ResolveError::InvalidLink { .. }
            | ResolveError::MissingShareIdentifier { .. }
            | ResolveError::MissingToken { .. }
            | ResolveError::EmptyFileList { .. }
            | ResolveError::FileListRejected { .. } => StatusCode::BAD_REQUEST,
            ResolveError::InvalidFileList { .. } => StatusCode::BAD_GATEWAY,
            ResolveError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ResolveError::DirectLinkResolutionFailed { .. }
            | ResolveError::TooManyRedirects { .. }
            | ResolveError::Transport { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: error.to_string(),
            code: error.code(),
        }
    }
}

impl From<ProxyError> for ApiError {
    fn from(error: ProxyError) -> Self {
        let status = match &error {
            ProxyError::Upstream { status, .. } => *status,
            ProxyError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::InvalidUrl { .. }
            | ProxyError::Network { .. }
            | ProxyError::ClientBuild { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: error.to_string(),
            code: error.code(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
            code: "INVALID_QUERY",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = self.status.as_u16(), code = self.code, error = %self.message, "request failed");
        } else {
            warn!(status = self.status.as_u16(), code = self.code, error = %self.message, "request rejected");
        }
        let body = Json(ErrorBody {
            error: self.message,
            code: self.code,
        });
        (self.status, body).into_response()
    }
}
