use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Every way `/api/chat` can fail, as seen by the caller.
///
/// The `Display` text is exactly the `error` field of the JSON body, so nothing internal
/// (token endpoint replies, transport errors) ever leaks through it.
#[derive(Debug, Error)]
pub enum ChatFailure {
    #[error("Empty request body")]
    ClientInput,
    #[error("Failed to obtain authorization token from GigaChat.")]
    AuthAcquisition,
    #[error("Timeout contacting GigaChat.")]
    UpstreamTimeout,
    #[error("GigaChat returned {status}")]
    Upstream { status: u16, details: String },
    #[error("GigaChat returned an invalid response")]
    InvalidUpstreamBody { details: String },
    #[error("Internal server error.")]
    Internal,
}

impl ChatFailure {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ClientInput => StatusCode::BAD_REQUEST,
            Self::AuthAcquisition | Self::InvalidUpstreamBody { .. } => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<&str> {
        match self {
            Self::Upstream { details, .. } | Self::InvalidUpstreamBody { details } => {
                Some(details.as_str())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

impl IntoResponse for ChatFailure {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
            details: self.details(),
        };
        (self.status(), Json(body)).into_response()
    }
}
