use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tracing::Instrument as _;

use super::{ChatFailure, ProxyState};
use crate::utils::http::body_preview;

const REQUEST_ID_HEADER: &str = "x-request-id";
const BODY_PREVIEW_CHARS: usize = 300;

static REQUEST_ID_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub(crate) async fn handle_chat(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id =
        extract_header(&headers, REQUEST_ID_HEADER).unwrap_or_else(generate_request_id);
    let span = tracing::info_span!("chat", request_id = %request_id);

    async move {
        tracing::info!(bytes = body.len(), "received POST /api/chat");
        let started = Instant::now();
        let mut response = match forward_chat(&state, body).await {
            Ok(response) => {
                tracing::info!(
                    status = response.status().as_u16(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "chat request completed"
                );
                response
            }
            Err(failure) => {
                tracing::warn!(
                    status = failure.status().as_u16(),
                    error = %failure,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "chat request failed"
                );
                failure.into_response()
            }
        };
        insert_request_id(response.headers_mut(), &request_id);
        response
    }
    .instrument(span)
    .await
}

async fn forward_chat(state: &ProxyState, body: Bytes) -> Result<Response, ChatFailure> {
    if !is_forwardable_json(&body) {
        return Err(ChatFailure::ClientInput);
    }

    let token = state.tokens.bearer_token().await.map_err(|err| {
        tracing::error!(error = %err, "could not obtain GigaChat token");
        ChatFailure::AuthAcquisition
    })?;

    tracing::info!(url = %state.completions.url(), "forwarding request to GigaChat");
    let upstream = state
        .completions
        .forward(&token, body)
        .await
        .map_err(transport_failure)?;
    let status = upstream.status();
    let payload = upstream.bytes().await.map_err(transport_failure)?;

    tracing::info!(status = status.as_u16(), "GigaChat responded");
    tracing::debug!(
        body = %body_preview(&String::from_utf8_lossy(&payload), BODY_PREVIEW_CHARS),
        "GigaChat response body"
    );

    if status != reqwest::StatusCode::OK {
        return Err(ChatFailure::Upstream {
            status: status.as_u16(),
            details: String::from_utf8_lossy(&payload).into_owned(),
        });
    }
    if serde_json::from_slice::<serde::de::IgnoredAny>(&payload).is_err() {
        tracing::warn!("GigaChat returned a success status with a non-JSON body");
        return Err(ChatFailure::InvalidUpstreamBody {
            details: String::from_utf8_lossy(&payload).into_owned(),
        });
    }

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        payload,
    )
        .into_response())
}

fn transport_failure(err: reqwest::Error) -> ChatFailure {
    if err.is_timeout() {
        tracing::error!(error = %err, "timed out contacting GigaChat");
        return ChatFailure::UpstreamTimeout;
    }
    tracing::error!(error = %err, "request to GigaChat failed");
    ChatFailure::Internal
}

/// Absent, malformed and "falsy" JSON bodies are all rejected: `null`, `false`, zero, `""`,
/// `{}` and `[]`.
fn is_forwardable_json(body: &[u8]) -> bool {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Null) | Ok(Value::Bool(false)) | Err(_) => false,
        Ok(Value::Bool(true)) => true,
        Ok(Value::Number(number)) => number.as_f64() != Some(0.0),
        Ok(Value::String(text)) => !text.is_empty(),
        Ok(Value::Object(map)) => !map.is_empty(),
        Ok(Value::Array(items)) => !items.is_empty(),
    }
}

fn extract_header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn generate_request_id() -> String {
    let seq = REQUEST_ID_SEQ.fetch_add(1, Ordering::Relaxed);
    let ts_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0);
    format!("gcp-{ts_ms}-{seq}")
}

fn insert_request_id(headers: &mut HeaderMap, request_id: &str) {
    let Ok(value) = HeaderValue::from_str(request_id) else {
        return;
    };
    headers.insert(REQUEST_ID_HEADER, value);
}
