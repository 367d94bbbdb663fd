use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use uuid::Uuid;

use crate::AppState;

// Bodies above this are never logged; payment proofs arrive as multi-MB
// base64 payloads.
const MAX_BODY_READ_SIZE: usize = 10 * 1024 * 1024;
const MAX_BODY_LOG_SIZE: usize = 1024;

pub async fn request_logger_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    // Reuse the caller's request id when it sent one.
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert("x-request-id", header_value);
    }

    if state.log_request_body {
        let (parts, body) = req.into_parts();
        let bytes = match axum::body::to_bytes(body, MAX_BODY_READ_SIZE).await {
            Ok(bytes) => bytes,
            Err(_) => {
                tracing::warn!(
                    request_id = %request_id,
                    method = %method,
                    uri = %uri,
                    "Request body too large or failed to read"
                );
                return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
            }
        };

        let body_str = String::from_utf8_lossy(&bytes);
        let sanitized_body =
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&body_str) {
                let sanitized = crate::utils::sanitize::sanitize_json(&json);
                let mut rendered = serde_json::to_string(&sanitized)
                    .unwrap_or_else(|_| "[invalid json]".to_string());
                let mut cut = MAX_BODY_LOG_SIZE.min(rendered.len());
                while !rendered.is_char_boundary(cut) {
                    cut -= 1;
                }
                rendered.truncate(cut);
                rendered
            } else {
                format!("[non-json, {} bytes]", bytes.len())
            };

        tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            body_size = bytes.len(),
            body = %sanitized_body,
            "Incoming request"
        );

        // Reconstruct request with body
        req = Request::from_parts(parts, Body::from(bytes));
    } else {
        tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            "Incoming request"
        );
    }

    let response = next.run(req).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %status.as_u16(),
        latency_ms = latency.as_millis(),
        "Outgoing response"
    );

    let (mut parts, body) = response.into_parts();
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        parts.headers.insert("x-request-id", header_value);
    }

    Response::from_parts(parts, body)
}
