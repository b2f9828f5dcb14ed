use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use std::time::Instant;

use crate::state::AppState;

/// Bodies above this size are logged by length only; import payloads carry
/// whole spreadsheets.
const MAX_LOGGED_BODY_BYTES: usize = 4 * 1024;

const SENSITIVE_FIELDS: [&str; 6] = [
    "password",
    "passwordHash",
    "token",
    "secret",
    "authorization",
    "credentials",
];

const SENSITIVE_HEADERS: [&str; 4] = ["authorization", "cookie", "x-api-key", "x-auth-token"];

fn should_ignore_path(path: &str) -> bool {
    matches!(path, "/health" | "/health/")
}

fn filter_sensitive_data(mut value: Value) -> Value {
    match &mut value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if SENSITIVE_FIELDS.iter().any(|s| s.eq_ignore_ascii_case(key)) {
                    *field = Value::String("[REDACTED]".to_string());
                } else {
                    *field = filter_sensitive_data(field.take());
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                *item = filter_sensitive_data(item.take());
            }
        }
        _ => {}
    }
    value
}

fn filter_sensitive_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered_headers = headers.clone();
    for header_name in SENSITIVE_HEADERS {
        if let Ok(name) = header_name.parse::<http::HeaderName>() {
            if filtered_headers.contains_key(&name) {
                filtered_headers.insert(name, http::HeaderValue::from_static("[REDACTED]"));
            }
        }
    }
    filtered_headers
}

fn loggable_body(bytes: &[u8]) -> Value {
    if bytes.len() > MAX_LOGGED_BODY_BYTES {
        return Value::String(format!("<{} bytes>", bytes.len()));
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(json) => filter_sensitive_data(json),
        Err(_) => Value::Object(serde_json::Map::new()),
    }
}

pub async fn http_logger(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> std::result::Result<impl IntoResponse, (StatusCode, String)> {
    let start_time = Instant::now();

    let method = req.method().clone();
    let uri = req.uri().clone();
    let path = uri.path();
    let version = req.version();
    let req_headers = req.headers().clone();
    let x_request_id = req_headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if should_ignore_path(path) || method == Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    let is_file_upload = req_headers
        .get("content-type")
        .and_then(|ct| ct.to_str().ok())
        .map(|ct| ct.starts_with("multipart/form-data"))
        .unwrap_or(false);

    let (req, req_body) = if is_file_upload {
        (req, Value::Object(serde_json::Map::new()))
    } else {
        let (parts, body) = req.into_parts();
        let bytes = buffer_body("request", body).await?;
        let logged = loggable_body(&bytes);
        (Request::from_parts(parts, Body::from(bytes)), logged)
    };

    let mut response = next.run(req).await;
    let latency = start_time.elapsed();
    let status = response.status();
    let res_headers = response.headers().clone();

    let res_body = if matches!(method, Method::POST | Method::PUT | Method::PATCH) {
        let (parts, body) = response.into_parts();
        let bytes = buffer_body("response", body).await?;
        let logged = loggable_body(&bytes);
        response = Response::from_parts(parts, Body::from(bytes));
        logged
    } else {
        Value::Object(serde_json::Map::new())
    };

    tracing::info!(
        method = ?method,
        uri = ?uri,
        path = %path,
        x_request_id = %x_request_id,
        version = ?version,
        req_headers = ?filter_sensitive_headers(&req_headers),
        req_body = %req_body,
        status = ?status,
        latency_ms = latency.as_millis(),
        res_headers = ?filter_sensitive_headers(&res_headers),
        res_body = %res_body,
        app_env = %state.app_env,
        "HTTP request completed"
    );

    Ok(response)
}

pub async fn buffer_body<B>(
    direction: &str,
    body: B,
) -> std::result::Result<Bytes, (StatusCode, String)>
where
    B: BodyExt,
    B::Error: std::fmt::Display,
{
    match body.collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) => Err((
            StatusCode::BAD_REQUEST,
            format!("failed to read {direction} body: {err}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_secrets_are_redacted() {
        let filtered = filter_sensitive_data(json!({
            "user": { "name": "a", "passwordHash": "$2b$..." },
            "items": [{ "token": "t" }],
        }));
        assert_eq!(filtered["user"]["passwordHash"], "[REDACTED]");
        assert_eq!(filtered["user"]["name"], "a");
        assert_eq!(filtered["items"][0]["token"], "[REDACTED]");
    }

    #[test]
    fn large_bodies_are_summarized() {
        let body = vec![b' '; MAX_LOGGED_BODY_BYTES + 1];
        assert_eq!(
            loggable_body(&body),
            Value::String(format!("<{} bytes>", MAX_LOGGED_BODY_BYTES + 1))
        );
    }
}
