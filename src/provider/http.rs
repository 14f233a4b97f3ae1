//! Pieces shared by the HTTP-backed providers.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

use crate::provider::FetchError;

pub fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .gzip(true)
        .brotli(true)
        .user_agent(concat!("xflow/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

/// Pull a human readable message out of an API error body.
pub fn error_detail(body: &[u8]) -> Option<String> {
    let json: Value = serde_json::from_slice(body).ok()?;
    json.get("detail")
        .or_else(|| json.get("title"))
        .or_else(|| json.get("message"))
        .or_else(|| json.pointer("/errors/0/message"))
        .and_then(Value::as_str)
        .map(String::from)
}

/// Map a non-success status to the fetch error taxonomy.
pub fn classify_status(status: StatusCode, body: &[u8], resource: &str) -> FetchError {
    match status {
        StatusCode::UNAUTHORIZED => FetchError::Unauthorized,
        StatusCode::FORBIDDEN => {
            FetchError::Forbidden(error_detail(body).unwrap_or_else(|| "Access Denied".into()))
        }
        StatusCode::NOT_FOUND => FetchError::NotFound(resource.to_string()),
        StatusCode::TOO_MANY_REQUESTS => FetchError::QuotaExhausted,
        _ => FetchError::Other(
            error_detail(body).unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
        ),
    }
}

/// Read the body and parse it as JSON, classifying failures.
pub async fn read_json(response: Response, resource: &str) -> Result<Value, FetchError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        return Err(classify_status(status, &body, resource));
    }

    serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_statuses() {
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED, b"", "x"),
            FetchError::Unauthorized
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, b"{}", "x"),
            FetchError::QuotaExhausted
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, b"", "users/42"),
            FetchError::NotFound("users/42".into())
        );
    }

    #[test]
    fn test_forbidden_carries_detail() {
        let body = br#"{"detail":"client-not-enrolled"}"#;
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN, body, "x"),
            FetchError::Forbidden("client-not-enrolled".into())
        );
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN, b"not json", "x"),
            FetchError::Forbidden("Access Denied".into())
        );
    }

    #[test]
    fn test_other_status_uses_error_array() {
        let body = br#"{"errors":[{"message":"boom"}]}"#;
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, body, "x"),
            FetchError::Other("boom".into())
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY, b"", "x"),
            FetchError::Other("HTTP 502".into())
        );
    }
}
