//! HTTP helpers: headers and status mapping.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

use crate::error::TurnstileError;

/// Build Anthropic-style headers (x-api-key).
pub fn anthropic_headers(api_key: &str, version: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(api_key) {
        headers.insert("x-api-key", val);
    }
    if let Ok(val) = HeaderValue::from_str(version) {
        headers.insert("anthropic-version", val);
    }
    headers
}

/// Map a non-success status and its body to an error.
pub fn status_to_error(status: u16, body: &str) -> TurnstileError {
    let detail = error_detail(body).unwrap_or_else(|| body.to_string());
    match status {
        401 | 403 => TurnstileError::Authentication(detail),
        429 => TurnstileError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => TurnstileError::api(status, detail),
    }
}

fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(|e| e.get("message"))
        .or_else(|| value.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

fn extract_retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_prefers_json_detail() {
        let err = status_to_error(
            400,
            r#"{"type":"error","error":{"type":"invalid_request_error","message":"max_tokens too large"}}"#,
        );
        assert!(matches!(
            err,
            TurnstileError::Api { status: 400, ref message } if message == "max_tokens too large"
        ));
    }

    #[test]
    fn status_mapping_keeps_plain_bodies() {
        let err = status_to_error(502, "upstream unavailable");
        assert_eq!(err.to_string(), "API error (status 502): upstream unavailable");
        assert!(matches!(status_to_error(401, "{}"), TurnstileError::Authentication(_)));
        assert!(matches!(
            status_to_error(429, r#"{"error":{"retry_after":1.5}}"#),
            TurnstileError::RateLimited { retry_after_ms: Some(1500) }
        ));
    }

    #[test]
    fn headers_carry_key_and_version() {
        let headers = anthropic_headers("sk-test", "2023-06-01");
        assert_eq!(headers.get("x-api-key").unwrap(), "sk-test");
        assert_eq!(headers.get("anthropic-version").unwrap(), "2023-06-01");
    }
}
