//! Shared HTTP client, SSE parsing, and auth utilities.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::OgentError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
///
/// No overall request timeout: a streamed answer may legitimately run for
/// minutes. Connection setup is bounded instead.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|error| {
                tracing::warn!(%error, "falling back to default HTTP client");
                reqwest::Client::new()
            })
    })
}

/// How a backend expects its credential.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    None,
    /// `Authorization: Bearer <key>`.
    Bearer(String),
    /// The key verbatim under a provider-specific header.
    Header { name: &'static str, value: String },
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Self::Header { name, .. } => write!(f, "Header({name}: <redacted>)"),
        }
    }
}

/// JSON headers plus the credential, if any.
pub fn auth_headers(auth: &Auth) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    match auth {
        Auth::None => {}
        Auth::Bearer(key) => {
            if let Ok(val) = HeaderValue::from_str(&format!("Bearer {key}")) {
                headers.insert(AUTHORIZATION, val);
            }
        }
        Auth::Header { name, value } => {
            if let Ok(val) = HeaderValue::from_str(value) {
                headers.insert(HeaderName::from_static(name), val);
            }
        }
    }
    headers
}

/// Payload of an SSE `data:` line. Other lines (comments, `event:`) yield `None`.
pub fn parse_sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?;
    Some(data.strip_prefix(' ').unwrap_or(data))
}

/// End-of-stream sentinel used by chat-completions servers.
pub const SSE_DONE: &str = "[DONE]";

/// Map a non-success HTTP status to an error.
pub fn status_to_error(status: u16, body: &str) -> OgentError {
    match status {
        401 | 403 => OgentError::Authentication(error_message(body)),
        429 => OgentError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => OgentError::api(status, error_message(body)),
    }
}

/// Prefer `error.message` from a JSON error body, else the body itself.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            let error = v.get("error")?;
            error
                .get("message")
                .and_then(|m| m.as_str())
                .or_else(|| error.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
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
