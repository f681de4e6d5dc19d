//! Provider error classification.

use crate::selector::FailureKind;

use super::types::OpenAIErrorResponse;

/// Classify an HTTP error response.
///
/// `detail` is any of the error body's type, code or message.
pub fn classify_status(status: u16, detail: &str) -> FailureKind {
    let detail = detail.to_ascii_lowercase();
    match status {
        429 => FailureKind::RateLimit,
        401 | 403 => FailureKind::AuthError,
        400 | 413 | 422
            if detail.contains("context_length")
                || detail.contains("context length")
                || detail.contains("maximum context")
                || detail.contains("too many tokens") =>
        {
            FailureKind::ContextLimit
        }
        413 => FailureKind::ContextLimit,
        500..=599 => FailureKind::Unavailable,
        _ => FailureKind::Unknown,
    }
}

/// Classify an error response from its status and raw body.
pub fn classify_response(status: u16, body: &str) -> (FailureKind, String) {
    match serde_json::from_str::<OpenAIErrorResponse>(body) {
        Ok(parsed) => {
            let detail = format!(
                "{} {} {}",
                parsed.error.error_type.as_deref().unwrap_or_default(),
                parsed.error.code_str().unwrap_or_default(),
                parsed.error.message
            );
            (classify_status(status, &detail), parsed.error.message)
        }
        Err(_) => {
            let message = if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                body.chars().take(500).collect()
            };
            (classify_status(status, body), message)
        }
    }
}

/// Classify a transport error.
pub fn classify_transport(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() || err.is_connect() {
        FailureKind::Unavailable
    } else if let Some(status) = err.status() {
        classify_status(status.as_u16(), "")
    } else {
        FailureKind::Unknown
    }
}
