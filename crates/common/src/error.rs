//! Unified error type for traffic-track.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Google Roads API error: {0}")]
    Google(String),

    #[error("TomTom API error: {0}")]
    TomTom(String),

    #[error("HERE API error: {0}")]
    Here(String),

    #[error("{provider} rejected the API key: {message}")]
    Unauthorized { provider: String, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl Error {
    /// True for failures raised by a provider call, which callers recover from
    /// by serving synthetic data.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Error::Http(_)
                | Error::Json(_)
                | Error::Google(_)
                | Error::TomTom(_)
                | Error::Here(_)
                | Error::Unauthorized { .. }
        )
    }
}

/// Leading slice of an error body for log and error messages, cut on a char
/// boundary.
pub fn truncate_body(body: &str, max_bytes: usize) -> &str {
    if body.len() <= max_bytes {
        return body;
    }
    let mut end = max_bytes;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        assert_eq!(truncate_body("short", 500), "short");
        assert_eq!(truncate_body("abcdef", 3), "abc");
        // 'é' is two bytes; cutting at 2 would split it.
        assert_eq!(truncate_body("aéb", 2), "a");
    }

    #[test]
    fn test_provider_failures_are_classified() {
        assert!(Error::TomTom("boom".into()).is_provider_failure());
        assert!(Error::Unauthorized {
            provider: "here".into(),
            message: "401".into()
        }
        .is_provider_failure());
        assert!(!Error::Store("down".into()).is_provider_failure());
        assert!(!Error::Config("bad".into()).is_provider_failure());
    }
}
