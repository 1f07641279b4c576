use thiserror::Error;

/// Unified error type for the proxy and its control plane.
#[derive(Error, Debug)]
pub enum AndoError {
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Internal: {0}")]
    Internal(String),
}

impl AndoError {
    /// Map to the HTTP status code the error pipeline should emit.
    ///
    /// `StoreError` covers both genuine storage failures and upstream
    /// connect/transport/timeout failures (see `ando-proxy::forward`), both
    /// of which spec.md routes through the error pipeline as 503.
    pub fn status_code(&self) -> u16 {
        match self {
            AndoError::RouteNotFound(_) => 404,
            AndoError::BadRequest(_) => 400,
            AndoError::Forbidden(_) => 403,
            AndoError::StoreError(_) => 503,
            AndoError::Io(_) | AndoError::Serde(_) | AndoError::Internal(_) => 500,
        }
    }

    /// JSON error body.
    pub fn to_json_body(&self) -> Vec<u8> {
        let body = serde_json::json!({
            "error": self.to_string(),
            "status": self.status_code(),
        });
        // `json!` over a `Value` cannot fail to serialize.
        serde_json::to_vec(&body).expect("error body is always serializable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AndoError::RouteNotFound("x".into()).status_code(), 404);
        assert_eq!(AndoError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(AndoError::Forbidden("x".into()).status_code(), 403);
        assert_eq!(AndoError::StoreError("x".into()).status_code(), 503);
        assert_eq!(AndoError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn test_json_body_is_valid_json() {
        let err = AndoError::Forbidden("no token".into());
        let body = err.to_json_body();
        let parsed: serde_json::Value =
            serde_json::from_slice(&body).expect("to_json_body must produce valid JSON");
        assert_eq!(parsed["status"], 403);
        assert!(parsed["error"].as_str().is_some());
    }

    #[test]
    fn test_json_body_contains_status_and_message() {
        let err = AndoError::RouteNotFound("r1".into());
        let text = String::from_utf8(err.to_json_body()).unwrap();
        assert!(text.contains("404"), "body must contain status code");
        assert!(text.contains("r1"), "body must contain the route id");
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            AndoError::RouteNotFound("route1".into()).to_string(),
            "Route not found: route1"
        );
        assert_eq!(
            AndoError::Forbidden("denied".into()).to_string(),
            "Forbidden: denied"
        );
    }

    #[test]
    fn test_bad_request_is_400() {
        assert_eq!(AndoError::BadRequest("no target".into()).status_code(), 400);
    }

    #[test]
    fn test_json_body_escapes_special_characters() {
        let err = AndoError::BadRequest(r#"bad "quote" and \backslash"#.into());
        let body = err.to_json_body();
        let parsed: serde_json::Value =
            serde_json::from_slice(&body).expect("error message must be safely escaped");
        assert_eq!(parsed["status"], 400);
    }
}
