//! Error types for the status board

use std::fmt;

pub type Result<T> = std::result::Result<T, StatusError>;

#[derive(Debug)]
pub enum StatusError {
    /// IO operation failed
    Io(std::io::Error),

    /// HTTP request failed
    Http(reqwest::Error),

    /// JSON serialization/deserialization failed
    Json(serde_json::Error),

    /// Configuration error
    Config(String),

    /// Token endpoint rejected an exchange
    Auth(String),

    /// Repository API returned a non-success response
    Api(String),
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusError::Io(err) => write!(f, "IO error: {}", err),
            StatusError::Http(err) => write!(f, "HTTP error: {}", err),
            StatusError::Json(err) => write!(f, "JSON error: {}", err),
            StatusError::Config(msg) => write!(f, "Configuration error: {}", msg),
            StatusError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            StatusError::Api(msg) => write!(f, "API error: {}", msg),
        }
    }
}

impl std::error::Error for StatusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StatusError::Io(err) => Some(err),
            StatusError::Http(err) => Some(err),
            StatusError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StatusError {
    fn from(err: std::io::Error) -> Self {
        StatusError::Io(err)
    }
}

impl From<reqwest::Error> for StatusError {
    fn from(err: reqwest::Error) -> Self {
        StatusError::Http(err)
    }
}

impl From<serde_json::Error> for StatusError {
    fn from(err: serde_json::Error) -> Self {
        StatusError::Json(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            StatusError::Auth("token endpoint returned 401".to_string()).to_string(),
            "Authentication error: token endpoint returned 401"
        );
        assert_eq!(
            StatusError::Config("account cannot be empty".to_string()).to_string(),
            "Configuration error: account cannot be empty"
        );
    }

    #[test]
    fn test_json_error_keeps_source() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = StatusError::from(json_err);

        assert!(matches!(err, StatusError::Json(_)));
        assert!(err.source().is_some());
        assert!(StatusError::Api("boom".to_string()).source().is_none());
    }
}
