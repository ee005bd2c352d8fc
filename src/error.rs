// src/error.rs
use reqwest::header::InvalidHeaderValue;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParkError {
    #[error("HTTP request failed: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("URL parsing failed: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("JSON processing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("JSON deserialization failed: {0}")]
    JsonDeserializationFailed(String),

    #[error("Backend API error (HTTP {status}, code {code}): {message}")]
    ApiError {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid login credentials: {0}")]
    InvalidCredentials(String),

    #[error("No active session")]
    SessionMissing,

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(InvalidHeaderValue),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ParkError {
    /// Creates a `ParkError` from an HTTP status code and a JSON response body.
    ///
    /// The REST and auth services report errors with different field names
    /// (`message`, `msg`, `error_description`, `error`), so all of them are tried.
    pub(crate) fn from_response(status_code: u16, response_body: Value) -> Self {
        let code = response_body
            .get("code")
            .or_else(|| response_body.get("error_code"))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        let message = ["message", "msg", "error_description", "error"]
            .iter()
            .find_map(|key| response_body.get(*key).and_then(|v| v.as_str()))
            .unwrap_or("Unknown error")
            .to_string();

        match status_code {
            400 if code == "invalid_credentials"
                || response_body.get("error").and_then(|v| v.as_str()) == Some("invalid_grant") =>
            {
                ParkError::InvalidCredentials(message)
            }
            401 | 403 => {
                if code == "PGRST301" || message.to_lowercase().contains("jwt expired") {
                    ParkError::SessionExpired(message)
                } else {
                    ParkError::AuthenticationError(format!(
                        "Auth error (HTTP {}): ({}) {}",
                        status_code, code, message
                    ))
                }
            }
            404 => ParkError::NotFound(format!("({}) {}", code, message)),
            409 => ParkError::Conflict(format!("({}) {}", code, message)),
            429 => ParkError::RateLimited(message),
            s if s >= 500 => ParkError::InternalServerError(format!(
                "Server error (HTTP {}): ({}) {}",
                status_code, code, message
            )),
            _ => ParkError::ApiError {
                status: status_code,
                code,
                message,
            },
        }
    }
}
