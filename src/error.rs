use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::api::ApiResponse;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Analytics store error: {0}")]
    Store(String),

    #[error("Analytics store timed out")]
    StoreTimeout,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid page: {0}")]
    InvalidPage(String),

    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    #[error("Invalid date range")]
    InvalidDateRange,

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Tracker is not initialized")]
    TrackerNotInitialized,

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Configuration(_) | Error::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Store(_) | Error::Database(_) | Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::StoreTimeout => StatusCode::GATEWAY_TIMEOUT,
            Error::MissingParameter(_)
            | Error::InvalidInterval(_)
            | Error::InvalidTimezone(_)
            | Error::InvalidPage(_)
            | Error::InvalidColumn(_)
            | Error::InvalidDateRange
            | Error::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ApiResponse::<()>::error(&self.to_string()))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_configuration() {
        let err = Error::Configuration("QUIETCOUNT__API_TOKEN is not set".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: QUIETCOUNT__API_TOKEN is not set"
        );
    }

    #[test]
    fn test_error_display_missing_parameter() {
        let err = Error::MissingParameter("site");
        assert_eq!(err.to_string(), "Missing parameter: site");
    }

    #[test]
    fn test_error_display_invalid_interval() {
        let err = Error::InvalidInterval("fortnight".to_string());
        assert_eq!(err.to_string(), "Invalid interval: fortnight");
    }

    #[tokio::test]
    async fn test_configuration_is_distinct_from_store_failure() {
        let config = Error::Configuration("missing".to_string()).into_response();
        let store = Error::Store("connection refused".to_string()).into_response();
        assert_eq!(config.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(store.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_error_into_response_timeout() {
        let response = Error::StoreTimeout.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_error_into_response_bad_request() {
        for err in [
            Error::MissingParameter("site"),
            Error::InvalidInterval("x".to_string()),
            Error::InvalidTimezone("Mars/Olympus".to_string()),
            Error::InvalidPage("0".to_string()),
            Error::InvalidColumn("bounce".to_string()),
        ] {
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_error_into_response_internal() {
        let response = Error::Internal("test".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_error_from_url_error() {
        let url_err = url::Url::parse("not a url").unwrap_err();
        let err: Error = url_err.into();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }
}
