use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Process-level failures surfaced by the CLI and server bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server error: {0}")]
    Server(#[from] axum::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "message": self.to_string(),
            "code": "internal_error",
        }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn config_failures_keep_their_source_chain() {
        let source = "not-an-ip"
            .parse::<std::net::IpAddr>()
            .expect_err("invalid address");
        let err = AppError::from(ConfigError::InvalidHost { source });

        assert_eq!(
            err.to_string(),
            "configuration error: APP_HOST must parse to an IPv4 or IPv6 address"
        );
        let config = err.source().expect("config source");
        assert!(config.source().is_some(), "address parse error is kept");
    }

    #[test]
    fn page_size_error_names_the_variable() {
        let err = ConfigError::InvalidPageSize {
            variable: "APP_PAGE_SIZE",
        };
        assert_eq!(
            err.to_string(),
            "APP_PAGE_SIZE must be a positive integer no larger than APP_MAX_PAGE_SIZE"
        );
    }
}
