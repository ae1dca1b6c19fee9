use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid field {field}: expected {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Store rejected write ({status}): {body}")]
    StoreRejected { status: u16, body: String },

    #[error("Store request timed out")]
    StoreTimeout,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Startup error: {0}")]
    Startup(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::StoreTimeout
        } else {
            Error::StoreUnavailable(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP status and numeric error code reported to the caller.
    pub fn status_and_code(&self) -> (StatusCode, u16) {
        match self {
            Error::MalformedPayload(_) => (StatusCode::BAD_REQUEST, 4000),
            Error::MissingField("hive_id") => (StatusCode::BAD_REQUEST, 4001),
            Error::MissingField(_) => (StatusCode::BAD_REQUEST, 4002),
            Error::InvalidField { .. } => (StatusCode::BAD_REQUEST, 4003),
            Error::StoreRejected { .. } | Error::StoreUnavailable(_) => {
                (StatusCode::BAD_GATEWAY, 5020)
            }
            Error::StoreTimeout => (StatusCode::GATEWAY_TIMEOUT, 5040),
            Error::Config(_) | Error::Startup(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, 5000)
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: u16,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Rejected request: {}", self);
        }

        let body = ErrorBody {
            error: self.to_string(),
            code,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_hive_id_has_own_code() {
        let (status, code) = Error::MissingField("hive_id").status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, 4001);

        let (status, code) = Error::MissingField("audio").status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, 4002);
    }

    #[test]
    fn test_downstream_failures_are_server_errors() {
        let rejected = Error::StoreRejected {
            status: 400,
            body: "partial write".to_string(),
        };
        assert_eq!(rejected.status_and_code().0, StatusCode::BAD_GATEWAY);
        assert_eq!(
            Error::StoreTimeout.status_and_code().0,
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_error_response_body() {
        tokio_test::block_on(async {
            let response = Error::MissingField("bee_count").into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);

            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(json["code"], 4002);
            assert_eq!(json["error"], "Missing field: bee_count");
        });
    }
}
