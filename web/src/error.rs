use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::*;
use serde_json::json;

use domain::error::{
    DomainErrorKind, Error as DomainError, ExternalErrorKind, InternalErrorKind,
    ValidationErrorKind,
};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Domain(DomainError),
    Web(WebErrorKind),
}

/// Failures detected by the web layer before the domain is reached.
#[derive(Debug, PartialEq)]
pub enum WebErrorKind {
    /// The request body could not be parsed.
    Input,
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

// Every error body is `{"message": ...}`. Validation messages go to the client;
// internal and upstream details are only logged.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Error::Web(WebErrorKind::Input) => {
                (StatusCode::BAD_REQUEST, "Invalid request body".to_string())
            }
            Error::Domain(err) => {
                let detail = err.message();
                match err.error_kind {
                    DomainErrorKind::Validation(kind) => (
                        StatusCode::BAD_REQUEST,
                        detail.unwrap_or_else(|| validation_message(&kind).to_string()),
                    ),
                    DomainErrorKind::External(ExternalErrorKind::Network) => {
                        warn!("Identity provider unreachable: {detail:?}");
                        (
                            StatusCode::BAD_GATEWAY,
                            "Identity provider is unreachable".to_string(),
                        )
                    }
                    DomainErrorKind::External(ExternalErrorKind::Other(reason)) => {
                        warn!("Identity provider error: {reason}");
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "Identity provider rejected the request".to_string(),
                        )
                    }
                    DomainErrorKind::Internal(kind) => {
                        error!("Internal error {kind:?}: {detail:?}");
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            internal_message(&kind).to_string(),
                        )
                    }
                }
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

fn validation_message(kind: &ValidationErrorKind) -> &'static str {
    match kind {
        ValidationErrorKind::InvalidSession => "Invalid or expired session",
        ValidationErrorKind::CsrfMismatch => "Invalid CSRF token",
        ValidationErrorKind::MissingRedirectUri => "Invalid origin",
        ValidationErrorKind::InvalidToken => "Invalid refresh token",
        ValidationErrorKind::ExpiredToken => "expired Token",
        ValidationErrorKind::UnsupportedAlgorithm => "unexpected signing method",
        ValidationErrorKind::MissingClaim => "error extracting claim",
    }
}

fn internal_message(kind: &InternalErrorKind) -> &'static str {
    match kind {
        InternalErrorKind::Storage => "Failed to access session store",
        InternalErrorKind::Config | InternalErrorKind::Other(_) => "Internal server error",
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self::Domain(err.into())
    }
}
