//! Error types for the `domain` layer.
use federation_auth::error::{
    AssertionErrorKind, Error as FederationAuthError, ErrorKind as FederationAuthErrorKind,
    HttpErrorKind,
};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure
/// with `domain::error::Error` as the root type holding a tree of `error_kind`
/// enums that represent the kinds of errors that can occur in the domain layer or
/// in lower layers. The `source` field is used to hold the original error that caused
/// the domain error. Errors from `federation-auth` and `jsonwebtoken` are
/// translated here so that `web` only ever matches on `DomainErrorKind` to pick a
/// status code and message.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
    Validation(ValidationErrorKind),
}

/// Enum representing the various kinds of internal errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Config,
    Storage,
    Other(String),
}

/// Enum representing the various kinds of external errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    /// The identity provider could not be reached or timed out.
    Network,
    /// The identity provider answered, but not with something usable.
    Other(String),
}

/// Client input that the flow refuses. Nothing upstream is contacted once one of
/// these has been raised.
#[derive(Debug, PartialEq)]
pub enum ValidationErrorKind {
    InvalidSession,
    CsrfMismatch,
    MissingRedirectUri,
    InvalidToken,
    ExpiredToken,
    UnsupportedAlgorithm,
    MissingClaim,
}

impl Error {
    pub fn validation(kind: ValidationErrorKind, message: &str) -> Self {
        Error {
            source: Some(message.to_string().into()),
            error_kind: DomainErrorKind::Validation(kind),
        }
    }

    pub fn internal(kind: InternalErrorKind, message: &str) -> Self {
        Error {
            source: Some(message.to_string().into()),
            error_kind: DomainErrorKind::Internal(kind),
        }
    }

    /// Message of the innermost cause, if any.
    pub fn message(&self) -> Option<String> {
        self.source.as_ref().map(|source| source.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {self:?}")
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// Token verification failures are the caller's fault; anything else coming out of
// jsonwebtoken happened while signing with our own key.
impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        let error_kind = match err.kind() {
            JwtErrorKind::ExpiredSignature => {
                DomainErrorKind::Validation(ValidationErrorKind::ExpiredToken)
            }
            JwtErrorKind::InvalidAlgorithm => {
                DomainErrorKind::Validation(ValidationErrorKind::UnsupportedAlgorithm)
            }
            JwtErrorKind::MissingRequiredClaim(_) => {
                DomainErrorKind::Validation(ValidationErrorKind::MissingClaim)
            }
            JwtErrorKind::InvalidToken
            | JwtErrorKind::InvalidSignature
            | JwtErrorKind::InvalidRsaKey(_)
            | JwtErrorKind::InvalidKeyFormat
            | JwtErrorKind::InvalidIssuer
            | JwtErrorKind::ImmatureSignature
            | JwtErrorKind::Base64(_)
            | JwtErrorKind::Json(_)
            | JwtErrorKind::Utf8(_) => DomainErrorKind::Validation(ValidationErrorKind::InvalidToken),
            _ => DomainErrorKind::Internal(InternalErrorKind::Other(
                "JWT encoding related error".to_string(),
            )),
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<FederationAuthError> for Error {
    fn from(err: FederationAuthError) -> Self {
        let error_kind = match &err.error_kind {
            FederationAuthErrorKind::Http(HttpErrorKind::BuilderFailed) => {
                DomainErrorKind::Internal(InternalErrorKind::Other(
                    "Failed to build upstream request".to_string(),
                ))
            }
            FederationAuthErrorKind::Http(_) => {
                DomainErrorKind::External(ExternalErrorKind::Network)
            }
            FederationAuthErrorKind::OAuth(_) => {
                DomainErrorKind::External(ExternalErrorKind::Other(err.to_string()))
            }
            FederationAuthErrorKind::Assertion(AssertionErrorKind::SigningFailed) => {
                DomainErrorKind::Internal(InternalErrorKind::Other(err.to_string()))
            }
            FederationAuthErrorKind::Assertion(_) => {
                DomainErrorKind::Internal(InternalErrorKind::Config)
            }
            FederationAuthErrorKind::Storage(_) => {
                DomainErrorKind::Internal(InternalErrorKind::Storage)
            }
        };
        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}
