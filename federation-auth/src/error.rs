//! Error types for the `federation-auth` crate.
//!
//! Follows the same pattern as domain::error with a root Error struct and error kind enums.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for federation-auth crate.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in federation-auth.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    OAuth(OAuthErrorKind),
    Assertion(AssertionErrorKind),
    Storage(StorageErrorKind),
    Http(HttpErrorKind),
}

/// Errors from the upstream OAuth/OIDC exchange.
#[derive(Debug, PartialEq)]
pub enum OAuthErrorKind {
    /// Token endpoint answered with a non-200 status.
    TokenExchangeFailed,
    /// User-info endpoint answered with a non-200 status.
    UserInfoFailed,
    /// Upstream answered 200 but the body could not be understood.
    InvalidResponse,
    /// The user-info claim set could not be decoded or lacks a subject.
    InvalidUserInfo,
}

/// Errors from building or signing client assertions.
#[derive(Debug, PartialEq)]
pub enum AssertionErrorKind {
    MissingConfiguration,
    InvalidKey,
    SigningFailed,
}

/// Errors from session store operations.
#[derive(Debug, PartialEq)]
pub enum StorageErrorKind {
    Connection,
    Serialization,
}

/// Errors from HTTP client operations.
#[derive(Debug, PartialEq)]
pub enum HttpErrorKind {
    BuilderFailed,
    RequestFailed,
    Timeout,
    Network,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let detail = self
            .source
            .as_ref()
            .map(|source| format!(": {source}"))
            .unwrap_or_default();

        match &self.error_kind {
            ErrorKind::OAuth(kind) => write!(f, "OAuth error {:?}{}", kind, detail),
            ErrorKind::Assertion(kind) => write!(f, "Client assertion error {:?}{}", kind, detail),
            ErrorKind::Storage(kind) => write!(f, "Session storage error {:?}{}", kind, detail),
            ErrorKind::Http(kind) => write!(f, "HTTP error {:?}{}", kind, detail),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if err.is_builder() {
            ErrorKind::Http(HttpErrorKind::BuilderFailed)
        } else if err.is_timeout() {
            ErrorKind::Http(HttpErrorKind::Timeout)
        } else if err.is_connect() {
            ErrorKind::Http(HttpErrorKind::Network)
        } else if err.is_request() {
            ErrorKind::Http(HttpErrorKind::RequestFailed)
        } else {
            ErrorKind::Http(HttpErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Assertion(AssertionErrorKind::SigningFailed),
        }
    }
}

/// Helper function to create OAuth errors.
pub fn oauth_error(kind: OAuthErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::OAuth(kind),
    }
}

/// Helper function to create client assertion errors.
pub fn assertion_error(kind: AssertionErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Assertion(kind),
    }
}

/// Helper function to create session storage errors.
pub fn storage_error(kind: StorageErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Storage(kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind_and_message() {
        let err = oauth_error(OAuthErrorKind::TokenExchangeFailed, "status 401");
        assert_eq!(
            err.to_string(),
            "OAuth error TokenExchangeFailed: status 401"
        );
    }

    #[test]
    fn test_display_without_source() {
        let err = Error {
            source: None,
            error_kind: ErrorKind::Http(HttpErrorKind::Timeout),
        };
        assert_eq!(err.to_string(), "HTTP error Timeout");
    }
}
