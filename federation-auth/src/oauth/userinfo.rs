//! Decoding of the upstream user-info response into a claim set.
//!
//! The identity provider answers the user-info request with a signed JWT. Whether
//! that signature is checked is an explicit choice made by picking a
//! [`UserInfoDecoder`]; the only decoder shipped today is [`UnverifiedDecoder`],
//! which trusts the TLS channel to the provider and reads the payload as-is.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{Map, Value};

use crate::error::{oauth_error, Error, OAuthErrorKind};

/// Largest accepted encoded JWT payload segment.
pub const MAX_ENCODED_PAYLOAD_BYTES: usize = 128 * 1024;

/// Largest accepted claim document, decoded.
pub const MAX_DECODED_PAYLOAD_BYTES: usize = 64 * 1024;

/// Claims carried by the user-info response, verbatim.
pub type UserInfoClaims = Map<String, Value>;

/// Turns a raw user-info response body into claims.
pub trait UserInfoDecoder: Send + Sync {
    fn decode(&self, body: &str) -> Result<UserInfoClaims, Error>;
}

/// Reads the JWT payload WITHOUT verifying its signature.
///
/// A plain JSON object body is accepted as the claim set directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnverifiedDecoder;

impl UserInfoDecoder for UnverifiedDecoder {
    fn decode(&self, body: &str) -> Result<UserInfoClaims, Error> {
        let body = body.trim().trim_matches('"');

        if body.starts_with('{') {
            check_decoded_size(body.len())?;
            return parse_claims(body.as_bytes());
        }

        let mut segments = body.split('.');
        let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(_header), Some(payload), Some(_signature), None) => payload,
            _ => {
                return Err(oauth_error(
                    OAuthErrorKind::InvalidUserInfo,
                    "user info response is not a compact JWT",
                ))
            }
        };

        if payload.len() > MAX_ENCODED_PAYLOAD_BYTES {
            return Err(oauth_error(
                OAuthErrorKind::InvalidUserInfo,
                "user info payload exceeds maximum size (128KB encoded)",
            ));
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| {
                oauth_error(
                    OAuthErrorKind::InvalidUserInfo,
                    &format!("failed to decode JWT payload: {e}"),
                )
            })?;

        check_decoded_size(bytes.len())?;
        parse_claims(&bytes)
    }
}

fn check_decoded_size(len: usize) -> Result<(), Error> {
    if len > MAX_DECODED_PAYLOAD_BYTES {
        return Err(oauth_error(
            OAuthErrorKind::InvalidUserInfo,
            "user info payload exceeds maximum size (64KB decoded)",
        ));
    }
    Ok(())
}

fn parse_claims(bytes: &[u8]) -> Result<UserInfoClaims, Error> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(_) => Err(oauth_error(
            OAuthErrorKind::InvalidUserInfo,
            "user info claims are not a JSON object",
        )),
        Err(e) => Err(oauth_error(
            OAuthErrorKind::InvalidUserInfo,
            &format!("failed to parse user claims: {e}"),
        )),
    }
}
