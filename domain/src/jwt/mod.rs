//! Local token issuing and refresh-token verification.
//!
//! Tokens are RS256 JWTs signed with one RSA key held for the lifetime of the
//! process. The key is read from disk when present; otherwise a fresh key is
//! generated, in which case previously issued tokens stop verifying after a restart
//! unless the key is persisted.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain::jwt::TokenIssuer;
//!
//! let issuer = TokenIssuer::load_or_generate("/auth/private.pem", false, "adVouch-AuthServer")?;
//! let tokens = issuer.issue(&user, &session_id, Duration::hours(1), Duration::hours(720))?;
//! ```

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{Map, Value};

use crate::error::{Error, InternalErrorKind, ValidationErrorKind};
use crate::user::FederatedUser;
use claims::{AccessClaims, RefreshClaims};

pub mod claims;

/// Modulus size of generated signing keys.
const RSA_KEY_BITS: usize = 2048;

/// Signature algorithms accepted on refresh tokens.
const RSA_ALGORITHMS: [Algorithm; 6] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

/// Access/refresh pair handed to the client.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signs access and refresh tokens. Immutable once built.
pub struct TokenIssuer {
    issuer: String,
    encoding_key: EncodingKey,
    public_key_pem: String,
}

impl TokenIssuer {
    /// Load the signing key at `path`, or generate one when the file does not exist.
    ///
    /// With `persist` set, a generated key is written back to `path` (mode 0600 on
    /// Unix) so the next start picks it up.
    pub fn load_or_generate(
        path: impl AsRef<Path>,
        persist: bool,
        issuer: &str,
    ) -> Result<Self, Error> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(pem) => {
                info!("Loaded token signing key from {}", path.display());
                Self::from_pem(&pem, issuer)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(
                    "Token signing key {} not found, generating a new RSA key",
                    path.display()
                );
                let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), RSA_KEY_BITS)
                    .map_err(|e| {
                        Error::internal(
                            InternalErrorKind::Other("key generation".to_string()),
                            &format!("failed to generate RSA key: {e}"),
                        )
                    })?;

                if persist {
                    write_private_key(path, &private_key)?;
                    info!("Persisted generated signing key to {}", path.display());
                } else {
                    warn!("Generated signing key is not persisted; issued tokens will not verify after a restart");
                }

                Self::from_private_key(&private_key, issuer)
            }
            Err(e) => Err(Error {
                source: Some(Box::new(e)),
                error_kind: crate::error::DomainErrorKind::Internal(InternalErrorKind::Config),
            }),
        }
    }

    /// Build an issuer from a PKCS#1 or PKCS#8 PEM private key.
    pub fn from_pem(pem: &str, issuer: &str) -> Result<Self, Error> {
        let private_key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| {
                Error::internal(
                    InternalErrorKind::Config,
                    &format!("failed to parse token signing key: {e}"),
                )
            })?;
        Self::from_private_key(&private_key, issuer)
    }

    pub fn from_private_key(private_key: &RsaPrivateKey, issuer: &str) -> Result<Self, Error> {
        let der = private_key.to_pkcs1_der().map_err(|e| {
            Error::internal(
                InternalErrorKind::Config,
                &format!("failed to encode token signing key: {e}"),
            )
        })?;
        let public_key_pem = RsaPublicKey::from(private_key)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| {
                Error::internal(
                    InternalErrorKind::Config,
                    &format!("failed to encode public key: {e}"),
                )
            })?;

        Ok(Self {
            issuer: issuer.to_string(),
            encoding_key: EncodingKey::from_rsa_der(der.as_bytes()),
            public_key_pem,
        })
    }

    /// SPKI PEM of the key that verifies issued tokens.
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    /// Write [`TokenIssuer::public_key_pem`] to `path` for resource servers.
    pub fn write_public_key(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        fs::write(path, self.public_key_pem.as_bytes()).map_err(|e| {
            Error::internal(
                InternalErrorKind::Config,
                &format!("failed to write public key to {}: {e}", path.display()),
            )
        })?;
        info!("Wrote token verification key to {}", path.display());
        Ok(())
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue an access/refresh pair for `user`, with `subject` as `sub` of both.
    pub fn issue(
        &self,
        user: &FederatedUser,
        subject: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<IssuedTokens, Error> {
        let now = Utc::now();
        let header = Header::new(Algorithm::RS256);
        let expiry = |ttl: Duration| {
            now.checked_add_signed(ttl)
                .map(|exp| exp.timestamp())
                .ok_or_else(|| {
                    Error::internal(
                        InternalErrorKind::Config,
                        &format!("token lifetime {ttl} is out of range"),
                    )
                })
        };

        let access_claims = AccessClaims {
            sub: subject.to_string(),
            iss: self.issuer.clone(),
            user: user.clone(),
            iat: now.timestamp(),
            exp: expiry(access_ttl)?,
        };
        let refresh_claims = RefreshClaims {
            sub: subject.to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expiry(refresh_ttl)?,
        };

        Ok(IssuedTokens {
            access_token: encode(&header, &access_claims, &self.encoding_key)?,
            refresh_token: encode(&header, &refresh_claims, &self.encoding_key)?,
        })
    }
}

/// Verify a refresh token against a caller-supplied PEM public key and return its subject.
///
/// The algorithm is checked before the key is touched, and `exp` is checked here
/// rather than by the decoder so that a missing or malformed expiry is reported as
/// an expired token.
pub fn verify_refresh_token(token: &str, verification_key_pem: &str) -> Result<String, Error> {
    let header = decode_header(token).map_err(|e| {
        debug!("Refresh token header could not be decoded: {e}");
        Error::validation(ValidationErrorKind::InvalidToken, "Invalid refresh token")
    })?;

    if !RSA_ALGORITHMS.contains(&header.alg) {
        return Err(Error::validation(
            ValidationErrorKind::UnsupportedAlgorithm,
            &format!("unexpected signing method: {:?}", header.alg),
        ));
    }

    let key = DecodingKey::from_rsa_pem(verification_key_pem.as_bytes()).map_err(|e| {
        debug!("Refresh verification key could not be parsed: {e}");
        Error::validation(ValidationErrorKind::InvalidToken, "Invalid verification key")
    })?;

    let mut validation = Validation::new(header.alg);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    let claims = decode::<Map<String, Value>>(token, &key, &validation)
        .map_err(|e| {
            debug!("Refresh token rejected: {e}");
            Error::validation(ValidationErrorKind::InvalidToken, "Invalid refresh token")
        })?
        .claims;

    let exp = match claims.get("exp") {
        None => {
            return Err(Error::validation(
                ValidationErrorKind::ExpiredToken,
                "exp claim is missing",
            ))
        }
        Some(exp) => exp.as_f64().ok_or_else(|| {
            Error::validation(
                ValidationErrorKind::ExpiredToken,
                "exp claim is not a valid number",
            )
        })?,
    };
    if exp as i64 <= Utc::now().timestamp() {
        return Err(Error::validation(
            ValidationErrorKind::ExpiredToken,
            "expired Token",
        ));
    }

    match claims.get("sub") {
        Some(Value::String(sub)) if !sub.is_empty() => Ok(sub.clone()),
        _ => Err(Error::validation(
            ValidationErrorKind::MissingClaim,
            "sub claim is missing or not a string",
        )),
    }
}

fn write_private_key(path: &Path, private_key: &RsaPrivateKey) -> Result<(), Error> {
    let pem = private_key.to_pkcs8_pem(LineEnding::LF).map_err(|e| {
        Error::internal(
            InternalErrorKind::Config,
            &format!("failed to encode signing key: {e}"),
        )
    })?;

    let io_error = |e: io::Error| {
        Error::internal(
            InternalErrorKind::Config,
            &format!("failed to persist signing key to {}: {e}", path.display()),
        )
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }

    // The mode is set at creation so the key is never readable by others, even briefly.
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(io_error)?;
    file.write_all(pem.as_bytes()).map_err(io_error)?;
    file.sync_all().map_err(io_error)?;

    Ok(())
}
