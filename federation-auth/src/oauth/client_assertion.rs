//! Private-key-JWT client authentication (RFC 7523) for the upstream token endpoint.
//!
//! The signer is built once at startup from the RSA key registered with the identity
//! provider and mints a fresh, short-lived assertion for every code exchange.

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::{
    pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey},
    pkcs8::DecodePrivateKey,
    BigUint, RsaPrivateKey,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{assertion_error, AssertionErrorKind, Error};

/// Default assertion lifetime. Assertions are single-use, so this only needs to
/// cover clock skew and the exchange round trip.
pub const DEFAULT_ASSERTION_TTL_SECS: i64 = 300;

/// Claims of a client assertion.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClientAssertionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// RSA private key in JWK form, as registered with the identity provider.
#[derive(Deserialize)]
struct RsaPrivateJwk {
    kty: String,
    kid: Option<String>,
    n: String,
    e: String,
    d: String,
    p: Option<String>,
    q: Option<String>,
}

/// Signs client assertions with RS256.
pub struct ClientAssertionSigner {
    client_id: String,
    audience: String,
    ttl: Duration,
    key: EncodingKey,
    key_id: Option<String>,
}

impl ClientAssertionSigner {
    /// Build a signer from a standard-base64 encoded RSA private JWK.
    ///
    /// # Arguments
    ///
    /// * `jwk_base64` - Base64 of the JWK JSON document (raw JSON is accepted too)
    /// * `client_id` - Client identifier registered upstream (`iss` and `sub`)
    /// * `token_url` - Upstream token endpoint (`aud`)
    /// * `ttl` - Assertion lifetime
    pub fn from_jwk_base64(
        jwk_base64: &str,
        client_id: &str,
        token_url: &str,
        ttl: Duration,
    ) -> Result<Self, Error> {
        let trimmed = jwk_base64.trim();
        let document = if trimmed.starts_with('{') {
            trimmed.as_bytes().to_vec()
        } else {
            STANDARD.decode(trimmed).map_err(|e| {
                assertion_error(
                    AssertionErrorKind::InvalidKey,
                    &format!("failed to decode base64 private key: {e}"),
                )
            })?
        };

        let jwk: RsaPrivateJwk = serde_json::from_slice(&document).map_err(|e| {
            assertion_error(
                AssertionErrorKind::InvalidKey,
                &format!("failed to parse JWK: {e}"),
            )
        })?;
        let key_id = jwk.kid.clone();
        let private_key = rsa_key_from_jwk(jwk)?;

        Self::from_rsa_key(&private_key, key_id, client_id, token_url, ttl)
    }

    /// Build a signer from a PKCS#1 or PKCS#8 PEM private key.
    pub fn from_pem(
        pem: &str,
        client_id: &str,
        token_url: &str,
        ttl: Duration,
    ) -> Result<Self, Error> {
        let private_key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| {
                assertion_error(
                    AssertionErrorKind::InvalidKey,
                    &format!("failed to parse PEM private key: {e}"),
                )
            })?;

        Self::from_rsa_key(&private_key, None, client_id, token_url, ttl)
    }

    fn from_rsa_key(
        private_key: &RsaPrivateKey,
        key_id: Option<String>,
        client_id: &str,
        token_url: &str,
        ttl: Duration,
    ) -> Result<Self, Error> {
        if client_id.is_empty() || token_url.is_empty() {
            return Err(assertion_error(
                AssertionErrorKind::MissingConfiguration,
                "client id and token endpoint are required to sign client assertions",
            ));
        }

        let der = private_key.to_pkcs1_der().map_err(|e| {
            assertion_error(
                AssertionErrorKind::InvalidKey,
                &format!("failed to encode RSA key: {e}"),
            )
        })?;

        Ok(Self {
            client_id: client_id.to_string(),
            audience: token_url.to_string(),
            ttl,
            key: EncodingKey::from_rsa_der(der.as_bytes()),
            key_id,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Mint a new assertion valid from now for the configured lifetime.
    pub fn sign(&self) -> Result<SecretString, Error> {
        let now = Utc::now();
        let expires_at = now.checked_add_signed(self.ttl).ok_or_else(|| {
            assertion_error(
                AssertionErrorKind::SigningFailed,
                "client assertion lifetime is out of range",
            )
        })?;
        let claims = ClientAssertionClaims {
            iss: self.client_id.clone(),
            sub: self.client_id.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        let assertion = encode(&header, &claims, &self.key)?;
        debug!("Client assertion generated for client {}", self.client_id);
        Ok(SecretString::new(assertion))
    }
}

fn rsa_key_from_jwk(jwk: RsaPrivateJwk) -> Result<RsaPrivateKey, Error> {
    if jwk.kty != "RSA" {
        return Err(assertion_error(
            AssertionErrorKind::InvalidKey,
            &format!("extracted key is not an RSA private key (kty: {})", jwk.kty),
        ));
    }

    let (p, q) = match (jwk.p, jwk.q) {
        (Some(p), Some(q)) => (p, q),
        _ => {
            return Err(assertion_error(
                AssertionErrorKind::InvalidKey,
                "RSA JWK is missing its prime factors (p, q)",
            ))
        }
    };

    let key = RsaPrivateKey::from_components(
        jwk_uint(&jwk.n)?,
        jwk_uint(&jwk.e)?,
        jwk_uint(&jwk.d)?,
        vec![jwk_uint(&p)?, jwk_uint(&q)?],
    )
    .map_err(|e| {
        assertion_error(
            AssertionErrorKind::InvalidKey,
            &format!("invalid RSA key components: {e}"),
        )
    })?;

    key.validate().map_err(|e| {
        assertion_error(
            AssertionErrorKind::InvalidKey,
            &format!("RSA key failed validation: {e}"),
        )
    })?;

    Ok(key)
}

fn jwk_uint(value: &str) -> Result<BigUint, Error> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| {
            assertion_error(
                AssertionErrorKind::InvalidKey,
                &format!("invalid base64url JWK member: {e}"),
            )
        })?;
    Ok(BigUint::from_bytes_be(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
    use secrecy::ExposeSecret;

    const CLIENT_JWK: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../testdata/client_jwk.b64"
    ));
    const PRIVATE_PEM: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../testdata/rsa_private.pem"
    ));
    const PUBLIC_PEM: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../testdata/rsa_public.pem"
    ));
    const TOKEN_URL: &str = "https://esignet.example/v1/esignet/oauth/v2/token";

    fn verify(assertion: &str) -> ClientAssertionClaims {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[TOKEN_URL]);
        decode::<ClientAssertionClaims>(
            assertion,
            &DecodingKey::from_rsa_pem(PUBLIC_PEM.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap()
        .claims
    }

    #[test]
    fn test_sign_from_jwk() {
        let signer = ClientAssertionSigner::from_jwk_base64(
            CLIENT_JWK,
            "client-123",
            TOKEN_URL,
            Duration::seconds(DEFAULT_ASSERTION_TTL_SECS),
        )
        .unwrap();

        let assertion = signer.sign().unwrap();
        let claims = verify(assertion.expose_secret());
        assert_eq!(claims.iss, "client-123");
        assert_eq!(claims.sub, "client-123");
        assert_eq!(claims.aud, TOKEN_URL);
        assert_eq!(claims.exp - claims.iat, DEFAULT_ASSERTION_TTL_SECS);

        let header = decode_header(assertion.expose_secret()).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some("test-client-key"));
    }

    #[test]
    fn test_sign_from_pem() {
        let signer = ClientAssertionSigner::from_pem(
            PRIVATE_PEM,
            "client-123",
            TOKEN_URL,
            Duration::seconds(60),
        )
        .unwrap();

        let claims = verify(signer.sign().unwrap().expose_secret());
        assert_eq!(claims.exp - claims.iat, 60);
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let result = ClientAssertionSigner::from_jwk_base64(
            "not base64!!",
            "client-123",
            TOKEN_URL,
            Duration::seconds(60),
        );
        assert!(matches!(
            result,
            Err(Error {
                error_kind: ErrorKind::Assertion(AssertionErrorKind::InvalidKey),
                ..
            })
        ));
    }

    #[test]
    fn test_non_rsa_jwk_is_rejected() {
        let jwk = r#"{"kty":"EC","n":"AQ","e":"AQAB","d":"AQ"}"#;
        let result = ClientAssertionSigner::from_jwk_base64(
            &STANDARD.encode(jwk),
            "client-123",
            TOKEN_URL,
            Duration::seconds(60),
        );
        assert!(matches!(
            result,
            Err(Error {
                error_kind: ErrorKind::Assertion(AssertionErrorKind::InvalidKey),
                ..
            })
        ));
    }

    #[test]
    fn test_out_of_range_lifetime_fails_to_sign() {
        let signer =
            ClientAssertionSigner::from_pem(PRIVATE_PEM, "client-123", TOKEN_URL, Duration::MAX)
                .unwrap();
        assert!(matches!(
            signer.sign(),
            Err(Error {
                error_kind: ErrorKind::Assertion(AssertionErrorKind::SigningFailed),
                ..
            })
        ));
    }

    #[test]
    fn test_missing_client_id_is_rejected() {
        let result =
            ClientAssertionSigner::from_pem(PRIVATE_PEM, "", TOKEN_URL, Duration::seconds(60));
        assert!(matches!(
            result,
            Err(Error {
                error_kind: ErrorKind::Assertion(AssertionErrorKind::MissingConfiguration),
                ..
            })
        ));
    }
}
