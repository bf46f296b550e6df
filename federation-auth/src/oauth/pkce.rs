//! PKCE (Proof Key for Code Exchange) support for the upstream authorization code flow.
//!
//! Implements the S256 method of RFC 7636. The `plain` method is not supported.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of random bytes behind every verifier (43 base64url characters).
const VERIFIER_BYTES: usize = 32;

/// The only challenge method sent upstream.
pub const CHALLENGE_METHOD: &str = "S256";

/// PKCE code verifier, kept server-side in the pending session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceVerifier(String);

impl PkceVerifier {
    /// Generate a new verifier from 32 CSPRNG bytes, base64url encoded without padding.
    pub fn generate() -> Self {
        let mut random_bytes = [0u8; VERIFIER_BYTES];
        rand::thread_rng().fill_bytes(&mut random_bytes);
        Self(URL_SAFE_NO_PAD.encode(random_bytes))
    }

    /// Rebuild a verifier read back from the session store.
    pub fn from_string(verifier: String) -> Self {
        Self(verifier)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the S256 challenge sent in the authorization URL.
    pub fn challenge(&self) -> PkceChallenge {
        PkceChallenge::from_verifier(self)
    }
}

/// PKCE code challenge: base64url(SHA-256(verifier)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge(String);

impl PkceChallenge {
    pub fn from_verifier(verifier: &PkceVerifier) -> Self {
        let digest = Sha256::digest(verifier.as_str().as_bytes());
        Self(URL_SAFE_NO_PAD.encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
