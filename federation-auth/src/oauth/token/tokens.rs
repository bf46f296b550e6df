//! Upstream token types.

use secrecy::SecretString;
use serde::Deserialize;

/// Raw token endpoint response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Tokens obtained from the upstream identity provider.
///
/// Only the access token is used (to fetch user info); none of these are handed to
/// clients or persisted.
#[derive(Debug, Clone)]
pub struct Tokens {
    /// Access token for the user-info request.
    pub access_token: SecretString,
    /// OIDC ID token, when the provider returned one.
    pub id_token: Option<SecretString>,
    /// Lifetime in seconds as reported upstream, unchecked.
    pub expires_in: Option<i64>,
    /// Token type (usually "Bearer").
    pub token_type: String,
}

impl From<TokenResponse> for Tokens {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: SecretString::new(response.access_token),
            id_token: response.id_token.map(SecretString::new),
            expires_in: response.expires_in,
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
        }
    }
}
