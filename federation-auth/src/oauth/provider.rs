//! Upstream identity provider trait and types.

use async_trait::async_trait;
use secrecy::SecretString;

use super::pkce::{PkceChallenge, PkceVerifier};
use super::token::Tokens;
use super::userinfo::UserInfoClaims;
use crate::error::Error;

/// Authorization request the browser is sent to.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Authorization URL to redirect the user to.
    pub url: String,
    /// CSRF state parameter embedded in the URL.
    pub state: String,
}

/// Trait for OIDC identity providers using the authorization code flow with PKCE
/// and private-key-JWT client authentication.
///
/// Implementations must not retry the code exchange: authorization codes are
/// single-use, so a blind retry can only fail or cause upstream side effects.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &'static str;

    /// Build the authorization URL.
    ///
    /// # Arguments
    ///
    /// * `state` - CSRF state parameter echoed back by the client
    /// * `pkce_challenge` - S256 code challenge
    /// * `redirect_uri` - Where the provider sends the browser back to
    fn authorization_url(
        &self,
        state: &str,
        pkce_challenge: &PkceChallenge,
        redirect_uri: &str,
    ) -> Result<AuthorizationRequest, Error>;

    /// Exchange an authorization code for upstream tokens.
    ///
    /// # Arguments
    ///
    /// * `code` - Authorization code from the callback
    /// * `pkce_verifier` - Verifier stored in the pending session
    /// * `redirect_uri` - Redirect URI used in the authorization request
    /// * `client_assertion` - Freshly signed client assertion
    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &PkceVerifier,
        redirect_uri: &str,
        client_assertion: &SecretString,
    ) -> Result<Tokens, Error>;

    /// Fetch the user-info claim set with an upstream access token.
    async fn get_user_info(&self, access_token: &SecretString) -> Result<UserInfoClaims, Error>;
}
