//! Fayda eSignet provider.
//!
//! eSignet authenticates confidential clients with `private_key_jwt` and answers the
//! user-info request with a signed JWT rather than a JSON document.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{oauth_error, Error, OAuthErrorKind};
use crate::oauth::pkce::{PkceChallenge, PkceVerifier, CHALLENGE_METHOD};
use crate::oauth::provider::AuthorizationRequest;
use crate::oauth::token::{TokenResponse, Tokens};
use crate::oauth::userinfo::{UnverifiedDecoder, UserInfoClaims, UserInfoDecoder};

/// Assertion type announced alongside the client assertion (RFC 7523).
pub const DEFAULT_CLIENT_ASSERTION_TYPE: &str =
    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Scope requested when none is configured.
pub const DEFAULT_SCOPE: &str = "openid profile email";

/// Endpoints and client registration for an eSignet deployment.
#[derive(Debug, Clone)]
pub struct EsignetConfig {
    pub client_id: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub client_assertion_type: String,
    pub scope: String,
}

/// eSignet OIDC provider.
pub struct Provider {
    config: EsignetConfig,
    http_client: reqwest::Client,
    decoder: Box<dyn UserInfoDecoder>,
}

impl Provider {
    /// Create a provider that decodes user info with [`UnverifiedDecoder`].
    ///
    /// # Arguments
    ///
    /// * `config` - Endpoints and client registration
    /// * `http_client` - Client used for every upstream call; its timeout bounds them
    pub fn new(config: EsignetConfig, http_client: reqwest::Client) -> Self {
        Self::with_decoder(config, http_client, Box::new(UnverifiedDecoder))
    }

    /// Create a provider with an explicit user-info decoder.
    pub fn with_decoder(
        config: EsignetConfig,
        http_client: reqwest::Client,
        decoder: Box<dyn UserInfoDecoder>,
    ) -> Self {
        Self {
            config,
            http_client,
            decoder,
        }
    }
}

#[async_trait]
impl crate::oauth::Provider for Provider {
    fn name(&self) -> &'static str {
        "esignet"
    }

    fn authorization_url(
        &self,
        state: &str,
        pkce_challenge: &PkceChallenge,
        redirect_uri: &str,
    ) -> Result<AuthorizationRequest, Error> {
        let url = Url::parse_with_params(
            &self.config.authorization_endpoint,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", redirect_uri),
                ("code_challenge", pkce_challenge.as_str()),
                ("code_challenge_method", CHALLENGE_METHOD),
                ("scope", self.config.scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| {
            oauth_error(
                OAuthErrorKind::InvalidResponse,
                &format!("invalid authorization endpoint: {e}"),
            )
        })?;

        Ok(AuthorizationRequest {
            url: url.into(),
            state: state.to_string(),
        })
    }

    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &PkceVerifier,
        redirect_uri: &str,
        client_assertion: &SecretString,
    ) -> Result<Tokens, Error> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", pkce_verifier.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_assertion", client_assertion.expose_secret().as_str()),
            (
                "client_assertion_type",
                self.config.client_assertion_type.as_str(),
            ),
        ];

        debug!("Exchanging authorization code at {}", self.config.token_endpoint);

        let response = self
            .http_client
            .post(&self.config.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                warn!("Token request failed: {e}");
                Error::from(e)
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!("Token endpoint returned status {status}: {body}");
            return Err(oauth_error(
                OAuthErrorKind::TokenExchangeFailed,
                &format!("token endpoint returned status {}", status.as_u16()),
            ));
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            warn!("Failed to decode token response: {e}");
            oauth_error(
                OAuthErrorKind::InvalidResponse,
                &format!("failed to decode token response: {e}"),
            )
        })?;

        info!("Exchanged authorization code for upstream tokens");
        Ok(token_response.into())
    }

    async fn get_user_info(&self, access_token: &SecretString) -> Result<UserInfoClaims, Error> {
        let response = self
            .http_client
            .get(&self.config.userinfo_endpoint)
            .bearer_auth(access_token.expose_secret())
            .send()
            .await
            .map_err(|e| {
                warn!("User info request failed: {e}");
                Error::from(e)
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!("User info endpoint returned status {status}");
            return Err(oauth_error(
                OAuthErrorKind::UserInfoFailed,
                &format!("user info endpoint returned status {}", status.as_u16()),
            ));
        }

        let body = response.text().await?;
        let claims = self.decoder.decode(&body)?;
        debug!("Decoded {} user info claims", claims.len());
        Ok(claims)
    }
}
