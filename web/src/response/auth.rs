use domain::{Authorization, IssuedTokens};
use serde::Serialize;
use utoipa::ToSchema;

/// Body of a successful `GET /authorize`.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct AuthorizeResponse {
    pub(crate) message: String,
    /// Upstream URL to send the browser to.
    pub(crate) auth_url: String,
    /// Opaque id to present back to `/authenticate`.
    pub(crate) session_id: String,
    pub(crate) utm_referer: String,
    pub(crate) utm_source: String,
}

impl From<Authorization> for AuthorizeResponse {
    fn from(authorization: Authorization) -> Self {
        Self {
            message: "Redirecting to Fayda Esignet".to_string(),
            auth_url: authorization.auth_url,
            session_id: authorization.session_id,
            utm_referer: authorization.utm_referer,
            utm_source: authorization.utm_source,
        }
    }
}

/// Body of a successful `POST /authenticate` or `POST /refresh`.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct TokenResponse {
    pub(crate) message: String,
    pub(crate) access_token: String,
    pub(crate) refresh_token: String,
}

impl TokenResponse {
    pub(crate) fn new(message: &str, tokens: IssuedTokens) -> Self {
        Self {
            message: message.to_string(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }
    }
}

/// Body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct MessageResponse {
    pub(crate) message: String,
}
