use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

/// Optional attribution hints for `GET /authorize`. When absent, the `Origin` and
/// `Referer` request headers are used instead.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct AuthorizeParams {
    /// Where the user came from, echoed back as `utm_source`.
    pub(crate) request_origin: Option<String>,
    /// Referring page, echoed back as `utm_referer`.
    pub(crate) request_referer: Option<String>,
}

/// Body of `POST /authenticate`.
///
/// # Fields
///
/// * `session_id` - Session id returned by `/authorize`
/// * `csrf_token` - The `state` value the identity provider redirected back with
/// * `auth_code` - The authorization code the identity provider redirected back with
#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct AuthenticateParams {
    pub(crate) session_id: String,
    pub(crate) csrf_token: String,
    pub(crate) auth_code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct RefreshParams {
    pub(crate) refresh_token: String,
    /// PEM public key the refresh token is verified with.
    pub(crate) key: String,
}
