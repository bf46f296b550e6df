use crate::error::{Error, WebErrorKind};
use crate::params::auth::{AuthenticateParams, AuthorizeParams, RefreshParams};
use crate::response::auth::{AuthorizeResponse, MessageResponse, TokenResponse};
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::header::{ORIGIN, REFERER};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use log::*;

/// GET start a federated login with the identity provider
#[utoipa::path(
    get,
    path = "/authorize",
    params(AuthorizeParams),
    responses(
        (status = 200, description = "Pending session created", body = AuthorizeResponse),
        (status = 400, description = "No redirect URI is configured", body = MessageResponse),
        (status = 500, description = "Internal Server Error", body = MessageResponse),
    )
)]
pub async fn authorize(
    State(app_state): State<AppState>,
    Query(params): Query<AuthorizeParams>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, Error> {
    let origin = params
        .request_origin
        .or_else(|| header_value(&headers, ORIGIN.as_str()));
    let referer = params
        .request_referer
        .or_else(|| header_value(&headers, REFERER.as_str()));
    debug!("GET /authorize origin: {origin:?}, referer: {referer:?}");

    let authorization = app_state
        .flow
        .authorize(
            app_state.config.redirect_uri(),
            origin.as_deref(),
            referer.as_deref(),
        )
        .await?;

    Ok((StatusCode::OK, Json(AuthorizeResponse::from(authorization))))
}

/// POST complete a login with the authorization code from the identity provider
#[utoipa::path(
    post,
    path = "/authenticate",
    request_body = AuthenticateParams,
    responses(
        (status = 200, description = "Local tokens issued", body = TokenResponse),
        (status = 400, description = "Malformed body, unknown session or CSRF mismatch", body = MessageResponse),
        (status = 500, description = "Identity provider rejected the exchange", body = MessageResponse),
        (status = 502, description = "Identity provider unreachable", body = MessageResponse),
    )
)]
pub async fn authenticate(
    State(app_state): State<AppState>,
    payload: Result<Json<AuthenticateParams>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(params) = payload.map_err(input_error)?;
    debug!("POST /authenticate session: {}", params.session_id);

    let tokens = app_state
        .flow
        .authenticate(&params.session_id, &params.csrf_token, &params.auth_code)
        .await?;

    Ok((
        StatusCode::OK,
        Json(TokenResponse::new("User authenticated successfully", tokens)),
    ))
}

/// POST exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/refresh",
    request_body = RefreshParams,
    responses(
        (status = 200, description = "New local tokens issued", body = TokenResponse),
        (status = 400, description = "Malformed body, invalid or expired token, or unknown session", body = MessageResponse),
        (status = 500, description = "Internal Server Error", body = MessageResponse),
    )
)]
pub async fn refresh(
    State(app_state): State<AppState>,
    payload: Result<Json<RefreshParams>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(params) = payload.map_err(input_error)?;

    let tokens = app_state
        .flow
        .refresh(&params.refresh_token, &params.key)
        .await?;

    Ok((
        StatusCode::OK,
        Json(TokenResponse::new("refresh successful", tokens)),
    ))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn input_error(rejection: JsonRejection) -> Error {
    warn!("Rejected request body: {}", rejection.body_text());
    Error::Web(WebErrorKind::Input)
}
