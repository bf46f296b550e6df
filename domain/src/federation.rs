//! The federated login flow: authorize, authenticate, refresh.
//!
//! ```text
//! Start --authorize--> Pending --authenticate--> Authenticated --refresh--> Authenticated
//! ```
//!
//! A pending session lives under `pending:{session_id}` and holds the CSRF token,
//! PKCE verifier and redirect URI. Once the upstream login completes, the federated
//! claims are stored under `authenticated:{subject}`, where the subject of the
//! locally issued tokens is the session id. Refresh looks the claims up by that
//! subject, so a session outlives its tokens only as long as its TTL.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use federation_auth::oauth::{
    new_csrf_token, new_session_key, ClientAssertionSigner, PkceVerifier, Provider,
};
use federation_auth::session::SessionStore;
use log::*;
use serde_json::{Map, Value};
use service::config::Config;

use crate::error::{
    DomainErrorKind, Error, ExternalErrorKind, InternalErrorKind, ValidationErrorKind,
};
use crate::jwt::{verify_refresh_token, IssuedTokens, TokenIssuer};
use crate::user::FederatedUser;

/// Value reported for origin/referer hints the client did not send.
pub const UNSPECIFIED_HINT: &str = "Unspecified";

const CSRF_TOKEN_FIELD: &str = "csrf_token";
const CODE_VERIFIER_FIELD: &str = "code_verifier";
const REDIRECT_URI_FIELD: &str = "redirect_uri";

/// Lifetimes used by the flow.
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub pending_session_ttl: StdDuration,
    pub authenticated_session_ttl: StdDuration,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            pending_session_ttl: StdDuration::from_secs(15 * 60),
            authenticated_session_ttl: StdDuration::from_secs(24 * 60 * 60),
            access_token_ttl: Duration::hours(1),
            refresh_token_ttl: Duration::hours(30 * 24),
        }
    }
}

// Lifetimes that cannot be added to the current time are refused here, once,
// instead of failing every request that issues a token or writes a session.
impl TryFrom<&Config> for FlowSettings {
    type Error = Error;

    fn try_from(config: &Config) -> Result<Self, Error> {
        Ok(Self {
            pending_session_ttl: session_lifetime(
                "PENDING_SESSION_TTL_SECS",
                config.pending_session_ttl_secs,
            )?,
            authenticated_session_ttl: session_lifetime(
                "AUTHENTICATED_SESSION_TTL_SECS",
                config.authenticated_session_ttl_secs,
            )?,
            access_token_ttl: token_lifetime(
                "ACCESS_TOKEN_TTL_HOURS",
                config.access_token_ttl_hours,
            )?,
            refresh_token_ttl: token_lifetime(
                "REFRESH_TOKEN_TTL_HOURS",
                config.refresh_token_ttl_hours,
            )?,
        })
    }
}

fn token_lifetime(name: &str, hours: u64) -> Result<Duration, Error> {
    i64::try_from(hours)
        .ok()
        .and_then(Duration::try_hours)
        .filter(|ttl| Utc::now().checked_add_signed(*ttl).is_some())
        .ok_or_else(|| out_of_range(name))
}

fn session_lifetime(name: &str, secs: u64) -> Result<StdDuration, Error> {
    let ttl = StdDuration::from_secs(secs);
    Duration::from_std(ttl)
        .ok()
        .filter(|ttl| Utc::now().checked_add_signed(*ttl).is_some())
        .map(|_| ttl)
        .ok_or_else(|| out_of_range(name))
}

fn out_of_range(name: &str) -> Error {
    Error::internal(
        InternalErrorKind::Config,
        &format!("{name} is out of range"),
    )
}

/// Result of starting a login.
#[derive(Debug, Clone)]
pub struct Authorization {
    pub auth_url: String,
    pub session_id: String,
    pub utm_source: String,
    pub utm_referer: String,
}

/// Drives the login flow. Shared read-only between requests.
pub struct AuthFlow {
    provider: Arc<dyn Provider>,
    signer: ClientAssertionSigner,
    issuer: Arc<TokenIssuer>,
    store: Arc<dyn SessionStore>,
    settings: FlowSettings,
}

impl AuthFlow {
    pub fn new(
        provider: Arc<dyn Provider>,
        signer: ClientAssertionSigner,
        issuer: Arc<TokenIssuer>,
        store: Arc<dyn SessionStore>,
        settings: FlowSettings,
    ) -> Self {
        Self {
            provider,
            signer,
            issuer,
            store,
            settings,
        }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Start a login: create a pending session and build the upstream authorization URL.
    ///
    /// # Arguments
    ///
    /// * `redirect_uri` - Configured redirect URI; `None` or empty refuses the request
    /// * `origin` - Where the client says the user came from, echoed as `utm_source`
    /// * `referer` - Referring page, echoed as `utm_referer`
    pub async fn authorize(
        &self,
        redirect_uri: Option<&str>,
        origin: Option<&str>,
        referer: Option<&str>,
    ) -> Result<Authorization, Error> {
        let origin = hint(origin);
        let referer = hint(referer);

        let redirect_uri = match redirect_uri.map(str::trim).filter(|uri| !uri.is_empty()) {
            Some(uri) => uri,
            None => {
                info!("Authorize: no redirect URI configured, origin {origin}");
                return Err(Error::validation(
                    ValidationErrorKind::MissingRedirectUri,
                    &format!("Invalid origin: {origin}"),
                ));
            }
        };

        let csrf_token = new_csrf_token();
        let verifier = PkceVerifier::generate();
        let session_id = new_session_key();

        let request =
            self.provider
                .authorization_url(&csrf_token, &verifier.challenge(), redirect_uri)?;

        let mut pending = Map::new();
        pending.insert(CSRF_TOKEN_FIELD.to_string(), Value::from(csrf_token));
        pending.insert(
            CODE_VERIFIER_FIELD.to_string(),
            Value::from(verifier.as_str()),
        );
        pending.insert(REDIRECT_URI_FIELD.to_string(), Value::from(redirect_uri));
        self.store
            .put(
                &pending_key(&session_id),
                &pending,
                self.settings.pending_session_ttl,
            )
            .await?;

        info!("Authorize: created session {session_id} (origin {origin}, referer {referer})");

        Ok(Authorization {
            auth_url: request.url,
            session_id,
            utm_source: origin,
            utm_referer: referer,
        })
    }

    /// Complete a login with the authorization code returned to the client.
    ///
    /// The session and CSRF token are checked before anything is sent upstream.
    pub async fn authenticate(
        &self,
        session_id: &str,
        csrf_token: &str,
        auth_code: &str,
    ) -> Result<IssuedTokens, Error> {
        let pending = self.store.get_all(&pending_key(session_id)).await?;
        if pending.is_empty() {
            info!("Authenticate: invalid or expired session {session_id}");
            return Err(Error::validation(
                ValidationErrorKind::InvalidSession,
                "Invalid or expired session",
            ));
        }

        if pending.get(CSRF_TOKEN_FIELD).map(String::as_str) != Some(csrf_token) {
            info!("Authenticate: CSRF token mismatch for session {session_id}");
            return Err(Error::validation(
                ValidationErrorKind::CsrfMismatch,
                "Invalid CSRF token",
            ));
        }

        let verifier = pending
            .get(CODE_VERIFIER_FIELD)
            .map(|v| PkceVerifier::from_string(v.clone()))
            .ok_or_else(|| corrupt_session(CODE_VERIFIER_FIELD))?;
        let redirect_uri = pending
            .get(REDIRECT_URI_FIELD)
            .ok_or_else(|| corrupt_session(REDIRECT_URI_FIELD))?;

        let client_assertion = self.signer.sign()?;
        let upstream_tokens = self
            .provider
            .exchange_code(auth_code, &verifier, redirect_uri, &client_assertion)
            .await?;
        let claims = self
            .provider
            .get_user_info(&upstream_tokens.access_token)
            .await?;

        let user = FederatedUser::from_claims(claims).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: DomainErrorKind::External(ExternalErrorKind::Other(
                "user info has no subject".to_string(),
            )),
        })?;

        let tokens = self.issuer.issue(
            &user,
            session_id,
            self.settings.access_token_ttl,
            self.settings.refresh_token_ttl,
        )?;

        self.store
            .put(
                &authenticated_key(session_id),
                user.claims(),
                self.settings.authenticated_session_ttl,
            )
            .await?;

        info!(
            "Authenticate: session {session_id} authenticated via {}",
            self.provider.name()
        );
        Ok(tokens)
    }

    /// Issue a fresh token pair for the subject of a valid refresh token.
    ///
    /// # Arguments
    ///
    /// * `refresh_token` - Refresh token previously issued by this server
    /// * `verification_key_pem` - PEM public key to verify it with
    pub async fn refresh(
        &self,
        refresh_token: &str,
        verification_key_pem: &str,
    ) -> Result<IssuedTokens, Error> {
        let subject = verify_refresh_token(refresh_token, verification_key_pem)?;

        let record = self.store.get_all(&authenticated_key(&subject)).await?;
        if record.is_empty() {
            info!("Refresh: invalid or expired session for {subject}");
            return Err(Error::validation(
                ValidationErrorKind::InvalidSession,
                "Invalid or expired session",
            ));
        }

        let user = FederatedUser::from_record(record).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                "error getting user info from refresh session".to_string(),
            )),
        })?;

        let tokens = self.issuer.issue(
            &user,
            &subject,
            self.settings.access_token_ttl,
            self.settings.refresh_token_ttl,
        )?;

        info!("Refresh: issued new tokens for {subject}");
        Ok(tokens)
    }
}

fn pending_key(session_id: &str) -> String {
    format!("pending:{session_id}")
}

fn authenticated_key(subject: &str) -> String {
    format!("authenticated:{subject}")
}

fn hint(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNSPECIFIED_HINT)
        .to_string()
}

fn corrupt_session(field: &str) -> Error {
    warn!("Pending session is missing {field}");
    Error::internal(
        InternalErrorKind::Other("corrupt session".to_string()),
        &format!("pending session is missing {field}"),
    )
}
