//! OpenID Connect authorization code flow with PKCE against an upstream provider.

mod pkce;
mod provider;
mod state;

pub mod client_assertion;
pub mod providers;
pub mod token;
pub mod userinfo;

pub use client_assertion::{ClientAssertionClaims, ClientAssertionSigner};
pub use pkce::{PkceChallenge, PkceVerifier, CHALLENGE_METHOD};
pub use provider::{AuthorizationRequest, Provider};
pub use state::{new_csrf_token, new_session_key, random_opaque_id, CSRF_TOKEN_LENGTH, SESSION_KEY_LENGTH};
pub use userinfo::{UnverifiedDecoder, UserInfoClaims, UserInfoDecoder};
