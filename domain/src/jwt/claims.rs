//! Claims of the tokens this server issues.
//!
//! Access tokens carry the federated user so resource servers need no lookup; refresh
//! tokens carry only the subject, which keys the authenticated session.

use serde::{Deserialize, Serialize};

use crate::user::FederatedUser;

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub iss: String,
    pub user: FederatedUser,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}
