//! Tokens returned by the upstream token endpoint.

mod tokens;

pub use tokens::{TokenResponse, Tokens};
