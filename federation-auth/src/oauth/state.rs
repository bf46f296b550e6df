//! CSRF state tokens and opaque identifiers for the authorization flow.
//!
//! Both values double as bearer secrets (the CSRF token is echoed back by the client,
//! the session key is the only handle to a server-side session), so they are drawn
//! from the thread-local CSPRNG with the unbiased `Alphanumeric` distribution.

use rand::{distributions::Alphanumeric, Rng};

/// Length of the `state` value sent upstream and echoed back by the client.
pub const CSRF_TOKEN_LENGTH: usize = 24;

/// Length of the opaque session key handed to the client.
pub const SESSION_KEY_LENGTH: usize = 32;

/// Generate a new CSRF token for the `state` parameter.
pub fn new_csrf_token() -> String {
    random_opaque_id(CSRF_TOKEN_LENGTH)
}

/// Generate a new opaque session key.
pub fn new_session_key() -> String {
    random_opaque_id(SESSION_KEY_LENGTH)
}

/// Generate `len` random characters from `[A-Za-z0-9]`.
pub fn random_opaque_id(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
