//! Domain layer of the authorization broker.
//!
//! Wires the `federation-auth` building blocks into the login flow and issues the
//! local tokens. Web handlers talk to [`federation::AuthFlow`] only.

pub mod error;
pub mod federation;
pub mod jwt;
pub mod session_store;
pub mod user;

pub use federation::{AuthFlow, Authorization, FlowSettings};
pub use jwt::{IssuedTokens, TokenIssuer};
pub use session_store::RedisSessionStore;
pub use user::FederatedUser;
