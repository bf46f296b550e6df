//! # federation-auth
//!
//! Building blocks for brokering an upstream OpenID Connect login:
//! - PKCE verifiers/challenges and CSRF state tokens
//! - Private-key-JWT client assertions for the token endpoint
//! - The upstream `Provider` trait and the eSignet implementation
//! - A TTL session store abstraction with an in-memory implementation
//! - HTTP client building for upstream calls
//!
//! ## Usage
//!
//! ```rust,ignore
//! use federation_auth::{
//!     oauth::{providers::esignet, ClientAssertionSigner, PkceVerifier, Provider},
//!     session::{MemoryStore, SessionStore},
//!     http::HttpClientBuilder,
//! };
//! ```

pub mod error;
pub mod http;
pub mod oauth;
pub mod session;

pub use error::{Error, ErrorKind};
