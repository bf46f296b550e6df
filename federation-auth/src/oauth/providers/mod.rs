//! Identity provider implementations.

pub mod esignet;
