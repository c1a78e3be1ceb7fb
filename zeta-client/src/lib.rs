//! ZETA Rust client SDK
//!
//! Wraps every request in a signed envelope, posts it, and optionally
//! verifies the server's signature on the way back.

pub mod client;
pub mod error;

pub use client::Client;
pub use error::ClientError;

pub type Result<T> = std::result::Result<T, ClientError>;
