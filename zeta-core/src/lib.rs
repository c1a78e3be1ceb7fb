//! Core security plane and data model for ZETA
//!
//! Everything the protocol trusts lives here: the canonical JSON encoder,
//! the RSA-PSS and AES-CBC primitives, the signed `Auth<T>` envelope with
//! its replay defense, and the typed ticket state machine.

pub mod canonical;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod nonce;
pub mod protocol;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::*;
pub use types::*;

/// Result type alias for ZETA operations
pub type Result<T> = std::result::Result<T, ZetaError>;
