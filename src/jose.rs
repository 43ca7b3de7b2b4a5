//! JOSE building blocks for ID token verification.
//!
//! The crate never implements signature or encryption math itself. Cryptography enters through
//! the [`SignatureVerifier`] collaborator, which hands out one [`JwsVerifier`] per signing
//! algorithm and, for providers that encrypt ID tokens, one [`JweDecrypter`] per key
//! management algorithm. [`negotiate`] binds the provider's advertised algorithms to those
//! implementations once, and [`IdTokenVerifier`] drives the verification pipeline.

pub mod algorithm;
#[cfg(feature = "jsonwebtoken")] pub mod backend;
pub mod claims;
pub mod compact;
pub mod key;
pub mod verifier;

#[cfg(feature = "jsonwebtoken")] pub use backend::*;
pub use algorithm::*;
pub use claims::*;
pub use compact::*;
pub use key::*;
pub use verifier::*;
