//! Provider-facing configuration: discovery metadata, client registration, and grants.
//!
//! `metadata` validates the discovery document once at construction and exposes typed
//! read-only accessors. `client` holds the registered client credentials and redirect URIs.
//! `grant` enumerates the OAuth 2.0 grant types the request builder understands.

pub mod client;
pub mod grant;
pub mod metadata;

pub use client::*;
pub use grant::*;
pub use metadata::*;
