//! Auth-domain identifiers, scope lists, secrets, and PKCE helpers.

pub mod id;
pub mod pkce;
pub mod scope;
pub mod secret;

pub use id::*;
pub use pkce::*;
pub use scope::*;
pub use secret::*;
