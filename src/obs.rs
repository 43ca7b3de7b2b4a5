//! Optional observability helpers for relying-party operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oidc_rp.operation` with the `operation`
//!   and `stage` (call site) fields.
//! - Enable `metrics` to increment the `oidc_rp_operation_total` counter for every
//!   attempt/success/failure, labeled by `operation` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Relying-party operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
	/// Building a token endpoint request.
	BuildTokenRequest,
	/// Executing a token request and parsing the response.
	TokenExchange,
	/// Downloading the provider's JWK set.
	FetchKeySet,
	/// Verifying an ID token.
	VerifyIdToken,
}
impl OperationKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationKind::BuildTokenRequest => "build_token_request",
			OperationKind::TokenExchange => "token_exchange",
			OperationKind::FetchKeySet => "fetch_key_set",
			OperationKind::VerifyIdToken => "verify_id_token",
		}
	}
}
impl Display for OperationKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OperationOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationOutcome::Attempt => "attempt",
			OperationOutcome::Success => "success",
			OperationOutcome::Failure => "failure",
		}
	}

	/// Maps a result onto its terminal outcome.
	pub fn of<T, E>(result: &Result<T, E>) -> Self {
		if result.is_ok() { OperationOutcome::Success } else { OperationOutcome::Failure }
	}
}
impl Display for OperationOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
