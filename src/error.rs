//! Relying-party error types shared across metadata, requests, responses, and verification.

// self
use crate::{_prelude::*, auth::IdentifierError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Every variant is terminal for the operation that raised it; nothing here is ever
/// downgraded to a warning.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Provider metadata or client information is missing or invalid.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Grant parameters were rejected while building a token request.
	#[error(transparent)]
	RequestBuild(#[from] RequestBuildError),
	/// The HTTP transport failed; the source is preserved untouched.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The token endpoint answered with something that is not a usable token response.
	#[error(transparent)]
	InvalidResponse(#[from] InvalidResponseError),
	/// The token used an algorithm outside the negotiated set.
	#[error(transparent)]
	UnsupportedAlgorithm(#[from] UnsupportedAlgorithmError),
	/// The compact serialization or its payload is structurally invalid.
	#[error(transparent)]
	MalformedToken(#[from] MalformedTokenError),
	/// No key produced a valid signature.
	#[error(transparent)]
	SignatureVerification(#[from] SignatureVerificationError),
	/// A registered or mandatory claim failed validation.
	#[error(transparent)]
	ClaimValidation(#[from] ClaimValidationError),
}

/// Configuration and validation failures raised while constructing metadata or clients.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Discovery metadata lacks required keys.
	#[error("Provider metadata is missing required keys: {}.", .keys.join(", "))]
	MissingMetadata {
		/// Every required key that was absent or empty, in canonical order.
		keys: Vec<&'static str>,
	},
	/// Discovery metadata contains a value of the wrong shape.
	#[error("Provider metadata is invalid at `{}`.", .source.path())]
	InvalidMetadata {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Client identifier failed validation.
	#[error("Client identifier is invalid.")]
	InvalidClientId(#[from] IdentifierError),
	/// Client information declares no redirect URI.
	#[error("Client information must declare at least one redirect URI.")]
	MissingRedirectUri,
	/// A redirect URI cannot be parsed.
	#[error("Redirect URI `{uri}` is invalid.")]
	InvalidRedirect {
		/// Offending value.
		uri: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Redirect URI is not registered for the client.
	#[error("Redirect URI `{uri}` is not registered for this client.")]
	UnregisteredRedirect {
		/// Offending value.
		uri: String,
	},
	/// Client information could not be decoded.
	#[error("Client information is invalid at `{}`.", .source.path())]
	InvalidClient {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Caller mistakes detected while building a token request.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum RequestBuildError {
	/// The same parameter name was supplied more than once.
	#[error("Parameter `{name}` was supplied more than once.")]
	DuplicateParameter {
		/// Repeated parameter name.
		name: String,
	},
	/// The parameter is owned by the builder (grant type or client authentication).
	#[error("Parameter `{name}` is set by the request builder and cannot be supplied.")]
	ReservedParameter {
		/// Reserved parameter name.
		name: String,
	},
	/// A parameter required by the grant is absent or empty.
	#[error("The {grant} grant requires a non-empty `{name}` parameter.")]
	MissingParameter {
		/// Grant identifier.
		grant: String,
		/// Missing parameter name.
		name: &'static str,
	},
	/// Extension grant identifiers must be absolute URIs.
	#[error("Extension grant type `{grant}` must be an absolute URI.")]
	InvalidExtensionGrant {
		/// Rejected identifier.
		grant: String,
	},
	/// Client credentials cannot be carried in a header value.
	#[error("Client credentials produce an invalid Authorization header.")]
	InvalidAuthorizationHeader,
}

/// Transport-level failures surfaced by the HTTP collaborator.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a failure.
	#[error("Network error occurred while calling `{endpoint}`.")]
	Network {
		/// Endpoint the request targeted.
		endpoint: String,
		/// Transport-specific error, unchanged.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific error without reinterpreting it.
	pub fn network(endpoint: impl Into<String>, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { endpoint: endpoint.into(), source: Box::new(src) }
	}
}

/// Token endpoint responses that cannot become a token set.
#[derive(Debug, ThisError)]
pub enum InvalidResponseError {
	/// Response body is not a JSON object.
	#[error("Token endpoint returned malformed JSON.")]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// `access_token` is missing, null, or empty.
	#[error("Token endpoint response is missing a non-empty access_token.")]
	MissingAccessToken,
	/// A typed field carries a value of the wrong type.
	#[error("Token endpoint response field `{field}` is invalid: {reason}.")]
	InvalidField {
		/// Field name.
		field: &'static str,
		/// Human-readable reason.
		reason: &'static str,
	},
	/// Verification was requested but the response carried no ID token.
	#[error("Token endpoint response does not carry an id_token.")]
	MissingIdToken,
	/// Endpoint answered with a standard OAuth error object.
	#[error("Endpoint returned HTTP {status} with OAuth error `{error}`{}.", .description.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
	ErrorResponse {
		/// HTTP status code.
		status: u16,
		/// OAuth `error` code.
		error: String,
		/// OAuth `error_description`, when supplied.
		description: Option<String>,
	},
	/// Endpoint answered with a non-success status and an unrecognized body.
	#[error("Endpoint returned unexpected HTTP {status}: {body_preview}.")]
	UnexpectedStatus {
		/// HTTP status code.
		status: u16,
		/// Truncated response body.
		body_preview: String,
	},
	/// JWKS document cannot be decoded.
	#[error("Key set document is invalid at `{}`.", .source.path())]
	InvalidKeySet {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Authorization redirect carried a `state` other than the one issued.
	#[error("Authorization response state does not match the request.")]
	StateMismatch,
}

/// Algorithm negotiation and allow-list failures.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum UnsupportedAlgorithmError {
	/// The signature verifier collaborator cannot supply an implementation.
	#[error("Algorithm `{algorithm}` is advertised by the provider but has no implementation.")]
	NotImplemented {
		/// Offending algorithm name.
		algorithm: String,
	},
	/// The token header declares an algorithm outside the negotiated allow-list.
	#[error("Algorithm `{algorithm}` is not allowed; expected one of: {}.", .allowed.join(", "))]
	NotAllowed {
		/// Offending algorithm name.
		algorithm: String,
		/// Negotiated allow-list for this token type.
		allowed: Vec<String>,
	},
}

/// Structural problems with a compact serialization.
#[derive(Debug, ThisError)]
pub enum MalformedTokenError {
	/// Token does not split into 3 (JWS) or 5 (JWE) segments.
	#[error("Compact serialization has {segments} segments; expected 3 or 5.")]
	SegmentCount {
		/// Observed segment count.
		segments: usize,
	},
	/// A segment is not valid base64url.
	#[error("Token {segment} segment is not valid base64url.")]
	Encoding {
		/// Segment label.
		segment: &'static str,
		/// Decoder failure.
		#[source]
		source: base64::DecodeError,
	},
	/// Header segment is not a JSON object.
	#[error("Token header is not a JSON object.")]
	Header {
		/// Decoder failure.
		#[source]
		source: serde_json::Error,
	},
	/// Header does not declare `alg`.
	#[error("Token header does not declare an algorithm.")]
	MissingAlgorithm,
	/// Payload segment is not a JSON object.
	#[error("Token payload is not a JSON object.")]
	Payload {
		/// Decoder failure, when the payload was not JSON at all.
		#[source]
		source: Option<serde_json::Error>,
	},
	/// A decrypted JWE did not contain a nested JWS.
	#[error("Encrypted token does not wrap a signed token.")]
	MissingNestedSignature,
	/// The JWE decrypter rejected the token.
	#[error("Encrypted token could not be decrypted with `{algorithm}`.")]
	Decryption {
		/// Key management algorithm.
		algorithm: String,
		/// Collaborator failure.
		#[source]
		source: crate::jose::CryptoError,
	},
}

/// Key selection and signature failures.
#[derive(Debug, ThisError)]
pub enum SignatureVerificationError {
	/// No key in the set is usable for the declared algorithm (and `kid`, when present).
	#[error("No key matches algorithm `{algorithm}`{}.", .kid.as_deref().map(|k| format!(" and kid `{k}`")).unwrap_or_default())]
	NoMatchingKey {
		/// Declared algorithm.
		algorithm: String,
		/// Declared key identifier.
		kid: Option<String>,
	},
	/// Every candidate key rejected the signature.
	#[error("Signature is invalid for algorithm `{algorithm}` after trying {attempts} key(s).")]
	InvalidSignature {
		/// Declared algorithm.
		algorithm: String,
		/// Number of candidate keys tried.
		attempts: usize,
		/// Failure reported for the last candidate.
		#[source]
		source: crate::jose::CryptoError,
	},
}

/// A claim check failed; carries the claim name.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Claim `{claim}` failed validation: {violation}.")]
pub struct ClaimValidationError {
	/// Offending claim name.
	pub claim: String,
	/// What went wrong.
	pub violation: ClaimViolation,
}
impl ClaimValidationError {
	pub(crate) fn new(claim: impl Into<String>, violation: ClaimViolation) -> Self {
		Self { claim: claim.into(), violation }
	}
}

/// Reasons a claim can fail validation.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ClaimViolation {
	/// Claim is absent or null.
	#[error("missing")]
	Missing,
	/// Claim is present but empty.
	#[error("empty")]
	Empty,
	/// Claim has the wrong JSON type.
	#[error("expected {expected}")]
	InvalidType {
		/// Expected JSON shape.
		expected: &'static str,
	},
	/// Claim does not carry the expected value.
	#[error("expected `{expected}`, found `{found}`")]
	Mismatch {
		/// Expected value.
		expected: String,
		/// Observed value.
		found: String,
	},
	/// Audience list does not include the client.
	#[error("`{client_id}` is not among the audiences")]
	AudienceNotIncluded {
		/// Configured client identifier.
		client_id: String,
	},
	/// The token expired.
	#[error("expired at {expired_at}")]
	Expired {
		/// Expiry instant.
		expired_at: OffsetDateTime,
	},
	/// The timestamp lies in the future beyond the allowed skew.
	#[error("{at} is in the future")]
	InFuture {
		/// Offending instant.
		at: OffsetDateTime,
	},
	/// The token was issued after it expired.
	#[error("issued after expiry")]
	IssuedAfterExpiry,
	/// End-user authentication is older than the requested maximum age.
	#[error("authentication at {authenticated_at} exceeds the maximum age")]
	AuthenticationTooOld {
		/// Authentication instant.
		authenticated_at: OffsetDateTime,
	},
}

/// Extension lookup targeted one of the typed token response fields.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Field `{field}` has a typed accessor and cannot be read as an extension value.")]
pub struct ReservedFieldError {
	/// Rejected field name.
	pub field: String,
}
