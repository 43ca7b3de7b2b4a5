//! Token endpoint responses.

// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	auth::{ScopeList, TokenSecret},
	error::{InvalidResponseError, ReservedFieldError},
	jose::{Claims, IdTokenVerifier, KeySet, VerificationOptions},
};

/// Response fields with typed accessors; extension lookups reject these names.
pub const TYPED_FIELDS: [&str; 5] = ["access_token", "expires_in", "id_token", "refresh_token", "scope"];

/// Parsed token endpoint response.
///
/// The five typed fields are validated at construction. Every other member, `token_type`
/// included, is kept verbatim in the extension map. Once the ID token verifies, the claims are
/// memoized for the lifetime of the instance; failures are not, so a caller can retry with a
/// refreshed key set.
pub struct TokenSet {
	access_token: TokenSecret,
	expires_in: Option<Duration>,
	id_token: Option<String>,
	refresh_token: Option<TokenSecret>,
	scope: Option<ScopeList>,
	extensions: Map<String, Value>,
	verified: Mutex<Option<Claims>>,
}
impl TokenSet {
	/// Validates a decoded response object.
	pub fn from_map(mut raw: Map<String, Value>) -> Result<Self, InvalidResponseError> {
		let access_token = match take(&mut raw, "access_token") {
			None => return Err(InvalidResponseError::MissingAccessToken),
			Some(Value::String(token)) if token.is_empty() =>
				return Err(InvalidResponseError::MissingAccessToken),
			Some(Value::String(token)) => TokenSecret::new(token),
			Some(_) => return Err(invalid("access_token", "expected a string")),
		};
		let expires_in = take(&mut raw, "expires_in").map(parse_expires_in).transpose()?;
		let id_token = take(&mut raw, "id_token").map(|v| string_field("id_token", v)).transpose()?;
		let refresh_token = take(&mut raw, "refresh_token")
			.map(|v| string_field("refresh_token", v).map(TokenSecret::new))
			.transpose()?;
		let scope = take(&mut raw, "scope")
			.map(|v| {
				serde_json::from_value::<ScopeList>(v)
					.map_err(|_| invalid("scope", "expected a string or an array of strings"))
			})
			.transpose()?;

		Ok(Self {
			access_token,
			expires_in,
			id_token,
			refresh_token,
			scope,
			extensions: raw,
			verified: Mutex::new(None),
		})
	}

	/// Decodes and validates a raw response body.
	pub fn from_slice(bytes: &[u8]) -> Result<Self, InvalidResponseError> {
		let mut de = serde_json::Deserializer::from_slice(bytes);
		let raw = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| InvalidResponseError::Parse { source })?;

		Self::from_map(raw)
	}

	/// Access token.
	pub fn access_token(&self) -> &TokenSecret {
		&self.access_token
	}

	/// `token_type` as sent by the provider (usually `Bearer`).
	pub fn token_type(&self) -> Option<&str> {
		self.extensions.get("token_type").and_then(Value::as_str)
	}

	/// Lifetime of the access token.
	pub fn expires_in(&self) -> Option<Duration> {
		self.expires_in
	}

	/// Compact-serialized ID token.
	pub fn id_token(&self) -> Option<&str> {
		self.id_token.as_deref()
	}

	/// Refresh token.
	pub fn refresh_token(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref()
	}

	/// Granted scopes.
	pub fn scope(&self) -> Option<&ScopeList> {
		self.scope.as_ref()
	}

	/// Returns true when the response carried a non-null value for `key`.
	pub fn has(&self, key: &str) -> bool {
		match key {
			"access_token" => true,
			"expires_in" => self.expires_in.is_some(),
			"id_token" => self.id_token.is_some(),
			"refresh_token" => self.refresh_token.is_some(),
			"scope" => self.scope.is_some(),
			_ => self.extension(key).is_some(),
		}
	}

	/// Reads an extension field.
	pub fn value(&self, key: &str) -> Result<Option<&Value>, ReservedFieldError> {
		ensure_extension_key(key)?;

		Ok(self.extension(key))
	}

	/// Reads an extension field, falling back to `default` when absent.
	pub fn value_or<'a>(
		&'a self,
		key: &str,
		default: &'a Value,
	) -> Result<&'a Value, ReservedFieldError> {
		Ok(self.value(key)?.unwrap_or(default))
	}

	/// Every extension field, in response order.
	pub fn extensions(&self) -> &Map<String, Value> {
		&self.extensions
	}

	/// Verifies the ID token once and returns the memoized claims on later calls.
	///
	/// The memo lock is held for the whole verification, so concurrent callers wait for the
	/// first one instead of verifying again. Options only matter for the call that verifies.
	pub fn verify_id_token(
		&self,
		verifier: &IdTokenVerifier,
		keys: &KeySet,
		options: &VerificationOptions,
	) -> Result<Claims> {
		let mut memo = self.verified.lock();

		if let Some(claims) = memo.as_ref() {
			return Ok(claims.clone());
		}

		let token = self.id_token.as_deref().ok_or(InvalidResponseError::MissingIdToken)?;
		let claims = verifier.verify(token, keys, options)?;

		*memo = Some(claims.clone());

		Ok(claims)
	}

	/// Claims memoized by a previous successful verification.
	pub fn verified_claims(&self) -> Option<Claims> {
		self.verified.lock().clone()
	}

	fn extension(&self, key: &str) -> Option<&Value> {
		self.extensions.get(key).filter(|value| !value.is_null())
	}
}
impl Debug for TokenSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenSet")
			.field("access_token", &self.access_token)
			.field("token_type", &self.token_type())
			.field("expires_in", &self.expires_in)
			.field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_token", &self.refresh_token)
			.field("scope", &self.scope)
			.field("verified", &self.verified.lock().is_some())
			.finish_non_exhaustive()
	}
}
impl TryFrom<Map<String, Value>> for TokenSet {
	type Error = InvalidResponseError;

	fn try_from(raw: Map<String, Value>) -> Result<Self, Self::Error> {
		Self::from_map(raw)
	}
}

fn take(raw: &mut Map<String, Value>, key: &str) -> Option<Value> {
	raw.remove(key).filter(|value| !value.is_null())
}

fn invalid(field: &'static str, reason: &'static str) -> InvalidResponseError {
	InvalidResponseError::InvalidField { field, reason }
}

fn string_field(field: &'static str, value: Value) -> Result<String, InvalidResponseError> {
	match value {
		Value::String(value) => Ok(value),
		_ => Err(invalid(field, "expected a string")),
	}
}

fn parse_expires_in(value: Value) -> Result<Duration, InvalidResponseError> {
	// Some providers send the lifetime as a numeric string.
	let seconds = match &value {
		Value::Number(number) => number.as_i64(),
		Value::String(text) => text.trim().parse().ok(),
		_ => None,
	};

	seconds
		.filter(|seconds| *seconds >= 0)
		.map(Duration::seconds)
		.ok_or_else(|| invalid("expires_in", "expected non-negative integer seconds"))
}

fn ensure_extension_key(key: &str) -> Result<(), ReservedFieldError> {
	if TYPED_FIELDS.contains(&key) {
		return Err(ReservedFieldError { field: key.to_owned() });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// std
	use std::thread;
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::{_preludet::*, error::SignatureVerificationError};

	fn token_set(value: Value) -> Result<TokenSet, InvalidResponseError> {
		let Value::Object(raw) = value else { panic!("Response fixture must be an object.") };

		TokenSet::from_map(raw)
	}

	fn with_id_token(signature: &[u8]) -> TokenSet {
		let id_token = compact_token(&json!({ "alg": "RS256", "kid": "k1" }), &valid_claims(), signature);

		token_set(json!({ "access_token": "at", "token_type": "Bearer", "id_token": id_token }))
			.expect("Response should be valid.")
	}

	fn verifier(collaborator: &CountingVerifier) -> IdTokenVerifier {
		IdTokenVerifier::new(&metadata_fixture(), &confidential_client(), collaborator)
			.expect("Verifier should negotiate.")
	}

	#[test]
	fn access_token_must_be_present_and_non_empty() {
		for response in [json!({}), json!({ "access_token": "" }), json!({ "access_token": null })] {
			assert!(matches!(token_set(response), Err(InvalidResponseError::MissingAccessToken)));
		}

		assert!(matches!(
			token_set(json!({ "access_token": 7 })),
			Err(InvalidResponseError::InvalidField { field: "access_token", .. })
		));
		assert!(matches!(
			TokenSet::from_slice(b"not json"),
			Err(InvalidResponseError::Parse { .. })
		));
	}

	#[test]
	fn scope_accepts_strings_and_sequences() {
		let split = token_set(json!({ "access_token": "at", "scope": "a b c" }))
			.expect("Response should be valid.");
		let kept = token_set(json!({ "access_token": "at", "scope": ["a", "b"] }))
			.expect("Response should be valid.");
		let absent = token_set(json!({ "access_token": "at" })).expect("Response should be valid.");

		assert_eq!(split.scope().map(ScopeList::as_slice), Some(&["a", "b", "c"].map(String::from)[..]));
		assert_eq!(kept.scope().map(ScopeList::as_slice), Some(&["a", "b"].map(String::from)[..]));
		assert!(absent.scope().is_none());
		assert!(matches!(
			token_set(json!({ "access_token": "at", "scope": 5 })),
			Err(InvalidResponseError::InvalidField { field: "scope", .. })
		));
	}

	#[test]
	fn typed_fields_and_extensions_are_separated() {
		let tokens = token_set(json!({
			"access_token": "at",
			"token_type": "Bearer",
			"expires_in": "3600",
			"refresh_token": "rt",
			"session_state": "s1",
			"custom": null,
		}))
		.expect("Response should be valid.");

		assert_eq!(tokens.access_token().expose(), "at");
		assert_eq!(tokens.token_type(), Some("Bearer"));
		assert_eq!(tokens.expires_in(), Some(Duration::hours(1)));
		assert_eq!(tokens.refresh_token().map(TokenSecret::expose), Some("rt"));
		assert_eq!(tokens.value("session_state"), Ok(Some(&json!("s1"))));
		assert_eq!(tokens.value_or("missing", &json!(0)), Ok(&json!(0)));
		assert!(!tokens.has("custom"));
		assert!(!tokens.has("id_token"));
		assert!(tokens.has("refresh_token"));

		for field in TYPED_FIELDS {
			assert_eq!(tokens.value(field), Err(ReservedFieldError { field: field.into() }));
		}
	}

	#[test]
	fn invalid_typed_fields_are_rejected() {
		assert!(matches!(
			token_set(json!({ "access_token": "at", "expires_in": -5 })),
			Err(InvalidResponseError::InvalidField { field: "expires_in", .. })
		));
		assert!(matches!(
			token_set(json!({ "access_token": "at", "id_token": {} })),
			Err(InvalidResponseError::InvalidField { field: "id_token", .. })
		));
	}

	#[test]
	fn verification_is_memoized_after_success() {
		let collaborator = CountingVerifier::default();
		let verifier = verifier(&collaborator);
		let tokens = with_id_token(GOOD_SIGNATURE);
		let options = VerificationOptions::default();
		let first = tokens
			.verify_id_token(&verifier, &key_set_fixture(), &options)
			.expect("First verification should succeed.");
		let second = tokens
			.verify_id_token(&verifier, &key_set_fixture(), &options)
			.expect("Second verification should succeed.");

		assert!(Claims::ptr_eq(&first, &second));
		assert_eq!(collaborator.calls(), 1);
		assert!(tokens.verified_claims().is_some());
	}

	#[test]
	fn failures_are_not_memoized() {
		let collaborator = CountingVerifier::default();
		let verifier = verifier(&collaborator);
		let tokens = with_id_token(b"forged");
		let options = VerificationOptions::default();

		for _ in 0..2 {
			assert!(matches!(
				tokens.verify_id_token(&verifier, &key_set_fixture(), &options),
				Err(Error::SignatureVerification(SignatureVerificationError::InvalidSignature {
					..
				}))
			));
		}

		assert_eq!(collaborator.calls(), 2);
		assert!(tokens.verified_claims().is_none());
	}

	#[test]
	fn concurrent_callers_verify_once() {
		let collaborator = CountingVerifier::default();
		let verifier = verifier(&collaborator);
		let tokens = with_id_token(GOOD_SIGNATURE);
		let keys = key_set_fixture();
		let options = VerificationOptions::default();

		thread::scope(|scope| {
			for _ in 0..8 {
				scope.spawn(|| {
					tokens
						.verify_id_token(&verifier, &keys, &options)
						.expect("Concurrent verification should succeed.");
				});
			}
		});

		assert_eq!(collaborator.calls(), 1);
	}

	#[test]
	fn missing_id_tokens_are_reported() {
		let collaborator = CountingVerifier::default();
		let tokens = token_set(json!({ "access_token": "at" })).expect("Response should be valid.");

		assert!(matches!(
			tokens.verify_id_token(&verifier(&collaborator), &KeySet::default(), &Default::default()),
			Err(Error::InvalidResponse(InvalidResponseError::MissingIdToken))
		));
		assert!(!format!("{tokens:?}").contains("\"at\""));
	}
}
