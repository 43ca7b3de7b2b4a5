//! ID token verification pipeline.
//!
//! Verification moves through typestates: [`Unverified`] (parsed, outer layer unwrapped) to
//! [`SignatureChecked`] (algorithm allowed, signature valid) to [`ClaimsChecked`] (payload
//! decoded, claims validated). Any step may fail, which ends the pipeline with the matching
//! [`Error`] variant.

// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	auth::{ClientId, TokenSecret},
	error::{
		ClaimValidationError, ClaimViolation, MalformedTokenError, SignatureVerificationError,
		UnsupportedAlgorithmError,
	},
	jose::{
		Claims, CompactJws, CompactToken, CryptoError, Jwk, KeySet, NegotiatedAlgorithms,
		SignatureVerifier, claims::numeric_date, negotiate,
	},
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	provider::{ClientInformation, ProviderMetadata},
};

const DEFAULT_CLOCK_SKEW: Duration = Duration::seconds(60);

/// Per-call verification knobs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationOptions {
	clock_skew: Duration,
	mandatory_claims: Vec<String>,
	nonce: Option<String>,
	max_age: Option<Duration>,
	now: Option<OffsetDateTime>,
}
impl VerificationOptions {
	/// Tolerance applied to `exp`, `iat`, and `auth_time` comparisons.
	pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
		self.clock_skew = clock_skew;

		self
	}

	/// Extra claims that must be present. Names of registered claims add nothing beyond presence.
	pub fn with_mandatory_claims<I, S>(mut self, claims: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.mandatory_claims.extend(claims.into_iter().map(Into::into));

		self
	}

	/// Nonce sent in the authorization request; the `nonce` claim must equal it.
	pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
		self.nonce = Some(nonce.into());

		self
	}

	/// Maximum authentication age requested via `max_age`; requires `auth_time`.
	pub fn with_max_age(mut self, max_age: Duration) -> Self {
		self.max_age = Some(max_age);

		self
	}

	/// Pins the verification instant instead of reading the system clock.
	pub fn with_now(mut self, now: OffsetDateTime) -> Self {
		self.now = Some(now);

		self
	}

	/// Configured clock skew.
	pub fn clock_skew(&self) -> Duration {
		self.clock_skew
	}

	/// Caller-supplied mandatory claim names.
	pub fn mandatory_claims(&self) -> &[String] {
		&self.mandatory_claims
	}

	/// Expected nonce.
	pub fn nonce(&self) -> Option<&str> {
		self.nonce.as_deref()
	}

	/// Requested maximum authentication age.
	pub fn max_age(&self) -> Option<Duration> {
		self.max_age
	}

	fn now(&self) -> OffsetDateTime {
		self.now.unwrap_or_else(OffsetDateTime::now_utc)
	}
}
impl Default for VerificationOptions {
	fn default() -> Self {
		Self {
			clock_skew: DEFAULT_CLOCK_SKEW,
			mandatory_claims: Vec::new(),
			nonce: None,
			max_age: None,
			now: None,
		}
	}
}

/// Verifies ID tokens issued by one provider for one client.
///
/// Construction negotiates algorithms eagerly, so an unsupported provider configuration is
/// reported before any token is seen. The verifier holds no mutable state and can be shared.
#[derive(Clone, Debug)]
pub struct IdTokenVerifier {
	issuer: String,
	client_id: ClientId,
	client_secret: Option<TokenSecret>,
	algorithms: NegotiatedAlgorithms,
}
impl IdTokenVerifier {
	/// Negotiates algorithms for the provider and binds the client.
	pub fn new(
		metadata: &ProviderMetadata,
		client: &ClientInformation,
		verifier: &dyn SignatureVerifier,
	) -> Result<Self, UnsupportedAlgorithmError> {
		let algorithms = negotiate(metadata, verifier)?;

		Ok(Self {
			issuer: metadata.issuer().to_owned(),
			client_id: client.client_id().clone(),
			client_secret: client.client_secret().cloned(),
			algorithms,
		})
	}

	/// Negotiated allow-list and policy.
	pub fn algorithms(&self) -> &NegotiatedAlgorithms {
		&self.algorithms
	}

	/// Runs the full pipeline and returns the claims snapshot.
	pub fn verify(
		&self,
		token: &str,
		keys: &KeySet,
		options: &VerificationOptions,
	) -> Result<Claims> {
		const KIND: OperationKind = OperationKind::VerifyIdToken;

		let _guard = OperationSpan::new(KIND, "verify").entered();

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

		let result = Unverified::parse(self, token)
			.and_then(|unverified| unverified.check_signature(keys))
			.and_then(|checked| checked.check_claims(options))
			.map(ClaimsChecked::into_claims);

		if let Err(e) = &result {
			obs::trace_rejection("verify", e);
		}

		obs::record_operation_outcome(KIND, OperationOutcome::of(&result));

		result
	}
}

/// A parsed signed token whose outer encryption layer, if any, has been removed.
#[derive(Debug)]
pub struct Unverified<'a> {
	verifier: &'a IdTokenVerifier,
	jws: CompactJws,
}
impl<'a> Unverified<'a> {
	/// Parses a compact token and unwraps a JWE layer when the policy admits one.
	pub fn parse(verifier: &'a IdTokenVerifier, token: &str) -> Result<Self> {
		let jws = match CompactToken::parse(token)? {
			CompactToken::Signed(jws) => jws,
			CompactToken::Encrypted(jwe) => {
				let algorithm = jwe.header().alg.as_str();
				let decrypter = verifier.algorithms.allow_encryption(algorithm)?;
				let plaintext = decrypter.decrypt(&jwe).map_err(|source| {
					MalformedTokenError::Decryption { algorithm: algorithm.to_owned(), source }
				})?;
				let nested = std::str::from_utf8(&plaintext)
					.map_err(|_| MalformedTokenError::MissingNestedSignature)?;

				match CompactToken::parse(nested.trim())? {
					CompactToken::Signed(jws) => jws,
					CompactToken::Encrypted(_) =>
						return Err(MalformedTokenError::MissingNestedSignature.into()),
				}
			},
		};

		Ok(Self { verifier, jws })
	}

	/// Checks the algorithm allow-list, selects keys, and verifies the signature.
	pub fn check_signature(self, keys: &KeySet) -> Result<SignatureChecked<'a>> {
		let header = self.jws.header();
		let algorithm = header.alg.as_str();
		// Allow-list first; no key is touched for a disallowed algorithm.
		let implementation = self.verifier.algorithms.allow_signing(algorithm)?;
		let kid = header.kid.as_deref();
		let mut candidates = keys.candidates(algorithm, kid).cloned().collect::<Vec<_>>();

		if algorithm.starts_with("HS")
			&& let Some(secret) = &self.verifier.client_secret
		{
			candidates.push(Jwk::symmetric(secret.expose().as_bytes()));
		}
		if candidates.is_empty() {
			return Err(SignatureVerificationError::NoMatchingKey {
				algorithm: algorithm.to_owned(),
				kid: kid.map(str::to_owned),
			}
			.into());
		}

		let attempts = candidates.len();
		let mut last_error = CryptoError::new("No candidate key was tried.");

		for key in &candidates {
			match implementation.verify(key, self.jws.signing_input(), self.jws.signature()) {
				Ok(()) => return Ok(SignatureChecked { verifier: self.verifier, jws: self.jws }),
				Err(e) => last_error = e,
			}
		}

		Err(SignatureVerificationError::InvalidSignature {
			algorithm: algorithm.to_owned(),
			attempts,
			source: last_error,
		}
		.into())
	}
}

/// A token whose signature has been verified.
#[derive(Debug)]
pub struct SignatureChecked<'a> {
	verifier: &'a IdTokenVerifier,
	jws: CompactJws,
}
impl SignatureChecked<'_> {
	/// Decodes the payload and runs the claim checks in their fixed order.
	pub fn check_claims(self, options: &VerificationOptions) -> Result<ClaimsChecked> {
		let claims = match serde_json::from_slice::<Value>(self.jws.payload()) {
			Ok(Value::Object(claims)) => claims,
			Ok(_) => Err(MalformedTokenError::Payload { source: None })?,
			Err(e) => Err(MalformedTokenError::Payload { source: Some(e) })?,
		};

		ClaimRules { verifier: self.verifier, options, claims: &claims, now: options.now() }
			.check()?;

		Ok(ClaimsChecked { claims: Claims::new(claims) })
	}
}

/// Terminal success state.
#[derive(Debug)]
pub struct ClaimsChecked {
	claims: Claims,
}
impl ClaimsChecked {
	/// Releases the immutable claims snapshot.
	pub fn into_claims(self) -> Claims {
		self.claims
	}
}

struct ClaimRules<'a> {
	verifier: &'a IdTokenVerifier,
	options: &'a VerificationOptions,
	claims: &'a Map<String, Value>,
	now: OffsetDateTime,
}
impl ClaimRules<'_> {
	fn check(&self) -> Result<(), ClaimValidationError> {
		let skew = self.options.clock_skew;
		let client_id = self.verifier.client_id.as_str();
		let issuer = self.string("iss")?;

		if issuer != self.verifier.issuer {
			return Err(mismatch("iss", &self.verifier.issuer, issuer));
		}
		if self.string("sub")?.is_empty() {
			return Err(ClaimValidationError::new("sub", ClaimViolation::Empty));
		}

		self.check_audience(client_id)?;

		if let Some(azp) = self.optional("azp") {
			let azp = azp.as_str().ok_or_else(|| invalid_type("azp", "string"))?;

			if azp != client_id {
				return Err(mismatch("azp", client_id, azp));
			}
		}

		// An adjusted instant outside the representable range can never cross `now`.
		let expired_at = self.instant("exp")?;

		if expired_at.checked_add(skew).is_some_and(|deadline| deadline <= self.now) {
			return Err(ClaimValidationError::new("exp", ClaimViolation::Expired { expired_at }));
		}

		let issued_at = self.instant("iat")?;

		if issued_at.checked_sub(skew).is_some_and(|earliest| earliest > self.now) {
			return Err(ClaimValidationError::new("iat", ClaimViolation::InFuture { at: issued_at }));
		}
		if issued_at > expired_at {
			return Err(ClaimValidationError::new("iat", ClaimViolation::IssuedAfterExpiry));
		}
		if let Some(max_age) = self.options.max_age {
			let authenticated_at = self.instant("auth_time")?;
			let latest = authenticated_at
				.checked_add(max_age)
				.and_then(|instant| instant.checked_add(skew));

			if latest.is_some_and(|latest| latest < self.now) {
				return Err(ClaimValidationError::new(
					"auth_time",
					ClaimViolation::AuthenticationTooOld { authenticated_at },
				));
			}
		}
		if let Some(expected) = self.options.nonce() {
			let nonce = self.string("nonce")?;

			if nonce != expected {
				return Err(mismatch("nonce", expected, nonce));
			}
		}

		for name in &self.options.mandatory_claims {
			if self.optional(name).is_none() {
				return Err(ClaimValidationError::new(name.as_str(), ClaimViolation::Missing));
			}
		}

		Ok(())
	}

	fn check_audience(&self, client_id: &str) -> Result<(), ClaimValidationError> {
		const EXPECTED: &str = "string or array of strings";

		let audiences = match self.required("aud")? {
			Value::String(aud) => vec![aud.as_str()],
			Value::Array(items) => items
				.iter()
				.map(|item| item.as_str().ok_or_else(|| invalid_type("aud", EXPECTED)))
				.collect::<Result<Vec<_>, _>>()?,
			_ => return Err(invalid_type("aud", EXPECTED)),
		};

		if audiences.contains(&client_id) {
			Ok(())
		} else {
			Err(ClaimValidationError::new("aud", ClaimViolation::AudienceNotIncluded {
				client_id: client_id.to_owned(),
			}))
		}
	}

	fn optional(&self, name: &str) -> Option<&Value> {
		self.claims.get(name).filter(|value| !value.is_null())
	}

	fn required(&self, name: &'static str) -> Result<&Value, ClaimValidationError> {
		self.optional(name).ok_or_else(|| ClaimValidationError::new(name, ClaimViolation::Missing))
	}

	fn string(&self, name: &'static str) -> Result<&str, ClaimValidationError> {
		self.required(name)?.as_str().ok_or_else(|| invalid_type(name, "string"))
	}

	fn instant(&self, name: &'static str) -> Result<OffsetDateTime, ClaimValidationError> {
		numeric_date(self.required(name)?).ok_or_else(|| invalid_type(name, "numeric date"))
	}
}

fn mismatch(claim: &'static str, expected: &str, found: &str) -> ClaimValidationError {
	ClaimValidationError::new(claim, ClaimViolation::Mismatch {
		expected: expected.to_owned(),
		found: found.to_owned(),
	})
}

fn invalid_type(claim: &'static str, expected: &'static str) -> ClaimValidationError {
	ClaimValidationError::new(claim, ClaimViolation::InvalidType { expected })
}
