//! [`SignatureVerifier`] backed by the `jsonwebtoken` crate.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, jwk::Jwk as BackendJwk};
// self
use crate::{
	_prelude::*,
	jose::{CryptoError, Jwk, JwsVerifier, SignatureVerifier},
};

/// Signature verifier for the RS*, PS*, ES256/ES384, HS*, and EdDSA families.
///
/// Encryption is not supported; providers advertising ID token encryption need a custom
/// [`SignatureVerifier`] that also hands out decrypters.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonWebTokenVerifier;
impl SignatureVerifier for JsonWebTokenVerifier {
	fn jws_verifier(&self, algorithm: &str) -> Option<Arc<dyn JwsVerifier>> {
		let backend = Algorithm::from_str(algorithm).ok()?;

		Some(Arc::new(BackendAlgorithm { name: algorithm.to_owned(), backend }))
	}
}

#[derive(Debug)]
struct BackendAlgorithm {
	name: String,
	backend: Algorithm,
}
impl JwsVerifier for BackendAlgorithm {
	fn algorithm(&self) -> &str {
		&self.name
	}

	fn verify(&self, key: &Jwk, signing_input: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
		let key = decoding_key(key)?;
		let signature = URL_SAFE_NO_PAD.encode(signature);

		match jsonwebtoken::crypto::verify(&signature, signing_input, &key, self.backend) {
			Ok(true) => Ok(()),
			Ok(false) => Err(CryptoError::new(format!("{} signature does not match.", self.name))),
			Err(e) => Err(CryptoError::with_source(format!("{} verification failed.", self.name), e)),
		}
	}
}

fn decoding_key(key: &Jwk) -> Result<DecodingKey, CryptoError> {
	if key.kty() == "oct" {
		let secret = key
			.param("k")
			.ok_or_else(|| CryptoError::new("Symmetric key has no `k` member."))?;
		let secret = URL_SAFE_NO_PAD
			.decode(secret)
			.map_err(|e| CryptoError::with_source("Symmetric key is not base64url.", e))?;

		return Ok(DecodingKey::from_secret(&secret));
	}

	let value = serde_json::to_value(key)
		.map_err(|e| CryptoError::with_source("Key could not be serialized.", e))?;
	let jwk = serde_json::from_value::<BackendJwk>(value)
		.map_err(|e| CryptoError::with_source("Key is not a supported JWK.", e))?;

	DecodingKey::from_jwk(&jwk).map_err(|e| CryptoError::with_source("Key material is invalid.", e))
}

#[cfg(test)]
mod tests {
	// crates.io
	use jsonwebtoken::{EncodingKey, Header};
	use serde_json::json;
	// self
	use super::*;
	use crate::{
		_preludet::*,
		error::SignatureVerificationError,
		jose::{IdTokenVerifier, KeySet, VerificationOptions},
		provider::ProviderMetadata,
	};

	fn hs256_token(secret: &[u8]) -> String {
		let key = EncodingKey::from_secret(secret);

		jsonwebtoken::encode(&Header::new(Algorithm::HS256), &valid_claims(), &key)
			.expect("Token should encode.")
	}

	fn hs256_verifier() -> IdTokenVerifier {
		let mut raw = metadata_json();

		raw.insert("id_token_signing_alg_values_supported".into(), json!(["HS256"]));

		let metadata = ProviderMetadata::from_map(raw).expect("Metadata should be valid.");

		IdTokenVerifier::new(&metadata, &confidential_client(), &JsonWebTokenVerifier)
			.expect("HS256 should negotiate.")
	}

	#[test]
	fn common_algorithms_are_available() {
		for algorithm in ["RS256", "PS384", "ES256", "HS512", "EdDSA"] {
			assert!(JsonWebTokenVerifier.jws_verifier(algorithm).is_some(), "{algorithm} is missing.");
		}

		assert!(JsonWebTokenVerifier.jws_verifier("none").is_none());
		assert!(JsonWebTokenVerifier.jwe_decrypter("RSA-OAEP").is_none());
	}

	#[test]
	fn client_secret_verifies_hs256_tokens() {
		let claims = hs256_verifier()
			.verify(
				&hs256_token(CLIENT_SECRET.as_bytes()),
				&KeySet::default(),
				&VerificationOptions::default(),
			)
			.expect("Token signed with the client secret should verify.");

		assert_eq!(claims.subject(), Some("user-1"));
	}

	#[test]
	fn foreign_secrets_fail_signature_verification() {
		let err = hs256_verifier()
			.verify(&hs256_token(b"other"), &KeySet::default(), &VerificationOptions::default())
			.expect_err("Token signed with another secret must fail.");

		assert!(matches!(
			err,
			Error::SignatureVerification(SignatureVerificationError::InvalidSignature { .. })
		));
	}
}
