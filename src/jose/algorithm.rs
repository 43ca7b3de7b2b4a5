//! Cryptographic collaborator seam and algorithm negotiation.

// self
use crate::{
	_prelude::*,
	error::{BoxError, UnsupportedAlgorithmError},
	jose::{CompactJwe, Jwk},
	provider::ProviderMetadata,
};

/// Failure reported by a cryptographic collaborator.
#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct CryptoError {
	message: String,
	#[source]
	source: Option<BoxError>,
}
impl CryptoError {
	/// Creates an error with a human-readable message.
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into(), source: None }
	}

	/// Creates an error that keeps the backend's own error as its source.
	pub fn with_source(
		message: impl Into<String>,
		source: impl 'static + Send + Sync + StdError,
	) -> Self {
		Self { message: message.into(), source: Some(Box::new(source)) }
	}
}

/// Verifies JWS signatures for one algorithm.
pub trait JwsVerifier: Send + Sync {
	/// JOSE algorithm name (`RS256`, `ES256`, ...).
	fn algorithm(&self) -> &str;

	/// Checks `signature` over `signing_input` with `key`.
	fn verify(&self, key: &Jwk, signing_input: &[u8], signature: &[u8]) -> Result<(), CryptoError>;
}

/// Decrypts JWE tokens for one key management algorithm.
///
/// Implementations own the relying party's decryption keys; the provider's key set only carries
/// verification keys.
pub trait JweDecrypter: Send + Sync {
	/// JOSE key management algorithm name (`RSA-OAEP`, `ECDH-ES`, ...).
	fn algorithm(&self) -> &str;

	/// Returns the plaintext, which for ID tokens is a nested compact JWS.
	fn decrypt(&self, token: &CompactJwe) -> Result<Vec<u8>, CryptoError>;
}

/// Factory the negotiator asks for algorithm implementations.
pub trait SignatureVerifier: Send + Sync {
	/// Returns a verifier for the signing algorithm, if supported.
	fn jws_verifier(&self, algorithm: &str) -> Option<Arc<dyn JwsVerifier>>;

	/// Returns a decrypter for the key management algorithm, if supported.
	fn jwe_decrypter(&self, algorithm: &str) -> Option<Arc<dyn JweDecrypter>> {
		let _ = algorithm;

		None
	}
}

/// Token formats the verifier accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenTypePolicy {
	/// Only compact JWS.
	SignedOnly,
	/// Compact JWS, or compact JWE wrapping a JWS.
	SignedOrEncrypted,
}
impl TokenTypePolicy {
	/// Returns true when five-segment tokens are admitted.
	pub fn admits_encrypted(self) -> bool {
		matches!(self, TokenTypePolicy::SignedOrEncrypted)
	}
}

/// Allow-list and implementations produced by [`negotiate`].
#[derive(Clone)]
pub struct NegotiatedAlgorithms {
	signing: Vec<(String, Arc<dyn JwsVerifier>)>,
	encryption: Vec<(String, Arc<dyn JweDecrypter>)>,
	policy: TokenTypePolicy,
}
impl NegotiatedAlgorithms {
	/// Signing algorithms a JWS header may declare.
	pub fn signing_algorithms(&self) -> Vec<&str> {
		self.signing.iter().map(|(name, _)| name.as_str()).collect()
	}

	/// Key management algorithms a JWE header may declare.
	pub fn encryption_algorithms(&self) -> Vec<&str> {
		self.encryption.iter().map(|(name, _)| name.as_str()).collect()
	}

	/// Token formats admitted by the provider's configuration.
	pub fn policy(&self) -> TokenTypePolicy {
		self.policy
	}

	/// Verifier bound to an allowed signing algorithm.
	pub fn jws_verifier(&self, algorithm: &str) -> Option<&Arc<dyn JwsVerifier>> {
		self.signing.iter().find(|(name, _)| name == algorithm).map(|(_, verifier)| verifier)
	}

	/// Decrypter bound to an allowed key management algorithm.
	pub fn jwe_decrypter(&self, algorithm: &str) -> Option<&Arc<dyn JweDecrypter>> {
		self.encryption.iter().find(|(name, _)| name == algorithm).map(|(_, decrypter)| decrypter)
	}

	pub(crate) fn allow_signing(&self, algorithm: &str) -> Result<&Arc<dyn JwsVerifier>, Error> {
		self.jws_verifier(algorithm).ok_or_else(|| {
			UnsupportedAlgorithmError::NotAllowed {
				algorithm: algorithm.to_owned(),
				allowed: self.signing.iter().map(|(name, _)| name.clone()).collect(),
			}
			.into()
		})
	}

	pub(crate) fn allow_encryption(&self, algorithm: &str) -> Result<&Arc<dyn JweDecrypter>, Error> {
		self.jwe_decrypter(algorithm).filter(|_| self.policy.admits_encrypted()).ok_or_else(|| {
			UnsupportedAlgorithmError::NotAllowed {
				algorithm: algorithm.to_owned(),
				allowed: self.encryption.iter().map(|(name, _)| name.clone()).collect(),
			}
			.into()
		})
	}
}
impl Debug for NegotiatedAlgorithms {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("NegotiatedAlgorithms")
			.field("signing", &self.signing_algorithms())
			.field("encryption", &self.encryption_algorithms())
			.field("policy", &self.policy)
			.finish()
	}
}

/// Binds every advertised ID token algorithm to an implementation.
///
/// Signing algorithms need a [`JwsVerifier`]; algorithms advertised only for encryption need a
/// [`JweDecrypter`]. The unsecured `none` algorithm is never negotiated.
pub fn negotiate(
	metadata: &ProviderMetadata,
	verifier: &dyn SignatureVerifier,
) -> Result<NegotiatedAlgorithms, UnsupportedAlgorithmError> {
	let signing_names = metadata.id_token_signing_alg_values_supported();
	let mut signing = Vec::new();
	let mut encryption = Vec::new();

	for algorithm in metadata.id_token_alg_values_supported() {
		if algorithm == "none" {
			continue;
		}

		let not_implemented =
			|| UnsupportedAlgorithmError::NotImplemented { algorithm: algorithm.to_owned() };

		if signing_names.iter().any(|name| name == algorithm) {
			let implementation = verifier.jws_verifier(algorithm).ok_or_else(not_implemented)?;

			signing.push((algorithm.to_owned(), implementation));
		} else {
			let implementation = verifier.jwe_decrypter(algorithm).ok_or_else(not_implemented)?;

			encryption.push((algorithm.to_owned(), implementation));
		}
	}

	let policy = if encryption.is_empty() {
		TokenTypePolicy::SignedOnly
	} else {
		TokenTypePolicy::SignedOrEncrypted
	};

	Ok(NegotiatedAlgorithms { signing, encryption, policy })
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::{Value, json};
	// self
	use super::*;
	use crate::_preludet::*;

	struct NoopDecrypter;
	impl JweDecrypter for NoopDecrypter {
		fn algorithm(&self) -> &str {
			"RSA-OAEP"
		}

		fn decrypt(&self, _token: &CompactJwe) -> Result<Vec<u8>, CryptoError> {
			Err(CryptoError::new("Not used."))
		}
	}

	struct WithDecrypter(CountingVerifier);
	impl SignatureVerifier for WithDecrypter {
		fn jws_verifier(&self, algorithm: &str) -> Option<Arc<dyn JwsVerifier>> {
			self.0.jws_verifier(algorithm)
		}

		fn jwe_decrypter(&self, algorithm: &str) -> Option<Arc<dyn JweDecrypter>> {
			(algorithm == "RSA-OAEP").then(|| Arc::new(NoopDecrypter) as Arc<dyn JweDecrypter>)
		}
	}

	fn metadata_with(signing: Value, encryption: Option<Value>) -> ProviderMetadata {
		let mut raw = metadata_json();

		raw.insert("id_token_signing_alg_values_supported".into(), signing);

		if let Some(encryption) = encryption {
			raw.insert("id_token_encryption_alg_values_supported".into(), encryption);
		}

		ProviderMetadata::from_map(raw).expect("Metadata should be valid.")
	}

	#[test]
	fn signing_only_providers_negotiate_jws() {
		let negotiated = negotiate(&metadata_fixture(), &CountingVerifier::default())
			.expect("RS256 should negotiate.");

		assert_eq!(negotiated.signing_algorithms(), ["RS256"]);
		assert!(negotiated.encryption_algorithms().is_empty());
		assert_eq!(negotiated.policy(), TokenTypePolicy::SignedOnly);
		assert!(negotiated.jws_verifier("HS256").is_none());
	}

	#[test]
	fn unimplemented_algorithms_are_named() {
		let metadata = metadata_with(json!(["RS256", "ES512"]), None);

		assert_eq!(
			negotiate(&metadata, &CountingVerifier::default()).expect_err("ES512 is unsupported."),
			UnsupportedAlgorithmError::NotImplemented { algorithm: "ES512".into() }
		);

		let metadata = metadata_with(json!(["RS256"]), Some(json!(["RSA-OAEP"])));

		assert_eq!(
			negotiate(&metadata, &CountingVerifier::default()).expect_err("No decrypter exists."),
			UnsupportedAlgorithmError::NotImplemented { algorithm: "RSA-OAEP".into() }
		);
	}

	#[test]
	fn none_is_never_negotiated() {
		let metadata = metadata_with(json!(["none", "RS256"]), None);
		let negotiated =
			negotiate(&metadata, &CountingVerifier::default()).expect("RS256 should negotiate.");

		assert_eq!(negotiated.signing_algorithms(), ["RS256"]);
		assert!(negotiated.allow_signing("none").is_err());
	}

	#[test]
	fn encryption_algorithms_enable_jwe() {
		let metadata = metadata_with(json!(["RS256"]), Some(json!(["RSA-OAEP", "RS256"])));
		let negotiated = negotiate(&metadata, &WithDecrypter(CountingVerifier::default()))
			.expect("Both families should negotiate.");

		assert_eq!(negotiated.encryption_algorithms(), ["RSA-OAEP"]);
		assert_eq!(negotiated.policy(), TokenTypePolicy::SignedOrEncrypted);
		assert!(negotiated.allow_encryption("RSA-OAEP").is_ok());
		assert!(negotiated.allow_encryption("A128KW").is_err());
	}
}
