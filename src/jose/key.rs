//! JSON Web Keys and key sets.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, error::InvalidResponseError};

/// A single JSON Web Key.
///
/// Only the selection metadata is typed. Key material (`n`, `e`, `x`, `y`, `crv`, `k`, ...)
/// stays in [`Jwk::params`] and is interpreted by the cryptographic collaborator.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Jwk {
	kty: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	kid: Option<String>,
	#[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
	key_use: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	alg: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	key_ops: Option<Vec<String>>,
	#[serde(flatten)]
	params: Map<String, Value>,
}
impl Jwk {
	/// Wraps raw symmetric key bytes as an `oct` key.
	pub fn symmetric(secret: &[u8]) -> Self {
		let mut params = Map::new();

		params.insert("k".into(), Value::String(URL_SAFE_NO_PAD.encode(secret)));

		Self { kty: "oct".into(), kid: None, key_use: None, alg: None, key_ops: None, params }
	}

	/// Key type (`RSA`, `EC`, `OKP`, `oct`).
	pub fn kty(&self) -> &str {
		&self.kty
	}

	/// Key identifier.
	pub fn kid(&self) -> Option<&str> {
		self.kid.as_deref()
	}

	/// Intended use (`sig` or `enc`).
	pub fn key_use(&self) -> Option<&str> {
		self.key_use.as_deref()
	}

	/// Algorithm the key is restricted to.
	pub fn alg(&self) -> Option<&str> {
		self.alg.as_deref()
	}

	/// Permitted key operations.
	pub fn key_ops(&self) -> Option<&[String]> {
		self.key_ops.as_deref()
	}

	/// Key material and any other member not modeled above.
	pub fn params(&self) -> &Map<String, Value> {
		&self.params
	}

	/// Reads a string-valued key parameter such as `n` or `crv`.
	pub fn param(&self, name: &str) -> Option<&str> {
		self.params.get(name).and_then(Value::as_str)
	}

	/// Returns true when the key may verify signatures made with `alg`.
	pub fn is_compatible_with(&self, alg: &str) -> bool {
		if self.alg.as_deref().is_some_and(|restricted| restricted != alg) {
			return false;
		}
		if self.key_use.as_deref().is_some_and(|key_use| key_use != "sig") {
			return false;
		}
		if self.key_ops.as_ref().is_some_and(|ops| !ops.iter().any(|op| op == "verify")) {
			return false;
		}

		match key_family(alg) {
			Some((kty, curve)) =>
				self.kty == kty
					&& match (curve, self.param("crv")) {
						(Some(expected), Some(found)) => expected == found,
						_ => true,
					},
			// Unknown algorithms only match keys explicitly bound to them.
			None => self.alg.as_deref() == Some(alg),
		}
	}
}
impl Debug for Jwk {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Jwk")
			.field("kty", &self.kty)
			.field("kid", &self.kid)
			.field("use", &self.key_use)
			.field("alg", &self.alg)
			.finish_non_exhaustive()
	}
}

/// JWK set as published at the provider's `jwks_uri`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KeySet {
	keys: Vec<Jwk>,
}
impl KeySet {
	/// Wraps keys supplied directly by the caller.
	pub fn new(keys: impl IntoIterator<Item = Jwk>) -> Self {
		Self { keys: keys.into_iter().collect() }
	}

	/// Decodes a `{"keys": [...]}` document.
	pub fn from_slice(bytes: &[u8]) -> Result<Self, InvalidResponseError> {
		let mut de = serde_json::Deserializer::from_slice(bytes);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| InvalidResponseError::InvalidKeySet { source })
	}

	/// Decodes a key set held as a JSON value.
	pub fn from_value(value: Value) -> Result<Self, InvalidResponseError> {
		serde_path_to_error::deserialize(value)
			.map_err(|source| InvalidResponseError::InvalidKeySet { source })
	}

	/// All keys in document order.
	pub fn keys(&self) -> &[Jwk] {
		&self.keys
	}

	/// Number of keys.
	pub fn len(&self) -> usize {
		self.keys.len()
	}

	/// Returns true when the set holds no keys.
	pub fn is_empty(&self) -> bool {
		self.keys.is_empty()
	}

	/// Looks up a key by identifier.
	pub fn find(&self, kid: &str) -> Option<&Jwk> {
		self.keys.iter().find(|key| key.kid() == Some(kid))
	}

	/// Keys usable for `alg`, narrowed to `kid` when the token names one.
	pub fn candidates<'a>(
		&'a self,
		alg: &'a str,
		kid: Option<&'a str>,
	) -> impl Iterator<Item = &'a Jwk> {
		self.keys
			.iter()
			.filter(move |key| kid.is_none_or(|kid| key.kid() == Some(kid)))
			.filter(move |key| key.is_compatible_with(alg))
	}
}

fn key_family(alg: &str) -> Option<(&'static str, Option<&'static str>)> {
	Some(match alg {
		"RS256" | "RS384" | "RS512" | "PS256" | "PS384" | "PS512" => ("RSA", None),
		"ES256" => ("EC", Some("P-256")),
		"ES384" => ("EC", Some("P-384")),
		"ES512" => ("EC", Some("P-521")),
		"ES256K" => ("EC", Some("secp256k1")),
		"EdDSA" => ("OKP", None),
		"Ed25519" => ("OKP", Some("Ed25519")),
		"HS256" | "HS384" | "HS512" => ("oct", None),
		_ => return None,
	})
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::_preludet::*;

	fn jwk(value: Value) -> Jwk {
		serde_json::from_value(value).expect("JWK fixture should deserialize.")
	}

	#[test]
	fn compatibility_follows_type_curve_and_restrictions() {
		let rsa = jwk(json!({ "kty": "RSA", "n": "AQAB", "e": "AQAB" }));
		let p256 = jwk(json!({ "kty": "EC", "crv": "P-256", "x": "AA", "y": "AA" }));
		let enc_only = jwk(json!({ "kty": "RSA", "use": "enc" }));
		let pinned = jwk(json!({ "kty": "RSA", "alg": "PS256" }));

		assert!(rsa.is_compatible_with("RS256"));
		assert!(rsa.is_compatible_with("PS512"));
		assert!(!rsa.is_compatible_with("ES256"));
		assert!(p256.is_compatible_with("ES256"));
		assert!(!p256.is_compatible_with("ES384"));
		assert!(!enc_only.is_compatible_with("RS256"));
		assert!(pinned.is_compatible_with("PS256"));
		assert!(!pinned.is_compatible_with("RS256"));
		assert!(!rsa.is_compatible_with("XS999"));
	}

	#[test]
	fn candidates_narrow_by_kid_when_present() {
		let keys = KeySet::from_slice(
			br#"{"keys":[
				{"kty":"RSA","kid":"k1","n":"AQAB","e":"AQAB"},
				{"kty":"RSA","kid":"k2","n":"AQAB","e":"AQAB"},
				{"kty":"EC","kid":"k3","crv":"P-256","x":"AA","y":"AA"}
			]}"#,
		)
		.expect("Key set should parse.");

		assert_eq!(keys.candidates("RS256", None).count(), 2);
		assert_eq!(keys.candidates("RS256", Some("k2")).filter_map(Jwk::kid).collect::<Vec<_>>(), [
			"k2"
		]);
		assert_eq!(keys.candidates("RS256", Some("k3")).count(), 0);
		assert_eq!(keys.find("k3").map(Jwk::kty), Some("EC"));
	}

	#[test]
	fn symmetric_keys_encode_material() {
		let key = Jwk::symmetric(CLIENT_SECRET.as_bytes());

		assert_eq!(key.kty(), "oct");
		assert_eq!(key.param("k"), Some("eHl6"));
		assert!(key.is_compatible_with("HS256"));
		assert!(!format!("{key:?}").contains("eHl6"));
	}

	#[test]
	fn invalid_documents_report_their_path() {
		let err = KeySet::from_slice(br#"{"keys":[{"kid":"k1"}]}"#)
			.expect_err("Keys without kty must be rejected.");

		assert!(matches!(
			err,
			InvalidResponseError::InvalidKeySet { ref source } if source.path().to_string().starts_with("keys")
		));
		assert_eq!(key_set_fixture().len(), 1);
	}
}
