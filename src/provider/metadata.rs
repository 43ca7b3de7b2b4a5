//! Validated OpenID Provider discovery metadata.

// crates.io
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, error::ConfigError};

/// Discovery keys that must be present and non-empty, in reporting order.
pub const REQUIRED_METADATA: [&str; 7] = [
	"issuer",
	"authorization_endpoint",
	"token_endpoint",
	"jwks_uri",
	"response_types_supported",
	"subject_types_supported",
	"id_token_signing_alg_values_supported",
];

/// Provider discovery document validated once at construction.
///
/// Required keys are checked for presence before any typed decoding happens, so a document
/// missing several keys reports all of them together. Unknown fields are preserved and can
/// be read through [`ProviderMetadata::other`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct ProviderMetadata {
	fields: MetadataFields,
}
impl ProviderMetadata {
	/// Validates a raw discovery mapping.
	pub fn from_map(raw: Map<String, Value>) -> Result<Self, ConfigError> {
		let missing = REQUIRED_METADATA
			.iter()
			.copied()
			.filter(|key| is_blank(raw.get(*key)))
			.collect::<Vec<_>>();

		if !missing.is_empty() {
			return Err(ConfigError::MissingMetadata { keys: missing });
		}

		let fields = serde_path_to_error::deserialize(Value::Object(raw))
			.map_err(|source| ConfigError::InvalidMetadata { source })?;

		Ok(Self { fields })
	}

	/// Validates a discovery document held as a JSON value.
	pub fn from_value(raw: Value) -> Result<Self, ConfigError> {
		let raw = serde_path_to_error::deserialize(raw)
			.map_err(|source| ConfigError::InvalidMetadata { source })?;

		Self::from_map(raw)
	}

	/// Validates a discovery document from raw JSON bytes.
	pub fn from_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_slice(bytes);
		let raw = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::InvalidMetadata { source })?;

		Self::from_map(raw)
	}

	/// Issuer identifier, compared verbatim against the `iss` claim.
	pub fn issuer(&self) -> &str {
		&self.fields.issuer
	}

	/// Authorization endpoint.
	pub fn authorization_endpoint(&self) -> &Url {
		&self.fields.authorization_endpoint
	}

	/// Token endpoint every token request targets.
	pub fn token_endpoint(&self) -> &Url {
		&self.fields.token_endpoint
	}

	/// JWK set location.
	pub fn jwks_uri(&self) -> &Url {
		&self.fields.jwks_uri
	}

	/// Advertised `response_type` values.
	pub fn response_types_supported(&self) -> &[String] {
		&self.fields.response_types_supported
	}

	/// Advertised subject identifier types.
	pub fn subject_types_supported(&self) -> &[String] {
		&self.fields.subject_types_supported
	}

	/// Advertised ID token signing algorithms.
	pub fn id_token_signing_alg_values_supported(&self) -> &[String] {
		&self.fields.id_token_signing_alg_values_supported
	}

	/// Advertised ID token key management algorithms, when the provider encrypts ID tokens.
	pub fn id_token_encryption_alg_values_supported(&self) -> Option<&[String]> {
		self.fields.id_token_encryption_alg_values_supported.as_deref()
	}

	/// Advertised scopes.
	pub fn scopes_supported(&self) -> Option<&[String]> {
		self.fields.scopes_supported.as_deref()
	}

	/// Advertised claim names.
	pub fn claims_supported(&self) -> Option<&[String]> {
		self.fields.claims_supported.as_deref()
	}

	/// Advertised PKCE challenge methods.
	pub fn code_challenge_methods_supported(&self) -> Option<&[String]> {
		self.fields.code_challenge_methods_supported.as_deref()
	}

	/// Advertised token endpoint client authentication methods.
	pub fn token_endpoint_auth_methods_supported(&self) -> Option<&[String]> {
		self.fields.token_endpoint_auth_methods_supported.as_deref()
	}

	/// UserInfo endpoint.
	pub fn userinfo_endpoint(&self) -> Option<&Url> {
		self.fields.userinfo_endpoint.as_ref()
	}

	/// Reads a discovery field this type does not model.
	pub fn other(&self, name: &str) -> Option<&Value> {
		self.fields.other.get(name).filter(|value| !value.is_null())
	}

	/// Signing algorithms followed by encryption algorithms, first occurrence wins.
	pub fn id_token_alg_values_supported(&self) -> Vec<&str> {
		let encryption = self.id_token_encryption_alg_values_supported().unwrap_or_default();
		let mut algorithms = Vec::with_capacity(
			self.fields.id_token_signing_alg_values_supported.len() + encryption.len(),
		);

		for alg in self.fields.id_token_signing_alg_values_supported.iter().chain(encryption) {
			if !algorithms.contains(&alg.as_str()) {
				algorithms.push(alg.as_str());
			}
		}

		algorithms
	}
}
impl TryFrom<Map<String, Value>> for ProviderMetadata {
	type Error = ConfigError;

	fn try_from(raw: Map<String, Value>) -> Result<Self, Self::Error> {
		Self::from_map(raw)
	}
}
impl Serialize for ProviderMetadata {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		self.fields.serialize(serializer)
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct MetadataFields {
	issuer: String,
	authorization_endpoint: Url,
	token_endpoint: Url,
	jwks_uri: Url,
	response_types_supported: Vec<String>,
	subject_types_supported: Vec<String>,
	id_token_signing_alg_values_supported: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	id_token_encryption_alg_values_supported: Option<Vec<String>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	scopes_supported: Option<Vec<String>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	claims_supported: Option<Vec<String>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	code_challenge_methods_supported: Option<Vec<String>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	token_endpoint_auth_methods_supported: Option<Vec<String>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	userinfo_endpoint: Option<Url>,
	#[serde(flatten)]
	other: Map<String, Value>,
}

fn is_blank(value: Option<&Value>) -> bool {
	match value {
		None | Some(Value::Null) => true,
		Some(Value::String(s)) => s.trim().is_empty(),
		Some(Value::Array(items)) => items.is_empty(),
		Some(Value::Object(map)) => map.is_empty(),
		Some(_) => false,
	}
}
