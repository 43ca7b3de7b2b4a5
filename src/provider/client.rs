//! Registered client credentials and redirect URIs.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{ClientId, TokenSecret},
	error::ConfigError,
};

/// Client registration used to authenticate token requests.
///
/// A non-empty `client_secret` makes the client confidential; an empty or absent one makes it
/// public. At least one redirect URI is always present.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ClientInformationWire")]
pub struct ClientInformation {
	client_id: ClientId,
	#[serde(skip_serializing_if = "Option::is_none")]
	client_secret: Option<TokenSecret>,
	redirect_uris: Vec<Url>,
}
impl ClientInformation {
	/// Starts a builder for the provided client identifier.
	pub fn builder(client_id: impl Into<String>) -> ClientInformationBuilder {
		ClientInformationBuilder::new(client_id)
	}

	/// Decodes client information from a JSON value.
	pub fn from_value(raw: Value) -> Result<Self, ConfigError> {
		let wire: ClientInformationWire = serde_path_to_error::deserialize(raw)
			.map_err(|source| ConfigError::InvalidClient { source })?;

		wire.try_into()
	}

	/// Decodes client information from raw JSON bytes.
	pub fn from_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_slice(bytes);
		let wire: ClientInformationWire = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::InvalidClient { source })?;

		wire.try_into()
	}

	/// Registered client identifier.
	pub fn client_id(&self) -> &ClientId {
		&self.client_id
	}

	/// Client secret for confidential clients.
	pub fn client_secret(&self) -> Option<&TokenSecret> {
		self.client_secret.as_ref()
	}

	/// Registered redirect URIs, in registration order.
	pub fn redirect_uris(&self) -> &[Url] {
		&self.redirect_uris
	}

	/// First registered redirect URI.
	pub fn default_redirect_uri(&self) -> &Url {
		// Construction guarantees at least one entry.
		&self.redirect_uris[0]
	}

	/// Returns true when the URI exactly matches a registered redirect URI.
	pub fn is_registered_redirect(&self, uri: &Url) -> bool {
		self.redirect_uris.iter().any(|registered| registered == uri)
	}

	/// Returns true when the client authenticates with a secret.
	pub fn is_confidential(&self) -> bool {
		self.client_secret.is_some()
	}
}
impl TryFrom<ClientInformationWire> for ClientInformation {
	type Error = ConfigError;

	fn try_from(wire: ClientInformationWire) -> Result<Self, Self::Error> {
		let mut builder =
			ClientInformationBuilder::new(wire.client_id).redirect_uris(wire.redirect_uris);

		if let Some(uri) = wire.redirect_uri {
			builder = builder.redirect_uri(uri);
		}
		if let Some(secret) = wire.client_secret {
			builder = builder.client_secret(secret);
		}

		builder.build()
	}
}

/// Builder for [`ClientInformation`].
#[derive(Clone, Debug)]
pub struct ClientInformationBuilder {
	client_id: String,
	client_secret: Option<TokenSecret>,
	redirect_uris: Vec<String>,
}
impl ClientInformationBuilder {
	/// Creates a builder for the provided client identifier.
	pub fn new(client_id: impl Into<String>) -> Self {
		Self { client_id: client_id.into(), client_secret: None, redirect_uris: Vec::new() }
	}

	/// Sets the client secret. Empty secrets leave the client public.
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Appends a redirect URI.
	pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
		self.redirect_uris.push(uri.into());

		self
	}

	/// Appends several redirect URIs.
	pub fn redirect_uris<I, S>(mut self, uris: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.redirect_uris.extend(uris.into_iter().map(Into::into));

		self
	}

	/// Validates the collected values.
	pub fn build(self) -> Result<ClientInformation, ConfigError> {
		let client_id = ClientId::new(&self.client_id)?;

		if self.redirect_uris.is_empty() {
			return Err(ConfigError::MissingRedirectUri);
		}

		let redirect_uris = self
			.redirect_uris
			.into_iter()
			.map(|uri| {
				Url::parse(&uri).map_err(|source| ConfigError::InvalidRedirect { uri, source })
			})
			.collect::<Result<Vec<_>, _>>()?;
		let client_secret = self.client_secret.filter(|secret| !secret.is_empty());

		Ok(ClientInformation { client_id, client_secret, redirect_uris })
	}
}

#[derive(Deserialize)]
struct ClientInformationWire {
	client_id: String,
	#[serde(default)]
	client_secret: Option<String>,
	#[serde(default)]
	redirect_uris: Vec<String>,
	#[serde(default)]
	redirect_uri: Option<String>,
}
