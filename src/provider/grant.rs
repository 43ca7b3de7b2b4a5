//! Grant types accepted by the token endpoint.

// self
use crate::{_prelude::*, error::RequestBuildError};

/// OAuth 2.0 grant types the token request builder understands.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GrantType {
	/// Authorization Code grant.
	AuthorizationCode,
	/// Refresh Token grant.
	RefreshToken,
	/// Client Credentials grant.
	ClientCredentials,
	/// Resource Owner Password Credentials grant.
	Password,
	/// Extension grant identified by an absolute URI (RFC 6749 section 4.5).
	Extension(String),
}
impl GrantType {
	/// Validates and wraps an extension grant identifier.
	pub fn extension(uri: impl Into<String>) -> Result<Self, RequestBuildError> {
		let uri = uri.into();

		ensure_absolute_uri(&uri)?;

		Ok(Self::Extension(uri))
	}

	/// Returns the `grant_type` value sent on the wire.
	pub fn as_str(&self) -> &str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
			GrantType::ClientCredentials => "client_credentials",
			GrantType::Password => "password",
			GrantType::Extension(uri) => uri,
		}
	}

	/// Parameters that must be present and non-empty for this grant.
	pub fn required_parameters(&self) -> &'static [&'static str] {
		match self {
			GrantType::AuthorizationCode => &["code", "redirect_uri"],
			GrantType::RefreshToken => &["refresh_token"],
			GrantType::Password => &["username", "password"],
			GrantType::ClientCredentials | GrantType::Extension(_) => &[],
		}
	}

	pub(crate) fn validate(&self) -> Result<(), RequestBuildError> {
		match self {
			GrantType::Extension(uri) => ensure_absolute_uri(uri),
			_ => Ok(()),
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for GrantType {
	type Err = RequestBuildError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"authorization_code" => Ok(GrantType::AuthorizationCode),
			"refresh_token" => Ok(GrantType::RefreshToken),
			"client_credentials" => Ok(GrantType::ClientCredentials),
			"password" => Ok(GrantType::Password),
			other => GrantType::extension(other),
		}
	}
}
impl TryFrom<String> for GrantType {
	type Error = RequestBuildError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}
impl From<GrantType> for String {
	fn from(value: GrantType) -> Self {
		match value {
			GrantType::Extension(uri) => uri,
			known => known.as_str().to_owned(),
		}
	}
}

fn ensure_absolute_uri(uri: &str) -> Result<(), RequestBuildError> {
	// `Url::parse` only accepts absolute URIs (scheme required).
	match Url::parse(uri) {
		Ok(_) => Ok(()),
		Err(_) => Err(RequestBuildError::InvalidExtensionGrant { grant: uri.to_owned() }),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn known_identifiers_round_trip() {
		for grant in [
			GrantType::AuthorizationCode,
			GrantType::RefreshToken,
			GrantType::ClientCredentials,
			GrantType::Password,
		] {
			assert_eq!(grant.as_str().parse::<GrantType>(), Ok(grant));
		}
	}

	#[test]
	fn extension_grants_must_be_absolute_uris() {
		let device = "urn:ietf:params:oauth:grant-type:device_code";

		assert_eq!(GrantType::extension(device), Ok(GrantType::Extension(device.into())));
		assert_eq!(
			"device_code".parse::<GrantType>(),
			Err(RequestBuildError::InvalidExtensionGrant { grant: "device_code".into() })
		);
		assert!(GrantType::Extension("relative".into()).validate().is_err());
	}

	#[test]
	fn required_parameters_follow_the_grant() {
		assert_eq!(GrantType::AuthorizationCode.required_parameters(), ["code", "redirect_uri"]);
		assert_eq!(GrantType::Password.required_parameters(), ["username", "password"]);
		assert!(GrantType::ClientCredentials.required_parameters().is_empty());
	}

	#[test]
	fn serde_uses_wire_identifiers() {
		assert_eq!(
			serde_json::to_string(&GrantType::RefreshToken).expect("Grant should serialize."),
			"\"refresh_token\""
		);
		assert!(serde_json::from_str::<GrantType>("\"bogus\"").is_err());
	}
}
