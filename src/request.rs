//! Grant-aware token endpoint requests.
//!
//! [`TokenRequestBuilder`] turns a [`GrantType`] plus its parameters into a [`RequestSpec`]:
//! always a form-encoded `POST` to the provider's token endpoint, with client authentication
//! chosen by the client registration. Confidential clients authenticate with HTTP Basic and
//! keep credentials out of the body; public clients send `client_id` in the body.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use oauth2::{
	HttpRequest,
	http::{
		HeaderMap, HeaderValue, Method, Request,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use url::form_urlencoded::{self, Serializer};
// self
use crate::{
	_prelude::*,
	auth::ScopeList,
	error::{ConfigError, RequestBuildError},
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	provider::{ClientInformation, GrantType, ProviderMetadata},
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_ACCEPT: &str = "application/json";
const RESERVED_PARAMETERS: [&str; 3] = ["grant_type", "client_id", "client_secret"];

/// Outbound HTTP request produced by [`TokenRequestBuilder`].
///
/// A built request is immutable; transports read it or convert it with
/// [`RequestSpec::to_http_request`].
#[derive(Clone, PartialEq, Eq)]
pub struct RequestSpec {
	method: Method,
	uri: Url,
	headers: HeaderMap,
	body: String,
}
impl RequestSpec {
	/// HTTP method (always `POST` for token requests).
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Target URI.
	pub fn uri(&self) -> &Url {
		&self.uri
	}

	/// Request headers.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Reads a header as a string.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}

	/// Form-encoded body.
	pub fn body(&self) -> &str {
		&self.body
	}

	/// Decoded body pairs, in wire order.
	pub fn form_pairs(&self) -> Vec<(String, String)> {
		form_urlencoded::parse(self.body.as_bytes()).into_owned().collect()
	}

	/// Converts this request into the request type consumed by `oauth2` HTTP clients.
	pub fn to_http_request(&self) -> Result<HttpRequest, ConfigError> {
		let mut builder = Request::builder().method(self.method.clone()).uri(self.uri.as_str());

		for (name, value) in &self.headers {
			builder = builder.header(name, value);
		}

		Ok(builder.body(self.body.clone().into_bytes())?)
	}
}
impl Debug for RequestSpec {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestSpec")
			.field("method", &self.method)
			.field("uri", &self.uri.as_str())
			.field("headers", &self.headers)
			.field("body", &"<redacted>")
			.finish()
	}
}

/// Builds token endpoint requests for one provider and client.
///
/// Stateless apart from the shared metadata and client handles, so a single builder can serve
/// every request and thread.
#[derive(Clone, Debug)]
pub struct TokenRequestBuilder {
	metadata: Arc<ProviderMetadata>,
	client: Arc<ClientInformation>,
}
impl TokenRequestBuilder {
	/// Creates a builder bound to the provider and client.
	pub fn new(metadata: Arc<ProviderMetadata>, client: Arc<ClientInformation>) -> Self {
		Self { metadata, client }
	}

	/// Provider metadata the builder targets.
	pub fn metadata(&self) -> &ProviderMetadata {
		&self.metadata
	}

	/// Client the builder authenticates as.
	pub fn client(&self) -> &ClientInformation {
		&self.client
	}

	/// Builds a request for any grant.
	///
	/// Parameters keep the caller's order after `grant_type`. Supplying a name twice, or a name
	/// the builder owns (`grant_type`, `client_id`, `client_secret`), is rejected, as is a
	/// missing or empty parameter the grant requires.
	pub fn build<I, K, V>(
		&self,
		grant: &GrantType,
		params: I,
	) -> Result<RequestSpec, RequestBuildError>
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		const KIND: OperationKind = OperationKind::BuildTokenRequest;

		let _guard = OperationSpan::new(KIND, "build").entered();

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

		let result = self.build_inner(grant, params);

		obs::record_operation_outcome(KIND, OperationOutcome::of(&result));

		result
	}

	/// Authorization Code grant.
	pub fn authorization_code(
		&self,
		code: &str,
		redirect_uri: &str,
	) -> Result<RequestSpec, RequestBuildError> {
		self.build(&GrantType::AuthorizationCode, [("code", code), ("redirect_uri", redirect_uri)])
	}

	/// Authorization Code grant redeeming a PKCE verifier.
	pub fn authorization_code_with_verifier(
		&self,
		code: &str,
		redirect_uri: &str,
		code_verifier: &str,
	) -> Result<RequestSpec, RequestBuildError> {
		self.build(&GrantType::AuthorizationCode, [
			("code", code),
			("redirect_uri", redirect_uri),
			("code_verifier", code_verifier),
		])
	}

	/// Refresh Token grant, optionally narrowing the scope.
	pub fn refresh_token(
		&self,
		refresh_token: &str,
		scope: Option<&ScopeList>,
	) -> Result<RequestSpec, RequestBuildError> {
		let mut params = vec![("refresh_token", refresh_token.to_owned())];

		push_scope(&mut params, scope);

		self.build(&GrantType::RefreshToken, params)
	}

	/// Client Credentials grant.
	pub fn client_credentials(
		&self,
		scope: Option<&ScopeList>,
	) -> Result<RequestSpec, RequestBuildError> {
		let mut params = Vec::new();

		push_scope(&mut params, scope);

		self.build(&GrantType::ClientCredentials, params)
	}

	/// Resource Owner Password Credentials grant.
	pub fn password(
		&self,
		username: &str,
		password: &str,
		scope: Option<&ScopeList>,
	) -> Result<RequestSpec, RequestBuildError> {
		let mut params = vec![("username", username.to_owned()), ("password", password.to_owned())];

		push_scope(&mut params, scope);

		self.build(&GrantType::Password, params)
	}

	/// Extension grant identified by an absolute URI.
	pub fn extension<I, K, V>(
		&self,
		grant_uri: &str,
		params: I,
	) -> Result<RequestSpec, RequestBuildError>
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.build(&GrantType::extension(grant_uri)?, params)
	}

	fn build_inner<I, K, V>(
		&self,
		grant: &GrantType,
		params: I,
	) -> Result<RequestSpec, RequestBuildError>
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		grant.validate()?;

		let mut pairs = Vec::<(String, String)>::new();

		for (name, value) in params {
			let name = name.into();

			if RESERVED_PARAMETERS.contains(&name.as_str()) {
				return Err(RequestBuildError::ReservedParameter { name });
			}
			if pairs.iter().any(|(existing, _)| *existing == name) {
				return Err(RequestBuildError::DuplicateParameter { name });
			}

			pairs.push((name, value.into()));
		}

		for required in grant.required_parameters() {
			if !pairs.iter().any(|(name, value)| name == required && !value.is_empty()) {
				return Err(RequestBuildError::MissingParameter {
					grant: grant.to_string(),
					name: *required,
				});
			}
		}

		let mut body = Serializer::new(String::new());

		body.append_pair("grant_type", grant.as_str());

		for (name, value) in &pairs {
			body.append_pair(name, value);
		}

		let mut headers = HeaderMap::new();

		headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
		headers.insert(ACCEPT, HeaderValue::from_static(JSON_ACCEPT));

		match self.client.client_secret() {
			Some(secret) => {
				let authorization = basic_authorization(self.client.client_id(), secret.expose())?;

				headers.insert(AUTHORIZATION, authorization);
			},
			None => {
				body.append_pair("client_id", self.client.client_id());
			},
		}

		Ok(RequestSpec {
			method: Method::POST,
			uri: self.metadata.token_endpoint().clone(),
			headers,
			body: body.finish(),
		})
	}
}

fn push_scope(params: &mut Vec<(&'static str, String)>, scope: Option<&ScopeList>) {
	if let Some(scope) = scope.filter(|scope| !scope.is_empty()) {
		params.push(("scope", scope.to_delimited()));
	}
}

fn basic_authorization(client_id: &str, secret: &str) -> Result<HeaderValue, RequestBuildError> {
	let credentials = STANDARD.encode(format!("{client_id}:{secret}"));
	let mut value = HeaderValue::from_str(&format!("Basic {credentials}"))
		.map_err(|_| RequestBuildError::InvalidAuthorizationHeader)?;

	value.set_sensitive(true);

	Ok(value)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	fn builder(client: ClientInformation) -> TokenRequestBuilder {
		TokenRequestBuilder::new(Arc::new(metadata_fixture()), Arc::new(client))
	}

	#[test]
	fn authorization_code_request_matches_the_wire_format() {
		let spec = builder(confidential_client())
			.authorization_code("c1", REDIRECT_URI)
			.expect("Request should build.");

		assert_eq!(spec.method(), Method::POST);
		assert_eq!(spec.uri().as_str(), "https://idp.example/token");
		assert_eq!(
			spec.body(),
			"grant_type=authorization_code&code=c1&redirect_uri=https%3A%2F%2Frp.example%2Fcb"
		);
		assert_eq!(spec.header("authorization"), Some("Basic YWJjOnh5eg=="));
		assert_eq!(spec.header("content-type"), Some(FORM_CONTENT_TYPE));
		assert_eq!(spec.header("accept"), Some(JSON_ACCEPT));
	}

	#[test]
	fn public_clients_send_client_id_in_the_body() {
		let spec = builder(public_client())
			.refresh_token("r1", Some(&ScopeList::parse("openid email")))
			.expect("Request should build.");

		assert!(spec.header("authorization").is_none());
		assert_eq!(spec.form_pairs(), [
			("grant_type".to_owned(), "refresh_token".to_owned()),
			("refresh_token".to_owned(), "r1".to_owned()),
			("scope".to_owned(), "openid email".to_owned()),
			("client_id".to_owned(), CLIENT_ID.to_owned()),
		]);
	}

	#[test]
	fn basic_credentials_decode_to_id_and_secret() {
		let spec = builder(confidential_client())
			.client_credentials(None)
			.expect("Request should build.");
		let encoded = spec
			.header("authorization")
			.and_then(|value| value.strip_prefix("Basic "))
			.expect("Confidential clients send Basic credentials.");
		let decoded = STANDARD.decode(encoded).expect("Credentials should be base64.");

		assert_eq!(decoded, b"abc:xyz");
		assert_eq!(spec.body(), "grant_type=client_credentials");
		assert!(!format!("{spec:?}").contains("YWJjOnh5eg"));
	}

	#[test]
	fn caller_mistakes_are_rejected() {
		let builder = builder(confidential_client());

		assert_eq!(
			builder.build(&GrantType::AuthorizationCode, [("code", "a"), ("code", "b")]),
			Err(RequestBuildError::DuplicateParameter { name: "code".into() })
		);
		assert_eq!(
			builder.build(&GrantType::ClientCredentials, [("client_secret", "leak")]),
			Err(RequestBuildError::ReservedParameter { name: "client_secret".into() })
		);
		assert_eq!(
			builder.authorization_code("", REDIRECT_URI),
			Err(RequestBuildError::MissingParameter {
				grant: "authorization_code".into(),
				name: "code",
			})
		);
		assert_eq!(
			builder.password("alice", "", None),
			Err(RequestBuildError::MissingParameter { grant: "password".into(), name: "password" })
		);
		assert_eq!(
			builder.extension("device_code", [("device_code", "d1")]),
			Err(RequestBuildError::InvalidExtensionGrant { grant: "device_code".into() })
		);
	}

	#[test]
	fn extension_grants_use_the_uri_as_grant_type() {
		let spec = builder(confidential_client())
			.extension("urn:ietf:params:oauth:grant-type:device_code", [("device_code", "d1")])
			.expect("Request should build.");

		assert_eq!(
			spec.body(),
			"grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Adevice_code&device_code=d1"
		);
	}

	#[test]
	fn specs_convert_to_http_requests() {
		let spec = builder(confidential_client())
			.authorization_code_with_verifier("c1", REDIRECT_URI, "v1")
			.expect("Request should build.");
		let request = spec.to_http_request().expect("Request should convert.");

		assert_eq!(request.method(), Method::POST);
		assert_eq!(request.uri(), "https://idp.example/token");
		assert_eq!(request.headers(), spec.headers());
		assert_eq!(request.body(), spec.body().as_bytes());
	}
}
