//! Authorization Code requests with `state`, `nonce`, and PKCE.

// self
use crate::{
	_prelude::*,
	auth::{self, PkceCodeChallengeMethod, PkcePair, ScopeList},
	error::{ConfigError, InvalidResponseError, RequestBuildError},
	jose::VerificationOptions,
	provider::{ClientInformation, ProviderMetadata},
};

const STATE_LEN: usize = 32;
const NONCE_LEN: usize = 32;
const OPENID_SCOPE: &str = "openid";
const RESERVED_PARAMETERS: [&str; 8] = [
	"response_type",
	"client_id",
	"redirect_uri",
	"scope",
	"state",
	"nonce",
	"code_challenge",
	"code_challenge_method",
];

/// Caller inputs for an authorization redirect.
#[derive(Clone, Debug, Default)]
pub struct AuthorizationRequest {
	scope: ScopeList,
	redirect_uri: Option<Url>,
	extra: Vec<(String, String)>,
}
impl AuthorizationRequest {
	/// Request for the `openid` scope at the client's default redirect URI.
	pub fn new() -> Self {
		Self::default()
	}

	/// Requests additional scopes; `openid` is always prepended.
	pub fn with_scope(mut self, scope: ScopeList) -> Self {
		self.scope = scope;

		self
	}

	/// Picks one of the client's registered redirect URIs.
	pub fn with_redirect_uri(mut self, redirect_uri: Url) -> Self {
		self.redirect_uri = Some(redirect_uri);

		self
	}

	/// Appends a provider-specific query parameter (`prompt`, `login_hint`, ...).
	pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.extra.push((name.into(), value.into()));

		self
	}
}

/// Authorization handshake state kept by the caller until the redirect returns.
#[derive(Clone)]
pub struct AuthorizationSession {
	scope: ScopeList,
	state: String,
	nonce: String,
	redirect_uri: Url,
	authorize_url: Url,
	pkce: Option<PkcePair>,
}
impl AuthorizationSession {
	/// URL the end-user should be sent to.
	pub fn authorize_url(&self) -> &Url {
		&self.authorize_url
	}

	/// Requested scopes, `openid` first.
	pub fn scope(&self) -> &ScopeList {
		&self.scope
	}

	/// Opaque `state` that must round-trip through the redirect.
	pub fn state(&self) -> &str {
		&self.state
	}

	/// `nonce` the ID token must echo.
	pub fn nonce(&self) -> &str {
		&self.nonce
	}

	/// Redirect URI sent with the request; the code exchange must repeat it.
	pub fn redirect_uri(&self) -> &Url {
		&self.redirect_uri
	}

	/// PKCE pair, when the provider supports S256.
	pub fn pkce(&self) -> Option<&PkcePair> {
		self.pkce.as_ref()
	}

	/// PKCE challenge method, when PKCE is in use.
	pub fn code_challenge_method(&self) -> Option<PkceCodeChallengeMethod> {
		self.pkce.as_ref().map(PkcePair::method)
	}

	/// Validates the returned `state` parameter after the authorization redirect.
	pub fn validate_state(&self, returned_state: &str) -> Result<()> {
		if returned_state == self.state {
			Ok(())
		} else {
			Err(InvalidResponseError::StateMismatch.into())
		}
	}

	/// Verification options expecting this session's `nonce`.
	pub fn verification_options(&self) -> VerificationOptions {
		VerificationOptions::default().with_nonce(self.nonce.clone())
	}
}
impl Debug for AuthorizationSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationSession")
			.field("scope", &self.scope)
			.field("state", &self.state)
			.field("redirect_uri", &self.redirect_uri)
			.field("authorize_url", &self.authorize_url)
			.field("pkce", &self.pkce)
			.finish_non_exhaustive()
	}
}

pub(crate) fn build_session(
	metadata: &ProviderMetadata,
	client: &ClientInformation,
	request: AuthorizationRequest,
) -> Result<AuthorizationSession> {
	let AuthorizationRequest { mut scope, redirect_uri, extra } = request;
	let redirect_uri = match redirect_uri {
		Some(uri) if client.is_registered_redirect(&uri) => uri,
		Some(uri) => return Err(ConfigError::UnregisteredRedirect { uri: uri.into() }.into()),
		None => client.default_redirect_uri().clone(),
	};

	let reserved = extra.iter().find(|(name, _)| RESERVED_PARAMETERS.contains(&name.as_str()));

	if let Some((name, _)) = reserved {
		return Err(RequestBuildError::ReservedParameter { name: name.clone() }.into());
	}

	scope.ensure(OPENID_SCOPE);

	let state = auth::random_string(STATE_LEN);
	let nonce = auth::random_string(NONCE_LEN);
	let pkce = supports_s256(metadata).then(PkcePair::generate);
	let mut authorize_url = metadata.authorization_endpoint().clone();
	let mut pairs = authorize_url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", client.client_id());
	pairs.append_pair("redirect_uri", redirect_uri.as_str());
	pairs.append_pair("scope", &scope.to_delimited());
	pairs.append_pair("state", &state);
	pairs.append_pair("nonce", &nonce);

	if let Some(pkce) = &pkce {
		pairs.append_pair("code_challenge", pkce.challenge());
		pairs.append_pair("code_challenge_method", pkce.method().as_str());
	}

	for (name, value) in &extra {
		pairs.append_pair(name, value);
	}

	drop(pairs);

	Ok(AuthorizationSession { scope, state, nonce, redirect_uri, authorize_url, pkce })
}

// Providers that advertise nothing still get S256; it is ignored where unsupported.
fn supports_s256(metadata: &ProviderMetadata) -> bool {
	metadata.code_challenge_methods_supported().is_none_or(|methods| {
		methods.iter().any(|method| method == PkceCodeChallengeMethod::S256.as_str())
	})
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::_preludet::*;

	fn query(url: &Url) -> Vec<(String, String)> {
		url.query_pairs().into_owned().collect()
	}

	#[test]
	fn authorize_urls_carry_every_protocol_parameter() {
		let session = build_session(
			&metadata_fixture(),
			&public_client(),
			AuthorizationRequest::new()
				.with_scope(ScopeList::parse("email profile"))
				.with_param("prompt", "login"),
		)
		.expect("Session should build.");
		let pairs = query(session.authorize_url());
		let names = pairs.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>();
		let pkce = session.pkce().expect("PKCE should be enabled by default.");

		assert_eq!(session.authorize_url().path(), "/authorize");
		assert_eq!(names, [
			"response_type",
			"client_id",
			"redirect_uri",
			"scope",
			"state",
			"nonce",
			"code_challenge",
			"code_challenge_method",
			"prompt",
		]);
		assert_eq!(pairs[3].1, "openid email profile");
		assert_eq!(pairs[4].1, session.state());
		assert_eq!(pairs[5].1, session.nonce());
		assert_eq!(pairs[6].1, pkce.challenge());
		assert_eq!(pairs[7].1, "S256");
		assert_eq!(session.redirect_uri().as_str(), REDIRECT_URI);
		assert_eq!(session.verification_options().nonce(), Some(session.nonce()));
	}

	#[test]
	fn pkce_follows_advertised_methods() {
		let mut raw = metadata_json();

		raw.insert("code_challenge_methods_supported".into(), json!(["plain"]));

		let metadata = ProviderMetadata::from_map(raw).expect("Metadata should be valid.");
		let session = build_session(&metadata, &public_client(), AuthorizationRequest::new())
			.expect("Session should build.");

		assert!(session.pkce().is_none());
		assert!(!query(session.authorize_url()).iter().any(|(name, _)| name == "code_challenge"));
	}

	#[test]
	fn unregistered_redirects_and_reserved_params_are_rejected() {
		let other = Url::parse("https://evil.example/cb").expect("Fixture URL should parse.");
		let err = build_session(
			&metadata_fixture(),
			&public_client(),
			AuthorizationRequest::new().with_redirect_uri(other),
		)
		.expect_err("Unregistered redirect must fail.");

		assert!(matches!(err, Error::Config(ConfigError::UnregisteredRedirect { .. })));

		let err = build_session(
			&metadata_fixture(),
			&public_client(),
			AuthorizationRequest::new().with_param("state", "fixed"),
		)
		.expect_err("Reserved parameter must fail.");

		assert!(matches!(
			err,
			Error::RequestBuild(RequestBuildError::ReservedParameter { name }) if name == "state"
		));
	}

	#[test]
	fn state_validation_errors_on_mismatch() {
		let session =
			build_session(&metadata_fixture(), &public_client(), AuthorizationRequest::new())
				.expect("Session should build.");

		assert!(session.validate_state(&session.state().to_owned()).is_ok());
		assert!(matches!(
			session.validate_state("other"),
			Err(Error::InvalidResponse(InvalidResponseError::StateMismatch))
		));
	}
}
