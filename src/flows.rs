//! Relying-party facade tying requests, transport, key sets, and verification together.

pub mod authorize;
pub mod keys;

pub use authorize::*;
pub use keys::*;

// crates.io
use oauth2::HttpResponse;
// self
use crate::{
	_prelude::*,
	auth::{ScopeList, TokenSecret},
	error::InvalidResponseError,
	http::{self, TokenHttpClient},
	jose::{Claims, IdTokenVerifier, KeySet, SignatureVerifier, VerificationOptions},
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	provider::{ClientInformation, GrantType, ProviderMetadata},
	request::{RequestSpec, TokenRequestBuilder},
	token::TokenSet,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

const BODY_PREVIEW_LIMIT: usize = 256;

#[cfg(feature = "reqwest")]
/// Relying party specialized for the crate's default reqwest transport.
pub type ReqwestRelyingParty = RelyingParty<ReqwestHttpClient>;

/// Talks to a single OpenID provider on behalf of a single client registration.
///
/// Construction validates nothing new: metadata and client information arrive already
/// validated, and algorithm negotiation runs eagerly so an unsupported provider is rejected
/// before any token is requested. Clones share the transport and key-set cache.
pub struct RelyingParty<C>
where
	C: ?Sized + TokenHttpClient,
{
	http_client: Arc<C>,
	requests: TokenRequestBuilder,
	verifier: IdTokenVerifier,
	key_cache: Arc<KeySetCache>,
}
impl<C> RelyingParty<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Creates a relying party that reuses the caller-provided transport.
	pub fn with_http_client(
		metadata: ProviderMetadata,
		client: ClientInformation,
		signature_verifier: &dyn SignatureVerifier,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self> {
		let verifier = IdTokenVerifier::new(&metadata, &client, signature_verifier)?;
		let requests = TokenRequestBuilder::new(Arc::new(metadata), Arc::new(client));

		Ok(Self {
			http_client: http_client.into(),
			requests,
			verifier,
			key_cache: Default::default(),
		})
	}

	/// Provider metadata.
	pub fn metadata(&self) -> &ProviderMetadata {
		self.requests.metadata()
	}

	/// Client registration.
	pub fn client(&self) -> &ClientInformation {
		self.requests.client()
	}

	/// Token request builder bound to this provider and client.
	pub fn requests(&self) -> &TokenRequestBuilder {
		&self.requests
	}

	/// ID token verifier with the negotiated algorithms.
	pub fn verifier(&self) -> &IdTokenVerifier {
		&self.verifier
	}

	/// Shared key-set cache.
	pub fn key_cache(&self) -> &KeySetCache {
		&self.key_cache
	}

	/// Starts an Authorization Code flow.
	pub fn start_authorization(
		&self,
		request: AuthorizationRequest,
	) -> Result<AuthorizationSession> {
		authorize::build_session(self.metadata(), self.client(), request)
	}

	/// Builds and executes a token request for any grant.
	pub async fn exchange<I, K, V>(&self, grant: &GrantType, params: I) -> Result<TokenSet>
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let spec = self.requests.build(grant, params)?;

		self.execute(&spec).await
	}

	/// Exchanges the code returned to `session`'s redirect URI.
	pub async fn exchange_authorization_code(
		&self,
		session: &AuthorizationSession,
		code: &str,
	) -> Result<TokenSet> {
		let redirect_uri = session.redirect_uri().as_str();
		let spec = match session.pkce() {
			Some(pkce) =>
				self.requests.authorization_code_with_verifier(code, redirect_uri, pkce.verifier())?,
			None => self.requests.authorization_code(code, redirect_uri)?,
		};

		self.execute(&spec).await
	}

	/// Redeems a refresh token, optionally narrowing the scope.
	pub async fn refresh(
		&self,
		refresh_token: &TokenSecret,
		scope: Option<&ScopeList>,
	) -> Result<TokenSet> {
		let spec = self.requests.refresh_token(refresh_token.expose(), scope)?;

		self.execute(&spec).await
	}

	/// Client Credentials grant.
	pub async fn client_credentials(&self, scope: Option<&ScopeList>) -> Result<TokenSet> {
		let spec = self.requests.client_credentials(scope)?;

		self.execute(&spec).await
	}

	/// Resource Owner Password Credentials grant.
	pub async fn password(
		&self,
		username: &str,
		password: &TokenSecret,
		scope: Option<&ScopeList>,
	) -> Result<TokenSet> {
		let spec = self.requests.password(username, password.expose(), scope)?;

		self.execute(&spec).await
	}

	/// Sends a prepared token request and parses the response.
	pub async fn execute(&self, spec: &RequestSpec) -> Result<TokenSet> {
		const KIND: OperationKind = OperationKind::TokenExchange;

		let span = OperationSpan::new(KIND, "execute");

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

		let result: Result<TokenSet> = span
			.instrument(async {
				let request = spec.to_http_request()?;
				let response = http::execute(&*self.http_client, request).await?;

				parse_token_response(&response)
			})
			.await;

		if let Err(e) = &result {
			obs::trace_rejection("token_exchange", e);
		}

		obs::record_operation_outcome(KIND, OperationOutcome::of(&result));

		result
	}

	/// Cached key set, fetched on first use.
	pub async fn key_set(&self) -> Result<Arc<KeySet>> {
		self.key_cache.get_or_fetch(false, || self.fetch_key_set()).await
	}

	/// Fetches the key set again; concurrent callers share one download.
	pub async fn refresh_key_set(&self) -> Result<Arc<KeySet>> {
		self.key_cache.get_or_fetch(true, || self.fetch_key_set()).await
	}

	/// Verifies the response's ID token against the cached key set.
	///
	/// A signature failure caused by key rotation is not retried here; call
	/// [`refresh_key_set`](Self::refresh_key_set) and verify again when that policy is wanted.
	pub async fn verify_id_token(
		&self,
		tokens: &TokenSet,
		options: &VerificationOptions,
	) -> Result<Claims> {
		if let Some(claims) = tokens.verified_claims() {
			return Ok(claims);
		}

		let keys = self.key_set().await?;

		tokens.verify_id_token(&self.verifier, &keys, options)
	}

	async fn fetch_key_set(&self) -> Result<KeySet> {
		const KIND: OperationKind = OperationKind::FetchKeySet;

		let span = OperationSpan::new(KIND, "fetch");

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

		let result: Result<KeySet> = span
			.instrument(async {
				let request = http::json_get(self.metadata().jwks_uri())?;
				let response = http::execute(&*self.http_client, request).await?;

				if !response.status().is_success() {
					return Err(error_response(&response).into());
				}

				Ok(KeySet::from_slice(response.body())?)
			})
			.await;

		if let Err(e) = &result {
			obs::trace_rejection("fetch_key_set", e);
		}

		obs::record_operation_outcome(KIND, OperationOutcome::of(&result));

		result
	}
}
impl<C> Clone for RelyingParty<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			requests: self.requests.clone(),
			verifier: self.verifier.clone(),
			key_cache: self.key_cache.clone(),
		}
	}
}
#[cfg(feature = "reqwest")]
impl RelyingParty<ReqwestHttpClient> {
	/// Creates a relying party backed by a default reqwest client.
	pub fn new(
		metadata: ProviderMetadata,
		client: ClientInformation,
		signature_verifier: &dyn SignatureVerifier,
	) -> Result<Self> {
		Self::with_http_client(metadata, client, signature_verifier, ReqwestHttpClient::default())
	}
}
impl<C> Debug for RelyingParty<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RelyingParty")
			.field("issuer", &self.metadata().issuer())
			.field("client_id", self.client().client_id())
			.field("algorithms", self.verifier.algorithms())
			.field("key_set_cached", &self.key_cache.current().is_some())
			.finish()
	}
}

fn parse_token_response(response: &HttpResponse) -> Result<TokenSet> {
	if !response.status().is_success() {
		return Err(error_response(response).into());
	}

	Ok(TokenSet::from_slice(response.body())?)
}

/// Classifies a non-success response as an OAuth error object or an opaque failure.
fn error_response(response: &HttpResponse) -> InvalidResponseError {
	#[derive(Deserialize)]
	struct OAuthErrorBody {
		error: String,
		error_description: Option<String>,
	}

	let status = response.status().as_u16();
	let parsed = http::is_json(response)
		.then(|| serde_json::from_slice::<OAuthErrorBody>(response.body()).ok())
		.flatten();

	match parsed {
		Some(body) => InvalidResponseError::ErrorResponse {
			status,
			error: body.error,
			description: body.error_description,
		},
		None => InvalidResponseError::UnexpectedStatus {
			status,
			body_preview: truncate_preview(&String::from_utf8_lossy(response.body())),
		},
	}
}

fn truncate_preview(body: &str) -> String {
	if body.chars().count() <= BODY_PREVIEW_LIMIT {
		return body.to_owned();
	}

	let mut buf = body.chars().take(BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::{HeaderValue, StatusCode, header::CONTENT_TYPE};
	// self
	use super::*;

	fn response(status: u16, content_type: &str, body: &str) -> HttpResponse {
		let mut response = HttpResponse::new(body.as_bytes().to_vec());

		*response.status_mut() = StatusCode::from_u16(status).expect("Status should be valid.");
		response
			.headers_mut()
			.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).expect("Header is valid."));

		response
	}

	#[test]
	fn oauth_error_objects_are_surfaced() {
		let err = error_response(&response(
			400,
			"application/json",
			r#"{"error":"invalid_grant","error_description":"Code expired."}"#,
		));

		assert!(matches!(
			err,
			InvalidResponseError::ErrorResponse { status: 400, ref error, description: Some(ref d) }
				if error == "invalid_grant" && d == "Code expired."
		));
	}

	#[test]
	fn opaque_failures_keep_a_bounded_preview() {
		let body = "x".repeat(BODY_PREVIEW_LIMIT + 10);
		let err = error_response(&response(502, "text/html", &body));
		let InvalidResponseError::UnexpectedStatus { status, body_preview } = err else {
			panic!("Opaque bodies should map to UnexpectedStatus.");
		};

		assert_eq!(status, 502);
		assert_eq!(body_preview.chars().count(), BODY_PREVIEW_LIMIT + 1);
		assert!(body_preview.ends_with('…'));
	}

	#[test]
	fn successful_responses_become_token_sets() {
		let tokens = parse_token_response(&response(
			200,
			"application/json",
			r#"{"access_token":"at","token_type":"Bearer"}"#,
		))
		.expect("Response should parse.");

		assert_eq!(tokens.access_token().expose(), "at");
		assert!(matches!(
			parse_token_response(&response(200, "application/json", r#"{"token_type":"Bearer"}"#)),
			Err(Error::InvalidResponse(InvalidResponseError::MissingAccessToken))
		));
	}

	#[test]
	fn short_previews_are_kept_whole() {
		assert_eq!(truncate_preview("oops"), "oops");
	}
}
