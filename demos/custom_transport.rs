//! Plugs a non-reqwest transport into [`RelyingParty`].
//!
//! 1. Implement [`TokenHttpClient`] and hand out an [`AsyncHttpClient`] handle.
//! 2. Report transport failures through `HttpClientError::Reqwest`; the variant name is
//!    historical and the boxed payload can be any error type.
//! 3. Read them back as [`TransportError::Network`] with the original error as the source.

// std
use std::{
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	future::Future,
	pin::Pin,
	sync::Arc,
};
// crates.io
use color_eyre::Result;
use serde_json::json;
// self
use oidc_rp::{
	error::{Error, TransportError},
	flows::RelyingParty,
	http::{
		TokenHttpClient,
		oauth2::{
			AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
			http::{Method, StatusCode},
		},
	},
	jose::{CryptoError, Jwk, JwsVerifier, SignatureVerifier},
	provider::{ClientInformation, ProviderMetadata},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let metadata = ProviderMetadata::from_value(json!({
		"issuer": "https://provider.example",
		"authorization_endpoint": "https://provider.example/authorize",
		"token_endpoint": "https://provider.example/token",
		"jwks_uri": "https://provider.example/jwks",
		"response_types_supported": ["code"],
		"subject_types_supported": ["public"],
		"id_token_signing_alg_values_supported": ["ES256"],
	}))?;
	let client = ClientInformation::builder("svc-router")
		.client_secret("demo-secret")
		.redirect_uri("https://rp.example/callback")
		.build()?;
	let rp = RelyingParty::with_http_client(
		metadata.clone(),
		client.clone(),
		&Es256Only,
		InMemoryProvider::Healthy,
	)?;
	let tokens = rp.client_credentials(None).await?;

	println!("Access token issued in memory: {:?}.", tokens.access_token());

	let keys = rp.key_set().await?;

	println!("Provider publishes {} key(s).", keys.len());

	let offline = RelyingParty::with_http_client(
		metadata,
		client,
		&Es256Only,
		InMemoryProvider::Unreachable { host: "provider.example" },
	)?;

	match offline.client_credentials(None).await {
		Err(Error::Transport(TransportError::Network { endpoint, source })) =>
			println!("{endpoint} failed: {source} ({:?}).", source.source().map(ToString::to_string)),
		other => println!("Unexpected outcome: {other:?}."),
	}

	Ok(())
}

#[derive(Debug)]
struct DnsFailure {
	host: &'static str,
}
impl Display for DnsFailure {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "DNS lookup failed for {}", self.host)
	}
}
impl StdError for DnsFailure {}

/// Answers token and JWKS requests without touching the network.
#[derive(Clone, Copy)]
enum InMemoryProvider {
	Healthy,
	Unreachable { host: &'static str },
}
impl TokenHttpClient for InMemoryProvider {
	type Handle = InMemoryProvider;
	type TransportError = DnsFailure;

	fn handle(&self) -> Self::Handle {
		*self
	}
}
impl<'a> AsyncHttpClient<'a> for InMemoryProvider {
	type Error = HttpClientError<DnsFailure>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send + Sync>>;

	fn call(&'a self, request: HttpRequest) -> Self::Future {
		let provider = *self;

		Box::pin(async move {
			if let InMemoryProvider::Unreachable { host } = provider {
				return Err(HttpClientError::Reqwest(Box::new(DnsFailure { host })));
			}

			let body = match (request.method(), request.uri().path()) {
				(&Method::POST, "/token") =>
					json!({ "access_token": "in-memory", "token_type": "Bearer", "expires_in": 900 }),
				(&Method::GET, "/jwks") => json!({
					"keys": [{ "kty": "EC", "crv": "P-256", "kid": "ec-1", "x": "AA", "y": "AA" }],
				}),
				_ => return Err(HttpClientError::Other(format!("No route for {}.", request.uri()))),
			};
			let mut response = HttpResponse::new(body.to_string().into_bytes());

			*response.status_mut() = StatusCode::OK;

			Ok(response)
		})
	}
}

/// Collaborator that claims ES256 support; never asked to verify in this demo.
struct Es256Only;
impl SignatureVerifier for Es256Only {
	fn jws_verifier(&self, algorithm: &str) -> Option<Arc<dyn JwsVerifier>> {
		(algorithm == "ES256").then(|| Arc::new(Es256Only) as _)
	}
}
impl JwsVerifier for Es256Only {
	fn algorithm(&self) -> &str {
		"ES256"
	}

	fn verify(&self, _: &Jwk, _: &[u8], _: &[u8]) -> Result<(), CryptoError> {
		Err(CryptoError::new("Not wired to a crypto backend."))
	}
}
