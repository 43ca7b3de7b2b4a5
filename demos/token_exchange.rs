//! Walks an Authorization Code exchange against a local mock provider using the default reqwest
//! transport, then redeems the refresh token it returned.

// std
use std::sync::Arc;
// crates.io
use color_eyre::{Result, eyre::eyre};
use httpmock::prelude::*;
use serde_json::json;
// self
use oidc_rp::{
	auth::ScopeList,
	flows::{AuthorizationRequest, ReqwestRelyingParty},
	http::ReqwestHttpClient,
	jose::{CryptoError, Jwk, JwsVerifier, SignatureVerifier},
	provider::{ClientInformation, ProviderMetadata},
	reqwest::Client,
};

/// Placeholder collaborator; this demo never verifies an ID token.
struct NoVerification;
impl SignatureVerifier for NoVerification {
	fn jws_verifier(&self, algorithm: &str) -> Option<Arc<dyn JwsVerifier>> {
		(algorithm == "RS256").then(|| Arc::new(Rejecting) as _)
	}
}

struct Rejecting;
impl JwsVerifier for Rejecting {
	fn algorithm(&self) -> &str {
		"RS256"
	}

	fn verify(&self, _: &Jwk, _: &[u8], _: &[u8]) -> Result<(), CryptoError> {
		Err(CryptoError::new("Verification is out of scope for this demo."))
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let base = server.base_url();
	let metadata = ProviderMetadata::from_value(json!({
		"issuer": base,
		"authorization_endpoint": format!("{base}/authorize"),
		"token_endpoint": format!("{base}/token"),
		"jwks_uri": format!("{base}/jwks"),
		"response_types_supported": ["code"],
		"subject_types_supported": ["public"],
		"id_token_signing_alg_values_supported": ["RS256"],
		"code_challenge_methods_supported": ["S256"],
	}))?;
	let client = ClientInformation::builder("demo-client")
		.client_secret("demo-secret")
		.redirect_uri("https://rp.example/callback")
		.build()?;
	// httpmock serves a self-signed certificate.
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let rp =
		ReqwestRelyingParty::with_http_client(metadata, client, &NoVerification, http_client)?;
	let session = rp.start_authorization(
		AuthorizationRequest::new()
			.with_scope(ScopeList::parse("profile offline_access"))
			.with_param("prompt", "consent"),
	)?;

	println!("Send the user to: {}", session.authorize_url());

	let code_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").form_urlencoded_tuple("code", "demo-code");
			then.status(200).header("content-type", "application/json").body(
				r#"{"access_token":"demo-access","refresh_token":"demo-refresh","token_type":"Bearer","expires_in":900}"#,
			);
		})
		.await;

	// The redirect handler would receive these two values.
	session.validate_state(session.state())?;

	let tokens = rp.exchange_authorization_code(&session, "demo-code").await?;

	code_mock.assert_async().await;

	println!("Issued {:?} expiring in {:?}.", tokens.token_type(), tokens.expires_in());

	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").form_urlencoded_tuple("grant_type", "refresh_token");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"demo-access-2","token_type":"Bearer","scope":"profile"}"#);
		})
		.await;
	let refresh_token = tokens.refresh_token().ok_or_else(|| eyre!("No refresh token issued."))?;
	let refreshed = rp.refresh(refresh_token, Some(&ScopeList::parse("profile"))).await?;

	refresh_mock.assert_async().await;

	println!("Refreshed; granted scope: {:?}.", refreshed.scope());

	Ok(())
}
