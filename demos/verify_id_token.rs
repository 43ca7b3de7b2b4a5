//! Verifies an HS256 ID token with the bundled `jsonwebtoken` backend.
//!
//! The mock provider signs with the client secret, so no asymmetric key material is needed;
//! the JWK set it publishes is empty.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::json;
use time::OffsetDateTime;
// self
use oidc_rp::{
	flows::{AuthorizationRequest, ReqwestRelyingParty},
	http::ReqwestHttpClient,
	jose::JsonWebTokenVerifier,
	provider::{ClientInformation, ProviderMetadata},
	reqwest::Client,
};

const CLIENT_ID: &str = "demo-client";
const CLIENT_SECRET: &str = "a-long-demo-secret-shared-with-the-provider";

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
		"response_types_supported": ["code", "id_token"],
		"subject_types_supported": ["public"],
		"id_token_signing_alg_values_supported": ["HS256", "RS256"],
	}))?;
	let client = ClientInformation::builder(CLIENT_ID)
		.client_secret(CLIENT_SECRET)
		.redirect_uri("https://rp.example/callback")
		.build()?;
	// httpmock serves a self-signed certificate.
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let rp = ReqwestRelyingParty::with_http_client(
		metadata,
		client,
		&JsonWebTokenVerifier,
		http_client,
	)?;
	let session = rp.start_authorization(AuthorizationRequest::new())?;
	let now = OffsetDateTime::now_utc().unix_timestamp();
	let id_token = jsonwebtoken::encode(
		&Header::new(Algorithm::HS256),
		&json!({
			"iss": base,
			"sub": "demo-user",
			"aud": CLIENT_ID,
			"exp": now + 300,
			"iat": now,
			"nonce": session.nonce(),
			"email": "demo@rp.example",
		}),
		&EncodingKey::from_secret(CLIENT_SECRET.as_bytes()),
	)?;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				json!({ "access_token": "demo-access", "token_type": "Bearer", "id_token": id_token })
					.to_string(),
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/jwks");
			then.status(200).header("content-type", "application/json").body(r#"{"keys":[]}"#);
		})
		.await;

	let tokens = rp.exchange_authorization_code(&session, "demo-code").await?;
	let options = session.verification_options().with_mandatory_claims(["email"]);
	let claims = rp.verify_id_token(&tokens, &options).await?;

	println!(
		"Verified {} for {:?} ({:?}).",
		claims.subject().unwrap_or_default(),
		claims.audiences(),
		claims.get_str("email"),
	);

	Ok(())
}
