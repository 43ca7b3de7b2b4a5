#![allow(dead_code)]

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Value, json};
use time::OffsetDateTime;
// self
#[cfg(feature = "reqwest")] use oidc_rp::{http::ReqwestHttpClient, reqwest::Client};
use oidc_rp::{
	jose::{CryptoError, Jwk, JwsVerifier, SignatureVerifier},
	provider::{ClientInformation, ProviderMetadata},
};

pub const CLIENT_ID: &str = "abc";
pub const CLIENT_SECRET: &str = "xyz";
pub const REDIRECT_URI: &str = "https://rp.example/cb";
pub const GOOD_SIGNATURE: &[u8] = b"good-signature";
pub const JWKS_BODY: &str =
	r#"{"keys":[{"kty":"RSA","kid":"k1","use":"sig","alg":"RS256","n":"AQAB","e":"AQAB"}]}"#;

/// Reqwest transport that accepts the self-signed certificates served by `httpmock`.
#[cfg(feature = "reqwest")]
pub fn test_reqwest_http_client() -> ReqwestHttpClient {
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

/// Discovery document whose endpoints live under `base`.
pub fn metadata(base: &str) -> ProviderMetadata {
	ProviderMetadata::from_value(json!({
		"issuer": base,
		"authorization_endpoint": format!("{base}/authorize"),
		"token_endpoint": format!("{base}/token"),
		"jwks_uri": format!("{base}/jwks"),
		"response_types_supported": ["code"],
		"subject_types_supported": ["public"],
		"id_token_signing_alg_values_supported": ["RS256"],
	}))
	.expect("Metadata fixture should be valid.")
}

pub fn confidential_client() -> ClientInformation {
	ClientInformation::builder(CLIENT_ID)
		.client_secret(CLIENT_SECRET)
		.redirect_uri(REDIRECT_URI)
		.build()
		.expect("Confidential client fixture should be valid.")
}

pub fn public_client() -> ClientInformation {
	ClientInformation::builder(CLIENT_ID)
		.redirect_uri(REDIRECT_URI)
		.build()
		.expect("Public client fixture should be valid.")
}

/// RS256 ID token for `issuer`, signed with [`GOOD_SIGNATURE`] unless `signature` overrides it.
pub fn id_token(issuer: &str, nonce: Option<&str>, signature: &[u8]) -> String {
	let now = OffsetDateTime::now_utc().unix_timestamp();
	let mut claims = json!({
		"iss": issuer,
		"sub": "user-1",
		"aud": CLIENT_ID,
		"exp": now + 600,
		"iat": now - 10,
	});

	if let (Some(nonce), Value::Object(map)) = (nonce, &mut claims) {
		map.insert("nonce".into(), nonce.into());
	}

	let header = json!({ "alg": "RS256", "kid": "k1" });

	format!(
		"{}.{}.{}",
		URL_SAFE_NO_PAD.encode(header.to_string()),
		URL_SAFE_NO_PAD.encode(claims.to_string()),
		URL_SAFE_NO_PAD.encode(signature),
	)
}

/// RS256-only collaborator that accepts [`GOOD_SIGNATURE`] and counts calls.
#[derive(Clone, Debug, Default)]
pub struct AcceptingVerifier {
	calls: Arc<AtomicUsize>,
}
impl AcceptingVerifier {
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl SignatureVerifier for AcceptingVerifier {
	fn jws_verifier(&self, algorithm: &str) -> Option<Arc<dyn JwsVerifier>> {
		(algorithm == "RS256")
			.then(|| Arc::new(Rs256 { calls: self.calls.clone() }) as Arc<dyn JwsVerifier>)
	}
}

struct Rs256 {
	calls: Arc<AtomicUsize>,
}
impl JwsVerifier for Rs256 {
	fn algorithm(&self) -> &str {
		"RS256"
	}

	fn verify(&self, _key: &Jwk, _signing_input: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		if signature == GOOD_SIGNATURE {
			Ok(())
		} else {
			Err(CryptoError::new("Signature mismatch."))
		}
	}
}
