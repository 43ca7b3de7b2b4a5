//! OpenID Connect relying-party core: grant-aware token requests, typed token responses, and a
//! strict ID Token verification pipeline with pluggable cryptography and transport.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod error;
pub mod flows;
pub mod http;
pub mod jose;
pub mod obs;
pub mod provider;
pub mod request;
pub mod token;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fixtures for tests; enabled via `cfg(test)` or the `test`
	//! crate feature.

	pub use crate::_prelude::*;

	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	use serde_json::{Map, Value, json};
	// self
	#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;
	use crate::{
		jose::{CryptoError, Jwk, JwsVerifier, KeySet, SignatureVerifier},
		provider::{ClientInformation, ProviderMetadata},
	};

	/// Issuer used by the fixtures.
	pub const ISSUER: &str = "https://idp.example";
	/// Client identifier used by the fixtures.
	pub const CLIENT_ID: &str = "abc";
	/// Client secret used by the fixtures.
	pub const CLIENT_SECRET: &str = "xyz";
	/// Redirect URI used by the fixtures.
	pub const REDIRECT_URI: &str = "https://rp.example/cb";
	/// Signature bytes the [`CountingVerifier`] accepts.
	pub const GOOD_SIGNATURE: &[u8] = b"good-signature";

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Raw discovery document with every required key.
	pub fn metadata_json() -> Map<String, Value> {
		let Value::Object(map) = json!({
			"issuer": ISSUER,
			"authorization_endpoint": "https://idp.example/authorize",
			"token_endpoint": "https://idp.example/token",
			"jwks_uri": "https://idp.example/jwks",
			"response_types_supported": ["code"],
			"subject_types_supported": ["public"],
			"id_token_signing_alg_values_supported": ["RS256"],
		}) else {
			unreachable!("Fixture literal is an object.")
		};

		map
	}

	/// Validated metadata built from [`metadata_json`].
	pub fn metadata_fixture() -> ProviderMetadata {
		ProviderMetadata::from_map(metadata_json()).expect("Metadata fixture should be valid.")
	}

	/// Confidential client (`abc` / `xyz`).
	pub fn confidential_client() -> ClientInformation {
		ClientInformation::builder(CLIENT_ID)
			.client_secret(CLIENT_SECRET)
			.redirect_uri(REDIRECT_URI)
			.build()
			.expect("Confidential client fixture should be valid.")
	}

	/// Public client (`abc`, no secret).
	pub fn public_client() -> ClientInformation {
		ClientInformation::builder(CLIENT_ID)
			.redirect_uri(REDIRECT_URI)
			.build()
			.expect("Public client fixture should be valid.")
	}

	/// Single RSA key with `kid` = `k1`.
	pub fn key_set_fixture() -> KeySet {
		KeySet::from_slice(
			br#"{"keys":[{"kty":"RSA","kid":"k1","use":"sig","alg":"RS256","n":"AQAB","e":"AQAB"}]}"#,
		)
		.expect("Key set fixture should be valid.")
	}

	/// Claims accepted by the fixtures at the current instant.
	pub fn valid_claims() -> Value {
		let now = OffsetDateTime::now_utc().unix_timestamp();

		json!({
			"iss": ISSUER,
			"sub": "user-1",
			"aud": CLIENT_ID,
			"exp": now + 600,
			"iat": now - 10,
		})
	}

	/// Encodes a compact JWS from a header, claims, and raw signature bytes.
	pub fn compact_token(header: &Value, claims: &Value, signature: &[u8]) -> String {
		format!(
			"{}.{}.{}",
			URL_SAFE_NO_PAD.encode(header.to_string()),
			URL_SAFE_NO_PAD.encode(claims.to_string()),
			URL_SAFE_NO_PAD.encode(signature),
		)
	}

	/// Signature verifier collaborator that accepts [`GOOD_SIGNATURE`] and counts calls.
	#[derive(Clone, Debug)]
	pub struct CountingVerifier {
		algorithms: Vec<&'static str>,
		calls: Arc<Mutex<usize>>,
	}
	impl CountingVerifier {
		/// Supports the provided algorithm names.
		pub fn new(algorithms: &[&'static str]) -> Self {
			Self { algorithms: algorithms.to_vec(), calls: Default::default() }
		}

		/// Number of `verify` invocations across every handed-out algorithm.
		pub fn calls(&self) -> usize {
			*self.calls.lock()
		}
	}
	impl Default for CountingVerifier {
		fn default() -> Self {
			Self::new(&["RS256", "HS256"])
		}
	}
	impl SignatureVerifier for CountingVerifier {
		fn jws_verifier(&self, algorithm: &str) -> Option<Arc<dyn JwsVerifier>> {
			let name = self.algorithms.iter().find(|name| **name == algorithm)?;

			Some(Arc::new(CountingAlgorithm { name, calls: self.calls.clone() }))
		}
	}

	#[derive(Debug)]
	struct CountingAlgorithm {
		name: &'static str,
		calls: Arc<Mutex<usize>>,
	}
	impl JwsVerifier for CountingAlgorithm {
		fn algorithm(&self) -> &str {
			self.name
		}

		fn verify(
			&self,
			_key: &Jwk,
			_signing_input: &[u8],
			signature: &[u8],
		) -> Result<(), CryptoError> {
			*self.calls.lock() += 1;

			if signature == GOOD_SIGNATURE {
				Ok(())
			} else {
				Err(CryptoError::new("Signature mismatch."))
			}
		}
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
