//! Transport seam for token and key-set requests.
//!
//! The crate never talks to the network directly. [`TokenHttpClient`] hands out `oauth2`
//! [`AsyncHttpClient`] handles; [`ReqwestHttpClient`] is the default implementation behind the
//! `reqwest` feature. Anything that can turn an [`HttpRequest`] into an [`HttpResponse`] can be
//! plugged in instead, which is how tests script provider responses.

pub use oauth2;

// std
use std::ops::Deref;
// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{
		Method, Request,
		header::{ACCEPT, CONTENT_TYPE},
	},
};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Abstraction over HTTP transports used for provider calls.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by every
/// relying-party instance. The handles they return own whatever state the request needs so the
/// request future stays `Send` for the lifetime of the call.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle executing a single request.
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Returns a handle for the next request.
	fn handle(&self) -> Self::Handle;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Token endpoints answer directly, so a custom [`ReqwestClient`] should disable redirect
/// following before it is wrapped.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client that never follows redirects.
	pub fn without_redirects() -> Result<Self, ConfigError> {
		let client =
			ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = ReqwestHandle;
	type TransportError = ReqwestError;

	fn handle(&self) -> Self::Handle {
		ReqwestHandle(self.0.clone())
	}
}

/// Handle returned by [`ReqwestHttpClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHandle(ReqwestClient);
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for ReqwestHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = self.0.clone();

		Box::pin(async move {
			let response =
				client.execute(request.try_into().map_err(Box::new)?).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Sends `request` through a fresh handle, classifying transport failures.
///
/// Request construction problems surface as [`ConfigError::HttpRequest`]; everything else the
/// transport reports is wrapped in [`TransportError::Network`] with its source intact.
pub(crate) async fn execute<C>(client: &C, request: HttpRequest) -> Result<HttpResponse>
where
	C: ?Sized + TokenHttpClient,
{
	let endpoint = request.uri().to_string();
	let handle = client.handle();

	handle.call(request).await.map_err(|e| match e {
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		other => TransportError::network(endpoint, other).into(),
	})
}

/// `GET` request asking for a JSON document.
pub(crate) fn json_get(uri: &Url) -> Result<HttpRequest, ConfigError> {
	Ok(Request::builder()
		.method(Method::GET)
		.uri(uri.as_str())
		.header(ACCEPT, "application/json")
		.body(Vec::new())?)
}

/// Returns true when the response declares a JSON media type (or none at all).
pub(crate) fn is_json(response: &HttpResponse) -> bool {
	response
		.headers()
		.get(CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.map(|value| {
			let media = value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();

			media == "application/json" || media.ends_with("+json")
		})
		.unwrap_or(true)
}
