//! Pre-authenticated requests against the photo and file APIs.
//!
//! [`PreAuthedFetch`] obtains a bearer token before every request and sends the request
//! through a plain reqwest client. [`make_fetch_with_retry`] layers a [`Retryable`] on top
//! that retries transient failures and retryable statuses, re-acquiring the token on each
//! attempt.
//!
//! [`Retryable`]: crate::retry::Retryable

mod retry;

pub use retry::*;

// std
use std::io::ErrorKind;
// crates.io
use reqwest::{
	Method, Response,
	header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
};
// self
use crate::{
	_prelude::*,
	auth::Scope,
	error::{ConfigError, TransientError, TransportError},
	flows::OAuth2Client,
	http::TokenHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Request handed to [`PreAuthedFetch::fetch`].
///
/// Requests are plain data so retries can replay them.
#[derive(Clone, Debug)]
pub struct FetchRequest {
	/// HTTP method.
	pub method: Method,
	/// Target URL.
	pub url: Url,
	/// Caller headers; `Authorization` is always overwritten.
	pub headers: HeaderMap,
	/// Request body, if any.
	pub body: Option<Vec<u8>>,
}
impl FetchRequest {
	/// Creates a request without headers or body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None }
	}

	/// Shorthand for a `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Shorthand for a `POST` request.
	pub fn post(url: Url) -> Self {
		Self::new(Method::POST, url)
	}

	/// Adds or replaces a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets the request body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}
}

/// Sends requests with a bearer token obtained from an [`OAuth2Client`].
pub struct PreAuthedFetch<C>
where
	C: ?Sized + TokenHttpClient,
{
	client: OAuth2Client<C>,
	http: ReqwestClient,
	scope: Scope,
}
impl<C> PreAuthedFetch<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Wraps `http` so every request carries a token for `scope` from `client`.
	pub fn new(client: OAuth2Client<C>, http: ReqwestClient, scope: Scope) -> Self {
		Self { client, http, scope }
	}

	/// Token manager backing this fetcher.
	pub fn client(&self) -> &OAuth2Client<C> {
		&self.client
	}

	/// Obtains a bearer token and sends `request` with it.
	///
	/// Status codes are not inspected here. Send failures that [`is_network_error`] accepts
	/// become [`TransientError::Network`]; any other send failure is a
	/// [`TransportError::Network`].
	pub async fn fetch(&self, request: FetchRequest) -> Result<Response> {
		const KIND: FlowKind = FlowKind::Fetch;

		let span = FlowSpan::new(KIND, "fetch");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.send_authorized(request)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn send_authorized(&self, request: FetchRequest) -> Result<Response> {
		let token = self.client.obtain_bearer_token(&self.scope).await?;
		let mut authorization = HeaderValue::from_str(&token.bearer_header())
			.map_err(|e| ConfigError::from(oauth2::http::Error::from(e)))?;

		authorization.set_sensitive(true);

		let FetchRequest { method, url, mut headers, body } = request;

		headers.insert(AUTHORIZATION, authorization);

		let mut builder = self.http.request(method, url).headers(headers);

		if let Some(body) = body {
			builder = builder.body(body);
		}

		builder.send().await.map_err(classify_send_error)
	}
}
impl<C> Clone for PreAuthedFetch<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn clone(&self) -> Self {
		Self { client: self.client.clone(), http: self.http.clone(), scope: self.scope.clone() }
	}
}
impl<C> Debug for PreAuthedFetch<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PreAuthedFetch")
			.field("client", &self.client)
			.field("scope", &self.scope)
			.finish_non_exhaustive()
	}
}

/// Returns `true` for send failures worth retrying: timeouts, refused or failed
/// connections, and I/O errors of kind `TimedOut`, `NetworkDown`, or `BrokenPipe`
/// anywhere in the source chain.
pub fn is_network_error(error: &ReqwestError) -> bool {
	if error.is_timeout() || error.is_connect() {
		return true;
	}

	let mut source = StdError::source(error);

	while let Some(inner) = source {
		if let Some(io) = inner.downcast_ref::<std::io::Error>()
			&& matches!(io.kind(), ErrorKind::TimedOut | ErrorKind::NetworkDown | ErrorKind::BrokenPipe)
		{
			return true;
		}

		source = inner.source();
	}

	false
}

fn classify_send_error(error: ReqwestError) -> Error {
	if is_network_error(&error) {
		TransientError::network(error).into()
	} else {
		TransportError::network(error).into()
	}
}
