//! Token-endpoint plumbing: form bodies, tolerant JSON parsing, and response mapping.
//!
//! Everything here is transport-agnostic; requests are built as [`oauth2::HttpRequest`]
//! values and executed through [`TokenHttpClient`].

pub mod query;

pub use oauth2;
pub use query::*;

// crates.io
use oauth2::{
	ClientId, ClientSecret, HttpRequest,
	http::{
		HeaderValue, Method, StatusCode,
		header::{ACCEPT, CONTENT_TYPE},
	},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, TokenSecret},
	error::ConfigError,
	http::TokenHttpClient,
	obs,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// JSON body returned by token endpoints.
///
/// Every field is optional so a partial body still parses; callers decide which
/// omissions are fatal.
#[derive(Clone, Default, Deserialize)]
pub struct TokenResponse {
	/// Newly issued access token.
	#[serde(default)]
	pub access_token: Option<String>,
	/// Newly issued refresh token, if the provider rotated it.
	#[serde(default)]
	pub refresh_token: Option<String>,
	/// Lifetime of the access token in seconds.
	#[serde(default)]
	pub expires_in: Option<u64>,
}
impl TokenResponse {
	/// Converts the response into a record, turning `expires_in` into an absolute expiry.
	///
	/// `fallback_refresh` is kept when the response carries no refresh token. Returns `None`
	/// when the access token is missing or empty.
	pub fn into_record(
		self,
		now: OffsetDateTime,
		fallback_refresh: Option<TokenSecret>,
	) -> Option<TokenRecord> {
		let access_token = self.access_token.filter(|token| !token.is_empty())?;
		let refresh_token = self
			.refresh_token
			.filter(|token| !token.is_empty())
			.map(TokenSecret::new)
			.or(fallback_refresh);
		let expiry_date = self
			.expires_in
			.and_then(|secs| i64::try_from(secs).ok())
			.and_then(|secs| now.checked_add(Duration::seconds(secs)));

		Some(TokenRecord { access_token: TokenSecret::new(access_token), refresh_token, expiry_date })
	}
}
impl Debug for TokenResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenResponse")
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_in", &self.expires_in)
			.finish()
	}
}

/// Status plus the parsed body of a token-endpoint answer.
#[derive(Debug)]
pub struct EndpointReply<T> {
	/// HTTP status returned by the endpoint.
	pub status: StatusCode,
	/// Parsed JSON body; `None` when the body was not valid JSON for `T`.
	pub body: Option<T>,
}
impl<T> EndpointReply<T> {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Canonical reason phrase for the status, or an empty string for unknown codes.
	pub fn status_text(&self) -> String {
		self.status.canonical_reason().unwrap_or_default().to_owned()
	}
}

/// Form body for the authorization-code exchange.
pub fn authorization_code_form(
	client_id: &ClientId,
	client_secret: Option<&ClientSecret>,
	code: &str,
	redirect_url: &Url,
) -> CanonicalQuery {
	with_client_credentials(client_id, client_secret)
		.with("code", code)
		.with("grant_type", "authorization_code")
		.with("redirect_uri", redirect_url.as_str())
}

/// Form body for the refresh-token exchange.
pub fn refresh_token_form(
	client_id: &ClientId,
	client_secret: Option<&ClientSecret>,
	refresh_token: &TokenSecret,
) -> CanonicalQuery {
	with_client_credentials(client_id, client_secret)
		.with("grant_type", "refresh_token")
		.with("refresh_token", refresh_token.expose())
}

/// POSTs `form` to `url` and parses the JSON answer, whatever the status.
pub async fn post_form<C, T>(http: &C, url: &Url, form: &CanonicalQuery) -> Result<EndpointReply<T>>
where
	C: ?Sized + TokenHttpClient,
	T: DeserializeOwned,
{
	let request = build_form_request(url, form)?;
	let response = http.execute(request).await?;
	let status = response.status();
	let body = parse_json(url, response.body());

	Ok(EndpointReply { status, body })
}

/// Parses `bytes` as JSON, logging and discarding bodies that do not fit `T`.
pub fn parse_json<T>(url: &Url, bytes: &[u8]) -> Option<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(bytes);

	match serde_path_to_error::deserialize(&mut deserializer) {
		Ok(value) => Some(value),
		Err(e) => {
			obs::record_malformed_body(url, &e.path().to_string(), e.inner());

			None
		},
	}
}

fn with_client_credentials(
	client_id: &ClientId,
	client_secret: Option<&ClientSecret>,
) -> CanonicalQuery {
	let query = CanonicalQuery::new().with("client_id", client_id.as_str());

	match client_secret {
		Some(secret) => query.with("client_secret", secret.secret().as_str()),
		None => query,
	}
}

fn build_form_request(url: &Url, form: &CanonicalQuery) -> Result<HttpRequest> {
	oauth2::http::Request::builder()
		.method(Method::POST)
		.uri(url.as_str())
		.header(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE))
		.header(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE))
		.body(form.encode().into_bytes())
		.map_err(|e| ConfigError::from(e).into())
}
