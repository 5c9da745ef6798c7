//! Authorization-code flow: URL generation, code exchange, and the interactive login.

// crates.io
use percent_encoding::percent_decode_str;
// self
use crate::{
	_prelude::*,
	auth::{Scope, TokenRecord, TokenSecret},
	flows::{CallbackListener, OAuth2Client, common},
	http::TokenHttpClient,
	oauth::{self, CanonicalQuery, TokenResponse},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Parameters of an authorization URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUrlRequest {
	/// Scopes to request; omitted from the URL when empty.
	pub scope: Scope,
	/// `access_type` parameter (`offline` asks for a refresh token).
	pub access_type: Option<String>,
	/// `prompt` parameter (`consent` forces the consent screen).
	pub prompt: Option<String>,
	/// `response_type` parameter.
	pub response_type: String,
	/// Additional provider-specific parameters.
	pub extra: BTreeMap<String, String>,
}
impl AuthUrlRequest {
	/// Plain code request for `scope`.
	pub fn new(scope: Scope) -> Self {
		Self {
			scope,
			access_type: None,
			prompt: None,
			response_type: "code".into(),
			extra: BTreeMap::new(),
		}
	}

	/// Code request that also asks for a refresh token and forces the consent screen.
	pub fn offline(scope: Scope) -> Self {
		Self::new(scope).with_access_type("offline").with_prompt("consent")
	}

	/// Sets the `access_type` parameter.
	pub fn with_access_type(mut self, access_type: impl Into<String>) -> Self {
		self.access_type = Some(access_type.into());

		self
	}

	/// Sets the `prompt` parameter.
	pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
		self.prompt = Some(prompt.into());

		self
	}

	/// Adds a provider-specific parameter; standard parameters win on conflicts.
	pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.extra.insert(key.into(), value.into());

		self
	}
}

impl<C> OAuth2Client<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Builds the authorization URL with a canonical, key-sorted query.
	///
	/// Parameters already present on the authorization endpoint are kept unless the
	/// request overrides them.
	pub fn generate_auth_url(&self, request: &AuthUrlRequest) -> Url {
		let mut url = self.inner.descriptor.endpoints.authorization.clone();
		let mut query: CanonicalQuery =
			url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();

		for (key, value) in &request.extra {
			query.insert(key.as_str(), value.as_str());
		}
		if let Some(access_type) = &request.access_type {
			query.insert("access_type", access_type.as_str());
		}
		if let Some(prompt) = &request.prompt {
			query.insert("prompt", prompt.as_str());
		}
		if let Some(scope) =
			common::format_scope(&request.scope, self.inner.descriptor.quirks.scope_delimiter)
		{
			query.insert("scope", scope);
		}

		query.insert("client_id", self.inner.client_id.as_str());
		query.insert("redirect_uri", self.inner.redirect_url.as_str());
		query.insert("response_type", request.response_type.as_str());
		url.set_query(Some(&query.encode()));

		url
	}

	/// Exchanges an authorization code for a token record and saves it.
	///
	/// The code is percent-decoded first, since it may arrive straight from a redirect URL.
	/// A non-2xx answer yields [`Error::AuthorizationRejected`].
	pub async fn exchange_auth_code_for_token(&self, code: &str) -> Result<TokenRecord> {
		const KIND: FlowKind = FlowKind::Authorization;

		let span = FlowSpan::new(KIND, "exchange_auth_code_for_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.exchange_code(code)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Runs the interactive login and returns the new access token.
	///
	/// Concurrent logins queue on one lock. A caller that acquires it after another login
	/// stored a usable token returns that token instead of prompting again.
	pub async fn authorize_interactively(&self, scope: &Scope) -> Result<TokenSecret> {
		let seen = self.inner.store.access_token();
		let _login = self.inner.login_guard.lock().await;

		if let Some(current) = common::usable_access_token(
			self.inner.store.current(),
			OffsetDateTime::now_utc(),
			self.inner.refresh_threshold,
		) && seen.as_ref() != Some(&current)
		{
			return Ok(current);
		}

		let span = FlowSpan::new(FlowKind::Authorization, "authorize_interactively");
		let record = span.instrument(self.login(scope)).await?;

		Ok(record.access_token)
	}

	async fn login(&self, scope: &Scope) -> Result<TokenRecord> {
		let listener = CallbackListener::bind(&self.inner.redirect_url).await?;
		let url = self.generate_auth_url(&AuthUrlRequest::offline(scope.clone()));

		self.inner.launcher.launch(&url).await?;

		let code = match self.inner.callback_timeout {
			Some(limit) => tokio::time::timeout(limit, listener.accept_code()).await.map_err(|_| {
				Error::Callback { reason: format!("no authorization code arrived within {limit:?}") }
			})??,
			None => listener.accept_code().await?,
		};

		self.exchange_auth_code_for_token(&code).await
	}

	async fn exchange_code(&self, code: &str) -> Result<TokenRecord> {
		let code = percent_decode_str(code).decode_utf8_lossy();
		let form = oauth::authorization_code_form(
			&self.inner.client_id,
			self.inner.client_secret.as_ref(),
			&code,
			&self.inner.redirect_url,
		);
		let reply = oauth::post_form::<C, TokenResponse>(
			self.inner.http_client.as_ref(),
			&self.inner.descriptor.endpoints.token,
			&form,
		)
		.await?;
		let status = reply.status.as_u16();

		if !reply.is_success() {
			return Err(Error::AuthorizationRejected { status, status_text: reply.status_text() });
		}

		let record = reply
			.body
			.and_then(|body| body.into_record(OffsetDateTime::now_utc(), None))
			.ok_or(Error::MalformedTokenResponse { status })?;

		self.inner.store.save(record.clone()).await?;

		Ok(record)
	}
}
