//! Single entry point that turns whatever the store holds into a usable bearer token.

// self
use crate::{
	_prelude::*,
	auth::{Scope, TokenSecret, TokenState},
	flows::OAuth2Client,
	http::TokenHttpClient,
};

impl<C> OAuth2Client<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Returns a bearer token, refreshing or logging in first when needed.
	///
	/// | State | Refresh token held | Action |
	/// | --- | --- | --- |
	/// | `ExpiringSoon` / `Expired` | yes | refresh |
	/// | `NoToken` / `Expired` | no | interactive login for `scope` |
	/// | `Valid` / `ExpiringSoon` | no | reuse |
	///
	/// Refresh failures are returned as-is; they never fall back to the interactive flow.
	pub async fn obtain_bearer_token(&self, scope: &Scope) -> Result<TokenSecret> {
		let record = self.inner.store.current();
		let state =
			TokenState::evaluate(record.as_ref(), OffsetDateTime::now_utc(), self.inner.refresh_threshold);
		let refresh_held = record
			.as_ref()
			.and_then(|record| record.refresh_token.as_ref())
			.is_some_and(|token| !token.is_empty());

		match (state, record) {
			(state, Some(_)) if state.needs_refresh() && refresh_held =>
				Ok(self.refresh_access_token().await?.access_token),
			(TokenState::Valid | TokenState::ExpiringSoon, Some(record)) => Ok(record.access_token),
			_ => self.authorize_interactively(scope).await,
		}
	}
}
