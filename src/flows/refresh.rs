//! De-duplicated refresh-token exchanges.
//!
//! [`OAuth2Client::refresh_access_token`] keys in-flight refreshes by the refresh token
//! value. The first caller starts a `grant_type=refresh_token` exchange; every caller that
//! arrives while it runs joins the same shared future and receives the same record or the
//! same [`RefreshError`]. The entry is removed as soon as the exchange settles, so the next
//! refresh always reaches the token endpoint again.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use futures::FutureExt;
// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, TokenSecret},
	error::RefreshError,
	flows::{ClientInner, OAuth2Client, SharedRefresh},
	http::TokenHttpClient,
	oauth::{self, TokenResponse},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl<C> OAuth2Client<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Exchanges the held refresh token for a new record and saves it.
	///
	/// A non-2xx answer surfaces as [`RefreshError::Rejected`] and leaves the stored record
	/// untouched; refresh failures never fall back to the interactive flow.
	pub async fn refresh_access_token(&self) -> Result<TokenRecord> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh_access_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.join_or_start_refresh()).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result.map_err(Error::from)
	}

	async fn join_or_start_refresh(&self) -> Result<TokenRecord, RefreshError> {
		let refresh_token = self
			.inner
			.store
			.refresh_token()
			.filter(|token| !token.is_empty())
			.ok_or(RefreshError::MissingRefreshToken)?;
		let shared = self.in_flight_refresh(refresh_token);

		shared.await
	}

	fn in_flight_refresh(&self, refresh_token: TokenSecret) -> SharedRefresh {
		let key = refresh_token.expose().to_owned();
		let mut in_flight = self.inner.in_flight.lock();

		if let Some(existing) = in_flight.get(&key) {
			self.inner.refresh_metrics.record_coalesced();
			obs::record_flow_outcome(FlowKind::Refresh, FlowOutcome::Coalesced);

			return existing.clone();
		}

		let inner = self.inner.clone();
		let settled_key = key.clone();
		let refresh = async move {
			let result = inner.refresh_uncached(refresh_token).await;

			inner.in_flight.lock().remove(&settled_key);

			result
		}
		.boxed()
		.shared();

		in_flight.insert(key, refresh.clone());

		refresh
	}
}

impl<C> ClientInner<C>
where
	C: ?Sized + TokenHttpClient,
{
	async fn refresh_uncached(&self, refresh_token: TokenSecret) -> Result<TokenRecord, RefreshError> {
		self.refresh_metrics.record_attempt();

		let result = self.exchange_refresh_token(refresh_token).await;

		match &result {
			Ok(_) => self.refresh_metrics.record_success(),
			Err(_) => self.refresh_metrics.record_failure(),
		}

		result
	}

	async fn exchange_refresh_token(
		&self,
		refresh_token: TokenSecret,
	) -> Result<TokenRecord, RefreshError> {
		let form =
			oauth::refresh_token_form(&self.client_id, self.client_secret.as_ref(), &refresh_token);
		let reply = oauth::post_form::<C, TokenResponse>(
			self.http_client.as_ref(),
			&self.descriptor.endpoints.token,
			&form,
		)
		.await
		.map_err(|e| RefreshError::Transport { message: e.to_string() })?;

		if !reply.is_success() {
			return Err(RefreshError::Rejected {
				status: reply.status.as_u16(),
				status_text: reply.status_text(),
			});
		}

		let fallback = self.descriptor.quirks.retain_refresh_token.then_some(refresh_token);
		let record = reply
			.body
			.and_then(|body| body.into_record(OffsetDateTime::now_utc(), fallback))
			.ok_or(RefreshError::MalformedResponse)?;

		self.store.save(record.clone()).await.map_err(RefreshError::Storage)?;

		Ok(record)
	}
}
