//! Uploads a photo through the retrying, pre-authenticated fetch against a mock Google Photos
//! endpoint.
//!
//! The stored access token has already expired, so the first attempt refreshes it with the
//! held refresh token. The upload endpoint answers `503` once before accepting the bytes.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use photo_courier::{
	auth::{ProviderId, Scope, TokenRecord},
	fetch::{FetchRequest, FetchRetryOptions, PreAuthedFetch, make_fetch_with_retry},
	flows::OAuth2Client,
	provider::ProviderDescriptor,
	reqwest::{
		Client,
		header::{CONTENT_TYPE, HeaderValue},
	},
	store::{MemoryStore, TokenStore},
};
use time::{Duration, OffsetDateTime};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").body_includes("grant_type=refresh_token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"demo-fresh\",\"expires_in\":3599}");
		})
		.await;
	let mut busy_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/v1/uploads");
			then.status(503);
		})
		.await;
	let descriptor = ProviderDescriptor::builder(ProviderId::new("demo-photos")?)
		.endpoints(&server.url("/authorize"), &server.url("/token"))?
		.build()?;
	let store = Arc::new(MemoryStore::default());

	store
		.save(
			TokenRecord::new("demo-stale")
				.with_refresh_token("demo-refresh")
				.expiring_at(OffsetDateTime::now_utc() - Duration::minutes(5)),
		)
		.await?;

	let client = OAuth2Client::builder(
		descriptor,
		"demo-client",
		Url::parse("http://127.0.0.1:8085/oauth2callback")?,
	)
	.client_secret("demo-secret")
	.store(store)
	.build()?;
	let scope = Scope::new(["https://www.googleapis.com/auth/photoslibrary.appendonly"])?;
	let fetch = make_fetch_with_retry(
		PreAuthedFetch::new(client, Client::new(), scope),
		FetchRetryOptions::default().with_retry_delay(std::time::Duration::from_millis(250)),
	);
	let request = FetchRequest::post(Url::parse(&server.url("/v1/uploads"))?)
		.with_header(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"))
		.with_body(b"demo-jpeg-bytes".to_vec());
	let upload = async {
		let response = fetch.fetch(request).await?;

		Ok::<_, color_eyre::Report>(response.text().await?)
	};
	let recover = async {
		while busy_mock.calls_async().await == 0 {
			tokio::time::sleep(std::time::Duration::from_millis(10)).await;
		}

		busy_mock.delete_async().await;
		server
			.mock_async(|when, then| {
				when.method(POST).path("/v1/uploads").header("authorization", "Bearer demo-fresh");
				then.status(200).body("demo-upload-token");
			})
			.await
	};
	let (upload_token, accept_mock) = tokio::join!(upload, recover);

	println!("Upload token: {}.", upload_token?);

	refresh_mock.assert_async().await;
	accept_mock.assert_async().await;

	Ok(())
}
