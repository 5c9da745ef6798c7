//! Networking core for moving photos between cloud accounts: retryable calls with
//! configurable backoff, an OAuth 2.0 bearer-token lifecycle manager, and a
//! pre-authenticated request wrapper composed from both.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod error;
#[cfg(feature = "reqwest")] pub mod fetch;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod retry;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::net::TcpListener as StdTcpListener;
	// self
	use crate::{
		auth::{ProviderId, TokenRecord, TokenSecret},
		flows::{AuthorizationLauncher, LaunchFuture, OAuth2Client},
		http::ReqwestHttpClient,
		provider::ProviderDescriptor,
		store::MemoryStore,
	};

	/// Client type alias used by reqwest-backed integration tests.
	pub type ReqwestTestClient = OAuth2Client<ReqwestHttpClient>;

	/// Launcher that never opens a browser; it only counts launches and remembers the last URL.
	#[derive(Clone, Debug, Default)]
	pub struct RecordingLauncher {
		launched: Arc<Mutex<Vec<Url>>>,
	}
	impl RecordingLauncher {
		/// URLs handed to the launcher so far.
		pub fn launched(&self) -> Vec<Url> {
			self.launched.lock().clone()
		}
	}
	impl AuthorizationLauncher for RecordingLauncher {
		fn launch<'a>(&'a self, url: &'a Url) -> LaunchFuture<'a> {
			self.launched.lock().push(url.clone());

			Box::pin(async { Ok(()) })
		}
	}

	/// Launcher that plays the user's browser: it follows the authorization URL's
	/// `redirect_uri` back to the local callback listener with a fixed code.
	#[derive(Clone, Debug)]
	pub struct CallbackLauncher {
		code: String,
		stray_request_first: bool,
		launched: Arc<Mutex<Vec<Url>>>,
	}
	impl CallbackLauncher {
		/// Creates a launcher that answers every authorization with `code`.
		pub fn with_code(code: impl Into<String>) -> Self {
			Self { code: code.into(), stray_request_first: false, launched: Default::default() }
		}

		/// Hits an unrelated path on the listener before delivering the code.
		pub fn with_stray_request(mut self) -> Self {
			self.stray_request_first = true;

			self
		}

		/// URLs handed to the launcher so far.
		pub fn launched(&self) -> Vec<Url> {
			self.launched.lock().clone()
		}
	}
	impl AuthorizationLauncher for CallbackLauncher {
		fn launch<'a>(&'a self, url: &'a Url) -> LaunchFuture<'a> {
			self.launched.lock().push(url.clone());

			let redirect = url
				.query_pairs()
				.find(|(key, _)| key == "redirect_uri")
				.and_then(|(_, value)| Url::parse(&value).ok())
				.expect("Authorization URL should carry a parseable redirect_uri.");
			let code = self.code.clone();
			let stray = self.stray_request_first;

			tokio::spawn(async move {
				let client = ReqwestClient::new();

				if stray {
					let mut favicon = redirect.clone();

					favicon.set_path("/favicon.ico");

					let response =
						client.get(favicon).send().await.expect("Stray request should connect.");

					assert_eq!(response.status().as_u16(), 404);
				}

				let mut callback = redirect;

				callback.query_pairs_mut().append_pair("code", &code);
				client.get(callback).send().await.expect("Callback request should connect.");
			});

			Box::pin(async { Ok(()) })
		}
	}

	/// Returns a loopback redirect URL on a port that was free a moment ago.
	pub fn free_redirect_url(path: &str) -> Url {
		let port = StdTcpListener::bind("127.0.0.1:0")
			.and_then(|listener| listener.local_addr())
			.expect("Failed to reserve a loopback port for the callback listener.")
			.port();

		Url::parse(&format!("http://127.0.0.1:{port}{path}"))
			.expect("Loopback redirect URL should parse.")
	}

	/// Builds a loopback provider descriptor pointing at a mock server base URL.
	pub fn mock_descriptor(base: &str) -> ProviderDescriptor {
		let id = ProviderId::new("mock").expect("Mock provider identifier should be valid.");

		ProviderDescriptor::builder(id)
			.authorization_endpoint(
				Url::parse(&format!("{base}/authorize"))
					.expect("Mock authorization endpoint should parse."),
			)
			.token_endpoint(
				Url::parse(&format!("{base}/token")).expect("Mock token endpoint should parse."),
			)
			.build()
			.expect("Mock provider descriptor should build.")
	}

	/// Builds a record whose access token expires `expires_in` from now.
	pub fn record_expiring_in(access: &str, refresh: Option<&str>, expires_in: Duration) -> TokenRecord {
		TokenRecord {
			access_token: TokenSecret::new(access),
			refresh_token: refresh.map(TokenSecret::new),
			expiry_date: Some(OffsetDateTime::now_utc() + expires_in),
		}
	}

	/// Constructs a reqwest-backed client with an in-memory store and the provided launcher.
	pub fn build_reqwest_test_client(
		descriptor: ProviderDescriptor,
		redirect_url: Url,
		launcher: Arc<dyn AuthorizationLauncher>,
	) -> (ReqwestTestClient, Arc<MemoryStore>) {
		let store = Arc::new(MemoryStore::default());
		let client = OAuth2Client::builder(descriptor, "client-id", redirect_url)
			.client_secret("client-secret")
			.store(store.clone())
			.launcher(launcher)
			.build()
			.expect("Test OAuth client should build.");

		(client, store)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
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
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
