//! Bearer-token lifecycle orchestration for a single provider account.
//!
//! [`OAuth2Client`] owns the client credentials, the provider descriptor, the token store,
//! the transport, and the authorization launcher. Every operation reads the held record
//! through the store, so clones of one client observe the same state while two separately
//! built clients share nothing.

pub mod auth_code;
pub mod bearer;
pub mod callback;
pub mod launcher;
pub mod refresh;

mod common;

pub use auth_code::*;
pub use callback::*;
pub use launcher::*;
pub use refresh::*;

// crates.io
use futures::future::{BoxFuture, Shared};
use oauth2::{ClientId, ClientSecret};
// self
use crate::{
	_prelude::*,
	auth::{DEFAULT_REFRESH_THRESHOLD, TokenSecret, TokenState},
	error::{ConfigError, RefreshError},
	http::TokenHttpClient,
	provider::{self, ProviderDescriptor},
	store::{MemoryStore, TokenStore},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

type SharedRefresh = Shared<BoxFuture<'static, Result<crate::auth::TokenRecord, RefreshError>>>;
type TransportFactory<C> = fn() -> Result<Arc<C>, ConfigError>;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestOAuth2Client = OAuth2Client<ReqwestHttpClient>;

/// OAuth 2.0 client managing one bearer token for one provider account.
///
/// Cloning is cheap and clones share everything: the store, the in-flight refresh map, and
/// the interactive-login lock.
pub struct OAuth2Client<C>
where
	C: ?Sized + TokenHttpClient,
{
	inner: Arc<ClientInner<C>>,
}
impl<C> OAuth2Client<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Starts a builder that reuses the caller-provided transport.
	pub fn with_http_client(
		descriptor: ProviderDescriptor,
		client_id: impl Into<String>,
		redirect_url: Url,
		http_client: impl Into<Arc<C>>,
	) -> OAuth2ClientBuilder<C> {
		OAuth2ClientBuilder::new(
			descriptor,
			client_id.into(),
			redirect_url,
			Transport::Provided(http_client.into()),
		)
	}

	/// Lifecycle state of the held token right now.
	pub fn state(&self) -> TokenState {
		self.state_at(OffsetDateTime::now_utc())
	}

	/// Lifecycle state of the held token at `now`.
	pub fn state_at(&self, now: OffsetDateTime) -> TokenState {
		TokenState::evaluate(self.inner.store.current().as_ref(), now, self.inner.refresh_threshold)
	}

	/// Returns `true` when a non-empty refresh token is held.
	pub fn has_refresh_token(&self) -> bool {
		self.inner.store.refresh_token().is_some_and(|token| !token.is_empty())
	}

	/// Returns `true` when a refresh token is held and the access token is expiring or expired.
	pub fn is_time_to_refresh(&self) -> bool {
		self.has_refresh_token() && self.state().needs_refresh()
	}

	/// Held access token, whatever its state.
	pub fn bearer_token(&self) -> Option<TokenSecret> {
		self.inner.store.access_token()
	}

	/// Provider descriptor this client talks to.
	pub fn descriptor(&self) -> &ProviderDescriptor {
		&self.inner.descriptor
	}

	/// Store holding the token record.
	pub fn store(&self) -> &Arc<dyn TokenStore> {
		&self.inner.store
	}

	/// Redirect URL the local callback listener serves.
	pub fn redirect_url(&self) -> &Url {
		&self.inner.redirect_url
	}

	/// Window before expiry in which the token counts as expiring soon.
	pub fn refresh_threshold(&self) -> Duration {
		self.inner.refresh_threshold
	}

	/// Counters describing refresh activity on this client.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.inner.refresh_metrics
	}
}
#[cfg(feature = "reqwest")]
impl OAuth2Client<ReqwestHttpClient> {
	/// Starts a builder backed by a fresh reqwest transport that never follows redirects.
	pub fn builder(
		descriptor: ProviderDescriptor,
		client_id: impl Into<String>,
		redirect_url: Url,
	) -> OAuth2ClientBuilder<ReqwestHttpClient> {
		OAuth2ClientBuilder::new(
			descriptor,
			client_id.into(),
			redirect_url,
			Transport::Factory(|| ReqwestHttpClient::new().map(Arc::new)),
		)
	}
}
impl<C> Clone for OAuth2Client<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn clone(&self) -> Self {
		Self { inner: self.inner.clone() }
	}
}
impl<C> Debug for OAuth2Client<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuth2Client")
			.field("descriptor", &self.inner.descriptor.id)
			.field("client_id", &self.inner.client_id.as_str())
			.field("client_secret_set", &self.inner.client_secret.is_some())
			.field("redirect_url", &self.inner.redirect_url.as_str())
			.field("refresh_threshold", &self.inner.refresh_threshold)
			.finish_non_exhaustive()
	}
}

struct ClientInner<C>
where
	C: ?Sized + TokenHttpClient,
{
	descriptor: ProviderDescriptor,
	client_id: ClientId,
	client_secret: Option<ClientSecret>,
	redirect_url: Url,
	store: Arc<dyn TokenStore>,
	launcher: Arc<dyn AuthorizationLauncher>,
	refresh_threshold: Duration,
	callback_timeout: Option<StdDuration>,
	refresh_metrics: RefreshMetrics,
	in_flight: Mutex<HashMap<String, SharedRefresh>>,
	login_guard: AsyncMutex<()>,
	http_client: Arc<C>,
}

enum Transport<C>
where
	C: ?Sized,
{
	Provided(Arc<C>),
	Factory(TransportFactory<C>),
}

/// Builder for [`OAuth2Client`].
pub struct OAuth2ClientBuilder<C>
where
	C: ?Sized + TokenHttpClient,
{
	descriptor: ProviderDescriptor,
	client_id: String,
	client_secret: Option<String>,
	redirect_url: Url,
	store: Option<Arc<dyn TokenStore>>,
	launcher: Option<Arc<dyn AuthorizationLauncher>>,
	refresh_threshold: Duration,
	callback_timeout: Option<StdDuration>,
	transport: Transport<C>,
}
impl<C> OAuth2ClientBuilder<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn new(
		descriptor: ProviderDescriptor,
		client_id: String,
		redirect_url: Url,
		transport: Transport<C>,
	) -> Self {
		Self {
			descriptor,
			client_id,
			client_secret: None,
			redirect_url,
			store: None,
			launcher: None,
			refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
			callback_timeout: None,
			transport,
		}
	}

	/// Sets the client secret sent with every token request.
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Uses `store` for the token record (defaults to a fresh [`MemoryStore`]).
	pub fn store(mut self, store: Arc<dyn TokenStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// Uses `launcher` to present authorization URLs (defaults to [`SystemBrowserLauncher`]).
	pub fn launcher(mut self, launcher: Arc<dyn AuthorizationLauncher>) -> Self {
		self.launcher = Some(launcher);

		self
	}

	/// Overrides the expiring-soon window (defaults to 60 seconds; negative values clamp to zero).
	pub fn refresh_threshold(mut self, threshold: Duration) -> Self {
		self.refresh_threshold = if threshold.is_negative() { Duration::ZERO } else { threshold };

		self
	}

	/// Fails interactive logins that receive no authorization code within `timeout`.
	pub fn callback_timeout(mut self, timeout: StdDuration) -> Self {
		self.callback_timeout = Some(timeout);

		self
	}

	/// Validates the configuration and assembles the client.
	pub fn build(self) -> Result<OAuth2Client<C>, ConfigError> {
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::MissingClientId);
		}

		validate_redirect(&self.redirect_url)?;

		let descriptor = self.descriptor.validated()?;
		let http_client = match self.transport {
			Transport::Provided(client) => client,
			Transport::Factory(factory) => factory()?,
		};
		let inner = ClientInner {
			descriptor,
			client_id: ClientId::new(self.client_id),
			client_secret: self.client_secret.map(ClientSecret::new),
			redirect_url: self.redirect_url,
			store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::default())),
			launcher: self.launcher.unwrap_or_else(|| Arc::new(SystemBrowserLauncher)),
			refresh_threshold: self.refresh_threshold,
			callback_timeout: self.callback_timeout,
			refresh_metrics: RefreshMetrics::default(),
			in_flight: Default::default(),
			login_guard: AsyncMutex::new(()),
			http_client,
		};

		Ok(OAuth2Client { inner: Arc::new(inner) })
	}
}
impl<C> Debug for OAuth2ClientBuilder<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuth2ClientBuilder")
			.field("descriptor", &self.descriptor.id)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("redirect_url", &self.redirect_url.as_str())
			.finish_non_exhaustive()
	}
}

fn validate_redirect(url: &Url) -> Result<(), ConfigError> {
	let reason = if url.scheme() != "http" {
		"the callback listener only speaks plain HTTP"
	} else if !provider::is_loopback(url) {
		"the callback listener only binds loopback hosts"
	} else {
		return Ok(());
	};

	Err(ConfigError::InvalidRedirect { url: url.to_string(), reason })
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, auth::TokenRecord};

	fn builder(redirect: &str) -> OAuth2ClientBuilder<ReqwestHttpClient> {
		OAuth2Client::builder(
			mock_descriptor("http://127.0.0.1:1"),
			"client-id",
			Url::parse(redirect).expect("Test redirect URL should parse."),
		)
	}

	#[test]
	fn build_rejects_unusable_configuration() {
		assert!(matches!(
			OAuth2Client::builder(
				mock_descriptor("http://127.0.0.1:1"),
				" ",
				Url::parse("http://127.0.0.1:9/cb").expect("Test redirect URL should parse."),
			)
			.build(),
			Err(ConfigError::MissingClientId)
		));
		assert!(matches!(
			builder("https://127.0.0.1:9/cb").build(),
			Err(ConfigError::InvalidRedirect { .. })
		));
		assert!(matches!(
			builder("http://photos.example.com/cb").build(),
			Err(ConfigError::InvalidRedirect { .. })
		));
		assert!(builder("http://localhost:9/cb").build().is_ok());
	}

	#[tokio::test]
	async fn state_follows_the_store() {
		let store = Arc::new(MemoryStore::default());
		let client = builder("http://127.0.0.1:9/cb")
			.store(store.clone())
			.build()
			.expect("Client should build.");

		assert_eq!(client.state(), TokenState::NoToken);
		assert!(!client.has_refresh_token());
		assert!(!client.is_time_to_refresh());

		store
			.save(record_expiring_in("access", Some("refresh"), Duration::seconds(30)))
			.await
			.expect("Memory saves should not fail.");

		assert_eq!(client.state(), TokenState::ExpiringSoon);
		assert!(client.is_time_to_refresh());
		assert_eq!(client.bearer_token().as_ref().map(TokenSecret::expose), Some("access"));

		store.save(TokenRecord::new("access")).await.expect("Memory saves should not fail.");

		assert_eq!(client.state(), TokenState::Valid);
		assert!(!client.is_time_to_refresh());
	}

	#[test]
	fn clones_share_state_and_debug_hides_secret() {
		let client = builder("http://127.0.0.1:9/cb")
			.client_secret("super-secret")
			.build()
			.expect("Client should build.");
		let clone = client.clone();

		assert!(Arc::ptr_eq(client.store(), clone.store()));
		assert!(!format!("{client:?}").contains("super-secret"));
	}
}
