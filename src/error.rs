//! Crate-level error types shared across retry wrappers, token flows, stores, and fetches.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; safe to retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure that is not worth retrying.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Refreshing the access token failed.
	#[error(transparent)]
	Refresh(#[from] RefreshError),
	/// A retry wrapper was used in a way it cannot honor.
	#[error(transparent)]
	Retry(#[from] crate::retry::RetryMisuse),

	/// Token endpoint rejected the authorization-code exchange.
	#[error("Token endpoint rejected the authorization code with status {status} {status_text}.")]
	AuthorizationRejected {
		/// HTTP status code returned by the token endpoint.
		status: u16,
		/// Canonical reason phrase for the status.
		status_text: String,
	},
	/// Token endpoint answered 2xx without a usable access token.
	#[error("Token endpoint returned no usable access token (status {status}).")]
	MalformedTokenResponse {
		/// HTTP status code returned by the token endpoint.
		status: u16,
	},
	/// The local callback listener could not deliver an authorization code.
	#[error("Authorization callback failed: {reason}.")]
	Callback {
		/// Human-readable failure description.
		reason: String,
	},
}
impl Error {
	/// Returns `true` for failures a retry policy may reasonably retry.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Transient(_))
	}

	/// Returns `true` when the error came out of a failed token refresh.
	pub fn is_refresh_failure(&self) -> bool {
		matches!(self, Self::Refresh(_))
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Provider descriptor could not be assembled.
	#[error(transparent)]
	InvalidDescriptor(#[from] crate::provider::ProviderDescriptorError),
	/// Redirect URL cannot host a local callback listener.
	#[error("Redirect URL `{url}` is unusable: {reason}.")]
	InvalidRedirect {
		/// Offending redirect URL.
		url: String,
		/// Why the URL was rejected.
		reason: &'static str,
	},
	/// Client identifier is empty.
	#[error("Client identifier cannot be empty.")]
	MissingClientId,
	/// Scope list could not be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Upstream answered with a status code classified as retryable.
	#[error("Upstream returned retryable status {status}.")]
	HttpStatus {
		/// HTTP status code.
		status: u16,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// A network failure classified as transient (timeout, network down, broken pipe).
	#[error("Transient network error occurred.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransientError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Retry-After hint carried by the failure, if any.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::HttpStatus { retry_after, .. } => *retry_after,
			Self::Network { .. } => None,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}

/// Refresh failures.
///
/// Concurrent callers that joined the same in-flight refresh all receive a clone
/// of the same value, hence the owned, cloneable payloads.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshError {
	/// No refresh token is held, so there is nothing to exchange.
	#[error("No refresh token is available.")]
	MissingRefreshToken,
	/// Token endpoint answered with a non-2xx status.
	#[error("Bad refresh response: status {status} {status_text}.")]
	Rejected {
		/// HTTP status code returned by the token endpoint.
		status: u16,
		/// Canonical reason phrase for the status.
		status_text: String,
	},
	/// Token endpoint answered 2xx without a usable access token.
	#[error("Refresh response did not contain an access token.")]
	MalformedResponse,
	/// The exchange never reached the token endpoint.
	#[error("Refresh request failed: {message}.")]
	Transport {
		/// Rendered transport failure.
		message: String,
	},
	/// The refreshed record could not be persisted.
	#[error("Refreshed token could not be saved: {0}")]
	Storage(crate::store::StoreError),
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::StoreError;

	#[test]
	fn refresh_errors_are_identifiable() {
		let err: Error =
			RefreshError::Rejected { status: 500, status_text: "Internal Server Error".into() }
				.into();

		assert!(err.is_refresh_failure());
		assert!(!err.is_transient());
		assert!(err.to_string().contains("500"));
	}

	#[test]
	fn store_error_converts_with_source() {
		let store_error = StoreError::Backend { message: "disk full".into() };
		let err: Error = store_error.clone().into();
		let source = StdError::source(&err).expect("Storage errors should expose their source.");

		assert!(matches!(err, Error::Storage(_)));
		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn transient_status_exposes_retry_after() {
		let err = TransientError::HttpStatus { status: 429, retry_after: Some(Duration::seconds(7)) };

		assert_eq!(err.retry_after(), Some(Duration::seconds(7)));
		assert!(Error::from(err).is_transient());
	}
}
