// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by token and fetch flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("photo_courier.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits an event for a retry the wrapper is about to perform.
pub fn record_retry(attempt: u32, delay: StdDuration) {
	#[cfg(feature = "tracing")]
	tracing::debug!(
		attempt,
		delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
		"Retrying failed call."
	);

	#[cfg(not(feature = "tracing"))]
	let _ = (attempt, delay);
}

/// Emits a warning for a response body that could not be parsed as the expected JSON.
pub fn record_malformed_body(url: &Url, path: &str, reason: &dyn Display) {
	#[cfg(feature = "tracing")]
	tracing::warn!(%url, path, %reason, "Response body is not valid JSON; treating it as absent.");

	#[cfg(not(feature = "tracing"))]
	let _ = (url, path, reason);
}

/// Emits an event for a request that reached the callback listener on a foreign path.
pub fn record_callback_miss(path: &str) {
	#[cfg(feature = "tracing")]
	tracing::debug!(path, "Ignoring request outside the callback path.");

	#[cfg(not(feature = "tracing"))]
	let _ = path;
}

/// Shows the authorization URL so the user can open it by hand if no browser appears.
///
/// Without the `tracing` feature the prompt goes to stderr, since nothing else would surface it.
pub fn record_authorization_url(url: &Url) {
	#[cfg(feature = "tracing")]
	tracing::info!(%url, "Open this URL to authorize access.");

	#[cfg(not(feature = "tracing"))]
	eprintln!("{}", authorization_prompt(url));
}

#[cfg_attr(feature = "tracing", allow(dead_code))]
fn authorization_prompt(url: &Url) -> String {
	format!("Open this URL to authorize access: {url}")
}

/// Emits a warning when the platform opener could not show the authorization URL.
pub fn record_launch_failure(program: &str, reason: &dyn Display) {
	#[cfg(feature = "tracing")]
	tracing::warn!(program, %reason, "Failed to open a browser; open the logged URL manually.");

	#[cfg(not(feature = "tracing"))]
	let _ = (program, reason);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn events_noop_without_subscriber() {
		let url = Url::parse("https://example.com/token").expect("Static URL should parse.");

		record_retry(1, StdDuration::from_millis(10));
		record_malformed_body(&url, ".", &"expected value");
		record_callback_miss("/favicon.ico");
		record_authorization_url(&url);
		record_launch_failure("xdg-open", &"not found");
	}

	#[test]
	fn authorization_prompt_carries_the_full_url() {
		let url = Url::parse("https://accounts.example.com/o/oauth2/auth?client_id=a&scope=b%20c")
			.expect("Static URL should parse.");

		assert_eq!(
			authorization_prompt(&url),
			"Open this URL to authorize access: https://accounts.example.com/o/oauth2/auth?client_id=a&scope=b%20c"
		);
	}

	#[test]
	fn retry_event_accepts_oversized_delays() {
		record_retry(u32::MAX, StdDuration::MAX);
	}

	#[cfg(feature = "tracing")]
	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FlowSpan::new(FlowKind::Refresh, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
