//! Loopback listener that receives the authorization code from the user's browser.
//!
//! The listener answers exactly what a browser needs: `404` for anything outside the
//! callback path (favicons, prefetches), `400` for a callback without a code, and a small
//! HTML page once the code arrives. Consuming [`CallbackListener::accept_code`] drops the
//! socket on every exit path.

// std
use std::{io::Result as IoResult, net::SocketAddr};
// crates.io
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::{TcpListener, TcpStream},
};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
	obs,
};

const MAX_REQUEST_HEAD: usize = 8 * 1024;
const REQUEST_HEAD_TIMEOUT: StdDuration = StdDuration::from_secs(5);
const SUCCESS_PAGE: &str =
	"<!DOCTYPE html><html><body><p>Close your browser to proceed.</p></body></html>";
const MISSING_CODE_PAGE: &str =
	"<!DOCTYPE html><html><body><p>Authorization did not return a code.</p></body></html>";
const NOT_FOUND_PAGE: &str = "<!DOCTYPE html><html><body><p>Not found.</p></body></html>";

/// What a single browser request turned out to be.
#[derive(Clone, Debug, PartialEq, Eq)]
enum CallbackRequest {
	Foreign { path: String },
	Code(String),
	Denied { reason: String },
}

/// Socket bound to the redirect URL's host and port.
///
/// A `localhost` redirect is served on both `127.0.0.1` and `::1` when both can be bound, since
/// browsers may resolve the name to either family.
#[derive(Debug)]
pub struct CallbackListener {
	listener: TcpListener,
	sibling: Option<TcpListener>,
	path: String,
}
impl CallbackListener {
	/// Binds to the host and port of `redirect_url`.
	pub async fn bind(redirect_url: &Url) -> Result<Self> {
		let invalid = |reason| ConfigError::InvalidRedirect { url: redirect_url.to_string(), reason };
		let host = redirect_url.host_str().ok_or_else(|| invalid("the URL has no host"))?;
		let host = host.trim_start_matches('[').trim_end_matches(']');
		let port = redirect_url.port_or_known_default().ok_or_else(|| invalid("the URL has no port"))?;
		let (listener, sibling) = if host.eq_ignore_ascii_case("localhost") {
			bind_loopback_pair(port).await?
		} else {
			(TcpListener::bind((host, port)).await.map_err(TransportError::from)?, None)
		};

		Ok(Self { listener, sibling, path: redirect_url.path().to_owned() })
	}

	/// Address the socket is bound to.
	pub fn local_addr(&self) -> Result<SocketAddr> {
		Ok(self.listener.local_addr().map_err(TransportError::from)?)
	}

	/// Address of the second loopback socket, if a `localhost` redirect bound one.
	pub fn sibling_addr(&self) -> Option<SocketAddr> {
		self.sibling.as_ref().and_then(|sibling| sibling.local_addr().ok())
	}

	/// Serves browser requests until one delivers the authorization code.
	///
	/// Requests outside the callback path are answered with `404` and ignored. A request on
	/// the callback path without a `code` parameter fails the flow with [`Error::Callback`].
	/// Connections are read concurrently, and one that sends no request head within a few
	/// seconds is dropped, so an idle preconnect never holds up the real callback.
	pub async fn accept_code(self) -> Result<String> {
		let mut reading = FuturesUnordered::new();

		loop {
			tokio::select! {
				accepted = self.accept() => {
					reading.push(read_request(accepted.map_err(TransportError::from)?));
				},
				Some((mut stream, head)) = reading.next() => {
					let Some(head) = head else {
						continue;
					};
					let Some(target) = request_target(&head) else {
						respond(&mut stream, "400 Bad Request", MISSING_CODE_PAGE).await;

						continue;
					};

					match classify(&self.path, target) {
						CallbackRequest::Foreign { path } => {
							obs::record_callback_miss(&path);
							respond(&mut stream, "404 Not Found", NOT_FOUND_PAGE).await;
						},
						CallbackRequest::Code(code) => {
							respond(&mut stream, "200 OK", SUCCESS_PAGE).await;

							return Ok(code);
						},
						CallbackRequest::Denied { reason } => {
							respond(&mut stream, "400 Bad Request", MISSING_CODE_PAGE).await;

							return Err(Error::Callback { reason });
						},
					}
				},
			}
		}
	}

	async fn accept(&self) -> IoResult<TcpStream> {
		let (stream, _) = match &self.sibling {
			Some(sibling) => tokio::select! {
				accepted = self.listener.accept() => accepted,
				accepted = sibling.accept() => accepted,
			},
			None => self.listener.accept().await,
		}?;

		Ok(stream)
	}
}

async fn bind_loopback_pair(port: u16) -> Result<(TcpListener, Option<TcpListener>)> {
	match TcpListener::bind(("127.0.0.1", port)).await {
		Ok(v4) => {
			let port = v4.local_addr().map_err(TransportError::from)?.port();
			let v6 = TcpListener::bind(("::1", port)).await.ok();

			Ok((v4, v6))
		},
		Err(v4_error) => match TcpListener::bind(("::1", port)).await {
			Ok(v6) => Ok((v6, None)),
			Err(_) => Err(TransportError::from(v4_error).into()),
		},
	}
}

async fn read_request(mut stream: TcpStream) -> (TcpStream, Option<String>) {
	let head = tokio::time::timeout(REQUEST_HEAD_TIMEOUT, read_request_head(&mut stream))
		.await
		.ok()
		.and_then(Result::ok);

	(stream, head)
}

async fn read_request_head(stream: &mut TcpStream) -> IoResult<String> {
	let mut head = Vec::with_capacity(1024);
	let mut chunk = [0; 1024];

	while head.len() < MAX_REQUEST_HEAD && !head.windows(4).any(|w| w == b"\r\n\r\n") {
		let read = stream.read(&mut chunk).await?;

		if read == 0 {
			break;
		}

		head.extend_from_slice(&chunk[..read]);
	}

	Ok(String::from_utf8_lossy(&head).into_owned())
}

/// Request target of the request line (`GET <target> HTTP/1.1`).
fn request_target(head: &str) -> Option<&str> {
	let mut parts = head.lines().next()?.split_whitespace();
	let _method = parts.next()?;

	parts.next()
}

fn classify(callback_path: &str, target: &str) -> CallbackRequest {
	let Ok(url) = Url::parse("http://callback.invalid").and_then(|base| base.join(target)) else {
		return CallbackRequest::Foreign { path: target.to_owned() };
	};

	if url.path() != callback_path {
		return CallbackRequest::Foreign { path: url.path().to_owned() };
	}

	let mut code = None;
	let mut error = None;

	for (key, value) in url.query_pairs() {
		match key.as_ref() {
			"code" if !value.is_empty() => code = Some(value.into_owned()),
			"error" => error = Some(value.into_owned()),
			_ => {},
		}
	}

	match (code, error) {
		(_, Some(error)) => CallbackRequest::Denied { reason: format!("provider returned `{error}`") },
		(Some(code), None) => CallbackRequest::Code(code),
		(None, None) =>
			CallbackRequest::Denied { reason: "callback request carried no code".into() },
	}
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
	let response = format!(
		"HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
		body.len()
	);

	// Best effort; the browser may already be gone.
	let _ = stream.write_all(response.as_bytes()).await;
	let _ = stream.shutdown().await;
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn requests_classify_by_path_and_code() {
		assert_eq!(
			classify("/callback", "/favicon.ico"),
			CallbackRequest::Foreign { path: "/favicon.ico".into() }
		);
		assert_eq!(
			classify("/callback", "/callback?code=4%2F0Ab&scope=email"),
			CallbackRequest::Code("4/0Ab".into())
		);
		assert!(matches!(classify("/callback", "/callback"), CallbackRequest::Denied { .. }));
		assert!(matches!(
			classify("/callback", "/callback?error=access_denied"),
			CallbackRequest::Denied { reason } if reason.contains("access_denied")
		));
	}

	#[test]
	fn request_line_yields_target() {
		assert_eq!(request_target("GET /cb?code=x HTTP/1.1\r\nHost: a\r\n\r\n"), Some("/cb?code=x"));
		assert_eq!(request_target(""), None);
	}

	#[tokio::test]
	async fn listener_answers_and_releases_port() {
		let redirect = Url::parse("http://127.0.0.1:0/callback").expect("Redirect should parse.");
		let listener = CallbackListener::bind(&redirect).await.expect("Loopback bind should work.");
		let addr = listener.local_addr().expect("Bound listener should expose its address.");
		let browser = tokio::spawn(async move {
			let mut stray = TcpStream::connect(addr).await.expect("Listener should accept.");

			stray
				.write_all(b"GET /favicon.ico HTTP/1.1\r\nHost: localhost\r\n\r\n")
				.await
				.expect("Stray request should be written.");

			let mut answer = String::new();

			stray.read_to_string(&mut answer).await.expect("Stray answer should be readable.");

			let mut callback = TcpStream::connect(addr).await.expect("Listener should accept.");

			callback
				.write_all(b"GET /callback?code=abc HTTP/1.1\r\nHost: localhost\r\n\r\n")
				.await
				.expect("Callback request should be written.");

			let mut page = String::new();

			callback.read_to_string(&mut page).await.expect("Callback answer should be readable.");

			(answer, page)
		});
		let code = listener.accept_code().await.expect("Callback should deliver the code.");
		let (stray_answer, page) = browser.await.expect("Browser task should finish.");

		assert_eq!(code, "abc");
		assert!(stray_answer.starts_with("HTTP/1.1 404"));
		assert!(page.starts_with("HTTP/1.1 200") && page.contains("Close your browser"));
		assert!(TcpListener::bind(addr).await.is_ok(), "The callback port should be released.");
	}

	#[tokio::test]
	async fn idle_connection_does_not_block_the_callback() {
		let redirect = Url::parse("http://127.0.0.1:0/callback").expect("Redirect should parse.");
		let listener = CallbackListener::bind(&redirect).await.expect("Loopback bind should work.");
		let addr = listener.local_addr().expect("Bound listener should expose its address.");
		let browser = tokio::spawn(async move {
			let idle = TcpStream::connect(addr).await.expect("Listener should accept.");

			tokio::time::sleep(StdDuration::from_millis(50)).await;

			let mut callback = TcpStream::connect(addr).await.expect("Listener should accept.");

			callback
				.write_all(b"GET /callback?code=abc HTTP/1.1\r\nHost: localhost\r\n\r\n")
				.await
				.expect("Callback request should be written.");

			let mut page = String::new();

			callback.read_to_string(&mut page).await.expect("Callback answer should be readable.");

			(idle, page)
		});
		let code = tokio::time::timeout(StdDuration::from_secs(2), listener.accept_code())
			.await
			.expect("An idle connection must not stall the callback.")
			.expect("Callback should deliver the code.");
		let (_idle, page) = browser.await.expect("Browser task should finish.");

		assert_eq!(code, "abc");
		assert!(page.starts_with("HTTP/1.1 200"));
	}

	#[tokio::test]
	async fn localhost_redirect_listens_on_both_loopback_families() {
		let redirect = Url::parse("http://localhost:0/callback").expect("Redirect should parse.");
		let listener = CallbackListener::bind(&redirect).await.expect("Loopback bind should work.");
		let primary = listener.local_addr().expect("Bound listener should expose its address.");

		assert!(primary.ip().is_loopback());

		// Hosts without IPv6 loopback only get the primary socket.
		let Some(sibling) = listener.sibling_addr() else {
			return;
		};

		assert_eq!(sibling.port(), primary.port());
		assert_ne!(sibling.is_ipv4(), primary.is_ipv4());

		let browser = tokio::spawn(async move {
			let mut callback = TcpStream::connect(sibling).await.expect("Sibling should accept.");

			callback
				.write_all(b"GET /callback?code=v6 HTTP/1.1\r\nHost: localhost\r\n\r\n")
				.await
				.expect("Callback request should be written.");

			let mut page = String::new();

			callback.read_to_string(&mut page).await.expect("Callback answer should be readable.");

			page
		});

		assert_eq!(listener.accept_code().await.expect("Sibling should deliver the code."), "v6");
		assert!(browser.await.expect("Browser task should finish.").starts_with("HTTP/1.1 200"));
	}
}
