//! Presenting authorization URLs to the user.

// std
use std::process::Command;
// self
use crate::{_prelude::*, obs};

/// Boxed future returned by [`AuthorizationLauncher::launch`].
pub type LaunchFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + 'a + Send>>;

/// Hands an authorization URL to whoever completes the consent screen.
///
/// The client binds its callback listener before launching, so implementations may
/// resolve as soon as the URL has been handed off; the authorization code arrives through
/// the listener, not through this trait.
pub trait AuthorizationLauncher
where
	Self: Send + Sync,
{
	/// Presents `url` to the user.
	fn launch<'a>(&'a self, url: &'a Url) -> LaunchFuture<'a>;
}

/// Opens the URL in the system browser and logs it for manual use.
///
/// A failing opener is logged, not raised: the logged URL still lets the user finish the
/// login by hand.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemBrowserLauncher;
impl AuthorizationLauncher for SystemBrowserLauncher {
	fn launch<'a>(&'a self, url: &'a Url) -> LaunchFuture<'a> {
		Box::pin(async move {
			obs::record_authorization_url(url);

			let (program, args) = platform_opener();
			let target = url.to_string();
			let status = tokio::task::spawn_blocking(move || {
				Command::new(program).args(args).arg(target).status()
			})
			.await;

			match status {
				Ok(Ok(status)) if status.success() => {},
				Ok(Ok(status)) => obs::record_launch_failure(program, &status),
				Ok(Err(e)) => obs::record_launch_failure(program, &e),
				Err(e) => obs::record_launch_failure(program, &e),
			}

			Ok(())
		})
	}
}

const NO_ARGS: &[&str] = &[];
const WINDOWS_ARGS: &[&str] = &["url.dll,FileProtocolHandler"];

fn platform_opener() -> (&'static str, &'static [&'static str]) {
	if cfg!(target_os = "macos") {
		("open", NO_ARGS)
	} else if cfg!(target_os = "windows") {
		("rundll32", WINDOWS_ARGS)
	} else {
		("xdg-open", NO_ARGS)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn opener_matches_platform() {
		let (program, args) = platform_opener();

		if cfg!(target_os = "windows") {
			assert_eq!((program, args), ("rundll32", &["url.dll,FileProtocolHandler"][..]));
		} else if cfg!(target_os = "macos") {
			assert_eq!(program, "open");
		} else {
			assert_eq!(program, "xdg-open");
			assert!(args.is_empty());
		}
	}
}
