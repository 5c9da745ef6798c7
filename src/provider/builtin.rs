//! Descriptors for the providers a migration moves photos between.

// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	provider::{ProviderDescriptor, ProviderDescriptorError, ProviderQuirks},
};

/// Google (Photos Library API) OAuth endpoints.
pub fn google() -> Result<ProviderDescriptor, ProviderDescriptorError> {
	builtin(
		"google",
		"https://accounts.google.com/o/oauth2/v2/auth",
		"https://oauth2.googleapis.com/token",
	)
}

/// Dropbox OAuth endpoints.
pub fn dropbox() -> Result<ProviderDescriptor, ProviderDescriptorError> {
	builtin("dropbox", "https://www.dropbox.com/oauth2/authorize", "https://api.dropbox.com/oauth2/token")
}

fn builtin(
	id: &'static str,
	authorization: &str,
	token: &str,
) -> Result<ProviderDescriptor, ProviderDescriptorError> {
	ProviderDescriptor::builder(ProviderId::new(id)?)
		.endpoints(authorization, token)?
		.quirks(ProviderQuirks::default())
		.build()
}
