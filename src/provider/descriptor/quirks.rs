// self
use crate::_prelude::*;

/// Provider-specific quirks that influence how flows behave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderQuirks {
	/// Keep the previous refresh token when a refresh response omits `refresh_token`.
	///
	/// Google and Dropbox both issue long-lived refresh tokens once and leave them out of
	/// later refresh responses.
	pub retain_refresh_token: bool,
	/// Character used to join scopes when constructing `scope` parameters.
	pub scope_delimiter: char,
}
impl Default for ProviderQuirks {
	fn default() -> Self {
		Self { retain_refresh_token: true, scope_delimiter: ' ' }
	}
}
