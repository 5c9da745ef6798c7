//! Shared helpers for flow implementations (scope formatting, usable-token checks).

// self
use crate::{
	_prelude::*,
	auth::{Scope, TokenRecord, TokenSecret, TokenState},
};

/// Joins scopes with the provider's delimiter, or `None` when nothing was requested.
pub(crate) fn format_scope(scope: &Scope, delimiter: char) -> Option<String> {
	if scope.is_empty() {
		return None;
	}

	Some(scope.join(delimiter))
}

/// Access token of `record` if it can be sent as-is at `now`.
///
/// Expiring-soon tokens still work, so they count as usable.
pub(crate) fn usable_access_token(
	record: Option<TokenRecord>,
	now: OffsetDateTime,
	threshold: Duration,
) -> Option<TokenSecret> {
	match TokenState::evaluate(record.as_ref(), now, threshold) {
		TokenState::Valid | TokenState::ExpiringSoon => record.map(|record| record.access_token),
		TokenState::NoToken | TokenState::Expired => None,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn scope_formatting_handles_custom_delimiters() {
		let scope = Scope::new(["email", "profile"]).expect("Failed to build test scope.");

		assert_eq!(format_scope(&scope, ' '), Some("email profile".into()));
		assert_eq!(format_scope(&scope, ','), Some("email,profile".into()));
		assert_eq!(format_scope(&Scope::default(), ' '), None);
	}

	#[test]
	fn expired_and_empty_tokens_are_unusable() {
		let now = OffsetDateTime::now_utc();
		let threshold = Duration::seconds(60);
		let soon = TokenRecord::new("soon").expiring_at(now + Duration::seconds(10));

		assert!(usable_access_token(Some(soon), now, threshold).is_some());
		assert!(
			usable_access_token(
				Some(TokenRecord::new("old").expiring_at(now - Duration::seconds(1))),
				now,
				threshold
			)
			.is_none()
		);
		assert!(usable_access_token(Some(TokenRecord::new("")), now, threshold).is_none());
		assert!(usable_access_token(None, now, threshold).is_none());
	}
}
