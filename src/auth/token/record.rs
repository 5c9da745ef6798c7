//! Token records and the lifecycle state derived from them.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Default window before expiry in which a token counts as expiring soon.
pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::seconds(60);

/// Lifecycle state of the held token at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenState {
	/// No token has been obtained yet.
	NoToken,
	/// Token is usable and not close to expiry.
	Valid,
	/// Token still works but expires within the refresh threshold.
	ExpiringSoon,
	/// Token expiry has passed.
	Expired,
}
impl TokenState {
	/// Evaluates the state of an optional record at `now`.
	///
	/// A record with an empty access token counts as no token at all.
	pub fn evaluate(record: Option<&TokenRecord>, now: OffsetDateTime, threshold: Duration) -> Self {
		record
			.filter(|record| !record.access_token.is_empty())
			.map_or(Self::NoToken, |record| record.state_at(now, threshold))
	}

	/// Returns `true` when the token should be refreshed before use.
	pub fn needs_refresh(self) -> bool {
		matches!(self, Self::ExpiringSoon | Self::Expired)
	}

	/// Returns a stable label suitable for span fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::NoToken => "no_token",
			Self::Valid => "valid",
			Self::ExpiringSoon => "expiring_soon",
			Self::Expired => "expired",
		}
	}
}
impl Display for TokenState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Token set returned by an authorization-code exchange or a refresh.
///
/// Records are replaced wholesale; nothing updates individual fields of a stored record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret, if one was issued.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Absolute expiry instant, stored as Unix milliseconds.
	#[serde(default, skip_serializing_if = "Option::is_none", with = "unix_ms")]
	pub expiry_date: Option<OffsetDateTime>,
}
impl TokenRecord {
	/// Creates a record holding only an access token.
	pub fn new(access_token: impl Into<String>) -> Self {
		Self { access_token: TokenSecret::new(access_token), refresh_token: None, expiry_date: None }
	}

	/// Attaches a refresh token.
	pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(refresh_token));

		self
	}

	/// Sets the absolute expiry instant.
	pub fn expiring_at(mut self, instant: OffsetDateTime) -> Self {
		self.expiry_date = Some(instant);

		self
	}

	/// Lifecycle state at `now`.
	///
	/// A record without expiry never ages. Expiry exactly at `now` counts as expired.
	pub fn state_at(&self, now: OffsetDateTime, threshold: Duration) -> TokenState {
		match self.expiry_date {
			None => TokenState::Valid,
			Some(expiry) if expiry <= now => TokenState::Expired,
			Some(expiry) if expiry < now + threshold => TokenState::ExpiringSoon,
			Some(_) => TokenState::Valid,
		}
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expiry_date", &self.expiry_date)
			.finish()
	}
}

mod unix_ms {
	// crates.io
	use serde::{Deserializer, Serializer, de::Error as DeError};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match value {
			Some(instant) => {
				let millis = instant.unix_timestamp_nanos() / 1_000_000;

				serializer.serialize_i64(millis as i64)
			},
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let Some(millis) = <Option<i64>>::deserialize(deserializer)? else {
			return Ok(None);
		};

		OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
			.map(Some)
			.map_err(DeError::custom)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn state_transitions_follow_threshold() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let record = |expiry| TokenRecord::new("access").expiring_at(expiry);

		assert_eq!(TokenState::evaluate(None, now, DEFAULT_REFRESH_THRESHOLD), TokenState::NoToken);
		assert_eq!(
			record(now + Duration::minutes(5)).state_at(now, DEFAULT_REFRESH_THRESHOLD),
			TokenState::Valid
		);
		assert_eq!(
			record(now + Duration::seconds(30)).state_at(now, DEFAULT_REFRESH_THRESHOLD),
			TokenState::ExpiringSoon
		);
		assert_eq!(
			record(now + DEFAULT_REFRESH_THRESHOLD).state_at(now, DEFAULT_REFRESH_THRESHOLD),
			TokenState::Valid
		);
		assert_eq!(record(now).state_at(now, DEFAULT_REFRESH_THRESHOLD), TokenState::Expired);
		assert_eq!(
			TokenRecord::new("access").state_at(now, DEFAULT_REFRESH_THRESHOLD),
			TokenState::Valid
		);
		assert!(TokenState::Expired.needs_refresh());
		assert!(!TokenState::NoToken.needs_refresh());
	}

	#[test]
	fn expiry_serializes_as_unix_millis() {
		let record = TokenRecord::new("access")
			.with_refresh_token("refresh")
			.expiring_at(macros::datetime!(2025-01-01 00:00:01.5 UTC));
		let json = serde_json::to_value(&record).expect("Record should serialize.");

		assert_eq!(json["expiry_date"], 1_735_689_601_500_i64);
		assert_eq!(json["refresh_token"], "refresh");

		let parsed: TokenRecord = serde_json::from_value(json).expect("Record should deserialize.");

		assert_eq!(parsed, record);

		let bare: TokenRecord = serde_json::from_str(r#"{"access_token":"a"}"#)
			.expect("Optional fields should default.");

		assert_eq!(bare.refresh_token, None);
		assert_eq!(bare.expiry_date, None);
	}

	#[test]
	fn debug_redacts_secrets() {
		let rendered = format!("{:?}", TokenRecord::new("ya29.secret").with_refresh_token("1//r"));

		assert!(!rendered.contains("ya29.secret"));
		assert!(!rendered.contains("1//r"));
	}
}
