//! Canonical query strings shared by authorization URLs and form bodies.

// crates.io
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
// self
use crate::_prelude::*;

/// Everything except the RFC 3986 unreserved set is escaped.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Value attached to a query key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryValue {
	/// Rendered as the bare key, without `=`.
	Flag,
	/// Rendered as `key=value` with the value percent-encoded.
	Text(String),
}
impl From<String> for QueryValue {
	fn from(value: String) -> Self {
		Self::Text(value)
	}
}
impl From<&str> for QueryValue {
	fn from(value: &str) -> Self {
		Self::Text(value.to_owned())
	}
}

/// Key-sorted query string.
///
/// Keys render in lexicographic order so identical parameter sets always produce
/// byte-identical strings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CanonicalQuery(BTreeMap<String, QueryValue>);
impl CanonicalQuery {
	/// Creates an empty query.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds or replaces a key.
	pub fn with(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
		self.insert(key, value);

		self
	}

	/// Adds or replaces a bare flag key.
	pub fn flag(self, key: impl Into<String>) -> Self {
		self.with(key, QueryValue::Flag)
	}

	/// Adds or replaces a key in place.
	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
		self.0.insert(key.into(), value.into());
	}

	/// Value stored for `key`.
	pub fn get(&self, key: &str) -> Option<&QueryValue> {
		self.0.get(key)
	}

	/// Returns `true` when no keys are present.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Renders the `&`-joined string without a leading `?`.
	pub fn encode(&self) -> String {
		let mut out = String::new();

		for (key, value) in &self.0 {
			if !out.is_empty() {
				out.push('&');
			}

			out.extend(utf8_percent_encode(key, COMPONENT));

			if let QueryValue::Text(text) = value {
				out.push('=');
				out.extend(utf8_percent_encode(text, COMPONENT));
			}
		}

		out
	}
}
impl Display for CanonicalQuery {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.encode())
	}
}
impl<K, V> FromIterator<(K, V)> for CanonicalQuery
where
	K: Into<String>,
	V: Into<QueryValue>,
{
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
	{
		Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}
}
