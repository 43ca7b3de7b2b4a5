//! Immutable snapshot of verified ID token claims.

// crates.io
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
// self
use crate::_prelude::*;

/// Claims produced by a successful verification.
///
/// Cloning shares the underlying map; [`Claims::ptr_eq`] tells whether two handles come from
/// the same verification.
#[derive(Clone, PartialEq)]
pub struct Claims(Arc<Map<String, Value>>);
impl Claims {
	pub(crate) fn new(map: Map<String, Value>) -> Self {
		Self(Arc::new(map))
	}

	/// Returns true when both handles share one snapshot.
	pub fn ptr_eq(lhs: &Self, rhs: &Self) -> bool {
		Arc::ptr_eq(&lhs.0, &rhs.0)
	}

	/// Reads a claim; JSON `null` counts as absent.
	pub fn get(&self, name: &str) -> Option<&Value> {
		self.0.get(name).filter(|value| !value.is_null())
	}

	/// Returns true when the claim is present and not null.
	pub fn contains(&self, name: &str) -> bool {
		self.get(name).is_some()
	}

	/// Reads a string-valued claim.
	pub fn get_str(&self, name: &str) -> Option<&str> {
		self.get(name).and_then(Value::as_str)
	}

	/// Issuer (`iss`).
	pub fn issuer(&self) -> Option<&str> {
		self.get_str("iss")
	}

	/// Subject (`sub`).
	pub fn subject(&self) -> Option<&str> {
		self.get_str("sub")
	}

	/// Audiences (`aud`), whether sent as a string or an array.
	pub fn audiences(&self) -> Vec<&str> {
		match self.get("aud") {
			Some(Value::String(aud)) => vec![aud.as_str()],
			Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
			_ => Vec::new(),
		}
	}

	/// Authorized party (`azp`).
	pub fn authorized_party(&self) -> Option<&str> {
		self.get_str("azp")
	}

	/// Nonce (`nonce`).
	pub fn nonce(&self) -> Option<&str> {
		self.get_str("nonce")
	}

	/// Expiry (`exp`).
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.get("exp").and_then(numeric_date)
	}

	/// Issue time (`iat`).
	pub fn issued_at(&self) -> Option<OffsetDateTime> {
		self.get("iat").and_then(numeric_date)
	}

	/// End-user authentication time (`auth_time`).
	pub fn auth_time(&self) -> Option<OffsetDateTime> {
		self.get("auth_time").and_then(numeric_date)
	}

	/// Borrows the full claim map.
	pub fn as_map(&self) -> &Map<String, Value> {
		&self.0
	}

	/// Deserializes the claims into a caller-defined shape.
	pub fn deserialize_into<T>(&self) -> Result<T, serde_json::Error>
	where
		T: DeserializeOwned,
	{
		T::deserialize(Value::Object((*self.0).clone()))
	}
}
impl Serialize for Claims {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		(*self.0).serialize(serializer)
	}
}
impl Debug for Claims {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Claims").field(&self.0).finish()
	}
}

/// Converts a JSON NumericDate (integer or fractional seconds) into an instant.
pub(crate) fn numeric_date(value: &Value) -> Option<OffsetDateTime> {
	let seconds = match value {
		Value::Number(number) =>
			number.as_i64().or_else(|| number.as_f64().map(|secs| secs.floor() as i64))?,
		_ => return None,
	};

	OffsetDateTime::from_unix_timestamp(seconds).ok()
}
