//! Ordered scope lists as carried by token requests and responses.

// std
use std::slice::Iter;
// self
use crate::_prelude::*;

/// Ordered list of scope tokens.
///
/// Unlike a set, the list keeps whatever order and multiplicity the source used: a
/// space-delimited string is split on whitespace, an already structured sequence is kept as
/// is. Serializes as a JSON array; deserializes from either a string or an array.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ScopeList(Vec<String>);
impl ScopeList {
	/// Wraps an already structured sequence unchanged.
	pub fn new<I, S>(scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self(scopes.into_iter().map(Into::into).collect())
	}

	/// Splits a space-delimited scope string.
	pub fn parse(value: &str) -> Self {
		Self(value.split_whitespace().map(str::to_owned).collect())
	}

	/// Number of scope tokens.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true if no scopes are present.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns true if the list contains the provided scope.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.iter().any(|candidate| candidate == scope)
	}

	/// Iterator over scope tokens.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	/// Returns the space-delimited form used on the wire.
	pub fn to_delimited(&self) -> String {
		self.0.join(" ")
	}

	/// Returns the underlying slice.
	pub fn as_slice(&self) -> &[String] {
		&self.0
	}

	/// Prepends a scope unless it is already present.
	pub(crate) fn ensure(&mut self, scope: &str) {
		if !self.contains(scope) {
			self.0.insert(0, scope.to_owned());
		}
	}
}
impl Debug for ScopeList {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ScopeList").field(&self.0).finish()
	}
}
impl Display for ScopeList {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.to_delimited())
	}
}
impl FromStr for ScopeList {
	type Err = std::convert::Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self::parse(s))
	}
}
impl<'a> IntoIterator for &'a ScopeList {
	type IntoIter = ScopeIter<'a>;
	type Item = &'a str;

	fn into_iter(self) -> Self::IntoIter {
		ScopeIter { inner: self.0.iter() }
	}
}
impl Serialize for ScopeList {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		self.0.serialize(serializer)
	}
}
impl<'de> Deserialize<'de> for ScopeList {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		#[derive(Deserialize)]
		#[serde(untagged)]
		enum Wire {
			Delimited(String),
			Structured(Vec<String>),
		}

		Ok(match Wire::deserialize(deserializer)? {
			Wire::Delimited(value) => Self::parse(&value),
			Wire::Structured(values) => Self(values),
		})
	}
}

/// Iterator over scope strings.
pub struct ScopeIter<'a> {
	inner: Iter<'a, String>,
}
impl<'a> Iterator for ScopeIter<'a> {
	type Item = &'a str;

	fn next(&mut self) -> Option<Self::Item> {
		self.inner.next().map(|s| s.as_str())
	}
}
