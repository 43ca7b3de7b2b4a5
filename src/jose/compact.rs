//! Compact serialization parsing for JWS (`h.p.s`) and JWE (`h.k.iv.c.t`) tokens.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, error::MalformedTokenError};

/// Protected header shared by JWS and JWE tokens.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JoseHeader {
	/// Signing or key management algorithm.
	pub alg: String,
	/// Key identifier.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub kid: Option<String>,
	/// Media type of the complete token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub typ: Option<String>,
	/// Media type of the secured content.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cty: Option<String>,
	/// Content encryption algorithm (JWE only).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub enc: Option<String>,
	/// Remaining header parameters.
	#[serde(flatten)]
	pub other: Map<String, Value>,
}

/// A parsed compact token.
#[derive(Clone, Debug)]
pub enum CompactToken {
	/// Three-segment signed token.
	Signed(CompactJws),
	/// Five-segment encrypted token.
	Encrypted(CompactJwe),
}
impl CompactToken {
	/// Splits and decodes a compact serialization.
	pub fn parse(token: &str) -> Result<Self, MalformedTokenError> {
		let segments = token.split('.').collect::<Vec<_>>();

		match segments.as_slice() {
			[header, payload, signature] => Ok(Self::Signed(CompactJws {
				header: decode_header(header)?,
				signing_input: format!("{header}.{payload}"),
				payload: decode_segment("payload", payload)?,
				signature: decode_segment("signature", signature)?,
			})),
			[header, encrypted_key, iv, ciphertext, tag] => Ok(Self::Encrypted(CompactJwe {
				header: decode_header(header)?,
				protected: (*header).to_owned(),
				encrypted_key: decode_segment("encrypted key", encrypted_key)?,
				iv: decode_segment("initialization vector", iv)?,
				ciphertext: decode_segment("ciphertext", ciphertext)?,
				tag: decode_segment("authentication tag", tag)?,
			})),
			other => Err(MalformedTokenError::SegmentCount { segments: other.len() }),
		}
	}

	/// Protected header of the outermost layer.
	pub fn header(&self) -> &JoseHeader {
		match self {
			CompactToken::Signed(jws) => &jws.header,
			CompactToken::Encrypted(jwe) => &jwe.header,
		}
	}
}

/// Signed token split into its parts.
#[derive(Clone, Debug)]
pub struct CompactJws {
	header: JoseHeader,
	signing_input: String,
	payload: Vec<u8>,
	signature: Vec<u8>,
}
impl CompactJws {
	/// Protected header.
	pub fn header(&self) -> &JoseHeader {
		&self.header
	}

	/// `base64url(header) || '.' || base64url(payload)`, the bytes the signature covers.
	pub fn signing_input(&self) -> &[u8] {
		self.signing_input.as_bytes()
	}

	/// Decoded payload bytes.
	pub fn payload(&self) -> &[u8] {
		&self.payload
	}

	/// Decoded signature bytes.
	pub fn signature(&self) -> &[u8] {
		&self.signature
	}
}

/// Encrypted token split into its parts.
#[derive(Clone, Debug)]
pub struct CompactJwe {
	header: JoseHeader,
	protected: String,
	encrypted_key: Vec<u8>,
	iv: Vec<u8>,
	ciphertext: Vec<u8>,
	tag: Vec<u8>,
}
impl CompactJwe {
	/// Protected header.
	pub fn header(&self) -> &JoseHeader {
		&self.header
	}

	/// Encoded protected header, used as additional authenticated data.
	pub fn protected(&self) -> &str {
		&self.protected
	}

	/// Decoded encrypted content encryption key.
	pub fn encrypted_key(&self) -> &[u8] {
		&self.encrypted_key
	}

	/// Decoded initialization vector.
	pub fn iv(&self) -> &[u8] {
		&self.iv
	}

	/// Decoded ciphertext.
	pub fn ciphertext(&self) -> &[u8] {
		&self.ciphertext
	}

	/// Decoded authentication tag.
	pub fn tag(&self) -> &[u8] {
		&self.tag
	}
}

fn decode_segment(segment: &'static str, value: &str) -> Result<Vec<u8>, MalformedTokenError> {
	URL_SAFE_NO_PAD.decode(value).map_err(|source| MalformedTokenError::Encoding { segment, source })
}

fn decode_header(value: &str) -> Result<JoseHeader, MalformedTokenError> {
	let bytes = decode_segment("header", value)?;
	let fields = serde_json::from_slice::<Map<String, Value>>(&bytes)
		.map_err(|source| MalformedTokenError::Header { source })?;

	match fields.get("alg") {
		Some(Value::String(alg)) if !alg.is_empty() => {},
		_ => return Err(MalformedTokenError::MissingAlgorithm),
	}

	serde_json::from_value(Value::Object(fields))
		.map_err(|source| MalformedTokenError::Header { source })
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::_preludet::*;

	#[test]
	fn three_segments_parse_as_jws() {
		let token = compact_token(&json!({ "alg": "RS256", "kid": "k1" }), &valid_claims(), b"sig");
		let CompactToken::Signed(jws) = CompactToken::parse(&token).expect("Token should parse.")
		else {
			panic!("Three segments should parse as a JWS.");
		};

		assert_eq!(jws.header().alg, "RS256");
		assert_eq!(jws.header().kid.as_deref(), Some("k1"));
		assert_eq!(jws.signature(), b"sig");
		assert!(token.as_bytes().starts_with(jws.signing_input()));
	}

	#[test]
	fn five_segments_parse_as_jwe() {
		let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RSA-OAEP","enc":"A256GCM"}"#);
		let token = format!("{header}.a2V5.aXY.Y2lwaGVy.dGFn");
		let CompactToken::Encrypted(jwe) = CompactToken::parse(&token).expect("Token should parse.")
		else {
			panic!("Five segments should parse as a JWE.");
		};

		assert_eq!(jwe.header().enc.as_deref(), Some("A256GCM"));
		assert_eq!(jwe.protected(), header);
		assert_eq!(jwe.ciphertext(), b"cipher");
		assert_eq!(jwe.tag(), b"tag");
	}

	#[test]
	fn structural_defects_are_malformed() {
		assert!(matches!(
			CompactToken::parse("a.b"),
			Err(MalformedTokenError::SegmentCount { segments: 2 })
		));
		assert!(matches!(
			CompactToken::parse("***.e30.c2ln"),
			Err(MalformedTokenError::Encoding { segment: "header", .. })
		));

		let not_object = URL_SAFE_NO_PAD.encode("[1]");

		assert!(matches!(
			CompactToken::parse(&format!("{not_object}.e30.c2ln")),
			Err(MalformedTokenError::Header { .. })
		));

		let no_alg = URL_SAFE_NO_PAD.encode(r#"{"kid":"k1"}"#);

		assert!(matches!(
			CompactToken::parse(&format!("{no_alg}.e30.c2ln")),
			Err(MalformedTokenError::MissingAlgorithm)
		));
	}
}
