//! HMAC-SHA256 checks for inbound webhooks and document exit URLs.
//!
//! Both checks compute an uppercase hex digest and compare it in constant time against the
//! presented value. [`validate_webhook`] reports a plain boolean so request handlers can
//! short-circuit, while [`validate_signature`] raises [`Error::Authorization`] on mismatch.

// crates.io
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
// self
use crate::{_prelude::*, error::ConfigError};

type HmacSha256 = Hmac<Sha256>;

/// Inputs of a single verification call.
#[derive(Clone, Copy)]
pub struct SignatureContext<'a> {
	/// Exact bytes covered by the MAC.
	pub payload: &'a [u8],
	/// MAC key.
	pub secret: &'a [u8],
	/// Hex signature supplied by the caller.
	pub presented: &'a str,
}
impl<'a> SignatureContext<'a> {
	/// Groups the verification inputs.
	pub fn new(payload: &'a [u8], secret: &'a [u8], presented: &'a str) -> Self {
		Self { payload, secret, presented }
	}

	/// Computes the uppercase hex digest of the payload.
	pub fn expected(&self) -> Result<String, ConfigError> {
		Ok(hex::encode_upper(mac_sha256(self.secret, self.payload)?))
	}

	/// Compares the presented signature with the expected one in constant time.
	pub fn verify(&self) -> Result<bool, ConfigError> {
		Ok(constant_time_eq(&self.expected()?, self.presented))
	}
}
impl Debug for SignatureContext<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SignatureContext")
			.field("payload_len", &self.payload.len())
			.field("secret", &"<redacted>")
			.field("presented", &self.presented)
			.finish()
	}
}

/// Verifies the `X-Signature` header of a webhook call against its raw query string.
///
/// The query string is URL-decoded (`+` becomes a space) before hashing. Any failure to compute
/// the digest is reported as a mismatch.
pub fn validate_webhook(secret: &str, raw_query: &str, presented: &str) -> bool {
	let decoded = url_decode(raw_query);

	SignatureContext::new(&decoded, secret.as_bytes(), presented).verify().unwrap_or(false)
}

/// Verifies the signature appended to a document exit URL.
///
/// The payload is `{document}/{status}` or `{document}/{status}/{token}` when `token` is not
/// empty.
pub fn validate_signature(
	website_key: &str,
	document: &str,
	status: &str,
	token: &str,
	presented: &str,
) -> Result<bool> {
	let payload = if token.is_empty() {
		format!("{document}/{status}")
	} else {
		format!("{document}/{status}/{token}")
	};
	let ctx = SignatureContext::new(payload.as_bytes(), website_key.as_bytes(), presented);

	if ctx.verify()? {
		Ok(true)
	} else {
		#[cfg(feature = "tracing")]
		tracing::warn!(document, status, "Exit URL signature mismatch.");

		Err(Error::Authorization { message: format!("invalid signature for document {document}") })
	}
}

pub(crate) fn mac_sha256(key: &[u8], message: &[u8]) -> Result<[u8; 32], ConfigError> {
	let mut mac = HmacSha256::new_from_slice(key).map_err(|_| ConfigError::InvalidMacKey)?;

	mac.update(message);

	let mut digest = [0_u8; 32];

	digest.copy_from_slice(&mac.finalize().into_bytes());

	Ok(digest)
}

fn constant_time_eq(expected: &str, presented: &str) -> bool {
	if expected.len() != presented.len() {
		return false;
	}

	expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

fn url_decode(raw: &str) -> Vec<u8> {
	let plus_decoded = raw.replace('+', " ");

	urlencoding::decode_binary(plus_decoded.as_bytes()).into_owned()
}
