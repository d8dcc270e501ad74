//! Time-stepped one-time codes for step-up login.
//!
//! The API derives its codes from a shared private key with a truncation that differs from
//! RFC 6238: the digest offset comes from a single hex character of the lowercase digest and is
//! not masked to a nibble, so standard TOTP crates produce different codes.

// self
use crate::{_prelude::*, error::ConfigError, signature};

/// Literal prefix mixed into the HMAC key before the decoded private key.
pub const OTP_SALT: &[u8] = b"own";
/// Seconds covered by a single code.
pub const OTP_STEP_SECONDS: u64 = 30;
/// Number of digits in a code.
pub const OTP_DIGITS: usize = 8;

const DIGEST_OFFSET_INDEX: usize = 39;
const WINDOW_HEX_LEN: usize = 8;

/// Computes the code for `secret_hex` at `epoch_seconds`.
pub fn compute_otp(secret_hex: &str, epoch_seconds: u64) -> Result<String, ConfigError> {
	let decoded =
		hex::decode(secret_hex).map_err(|source| ConfigError::InvalidPrivateKey { source })?;
	let mut key = Vec::with_capacity(OTP_SALT.len() + decoded.len());

	key.extend_from_slice(OTP_SALT);
	key.extend_from_slice(&decoded);

	let counter = epoch_seconds / OTP_STEP_SECONDS;
	let digest = hex::encode(signature::mac_sha256(&key, &counter.to_be_bytes())?);

	Ok(truncate(&digest))
}

/// Computes the code for the current wall-clock step.
pub fn compute_otp_now(secret_hex: &str) -> Result<String, ConfigError> {
	compute_otp(secret_hex, epoch_seconds(OffsetDateTime::now_utc()))
}

pub(crate) fn epoch_seconds(instant: OffsetDateTime) -> u64 {
	u64::try_from(instant.unix_timestamp()).unwrap_or(0)
}

fn truncate(digest: &str) -> String {
	let nibble = digest
		.as_bytes()
		.get(DIGEST_OFFSET_INDEX)
		.and_then(|c| (*c as char).to_digit(16))
		.unwrap_or(0) as usize;
	let offset = nibble * 2;
	let window = &digest[offset..offset + WINDOW_HEX_LEN];
	let value = u32::from_str_radix(window, 16).unwrap_or(0) & 0x7FFF_FFFF;
	let decimal = value.to_string();
	let tail = &decimal[decimal.len().saturating_sub(OTP_DIGITS)..];

	format!("{tail:0>width$}", width = OTP_DIGITS)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn codes_match_reference_vectors() {
		assert_eq!(compute_otp("0123456789abcdef", 0).expect("Hex secret should decode."), "19066536");
		assert_eq!(
			compute_otp("0123456789abcdef", 1_700_000_000).expect("Hex secret should decode."),
			"70898271",
		);
		assert_eq!(compute_otp("DEADBEEF", 60).expect("Hex secret should decode."), "66358450");
		assert_eq!(compute_otp("", 1_234_567_890).expect("Empty secret should decode."), "38091268");
	}

	#[test]
	fn codes_keep_the_last_eight_digits() {
		// Raw masked value is 2006932458; the leading digit is dropped.
		assert_eq!(compute_otp("0123456789abcdef", 210).expect("Hex secret should decode."), "06932458");
	}

	#[test]
	fn codes_are_stable_within_a_step() {
		let first = compute_otp("DEADBEEF", 30).expect("Hex secret should decode.");
		let last = compute_otp("DEADBEEF", 59).expect("Hex secret should decode.");

		assert_eq!(first, last);
		assert_eq!(first.len(), OTP_DIGITS);
		assert!(first.chars().all(|c| c.is_ascii_digit()));
		assert_eq!(compute_otp("DEADBEEF", 59).expect("Hex secret should decode."), "60429841");
	}

	#[test]
	fn truncation_pads_short_values() {
		// Offset 0 selects `00000001`, which masks to 1.
		let digest = format!("00000001{}", "0".repeat(56));

		assert_eq!(truncate(&digest), "00000001");
	}

	#[test]
	fn invalid_hex_secret_is_rejected() {
		let err = compute_otp("not-hex", 0).expect_err("Non-hex secrets should be rejected.");

		assert!(matches!(err, ConfigError::InvalidPrivateKey { .. }));
	}
}
