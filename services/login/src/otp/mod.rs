//! OTP issuance and verification.

pub mod engine;

pub use engine::{OtpEngine, VerifiedLogin};

use rand::Rng;

/// Inclusive range of issuable passcodes; every draw has six digits.
const CODE_RANGE: std::ops::RangeInclusive<u32> = 100_000..=999_999;

/// Draw a uniformly distributed six-digit passcode.
#[must_use]
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(CODE_RANGE).to_string()
}
