//! Verification code generation.

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use subtle::ConstantTimeEq;

/// Length of a verification code
pub const CODE_LENGTH: usize = 6;

/// Generate a verification code drawn uniformly from `[A-Za-z0-9]`.
pub fn generate_code() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(CODE_LENGTH)
        .map(char::from)
        .collect()
}

/// Compare a stored code with a submitted one in constant time
pub fn codes_match(expected: &str, submitted: &str) -> bool {
    expected.as_bytes().ct_eq(submitted.as_bytes()).into()
}
