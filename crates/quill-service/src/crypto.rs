//! Constant-time comparison for API key checks.

/// Compare two strings without an early exit on the first differing byte.
///
/// Lengths are compared first, so only the key length can leak.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
