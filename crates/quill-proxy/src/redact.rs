//! Keeping the privileged key out of logs and error text.

use sha2::{Digest, Sha256};

use quill_core::PrivilegedKey;

const REDACTED: &str = "[redacted]";

/// Short SHA-256 fingerprint of a key, safe to log.
#[must_use]
pub fn key_fingerprint(key: &PrivilegedKey) -> String {
    let digest = Sha256::digest(key.expose().as_bytes());
    hex::encode(&digest[..4])
}

/// Replace every occurrence of the key in `text`.
pub(crate) fn redact(text: &str, key: &PrivilegedKey) -> String {
    if key.is_empty() {
        return text.to_string();
    }
    text.replace(key.expose(), REDACTED)
}
