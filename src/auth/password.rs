//! Password digests.
//!
//! Salted, iterated SHA-256. Stored format:
//! `sha256$<iterations>$<salt-hex>$<digest-hex>`. Digest-only, never the
//! plaintext.

use sha2::{Digest, Sha256};

const ITERATIONS: u32 = 10_000;

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

fn digest(password: &str, salt: &str, iterations: u32) -> String {
    let mut acc = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();
    for _ in 1..iterations {
        acc = Sha256::new()
            .chain_update(salt.as_bytes())
            .chain_update(acc)
            .finalize();
    }
    hex_encode(&acc)
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "sha256${}${}${}",
        ITERATIONS,
        salt,
        digest(password, &salt, ITERATIONS)
    )
}

/// Verify a password against a stored digest. Malformed digests never
/// verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some("sha256"), Some(iterations), Some(salt), Some(expected)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    if iterations == 0 {
        return false;
    }
    let actual = digest(password, salt, iterations);
    // Constant-time comparison.
    actual.len() == expected.len()
        && actual
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let stored = hash_password("hunter2");
        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn malformed_digest_never_verifies() {
        assert!(!verify_password("x", "!"));
        assert!(!verify_password("x", "sha256$abc$def"));
    }
}
