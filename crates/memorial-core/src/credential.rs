//! Owner and admin credentials.
use rand::{thread_rng, RngCore};
use std::fmt::{Debug, Formatter};

use crate::constant::CREDENTIAL_BYTES;

/// Secret handed to the creator of a post. Only its holder (or an admin)
/// may delete the post.
#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct OwnerCredential(String);

impl OwnerCredential {
    /// Generate a fresh credential: `CREDENTIAL_BYTES` random bytes, hex encoded.
    pub fn generate() -> Self {
        let mut buffer = [0u8; CREDENTIAL_BYTES];
        thread_rng().fill_bytes(&mut buffer);
        Self(hex::encode(buffer))
    }

    /// Wrap a credential read back from storage.
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, presented: &str) -> bool {
        constant_time_eq(self.0.as_bytes(), presented.as_bytes())
    }
}

impl Debug for OwnerCredential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "OwnerCredential(<redacted>)")
    }
}

/// The administrative secret configured for the server.
#[derive(Clone)]
pub struct AdminCredential(String);

impl AdminCredential {
    /// Returns `None` for a blank secret, which would otherwise let an empty
    /// header through.
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            return None;
        }
        Some(Self(secret))
    }

    pub fn matches(&self, presented: &str) -> bool {
        constant_time_eq(self.0.as_bytes(), presented.as_bytes())
    }
}

impl Debug for AdminCredential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "AdminCredential(<redacted>)")
    }
}

/// Compares in time independent of where the first differing byte is.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_credential_is_32_hex_chars() {
        for _ in 0..5 {
            let cred = OwnerCredential::generate();
            assert_eq!(cred.as_str().len(), 32);
            assert!(cred.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        }
        assert_ne!(OwnerCredential::generate(), OwnerCredential::generate());
    }

    #[test]
    fn test_credential_matching() {
        let cred = OwnerCredential::generate();
        let copy = cred.as_str().to_string();
        assert!(cred.matches(&copy));
        assert!(!cred.matches(&copy[..31]));
        assert!(!cred.matches(""));
        let first = if copy.starts_with('0') { "1" } else { "0" };
        assert!(!cred.matches(&format!("{first}{}", &copy[1..])));
    }

    #[test]
    fn test_debug_is_redacted() {
        let cred = OwnerCredential::generate();
        assert!(!format!("{:?}", cred).contains(cred.as_str()));
        let admin = AdminCredential::new("hunter2").unwrap();
        assert!(!format!("{:?}", admin).contains("hunter2"));
    }

    #[test]
    fn test_blank_admin_credential_is_unset() {
        assert!(AdminCredential::new("").is_none());
        assert!(AdminCredential::new("   ").is_none());
        assert!(AdminCredential::new("secret").unwrap().matches("secret"));
        assert!(!AdminCredential::new("secret").unwrap().matches("Secret"));
    }
}
