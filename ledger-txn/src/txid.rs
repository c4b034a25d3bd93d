use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// A globally unique transaction id: 128 bits of randomness rendered as
/// 32 lowercase hex digits. Assigned once by the coordinator when a
/// TRANSFER is accepted and carried unchanged through every PREPARE,
/// COMMIT, ABORT, and log entry for that transaction.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Txid(String);

impl Txid {
    pub fn generate() -> Txid {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        let mut hex = String::with_capacity(32);
        for b in bytes {
            hex.push_str(&format!("{b:02x}"));
        }
        Txid(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Txid {
    fn from(s: String) -> Self {
        Txid(s)
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn generates_distinct_32_char_hex_ids() {
        let a = Txid::generate();
        let b = Txid::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
