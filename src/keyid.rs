//! DNSSEC key identifiers: a SHA-1 digest over a public key's DER
//! encoding, used to correlate a DNSKEY RR with the keys an operator
//! manages out of band (spec §4.G; grounded on the original's
//! `dnssec/lib/key/keyid.c`, which hashes the same DER encoding rather
//! than the RFC 4034 key tag algorithm).

use std::cmp::Ordering;
use std::fmt;

use sha1::{Digest, Sha1};

/// A 20-byte SHA-1 digest identifying a DNSSEC key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId([u8; 20]);

impl KeyId {
    /// Computes the key id of a public key's DER encoding.
    pub fn from_public_key_der(der: &[u8]) -> KeyId {
        let digest = Sha1::digest(der);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest);
        KeyId(bytes)
    }

    pub fn from_bytes(bytes: [u8; 20]) -> KeyId {
        KeyId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase, unseparated hex, e.g. `"da39a3ee5e6b4b0d3255bfef95601890afd80709"`.
    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(40);
        for byte in self.0 {
            s.push_str(&format!("{byte:02x}"));
        }
        s
    }

    pub fn cmp(&self, other: &KeyId) -> Ordering {
        self.0.cmp(&other.0)
    }

    pub fn equal(&self, other: &KeyId) -> bool {
        self == other
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_matches_known_sha1() {
        let id = KeyId::from_public_key_der(&[]);
        assert_eq!(id.to_hex(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn distinct_inputs_produce_distinct_ids() {
        let a = KeyId::from_public_key_der(b"key-a");
        let b = KeyId::from_public_key_der(b"key-b");
        assert_ne!(a, b);
        assert_ne!(a.cmp(&b), Ordering::Equal);
    }

    #[test]
    fn same_input_is_equal() {
        let a = KeyId::from_public_key_der(b"same key");
        let b = KeyId::from_public_key_der(b"same key");
        assert!(a.equal(&b));
    }
}
