use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::{
    TYPE_A, TYPE_AAAA, TYPE_CNAME, TYPE_DNSKEY, TYPE_DS, TYPE_MX, TYPE_NAPTR, TYPE_NS, TYPE_NSEC,
    TYPE_NSEC3, TYPE_NSEC3PARAM, TYPE_PTR, TYPE_RRSIG, TYPE_SOA, TYPE_SRV, TYPE_TXT,
};

/// One block of an RR's RDATA, in the order the type descriptor table
/// lists them. See spec §3/§4.B.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    /// A fixed-width binary blob of exactly `n` bytes.
    Fixed(usize),
    /// An embedded domain name, always emitted verbatim (DNSSEC records
    /// and other types where compression is conventionally disallowed).
    Name,
    /// An embedded domain name eligible for compression when an encoder
    /// is given a compression context.
    CompressibleName,
    /// Whatever bytes remain in the RDATA once the preceding blocks are
    /// consumed. At most one per descriptor, and always last.
    Remainder,
    /// The NAPTR record's irregular layout: 2×u16, three
    /// length-prefixed byte strings, then one embedded (uncompressed)
    /// name. Appears alone.
    NaptrSpecial,
}

fn validate(blocks: &'static [Block]) -> &'static [Block] {
    let remainder_count = blocks.iter().filter(|b| **b == Block::Remainder).count();
    debug_assert!(remainder_count <= 1, "at most one REMAINDER block");
    if remainder_count == 1 {
        debug_assert!(
            matches!(blocks.last(), Some(Block::Remainder)),
            "REMAINDER must be last"
        );
    }
    if blocks.contains(&Block::NaptrSpecial) {
        debug_assert_eq!(blocks.len(), 1, "NAPTR_SPECIAL must appear alone");
    }
    blocks
}

static A: [Block; 1] = [Block::Fixed(4)];
static NS: [Block; 1] = [Block::CompressibleName];
static CNAME: [Block; 1] = [Block::CompressibleName];
// mname, rname (uncompressed by convention), then serial/refresh/retry/expire/minimum.
static SOA: [Block; 3] = [Block::Name, Block::Name, Block::Fixed(20)];
static PTR: [Block; 1] = [Block::CompressibleName];
// preference, then exchange (compressible).
static MX: [Block; 2] = [Block::Fixed(2), Block::CompressibleName];
static TXT: [Block; 1] = [Block::Remainder];
static AAAA: [Block; 1] = [Block::Fixed(16)];
// priority, weight, port, then target (uncompressed per RFC 2782 convention).
static SRV: [Block; 2] = [Block::Fixed(6), Block::Name];
static NAPTR: [Block; 1] = [Block::NaptrSpecial];
// key tag, algorithm, digest type, then the digest.
static DS: [Block; 2] = [Block::Fixed(4), Block::Remainder];
// type covered, algorithm, labels, orig ttl, expiration, inception, key tag (18 bytes),
// signer name (never compressed per RFC 4034 §3.1.7), then the signature.
static RRSIG: [Block; 3] = [Block::Fixed(18), Block::Name, Block::Remainder];
// next domain name (uncompressed), then the type bitmap.
static NSEC: [Block; 2] = [Block::Name, Block::Remainder];
// flags, protocol, algorithm, then the public key.
static DNSKEY: [Block; 2] = [Block::Fixed(4), Block::Remainder];
// hash algorithm, flags, iterations (4 bytes), then salt-length-prefixed salt,
// hash-length-prefixed next hashed owner, and the type bitmap, all opaque.
static NSEC3: [Block; 2] = [Block::Fixed(4), Block::Remainder];
static NSEC3PARAM: [Block; 2] = [Block::Fixed(4), Block::Remainder];
static UNKNOWN: [Block; 1] = [Block::Remainder];

static DESCRIPTORS: Lazy<HashMap<u16, &'static [Block]>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(TYPE_A, validate(&A));
    m.insert(TYPE_NS, validate(&NS));
    m.insert(TYPE_CNAME, validate(&CNAME));
    m.insert(TYPE_SOA, validate(&SOA));
    m.insert(TYPE_PTR, validate(&PTR));
    m.insert(TYPE_MX, validate(&MX));
    m.insert(TYPE_TXT, validate(&TXT));
    m.insert(TYPE_AAAA, validate(&AAAA));
    m.insert(TYPE_SRV, validate(&SRV));
    m.insert(TYPE_NAPTR, validate(&NAPTR));
    m.insert(TYPE_DS, validate(&DS));
    m.insert(TYPE_RRSIG, validate(&RRSIG));
    m.insert(TYPE_NSEC, validate(&NSEC));
    m.insert(TYPE_DNSKEY, validate(&DNSKEY));
    m.insert(TYPE_NSEC3, validate(&NSEC3));
    m.insert(TYPE_NSEC3PARAM, validate(&NSEC3PARAM));
    m
});

/// Looks up the block list for `rtype`. Unknown types default to a
/// single opaque `Remainder` block (RFC 3597).
pub fn descriptor_for(rtype: u16) -> &'static [Block] {
    DESCRIPTORS.get(&rtype).copied().unwrap_or(&UNKNOWN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_descriptor_has_at_most_one_trailing_remainder() {
        for rtype in [
            TYPE_A,
            TYPE_NS,
            TYPE_CNAME,
            TYPE_SOA,
            TYPE_PTR,
            TYPE_MX,
            TYPE_TXT,
            TYPE_AAAA,
            TYPE_SRV,
            TYPE_NAPTR,
            TYPE_DS,
            TYPE_RRSIG,
            TYPE_NSEC,
            TYPE_DNSKEY,
            TYPE_NSEC3,
            TYPE_NSEC3PARAM,
            9999,
        ] {
            let d = descriptor_for(rtype);
            let remainders = d.iter().filter(|b| **b == Block::Remainder).count();
            assert!(remainders <= 1);
            if remainders == 1 {
                assert_eq!(d.last(), Some(&Block::Remainder));
            }
        }
    }

    #[test]
    fn unknown_type_defaults_to_remainder() {
        assert_eq!(descriptor_for(65000), &[Block::Remainder]);
    }
}
