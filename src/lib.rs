//! RRset wire codec and Response Rate Limiter.
//!
//! This crate is split into the value type (`RRset`, built from
//! `rdata`/`name`), its wire codec (`wire`), a portable on-disk
//! serialization for it (`journal`), a DNSSEC key-id helper (`keyid`),
//! and an independent query-rate limiter (`rrl`). See SPEC_FULL.md for
//! the full module map.

pub mod error;
pub mod journal;
pub mod keyid;
pub mod name;
pub mod rdata;
pub mod rrl;
pub mod rrset;
pub mod wire;

pub use error::{CodecError, CodecResult, RrlError, RrlResult};
pub use name::Name;
pub use rdata::{RdataBlock, RdataRecord};
pub use rrset::{EqualMode, RRset};

pub type Type = u16;
pub type Class = u16;

pub const TYPE_A: Type = 1;
pub const TYPE_NS: Type = 2;
pub const TYPE_CNAME: Type = 5;
pub const TYPE_SOA: Type = 6;
pub const TYPE_PTR: Type = 12;
pub const TYPE_MX: Type = 15;
pub const TYPE_TXT: Type = 16;
pub const TYPE_AAAA: Type = 28;
pub const TYPE_SRV: Type = 33;
pub const TYPE_NAPTR: Type = 35;
pub const TYPE_DS: Type = 43;
pub const TYPE_RRSIG: Type = 46;
pub const TYPE_NSEC: Type = 47;
pub const TYPE_DNSKEY: Type = 48;
pub const TYPE_NSEC3: Type = 50;
pub const TYPE_NSEC3PARAM: Type = 51;

pub const CLASS_IN: Class = 1;
pub const CLASS_CH: Class = 3;
pub const CLASS_ANY: Class = 255;
