use std::net::{IpAddr, Ipv4Addr};

use anyhow::Result;
use rsdns::name::Name;
use rsdns::rdata::RdataBlock;
use rsdns::rrl::{ResponseClass, RrlConfig, RrlTable};
use rsdns::rrset::RRset;
use rsdns::wire::decode::decode_record;
use rsdns::wire::encode::encode_rrset;
use rsdns::wire::CompressionContext;
use rsdns::{CLASS_IN, TYPE_A};

/// Builds a one-RR A RRset, round-trips it through the wire codec, then
/// runs it past a freshly built RRL table a few times to show admission
/// and throttling. Demonstrates the library end to end; carries none of
/// the codec/RRL logic itself.
fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let owner = Name::from_text("example.com.")?;
    let mut set = RRset::new(owner.clone(), TYPE_A, CLASS_IN, 300);
    set.add_rdata(vec![RdataBlock::Fixed(vec![192, 0, 2, 1])])?;

    let mut wire = Vec::new();
    let mut ctx = CompressionContext::new();
    let written = encode_rrset(&set, &mut wire, &mut ctx, 512)?;
    println!("encoded {written} RR(s), {} bytes: {wire:02x?}", wire.len());

    // Header is owner(13) + type(2) + class(2) + ttl(4) + rdlength(2) = 23 bytes.
    let rdlength = u16::from_be_bytes([wire[21], wire[22]]) as usize;
    let record = decode_record(TYPE_A, &wire, 23, rdlength)?;
    println!("decoded RDATA: {record:?}");

    let rrl = RrlTable::new(RrlConfig {
        rate: 5,
        slip: 2,
        table_size: 997,
        lock_granularity: 16,
        ipv4_prefix_len: 24,
        ipv6_prefix_len: 56,
    })?;
    let client = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 50));
    let zone = Name::from_text("com.")?;
    for i in 0..10 {
        let decision = rrl.query(client, &owner, &zone, ResponseClass::Normal);
        println!("query {i}: {decision:?}");
    }

    Ok(())
}
