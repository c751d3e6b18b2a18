use crate::error::{CodecError, CodecResult};
use crate::name::Name;
use crate::rdata::descriptor::{self, Block};
use crate::rdata::RdataBlock;
use crate::rrset::RRset;
use crate::wire::CompressionContext;

/// Writes `name` into `out`, pointing back into an earlier identical
/// whole name if `ctx` has one, otherwise writing it verbatim and
/// recording it for later encodes. Any name this call newly records is
/// appended to `recorded`, so a caller that ends up discarding the RR
/// can roll the context back (`CompressionContext::forget`).
fn write_name_compressed(name: &Name, out: &mut Vec<u8>, ctx: &mut CompressionContext, recorded: &mut Vec<Name>) {
    if let Some(ptr) = ctx.lookup(name) {
        out.push(0xC0 | (ptr >> 8) as u8);
        out.push((ptr & 0xFF) as u8);
        return;
    }
    let offset = out.len();
    name.write_verbatim(out);
    if ctx.lookup(name).is_none() {
        recorded.push(name.clone());
    }
    ctx.record(name.clone(), offset);
}

/// Writes `name` verbatim, never as a pointer, but still makes it
/// available as a compression target for later `CompressibleName`
/// slots (SOA mname/rname, SRV target and friends are conventionally
/// never themselves compressed, but nothing downstream is stopped from
/// pointing at them).
fn write_name_uncompressed(name: &Name, out: &mut Vec<u8>, ctx: &mut CompressionContext, recorded: &mut Vec<Name>) {
    let offset = out.len();
    name.write_verbatim(out);
    if ctx.lookup(name).is_none() {
        recorded.push(name.clone());
    }
    ctx.record(name.clone(), offset);
}

fn encode_block(
    block: &RdataBlock,
    descriptor: &Block,
    out: &mut Vec<u8>,
    ctx: &mut CompressionContext,
    recorded: &mut Vec<Name>,
) -> CodecResult<()> {
    match (block, descriptor) {
        (RdataBlock::Fixed(bytes), Block::Fixed(n)) => {
            if bytes.len() != *n {
                return Err(CodecError::Malformed("fixed block length mismatch"));
            }
            out.extend_from_slice(bytes);
        }
        (RdataBlock::Name(name), Block::Name) => write_name_uncompressed(name, out, ctx, recorded),
        (RdataBlock::Name(name), Block::CompressibleName) => write_name_compressed(name, out, ctx, recorded),
        (RdataBlock::Remainder(bytes), Block::Remainder) => out.extend_from_slice(bytes),
        (RdataBlock::NaptrFixed(fixed, strings, name), Block::NaptrSpecial) => {
            out.extend_from_slice(fixed);
            for s in strings {
                if s.len() > 255 {
                    return Err(CodecError::Malformed("NAPTR string exceeds 255 bytes"));
                }
                out.push(s.len() as u8);
                out.extend_from_slice(s);
            }
            write_name_uncompressed(name, out, ctx, recorded);
        }
        _ => return Err(CodecError::Malformed("rdata block does not match type descriptor")),
    }
    Ok(())
}

/// Encodes RR `pos` of `rrset` (owner, type, class, ttl, rdlength, rdata)
/// into `out`, starting at `out.len()`. If the result would exceed
/// `max_len` bytes, `out` is rolled back to its pre-call length and the
/// RR is discarded, returning `Ok(false)`. `encode_rrset` turns this
/// into either a lower written count (other RRs still fit) or a
/// `NoSpace` error (nothing did).
fn encode_one(rrset: &RRset, pos: usize, out: &mut Vec<u8>, ctx: &mut CompressionContext, max_len: usize) -> CodecResult<bool> {
    let start = out.len();
    let mut recorded = Vec::new();
    write_name_compressed(rrset.owner(), out, ctx, &mut recorded);
    out.extend_from_slice(&rrset.rtype().to_be_bytes());
    out.extend_from_slice(&rrset.class().to_be_bytes());
    out.extend_from_slice(&rrset.ttl().to_be_bytes());
    let len_slot = out.len();
    out.extend_from_slice(&[0, 0]);
    let rdata_start = out.len();

    let descriptors = descriptor::descriptor_for(rrset.rtype());
    let blocks = rrset.rr_blocks(pos)?;
    let mut failed = blocks.len() != descriptors.len();
    if !failed {
        for (block, d) in blocks.iter().zip(descriptors) {
            if encode_block(block, d, out, ctx, &mut recorded).is_err() {
                failed = true;
                break;
            }
        }
    }

    let rdlength = out.len() - rdata_start;
    if failed || rdlength > u16::MAX as usize || out.len() > max_len {
        out.truncate(start);
        for name in &recorded {
            ctx.forget(name);
        }
        tracing::debug!(
            owner = %rrset.owner(),
            rtype = rrset.rtype(),
            pos,
            "discarding RR: would overflow output buffer or violate its type descriptor"
        );
        return Ok(false);
    }
    let rdlen_bytes = (rdlength as u16).to_be_bytes();
    out[len_slot..len_slot + 2].copy_from_slice(&rdlen_bytes);
    Ok(true)
}

/// Encodes every RR of `rrset` into `out`, in order, bounded by
/// `max_len` total bytes. When at least one RR fits, RRs that would
/// overflow the bound (or whose RDATA doesn't match the type's
/// descriptor) are discarded rather than aborting the whole set, and
/// the number of RRs actually written becomes the caller's outgoing
/// `ANCOUNT`/similar contribution. When the set is non-empty but not a
/// single RR fits — the single-oversized-RR boundary case — nothing
/// was usefully written, so this returns `Err(NoSpace)` with `out` at
/// its original length rather than a silent `Ok(0)` (see DESIGN.md).
pub fn encode_rrset(rrset: &RRset, out: &mut Vec<u8>, ctx: &mut CompressionContext, max_len: usize) -> CodecResult<usize> {
    let mut written = 0;
    for pos in 0..rrset.rr_count() {
        if encode_one(rrset, pos, out, ctx, max_len)? {
            written += 1;
        }
    }
    if rrset.rr_count() > 0 && written == 0 {
        return Err(CodecError::NoSpace);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rrset::RRset;
    use crate::{CLASS_IN, TYPE_A, TYPE_CNAME, TYPE_NS};

    #[test]
    fn encodes_a_record_with_rdlength() {
        let owner = Name::from_text("example.com.").unwrap();
        let mut set = RRset::new(owner, TYPE_A, CLASS_IN, 300);
        set.add_rdata(vec![RdataBlock::Fixed(vec![192, 0, 2, 1])]).unwrap();

        let mut out = Vec::new();
        let mut ctx = CompressionContext::new();
        let n = encode_rrset(&set, &mut out, &mut ctx, 4096).unwrap();
        assert_eq!(n, 1);

        let rdlength = u16::from_be_bytes([out[out.len() - 6], out[out.len() - 5]]);
        assert_eq!(rdlength, 4);
        assert_eq!(&out[out.len() - 4..], &[192, 0, 2, 1]);
    }

    #[test]
    fn repeated_owner_is_compressed() {
        let owner = Name::from_text("example.com.").unwrap();
        let mut a = RRset::new(owner.clone(), TYPE_A, CLASS_IN, 300);
        a.add_rdata(vec![RdataBlock::Fixed(vec![1, 2, 3, 4])]).unwrap();
        let mut ns = RRset::new(owner, TYPE_NS, CLASS_IN, 300);
        ns.add_rdata(vec![RdataBlock::Name(Name::from_text("ns1.example.com.").unwrap())])
            .unwrap();

        let mut out = Vec::new();
        let mut ctx = CompressionContext::new();
        encode_rrset(&a, &mut out, &mut ctx, 4096).unwrap();
        let second_start = out.len();
        encode_rrset(&ns, &mut out, &mut ctx, 4096).unwrap();

        // owner of the second RR should be a 2-byte pointer, not 13 bytes.
        assert_eq!(out[second_start] & 0xC0, 0xC0);
    }

    #[test]
    fn lone_oversized_rr_fails_no_space() {
        let owner = Name::from_text("example.com.").unwrap();
        let mut set = RRset::new(owner.clone(), TYPE_CNAME, CLASS_IN, 300);
        set.add_rdata(vec![RdataBlock::Name(Name::from_text("target.example.com.").unwrap())])
            .unwrap();

        let mut out = Vec::new();
        let mut ctx = CompressionContext::new();
        let err = encode_rrset(&set, &mut out, &mut ctx, 2).unwrap_err();
        assert_eq!(err, CodecError::NoSpace);
        assert!(out.is_empty());
    }

    #[test]
    fn oversized_rr_among_others_is_discarded_not_fatal() {
        let owner = Name::from_text("example.com.").unwrap();
        let mut set = RRset::new(owner, TYPE_A, CLASS_IN, 300);
        set.add_rdata(vec![RdataBlock::Fixed(vec![192, 0, 2, 1])]).unwrap();
        set.add_rdata(vec![RdataBlock::Fixed(vec![192, 0, 2, 2])]).unwrap();

        let mut out = Vec::new();
        let mut ctx = CompressionContext::new();
        // First RR: 13-byte verbatim owner + 10-byte header + 4-byte
        // rdata = 27 bytes. Second RR would compress its owner to a
        // 2-byte pointer (16 bytes total) but this bound leaves no room
        // for it, so only the first RR survives.
        let n = encode_rrset(&set, &mut out, &mut ctx, 30).unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn mismatched_block_kind_is_rejected() {
        let mut recorded = Vec::new();
        let ok = encode_block(
            &RdataBlock::Remainder(vec![1]),
            &Block::Fixed(4),
            &mut Vec::new(),
            &mut CompressionContext::new(),
            &mut recorded,
        );
        assert!(ok.is_err());
    }

    #[test]
    fn discarded_rr_rolls_back_compression_context() {
        let owner = Name::from_text("example.com.").unwrap();
        let mut set = RRset::new(owner.clone(), TYPE_A, CLASS_IN, 300);
        set.add_rdata(vec![RdataBlock::Fixed(vec![1, 2, 3, 4])]).unwrap();

        let mut out = Vec::new();
        let mut ctx = CompressionContext::new();
        // Owner alone exceeds this bound, so the RR (and its owner's
        // freshly-recorded offset) must be rolled back in full.
        let err = encode_rrset(&set, &mut out, &mut ctx, 2).unwrap_err();
        assert_eq!(err, CodecError::NoSpace);
        assert_eq!(ctx.lookup(&owner), None);
    }
}
