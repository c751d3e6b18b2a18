//! A portable, host-endian on-disk serialization for an `RRset` (spec
//! §4.F). This is not the wire codec: it never compresses names, and
//! every embedded name carries an explicit one-byte size prefix so a
//! reader never needs to understand label framing to skip over one.
//!
//! Layout:
//! ```text
//! u64 total_length            // byte length of the whole blob, this field included
//! u16 rr_count
//! u32 indices[rr_count]       // cumulative per-RR body length, informational
//! u8  owner_size
//! u8  owner_wire[owner_size]
//! u16 rtype
//! u16 class
//! u32 ttl
//! per RR:
//!   u32 rr_length
//!   u8  body[rr_length]       // blocks in descriptor order; embedded
//!                             // names are `u8 size` + `size` wire bytes
//! ```

use crate::error::{CodecError, CodecResult};
use crate::name::Name;
use crate::rdata::descriptor::{self, Block};
use crate::rdata::{RdataBlock, RdataRecord};
use crate::rrset::RRset;

fn journal_record_len(record: &RdataRecord) -> usize {
    record
        .iter()
        .map(|b| match b {
            RdataBlock::Fixed(v) => v.len(),
            RdataBlock::Name(n) => 1 + n.size(),
            RdataBlock::Remainder(v) => v.len(),
            RdataBlock::NaptrFixed(_, strings, name) => {
                4 + strings.iter().map(|s| 1 + s.len()).sum::<usize>() + 1 + name.size()
            }
        })
        .sum()
}

fn encode_journal_record(record: &RdataRecord) -> Vec<u8> {
    let mut out = Vec::with_capacity(journal_record_len(record));
    for block in record {
        match block {
            RdataBlock::Fixed(b) => out.extend_from_slice(b),
            RdataBlock::Name(n) => {
                let mut w = Vec::with_capacity(n.size());
                n.write_verbatim(&mut w);
                out.push(w.len() as u8);
                out.extend_from_slice(&w);
            }
            RdataBlock::Remainder(b) => out.extend_from_slice(b),
            RdataBlock::NaptrFixed(fixed, strings, name) => {
                out.extend_from_slice(fixed);
                for s in strings {
                    out.push(s.len() as u8);
                    out.extend_from_slice(s);
                }
                let mut w = Vec::with_capacity(name.size());
                name.write_verbatim(&mut w);
                out.push(w.len() as u8);
                out.extend_from_slice(&w);
            }
        }
    }
    out
}

fn decode_journal_record(rtype: u16, slice: &[u8]) -> CodecResult<RdataRecord> {
    let descriptors = descriptor::descriptor_for(rtype);
    let end = slice.len();
    let mut cursor = 0usize;
    let mut blocks = Vec::with_capacity(descriptors.len());

    let read_sized_name = |slice: &[u8], cursor: &mut usize| -> CodecResult<Name> {
        if *cursor >= end {
            return Err(CodecError::Malformed("journal name size truncated"));
        }
        let size = slice[*cursor] as usize;
        *cursor += 1;
        let next = cursor
            .checked_add(size)
            .ok_or(CodecError::Malformed("journal name size overflow"))?;
        if next > end {
            return Err(CodecError::Malformed("journal name overruns record"));
        }
        let (name, consumed) = Name::parse(slice, *cursor)?;
        if consumed != size {
            return Err(CodecError::Malformed("journal name size mismatch"));
        }
        *cursor = next;
        Ok(name)
    };

    for d in descriptors {
        match d {
            Block::Fixed(n) => {
                let next = cursor
                    .checked_add(*n)
                    .ok_or(CodecError::Malformed("fixed block overflow"))?;
                if next > end {
                    return Err(CodecError::Malformed("fixed block overruns record"));
                }
                blocks.push(RdataBlock::Fixed(slice[cursor..next].to_vec()));
                cursor = next;
            }
            Block::Name | Block::CompressibleName => {
                let name = read_sized_name(slice, &mut cursor)?;
                blocks.push(RdataBlock::Name(name));
            }
            Block::Remainder => {
                blocks.push(RdataBlock::Remainder(slice[cursor..end].to_vec()));
                cursor = end;
            }
            Block::NaptrSpecial => {
                if cursor + 4 > end {
                    return Err(CodecError::Malformed("NAPTR fixed fields truncated"));
                }
                let mut fixed = [0u8; 4];
                fixed.copy_from_slice(&slice[cursor..cursor + 4]);
                cursor += 4;

                let mut strings = Vec::with_capacity(3);
                for _ in 0..3 {
                    if cursor >= end {
                        return Err(CodecError::Malformed("NAPTR string truncated"));
                    }
                    let len = slice[cursor] as usize;
                    cursor += 1;
                    let next = cursor
                        .checked_add(len)
                        .ok_or(CodecError::Malformed("NAPTR string overflow"))?;
                    if next > end {
                        return Err(CodecError::Malformed("NAPTR string overruns record"));
                    }
                    strings.push(slice[cursor..next].to_vec());
                    cursor = next;
                }
                let name = read_sized_name(slice, &mut cursor)?;
                let strings: [Vec<u8>; 3] = strings
                    .try_into()
                    .expect("exactly three NAPTR strings were pushed above");
                blocks.push(RdataBlock::NaptrFixed(fixed, strings, name));
            }
        }
    }

    if cursor != end {
        return Err(CodecError::Malformed("journal record length mismatch"));
    }
    Ok(blocks)
}

/// Serializes `rrset` into the portable journal format.
pub fn serialize(rrset: &RRset) -> CodecResult<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(&0u64.to_ne_bytes()); // total_length, patched below

    let rr_count: u16 = rrset
        .rr_count()
        .try_into()
        .map_err(|_| CodecError::InvalidArgs("rr_count exceeds u16"))?;
    out.extend_from_slice(&rr_count.to_ne_bytes());

    let mut cumulative = 0u32;
    let record_bodies: Vec<Vec<u8>> = (0..rrset.rr_count())
        .map(|pos| encode_journal_record(rrset.rr_blocks(pos).expect("pos in range")))
        .collect();
    for body in &record_bodies {
        cumulative += body.len() as u32;
        out.extend_from_slice(&cumulative.to_ne_bytes());
    }

    let mut owner_wire = Vec::new();
    rrset.owner().write_verbatim(&mut owner_wire);
    let owner_size: u8 = owner_wire
        .len()
        .try_into()
        .map_err(|_| CodecError::InvalidArgs("owner exceeds 255 wire octets"))?;
    out.push(owner_size);
    out.extend_from_slice(&owner_wire);

    out.extend_from_slice(&rrset.rtype().to_ne_bytes());
    out.extend_from_slice(&rrset.class().to_ne_bytes());
    out.extend_from_slice(&rrset.ttl().to_ne_bytes());

    for body in &record_bodies {
        out.extend_from_slice(&(body.len() as u32).to_ne_bytes());
        out.extend_from_slice(body);
    }

    let total_length = out.len() as u64;
    out[0..8].copy_from_slice(&total_length.to_ne_bytes());
    Ok(out)
}

/// Deserializes an `RRset` previously produced by `serialize`.
pub fn deserialize(bytes: &[u8]) -> CodecResult<RRset> {
    if bytes.len() < 8 {
        return Err(CodecError::Malformed("journal blob shorter than header"));
    }
    let total_length = u64::from_ne_bytes(bytes[0..8].try_into().unwrap());
    if total_length as usize != bytes.len() {
        return Err(CodecError::Malformed("journal total_length mismatch"));
    }
    let mut cursor = 8usize;

    let rr_count = u16::from_ne_bytes(
        bytes
            .get(cursor..cursor + 2)
            .ok_or(CodecError::Malformed("journal truncated at rr_count"))?
            .try_into()
            .unwrap(),
    ) as usize;
    cursor += 2;

    cursor += rr_count
        .checked_mul(4)
        .ok_or(CodecError::Malformed("journal rr_count overflow"))?;
    if cursor > bytes.len() {
        return Err(CodecError::Malformed("journal truncated at indices"));
    }

    let owner_size = *bytes
        .get(cursor)
        .ok_or(CodecError::Malformed("journal truncated at owner_size"))? as usize;
    cursor += 1;
    let owner_wire = bytes
        .get(cursor..cursor + owner_size)
        .ok_or(CodecError::Malformed("journal truncated at owner"))?;
    let (owner, consumed) = Name::parse(owner_wire, 0)?;
    if consumed != owner_size {
        return Err(CodecError::Malformed("journal owner size mismatch"));
    }
    cursor += owner_size;

    let rtype = u16::from_ne_bytes(
        bytes
            .get(cursor..cursor + 2)
            .ok_or(CodecError::Malformed("journal truncated at rtype"))?
            .try_into()
            .unwrap(),
    );
    cursor += 2;
    let class = u16::from_ne_bytes(
        bytes
            .get(cursor..cursor + 2)
            .ok_or(CodecError::Malformed("journal truncated at class"))?
            .try_into()
            .unwrap(),
    );
    cursor += 2;
    let ttl = u32::from_ne_bytes(
        bytes
            .get(cursor..cursor + 4)
            .ok_or(CodecError::Malformed("journal truncated at ttl"))?
            .try_into()
            .unwrap(),
    );
    cursor += 4;

    let mut rrset = RRset::new(owner, rtype, class, ttl);
    for _ in 0..rr_count {
        let rr_length = u32::from_ne_bytes(
            bytes
                .get(cursor..cursor + 4)
                .ok_or(CodecError::Malformed("journal truncated at rr_length"))?
                .try_into()
                .unwrap(),
        ) as usize;
        cursor += 4;
        let body = bytes
            .get(cursor..cursor + rr_length)
            .ok_or(CodecError::Malformed("journal truncated at record body"))?;
        cursor += rr_length;
        rrset.add_rdata(decode_journal_record(rtype, body)?)?;
    }

    if cursor != bytes.len() {
        return Err(CodecError::Malformed("journal trailing bytes"));
    }
    Ok(rrset)
}
