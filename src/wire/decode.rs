use crate::error::{CodecError, CodecResult};
use crate::name::Name;
use crate::rdata::descriptor::{self, Block};
use crate::rdata::{RdataBlock, RdataRecord};

/// Decodes one RR's RDATA, given its type, the full message buffer, the
/// offset RDATA starts at, and `rdlength` from the RR header. Names may
/// follow compression pointers anywhere earlier in `wire`; every other
/// block must stay within `[pos, pos + rdlength)`.
pub fn decode_record(rtype: u16, wire: &[u8], pos: usize, rdlength: usize) -> CodecResult<RdataRecord> {
    let end = pos
        .checked_add(rdlength)
        .ok_or(CodecError::Malformed("rdlength overflow"))?;
    if end > wire.len() {
        tracing::debug!(rtype, pos, rdlength, "rdlength exceeds available bytes");
        return Err(CodecError::Malformed("rdlength exceeds available bytes"));
    }

    let descriptors = descriptor::descriptor_for(rtype);
    let mut blocks = Vec::with_capacity(descriptors.len());
    let mut cursor = pos;

    for d in descriptors {
        match d {
            Block::Fixed(n) => {
                let next = cursor
                    .checked_add(*n)
                    .ok_or(CodecError::Malformed("fixed block overflow"))?;
                if next > end {
                    return Err(CodecError::Malformed("fixed block overruns rdlength"));
                }
                blocks.push(RdataBlock::Fixed(wire[cursor..next].to_vec()));
                cursor = next;
            }
            Block::Name | Block::CompressibleName => {
                let (name, consumed) = Name::parse(wire, cursor)?;
                let next = cursor
                    .checked_add(consumed)
                    .ok_or(CodecError::Malformed("name block overflow"))?;
                if next > end {
                    return Err(CodecError::Malformed("name overruns rdlength"));
                }
                blocks.push(RdataBlock::Name(name));
                cursor = next;
            }
            Block::Remainder => {
                blocks.push(RdataBlock::Remainder(wire[cursor..end].to_vec()));
                cursor = end;
            }
            Block::NaptrSpecial => {
                if cursor + 4 > end {
                    return Err(CodecError::Malformed("NAPTR fixed fields truncated"));
                }
                let mut fixed = [0u8; 4];
                fixed.copy_from_slice(&wire[cursor..cursor + 4]);
                cursor += 4;

                let mut strings = Vec::with_capacity(3);
                for _ in 0..3 {
                    if cursor >= end {
                        return Err(CodecError::Malformed("NAPTR string truncated"));
                    }
                    let len = wire[cursor] as usize;
                    cursor += 1;
                    let next = cursor
                        .checked_add(len)
                        .ok_or(CodecError::Malformed("NAPTR string overflow"))?;
                    if next > end {
                        return Err(CodecError::Malformed("NAPTR string overruns rdlength"));
                    }
                    strings.push(wire[cursor..next].to_vec());
                    cursor = next;
                }

                let (name, consumed) = Name::parse(wire, cursor)?;
                let next = cursor
                    .checked_add(consumed)
                    .ok_or(CodecError::Malformed("NAPTR name overflow"))?;
                if next != end {
                    return Err(CodecError::Malformed(
                        "NAPTR name does not exactly fill rdlength",
                    ));
                }
                cursor = next;

                let strings: [Vec<u8>; 3] = strings
                    .try_into()
                    .expect("exactly three NAPTR strings were pushed above");
                blocks.push(RdataBlock::NaptrFixed(fixed, strings, name));
            }
        }
    }

    if cursor != end {
        tracing::debug!(rtype, pos, rdlength, "rdata length mismatch: descriptor did not exhaust rdlength");
        return Err(CodecError::Malformed("rdata length mismatch"));
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encode::encode_rrset;
    use crate::wire::CompressionContext;
    use crate::{CLASS_IN, TYPE_A, TYPE_NAPTR, TYPE_TXT};

    #[test]
    fn decodes_fixed_block() {
        let wire = [192, 0, 2, 1];
        let record = decode_record(TYPE_A, &wire, 0, 4).unwrap();
        assert_eq!(record.len(), 1);
        match &record[0] {
            RdataBlock::Fixed(b) => assert_eq!(b, &vec![192, 0, 2, 1]),
            _ => panic!("expected Fixed"),
        }
    }

    #[test]
    fn truncated_fixed_block_is_malformed() {
        let wire = [192, 0, 2];
        assert!(decode_record(TYPE_A, &wire, 0, 4).is_err());
    }

    #[test]
    fn remainder_consumes_exactly_rdlength() {
        let wire = b"hello world";
        let record = decode_record(TYPE_TXT, wire, 0, wire.len()).unwrap();
        match &record[0] {
            RdataBlock::Remainder(b) => assert_eq!(b, wire),
            _ => panic!("expected Remainder"),
        }
    }

    #[test]
    fn naptr_round_trips_through_encode() {
        use crate::name::Name;
        use crate::rrset::RRset;

        let owner = Name::from_text("example.com.").unwrap();
        let mut set = RRset::new(owner, TYPE_NAPTR, CLASS_IN, 300);
        set.add_rdata(vec![RdataBlock::NaptrFixed(
            [0, 100, 0, 10],
            [b"u".to_vec(), b"E2U+sip".to_vec(), b"!^.*$!sip:info@example.com!".to_vec()],
            Name::root(),
        )])
        .unwrap();

        let mut out = Vec::new();
        let mut ctx = CompressionContext::new();
        encode_rrset(&set, &mut out, &mut ctx, 4096).unwrap();

        // owner (13) + type(2) + class(2) + ttl(4) + rdlength(2) = 23 bytes of header.
        let rdlength = u16::from_be_bytes([out[21], out[22]]) as usize;
        let record = decode_record(TYPE_NAPTR, &out, 23, rdlength).unwrap();
        match &record[0] {
            RdataBlock::NaptrFixed(fixed, strings, name) => {
                assert_eq!(fixed, &[0, 100, 0, 10]);
                assert_eq!(strings[1], b"E2U+sip");
                assert!(name.is_root());
            }
            _ => panic!("expected NaptrFixed"),
        }
    }
}
