use std::cmp::Ordering;

use crate::error::{CodecError, CodecResult};
use crate::name::Name;
use crate::rdata::{self, descriptor, RdataBlock, RdataRecord};
use crate::TYPE_RRSIG;

/// Granularity of `RRset::equal` (spec §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqualMode {
    /// Same underlying object (`self` and `other` are literally the same
    /// value in memory).
    Pointer,
    /// Owner, class and type match; RDATA is not inspected.
    HeaderOnly,
    /// Header matches and RDATA matches as a multi-set (order-independent).
    HeaderPlusRdata,
}

/// A DNS RRset: every RR sharing `(owner, class, type)`, plus its
/// optional covering RRSIG set. RDATA is stored as a list of structured
/// records (see `rdata::RdataBlock`) rather than a packed byte buffer —
/// see SPEC_FULL.md §1 for why.
#[derive(Debug, Clone)]
pub struct RRset {
    owner: Name,
    rtype: u16,
    class: u16,
    ttl: u32,
    records: Vec<RdataRecord>,
    rrsigs: Option<Box<RRset>>,
}

impl RRset {
    pub fn new(owner: Name, rtype: u16, class: u16, ttl: u32) -> RRset {
        RRset {
            owner,
            rtype,
            class,
            ttl,
            records: Vec::new(),
            rrsigs: None,
        }
    }

    pub fn owner(&self) -> &Name {
        &self.owner
    }

    pub fn rtype(&self) -> u16 {
        self.rtype
    }

    pub fn class(&self) -> u16 {
        self.class
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn set_ttl(&mut self, ttl: u32) {
        self.ttl = ttl;
    }

    pub fn rr_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn rrsigs(&self) -> Option<&RRset> {
        self.rrsigs.as_deref()
    }

    /// Attaches (or replaces) the covering RRSIG set. Fails `InvalidArgs`
    /// unless the signature set shares this set's owner and is itself
    /// typed RRSIG (spec invariant 4).
    pub fn set_rrsigs(&mut self, rrsigs: RRset) -> CodecResult<()> {
        if rrsigs.rtype != TYPE_RRSIG {
            return Err(CodecError::InvalidArgs("rrsigs must be type RRSIG"));
        }
        if rrsigs.owner != self.owner {
            return Err(CodecError::InvalidArgs("rrsigs owner must match"));
        }
        self.rrsigs = Some(Box::new(rrsigs));
        Ok(())
    }

    /// Appends one RR's RDATA. The record's block count must match this
    /// set's type descriptor.
    pub fn add_rdata(&mut self, record: RdataRecord) -> CodecResult<()> {
        let expected = descriptor::descriptor_for(self.rtype).len();
        if record.len() != expected {
            return Err(CodecError::InvalidArgs(
                "record block count does not match type descriptor",
            ));
        }
        self.records.push(record);
        Ok(())
    }

    /// The blocks making up the RR at `pos` (replaces the source's
    /// `rr_slice`, which sliced a packed byte buffer that no longer
    /// exists in this representation — see SPEC_FULL.md §1).
    pub fn rr_blocks(&self, pos: usize) -> CodecResult<&[RdataBlock]> {
        self.records
            .get(pos)
            .map(Vec::as_slice)
            .ok_or(CodecError::InvalidArgs("pos >= rr_count"))
    }

    /// Wire-encoded byte length of the RR at `pos`.
    pub fn rr_size(&self, pos: usize) -> CodecResult<u16> {
        let record = self.rr_blocks(pos)?;
        Ok(rdata::record_encoded_len(record) as u16)
    }

    /// Cumulative end offsets of each RR's encoded bytes — `indices` in
    /// spec §3, computed rather than stored since there is no packed
    /// buffer to index into.
    pub fn indices(&self) -> Vec<u32> {
        let mut total = 0u32;
        self.records
            .iter()
            .map(|r| {
                total += rdata::record_encoded_len(r) as u32;
                total
            })
            .collect()
    }

    /// Every embedded name across all RRs, in declaration order.
    pub fn iter_names(&self) -> impl Iterator<Item = &Name> {
        self.records.iter().flat_map(|r| r.iter().flat_map(RdataBlock::names))
    }

    /// Compares RR `i` of `self` against RR `j` of `other`, per spec
    /// §4.C. Both sets must share a type (comparing RRs across types is
    /// meaningless since their descriptors differ).
    pub fn cmp_one(&self, other: &RRset, i: usize, j: usize) -> CodecResult<Ordering> {
        if self.rtype != other.rtype {
            return Err(CodecError::InvalidArgs("cmp_one requires a common type"));
        }
        let a = self.rr_blocks(i)?;
        let b = other.rr_blocks(j)?;
        Ok(rdata::cmp_records(a, b))
    }

    fn header_eq(&self, other: &RRset) -> bool {
        self.owner == other.owner && self.class == other.class && self.rtype == other.rtype
    }

    /// Multi-set RDATA equality used by `HeaderPlusRdata`: every RR in
    /// `self` must have a distinct match in `other` and vice versa.
    fn rdata_multiset_eq(&self, other: &RRset) -> bool {
        if self.records.len() != other.records.len() {
            return false;
        }
        let mut matched = vec![false; other.records.len()];
        'outer: for a in &self.records {
            for (j, taken) in matched.iter_mut().enumerate() {
                if *taken {
                    continue;
                }
                if rdata::cmp_records(a, &other.records[j]) == Ordering::Equal {
                    *taken = true;
                    continue 'outer;
                }
            }
            return false;
        }
        true
    }

    pub fn equal(&self, other: &RRset, mode: EqualMode) -> bool {
        match mode {
            EqualMode::Pointer => std::ptr::eq(self, other),
            EqualMode::HeaderOnly => self.header_eq(other),
            EqualMode::HeaderPlusRdata => {
                self.header_eq(other) && self.rtype == other.rtype && self.rdata_multiset_eq(other)
            }
        }
    }

    fn require_mergeable(&self, other: &RRset) -> CodecResult<()> {
        if self.owner != other.owner || self.class != other.class || self.rtype != other.rtype {
            return Err(CodecError::InvalidArgs(
                "merge requires matching owner, class and type",
            ));
        }
        Ok(())
    }

    /// Concatenates `other`'s RRs after `self`'s, in `other`'s order.
    /// No deduplication.
    pub fn merge(&mut self, other: RRset) -> CodecResult<()> {
        self.require_mergeable(&other)?;
        self.records.extend(other.records);
        Ok(())
    }

    /// As `merge`, but an RR from `other` is appended only if no RR
    /// already present (including ones just appended from `other`
    /// itself) compares equal under `cmp_one`. Idempotent: merging the
    /// same set twice leaves the first result unchanged.
    pub fn merge_unique(&mut self, other: RRset) -> CodecResult<()> {
        self.require_mergeable(&other)?;
        for candidate in other.records {
            let dup = self
                .records
                .iter()
                .any(|existing| rdata::cmp_records(existing, &candidate) == Ordering::Equal);
            if !dup {
                self.records.push(candidate);
            }
        }
        Ok(())
    }

    /// Removes the first RR in `self` equal under `cmp_one` to
    /// `donor.rr_blocks(donor_pos)`. Fails `NotFound` (no mutation) if
    /// absent.
    pub fn remove_rr_by_content(&mut self, donor: &RRset, donor_pos: usize) -> CodecResult<()> {
        if self.rtype != donor.rtype {
            return Err(CodecError::InvalidArgs(
                "remove_rr_by_content requires a common type",
            ));
        }
        let target = donor.rr_blocks(donor_pos)?;
        let found = self
            .records
            .iter()
            .position(|r| rdata::cmp_records(r, target) == Ordering::Equal);
        match found {
            Some(pos) => {
                self.records.remove(pos);
                Ok(())
            }
            None => Err(CodecError::NotFound),
        }
    }

    /// Duplicates this set. When `copy_embedded_names` is set, every
    /// embedded name (not the owner) is given a fresh allocation so the
    /// result shares no `Name` with `self`; otherwise embedded names are
    /// retained (reference-counted, shared).
    pub fn deep_copy(&self, copy_embedded_names: bool) -> RRset {
        let records = if copy_embedded_names {
            self.records.iter().map(|r| deep_clone_record(r)).collect()
        } else {
            self.records.clone()
        };
        RRset {
            owner: self.owner.clone(),
            rtype: self.rtype,
            class: self.class,
            ttl: self.ttl,
            records,
            rrsigs: self
                .rrsigs
                .as_ref()
                .map(|s| Box::new(s.deep_copy(copy_embedded_names))),
        }
    }
}

fn deep_clone_record(record: &RdataRecord) -> RdataRecord {
    record
        .iter()
        .map(|block| match block {
            RdataBlock::Fixed(b) => RdataBlock::Fixed(b.clone()),
            RdataBlock::Name(n) => RdataBlock::Name(n.deep_clone()),
            RdataBlock::Remainder(b) => RdataBlock::Remainder(b.clone()),
            RdataBlock::NaptrFixed(f, s, n) => {
                RdataBlock::NaptrFixed(*f, s.clone(), n.deep_clone())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CLASS_IN, TYPE_A, TYPE_TXT};

    fn owner() -> Name {
        Name::from_text("example.com.").unwrap()
    }

    #[test]
    fn add_rdata_rejects_wrong_block_count() {
        let mut set = RRset::new(owner(), TYPE_A, CLASS_IN, 300);
        let err = set
            .add_rdata(vec![RdataBlock::Fixed(vec![1, 2, 3]), RdataBlock::Fixed(vec![4])])
            .unwrap_err();
        assert_eq!(err, CodecError::InvalidArgs("record block count does not match type descriptor"));
    }

    #[test]
    fn merge_unique_is_idempotent() {
        let mut a = RRset::new(owner(), TYPE_TXT, CLASS_IN, 300);
        a.add_rdata(vec![RdataBlock::Remainder(vec![1, 2, 3])]).unwrap();
        let mut b = RRset::new(owner(), TYPE_TXT, CLASS_IN, 300);
        b.add_rdata(vec![RdataBlock::Remainder(vec![1, 2, 3])]).unwrap();
        b.add_rdata(vec![RdataBlock::Remainder(vec![4, 5, 6])]).unwrap();

        a.merge_unique(b.deep_copy(false)).unwrap();
        assert_eq!(a.rr_count(), 2);
        assert_eq!(a.indices(), vec![3, 6]);

        a.merge_unique(b).unwrap();
        assert_eq!(a.rr_count(), 2);
        assert_eq!(a.indices(), vec![3, 6]);
    }

    #[test]
    fn remove_by_content_compacts_indices() {
        let mut set = RRset::new(owner(), TYPE_TXT, CLASS_IN, 300);
        set.add_rdata(vec![RdataBlock::Remainder(b"\x03foo".to_vec())]).unwrap();
        set.add_rdata(vec![RdataBlock::Remainder(b"\x03bar".to_vec())]).unwrap();
        set.add_rdata(vec![RdataBlock::Remainder(b"\x03baz".to_vec())]).unwrap();

        let mut donor = RRset::new(owner(), TYPE_TXT, CLASS_IN, 300);
        donor.add_rdata(vec![RdataBlock::Remainder(b"\x03bar".to_vec())]).unwrap();

        set.remove_rr_by_content(&donor, 0).unwrap();
        assert_eq!(set.rr_count(), 2);
        assert_eq!(set.indices()[0], 4);
        assert_eq!(*set.indices().last().unwrap(), 8);
    }

    #[test]
    fn remove_by_content_not_found() {
        let mut set = RRset::new(owner(), TYPE_TXT, CLASS_IN, 300);
        set.add_rdata(vec![RdataBlock::Remainder(vec![1])]).unwrap();
        let mut donor = RRset::new(owner(), TYPE_TXT, CLASS_IN, 300);
        donor.add_rdata(vec![RdataBlock::Remainder(vec![9])]).unwrap();
        assert_eq!(
            set.remove_rr_by_content(&donor, 0).unwrap_err(),
            CodecError::NotFound
        );
        assert_eq!(set.rr_count(), 1);
    }

    #[test]
    fn merge_requires_matching_header() {
        let mut a = RRset::new(owner(), TYPE_A, CLASS_IN, 300);
        let b = RRset::new(Name::from_text("other.com.").unwrap(), TYPE_A, CLASS_IN, 300);
        assert!(a.merge(b).is_err());
    }

    #[test]
    fn deep_copy_without_name_copy_shares_embedded_names() {
        let target = Name::from_text("target.example.").unwrap();
        let mut set = RRset::new(owner(), crate::TYPE_CNAME, CLASS_IN, 300);
        set.add_rdata(vec![RdataBlock::Name(target.clone())]).unwrap();

        let shallow = set.deep_copy(false);
        let deep = set.deep_copy(true);

        if let RdataBlock::Name(n) = &shallow.rr_blocks(0).unwrap()[0] {
            assert_eq!(n, &target);
        } else {
            panic!("expected a Name block");
        }
        if let RdataBlock::Name(n) = &deep.rr_blocks(0).unwrap()[0] {
            assert_eq!(n, &target); // equal in value
        } else {
            panic!("expected a Name block");
        }
    }

    #[test]
    fn equal_header_plus_rdata_ignores_order() {
        let mut a = RRset::new(owner(), TYPE_TXT, CLASS_IN, 300);
        a.add_rdata(vec![RdataBlock::Remainder(vec![1])]).unwrap();
        a.add_rdata(vec![RdataBlock::Remainder(vec![2])]).unwrap();

        let mut b = RRset::new(owner(), TYPE_TXT, CLASS_IN, 300);
        b.add_rdata(vec![RdataBlock::Remainder(vec![2])]).unwrap();
        b.add_rdata(vec![RdataBlock::Remainder(vec![1])]).unwrap();

        assert!(a.equal(&b, EqualMode::HeaderPlusRdata));
    }
}
