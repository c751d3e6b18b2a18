pub mod decode;
pub mod encode;

use std::collections::HashMap;

use crate::name::Name;

/// Tracks which names have already been written to an in-progress wire
/// buffer, for compression on subsequent encodes.
///
/// The source's compressor finds the longest shared suffix between a new
/// name and any previously-written name. Spec §4.D simplifies this to
/// whole-name matching only: a name is pointed-to only if an *entire*
/// earlier name (not a suffix of one) is identical. We follow the
/// simplified algorithm — it is what SPEC_FULL.md describes, and it's
/// the shape the journal/decoder pairing expects.
#[derive(Debug, Default)]
pub struct CompressionContext {
    offsets: HashMap<Name, u16>,
}

impl CompressionContext {
    pub fn new() -> CompressionContext {
        CompressionContext::default()
    }

    /// The offset a prior, identical whole name was written at, if any.
    pub fn lookup(&self, name: &Name) -> Option<u16> {
        self.offsets.get(name).copied()
    }

    /// Records that `name` was written verbatim at `offset`, so later
    /// encodes of the same name can point back to it. Offsets beyond the
    /// 14-bit pointer field (16383) are never recorded — there is
    /// nothing a compression pointer could address there.
    pub fn record(&mut self, name: Name, offset: usize) {
        if offset <= 0x3FFF && !self.offsets.contains_key(&name) {
            self.offsets.insert(name, offset as u16);
        }
    }

    /// Removes a recorded offset. Used to roll back entries an encoder
    /// added while writing an RR that was later discarded (e.g. for
    /// overflowing the output bound) — otherwise a later encode could
    /// receive a pointer into bytes that were never actually kept.
    pub fn forget(&mut self, name: &Name) {
        self.offsets.remove(name);
    }
}
