use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::error::{CodecError, CodecResult};

/// RFC 1035 §4.1.4: a pointer's 14-bit offset tops out at 16383, and the
/// two top bits of the length octet mark it (`0xC0`).
const POINTER_MASK: u8 = 0xC0;
const MAX_POINTER_JUMPS: usize = 64;
const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_WIRE_LEN: usize = 255;

struct NameInner {
    /// Raw label bytes, original case preserved (equality folds case).
    labels: Vec<Vec<u8>>,
    /// Cached total wire size, labels plus the terminating zero octet.
    size: usize,
}

impl fmt::Debug for NameInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", format_labels(&self.labels))
    }
}

fn format_labels(labels: &[Vec<u8>]) -> String {
    if labels.is_empty() {
        return ".".to_string();
    }
    let mut s = String::new();
    for label in labels {
        s.push_str(&String::from_utf8_lossy(label));
        s.push('.');
    }
    s
}

fn lowercase(label: &[u8]) -> Vec<u8> {
    label.iter().map(|b| b.to_ascii_lowercase()).collect()
}

/// A domain name: a sequence of length-prefixed labels terminated by the
/// root label. Shared by reference count across every RRset that embeds
/// or owns it — cloning a `Name` never copies label data.
#[derive(Clone, Debug)]
pub struct Name(Rc<NameInner>);

impl Name {
    /// The root name (zero labels, one-byte wire form).
    pub fn root() -> Name {
        Name(Rc::new(NameInner {
            labels: Vec::new(),
            size: 1,
        }))
    }

    /// Builds a name from already-split label bytes, validating label and
    /// total wire-length limits.
    pub fn from_labels(labels: Vec<Vec<u8>>) -> CodecResult<Name> {
        let mut size = 1usize; // terminating zero
        for label in &labels {
            if label.is_empty() || label.len() > MAX_LABEL_LEN {
                return Err(CodecError::InvalidArgs("label length out of range"));
            }
            size += 1 + label.len();
        }
        if size > MAX_NAME_WIRE_LEN {
            return Err(CodecError::InvalidArgs("name exceeds 255 wire octets"));
        }
        Ok(Name(Rc::new(NameInner { labels, size })))
    }

    /// Parses a presentation-format name such as `"example.com."`. No
    /// escape sequences are supported; this is a convenience for tests
    /// and the demo binary, not a wire-format parser.
    pub fn from_text(text: &str) -> CodecResult<Name> {
        let trimmed = text.strip_suffix('.').unwrap_or(text);
        if trimmed.is_empty() {
            return Name::from_labels(Vec::new());
        }
        let labels = trimmed
            .split('.')
            .map(|l| l.as_bytes().to_vec())
            .collect();
        Name::from_labels(labels)
    }

    /// Parses a name starting at `start` in `wire`, following compression
    /// pointers only backward into `wire[..start]` (RFC 1035 §4.1.4).
    /// Returns the name and the number of bytes consumed from `start`
    /// (a pointer jump itself counts as 2 bytes; bytes read through the
    /// jump do not advance the caller's cursor).
    pub fn parse(wire: &[u8], start: usize) -> CodecResult<(Name, usize)> {
        let mut labels = Vec::new();
        let mut pos = start;
        let mut consumed = 0usize;
        let mut jumps = 0usize;
        let mut jumped = false;
        let mut total_size = 0usize;

        loop {
            let b = *wire
                .get(pos)
                .ok_or(CodecError::Malformed("name truncated"))?;

            if b & POINTER_MASK == POINTER_MASK {
                let lo = *wire
                    .get(pos + 1)
                    .ok_or(CodecError::Malformed("truncated compression pointer"))?;
                let ptr = (((b & !POINTER_MASK) as usize) << 8) | lo as usize;
                if !jumped {
                    consumed += 2;
                }
                if ptr >= start {
                    return Err(CodecError::Malformed("forward compression pointer"));
                }
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return Err(CodecError::Malformed("too many compression pointer jumps"));
                }
                pos = ptr;
                jumped = true;
                continue;
            }
            if b & POINTER_MASK != 0 {
                return Err(CodecError::Malformed("reserved label length bits"));
            }
            if b == 0 {
                if !jumped {
                    consumed += 1;
                }
                total_size += 1;
                break;
            }

            let len = b as usize;
            let start_of_label = pos + 1;
            let end_of_label = start_of_label + len;
            if end_of_label > wire.len() {
                return Err(CodecError::Malformed("truncated label"));
            }
            labels.push(wire[start_of_label..end_of_label].to_vec());
            total_size += 1 + len;
            if !jumped {
                consumed += 1 + len;
            }
            pos = end_of_label;
        }

        if total_size > MAX_NAME_WIRE_LEN {
            return Err(CodecError::Malformed("name exceeds 255 wire octets"));
        }
        let name = Name::from_labels(labels)?;
        Ok((name, consumed))
    }

    /// Builds a fresh, independently-allocated `Name` with the same
    /// labels. Used by `RRset::deep_copy(true)` so the result shares no
    /// `Rc` with the source.
    pub fn deep_clone(&self) -> Name {
        Name(Rc::new(NameInner {
            labels: self.0.labels.clone(),
            size: self.0.size,
        }))
    }

    /// Total wire length, labels plus the terminating zero octet.
    pub fn size(&self) -> usize {
        self.0.size
    }

    pub fn labels(&self) -> &[Vec<u8>] {
        &self.0.labels
    }

    pub fn is_root(&self) -> bool {
        self.0.labels.is_empty()
    }

    /// Appends the verbatim (uncompressed) wire form: every label then
    /// the terminating zero octet.
    pub fn write_verbatim(&self, out: &mut Vec<u8>) {
        for label in &self.0.labels {
            out.push(label.len() as u8);
            out.extend_from_slice(label);
        }
        out.push(0);
    }

    /// Canonical DNS ordering (RFC 4034 §6.1): compare labels
    /// right-to-left, case-folded, shorter-is-a-prefix sorts first.
    pub fn canon_cmp(&self, other: &Name) -> Ordering {
        let a = &self.0.labels;
        let b = &other.0.labels;
        let mut ia = a.len();
        let mut ib = b.len();
        loop {
            match (ia == 0, ib == 0) {
                (true, true) => return Ordering::Equal,
                (true, false) => return Ordering::Less,
                (false, true) => return Ordering::Greater,
                (false, false) => {}
            }
            ia -= 1;
            ib -= 1;
            match lowercase(&a[ia]).cmp(&lowercase(&b[ib])) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_labels(&self.0.labels))
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        let a = &self.0.labels;
        let b = &other.0.labels;
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_ignore_ascii_case(y))
    }
}
impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for label in &self.0.labels {
            lowercase(label).hash(state);
        }
    }
}
