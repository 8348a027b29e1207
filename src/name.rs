//! The hierarchical Name model: an ordered sequence of opaque byte
//! components. Grounded on `ndn.cxx/name.cpp`: append/get/getSubName/toUri,
//! and the number & marker encodings used by versioned components.
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::{NdnError, NdnResult};

/// Reserved marker byte for version components (spec.md §4.1).
pub const VERSION_MARKER: u8 = 0xFD;

/// `getSubName`'s `len` sentinel meaning "to the end".
pub const NPOS: usize = usize::MAX;

/// A single opaque byte component of a [`Name`].
pub type Component = Vec<u8>;

/// An ordered sequence of byte components; the empty sequence is the root
/// name. Immutable after construction in the sense that every mutator takes
/// `&mut self` and appends — there is no in-place component rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Name {
    components: Vec<Component>,
}

impl Name {
    pub fn new() -> Self {
        Name { components: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Append raw bytes as one component.
    pub fn append(&mut self, comp: impl Into<Component>) -> &mut Self {
        self.components.push(comp.into());
        self
    }

    /// Append a UTF-8 string as one component.
    pub fn append_str(&mut self, s: &str) -> &mut Self {
        self.append(s.as_bytes().to_vec())
    }

    /// Append all of `other`'s components, in order.
    pub fn append_name(&mut self, other: &Name) -> &mut Self {
        self.components.extend(other.components.iter().cloned());
        self
    }

    /// Canonical minimal little-endian encoding of `n`, trailing zero bytes
    /// stripped. `appendNumber(0)` yields an empty component.
    pub fn append_number(&mut self, n: u64) -> &mut Self {
        let bytes = encode_number(n);
        self.append(bytes)
    }

    /// One-byte `marker` prefix followed by the minimal little-endian
    /// encoding of `n`. `0xFD` is reserved for versions.
    pub fn append_number_with_marker(&mut self, n: u64, marker: u8) -> &mut Self {
        let mut bytes = vec![marker];
        bytes.extend(encode_number(n));
        self.append(bytes)
    }

    /// Append a version component. If `version` is `None`, synthesize one
    /// from the current UTC time: `(seconds << 12) | (microseconds / 244)`,
    /// packing a 12-bit subsecond fraction (~4096 ticks/second). The divisor
    /// is an intentional lossy approximation of `1_000_000 / 4096`.
    pub fn append_version(&mut self, version: Option<u64>) -> &mut Self {
        let v = version.unwrap_or_else(|| synthesize_version(Utc::now()));
        self.append_number_with_marker(v, VERSION_MARKER)
    }

    /// `get(i)`: negative indices count from the end (`-1` = last), using
    /// the conventional `size + i` rule. The original `ndn.cxx` source
    /// computes `size - 1 - i` instead, which is almost certainly a bug
    /// (see spec.md §9); this implementation does not reproduce it.
    pub fn get(&self, i: i64) -> NdnResult<&Component> {
        let idx = self.resolve_index(i)?;
        Ok(&self.components[idx])
    }

    fn resolve_index(&self, i: i64) -> NdnResult<usize> {
        let size = self.components.len() as i64;
        let idx = if i < 0 { size + i } else { i };
        if idx < 0 || idx >= size {
            return Err(NdnError::name(format!("index out of range: {}", i)));
        }
        Ok(idx as usize)
    }

    /// Slice `[pos, pos+len)`; `len == NPOS` means "to the end".
    pub fn get_sub_name(&self, pos: usize, len: usize) -> NdnResult<Name> {
        let len = if len == NPOS {
            self.components.len().saturating_sub(pos)
        } else {
            len
        };
        if pos.checked_add(len).map(|end| end > self.components.len()).unwrap_or(true) {
            return Err(NdnError::name("getSubName parameter out of range"));
        }
        Ok(Name { components: self.components[pos..pos + len].to_vec() })
    }

    /// `/`-delimited URI; each byte printed as ASCII when printable,
    /// `%HH` (lowercase hex) otherwise.
    pub fn to_uri(&self) -> String {
        let mut s = String::from("/");
        for (i, comp) in self.components.iter().enumerate() {
            if i > 0 {
                s.push('/');
            }
            s.push_str(&component_to_uri(comp));
        }
        s
    }
}

fn component_to_uri(comp: &[u8]) -> String {
    let mut s = String::with_capacity(comp.len());
    for &b in comp {
        if b.is_ascii_graphic() || b == b' ' {
            // NB: a literal space is printable but not URI-safe outside this
            // library's own round-trip use; spec.md scenario 1 keeps it raw.
            s.push(b as char);
        } else {
            s.push_str(&format!("%{:02x}", b));
        }
    }
    s
}

/// Decode a component as little-endian unsigned; empty decodes to 0.
pub fn as_number(comp: &[u8]) -> u64 {
    let mut ret: u64 = 0;
    for (shift, &b) in comp.iter().enumerate() {
        ret |= (b as u64) << (8 * shift);
    }
    ret
}

/// Decode a marker-prefixed component; fails if the first byte isn't `marker`.
pub fn as_number_with_marker(comp: &[u8], marker: u8) -> NdnResult<u64> {
    if comp.is_empty() || comp[0] != marker {
        return Err(NdnError::name(format!(
            "component does not have required marker {:#04x}: {}",
            marker,
            component_to_uri(comp)
        )));
    }
    Ok(as_number(&comp[1..]))
}

fn encode_number(mut n: u64) -> Vec<u8> {
    let mut bytes = Vec::new();
    while n > 0 {
        bytes.push((n & 0xFF) as u8);
        n >>= 8;
    }
    bytes
}

fn synthesize_version(now: DateTime<Utc>) -> u64 {
    let total_seconds = now.timestamp() as u64;
    let micros = now.timestamp_subsec_micros() as u64;
    (total_seconds << 12) | ((micros / 244) & 0xFFF)
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uri())
    }
}

impl FromStr for Name {
    type Err = NdnError;

    /// Parse a URI back into a Name; the inverse of [`Name::to_uri`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut name = Name::new();
        let trimmed = s.strip_prefix('/').unwrap_or(s);
        if trimmed.is_empty() {
            return Ok(name);
        }
        for part in trimmed.split('/') {
            name.append(decode_uri_component(part)?);
        }
        Ok(name)
    }
}

fn decode_uri_component(part: &str) -> NdnResult<Component> {
    let bytes = part.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 3 > bytes.len() {
                return Err(NdnError::name(format!("malformed %HH escape in {:?}", part)));
            }
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                .map_err(|_| NdnError::name("malformed %HH escape"))?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| NdnError::name(format!("malformed %HH escape: {}", hex)))?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    /// URI-form lexicographic order; a total, tie-breaker-free order per
    /// spec.md §4.1 ("Comparison").
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_uri().cmp(&other.to_uri())
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::from_str(s).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_round_trip_with_space() {
        let name = Name::from_str("/a/b%20c").unwrap();
        assert_eq!(name.to_uri(), "/a/b%20c");
        assert_eq!(name.get(1).unwrap(), b"b c");
    }

    #[test]
    fn version_component_layout() {
        let mut name = Name::new();
        name.append_version(Some(0x123));
        assert_eq!(name.get(-1).unwrap().as_slice(), &[0xFD, 0x23, 0x01]);
    }

    #[test]
    fn append_number_zero_is_empty() {
        let mut name = Name::new();
        name.append_number(0);
        assert!(name.get(0).unwrap().is_empty());
        assert_eq!(as_number(name.get(0).unwrap()), 0);
    }

    #[test]
    fn append_number_minimal_encoding() {
        let mut name = Name::new();
        name.append_number(256);
        assert_eq!(name.get(0).unwrap().as_slice(), &[0x00, 0x01]);
        assert_eq!(as_number(name.get(0).unwrap()), 256);

        let mut name2 = Name::new();
        name2.append_number(1);
        assert_eq!(name2.get(0).unwrap().as_slice(), &[1]);
    }

    #[test]
    fn negative_index_is_conventional() {
        let mut name = Name::new();
        name.append_str("a").append_str("b").append_str("c");
        assert_eq!(name.get(-1).unwrap().as_slice(), b"c");
        assert_eq!(name.get(-2).unwrap().as_slice(), b"b");
        assert!(name.get(-4).is_err());
    }

    #[test]
    fn get_sub_name_to_end() {
        let mut name = Name::new();
        name.append_str("a").append_str("b").append_str("c");
        let sub = name.get_sub_name(1, NPOS).unwrap();
        assert_eq!(sub.to_uri(), "/b/c");
    }

    #[test]
    fn from_uri_round_trips_through_name() {
        let mut name = Name::new();
        name.append_str("hello").append(vec![0x00, 0xff]);
        let uri = name.to_uri();
        let parsed = Name::from_str(&uri).unwrap();
        assert_eq!(name, parsed);
    }

    #[test]
    fn ordering_is_uri_lexicographic() {
        let a = Name::from_str("/a").unwrap();
        let b = Name::from_str("/b").unwrap();
        assert!(a < b);
    }

    #[test]
    fn marker_mismatch_fails() {
        let comp = vec![0x01, 0x02];
        assert!(as_number_with_marker(&comp, VERSION_MARKER).is_err());
    }
}
