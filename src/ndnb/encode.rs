//! Free encoder functions paired one-for-one with an `estimate_*` function,
//! per spec: `estimate == len(append)` for every input. Grounded on the
//! teacher's `to_network_bytes`/estimate-by-construction idiom in
//! `network_order/primitive.rs`, adapted to NDNB's header+payload shape
//! instead of fixed-width integers.
use std::time::Duration;

use crate::ndnb::block::{append_block_header, append_closer, estimate_block_header, TypeTag, ESTIMATE_CLOSER};

/// `AppendNumber`: a decimal-ASCII UDATA block (no enclosing DTAG, no closer).
pub fn append_number(out: &mut Vec<u8>, n: u64) {
    let s = n.to_string();
    append_block_header(out, s.len() as u64, TypeTag::Udata);
    out.extend_from_slice(s.as_bytes());
}

pub fn estimate_number(n: u64) -> usize {
    let len = n.to_string().len() as u64;
    estimate_block_header(len) + len as usize
}

/// `AppendTaggedBlob`: `DTAG` header, a `BLOB` sub-block of `data`, closer.
pub fn append_tagged_blob(out: &mut Vec<u8>, dtag: u32, data: &[u8]) {
    append_block_header(out, dtag as u64, TypeTag::Dtag);
    append_block_header(out, data.len() as u64, TypeTag::Blob);
    out.extend_from_slice(data);
    append_closer(out);
}

pub fn estimate_tagged_blob(dtag: u32, data: &[u8]) -> usize {
    estimate_block_header(dtag as u64) + estimate_block_header(data.len() as u64) + data.len() + ESTIMATE_CLOSER
}

/// Like [`append_tagged_blob`] but the BLOB is zero-padded to `length` bytes
/// when `data` is shorter.
pub fn append_tagged_blob_with_padding(out: &mut Vec<u8>, dtag: u32, length: usize, data: &[u8]) {
    let padded_len = length.max(data.len());
    append_block_header(out, dtag as u64, TypeTag::Dtag);
    append_block_header(out, padded_len as u64, TypeTag::Blob);
    out.extend_from_slice(data);
    out.extend(std::iter::repeat(0u8).take(padded_len - data.len()));
    append_closer(out);
}

pub fn estimate_tagged_blob_with_padding(dtag: u32, length: usize, data: &[u8]) -> usize {
    let padded_len = length.max(data.len());
    estimate_block_header(dtag as u64) + estimate_block_header(padded_len as u64) + padded_len + ESTIMATE_CLOSER
}

/// `AppendString`: `DTAG`, a `UDATA` of `s`, closer.
pub fn append_string(out: &mut Vec<u8>, dtag: u32, s: &str) {
    append_block_header(out, dtag as u64, TypeTag::Dtag);
    append_block_header(out, s.len() as u64, TypeTag::Udata);
    out.extend_from_slice(s.as_bytes());
    append_closer(out);
}

pub fn estimate_string(dtag: u32, s: &str) -> usize {
    estimate_block_header(dtag as u64) + estimate_block_header(s.len() as u64) + s.len() + ESTIMATE_CLOSER
}

/// `AppendTaggedNumber`: `DTAG`, `AppendNumber`, closer.
pub fn append_tagged_number(out: &mut Vec<u8>, dtag: u32, n: u64) {
    append_block_header(out, dtag as u64, TypeTag::Dtag);
    append_number(out, n);
    append_closer(out);
}

pub fn estimate_tagged_number(dtag: u32, n: u64) -> usize {
    estimate_block_header(dtag as u64) + estimate_number(n) + ESTIMATE_CLOSER
}

/// Encodes `interval` as the 2-to-6-byte fixed-point timestamp: seconds in
/// the high-order bits, a 12-bit subsecond fraction computed as
/// `(ns % 1e9 / 5 * 8 + 195_312) / 390_625`, emitted big-endian with leading
/// all-zero bytes dropped (minimum 2 bytes).
fn timestamp_bytes(interval: Duration) -> Vec<u8> {
    let seconds = interval.as_secs();
    let nanos = interval.subsec_nanos() as u64;
    let fraction_12bit = (nanos % 1_000_000_000 / 5 * 8 + 195_312) / 390_625;
    let combined: u64 = (seconds << 12) | (fraction_12bit & 0x0FFF);

    let mut bytes = combined.to_be_bytes().to_vec();
    while bytes.len() > 2 && bytes[0] == 0 {
        bytes.remove(0);
    }
    bytes
}

/// `AppendTimestampBlob`: the fixed-point bytes wrapped as a tagged blob.
pub fn append_timestamp_blob(out: &mut Vec<u8>, dtag: u32, interval: Duration) {
    let bytes = timestamp_bytes(interval);
    append_tagged_blob(out, dtag, &bytes);
}

pub fn estimate_timestamp_blob(dtag: u32, interval: Duration) -> usize {
    let bytes = timestamp_bytes(interval);
    estimate_tagged_blob(dtag, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_estimate_matches_append() {
        for n in [0u64, 9, 10, 255, 1_000_000] {
            let mut buf = Vec::new();
            append_number(&mut buf, n);
            assert_eq!(buf.len(), estimate_number(n));
        }
    }

    #[test]
    fn tagged_blob_estimate_matches_append() {
        let data = b"some payload bytes";
        let mut buf = Vec::new();
        append_tagged_blob(&mut buf, 11, data);
        assert_eq!(buf.len(), estimate_tagged_blob(11, data));
    }

    #[test]
    fn tagged_blob_with_padding_estimate_matches_append() {
        let data = b"abc";
        let mut buf = Vec::new();
        append_tagged_blob_with_padding(&mut buf, 3, 10, data);
        assert_eq!(buf.len(), estimate_tagged_blob_with_padding(3, 10, data));
    }

    #[test]
    fn string_estimate_matches_append() {
        let mut buf = Vec::new();
        append_string(&mut buf, 1, "hello world");
        assert_eq!(buf.len(), estimate_string(1, "hello world"));
    }

    #[test]
    fn tagged_number_estimate_matches_append() {
        let mut buf = Vec::new();
        append_tagged_number(&mut buf, 10, 424242);
        assert_eq!(buf.len(), estimate_tagged_number(10, 424242));
    }

    #[test]
    fn timestamp_blob_estimate_matches_append() {
        let interval = Duration::new(1_700_000_000, 500_000_000);
        let mut buf = Vec::new();
        append_timestamp_blob(&mut buf, 10, interval);
        assert_eq!(buf.len(), estimate_timestamp_blob(10, interval));
    }
}
