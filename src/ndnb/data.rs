//! Wire model for Name, Interest and Data, and the fixed-order
//! Signature/SignedInfo encoding §6 requires. Grounded on
//! `ndn.cxx/name.cpp`'s wire form (a DTAG-wrapped sequence of Component
//! blobs) and on `ndn.cxx/security/keychain.cc`'s Data layout
//! (`Signature, Name, SignedInfo, Content`, in that fixed child order).
use std::ops::Range;
use std::time::Duration;

use crate::error::{NdnError, NdnResult};
use crate::name::Name;
use crate::ndnb::block::{
    append_block_header, append_closer, consume_closer, parse_block, read_header, Block, TypeTag,
};
use crate::ndnb::dtag::Dtag;
use crate::ndnb::encode::{append_string, append_tagged_blob, append_tagged_number, append_timestamp_blob};

/// The signature algorithm declared by a [`Signature`]. Extensible per
/// spec.md §4.7 — new variants are added here, not by widening an `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Sha256WithRsa,
}

impl SignatureAlgorithm {
    pub fn wire_name(self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha256WithRsa => "SHA256withRSA",
        }
    }

    pub fn from_wire_name(s: &str) -> NdnResult<Self> {
        match s {
            "SHA256withRSA" => Ok(SignatureAlgorithm::Sha256WithRsa),
            other => Err(NdnError::wire_format(format!("unknown signature algorithm {:?}", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Signature {
    pub algorithm: SignatureAlgorithm,
    pub key_name: Name,
    pub bits: Vec<u8>,
}

/// Metadata carried alongside Content. All fields optional; NDN data objects
/// commonly omit most of them.
#[derive(Debug, Clone, Default)]
pub struct SignedInfo {
    pub publisher_public_key_digest: Option<Vec<u8>>,
    pub timestamp: Option<Duration>,
    pub freshness_seconds: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Data {
    pub name: Name,
    pub signed_info: SignedInfo,
    pub content: Vec<u8>,
    pub signature: Signature,
}

#[derive(Debug, Clone)]
pub struct Interest {
    pub name: Name,
}

fn encode_name(out: &mut Vec<u8>, name: &Name) {
    append_block_header(out, Dtag::Name.as_u32() as u64, TypeTag::Dtag);
    for comp in name.components() {
        append_tagged_blob(out, Dtag::Component.as_u32(), comp);
    }
    append_closer(out);
}

fn decode_name_from_block(block: &Block) -> NdnResult<Name> {
    let children = block.as_dtag_children(Dtag::Name.as_u32())?;
    let mut name = Name::new();
    for child in children {
        let comp_children = child.as_dtag_children(Dtag::Component.as_u32())?;
        let blob = comp_children
            .first()
            .ok_or_else(|| NdnError::wire_format("empty Component block"))?
            .as_blob()?;
        name.append(blob.to_vec());
    }
    Ok(name)
}

fn encode_signature(out: &mut Vec<u8>, sig: &Signature) {
    append_block_header(out, Dtag::Signature.as_u32() as u64, TypeTag::Dtag);
    append_string(out, Dtag::DigestAlgorithm.as_u32(), sig.algorithm.wire_name());
    append_block_header(out, Dtag::KeyLocator.as_u32() as u64, TypeTag::Dtag);
    append_block_header(out, Dtag::KeyName.as_u32() as u64, TypeTag::Dtag);
    encode_name(out, &sig.key_name);
    append_closer(out); // KeyName
    append_closer(out); // KeyLocator
    append_tagged_blob(out, Dtag::SignatureBits.as_u32(), &sig.bits);
    append_closer(out); // Signature
}

fn decode_signature(block: &Block) -> NdnResult<Signature> {
    let children = block.as_dtag_children(Dtag::Signature.as_u32())?;
    if children.len() != 3 {
        return Err(NdnError::wire_format("Signature must have exactly 3 children"));
    }

    let algo_children = children[0].as_dtag_children(Dtag::DigestAlgorithm.as_u32())?;
    let algo_name = algo_children
        .first()
        .ok_or_else(|| NdnError::wire_format("empty DigestAlgorithm block"))?
        .as_udata()?;
    let algorithm = SignatureAlgorithm::from_wire_name(algo_name)?;

    let key_locator_children = children[1].as_dtag_children(Dtag::KeyLocator.as_u32())?;
    let key_name_block = key_locator_children
        .first()
        .ok_or_else(|| NdnError::wire_format("empty KeyLocator block"))?
        .as_dtag_children(Dtag::KeyName.as_u32())?;
    let name_block = key_name_block
        .first()
        .ok_or_else(|| NdnError::wire_format("empty KeyName block"))?;
    let key_name = decode_name_from_block(name_block)?;

    let bits_children = children[2].as_dtag_children(Dtag::SignatureBits.as_u32())?;
    let bits = bits_children
        .first()
        .ok_or_else(|| NdnError::wire_format("empty SignatureBits block"))?
        .as_blob()?
        .to_vec();

    Ok(Signature { algorithm, key_name, bits })
}

fn encode_signed_info(out: &mut Vec<u8>, info: &SignedInfo) {
    append_block_header(out, Dtag::SignedInfo.as_u32() as u64, TypeTag::Dtag);
    if let Some(digest) = &info.publisher_public_key_digest {
        append_tagged_blob(out, Dtag::PublisherPublicKeyDigest.as_u32(), digest);
    }
    if let Some(ts) = info.timestamp {
        append_timestamp_blob(out, Dtag::Timestamp.as_u32(), ts);
    }
    if let Some(fresh) = info.freshness_seconds {
        append_tagged_number(out, Dtag::FreshnessSeconds.as_u32(), fresh as u64);
    }
    append_closer(out);
}

fn decode_signed_info(block: &Block) -> NdnResult<SignedInfo> {
    let children = block.as_dtag_children(Dtag::SignedInfo.as_u32())?;
    let mut info = SignedInfo::default();
    for child in children {
        if let Block::Dtag { tag, children: inner } = child {
            if *tag == Dtag::PublisherPublicKeyDigest.as_u32() {
                let blob = inner.first().ok_or_else(|| NdnError::wire_format("empty digest block"))?.as_blob()?;
                info.publisher_public_key_digest = Some(blob.to_vec());
            } else if *tag == Dtag::FreshnessSeconds.as_u32() {
                let text = inner.first().ok_or_else(|| NdnError::wire_format("empty freshness block"))?.as_udata()?;
                info.freshness_seconds =
                    Some(text.parse().map_err(|_| NdnError::wire_format("malformed freshness number"))?);
            }
            // Timestamp is a fixed-point BLOB this crate never needs to
            // round-trip back into a Duration; it is skipped on decode.
        }
    }
    Ok(info)
}

/// Serializes `Name, SignedInfo, Content` — exactly the bytes a signature
/// covers (spec.md §6: "the signed portion begins at the first byte of Name
/// and ends at the last byte of Content").
pub fn signed_portion_bytes(name: &Name, signed_info: &SignedInfo, content: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_name(&mut buf, name);
    encode_signed_info(&mut buf, signed_info);
    append_tagged_blob(&mut buf, Dtag::Content.as_u32(), content);
    buf
}

/// Encodes a whole Data object. Returns the wire bytes and the signed range
/// (byte offsets of the signed portion within those bytes).
pub fn encode_data(data: &Data) -> (Vec<u8>, Range<usize>) {
    let mut out = Vec::new();
    append_block_header(&mut out, Dtag::Data.as_u32() as u64, TypeTag::Dtag);
    encode_signature(&mut out, &data.signature);
    let start = out.len();
    encode_name(&mut out, &data.name);
    encode_signed_info(&mut out, &data.signed_info);
    append_tagged_blob(&mut out, Dtag::Content.as_u32(), &data.content);
    let end = out.len();
    append_closer(&mut out);
    (out, start..end)
}

/// Decodes a Data object, returning it alongside the signed range so a
/// caller can re-derive exactly the bytes the signature covers.
pub fn decode_data(bytes: &[u8]) -> NdnResult<(Data, Range<usize>)> {
    let mut cursor = std::io::Cursor::new(bytes);
    let (tag, tt) = read_header(&mut cursor)?;
    if tt != TypeTag::Dtag || tag as u32 != Dtag::Data.as_u32() {
        return Err(NdnError::wire_format("expected Data DTAG"));
    }

    let signature_block = parse_block(&mut cursor)?;
    let signature = decode_signature(&signature_block)?;

    let start = cursor.position() as usize;
    let name_block = parse_block(&mut cursor)?;
    let name = decode_name_from_block(&name_block)?;
    let signed_info_block = parse_block(&mut cursor)?;
    let signed_info = decode_signed_info(&signed_info_block)?;
    let content_block = parse_block(&mut cursor)?;
    let end = cursor.position() as usize;

    consume_closer(&mut cursor)?;
    if (cursor.position() as usize) != bytes.len() {
        return Err(NdnError::wire_format("trailing bytes after Data"));
    }

    let content = content_block
        .as_dtag_children(Dtag::Content.as_u32())?
        .first()
        .ok_or_else(|| NdnError::wire_format("empty Content block"))?
        .as_blob()?
        .to_vec();

    Ok((Data { name, signed_info, content, signature }, start..end))
}

pub fn encode_interest(interest: &Interest) -> Vec<u8> {
    let mut out = Vec::new();
    append_block_header(&mut out, Dtag::Interest.as_u32() as u64, TypeTag::Dtag);
    encode_name(&mut out, &interest.name);
    append_closer(&mut out);
    out
}

pub fn decode_interest(bytes: &[u8]) -> NdnResult<Interest> {
    let mut cursor = std::io::Cursor::new(bytes);
    let (tag, tt) = read_header(&mut cursor)?;
    if tt != TypeTag::Dtag || tag as u32 != Dtag::Interest.as_u32() {
        return Err(NdnError::wire_format("expected Interest DTAG"));
    }
    let name_block = parse_block(&mut cursor)?;
    let name = decode_name_from_block(&name_block)?;
    consume_closer(&mut cursor)?;
    Ok(Interest { name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample_data() -> Data {
        Data {
            name: Name::from_str("/a/b").unwrap(),
            signed_info: SignedInfo { freshness_seconds: Some(10), ..Default::default() },
            content: b"payload".to_vec(),
            signature: Signature {
                algorithm: SignatureAlgorithm::Sha256WithRsa,
                key_name: Name::from_str("/key/a").unwrap(),
                bits: vec![1, 2, 3, 4],
            },
        }
    }

    #[test]
    fn data_round_trips() {
        let data = sample_data();
        let (bytes, range) = encode_data(&data);
        let (decoded, decoded_range) = decode_data(&bytes).unwrap();
        assert_eq!(decoded.name, data.name);
        assert_eq!(decoded.content, data.content);
        assert_eq!(decoded.signature.key_name, data.signature.key_name);
        assert_eq!(decoded.signature.bits, data.signature.bits);
        assert_eq!(decoded.signed_info.freshness_seconds, Some(10));
        assert_eq!(decoded_range, range);
    }

    #[test]
    fn signed_portion_matches_encoded_range() {
        let data = sample_data();
        let (bytes, range) = encode_data(&data);
        let portion = signed_portion_bytes(&data.name, &data.signed_info, &data.content);
        assert_eq!(&bytes[range], portion.as_slice());
    }

    #[test]
    fn single_component_name_has_one_component_dtag() {
        let mut name = Name::new();
        name.append_str("hello");
        let mut out = Vec::new();
        encode_name(&mut out, &name);
        // DTAG(Name) header + DTAG(Component) header + BLOB header + "hello" + closer*2
        let decoded = decode_name_from_block(&crate::ndnb::block::parse_top_level(&out).unwrap()).unwrap();
        assert_eq!(decoded, name);
    }

    #[test]
    fn interest_round_trips() {
        let interest = Interest { name: Name::from_str("/a/b/c").unwrap() };
        let bytes = encode_interest(&interest);
        let decoded = decode_interest(&bytes).unwrap();
        assert_eq!(decoded.name, interest.name);
    }
}
