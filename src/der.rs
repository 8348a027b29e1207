//! DER/ASN.1-like codec and the certificate structure built on it. Grounded
//! on `ndn.cxx/security/certificate.h` for the certificate shape and on
//! `ndn.cxx/helpers/der/visitor/simple-visitor.cc` /
//! `disabled/encoding/visitor-der/visitor/cert-subject-visitor.cc` for the
//! subject/subject-list traversals, reimplemented per §9 as plain
//! recursive functions over a tagged enum instead of visitor objects.
use chrono::{DateTime, TimeZone, Utc};

use crate::error::{NdnError, NdnResult};
use crate::ndnb::SignatureAlgorithm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Boolean = 0x01,
    Integer = 0x02,
    BitString = 0x03,
    OctetString = 0x04,
    Null = 0x05,
    Oid = 0x06,
    PrintableString = 0x13,
    GeneralizedTime = 0x18,
    Sequence = 0x30,
}

impl Tag {
    fn from_byte(b: u8) -> NdnResult<Self> {
        Ok(match b {
            0x01 => Tag::Boolean,
            0x02 => Tag::Integer,
            0x03 => Tag::BitString,
            0x04 => Tag::OctetString,
            0x05 => Tag::Null,
            0x06 => Tag::Oid,
            0x13 => Tag::PrintableString,
            0x18 => Tag::GeneralizedTime,
            0x30 => Tag::Sequence,
            other => return Err(NdnError::der_decoding(format!("unknown DER tag {:#04x}", other))),
        })
    }
}

/// An Object Identifier: `first/40, first%40` for the first two arcs, then
/// base-128 varints (MSB set on continuation bytes) for the rest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Oid(pub Vec<u32>);

impl Oid {
    pub fn new(arcs: Vec<u32>) -> Self {
        Oid(arcs)
    }

    fn encode(&self) -> NdnResult<Vec<u8>> {
        if self.0.len() < 2 {
            return Err(NdnError::der_decoding("OID needs at least two arcs"));
        }
        let mut out = Vec::new();
        out.push((self.0[0] * 40 + self.0[1]) as u8);
        for &arc in &self.0[2..] {
            out.extend(encode_base128(arc));
        }
        Ok(out)
    }

    fn decode(bytes: &[u8]) -> NdnResult<Self> {
        if bytes.is_empty() {
            return Err(NdnError::der_decoding("empty OID payload"));
        }
        let first = bytes[0];
        let mut arcs = vec![(first / 40) as u32, (first % 40) as u32];
        let mut i = 1;
        while i < bytes.len() {
            let mut value: u32 = 0;
            loop {
                if i >= bytes.len() {
                    return Err(NdnError::der_decoding("truncated OID varint"));
                }
                let b = bytes[i];
                value = (value << 7) | (b as u32 & 0x7F);
                i += 1;
                if b & 0x80 == 0 {
                    break;
                }
            }
            arcs.push(value);
        }
        Ok(Oid(arcs))
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|a| a.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

fn encode_base128(mut value: u32) -> Vec<u8> {
    if value == 0 {
        return vec![0];
    }
    let mut groups = Vec::new();
    while value > 0 {
        groups.push((value & 0x7F) as u8);
        value >>= 7;
    }
    groups.reverse();
    let last = groups.len() - 1;
    for (i, g) in groups.iter_mut().enumerate() {
        if i != last {
            *g |= 0x80;
        }
    }
    groups
}

/// A UTC `GeneralizedTime`, stored as 14-digit `YYYYMMDDHHMMSS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneralizedTime(pub DateTime<Utc>);

impl GeneralizedTime {
    fn encode(self) -> Vec<u8> {
        self.0.format("%Y%m%d%H%M%S").to_string().into_bytes()
    }

    fn decode(bytes: &[u8]) -> NdnResult<Self> {
        let s = std::str::from_utf8(bytes)?;
        if s.len() != 14 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(NdnError::der_decoding(format!("malformed GeneralizedTime {:?}", s)));
        }
        let year: i32 = s[0..4].parse().unwrap();
        let month: u32 = s[4..6].parse().unwrap();
        let day: u32 = s[6..8].parse().unwrap();
        let hour: u32 = s[8..10].parse().unwrap();
        let minute: u32 = s[10..12].parse().unwrap();
        let second: u32 = s[12..14].parse().unwrap();
        let dt = Utc
            .with_ymd_and_hms(year, month, day, hour, minute, second)
            .single()
            .ok_or_else(|| NdnError::der_decoding(format!("out-of-range GeneralizedTime {:?}", s)))?;
        Ok(GeneralizedTime(dt))
    }
}

/// A parsed DER element. `Sequence` owns its children in order; every other
/// variant is a leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Boolean(bool),
    Integer(i64),
    BitString(Vec<u8>),
    OctetString(Vec<u8>),
    Null,
    Oid(Oid),
    PrintableString(String),
    GeneralizedTime(GeneralizedTime),
    Sequence(Vec<Node>),
}

fn encode_length(out: &mut Vec<u8>, len: usize) {
    if len < 128 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let trimmed: Vec<u8> = bytes.into_iter().skip_while(|&b| b == 0).collect();
        out.push(0x80 | trimmed.len() as u8);
        out.extend(trimmed);
    }
}

fn decode_length(bytes: &[u8], pos: &mut usize) -> NdnResult<usize> {
    if *pos >= bytes.len() {
        return Err(NdnError::der_decoding("truncated length"));
    }
    let first = bytes[*pos];
    *pos += 1;
    if first & 0x80 == 0 {
        return Ok(first as usize);
    }
    let n = (first & 0x7F) as usize;
    if *pos + n > bytes.len() {
        return Err(NdnError::der_decoding("truncated long-form length"));
    }
    let mut len: usize = 0;
    for &b in &bytes[*pos..*pos + n] {
        len = (len << 8) | b as usize;
    }
    *pos += n;
    Ok(len)
}

fn encode_node(out: &mut Vec<u8>, node: &Node) -> NdnResult<()> {
    match node {
        Node::Boolean(b) => {
            out.push(Tag::Boolean as u8);
            encode_length(out, 1);
            out.push(if *b { 0xFF } else { 0x00 });
        }
        Node::Integer(n) => {
            let bytes = minimal_signed_bytes(*n);
            out.push(Tag::Integer as u8);
            encode_length(out, bytes.len());
            out.extend(bytes);
        }
        Node::BitString(bits) => {
            out.push(Tag::BitString as u8);
            encode_length(out, bits.len() + 1);
            out.push(0); // no unused trailing bits
            out.extend(bits);
        }
        Node::OctetString(bytes) => {
            out.push(Tag::OctetString as u8);
            encode_length(out, bytes.len());
            out.extend(bytes);
        }
        Node::Null => {
            out.push(Tag::Null as u8);
            encode_length(out, 0);
        }
        Node::Oid(oid) => {
            let encoded = oid.encode()?;
            out.push(Tag::Oid as u8);
            encode_length(out, encoded.len());
            out.extend(encoded);
        }
        Node::PrintableString(s) => {
            out.push(Tag::PrintableString as u8);
            encode_length(out, s.len());
            out.extend(s.as_bytes());
        }
        Node::GeneralizedTime(t) => {
            let encoded = t.encode();
            out.push(Tag::GeneralizedTime as u8);
            encode_length(out, encoded.len());
            out.extend(encoded);
        }
        Node::Sequence(children) => {
            let mut body = Vec::new();
            for child in children {
                encode_node(&mut body, child)?;
            }
            out.push(Tag::Sequence as u8);
            encode_length(out, body.len());
            out.extend(body);
        }
    }
    Ok(())
}

fn minimal_signed_bytes(n: i64) -> Vec<u8> {
    let mut bytes = n.to_be_bytes().to_vec();
    while bytes.len() > 1 && ((bytes[0] == 0 && bytes[1] & 0x80 == 0) || (bytes[0] == 0xFF && bytes[1] & 0x80 != 0)) {
        bytes.remove(0);
    }
    bytes
}

fn decode_node(bytes: &[u8], pos: &mut usize) -> NdnResult<Node> {
    if *pos >= bytes.len() {
        return Err(NdnError::der_decoding("truncated tag"));
    }
    let tag = Tag::from_byte(bytes[*pos])?;
    *pos += 1;
    let len = decode_length(bytes, pos)?;
    if *pos + len > bytes.len() {
        return Err(NdnError::der_decoding("truncated payload"));
    }
    let payload = &bytes[*pos..*pos + len];
    *pos += len;

    Ok(match tag {
        Tag::Boolean => {
            if payload.len() != 1 {
                return Err(NdnError::der_decoding("malformed BOOLEAN"));
            }
            Node::Boolean(payload[0] != 0)
        }
        Tag::Integer => {
            if payload.is_empty() {
                return Err(NdnError::der_decoding("malformed INTEGER"));
            }
            let mut buf = [if payload[0] & 0x80 != 0 { 0xFFu8 } else { 0 }; 8];
            let start = 8usize.saturating_sub(payload.len());
            buf[start..].copy_from_slice(&payload[payload.len().saturating_sub(8)..]);
            Node::Integer(i64::from_be_bytes(buf))
        }
        Tag::BitString => {
            if payload.is_empty() {
                return Err(NdnError::der_decoding("malformed BIT STRING"));
            }
            Node::BitString(payload[1..].to_vec())
        }
        Tag::OctetString => Node::OctetString(payload.to_vec()),
        Tag::Null => {
            if !payload.is_empty() {
                return Err(NdnError::der_decoding("malformed NULL"));
            }
            Node::Null
        }
        Tag::Oid => Node::Oid(Oid::decode(payload)?),
        Tag::PrintableString => Node::PrintableString(
            std::str::from_utf8(payload).map_err(NdnError::from)?.to_string(),
        ),
        Tag::GeneralizedTime => Node::GeneralizedTime(GeneralizedTime::decode(payload)?),
        Tag::Sequence => {
            let mut children = Vec::new();
            let mut inner_pos = 0;
            while inner_pos < payload.len() {
                children.push(decode_node(payload, &mut inner_pos)?);
            }
            Node::Sequence(children)
        }
    })
}

pub fn encode(node: &Node) -> NdnResult<Vec<u8>> {
    let mut out = Vec::new();
    encode_node(&mut out, node)?;
    Ok(out)
}

pub fn decode(bytes: &[u8]) -> NdnResult<Node> {
    let mut pos = 0;
    let node = decode_node(bytes, &mut pos)?;
    if pos != bytes.len() {
        return Err(NdnError::der_decoding("trailing bytes after top-level DER node"));
    }
    Ok(node)
}

/// One `(OID, PrintableString)` pair from a certificate's subject. The
/// source's two incompatible `CertificateSubDescrypt` constructors (one
/// `string`-driven, one `Blob`/DER-driven) collapse to this single,
/// DER-canonical shape (spec.md §9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectDescription {
    pub oid: Oid,
    pub value: String,
}

fn decode_subject_description(node: &Node) -> NdnResult<SubjectDescription> {
    match node {
        Node::Sequence(children) if children.len() == 2 => {
            let oid = match &children[0] {
                Node::Oid(oid) => oid.clone(),
                _ => return Err(NdnError::der_decoding("subject description: expected OID first")),
            };
            let value = match &children[1] {
                Node::PrintableString(s) => s.clone(),
                _ => return Err(NdnError::der_decoding("subject description: expected PrintableString second")),
            };
            Ok(SubjectDescription { oid, value })
        }
        _ => Err(NdnError::der_decoding("malformed subject description")),
    }
}

fn encode_subject_description(sd: &SubjectDescription) -> Node {
    Node::Sequence(vec![Node::Oid(sd.oid.clone()), Node::PrintableString(sd.value.clone())])
}

fn decode_subject_list(node: &Node) -> NdnResult<Vec<SubjectDescription>> {
    match node {
        Node::Sequence(children) => children.iter().map(decode_subject_description).collect(),
        _ => Err(NdnError::der_decoding("malformed subject list")),
    }
}

/// One `(OID, critical, OCTET STRING)` extension entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub oid: Oid,
    pub critical: bool,
    pub value: Vec<u8>,
}

fn decode_extension(node: &Node) -> NdnResult<Extension> {
    match node {
        Node::Sequence(children) if children.len() == 2 => {
            let oid = expect_oid(&children[0])?;
            let value = expect_octet_string(&children[1])?;
            Ok(Extension { oid, critical: false, value })
        }
        Node::Sequence(children) if children.len() == 3 => {
            let oid = expect_oid(&children[0])?;
            let critical = match &children[1] {
                Node::Boolean(b) => *b,
                _ => return Err(NdnError::der_decoding("extension: expected BOOLEAN critical flag")),
            };
            let value = expect_octet_string(&children[2])?;
            Ok(Extension { oid, critical, value })
        }
        _ => Err(NdnError::der_decoding("malformed extension")),
    }
}

fn encode_extension(ext: &Extension) -> Node {
    if ext.critical {
        Node::Sequence(vec![
            Node::Oid(ext.oid.clone()),
            Node::Boolean(true),
            Node::OctetString(ext.value.clone()),
        ])
    } else {
        Node::Sequence(vec![Node::Oid(ext.oid.clone()), Node::OctetString(ext.value.clone())])
    }
}

fn expect_oid(node: &Node) -> NdnResult<Oid> {
    match node {
        Node::Oid(oid) => Ok(oid.clone()),
        _ => Err(NdnError::der_decoding("expected OID")),
    }
}

fn expect_octet_string(node: &Node) -> NdnResult<Vec<u8>> {
    match node {
        Node::OctetString(bytes) => Ok(bytes.clone()),
        _ => Err(NdnError::der_decoding("expected OCTET STRING")),
    }
}

/// `SEQUENCE { Validity SEQUENCE { notBefore, notAfter }, Subject SEQUENCE
/// OF pairs, SubjectPublicKeyInfo BIT STRING, Algorithm PrintableString,
/// Extensions SEQUENCE OF triples }`. `algorithm` names the algorithm
/// `public_key` pairs with (spec.md §3's "raw bytes + algorithm" data
/// model) — it is not inferred from whatever a signature under
/// verification happens to declare.
#[derive(Debug, Clone, PartialEq)]
pub struct Certificate {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub subject: Vec<SubjectDescription>,
    pub public_key: Vec<u8>,
    pub algorithm: SignatureAlgorithm,
    pub extensions: Vec<Extension>,
}

impl Certificate {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now && now <= self.not_after
    }

    pub fn to_der(&self) -> NdnResult<Node> {
        if self.not_before > self.not_after {
            return Err(NdnError::der_decoding("notBefore must not be after notAfter"));
        }
        if self.public_key.is_empty() {
            return Err(NdnError::der_decoding("public key must not be empty"));
        }
        let validity = Node::Sequence(vec![
            Node::GeneralizedTime(GeneralizedTime(self.not_before)),
            Node::GeneralizedTime(GeneralizedTime(self.not_after)),
        ]);
        let subject = Node::Sequence(self.subject.iter().map(encode_subject_description).collect());
        let spki = Node::BitString(self.public_key.clone());
        let algorithm = Node::PrintableString(self.algorithm.wire_name().to_string());
        let extensions = Node::Sequence(self.extensions.iter().map(encode_extension).collect());
        Ok(Node::Sequence(vec![validity, subject, spki, algorithm, extensions]))
    }

    pub fn from_der(node: &Node) -> NdnResult<Self> {
        let top = match node {
            Node::Sequence(children) if children.len() == 5 => children,
            _ => return Err(NdnError::der_decoding("certificate must be a 5-element SEQUENCE")),
        };

        let (not_before, not_after) = match &top[0] {
            Node::Sequence(validity) if validity.len() == 2 => {
                let nb = match &validity[0] {
                    Node::GeneralizedTime(t) => t.0,
                    _ => return Err(NdnError::der_decoding("Validity.notBefore must be GeneralizedTime")),
                };
                let na = match &validity[1] {
                    Node::GeneralizedTime(t) => t.0,
                    _ => return Err(NdnError::der_decoding("Validity.notAfter must be GeneralizedTime")),
                };
                (nb, na)
            }
            _ => return Err(NdnError::der_decoding("malformed Validity")),
        };
        if not_before > not_after {
            return Err(NdnError::der_decoding("notBefore after notAfter"));
        }

        let subject = decode_subject_list(&top[1])?;

        let public_key = match &top[2] {
            Node::BitString(bits) => bits.clone(),
            _ => return Err(NdnError::der_decoding("SubjectPublicKeyInfo must be a BIT STRING")),
        };
        if public_key.is_empty() {
            return Err(NdnError::der_decoding("public key must not be empty"));
        }

        let algorithm = match &top[3] {
            Node::PrintableString(s) => SignatureAlgorithm::from_wire_name(s)?,
            _ => return Err(NdnError::der_decoding("Algorithm must be a PrintableString")),
        };

        let extensions = match &top[4] {
            Node::Sequence(exts) => exts.iter().map(decode_extension).collect::<NdnResult<Vec<_>>>()?,
            _ => return Err(NdnError::der_decoding("Extensions must be a SEQUENCE")),
        };

        Ok(Certificate { not_before, not_after, subject, public_key, algorithm, extensions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn generalized_time_sequence_decode() {
        // SEQUENCE { GeneralizedTime "20230101000000" }
        let mut bytes: Vec<u8> = vec![0x30, 0x00, 0x18, 0x0E];
        bytes.extend_from_slice(b"20230101000000");
        bytes[1] = (bytes.len() - 2) as u8;
        let node = decode(&bytes).unwrap();
        match node {
            Node::Sequence(children) => {
                assert_eq!(children.len(), 1);
                match &children[0] {
                    Node::GeneralizedTime(t) => {
                        assert_eq!(t.0, Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
                    }
                    other => panic!("expected GeneralizedTime, got {:?}", other),
                }
            }
            other => panic!("expected Sequence, got {:?}", other),
        }
    }

    #[test]
    fn oid_round_trips() {
        let oid = Oid::new(vec![1, 2, 840, 113549]);
        let node = Node::Oid(oid.clone());
        let bytes = encode(&node).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, Node::Oid(oid));
    }

    #[test]
    fn node_tree_round_trips() {
        let node = Node::Sequence(vec![
            Node::Boolean(true),
            Node::Integer(-5),
            Node::OctetString(vec![1, 2, 3]),
            Node::PrintableString("hello".into()),
        ]);
        let bytes = encode(&node).unwrap();
        assert_eq!(decode(&bytes).unwrap(), node);
    }

    fn sample_certificate() -> Certificate {
        Certificate {
            not_before: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            not_after: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            subject: vec![SubjectDescription { oid: Oid::new(vec![2, 5, 4, 3]), value: "alice".into() }],
            public_key: vec![0xAA, 0xBB, 0xCC],
            algorithm: SignatureAlgorithm::Sha256WithRsa,
            extensions: vec![Extension { oid: Oid::new(vec![1, 3, 6, 1]), critical: true, value: vec![9, 9] }],
        }
    }

    #[test]
    fn certificate_round_trips_through_der() {
        let cert = sample_certificate();
        let der = cert.to_der().unwrap();
        let bytes = encode(&der).unwrap();
        let decoded_node = decode(&bytes).unwrap();
        let decoded_cert = Certificate::from_der(&decoded_node).unwrap();
        assert_eq!(decoded_cert, cert);
    }

    #[test]
    fn rejects_empty_public_key() {
        let mut cert = sample_certificate();
        cert.public_key.clear();
        assert!(cert.to_der().is_err());
    }

    #[test]
    fn rejects_inverted_validity_window() {
        let mut cert = sample_certificate();
        std::mem::swap(&mut cert.not_before, &mut cert.not_after);
        assert!(cert.to_der().is_err());
    }
}
