//! The fixed DTAG numbering this crate uses for the subset of the NDNB
//! schema it needs: Name/Component and the Data/Interest/Signature tree.
//! Grounded on `ndn.cxx/wire/ndnb/ndnb-parser/syntax-tree/tag.h`'s role (a
//! registry of numeric tag ids) without carrying over its exact id values,
//! since this is a from-scratch wire format, not a byte-compatible one.

/// A DTAG identifier: the numeric tag carried by a `Block::Dtag` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Dtag {
    Name = 1,
    Component = 2,
    Data = 3,
    Interest = 4,
    Signature = 5,
    SignatureBits = 6,
    DigestAlgorithm = 7,
    SignedInfo = 8,
    PublisherPublicKeyDigest = 9,
    Timestamp = 10,
    Content = 11,
    KeyLocator = 12,
    KeyName = 13,
    FreshnessSeconds = 14,
    FinalBlockId = 15,
}

impl Dtag {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            1 => Dtag::Name,
            2 => Dtag::Component,
            3 => Dtag::Data,
            4 => Dtag::Interest,
            5 => Dtag::Signature,
            6 => Dtag::SignatureBits,
            7 => Dtag::DigestAlgorithm,
            8 => Dtag::SignedInfo,
            9 => Dtag::PublisherPublicKeyDigest,
            10 => Dtag::Timestamp,
            11 => Dtag::Content,
            12 => Dtag::KeyLocator,
            13 => Dtag::KeyName,
            14 => Dtag::FreshnessSeconds,
            15 => Dtag::FinalBlockId,
            _ => return None,
        })
    }
}
