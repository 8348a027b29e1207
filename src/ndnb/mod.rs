//! NDNB wire codec: a self-describing TLV format used for every on-the-wire
//! object. `block` holds the generic tagged-variant tree and its parser;
//! `encode` holds the free encoder/estimator functions; `dtag` is this
//! crate's DTAG registry; `data` builds Name/Interest/Data on top of them.
pub mod block;
pub mod data;
pub mod dtag;
pub mod encode;

pub use block::{Block, TypeTag, NDN_CLOSE};
pub use data::{decode_data, decode_interest, encode_data, encode_interest, signed_portion_bytes};
pub use data::{Data, Interest, Signature, SignatureAlgorithm, SignedInfo};
pub use dtag::Dtag;
