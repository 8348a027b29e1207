//! Core of a Named Data Networking (NDN) client library: hierarchical names
//! and the Name-Regex pattern language, the NDNB wire codec, a DER/X.509-like
//! certificate codec, and the KeyChain trust engine that signs and recursively
//! verifies Data objects.
//!
//! The local forwarder transport, on-disk identity storage, symmetric
//! encryption manager and application-facing publish/fetch layer are
//! deliberately out of scope: `keychain::Transport` and
//! `keychain::PrivateKeyStore` are the seams a caller plugs real
//! implementations into.

pub mod error;

pub mod name;
pub mod name_regex;

pub mod ndnb;
pub mod der;

pub mod cache;
pub mod policy;
pub mod keychain;

pub mod testutil;
