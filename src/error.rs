//! A dedicated error type for every failure kind the core can raise: malformed
//! names, bad regexes, malformed wire/DER bytes, and trust/policy failures.
use std::io;
use std::str;

#[derive(Debug)]
pub enum NdnError {
    Io(io::Error),
    FromUtf8(std::string::FromUtf8Error),
    Utf8(str::Utf8Error),
    /// out-of-range component index, malformed URI
    Name(String),
    /// bad regex syntax or expand template
    Regex(String),
    /// malformed NDNB: unexpected tag, premature EOF, unterminated scope
    WireFormat(String),
    /// malformed DER: tag/length mismatch, truncated payload
    DerDecoding(String),
    /// policy violation, missing certificate, unqualified signer
    Sec(String),
}

impl NdnError {
    pub fn name(s: impl Into<String>) -> Self {
        NdnError::Name(s.into())
    }

    pub fn regex(s: impl Into<String>) -> Self {
        NdnError::Regex(s.into())
    }

    pub fn wire_format(s: impl Into<String>) -> Self {
        NdnError::WireFormat(s.into())
    }

    pub fn der_decoding(s: impl Into<String>) -> Self {
        NdnError::DerDecoding(s.into())
    }

    pub fn sec(s: impl Into<String>) -> Self {
        NdnError::Sec(s.into())
    }
}

impl std::fmt::Display for NdnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NdnError::Io(e) => write!(f, "I/O error: {}", e),
            NdnError::FromUtf8(e) => write!(f, "invalid UTF-8: {}", e),
            NdnError::Utf8(e) => write!(f, "invalid UTF-8: {}", e),
            NdnError::Name(s) => write!(f, "name error: {}", s),
            NdnError::Regex(s) => write!(f, "regex error: {}", s),
            NdnError::WireFormat(s) => write!(f, "wire format error: {}", s),
            NdnError::DerDecoding(s) => write!(f, "DER decoding error: {}", s),
            NdnError::Sec(s) => write!(f, "security error: {}", s),
        }
    }
}

impl std::error::Error for NdnError {}

/// A specific custom `Result` for all functions in this crate.
pub type NdnResult<T> = Result<T, NdnError>;

// All conversions from internal errors to NdnError
impl From<io::Error> for NdnError {
    fn from(err: io::Error) -> Self {
        NdnError::Io(err)
    }
}

impl From<std::string::FromUtf8Error> for NdnError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        NdnError::FromUtf8(err)
    }
}

impl From<str::Utf8Error> for NdnError {
    fn from(err: str::Utf8Error) -> Self {
        NdnError::Utf8(err)
    }
}

impl From<regex::Error> for NdnError {
    fn from(err: regex::Error) -> Self {
        NdnError::Regex(err.to_string())
    }
}
