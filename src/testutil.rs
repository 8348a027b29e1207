//! In-memory `Transport`/`PrivateKeyStore` implementations used only by
//! this crate's own tests, exercising the trust loop without a real
//! forwarder or on-disk key store (both explicitly out of scope, spec.md
//! §1). Grounded on the teacher's practice of keeping test-only fixtures
//! alongside the library rather than in a separate crate.
use std::collections::HashMap;

use rand::rngs::OsRng;
use rsa::{Hash, PaddingScheme, RsaPrivateKey};
use sha2::{Digest, Sha256};

use crate::error::{NdnError, NdnResult};
use crate::keychain::{decode_rsa_public_key, encode_rsa_public_key, InterestOutcome, PrivateKeyStore, Transport};
use crate::name::Name;
use crate::ndnb::{Data, Interest, SignatureAlgorithm};

/// Generates a 2048-bit RSA key pair and this crate's raw public-key
/// encoding, for tests that need a real, verifiable signature.
pub fn rsa_key_pair() -> (RsaPrivateKey, Vec<u8>) {
    let mut rng = OsRng;
    let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("RSA key generation failed");
    let public_der = encode_rsa_public_key(&private_key.to_public_key());
    (private_key, public_der)
}

/// A `PrivateKeyStore` backed by an in-memory map of name -> RSA key.
pub struct InMemoryKeyStore {
    keys: HashMap<Name, (RsaPrivateKey, SignatureAlgorithm)>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        InMemoryKeyStore { keys: HashMap::new() }
    }

    pub fn add_key(&mut self, name: Name, key: RsaPrivateKey, algorithm: SignatureAlgorithm) {
        self.keys.insert(name, (key, algorithm));
    }
}

impl Default for InMemoryKeyStore {
    fn default() -> Self {
        InMemoryKeyStore::new()
    }
}

impl PrivateKeyStore for InMemoryKeyStore {
    fn sign(&self, key_name: &Name, bytes: &[u8]) -> NdnResult<Vec<u8>> {
        let (key, algorithm) = self
            .keys
            .get(key_name)
            .ok_or_else(|| NdnError::sec(format!("no private key for {}", key_name)))?;
        match algorithm {
            SignatureAlgorithm::Sha256WithRsa => {
                let digest = Sha256::digest(bytes);
                let padding = PaddingScheme::new_pkcs1v15_sign(Some(Hash::SHA2_256));
                key.sign(padding, &digest).map_err(|e| NdnError::sec(format!("signing failed: {}", e)))
            }
        }
    }

    fn get_public_key(&self, key_name: &Name) -> NdnResult<(Vec<u8>, SignatureAlgorithm)> {
        let (key, algorithm) = self
            .keys
            .get(key_name)
            .ok_or_else(|| NdnError::sec(format!("no private key for {}", key_name)))?;
        Ok((encode_rsa_public_key(&key.to_public_key()), *algorithm))
    }
}

/// A `Transport` that answers Interests from a fixed in-memory table, with
/// no network involved at all — the trust loop's unit-test double.
pub struct LoopbackTransport {
    responses: HashMap<Name, Data>,
    always_timeout: bool,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        LoopbackTransport { responses: HashMap::new(), always_timeout: false }
    }

    pub fn always_timeout() -> Self {
        LoopbackTransport { responses: HashMap::new(), always_timeout: true }
    }

    pub fn publish(&mut self, name: Name, data: Data) {
        self.responses.insert(name, data);
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        LoopbackTransport::new()
    }
}

impl Transport for LoopbackTransport {
    fn send_interest(&mut self, interest: &Interest) -> InterestOutcome {
        if self.always_timeout {
            return InterestOutcome::Timeout;
        }
        match self.responses.get(&interest.name) {
            Some(data) => InterestOutcome::Data(data.clone()),
            None => InterestOutcome::Timeout,
        }
    }
}

/// Round-trips a raw encoded RSA public key, exercised by cert-chain tests
/// that hand-construct certificates rather than going through `KeyChain::sign`.
pub fn decode_test_public_key(bytes: &[u8]) -> NdnResult<rsa::RsaPublicKey> {
    decode_rsa_public_key(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_transport_replays_published_data() {
        use std::str::FromStr;
        let mut transport = LoopbackTransport::new();
        let name = Name::from_str("/a/b").unwrap();
        let data = Data {
            name: name.clone(),
            signed_info: Default::default(),
            content: b"x".to_vec(),
            signature: crate::ndnb::Signature {
                algorithm: SignatureAlgorithm::Sha256WithRsa,
                key_name: Name::new(),
                bits: vec![],
            },
        };
        transport.publish(name.clone(), data);
        match transport.send_interest(&Interest { name }) {
            InterestOutcome::Data(d) => assert_eq!(d.content, b"x"),
            InterestOutcome::Timeout => panic!("expected data"),
        }
    }

    #[test]
    fn always_timeout_transport_never_answers() {
        use std::str::FromStr;
        let mut transport = LoopbackTransport::always_timeout();
        let name = Name::from_str("/a").unwrap();
        match transport.send_interest(&Interest { name }) {
            InterestOutcome::Timeout => {}
            InterestOutcome::Data(_) => panic!("expected timeout"),
        }
    }
}
