//! A small end-to-end probe of the trust loop: build a self-signed trust
//! anchor, sign a child Data under it, verify the child, print the result.
//! Replaces dnsquery's UDP query tool as the thin CLI glue this crate ships
//! alongside the library (spec.md §1 excludes it from the "core").
use clap::{App, Arg};
use log::{debug, info};

use ndnlib::der::Certificate;
use ndnlib::error::NdnResult;
use ndnlib::keychain::{new_signed_info, KeyChain, KeyChainConfig};
use ndnlib::name::Name;
use ndnlib::ndnb::{Data, Signature, SignatureAlgorithm};
use ndnlib::policy::TrustAnchor;
use ndnlib::testutil::{rsa_key_pair, InMemoryKeyStore, LoopbackTransport};

struct CliOptions {
    anchor_name: String,
    data_name: String,
    content: String,
}

impl CliOptions {
    fn parse() -> Self {
        let matches = App::new("ndn-probe")
            .version("0.1")
            .about("Signs and verifies a Data object against a self-signed trust anchor")
            .arg(
                Arg::new("anchor")
                    .short('a')
                    .long("anchor")
                    .default_value("/A")
                    .long_help("Name of the self-signed trust anchor")
                    .takes_value(true),
            )
            .arg(
                Arg::new("name")
                    .short('n')
                    .long("name")
                    .default_value("/A/probe")
                    .long_help("Name of the Data object to sign and verify")
                    .takes_value(true),
            )
            .arg(
                Arg::new("content")
                    .short('c')
                    .long("content")
                    .default_value("hello ndn")
                    .long_help("Content bytes (as UTF-8 text) to sign")
                    .takes_value(true),
            )
            .get_matches();

        CliOptions {
            anchor_name: matches.value_of("anchor").unwrap().to_string(),
            data_name: matches.value_of("name").unwrap().to_string(),
            content: matches.value_of("content").unwrap().to_string(),
        }
    }
}

fn main() -> NdnResult<()> {
    env_logger::init();
    let options = CliOptions::parse();
    debug!("options: anchor={} name={}", options.anchor_name, options.data_name);

    let anchor_name: Name = options.anchor_name.as_str().into();
    let data_name: Name = options.data_name.as_str().into();

    let (anchor_key, anchor_public_der) = rsa_key_pair();
    let anchor_cert = Certificate {
        not_before: chrono::Utc::now() - chrono::Duration::days(1),
        not_after: chrono::Utc::now() + chrono::Duration::days(365),
        subject: vec![],
        public_key: anchor_public_der,
        algorithm: SignatureAlgorithm::Sha256WithRsa,
        extensions: vec![],
    };
    let anchor_der = ndnlib::der::encode(&anchor_cert.to_der()?)?;

    let mut key_store = InMemoryKeyStore::new();
    key_store.add_key(anchor_name.clone(), anchor_key, SignatureAlgorithm::Sha256WithRsa);

    let mut keychain = KeyChain::new(LoopbackTransport::new(), key_store, KeyChainConfig::default());
    keychain.set_trust_anchor(TrustAnchor { key_name: anchor_name.clone(), certificate_der: anchor_der });
    keychain.policy.set_verification_policy_rule(ndnlib::policy::PolicyRule {
        data_name_regex: ndnlib::name_regex::NameRegex::from_name(&anchor_name, false)?,
        signer_name_regex: ndnlib::name_regex::NameRegex::from_name(&anchor_name, true)?,
        relation: ndnlib::policy::Relation::PrefixOf,
    });

    let mut data = Data {
        name: data_name.clone(),
        signed_info: new_signed_info(Some(3600)),
        content: options.content.as_bytes().to_vec(),
        signature: Signature { algorithm: SignatureAlgorithm::Sha256WithRsa, key_name: Name::new(), bits: vec![] },
    };
    keychain.sign(&mut data, &anchor_name)?;
    info!("signed {} with {}", data.name, anchor_name);

    match keychain.verify_data(&data) {
        Ok(()) => println!("VERIFIED: {} (signed by {})", data.name, anchor_name),
        Err(e) => {
            println!("FAILED: {} ({})", data.name, e);
            std::process::exit(1);
        }
    }

    Ok(())
}
