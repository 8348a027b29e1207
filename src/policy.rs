//! PolicyManager: the ordered rule tables that decide whether a Data needs
//! verification, whether a signer name is acceptable for a data name, and
//! which identity should sign a given name. Grounded on
//! `ndn.cxx/security/keychain.cc`'s policy-check call sites (`skipVerify`,
//! `requireVerify`, `checkVerificationPolicy`, `checkSigningPolicy`,
//! `inferSigningIdentity`).
use crate::der::Certificate;
use crate::name::Name;
use crate::name_regex::NameRegex;
use crate::ndnb::Data;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Equal,
    PrefixOf,
    StrictPrefixOf,
    RegexMatch,
}

impl Relation {
    fn holds(self, signer_name: &Name, data_name: &Name, signer_regex: Option<&NameRegex>) -> bool {
        match self {
            Relation::Equal => signer_name == data_name,
            Relation::PrefixOf => is_prefix_of(signer_name, data_name),
            Relation::StrictPrefixOf => signer_name != data_name && is_prefix_of(signer_name, data_name),
            Relation::RegexMatch => signer_regex.map(|re| re.is_match(signer_name)).unwrap_or(false),
        }
    }
}

fn is_prefix_of(prefix: &Name, name: &Name) -> bool {
    if prefix.len() > name.len() {
        return false;
    }
    prefix.components().iter().zip(name.components()).all(|(a, b)| a == b)
}

/// `(dataNameRegex, signerNameRegex, relation)`.
pub struct PolicyRule {
    pub data_name_regex: NameRegex,
    pub signer_name_regex: NameRegex,
    pub relation: Relation,
}

impl PolicyRule {
    /// Whether `data_name` matches this rule's data-name pattern at all.
    fn matches_data(&self, data_name: &Name) -> bool {
        self.data_name_regex.is_match(data_name)
    }

    fn signer_satisfies(&self, data_name: &Name, signer_name: &Name) -> bool {
        self.relation.holds(signer_name, data_name, Some(&self.signer_name_regex))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchor {
    pub key_name: Name,
    pub certificate_der: Vec<u8>,
}

/// A signing-inference pair: a data-name pattern and the identity-name
/// template to expand when it matches.
pub struct SigningInference {
    pub matcher: NameRegex,
    pub identity_template: String,
}

#[derive(Default)]
pub struct PolicyManager {
    signing_policy_rules: Vec<PolicyRule>,
    verification_policy_rules: Vec<PolicyRule>,
    verification_exemptions: Vec<NameRegex>,
    trust_anchors: Vec<TrustAnchor>,
    signing_inferences: Vec<SigningInference>,
    default_identity: Name,
}

impl PolicyManager {
    pub fn new() -> Self {
        PolicyManager::default()
    }

    pub fn set_default_identity(&mut self, identity: Name) {
        self.default_identity = identity;
    }

    pub fn set_trust_anchor(&mut self, anchor: TrustAnchor) {
        self.trust_anchors.push(anchor);
    }

    pub fn get_trust_anchor(&self, key_name: &Name) -> Option<&TrustAnchor> {
        self.trust_anchors.iter().find(|a| &a.key_name == key_name)
    }

    pub fn set_signing_policy_rule(&mut self, rule: PolicyRule) {
        self.signing_policy_rules.push(rule);
    }

    pub fn set_verification_policy_rule(&mut self, rule: PolicyRule) {
        self.verification_policy_rules.push(rule);
    }

    pub fn set_verification_exemption(&mut self, exemption: NameRegex) {
        self.verification_exemptions.push(exemption);
    }

    pub fn set_signing_inference(&mut self, inference: SigningInference) {
        self.signing_inferences.push(inference);
    }

    /// Names matching an exemption skip verification outright.
    pub fn skip_verify(&self, data: &Data) -> bool {
        self.verification_exemptions.iter().any(|re| re.is_match(&data.name))
    }

    /// Whether `data` needs verification at all: the first matching
    /// verification rule (if any) decides. Data matching no rule is not
    /// required to verify.
    pub fn require_verify(&self, data: &Data) -> bool {
        self.verification_policy_rules.iter().any(|r| r.matches_data(&data.name))
    }

    /// Does `data`'s embedded signer (`data.signature.key_name`) satisfy the
    /// first verification rule matching `data.name`? The signer name needs
    /// no fetch — it travels with the Data's own signature.
    pub fn check_verification_policy(&self, data: &Data) -> bool {
        match self.verification_policy_rules.iter().find(|r| r.matches_data(&data.name)) {
            Some(rule) => rule.signer_satisfies(&data.name, &data.signature.key_name),
            None => false,
        }
    }

    /// Does `cert_name` satisfy the first signing rule matching
    /// `data_name`? Used by `signByIdentity`.
    pub fn check_signing_policy(&self, data_name: &Name, cert_name: &Name) -> bool {
        match self.signing_policy_rules.iter().find(|r| r.matches_data(data_name)) {
            Some(rule) => rule.signer_satisfies(data_name, cert_name),
            None => false,
        }
    }

    /// First matching signing-inference expansion, or the default identity.
    pub fn infer_signing_identity(&self, data_name: &Name) -> Name {
        for inference in &self.signing_inferences {
            if inference.matcher.is_match(data_name) {
                if let Ok(expanded) = inference.matcher.expand(data_name, &inference.identity_template) {
                    return expanded;
                }
            }
        }
        self.default_identity.clone()
    }
}

/// Temporal-validity check shared by the cache and the trust loop.
pub fn is_currently_valid(cert: &Certificate, now: chrono::DateTime<chrono::Utc>) -> bool {
    cert.is_valid_at(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn data_named(uri: &str) -> Data {
        Data {
            name: Name::from_str(uri).unwrap(),
            signed_info: Default::default(),
            content: vec![],
            signature: crate::ndnb::Signature {
                algorithm: crate::ndnb::SignatureAlgorithm::Sha256WithRsa,
                key_name: Name::from_str("/key").unwrap(),
                bits: vec![],
            },
        }
    }

    #[test]
    fn exemption_skips_verification() {
        let mut pm = PolicyManager::new();
        pm.set_verification_exemption(NameRegex::compile("^<a><.*>*$").unwrap());
        assert!(pm.skip_verify(&data_named("/a/b")));
        assert!(!pm.skip_verify(&data_named("/z")));
    }

    #[test]
    fn rule_evaluated_twice_is_consistent() {
        let mut pm = PolicyManager::new();
        pm.set_verification_policy_rule(PolicyRule {
            data_name_regex: NameRegex::compile("^<a><.*>*$").unwrap(),
            signer_name_regex: NameRegex::compile("^<a>$").unwrap(),
            relation: Relation::PrefixOf,
        });
        let mut data = data_named("/a/b");
        data.signature.key_name = Name::from_str("/a").unwrap();
        let first = pm.check_verification_policy(&data);
        let second = pm.check_verification_policy(&data);
        assert_eq!(first, second);
        assert!(first);
    }

    #[test]
    fn strict_prefix_excludes_equal_names() {
        let a = Name::from_str("/a").unwrap();
        assert!(!Relation::StrictPrefixOf.holds(&a, &a, None));
        let ab = Name::from_str("/a/b").unwrap();
        assert!(Relation::StrictPrefixOf.holds(&a, &ab, None));
    }

    #[test]
    fn infer_signing_identity_falls_back_to_default() {
        let mut pm = PolicyManager::new();
        pm.set_default_identity(Name::from_str("/default").unwrap());
        assert_eq!(pm.infer_signing_identity(&Name::from_str("/unrelated").unwrap()).to_uri(), "/default");
    }
}
