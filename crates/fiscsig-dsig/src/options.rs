#![forbid(unsafe_code)]

use fiscsig_core::algorithm;
use serde::{Deserialize, Serialize};

/// Behaviour switches for [`crate::XmlSigner`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignerOptions {
    /// Turn multiple-signature and algorithm allow-list findings into errors.
    pub strict_validation: bool,
    /// Signature (and digest) algorithm URIs accepted during verification.
    pub allowed_algorithms: Vec<String>,
    /// Embed the signer certificate in `KeyInfo/X509Data`.
    pub include_key_info: bool,
}

impl Default for SignerOptions {
    fn default() -> Self {
        Self {
            strict_validation: true,
            allowed_algorithms: vec![
                algorithm::RSA_SHA256.to_owned(),
                algorithm::RSA_SHA1.to_owned(),
            ],
            include_key_info: true,
        }
    }
}

impl SignerOptions {
    pub fn is_signature_allowed(&self, uri: &str) -> bool {
        self.allowed_algorithms.iter().any(|a| a == uri)
    }

    /// A digest is allowed when listed itself or when it is the digest of an
    /// allowed signature algorithm.
    pub fn is_digest_allowed(&self, uri: &str) -> bool {
        self.allowed_algorithms
            .iter()
            .any(|a| a == uri || algorithm::digest_for_signature(a) == Some(uri))
    }
}
