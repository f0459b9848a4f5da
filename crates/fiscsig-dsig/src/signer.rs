#![forbid(unsafe_code)]

//! The signing/verification entry point.

use std::sync::Arc;

use fiscsig_core::{Clock, Error, SystemClock};
use fiscsig_keys::{x509, CertificateData};

use crate::options::SignerOptions;
use crate::result::VerificationResult;
use crate::{keyinfo, sign, verify};

/// Signs and verifies enveloped XML signatures under a fixed [`SignerOptions`].
#[derive(Clone)]
pub struct XmlSigner {
    options: SignerOptions,
    clock: Arc<dyn Clock>,
}

impl XmlSigner {
    pub fn new(options: SignerOptions) -> Self {
        Self::with_clock(options, Arc::new(SystemClock))
    }

    /// Use `clock` for certificate validity checks during verification.
    pub fn with_clock(options: SignerOptions, clock: Arc<dyn Clock>) -> Self {
        Self { options, clock }
    }

    pub fn options(&self) -> &SignerOptions {
        &self.options
    }

    /// Sign `xml` and return the signed document.
    pub fn sign(
        &self,
        xml: &str,
        private_key_pem: &str,
        certificate_pem: &str,
    ) -> Result<String, Error> {
        sign::sign(&self.options, xml, private_key_pem, certificate_pem).map_err(|e| {
            tracing::error!(error = %e, "signing failed");
            e
        })
    }

    /// Sign with material loaded by the certificate manager.
    pub fn sign_with_certificate(&self, xml: &str, data: &CertificateData) -> Result<String, Error> {
        self.sign(xml, &data.private_key, &data.certificate)
    }

    /// Verify a signed document. Never fails: problems are reported in the result.
    pub fn verify(&self, signed_xml: &str) -> VerificationResult {
        verify::verify(&self.options, self.clock.as_ref(), signed_xml, None)
    }

    /// Verify against a pinned certificate instead of the embedded one.
    pub fn verify_with_certificate(
        &self,
        signed_xml: &str,
        certificate_pem: &str,
    ) -> VerificationResult {
        verify::verify(
            &self.options,
            self.clock.as_ref(),
            signed_xml,
            Some(certificate_pem),
        )
    }

    /// The first embedded `X509Certificate`, as `CERTIFICATE` PEM.
    pub fn extract_certificate_from_signature(&self, signed_xml: &str) -> Option<String> {
        let doc = match fiscsig_xml::parse(signed_xml) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(error = %e, "cannot extract certificate");
                return None;
            }
        };
        let Some(node) = keyinfo::first_certificate(&doc) else {
            tracing::warn!("no X509Certificate element in document");
            return None;
        };
        let pem = keyinfo::certificate_der(node).and_then(|der| {
            x509::parse_certificate_der(&der)?;
            x509::certificate_pem(&der)
        });
        match pem {
            Ok(pem) => Some(pem),
            Err(e) => {
                tracing::warn!(error = %e, "embedded certificate is not usable");
                None
            }
        }
    }
}

impl Default for XmlSigner {
    fn default() -> Self {
        Self::new(SignerOptions::default())
    }
}

impl std::fmt::Debug for XmlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlSigner")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
