#![forbid(unsafe_code)]

pub use fiscsig_c14n as c14n;
pub use fiscsig_core as core;
pub use fiscsig_crypto as crypto;
pub use fiscsig_dsig as dsig;
pub use fiscsig_keys as keys;
pub use fiscsig_pkcs12 as pkcs12;
pub use fiscsig_transforms as transforms;
pub use fiscsig_xml as xml;

pub use fiscsig_core::{Clock, Error, Result, SystemClock};
pub use fiscsig_dsig::{SignerOptions, VerificationResult, XmlSigner};
pub use fiscsig_keys::{CertificateCache, CertificateData, CertificateManager, ValidationResult};
