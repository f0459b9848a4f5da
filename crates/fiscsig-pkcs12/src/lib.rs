#![forbid(unsafe_code)]

//! Reader for PKCS#12 (.p12/.pfx) containers.
//!
//! Handles the two encryption families found in signing certificates issued
//! for tax filing: the legacy SHA-1/3DES PBE and PBES2 (PBKDF2 with
//! AES-CBC) as written by OpenSSL 3.x.

mod kdf;
mod parse;

use fiscsig_core::Error;

/// Key material recovered from a PKCS#12 container.
#[derive(Default)]
pub struct Pkcs12Contents {
    /// PKCS#8 `PrivateKeyInfo` DER, in bag order.
    pub private_keys: Vec<Vec<u8>>,
    /// X.509 certificate DER, in bag order.
    pub certificates: Vec<Vec<u8>>,
}

impl Pkcs12Contents {
    pub fn is_empty(&self) -> bool {
        self.private_keys.is_empty() && self.certificates.is_empty()
    }
}

impl std::fmt::Debug for Pkcs12Contents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pkcs12Contents")
            .field("private_keys", &format_args!("[{} redacted]", self.private_keys.len()))
            .field("certificates", &self.certificates.len())
            .finish()
    }
}

/// Decrypt and unpack a PKCS#12 container.
///
/// The integrity MAC is checked first, so a wrong password surfaces as a
/// MAC failure rather than as a padding error deep inside a bag.
pub fn parse_pkcs12(data: &[u8], password: &str) -> Result<Pkcs12Contents, Error> {
    parse::parse_pfx(data, password)
}
