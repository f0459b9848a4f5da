#![forbid(unsafe_code)]

//! Enveloped XML-DSig for tax-filing documents.
//!
//! [`XmlSigner`] signs a document with RSA-SHA256 over exclusive C14N,
//! referencing the root element as `#signed-doc`, and verifies such
//! documents against a fixed policy: one signature, one reference to the
//! root, allow-listed algorithms and an in-date certificate (embedded, or
//! pinned by the caller).

pub(crate) mod keyinfo;
pub mod options;
pub(crate) mod reference;
pub mod result;
pub mod sign;
pub mod signer;
pub mod verify;

pub use options::SignerOptions;
pub use result::VerificationResult;
pub use signer::XmlSigner;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use fiscsig_core::Error;

/// The `Id` given to the signed root element and targeted by the reference.
pub const SIGNED_DOC_ID: &str = "signed-doc";

/// Decode base64 element content, ignoring any whitespace or line breaks.
pub(crate) fn decode_base64(text: &str) -> Result<Vec<u8>, Error> {
    let clean: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(clean)
        .map_err(|e| Error::Base64(e.to_string()))
}

#[cfg(test)]
pub(crate) mod test_support {
    pub const INVOICE: &str = concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
        "<Invoice><Seller>Fiscsig Pruebas</Seller><Total>100</Total></Invoice>\n",
    );

    pub fn fixture(name: &str) -> String {
        let path = format!("{}/../../test-data/keys/{name}", env!("CARGO_MANIFEST_DIR"));
        std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{path}: {e}"))
    }

    pub fn vector(name: &str) -> String {
        let path = format!("{}/../../test-data/vectors/{name}", env!("CARGO_MANIFEST_DIR"));
        std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{path}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64_tolerates_line_breaks() {
        assert_eq!(decode_base64("AAEC\r\n  AwQ=\n").unwrap(), vec![0, 1, 2, 3, 4]);
        assert!(matches!(decode_base64("@@@"), Err(Error::Base64(_))));
    }
}
