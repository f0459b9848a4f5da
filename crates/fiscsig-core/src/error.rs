#![forbid(unsafe_code)]

/// Errors produced while loading signing material, signing or verifying.
///
/// Verification itself never surfaces these to callers; they end up as
/// messages in a verification result.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The document text could not be parsed.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// The document parsed but lacks the shape an operation needs.
    #[error("unexpected XML structure: {0}")]
    XmlStructure(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("cryptographic failure: {0}")]
    Crypto(String),

    /// Private key material is missing, malformed or of the wrong type.
    #[error("private key: {0}")]
    Key(String),

    #[error("certificate: {0}")]
    Certificate(String),

    /// The PKCS#12 container is corrupt or the password is wrong.
    #[error("PKCS#12: {0}")]
    Pkcs12(String),

    #[error("transform failed: {0}")]
    Transform(String),

    #[error("invalid base64: {0}")]
    Base64(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("missing element: {0}")]
    MissingElement(String),

    #[error("missing attribute: {0}")]
    MissingAttribute(String),

    /// A `Reference` URI that is external, malformed or ambiguous.
    #[error("bad reference URI: {0}")]
    InvalidUri(String),

    /// Caller-supplied input rejected before any processing.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = Error::UnsupportedAlgorithm("signature algorithm: urn:x".into());
        assert_eq!(err.to_string(), "unsupported algorithm: signature algorithm: urn:x");
        assert_eq!(Error::Other("plain".into()).to_string(), "plain");
    }

    #[test]
    fn test_io_conversion() {
        fn open() -> Result<Vec<u8>> {
            Ok(std::fs::read("/nonexistent/fiscsig/file")?)
        }
        assert!(matches!(open(), Err(Error::Io(_))));
    }
}
