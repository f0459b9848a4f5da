#![forbid(unsafe_code)]

//! Algorithm URI constants for XML signatures.
//!
//! Each constant is the canonical URI string that appears in `Algorithm`
//! attributes.

// ── Canonicalization ─────────────────────────────────────────────────

pub const C14N: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
pub const C14N_WITH_COMMENTS: &str =
    "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments";
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
pub const EXC_C14N_WITH_COMMENTS: &str = "http://www.w3.org/2001/10/xml-exc-c14n#WithComments";

// ── Digest algorithms ────────────────────────────────────────────────

pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
pub const SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#sha384";
pub const SHA512: &str = "http://www.w3.org/2001/04/xmlenc#sha512";

// ── RSA signature algorithms ─────────────────────────────────────────

pub const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
pub const RSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384";
pub const RSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";

// ── Transform algorithms ─────────────────────────────────────────────

pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// The digest algorithm an RSA signature method hashes with.
///
/// Returns `None` for URIs that are not RSA PKCS#1 v1.5 signature methods.
pub fn digest_for_signature(uri: &str) -> Option<&'static str> {
    match uri {
        RSA_SHA1 => Some(SHA1),
        RSA_SHA256 => Some(SHA256),
        RSA_SHA384 => Some(SHA384),
        RSA_SHA512 => Some(SHA512),
        _ => None,
    }
}

/// Short name used in log lines and diagnostics.
pub fn short_name(uri: &str) -> &str {
    match uri {
        RSA_SHA1 => "rsa-sha1",
        RSA_SHA256 => "rsa-sha256",
        RSA_SHA384 => "rsa-sha384",
        RSA_SHA512 => "rsa-sha512",
        SHA1 => "sha1",
        SHA256 => "sha256",
        SHA384 => "sha384",
        SHA512 => "sha512",
        C14N => "c14n",
        C14N_WITH_COMMENTS => "c14n-with-comments",
        EXC_C14N => "exc-c14n",
        EXC_C14N_WITH_COMMENTS => "exc-c14n-with-comments",
        ENVELOPED_SIGNATURE => "enveloped-signature",
        other => other,
    }
}
