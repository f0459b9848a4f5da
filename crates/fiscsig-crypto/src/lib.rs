#![forbid(unsafe_code)]

//! Cryptographic algorithms for fiscsig.
//!
//! Digests and RSA PKCS#1 v1.5 signatures, looked up by the URIs that
//! appear in `Algorithm` attributes.

pub mod digest;
pub mod sign;

pub use digest::DigestAlgorithm;
pub use sign::{SignatureAlgorithm, SigningKey};
