#![forbid(unsafe_code)]

//! Certificate management for fiscsig: loading signing material from
//! PKCS#12 or PEM, validating it, and caching loaded bundles.

pub mod cache;
pub mod data;
pub mod loader;
pub mod manager;
pub mod x509;

pub use cache::{CacheEntry, CertificateCache};
pub use data::{CertificateData, ValidationResult};
pub use loader::{is_pem_format, parse_private_key_pem};
pub use manager::CertificateManager;
