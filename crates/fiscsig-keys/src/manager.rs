#![forbid(unsafe_code)]

//! The certificate manager: loads signing material, validates it and keeps
//! recently loaded PKCS#12 bundles in a [`CertificateCache`].

use std::path::Path;
use std::sync::Arc;

use chrono::SecondsFormat;
use fiscsig_core::Error;

use crate::cache::CertificateCache;
use crate::data::{CertificateData, ValidationResult};
use crate::loader;

#[derive(Debug, Clone)]
pub struct CertificateManager {
    cache: Arc<CertificateCache>,
}

impl CertificateManager {
    /// Build a manager over a (possibly shared) cache. The cache's clock is
    /// also used for validity checks.
    pub fn new(cache: Arc<CertificateCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<CertificateCache> {
        &self.cache
    }

    /// Load a PKCS#12 container, serving it from the cache while fresh.
    ///
    /// Returns `None` on any failure (unreadable file, wrong password,
    /// corrupt container, missing key or certificate); the cause is logged.
    pub fn load_from_p12(&self, path: impl AsRef<Path>, password: &str) -> Option<CertificateData> {
        let path = path.as_ref();
        let key = CertificateCache::cache_key(&path.to_string_lossy(), password);

        if let Some(data) = self.cache.get(&key) {
            tracing::debug!(path = %path.display(), "certificate served from cache");
            return Some(data);
        }

        tracing::debug!(path = %path.display(), "loading PKCS#12 certificate");
        let loaded = std::fs::read(path)
            .map_err(Error::from)
            .and_then(|bytes| loader::certificate_data_from_p12(&bytes, password));

        match loaded {
            Ok(data) => {
                self.cache.insert(key, data.clone());
                tracing::info!(path = %path.display(), info = %data.info(), "PKCS#12 certificate loaded");
                Some(data)
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to load PKCS#12 certificate");
                None
            }
        }
    }

    /// Load a certificate PEM and a private key PEM from two files. Never
    /// cached.
    pub fn load_from_pem(
        &self,
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> Option<CertificateData> {
        let cert_path = cert_path.as_ref();
        let key_path = key_path.as_ref();
        tracing::debug!(cert = %cert_path.display(), key = %key_path.display(), "loading PEM certificate");

        let loaded = (|| -> Result<CertificateData, Error> {
            let cert_pem = std::fs::read_to_string(cert_path)?;
            let key_pem = std::fs::read_to_string(key_path)?;
            loader::certificate_data_from_pem(&cert_pem, &key_pem)
        })();

        match loaded {
            Ok(data) => {
                tracing::info!(cert = %cert_path.display(), info = %data.info(), "PEM certificate loaded");
                Some(data)
            }
            Err(e) => {
                tracing::error!(cert = %cert_path.display(), error = %e, "failed to load PEM certificate");
                None
            }
        }
    }

    /// Run every check against `data` and report all failures together.
    pub fn validate_certificate(&self, data: &CertificateData) -> ValidationResult {
        let mut errors = Vec::new();
        let fields = [
            ("private key", &data.private_key),
            ("certificate", &data.certificate),
            ("public key", &data.public_key),
        ];

        for (name, value) in fields {
            if value.is_empty() {
                errors.push(format!("{name} is empty or missing"));
            }
        }
        for (name, value) in fields {
            if !value.is_empty() && !loader::is_pem_format(value) {
                errors.push(format!("{name} is not in valid PEM format"));
            }
        }

        let now = self.cache.clock().now();
        if data.valid_from > now {
            errors.push(format!(
                "certificate is not yet valid (valid from {})",
                data.valid_from.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        if data.valid_to < now {
            errors.push(format!(
                "certificate has expired (expired on {})",
                data.valid_to.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        if data.valid_from > data.valid_to {
            errors.push("certificate validity window is inverted".to_string());
        }

        if let Err(e) = loader::parse_private_key_pem(&data.private_key) {
            errors.push(format!("private key could not be parsed: {e}"));
        }

        ValidationResult::from(errors)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn certificate_info(&self, data: &CertificateData) -> String {
        data.info()
    }
}

impl Default for CertificateManager {
    fn default() -> Self {
        Self::new(Arc::new(CertificateCache::new()))
    }
}
