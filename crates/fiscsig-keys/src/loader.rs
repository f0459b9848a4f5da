#![forbid(unsafe_code)]

//! Turning PKCS#12 containers and PEM files into [`CertificateData`].

use chrono::{DateTime, SecondsFormat, Utc};
use fiscsig_core::Error;
use pem_rfc7468::LineEnding;
use rsa::{RsaPrivateKey, RsaPublicKey};
use x509_cert::Certificate;

use crate::data::CertificateData;
use crate::x509;

pub const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";
pub const RSA_PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";

/// Structural PEM check: both armor markers present and the text starts
/// with a `-----BEGIN` line.
pub fn is_pem_format(pem: &str) -> bool {
    pem.contains("-----BEGIN") && pem.contains("-----END") && pem.trim().starts_with("-----BEGIN")
}

/// Parse an RSA private key from PEM, PKCS#8 (`PRIVATE KEY`) or PKCS#1
/// (`RSA PRIVATE KEY`).
pub fn parse_private_key_pem(pem: &str) -> Result<RsaPrivateKey, Error> {
    let pem = pem.trim();
    let label = pem_rfc7468::decode_label(pem.as_bytes())
        .map_err(|e| Error::Key(format!("invalid PEM: {e}")))?;
    match label {
        PRIVATE_KEY_LABEL => {
            use pkcs8::DecodePrivateKey;
            RsaPrivateKey::from_pkcs8_pem(pem)
                .map_err(|e| Error::Key(format!("failed to parse PKCS#8 RSA private key: {e}")))
        }
        RSA_PRIVATE_KEY_LABEL => {
            use pkcs1::DecodeRsaPrivateKey;
            RsaPrivateKey::from_pkcs1_pem(pem)
                .map_err(|e| Error::Key(format!("failed to parse PKCS#1 RSA private key: {e}")))
        }
        "ENCRYPTED PRIVATE KEY" => Err(Error::Key(
            "encrypted private key PEM is not supported; export it unencrypted or as PKCS#12"
                .into(),
        )),
        other => Err(Error::Key(format!("unsupported private key PEM label: {other}"))),
    }
}

/// Build certificate data from the bytes of a PKCS#12 container.
///
/// The container must hold at least one key and one certificate. When it
/// carries a chain, the certificate whose public key matches the key wins;
/// otherwise the first certificate is used.
pub fn certificate_data_from_p12(data: &[u8], password: &str) -> Result<CertificateData, Error> {
    let contents = fiscsig_pkcs12::parse_pkcs12(data, password)?;

    let key_der = contents
        .private_keys
        .first()
        .ok_or_else(|| Error::Pkcs12("container holds no private key".into()))?;
    if contents.certificates.is_empty() {
        return Err(Error::Pkcs12("container holds no certificate".into()));
    }

    let private_key = {
        use pkcs8::DecodePrivateKey;
        RsaPrivateKey::from_pkcs8_der(key_der)
            .map_err(|e| Error::Key(format!("failed to parse PKCS#12 private key: {e}")))?
    };
    let public_key = private_key.to_public_key();

    let mut chosen: Option<(Certificate, &[u8])> = None;
    for der in &contents.certificates {
        let cert = x509::parse_certificate_der(der)?;
        if key_matches(&cert, &public_key) {
            chosen = Some((cert, der.as_slice()));
            break;
        }
        if chosen.is_none() {
            chosen = Some((cert, der.as_slice()));
        }
    }
    let (cert, cert_der) =
        chosen.ok_or_else(|| Error::Pkcs12("container holds no certificate".into()))?;

    let key_pem = pem_rfc7468::encode_string(PRIVATE_KEY_LABEL, LineEnding::LF, key_der)
        .map_err(|e| Error::Key(format!("failed to encode private key PEM: {e}")))?;
    let cert_pem = x509::certificate_pem(cert_der)?;
    build(key_pem, &cert, cert_pem)
}

/// Build certificate data from a certificate PEM and a private key PEM.
///
/// Both texts are kept verbatim; the public key is derived from the
/// certificate.
pub fn certificate_data_from_pem(cert_pem: &str, key_pem: &str) -> Result<CertificateData, Error> {
    let (cert, _) = x509::parse_certificate_pem(cert_pem)?;
    parse_private_key_pem(key_pem)?;
    build(key_pem.to_owned(), &cert, cert_pem.to_owned())
}

fn build(private_key: String, cert: &Certificate, certificate: String) -> Result<CertificateData, Error> {
    let (valid_from, valid_to) = x509::validity(cert)?;
    check_window(valid_from, valid_to)?;
    Ok(CertificateData {
        private_key,
        certificate,
        public_key: x509::public_key_pem(cert)?,
        issuer: x509::format_name(&cert.tbs_certificate.issuer),
        subject: x509::format_name(&cert.tbs_certificate.subject),
        valid_from,
        valid_to,
    })
}

fn check_window(valid_from: DateTime<Utc>, valid_to: DateTime<Utc>) -> Result<(), Error> {
    if valid_from > valid_to {
        return Err(Error::Certificate(format!(
            "validity window is inverted (notBefore {} is after notAfter {})",
            valid_from.to_rfc3339_opts(SecondsFormat::Secs, true),
            valid_to.to_rfc3339_opts(SecondsFormat::Secs, true)
        )));
    }
    Ok(())
}

fn key_matches(cert: &Certificate, public_key: &RsaPublicKey) -> bool {
    x509::rsa_public_key(cert).is_ok_and(|k| &k == public_key)
}
