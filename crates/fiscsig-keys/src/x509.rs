#![forbid(unsafe_code)]

//! X.509 helpers: parsing, distinguished names, validity and PEM output.

use chrono::{DateTime, Utc};
use der::asn1::{Ia5StringRef, PrintableStringRef, TeletexStringRef, Utf8StringRef};
use der::{Decode, Encode, Tag, Tagged};
use fiscsig_core::Error;
use pem_rfc7468::LineEnding;
use rsa::RsaPublicKey;
use spki::DecodePublicKey;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::Name;
use x509_cert::time::Time;
use x509_cert::Certificate;

pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";
pub const PUBLIC_KEY_LABEL: &str = "PUBLIC KEY";

/// Parse a DER-encoded certificate.
pub fn parse_certificate_der(der: &[u8]) -> Result<Certificate, Error> {
    Certificate::from_der(der)
        .map_err(|e| Error::Certificate(format!("failed to parse X.509 certificate: {e}")))
}

/// Parse a `CERTIFICATE` PEM block, returning the certificate and its DER.
///
/// Only the first block is read, so a leaf-first chain file yields the leaf.
pub fn parse_certificate_pem(pem: &str) -> Result<(Certificate, Vec<u8>), Error> {
    let (label, der) = pem_rfc7468::decode_vec(first_pem_block(pem).as_bytes())
        .map_err(|e| Error::Certificate(format!("failed to decode certificate PEM: {e}")))?;
    if label != CERTIFICATE_LABEL {
        return Err(Error::Certificate(format!(
            "expected {CERTIFICATE_LABEL} PEM label, got: {label}"
        )));
    }
    let cert = parse_certificate_der(&der)?;
    Ok((cert, der))
}

/// Slice out the first `-----BEGIN ...-----` / `-----END ...-----` block.
/// Text before or after it is dropped.
fn first_pem_block(text: &str) -> &str {
    const BEGIN: &str = "-----BEGIN ";
    const END: &str = "-----END ";
    const DASHES: &str = "-----";

    let text = text.trim();
    let rest = match text.find(BEGIN) {
        Some(start) => &text[start..],
        None => return text,
    };
    let Some(end) = rest.find(END) else {
        return rest;
    };
    let label_start = end + END.len();
    match rest[label_start..].find(DASHES) {
        Some(close) => &rest[..label_start + close + DASHES.len()],
        None => rest,
    }
}

/// Encode certificate DER as PEM with LF line endings.
pub fn certificate_pem(der: &[u8]) -> Result<String, Error> {
    pem_rfc7468::encode_string(CERTIFICATE_LABEL, LineEnding::LF, der)
        .map_err(|e| Error::Certificate(format!("failed to encode certificate PEM: {e}")))
}

/// SubjectPublicKeyInfo of the certificate as `PUBLIC KEY` PEM.
pub fn public_key_pem(cert: &Certificate) -> Result<String, Error> {
    let spki = spki_der(cert)?;
    pem_rfc7468::encode_string(PUBLIC_KEY_LABEL, LineEnding::LF, &spki)
        .map_err(|e| Error::Certificate(format!("failed to encode public key PEM: {e}")))
}

fn spki_der(cert: &Certificate) -> Result<Vec<u8>, Error> {
    cert.tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| Error::Certificate(format!("failed to encode SPKI: {e}")))
}

/// The certificate's RSA public key.
pub fn rsa_public_key(cert: &Certificate) -> Result<RsaPublicKey, Error> {
    let spki = spki_der(cert)?;
    RsaPublicKey::from_public_key_der(&spki)
        .map_err(|e| Error::Certificate(format!("certificate does not carry an RSA key: {e}")))
}

/// `(notBefore, notAfter)` as UTC timestamps.
pub fn validity(cert: &Certificate) -> Result<(DateTime<Utc>, DateTime<Utc>), Error> {
    let validity = &cert.tbs_certificate.validity;
    Ok((to_utc(validity.not_before)?, to_utc(validity.not_after)?))
}

fn to_utc(time: Time) -> Result<DateTime<Utc>, Error> {
    let secs = i64::try_from(time.to_unix_duration().as_secs())
        .map_err(|_| Error::Certificate("certificate time out of range".into()))?;
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| Error::Certificate("certificate time out of range".into()))
}

/// Render a distinguished name as `shortName=value` pairs joined by `", "`,
/// in the order the attributes appear in the certificate.
pub fn format_name(name: &Name) -> String {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .map(format_attribute)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_attribute(atv: &AttributeTypeAndValue) -> String {
    let oid = atv.oid.to_string();
    let key = short_name(&oid).unwrap_or(&oid);
    match attribute_text(atv) {
        Some(value) => format!("{key}={value}"),
        None => {
            let raw = atv.value.to_der().unwrap_or_default();
            format!("{key}=#{}", hex::encode(raw))
        }
    }
}

fn attribute_text(atv: &AttributeTypeAndValue) -> Option<&str> {
    let value = &atv.value;
    match value.tag() {
        Tag::Utf8String => Utf8StringRef::try_from(value).ok().map(|s| s.as_str()),
        Tag::PrintableString => PrintableStringRef::try_from(value).ok().map(|s| s.as_str()),
        Tag::Ia5String => Ia5StringRef::try_from(value).ok().map(|s| s.as_str()),
        Tag::TeletexString => TeletexStringRef::try_from(value).ok().map(|s| s.as_str()),
        _ => None,
    }
}

fn short_name(oid: &str) -> Option<&'static str> {
    Some(match oid {
        "2.5.4.3" => "CN",
        "2.5.4.4" => "SN",
        "2.5.4.5" => "serialNumber",
        "2.5.4.6" => "C",
        "2.5.4.7" => "L",
        "2.5.4.8" => "ST",
        "2.5.4.9" => "street",
        "2.5.4.10" => "O",
        "2.5.4.11" => "OU",
        "2.5.4.12" => "title",
        "2.5.4.42" => "GN",
        "2.5.4.97" => "organizationIdentifier",
        "1.2.840.113549.1.9.1" => "E",
        "0.9.2342.19200300.100.1.1" => "UID",
        "0.9.2342.19200300.100.1.25" => "DC",
        _ => return None,
    })
}
