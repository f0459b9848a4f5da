#![forbid(unsafe_code)]

//! Signature verification.
//!
//! Structural and policy checks run first and accumulate into the result.
//! The cryptographic check only runs when none of them produced an error.

use chrono::{DateTime, SecondsFormat, Utc};
use fiscsig_c14n::C14nMode;
use fiscsig_core::{ns, Clock, Error};
use fiscsig_crypto::SigningKey;
use fiscsig_keys::x509;
use fiscsig_xml::document::{build_id_map, find_child_element, find_child_elements, find_elements};
use roxmltree::{Document, Node};
use rsa::RsaPublicKey;

use crate::options::SignerOptions;
use crate::result::VerificationResult;
use crate::{keyinfo, reference, SIGNED_DOC_ID};

/// Verify `signed_xml`.
///
/// With `pinned_certificate`, that certificate replaces whatever the
/// document embeds: its validity window is checked and its key is used for
/// the cryptographic check.
pub fn verify(
    options: &SignerOptions,
    clock: &dyn Clock,
    signed_xml: &str,
    pinned_certificate: Option<&str>,
) -> VerificationResult {
    let mut result = VerificationResult::default();

    if !fiscsig_xml::looks_well_formed(signed_xml) {
        result.error("signed XML is not well-formed");
        return result.invalid();
    }
    let doc = match fiscsig_xml::parse(signed_xml) {
        Ok(doc) => doc,
        Err(e) => {
            result.error(format!("signed XML is not well-formed: {e}"));
            return result.invalid();
        }
    };

    let signatures = find_elements(&doc, ns::DSIG, ns::node::SIGNATURE);
    let signature = match signatures.as_slice() {
        [] => {
            result.error("no XML signature found in document");
            return result.invalid();
        }
        [one] => *one,
        [first, ..] => {
            if options.strict_validation {
                result.error(format!(
                    "found {} signatures, exactly one is required",
                    signatures.len()
                ));
            } else {
                result.warn("multiple signatures found, using the first");
            }
            *first
        }
    };

    let signed_info = find_child_element(signature, ns::DSIG, ns::node::SIGNED_INFO);
    let reference = match signed_info {
        Some(signed_info) => check_reference(&doc, signed_info, &mut result),
        None => {
            result.error("signature has no SignedInfo element");
            None
        }
    };
    if let Some(signed_info) = signed_info {
        check_algorithms(options, signed_info, &mut result);
    }

    let certificate = match pinned_certificate {
        Some(pem) => match x509::parse_certificate_pem(pem) {
            Ok((cert, _)) => Some((cert, "pinned")),
            Err(e) => {
                result.error(format!("pinned certificate could not be parsed: {e}"));
                None
            }
        },
        None => keyinfo::embedded_certificate(signature).and_then(|node| {
            match keyinfo::certificate_der(node).and_then(|der| x509::parse_certificate_der(&der)) {
                Ok(cert) => Some((cert, "embedded")),
                Err(e) => {
                    result.warn(format!("embedded certificate could not be parsed: {e}"));
                    None
                }
            }
        }),
    };
    if let Some((cert, origin)) = &certificate {
        check_validity(cert, origin, clock.now(), &mut result);
    }

    if result.has_errors() {
        return finish(result);
    }
    let (Some(signed_info), Some(reference)) = (signed_info, reference) else {
        return finish(result);
    };
    let Some((cert, _)) = &certificate else {
        result.error("no certificate available to verify the signature");
        return finish(result);
    };

    let checked = x509::rsa_public_key(cert).and_then(|key| {
        check_cryptography(&doc, signature, signed_info, reference, key, &mut result)
    });
    if let Err(e) = checked {
        result.error(format!("signature verification error: {e}"));
    }
    finish(result)
}

fn finish(result: VerificationResult) -> VerificationResult {
    let result = result.accepted();
    if result.valid {
        tracing::info!(warnings = result.warnings.len(), "signature verified");
    } else {
        tracing::warn!(errors = ?result.errors, "signature rejected");
    }
    result
}

/// Reference policy: one Reference, pointing at `#signed-doc`, which must
/// name the document root and nothing else.
fn check_reference<'a, 'input>(
    doc: &Document<'input>,
    signed_info: Node<'a, 'input>,
    result: &mut VerificationResult,
) -> Option<Node<'a, 'input>> {
    let references = find_child_elements(signed_info, ns::DSIG, ns::node::REFERENCE);
    let reference = match references.as_slice() {
        [one] => Some(*one),
        _ => {
            result.error(format!(
                "expected exactly one Reference, found {}",
                references.len()
            ));
            None
        }
    };

    if let Some(reference) = reference {
        let uri = reference.attribute(ns::attr::URI).unwrap_or("");
        if uri.strip_prefix('#') != Some(SIGNED_DOC_ID) {
            result.error(format!(
                "reference URI must be #{SIGNED_DOC_ID}, found \"{uri}\""
            ));
        }
    }

    let id_map = build_id_map(doc);
    match id_map.get(SIGNED_DOC_ID).map(Vec::as_slice) {
        None | Some([]) => {
            result.error(format!("no element carries Id=\"{SIGNED_DOC_ID}\""));
        }
        Some([owner]) => {
            if *owner != doc.root_element().id() {
                result.error(format!(
                    "element with Id=\"{SIGNED_DOC_ID}\" is not the document root"
                ));
            }
        }
        Some(owners) => {
            result.error(format!(
                "Id=\"{SIGNED_DOC_ID}\" is declared by {} elements",
                owners.len()
            ));
        }
    }
    reference
}

fn check_algorithms(
    options: &SignerOptions,
    signed_info: Node<'_, '_>,
    result: &mut VerificationResult,
) {
    let strict = options.strict_validation;
    match find_child_element(signed_info, ns::DSIG, ns::node::SIGNATURE_METHOD)
        .and_then(|m| m.attribute(ns::attr::ALGORITHM))
    {
        Some(uri) if !options.is_signature_allowed(uri) => {
            result.policy(strict, format!("signature algorithm {uri} is not allowed"));
        }
        Some(_) => {}
        None => result.error("signature has no SignatureMethod"),
    }

    for r in find_child_elements(signed_info, ns::DSIG, ns::node::REFERENCE) {
        if let Ok(uri) = reference::digest_method(r) {
            if !options.is_digest_allowed(uri) {
                result.policy(strict, format!("digest algorithm {uri} is not allowed"));
            }
        }
    }
}

/// `origin` is `"embedded"` or `"pinned"` and prefixes every message.
fn check_validity(
    cert: &x509_cert::Certificate,
    origin: &str,
    now: DateTime<Utc>,
    result: &mut VerificationResult,
) {
    let (not_before, not_after) = match x509::validity(cert) {
        Ok(v) => v,
        Err(e) => {
            result.warn(format!("{origin} certificate validity unreadable: {e}"));
            return;
        }
    };
    if now < not_before {
        result.error(format!(
            "{origin} certificate is not yet valid (valid from {})",
            not_before.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
    }
    if now > not_after {
        result.error(format!(
            "{origin} certificate has expired (expired on {})",
            not_after.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
    }
}

/// Digest comparison, then the RSA check over canonical `SignedInfo`.
///
/// Definite failures are recorded in `result`; `Err` means the check could
/// not be carried out.
fn check_cryptography(
    doc: &Document<'_>,
    signature: Node<'_, '_>,
    signed_info: Node<'_, '_>,
    reference: Node<'_, '_>,
    public_key: RsaPublicKey,
    result: &mut VerificationResult,
) -> Result<(), Error> {
    let id_map = build_id_map(doc);
    let computed = reference::compute_digest(doc, &id_map, signature, reference)?;
    let recorded = reference::recorded_digest(reference)?;
    if computed != recorded {
        let uri = reference.attribute(ns::attr::URI).unwrap_or("");
        result.error(format!("digest mismatch for reference {uri}"));
        return Ok(());
    }

    let c14n_method = find_child_element(signed_info, ns::DSIG, ns::node::CANONICALIZATION_METHOD)
        .ok_or_else(|| Error::MissingElement("CanonicalizationMethod".into()))?;
    let c14n_uri = c14n_method
        .attribute(ns::attr::ALGORITHM)
        .ok_or_else(|| Error::MissingAttribute("Algorithm on CanonicalizationMethod".into()))?;
    let mode = C14nMode::from_uri(c14n_uri)
        .ok_or_else(|| Error::UnsupportedAlgorithm(format!("C14N: {c14n_uri}")))?;
    let prefixes = fiscsig_c14n::inclusive_prefixes(c14n_method);
    let canonical = fiscsig_c14n::canonicalize_subtree(signed_info, mode, &prefixes)?;

    let sig_uri = find_child_element(signed_info, ns::DSIG, ns::node::SIGNATURE_METHOD)
        .and_then(|m| m.attribute(ns::attr::ALGORITHM))
        .ok_or_else(|| Error::MissingElement("SignatureMethod".into()))?;
    let sig_alg = fiscsig_crypto::sign::from_uri(sig_uri)?;
    let value = find_child_element(signature, ns::DSIG, ns::node::SIGNATURE_VALUE)
        .ok_or_else(|| Error::MissingElement("SignatureValue".into()))?;
    let signature_bytes = crate::decode_base64(&reference::element_text(value))?;

    if !sig_alg.verify(&SigningKey::RsaPublic(public_key), &canonical, &signature_bytes)? {
        result.error("cryptographic signature verification failed");
    }
    Ok(())
}
