#![forbid(unsafe_code)]

//! Enveloped signature creation.
//!
//! The root element gets `Id="signed-doc"` and a default-namespace
//! `<Signature>` is appended as its last child. The digest is computed on
//! the document with the template in place, then `SignedInfo` is
//! canonicalized and signed in the context of the final document.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use fiscsig_c14n::C14nMode;
use fiscsig_core::{algorithm, ns, Error};
use fiscsig_crypto::SigningKey;
use fiscsig_keys::{is_pem_format, parse_private_key_pem, x509};
use fiscsig_xml::document::{build_id_map, find_child_element, find_descendant, is_named};
use fiscsig_xml::source;
use roxmltree::{Document, Node};

use crate::options::SignerOptions;
use crate::{keyinfo, reference, SIGNED_DOC_ID};

/// Sign `xml` with an RSA key, embedding the certificate when configured.
pub fn sign(
    options: &SignerOptions,
    xml: &str,
    private_key_pem: &str,
    certificate_pem: &str,
) -> Result<String, Error> {
    if !fiscsig_xml::looks_well_formed(xml) {
        return Err(Error::InvalidInput("XML document is not well-formed".into()));
    }
    let doc = fiscsig_xml::parse(xml)?;
    if !is_pem_format(private_key_pem) {
        return Err(Error::Key("private key is not in PEM format".into()));
    }
    if !is_pem_format(certificate_pem) {
        return Err(Error::Certificate("certificate is not in PEM format".into()));
    }

    let private_key = parse_private_key_pem(private_key_pem)?;
    let (certificate, cert_der) = x509::parse_certificate_pem(certificate_pem)?;
    if x509::rsa_public_key(&certificate)? != private_key.to_public_key() {
        return Err(Error::Certificate(
            "certificate does not match the private key".into(),
        ));
    }

    let with_id = set_root_id(&doc);
    let doc = fiscsig_xml::parse(&with_id)?;
    let (head, tail) = signature_slot(doc.root_element())?;
    let key_info = options
        .include_key_info
        .then(|| keyinfo::key_info_xml(&cert_der));
    let key_info = key_info.as_deref();

    // Pass 1: digest the referenced root with the empty template in place.
    let template = format!("{head}{}{tail}", signature_xml("", "", key_info));
    let doc = fiscsig_xml::parse(&template)?;
    let signature = appended_signature(&doc)?;
    let reference = find_descendant(signature, ns::DSIG, ns::node::REFERENCE)
        .ok_or_else(|| Error::MissingElement("Reference".into()))?;
    let id_map = build_id_map(&doc);
    let digest = reference::compute_digest(&doc, &id_map, signature, reference)?;
    let digest_b64 = STANDARD.encode(digest);

    // Pass 2: canonicalize SignedInfo with the digest filled in, then sign.
    let digested = format!("{head}{}{tail}", signature_xml(&digest_b64, "", key_info));
    let doc = fiscsig_xml::parse(&digested)?;
    let signature = appended_signature(&doc)?;
    let signed_info = find_child_element(signature, ns::DSIG, ns::node::SIGNED_INFO)
        .ok_or_else(|| Error::MissingElement("SignedInfo".into()))?;
    let canonical = fiscsig_c14n::canonicalize_subtree(signed_info, C14nMode::Exclusive, &[])?;
    tracing::trace!(
        signed_info = %String::from_utf8_lossy(&canonical),
        "canonical SignedInfo"
    );

    let sig_alg = fiscsig_crypto::sign::from_uri(algorithm::RSA_SHA256)?;
    let signature_value = sig_alg.sign(&SigningKey::Rsa(private_key), &canonical)?;
    let signed = format!(
        "{head}{}{tail}",
        signature_xml(&digest_b64, &STANDARD.encode(signature_value), key_info)
    );

    tracing::info!(
        bytes = signed.len(),
        key_info = options.include_key_info,
        "document signed"
    );
    Ok(signed)
}

/// Return the document text with the root carrying `Id="signed-doc"`.
fn set_root_id(doc: &Document<'_>) -> String {
    let text = doc.input_text();
    let root = doc.root_element();
    match root.attribute_node(ns::attr::ID) {
        Some(attr) if attr.value() == SIGNED_DOC_ID => text.to_owned(),
        Some(attr) => {
            tracing::warn!(
                previous = attr.value(),
                "replacing root Id with {SIGNED_DOC_ID}"
            );
            let value = attr.range_value();
            format!("{}{SIGNED_DOC_ID}{}", &text[..value.start], &text[value.end..])
        }
        None => {
            let at = root.range().start + 1 + source::element_qname(root).len();
            format!(r#"{} Id="{SIGNED_DOC_ID}"{}"#, &text[..at], &text[at..])
        }
    }
}

/// Split the document where the Signature element goes: right before the
/// root end tag. A self-closing root is expanded into a start/end pair.
fn signature_slot(root: Node<'_, '_>) -> Result<(String, String), Error> {
    let text = root.document().input_text();
    if source::is_self_closing(root) {
        let tag = source::start_tag_range(root);
        let head = format!("{}>", text[..tag.end - 2].trim_end());
        let tail = format!("</{}>{}", source::element_qname(root), &text[tag.end..]);
        return Ok((head, tail));
    }
    let at = source::end_tag_start(root)
        .ok_or_else(|| Error::XmlStructure("root element has no end tag".into()))?;
    Ok((text[..at].to_owned(), text[at..].to_owned()))
}

/// The Signature element inserted by [`signature_slot`]: the root's last element child.
fn appended_signature<'a, 'input>(doc: &'a Document<'input>) -> Result<Node<'a, 'input>, Error> {
    doc.root_element()
        .children()
        .filter(Node::is_element)
        .last()
        .filter(|n| is_named(n, ns::DSIG, ns::node::SIGNATURE))
        .ok_or_else(|| Error::MissingElement("Signature".into()))
}

/// The Signature element, without inter-element whitespace.
fn signature_xml(digest_value: &str, signature_value: &str, key_info: Option<&str>) -> String {
    format!(
        concat!(
            r#"<Signature xmlns="{dsig}"><SignedInfo>"#,
            r#"<CanonicalizationMethod Algorithm="{c14n}"/>"#,
            r#"<SignatureMethod Algorithm="{rsa_sha256}"/>"#,
            r##"<Reference URI="#{id}"><Transforms>"##,
            r#"<Transform Algorithm="{enveloped}"/>"#,
            r#"<Transform Algorithm="{c14n}"/>"#,
            r#"</Transforms><DigestMethod Algorithm="{sha256}"/>"#,
            r#"<DigestValue>{digest_value}</DigestValue></Reference></SignedInfo>"#,
            r#"<SignatureValue>{signature_value}</SignatureValue>{key_info}</Signature>"#,
        ),
        dsig = ns::DSIG,
        c14n = algorithm::EXC_C14N,
        rsa_sha256 = algorithm::RSA_SHA256,
        id = SIGNED_DOC_ID,
        enveloped = algorithm::ENVELOPED_SIGNATURE,
        sha256 = algorithm::SHA256,
        digest_value = digest_value,
        signature_value = signature_value,
        key_info = key_info.unwrap_or(""),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, INVOICE};

    fn sign_default(xml: &str) -> Result<String, Error> {
        sign(
            &SignerOptions::default(),
            xml,
            &fixture("rsa-2048-key.pem"),
            &fixture("rsa-2048-cert.pem"),
        )
    }

    #[test]
    fn test_root_id_inserted_after_name() {
        let doc = fiscsig_xml::parse(r#"<inv:Invoice xmlns:inv="urn:inv"><a/></inv:Invoice>"#).unwrap();
        assert_eq!(
            set_root_id(&doc),
            r#"<inv:Invoice Id="signed-doc" xmlns:inv="urn:inv"><a/></inv:Invoice>"#
        );
    }

    #[test]
    fn test_root_id_replaced() {
        let doc = fiscsig_xml::parse(r#"<Invoice Id="inv-7" n="1"/>"#).unwrap();
        assert_eq!(set_root_id(&doc), r#"<Invoice Id="signed-doc" n="1"/>"#);

        let doc = fiscsig_xml::parse(r#"<Invoice Id="signed-doc"/>"#).unwrap();
        assert_eq!(set_root_id(&doc), r#"<Invoice Id="signed-doc"/>"#);
    }

    #[test]
    fn test_self_closing_root_expanded() {
        let doc = fiscsig_xml::parse("<?xml version=\"1.0\"?>\n<Empty a=\"1\" />\n").unwrap();
        let (head, tail) = signature_slot(doc.root_element()).unwrap();
        assert_eq!(head, "<?xml version=\"1.0\"?>\n<Empty a=\"1\">");
        assert_eq!(tail, "</Empty>\n");
    }

    #[test]
    fn test_signed_document_shape() {
        let signed = sign_default(INVOICE).unwrap();
        assert!(signed.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Invoice Id=\"signed-doc\">"));
        assert!(signed.ends_with("</Signature></Invoice>\n"));
        assert!(signed.contains(r##"<Reference URI="#signed-doc">"##));
        assert!(signed.contains("<X509Certificate>"));
        assert!(!signed.contains("<DigestValue></DigestValue>"));
        assert!(!signed.contains("<SignatureValue></SignatureValue>"));

        let doc = fiscsig_xml::parse(&signed).unwrap();
        let sig = appended_signature(&doc).unwrap();
        let value = find_child_element(sig, ns::DSIG, ns::node::SIGNATURE_VALUE).unwrap();
        // 2048-bit RSA signature
        assert_eq!(STANDARD.decode(value.text().unwrap()).unwrap().len(), 256);
    }

    #[test]
    fn test_signing_is_deterministic() {
        assert_eq!(sign_default(INVOICE).unwrap(), sign_default(INVOICE).unwrap());
    }

    #[test]
    fn test_key_info_omitted() {
        let options = SignerOptions {
            include_key_info: false,
            ..SignerOptions::default()
        };
        let signed = sign(
            &options,
            INVOICE,
            &fixture("rsa-2048-key.pem"),
            &fixture("rsa-2048-cert.pem"),
        )
        .unwrap();
        assert!(!signed.contains("KeyInfo"));
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert!(matches!(sign_default("not xml"), Err(Error::InvalidInput(_))));
        assert!(matches!(sign_default("<a><b></a>"), Err(Error::XmlParse(_))));

        let err = sign(&SignerOptions::default(), INVOICE, "junk", &fixture("rsa-2048-cert.pem"))
            .unwrap_err();
        assert!(matches!(err, Error::Key(_)));

        let err = sign(&SignerOptions::default(), INVOICE, &fixture("rsa-2048-key.pem"), "junk")
            .unwrap_err();
        assert!(matches!(err, Error::Certificate(_)));
    }

    #[test]
    fn test_rejects_mismatched_certificate() {
        let err = sign(
            &SignerOptions::default(),
            INVOICE,
            &fixture("rsa-2048-key.pem"),
            &fixture("other-rsa-2048-cert.pem"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_rejects_id_collision() {
        let xml = r#"<Invoice><Line Id="signed-doc"/></Invoice>"#;
        assert!(sign_default(xml).is_err());
    }
}
