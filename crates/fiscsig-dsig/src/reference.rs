#![forbid(unsafe_code)]

//! Reference processing shared by signing and verification.
//!
//! The signer computes its `DigestValue` through exactly the same code the
//! verifier later runs, with the Signature template already in place.

use std::collections::HashMap;

use fiscsig_core::{ns, Error};
use fiscsig_crypto::digest;
use fiscsig_transforms::{TransformData, TransformPipeline};
use fiscsig_xml::document::find_child_element;
use fiscsig_xml::xpath;
use fiscsig_xml::NodeSet;
use roxmltree::{Document, Node, NodeId};

/// Resolve a `Reference`, run its transforms and digest the result.
pub(crate) fn compute_digest(
    doc: &Document<'_>,
    id_map: &HashMap<String, Vec<NodeId>>,
    signature: Node<'_, '_>,
    reference: Node<'_, '_>,
) -> Result<Vec<u8>, Error> {
    let uri = reference.attribute(ns::attr::URI).unwrap_or("");
    let digest_uri = digest_method(reference)?;

    let target = xpath::resolve_id(doc, id_map, xpath::parse_id_reference(uri)?)?;
    let node_set = NodeSet::tree_without_comments(target);

    let transforms = find_child_element(reference, ns::DSIG, ns::node::TRANSFORMS);
    let pipeline = TransformPipeline::from_element(transforms, signature)?;
    tracing::trace!(uri, transforms = ?pipeline.uris(), "processing reference");

    let data = pipeline
        .execute(TransformData::Xml { doc, node_set })?
        .into_binary()?;
    digest::digest(digest_uri, &data)
}

/// The `DigestMethod` algorithm URI of a reference.
pub(crate) fn digest_method<'a>(reference: Node<'a, '_>) -> Result<&'a str, Error> {
    find_child_element(reference, ns::DSIG, ns::node::DIGEST_METHOD)
        .ok_or_else(|| Error::MissingElement("DigestMethod".into()))?
        .attribute(ns::attr::ALGORITHM)
        .ok_or_else(|| Error::MissingAttribute("Algorithm on DigestMethod".into()))
}

/// Decode the `DigestValue` recorded in a reference.
pub(crate) fn recorded_digest(reference: Node<'_, '_>) -> Result<Vec<u8>, Error> {
    let value = find_child_element(reference, ns::DSIG, ns::node::DIGEST_VALUE)
        .ok_or_else(|| Error::MissingElement("DigestValue".into()))?;
    crate::decode_base64(&element_text(value))
}

/// Concatenated text content of an element.
pub(crate) fn element_text(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiscsig_core::algorithm;
    use fiscsig_xml::document::{build_id_map, find_element, find_descendant};

    fn sha256(data: &[u8]) -> Vec<u8> {
        digest::digest(algorithm::SHA256, data).unwrap()
    }

    #[test]
    fn test_enveloped_reference_ignores_signature() {
        let xml = concat!(
            r##"<Doc Id="signed-doc"><A>1</A>"##,
            r##"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#"><SignedInfo>"##,
            r##"<Reference URI="#signed-doc"><Transforms>"##,
            r##"<Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"/>"##,
            r##"<Transform Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>"##,
            r##"</Transforms><DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>"##,
            r##"<DigestValue>anything</DigestValue></Reference></SignedInfo></Signature></Doc>"##,
        );
        let doc = fiscsig_xml::parse(xml).unwrap();
        let ids = build_id_map(&doc);
        let sig = find_element(&doc, ns::DSIG, ns::node::SIGNATURE).unwrap();
        let reference = find_descendant(sig, ns::DSIG, ns::node::REFERENCE).unwrap();

        let computed = compute_digest(&doc, &ids, sig, reference).unwrap();
        assert_eq!(computed, sha256(br#"<Doc Id="signed-doc"><A>1</A></Doc>"#));
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let xml = concat!(
            r##"<Doc Id="x"><B Id="x"/>"##,
            r##"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#"><SignedInfo>"##,
            r##"<Reference URI="#x">"##,
            r##"<DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>"##,
            r##"<DigestValue/></Reference></SignedInfo></Signature></Doc>"##,
        );
        let doc = fiscsig_xml::parse(xml).unwrap();
        let ids = build_id_map(&doc);
        let sig = find_element(&doc, ns::DSIG, ns::node::SIGNATURE).unwrap();
        let reference = find_descendant(sig, ns::DSIG, ns::node::REFERENCE).unwrap();

        let err = compute_digest(&doc, &ids, sig, reference).unwrap_err();
        assert!(err.to_string().contains("declared by 2 elements"));
    }

    #[test]
    fn test_unknown_transform_is_rejected() {
        let xml = concat!(
            r##"<Doc Id="d"><Signature xmlns="http://www.w3.org/2000/09/xmldsig#"><SignedInfo>"##,
            r##"<Reference URI="#d"><Transforms>"##,
            r##"<Transform Algorithm="http://www.w3.org/TR/1999/REC-xslt-19991116"/>"##,
            r##"</Transforms><DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>"##,
            r##"<DigestValue/></Reference></SignedInfo></Signature></Doc>"##,
        );
        let doc = fiscsig_xml::parse(xml).unwrap();
        let ids = build_id_map(&doc);
        let sig = find_element(&doc, ns::DSIG, ns::node::SIGNATURE).unwrap();
        let reference = find_descendant(sig, ns::DSIG, ns::node::REFERENCE).unwrap();

        assert!(matches!(
            compute_digest(&doc, &ids, sig, reference),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }
}
