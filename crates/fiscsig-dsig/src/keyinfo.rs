#![forbid(unsafe_code)]

//! `KeyInfo/X509Data` handling.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use fiscsig_core::{ns, Error};
use fiscsig_xml::document::{find_child_element, find_element};
use roxmltree::{Document, Node};

use crate::reference::element_text;

/// The `KeyInfo` element carrying one X.509 certificate.
pub(crate) fn key_info_xml(cert_der: &[u8]) -> String {
    format!(
        "<KeyInfo><X509Data><X509Certificate>{}</X509Certificate></X509Data></KeyInfo>",
        STANDARD.encode(cert_der)
    )
}

/// First `X509Certificate` under the signature's `KeyInfo/X509Data`.
pub(crate) fn embedded_certificate<'a, 'input>(
    signature: Node<'a, 'input>,
) -> Option<Node<'a, 'input>> {
    let key_info = find_child_element(signature, ns::DSIG, ns::node::KEY_INFO)?;
    key_info
        .children()
        .filter(|n| fiscsig_xml::document::is_named(n, ns::DSIG, ns::node::X509_DATA))
        .find_map(|data| find_child_element(data, ns::DSIG, ns::node::X509_CERTIFICATE))
}

/// First XMLDSig `X509Certificate` anywhere in the document.
pub(crate) fn first_certificate<'a, 'input>(doc: &'a Document<'input>) -> Option<Node<'a, 'input>> {
    find_element(doc, ns::DSIG, ns::node::X509_CERTIFICATE)
}

/// DER bytes carried by an `X509Certificate` element.
pub(crate) fn certificate_der(node: Node<'_, '_>) -> Result<Vec<u8>, Error> {
    crate::decode_base64(&element_text(node))
}
