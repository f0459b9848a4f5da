#![forbid(unsafe_code)]

//! Lookups into the original document text.
//!
//! roxmltree resolves names to `(namespace, local)` pairs and drops the
//! prefixes the author wrote. Canonical output has to reproduce those
//! prefixes, and the signer has to edit the root start tag in place, so
//! both read byte ranges of the source text.

use std::ops::Range;

/// Split a qualified name into `(prefix, local)`; the prefix is `""` when absent.
pub fn split_qname(qname: &str) -> (&str, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", qname),
    }
}

/// The element name exactly as written in its start tag, e.g. `ds:Signature`.
pub fn element_qname<'input>(node: roxmltree::Node<'_, 'input>) -> &'input str {
    let text = node.document().input_text();
    let rest = text.get(node.range().start + 1..).unwrap_or("");
    let end = rest
        .find(|c: char| c.is_ascii_whitespace() || c == '/' || c == '>')
        .unwrap_or(rest.len());
    let qname = &rest[..end];
    let local = node.tag_name().name();
    // Nodes produced by entity expansion carry ranges into the DTD.
    if split_qname(qname).1 == local {
        qname
    } else {
        local
    }
}

/// The prefix of an element's name, `""` for unprefixed elements.
pub fn element_prefix<'input>(node: roxmltree::Node<'_, 'input>) -> &'input str {
    split_qname(element_qname(node)).0
}

/// The attribute name exactly as written, e.g. `xml:lang` or `wsu:Id`.
pub fn attribute_qname<'input>(
    doc: &roxmltree::Document<'input>,
    attr: &roxmltree::Attribute<'_, 'input>,
) -> &'input str {
    let qname = doc.input_text().get(attr.range_qname()).unwrap_or("");
    if split_qname(qname).1 == attr.name() {
        qname
    } else {
        attr.name()
    }
}

/// The prefix of an attribute's name, `""` when unqualified.
pub fn attribute_prefix<'input>(
    doc: &roxmltree::Document<'input>,
    attr: &roxmltree::Attribute<'_, 'input>,
) -> &'input str {
    if attr.namespace() == Some(fiscsig_core::ns::XML) {
        return "xml";
    }
    if attr.namespace().is_none() {
        return "";
    }
    split_qname(attribute_qname(doc, attr)).0
}

/// Byte range of an element's start tag, from `<` through the closing `>`.
///
/// Quoted attribute values may contain `>`, so quotes are tracked.
pub fn start_tag_range(node: roxmltree::Node<'_, '_>) -> Range<usize> {
    let text = node.document().input_text().as_bytes();
    let start = node.range().start;
    let mut quote: Option<u8> = None;
    let mut i = start + 1;
    while i < text.len() {
        let b = text[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return start..i + 1,
            None => {}
        }
        i += 1;
    }
    start..text.len()
}

/// Whether the element is written as `<name .../>`.
pub fn is_self_closing(node: roxmltree::Node<'_, '_>) -> bool {
    let text = node.document().input_text();
    let tag = start_tag_range(node);
    text.get(tag).is_some_and(|t| t.ends_with("/>"))
}

/// Byte offset where an element's end tag starts, or `None` when self-closing.
pub fn end_tag_start(node: roxmltree::Node<'_, '_>) -> Option<usize> {
    if is_self_closing(node) {
        return None;
    }
    let text = node.document().input_text();
    let end = node.range().end;
    text.get(..end)?.rfind("</")
}
