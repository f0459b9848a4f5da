#![forbid(unsafe_code)]

//! Shared rendering utilities for C14N output.

use crate::escape;
use roxmltree::Node;
use std::cmp::Ordering;

/// A namespace declaration to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsDecl {
    /// The prefix ("" for default namespace).
    pub prefix: String,
    /// The namespace URI ("" undeclares the default namespace).
    pub uri: String,
}

impl NsDecl {
    pub fn new(prefix: &str, uri: &str) -> Self {
        Self {
            prefix: prefix.to_owned(),
            uri: uri.to_owned(),
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        if self.prefix.is_empty() {
            out.extend_from_slice(b" xmlns=\"");
        } else {
            out.extend_from_slice(b" xmlns:");
            out.extend_from_slice(self.prefix.as_bytes());
            out.extend_from_slice(b"=\"");
        }
        out.extend_from_slice(escape::escape_attr(&self.uri).as_bytes());
        out.push(b'"');
    }
}

impl Ord for NsDecl {
    fn cmp(&self, other: &Self) -> Ordering {
        // The default namespace sorts first, then by prefix.
        match (self.prefix.is_empty(), other.prefix.is_empty()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => self.prefix.cmp(&other.prefix),
        }
    }
}

impl PartialOrd for NsDecl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An attribute to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// The namespace URI of the attribute ("" for no namespace).
    pub ns_uri: String,
    pub local_name: String,
    /// The qualified name (prefix:local or just local).
    pub qualified_name: String,
    pub value: String,
}

impl Attr {
    fn write(&self, out: &mut Vec<u8>) {
        out.push(b' ');
        out.extend_from_slice(self.qualified_name.as_bytes());
        out.extend_from_slice(b"=\"");
        out.extend_from_slice(escape::escape_attr(&self.value).as_bytes());
        out.push(b'"');
    }
}

impl Ord for Attr {
    fn cmp(&self, other: &Self) -> Ordering {
        // Unqualified attributes first, then by (namespace URI, local name).
        match (self.ns_uri.is_empty(), other.ns_uri.is_empty()) {
            (true, true) => self.local_name.cmp(&other.local_name),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self
                .ns_uri
                .cmp(&other.ns_uri)
                .then_with(|| self.local_name.cmp(&other.local_name)),
        }
    }
}

impl PartialOrd for Attr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The element's own attributes, with the prefixes the author wrote.
pub fn element_attrs(node: Node<'_, '_>) -> Vec<Attr> {
    let doc = node.document();
    node.attributes()
        .map(|attr| Attr {
            ns_uri: attr.namespace().unwrap_or("").to_owned(),
            local_name: attr.name().to_owned(),
            qualified_name: attribute_qname(doc, &attr),
            value: attr.value().to_owned(),
        })
        .collect()
}

fn attribute_qname(doc: &roxmltree::Document<'_>, attr: &roxmltree::Attribute<'_, '_>) -> String {
    let prefix = fiscsig_xml::source::attribute_prefix(doc, attr);
    if prefix.is_empty() {
        attr.name().to_owned()
    } else {
        format!("{prefix}:{}", attr.name())
    }
}

/// Write `<name ns-decls attrs>`. Both lists must already be sorted.
pub fn write_start_tag(out: &mut Vec<u8>, name: &str, ns_decls: &[NsDecl], attrs: &[Attr]) {
    out.push(b'<');
    out.extend_from_slice(name.as_bytes());
    for ns in ns_decls {
        ns.write(out);
    }
    for attr in attrs {
        attr.write(out);
    }
    out.push(b'>');
}

pub fn write_end_tag(out: &mut Vec<u8>, name: &str) {
    out.extend_from_slice(b"</");
    out.extend_from_slice(name.as_bytes());
    out.push(b'>');
}

/// Write a comment, with the line breaks C14N puts around
/// document-level comments.
pub fn write_comment(out: &mut Vec<u8>, node: Node<'_, '_>) {
    write_document_level(out, node, |out| {
        out.extend_from_slice(b"<!--");
        out.extend_from_slice(node.text().unwrap_or("").as_bytes());
        out.extend_from_slice(b"-->");
    });
}

/// Write a processing instruction, with the same line-break rules as comments.
pub fn write_pi(out: &mut Vec<u8>, node: Node<'_, '_>) {
    let Some(pi) = node.pi() else {
        return;
    };
    write_document_level(out, node, |out| {
        out.extend_from_slice(b"<?");
        out.extend_from_slice(pi.target.as_bytes());
        if let Some(value) = pi.value.filter(|v| !v.is_empty()) {
            out.push(b' ');
            out.extend_from_slice(escape::escape_pi(value).as_bytes());
        }
        out.extend_from_slice(b"?>");
    });
}

fn write_document_level(out: &mut Vec<u8>, node: Node<'_, '_>, body: impl FnOnce(&mut Vec<u8>)) {
    let at_root = node
        .parent()
        .is_some_and(|p| p.node_type() == roxmltree::NodeType::Root);
    if at_root && node.prev_siblings().skip(1).any(|s| s.is_element()) {
        out.push(b'\n');
    }
    body(out);
    if at_root && node.next_siblings().skip(1).any(|s| s.is_element()) {
        out.push(b'\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ns_decl_order() {
        let mut decls = vec![
            NsDecl::new("b", "urn:b"),
            NsDecl::new("", "urn:d"),
            NsDecl::new("a", "urn:a"),
        ];
        decls.sort();
        let prefixes: Vec<&str> = decls.iter().map(|d| d.prefix.as_str()).collect();
        assert_eq!(prefixes, vec!["", "a", "b"]);
    }

    #[test]
    fn test_attr_order_by_namespace_then_name() {
        let attr = |ns: &str, local: &str| Attr {
            ns_uri: ns.to_owned(),
            local_name: local.to_owned(),
            qualified_name: local.to_owned(),
            value: String::new(),
        };
        let mut attrs = vec![
            attr("urn:z", "a"),
            attr("", "z"),
            attr("urn:a", "b"),
            attr("", "a"),
        ];
        attrs.sort();
        let order: Vec<(&str, &str)> = attrs
            .iter()
            .map(|a| (a.ns_uri.as_str(), a.local_name.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![("", "a"), ("", "z"), ("urn:a", "b"), ("urn:z", "a")]
        );
    }

    #[test]
    fn test_start_tag_escapes_values() {
        let mut out = Vec::new();
        let attrs = [Attr {
            ns_uri: String::new(),
            local_name: "v".into(),
            qualified_name: "v".into(),
            value: "a\"b\n".into(),
        }];
        write_start_tag(&mut out, "e", &[NsDecl::new("", "")], &attrs);
        assert_eq!(String::from_utf8(out).unwrap(), r#"<e xmlns="" v="a&quot;b&#xA;">"#);
    }
}
