#![forbid(unsafe_code)]

//! Exclusive Canonical XML 1.0 (exc-C14N).
//!
//! Algorithm URI: `http://www.w3.org/2001/10/xml-exc-c14n#`
//! With comments: `http://www.w3.org/2001/10/xml-exc-c14n#WithComments`
//!
//! Only "visibly utilized" namespace declarations are output. A namespace
//! is visibly utilized if:
//! 1. Its prefix is used by the element's tag name, OR
//! 2. Its prefix is used by one of the element's attributes, OR
//! 3. The prefix appears in the InclusiveNamespaces PrefixList.

use crate::escape;
use crate::inclusive::collect_inscope_namespaces;
use crate::render::{self, NsDecl};
use fiscsig_core::Error;
use fiscsig_xml::{source, NodeSet};
use roxmltree::{Node, NodeType};
use std::collections::{BTreeMap, BTreeSet};

/// Canonicalize using Exclusive C14N 1.0.
pub fn canonicalize(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let inclusive_prefixes = inclusive_prefixes
        .iter()
        .map(|p| if p == "#default" { String::new() } else { p.clone() })
        .collect();
    let mut output = Vec::new();
    let ctx = ExcC14nContext {
        with_comments,
        node_set,
        inclusive_prefixes,
    };
    ctx.process_node(doc.root(), &mut output, &BTreeMap::new());
    Ok(output)
}

struct ExcC14nContext<'a> {
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
    /// `""` stands for `#default`.
    inclusive_prefixes: BTreeSet<String>,
}

impl ExcC14nContext<'_> {
    fn is_visible(&self, node: &Node<'_, '_>) -> bool {
        self.node_set.map_or(true, |ns| ns.contains(node))
    }

    fn process_node(
        &self,
        node: Node<'_, '_>,
        output: &mut Vec<u8>,
        rendered_ns: &BTreeMap<String, String>,
    ) {
        match node.node_type() {
            NodeType::Root => {
                for child in node.children() {
                    self.process_node(child, output, rendered_ns);
                }
            }
            NodeType::Element => self.process_element(node, output, rendered_ns),
            NodeType::Text => {
                if self.is_visible(&node) {
                    let text = node.text().unwrap_or("");
                    output.extend_from_slice(escape::escape_text(text).as_bytes());
                }
            }
            NodeType::Comment => {
                if self.with_comments && self.is_visible(&node) {
                    render::write_comment(output, node);
                }
            }
            NodeType::PI => {
                if self.is_visible(&node) {
                    render::write_pi(output, node);
                }
            }
        }
    }

    fn process_element(
        &self,
        node: Node<'_, '_>,
        output: &mut Vec<u8>,
        rendered_ns: &BTreeMap<String, String>,
    ) {
        if !self.is_visible(&node) {
            // An invisible element renders nothing; descendants compare
            // against the nearest rendered ancestor.
            for child in node.children() {
                self.process_node(child, output, rendered_ns);
            }
            return;
        }

        let doc = node.document();
        let mut utilized: BTreeSet<&str> = BTreeSet::new();
        utilized.insert(source::element_prefix(node));
        for attr in node.attributes() {
            let prefix = source::attribute_prefix(doc, &attr);
            if !prefix.is_empty() {
                utilized.insert(prefix);
            }
        }
        utilized.extend(self.inclusive_prefixes.iter().map(String::as_str));

        let inscope = collect_inscope_namespaces(&node);

        let mut ns_decls: Vec<NsDecl> = Vec::new();
        for prefix in utilized.into_iter().filter(|p| *p != "xml") {
            match inscope.get(prefix) {
                Some(uri) if rendered_ns.get(prefix) != Some(uri) => {
                    ns_decls.push(NsDecl::new(prefix, uri));
                }
                Some(_) => {}
                None if prefix.is_empty() => {
                    // An unprefixed element outside any default namespace
                    // must undo a default rendered on an ancestor.
                    if rendered_ns.get("").is_some_and(|uri| !uri.is_empty()) {
                        ns_decls.push(NsDecl::new("", ""));
                    }
                }
                None => {}
            }
        }
        ns_decls.sort();

        let mut attrs = render::element_attrs(node);
        attrs.sort();

        let name = source::element_qname(node);
        render::write_start_tag(output, name, &ns_decls, &attrs);

        let mut child_rendered_ns = rendered_ns.clone();
        for decl in ns_decls {
            child_rendered_ns.insert(decl.prefix, decl.uri);
        }
        for child in node.children() {
            self.process_node(child, output, &child_rendered_ns);
        }

        render::write_end_tag(output, name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exc(xml: &str, prefixes: &[&str]) -> String {
        let doc = fiscsig_xml::parse(xml).unwrap();
        let prefixes: Vec<String> = prefixes.iter().map(|p| p.to_string()).collect();
        String::from_utf8(canonicalize(&doc, false, None, &prefixes).unwrap()).unwrap()
    }

    #[test]
    fn test_unused_namespaces_dropped() {
        let xml = r#"<fe:Facturae xmlns:fe="urn:fe" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" Id="signed-doc"><fe:Total>100</fe:Total></fe:Facturae>"#;
        assert_eq!(
            exc(xml, &[]),
            r#"<fe:Facturae xmlns:fe="urn:fe" Id="signed-doc"><fe:Total>100</fe:Total></fe:Facturae>"#
        );
    }

    #[test]
    fn test_namespace_pushed_down_to_first_user() {
        let xml = r#"<a xmlns:p="urn:p" xmlns:q="urn:q"><b><p:c q:attr="v"/></b></a>"#;
        assert_eq!(
            exc(xml, &[]),
            r#"<a><b><p:c xmlns:p="urn:p" xmlns:q="urn:q" q:attr="v"></p:c></b></a>"#
        );
    }

    #[test]
    fn test_inclusive_prefix_list() {
        let xml = r#"<a xmlns="urn:d" xmlns:p="urn:p"><b/></a>"#;
        assert_eq!(
            exc(xml, &["p"]),
            r#"<a xmlns="urn:d" xmlns:p="urn:p"><b></b></a>"#
        );
        assert_eq!(
            exc(r#"<x:a xmlns:x="urn:x" xmlns="urn:d"/>"#, &["#default"]),
            r#"<x:a xmlns="urn:d" xmlns:x="urn:x"></x:a>"#
        );
    }

    #[test]
    fn test_default_namespace_reset() {
        let xml = r#"<a xmlns="urn:d"><b xmlns=""/></a>"#;
        assert_eq!(exc(xml, &[]), r#"<a xmlns="urn:d"><b xmlns=""></b></a>"#);
    }

    #[test]
    fn test_enveloped_subset() {
        let xml = r#"<r Id="x"><v>1</v><s><t/></s></r>"#;
        let doc = fiscsig_xml::parse(xml).unwrap();
        let mut set = NodeSet::tree_without_comments(doc.root_element());
        let s = doc.descendants().find(|n| n.has_tag_name("s")).unwrap();
        set.remove_subtree(s);
        let out = canonicalize(&doc, false, Some(&set), &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), r#"<r Id="x"><v>1</v></r>"#);
    }
}
