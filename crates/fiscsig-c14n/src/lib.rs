#![forbid(unsafe_code)]

//! XML Canonicalization (C14N) for fiscsig.
//!
//! Implements the four W3C variants XML signatures use:
//! - Canonical XML 1.0 (with and without comments)
//! - Exclusive Canonical XML 1.0 (with and without comments)

pub mod escape;
pub mod exclusive;
pub mod inclusive;
pub mod render;

use fiscsig_core::{algorithm, ns, Error};
use fiscsig_xml::NodeSet;

/// The canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C14nMode {
    /// Canonical XML 1.0
    Inclusive,
    /// Canonical XML 1.0 with comments
    InclusiveWithComments,
    /// Exclusive Canonical XML 1.0
    Exclusive,
    /// Exclusive Canonical XML 1.0 with comments
    ExclusiveWithComments,
}

impl C14nMode {
    /// Get the algorithm URI for this mode.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Inclusive => algorithm::C14N,
            Self::InclusiveWithComments => algorithm::C14N_WITH_COMMENTS,
            Self::Exclusive => algorithm::EXC_C14N,
            Self::ExclusiveWithComments => algorithm::EXC_C14N_WITH_COMMENTS,
        }
    }

    /// Parse a C14N mode from an algorithm URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::C14N => Some(Self::Inclusive),
            algorithm::C14N_WITH_COMMENTS => Some(Self::InclusiveWithComments),
            algorithm::EXC_C14N => Some(Self::Exclusive),
            algorithm::EXC_C14N_WITH_COMMENTS => Some(Self::ExclusiveWithComments),
            _ => None,
        }
    }

    pub fn with_comments(&self) -> bool {
        matches!(self, Self::InclusiveWithComments | Self::ExclusiveWithComments)
    }

    pub fn is_exclusive(&self) -> bool {
        matches!(self, Self::Exclusive | Self::ExclusiveWithComments)
    }
}

/// Canonicalize XML text.
///
/// - `xml`: the raw XML text
/// - `mode`: which C14N variant to use
/// - `node_set`: optional node set (for document-subset canonicalization)
/// - `inclusive_prefixes`: for exclusive C14N, the InclusiveNamespaces PrefixList
pub fn canonicalize(
    xml: &str,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let doc = fiscsig_xml::parse(xml)?;
    canonicalize_doc(&doc, mode, node_set, inclusive_prefixes)
}

/// Canonicalize a pre-parsed document.
///
/// A `node_set` must come from the same document.
pub fn canonicalize_doc(
    doc: &roxmltree::Document<'_>,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    if mode.is_exclusive() {
        exclusive::canonicalize(doc, mode.with_comments(), node_set, inclusive_prefixes)
    } else {
        inclusive::canonicalize(doc, mode.with_comments(), node_set)
    }
}

/// Canonicalize one element and its descendants in the context of its document.
///
/// This is how `SignedInfo` is prepared for signing and verification:
/// ancestors contribute in-scope namespaces but are not rendered.
pub fn canonicalize_subtree(
    node: roxmltree::Node<'_, '_>,
    mode: C14nMode,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let node_set = NodeSet::tree_with_comments(node);
    canonicalize_doc(node.document(), mode, Some(&node_set), inclusive_prefixes)
}

/// Read the `InclusiveNamespaces PrefixList` under a transform or
/// `CanonicalizationMethod` element.
pub fn inclusive_prefixes(method: roxmltree::Node<'_, '_>) -> Vec<String> {
    method
        .children()
        .find(|n| n.has_tag_name((ns::EXC_C14N, ns::node::INCLUSIVE_NAMESPACES)))
        .and_then(|n| n.attribute(ns::attr::PREFIX_LIST))
        .map(|list| list.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_uri_round_trip() {
        for mode in [
            C14nMode::Inclusive,
            C14nMode::InclusiveWithComments,
            C14nMode::Exclusive,
            C14nMode::ExclusiveWithComments,
        ] {
            assert_eq!(C14nMode::from_uri(mode.uri()), Some(mode));
        }
        assert_eq!(C14nMode::from_uri("http://www.w3.org/2006/12/xml-c14n11"), None);
    }

    #[test]
    fn test_subtree_inherits_namespaces() {
        let xml = r#"<root xmlns="urn:r" xmlns:ds="urn:ds" xmlns:x="urn:x"><ds:SignedInfo><ds:Ref a="1"/></ds:SignedInfo></root>"#;
        let doc = fiscsig_xml::parse(xml).unwrap();
        let si = doc
            .descendants()
            .find(|n| n.has_tag_name(("urn:ds", "SignedInfo")))
            .unwrap();

        let exc = canonicalize_subtree(si, C14nMode::Exclusive, &[]).unwrap();
        assert_eq!(
            String::from_utf8(exc).unwrap(),
            r#"<ds:SignedInfo xmlns:ds="urn:ds"><ds:Ref a="1"></ds:Ref></ds:SignedInfo>"#
        );

        let inc = canonicalize_subtree(si, C14nMode::Inclusive, &[]).unwrap();
        assert_eq!(
            String::from_utf8(inc).unwrap(),
            r#"<ds:SignedInfo xmlns="urn:r" xmlns:ds="urn:ds" xmlns:x="urn:x"><ds:Ref a="1"></ds:Ref></ds:SignedInfo>"#
        );
    }

    #[test]
    fn test_inclusive_prefixes() {
        let xml = format!(
            r#"<T xmlns:ec="{}"><ec:InclusiveNamespaces PrefixList="ds  #default xsi"/></T>"#,
            ns::EXC_C14N
        );
        let doc = fiscsig_xml::parse(&xml).unwrap();
        assert_eq!(
            inclusive_prefixes(doc.root_element()),
            vec!["ds", "#default", "xsi"]
        );

        let doc = fiscsig_xml::parse(r#"<T><InclusiveNamespaces PrefixList="ds"/></T>"#).unwrap();
        assert!(inclusive_prefixes(doc.root_element()).is_empty());
    }

    #[test]
    fn test_canonicalize_strips_declaration_and_comments() {
        let xml = "<?xml version=\"1.0\"?>\n<!--head--><a b='2'   c=\"&lt;\"><!--x-->t</a>";
        let out = canonicalize(xml, C14nMode::Exclusive, None, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), r#"<a b="2" c="&lt;">t</a>"#);

        let out = canonicalize(xml, C14nMode::ExclusiveWithComments, None, &[]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<!--head-->\n<a b=\"2\" c=\"&lt;\"><!--x-->t</a>"
        );
    }
}
