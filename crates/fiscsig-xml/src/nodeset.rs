#![forbid(unsafe_code)]

//! NodeSet type for XML canonicalization and transforms.
//!
//! A `NodeSet` is a subset of one document's nodes, identified by their
//! `roxmltree::NodeId`. Same-document references produce one, the
//! enveloped-signature transform carves the signature out of it, and
//! canonicalization renders only what it contains.

use roxmltree::{Node, NodeId};
use std::collections::HashSet;

/// A set of XML document nodes.
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    nodes: HashSet<usize>,
}

impl NodeSet {
    /// Create an empty node set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The subtree rooted at `node`, without comments.
    ///
    /// This is what a `#id` reference selects.
    pub fn tree_without_comments(node: Node<'_, '_>) -> Self {
        let mut set = Self::new();
        set.collect_subtree(node, false);
        set
    }

    /// The subtree rooted at `node`, comments included.
    pub fn tree_with_comments(node: Node<'_, '_>) -> Self {
        let mut set = Self::new();
        set.collect_subtree(node, true);
        set
    }

    fn collect_subtree(&mut self, node: Node<'_, '_>, include_comments: bool) {
        for n in node.descendants() {
            if include_comments || !n.is_comment() {
                self.nodes.insert(n.id().get_usize());
            }
        }
    }

    /// Check if a node is in this set.
    pub fn contains(&self, node: &Node<'_, '_>) -> bool {
        self.contains_id(node.id())
    }

    pub fn contains_id(&self, id: NodeId) -> bool {
        self.nodes.contains(&id.get_usize())
    }

    pub fn insert(&mut self, node: &Node<'_, '_>) {
        self.nodes.insert(node.id().get_usize());
    }

    pub fn remove(&mut self, node: &Node<'_, '_>) {
        self.nodes.remove(&node.id().get_usize());
    }

    /// Remove `node` and all of its descendants.
    pub fn remove_subtree(&mut self, node: Node<'_, '_>) {
        for n in node.descendants() {
            self.nodes.remove(&n.id().get_usize());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = "<a><!--c--><b>t</b><c/></a>";

    #[test]
    fn test_tree_without_comments() {
        let doc = crate::parse(XML).unwrap();
        let all = NodeSet::tree_with_comments(doc.root());
        let no_comments = NodeSet::tree_without_comments(doc.root());
        assert_eq!(all.len(), no_comments.len() + 1);

        let comment = doc.descendants().find(|n| n.is_comment()).unwrap();
        assert!(all.contains(&comment));
        assert!(!no_comments.contains(&comment));
    }

    #[test]
    fn test_remove_subtree() {
        let doc = crate::parse(XML).unwrap();
        let mut set = NodeSet::tree_without_comments(doc.root_element());
        let b = doc
            .descendants()
            .find(|n| n.has_tag_name("b"))
            .unwrap();
        let text = b.first_child().unwrap();
        assert!(set.contains(&text));

        set.remove_subtree(b);
        assert!(!set.contains(&b));
        assert!(!set.contains(&text));
        assert!(set.contains(&doc.root_element()));
    }

    #[test]
    fn test_insert_and_remove() {
        let doc = crate::parse(XML).unwrap();
        let mut set = NodeSet::new();
        assert!(set.is_empty());
        set.insert(&doc.root_element());
        assert!(set.contains_id(doc.root_element().id()));
        set.remove(&doc.root_element());
        assert!(set.is_empty());
    }
}
