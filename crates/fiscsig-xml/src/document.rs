#![forbid(unsafe_code)]

//! Element lookups and ID attribute registration over a parsed document.

use fiscsig_core::ns::attr::ID_ATTRS;
use roxmltree::{Document, Node, NodeId};
use std::collections::HashMap;

/// Build the ID → elements mapping for a parsed document.
///
/// Every element carrying `Id`, `ID` or `id` is registered once per value.
/// Values declared by more than one element keep every owner so callers can reject
/// ambiguous references.
pub fn build_id_map(doc: &Document<'_>) -> HashMap<String, Vec<NodeId>> {
    let mut map: HashMap<String, Vec<NodeId>> = HashMap::new();
    for node in doc.descendants().filter(|n| n.is_element()) {
        for attr_name in ID_ATTRS {
            if let Some(val) = node.attribute(attr_name) {
                let owners = map.entry(val.to_owned()).or_default();
                if !owners.contains(&node.id()) {
                    owners.push(node.id());
                }
            }
        }
    }
    map
}

/// Whether `node` has the given local name in the given namespace.
pub fn is_named(node: &Node<'_, '_>, ns: &str, local_name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local_name
        && node.tag_name().namespace().unwrap_or("") == ns
}

/// Find the first descendant element with the given local name and namespace.
pub fn find_element<'a, 'input>(
    doc: &'a Document<'input>,
    ns: &str,
    local_name: &str,
) -> Option<Node<'a, 'input>> {
    doc.descendants().find(|n| is_named(n, ns, local_name))
}

/// Find all descendant elements with the given local name and namespace, in document order.
pub fn find_elements<'a, 'input>(
    doc: &'a Document<'input>,
    ns: &str,
    local_name: &str,
) -> Vec<Node<'a, 'input>> {
    doc.descendants()
        .filter(|n| is_named(n, ns, local_name))
        .collect()
}

/// Find the first descendant of `parent` (excluding itself) with the given name.
pub fn find_descendant<'a, 'input>(
    parent: Node<'a, 'input>,
    ns: &str,
    local_name: &str,
) -> Option<Node<'a, 'input>> {
    parent
        .descendants()
        .skip(1)
        .find(|n| is_named(n, ns, local_name))
}

/// Find the first child element with the given name.
pub fn find_child_element<'a, 'input>(
    parent: Node<'a, 'input>,
    ns: &str,
    local_name: &str,
) -> Option<Node<'a, 'input>> {
    parent.children().find(|n| is_named(n, ns, local_name))
}

/// Find all child elements with the given name.
pub fn find_child_elements<'a, 'input>(
    parent: Node<'a, 'input>,
    ns: &str,
    local_name: &str,
) -> Vec<Node<'a, 'input>> {
    parent
        .children()
        .filter(|n| is_named(n, ns, local_name))
        .collect()
}
