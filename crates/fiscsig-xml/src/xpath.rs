#![forbid(unsafe_code)]

//! Same-document reference resolution.
//!
//! Signed documents reference their root by bare name (`#id-value`), so that
//! is the only URI form resolved here.

use fiscsig_core::Error;
use roxmltree::{Document, Node, NodeId};
use std::collections::HashMap;

/// Parse a bare-name `Reference` URI and return the ID it names.
///
/// The empty URI, XPointer expressions and anything outside the document
/// are rejected.
pub fn parse_id_reference(uri: &str) -> Result<&str, Error> {
    let id = uri
        .strip_prefix('#')
        .ok_or_else(|| Error::InvalidUri(format!("only #id references are supported: {uri:?}")))?;
    if id.is_empty() || id.contains(['(', ')', '\'', '"', '/']) {
        return Err(Error::InvalidUri(format!("unsupported fragment: {uri}")));
    }
    Ok(id)
}

/// Resolve an ID to exactly one element.
///
/// Unknown and duplicated IDs are both errors: a duplicated ID is what a
/// wrapping attack leaves behind.
pub fn resolve_id<'a, 'input>(
    doc: &'a Document<'input>,
    id_map: &HashMap<String, Vec<NodeId>>,
    id: &str,
) -> Result<Node<'a, 'input>, Error> {
    match id_map.get(id).map(Vec::as_slice) {
        None | Some([]) => Err(Error::InvalidUri(format!("ID not found: {id}"))),
        Some([one]) => doc
            .get_node(*one)
            .ok_or_else(|| Error::InvalidUri(format!("ID not found: {id}"))),
        Some(many) => Err(Error::InvalidUri(format!(
            "ID {id} is declared by {} elements",
            many.len()
        ))),
    }
}
