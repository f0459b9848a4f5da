#![forbid(unsafe_code)]

//! Enveloped signature transform.
//!
//! Removes the `<Signature>` element holding the reference from the node set.

use crate::pipeline::{Transform, TransformData};
use fiscsig_core::{algorithm, Error};
use roxmltree::{Node, NodeId};

pub struct EnvelopedSignatureTransform {
    signature: NodeId,
}

impl EnvelopedSignatureTransform {
    pub fn new(signature: Node<'_, '_>) -> Self {
        Self {
            signature: signature.id(),
        }
    }
}

impl Transform for EnvelopedSignatureTransform {
    fn uri(&self) -> &str {
        algorithm::ENVELOPED_SIGNATURE
    }

    fn execute<'a, 'input>(
        &self,
        input: TransformData<'a, 'input>,
    ) -> Result<TransformData<'a, 'input>, Error> {
        match input {
            TransformData::Xml { doc, mut node_set } => {
                let signature = doc.get_node(self.signature).ok_or_else(|| {
                    Error::Transform("signature element is not part of this document".into())
                })?;
                node_set.remove_subtree(signature);
                Ok(TransformData::Xml { doc, node_set })
            }
            TransformData::Binary(_) => Err(Error::Transform(
                "enveloped-signature transform requires XML input".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiscsig_xml::NodeSet;

    #[test]
    fn test_removes_signature_subtree() {
        let doc = fiscsig_xml::parse("<r><a/><Signature><b/></Signature></r>").unwrap();
        let sig = doc.descendants().find(|n| n.has_tag_name("Signature")).unwrap();
        let b = sig.first_element_child().unwrap();

        let t = EnvelopedSignatureTransform::new(sig);
        let out = t
            .execute(TransformData::Xml {
                doc: &doc,
                node_set: NodeSet::tree_with_comments(doc.root_element()),
            })
            .unwrap();
        let TransformData::Xml { node_set, .. } = out else {
            panic!("expected a node set");
        };
        assert!(!node_set.contains(&sig));
        assert!(!node_set.contains(&b));
        assert!(node_set.contains(&doc.root_element()));
    }

    #[test]
    fn test_rejects_binary_input() {
        let doc = fiscsig_xml::parse("<Signature/>").unwrap();
        let t = EnvelopedSignatureTransform::new(doc.root_element());
        assert!(t.execute(TransformData::Binary(vec![1, 2])).is_err());
    }
}
