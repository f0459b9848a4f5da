#![forbid(unsafe_code)]

//! Transform pipeline and trait definitions.

use crate::enveloped::EnvelopedSignatureTransform;
use fiscsig_c14n::C14nMode;
use fiscsig_core::{algorithm, ns, Error};
use fiscsig_xml::{document, NodeSet};
use roxmltree::{Document, Node};

/// Data flowing through the transform pipeline.
pub enum TransformData<'a, 'input> {
    /// A node set over a parsed document (for XML-aware transforms like C14N).
    Xml {
        doc: &'a Document<'input>,
        node_set: NodeSet,
    },
    /// Raw octets.
    Binary(Vec<u8>),
}

impl TransformData<'_, '_> {
    /// Convert to octets.
    ///
    /// A node set left at the end of the chain is serialized with
    /// inclusive C14N without comments.
    pub fn into_binary(self) -> Result<Vec<u8>, Error> {
        match self {
            TransformData::Binary(data) => Ok(data),
            TransformData::Xml { doc, node_set } => {
                fiscsig_c14n::canonicalize_doc(doc, C14nMode::Inclusive, Some(&node_set), &[])
            }
        }
    }
}

/// Trait for individual transforms.
pub trait Transform: Send + Sync {
    /// The algorithm URI for this transform.
    fn uri(&self) -> &str;

    /// Execute the transform on the given data.
    fn execute<'a, 'input>(
        &self,
        input: TransformData<'a, 'input>,
    ) -> Result<TransformData<'a, 'input>, Error>;
}

/// A pipeline of transforms executed in sequence.
#[derive(Default)]
pub struct TransformPipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the pipeline a `<Transforms>` element describes.
    ///
    /// `signature` is the `<Signature>` element the reference belongs to;
    /// the enveloped-signature transform removes it. Unknown algorithms
    /// are rejected rather than skipped.
    pub fn from_element(
        transforms: Option<Node<'_, '_>>,
        signature: Node<'_, '_>,
    ) -> Result<Self, Error> {
        let mut pipeline = Self::new();
        let Some(transforms) = transforms else {
            return Ok(pipeline);
        };
        for node in document::find_child_elements(transforms, ns::DSIG, ns::node::TRANSFORM) {
            let uri = node.attribute(ns::attr::ALGORITHM).ok_or_else(|| {
                Error::MissingAttribute("Algorithm on Transform".into())
            })?;
            let transform: Box<dyn Transform> = match uri {
                algorithm::ENVELOPED_SIGNATURE => {
                    Box::new(EnvelopedSignatureTransform::new(signature))
                }
                _ => match C14nMode::from_uri(uri) {
                    Some(mode) => Box::new(C14nTransform::new(
                        mode,
                        fiscsig_c14n::inclusive_prefixes(node),
                    )),
                    None => {
                        return Err(Error::UnsupportedAlgorithm(format!("transform: {uri}")))
                    }
                },
            };
            pipeline.push(transform);
        }
        Ok(pipeline)
    }

    pub fn push(&mut self, transform: Box<dyn Transform>) {
        self.transforms.push(transform);
    }

    /// Execute all transforms in order.
    pub fn execute<'a, 'input>(
        &self,
        input: TransformData<'a, 'input>,
    ) -> Result<TransformData<'a, 'input>, Error> {
        let mut data = input;
        for transform in &self.transforms {
            data = transform.execute(data)?;
        }
        Ok(data)
    }

    /// Algorithm URIs of the transforms, in order.
    pub fn uris(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.uri()).collect()
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

// ── C14N Transform ───────────────────────────────────────────────────

/// A canonicalization transform.
pub struct C14nTransform {
    mode: C14nMode,
    inclusive_prefixes: Vec<String>,
}

impl C14nTransform {
    pub fn new(mode: C14nMode, inclusive_prefixes: Vec<String>) -> Self {
        Self {
            mode,
            inclusive_prefixes,
        }
    }
}

impl Transform for C14nTransform {
    fn uri(&self) -> &str {
        self.mode.uri()
    }

    fn execute<'a, 'input>(
        &self,
        input: TransformData<'a, 'input>,
    ) -> Result<TransformData<'a, 'input>, Error> {
        let bytes = match input {
            TransformData::Xml { doc, node_set } => fiscsig_c14n::canonicalize_doc(
                doc,
                self.mode,
                Some(&node_set),
                &self.inclusive_prefixes,
            )?,
            TransformData::Binary(data) => {
                let text = std::str::from_utf8(&data)
                    .map_err(|e| Error::Transform(format!("invalid UTF-8: {e}")))?;
                fiscsig_c14n::canonicalize(text, self.mode, None, &self.inclusive_prefixes)?
            }
        };
        Ok(TransformData::Binary(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DSIG: &str = ns::DSIG;

    fn signed_doc(transforms: &str) -> String {
        format!(
            r##"<doc xmlns:x="urn:x" Id="d"><x:v>1</x:v><Signature xmlns="{DSIG}"><SignedInfo><Reference URI="#d"><Transforms>{transforms}</Transforms></Reference></SignedInfo></Signature></doc>"##
        )
    }

    fn parts<'a, 'input>(doc: &'a Document<'input>) -> (Node<'a, 'input>, Node<'a, 'input>) {
        let sig = document::find_element(doc, DSIG, "Signature").unwrap();
        let transforms = document::find_element(doc, DSIG, "Transforms").unwrap();
        (sig, transforms)
    }

    #[test]
    fn test_enveloped_then_exclusive() {
        let xml = signed_doc(&format!(
            r#"<Transform Algorithm="{}"/><Transform Algorithm="{}"/>"#,
            algorithm::ENVELOPED_SIGNATURE,
            algorithm::EXC_C14N
        ));
        let doc = fiscsig_xml::parse(&xml).unwrap();
        let (sig, transforms) = parts(&doc);
        let pipeline = TransformPipeline::from_element(Some(transforms), sig).unwrap();
        assert_eq!(
            pipeline.uris(),
            vec![algorithm::ENVELOPED_SIGNATURE, algorithm::EXC_C14N]
        );

        let input = TransformData::Xml {
            doc: &doc,
            node_set: NodeSet::tree_without_comments(doc.root_element()),
        };
        let out = pipeline.execute(input).unwrap().into_binary().unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"<doc Id="d"><x:v xmlns:x="urn:x">1</x:v></doc>"#
        );
    }

    #[test]
    fn test_trailing_node_set_uses_inclusive_c14n() {
        let xml = signed_doc(&format!(
            r#"<Transform Algorithm="{}"/>"#,
            algorithm::ENVELOPED_SIGNATURE
        ));
        let doc = fiscsig_xml::parse(&xml).unwrap();
        let (sig, transforms) = parts(&doc);
        let pipeline = TransformPipeline::from_element(Some(transforms), sig).unwrap();
        let input = TransformData::Xml {
            doc: &doc,
            node_set: NodeSet::tree_without_comments(doc.root_element()),
        };
        let out = pipeline.execute(input).unwrap().into_binary().unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"<doc xmlns:x="urn:x" Id="d"><x:v>1</x:v></doc>"#
        );
    }

    #[test]
    fn test_unknown_transform_rejected() {
        let xml = signed_doc(r#"<Transform Algorithm="http://www.w3.org/TR/1999/REC-xslt-19991116"/>"#);
        let doc = fiscsig_xml::parse(&xml).unwrap();
        let (sig, transforms) = parts(&doc);
        let err = TransformPipeline::from_element(Some(transforms), sig).err().unwrap();
        assert!(matches!(err, Error::UnsupportedAlgorithm(_)));
    }

    #[test]
    fn test_missing_transforms_is_empty_pipeline() {
        let doc = fiscsig_xml::parse("<a/>").unwrap();
        let pipeline = TransformPipeline::from_element(None, doc.root_element()).unwrap();
        assert!(pipeline.is_empty());
    }

    #[test]
    fn test_c14n_on_binary_input() {
        let t = C14nTransform::new(C14nMode::Exclusive, Vec::new());
        let out = t
            .execute(TransformData::Binary(b"<a  z='1' b='2'/>".to_vec()))
            .unwrap()
            .into_binary()
            .unwrap();
        assert_eq!(out, br#"<a b="2" z="1"></a>"#);
    }
}
