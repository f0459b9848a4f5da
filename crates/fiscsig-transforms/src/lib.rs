#![forbid(unsafe_code)]

//! Transform pipeline engine for fiscsig.
//!
//! Each `Reference` carries a sequence of transforms applied in order to
//! the data its URI selects; the result is what gets digested.

pub mod enveloped;
pub mod pipeline;

pub use enveloped::EnvelopedSignatureTransform;
pub use pipeline::{C14nTransform, Transform, TransformData, TransformPipeline};
