#![forbid(unsafe_code)]

//! XML document helpers for the fiscsig signing library.
//!
//! Provides lookups over `roxmltree` documents, a `NodeSet` for
//! canonicalization and transforms, and helpers that read qualified names
//! and start tags back out of the source text.

pub mod document;
pub mod nodeset;
pub mod source;
pub mod xpath;

pub use nodeset::NodeSet;

use fiscsig_core::Error;

/// Return roxmltree parsing options that allow DTD.
///
/// roxmltree never fetches external entities and caps entity expansion,
/// so internal DTD subsets are accepted.
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    }
}

/// Parse XML text into a `roxmltree::Document`.
pub fn parse(text: &str) -> Result<roxmltree::Document<'_>, Error> {
    roxmltree::Document::parse_with_options(text, parsing_options())
        .map_err(|e| Error::XmlParse(e.to_string()))
}

/// Cheap structural check run before a full parse.
///
/// The trimmed text must start with `<`, end with `>` and open with a
/// complete tag.
pub fn looks_well_formed(text: &str) -> bool {
    let trimmed = text.trim();
    if !trimmed.starts_with('<') || !trimmed.ends_with('>') {
        return false;
    }
    matches!(trimmed[1..].find('>'), Some(i) if i > 0)
}
