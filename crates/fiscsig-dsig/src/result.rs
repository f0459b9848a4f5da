#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Outcome of [`crate::XmlSigner::verify`].
///
/// `valid` implies `errors` is empty. Warnings never affect validity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl VerificationResult {
    pub(crate) fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub(crate) fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Record a policy finding: an error when strict, a warning otherwise.
    pub(crate) fn policy(&mut self, strict: bool, msg: impl Into<String>) {
        if strict {
            self.error(msg);
        } else {
            self.warn(msg);
        }
    }

    pub(crate) fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub(crate) fn invalid(mut self) -> Self {
        self.valid = false;
        self
    }

    pub(crate) fn accepted(mut self) -> Self {
        self.valid = self.errors.is_empty();
        self
    }
}
