//! The verdict gate: a probe passes only if the image's classifier agrees.

use std::path::Path;
use tracing::debug;

use kata_image_core::{BuilderError, CapturedResult, Colour, RagClassifier, Result, VerdictMismatch};

/// Compares classified output with the colour each probe was built for.
pub struct RagGate<'a> {
    classifier: &'a RagClassifier,
    model: &'static str,
    start_point_dir: &'a Path,
}

impl<'a> RagGate<'a> {
    pub fn new(classifier: &'a RagClassifier, model: &'static str, start_point_dir: &'a Path) -> Self {
        Self {
            classifier,
            model,
            start_point_dir,
        }
    }

    /// Classify `captured`, failing with a `VerdictMismatch` unless it is `expected`.
    pub fn evaluate(&self, expected: Colour, captured: &CapturedResult) -> Result<Colour> {
        let actual = self.classifier.classify(captured);
        debug!(expected = %expected, actual = %actual, model = self.model, "classified probe");

        if actual == expected {
            return Ok(actual);
        }
        Err(BuilderError::VerdictMismatch(Box::new(VerdictMismatch {
            expected,
            actual,
            captured: captured.clone(),
            model: self.model.to_string(),
            start_point_dir: self.start_point_dir.to_path_buf(),
        })))
    }
}
