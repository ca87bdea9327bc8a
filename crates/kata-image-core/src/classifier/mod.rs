//! The image's own red/amber/green classifier.
//!
//! Every test-framework image carries a rules file at [`RAG_FILENAME`]. It is
//! read out of the freshly built image, parsed into a [`RuleSet`] and used to
//! classify probe output. The file is data: nothing in it is executed.

mod rules;

pub use rules::{RuleParseError, RuleSet};

use tracing::{debug, info};

use kata_runner::CapturedResult;

use crate::colour::Colour;
use crate::docker::ContainerCli;
use crate::error::{BuilderError, Result};

/// Path of the rules file inside a test-framework image.
pub const RAG_FILENAME: &str = "/usr/local/bin/red_amber_green.rules";

/// Output no test framework could produce; every classifier must call it amber.
const SANITY_STDOUT: &str = "ssd";
const SANITY_STDERR: &str = "sdsd";
const SANITY_STATUS: i32 = 42;

/// Classifier extracted from a specific image.
#[derive(Debug, Clone)]
pub struct RagClassifier {
    image_name: String,
    rules: RuleSet,
}

impl RagClassifier {
    /// Parse rules text attributed to `image_name`.
    pub fn from_source(image_name: &str, src: &str) -> Result<Self> {
        let rules = RuleSet::parse(src).map_err(|e| BuilderError::ClassifierExtraction {
            image_name: image_name.to_string(),
            reason: format!("cannot parse rules: {e}"),
            captured: None,
        })?;
        debug!(image_name, rules = rules.len(), "parsed classifier rules");
        Ok(Self {
            image_name: image_name.to_string(),
            rules,
        })
    }

    /// Read the rules out of `image_name`, parse them and sanity check them.
    pub async fn retrieve(cli: &dyn ContainerCli, image_name: &str) -> Result<Self> {
        info!(image_name, path = RAG_FILENAME, "extracting classifier");
        let src = cli.read_file(image_name, RAG_FILENAME).await?;
        let classifier = Self::from_source(image_name, &src)?;
        classifier.sanity_check()?;
        Ok(classifier)
    }

    pub fn image_name(&self) -> &str {
        &self.image_name
    }

    /// Classify one run's output. Pure: same input, same colour.
    pub fn classify(&self, captured: &CapturedResult) -> Colour {
        self.rules
            .classify(&captured.stdout, &captured.stderr, captured.status)
    }

    /// Nonsense output must classify as amber.
    pub fn sanity_check(&self) -> Result<()> {
        let captured = CapturedResult::new(SANITY_STDOUT, SANITY_STDERR, SANITY_STATUS);
        match self.classify(&captured) {
            Colour::Amber => Ok(()),
            other => Err(BuilderError::ClassifierExtraction {
                image_name: self.image_name.clone(),
                reason: format!("nonsense output classified as {other}, expected amber"),
                captured: Some(captured),
            }),
        }
    }
}
