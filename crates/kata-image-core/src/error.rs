//! Error taxonomy for kata image verification.
//!
//! Every variant is terminal for a run. [`BuilderError::diagnostic_lines`]
//! renders the multi-line block printed under the `FAILED` banner.

use std::path::PathBuf;

use kata_runner::{CapturedResult, RunnerError};

use crate::colour::Colour;

/// A classified output that did not match the probe's colour.
#[derive(Debug, Clone)]
pub struct VerdictMismatch {
    /// Colour the probe was built to produce.
    pub expected: Colour,

    /// Colour the image's classifier returned.
    pub actual: Colour,

    /// Output of the probe run.
    pub captured: CapturedResult,

    /// Execution model the probe ran under.
    pub model: String,

    /// Start point directory the probe was derived from.
    pub start_point_dir: PathBuf,
}

/// Kata image builder errors.
#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
    #[error("image identity for {image_name} is not registered")]
    IdentityMismatch {
        image_name: String,
        diagnostic: Vec<String>,
    },

    #[error("registry error: {0}")]
    Registry(String),

    #[error("build failed: {command} (exit status {status})")]
    BuildFailure {
        command: String,
        status: i32,
        output: String,
    },

    #[error("substitution target error: {0}")]
    SubstitutionTarget(String),

    #[error("execution error in {context}: {source}")]
    Execution {
        context: String,
        #[source]
        source: RunnerError,
    },

    #[error("classifier extraction failed for {image_name}: {reason}")]
    ClassifierExtraction {
        image_name: String,
        reason: String,
        captured: Option<CapturedResult>,
    },

    #[error("verdict mismatch: expected={}, actual={}", .0.expected, .0.actual)]
    VerdictMismatch(Box<VerdictMismatch>),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("publish failed: {0}")]
    Publish(String),

    /// The run was interrupted (Ctrl-C or SIGTERM) before it finished.
    #[error("run cancelled during {stage}")]
    Cancelled { stage: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for kata image builder operations.
pub type Result<T> = std::result::Result<T, BuilderError>;

impl BuilderError {
    /// Wrap a runner failure with what was being attempted.
    pub fn execution(context: impl Into<String>, source: RunnerError) -> Self {
        BuilderError::Execution {
            context: context.into(),
            source,
        }
    }

    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            BuilderError::IdentityMismatch { .. } => "identity_mismatch",
            BuilderError::Registry(_) => "registry",
            BuilderError::BuildFailure { .. } => "build_failure",
            BuilderError::SubstitutionTarget(_) => "substitution_target",
            BuilderError::Execution { .. } => "execution",
            BuilderError::ClassifierExtraction { .. } => "classifier_extraction",
            BuilderError::VerdictMismatch(_) => "verdict_mismatch",
            BuilderError::Config(_) => "config",
            BuilderError::Publish(_) => "publish",
            BuilderError::Cancelled { .. } => "cancelled",
            BuilderError::Io(_) => "io",
            BuilderError::Serialization(_) => "serialization",
        }
    }

    /// The lines of the diagnostic block for this failure.
    pub fn diagnostic_lines(&self) -> Vec<String> {
        match self {
            BuilderError::IdentityMismatch { diagnostic, .. } => diagnostic.clone(),
            BuilderError::BuildFailure {
                command,
                status,
                output,
            } => {
                let mut lines = vec![command.clone(), format!("exit_status == {status}")];
                if !output.is_empty() {
                    lines.push(output.clone());
                }
                lines
            }
            BuilderError::Execution { context, source } => {
                let mut lines = vec![format!("{context}: {source}")];
                if let Some(partial) = source.partial_output() {
                    lines.extend(captured_lines(partial));
                }
                lines
            }
            BuilderError::ClassifierExtraction {
                image_name,
                reason,
                captured,
            } => {
                let mut lines = vec![
                    format!("image {image_name}'s {} could not be used", crate::RAG_FILENAME),
                    reason.clone(),
                ];
                if let Some(captured) = captured {
                    lines.extend(captured_lines(captured));
                }
                lines
            }
            BuilderError::VerdictMismatch(mismatch) => {
                let mut lines = vec![
                    format!("dir == {}", mismatch.start_point_dir.display()),
                    format!("runner == {}", mismatch.model),
                    format!(
                        "expected={}, actual={}",
                        mismatch.expected, mismatch.actual
                    ),
                    format!("expected_colour == {}", mismatch.expected),
                    format!("  actual_colour == {}", mismatch.actual),
                ];
                lines.extend(captured_lines(&mismatch.captured));
                lines
            }
            other => vec![other.to_string()],
        }
    }
}

fn captured_lines(captured: &CapturedResult) -> Vec<String> {
    vec![
        format!("stdout == {}", captured.stdout),
        format!("stderr == {}", captured.stderr),
        format!("status == {}", captured.status),
    ]
}
