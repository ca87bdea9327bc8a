//! JSON record of one verification run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use kata_image_core::{BuilderError, Colour, Result};

use crate::stage::PipelineState;

/// A probe whose verdict matched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProbeRecord {
    pub colour: Colour,
    pub model: String,
    pub avatar_name: String,

    /// File the probe edited; `None` for red.
    pub edited_filename: Option<String>,

    pub status: i32,
    pub duration_ms: u64,
}

/// Why a run aborted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureRecord {
    pub kind: String,
    pub message: String,
    pub diagnostic: Vec<String>,
}

impl From<&BuilderError> for FailureRecord {
    fn from(err: &BuilderError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            diagnostic: err.diagnostic_lines(),
        }
    }
}

/// Everything worth keeping about a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub version: String,
    pub image_name: Option<String>,
    pub ci_mode: bool,

    /// Digest of the start point's visible files.
    pub start_point_digest: Option<String>,

    pub model: Option<String>,
    pub probes: Vec<ProbeRecord>,

    /// Every state entered, in order.
    pub states: Vec<PipelineState>,

    pub published: bool,
    pub dependents_notified: usize,
    pub failure: Option<FailureRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn new(ci_mode: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            version: kata_image_core::VERSION.to_string(),
            image_name: None,
            ci_mode,
            start_point_digest: None,
            model: None,
            probes: Vec::new(),
            states: vec![PipelineState::Idle],
            published: false,
            dependents_notified: 0,
            failure: None,
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: 0,
        }
    }

    /// The last state entered.
    pub fn final_state(&self) -> PipelineState {
        self.states.last().copied().unwrap_or(PipelineState::Idle)
    }

    pub fn success(&self) -> bool {
        self.final_state() == PipelineState::Publishing && self.failure.is_none()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}
