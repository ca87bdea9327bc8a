//! Pipeline states and their legal transitions.

use serde::{Deserialize, Serialize};
use std::fmt;

use kata_image_core::RunnerChoice;

/// Where a verification run is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,

    /// Required files, identity against the registry, start point.
    Validating,

    /// External image build and classifier extraction.
    Building,

    StatelessProbing,
    StatefulProbing,

    /// Terminal on success: every probe matched.
    Publishing,

    /// Terminal on failure.
    Aborted,
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Validating => "validating",
            PipelineState::Building => "building",
            PipelineState::StatelessProbing => "stateless_probing",
            PipelineState::StatefulProbing => "stateful_probing",
            PipelineState::Publishing => "publishing",
            PipelineState::Aborted => "aborted",
        }
    }

    /// Probing state for an execution model.
    pub fn probing(choice: RunnerChoice) -> Self {
        match choice {
            RunnerChoice::Stateless => PipelineState::StatelessProbing,
            RunnerChoice::Stateful => PipelineState::StatefulProbing,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Publishing | PipelineState::Aborted)
    }

    /// Whether `next` may follow `self`.
    ///
    /// Building goes straight to Publishing for images without a test
    /// framework. Publishing may still abort if the push fails.
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Idle, Validating) => true,
            (Validating, Building) => true,
            (Building, StatelessProbing | StatefulProbing | Publishing) => true,
            (StatelessProbing | StatefulProbing, Publishing) => true,
            (Publishing, Aborted) => true,
            (Aborted, _) => false,
            (_, Aborted) => !matches!(self, Idle),
            _ => false,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
