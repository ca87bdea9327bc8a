//! Kata Image CI - verification pipeline for kata images
//!
//! Drives a freshly built image through:
//! - identity validation against the image registry
//! - red, amber and green probes under the stateless or stateful model
//! - verdict checks with the classifier the image carries
//! - publishing and dependent notification (CI only)

pub mod config;
pub mod gate;
pub mod lifecycle;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod stage;

// Re-export key types
pub use config::{ci_from_env, Credentials, VerifyConfig};
pub use gate::RagGate;
pub use lifecycle::{as_avatar, guarded, in_kata, release_abandoned, Held, HeldResources};
pub use model::{ExecutionModel, ProbeRun, StatefulModel, StatelessModel};
pub use pipeline::{Collaborators, PipelineResult, VerificationPipeline};
pub use report::{FailureRecord, ProbeRecord, RunReport};
pub use stage::PipelineState;
