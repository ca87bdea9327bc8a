//! Kata Image Core
//!
//! Domain logic for verifying a freshly built kata image before it is
//! published: the image's declared identity, its start point, the probes
//! derived from it, and the red/amber/green classifier the image carries.

pub mod classifier;
pub mod colour;
pub mod docker;
pub mod error;
pub mod fakes;
pub mod identity;
pub mod notify;
pub mod obs;
pub mod probe;
pub mod source;
pub mod start_point;

pub use classifier::{RagClassifier, RuleParseError, RuleSet, RAG_FILENAME};
pub use colour::Colour;
pub use docker::{ContainerCli, DockerCli};
pub use error::{BuilderError, Result, VerdictMismatch};
pub use identity::{
    validate_identity, Dependent, HttpRegistry, IdentityCheck, ImageIdentity, Registry,
    RegistrySource,
};
pub use notify::{notify_dependents, HttpNotifier, LogNotifier, Notifier};
pub use obs::run_span;
pub use probe::{Probe, ProbeBuilder, AMBER_REPLACEMENT, GREEN_REPLACEMENT, SENTINEL};
pub use source::SourceDir;
pub use start_point::{Manifest, ProbeOverride, ProbeOverrides, RunnerChoice, StartPoint};

pub use kata_runner::{CapturedResult, FileSet, KataRef};

/// Kata image builder version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
