//! Kata-Runner: clients for the sandbox runner services
//!
//! A built kata image is exercised by submitting source files to a runner
//! service and reading back what the program printed. Two execution models
//! exist:
//!
//! - **Stateless**: one self-contained `run` call per execution.
//! - **Stateful**: an explicit kata (session) and avatar (actor) lifecycle,
//!   where each `run` submits only a diff against the avatar's files.
//!
//! This crate defines both contracts as async traits, HTTP implementations
//! for the runner services, and in-memory fakes for tests.

pub mod client;
pub mod error;
pub mod fakes;
pub mod stateful;
pub mod stateless;
pub mod types;
mod wire;

pub use client::{StatefulRunner, StatelessRunner};
pub use error::RunnerError;
pub use stateful::HttpStatefulRunner;
pub use stateless::HttpStatelessRunner;
pub use types::{CapturedResult, FileSet, KataRef};

/// Result type for runner operations
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Seconds added on top of a run's own time budget before the HTTP call is
/// abandoned. The runner enforces `max_seconds` itself; this only covers a
/// runner that never answers.
pub const RESPONSE_GRACE_SECS: u64 = 5;

/// Timeout for lifecycle calls (kata_new, avatar_new, avatar_old, kata_old).
pub const LIFECYCLE_TIMEOUT_SECS: u64 = 30;
