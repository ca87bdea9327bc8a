//! Runner contracts for the two execution models.
//!
//! Both traits are async and backend-agnostic. HTTP implementations live in
//! [`crate::stateless`] and [`crate::stateful`]; in-memory fakes in
//! [`crate::fakes`]. Neither contract retries internally.

use async_trait::async_trait;

use crate::types::{CapturedResult, FileSet, KataRef};
use crate::Result;

/// One-shot execution: every call is self-contained.
#[async_trait]
pub trait StatelessRunner: Send + Sync {
    /// Run `files` inside `kata.image_name` and capture the output.
    ///
    /// Fails with [`crate::RunnerError::TimedOut`] when `max_seconds` is
    /// exceeded.
    async fn run(
        &self,
        kata: &KataRef,
        avatar_name: &str,
        files: &FileSet,
        max_seconds: u64,
    ) -> Result<CapturedResult>;
}

/// Session-based execution with an explicit kata/avatar lifecycle.
///
/// Callers must pair every `kata_new` with `kata_old` and every `avatar_new`
/// with `avatar_old`, and must retire all avatars before their kata.
#[async_trait]
pub trait StatefulRunner: Send + Sync {
    /// Create the kata. Precedes any avatar call for it.
    async fn kata_new(&self, kata: &KataRef) -> Result<()>;

    /// Create an avatar whose file baseline is `starting_files`.
    async fn avatar_new(
        &self,
        kata: &KataRef,
        avatar_name: &str,
        starting_files: &FileSet,
    ) -> Result<()>;

    /// Apply a diff to the avatar's files and run them.
    ///
    /// The avatar's files afterwards are its previous files minus
    /// `deleted_filenames`, plus `changed_files`.
    async fn run(
        &self,
        kata: &KataRef,
        avatar_name: &str,
        deleted_filenames: &[String],
        changed_files: &FileSet,
        max_seconds: u64,
    ) -> Result<CapturedResult>;

    /// Release the avatar.
    async fn avatar_old(&self, kata: &KataRef, avatar_name: &str) -> Result<()>;

    /// Release the kata.
    async fn kata_old(&self, kata: &KataRef) -> Result<()>;
}
