//! Value types shared by both execution models.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Visible files of a kata, filename → content.
///
/// A `BTreeMap` keeps filenames unique and gives a stable iteration order,
/// which keeps request bodies and content digests deterministic.
pub type FileSet = BTreeMap<String, String>;

/// What one execution printed, and how it exited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedResult {
    /// Captured standard output.
    pub stdout: String,

    /// Captured standard error.
    pub stderr: String,

    /// Exit status of the program under test.
    pub status: i32,
}

impl CapturedResult {
    /// Create a captured result.
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, status: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            status,
        }
    }
}

/// Identity of a kata (session) on a runner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KataRef {
    /// Image the kata's avatars run inside.
    pub image_name: String,

    /// Kata identifier, unique per runner.
    pub kata_id: String,
}

impl KataRef {
    /// Create a kata reference.
    pub fn new(image_name: impl Into<String>, kata_id: impl Into<String>) -> Self {
        Self {
            image_name: image_name.into(),
            kata_id: kata_id.into(),
        }
    }
}

impl std::fmt::Display for KataRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.kata_id, self.image_name)
    }
}
