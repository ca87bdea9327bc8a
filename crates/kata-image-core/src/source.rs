//! The image's source directory and the identity it declares.
//!
//! Layout:
//!
//! ```text
//! <src>/docker/Dockerfile          FROM line names the base image
//! <src>/docker/image_name.json     {"image_name": ..., "test_framework": ...}
//! <src>/start_point/manifest.json  only for test-framework images
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{BuilderError, Result};
use crate::identity::ImageIdentity;
use crate::start_point::MANIFEST_FILENAME;

/// Root of an image's source tree.
#[derive(Debug, Clone)]
pub struct SourceDir {
    root: PathBuf,
}

#[derive(Deserialize)]
struct ImageNameFile {
    image_name: String,
    #[serde(default)]
    test_framework: bool,
}

impl SourceDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build context handed to the container build.
    pub fn docker_dir(&self) -> PathBuf {
        self.root.join("docker")
    }

    pub fn start_point_dir(&self) -> PathBuf {
        self.root.join("start_point")
    }

    fn dockerfile(&self) -> PathBuf {
        self.docker_dir().join("Dockerfile")
    }

    fn image_name_file(&self) -> PathBuf {
        self.docker_dir().join("image_name.json")
    }

    /// Fail with a `Config` error listing every required file that is missing.
    ///
    /// Start point files are only required for test-framework images.
    pub fn check_required_files(&self, test_framework: bool) -> Result<()> {
        let mut required = vec![self.dockerfile(), self.image_name_file()];
        if test_framework {
            required.push(self.start_point_dir().join(MANIFEST_FILENAME));
        }

        let missing: Vec<String> = required
            .iter()
            .filter(|path| !path.is_file())
            .map(|path| path.display().to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(BuilderError::Config(format!(
                "missing required file(s): {}",
                missing.join(", ")
            )))
        }
    }

    /// Read the identity the source declares.
    pub fn load_identity(&self) -> Result<ImageIdentity> {
        let path = self.image_name_file();
        let text = std::fs::read_to_string(&path)
            .map_err(|e| BuilderError::Config(format!("cannot read {}: {e}", path.display())))?;
        let declared: ImageNameFile = serde_json::from_str(&text)
            .map_err(|e| BuilderError::Config(format!("cannot parse {}: {e}", path.display())))?;

        let dockerfile = self.dockerfile();
        let dockerfile_text = std::fs::read_to_string(&dockerfile).map_err(|e| {
            BuilderError::Config(format!("cannot read {}: {e}", dockerfile.display()))
        })?;
        let from = parse_from_line(&dockerfile_text).ok_or_else(|| {
            BuilderError::Config(format!("no FROM line in {}", dockerfile.display()))
        })?;

        let identity = ImageIdentity {
            from,
            image_name: declared.image_name,
            test_framework: declared.test_framework,
        };
        debug!(?identity, "loaded local identity");
        Ok(identity)
    }
}

/// Base image of the first `FROM` instruction, skipping `--flag=value` options.
fn parse_from_line(dockerfile: &str) -> Option<String> {
    dockerfile
        .lines()
        .map(str::trim)
        .find(|line| {
            line.split_whitespace()
                .next()
                .is_some_and(|word| word.eq_ignore_ascii_case("FROM"))
        })
        .and_then(|line| {
            line.split_whitespace()
                .skip(1)
                .find(|word| !word.starts_with("--"))
                .map(str::to_string)
        })
}
