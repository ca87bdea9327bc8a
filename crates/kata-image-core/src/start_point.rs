//! The start point: the visible files a new kata begins with.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use kata_runner::FileSet;

use crate::colour::Colour;
use crate::error::{BuilderError, Result};

pub const MANIFEST_FILENAME: &str = "manifest.json";
pub const OPTIONS_FILENAME: &str = "options.json";

/// Which runner a start point asks to be run by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerChoice {
    Stateless,
    Stateful,
}

impl RunnerChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerChoice::Stateless => "stateless",
            RunnerChoice::Stateful => "stateful",
        }
    }
}

impl fmt::Display for RunnerChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunnerChoice {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "stateless" => Ok(RunnerChoice::Stateless),
            "stateful" => Ok(RunnerChoice::Stateful),
            other => Err(format!(
                "unknown runner '{other}' (expected stateless or stateful)"
            )),
        }
    }
}

/// `start_point/manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub image_name: String,
    pub visible_filenames: Vec<String>,
    #[serde(default)]
    pub runner_choice: Option<RunnerChoice>,
}

/// Explicit substitution for one colour, replacing the sentinel heuristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOverride {
    pub filename: String,
    pub from: String,
    pub to: String,
}

/// Per-colour overrides from `start_point/options.json`.
pub type ProbeOverrides = BTreeMap<Colour, ProbeOverride>;

/// A loaded start point.
#[derive(Debug, Clone)]
pub struct StartPoint {
    pub dir: PathBuf,
    pub manifest: Manifest,
    pub files: FileSet,
    pub overrides: ProbeOverrides,
}

impl StartPoint {
    /// Load the manifest, every visible file, and the optional overrides.
    pub fn load(dir: &Path) -> Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILENAME);
        let manifest: Manifest = serde_json::from_str(&read(&manifest_path)?).map_err(|e| {
            BuilderError::Config(format!("cannot parse {}: {e}", manifest_path.display()))
        })?;

        let mut files = FileSet::new();
        for filename in &manifest.visible_filenames {
            let content = read(&dir.join(filename))?;
            if files.insert(filename.clone(), content).is_some() {
                return Err(BuilderError::Config(format!(
                    "{} lists '{filename}' more than once",
                    manifest_path.display()
                )));
            }
        }

        let overrides = load_overrides(&dir.join(OPTIONS_FILENAME))?;
        debug!(
            dir = %dir.display(),
            files = files.len(),
            overrides = overrides.len(),
            "loaded start point"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            manifest,
            files,
            overrides,
        })
    }

    /// The manifest must name the image being built.
    pub fn check_image_name(&self, image_name: &str) -> Result<()> {
        if self.manifest.image_name == image_name {
            Ok(())
        } else {
            Err(BuilderError::Config(format!(
                "{} names image '{}' but the image being built is '{image_name}'",
                self.dir.join(MANIFEST_FILENAME).display(),
                self.manifest.image_name
            )))
        }
    }

    /// SHA-256 over the visible files, in filename order.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (filename, content) in &self.files {
            hasher.update(filename.as_bytes());
            hasher.update(b"\0");
            hasher.update(content.as_bytes());
            hasher.update(b"\0");
        }
        hex::encode(hasher.finalize())
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| BuilderError::Config(format!("cannot read {}: {e}", path.display())))
}

fn load_overrides(path: &Path) -> Result<ProbeOverrides> {
    if !path.exists() {
        return Ok(ProbeOverrides::new());
    }

    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(&read(path)?)
        .map_err(|e| BuilderError::Config(format!("cannot parse {}: {e}", path.display())))?;

    let mut overrides = ProbeOverrides::new();
    for (key, value) in raw {
        let colour = match key.parse::<Colour>() {
            Ok(colour) => colour,
            Err(reason) => {
                warn!(path = %path.display(), "ignoring option: {reason}");
                continue;
            }
        };
        let value: ProbeOverride = serde_json::from_value(value).map_err(|e| {
            BuilderError::Config(format!("{} option in {}: {e}", colour, path.display()))
        })?;
        overrides.insert(colour, value);
    }
    Ok(overrides)
}
