//! Probe construction: the files submitted to make the image go red, amber
//! and green.
//!
//! Red is the start point unchanged. Amber and green edit one file: either
//! the one named by an explicit [`ProbeOverride`], or the single file holding
//! the [`SENTINEL`] expression, which is broken for amber and corrected for
//! green. The sentinel reads the same in most guest languages, so no
//! per-language code is needed; start points that cannot contain it use an
//! override instead.

use tracing::debug;

use kata_runner::FileSet;

use crate::colour::Colour;
use crate::error::{BuilderError, Result};
use crate::start_point::{ProbeOverride, ProbeOverrides};

/// Expression every default start point contains (and gets wrong).
pub const SENTINEL: &str = "6 * 9";

/// Amber replacement: no longer compiles/parses.
pub const AMBER_REPLACEMENT: &str = "6 * 9sdsd";

/// Green replacement: the correct answer.
pub const GREEN_REPLACEMENT: &str = "6 * 7";

/// Files to submit for one colour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub colour: Colour,

    /// Complete file set, for the stateless model.
    pub files: FileSet,

    /// Only the edited file, for the stateful model's diff. Empty for red.
    pub changed_files: FileSet,
}

impl Probe {
    /// The file this probe edits, if any.
    pub fn edited_filename(&self) -> Option<&str> {
        self.changed_files.keys().next().map(String::as_str)
    }
}

/// Derives probes from a start point's files.
pub struct ProbeBuilder<'a> {
    base: &'a FileSet,
    overrides: &'a ProbeOverrides,
}

impl<'a> ProbeBuilder<'a> {
    pub fn new(base: &'a FileSet, overrides: &'a ProbeOverrides) -> Self {
        Self { base, overrides }
    }

    /// Build the probe for `colour`. The base files are never modified.
    pub fn build(&self, colour: Colour) -> Result<Probe> {
        let default_to = match colour {
            Colour::Red => {
                return Ok(Probe {
                    colour,
                    files: self.base.clone(),
                    changed_files: FileSet::new(),
                })
            }
            Colour::Amber => AMBER_REPLACEMENT,
            Colour::Green => GREEN_REPLACEMENT,
        };

        let (filename, content) = self.edited_file(colour, default_to)?;
        debug!(colour = %colour, filename = %filename, "built probe");

        let mut files = self.base.clone();
        files.insert(filename.clone(), content.clone());
        let changed_files = FileSet::from([(filename, content)]);

        Ok(Probe {
            colour,
            files,
            changed_files,
        })
    }

    /// Probes for every colour, in run order.
    pub fn build_all(&self) -> Result<Vec<Probe>> {
        Colour::ALL.iter().map(|&c| self.build(c)).collect()
    }

    fn edited_file(&self, colour: Colour, default_to: &str) -> Result<(String, String)> {
        if let Some(ProbeOverride { filename, from, to }) = self.overrides.get(&colour) {
            let content = self.base.get(filename).ok_or_else(|| {
                BuilderError::SubstitutionTarget(format!(
                    "{colour} option names '{filename}', which is not a visible file"
                ))
            })?;
            if !content.contains(from.as_str()) {
                return Err(BuilderError::SubstitutionTarget(format!(
                    "{colour} option: '{filename}' does not contain '{from}'"
                )));
            }
            return Ok((filename.clone(), content.replacen(from.as_str(), to, 1)));
        }

        let filename = self.sentinel_filename()?;
        let content = &self.base[filename];
        Ok((filename.to_string(), content.replacen(SENTINEL, default_to, 1)))
    }

    /// The one visible file containing the sentinel.
    fn sentinel_filename(&self) -> Result<&'a str> {
        let matches: Vec<&'a str> = self
            .base
            .iter()
            .filter(|(_, content)| content.contains(SENTINEL))
            .map(|(filename, _)| filename.as_str())
            .collect();

        match matches.as_slice() {
            [only] => Ok(*only),
            [] => Err(BuilderError::SubstitutionTarget(format!(
                "no '{SENTINEL}' file found"
            ))),
            many => Err(BuilderError::SubstitutionTarget(format!(
                "multiple '{SENTINEL}' files {many:?}"
            ))),
        }
    }
}
