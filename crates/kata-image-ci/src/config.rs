//! Run configuration, assembled by the CLI from flags and environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use kata_image_core::RunnerChoice;

/// Registry of known images consulted before anything is built.
pub const DEFAULT_REGISTRY_URL: &str =
    "https://raw.githubusercontent.com/cyber-dojo-languages/images_info/master/images_info.json";

pub const DEFAULT_STATELESS_RUNNER_URL: &str = "http://runner-stateless:4597";
pub const DEFAULT_STATEFUL_RUNNER_URL: &str = "http://runner:4557";

/// Kata the probes run in.
pub const DEFAULT_KATA_ID: &str = "6F4F4E4759";

pub const DEFAULT_MAX_SECONDS: u64 = 10;

/// Registry login for publishing.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything one verification run needs to know.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Image source root holding `docker/` and `start_point/`.
    pub src_dir: PathBuf,

    /// Identity mismatches are fatal and the image is published.
    pub ci_mode: bool,

    pub registry_url: String,
    pub stateless_runner_url: String,
    pub stateful_runner_url: String,

    /// Takes precedence over the manifest's `runner_choice`.
    pub runner_override: Option<RunnerChoice>,

    /// Time budget per probe run.
    pub max_seconds: u64,

    pub kata_id: String,
    pub credentials: Option<Credentials>,

    /// Webhook for dependent notifications; log only when absent.
    pub notify_url: Option<String>,

    /// Where to write the JSON run report.
    pub report_path: Option<PathBuf>,
}

impl VerifyConfig {
    pub fn new(src_dir: impl Into<PathBuf>) -> Self {
        Self {
            src_dir: src_dir.into(),
            ci_mode: false,
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            stateless_runner_url: DEFAULT_STATELESS_RUNNER_URL.to_string(),
            stateful_runner_url: DEFAULT_STATEFUL_RUNNER_URL.to_string(),
            runner_override: None,
            max_seconds: DEFAULT_MAX_SECONDS,
            kata_id: DEFAULT_KATA_ID.to_string(),
            credentials: None,
            notify_url: None,
            report_path: None,
        }
    }

    pub fn with_ci_mode(mut self, ci_mode: bool) -> Self {
        self.ci_mode = ci_mode;
        self
    }

    pub fn with_runner_override(mut self, choice: RunnerChoice) -> Self {
        self.runner_override = Some(choice);
        self
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        });
        self
    }
}

/// CI detection from the process environment (`TRAVIS=true` or `CI=true`).
pub fn ci_from_env() -> bool {
    ci_flag(
        std::env::var("TRAVIS").ok().as_deref(),
        std::env::var("CI").ok().as_deref(),
    )
}

fn ci_flag(travis: Option<&str>, ci: Option<&str>) -> bool {
    [travis, ci]
        .into_iter()
        .flatten()
        .any(|value| value.eq_ignore_ascii_case("true"))
}
