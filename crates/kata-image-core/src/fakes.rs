//! In-memory fakes for the container, registry and notifier seams (testing only)

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::docker::ContainerCli;
use crate::error::{BuilderError, Result};
use crate::identity::{Dependent, Registry, RegistrySource};
use crate::notify::Notifier;

// ---------------------------------------------------------------------------
// MemoryContainerCli
// ---------------------------------------------------------------------------

/// One call made against [`MemoryContainerCli`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerCall {
    Build { image_name: String },
    ReadFile { image_name: String, path: String },
    Login { username: String },
    Push { image_name: String },
    Logout,
}

/// Container CLI whose "images" are maps of path to content.
#[derive(Debug, Default)]
pub struct MemoryContainerCli {
    files: Mutex<BTreeMap<String, String>>,
    failing: Mutex<Vec<&'static str>>,
    calls: Mutex<Vec<ContainerCall>>,
}

impl MemoryContainerCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `content` at `path` in every image this CLI builds.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
        self
    }

    /// Make `operation` ("build", "read_file", "login", "push", "logout") fail.
    pub fn failing(self, operation: &'static str) -> Self {
        self.failing.lock().unwrap().push(operation);
        self
    }

    pub fn calls(&self) -> Vec<ContainerCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ContainerCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn fails(&self, operation: &str) -> bool {
        self.failing.lock().unwrap().iter().any(|op| *op == operation)
    }
}

#[async_trait]
impl ContainerCli for MemoryContainerCli {
    async fn build(&self, image_name: &str, context_dir: &Path) -> Result<()> {
        self.record(ContainerCall::Build {
            image_name: image_name.to_string(),
        });
        if self.fails("build") {
            return Err(BuilderError::BuildFailure {
                command: format!("docker build --tag {image_name} {}", context_dir.display()),
                status: 1,
                output: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    async fn read_file(&self, image_name: &str, path: &str) -> Result<String> {
        self.record(ContainerCall::ReadFile {
            image_name: image_name.to_string(),
            path: path.to_string(),
        });
        let missing = || BuilderError::ClassifierExtraction {
            image_name: image_name.to_string(),
            reason: format!("cat: {path}: No such file or directory"),
            captured: None,
        };
        if self.fails("read_file") {
            return Err(missing());
        }
        self.files.lock().unwrap().get(path).cloned().ok_or_else(missing)
    }

    async fn login(&self, username: &str, _password: &str) -> Result<()> {
        self.record(ContainerCall::Login {
            username: username.to_string(),
        });
        self.publish_result("login")
    }

    async fn push(&self, image_name: &str) -> Result<()> {
        self.record(ContainerCall::Push {
            image_name: image_name.to_string(),
        });
        self.publish_result("push")
    }

    async fn logout(&self) -> Result<()> {
        self.record(ContainerCall::Logout);
        self.publish_result("logout")
    }
}

impl MemoryContainerCli {
    fn publish_result(&self, operation: &str) -> Result<()> {
        if self.fails(operation) {
            Err(BuilderError::Publish(format!("{operation}: injected failure")))
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// StaticRegistry
// ---------------------------------------------------------------------------

/// Registry source serving a fixed document and counting fetches.
#[derive(Debug)]
pub struct StaticRegistry {
    url: String,
    json: String,
    unreachable: bool,
    fetches: Mutex<usize>,
}

impl StaticRegistry {
    pub fn new(url: &str, json: &str) -> Self {
        Self {
            url: url.to_string(),
            json: json.to_string(),
            unreachable: false,
            fetches: Mutex::new(0),
        }
    }

    /// Make every fetch fail as if the registry could not be reached.
    pub fn failing(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn fetches(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl RegistrySource for StaticRegistry {
    async fn fetch(&self) -> Result<Registry> {
        *self.fetches.lock().unwrap() += 1;
        if self.unreachable {
            return Err(BuilderError::Registry(format!("GET {}: unreachable", self.url)));
        }
        Registry::from_json(&self.url, &self.json)
    }
}

// ---------------------------------------------------------------------------
// RecordingNotifier
// ---------------------------------------------------------------------------

/// Notifier that remembers every `(trigger, dependent key)` it was asked for.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, built: &str, dependent: &Dependent) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((built.to_string(), dependent.key.clone()));
        Ok(())
    }
}
