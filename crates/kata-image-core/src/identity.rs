//! Image identity validation against the registry of known images.
//!
//! The registry is a JSON document mapping a key (the image's source
//! directory name) to `{from, image_name, test_framework}`. An image is valid
//! when an entry with its `image_name` declares the same `from` and
//! `test_framework` as the local source.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::error::{BuilderError, Result};

/// The identity triple an image declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageIdentity {
    /// Base image named in the Dockerfile's `FROM`.
    pub from: String,

    /// Name the image is tagged and published under.
    pub image_name: String,

    /// Whether the image carries a test framework (and so a start point).
    #[serde(default, deserialize_with = "lenient_bool")]
    pub test_framework: bool,
}

/// Registry documents in the wild hold `true` as well as `"true"`.
fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Text(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::Text(s) => match s.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected true or false, got '{other}'"
            ))),
        },
    }
}

/// An image whose `from` is the image just built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependent {
    /// Registry key (source directory / repository name).
    pub key: String,

    /// The dependent's own image name.
    pub image_name: String,
}

/// The fetched registry of known images.
#[derive(Debug, Clone)]
pub struct Registry {
    url: String,
    entries: BTreeMap<String, ImageIdentity>,
}

impl Registry {
    /// Parse a registry document fetched from `url`.
    pub fn from_json(url: &str, json: &str) -> Result<Self> {
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)
            .map_err(|e| BuilderError::Registry(format!("cannot parse {url}: {e}")))?;

        // A malformed entry only affects its own image.
        let mut entries = BTreeMap::new();
        for (key, value) in raw {
            match serde_json::from_value::<ImageIdentity>(value) {
                Ok(entry) => {
                    entries.insert(key, entry);
                }
                Err(e) => warn!(url, key = %key, error = %e, "skipping malformed registry entry"),
            }
        }

        Ok(Self {
            url: url.to_string(),
            entries,
        })
    }

    /// Where the registry was fetched from.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry registered for `image_name`, whatever key it is stored under.
    pub fn find(&self, image_name: &str) -> Option<(&str, &ImageIdentity)> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.image_name == image_name)
            .map(|(key, entry)| (key.as_str(), entry))
    }

    /// Images built `FROM` `image_name`.
    pub fn dependents(&self, image_name: &str) -> Vec<Dependent> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.from == image_name)
            .map(|(key, entry)| Dependent {
                key: key.clone(),
                image_name: entry.image_name.clone(),
            })
            .collect()
    }
}

/// Source of the registry document.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    async fn fetch(&self) -> Result<Registry>;
}

/// Registry fetched with an HTTP `GET`.
pub struct HttpRegistry {
    url: String,
    http_client: reqwest::Client,
}

impl HttpRegistry {
    pub fn new(url: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("kata-image-builder/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BuilderError::Registry(e.to_string()))?;
        Ok(Self {
            url: url.to_string(),
            http_client,
        })
    }
}

#[async_trait]
impl RegistrySource for HttpRegistry {
    async fn fetch(&self) -> Result<Registry> {
        info!(url = %self.url, "fetching image registry");

        let response = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| BuilderError::Registry(format!("GET {}: {e}", self.url)))?;

        if !response.status().is_success() {
            return Err(BuilderError::Registry(format!(
                "GET {}: status {}",
                self.url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BuilderError::Registry(format!("GET {}: {e}", self.url)))?;
        let registry = Registry::from_json(&self.url, &body)?;
        debug!(entries = registry.len(), "registry fetched");
        Ok(registry)
    }
}

/// Outcome of checking an identity against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityCheck {
    pub valid: bool,

    /// Explanation and the entry that would make the identity valid.
    /// Empty when `valid`.
    pub diagnostic: Vec<String>,
}

impl IdentityCheck {
    /// Apply the failure policy: fatal in CI, a warning elsewhere.
    pub fn enforce(self, identity: &ImageIdentity, ci_mode: bool) -> Result<()> {
        if self.valid {
            return Ok(());
        }
        if ci_mode {
            return Err(BuilderError::IdentityMismatch {
                image_name: identity.image_name.clone(),
                diagnostic: self.diagnostic,
            });
        }
        warn!(
            image_name = %identity.image_name,
            "image identity not registered; continuing outside CI\n{}",
            self.diagnostic.join("\n")
        );
        Ok(())
    }
}

/// Check `identity` against `registry`.
pub fn validate_identity(identity: &ImageIdentity, registry: &Registry) -> IdentityCheck {
    let valid = match registry.find(&identity.image_name) {
        Some((_, entry)) => {
            entry.from == identity.from && entry.test_framework == identity.test_framework
        }
        None => false,
    };

    let diagnostic = if valid {
        Vec::new()
    } else {
        expected_entry_diagnostic(registry.url(), identity)
    };

    IdentityCheck { valid, diagnostic }
}

fn expected_entry_diagnostic(url: &str, identity: &ImageIdentity) -> Vec<String> {
    let quoted = |s: &str| format!("\"{s}\"");
    vec![
        String::new(),
        url.to_string(),
        "does not contain an entry for:".to_string(),
        String::new(),
        format!("{}: {{", quoted("...dir...")),
        format!("  {}: {},", quoted("from"), quoted(&identity.from)),
        format!("  {}: {},", quoted("image_name"), quoted(&identity.image_name)),
        format!(
            "  {}: {}",
            quoted("test_framework"),
            quoted(&identity.test_framework.to_string())
        ),
        "},".to_string(),
        String::new(),
    ]
}
