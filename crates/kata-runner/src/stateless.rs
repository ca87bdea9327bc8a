//! HTTP client for the stateless runner service.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::client::StatelessRunner;
use crate::types::{CapturedResult, FileSet, KataRef};
use crate::wire::{parse_captured, run_timeout, RunnerTransport};
use crate::Result;

/// Stateless runner reached over HTTP.
pub struct HttpStatelessRunner {
    transport: RunnerTransport,
}

impl HttpStatelessRunner {
    /// Create a client for the runner at `base_url`
    /// (for example `http://runner-stateless:4597`).
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            transport: RunnerTransport::new(base_url)?,
        })
    }

    /// Base URL the client posts to.
    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }
}

#[async_trait]
impl StatelessRunner for HttpStatelessRunner {
    async fn run(
        &self,
        kata: &KataRef,
        avatar_name: &str,
        files: &FileSet,
        max_seconds: u64,
    ) -> Result<CapturedResult> {
        info!(kata = %kata, avatar_name, files = files.len(), "stateless run");

        let args = json!({
            "image_name": kata.image_name,
            "kata_id": kata.kata_id,
            "avatar_name": avatar_name,
            "visible_files": files,
            "max_seconds": max_seconds,
        });
        let timeout = run_timeout(max_seconds);
        let result = self.transport.call("run", args, timeout, max_seconds).await?;

        let captured = parse_captured("run", &result, max_seconds)?;
        debug!(status = captured.status, "stateless run returned");
        Ok(captured)
    }
}
