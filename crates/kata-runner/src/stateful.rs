//! HTTP client for the stateful runner service.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::client::StatefulRunner;
use crate::types::{CapturedResult, FileSet, KataRef};
use crate::wire::{parse_captured, run_timeout, RunnerTransport};
use crate::{Result, LIFECYCLE_TIMEOUT_SECS};

/// Stateful runner reached over HTTP.
pub struct HttpStatefulRunner {
    transport: RunnerTransport,
}

impl HttpStatefulRunner {
    /// Create a client for the runner at `base_url`
    /// (for example `http://runner:4557`).
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            transport: RunnerTransport::new(base_url)?,
        })
    }

    /// Base URL the client posts to.
    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    async fn lifecycle(&self, method: &str, args: Value) -> Result<()> {
        debug!(method, "stateful lifecycle call");
        self.transport
            .call(
                method,
                args,
                Duration::from_secs(LIFECYCLE_TIMEOUT_SECS),
                LIFECYCLE_TIMEOUT_SECS,
            )
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl StatefulRunner for HttpStatefulRunner {
    async fn kata_new(&self, kata: &KataRef) -> Result<()> {
        self.lifecycle(
            "kata_new",
            json!({ "image_name": kata.image_name, "kata_id": kata.kata_id }),
        )
        .await
    }

    async fn avatar_new(
        &self,
        kata: &KataRef,
        avatar_name: &str,
        starting_files: &FileSet,
    ) -> Result<()> {
        self.lifecycle(
            "avatar_new",
            json!({
                "image_name": kata.image_name,
                "kata_id": kata.kata_id,
                "avatar_name": avatar_name,
                "starting_files": starting_files,
            }),
        )
        .await
    }

    async fn run(
        &self,
        kata: &KataRef,
        avatar_name: &str,
        deleted_filenames: &[String],
        changed_files: &FileSet,
        max_seconds: u64,
    ) -> Result<CapturedResult> {
        info!(
            kata = %kata,
            avatar_name,
            deleted = deleted_filenames.len(),
            changed = changed_files.len(),
            "stateful run"
        );

        let args = json!({
            "image_name": kata.image_name,
            "kata_id": kata.kata_id,
            "avatar_name": avatar_name,
            "deleted_filenames": deleted_filenames,
            "changed_files": changed_files,
            "max_seconds": max_seconds,
        });
        let timeout = run_timeout(max_seconds);
        let result = self.transport.call("run", args, timeout, max_seconds).await?;

        parse_captured("run", &result, max_seconds)
    }

    async fn avatar_old(&self, kata: &KataRef, avatar_name: &str) -> Result<()> {
        self.lifecycle(
            "avatar_old",
            json!({
                "image_name": kata.image_name,
                "kata_id": kata.kata_id,
                "avatar_name": avatar_name,
            }),
        )
        .await
    }

    async fn kata_old(&self, kata: &KataRef) -> Result<()> {
        self.lifecycle(
            "kata_old",
            json!({ "image_name": kata.image_name, "kata_id": kata.kata_id }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_keeps_base_url() {
        let runner = HttpStatefulRunner::new("http://runner:4557").unwrap();
        assert_eq!(runner.base_url(), "http://runner:4557");
    }

    #[tokio::test]
    async fn test_kata_new_against_unreachable_runner_fails() {
        let runner = HttpStatefulRunner::new("http://127.0.0.1:9").unwrap();
        let kata = KataRef::new("img", "6F4F4E4759");
        assert!(runner.kata_new(&kata).await.is_err());
    }
}
