//! Container tooling: build, read a file out of an image, publish.

use async_trait::async_trait;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{BuilderError, Result};

/// The container operations the pipeline needs.
#[async_trait]
pub trait ContainerCli: Send + Sync {
    /// Build `context_dir` and tag the result `image_name`.
    async fn build(&self, image_name: &str, context_dir: &Path) -> Result<()>;

    /// Contents of `path` inside a throwaway container of `image_name`.
    async fn read_file(&self, image_name: &str, path: &str) -> Result<String>;

    async fn login(&self, username: &str, password: &str) -> Result<()>;

    async fn push(&self, image_name: &str) -> Result<()>;

    async fn logout(&self) -> Result<()>;
}

/// [`ContainerCli`] backed by the `docker` executable.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self::with_program("docker")
    }

    /// Use a different executable with the same command line.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command_line(&self, args: &[&str]) -> String {
        std::iter::once(self.program.as_str())
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn exec(&self, args: &[&str], stdin: Option<&str>) -> Result<Output> {
        let start = Instant::now();
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            // A child that exits without reading its input is judged by its status.
            if let Err(e) = pipe.write_all(input.as_bytes()).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
            drop(pipe);
        }

        let output = child.wait_with_output().await?;
        debug!(
            command = %self.command_line(args),
            status = output.status.code().unwrap_or(-1),
            duration_ms = start.elapsed().as_millis() as u64,
            "container command finished"
        );
        Ok(output)
    }

    async fn publish_step(&self, args: &[&str], stdin: Option<&str>) -> Result<()> {
        let output = self
            .exec(args, stdin)
            .await
            .map_err(|e| BuilderError::Publish(format!("{}: {e}", self.command_line(args))))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(BuilderError::Publish(format!(
                "{} exited with {}: {}",
                self.command_line(args),
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

#[async_trait]
impl ContainerCli for DockerCli {
    async fn build(&self, image_name: &str, context_dir: &Path) -> Result<()> {
        let context = context_dir.display().to_string();
        let args = ["build", "--tag", image_name, context.as_str()];
        info!(image_name, context = %context, "building image");

        let output = self.exec(&args, None).await?;
        if output.status.success() {
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(BuilderError::BuildFailure {
            command: self.command_line(&args),
            status: output.status.code().unwrap_or(-1),
            output: combined.trim_end().to_string(),
        })
    }

    async fn read_file(&self, image_name: &str, path: &str) -> Result<String> {
        let args = ["run", "--rm", image_name, "cat", path];
        let extraction_error = |reason: String| BuilderError::ClassifierExtraction {
            image_name: image_name.to_string(),
            reason,
            captured: None,
        };

        let output = self
            .exec(&args, None)
            .await
            .map_err(|e| extraction_error(format!("{}: {e}", self.command_line(&args))))?;
        if !output.status.success() {
            return Err(extraction_error(format!(
                "{} exited with {}: {}",
                self.command_line(&args),
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| extraction_error(format!("{path} is not UTF-8: {e}")))
    }

    async fn login(&self, username: &str, password: &str) -> Result<()> {
        info!(username, "registry login");
        self.publish_step(
            &["login", "--username", username, "--password-stdin"],
            Some(password),
        )
        .await
    }

    async fn push(&self, image_name: &str) -> Result<()> {
        info!(image_name, "pushing image");
        self.publish_step(&["push", image_name], None).await
    }

    async fn logout(&self) -> Result<()> {
        self.publish_step(&["logout"], None).await
    }
}
