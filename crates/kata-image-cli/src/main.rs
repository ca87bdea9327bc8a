//! Kata Image Builder CLI
//!
//! `kata-image-builder` builds a kata image from its source directory and
//! verifies it before publishing:
//!
//! - the image's identity must be registered
//! - its start point must go red, amber and green as the image's own
//!   classifier sees it, under the stateless or stateful runner
//! - in CI the verified image is pushed and dependent images are notified

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use kata_image_ci::config::{
    DEFAULT_KATA_ID, DEFAULT_MAX_SECONDS, DEFAULT_REGISTRY_URL, DEFAULT_STATEFUL_RUNNER_URL,
    DEFAULT_STATELESS_RUNNER_URL,
};
use kata_image_ci::{
    ci_from_env, Collaborators, Credentials, PipelineResult, VerificationPipeline, VerifyConfig,
};
use kata_image_core::{BuilderError, DockerCli, HttpNotifier, HttpRegistry, LogNotifier, Notifier, RunnerChoice};
use kata_runner::{HttpStatefulRunner, HttpStatelessRunner};

#[derive(Parser)]
#[command(name = "kata-image-builder")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build and verify a kata image before publishing it", long_about = None)]
struct Cli {
    /// Image source directory (holds docker/ and start_point/)
    #[arg(long, env = "SRC_DIR", default_value = ".")]
    src_dir: PathBuf,

    /// Run in CI mode: identity mismatches are fatal and the image is pushed.
    /// Also on when TRAVIS=true or CI=true.
    #[arg(long)]
    ci: bool,

    /// Registry of known images
    #[arg(long, env = "KIB_REGISTRY_URL", default_value = DEFAULT_REGISTRY_URL)]
    registry_url: String,

    /// Base URL of the stateless runner service
    #[arg(long, env = "KIB_STATELESS_RUNNER_URL", default_value = DEFAULT_STATELESS_RUNNER_URL)]
    stateless_runner_url: String,

    /// Base URL of the stateful runner service
    #[arg(long, env = "KIB_STATEFUL_RUNNER_URL", default_value = DEFAULT_STATEFUL_RUNNER_URL)]
    stateful_runner_url: String,

    /// Force an execution model instead of the manifest's runner_choice
    #[arg(long, value_parser = parse_runner)]
    runner: Option<RunnerChoice>,

    /// Time budget per probe, in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_SECONDS,
        value_parser = clap::value_parser!(u64).range(1..=3600)
    )]
    max_seconds: u64,

    /// Webhook notified once per dependent image (log only when absent)
    #[arg(long, env = "KIB_NOTIFY_URL")]
    notify_url: Option<String>,

    /// Registry login used for the push
    #[arg(long, env = "DOCKER_USERNAME")]
    docker_username: Option<String>,

    #[arg(long, env = "DOCKER_PASSWORD", hide_env_values = true)]
    docker_password: Option<String>,

    /// Write a JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

/// Builder crates log at `info` (or `debug` with `--verbose`); dependencies
/// only warn. `RUST_LOG` replaces the whole filter.
fn default_filter(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    ["kata_image_builder", "kata_image_ci", "kata_image_core", "kata_runner"]
        .iter()
        .fold("warn".to_string(), |filter, krate| {
            format!("{filter},{krate}={level}")
        })
}

/// Logs go to stderr so that stdout carries only the run summary.
fn init_tracing(json: bool, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    // Only the first subscriber installed in a process takes effect.
    let _ = if json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
}

fn parse_runner(s: &str) -> std::result::Result<RunnerChoice, String> {
    s.parse()
}

impl Cli {
    fn into_config(self) -> VerifyConfig {
        let credentials = match (self.docker_username, self.docker_password) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            _ => None,
        };

        VerifyConfig {
            src_dir: self.src_dir,
            ci_mode: self.ci || ci_from_env(),
            registry_url: self.registry_url,
            stateless_runner_url: self.stateless_runner_url,
            stateful_runner_url: self.stateful_runner_url,
            runner_override: self.runner,
            max_seconds: self.max_seconds,
            kata_id: DEFAULT_KATA_ID.to_string(),
            credentials,
            notify_url: self.notify_url,
            report_path: self.report,
        }
    }
}

fn collaborators(config: &VerifyConfig) -> Result<Collaborators> {
    let notifier: Arc<dyn Notifier> = match &config.notify_url {
        Some(url) => Arc::new(HttpNotifier::new(url).context("Failed to create notifier")?),
        None => Arc::new(LogNotifier),
    };

    Ok(Collaborators {
        registry: Arc::new(
            HttpRegistry::new(&config.registry_url).context("Failed to create registry client")?,
        ),
        docker: Arc::new(DockerCli::new()),
        stateless: Arc::new(
            HttpStatelessRunner::new(&config.stateless_runner_url)
                .context("Failed to create stateless runner client")?,
        ),
        stateful: Arc::new(
            HttpStatefulRunner::new(&config.stateful_runner_url)
                .context("Failed to create stateful runner client")?,
        ),
        notifier,
    })
}

fn print_summary(config: &VerifyConfig, result: &PipelineResult) {
    let report = &result.report;
    println!("Run ID: {}", report.run_id);
    println!("Source: {}", config.src_dir.display());
    if let Some(image_name) = &report.image_name {
        println!("Image: {image_name}");
    }
    if let Some(model) = &report.model {
        println!("Runner: {model}");
    }
    println!("CI mode: {}", config.ci_mode);
    println!();

    for probe in &report.probes {
        println!("{}: OK (~{} ms)", probe.colour, probe.duration_ms);
    }

    if result.success() {
        println!();
        println!("State: {}", report.final_state());
        if report.published {
            println!("Published; {} dependent(s) notified", report.dependents_notified);
        }
        println!("Duration: {}ms", report.duration_ms);
    }
}

fn print_failure(result: &PipelineResult) {
    if let Some(err) = &result.error {
        eprintln!();
        eprintln!("FAILED");
        eprintln!("{err}");
        for line in err.diagnostic_lines() {
            eprintln!("{line}");
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix. A signal that cannot be listened
/// for never fires.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => warn!("received Ctrl-C; releasing held katas and avatars"),
        _ = terminate => warn!("received SIGTERM; releasing held katas and avatars"),
    }
}

/// 128 + SIGINT, as shells report an interrupted command.
const EXIT_CANCELLED: u8 = 130;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_tracing(cli.json, cli.verbose);

    let config = cli.into_config();
    let collaborators = collaborators(&config)?;

    let result = VerificationPipeline::new(config.clone(), collaborators)
        .run_until(shutdown_signal())
        .await;

    print_summary(&config, &result);
    match &result.error {
        None => Ok(ExitCode::SUCCESS),
        Some(BuilderError::Cancelled { .. }) => {
            print_failure(&result);
            Ok(ExitCode::from(EXIT_CANCELLED))
        }
        Some(_) => {
            print_failure(&result);
            Ok(ExitCode::FAILURE)
        }
    }
}
