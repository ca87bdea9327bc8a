//! Verification pipeline orchestration.

use futures::future::{self, Either};
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn, Instrument};

use kata_image_core::obs::{
    emit_probe_finished, emit_run_finished, emit_stage_entered, emit_teardown_error,
};
use kata_image_core::{
    notify_dependents, run_span, validate_identity, BuilderError, ContainerCli, KataRef, Manifest,
    Notifier, ProbeBuilder, RagClassifier, Registry, RegistrySource, Result, RunnerChoice,
    SourceDir, StartPoint,
};
use kata_runner::{StatefulRunner, StatelessRunner};

use crate::config::VerifyConfig;
use crate::gate::RagGate;
use crate::lifecycle::{release_abandoned, HeldResources};
use crate::model::{ExecutionModel, ProbeRun, StatefulModel, StatelessModel};
use crate::report::{FailureRecord, ProbeRecord, RunReport};
use crate::stage::PipelineState;

/// External collaborators the pipeline drives.
#[derive(Clone)]
pub struct Collaborators {
    pub registry: Arc<dyn RegistrySource>,
    pub docker: Arc<dyn ContainerCli>,
    pub stateless: Arc<dyn StatelessRunner>,
    pub stateful: Arc<dyn StatefulRunner>,
    pub notifier: Arc<dyn Notifier>,
}

/// Outcome of a complete verification run.
#[derive(Debug)]
pub struct PipelineResult {
    pub report: RunReport,

    /// The error that aborted the run. Every kata and avatar has been
    /// released by the time it is returned.
    pub error: Option<BuilderError>,
}

impl PipelineResult {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Drives one image from validation to publishing.
pub struct VerificationPipeline {
    config: VerifyConfig,
    collaborators: Collaborators,
    report: RunReport,
    held: HeldResources,
}

impl VerificationPipeline {
    pub fn new(config: VerifyConfig, collaborators: Collaborators) -> Self {
        let report = RunReport::new(config.ci_mode);
        Self {
            config,
            collaborators,
            report,
            held: HeldResources::new(),
        }
    }

    /// Run every stage, stopping at the first failure.
    ///
    /// Never returns early with `Err`: the failure is recorded in the report
    /// and handed back in [`PipelineResult::error`].
    pub async fn run(self) -> PipelineResult {
        self.run_until(future::pending()).await
    }

    /// Like [`run`](Self::run), but gives up as soon as `shutdown` completes.
    ///
    /// The interrupted stage is dropped, the katas and avatars it still held
    /// are deleted, and the run ends with [`BuilderError::Cancelled`].
    pub async fn run_until<S>(mut self, shutdown: S) -> PipelineResult
    where
        S: Future<Output = ()>,
    {
        let start = Instant::now();
        let span = run_span(
            &self.report.run_id.to_string(),
            &self.config.src_dir.display().to_string(),
        );

        let finished = {
            let execute = pin!(self.execute().instrument(span.clone()));
            match future::select(execute, pin!(shutdown)).await {
                Either::Left((outcome, _)) => Some(outcome),
                Either::Right(((), _)) => None,
            }
        };

        let outcome = match finished {
            Some(outcome) => outcome,
            None => {
                let stage = self.report.final_state().name().to_string();
                let cleanup = async {
                    warn!(stage = %stage, held = self.held.held().len(), "run cancelled");
                    release_abandoned(self.collaborators.stateful.as_ref(), &self.held).await
                };
                cleanup.instrument(span.clone()).await;
                Err(BuilderError::Cancelled { stage })
            }
        };
        let _entered = span.enter();

        if let Err(e) = &outcome {
            self.enter(PipelineState::Aborted);
            self.report.failure = Some(FailureRecord::from(e));
            error!(kind = e.kind(), "verification failed: {e}");
        }

        self.report.finished_at = Some(chrono::Utc::now());
        self.report.duration_ms = start.elapsed().as_millis() as u64;
        emit_run_finished(
            self.report.final_state().name(),
            self.report.duration_ms,
            outcome.is_ok(),
        );

        if let Some(path) = &self.config.report_path {
            match self.report.write_json(path) {
                Ok(()) => info!(path = %path.display(), "run report written"),
                Err(e) => warn!(path = %path.display(), error = %e, "cannot write run report"),
            }
        }

        PipelineResult {
            report: self.report,
            error: outcome.err(),
        }
    }

    fn enter(&mut self, next: PipelineState) {
        let current = self.report.final_state();
        debug_assert!(
            current.can_transition_to(next),
            "illegal transition {current} -> {next}"
        );
        self.report.states.push(next);
        emit_stage_entered(next.name());
    }

    async fn execute(&mut self) -> Result<()> {
        self.enter(PipelineState::Validating);
        let source = SourceDir::new(&self.config.src_dir);
        source.check_required_files(false)?;
        let identity = source.load_identity()?;
        source.check_required_files(identity.test_framework)?;
        self.report.image_name = Some(identity.image_name.clone());

        let registry = self.collaborators.registry.fetch().await?;
        validate_identity(&identity, &registry).enforce(&identity, self.config.ci_mode)?;

        let start_point = if identity.test_framework {
            let start_point = StartPoint::load(&source.start_point_dir())?;
            start_point.check_image_name(&identity.image_name)?;
            let digest = start_point.digest();
            info!(digest = %digest, files = start_point.files.len(), "start point loaded");
            self.report.start_point_digest = Some(digest);
            Some(start_point)
        } else {
            None
        };

        self.enter(PipelineState::Building);
        self.collaborators
            .docker
            .build(&identity.image_name, &source.docker_dir())
            .await?;

        match start_point {
            Some(start_point) => {
                let classifier =
                    RagClassifier::retrieve(self.collaborators.docker.as_ref(), &identity.image_name)
                        .await?;
                self.probe(&start_point, &classifier).await?;
            }
            None => info!(
                image_name = %identity.image_name,
                "image has no test framework; probing skipped"
            ),
        }

        self.enter(PipelineState::Publishing);
        self.publish(&identity.image_name, &registry).await
    }

    fn choose_model(&self, manifest: &Manifest) -> RunnerChoice {
        match (self.config.runner_override, manifest.runner_choice) {
            (Some(chosen), Some(declared)) if chosen != declared => {
                info!(
                    runner = %chosen,
                    runner_choice = %declared,
                    "runner override replaces the manifest's runner_choice"
                );
                chosen
            }
            (Some(chosen), _) => chosen,
            (None, Some(declared)) => declared,
            (None, None) => {
                info!("manifest has no runner_choice; using stateless");
                RunnerChoice::Stateless
            }
        }
    }

    async fn probe(&mut self, start_point: &StartPoint, classifier: &RagClassifier) -> Result<()> {
        let choice = self.choose_model(&start_point.manifest);
        self.enter(PipelineState::probing(choice));

        let probes = ProbeBuilder::new(&start_point.files, &start_point.overrides).build_all()?;
        let model: Box<dyn ExecutionModel> = match choice {
            RunnerChoice::Stateless => {
                Box::new(StatelessModel::new(self.collaborators.stateless.clone()))
            }
            RunnerChoice::Stateful => {
                Box::new(StatefulModel::new(
                    self.collaborators.stateful.clone(),
                    self.held.clone(),
                ))
            }
        };
        let model_name = model.name();
        self.report.model = Some(model_name.to_string());

        let gate = RagGate::new(classifier, model_name, &start_point.dir);
        let kata = KataRef::new(
            start_point.manifest.image_name.clone(),
            self.config.kata_id.clone(),
        );
        info!(kata = %kata, model = model_name, "probing image");

        let mut records = Vec::new();
        let mut verify = |probe: &kata_image_core::Probe, run: ProbeRun| -> Result<()> {
            gate.evaluate(probe.colour, &run.captured)?;
            emit_probe_finished(probe.colour, model_name, run.captured.status, run.duration_ms);
            records.push(ProbeRecord {
                colour: probe.colour,
                model: model_name.to_string(),
                avatar_name: run.avatar_name,
                edited_filename: probe.edited_filename().map(str::to_string),
                status: run.captured.status,
                duration_ms: run.duration_ms,
            });
            Ok(())
        };

        let outcome = model
            .run_probes(
                &kata,
                &start_point.files,
                &probes,
                self.config.max_seconds,
                &mut verify,
            )
            .await;
        self.report.probes.extend(records);
        outcome
    }

    async fn publish(&mut self, image_name: &str, registry: &Registry) -> Result<()> {
        let dependents = registry.dependents(image_name);

        if !self.config.ci_mode {
            info!(
                image_name,
                dependents = dependents.len(),
                "not running in CI; push and notifications skipped"
            );
            return Ok(());
        }

        let docker = self.collaborators.docker.clone();
        let logged_in = match &self.config.credentials {
            Some(credentials) => {
                docker
                    .login(&credentials.username, &credentials.password)
                    .await?;
                true
            }
            None => {
                warn!("no registry credentials configured; pushing with the existing login");
                false
            }
        };

        let pushed = docker.push(image_name).await;
        if logged_in {
            if let Err(e) = docker.logout().await {
                emit_teardown_error("registry login", &e);
            }
        }
        pushed?;
        self.report.published = true;
        info!(image_name, "image published");

        self.report.dependents_notified = notify_dependents(
            self.collaborators.notifier.as_ref(),
            image_name,
            &dependents,
        )
        .await;
        Ok(())
    }
}
