//! Integration tests for the verification pipeline with in-memory collaborators.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use kata_image_ci::{Collaborators, PipelineState, VerificationPipeline, VerifyConfig};
use kata_image_core::fakes::{ContainerCall, MemoryContainerCli, RecordingNotifier, StaticRegistry};
use kata_image_core::{BuilderError, CapturedResult, Colour, RunnerChoice, RAG_FILENAME};
use kata_runner::fakes::{
    responder, FakeStatefulRunner, FakeStatelessRunner, LifecycleCall, Responder,
};
use kata_runner::{FileSet, KataRef, StatefulRunner};

const REGISTRY_URL: &str = "https://example.org/images_info.json";

const REGISTRY: &str = r#"{
    "lang":      {"from": "base:1.0", "image_name": "lang:1.0", "test_framework": true},
    "lang-kata": {"from": "lang:1.0", "image_name": "lang-kata:1.0", "test_framework": true},
    "other":     {"from": "base:1.0", "image_name": "other:1.0", "test_framework": false}
}"#;

const RULES: &str = r#"
# lang test runner
red   if stdout =~ /^expected 42, got \d+$/
green if status == 0 and stdout =~ /All tests passed/
default amber
"#;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Image source for `lang:1.0` with a one-sentinel start point.
fn lang_source(runner_choice: Option<&str>) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "docker/Dockerfile", "FROM base:1.0\nCOPY . /usr/local/bin\n");
    write(
        root,
        "docker/image_name.json",
        r#"{"image_name": "lang:1.0", "test_framework": true}"#,
    );

    let choice = runner_choice
        .map(|c| format!(r#", "runner_choice": "{c}""#))
        .unwrap_or_default();
    write(
        root,
        "start_point/manifest.json",
        &format!(
            r#"{{"image_name": "lang:1.0", "visible_filenames": ["solution.ext", "test.ext", "cyber-dojo.sh"]{choice}}}"#
        ),
    );
    write(root, "start_point/solution.ext", "answer() = 6 * 9\n");
    write(root, "start_point/test.ext", "assert answer() == 42\n");
    write(root, "start_point/cyber-dojo.sh", "lang test.ext\n");
    dir
}

/// Behaves like the `lang` toolchain: the edited solution decides the output.
fn lang_toolchain() -> Responder {
    responder(|files| {
        let solution = &files["solution.ext"];
        Ok(if solution.contains("6 * 9sdsd") {
            CapturedResult::new("", "solution.ext:1: unknown name 'sdsd'", 2)
        } else if solution.contains("6 * 9") {
            CapturedResult::new("expected 42, got 54", "", 1)
        } else {
            CapturedResult::new("All tests passed", "", 0)
        })
    })
}

/// A broken toolchain that reports success for code that cannot compile.
fn lenient_toolchain() -> Responder {
    responder(|files| {
        let solution = &files["solution.ext"];
        Ok(if solution.contains("6 * 9") && !solution.contains("sdsd") {
            CapturedResult::new("expected 42, got 54", "", 1)
        } else {
            CapturedResult::new("All tests passed", "", 0)
        })
    })
}

struct Harness {
    registry: Arc<StaticRegistry>,
    docker: Arc<MemoryContainerCli>,
    stateless: Arc<FakeStatelessRunner>,
    stateful: Arc<FakeStatefulRunner>,
    notifier: Arc<RecordingNotifier>,
}

impl Harness {
    fn new(toolchain: Responder) -> Self {
        Self::with(
            REGISTRY,
            MemoryContainerCli::new().with_file(RAG_FILENAME, RULES),
            FakeStatefulRunner::new(toolchain.clone()),
            toolchain,
        )
    }

    fn with(
        registry_json: &str,
        docker: MemoryContainerCli,
        stateful: FakeStatefulRunner,
        toolchain: Responder,
    ) -> Self {
        Self {
            registry: Arc::new(StaticRegistry::new(REGISTRY_URL, registry_json)),
            docker: Arc::new(docker),
            stateless: Arc::new(FakeStatelessRunner::new(toolchain)),
            stateful: Arc::new(stateful),
            notifier: Arc::new(RecordingNotifier::new()),
        }
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators {
            registry: self.registry.clone(),
            docker: self.docker.clone(),
            stateless: self.stateless.clone(),
            stateful: self.stateful.clone(),
            notifier: self.notifier.clone(),
        }
    }

    fn lifecycle_count(&self, pred: impl Fn(&LifecycleCall) -> bool) -> usize {
        self.stateful.count(pred)
    }
}

fn ci_config(src: &TempDir) -> VerifyConfig {
    VerifyConfig::new(src.path())
        .with_ci_mode(true)
        .with_credentials("bot", "secret")
}

fn is_kata_new(c: &LifecycleCall) -> bool {
    matches!(c, LifecycleCall::KataNew { .. })
}

fn is_kata_old(c: &LifecycleCall) -> bool {
    matches!(c, LifecycleCall::KataOld { .. })
}

fn is_avatar_new(c: &LifecycleCall) -> bool {
    matches!(c, LifecycleCall::AvatarNew { .. })
}

fn is_avatar_old(c: &LifecycleCall) -> bool {
    matches!(c, LifecycleCall::AvatarOld { .. })
}

// ---------------------------------------------------------------------------
// Scenario A: every probe matches
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_stateless_happy_path_publishes_and_notifies() {
    let src = lang_source(None);
    let harness = Harness::new(lang_toolchain());

    let result = VerificationPipeline::new(ci_config(&src), harness.collaborators())
        .run()
        .await;

    assert!(result.success(), "unexpected error: {:?}", result.error);
    let report = &result.report;
    assert_eq!(
        report.states,
        vec![
            PipelineState::Idle,
            PipelineState::Validating,
            PipelineState::Building,
            PipelineState::StatelessProbing,
            PipelineState::Publishing,
        ]
    );
    assert!(report.success());
    assert_eq!(report.model.as_deref(), Some("stateless"));
    assert_eq!(report.image_name.as_deref(), Some("lang:1.0"));
    assert!(report.start_point_digest.is_some());

    let colours: Vec<Colour> = report.probes.iter().map(|p| p.colour).collect();
    assert_eq!(colours, vec![Colour::Red, Colour::Amber, Colour::Green]);
    assert_eq!(report.probes[0].edited_filename, None);
    assert_eq!(report.probes[1].edited_filename.as_deref(), Some("solution.ext"));
    assert!(report.probes.iter().all(|p| p.avatar_name == "salmon"));

    // amber submitted the broken expression, green the correct one
    let runs = harness.stateless.runs();
    assert_eq!(runs.len(), 3);
    assert_eq!(runs[1]["solution.ext"], "answer() = 6 * 9sdsd\n");
    assert_eq!(runs[2]["solution.ext"], "answer() = 6 * 7\n");
    assert_eq!(runs[2]["test.ext"], "assert answer() == 42\n");

    assert_eq!(
        harness.docker.calls(),
        vec![
            ContainerCall::Build {
                image_name: "lang:1.0".to_string()
            },
            ContainerCall::ReadFile {
                image_name: "lang:1.0".to_string(),
                path: RAG_FILENAME.to_string()
            },
            ContainerCall::Login {
                username: "bot".to_string()
            },
            ContainerCall::Push {
                image_name: "lang:1.0".to_string()
            },
            ContainerCall::Logout,
        ]
    );
    assert!(report.published);
    assert_eq!(report.dependents_notified, 1);
    assert_eq!(
        harness.notifier.sent(),
        vec![("lang:1.0".to_string(), "lang-kata".to_string())]
    );
    assert_eq!(harness.registry.fetches(), 1);
    assert!(harness.stateful.journal().is_empty());
}

#[tokio::test]
async fn test_stateful_happy_path_pairs_every_lifecycle_call() {
    let src = lang_source(Some("stateful"));
    let harness = Harness::new(lang_toolchain());

    let result = VerificationPipeline::new(ci_config(&src), harness.collaborators())
        .run()
        .await;

    assert!(result.success(), "unexpected error: {:?}", result.error);
    assert!(result
        .report
        .states
        .contains(&PipelineState::StatefulProbing));

    assert_eq!(harness.lifecycle_count(is_kata_new), 1);
    assert_eq!(harness.lifecycle_count(is_kata_old), 1);
    assert_eq!(harness.lifecycle_count(is_avatar_new), 3);
    assert_eq!(harness.lifecycle_count(is_avatar_old), 3);
    assert_eq!(harness.stateful.live_katas(), 0);

    let avatars: Vec<&str> = result
        .report
        .probes
        .iter()
        .map(|p| p.avatar_name.as_str())
        .collect();
    assert_eq!(avatars, vec!["rhino", "antelope", "gopher"]);
    assert!(harness.stateless.runs().is_empty());
}

#[tokio::test]
async fn test_runner_override_beats_manifest() {
    let src = lang_source(Some("stateful"));
    let harness = Harness::new(lang_toolchain());
    let config = ci_config(&src).with_runner_override(RunnerChoice::Stateless);

    let result = VerificationPipeline::new(config, harness.collaborators())
        .run()
        .await;

    assert!(result.success());
    assert_eq!(result.report.model.as_deref(), Some("stateless"));
    assert!(harness.stateful.journal().is_empty());
}

// ---------------------------------------------------------------------------
// Scenario B: identity not registered
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_unregistered_identity_is_fatal_in_ci() {
    let src = lang_source(None);
    let harness = Harness::with(
        r#"{"other": {"from": "base:1.0", "image_name": "other:1.0", "test_framework": false}}"#,
        MemoryContainerCli::new().with_file(RAG_FILENAME, RULES),
        FakeStatefulRunner::new(lang_toolchain()),
        lang_toolchain(),
    );

    let result = VerificationPipeline::new(ci_config(&src), harness.collaborators())
        .run()
        .await;

    let err = result.error.expect("identity mismatch");
    assert!(matches!(err, BuilderError::IdentityMismatch { .. }));
    let diagnostic = err.diagnostic_lines().join("\n");
    assert!(diagnostic.contains(REGISTRY_URL));
    assert!(diagnostic.contains(r#""image_name": "lang:1.0","#));
    assert!(diagnostic.contains(r#""from": "base:1.0","#));

    assert_eq!(result.report.final_state(), PipelineState::Aborted);
    assert!(harness.docker.calls().is_empty());
}

#[tokio::test]
async fn test_unregistered_identity_only_warns_outside_ci() {
    let src = lang_source(None);
    let harness = Harness::with(
        "{}",
        MemoryContainerCli::new().with_file(RAG_FILENAME, RULES),
        FakeStatefulRunner::new(lang_toolchain()),
        lang_toolchain(),
    );

    let result = VerificationPipeline::new(VerifyConfig::new(src.path()), harness.collaborators())
        .run()
        .await;

    assert!(result.success(), "unexpected error: {:?}", result.error);
    assert_eq!(result.report.final_state(), PipelineState::Publishing);
    assert!(!result.report.published);
    assert!(!harness
        .docker
        .calls()
        .iter()
        .any(|c| matches!(c, ContainerCall::Push { .. })));
    assert!(harness.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_unreachable_registry_aborts_even_outside_ci() {
    let src = lang_source(None);
    let mut harness = Harness::new(lang_toolchain());
    harness.registry = Arc::new(StaticRegistry::new(REGISTRY_URL, REGISTRY).failing());

    let result = VerificationPipeline::new(VerifyConfig::new(src.path()), harness.collaborators())
        .run()
        .await;

    assert!(matches!(result.error, Some(BuilderError::Registry(_))));
    assert_eq!(result.report.final_state(), PipelineState::Aborted);
    assert_eq!(harness.registry.fetches(), 1);
    assert!(!harness
        .docker
        .calls()
        .iter()
        .any(|c| matches!(c, ContainerCall::Build { .. })));
}

#[tokio::test]
async fn test_unparsable_registry_aborts_even_outside_ci() {
    let src = lang_source(None);
    let harness = Harness::with(
        "<html>maintenance</html>",
        MemoryContainerCli::new().with_file(RAG_FILENAME, RULES),
        FakeStatefulRunner::new(lang_toolchain()),
        lang_toolchain(),
    );

    let result = VerificationPipeline::new(VerifyConfig::new(src.path()), harness.collaborators())
        .run()
        .await;

    assert!(matches!(result.error, Some(BuilderError::Registry(_))));
    assert_eq!(result.report.final_state(), PipelineState::Aborted);
    assert!(harness.docker.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Scenario C: verdict mismatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_amber_classified_green_aborts_and_tears_down() {
    let src = lang_source(Some("stateful"));
    let harness = Harness::new(lenient_toolchain());

    let result = VerificationPipeline::new(ci_config(&src), harness.collaborators())
        .run()
        .await;

    let err = result.error.expect("verdict mismatch");
    assert_eq!(err.to_string(), "verdict mismatch: expected=amber, actual=green");
    let lines = err.diagnostic_lines();
    assert!(lines.contains(&"expected=amber, actual=green".to_string()));
    assert!(lines.contains(&"stdout == All tests passed".to_string()));
    assert!(lines.contains(&"status == 0".to_string()));
    assert!(lines
        .iter()
        .any(|l| l.starts_with("dir == ") && l.ends_with("start_point")));

    assert_eq!(harness.lifecycle_count(is_kata_new), 1);
    assert_eq!(harness.lifecycle_count(is_kata_old), 1);
    assert_eq!(harness.lifecycle_count(is_avatar_new), 2);
    assert_eq!(harness.lifecycle_count(is_avatar_old), 2);
    assert_eq!(harness.stateful.live_katas(), 0);
    assert_eq!(harness.stateful.live_avatars(), 0);

    let report = &result.report;
    assert_eq!(report.probes.len(), 1);
    assert_eq!(report.final_state(), PipelineState::Aborted);
    assert_eq!(report.failure.as_ref().unwrap().kind, "verdict_mismatch");
    assert!(!harness
        .docker
        .calls()
        .iter()
        .any(|c| matches!(c, ContainerCall::Push { .. })));
}

#[tokio::test]
async fn test_stateless_mismatch_never_publishes() {
    let src = lang_source(None);
    let harness = Harness::new(lenient_toolchain());

    let result = VerificationPipeline::new(ci_config(&src), harness.collaborators())
        .run()
        .await;

    assert!(matches!(result.error, Some(BuilderError::VerdictMismatch(_))));
    assert_eq!(harness.stateless.runs().len(), 2);
    assert!(!result.report.states.contains(&PipelineState::Publishing));
}

// ---------------------------------------------------------------------------
// Teardown guarantees
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_runner_panic_still_releases_kata_and_avatar() {
    let src = lang_source(Some("stateful"));
    let panicking = responder(|files| {
        if files["solution.ext"].contains("sdsd") {
            panic!("runner crashed");
        }
        Ok(CapturedResult::new("expected 42, got 54", "", 1))
    });
    let harness = Harness::new(panicking);

    let outcome = AssertUnwindSafe(
        VerificationPipeline::new(ci_config(&src), harness.collaborators()).run(),
    )
    .catch_unwind()
    .await;

    assert!(outcome.is_err(), "panic should propagate after teardown");
    assert_eq!(harness.stateful.live_avatars(), 0);
    assert_eq!(harness.stateful.live_katas(), 0);
    assert_eq!(harness.lifecycle_count(is_avatar_old), 2);
}

#[tokio::test]
async fn test_failed_avatar_release_is_fatal_and_kata_release_still_attempted() {
    let src = lang_source(Some("stateful"));
    let harness = Harness::with(
        REGISTRY,
        MemoryContainerCli::new().with_file(RAG_FILENAME, RULES),
        FakeStatefulRunner::new(lang_toolchain()).failing("avatar_old"),
        lang_toolchain(),
    );

    let result = VerificationPipeline::new(ci_config(&src), harness.collaborators())
        .run()
        .await;

    match result.error {
        Some(BuilderError::Execution { context, .. }) => assert_eq!(context, "avatar_old rhino"),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(harness.lifecycle_count(is_avatar_old), 1);
    assert_eq!(harness.lifecycle_count(is_kata_old), 1);
}

#[tokio::test]
async fn test_substitution_failure_creates_no_kata() {
    let src = lang_source(Some("stateful"));
    write(src.path(), "start_point/test.ext", "assert answer() != 6 * 9\n");
    let harness = Harness::new(lang_toolchain());

    let result = VerificationPipeline::new(ci_config(&src), harness.collaborators())
        .run()
        .await;

    let err = result.error.expect("substitution failure");
    assert!(matches!(err, BuilderError::SubstitutionTarget(_)));
    assert!(err.to_string().contains("solution.ext"));
    assert!(harness.stateful.journal().is_empty());
}

// ---------------------------------------------------------------------------
// Other stages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_image_without_test_framework_skips_probing() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "docker/Dockerfile", "FROM base:1.0\n");
    write(
        dir.path(),
        "docker/image_name.json",
        r#"{"image_name": "other:1.0", "test_framework": false}"#,
    );
    let harness = Harness::new(lang_toolchain());

    let result = VerificationPipeline::new(ci_config(&dir), harness.collaborators())
        .run()
        .await;

    assert!(result.success(), "unexpected error: {:?}", result.error);
    assert_eq!(
        result.report.states,
        vec![
            PipelineState::Idle,
            PipelineState::Validating,
            PipelineState::Building,
            PipelineState::Publishing,
        ]
    );
    assert!(result.report.probes.is_empty());
    assert!(!harness
        .docker
        .calls()
        .iter()
        .any(|c| matches!(c, ContainerCall::ReadFile { .. })));
    assert!(harness.stateless.runs().is_empty());
}

#[tokio::test]
async fn test_build_failure_aborts_before_probing() {
    let src = lang_source(None);
    let harness = Harness::with(
        REGISTRY,
        MemoryContainerCli::new()
            .with_file(RAG_FILENAME, RULES)
            .failing("build"),
        FakeStatefulRunner::new(lang_toolchain()),
        lang_toolchain(),
    );

    let result = VerificationPipeline::new(ci_config(&src), harness.collaborators())
        .run()
        .await;

    assert!(matches!(result.error, Some(BuilderError::BuildFailure { .. })));
    assert_eq!(
        result.report.states[result.report.states.len() - 2],
        PipelineState::Building
    );
    assert!(harness.stateless.runs().is_empty());
}

#[tokio::test]
async fn test_missing_classifier_is_extraction_error() {
    let src = lang_source(None);
    let harness = Harness::with(
        REGISTRY,
        MemoryContainerCli::new(),
        FakeStatefulRunner::new(lang_toolchain()),
        lang_toolchain(),
    );

    let result = VerificationPipeline::new(ci_config(&src), harness.collaborators())
        .run()
        .await;

    assert!(matches!(
        result.error,
        Some(BuilderError::ClassifierExtraction { .. })
    ));
    assert!(harness.stateless.runs().is_empty());
}

#[tokio::test]
async fn test_classifier_failing_sanity_check_is_rejected() {
    let src = lang_source(None);
    let harness = Harness::with(
        REGISTRY,
        MemoryContainerCli::new().with_file(RAG_FILENAME, "red if status != 0\ndefault green"),
        FakeStatefulRunner::new(lang_toolchain()),
        lang_toolchain(),
    );

    let result = VerificationPipeline::new(ci_config(&src), harness.collaborators())
        .run()
        .await;

    let err = result.error.expect("sanity check failure");
    assert!(err
        .diagnostic_lines()
        .contains(&"stderr == sdsd".to_string()));
}

#[tokio::test]
async fn test_manifest_naming_another_image_is_config_error() {
    let src = lang_source(None);
    write(
        src.path(),
        "start_point/manifest.json",
        r#"{"image_name": "lang:0.9", "visible_filenames": ["solution.ext"]}"#,
    );
    let harness = Harness::new(lang_toolchain());

    let result = VerificationPipeline::new(ci_config(&src), harness.collaborators())
        .run()
        .await;

    assert!(matches!(result.error, Some(BuilderError::Config(_))));
    assert!(harness.docker.calls().is_empty());
}

#[tokio::test]
async fn test_push_failure_still_logs_out() {
    let src = lang_source(None);
    let harness = Harness::with(
        REGISTRY,
        MemoryContainerCli::new()
            .with_file(RAG_FILENAME, RULES)
            .failing("push"),
        FakeStatefulRunner::new(lang_toolchain()),
        lang_toolchain(),
    );

    let result = VerificationPipeline::new(ci_config(&src), harness.collaborators())
        .run()
        .await;

    assert!(matches!(result.error, Some(BuilderError::Publish(_))));
    assert_eq!(harness.docker.calls().last(), Some(&ContainerCall::Logout));
    assert!(harness.notifier.sent().is_empty());
    assert_eq!(
        &result.report.states[result.report.states.len() - 2..],
        &[PipelineState::Publishing, PipelineState::Aborted]
    );
}

#[tokio::test]
async fn test_report_written_when_configured() {
    let src = lang_source(None);
    let harness = Harness::new(lang_toolchain());
    let report_path = src.path().join("out/report.json");
    let mut config = ci_config(&src);
    config.report_path = Some(report_path.clone());

    let result = VerificationPipeline::new(config, harness.collaborators())
        .run()
        .await;
    assert!(result.success());

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(value["run_id"], result.report.run_id.to_string());
    assert_eq!(value["probes"].as_array().unwrap().len(), 3);
    assert_eq!(value["published"], true);
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Stateful runner whose `run` never answers. Signals `started` on entry.
struct StalledRunner {
    inner: Arc<FakeStatefulRunner>,
    started: Arc<tokio::sync::Notify>,
}

#[async_trait::async_trait]
impl StatefulRunner for StalledRunner {
    async fn kata_new(&self, kata: &KataRef) -> kata_runner::Result<()> {
        self.inner.kata_new(kata).await
    }

    async fn avatar_new(
        &self,
        kata: &KataRef,
        avatar_name: &str,
        starting_files: &FileSet,
    ) -> kata_runner::Result<()> {
        self.inner.avatar_new(kata, avatar_name, starting_files).await
    }

    async fn run(
        &self,
        _kata: &KataRef,
        _avatar_name: &str,
        _deleted_filenames: &[String],
        _changed_files: &FileSet,
        _max_seconds: u64,
    ) -> kata_runner::Result<CapturedResult> {
        self.started.notify_one();
        std::future::pending().await
    }

    async fn avatar_old(&self, kata: &KataRef, avatar_name: &str) -> kata_runner::Result<()> {
        self.inner.avatar_old(kata, avatar_name).await
    }

    async fn kata_old(&self, kata: &KataRef) -> kata_runner::Result<()> {
        self.inner.kata_old(kata).await
    }
}

#[tokio::test]
async fn test_cancelled_run_releases_kata_and_avatar() {
    let src = lang_source(Some("stateful"));
    let harness = Harness::new(lang_toolchain());
    let started = Arc::new(tokio::sync::Notify::new());
    let mut collaborators = harness.collaborators();
    collaborators.stateful = Arc::new(StalledRunner {
        inner: harness.stateful.clone(),
        started: started.clone(),
    });

    let result = VerificationPipeline::new(ci_config(&src), collaborators)
        .run_until(async move { started.notified().await })
        .await;

    match &result.error {
        Some(BuilderError::Cancelled { stage }) => assert_eq!(stage, "stateful_probing"),
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert_eq!(result.report.final_state(), PipelineState::Aborted);
    assert_eq!(result.report.failure.as_ref().unwrap().kind, "cancelled");

    assert_eq!(harness.stateful.live_avatars(), 0);
    assert_eq!(harness.stateful.live_katas(), 0);
    assert_eq!(harness.lifecycle_count(is_avatar_old), 1);
    assert_eq!(harness.lifecycle_count(is_kata_old), 1);
    assert!(!harness
        .docker
        .calls()
        .iter()
        .any(|c| matches!(c, ContainerCall::Push { .. })));
}
