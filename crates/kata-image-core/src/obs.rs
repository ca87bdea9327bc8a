//! Structured observability hooks for a verification run.
//!
//! - `run_span`: span tagging every log line of a run with its run id
//! - `emit_*`: one function per lifecycle event, so field names stay uniform

use tracing::{info, warn};

use crate::colour::Colour;

/// Span tagging every event of one verification run.
///
/// ```ignore
/// pipeline.execute().instrument(run_span("4f1c...", "/repo/gcc-assert")).await
/// ```
pub fn run_span(run_id: &str, src_dir: &str) -> tracing::Span {
    tracing::info_span!("kib.run", run_id = %run_id, src_dir = %src_dir)
}

/// Emit event: the pipeline entered a new state.
pub fn emit_stage_entered(stage: &str) {
    info!(event = "stage.entered", stage = %stage);
}

/// Emit event: a probe ran and its verdict matched.
pub fn emit_probe_finished(colour: Colour, model: &str, status: i32, duration_ms: u64) {
    info!(
        event = "probe.finished",
        colour = %colour,
        model = %model,
        status = status,
        duration_ms = duration_ms,
    );
}

/// Emit event: the whole run finished.
pub fn emit_run_finished(final_stage: &str, duration_ms: u64, success: bool) {
    info!(
        event = "run.finished",
        final_stage = %final_stage,
        duration_ms = duration_ms,
        success = success,
    );
}

/// Emit event: releasing a kata or avatar failed (warning level).
pub fn emit_teardown_error(resource: &str, error: &dyn std::fmt::Display) {
    warn!(event = "teardown.error", resource = %resource, error = %error);
}
