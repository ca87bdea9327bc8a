//! The two execution models behind one probing sequence.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use kata_image_core::{BuilderError, CapturedResult, Colour, FileSet, KataRef, Probe, Result};
use kata_runner::{StatefulRunner, StatelessRunner};

use crate::lifecycle::{as_avatar, in_kata, HeldResources};

/// Avatar every stateless probe runs as.
pub const STATELESS_AVATAR: &str = "salmon";

/// Fresh avatar for each colour in the stateful model.
pub fn stateful_avatar(colour: Colour) -> &'static str {
    match colour {
        Colour::Red => "rhino",
        Colour::Amber => "antelope",
        Colour::Green => "gopher",
    }
}

/// One probe's raw result.
#[derive(Debug, Clone)]
pub struct ProbeRun {
    pub avatar_name: String,
    pub captured: CapturedResult,
    pub duration_ms: u64,
}

/// Judges each probe run. An `Err` stops the sequence.
pub type Verify<'a> = dyn FnMut(&Probe, ProbeRun) -> Result<()> + Send + 'a;

/// A way of running probes inside the image.
#[async_trait]
pub trait ExecutionModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run `probes` in order against `kata`, passing each result to `verify`
    /// before the next probe starts. Stops at the first error.
    async fn run_probes(
        &self,
        kata: &KataRef,
        base: &FileSet,
        probes: &[Probe],
        max_seconds: u64,
        verify: &mut Verify<'_>,
    ) -> Result<()>;
}

fn probe_context(colour: Colour, model: &str) -> String {
    format!("{colour} probe ({model})")
}

/// Each probe is one self-contained call with the full file set.
pub struct StatelessModel {
    runner: Arc<dyn StatelessRunner>,
}

impl StatelessModel {
    pub fn new(runner: Arc<dyn StatelessRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ExecutionModel for StatelessModel {
    fn name(&self) -> &'static str {
        "stateless"
    }

    async fn run_probes(
        &self,
        kata: &KataRef,
        _base: &FileSet,
        probes: &[Probe],
        max_seconds: u64,
        verify: &mut Verify<'_>,
    ) -> Result<()> {
        for probe in probes {
            info!(colour = %probe.colour, avatar_name = STATELESS_AVATAR, "running probe");
            let start = Instant::now();
            let captured = self
                .runner
                .run(kata, STATELESS_AVATAR, &probe.files, max_seconds)
                .await
                .map_err(|e| BuilderError::execution(probe_context(probe.colour, self.name()), e))?;

            verify(
                probe,
                ProbeRun {
                    avatar_name: STATELESS_AVATAR.to_string(),
                    captured,
                    duration_ms: start.elapsed().as_millis() as u64,
                },
            )?;
        }
        Ok(())
    }
}

/// One kata for the whole sequence; a fresh avatar seeded with the base files
/// per probe, which then submits only the probe's changed files.
pub struct StatefulModel {
    runner: Arc<dyn StatefulRunner>,
    held: HeldResources,
}

impl StatefulModel {
    /// Katas and avatars are recorded in `held` while they exist.
    pub fn new(runner: Arc<dyn StatefulRunner>, held: HeldResources) -> Self {
        Self { runner, held }
    }
}

#[async_trait]
impl ExecutionModel for StatefulModel {
    fn name(&self) -> &'static str {
        "stateful"
    }

    async fn run_probes(
        &self,
        kata: &KataRef,
        base: &FileSet,
        probes: &[Probe],
        max_seconds: u64,
        verify: &mut Verify<'_>,
    ) -> Result<()> {
        let runner = self.runner.as_ref();
        let held = &self.held;
        let model = self.name();

        in_kata(runner, held, kata, move || async move {
            for probe in probes {
                let avatar_name = stateful_avatar(probe.colour);
                info!(colour = %probe.colour, avatar_name, "running probe");

                let run = as_avatar(runner, held, kata, avatar_name, base, move || async move {
                    let start = Instant::now();
                    let captured = runner
                        .run(kata, avatar_name, &[], &probe.changed_files, max_seconds)
                        .await
                        .map_err(|e| BuilderError::execution(probe_context(probe.colour, model), e))?;
                    Ok(ProbeRun {
                        avatar_name: avatar_name.to_string(),
                        captured,
                        duration_ms: start.elapsed().as_millis() as u64,
                    })
                })
                .await?;

                verify(probe, run)?;
            }
            Ok(())
        })
        .await
    }
}
