//! Scoped kata and avatar lifetimes.
//!
//! Each helper acquires, runs the body, then releases: after `Ok`, after
//! `Err`, and after a panic (which resumes once the release has run).
//! A release failure is returned only when the body succeeded; otherwise the
//! body's error wins and the release failure is logged.
//!
//! A dropped future releases nothing, so every acquisition is also recorded
//! in a [`HeldResources`] until its release has run. A cancelled run hands
//! that record to [`release_abandoned`].

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use kata_image_core::obs::emit_teardown_error;
use kata_image_core::{BuilderError, FileSet, KataRef, Result};
use kata_runner::StatefulRunner;

/// A kata or avatar that has been created and not yet deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Held {
    Kata(KataRef),
    Avatar { kata: KataRef, avatar_name: String },
}

/// Katas and avatars currently held, in acquisition order.
///
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct HeldResources {
    held: Arc<Mutex<Vec<Held>>>,
}

impl HeldResources {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, resource: Held) {
        if let Ok(mut held) = self.held.lock() {
            held.push(resource);
        }
    }

    fn remove(&self, resource: &Held) {
        if let Ok(mut held) = self.held.lock() {
            if let Some(pos) = held.iter().rposition(|h| h == resource) {
                held.remove(pos);
            }
        }
    }

    /// Snapshot of what is still held, oldest first.
    pub fn held(&self) -> Vec<Held> {
        self.held.lock().map(|held| held.clone()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.held().is_empty()
    }

    fn take(&self) -> Vec<Held> {
        self.held
            .lock()
            .map(|mut held| std::mem::take(&mut *held))
            .unwrap_or_default()
    }
}

/// Run `body`, then always run `release`.
pub async fn guarded<T, B, R, RF>(resource: &str, body: B, release: R) -> Result<T>
where
    B: Future<Output = Result<T>>,
    R: FnOnce() -> RF,
    RF: Future<Output = Result<()>>,
{
    let outcome = AssertUnwindSafe(body).catch_unwind().await;
    let released = release().await;

    if let Err(e) = &released {
        emit_teardown_error(resource, e);
    }

    match outcome {
        Err(panic) => std::panic::resume_unwind(panic),
        Ok(Err(e)) => Err(e),
        Ok(Ok(value)) => released.map(|()| value),
    }
}

/// Create a kata, run `body` in it, then delete it.
pub async fn in_kata<T, F, Fut>(
    runner: &dyn StatefulRunner,
    held: &HeldResources,
    kata: &KataRef,
    body: F,
) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    runner
        .kata_new(kata)
        .await
        .map_err(|e| BuilderError::execution(format!("kata_new {kata}"), e))?;
    debug!(kata = %kata, "kata created");
    let resource = Held::Kata(kata.clone());
    held.record(resource.clone());

    guarded(&format!("kata {kata}"), body(), move || async move {
        let released = runner
            .kata_old(kata)
            .await
            .map_err(|e| BuilderError::execution(format!("kata_old {kata}"), e));
        held.remove(&resource);
        released
    })
    .await
}

/// Create `avatar_name` in `kata` seeded with `starting_files`, run `body`,
/// then delete the avatar.
pub async fn as_avatar<T, F, Fut>(
    runner: &dyn StatefulRunner,
    held: &HeldResources,
    kata: &KataRef,
    avatar_name: &str,
    starting_files: &FileSet,
    body: F,
) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    runner
        .avatar_new(kata, avatar_name, starting_files)
        .await
        .map_err(|e| BuilderError::execution(format!("avatar_new {avatar_name}"), e))?;
    debug!(kata = %kata, avatar_name, "avatar created");
    let resource = Held::Avatar {
        kata: kata.clone(),
        avatar_name: avatar_name.to_string(),
    };
    held.record(resource.clone());

    guarded(&format!("avatar {avatar_name}"), body(), move || async move {
        let released = runner
            .avatar_old(kata, avatar_name)
            .await
            .map_err(|e| BuilderError::execution(format!("avatar_old {avatar_name}"), e));
        held.remove(&resource);
        released
    })
    .await
}

/// Delete everything an interrupted run left behind, newest first.
///
/// Failures are logged and do not stop the remaining releases. Returns how
/// many releases succeeded.
pub async fn release_abandoned(runner: &dyn StatefulRunner, held: &HeldResources) -> usize {
    let mut released = 0;
    for resource in held.take().into_iter().rev() {
        let outcome = match &resource {
            Held::Avatar { kata, avatar_name } => runner
                .avatar_old(kata, avatar_name)
                .await
                .map_err(|e| BuilderError::execution(format!("avatar_old {avatar_name}"), e)),
            Held::Kata(kata) => runner
                .kata_old(kata)
                .await
                .map_err(|e| BuilderError::execution(format!("kata_old {kata}"), e)),
        };
        match outcome {
            Ok(()) => {
                info!(resource = ?resource, "released after cancellation");
                released += 1;
            }
            Err(e) => emit_teardown_error(&format!("{resource:?}"), &e),
        }
    }
    released
}
