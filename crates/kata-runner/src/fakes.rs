//! In-memory fakes for the runner traits (testing only)
//!
//! `FakeStatelessRunner` and `FakeStatefulRunner` satisfy the runner
//! contracts without a network. Output is produced by a caller-supplied
//! responder looking at the files that would have run. The stateful fake
//! applies diffs the way a real runner does, enforces lifecycle ordering, and
//! keeps a journal of every call.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::client::{StatefulRunner, StatelessRunner};
use crate::error::RunnerError;
use crate::types::{CapturedResult, FileSet, KataRef};
use crate::Result;

/// Produces the output for a run from the files that ran.
pub type Responder = Arc<dyn Fn(&FileSet) -> Result<CapturedResult> + Send + Sync>;

/// Wrap a closure as a [`Responder`].
pub fn responder<F>(f: F) -> Responder
where
    F: Fn(&FileSet) -> Result<CapturedResult> + Send + Sync + 'static,
{
    Arc::new(f)
}

// ---------------------------------------------------------------------------
// FakeStatelessRunner
// ---------------------------------------------------------------------------

/// Stateless runner that answers through a [`Responder`].
pub struct FakeStatelessRunner {
    responder: Responder,
    runs: Mutex<Vec<FileSet>>,
}

impl FakeStatelessRunner {
    pub fn new(responder: Responder) -> Self {
        Self {
            responder,
            runs: Mutex::new(Vec::new()),
        }
    }

    /// Files submitted by each `run`, in call order.
    pub fn runs(&self) -> Vec<FileSet> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatelessRunner for FakeStatelessRunner {
    async fn run(
        &self,
        _kata: &KataRef,
        _avatar_name: &str,
        files: &FileSet,
        _max_seconds: u64,
    ) -> Result<CapturedResult> {
        self.runs.lock().unwrap().push(files.clone());
        (self.responder)(files)
    }
}

// ---------------------------------------------------------------------------
// FakeStatefulRunner
// ---------------------------------------------------------------------------

/// One entry in the stateful fake's call journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleCall {
    KataNew { kata_id: String },
    AvatarNew { kata_id: String, avatar_name: String },
    Run { kata_id: String, avatar_name: String },
    AvatarOld { kata_id: String, avatar_name: String },
    KataOld { kata_id: String },
}

#[derive(Default)]
struct FakeState {
    /// kata_id → avatar_name → current files
    katas: HashMap<String, BTreeMap<String, FileSet>>,
    journal: Vec<LifecycleCall>,
}

/// Stateful runner holding kata and avatar state in memory.
pub struct FakeStatefulRunner {
    responder: Responder,
    state: Mutex<FakeState>,
    failing_method: Option<&'static str>,
}

impl FakeStatefulRunner {
    pub fn new(responder: Responder) -> Self {
        Self {
            responder,
            state: Mutex::new(FakeState::default()),
            failing_method: None,
        }
    }

    /// Make every call to `method` fail (after being journaled), to exercise
    /// teardown error paths.
    pub fn failing(mut self, method: &'static str) -> Self {
        self.failing_method = Some(method);
        self
    }

    /// Every call made so far, in order.
    pub fn journal(&self) -> Vec<LifecycleCall> {
        self.state.lock().unwrap().journal.clone()
    }

    /// Number of journal entries matching `pred`.
    pub fn count(&self, pred: impl Fn(&LifecycleCall) -> bool) -> usize {
        self.state.lock().unwrap().journal.iter().filter(|c| pred(c)).count()
    }

    /// Katas that are still alive.
    pub fn live_katas(&self) -> usize {
        self.state.lock().unwrap().katas.len()
    }

    /// Avatars that are still alive, across all katas.
    pub fn live_avatars(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .katas
            .values()
            .map(|avatars| avatars.len())
            .sum()
    }

    fn check_injected_failure(&self, method: &str) -> Result<()> {
        if self.failing_method == Some(method) {
            return Err(RunnerError::Exception {
                method: method.to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StatefulRunner for FakeStatefulRunner {
    async fn kata_new(&self, kata: &KataRef) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.journal.push(LifecycleCall::KataNew {
            kata_id: kata.kata_id.clone(),
        });
        self.check_injected_failure("kata_new")?;
        if state.katas.contains_key(&kata.kata_id) {
            return Err(RunnerError::Lifecycle(format!(
                "kata {} already exists",
                kata.kata_id
            )));
        }
        state.katas.insert(kata.kata_id.clone(), BTreeMap::new());
        Ok(())
    }

    async fn avatar_new(
        &self,
        kata: &KataRef,
        avatar_name: &str,
        starting_files: &FileSet,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.journal.push(LifecycleCall::AvatarNew {
            kata_id: kata.kata_id.clone(),
            avatar_name: avatar_name.to_string(),
        });
        self.check_injected_failure("avatar_new")?;
        let avatars = state.katas.get_mut(&kata.kata_id).ok_or_else(|| {
            RunnerError::Lifecycle(format!("kata {} does not exist", kata.kata_id))
        })?;
        if avatars.contains_key(avatar_name) {
            return Err(RunnerError::Lifecycle(format!(
                "avatar {avatar_name} already exists"
            )));
        }
        avatars.insert(avatar_name.to_string(), starting_files.clone());
        Ok(())
    }

    async fn run(
        &self,
        kata: &KataRef,
        avatar_name: &str,
        deleted_filenames: &[String],
        changed_files: &FileSet,
        _max_seconds: u64,
    ) -> Result<CapturedResult> {
        let files = {
            let mut state = self.state.lock().unwrap();
            state.journal.push(LifecycleCall::Run {
                kata_id: kata.kata_id.clone(),
                avatar_name: avatar_name.to_string(),
            });
            self.check_injected_failure("run")?;
            let files = state
                .katas
                .get_mut(&kata.kata_id)
                .and_then(|avatars| avatars.get_mut(avatar_name))
                .ok_or_else(|| {
                    RunnerError::Lifecycle(format!(
                        "avatar {avatar_name} does not exist in kata {}",
                        kata.kata_id
                    ))
                })?;
            for filename in deleted_filenames {
                files.remove(filename);
            }
            for (filename, content) in changed_files {
                files.insert(filename.clone(), content.clone());
            }
            files.clone()
        };
        (self.responder)(&files)
    }

    async fn avatar_old(&self, kata: &KataRef, avatar_name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.journal.push(LifecycleCall::AvatarOld {
            kata_id: kata.kata_id.clone(),
            avatar_name: avatar_name.to_string(),
        });
        self.check_injected_failure("avatar_old")?;
        state
            .katas
            .get_mut(&kata.kata_id)
            .and_then(|avatars| avatars.remove(avatar_name))
            .map(|_| ())
            .ok_or_else(|| RunnerError::Lifecycle(format!("avatar {avatar_name} does not exist")))
    }

    async fn kata_old(&self, kata: &KataRef) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.journal.push(LifecycleCall::KataOld {
            kata_id: kata.kata_id.clone(),
        });
        self.check_injected_failure("kata_old")?;
        match state.katas.get(&kata.kata_id) {
            None => Err(RunnerError::Lifecycle(format!(
                "kata {} does not exist",
                kata.kata_id
            ))),
            Some(avatars) if !avatars.is_empty() => Err(RunnerError::Lifecycle(format!(
                "kata {} still has {} avatar(s)",
                kata.kata_id,
                avatars.len()
            ))),
            Some(_) => {
                state.katas.remove(&kata.kata_id);
                Ok(())
            }
        }
    }
}
