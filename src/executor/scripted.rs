//! Scripted executor for tests: canned per-step outcomes plus counters for
//! session lifecycle assertions.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{StepExecutor, StepSession};
use crate::error::StepflowError;
use crate::model::{Step, StepResult};

#[derive(Debug, Clone)]
pub enum ScriptedCall {
    Pass(&'static str),
    Fail(&'static str),
    Transport(&'static str),
}

pub struct ScriptedExecutor {
    script: Arc<Mutex<VecDeque<ScriptedCall>>>,
    fail_open: bool,
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl ScriptedExecutor {
    pub fn new(script: Vec<ScriptedCall>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            fail_open: false,
            opened: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// An executor whose session acquisition always fails.
    pub fn failing_open() -> Self {
        let mut exec = Self::new(Vec::new());
        exec.fail_open = true;
        exec
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
    async fn open_session(&self) -> Result<Box<dyn StepSession>, StepflowError> {
        if self.fail_open {
            return Err(StepflowError::transport("cannot reach browser backend"));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            released: self.released.clone(),
        }))
    }
}

struct ScriptedSession {
    script: Arc<Mutex<VecDeque<ScriptedCall>>>,
    released: Arc<AtomicUsize>,
}

#[async_trait]
impl StepSession for ScriptedSession {
    async fn perform(&mut self, step: &Step) -> Result<StepResult, StepflowError> {
        let call = self.script.lock().unwrap().pop_front();
        match call {
            Some(ScriptedCall::Pass(message)) => Ok(StepResult::ok(message)),
            Some(ScriptedCall::Fail(error)) => {
                Ok(StepResult::failed(format!("{} failed", step.display_name()), error))
            }
            Some(ScriptedCall::Transport(error)) => Err(StepflowError::transport(error)),
            None => Ok(StepResult::ok("ok")),
        }
    }

    async fn release(self: Box<Self>) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
