//! Drives one run end to end: session acquisition, step-by-step execution
//! under a continuation policy, and guaranteed session release.

use std::sync::Arc;

use chrono::Utc;

use crate::error::StepflowError;
use crate::executor::StepExecutor;
use crate::model::{RunStepOutcome, Step};

use super::events::{EventEmitter, RunEvent};

/// Whether a run aborts at the first failed step or executes all
/// configured steps regardless of individual failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuationPolicy {
    /// Execute every step so the report reflects the full sequence.
    ContinueOnFailure,
    /// Abort the remaining steps the moment one fails.
    StopOnFailure,
}

/// Structured result of one run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// One entry per attempted step, in execution order.
    pub outcomes: Vec<RunStepOutcome>,
    pub total_steps: usize,
    pub successful_steps: usize,
    pub completed_steps: usize,

    /// Run-level failure (the executor backend was unreachable), distinct
    /// from any individual step failing.
    pub error: Option<String>,
}

impl RunOutcome {
    /// Wall-clock span between the first and last recorded outcome.
    pub fn elapsed_ms(&self) -> i64 {
        match (self.outcomes.first(), self.outcomes.last()) {
            (Some(first), Some(last)) if self.outcomes.len() > 1 => {
                (last.timestamp - first.timestamp).num_milliseconds()
            }
            _ => 0,
        }
    }

    fn run_level_failure(total_steps: usize, error: String) -> Self {
        Self {
            outcomes: Vec::new(),
            total_steps,
            successful_steps: 0,
            completed_steps: 0,
            error: Some(error),
        }
    }
}

pub struct Orchestrator {
    executor: Arc<dyn StepExecutor>,
    emitter: EventEmitter,
    policy: ContinuationPolicy,
}

impl Orchestrator {
    pub fn new(
        executor: Arc<dyn StepExecutor>,
        emitter: EventEmitter,
        policy: ContinuationPolicy,
    ) -> Self {
        Self {
            executor,
            emitter,
            policy,
        }
    }

    /// Run a step sequence.
    ///
    /// Validation failures (empty sequence, malformed step config) surface
    /// before any session is opened. Once a session exists, every exit
    /// path releases it exactly once and yields a structured outcome;
    /// an unreachable backend becomes a run-level error, not an `Err`.
    pub async fn run(
        &self,
        flow_name: &str,
        steps: &[Step],
    ) -> Result<RunOutcome, StepflowError> {
        if steps.is_empty() {
            return Err(StepflowError::validation(
                "a run needs at least one step",
            ));
        }
        for step in steps {
            step.validate()?;
        }

        self.emitter.emit(RunEvent::RunStarted {
            flow_name: flow_name.to_string(),
            total_steps: steps.len(),
        });

        let mut session = match self.executor.open_session().await {
            Ok(session) => session,
            Err(e) => {
                log::warn!("run \"{}\" could not open a session: {}", flow_name, e);
                return Ok(RunOutcome::run_level_failure(steps.len(), e.to_string()));
            }
        };

        let mut outcomes: Vec<RunStepOutcome> = Vec::with_capacity(steps.len());
        let mut successful_steps = 0usize;
        let mut run_error = None;

        for (index, step) in steps.iter().enumerate() {
            self.emitter.emit(RunEvent::StepStarted {
                index,
                name: step.display_name(),
            });
            let started = std::time::Instant::now();

            match session.perform(step).await {
                Ok(result) => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    if result.success {
                        successful_steps += 1;
                        self.emitter.emit(RunEvent::StepPassed {
                            index,
                            message: result.message.clone(),
                            duration_ms,
                        });
                    } else {
                        self.emitter.emit(RunEvent::StepFailed {
                            index,
                            error: result
                                .error
                                .clone()
                                .unwrap_or_else(|| result.message.clone()),
                            duration_ms,
                        });
                    }

                    let failed = !result.success;
                    outcomes.push(RunStepOutcome {
                        step: step.clone(),
                        result,
                        timestamp: Utc::now(),
                    });

                    if failed && self.policy == ContinuationPolicy::StopOnFailure {
                        break;
                    }
                }
                Err(e) => {
                    self.emitter.emit(RunEvent::StepFailed {
                        index,
                        error: e.to_string(),
                        duration_ms: started.elapsed().as_millis() as u64,
                    });
                    run_error = Some(e.to_string());
                    break;
                }
            }
        }

        session.release().await;

        Ok(RunOutcome {
            completed_steps: outcomes.len(),
            total_steps: steps.len(),
            successful_steps,
            outcomes,
            error: run_error,
        })
    }
}
