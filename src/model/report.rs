use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::flow::FlowStatus;
use super::step::Step;

/// Outcome of one executed step, reported by a step executor.
///
/// A failed browser action is still a result, never an error: the message
/// is always human readable, `error` carries the failure detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub success: bool,
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(error.into()),
        }
    }
}

/// The recorded result of one executed step within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStepOutcome {
    pub step: Step,
    pub result: StepResult,
    pub timestamp: DateTime<Utc>,
}

/// Final verdict of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

impl From<RunStatus> for FlowStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Success => FlowStatus::Success,
            RunStatus::Error => FlowStatus::Error,
        }
    }
}

/// The durable, immutable record of one completed run.
///
/// Invariant: `passed_steps <= completed_steps <= total_steps`. The store
/// assigns `id` and `timestamp` when they are absent; nothing mutates a
/// report after that.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    #[serde(default)]
    pub id: String,

    pub test_name: String,
    pub status: RunStatus,
    pub duration: String,
    pub total_steps: usize,
    pub passed_steps: usize,
    pub completed_steps: usize,
    pub trigger: String,

    #[serde(default)]
    pub results: Vec<RunStepOutcome>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}
