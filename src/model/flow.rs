use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::step::Step;
use crate::utils::ids;

/// Lifecycle status of a saved flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStatus {
    #[default]
    Pending,
    Running,
    Success,
    Error,
}

fn default_browser() -> String {
    "chromium".to_string()
}

/// A saved, reusable, named step sequence.
///
/// Step order is execution order. The id is assigned once on creation and
/// never changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestFlow {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub steps: Vec<Step>,

    #[serde(default)]
    pub status: FlowStatus,

    #[serde(default = "default_browser")]
    pub browser: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl TestFlow {
    pub fn new(name: impl Into<String>, steps: Vec<Step>, browser: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ids::new_id(),
            name: name.into(),
            steps,
            status: FlowStatus::Pending,
            browser: browser.into(),
            created_at: now,
            updated_at: now,
            last_run: None,
            duration: None,
        }
    }
}

/// Field merge applied to a flow on update. Unset fields keep their
/// current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<Step>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<FlowStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl FlowPatch {
    pub fn status(status: FlowStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}
