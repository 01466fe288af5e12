//! Saved test-flow collection.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::model::{FlowPatch, TestFlow};
use crate::utils::ids;

/// Owned collection of saved flows. Mutations happen here; persistence is
/// the coordinator's job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowStore {
    flows: Vec<TestFlow>,
}

impl FlowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_flows(flows: Vec<TestFlow>) -> Self {
        Self { flows }
    }

    /// Add a flow. The id is assigned here if absent and never changes
    /// afterwards.
    pub fn add(&mut self, mut flow: TestFlow) -> TestFlow {
        if flow.id.is_empty() {
            flow.id = ids::new_id();
        }
        self.flows.push(flow.clone());
        flow
    }

    /// Merge a patch into a flow. Unset patch fields keep their current
    /// values; `updated_at` always refreshes.
    pub fn update(&mut self, id: &str, patch: FlowPatch) -> Option<TestFlow> {
        let flow = self.flows.iter_mut().find(|f| f.id == id)?;

        if let Some(name) = patch.name {
            flow.name = name;
        }
        if let Some(steps) = patch.steps {
            flow.steps = steps;
        }
        if let Some(status) = patch.status {
            flow.status = status;
        }
        if let Some(browser) = patch.browser {
            flow.browser = browser;
        }
        if let Some(last_run) = patch.last_run {
            flow.last_run = Some(last_run);
        }
        if let Some(duration) = patch.duration {
            flow.duration = Some(duration);
        }
        flow.updated_at = Utc::now();

        Some(flow.clone())
    }

    /// Remove a flow. Unknown ids are a reported no-op, never an error.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.flows.len();
        self.flows.retain(|f| f.id != id);
        self.flows.len() < before
    }

    pub fn list(&self) -> &[TestFlow] {
        &self.flows
    }

    pub fn get_by_id(&self, id: &str) -> Option<&TestFlow> {
        self.flows.iter().find(|f| f.id == id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&TestFlow> {
        self.flows.iter().find(|f| f.name == name)
    }
}
