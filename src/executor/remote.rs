//! Step executor that forwards each step to another instance's run API.
//!
//! Each step is posted to `POST /api/run-single-step` on the remote
//! backend. A connection failure or a non-JSON body is a transport error
//! and is never retried.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{StepExecutor, StepSession};
use crate::error::StepflowError;
use crate::model::{RunStepOutcome, Step, StepResult};

pub struct RemoteExecutor {
    base_url: String,
    client: reqwest::Client,
}

impl RemoteExecutor {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl StepExecutor for RemoteExecutor {
    async fn open_session(&self) -> Result<Box<dyn StepSession>, StepflowError> {
        Ok(Box::new(RemoteSession {
            url: format!("{}/api/run-single-step", self.base_url),
            client: self.client.clone(),
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SingleStepResponse {
    #[allow(dead_code)]
    success: bool,

    #[serde(default)]
    results: Vec<RunStepOutcome>,

    #[serde(default)]
    error: Option<String>,
}

struct RemoteSession {
    url: String,
    client: reqwest::Client,
}

#[async_trait]
impl StepSession for RemoteSession {
    async fn perform(&mut self, step: &Step) -> Result<StepResult, StepflowError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "step": step }))
            .send()
            .await
            .map_err(|e| {
                StepflowError::transport(format!("executor backend unreachable: {}", e))
            })?;

        let status = response.status();
        let body: SingleStepResponse = response.json().await.map_err(|e| {
            StepflowError::transport(format!("non-JSON response from executor backend: {}", e))
        })?;

        if !status.is_success() {
            let detail = body
                .error
                .unwrap_or_else(|| format!("executor backend returned {}", status));
            return Err(StepflowError::transport(detail));
        }

        match body.results.into_iter().next() {
            Some(outcome) => Ok(outcome.result),
            None => Err(StepflowError::transport(
                "executor backend returned no step result",
            )),
        }
    }

    // Sessions on the remote backend are scoped per request; nothing to
    // tear down on this side.
    async fn release(self: Box<Self>) {}
}
