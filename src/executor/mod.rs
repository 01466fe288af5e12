//! Step executor boundary.
//!
//! A `StepExecutor` hands out sessions; a session performs one step at a
//! time against a live browser and must be released exactly once. A failed
//! browser action (bad selector, wait timeout, navigation failure) is data,
//! returned as `StepResult { success: false, .. }`. An `Err` from the
//! session means the executor itself is unreachable.

use async_trait::async_trait;

use crate::error::StepflowError;
use crate::model::{Step, StepResult};

pub mod browser;
pub mod remote;

#[cfg(test)]
pub mod scripted;

/// One live executor session, scoped to a single run.
#[async_trait]
pub trait StepSession: Send {
    /// Perform one step and report its outcome.
    async fn perform(&mut self, step: &Step) -> Result<StepResult, StepflowError>;

    /// Release the underlying browser resources. Consumes the session so a
    /// double release cannot compile.
    async fn release(self: Box<Self>);
}

/// Factory for executor sessions.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn StepSession>, StepflowError>;
}
