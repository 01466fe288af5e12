pub mod classify;
pub mod events;
pub mod orchestrator;
pub mod registry;

pub use classify::{classify, format_duration, RunVerdict};
pub use events::{ConsoleRunListener, EventEmitter, RunEvent};
pub use orchestrator::{ContinuationPolicy, Orchestrator, RunOutcome};
pub use registry::{RunRegistry, RunningTestEntry, RUNNING_TTL_SECS};

use std::sync::Arc;

use chrono::Utc;

use crate::error::StepflowError;
use crate::executor::StepExecutor;
use crate::model::{FlowPatch, FlowStatus, TestFlow, TestReport};
use crate::store::coordinator::StateCoordinator;
use crate::utils::ids;

/// Fold a run outcome and its verdict into a durable report.
pub fn build_report(
    test_name: impl Into<String>,
    trigger: impl Into<String>,
    outcome: &RunOutcome,
    verdict: &RunVerdict,
) -> TestReport {
    TestReport {
        id: ids::new_id(),
        test_name: test_name.into(),
        status: verdict.status,
        duration: verdict.duration.clone(),
        total_steps: outcome.total_steps,
        passed_steps: outcome.successful_steps,
        completed_steps: outcome.completed_steps,
        trigger: trigger.into(),
        results: outcome.outcomes.clone(),
        timestamp: Some(Utc::now()),
    }
}

/// Run a saved flow end to end: liveness marker, orchestration,
/// classification, report persistence and flow bookkeeping.
pub async fn execute_flow(
    coordinator: &StateCoordinator,
    executor: Arc<dyn StepExecutor>,
    emitter: EventEmitter,
    flow: &TestFlow,
    policy: ContinuationPolicy,
    trigger: &str,
) -> Result<TestReport, StepflowError> {
    let run_id = ids::new_id();
    coordinator.register_run(&run_id, &flow.name, Utc::now());
    coordinator.update_flow(&flow.id, FlowPatch::status(FlowStatus::Running));

    let orchestrator = Orchestrator::new(executor, emitter.clone(), policy);
    let outcome = match orchestrator.run(&flow.name, &flow.steps).await {
        Ok(outcome) => outcome,
        Err(e) => {
            coordinator.update_flow(&flow.id, FlowPatch::status(FlowStatus::Error));
            coordinator.unregister_run(&run_id);
            return Err(e);
        }
    };

    let verdict = classify(&outcome);
    emitter.emit(RunEvent::RunFinished {
        flow_name: flow.name.clone(),
        status: verdict.status,
        duration: verdict.duration.clone(),
    });

    let report = build_report(&flow.name, trigger, &outcome, &verdict);
    let report = coordinator.append_report(report);

    coordinator.update_flow(
        &flow.id,
        FlowPatch {
            status: Some(verdict.status.into()),
            last_run: Some(Utc::now()),
            duration: Some(verdict.duration.clone()),
            ..Default::default()
        },
    );
    coordinator.unregister_run(&run_id);

    Ok(report)
}
