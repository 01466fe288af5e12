//! Transfer documents for sharing flows and reports as standalone JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StepflowError;
use crate::model::{RunStatus, RunStepOutcome, Step, TestFlow, TestReport};
use crate::utils::ids;

pub const EXPORT_VERSION: &str = "1.0";

/// Shareable flow document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowExport {
    pub test_name: String,
    pub steps: Vec<Step>,
    pub export_date: DateTime<Utc>,
    pub version: String,
}

/// Shareable report document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportExport {
    pub test_name: String,
    pub status: RunStatus,
    pub duration: String,
    pub date: String,
    pub time: String,
    pub passed_steps: usize,
    pub total_steps: usize,
    pub completed_steps: usize,
    pub trigger: String,
    pub results: Vec<RunStepOutcome>,
    pub export_date: DateTime<Utc>,
}

pub fn export_flow(flow: &TestFlow) -> FlowExport {
    FlowExport {
        test_name: flow.name.clone(),
        steps: flow.steps.clone(),
        export_date: Utc::now(),
        version: EXPORT_VERSION.to_string(),
    }
}

pub fn export_report(report: &TestReport) -> ReportExport {
    let stamp = report.timestamp.unwrap_or_else(Utc::now);
    ReportExport {
        test_name: report.test_name.clone(),
        status: report.status,
        duration: report.duration.clone(),
        date: stamp.format("%Y-%m-%d").to_string(),
        time: stamp.format("%H:%M:%S").to_string(),
        passed_steps: report.passed_steps,
        total_steps: report.total_steps,
        completed_steps: report.completed_steps,
        trigger: report.trigger.clone(),
        results: report.results.clone(),
        export_date: Utc::now(),
    }
}

/// Rebuild a flow from an exported document.
///
/// Rejects documents missing `testName` or whose `steps` is not a
/// sequence. Step ids are regenerated so an import never collides with
/// the flow it was exported from.
pub fn import_flow(doc: &Value) -> Result<TestFlow, StepflowError> {
    let name = doc
        .get("testName")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| StepflowError::validation("import document is missing testName"))?;

    let steps_value = doc
        .get("steps")
        .ok_or_else(|| StepflowError::validation("import document is missing steps"))?;
    if !steps_value.is_array() {
        return Err(StepflowError::validation(
            "import document steps must be a sequence",
        ));
    }

    let mut steps: Vec<Step> = serde_json::from_value(steps_value.clone())
        .map_err(|e| StepflowError::validation(format!("malformed step in import: {}", e)))?;
    for step in &mut steps {
        step.id = ids::new_id();
    }

    Ok(TestFlow::new(name, steps, "chromium"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StepKind;
    use serde_json::json;

    fn sample_flow() -> TestFlow {
        let steps = vec![
            Step::new(StepKind::Navigate, "open").with_config("url", "https://example.com"),
            Step::new(StepKind::Input, "email")
                .with_config("selector", "#email")
                .with_config("text", "user@example.com"),
            Step::new(StepKind::Verify, "banner").with_config("selector", ".welcome"),
        ];
        TestFlow::new("Signup", steps, "chromium")
    }

    #[test]
    fn test_flow_round_trip_preserves_steps() {
        let flow = sample_flow();
        let doc = serde_json::to_value(export_flow(&flow)).unwrap();
        let imported = import_flow(&doc).unwrap();

        assert_eq!(imported.name, flow.name);
        assert_eq!(imported.steps.len(), flow.steps.len());
        for (original, imported) in flow.steps.iter().zip(imported.steps.iter()) {
            assert_eq!(original.kind, imported.kind);
            assert_eq!(original.name, imported.name);
            assert_eq!(original.config, imported.config);
            assert_ne!(original.id, imported.id);
        }
        assert_ne!(imported.id, flow.id);
    }

    #[test]
    fn test_export_carries_version() {
        let doc = serde_json::to_value(export_flow(&sample_flow())).unwrap();
        assert_eq!(doc.get("version"), Some(&json!(EXPORT_VERSION)));
        assert!(doc.get("exportDate").is_some());
    }

    #[test]
    fn test_import_rejects_missing_test_name() {
        let doc = json!({ "steps": [] });
        assert!(matches!(
            import_flow(&doc),
            Err(StepflowError::Validation(_))
        ));
    }

    #[test]
    fn test_import_rejects_non_sequence_steps() {
        let doc = json!({ "testName": "Broken", "steps": "not a list" });
        assert!(matches!(
            import_flow(&doc),
            Err(StepflowError::Validation(_))
        ));
    }

    #[test]
    fn test_report_export_splits_timestamp() {
        let report = TestReport {
            id: "r-1".to_string(),
            test_name: "Signup".to_string(),
            status: RunStatus::Error,
            duration: "2m 5s".to_string(),
            total_steps: 3,
            passed_steps: 1,
            completed_steps: 2,
            trigger: "manual".to_string(),
            results: Vec::new(),
            timestamp: Some("2026-08-05T14:30:05Z".parse().unwrap()),
        };

        let exported = export_report(&report);
        assert_eq!(exported.date, "2026-08-05");
        assert_eq!(exported.time, "14:30:05");
        assert_eq!(exported.passed_steps, 1);
        assert_eq!(exported.completed_steps, 2);
        assert_eq!(exported.total_steps, 3);
    }
}
