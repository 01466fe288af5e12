//! Bounded, append-only log of completed run reports.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::model::TestReport;
use crate::utils::ids;

/// Hard cap on retained reports. Holds after any sequence of appends.
pub const REPORT_CAP: usize = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportStore {
    reports: Vec<TestReport>,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_reports(reports: Vec<TestReport>) -> Self {
        Self { reports }
    }

    /// Prepend a report, assigning id and timestamp when absent, and drop
    /// the oldest entries beyond the cap.
    pub fn append(&mut self, mut report: TestReport) -> TestReport {
        if report.id.is_empty() {
            report.id = ids::new_id();
        }
        if report.timestamp.is_none() {
            report.timestamp = Some(Utc::now());
        }

        self.reports.insert(0, report.clone());
        self.reports.truncate(REPORT_CAP);
        report
    }

    /// Newest first.
    pub fn list(&self) -> &[TestReport] {
        &self.reports
    }

    pub fn get_by_id(&self, id: &str) -> Option<&TestReport> {
        self.reports.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RunStatus;

    fn report(name: &str) -> TestReport {
        TestReport {
            id: String::new(),
            test_name: name.to_string(),
            status: RunStatus::Success,
            duration: "1s".to_string(),
            total_steps: 2,
            passed_steps: 2,
            completed_steps: 2,
            trigger: "manual".to_string(),
            results: Vec::new(),
            timestamp: None,
        }
    }

    #[test]
    fn test_append_assigns_id_and_timestamp_when_absent() {
        let mut store = ReportStore::new();
        let appended = store.append(report("Login"));
        assert!(!appended.id.is_empty());
        assert!(appended.timestamp.is_some());
    }

    #[test]
    fn test_append_keeps_existing_id_and_timestamp() {
        let mut store = ReportStore::new();
        let mut r = report("Login");
        r.id = "fixed-id".to_string();
        let stamp = Utc::now();
        r.timestamp = Some(stamp);

        let appended = store.append(r);
        assert_eq!(appended.id, "fixed-id");
        assert_eq!(appended.timestamp, Some(stamp));
    }

    #[test]
    fn test_newest_first_ordering() {
        let mut store = ReportStore::new();
        store.append(report("first"));
        store.append(report("second"));
        store.append(report("third"));

        let names: Vec<&str> = store.list().iter().map(|r| r.test_name.as_str()).collect();
        assert_eq!(names, vec!["third", "second", "first"]);
    }

    #[test]
    fn test_cap_retains_the_most_recent_hundred() {
        let mut store = ReportStore::new();
        let mut appended_ids = Vec::new();
        for i in 0..135 {
            let appended = store.append(report(&format!("run-{}", i)));
            appended_ids.push(appended.id);
        }

        assert_eq!(store.len(), REPORT_CAP);

        // Survivors are exactly the last 100 appends, in reverse order.
        let expected: Vec<&String> = appended_ids.iter().rev().take(REPORT_CAP).collect();
        let actual: Vec<&String> = store.list().iter().map(|r| &r.id).collect();
        assert_eq!(actual, expected);
        assert_eq!(store.list()[0].test_name, "run-134");
        assert_eq!(store.list()[REPORT_CAP - 1].test_name, "run-35");
    }
}
