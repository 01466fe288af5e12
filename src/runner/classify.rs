//! Pure classification of a finished run.

use crate::model::RunStatus;

use super::orchestrator::RunOutcome;

/// Verdict derived from a run outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunVerdict {
    pub status: RunStatus,
    pub duration: String,
}

/// Fold a run outcome into a single verdict.
///
/// A run is a success only when every configured step was attempted and
/// every attempted step passed. A partially executed run is an error even
/// if all of its attempted steps succeeded.
pub fn classify(outcome: &RunOutcome) -> RunVerdict {
    let complete = outcome.completed_steps == outcome.total_steps
        && outcome.successful_steps == outcome.total_steps;

    let status = if complete && outcome.error.is_none() {
        RunStatus::Success
    } else {
        RunStatus::Error
    };

    RunVerdict {
        status,
        duration: format_duration(outcome.elapsed_ms()),
    }
}

/// Render a millisecond count the way reports display durations:
/// sub-second in milliseconds, sub-minute in whole seconds, longer runs
/// as minutes and seconds.
pub fn format_duration(ms: i64) -> String {
    let ms = ms.max(0);
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{}s", ms / 1000)
    } else {
        format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    use crate::model::{RunStepOutcome, Step, StepKind, StepResult};

    fn outcome_with_counts(total: usize, completed: usize, successful: usize) -> RunOutcome {
        RunOutcome {
            outcomes: Vec::new(),
            total_steps: total,
            successful_steps: successful,
            completed_steps: completed,
            error: None,
        }
    }

    #[test]
    fn test_classification_totality() {
        for total in 0..=3usize {
            for completed in 0..=total {
                for successful in 0..=completed {
                    let verdict = classify(&outcome_with_counts(total, completed, successful));
                    let expected = if completed == total && successful == total {
                        RunStatus::Success
                    } else {
                        RunStatus::Error
                    };
                    assert_eq!(
                        verdict.status, expected,
                        "total={} completed={} successful={}",
                        total, completed, successful
                    );
                }
            }
        }
    }

    #[test]
    fn test_partial_run_with_all_passes_is_error() {
        let verdict = classify(&outcome_with_counts(3, 2, 2));
        assert_eq!(verdict.status, RunStatus::Error);
    }

    #[test]
    fn test_run_level_error_forces_error_status() {
        let mut outcome = outcome_with_counts(0, 0, 0);
        outcome.error = Some("cannot reach browser backend".to_string());
        assert_eq!(classify(&outcome).status, RunStatus::Error);
    }

    #[test]
    fn test_duration_golden_values() {
        assert_eq!(format_duration(0), "0ms");
        assert_eq!(format_duration(450), "450ms");
        assert_eq!(format_duration(999), "999ms");
        assert_eq!(format_duration(1000), "1s");
        assert_eq!(format_duration(1999), "1s");
        assert_eq!(format_duration(59_999), "59s");
        assert_eq!(format_duration(60_000), "1m 0s");
        assert_eq!(format_duration(125_000), "2m 5s");
        assert_eq!(format_duration(-5), "0ms");
    }

    fn outcome_at(offset_ms: i64, base: chrono::DateTime<Utc>) -> RunStepOutcome {
        RunStepOutcome {
            step: Step::new(StepKind::Refresh, ""),
            result: StepResult::ok("ok"),
            timestamp: base + Duration::milliseconds(offset_ms),
        }
    }

    #[test]
    fn test_duration_spans_first_to_last_outcome() {
        let base = Utc::now();
        let outcome = RunOutcome {
            outcomes: vec![outcome_at(0, base), outcome_at(700, base), outcome_at(2400, base)],
            total_steps: 3,
            successful_steps: 3,
            completed_steps: 3,
            error: None,
        };
        let verdict = classify(&outcome);
        assert_eq!(verdict.status, RunStatus::Success);
        assert_eq!(verdict.duration, "2s");
    }

    #[test]
    fn test_duration_zero_with_single_outcome() {
        let base = Utc::now();
        let outcome = RunOutcome {
            outcomes: vec![outcome_at(0, base)],
            total_steps: 1,
            successful_steps: 1,
            completed_steps: 1,
            error: None,
        };
        assert_eq!(classify(&outcome).duration, "0ms");
    }
}
