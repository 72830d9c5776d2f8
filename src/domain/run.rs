//! Run reports.
//!
//! A run is a single execution of an [`ExecutionPlan`] against a context.
//! The report is what the caller gets back: the plan that actually ran,
//! per-task status, produced slot contents and the trace of what happened.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::core::ExecutionPlan;

use super::history::HistoryEntry;
use super::task::TaskStatus;
use super::thought::ThoughtStep;

/// Outcome of one orchestration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,

    /// The plan that was executed
    pub plan: ExecutionPlan,

    /// Status of each task, in plan order
    pub statuses: Vec<(String, TaskStatus)>,

    /// Contents of every slot written by a completed task
    pub outputs: BTreeMap<String, Value>,

    /// First task that failed, if any
    pub failed_task: Option<String>,

    /// Every failure as (task id, error message)
    pub failures: Vec<(String, String)>,

    /// Plan tasks that never ran, in plan order
    pub remaining: Vec<String>,

    /// History entries recorded during this run
    pub history: Vec<HistoryEntry>,

    /// Confidence chain after the run, when tracking was enabled
    pub thoughts: Option<Vec<ThoughtStep>>,

    /// Ids of steps below the configured threshold
    pub low_confidence_steps: Vec<u64>,

    pub state: RunState,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,
}

impl RunReport {
    /// Status of a task by id
    pub fn status_of(&self, task_id: &str) -> Option<TaskStatus> {
        self.statuses
            .iter()
            .find(|(id, _)| id == task_id)
            .map(|(_, status)| *status)
    }

    /// Ids of tasks with the given status, in plan order
    pub fn tasks_with_status(&self, status: TaskStatus) -> Vec<&str> {
        self.statuses
            .iter()
            .filter(|(_, s)| *s == status)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Check if every task completed
    pub fn is_complete(&self) -> bool {
        self.state == RunState::Completed
    }

    /// Whether any recorded step fell below the confidence threshold
    pub fn needs_review(&self) -> bool {
        !self.low_confidence_steps.is_empty()
    }
}

/// Final state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Every task is Done
    Completed,

    /// At least one task failed or was blocked
    Partial,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(statuses: Vec<(&str, TaskStatus)>, state: RunState) -> RunReport {
        let now = Utc::now();
        RunReport {
            run_id: Uuid::new_v4(),
            plan: ExecutionPlan::default(),
            statuses: statuses
                .into_iter()
                .map(|(id, s)| (id.to_string(), s))
                .collect(),
            outputs: BTreeMap::new(),
            failed_task: None,
            failures: Vec::new(),
            remaining: Vec::new(),
            history: Vec::new(),
            thoughts: None,
            low_confidence_steps: Vec::new(),
            state,
            started_at: now,
            completed_at: now,
        }
    }

    #[test]
    fn test_status_lookup() {
        let report = report(
            vec![
                ("a", TaskStatus::Failed),
                ("b", TaskStatus::Blocked),
                ("c", TaskStatus::Blocked),
            ],
            RunState::Partial,
        );

        assert_eq!(report.status_of("a"), Some(TaskStatus::Failed));
        assert_eq!(report.status_of("missing"), None);
        assert_eq!(report.tasks_with_status(TaskStatus::Blocked), vec!["b", "c"]);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_report_serialization() {
        let report = report(vec![("a", TaskStatus::Done)], RunState::Completed);

        let json = serde_json::to_string(&report).unwrap();
        let parsed: RunReport = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.state, RunState::Completed);
        assert_eq!(parsed.status_of("a"), Some(TaskStatus::Done));
    }
}
