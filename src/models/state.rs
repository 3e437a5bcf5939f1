use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::task::*;
use super::work_item::{WorkItem, WorkItemKind, WorkItemStatus};

/// Everything the router knows about the project.
///
/// The state is a flat record: the lifecycle phase is derived from
/// `completed` rather than stored, so it can never drift.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectState {
    /// Project inputs collected at kickoff (`project_name`, `target_users`, ...).
    /// Used as template parameters.
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    /// Free-form context agents can attach to the project.
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub completed: Vec<CompletedTask>,
    #[serde(default)]
    pub work_items: Vec<WorkItem>,
}

impl ProjectState {
    pub fn has_completed(&self, template: &str) -> bool {
        self.completed.iter().any(|t| t.name == template)
    }

    pub fn has_completed_key(&self, key: &str) -> bool {
        self.completed.iter().any(|t| t.key == key)
    }

    pub fn has_market_research(&self) -> bool {
        self.has_completed(MARKET_RESEARCH)
    }

    pub fn has_technical_architecture(&self) -> bool {
        self.has_completed(TECHNICAL_ARCHITECTURE)
    }

    pub fn has_implementation(&self) -> bool {
        IMPLEMENTATION_TASKS.iter().any(|t| self.has_completed(t))
    }

    pub fn has_review(&self) -> bool {
        REVIEW_TASKS.iter().any(|t| self.has_completed(t))
    }

    pub fn has_integration(&self) -> bool {
        self.has_completed(FINAL_INTEGRATION)
    }

    pub fn phase(&self) -> Phase {
        if !self.has_market_research() {
            Phase::Discovery
        } else if !self.has_technical_architecture() {
            Phase::Architecture
        } else if !self.has_implementation() {
            Phase::Implementation
        } else if !self.has_review() {
            Phase::Review
        } else if !self.has_integration() {
            Phase::Integration
        } else {
            Phase::Maintenance
        }
    }

    fn items(&self, kind: WorkItemKind, status: WorkItemStatus) -> Vec<&WorkItem> {
        self.work_items
            .iter()
            .filter(|i| i.kind == kind && i.status == status)
            .collect()
    }

    pub fn pending_bugs(&self) -> Vec<&WorkItem> {
        self.items(WorkItemKind::Bug, WorkItemStatus::Pending)
    }

    pub fn pending_features(&self) -> Vec<&WorkItem> {
        self.items(WorkItemKind::Feature, WorkItemStatus::Pending)
    }

    /// Number of completed tasks other than planning rounds.
    pub fn completed_work_count(&self) -> usize {
        self.completed
            .iter()
            .filter(|t| t.name != NEXT_STEPS_PLANNING)
            .count()
    }

    pub fn status(&self) -> ProjectStatus {
        ProjectStatus {
            phase: self.phase(),
            completed_tasks: self.completed.iter().map(|t| t.name.clone()).collect(),
            pending_bugs: self.pending_bugs().len(),
            pending_features: self.pending_features().len(),
            assigned_items: self
                .work_items
                .iter()
                .filter(|i| i.status == WorkItemStatus::Assigned)
                .count(),
            context: self.context.clone(),
        }
    }
}

/// Development lifecycle phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Discovery,
    Architecture,
    Implementation,
    Review,
    Integration,
    Maintenance,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Architecture => "architecture",
            Self::Implementation => "implementation",
            Self::Review => "review",
            Self::Integration => "integration",
            Self::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of the project handed to agents and surfaced by `status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectStatus {
    pub phase: Phase,
    pub completed_tasks: Vec<String>,
    pub pending_bugs: usize,
    pub pending_features: usize,
    pub assigned_items: usize,
    pub context: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn completed(name: &str) -> CompletedTask {
        CompletedTask {
            name: name.to_string(),
            key: name.to_string(),
            output: String::new(),
            agent: None,
            work_item_id: None,
            context: Default::default(),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn phase_follows_the_lifecycle() {
        let mut state = ProjectState::default();
        assert_eq!(state.phase(), Phase::Discovery);

        state.completed.push(completed(MARKET_RESEARCH));
        assert_eq!(state.phase(), Phase::Architecture);

        state.completed.push(completed(TECHNICAL_ARCHITECTURE));
        assert_eq!(state.phase(), Phase::Implementation);

        state.completed.push(completed(DEVOPS_SETUP));
        assert_eq!(state.phase(), Phase::Review);

        state.completed.push(completed(CODE_REVIEW));
        assert_eq!(state.phase(), Phase::Integration);

        state.completed.push(completed(FINAL_INTEGRATION));
        assert_eq!(state.phase(), Phase::Maintenance);
    }

    #[test]
    fn planning_rounds_do_not_count_as_work() {
        let mut state = ProjectState::default();
        state.completed.push(completed(MARKET_RESEARCH));
        state.completed.push(completed(NEXT_STEPS_PLANNING));
        assert_eq!(state.completed_work_count(), 1);
    }
}
