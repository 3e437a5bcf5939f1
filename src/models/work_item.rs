use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent::{recommended_agent, AgentRole};
use crate::error::TaskError;

/// A bug report or feature request waiting for an engineer.
///
/// Work items move `Pending` → `Assigned` when the router hands them out and
/// `Assigned` → `Resolved` when the matching task is reported complete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkItem {
    pub id: Uuid,
    pub kind: WorkItemKind,
    pub description: String,
    pub priority: Priority,
    /// Area of the codebase, e.g. `frontend` or `api`. Drives routing.
    pub component: String,
    pub status: WorkItemStatus,
    pub assigned_to: Option<AgentRole>,
    pub created_at: DateTime<Utc>,
}

impl WorkItem {
    pub fn new(
        kind: WorkItemKind,
        description: impl Into<String>,
        priority: Priority,
        component: impl Into<String>,
    ) -> Self {
        let component = component.into();
        Self {
            id: Uuid::new_v4(),
            kind,
            description: description.into(),
            priority,
            component: if component.trim().is_empty() {
                DEFAULT_COMPONENT.to_string()
            } else {
                component
            },
            status: WorkItemStatus::Pending,
            assigned_to: None,
            created_at: Utc::now(),
        }
    }

    pub fn recommended_agent(&self) -> AgentRole {
        recommended_agent(&self.component)
    }

    /// Whether `agent` may pick this item up.
    ///
    /// Items with a clear component go to the matching engineer; items
    /// routed to the staff engineer can be taken by either feature engineer.
    pub fn is_claimable_by(&self, agent: AgentRole) -> bool {
        if self.status != WorkItemStatus::Pending {
            return false;
        }
        let routed = self.recommended_agent();
        routed == agent || (routed == AgentRole::StaffEngineer && agent.is_feature_engineer())
    }
}

pub const DEFAULT_COMPONENT: &str = "unknown";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemKind {
    Bug,
    Feature,
}

impl WorkItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bug => "bug",
            Self::Feature => "feature",
        }
    }
}

impl FromStr for WorkItemKind {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bug" => Ok(Self::Bug),
            "feature" => Ok(Self::Feature),
            other => Err(TaskError::Config(format!("unknown work item kind '{}'", other))),
        }
    }
}

/// - `Pending`: Waiting for an engineer
/// - `Assigned`: Handed to an engineer, not yet reported done
/// - `Resolved`: Fix or feature reported complete
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    Pending,
    Assigned,
    Resolved,
}

impl WorkItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::Resolved => "resolved",
        }
    }
}

impl FromStr for WorkItemStatus {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "assigned" => Ok(Self::Assigned),
            "resolved" => Ok(Self::Resolved),
            other => Err(TaskError::Config(format!("unknown work item status '{}'", other))),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(TaskError::InvalidPriority(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities_order_from_low_to_critical() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::High < Priority::Critical);
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn priority_parsing_ignores_case() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn blank_component_falls_back_to_unknown() {
        let item = WorkItem::new(WorkItemKind::Bug, "crash", Priority::Low, "  ");
        assert_eq!(item.component, DEFAULT_COMPONENT);
        assert_eq!(item.recommended_agent(), AgentRole::StaffEngineer);
    }

    #[test]
    fn unclear_items_are_claimable_by_either_feature_engineer() {
        let item = WorkItem::new(WorkItemKind::Feature, "search", Priority::High, "database");
        assert!(item.is_claimable_by(AgentRole::SeniorEngineerFrontend));
        assert!(item.is_claimable_by(AgentRole::SeniorEngineerBackend));
        assert!(item.is_claimable_by(AgentRole::StaffEngineer));
        assert!(!item.is_claimable_by(AgentRole::TechnicalSkeptic));
    }

    #[test]
    fn routed_items_only_go_to_their_engineer() {
        let item = WorkItem::new(WorkItemKind::Bug, "button", Priority::High, "ui");
        assert!(item.is_claimable_by(AgentRole::SeniorEngineerFrontend));
        assert!(!item.is_claimable_by(AgentRole::SeniorEngineerBackend));
    }
}
