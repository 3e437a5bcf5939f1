use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent::AgentRole;

pub const MARKET_RESEARCH: &str = "market_research_task";
pub const TECHNICAL_ARCHITECTURE: &str = "technical_architecture_task";
pub const FRONTEND_IMPLEMENTATION: &str = "frontend_implementation_task";
pub const BACKEND_IMPLEMENTATION: &str = "backend_implementation_task";
pub const DEVOPS_SETUP: &str = "devops_setup_task";
pub const SKEPTIC_REVIEW: &str = "technical_skeptic_review_task";
pub const CODE_REVIEW: &str = "code_review_task";
pub const FINAL_INTEGRATION: &str = "final_integration_task";
pub const BUG_FIX: &str = "bug_fix_task";
pub const FEATURE_IMPLEMENTATION: &str = "feature_implementation_task";
pub const TECHNICAL_RESEARCH: &str = "technical_research_task";
pub const NEXT_STEPS_PLANNING: &str = "next_steps_planning_task";

pub const IMPLEMENTATION_TASKS: [&str; 3] =
    [FRONTEND_IMPLEMENTATION, BACKEND_IMPLEMENTATION, DEVOPS_SETUP];
pub const REVIEW_TASKS: [&str; 2] = [SKEPTIC_REVIEW, CODE_REVIEW];

/// Templates every catalog must define for the router to work.
pub const REQUIRED_TEMPLATES: [&str; 12] = [
    MARKET_RESEARCH,
    TECHNICAL_ARCHITECTURE,
    FRONTEND_IMPLEMENTATION,
    BACKEND_IMPLEMENTATION,
    DEVOPS_SETUP,
    SKEPTIC_REVIEW,
    CODE_REVIEW,
    FINAL_INTEGRATION,
    BUG_FIX,
    FEATURE_IMPLEMENTATION,
    TECHNICAL_RESEARCH,
    NEXT_STEPS_PLANNING,
];

/// Lifecycle templates run at most once per project. Everything else is
/// instantiated per work item, topic or planning round.
pub fn is_once_only(template: &str) -> bool {
    !matches!(
        template,
        BUG_FIX | FEATURE_IMPLEMENTATION | TECHNICAL_RESEARCH | NEXT_STEPS_PLANNING
    )
}

/// A rendered task handed to an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssignedTask {
    /// Instance key used to report completion. Equal to the template name
    /// for lifecycle tasks; suffixed for repeatable ones.
    pub key: String,
    pub template: String,
    /// The agent responsible for carrying the task out.
    pub agent: AgentRole,
    pub description: String,
    pub expected_output: String,
    /// Snapshot of the project state at creation time, for the agent prompt.
    pub context: String,
    /// The bug or feature this task addresses, if any.
    pub work_item_id: Option<Uuid>,
}

/// A record of finished work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletedTask {
    /// Template name, e.g. `market_research_task`.
    pub name: String,
    pub key: String,
    pub output: String,
    pub agent: Option<AgentRole>,
    pub work_item_id: Option<Uuid>,
    /// Project context at the time of completion.
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
    pub completed_at: DateTime<Utc>,
}
