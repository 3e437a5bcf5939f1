//! Request and response types for MCP tools.

use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::{AssignedTask, CompletedTask, WorkItem};

// ============================================================
// Request Types
// ============================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetNextTaskRequest {
    #[schemars(
        description = "Your role: product_manager, staff_engineer, technical_skeptic, senior_engineer_frontend, senior_engineer_backend, or senior_engineer_devops"
    )]
    pub agent_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReportCompletionRequest {
    #[schemars(
        description = "The task key returned by get_next_task (e.g. 'bug_fix_task:<id>'), or a template name such as 'market_research_task'"
    )]
    pub task_name: String,
    #[schemars(description = "The deliverable produced for this task")]
    pub output: String,
    #[schemars(description = "Your role; used to resolve the right bug or feature when only a template name is given")]
    pub agent_name: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompleteAndGetNextRequest {
    #[schemars(description = "The task key or template name you just finished")]
    pub task_name: String,
    #[schemars(description = "The deliverable produced for this task")]
    pub output: String,
    #[schemars(description = "Your role")]
    pub agent_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WorkItemRequest {
    #[schemars(description = "What is wrong, or what should be built")]
    pub description: String,
    #[schemars(description = "low, medium (default), high, or critical")]
    pub priority: Option<String>,
    #[schemars(
        description = "Affected area, e.g. 'frontend', 'api', 'database'. Used to route the item to an engineer"
    )]
    pub component: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ResearchRequest {
    #[schemars(description = "The technical question to investigate")]
    pub topic: String,
}

// ============================================================
// Response Types
// ============================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskInfo {
    pub key: String,
    pub template: String,
    pub owner: String,
    pub description: String,
    pub expected_output: String,
    pub work_item_id: Option<String>,
}

impl From<AssignedTask> for TaskInfo {
    fn from(task: AssignedTask) -> Self {
        Self {
            key: task.key,
            template: task.template,
            owner: task.agent.as_str().to_string(),
            description: task.description.trim().to_string(),
            expected_output: task.expected_output.trim().to_string(),
            work_item_id: task.work_item_id.map(|id| id.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NextTaskResponse {
    pub agent: String,
    pub phase: String,
    pub task: Option<TaskInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompletionInfo {
    pub key: String,
    pub template: String,
    pub agent: Option<String>,
    pub resolved_work_item: Option<String>,
}

impl From<CompletedTask> for CompletionInfo {
    fn from(task: CompletedTask) -> Self {
        Self {
            key: task.key,
            template: task.name,
            agent: task.agent.map(|a| a.as_str().to_string()),
            resolved_work_item: task.work_item_id.map(|id| id.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteAndGetNextResponse {
    pub completed: CompletionInfo,
    pub next_task: Option<TaskInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WorkItemInfo {
    pub id: String,
    pub kind: String,
    pub description: String,
    pub priority: String,
    pub component: String,
    pub status: String,
    pub recommended_agent: String,
}

impl From<WorkItem> for WorkItemInfo {
    fn from(item: WorkItem) -> Self {
        Self {
            id: item.id.to_string(),
            kind: item.kind.as_str().to_string(),
            recommended_agent: item.recommended_agent().as_str().to_string(),
            description: item.description,
            priority: item.priority.as_str().to_string(),
            component: item.component,
            status: item.status.as_str().to_string(),
        }
    }
}
