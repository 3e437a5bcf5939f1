use std::str::FromStr;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::coordinator::Coordinator;
use crate::error::{ServiceError, TaskError};
use crate::models::*;

// ============================================================
// Request / Response Types
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextTaskRequest {
    pub agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextTaskResponse {
    /// `None` when the agent has nothing to do right now.
    pub task: Option<AssignedTask>,
    pub phase: Phase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteTaskRequest {
    /// Template name or task key.
    pub task: String,
    pub output: String,
    #[serde(default)]
    pub agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItemRequest {
    pub description: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItemResponse {
    pub item: WorkItem,
    pub recommended_agent: AgentRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub name: String,
    pub agent: Option<AgentRole>,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct WorkItemQuery {
    pub status: Option<String>,
}

// ============================================================
// Error Handling
// ============================================================

/// Map a service error to a response.
///
/// Caller mistakes are returned as-is; storage and configuration failures
/// are logged and replaced with a generic message.
fn service_error(e: ServiceError) -> (StatusCode, String) {
    match e {
        ServiceError::Task(e @ (TaskError::UnknownTemplate(_) | TaskError::UnknownTask(_))) => {
            tracing::warn!("Not found: {}", e);
            (StatusCode::NOT_FOUND, e.to_string())
        }
        ServiceError::Task(e) if e.is_validation() => {
            tracing::warn!("Validation error: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        e => {
            tracing::error!("Internal error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

fn bad_request(e: TaskError) -> (StatusCode, String) {
    service_error(e.into())
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Project
// ============================================================

pub async fn get_status(State(coordinator): State<Coordinator>) -> Json<ProjectStatus> {
    Json(coordinator.read(|m| m.get_project_status()))
}

pub async fn update_state(
    State(coordinator): State<Coordinator>,
    Json(entries): Json<serde_json::Map<String, serde_json::Value>>,
) -> Result<Json<ProjectStatus>, (StatusCode, String)> {
    coordinator
        .update(|m| {
            m.update_project_state(entries);
            Ok::<_, TaskError>(m.get_project_status())
        })
        .map(Json)
        .map_err(service_error)
}

pub async fn list_templates(State(coordinator): State<Coordinator>) -> Json<Vec<TemplateSummary>> {
    let templates = coordinator.read(|m| {
        m.catalog()
            .iter()
            .map(|(name, t)| TemplateSummary {
                name: name.to_string(),
                agent: t.agent,
                description: t.description.trim().to_string(),
            })
            .collect()
    });
    Json(templates)
}

// ============================================================
// Tasks
// ============================================================

pub async fn next_task(
    State(coordinator): State<Coordinator>,
    Json(input): Json<NextTaskRequest>,
) -> Result<Json<NextTaskResponse>, (StatusCode, String)> {
    let agent = AgentRole::from_str(&input.agent).map_err(bad_request)?;
    coordinator
        .update(|m| {
            let task = m.determine_next_task(agent)?;
            Ok::<_, TaskError>(NextTaskResponse {
                task,
                phase: m.state().phase(),
            })
        })
        .map(Json)
        .map_err(service_error)
}

pub async fn complete_task(
    State(coordinator): State<Coordinator>,
    Json(input): Json<CompleteTaskRequest>,
) -> Result<Json<CompletedTask>, (StatusCode, String)> {
    let agent = input
        .agent
        .as_deref()
        .map(AgentRole::from_str)
        .transpose()
        .map_err(bad_request)?;
    coordinator
        .update(|m| m.mark_task_completed(&input.task, &input.output, agent))
        .map(Json)
        .map_err(service_error)
}

pub async fn create_research_task(
    State(coordinator): State<Coordinator>,
    Json(input): Json<ResearchRequest>,
) -> Result<(StatusCode, Json<AssignedTask>), (StatusCode, String)> {
    coordinator
        .read(|m| m.create_research_task(&input.topic))
        .map(|t| (StatusCode::CREATED, Json(t)))
        .map_err(bad_request)
}

// ============================================================
// Work items
// ============================================================

pub async fn add_bug(
    State(coordinator): State<Coordinator>,
    Json(input): Json<WorkItemRequest>,
) -> Result<(StatusCode, Json<WorkItemResponse>), (StatusCode, String)> {
    add_work_item(coordinator, WorkItemKind::Bug, input)
}

pub async fn add_feature(
    State(coordinator): State<Coordinator>,
    Json(input): Json<WorkItemRequest>,
) -> Result<(StatusCode, Json<WorkItemResponse>), (StatusCode, String)> {
    add_work_item(coordinator, WorkItemKind::Feature, input)
}

fn add_work_item(
    coordinator: Coordinator,
    kind: WorkItemKind,
    input: WorkItemRequest,
) -> Result<(StatusCode, Json<WorkItemResponse>), (StatusCode, String)> {
    if input.description.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "description must not be empty".to_string(),
        ));
    }
    let priority = input
        .priority
        .as_deref()
        .map(Priority::from_str)
        .transpose()
        .map_err(bad_request)?
        .unwrap_or_default();
    let component = input.component.as_deref().unwrap_or(DEFAULT_COMPONENT);

    coordinator
        .update(|m| {
            Ok::<_, TaskError>(match kind {
                WorkItemKind::Bug => m.add_bug(&input.description, priority, component),
                WorkItemKind::Feature => m.add_feature(&input.description, priority, component),
            })
        })
        .map(|item| {
            let recommended_agent = item.recommended_agent();
            (
                StatusCode::CREATED,
                Json(WorkItemResponse {
                    item,
                    recommended_agent,
                }),
            )
        })
        .map_err(service_error)
}

pub async fn list_work_items(
    State(coordinator): State<Coordinator>,
    Query(query): Query<WorkItemQuery>,
) -> Result<Json<Vec<WorkItem>>, (StatusCode, String)> {
    let status = query
        .status
        .as_deref()
        .map(WorkItemStatus::from_str)
        .transpose()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let items = coordinator.read(|m| {
        m.state()
            .work_items
            .iter()
            .filter(|i| status.is_none_or(|s| i.status == s))
            .cloned()
            .collect()
    });
    Ok(Json(items))
}
