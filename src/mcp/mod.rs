//! MCP server exposing task routing to external agents.

mod types;

use std::str::FromStr;

pub use types::*;

use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Serialize;

use crate::coordinator::Coordinator;
use crate::error::{ServiceError, TaskError};
use crate::models::*;

#[derive(Clone)]
pub struct McpServer {
    coordinator: Coordinator,
    tool_router: ToolRouter<Self>,
}

impl McpServer {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator,
            tool_router: Self::tool_router(),
        }
    }

    fn parse_agent(name: &str) -> Result<AgentRole, McpError> {
        AgentRole::from_str(name).map_err(|e| McpError::invalid_params(e.to_string(), None))
    }

    fn parse_priority(priority: Option<&str>) -> Result<Priority, McpError> {
        Ok(priority
            .map(Priority::from_str)
            .transpose()
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?
            .unwrap_or_default())
    }

    fn to_mcp_error(e: impl Into<ServiceError>) -> McpError {
        match e.into() {
            ServiceError::Task(e) if e.is_validation() => {
                McpError::invalid_params(e.to_string(), None)
            }
            e => McpError::internal_error(e.to_string(), None),
        }
    }

    fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    // ============================================================
    // Tool logic
    // ============================================================

    fn next_task(&self, agent_name: &str) -> Result<NextTaskResponse, McpError> {
        let agent = Self::parse_agent(agent_name)?;
        let (task, phase) = self
            .coordinator
            .update(|m| {
                let task = m.determine_next_task(agent)?;
                Ok::<_, TaskError>((task, m.state().phase()))
            })
            .map_err(Self::to_mcp_error)?;

        Ok(NextTaskResponse {
            agent: agent.as_str().to_string(),
            phase: phase.as_str().to_string(),
            task: task.map(TaskInfo::from),
        })
    }

    fn record_completion(
        &self,
        task_name: &str,
        output: &str,
        agent_name: Option<&str>,
    ) -> Result<CompletionInfo, McpError> {
        let agent = agent_name.map(Self::parse_agent).transpose()?;
        self.coordinator
            .update(|m| m.mark_task_completed(task_name, output, agent))
            .map(CompletionInfo::from)
            .map_err(Self::to_mcp_error)
    }

    fn complete_and_next(
        &self,
        task_name: &str,
        output: &str,
        agent_name: &str,
    ) -> Result<CompleteAndGetNextResponse, McpError> {
        let agent = Self::parse_agent(agent_name)?;
        let (completed, next) = self
            .coordinator
            .update(|m| {
                let completed = m.mark_task_completed(task_name, output, Some(agent))?;
                let next = m.determine_next_task(agent)?;
                Ok::<_, TaskError>((completed, next))
            })
            .map_err(Self::to_mcp_error)?;

        Ok(CompleteAndGetNextResponse {
            completed: completed.into(),
            next_task: next.map(TaskInfo::from),
        })
    }

    fn add_work_item(
        &self,
        kind: WorkItemKind,
        req: &WorkItemRequest,
    ) -> Result<WorkItemInfo, McpError> {
        if req.description.trim().is_empty() {
            return Err(McpError::invalid_params("description must not be empty", None));
        }
        let priority = Self::parse_priority(req.priority.as_deref())?;
        let component = req.component.as_deref().unwrap_or(DEFAULT_COMPONENT);

        self.coordinator
            .update(|m| {
                Ok::<_, TaskError>(match kind {
                    WorkItemKind::Bug => m.add_bug(&req.description, priority, component),
                    WorkItemKind::Feature => m.add_feature(&req.description, priority, component),
                })
            })
            .map(WorkItemInfo::from)
            .map_err(Self::to_mcp_error)
    }

    fn research_task(&self, topic: &str) -> Result<TaskInfo, McpError> {
        self.coordinator
            .read(|m| m.create_research_task(topic))
            .map(TaskInfo::from)
            .map_err(Self::to_mcp_error)
    }

    fn status(&self) -> ProjectStatus {
        self.coordinator.read(|m| m.get_project_status())
    }

    // ============================================================
    // Test helpers - expose tool logic for testing
    // ============================================================

    pub fn test_get_next_task(&self, agent_name: &str) -> Result<NextTaskResponse, McpError> {
        self.next_task(agent_name)
    }

    pub fn test_report_completion(
        &self,
        task_name: &str,
        output: &str,
        agent_name: Option<&str>,
    ) -> Result<CompletionInfo, McpError> {
        self.record_completion(task_name, output, agent_name)
    }

    pub fn test_complete_and_get_next(
        &self,
        task_name: &str,
        output: &str,
        agent_name: &str,
    ) -> Result<CompleteAndGetNextResponse, McpError> {
        self.complete_and_next(task_name, output, agent_name)
    }

    pub fn test_report_bug(
        &self,
        description: &str,
        priority: Option<&str>,
        component: Option<&str>,
    ) -> Result<WorkItemInfo, McpError> {
        self.add_work_item(
            WorkItemKind::Bug,
            &WorkItemRequest {
                description: description.to_string(),
                priority: priority.map(str::to_string),
                component: component.map(str::to_string),
            },
        )
    }

    pub fn test_request_feature(
        &self,
        description: &str,
        priority: Option<&str>,
        component: Option<&str>,
    ) -> Result<WorkItemInfo, McpError> {
        self.add_work_item(
            WorkItemKind::Feature,
            &WorkItemRequest {
                description: description.to_string(),
                priority: priority.map(str::to_string),
                component: component.map(str::to_string),
            },
        )
    }

    pub fn test_request_research(&self, topic: &str) -> Result<TaskInfo, McpError> {
        self.research_task(topic)
    }

    pub fn test_get_status(&self) -> ProjectStatus {
        self.status()
    }
}

#[tool_router]
impl McpServer {
    #[tool(
        description = "Ask what you should work on next. Call this FIRST and again after every completion. Returns the current project phase and either a task (key, owner, description, expected output) or null when there is nothing for your role right now. The owner may differ from you: during discovery every role is told the product manager owes market research. Side effect: a bug or feature handed out is claimed and will not be given to anyone else."
    )]
    async fn get_next_task(
        &self,
        params: Parameters<GetNextTaskRequest>,
    ) -> Result<CallToolResult, McpError> {
        let response = self.next_task(&params.0.agent_name)?;
        Self::json_result(&response)
    }

    #[tool(
        description = "Record that a task is finished. Pass the task key from get_next_task. Lifecycle tasks (research, architecture, implementation, review, integration) can only be completed once. Completing a bug_fix_task or feature_implementation_task resolves its work item."
    )]
    async fn report_completion(
        &self,
        params: Parameters<ReportCompletionRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let completed =
            self.record_completion(&req.task_name, &req.output, req.agent_name.as_deref())?;
        Self::json_result(&completed)
    }

    #[tool(
        description = "Record a finished task and immediately ask for your next one. Equivalent to report_completion followed by get_next_task, applied atomically."
    )]
    async fn complete_and_get_next(
        &self,
        params: Parameters<CompleteAndGetNextRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let response = self.complete_and_next(&req.task_name, &req.output, &req.agent_name)?;
        Self::json_result(&response)
    }

    #[tool(
        description = "Report a bug. The component decides which engineer picks it up: 'frontend', 'ui', 'react' and 'typescript' go to the frontend engineer; 'backend', 'api', 'server', 'python' and 'nodejs' go to the backend engineer; anything else is recommended to the staff engineer and taken by whichever feature engineer asks first. Devops never receives bugs or features. Returns the stored item with its recommended engineer."
    )]
    async fn report_bug(
        &self,
        params: Parameters<WorkItemRequest>,
    ) -> Result<CallToolResult, McpError> {
        let item = self.add_work_item(WorkItemKind::Bug, &params.0)?;
        Self::json_result(&item)
    }

    #[tool(
        description = "Request a new feature. Routed like report_bug. Feature engineers pick up features after all bugs claimable by them are handled."
    )]
    async fn request_feature(
        &self,
        params: Parameters<WorkItemRequest>,
    ) -> Result<CallToolResult, McpError> {
        let item = self.add_work_item(WorkItemKind::Feature, &params.0)?;
        Self::json_result(&item)
    }

    #[tool(
        description = "Create an ad-hoc technical research task for the staff engineer. The task is not queued; the returned key can be passed to report_completion once the research is done."
    )]
    async fn request_research(
        &self,
        params: Parameters<ResearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        let task = self.research_task(&params.0.topic)?;
        Self::json_result(&task)
    }

    #[tool(
        description = "Get a summary of the project: phase, names of completed task templates, open bug and feature counts, and the shared context."
    )]
    async fn get_status(&self) -> Result<CallToolResult, McpError> {
        Self::json_result(&self.status())
    }
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: rmcp::model::Implementation {
                name: "crewdev".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            instructions: Some(
                r#"crewdev coordinates a software team of six roles through a project lifecycle.

ROLES:
product_manager, staff_engineer, technical_skeptic,
senior_engineer_frontend, senior_engineer_backend, senior_engineer_devops

LIFECYCLE:
1. market_research_task (product manager)
2. technical_architecture_task (staff engineer)
3. frontend/backend/devops implementation (the matching engineer)
4. technical_skeptic_review_task and code_review_task
5. final_integration_task (staff engineer)
After integration the project is in maintenance: feature engineers fix bugs
and build requested features, and the product manager plans next steps.

AGENT WORKFLOW:
1. Call get_next_task with your role
2. If the owner is you, do the work; otherwise hand it to the owner
3. Call report_completion (or complete_and_get_next) with the task key
4. Report problems with report_bug and ideas with request_feature

IMPORTANT:
- Always complete tasks by the key you were given
- Lifecycle tasks are done once; completing them again is rejected
- A null task means nothing is needed from your role right now"#
                    .into(),
            ),
            ..Default::default()
        }
    }
}

pub async fn run_stdio_server(coordinator: Coordinator) -> anyhow::Result<()> {
    use tokio::io::{stdin, stdout};

    tracing::info!("Starting MCP server via stdio");

    let service = McpServer::new(coordinator);
    let server = service.serve((stdin(), stdout())).await?;

    let quit_reason = server.waiting().await?;
    tracing::info!("MCP server stopped: {:?}", quit_reason);

    Ok(())
}
