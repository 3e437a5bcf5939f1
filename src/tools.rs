//! Text actions for agents.
//!
//! Agents talk in prose, so each action takes plain arguments and returns a
//! message meant to be pasted into the agent's context. Failures come back
//! as error messages rather than `Err`, so a bad call never aborts a run.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::coordinator::Coordinator;
use crate::error::{ServiceError, TaskError};
use crate::models::*;

const OUTPUT_PREVIEW_CHARS: usize = 100;

/// One call from an agent, as JSON: `{"action": "add_bug", "description": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ToolAction {
    GetNextTask {
        agent_name: String,
    },
    ReportCompletion {
        task_name: String,
        output: String,
        #[serde(default)]
        agent_name: Option<String>,
    },
    CompleteAndGetNext {
        task_name: String,
        output: String,
        agent_name: String,
    },
    AddBug {
        description: String,
        #[serde(default)]
        priority: Option<String>,
        #[serde(default)]
        component: Option<String>,
    },
    AddFeature {
        description: String,
        #[serde(default)]
        priority: Option<String>,
        #[serde(default)]
        component: Option<String>,
    },
    GetStatus,
}

pub const AVAILABLE_ACTIONS: &str =
    "get_next_task, report_completion, complete_and_get_next, add_bug, add_feature, get_status";

/// Agent-facing front of the task manager.
#[derive(Clone)]
pub struct TaskTools {
    coordinator: Coordinator,
}

impl TaskTools {
    pub fn new(coordinator: Coordinator) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Run an action encoded as JSON.
    pub fn run_json(&self, json: &str) -> String {
        match serde_json::from_str::<ToolAction>(json) {
            Ok(action) => self.run(action),
            Err(e) => format!(
                "Unknown or malformed action: {}. Available actions: {}",
                e, AVAILABLE_ACTIONS
            ),
        }
    }

    pub fn run(&self, action: ToolAction) -> String {
        let label = action_label(&action);
        let result = match action {
            ToolAction::GetNextTask { agent_name } => self.get_next_task(&agent_name),
            ToolAction::ReportCompletion {
                task_name,
                output,
                agent_name,
            } => self.report_completion(&task_name, &output, agent_name.as_deref()),
            ToolAction::CompleteAndGetNext {
                task_name,
                output,
                agent_name,
            } => self.complete_and_get_next(&task_name, &output, &agent_name),
            ToolAction::AddBug {
                description,
                priority,
                component,
            } => self.report_bug(&description, priority.as_deref(), component.as_deref()),
            ToolAction::AddFeature {
                description,
                priority,
                component,
            } => self.request_feature(&description, priority.as_deref(), component.as_deref()),
            ToolAction::GetStatus => self.get_status(),
        };

        result.unwrap_or_else(|e| {
            tracing::warn!("Tool action '{}' failed: {}", label, e);
            format!("Error executing action '{}': {}", label, e)
        })
    }

    pub fn get_next_task(&self, agent_name: &str) -> Result<String, ServiceError> {
        let agent = AgentRole::from_str(agent_name)?;
        let task = self.coordinator.update(|m| m.determine_next_task(agent))?;
        Ok(match task {
            Some(task) => describe_task("Next task assigned", &task),
            None => "No specific task needed at this time. Consider reporting completion of current work or requesting next steps.".to_string(),
        })
    }

    pub fn report_completion(
        &self,
        task_name: &str,
        output: &str,
        agent_name: Option<&str>,
    ) -> Result<String, ServiceError> {
        let agent = agent_name.map(AgentRole::from_str).transpose()?;
        let record = self
            .coordinator
            .update(|m| m.mark_task_completed(task_name, output, agent))?;
        Ok(format!(
            "Task '{}' marked as completed. Output: {}",
            record.key,
            preview(output)
        ))
    }

    pub fn complete_and_get_next(
        &self,
        task_name: &str,
        output: &str,
        agent_name: &str,
    ) -> Result<String, ServiceError> {
        let agent = AgentRole::from_str(agent_name)?;
        let (record, next) = self.coordinator.update(|m| {
            let record = m.mark_task_completed(task_name, output, Some(agent))?;
            let next = m.determine_next_task(agent)?;
            Ok::<_, TaskError>((record, next))
        })?;

        Ok(match next {
            Some(task) => format!(
                "Task '{}' completed successfully!\n\n{}",
                record.key,
                describe_task("Next task", &task)
            ),
            None => format!(
                "Task '{}' completed successfully!\n\nNo immediate next task. Consider:\n- Reporting bugs or issues found\n- Requesting new features\n- Asking for next steps from the product manager",
                record.key
            ),
        })
    }

    pub fn report_bug(
        &self,
        description: &str,
        priority: Option<&str>,
        component: Option<&str>,
    ) -> Result<String, ServiceError> {
        let item = self.add_item(WorkItemKind::Bug, description, priority, component)?;
        Ok(format!(
            "Bug reported and added to project:\n{}",
            describe_item(&item)
        ))
    }

    pub fn request_feature(
        &self,
        description: &str,
        priority: Option<&str>,
        component: Option<&str>,
    ) -> Result<String, ServiceError> {
        let item = self.add_item(WorkItemKind::Feature, description, priority, component)?;
        Ok(format!(
            "Feature request added to project:\n{}",
            describe_item(&item)
        ))
    }

    fn add_item(
        &self,
        kind: WorkItemKind,
        description: &str,
        priority: Option<&str>,
        component: Option<&str>,
    ) -> Result<WorkItem, ServiceError> {
        if description.trim().is_empty() {
            return Err(TaskError::Config("description must not be empty".to_string()).into());
        }
        let priority = priority.map(Priority::from_str).transpose()?.unwrap_or_default();
        let component = component.unwrap_or(DEFAULT_COMPONENT);

        self.coordinator.update(|m| {
            Ok::<_, TaskError>(match kind {
                WorkItemKind::Bug => m.add_bug(description, priority, component),
                WorkItemKind::Feature => m.add_feature(description, priority, component),
            })
        })
    }

    pub fn get_status(&self) -> Result<String, ServiceError> {
        let status = self.coordinator.read(|m| m.get_project_status());
        serde_json::to_string_pretty(&status).map_err(|e| ServiceError::Storage(e.into()))
    }
}

fn action_label(action: &ToolAction) -> &'static str {
    match action {
        ToolAction::GetNextTask { .. } => "get_next_task",
        ToolAction::ReportCompletion { .. } => "report_completion",
        ToolAction::CompleteAndGetNext { .. } => "complete_and_get_next",
        ToolAction::AddBug { .. } => "add_bug",
        ToolAction::AddFeature { .. } => "add_feature",
        ToolAction::GetStatus => "get_status",
    }
}

pub fn describe_task(heading: &str, task: &AssignedTask) -> String {
    format!(
        "{} ({}, owner: {}): {}\nExpected output: {}",
        heading,
        task.key,
        task.agent,
        task.description.trim(),
        task.expected_output.trim()
    )
}

fn describe_item(item: &WorkItem) -> String {
    format!(
        "Description: {}\nPriority: {}\nComponent: {}\nRecommended assignment: {}",
        item.description,
        item.priority,
        item.component,
        item.recommended_agent()
    )
}

fn preview(output: &str) -> String {
    if output.chars().count() <= OUTPUT_PREVIEW_CHARS {
        return output.to_string();
    }
    let head: String = output.chars().take(OUTPUT_PREVIEW_CHARS).collect();
    format!("{}...", head)
}
