//! The engineering crew: personas, the run loop and its deliverables.
//!
//! A run works in rounds. In each round every agent on the roster, in turn
//! order, asks the task manager for work. A task is carried out by the agent
//! that owns it, which may differ from the agent that asked: anyone asking
//! during discovery is told the product manager owes market research. The
//! run ends when a full round hands out nothing, or after `max_rounds`.

mod agents;
pub mod deliverables;

pub use agents::*;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::coordinator::Coordinator;
use crate::error::TaskError;
use crate::llm::LlmClient;
use crate::models::{AgentRole, AssignedTask, CrewRun};
use crate::templates::{default_params, Params};

/// Earlier outputs included in each prompt.
const PRIOR_RESULTS: usize = 3;
/// Longest slice of an earlier output included in a prompt.
const PRIOR_RESULT_CHARS: usize = 2000;

/// What the user tells the crew at kickoff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectInputs {
    pub project_name: String,
    pub project_description: String,
    pub target_users: String,
    pub key_features: String,
    pub tech_preferences: String,
}

impl Default for ProjectInputs {
    fn default() -> Self {
        Self {
            project_name: "Custom Software Project".to_string(),
            project_description: String::new(),
            target_users: "general users".to_string(),
            key_features: "standard features".to_string(),
            tech_preferences: "modern best practices".to_string(),
        }
    }
}

impl ProjectInputs {
    pub fn to_params(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("project_name".to_string(), self.project_name.clone()),
            ("project_description".to_string(), self.project_description.clone()),
            ("target_users".to_string(), self.target_users.clone()),
            ("key_features".to_string(), self.key_features.clone()),
            ("tech_preferences".to_string(), self.tech_preferences.clone()),
            ("current_year".to_string(), Utc::now().year().to_string()),
        ])
    }
}

/// One task carried out during a run.
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub key: String,
    pub template: String,
    pub owner: AgentRole,
    pub requested_by: AgentRole,
    pub round: usize,
    pub output: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrewReport {
    pub run_id: Uuid,
    pub tasks: Vec<TaskOutcome>,
    pub rounds: usize,
    /// True when the run hit `max_rounds` with work still being handed out.
    pub hit_round_limit: bool,
    pub deliverables_path: Option<PathBuf>,
}

pub struct Crew {
    coordinator: Coordinator,
    roster: AgentRoster,
    llm: Arc<dyn LlmClient>,
    max_rounds: usize,
    deliverables_path: Option<PathBuf>,
}

impl Crew {
    pub fn new(coordinator: Coordinator, roster: AgentRoster, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            coordinator,
            roster,
            llm,
            max_rounds: 20,
            deliverables_path: None,
        }
    }

    pub fn max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = rounds.max(1);
        self
    }

    /// Write the markdown deliverables here once the run ends.
    pub fn deliverables(mut self, path: impl Into<PathBuf>) -> Self {
        self.deliverables_path = Some(path.into());
        self
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub async fn run(&self, inputs: &ProjectInputs) -> anyhow::Result<CrewReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        tracing::info!(
            run_id = %run_id,
            model = self.llm.model(),
            "Starting crew for '{}'",
            inputs.project_name
        );

        self.coordinator.update(|m| {
            m.set_inputs(inputs.to_params());
            Ok::<_, TaskError>(())
        })?;

        let mut outcomes = Vec::new();
        let mut rounds = 0;
        let mut hit_round_limit = false;

        for round in 1..=self.max_rounds {
            rounds = round;
            let mut progressed = false;

            for agent in self.roster.turn_order() {
                let Some(task) = self.coordinator.update(|m| m.determine_next_task(agent))? else {
                    continue;
                };

                tracing::info!(
                    round,
                    "{} picked up '{}' (owner: {})",
                    agent.display_name(),
                    task.key,
                    task.agent.display_name()
                );

                let output = match self.execute(&task, inputs).await {
                    Ok(output) => output,
                    Err(e) => {
                        self.coordinator.update(|m| {
                            m.release(&task);
                            Ok::<_, TaskError>(())
                        })?;
                        return Err(e);
                    }
                };

                self.coordinator
                    .update(|m| m.mark_task_completed(&task.key, &output, Some(task.agent)))?;

                outcomes.push(TaskOutcome {
                    key: task.key,
                    template: task.template,
                    owner: task.agent,
                    requested_by: agent,
                    round,
                    output,
                });
                progressed = true;
            }

            if !progressed {
                tracing::info!(round, "No agent has work left");
                break;
            }
            if round == self.max_rounds {
                hit_round_limit = true;
                tracing::warn!("Stopping after {} rounds with work remaining", round);
            }
        }

        if let Some(path) = &self.deliverables_path {
            let state = self.coordinator.read(|m| m.state().clone());
            deliverables::write_markdown(path, inputs, &state).await?;
        }

        if let Some(db) = self.coordinator.db() {
            db.record_run(&CrewRun {
                id: run_id,
                project_name: inputs.project_name.clone(),
                tasks_completed: outcomes.len(),
                rounds,
                deliverables_path: self
                    .deliverables_path
                    .as_ref()
                    .map(|p| p.display().to_string()),
                started_at,
                finished_at: Utc::now(),
            })?;
        }

        tracing::info!(
            run_id = %run_id,
            "Crew finished: {} tasks in {} rounds",
            outcomes.len(),
            rounds
        );

        Ok(CrewReport {
            run_id,
            tasks: outcomes,
            rounds,
            hit_round_limit,
            deliverables_path: self.deliverables_path.clone(),
        })
    }

    async fn execute(&self, task: &AssignedTask, inputs: &ProjectInputs) -> anyhow::Result<String> {
        let mut params: Params = default_params();
        params.extend(inputs.to_params());

        let system = self.roster.system_prompt(task.agent, &params)?;
        let prompt = self.task_prompt(task);

        tracing::info!(
            target: "crewdev::thoughts",
            agent = task.agent.as_str(),
            task = %task.key,
            "{} thinking about: {}",
            task.agent.display_name(),
            first_line(&task.description)
        );

        let output = self.llm.complete(&system, &prompt).await.map_err(|e| {
            tracing::warn!("LLM call for '{}' failed: {}", task.key, e);
            e
        })?;

        tracing::info!(
            target: "crewdev::thoughts",
            agent = task.agent.as_str(),
            task = %task.key,
            "{} finished:\n{}",
            task.agent.display_name(),
            output.trim()
        );

        Ok(output)
    }

    fn task_prompt(&self, task: &AssignedTask) -> String {
        let prior = self.coordinator.read(|m| {
            let completed = &m.state().completed;
            completed
                .iter()
                .skip(completed.len().saturating_sub(PRIOR_RESULTS))
                .map(|t| {
                    let output: String = t.output.chars().take(PRIOR_RESULT_CHARS).collect();
                    format!("### {}\n{}", t.key, output.trim())
                })
                .collect::<Vec<_>>()
        });

        let mut prompt = format!(
            "Task:\n{}\n\nExpected output:\n{}\n\n{}",
            task.description.trim(),
            task.expected_output.trim(),
            task.context
        );
        if !prior.is_empty() {
            prompt.push_str("\n\nResults from earlier tasks:\n");
            prompt.push_str(&prior.join("\n\n"));
        }
        prompt
    }
}

fn first_line(text: &str) -> &str {
    text.trim().lines().next().unwrap_or_default()
}
