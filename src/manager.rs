//! Dynamic task assignment.
//!
//! [`DynamicTaskManager`] tracks the project state and decides what each
//! agent should do next. Routing is a fixed rule table evaluated top to
//! bottom, see [`DynamicTaskManager::determine_next_task`].

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::Utc;
use uuid::Uuid;

use crate::error::TaskError;
use crate::models::*;
use crate::templates::{default_params, render, Params, TemplateCatalog};

/// Separates the template name from the instance suffix in task keys,
/// e.g. `bug_fix_task:6f1c...`.
const KEY_SEPARATOR: char = ':';

#[derive(Debug, Clone)]
pub struct DynamicTaskManager {
    catalog: TemplateCatalog,
    state: ProjectState,
}

impl DynamicTaskManager {
    pub fn new(catalog: TemplateCatalog) -> Self {
        Self::with_state(catalog, ProjectState::default())
    }

    pub fn with_state(catalog: TemplateCatalog, state: ProjectState) -> Self {
        Self { catalog, state }
    }

    pub fn state(&self) -> &ProjectState {
        &self.state
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// Replace the whole state, e.g. after loading it from the store.
    pub fn replace_state(&mut self, state: ProjectState) {
        self.state = state;
    }

    /// Merge free-form entries into the project context.
    pub fn update_project_state(&mut self, entries: serde_json::Map<String, serde_json::Value>) {
        self.state.context.extend(entries);
    }

    /// Set the kickoff inputs used as template parameters.
    pub fn set_inputs(&mut self, inputs: BTreeMap<String, String>) {
        self.state.inputs.extend(inputs);
    }

    // ============================================================
    // Task creation
    // ============================================================

    /// Render `template` into a task.
    ///
    /// Parameters resolve as: defaults, then project inputs, then `params`.
    /// An `agent` parameter overrides the template's owner.
    pub fn create_dynamic_task(
        &self,
        template: &str,
        params: Params,
    ) -> Result<AssignedTask, TaskError> {
        let tpl = self.catalog.get(template)?;

        let mut format_params = default_params();
        format_params.extend(self.state.inputs.clone());
        format_params.extend(params);

        let description = render(template, &tpl.description, &format_params)?;
        let expected_output = render(template, &tpl.expected_output, &format_params)?;

        let agent = match format_params.get("agent") {
            Some(name) => AgentRole::from_str(name)?,
            None => tpl.agent.unwrap_or(AgentRole::ProductManager),
        };

        Ok(AssignedTask {
            key: template.to_string(),
            template: template.to_string(),
            agent,
            description,
            expected_output,
            context: self.context_summary(),
            work_item_id: None,
        })
    }

    fn context_summary(&self) -> String {
        let state = serde_json::Value::Object(self.state.context.clone());
        format!(
            "Project State: {}\nCompleted Tasks: {}",
            state,
            self.state.completed.len()
        )
    }

    pub fn create_bug_fix_task(
        &self,
        bug_description: &str,
        agent: AgentRole,
    ) -> Result<AssignedTask, TaskError> {
        let mut task = self.create_dynamic_task(
            BUG_FIX,
            params([
                ("bug_description", bug_description),
                ("assigned_agent", agent.as_str()),
                ("agent", agent.as_str()),
            ]),
        )?;
        task.key = instance_key(BUG_FIX, &Uuid::new_v4().to_string());
        Ok(task)
    }

    pub fn create_feature_task(
        &self,
        feature_description: &str,
        agent: AgentRole,
    ) -> Result<AssignedTask, TaskError> {
        let mut task = self.create_dynamic_task(
            FEATURE_IMPLEMENTATION,
            params([
                ("feature_description", feature_description),
                ("assigned_agent", agent.as_str()),
                ("agent", agent.as_str()),
            ]),
        )?;
        task.key = instance_key(FEATURE_IMPLEMENTATION, &Uuid::new_v4().to_string());
        Ok(task)
    }

    pub fn create_research_task(&self, research_topic: &str) -> Result<AssignedTask, TaskError> {
        let mut task =
            self.create_dynamic_task(TECHNICAL_RESEARCH, params([("research_topic", research_topic)]))?;
        task.key = instance_key(TECHNICAL_RESEARCH, &Uuid::new_v4().to_string());
        Ok(task)
    }

    // ============================================================
    // Routing
    // ============================================================

    /// Decide what `agent` should work on next.
    ///
    /// Lifecycle gates come first: market research, architecture,
    /// implementation, review, integration. Once an agent has nothing to do
    /// in the current phase, feature engineers pick up bugs and then feature
    /// requests, and the product manager plans the next round.
    ///
    /// Handing out a bug or feature claims it, so the same item is never
    /// given to two agents.
    pub fn determine_next_task(
        &mut self,
        agent: AgentRole,
    ) -> Result<Option<AssignedTask>, TaskError> {
        let state = &self.state;

        if !state.has_market_research() {
            return self.create_dynamic_task(MARKET_RESEARCH, Params::new()).map(Some);
        }

        if !state.has_technical_architecture() {
            return self
                .create_dynamic_task(TECHNICAL_ARCHITECTURE, Params::new())
                .map(Some);
        }

        if !state.has_implementation() {
            let template = match agent {
                AgentRole::SeniorEngineerFrontend => Some(FRONTEND_IMPLEMENTATION),
                AgentRole::SeniorEngineerBackend => Some(BACKEND_IMPLEMENTATION),
                AgentRole::SeniorEngineerDevops => Some(DEVOPS_SETUP),
                _ => None,
            };
            if let Some(template) = template {
                return self.create_dynamic_task(template, Params::new()).map(Some);
            }
        }

        if state.has_implementation() && !state.has_review() {
            let template = match agent {
                AgentRole::TechnicalSkeptic => Some(SKEPTIC_REVIEW),
                AgentRole::StaffEngineer => Some(CODE_REVIEW),
                _ => None,
            };
            if let Some(template) = template {
                return self.create_dynamic_task(template, Params::new()).map(Some);
            }
        }

        if state.has_implementation() && state.has_review() && !state.has_integration() {
            return self
                .create_dynamic_task(FINAL_INTEGRATION, Params::new())
                .map(Some);
        }

        if agent.is_feature_engineer() {
            for kind in [WorkItemKind::Bug, WorkItemKind::Feature] {
                if let Some(task) = self.claim_work_item(kind, agent)? {
                    return Ok(Some(task));
                }
            }
        }

        if agent == AgentRole::ProductManager {
            let key = self.planning_key();
            if !self.state.has_completed_key(&key) {
                let mut task = self.create_dynamic_task(NEXT_STEPS_PLANNING, Params::new())?;
                task.key = key;
                return Ok(Some(task));
            }
        }

        Ok(None)
    }

    /// Planning happens at most once per batch of other completed work.
    fn planning_key(&self) -> String {
        instance_key(
            NEXT_STEPS_PLANNING,
            &self.state.completed_work_count().to_string(),
        )
    }

    fn claim_work_item(
        &mut self,
        kind: WorkItemKind,
        agent: AgentRole,
    ) -> Result<Option<AssignedTask>, TaskError> {
        // Highest priority first; `max_by_key` keeps the last maximum, so
        // compare on reversed index to prefer the oldest item on ties.
        let Some(index) = self
            .state
            .work_items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.kind == kind && item.is_claimable_by(agent))
            .max_by_key(|(i, item)| (item.priority, std::cmp::Reverse(*i)))
            .map(|(i, _)| i)
        else {
            return Ok(None);
        };

        let item = &self.state.work_items[index];
        let mut task = match kind {
            WorkItemKind::Bug => self.create_bug_fix_task(&item.description, agent)?,
            WorkItemKind::Feature => self.create_feature_task(&item.description, agent)?,
        };
        task.key = instance_key(&task.template, &item.id.to_string());
        task.work_item_id = Some(item.id);

        let item = &mut self.state.work_items[index];
        item.status = WorkItemStatus::Assigned;
        item.assigned_to = Some(agent);

        tracing::debug!(
            "Assigned {} '{}' to {}",
            item.kind.as_str(),
            item.description,
            agent
        );

        Ok(Some(task))
    }

    /// Hand a claimed bug or feature back so it can be offered again.
    ///
    /// Returns false when `task` holds no claim: lifecycle tasks, unknown
    /// items and items that are not `Assigned` are left alone.
    pub fn release(&mut self, task: &AssignedTask) -> bool {
        let Some(id) = task.work_item_id else {
            return false;
        };
        let Some(item) = self
            .state
            .work_items
            .iter_mut()
            .find(|i| i.id == id && i.status == WorkItemStatus::Assigned)
        else {
            return false;
        };

        item.status = WorkItemStatus::Pending;
        item.assigned_to = None;
        tracing::info!("Released {} '{}'", item.kind.as_str(), item.description);
        true
    }

    // ============================================================
    // Completion
    // ============================================================

    /// Record that a task is done.
    ///
    /// `task` is either a template name or a task key. Lifecycle tasks can
    /// only be completed once. Completing a bug fix or feature task resolves
    /// its work item; when only the template name is given, the oldest item
    /// assigned to `agent` (or to anyone, without an agent) is resolved.
    pub fn mark_task_completed(
        &mut self,
        task: &str,
        output: &str,
        agent: Option<AgentRole>,
    ) -> Result<CompletedTask, TaskError> {
        let (template, suffix) = split_key(task);
        self.catalog.get(template)?;

        let (key, work_item_id) = if is_once_only(template) {
            if self.state.has_completed(template) {
                return Err(TaskError::AlreadyCompleted(template.to_string()));
            }
            (template.to_string(), None)
        } else if template == NEXT_STEPS_PLANNING {
            let key = match suffix {
                Some(suffix) => instance_key(template, suffix),
                None => self.planning_key(),
            };
            (key, None)
        } else {
            self.resolve_repeatable(template, suffix, agent)?
        };

        if self.state.has_completed_key(&key) {
            return Err(TaskError::AlreadyCompleted(key));
        }

        if let Some(id) = work_item_id {
            if let Some(item) = self.state.work_items.iter_mut().find(|i| i.id == id) {
                item.status = WorkItemStatus::Resolved;
                if item.assigned_to.is_none() {
                    item.assigned_to = agent;
                }
            }
        }

        tracing::info!("Task '{}' completed", key);

        let record = CompletedTask {
            name: template.to_string(),
            key,
            output: output.to_string(),
            agent,
            work_item_id,
            context: self.state.context.clone(),
            completed_at: Utc::now(),
        };
        self.state.completed.push(record.clone());

        Ok(record)
    }

    fn resolve_repeatable(
        &self,
        template: &str,
        suffix: Option<&str>,
        agent: Option<AgentRole>,
    ) -> Result<(String, Option<Uuid>), TaskError> {
        let kind = match template {
            BUG_FIX => Some(WorkItemKind::Bug),
            FEATURE_IMPLEMENTATION => Some(WorkItemKind::Feature),
            _ => None,
        };

        let Some(kind) = kind else {
            let suffix = suffix
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            return Ok((instance_key(template, &suffix), None));
        };

        if let Some(suffix) = suffix {
            // Keys minted for ad-hoc tasks carry a fresh UUID that matches no
            // work item; those complete without resolving anything.
            let id = Uuid::parse_str(suffix)
                .map_err(|_| TaskError::UnknownTask(instance_key(template, suffix)))?;
            let bound = self
                .state
                .work_items
                .iter()
                .find(|i| i.id == id && i.kind == kind)
                .map(|i| i.id);
            return Ok((instance_key(template, suffix), bound));
        }

        let assigned = self
            .state
            .work_items
            .iter()
            .filter(|i| i.kind == kind && i.status == WorkItemStatus::Assigned)
            .find(|i| agent.is_none() || i.assigned_to == agent)
            .ok_or_else(|| TaskError::UnknownTask(template.to_string()))?;

        Ok((instance_key(template, &assigned.id.to_string()), Some(assigned.id)))
    }

    // ============================================================
    // Work items
    // ============================================================

    pub fn add_bug(&mut self, description: &str, priority: Priority, component: &str) -> WorkItem {
        self.add_work_item(WorkItemKind::Bug, description, priority, component)
    }

    pub fn add_feature(
        &mut self,
        description: &str,
        priority: Priority,
        component: &str,
    ) -> WorkItem {
        self.add_work_item(WorkItemKind::Feature, description, priority, component)
    }

    fn add_work_item(
        &mut self,
        kind: WorkItemKind,
        description: &str,
        priority: Priority,
        component: &str,
    ) -> WorkItem {
        let item = WorkItem::new(kind, description, priority, component);
        tracing::info!(
            "Added {} '{}' (priority: {}, component: {})",
            kind.as_str(),
            item.description,
            item.priority,
            item.component
        );
        self.state.work_items.push(item.clone());
        item
    }

    pub fn recommend_agent(&self, component: &str) -> AgentRole {
        recommended_agent(component)
    }

    pub fn get_project_status(&self) -> ProjectStatus {
        self.state.status()
    }
}

impl Default for DynamicTaskManager {
    fn default() -> Self {
        Self::new(TemplateCatalog::builtin())
    }
}

fn params<const N: usize>(pairs: [(&str, &str); N]) -> Params {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn instance_key(template: &str, suffix: &str) -> String {
    format!("{}{}{}", template, KEY_SEPARATOR, suffix)
}

/// Split `bug_fix_task:<id>` into the template name and instance suffix.
pub fn split_key(key: &str) -> (&str, Option<&str>) {
    match key.trim().split_once(KEY_SEPARATOR) {
        Some((template, suffix)) if !suffix.is_empty() => (template, Some(suffix)),
        Some((template, _)) => (template, None),
        None => (key.trim(), None),
    }
}
