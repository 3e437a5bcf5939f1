use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::TaskError;
use crate::models::AgentRole;
use crate::templates::{render, Params};

const BUILTIN_AGENTS: &str = include_str!("../../config/agents.yaml");

/// Persona text for one agent. `goal` and `backstory` may use the same
/// placeholders as task templates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentProfile {
    pub goal: String,
    pub backstory: String,
}

/// The personas on the crew, one per [`AgentRole`].
#[derive(Debug, Clone)]
pub struct AgentRoster {
    profiles: BTreeMap<AgentRole, AgentProfile>,
}

impl AgentRoster {
    pub fn builtin() -> Self {
        Self::from_yaml(BUILTIN_AGENTS).expect("builtin agent profiles are valid")
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, TaskError> {
        let profiles: BTreeMap<AgentRole, AgentProfile> =
            serde_yaml::from_str(yaml).map_err(|e| TaskError::Config(e.to_string()))?;

        if let Some(missing) = AgentRole::ALL.iter().find(|r| !profiles.contains_key(r)) {
            return Err(TaskError::Config(format!(
                "missing agent profile for '{}'",
                missing
            )));
        }

        Ok(Self { profiles })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read agent profiles from {}", path.display()))?;
        Self::from_yaml(&yaml)
            .with_context(|| format!("Failed to parse agent profiles in {}", path.display()))
    }

    /// Agents in the order they take turns.
    pub fn turn_order(&self) -> impl Iterator<Item = AgentRole> + '_ {
        AgentRole::ALL
            .into_iter()
            .filter(|role| self.profiles.contains_key(role))
    }

    pub fn profile(&self, role: AgentRole) -> Option<&AgentProfile> {
        self.profiles.get(&role)
    }

    /// System prompt for `role`, with persona placeholders filled from `params`.
    pub fn system_prompt(&self, role: AgentRole, params: &Params) -> Result<String, TaskError> {
        let profile = self
            .profile(role)
            .ok_or_else(|| TaskError::UnknownAgent(role.to_string()))?;
        let goal = render(role.as_str(), profile.goal.trim(), params)?;
        let backstory = render(role.as_str(), profile.backstory.trim(), params)?;

        Ok(format!(
            "You are the {} on a software engineering team.\n\nYour goal: {}\n\nBackground: {}\n\nWork on exactly the task you are given and answer with the expected output only.",
            role.display_name(),
            goal,
            backstory
        ))
    }
}

impl Default for AgentRoster {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::default_params;

    #[test]
    fn builtin_roster_covers_every_role_in_turn_order() {
        let roster = AgentRoster::builtin();
        let order: Vec<_> = roster.turn_order().collect();
        assert_eq!(order, AgentRole::ALL.to_vec());
    }

    #[test]
    fn system_prompt_fills_persona_placeholders() {
        let roster = AgentRoster::builtin();
        let mut params = default_params();
        params.insert("project_name".into(), "Tasky".into());
        params.insert("target_users".into(), "students".into());

        let prompt = roster
            .system_prompt(AgentRole::ProductManager, &params)
            .unwrap();
        assert!(prompt.starts_with("You are the Product Manager"));
        assert!(prompt.contains("Tasky"));
        assert!(prompt.contains("students"));
    }

    #[test]
    fn rejects_roster_missing_a_role() {
        let yaml = "product_manager:\n  goal: g\n  backstory: b\n";
        assert!(AgentRoster::from_yaml(yaml).is_err());
    }
}
