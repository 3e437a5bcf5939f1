use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// A persona on the engineering crew.
///
/// The roster is closed: task templates and routing rules refer to these
/// roles by their snake_case names.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    ProductManager,
    StaffEngineer,
    SeniorEngineerFrontend,
    SeniorEngineerBackend,
    SeniorEngineerDevops,
    TechnicalSkeptic,
}

impl AgentRole {
    pub const ALL: [AgentRole; 6] = [
        Self::ProductManager,
        Self::StaffEngineer,
        Self::TechnicalSkeptic,
        Self::SeniorEngineerFrontend,
        Self::SeniorEngineerBackend,
        Self::SeniorEngineerDevops,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductManager => "product_manager",
            Self::StaffEngineer => "staff_engineer",
            Self::SeniorEngineerFrontend => "senior_engineer_frontend",
            Self::SeniorEngineerBackend => "senior_engineer_backend",
            Self::SeniorEngineerDevops => "senior_engineer_devops",
            Self::TechnicalSkeptic => "technical_skeptic",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ProductManager => "Product Manager",
            Self::StaffEngineer => "Staff Engineer",
            Self::SeniorEngineerFrontend => "Frontend Engineer",
            Self::SeniorEngineerBackend => "Backend Engineer",
            Self::SeniorEngineerDevops => "DevOps Engineer",
            Self::TechnicalSkeptic => "Technical Skeptic",
        }
    }

    /// Agents that pick up bug fixes and feature requests once the
    /// lifecycle tasks are out of the way.
    pub fn is_feature_engineer(&self) -> bool {
        matches!(
            self,
            Self::SeniorEngineerFrontend | Self::SeniorEngineerBackend
        )
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "product_manager" => Ok(Self::ProductManager),
            "staff_engineer" => Ok(Self::StaffEngineer),
            "senior_engineer_frontend" => Ok(Self::SeniorEngineerFrontend),
            "senior_engineer_backend" => Ok(Self::SeniorEngineerBackend),
            "senior_engineer_devops" => Ok(Self::SeniorEngineerDevops),
            "technical_skeptic" => Ok(Self::TechnicalSkeptic),
            other => Err(TaskError::UnknownAgent(other.to_string())),
        }
    }
}

/// Pick the engineer best placed to handle work on `component`.
///
/// Unclear components go to the staff engineer.
pub fn recommended_agent(component: &str) -> AgentRole {
    match component.trim().to_lowercase().as_str() {
        "frontend" | "ui" | "react" | "typescript" => AgentRole::SeniorEngineerFrontend,
        "backend" | "api" | "server" | "python" | "nodejs" => AgentRole::SeniorEngineerBackend,
        _ => AgentRole::StaffEngineer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_role_from_its_name() {
        for role in AgentRole::ALL {
            assert_eq!(role.as_str().parse::<AgentRole>().unwrap(), role);
        }
    }

    #[test]
    fn rejects_unknown_role() {
        let err = "janitor".parse::<AgentRole>().unwrap_err();
        assert!(matches!(err, TaskError::UnknownAgent(name) if name == "janitor"));
    }

    #[test]
    fn routes_components_case_insensitively() {
        assert_eq!(recommended_agent("React"), AgentRole::SeniorEngineerFrontend);
        assert_eq!(recommended_agent(" API "), AgentRole::SeniorEngineerBackend);
        assert_eq!(recommended_agent("nodejs"), AgentRole::SeniorEngineerBackend);
        assert_eq!(recommended_agent("database"), AgentRole::StaffEngineer);
        assert_eq!(recommended_agent("unknown"), AgentRole::StaffEngineer);
    }
}
