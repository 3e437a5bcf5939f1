//! Error types for task routing and template handling.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task template '{0}' not found in configuration")]
    UnknownTemplate(String),

    #[error("Template '{template}' references unknown parameter '{parameter}'")]
    MissingParameter { template: String, parameter: String },

    #[error("Template '{template}' is malformed: {reason}")]
    MalformedTemplate { template: String, reason: String },

    #[error("Unknown agent '{0}'")]
    UnknownAgent(String),

    #[error("Invalid priority '{0}'. Must be: low, medium, high, or critical")]
    InvalidPriority(String),

    #[error("Task '{0}' has already been completed")]
    AlreadyCompleted(String),

    #[error("Task '{0}' not found")]
    UnknownTask(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl TaskError {
    /// Errors caused by the caller's input rather than by the system.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::MalformedTemplate { .. })
    }
}

/// Errors from operations that route tasks and then persist the result.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
