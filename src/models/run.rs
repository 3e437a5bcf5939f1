use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A finished crew run, kept so `crewdev history` can list past runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrewRun {
    pub id: Uuid,
    pub project_name: String,
    pub tasks_completed: usize,
    pub rounds: usize,
    pub deliverables_path: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
