//! Runtime configuration.
//!
//! Settings come from `<config dir>/crewdev/config.json` when present, then
//! environment variables override individual fields:
//!
//! - `OLLAMA_BASE_URL` - LLM backend (default: `http://localhost:11434`)
//! - `CREWDEV_MODEL` - model name (default: `gpt-oss:20b`)
//! - `CREWDEV_TIMEOUT_SECS` - per-request timeout
//! - `CREWDEV_MAX_ROUNDS` - upper bound on crew rounds per run
//! - `CREWDEV_DELIVERABLES` - markdown output path
//! - `CREWDEV_LOG_FILE` - thought-process log path
//! - `CREWDEV_AGENTS_CONFIG`, `CREWDEV_TASKS_CONFIG` - YAML overrides
//! - `CREWDEV_DB` - SQLite database path

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::crew::AgentRoster;
use crate::db::Database;
use crate::llm::{OllamaClient, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::templates::TemplateCatalog;

const APP_NAME: &str = "crewdev";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CrewConfig {
    pub llm_base_url: String,
    pub model: String,
    pub request_timeout_secs: u64,
    /// A run stops after this many rounds over the roster even if work remains.
    pub max_rounds: usize,
    pub deliverables_path: PathBuf,
    pub log_file: PathBuf,
    pub agents_config: Option<PathBuf>,
    pub tasks_config: Option<PathBuf>,
    /// Defaults to `crewdev.db` in the platform data directory.
    pub database_path: Option<PathBuf>,
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            llm_base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout_secs: 300,
            max_rounds: 20,
            deliverables_path: PathBuf::from("project_deliverables.md"),
            log_file: PathBuf::from("crew_thought_process.log"),
            agents_config: None,
            tasks_config: None,
            database_path: None,
        }
    }
}

impl CrewConfig {
    /// Load the config file, then apply environment overrides.
    ///
    /// A file that cannot be read or parsed falls back to defaults; the
    /// error is handed back so it can be reported once logging is set up.
    pub fn load() -> (Self, Option<anyhow::Error>) {
        let (mut config, error) = match config_path() {
            Some(path) => Self::load_file(&path),
            None => (Self::default(), None),
        };
        config.apply_env(|key| std::env::var(key).ok());
        (config, error)
    }

    fn load_file(path: &Path) -> (Self, Option<anyhow::Error>) {
        if !path.exists() {
            return (Self::default(), None);
        }
        match Self::read_file(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply overrides from `lookup`, normally `std::env::var`.
    /// Unparseable numbers are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            self.llm_base_url = url;
        }
        if let Some(model) = lookup("CREWDEV_MODEL") {
            self.model = model.trim_start_matches("ollama/").to_string();
        }
        if let Some(secs) = lookup("CREWDEV_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.request_timeout_secs = secs;
        }
        if let Some(rounds) = lookup("CREWDEV_MAX_ROUNDS").and_then(|s| s.parse().ok()) {
            self.max_rounds = rounds;
        }
        if let Some(path) = lookup("CREWDEV_DELIVERABLES") {
            self.deliverables_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("CREWDEV_LOG_FILE") {
            self.log_file = PathBuf::from(path);
        }
        if let Some(path) = lookup("CREWDEV_AGENTS_CONFIG") {
            self.agents_config = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("CREWDEV_TASKS_CONFIG") {
            self.tasks_config = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("CREWDEV_DB") {
            self.database_path = Some(PathBuf::from(path));
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn catalog(&self) -> Result<TemplateCatalog> {
        match &self.tasks_config {
            Some(path) => TemplateCatalog::load(path),
            None => Ok(TemplateCatalog::builtin()),
        }
    }

    pub fn roster(&self) -> Result<AgentRoster> {
        match &self.agents_config {
            Some(path) => AgentRoster::load(path),
            None => Ok(AgentRoster::builtin()),
        }
    }

    pub fn open_database(&self) -> Result<Database> {
        let db = match &self.database_path {
            Some(path) => Database::open(path.clone())?,
            None => Database::open_default()?,
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn llm_client(&self) -> OllamaClient {
        OllamaClient::new(&self.llm_base_url, &self.model, self.request_timeout())
    }
}

fn config_path() -> Option<PathBuf> {
    let mut path = dirs::config_dir()?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Some(path)
}
