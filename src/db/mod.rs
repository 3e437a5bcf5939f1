mod schema;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use crate::models::*;

/// How long a writer waits for another process holding the write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite store for the project state.
///
/// The state is small, so it is saved as a whole: every save replaces the
/// stored rows inside one transaction. Several processes may share one file;
/// [`Database::update_state`] serialises their read-modify-write cycles.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "crewdev")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().join("crewdev.db"))
    }

    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let applied = schema::run_migrations(&conn)?;
        if applied > 0 {
            tracing::debug!("Applied {} migrations", applied);
        }
        Ok(())
    }

    // ============================================================
    // Project state
    // ============================================================

    pub fn load_state(&self) -> Result<ProjectState> {
        let conn = self.conn.lock().expect("database lock poisoned");
        read_state(&conn)
    }

    pub fn save_state(&self, state: &ProjectState) -> Result<()> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        write_state(&tx, state)?;
        tx.commit().context("Failed to save project state")?;
        Ok(())
    }

    /// Load the stored state, hand it to `f` and save what `f` returns.
    ///
    /// The write lock is taken before reading, so another process sharing
    /// the file cannot commit in between. If `f` fails nothing is written.
    pub fn update_state<T, E>(
        &self,
        f: impl FnOnce(ProjectState) -> std::result::Result<(T, ProjectState), E>,
    ) -> std::result::Result<T, E>
    where
        E: From<anyhow::Error>,
    {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to lock project state")?;
        let stored = read_state(&tx)?;
        let (value, state) = f(stored)?;
        write_state(&tx, &state)?;
        tx.commit().context("Failed to save project state")?;
        Ok(value)
    }

    /// Forget the project state. Run history is kept.
    pub fn reset(&self) -> Result<()> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        clear_state(&tx)?;
        tx.commit()?;
        Ok(())
    }

    // ============================================================
    // Crew runs
    // ============================================================

    pub fn record_run(&self, run: &CrewRun) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT INTO crew_runs (id, project_name, tasks_completed, rounds, deliverables_path, started_at, finished_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            (
                run.id.to_string(),
                &run.project_name,
                run.tasks_completed as i64,
                run.rounds as i64,
                &run.deliverables_path,
                run.started_at.to_rfc3339(),
                run.finished_at.to_rfc3339(),
            ),
        )?;
        Ok(())
    }

    pub fn get_runs(&self) -> Result<Vec<CrewRun>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, project_name, tasks_completed, rounds, deliverables_path, started_at, finished_at
             FROM crew_runs ORDER BY started_at DESC",
        )?;

        let runs = stmt
            .query_map([], |row| {
                Ok(CrewRun {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    project_name: row.get(1)?,
                    tasks_completed: row.get::<_, i64>(2)? as usize,
                    rounds: row.get::<_, i64>(3)? as usize,
                    deliverables_path: row.get(4)?,
                    started_at: parse_datetime(row.get::<_, String>(5)?),
                    finished_at: parse_datetime(row.get::<_, String>(6)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }
}

fn read_state(conn: &Connection) -> Result<ProjectState> {
    let inputs = {
        let mut stmt = conn.prepare("SELECT key, value FROM project_inputs ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().collect()
    };

    let context = {
        let mut stmt = conn.prepare("SELECT key, value FROM project_context ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(k, v)| {
                let value = serde_json::from_str(&v).unwrap_or(serde_json::Value::String(v));
                (k, value)
            })
            .collect()
    };

    let completed = {
        let mut stmt = conn.prepare(
            "SELECT name, task_key, output, agent, work_item_id, context, completed_at
             FROM completed_tasks ORDER BY seq",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let context_json: String = row.get(5)?;
                Ok(CompletedTask {
                    name: row.get(0)?,
                    key: row.get(1)?,
                    output: row.get(2)?,
                    agent: row
                        .get::<_, Option<String>>(3)?
                        .and_then(|s| AgentRole::from_str(&s).ok()),
                    work_item_id: row.get::<_, Option<String>>(4)?.map(parse_uuid),
                    context: serde_json::from_str(&context_json).unwrap_or_default(),
                    completed_at: parse_datetime(row.get::<_, String>(6)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let work_items = {
        let mut stmt = conn.prepare(
            "SELECT id, kind, description, priority, component, status, assigned_to, created_at
             FROM work_items ORDER BY seq",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(WorkItem {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    kind: WorkItemKind::from_str(&row.get::<_, String>(1)?)
                        .unwrap_or(WorkItemKind::Bug),
                    description: row.get(2)?,
                    priority: Priority::from_str(&row.get::<_, String>(3)?).unwrap_or_default(),
                    component: row.get(4)?,
                    status: WorkItemStatus::from_str(&row.get::<_, String>(5)?)
                        .unwrap_or(WorkItemStatus::Pending),
                    assigned_to: row
                        .get::<_, Option<String>>(6)?
                        .and_then(|s| AgentRole::from_str(&s).ok()),
                    created_at: parse_datetime(row.get::<_, String>(7)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    Ok(ProjectState {
        inputs,
        context,
        completed,
        work_items,
    })
}

/// Replace the stored state. Callers own the surrounding transaction.
fn write_state(conn: &Connection, state: &ProjectState) -> Result<()> {
    clear_state(conn)?;

    for (key, value) in &state.inputs {
        conn.execute(
            "INSERT INTO project_inputs (key, value) VALUES (?, ?)",
            (key, value),
        )?;
    }

    for (key, value) in &state.context {
        conn.execute(
            "INSERT INTO project_context (key, value) VALUES (?, ?)",
            (key, serde_json::to_string(value)?),
        )?;
    }

    for task in &state.completed {
        conn.execute(
            "INSERT INTO completed_tasks (name, task_key, output, agent, work_item_id, context, completed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            (
                &task.name,
                &task.key,
                &task.output,
                task.agent.map(|a| a.as_str()),
                task.work_item_id.map(|id| id.to_string()),
                serde_json::to_string(&task.context)?,
                task.completed_at.to_rfc3339(),
            ),
        )?;
    }

    for item in &state.work_items {
        conn.execute(
            "INSERT INTO work_items (id, kind, description, priority, component, status, assigned_to, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            (
                item.id.to_string(),
                item.kind.as_str(),
                &item.description,
                item.priority.as_str(),
                &item.component,
                item.status.as_str(),
                item.assigned_to.map(|a| a.as_str()),
                item.created_at.to_rfc3339(),
            ),
        )?;
    }

    Ok(())
}

fn clear_state(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "DELETE FROM project_inputs;
         DELETE FROM project_context;
         DELETE FROM completed_tasks;
         DELETE FROM work_items;",
    )?;
    Ok(())
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
