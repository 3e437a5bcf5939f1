//! Shared access to the task manager.
//!
//! Every outer surface (CLI, HTTP API, MCP server, crew runner) goes through
//! a [`Coordinator`]. Mutations run under one lock. With a store attached the
//! stored state is the source of truth: each mutation reloads it, applies the
//! change and saves it inside one SQLite write transaction, so processes
//! sharing the database never overwrite each other's changes.

use std::sync::{Arc, Mutex};

use crate::db::Database;
use crate::error::ServiceError;
use crate::manager::DynamicTaskManager;
use crate::templates::TemplateCatalog;

#[derive(Clone)]
pub struct Coordinator {
    manager: Arc<Mutex<DynamicTaskManager>>,
    db: Option<Database>,
}

impl Coordinator {
    /// In-memory only; state is lost when the process exits.
    pub fn new(manager: DynamicTaskManager) -> Self {
        Self {
            manager: Arc::new(Mutex::new(manager)),
            db: None,
        }
    }

    /// Load the stored state and persist every change back to `db`.
    pub fn with_store(catalog: TemplateCatalog, db: Database) -> anyhow::Result<Self> {
        let state = db.load_state()?;
        tracing::debug!(
            "Loaded project state: {} completed tasks, {} work items",
            state.completed.len(),
            state.work_items.len()
        );
        Ok(Self {
            manager: Arc::new(Mutex::new(DynamicTaskManager::with_state(catalog, state))),
            db: Some(db),
        })
    }

    pub fn db(&self) -> Option<&Database> {
        self.db.as_ref()
    }

    /// Run `f` against the latest state. A store that cannot be read is
    /// logged and the last known state is used instead.
    pub fn read<T>(&self, f: impl FnOnce(&DynamicTaskManager) -> T) -> T {
        let mut manager = self.manager.lock().expect("task manager lock poisoned");
        if let Some(db) = &self.db {
            match db.load_state() {
                Ok(state) => manager.replace_state(state),
                Err(e) => tracing::warn!("Failed to reload project state: {:#}", e),
            }
        }
        f(&manager)
    }

    /// Run `f` against the manager and persist the resulting state.
    ///
    /// If `f` fails nothing is persisted.
    pub fn update<T, E>(
        &self,
        f: impl FnOnce(&mut DynamicTaskManager) -> Result<T, E>,
    ) -> Result<T, ServiceError>
    where
        E: Into<ServiceError>,
    {
        let mut manager = self.manager.lock().expect("task manager lock poisoned");
        let Some(db) = &self.db else {
            return f(&mut manager).map_err(Into::into);
        };

        db.update_state(|stored| {
            manager.replace_state(stored);
            let value = f(&mut manager).map_err(Into::into)?;
            Ok((value, manager.state().clone()))
        })
    }

    /// Clear the project state, in memory and in the store.
    pub fn reset(&self) -> anyhow::Result<()> {
        let mut manager = self.manager.lock().expect("task manager lock poisoned");
        manager.replace_state(Default::default());
        if let Some(db) = &self.db {
            db.reset()?;
        }
        Ok(())
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(DynamicTaskManager::default())
    }
}
