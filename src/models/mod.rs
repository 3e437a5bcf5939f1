//! Domain models for the crew.
//!
//! # Core Concepts
//!
//! - [`AgentRole`]: The fixed roster of personas that can receive work.
//! - [`WorkItem`]: A bug report or feature request waiting for an engineer.
//! - [`ProjectState`]: Everything the task router knows about the project:
//!   completed tasks, open work items, inputs and free-form context.
//! - [`Phase`]: The lifecycle phase, derived from completed tasks.
//! - [`CrewRun`]: A record of a finished crew run.

mod agent;
mod run;
mod state;
mod task;
mod work_item;

pub use agent::*;
pub use run::*;
pub use state::*;
pub use task::*;
pub use work_item::*;
