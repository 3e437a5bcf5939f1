//! A software engineering crew for LLM agents.
//!
//! The heart of the crate is the [`manager::DynamicTaskManager`], which
//! tracks what has been done on a project and decides which task each agent
//! should take next. Around it sit the surfaces that drive it: a sequential
//! [`crew::Crew`] backed by a local LLM, an HTTP API, an MCP server for
//! external agents, and the `crewdev` CLI.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod crew;
pub mod db;
pub mod error;
pub mod llm;
pub mod manager;
pub mod mcp;
pub mod models;
pub mod templates;
pub mod tools;
