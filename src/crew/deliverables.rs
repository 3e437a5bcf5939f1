//! Markdown rendering of a finished run.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Context;

use crate::models::{ProjectState, WorkItemStatus};

use super::ProjectInputs;

pub fn render_markdown(inputs: &ProjectInputs, state: &ProjectState) -> String {
    let mut md = String::new();

    let _ = writeln!(md, "# Project Deliverables: {}\n", inputs.project_name);
    let _ = writeln!(
        md,
        "_Generated {}. Phase: {}._\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M UTC"),
        state.phase()
    );

    md.push_str("## Project Summary\n\n");
    if !inputs.project_description.is_empty() {
        let _ = writeln!(md, "{}\n", inputs.project_description);
    }
    let _ = writeln!(md, "- **Target users:** {}", inputs.target_users);
    let _ = writeln!(md, "- **Key features:** {}", inputs.key_features);
    let _ = writeln!(md, "- **Technology preferences:** {}\n", inputs.tech_preferences);

    md.push_str("## Completed Tasks\n\n");
    if state.completed.is_empty() {
        md.push_str("No tasks were completed.\n\n");
    }
    for (i, task) in state.completed.iter().enumerate() {
        let owner = task
            .agent
            .map(|a| a.display_name())
            .unwrap_or("Unassigned");
        let _ = writeln!(md, "### {}. {} ({})\n", i + 1, task.key, owner);
        let _ = writeln!(md, "{}\n", task.output.trim());
    }

    let open: Vec<_> = state
        .work_items
        .iter()
        .filter(|i| i.status != WorkItemStatus::Resolved)
        .collect();
    if !open.is_empty() {
        md.push_str("## Open Work Items\n\n");
        for item in open {
            let _ = writeln!(
                md,
                "- [{}][{}] {} ({}, {})",
                item.kind.as_str(),
                item.priority,
                item.description,
                item.component,
                item.status.as_str()
            );
        }
        md.push('\n');
    }

    md
}

pub async fn write_markdown(
    path: &Path,
    inputs: &ProjectInputs,
    state: &ProjectState,
) -> anyhow::Result<()> {
    let md = render_markdown(inputs, state);
    tokio::fs::write(path, md)
        .await
        .with_context(|| format!("Failed to write deliverables to {}", path.display()))?;
    tracing::info!("Deliverables written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentRole, Priority, WorkItem, WorkItemKind};

    fn state_with_work() -> ProjectState {
        let mut state = ProjectState::default();
        state.completed.push(crate::models::CompletedTask {
            name: "market_research_task".to_string(),
            key: "market_research_task".to_string(),
            output: "  Chefs want this.  ".to_string(),
            agent: Some(AgentRole::ProductManager),
            work_item_id: None,
            context: Default::default(),
            completed_at: chrono::Utc::now(),
        });
        state
            .work_items
            .push(WorkItem::new(WorkItemKind::Bug, "Crash", Priority::High, "api"));
        let mut resolved = WorkItem::new(WorkItemKind::Feature, "Export", Priority::Low, "ui");
        resolved.status = WorkItemStatus::Resolved;
        state.work_items.push(resolved);
        state
    }

    #[test]
    fn lists_completed_tasks_with_their_owner() {
        let md = render_markdown(&ProjectInputs::default(), &state_with_work());
        assert!(md.starts_with("# Project Deliverables: Custom Software Project"));
        assert!(md.contains("### 1. market_research_task (Product Manager)\n\nChefs want this.\n"));
    }

    #[test]
    fn lists_only_open_work_items() {
        let md = render_markdown(&ProjectInputs::default(), &state_with_work());
        assert!(md.contains("- [bug][high] Crash (api, pending)"));
        assert!(!md.contains("Export"));
    }

    #[test]
    fn empty_project_says_so() {
        let md = render_markdown(&ProjectInputs::default(), &ProjectState::default());
        assert!(md.contains("No tasks were completed."));
        assert!(!md.contains("## Open Work Items"));
    }

    #[test]
    fn writes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.md");

        tokio_test::block_on(write_markdown(
            &path,
            &ProjectInputs::default(),
            &ProjectState::default(),
        ))
        .unwrap();

        let md = std::fs::read_to_string(&path).unwrap();
        assert!(md.contains("## Project Summary"));
    }

    #[test]
    fn reports_unwritable_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.md");

        let err = tokio_test::block_on(write_markdown(
            &path,
            &ProjectInputs::default(),
            &ProjectState::default(),
        ))
        .unwrap_err();

        assert!(err.to_string().contains("Failed to write deliverables"));
    }
}
