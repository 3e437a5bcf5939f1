use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use crewdev::coordinator::Coordinator;
use crewdev::crew::{AgentRoster, Crew, ProjectInputs};
use crewdev::db::Database;
use crewdev::llm::{self, LlmClient, LlmError};
use crewdev::models::*;
use crewdev::templates::TemplateCatalog;

/// Answers every prompt with a canned reply and remembers what it was asked.
#[derive(Default)]
struct ScriptedLlm {
    prompts: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl ScriptedLlm {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, system: &str, prompt: &str) -> llm::Result<String> {
        if self.fail {
            return Err(LlmError::Timeout);
        }
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push((system.to_string(), prompt.to_string()));
        Ok(format!("Deliverable #{}", prompts.len()))
    }

    async fn health_check(&self) -> llm::Result<()> {
        Ok(())
    }
}

fn inputs() -> ProjectInputs {
    ProjectInputs {
        project_name: "Recipe Box".to_string(),
        project_description: "Share family recipes".to_string(),
        ..Default::default()
    }
}

fn crew(coordinator: Coordinator, llm: Arc<ScriptedLlm>) -> Crew {
    Crew::new(coordinator, AgentRoster::builtin(), llm)
}

mod run {
    use super::*;

    #[tokio::test]
    async fn runs_the_lifecycle_until_nobody_has_work() {
        let llm = Arc::new(ScriptedLlm::default());
        let crew = crew(Coordinator::default(), llm.clone());

        let report = crew.run(&inputs()).await.expect("Run failed");

        let keys: Vec<&str> = report.tasks.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                MARKET_RESEARCH,
                TECHNICAL_ARCHITECTURE,
                FRONTEND_IMPLEMENTATION,
                "next_steps_planning_task:3",
                CODE_REVIEW,
                FINAL_INTEGRATION,
                "next_steps_planning_task:5",
            ]
        );
        assert_eq!(report.rounds, 4);
        assert!(!report.hit_round_limit);
        assert_eq!(llm.prompts().len(), 7);

        let phase = crew.coordinator().read(|m| m.state().phase());
        assert_eq!(phase, Phase::Maintenance);
    }

    #[tokio::test]
    async fn the_owner_carries_out_the_task() {
        let llm = Arc::new(ScriptedLlm::default());
        let report = crew(Coordinator::default(), llm.clone())
            .run(&inputs())
            .await
            .expect("Run failed");

        let integration = report
            .tasks
            .iter()
            .find(|t| t.key == FINAL_INTEGRATION)
            .expect("Missing integration");
        assert_eq!(integration.owner, AgentRole::StaffEngineer);
        assert_eq!(integration.requested_by, AgentRole::TechnicalSkeptic);

        let (system, prompt) = &llm.prompts()[0];
        assert!(system.starts_with("You are the Product Manager"));
        assert!(prompt.contains("Recipe Box"));
    }

    #[tokio::test]
    async fn later_prompts_include_earlier_results() {
        let llm = Arc::new(ScriptedLlm::default());
        crew(Coordinator::default(), llm.clone())
            .run(&inputs())
            .await
            .expect("Run failed");

        let (_, architecture_prompt) = &llm.prompts()[1];
        assert!(architecture_prompt.contains("Results from earlier tasks"));
        assert!(architecture_prompt.contains("Deliverable #1"));
    }

    #[tokio::test]
    async fn stops_at_the_round_limit() {
        let llm = Arc::new(ScriptedLlm::default());
        let report = crew(Coordinator::default(), llm)
            .max_rounds(1)
            .run(&inputs())
            .await
            .expect("Run failed");

        assert_eq!(report.rounds, 1);
        assert!(report.hit_round_limit);
        assert_eq!(report.tasks.len(), 3);
    }

    #[tokio::test]
    async fn fixes_reported_bugs() {
        let coordinator = Coordinator::default();
        coordinator
            .update(|m| {
                m.add_bug("Recipes vanish after save", Priority::High, "api");
                Ok::<_, crewdev::error::TaskError>(())
            })
            .unwrap();

        let report = crew(coordinator.clone(), Arc::new(ScriptedLlm::default()))
            .run(&inputs())
            .await
            .expect("Run failed");

        let fix = report
            .tasks
            .iter()
            .find(|t| t.template == BUG_FIX)
            .expect("Bug was never fixed");
        assert_eq!(fix.owner, AgentRole::SeniorEngineerBackend);
        let item = coordinator.read(|m| m.state().work_items[0].clone());
        assert_eq!(item.status, WorkItemStatus::Resolved);
    }

    #[tokio::test]
    async fn llm_failure_aborts_the_run() {
        let result = crew(Coordinator::default(), Arc::new(ScriptedLlm::failing()))
            .run(&inputs())
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn failed_run_hands_the_bug_back() {
        let coordinator = Coordinator::default();
        coordinator
            .update(|m| {
                for task in [
                    MARKET_RESEARCH,
                    TECHNICAL_ARCHITECTURE,
                    FRONTEND_IMPLEMENTATION,
                    SKEPTIC_REVIEW,
                    FINAL_INTEGRATION,
                    NEXT_STEPS_PLANNING,
                ] {
                    m.mark_task_completed(task, "done", None)?;
                }
                m.add_bug("Save button hidden", Priority::High, "ui");
                Ok::<_, crewdev::error::TaskError>(())
            })
            .unwrap();

        let result = crew(coordinator.clone(), Arc::new(ScriptedLlm::failing()))
            .run(&inputs())
            .await;

        assert!(result.is_err());
        let item = coordinator.read(|m| m.state().work_items[0].clone());
        assert_eq!(item.status, WorkItemStatus::Pending);
        assert_eq!(item.assigned_to, None);
        let retry = coordinator
            .update(|m| m.determine_next_task(AgentRole::SeniorEngineerFrontend))
            .unwrap()
            .expect("Bug should be offered again");
        assert_eq!(retry.work_item_id, Some(item.id));
    }
}

mod outputs {
    use super::*;

    #[tokio::test]
    async fn writes_markdown_deliverables() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("deliverables.md");

        let report = crew(Coordinator::default(), Arc::new(ScriptedLlm::default()))
            .deliverables(&path)
            .run(&inputs())
            .await
            .expect("Run failed");

        assert_eq!(report.deliverables_path.as_deref(), Some(path.as_path()));
        let md = std::fs::read_to_string(&path).expect("Deliverables missing");
        assert!(md.starts_with("# Project Deliverables: Recipe Box"));
        assert!(md.contains("Share family recipes"));
        assert!(md.contains("### 1. market_research_task (Product Manager)"));
        assert!(md.contains("Deliverable #7"));
    }

    #[tokio::test]
    async fn records_the_run_in_the_store() {
        let db = Database::open_memory().expect("Failed to create database");
        db.migrate().expect("Failed to migrate");
        let coordinator = Coordinator::with_store(TemplateCatalog::builtin(), db.clone())
            .expect("Failed to create coordinator");

        let report = crew(coordinator, Arc::new(ScriptedLlm::default()))
            .run(&inputs())
            .await
            .expect("Run failed");

        let runs = db.get_runs().expect("Query failed");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, report.run_id);
        assert_eq!(runs[0].project_name, "Recipe Box");
        assert_eq!(runs[0].tasks_completed, 7);
        assert_eq!(runs[0].rounds, 4);

        let state = db.load_state().expect("Failed to load");
        assert_eq!(state.inputs["project_name"], "Recipe Box");
        assert_eq!(state.completed.len(), 7);
    }
}
