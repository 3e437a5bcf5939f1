//! MCP server integration tests.
//!
//! Tests drive the tool logic through the server's `test_*` helpers, which
//! run the same code as the registered tools.

use crewdev::coordinator::Coordinator;
use crewdev::db::Database;
use crewdev::mcp::McpServer;
use crewdev::models::*;
use crewdev::templates::TemplateCatalog;

/// Helper to create a test MCP server with an in-memory store.
fn setup() -> (McpServer, Database) {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    let coordinator = Coordinator::with_store(TemplateCatalog::builtin(), db.clone())
        .expect("Failed to create coordinator");
    (McpServer::new(coordinator), db)
}

/// Complete the lifecycle so feature engineers start taking work items.
fn finish_lifecycle(server: &McpServer) {
    for task in [
        MARKET_RESEARCH,
        TECHNICAL_ARCHITECTURE,
        DEVOPS_SETUP,
        CODE_REVIEW,
        FINAL_INTEGRATION,
    ] {
        server
            .test_report_completion(task, "done", None)
            .expect("Failed to complete lifecycle task");
    }
}

// ============================================================
// Task routing
// ============================================================

mod get_next_task {
    use super::*;

    #[test]
    fn starts_with_market_research() {
        let (server, _db) = setup();

        let response = server
            .test_get_next_task("technical_skeptic")
            .expect("Failed to get next task");

        assert_eq!(response.agent, "technical_skeptic");
        assert_eq!(response.phase, "discovery");
        let task = response.task.expect("Expected a task");
        assert_eq!(task.key, MARKET_RESEARCH);
        assert_eq!(task.owner, "product_manager");
        assert!(task.work_item_id.is_none());
    }

    #[test]
    fn rejects_unknown_agent() {
        let (server, _db) = setup();

        let err = server.test_get_next_task("intern").unwrap_err();

        assert!(err.message.contains("Unknown agent 'intern'"));
    }

    #[test]
    fn persists_claimed_work_items() {
        let (server, db) = setup();
        finish_lifecycle(&server);
        server
            .test_report_bug("Checkout crashes", Some("critical"), Some("backend"))
            .expect("Failed to report bug");

        let task = server
            .test_get_next_task("senior_engineer_backend")
            .expect("Failed to get next task")
            .task
            .expect("Expected a bug fix");

        assert!(task.key.starts_with("bug_fix_task:"));
        let stored = db.load_state().expect("Failed to load state");
        assert_eq!(stored.work_items[0].status, WorkItemStatus::Assigned);
        assert_eq!(
            task.work_item_id,
            Some(stored.work_items[0].id.to_string())
        );
    }
}

// ============================================================
// Completion
// ============================================================

mod report_completion {
    use super::*;

    #[test]
    fn records_the_completed_task() {
        let (server, db) = setup();

        let completed = server
            .test_report_completion(MARKET_RESEARCH, "Target market: chefs", Some("product_manager"))
            .expect("Failed to complete");

        assert_eq!(completed.key, MARKET_RESEARCH);
        assert_eq!(completed.agent.as_deref(), Some("product_manager"));
        assert!(db.load_state().unwrap().has_market_research());
    }

    #[test]
    fn rejects_a_second_completion() {
        let (server, _db) = setup();
        server
            .test_report_completion(MARKET_RESEARCH, "done", None)
            .expect("Failed to complete");

        let err = server
            .test_report_completion(MARKET_RESEARCH, "done", None)
            .unwrap_err();

        assert!(err.message.contains("already been completed"));
    }

    #[test]
    fn resolves_the_work_item() {
        let (server, _db) = setup();
        finish_lifecycle(&server);
        let bug = server
            .test_report_bug("Header overlaps", None, Some("ui"))
            .expect("Failed to report bug");
        let task = server
            .test_get_next_task("senior_engineer_frontend")
            .unwrap()
            .task
            .unwrap();

        let completed = server
            .test_report_completion(&task.key, "fixed", Some("senior_engineer_frontend"))
            .expect("Failed to complete");

        assert_eq!(completed.resolved_work_item, Some(bug.id));
        assert_eq!(server.test_get_status().pending_bugs, 0);
    }
}

mod complete_and_get_next {
    use super::*;

    #[test]
    fn returns_the_following_task() {
        let (server, _db) = setup();

        let response = server
            .test_complete_and_get_next(MARKET_RESEARCH, "done", "product_manager")
            .expect("Failed to complete");

        assert_eq!(response.completed.key, MARKET_RESEARCH);
        let next = response.next_task.expect("Expected next task");
        assert_eq!(next.key, TECHNICAL_ARCHITECTURE);
        assert_eq!(next.owner, "staff_engineer");
    }

    #[test]
    fn returns_no_task_when_the_agent_is_idle() {
        let (server, _db) = setup();
        server
            .test_report_completion(MARKET_RESEARCH, "done", None)
            .unwrap();

        let response = server
            .test_complete_and_get_next(TECHNICAL_ARCHITECTURE, "done", "technical_skeptic")
            .expect("Failed to complete");

        assert!(response.next_task.is_none());
    }
}

// ============================================================
// Work items and research
// ============================================================

mod work_items {
    use super::*;

    #[test]
    fn bug_report_is_routed_by_component() {
        let (server, _db) = setup();

        let bug = server
            .test_report_bug("Slow endpoint", Some("HIGH"), Some("API"))
            .expect("Failed to report bug");

        assert_eq!(bug.kind, "bug");
        assert_eq!(bug.priority, "high");
        assert_eq!(bug.status, "pending");
        assert_eq!(bug.recommended_agent, "senior_engineer_backend");
    }

    #[test]
    fn deployment_bugs_are_not_given_to_devops() {
        let (server, _db) = setup();
        finish_lifecycle(&server);

        let bug = server
            .test_report_bug("Pipeline flaky", Some("high"), Some("deployment"))
            .expect("Failed to report bug");

        assert_eq!(bug.recommended_agent, "staff_engineer");
        let devops = server
            .test_get_next_task("senior_engineer_devops")
            .expect("Failed to get next task");
        assert!(devops.task.is_none());
    }

    #[test]
    fn feature_request_defaults() {
        let (server, _db) = setup();

        let feature = server
            .test_request_feature("Offline mode", None, None)
            .expect("Failed to request feature");

        assert_eq!(feature.kind, "feature");
        assert_eq!(feature.priority, "medium");
        assert_eq!(feature.component, "unknown");
        assert_eq!(feature.recommended_agent, "staff_engineer");
        assert_eq!(server.test_get_status().pending_features, 1);
    }

    #[test]
    fn rejects_invalid_priority() {
        let (server, _db) = setup();

        let err = server
            .test_report_bug("Crash", Some("whenever"), None)
            .unwrap_err();

        assert!(err.message.contains("Invalid priority"));
    }

    #[test]
    fn rejects_empty_description() {
        let (server, _db) = setup();
        assert!(server.test_request_feature("", None, None).is_err());
    }

    #[test]
    fn research_task_names_the_topic() {
        let (server, _db) = setup();

        let task = server
            .test_request_research("WebRTC vs WebSockets")
            .expect("Failed to create research task");

        assert!(task.key.starts_with("technical_research_task:"));
        assert_eq!(task.owner, "staff_engineer");
        assert!(task.description.contains("WebRTC vs WebSockets"));
    }
}
