//! Drives `crewdev mcp` over stdio with line-delimited JSON-RPC.

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdout, Command, Stdio};

struct StdioSession {
    child: Child,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
    _home: tempfile::TempDir,
}

impl StdioSession {
    /// Start a server with its own database and config directory, and
    /// complete the initialize handshake.
    fn start() -> (Self, Value) {
        let home = tempfile::tempdir().expect("Failed to create temp dir");
        let mut child = Command::new(env!("CARGO_BIN_EXE_crewdev"))
            .arg("mcp")
            .env("CREWDEV_DB", home.path().join("crewdev.db"))
            .env("XDG_CONFIG_HOME", home.path())
            .env("HOME", home.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to spawn crewdev mcp");
        let stdout = BufReader::new(child.stdout.take().expect("Missing stdout"));

        let mut session = Self {
            child,
            stdout,
            next_id: 0,
            _home: home,
        };
        let init = session.call(
            "initialize",
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "crewdev-tests", "version": "0.0.0" }
            }),
        );
        session.send(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }));
        (session, init)
    }

    fn send(&mut self, message: Value) {
        let stdin = self.child.stdin.as_mut().expect("Missing stdin");
        writeln!(stdin, "{message}").expect("Failed to write");
        stdin.flush().expect("Failed to flush");
    }

    /// Send a request and return the whole JSON-RPC response.
    fn call(&mut self, method: &str, params: Value) -> Value {
        self.next_id += 1;
        self.send(json!({ "jsonrpc": "2.0", "id": self.next_id, "method": method, "params": params }));

        let mut line = String::new();
        self.stdout.read_line(&mut line).expect("Failed to read");
        serde_json::from_str(&line).expect("Response is not JSON")
    }

    /// Call a tool and decode the JSON carried in its text content.
    fn tool(&mut self, name: &str, arguments: Value) -> Value {
        let response = self.call("tools/call", json!({ "name": name, "arguments": arguments }));
        let text = response["result"]["content"][0]["text"]
            .as_str()
            .unwrap_or_else(|| panic!("No text content in {response}"));
        serde_json::from_str(text).expect("Tool text is not JSON")
    }
}

impl Drop for StdioSession {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

mod handshake {
    use super::*;

    #[test]
    fn names_the_server() {
        let (_session, init) = StdioSession::start();

        assert!(init.get("error").is_none());
        assert_eq!(init["result"]["serverInfo"]["name"], "crewdev");
        assert!(init["result"]["capabilities"]["tools"].is_object());
    }

    #[test]
    fn lists_the_agent_tools() {
        let (mut session, _) = StdioSession::start();

        let listed = session.call("tools/list", json!({}));
        let tools = listed["result"]["tools"].as_array().expect("No tools array");

        let mut names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
        names.sort_unstable();
        assert_eq!(
            names,
            vec![
                "complete_and_get_next",
                "get_next_task",
                "get_status",
                "report_bug",
                "report_completion",
                "request_feature",
                "request_research",
            ]
        );
        assert!(tools.iter().all(|t| t["inputSchema"].is_object()));

        let report_bug = tools
            .iter()
            .find(|t| t["name"] == "report_bug")
            .and_then(|t| t["description"].as_str())
            .expect("report_bug has no description");
        assert!(report_bug.contains("Devops never receives"));
    }
}

mod tool_calls {
    use super::*;

    #[test]
    fn next_task_then_completion() {
        let (mut session, _) = StdioSession::start();

        let next = session.tool("get_next_task", json!({ "agent_name": "product_manager" }));
        assert_eq!(next["task"]["key"], "market_research_task");

        let completed = session.tool(
            "report_completion",
            json!({ "task_name": "market_research_task", "output": "analysis" }),
        );
        assert_eq!(completed["key"], "market_research_task");

        let status = session.tool("get_status", json!({}));
        assert_eq!(status["phase"], "architecture");
        assert_eq!(status["completed_tasks"], json!(["market_research_task"]));
    }

    #[test]
    fn invalid_agent_is_an_error() {
        let (mut session, _) = StdioSession::start();

        let response = session.call(
            "tools/call",
            json!({ "name": "get_next_task", "arguments": { "agent_name": "intern" } }),
        );

        let message = response["error"]["message"].as_str().expect("Expected an error");
        assert!(message.contains("intern"));
    }

    #[test]
    fn report_bug_returns_the_item() {
        let (mut session, _) = StdioSession::start();

        let item = session.tool(
            "report_bug",
            json!({ "description": "Crash on login", "priority": "critical", "component": "frontend" }),
        );

        assert_eq!(item["priority"], "critical");
        assert_eq!(item["recommended_agent"], "senior_engineer_frontend");
    }
}
