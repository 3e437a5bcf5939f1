use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crewdev::api::{self, middleware::ApiAuth};
use crewdev::config::CrewConfig;
use crewdev::coordinator::Coordinator;
use crewdev::crew::{Crew, ProjectInputs};
use crewdev::llm::LlmClient;
use crewdev::mcp;
use crewdev::tools::TaskTools;

#[derive(Parser)]
#[command(name = "crewdev")]
#[command(about = "A software engineering team of LLM agents that builds your project")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Kick off the crew on a project (prompts for anything not given)
    Run {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        users: Option<String>,
        #[arg(long)]
        features: Option<String>,
        #[arg(long)]
        tech: Option<String>,
        /// Upper bound on rounds over the roster
        #[arg(long)]
        max_rounds: Option<usize>,
        /// Clear the stored project state before starting
        #[arg(long)]
        fresh: bool,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Ask for the next task for an agent
    Next {
        #[arg(short, long)]
        agent: String,
    },
    /// Mark a task as completed
    Complete {
        /// Task key or template name
        task: String,
        #[arg(short, long, default_value = "")]
        output: String,
        #[arg(short, long)]
        agent: Option<String>,
    },
    /// Report a bug
    Bug {
        description: String,
        #[arg(short, long)]
        priority: Option<String>,
        #[arg(short, long)]
        component: Option<String>,
    },
    /// Request a feature
    Feature {
        description: String,
        #[arg(short, long)]
        priority: Option<String>,
        #[arg(short, long)]
        component: Option<String>,
    },
    /// Create an ad-hoc technical research task
    Research { topic: String },
    /// Show the project phase and open work
    Status,
    /// List task templates
    Templates,
    /// List past crew runs
    History,
    /// Clear the stored project state
    Reset,
    /// Verify the LLM backend is reachable and the model is installed
    CheckLlm,
    /// Start the HTTP API server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Start MCP server via stdio
    Mcp,
}

/// Initialize tracing to stdout, or stderr in MCP mode where stdout is the
/// protocol channel. `log_file` additionally captures everything without
/// colors, which is where the crew's thought process ends up.
fn init_tracing(use_stderr: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "crewdev=info,tower_http=info".into()),
    );

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    if use_stderr {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
    Ok(())
}

fn open_coordinator(config: &CrewConfig) -> anyhow::Result<Coordinator> {
    Coordinator::with_store(config.catalog()?, config.open_database()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (config, config_error) = CrewConfig::load();

    let use_stderr = matches!(cli.command, Commands::Mcp);
    let log_file = matches!(cli.command, Commands::Run { .. }).then_some(config.log_file.as_path());
    init_tracing(use_stderr, log_file)?;
    if let Some(e) = config_error {
        tracing::warn!("Failed to load config, using defaults: {:#}", e);
    }

    match cli.command {
        Commands::Run {
            name,
            description,
            users,
            features,
            tech,
            max_rounds,
            fresh,
            yes,
        } => {
            let inputs = collect_inputs(name, description, users, features, tech)?;
            print_summary(&inputs);
            if !yes && !confirm("Ready to start building? (y/n): ")? {
                println!("Project cancelled.");
                return Ok(());
            }

            let coordinator = open_coordinator(&config)?;
            if fresh {
                coordinator.reset()?;
            }

            let llm: Arc<dyn LlmClient> = Arc::new(config.llm_client());
            let crew = Crew::new(coordinator, config.roster()?, llm)
                .max_rounds(max_rounds.unwrap_or(config.max_rounds))
                .deliverables(&config.deliverables_path);

            println!("Starting the team. Thought process: {}", config.log_file.display());
            let report = crew.run(&inputs).await?;

            println!(
                "\nCompleted {} tasks in {} rounds.",
                report.tasks.len(),
                report.rounds
            );
            for outcome in &report.tasks {
                println!("  [round {}] {} ({})", outcome.round, outcome.key, outcome.owner);
            }
            if report.hit_round_limit {
                println!("Stopped at the round limit with work remaining.");
            }
            if let Some(path) = &report.deliverables_path {
                println!("Deliverables: {}", path.display());
            }
        }
        Commands::Next { agent } => {
            let tools = TaskTools::new(open_coordinator(&config)?);
            println!("{}", tools.get_next_task(&agent)?);
        }
        Commands::Complete {
            task,
            output,
            agent,
        } => {
            let tools = TaskTools::new(open_coordinator(&config)?);
            println!("{}", tools.report_completion(&task, &output, agent.as_deref())?);
        }
        Commands::Bug {
            description,
            priority,
            component,
        } => {
            let tools = TaskTools::new(open_coordinator(&config)?);
            println!(
                "{}",
                tools.report_bug(&description, priority.as_deref(), component.as_deref())?
            );
        }
        Commands::Feature {
            description,
            priority,
            component,
        } => {
            let tools = TaskTools::new(open_coordinator(&config)?);
            println!(
                "{}",
                tools.request_feature(&description, priority.as_deref(), component.as_deref())?
            );
        }
        Commands::Research { topic } => {
            let coordinator = open_coordinator(&config)?;
            let task = coordinator.read(|m| m.create_research_task(&topic))?;
            println!("{}", crewdev::tools::describe_task("Research task", &task));
        }
        Commands::Status => {
            let coordinator = open_coordinator(&config)?;
            let status = coordinator.read(|m| m.get_project_status());
            println!("Phase: {}", status.phase);
            println!("Completed tasks: {}", status.completed_tasks.len());
            for key in &status.completed_tasks {
                println!("  - {}", key);
            }
            println!("Pending bugs: {}", status.pending_bugs);
            println!("Pending features: {}", status.pending_features);
            println!("Assigned work items: {}", status.assigned_items);
        }
        Commands::Templates => {
            let catalog = config.catalog()?;
            for (name, template) in catalog.iter() {
                let owner = template
                    .agent
                    .map(|a| a.as_str())
                    .unwrap_or("(per request)");
                println!("{:<32} {}", name, owner);
            }
        }
        Commands::History => {
            let db = config.open_database()?;
            let runs = db.get_runs()?;
            if runs.is_empty() {
                println!("No crew runs recorded.");
            }
            for run in runs {
                println!(
                    "{}  {}  {} tasks, {} rounds  {}",
                    run.started_at.format("%Y-%m-%d %H:%M"),
                    run.project_name,
                    run.tasks_completed,
                    run.rounds,
                    run.deliverables_path.unwrap_or_default()
                );
            }
        }
        Commands::Reset => {
            open_coordinator(&config)?.reset()?;
            println!("Project state cleared.");
        }
        Commands::CheckLlm => {
            let client = config.llm_client();
            println!("Checking {} at {}...", client.model(), client.base_url());
            match client.health_check().await {
                Ok(()) => println!("LLM backend is ready."),
                Err(e) => {
                    println!("LLM backend check failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Serve { port } => {
            tracing::info!("Starting crewdev server on port {}", port);

            let coordinator = open_coordinator(&config)?;
            let app = api::create_router_with_auth(coordinator, ApiAuth::from_env());

            let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
            tracing::info!("crewdev server listening on http://127.0.0.1:{}", port);

            axum::serve(listener, app).await?;
        }
        Commands::Mcp => {
            let coordinator = open_coordinator(&config)?;
            mcp::run_stdio_server(coordinator).await?;
        }
    }

    Ok(())
}

// ============================================================
// Interactive input
// ============================================================

fn collect_inputs(
    name: Option<String>,
    description: Option<String>,
    users: Option<String>,
    features: Option<String>,
    tech: Option<String>,
) -> anyhow::Result<ProjectInputs> {
    let defaults = ProjectInputs::default();
    let stdin = io::stdin();
    let mut lines = stdin.lock();

    let mut ask = |given: Option<String>, question: &str, default: String| -> anyhow::Result<String> {
        if let Some(value) = given {
            return Ok(value);
        }
        print!("{}", question);
        io::stdout().flush()?;
        let mut line = String::new();
        lines.read_line(&mut line)?;
        let line = line.trim();
        Ok(if line.is_empty() {
            default
        } else {
            line.to_string()
        })
    };

    Ok(ProjectInputs {
        project_name: ask(
            name,
            "What project would you like to build? ",
            defaults.project_name,
        )?,
        project_description: ask(
            description,
            "Project description (optional): ",
            defaults.project_description,
        )?,
        target_users: ask(users, "Who are the target users? ", defaults.target_users)?,
        key_features: ask(
            features,
            "What are the key features you want? ",
            defaults.key_features,
        )?,
        tech_preferences: ask(
            tech,
            "Any technology preferences? ",
            defaults.tech_preferences,
        )?,
    })
}

fn print_summary(inputs: &ProjectInputs) {
    println!("\nProject Summary:");
    println!("  Project: {}", inputs.project_name);
    if !inputs.project_description.is_empty() {
        println!("  Description: {}", inputs.project_description);
    }
    println!("  Target users: {}", inputs.target_users);
    println!("  Key features: {}", inputs.key_features);
    println!("  Tech preferences: {}", inputs.tech_preferences);
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    print!("{}", question);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
