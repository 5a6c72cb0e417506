use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use startwork::access::ConfigAccess;
use startwork::branch::{GitBranchOps, GitCommandLauncher};
use startwork::config::Config;
use startwork::integrations::{IntegrationRegistry, Integrations};
use startwork::logging;
use startwork::repositories::RepositoryDiscovery;
use startwork::start_work::{
    StartWorkArgs, StartWorkCommand, StartWorkProvider, StartWorkResult, StartWorkServices,
    START_WORK_BUTTON, SUPPORTED_START_WORK_INTEGRATIONS,
};
use startwork::telemetry::{NoopTelemetry, TelemetrySink, TracingTelemetry};
use startwork::ui::TerminalHost;
use startwork::wizard::{self, Answer, ScriptedHost, StepResult};

#[derive(Parser)]
#[command(name = "startwork")]
#[command(about = "Pick an assigned issue and start a branch for it")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// What opened the flow, reported with telemetry
    #[arg(long, default_value = "commandPalette")]
    source: String,

    /// Repositories to offer for the new branch (default: configured paths, else cwd)
    #[arg(short, long)]
    repo: Vec<PathBuf>,

    /// Skip the confirm step after picking an issue
    #[arg(short = 'y', long)]
    yes: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the flow with answers from a JSON file instead of the terminal
    Script {
        /// JSON array of answers, e.g. [{"select": "Fix crash"}, "back"]
        file: PathBuf,
    },

    /// List issues assigned to you on connected integrations
    Issues,

    /// Show which supported integrations are connected
    Integrations,

    /// Write the effective configuration to .startwork/config.toml
    Init,
}

/// One scripted answer as written in a script file
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ScriptAnswer {
    Select(String),
    /// Click the start work button on the item with this label
    Button(String),
    Text(String),
    Back,
    Cancel,
}

impl From<ScriptAnswer> for Answer {
    fn from(answer: ScriptAnswer) -> Self {
        match answer {
            ScriptAnswer::Select(label) => Answer::Select(label),
            ScriptAnswer::Button(label) => Answer::button(label, START_WORK_BUTTON.id),
            ScriptAnswer::Text(text) => Answer::Text(text),
            ScriptAnswer::Back => Answer::Back,
            ScriptAnswer::Cancel => Answer::Cancel,
        }
    }
}

fn load_script(path: &Path) -> Result<Vec<Answer>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    let answers: Vec<ScriptAnswer> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse script {}", path.display()))?;
    Ok(answers.into_iter().map(Answer::from).collect())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let config = Config::load(cli.config.as_deref())?;

    // The picker owns the terminal, so only it logs to a file
    let is_tui_mode = cli.command.is_none();
    let logging_handle = logging::init_logging(&config, is_tui_mode, cli.debug)?;

    let run_id = Uuid::new_v4();
    let span = info_span!("startwork", %run_id);

    let registry: Arc<dyn IntegrationRegistry> = Arc::new(Integrations::from_config(&config));

    let result = match &cli.command {
        Some(Commands::Init) => cmd_init(&config),
        Some(Commands::Issues) => cmd_issues(registry).instrument(span).await,
        Some(Commands::Integrations) => cmd_integrations(registry).instrument(span).await,
        Some(Commands::Script { file }) => {
            let answers = load_script(file)?;
            cmd_start_work(&cli, &config, registry, Some(answers))
                .instrument(span)
                .await
        }
        None => cmd_start_work(&cli, &config, registry, None)
            .instrument(span)
            .await,
    };

    // Print log file path on exit if logs were written
    if let Some(log_path) = logging_handle.log_file_path {
        if log_path.metadata().is_ok_and(|m| m.len() > 0) {
            eprintln!("Session log: {}", log_path.display());
        }
    }

    result
}

async fn cmd_start_work(
    cli: &Cli,
    config: &Config,
    registry: Arc<dyn IntegrationRegistry>,
    script: Option<Vec<Answer>>,
) -> Result<()> {
    let mut candidates = if cli.repo.is_empty() {
        config.repository_paths()
    } else {
        cli.repo.clone()
    };
    if candidates.is_empty() {
        candidates.push(std::env::current_dir().context("Failed to read current directory")?);
    }

    let repositories = Arc::new(RepositoryDiscovery::new());
    repositories.spawn(candidates);

    let telemetry: Arc<dyn TelemetrySink> = if config.telemetry.enabled {
        Arc::new(TracingTelemetry::new(true))
    } else {
        Arc::new(NoopTelemetry)
    };

    let services = StartWorkServices {
        provider: Arc::new(StartWorkProvider::new(registry)),
        access: Arc::new(ConfigAccess::new(&config.access)),
        launcher: Arc::new(GitCommandLauncher::new(
            Arc::new(GitBranchOps),
            Arc::clone(&repositories),
        )),
        telemetry,
        repositories,
    };
    let args = StartWorkArgs {
        source: cli.source.clone(),
        cloud_integrations: config.integrations.cloud_enabled,
        slugify_branch_names: config.start_work.slugify_branch_names,
        confirm: Some(config.start_work.confirm && !cli.yes),
        item: None,
    };

    let mut command = StartWorkCommand::new(services, args);
    info!(instance = command.instance(), "Start work opened");

    let result = match script {
        Some(answers) => {
            let mut host = ScriptedHost::new(answers);
            let result = wizard::run(&mut host, &mut command).await;
            for title in host.titles() {
                println!("» {title}");
            }
            for answer in host.unmatched() {
                warn!(?answer, "Scripted answer matched nothing");
            }
            if host.remaining() > 0 {
                warn!(remaining = host.remaining(), "Flow ended before the script ran out");
            }
            result
        }
        None => {
            // Host drops before anything is printed, restoring the terminal
            let mut host = TerminalHost::new()?;
            wizard::run(&mut host, &mut command).await
        }
    };

    match result {
        StepResult::Value(()) => match &command.state().item {
            Some(item) => println!("Started work on {}", item.reference()),
            None => println!("Done"),
        },
        StepResult::Break => println!("Cancelled"),
    }
    Ok(())
}

fn cmd_init(config: &Config) -> Result<()> {
    config.save()?;
    println!("Wrote {}", Config::project_config_path().display());
    Ok(())
}

async fn cmd_issues(registry: Arc<dyn IntegrationRegistry>) -> Result<()> {
    let issues = registry.get_my_issues(SUPPORTED_START_WORK_INTEGRATIONS).await;
    let result = StartWorkResult::from_issues(issues);

    if result.items.is_empty() {
        println!("No issues found");
        return Ok(());
    }

    println!("Assigned Issues ({})", result.items.len());
    println!("{}", "─".repeat(60));
    for item in &result.items {
        println!("{}  {}", item.reference(), item.item.title);
        println!("    {}", item.item.url);
    }
    Ok(())
}

async fn cmd_integrations(registry: Arc<dyn IntegrationRegistry>) -> Result<()> {
    let provider = StartWorkProvider::new(registry);
    let connected = provider.get_connected_integrations().await;

    println!("Integrations");
    println!("{}", "─".repeat(60));
    for (id, is_connected) in &connected {
        let status = if *is_connected { "✓ connected" } else { "✗ not connected" };
        println!("{:<12} {}", id.name(), status);
    }
    Ok(())
}
