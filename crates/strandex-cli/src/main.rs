use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use strandex_agents::{AgentInfo, AgentRegistry};
use strandex_core::{PipelineObserver, RunContext};
use strandex_providers::LlamaLoader;

mod config;
mod markdown;
mod progress;

use config::Settings;
use progress::TerminalObserver;

/// Log level for tracing output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Most verbose: includes every streamed token
    Trace,
    /// Backend requests, chunk boundaries, token usage
    Debug,
    /// Run milestones: extraction, summary, report path
    Info,
    /// Quiet: only warnings and errors
    Warn,
    /// Minimal: only errors
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser)]
#[command(name = "strandex")]
#[command(
    author,
    version,
    about = "Strandex: run local-LLM agents from the command line",
    long_about = None
)]
pub struct Cli {
    /// Log level (overrides STRANDEX_LOG_LEVEL; default warn)
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Enable debug logging (shorthand for --log-level debug)
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Write logs to file (JSON-lines format)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Wait for the complete summary instead of streaming it
    #[arg(long, global = true)]
    pub no_stream: bool,

    /// Print results as plain text instead of rendered Markdown
    #[arg(long, global = true)]
    pub plain: bool,

    /// Do not write a Markdown report file
    #[arg(long, global = true)]
    pub no_report: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available agents
    List,
    /// List available tools
    Tools,
    /// Show the effective configuration
    Config,
    /// Run an agent
    Run {
        /// Agent name (see `strandex list`)
        agent_name: String,

        /// Input passed to the agent, e.g. a PDF path
        #[arg(short, long)]
        input: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let dotenv_error = config::load_dotenv();
    let settings = Settings::load()?;

    init_logging(&cli, &settings)?;
    if let Some(e) = dotenv_error {
        tracing::warn!(error = %e, "Failed to read .env file");
    }
    tracing::debug!(?settings, "Settings loaded");

    match &cli.command {
        Commands::List => list_agents(&settings),
        Commands::Tools => list_tools(),
        Commands::Config => show_config(&settings),
        Commands::Run { agent_name, input } => {
            run_agent(&cli, &settings, agent_name, input).await
        }
    }
}

/// Resolve the log directive: --debug, then --log-level, then settings.
fn log_directive(cli: &Cli, settings: &Settings) -> String {
    if cli.debug {
        return LogLevel::Debug.as_filter().to_string();
    }
    if let Some(level) = cli.log_level {
        return level.as_filter().to_string();
    }
    settings
        .log_level
        .as_deref()
        .and_then(|level| LogLevel::from_str(level.trim(), true).ok())
        .unwrap_or(LogLevel::Warn)
        .as_filter()
        .to_string()
}

fn init_logging(cli: &Cli, settings: &Settings) -> Result<()> {
    let filter = EnvFilter::new(log_directive(cli, settings));

    if let Some(log_path) = &cli.log_file {
        let file = std::fs::File::create(log_path)
            .with_context(|| format!("Failed to create log file: {:?}", log_path))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::sync::Mutex::new(file)))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

fn registry(settings: &Settings) -> AgentRegistry {
    AgentRegistry::new(settings.agents_dir(), strandex_tools::default_tools())
}

fn list_agents(settings: &Settings) -> Result<()> {
    println!("\nAvailable Agents:");
    for info in registry(settings).list() {
        println!("{}", agent_line(&info));
    }
    Ok(())
}

fn agent_line(info: &AgentInfo) -> String {
    match &info.description {
        Some(description) => format!(" - {}: {}", info.name, description),
        None => format!(" - {}", info.name),
    }
}

fn list_tools() -> Result<()> {
    println!("\nAvailable Tools:");
    for info in strandex_tools::default_tools().list() {
        println!(" - {}: {}", info.name, info.description);
    }
    Ok(())
}

fn show_config(settings: &Settings) -> Result<()> {
    if let Ok(path) = Settings::config_path() {
        let marker = if path.exists() { "" } else { " (not found)" };
        println!("# Config file: {}{}", path.display(), marker);
    }
    println!("# Agents directory: {}", settings.agents_dir().display());
    println!();
    print!("{}", settings.to_toml()?);
    Ok(())
}

async fn run_agent(cli: &Cli, settings: &Settings, agent_name: &str, input: &str) -> Result<()> {
    let agent = registry(settings)
        .load(agent_name)
        .with_context(|| format!("Failed to load agent '{}'", agent_name))?;

    let observer: Arc<dyn PipelineObserver> = if atty::is(atty::Stream::Stderr) {
        Arc::new(TerminalObserver::new())
    } else {
        Arc::new(TerminalObserver::hidden())
    };

    let loader = Arc::new(LlamaLoader::new(settings.to_llama_config()));
    let ctx = RunContext::new(loader)
        .with_observer(observer)
        .with_output_dir(settings.output_dir())
        .with_stream(settings.stream && !cli.no_stream)
        .with_report(settings.report && !cli.no_report);

    tracing::info!(agent = agent_name, input, "Running agent");
    let result = agent
        .run(input, &ctx)
        .await
        .with_context(|| format!("Agent '{}' failed", agent_name))?;

    println!("\nResult:");
    let render = settings.render && !cli.plain && atty::is(atty::Stream::Stdout);
    markdown::print_result(&result, render).context("Failed to write result")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "strandex",
            "run",
            "research_summarizer",
            "--input",
            "paper.pdf",
            "--no-stream",
        ])
        .unwrap();

        assert!(cli.no_stream);
        match cli.command {
            Commands::Run { agent_name, input } => {
                assert_eq!(agent_name, "research_summarizer");
                assert_eq!(input, "paper.pdf");
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_run_requires_input() {
        assert!(Cli::try_parse_from(["strandex", "run", "research_summarizer"]).is_err());
    }

    #[test]
    fn test_global_flags() {
        let cli =
            Cli::try_parse_from(["strandex", "--plain", "--log-level", "info", "list"]).unwrap();
        assert!(cli.plain);
        assert_eq!(cli.log_level, Some(LogLevel::Info));
        assert!(matches!(cli.command, Commands::List));
    }

    #[test]
    fn test_log_level_precedence() {
        let settings = Settings {
            log_level: Some("ERROR".to_string()),
            ..Settings::default()
        };

        let cli = Cli::try_parse_from(["strandex", "-d", "--log-level", "info", "list"]).unwrap();
        assert_eq!(log_directive(&cli, &settings), "debug");

        let cli = Cli::try_parse_from(["strandex", "--log-level", "info", "list"]).unwrap();
        assert_eq!(log_directive(&cli, &settings), "info");

        let cli = Cli::try_parse_from(["strandex", "list"]).unwrap();
        assert_eq!(log_directive(&cli, &settings), "error");
        assert_eq!(log_directive(&cli, &Settings::default()), "warn");
    }

    #[test]
    fn test_unknown_log_level_falls_back_to_warn() {
        let cli = Cli::try_parse_from(["strandex", "list"]).unwrap();
        for level in ["verbose", "", "my_crate=debug"] {
            let settings = Settings {
                log_level: Some(level.to_string()),
                ..Settings::default()
            };
            assert_eq!(log_directive(&cli, &settings), "warn");
        }

        let settings = Settings {
            log_level: Some(" Trace ".to_string()),
            ..Settings::default()
        };
        assert_eq!(log_directive(&cli, &settings), "trace");
    }

    #[test]
    fn test_agent_line() {
        let described = AgentInfo {
            name: "research_summarizer".to_string(),
            description: Some("Summarize PDFs".to_string()),
        };
        assert_eq!(agent_line(&described), " - research_summarizer: Summarize PDFs");

        let bare = AgentInfo {
            name: "echo".to_string(),
            description: None,
        };
        assert_eq!(agent_line(&bare), " - echo");
    }
}
