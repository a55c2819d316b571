use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cocommand_core::config::ClientConfig;
use cocommand_sdk::CocommandClient;

mod commands;
mod host;
mod logging;
mod render;

#[derive(Parser)]
#[command(name = "cocommand")]
#[command(about = "Cocommand - command palette client for a Cocommand workspace server", long_about = None)]
struct Cli {
    /// Backend base URL (overrides config file and COCOMMAND_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Request timeout in milliseconds, 0 disables it
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Also write logs to this file, rotated daily
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one command and stream the reply
    Run {
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Interactive palette
    Repl,
    /// Show the current session context
    Context {
        #[arg(long)]
        workspace: Option<String>,
        #[arg(long)]
        session: Option<String>,
    },
    /// Follow runtime events until interrupted
    Events {
        #[arg(long)]
        session: Option<String>,
    },
    /// List installed extensions
    Extensions,
    /// List launchable applications
    Applications,
    /// Launch an application by id
    Open { id: String },
    /// Invoke an extension tool with a JSON argument object
    Tool {
        extension: String,
        tool: String,
        input: Option<String>,
    },
    /// Search notes
    Notes { query: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.log_file.as_deref())?;

    let config = resolve_config(&cli)?;
    tracing::debug!("[Cli] Using backend {}", config.base_url);
    let client = CocommandClient::from_config(&config);

    match cli.command {
        Commands::Run { text } => commands::run::run(client, &config, &text.join(" ")).await?,
        Commands::Repl => commands::repl::run(client, &config).await?,
        Commands::Context { workspace, session } => {
            commands::workspace::context(&client, workspace.as_deref(), session.as_deref()).await?
        }
        Commands::Events { session } => commands::events::run(&client, session.as_deref()).await?,
        Commands::Extensions => commands::workspace::extensions(&client).await?,
        Commands::Applications => commands::workspace::applications(&client).await?,
        Commands::Open { id } => commands::workspace::open_application(&client, &id).await?,
        Commands::Tool {
            extension,
            tool,
            input,
        } => commands::tool::invoke(&client, &extension, &tool, input.as_deref()).await?,
        Commands::Notes { query } => commands::workspace::search_notes(&client, &query).await?,
    }

    Ok(())
}

/// Config file, then environment, then flags.
fn resolve_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = ClientConfig::load()?;
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url.as_str());
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config = config.with_timeout_ms((timeout_ms > 0).then_some(timeout_ms));
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_joins_trailing_words() {
        let cli = Cli::parse_from(["cocommand", "--timeout-ms", "0", "run", "open", "my", "notes"]);
        assert_eq!(cli.timeout_ms, Some(0));
        match cli.command {
            Commands::Run { text } => assert_eq!(text.join(" "), "open my notes"),
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["cocommand", "events", "--session", "s1", "--base-url", "http://h:1"]);
        assert_eq!(cli.base_url.as_deref(), Some("http://h:1"));
        assert!(matches!(cli.command, Commands::Events { session: Some(ref s) } if s == "s1"));
    }
}
