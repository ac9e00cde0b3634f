//! Ogent CLI binary entry point.

use std::io::Write;
use std::sync::Arc;

use futures::StreamExt;
use ogent::agent_loop::{StreamEvent, TurnStatus};
use ogent::cli::{ChatArgs, Cli, Commands, ToolsCommands};
use ogent::config::AgentSettings;
use ogent::error::OgentError;
use ogent::provider::ProviderRegistry;
use ogent::session::{AgentSession, SessionConfig};
use ogent::tools::FsVault;
use ogent::types::GenerationSettings;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse_args();

    let result = run(cli).await;
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), OgentError> {
    let settings_path = cli.settings_path()?;
    match cli.command {
        Commands::Chat(args) => handle_chat(&settings_path, args).await,
        Commands::Tools(tools) => match tools.command {
            ToolsCommands::List => ogent::cli::tools::handle_list(&settings_path, &tools.vault).await,
            ToolsCommands::Disable(args) => {
                ogent::cli::tools::handle_toggle(&settings_path, &args.id, false)
            }
            ToolsCommands::Enable(args) => {
                ogent::cli::tools::handle_toggle(&settings_path, &args.id, true)
            }
        },
    }
}

async fn handle_chat(settings_path: &std::path::Path, args: ChatArgs) -> Result<(), OgentError> {
    let mut settings = AgentSettings::load(settings_path)?;
    args.apply(&mut settings);

    let env = settings.credential_context();
    let generation = GenerationSettings {
        temperature: args.temperature,
        max_tokens: args.max_tokens,
    };
    let config = SessionConfig::from_settings(&settings, &env).with_generation(generation);
    let registry = ProviderRegistry::new().with_base_context(env);
    let session = AgentSession::new(config, registry, Arc::new(FsVault::new(&args.vault)))
        .with_mcp_servers(&settings.mcp_servers);

    let mut turn = session.send(args.prompt.as_str()).await?;

    let mut stdout = std::io::stdout();
    let mut printed = 0usize;
    let mut failure = None;
    let mut written = Ok(());
    while let Some(update) = turn.next().await {
        if let Err(error) = write_suffix(&mut stdout, &update.display, &mut printed) {
            turn.cancel();
            written = Err(error);
            break;
        }
        if let StreamEvent::Error { data, .. } = &update.event {
            failure = Some(data.to_string());
        }
    }
    let summary = turn.finish().await;
    session.close().await;
    written?;
    writeln!(stdout)?;

    if summary.outcome.truncated {
        eprintln!("(stopped after {} steps)", summary.outcome.steps);
    }
    match (summary.outcome.status, failure) {
        (TurnStatus::Failed, Some(data)) => Err(OgentError::Stream(data)),
        (TurnStatus::Failed, None) => Err(OgentError::Stream(
            summary.outcome.error.unwrap_or_else(|| "turn failed".into()),
        )),
        _ => Ok(()),
    }
}

/// Print the part of `display` past `printed`. Display text only grows.
fn write_suffix(out: &mut impl Write, display: &str, printed: &mut usize) -> std::io::Result<()> {
    out.write_all(display[*printed..].as_bytes())?;
    out.flush()?;
    *printed = display.len();
    Ok(())
}
