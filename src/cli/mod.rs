//! CLI entry point for Ogent.

pub mod tools;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::AgentSettings;
use crate::error::{OgentError, Result};

/// Ogent vault agent CLI
#[derive(Parser, Debug)]
#[command(name = "ogent", version, about = "Ogent: chat with an agent that can use your vault")]
pub struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one turn against the agent
    Chat(ChatArgs),
    /// Inspect and toggle tools
    Tools(ToolsArgs),
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Vault root directory
    #[arg(long, default_value = ".")]
    pub vault: PathBuf,

    /// Override the configured provider
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Override the configured model name
    #[arg(short, long)]
    pub model: Option<String>,

    /// Temperature (0.0 - 2.0)
    #[arg(short, long)]
    pub temperature: Option<f64>,

    /// Max tokens
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// User prompt
    pub prompt: String,
}

/// Arguments for the `tools` subcommand group.
#[derive(Parser, Debug)]
pub struct ToolsArgs {
    /// Vault root directory
    #[arg(long, default_value = ".", global = true)]
    pub vault: PathBuf,

    #[command(subcommand)]
    pub command: ToolsCommands,
}

/// Tool subcommands.
#[derive(Subcommand, Debug)]
pub enum ToolsCommands {
    /// List toolsets and whether each tool is enabled
    List,
    /// Disable a tool by id
    Disable(ToolIdArgs),
    /// Re-enable a tool by id
    Enable(ToolIdArgs),
}

#[derive(Parser, Debug)]
pub struct ToolIdArgs {
    pub id: String,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The settings file in effect.
    pub fn settings_path(&self) -> Result<PathBuf> {
        self.settings
            .clone()
            .or_else(AgentSettings::default_path)
            .ok_or_else(|| {
                OgentError::Configuration(
                    "no config directory found; pass --settings".into(),
                )
            })
    }
}

impl ChatArgs {
    /// Apply command-line overrides on top of the persisted settings.
    pub fn apply(&self, settings: &mut AgentSettings) {
        if let Some(provider) = &self.provider {
            settings.model.provider = provider.clone();
        }
        if let Some(model) = &self.model {
            settings.model.name = model.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_chat_with_defaults() {
        let cli = Cli::try_parse_from(["ogent", "chat", "hello"]).unwrap();
        match cli.command {
            Commands::Chat(args) => {
                assert_eq!(args.vault, PathBuf::from("."));
                assert!(args.provider.is_none());
                assert!(args.model.is_none());
                assert_eq!(args.prompt, "hello");
            }
            other => panic!("expected Chat, got {other:?}"),
        }
        assert!(cli.settings.is_none());
    }

    #[test]
    fn parse_chat_with_all_options() {
        let cli = Cli::try_parse_from([
            "ogent",
            "chat",
            "--vault",
            "/notes",
            "--settings",
            "/tmp/ogent.toml",
            "-p",
            "anthropic",
            "-m",
            "claude-sonnet-4",
            "--max-tokens",
            "1024",
            "Summarize today",
        ])
        .unwrap();
        assert_eq!(cli.settings, Some(PathBuf::from("/tmp/ogent.toml")));
        match cli.command {
            Commands::Chat(args) => {
                assert_eq!(args.vault, PathBuf::from("/notes"));
                assert_eq!(args.provider.as_deref(), Some("anthropic"));
                assert_eq!(args.model.as_deref(), Some("claude-sonnet-4"));
                assert_eq!(args.max_tokens, Some(1024));
                assert_eq!(args.prompt, "Summarize today");
            }
            other => panic!("expected Chat, got {other:?}"),
        }
    }

    #[test]
    fn chat_overrides_replace_model_fields() {
        let cli = Cli::try_parse_from(["ogent", "chat", "-p", "ollama", "-m", "llama3.2", "hi"]).unwrap();
        let Commands::Chat(args) = cli.command else {
            panic!("expected Chat");
        };
        let mut settings = AgentSettings::default();
        args.apply(&mut settings);
        assert_eq!(settings.model.provider, "ollama");
        assert_eq!(settings.model.name, "llama3.2");
    }

    #[test]
    fn parse_tools_disable() {
        let cli = Cli::try_parse_from(["ogent", "tools", "disable", "obsidian-execute-shell-command"]).unwrap();
        match cli.command {
            Commands::Tools(tools) => match tools.command {
                ToolsCommands::Disable(args) => assert_eq!(args.id, "obsidian-execute-shell-command"),
                other => panic!("expected Disable, got {other:?}"),
            },
            other => panic!("expected Tools, got {other:?}"),
        }
    }

    #[test]
    fn parse_tools_list() {
        let cli = Cli::try_parse_from(["ogent", "tools", "list"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Tools(ToolsArgs {
                command: ToolsCommands::List,
                ..
            })
        ));
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["ogent"]).is_err());
    }

    #[test]
    fn parse_chat_missing_prompt_is_error() {
        assert!(Cli::try_parse_from(["ogent", "chat"]).is_err());
    }
}
