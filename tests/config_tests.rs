//! Settings files feeding a session.

mod common;

use common::vault;
use ogent::config::{AgentSettings, CredentialContext, DEFAULT_INSTRUCTIONS};
use ogent::provider::{ProviderKind, ProviderRegistry};
use ogent::session::{AgentSession, SessionConfig};
use ogent::tools::vault::{EXECUTE_SHELL_COMMAND, SEARCH_NOTES};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const SETTINGS: &str = r#"
disabledToolIds = ["obsidian-execute-shell-command"]
instructions = "   "

[model]
provider = "openai"
name = "gpt-4o-mini"

[mcpServers.files]
command = "npx"
args = ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]
"#;

#[test]
fn host_style_keys_are_accepted() {
    let settings = AgentSettings::from_toml(SETTINGS).unwrap();
    assert_eq!(settings.model.kind(), Some(ProviderKind::OpenAi));
    assert_eq!(settings.instructions, DEFAULT_INSTRUCTIONS);
    assert_eq!(settings.disabled_tool_ids, vec![EXECUTE_SHELL_COMMAND.to_string()]);
    assert_eq!(settings.mcp_servers["files"].command, "npx");
}

#[test]
fn credential_comes_from_the_provider_key() {
    let settings = AgentSettings::from_toml(SETTINGS).unwrap();
    let env = CredentialContext::new().with("OPENAI_API_KEY", "sk-env");
    let config = SessionConfig::from_settings(&settings, &env);
    assert_eq!(config.credential, "sk-env");
    assert!(config.disabled.contains(EXECUTE_SHELL_COMMAND));
}

#[test]
fn saved_toggles_survive_a_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/settings.toml");

    let mut settings = AgentSettings::from_toml(SETTINGS).unwrap();
    assert!(settings.enable_tool(EXECUTE_SHELL_COMMAND));
    assert!(settings.disable_tool(SEARCH_NOTES));
    settings.save(&path).unwrap();

    let reloaded = AgentSettings::load(&path).unwrap();
    assert_eq!(reloaded, settings);
    assert_eq!(reloaded.disabled_tool_ids, vec![SEARCH_NOTES.to_string()]);
}

#[tokio::test]
async fn disabled_ids_from_settings_hide_tools_from_the_session() {
    let (_dir, host) = vault();
    let settings = AgentSettings::from_toml(SETTINGS).unwrap();
    let config = SessionConfig::from_settings(&settings, &CredentialContext::new());
    let session = AgentSession::new(config, ProviderRegistry::new(), host);

    let enabled = session.enabled_toolset().await.unwrap();
    assert_eq!(enabled.len(), 9);
    assert!(enabled.tool(EXECUTE_SHELL_COMMAND).is_none());
    assert!(session.toolset().await.unwrap().tool(EXECUTE_SHELL_COMMAND).is_some());
}
