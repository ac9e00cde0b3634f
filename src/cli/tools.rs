//! CLI tool command handlers for list, disable, and enable.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use crate::config::AgentSettings;
use crate::error::Result;
use crate::provider::ProviderRegistry;
use crate::session::{AgentSession, SessionConfig};
use crate::tools::FsVault;
use crate::toolset::{DisabledToolIds, Toolset};

/// Handle `ogent tools list`.
pub async fn handle_list(settings_path: &Path, vault: &Path) -> Result<()> {
    let settings = AgentSettings::load(settings_path)?;
    let env = settings.credential_context();
    let session = AgentSession::new(
        SessionConfig::from_settings(&settings, &env),
        ProviderRegistry::new().with_base_context(env),
        Arc::new(FsVault::new(vault)),
    )
    .with_mcp_servers(&settings.mcp_servers);

    let listed = async {
        let toolset = session.toolset().await?;
        let disabled: DisabledToolIds = settings.disabled_tool_ids.iter().cloned().collect();
        print!("{}", render_listing(&toolset, &disabled));
        for diagnostic in session.diagnostics().await? {
            eprintln!("! {}: {}", diagnostic.endpoint, diagnostic.message);
        }
        Ok(())
    }
    .await;
    session.close().await;
    listed
}

/// Handle `ogent tools disable <id>` and `ogent tools enable <id>`.
pub fn handle_toggle(settings_path: &Path, tool_id: &str, enable: bool) -> Result<()> {
    let mut settings = AgentSettings::load(settings_path)?;
    let changed = if enable {
        settings.enable_tool(tool_id)
    } else {
        settings.disable_tool(tool_id)
    };
    if !changed {
        let state = if enable { "enabled" } else { "disabled" };
        println!("{tool_id} is already {state}");
        return Ok(());
    }
    settings.save(settings_path)?;
    let verb = if enable { "Enabled" } else { "Disabled" };
    println!("{verb} {tool_id}");
    Ok(())
}

/// One block per toolset, one line per tool.
pub fn render_listing(toolset: &Toolset, disabled: &DisabledToolIds) -> String {
    let mut out = String::new();
    for (name, group) in toolset.groups() {
        let enabled = group.keys().filter(|id| !disabled.contains(id)).count();
        let _ = writeln!(out, "{name} ({enabled}/{} enabled)", group.len());
        for (id, tool) in group {
            let mark = if disabled.contains(id) { " " } else { "x" };
            let _ = writeln!(out, "  [{mark}] {id}  {}", tool.description());
        }
    }
    out
}
