//! Local vault tools.
//!
//! Each tool performs exactly one host-side effect through [`VaultHost`] and
//! returns a structured result. Failures surface as
//! [`OgentError::ToolExecution`] with a human-readable cause; nothing here
//! retries.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::host::VaultHost;
use super::shell::{self, SHELL_TIMEOUT};
use super::tool::{AgentTool, Tool};
use super::types::AgentToolParameters;
use crate::error::OgentError;

/// Toolset name of the local registry.
pub const LOCAL_TOOLSET: &str = "obsidian";

pub const CREATE_NOTE: &str = "obsidian-create-note";
pub const EXECUTE_SHELL_COMMAND: &str = "obsidian-execute-shell-command";
pub const GET_ACTIVE_NOTE: &str = "obsidian-get-active-note";
pub const GET_NOTE_CONTENT: &str = "obsidian-get-note-content";
pub const LIST_COMMANDS: &str = "obsidian-list-commands";
pub const OPEN_NOTE: &str = "obsidian-open-note";
pub const OPEN_WIKILINK: &str = "obsidian-open-wikilink";
pub const SEARCH_NOTES: &str = "obsidian-search-notes";
pub const TRIGGER_COMMAND: &str = "obsidian-trigger-command";
pub const UPDATE_NOTE_CONTENT: &str = "obsidian-update-note-content";

/// The full local tool registry, bound to `host`.
pub fn local_tools(host: Arc<dyn VaultHost>) -> Vec<Arc<dyn Tool>> {
    vec![
        create_note_tool(Arc::clone(&host)),
        execute_shell_command_tool(Arc::clone(&host)),
        get_active_note_tool(Arc::clone(&host)),
        get_note_content_tool(Arc::clone(&host)),
        list_commands_tool(Arc::clone(&host)),
        open_note_tool(Arc::clone(&host)),
        open_wikilink_tool(Arc::clone(&host)),
        search_notes_tool(Arc::clone(&host)),
        trigger_command_tool(Arc::clone(&host)),
        update_note_content_tool(host),
    ]
}

#[derive(Deserialize)]
struct PathInput {
    path: String,
}

#[derive(Deserialize)]
struct NoteInput {
    path: String,
    content: String,
}

pub fn create_note_tool(host: Arc<dyn VaultHost>) -> Arc<dyn Tool> {
    let tool = AgentTool::new(
        CREATE_NOTE,
        "Create a new note in the vault",
        AgentToolParameters::object()
            .string("path", "The path (including filename) for the new note", true)
            .string("content", "The content of the new note", true)
            .build(),
        move |args, _ctx| {
            let host = Arc::clone(&host);
            async move {
                let input: NoteInput = args.deserialize()?;
                host.create_note(&input.path, &input.content)
                    .await
                    .map_err(|e| OgentError::tool(CREATE_NOTE, e.to_string()))?;
                Ok(json!({ "success": true, "path": input.path }))
            }
        },
    )
    .with_output_schema(
        AgentToolParameters::object()
            .boolean("success", "Whether the note was created", true)
            .string("path", "Path of the created note", true)
            .build(),
    );
    Arc::new(tool)
}

#[derive(Deserialize)]
struct ShellInput {
    command: String,
    #[serde(default)]
    args: Vec<String>,
}

pub fn execute_shell_command_tool(host: Arc<dyn VaultHost>) -> Arc<dyn Tool> {
    let (shell_name, _) = shell::default_shell();
    let tool = AgentTool::new(
        EXECUTE_SHELL_COMMAND,
        format!("Execute a shell command in the vault root with {shell_name}"),
        AgentToolParameters::object()
            .string("command", "The shell command to execute", true)
            .string_array("args", "Arguments for the command", true)
            .build(),
        move |args, _ctx| {
            let host = Arc::clone(&host);
            async move {
                let input: ShellInput = args.deserialize()?;
                let fail = |cause: String| {
                    OgentError::tool(
                        EXECUTE_SHELL_COMMAND,
                        format!("Failed to execute shell command '{}': {cause}", input.command),
                    )
                };

                let run = shell::run_shell(host.root(), &input.command, &input.args);
                let result = match tokio::time::timeout(SHELL_TIMEOUT, run).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => return Err(fail(e.to_string())),
                    Err(_) => {
                        return Err(fail(format!(
                            "timed out after {}s",
                            SHELL_TIMEOUT.as_secs()
                        )))
                    }
                };

                match result.exit_code {
                    Some(0) => Ok(json!({ "output": result.output })),
                    Some(code) => Err(fail(format!(
                        "Command failed with exit code {code}\n{}",
                        result.output
                    ))),
                    None => Err(fail(format!(
                        "Command terminated by signal\n{}",
                        result.output
                    ))),
                }
            }
        },
    )
    .with_output_schema(
        AgentToolParameters::object()
            .string("output", "The output of the command", true)
            .build(),
    );
    Arc::new(tool)
}

pub fn get_active_note_tool(host: Arc<dyn VaultHost>) -> Arc<dyn Tool> {
    let tool = AgentTool::new(
        GET_ACTIVE_NOTE,
        "Get details of the currently active note in the workspace",
        AgentToolParameters::empty(),
        move |_args, _ctx| {
            let host = Arc::clone(&host);
            async move {
                let missing = || OgentError::tool(GET_ACTIVE_NOTE, "No active note");
                let path = host.active_note().ok_or_else(missing)?;
                let note = host
                    .note(&path)
                    .await
                    .map_err(|e| OgentError::tool(GET_ACTIVE_NOTE, e.to_string()))?
                    .ok_or_else(missing)?;
                let content = host
                    .read_note(&path)
                    .await
                    .map_err(|e| OgentError::tool(GET_ACTIVE_NOTE, e.to_string()))?
                    .ok_or_else(missing)?;
                Ok(json!({
                    "path": note.path,
                    "basename": note.basename,
                    "content": content,
                    "created": note.created,
                    "modified": note.modified,
                }))
            }
        },
    )
    .with_output_schema(
        AgentToolParameters::object()
            .string("path", "Vault-relative path", true)
            .string("basename", "File name without extension", true)
            .string("content", "Note content", true)
            .number("created", "Creation time (ms since epoch)", false)
            .number("modified", "Modification time (ms since epoch)", false)
            .build(),
    );
    Arc::new(tool)
}

pub fn get_note_content_tool(host: Arc<dyn VaultHost>) -> Arc<dyn Tool> {
    let tool = AgentTool::new(
        GET_NOTE_CONTENT,
        "Get the content of a note by path",
        AgentToolParameters::object()
            .string("path", "The path of the note", true)
            .build(),
        move |args, _ctx| {
            let host = Arc::clone(&host);
            async move {
                let input: PathInput = args.deserialize()?;
                let content = host
                    .read_note(&input.path)
                    .await
                    .map_err(|e| OgentError::tool(GET_NOTE_CONTENT, e.to_string()))?
                    .ok_or_else(|| {
                        OgentError::tool(GET_NOTE_CONTENT, format!("File not found: {}", input.path))
                    })?;
                Ok(json!({ "content": content }))
            }
        },
    )
    .with_output_schema(
        AgentToolParameters::object()
            .string("content", "The content of the note", true)
            .build(),
    );
    Arc::new(tool)
}

pub fn list_commands_tool(host: Arc<dyn VaultHost>) -> Arc<dyn Tool> {
    let tool = AgentTool::new(
        LIST_COMMANDS,
        "List all available commands in the host application",
        AgentToolParameters::empty(),
        move |_args, _ctx| {
            let host = Arc::clone(&host);
            async move { Ok(json!({ "commands": host.list_commands() })) }
        },
    )
    .with_output_schema(
        AgentToolParameters::object()
            .schema(
                "commands",
                json!({
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "name": { "type": "string" },
                        },
                    },
                }),
                true,
            )
            .build(),
    );
    Arc::new(tool)
}

pub fn open_note_tool(host: Arc<dyn VaultHost>) -> Arc<dyn Tool> {
    let tool = AgentTool::new(
        OPEN_NOTE,
        "Open a note in the workspace by path",
        AgentToolParameters::object()
            .string("path", "The path of the note to open", true)
            .build(),
        move |args, _ctx| {
            let host = Arc::clone(&host);
            async move {
                let input: PathInput = args.deserialize()?;
                let opened = host
                    .open_note(&input.path)
                    .await
                    .map_err(|e| OgentError::tool(OPEN_NOTE, e.to_string()))?;
                if !opened {
                    return Err(OgentError::tool(
                        OPEN_NOTE,
                        format!("File not found: {}", input.path),
                    ));
                }
                Ok(json!({ "success": true }))
            }
        },
    )
    .with_output_schema(
        AgentToolParameters::object()
            .boolean("success", "Whether the note was opened", true)
            .build(),
    );
    Arc::new(tool)
}

static WIKILINK_BRACKETS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[\[|\]\]$").expect("wikilink bracket regex must compile")
});

/// Strip one leading `[[` and one trailing `]]`.
pub fn strip_wikilink(raw: &str) -> String {
    WIKILINK_BRACKETS.replace_all(raw.trim(), "").into_owned()
}

#[derive(Deserialize)]
struct WikilinkInput {
    wikilink: String,
}

pub fn open_wikilink_tool(host: Arc<dyn VaultHost>) -> Arc<dyn Tool> {
    let tool = AgentTool::new(
        OPEN_WIKILINK,
        "Open a note by wikilink (e.g. [[Note name]]) in the workspace",
        AgentToolParameters::object()
            .string("wikilink", "The wikilink to open (e.g. [[Note name]])", true)
            .build(),
        move |args, _ctx| {
            let host = Arc::clone(&host);
            async move {
                let input: WikilinkInput = args.deserialize()?;
                let link_text = strip_wikilink(&input.wikilink);
                let path = host
                    .open_link(&link_text)
                    .await
                    .map_err(|e| OgentError::tool(OPEN_WIKILINK, e.to_string()))?;
                Ok(json!({ "success": true, "path": path }))
            }
        },
    )
    .with_output_schema(
        AgentToolParameters::object()
            .boolean("success", "Whether the link was followed", true)
            .string("path", "Path of the opened note", false)
            .build(),
    );
    Arc::new(tool)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchInput {
    query: String,
    #[serde(default)]
    in_content: bool,
}

pub fn search_notes_tool(host: Arc<dyn VaultHost>) -> Arc<dyn Tool> {
    let tool = AgentTool::new(
        SEARCH_NOTES,
        "Search notes by filename or content",
        AgentToolParameters::object()
            .string("query", "The search query", true)
            .boolean("inContent", "Search in content (default: false)", false)
            .build(),
        move |args, _ctx| {
            let host = Arc::clone(&host);
            async move {
                let input: SearchInput = args.deserialize()?;
                let notes = host
                    .list_notes()
                    .await
                    .map_err(|e| OgentError::tool(SEARCH_NOTES, e.to_string()))?;

                let mut results = Vec::new();
                for note in notes {
                    let matched = if input.in_content {
                        match host.read_note(&note.path).await {
                            Ok(text) => text.is_some_and(|text| text.contains(&input.query)),
                            Err(error) => {
                                warn!(
                                    tool_id = SEARCH_NOTES,
                                    path = %note.path,
                                    %error,
                                    "skipping unreadable note"
                                );
                                false
                            }
                        }
                    } else {
                        note.path.contains(&input.query) || note.basename.contains(&input.query)
                    };
                    if matched {
                        results.push(json!({ "path": note.path, "basename": note.basename }));
                    }
                }
                Ok(json!({ "results": results }))
            }
        },
    )
    .with_output_schema(
        AgentToolParameters::object()
            .schema(
                "results",
                json!({
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "path": { "type": "string" },
                            "basename": { "type": "string" },
                        },
                    },
                }),
                true,
            )
            .build(),
    );
    Arc::new(tool)
}

#[derive(Deserialize)]
struct CommandInput {
    id: String,
}

pub fn trigger_command_tool(host: Arc<dyn VaultHost>) -> Arc<dyn Tool> {
    let tool = AgentTool::new(
        TRIGGER_COMMAND,
        "Trigger a host command by id",
        AgentToolParameters::object()
            .string("id", "The command to trigger", true)
            .build(),
        move |args, _ctx| {
            let host = Arc::clone(&host);
            async move {
                let input: CommandInput = args.deserialize()?;
                host.execute_command(&input.id).await.map_err(|e| {
                    OgentError::tool(
                        TRIGGER_COMMAND,
                        format!("Failed to execute command '{}': {e}", input.id),
                    )
                })?;
                Ok(json!({ "success": true }))
            }
        },
    )
    .with_output_schema(
        AgentToolParameters::object()
            .boolean("success", "Whether the command was successfully triggered", true)
            .build(),
    );
    Arc::new(tool)
}

pub fn update_note_content_tool(host: Arc<dyn VaultHost>) -> Arc<dyn Tool> {
    let tool = AgentTool::new(
        UPDATE_NOTE_CONTENT,
        "Replace the content of an existing note",
        AgentToolParameters::object()
            .string("path", "The path of the note", true)
            .string("content", "The new content", true)
            .build(),
        move |args, _ctx| {
            let host = Arc::clone(&host);
            async move {
                let input: NoteInput = args.deserialize()?;
                let updated = host
                    .update_note(&input.path, &input.content)
                    .await
                    .map_err(|e| OgentError::tool(UPDATE_NOTE_CONTENT, e.to_string()))?;
                if !updated {
                    return Err(OgentError::tool(
                        UPDATE_NOTE_CONTENT,
                        format!("File not found: {}", input.path),
                    ));
                }
                Ok(json!({ "success": true }))
            }
        },
    )
    .with_output_schema(
        AgentToolParameters::object()
            .boolean("success", "Whether the note was updated", true)
            .build(),
    );
    Arc::new(tool)
}
