//! The local vault tools against an on-disk vault.

mod common;

use std::sync::Arc;

use common::vault;
use ogent::error::OgentError;
use ogent::tools::vault::{
    CREATE_NOTE, GET_ACTIVE_NOTE, GET_NOTE_CONTENT, LIST_COMMANDS, OPEN_NOTE, OPEN_WIKILINK,
    SEARCH_NOTES, TRIGGER_COMMAND, UPDATE_NOTE_CONTENT,
};
use ogent::tools::{invoke, local_tools, Tool, ToolExecutionContext, LOCAL_TOOLSET};
use ogent::toolset::Toolset;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

async fn run(tools: &Toolset, id: &str, args: Value) -> Result<Value, OgentError> {
    let tool: &Arc<dyn Tool> = tools.tool(id).unwrap();
    invoke(tool.as_ref(), &args, &ToolExecutionContext::default()).await
}

fn tool_message(err: OgentError) -> String {
    match err {
        OgentError::ToolExecution { message, .. } => message,
        other => panic!("expected a tool failure, got {other:?}"),
    }
}

#[test]
fn registry_has_ten_tools_in_one_group() {
    let (_dir, host) = vault();
    let tools = Toolset::single(LOCAL_TOOLSET, local_tools(host)).unwrap();
    assert_eq!(tools.len(), 10);
    assert_eq!(tools.groups().len(), 1);
    for id in tools.ids() {
        assert!(id.starts_with("obsidian-"), "unexpected id {id}");
    }
}

#[tokio::test]
async fn create_read_update_round_trip() {
    let (dir, host) = vault();
    let tools = Toolset::single(LOCAL_TOOLSET, local_tools(host)).unwrap();

    let created = run(&tools, CREATE_NOTE, json!({ "path": "inbox/Idea.md", "content": "v1" }))
        .await
        .unwrap();
    assert_eq!(created, json!({ "success": true, "path": "inbox/Idea.md" }));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("inbox/Idea.md")).unwrap(),
        "v1"
    );

    run(&tools, UPDATE_NOTE_CONTENT, json!({ "path": "inbox/Idea.md", "content": "v2" }))
        .await
        .unwrap();
    let read = run(&tools, GET_NOTE_CONTENT, json!({ "path": "inbox/Idea.md" }))
        .await
        .unwrap();
    assert_eq!(read, json!({ "content": "v2" }));
}

#[tokio::test]
async fn missing_notes_are_tool_failures() {
    let (_dir, host) = vault();
    let tools = Toolset::single(LOCAL_TOOLSET, local_tools(host)).unwrap();

    let err = run(&tools, GET_NOTE_CONTENT, json!({ "path": "Nope.md" }))
        .await
        .unwrap_err();
    assert_eq!(tool_message(err), "File not found: Nope.md");

    let err = run(&tools, UPDATE_NOTE_CONTENT, json!({ "path": "Nope.md", "content": "x" }))
        .await
        .unwrap_err();
    assert_eq!(tool_message(err), "File not found: Nope.md");

    let err = run(&tools, OPEN_NOTE, json!({ "path": "Nope.md" }))
        .await
        .unwrap_err();
    assert_eq!(tool_message(err), "File not found: Nope.md");
}

#[tokio::test]
async fn search_by_name_and_by_content() {
    let (_dir, host) = vault();
    let tools = Toolset::single(LOCAL_TOOLSET, local_tools(host)).unwrap();

    let by_name = run(&tools, SEARCH_NOTES, json!({ "query": "Rust" })).await.unwrap();
    assert_eq!(
        by_name,
        json!({ "results": [{ "path": "projects/Rust.md", "basename": "Rust" }] })
    );

    let by_content = run(&tools, SEARCH_NOTES, json!({ "query": "borrowing", "inContent": true }))
        .await
        .unwrap();
    assert_eq!(by_content["results"][0]["path"], "projects/Rust.md");

    let name_only = run(&tools, SEARCH_NOTES, json!({ "query": "borrowing" })).await.unwrap();
    assert_eq!(name_only, json!({ "results": [] }));
}

#[tokio::test]
async fn content_search_skips_notes_that_are_not_text() {
    let (dir, host) = vault();
    std::fs::write(dir.path().join("blob.md"), [0xff, 0xfe, 0x00]).unwrap();
    let tools = Toolset::single(LOCAL_TOOLSET, local_tools(host)).unwrap();

    let found = run(&tools, SEARCH_NOTES, json!({ "query": "borrowing", "inContent": true }))
        .await
        .unwrap();
    assert_eq!(
        found,
        json!({ "results": [{ "path": "projects/Rust.md", "basename": "Rust" }] })
    );
}

#[tokio::test]
async fn opening_a_note_makes_it_active() {
    let (_dir, host) = vault();
    let tools = Toolset::single(LOCAL_TOOLSET, local_tools(host)).unwrap();

    let err = run(&tools, GET_ACTIVE_NOTE, json!({})).await.unwrap_err();
    assert_eq!(tool_message(err), "No active note");

    run(&tools, OPEN_NOTE, json!({ "path": "Welcome.md" })).await.unwrap();
    let active = run(&tools, GET_ACTIVE_NOTE, json!({})).await.unwrap();
    assert_eq!(active["path"], "Welcome.md");
    assert_eq!(active["basename"], "Welcome");
    assert_eq!(active["content"], "# Welcome\nHello vault");
}

#[tokio::test]
async fn wikilinks_resolve_by_basename() {
    let (_dir, host) = vault();
    let tools = Toolset::single(LOCAL_TOOLSET, local_tools(host.clone())).unwrap();

    let opened = run(&tools, OPEN_WIKILINK, json!({ "wikilink": "[[Rust|the book]]" }))
        .await
        .unwrap();
    assert_eq!(opened, json!({ "success": true, "path": "projects/Rust.md" }));

    let active = run(&tools, GET_ACTIVE_NOTE, json!({})).await.unwrap();
    assert_eq!(active["path"], "projects/Rust.md");
}

#[tokio::test]
async fn host_commands_are_listed_and_triggered() {
    let (_dir, host) = vault();
    let tools = Toolset::single(LOCAL_TOOLSET, local_tools(host.clone())).unwrap();

    let listed = run(&tools, LIST_COMMANDS, json!({})).await.unwrap();
    assert_eq!(listed["commands"][0]["id"], "app:reload");

    run(&tools, TRIGGER_COMMAND, json!({ "id": "app:reload" })).await.unwrap();
    assert_eq!(host.executed_commands(), vec!["app:reload".to_string()]);

    let err = run(&tools, TRIGGER_COMMAND, json!({ "id": "app:quit" }))
        .await
        .unwrap_err();
    assert!(tool_message(err).starts_with("Failed to execute command 'app:quit'"));
}

#[tokio::test]
async fn paths_outside_the_vault_are_refused() {
    let (_dir, host) = vault();
    let tools = Toolset::single(LOCAL_TOOLSET, local_tools(host)).unwrap();

    let err = run(&tools, CREATE_NOTE, json!({ "path": "../escape.md", "content": "x" }))
        .await
        .unwrap_err();
    assert!(tool_message(err).contains("escapes the vault"));
}

#[tokio::test]
async fn missing_required_arguments_fail_validation() {
    let (_dir, host) = vault();
    let tools = Toolset::single(LOCAL_TOOLSET, local_tools(host)).unwrap();

    let err = run(&tools, CREATE_NOTE, json!({ "path": "a.md" })).await.unwrap_err();
    assert!(matches!(err, OgentError::Validation { ref tool_id, .. } if tool_id == CREATE_NOTE));
}

#[cfg(unix)]
#[tokio::test]
async fn shell_commands_run_in_the_vault_root() {
    let (_dir, host) = vault();
    let tools = Toolset::single(LOCAL_TOOLSET, local_tools(host)).unwrap();

    let output = run(
        &tools,
        ogent::tools::vault::EXECUTE_SHELL_COMMAND,
        json!({ "command": "ls", "args": [] }),
    )
    .await
    .unwrap();
    let listing = output["output"].as_str().unwrap();
    assert!(listing.contains("Welcome.md"));
    assert!(listing.contains("projects"));
}
