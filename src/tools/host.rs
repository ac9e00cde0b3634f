//! Host capabilities consumed by the local vault tools.
//!
//! The host owns note storage, workspace navigation and the command palette.
//! Tools only see this trait, so an editor integration and the on-disk
//! [`FsVault`](super::fs_host::FsVault) are interchangeable.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A markdown note known to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteFile {
    /// Vault-relative path with `/` separators.
    pub path: String,
    /// File name without extension.
    pub basename: String,
    /// Creation time in milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    /// Modification time in milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<i64>,
}

/// A command the host can trigger by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCommand {
    pub id: String,
    pub name: String,
}

#[async_trait]
pub trait VaultHost: Send + Sync {
    /// Vault root directory; shell commands run here.
    fn root(&self) -> &Path;

    /// All markdown notes in the vault.
    async fn list_notes(&self) -> Result<Vec<NoteFile>>;

    /// Note metadata, or `None` when no note exists at `path`.
    async fn note(&self, path: &str) -> Result<Option<NoteFile>>;

    /// Note content, or `None` when no note exists at `path`.
    async fn read_note(&self, path: &str) -> Result<Option<String>>;

    /// Create a new note. Fails when the path is taken.
    async fn create_note(&self, path: &str, content: &str) -> Result<()>;

    /// Replace a note's content. Returns `false` when the note does not exist.
    async fn update_note(&self, path: &str, content: &str) -> Result<bool>;

    /// Focus a note in the workspace. Returns `false` when it does not exist.
    async fn open_note(&self, path: &str) -> Result<bool>;

    /// Resolve link text (no brackets) and open it, returning the opened path.
    async fn open_link(&self, link_text: &str) -> Result<Option<String>>;

    /// Path of the note currently focused in the workspace.
    fn active_note(&self) -> Option<String>;

    fn list_commands(&self) -> Vec<HostCommand>;

    async fn execute_command(&self, id: &str) -> Result<()>;
}
