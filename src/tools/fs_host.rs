//! Filesystem-backed vault host.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::host::{HostCommand, NoteFile, VaultHost};
use crate::error::{OgentError, Result};

const NOTE_EXTENSION: &str = "md";

/// A vault rooted at a directory on disk.
///
/// Workspace state (the active note) is kept in memory. Commands are
/// registered up front and triggering one records it in
/// [`FsVault::executed_commands`].
#[derive(Debug)]
pub struct FsVault {
    root: PathBuf,
    active: RwLock<Option<String>>,
    commands: BTreeMap<String, HostCommand>,
    executed: Mutex<Vec<String>>,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            active: RwLock::new(None),
            commands: BTreeMap::new(),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Register a command that [`VaultHost::execute_command`] accepts.
    pub fn with_command(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        self.commands.insert(
            id.clone(),
            HostCommand {
                id,
                name: name.into(),
            },
        );
        self
    }

    /// Ids of commands triggered so far, in order.
    pub fn executed_commands(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    pub fn set_active_note(&self, path: Option<&str>) {
        if let Ok(mut active) = self.active.write() {
            *active = path.map(str::to_string);
        }
    }

    /// Map a vault-relative path onto disk, refusing anything that escapes the root.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative.as_os_str().is_empty() {
            return Err(OgentError::InvalidArgument("note path must not be empty".into()));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(OgentError::InvalidArgument(format!(
                        "path '{path}' escapes the vault"
                    )))
                }
            }
        }
        Ok(self.root.join(relative))
    }

    async fn note_at(&self, relative: String, absolute: &Path) -> Result<NoteFile> {
        let meta = tokio::fs::metadata(absolute).await?;
        let to_millis = |t: std::io::Result<std::time::SystemTime>| {
            t.ok().map(|t| DateTime::<Utc>::from(t).timestamp_millis())
        };
        Ok(NoteFile {
            basename: basename_of(&relative),
            path: relative,
            created: to_millis(meta.created()),
            modified: to_millis(meta.modified()),
        })
    }
}

fn basename_of(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.strip_suffix(".md").unwrap_or(file).to_string()
}

fn is_note(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(NOTE_EXTENSION)
}

#[async_trait]
impl VaultHost for FsVault {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn list_notes(&self) -> Result<Vec<NoteFile>> {
        let mut notes = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    let hidden = entry.file_name().to_string_lossy().starts_with('.');
                    if !hidden {
                        pending.push(path);
                    }
                    continue;
                }
                if !is_note(&path) {
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let relative = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                notes.push(self.note_at(relative, &path).await?);
            }
        }

        notes.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(notes)
    }

    async fn note(&self, path: &str) -> Result<Option<NoteFile>> {
        let absolute = self.resolve(path)?;
        if !tokio::fs::try_exists(&absolute).await? {
            return Ok(None);
        }
        let relative = path.trim_start_matches('/').to_string();
        self.note_at(relative, &absolute).await.map(Some)
    }

    async fn read_note(&self, path: &str) -> Result<Option<String>> {
        let absolute = self.resolve(path)?;
        match tokio::fs::read_to_string(&absolute).await {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn create_note(&self, path: &str, content: &str) -> Result<()> {
        let absolute = self.resolve(path)?;
        if tokio::fs::try_exists(&absolute).await? {
            return Err(OgentError::InvalidArgument(format!("File already exists: {path}")));
        }
        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&absolute, content).await?;
        Ok(())
    }

    async fn update_note(&self, path: &str, content: &str) -> Result<bool> {
        let absolute = self.resolve(path)?;
        if !tokio::fs::try_exists(&absolute).await? {
            return Ok(false);
        }
        tokio::fs::write(&absolute, content).await?;
        Ok(true)
    }

    async fn open_note(&self, path: &str) -> Result<bool> {
        let absolute = self.resolve(path)?;
        if !tokio::fs::try_exists(&absolute).await? {
            return Ok(false);
        }
        self.set_active_note(Some(path.trim_start_matches('/')));
        Ok(true)
    }

    async fn open_link(&self, link_text: &str) -> Result<Option<String>> {
        // `[[target#heading|alias]]` resolves on `target` alone.
        let target = link_text
            .split('|')
            .next()
            .unwrap_or(link_text)
            .split('#')
            .next()
            .unwrap_or(link_text)
            .trim();
        if target.is_empty() {
            return Ok(None);
        }

        let wanted_path = if target.ends_with(".md") {
            target.to_string()
        } else {
            format!("{target}.md")
        };
        let notes = self.list_notes().await?;
        let found = notes
            .iter()
            .find(|note| note.path == wanted_path)
            .or_else(|| notes.iter().find(|note| note.basename == target));

        let opened = found.map(|note| note.path.clone());
        if let Some(path) = &opened {
            self.set_active_note(Some(path));
        }
        Ok(opened)
    }

    fn active_note(&self) -> Option<String> {
        self.active.read().ok().and_then(|active| active.clone())
    }

    fn list_commands(&self) -> Vec<HostCommand> {
        self.commands.values().cloned().collect()
    }

    async fn execute_command(&self, id: &str) -> Result<()> {
        if !self.commands.contains_key(id) {
            return Err(OgentError::InvalidArgument(format!("Unknown command: {id}")));
        }
        if let Ok(mut log) = self.executed.lock() {
            log.push(id.to_string());
        }
        Ok(())
    }
}
