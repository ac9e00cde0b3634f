//! Toolsets: named groups of callable tools.
//!
//! A [`Toolset`] maps `toolset name -> tool id -> tool`. The local registry
//! contributes one group and each remote endpoint contributes another. Tool
//! ids are globally unique across groups; merging two groups that share an id
//! fails with [`OgentError::ToolIdCollision`].

pub mod discovery;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{OgentError, Result};
use crate::tools::Tool;

pub use discovery::{Discovery, DiscoveryDiagnostic, RemoteToolsetSource, SharedDiscovery};

/// Tools of one group, keyed by id.
pub type ToolGroup = BTreeMap<String, Arc<dyn Tool>>;

/// Two-level mapping of toolset name to tool id to tool.
#[derive(Clone, Default)]
pub struct Toolset {
    groups: BTreeMap<String, ToolGroup>,
}

impl Toolset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a toolset with a single group.
    pub fn single(name: impl Into<String>, tools: Vec<Arc<dyn Tool>>) -> Result<Self> {
        let mut toolset = Self::new();
        toolset.insert_group(name, tools)?;
        Ok(toolset)
    }

    /// Add a group. Fails if any id already exists in this toolset, including
    /// twice within `tools`.
    pub fn insert_group(&mut self, name: impl Into<String>, tools: Vec<Arc<dyn Tool>>) -> Result<()> {
        let name = name.into();
        let mut group = ToolGroup::new();
        for tool in tools {
            let id = tool.id().to_string();
            if let Some(owner) = self.toolset_of(&id) {
                return Err(OgentError::ToolIdCollision {
                    id,
                    first_toolset: owner.to_string(),
                    second_toolset: name,
                });
            }
            if group.contains_key(&id) {
                return Err(OgentError::ToolIdCollision {
                    id,
                    first_toolset: name.clone(),
                    second_toolset: name,
                });
            }
            group.insert(id, tool);
        }
        self.groups.entry(name).or_default().extend(group);
        Ok(())
    }

    /// Merge every group of `other` into `self`.
    pub fn merge(mut self, other: Toolset) -> Result<Self> {
        for (name, group) in other.groups {
            self.insert_group(name, group.into_values().collect())?;
        }
        Ok(self)
    }

    /// A copy without the tools in `disabled`. Groups left empty are kept.
    pub fn filtered(&self, disabled: &DisabledToolIds) -> Self {
        let groups = self
            .groups
            .iter()
            .map(|(name, group)| {
                let kept = group
                    .iter()
                    .filter(|(id, _)| !disabled.contains(id))
                    .map(|(id, tool)| (id.clone(), Arc::clone(tool)))
                    .collect();
                (name.clone(), kept)
            })
            .collect();
        Self { groups }
    }

    /// Look a tool up by id across all groups.
    pub fn tool(&self, id: &str) -> Option<&Arc<dyn Tool>> {
        self.groups.values().find_map(|group| group.get(id))
    }

    /// Name of the group that owns `id`.
    pub fn toolset_of(&self, id: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|(_, group)| group.contains_key(id))
            .map(|(name, _)| name.as_str())
    }

    pub fn groups(&self) -> &BTreeMap<String, ToolGroup> {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&ToolGroup> {
        self.groups.get(name)
    }

    /// All tools, group by group.
    pub fn tools(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.groups.values().flat_map(|group| group.values())
    }

    pub fn ids(&self) -> BTreeSet<String> {
        self.tools().map(|tool| tool.id().to_string()).collect()
    }

    /// Number of tools across all groups.
    pub fn len(&self) -> usize {
        self.groups.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Toolset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (name, group) in &self.groups {
            map.entry(name, &group.keys().collect::<Vec<_>>());
        }
        map.finish()
    }
}

/// Tool ids the user has switched off.
///
/// Applied as a filter when a turn starts; never mutates a [`Toolset`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisabledToolIds(BTreeSet<String>);

impl DisabledToolIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    /// Returns `true` if the id was not already disabled.
    pub fn disable(&mut self, id: impl Into<String>) -> bool {
        self.0.insert(id.into())
    }

    /// Returns `true` if the id was disabled.
    pub fn enable(&mut self, id: &str) -> bool {
        self.0.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for DisabledToolIds {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{AgentTool, AgentToolParameters};
    use serde_json::json;

    fn tool(id: &str) -> Arc<dyn Tool> {
        Arc::new(AgentTool::new(
            id,
            "test tool",
            AgentToolParameters::empty(),
            |_args, _ctx| async move { Ok(json!({})) },
        ))
    }

    #[test]
    fn merge_keeps_groups_separate() {
        let local = Toolset::single("obsidian", vec![tool("a"), tool("b")]).unwrap();
        let remote = Toolset::single("search", vec![tool("c")]).unwrap();

        let merged = local.merge(remote).unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.toolset_of("c"), Some("search"));
        assert!(merged.tool("a").is_some());
    }

    #[test]
    fn merge_rejects_duplicate_ids_across_groups() {
        let local = Toolset::single("obsidian", vec![tool("a")]).unwrap();
        let remote = Toolset::single("search", vec![tool("a")]).unwrap();

        let err = local.merge(remote).unwrap_err();
        assert!(matches!(
            err,
            OgentError::ToolIdCollision { ref id, ref first_toolset, ref second_toolset }
            if id == "a" && first_toolset == "obsidian" && second_toolset == "search"
        ));
    }

    #[test]
    fn duplicate_ids_within_one_group_are_rejected() {
        assert!(Toolset::single("obsidian", vec![tool("a"), tool("a")]).is_err());
    }

    #[test]
    fn filtered_removes_disabled_and_keeps_empty_groups() {
        let toolset = Toolset::single("obsidian", vec![tool("a"), tool("b")])
            .unwrap()
            .merge(Toolset::single("search", vec![tool("c")]).unwrap())
            .unwrap();
        let disabled: DisabledToolIds = ["b", "c"].into_iter().collect();

        let filtered = toolset.filtered(&disabled);
        assert_eq!(filtered.ids(), BTreeSet::from(["a".to_string()]));
        assert!(filtered.group("search").is_some_and(|g| g.is_empty()));
        assert_eq!(toolset.len(), 3);
    }

    #[test]
    fn enabling_is_removal_from_the_set() {
        let mut disabled = DisabledToolIds::new();
        assert!(disabled.disable("a"));
        assert!(!disabled.disable("a"));
        assert!(disabled.enable("a"));
        assert!(disabled.is_empty());
    }
}
