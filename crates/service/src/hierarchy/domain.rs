use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::descriptor::EntityType;
use crate::entity::EntityView;

/// Caller-computed visibility; the engine never decides this itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessOptions {
    #[serde(default)]
    pub filter_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyOptions {
    #[serde(default)]
    pub language: Option<String>,
    /// `None` is unlimited.
    #[serde(default)]
    pub max_depth: Option<u32>,
    #[serde(default)]
    pub access_options: AccessOptions,
}

impl HierarchyOptions {
    pub fn filtered(filter_active: bool) -> Self {
        Self { access_options: AccessOptions { filter_active }, ..Self::default() }
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = Some(max_depth);
        self
    }
}

/// A formatted entity with its surviving children under the child-field key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    #[serde(flatten)]
    pub entity: EntityView,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub depth_truncated: bool,
    #[serde(flatten)]
    pub children: BTreeMap<&'static str, Vec<TreeBranch>>,
}

impl TreeNode {
    pub fn leaf(entity: EntityView) -> Self {
        Self { entity, depth_truncated: false, children: BTreeMap::new() }
    }

    pub fn truncated(entity: EntityView) -> Self {
        Self { entity, depth_truncated: true, children: BTreeMap::new() }
    }

    pub fn with_children(entity: EntityView, field: &'static str, branches: Vec<TreeBranch>) -> Self {
        Self { entity, depth_truncated: false, children: BTreeMap::from([(field, branches)]) }
    }

    /// Branches under the node's child key, empty for leaves and truncated nodes.
    pub fn branches(&self) -> &[TreeBranch] {
        self.children.values().next().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn child_nodes(&self) -> impl Iterator<Item = &TreeNode> {
        self.branches().iter().filter_map(TreeBranch::as_node)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TreeBranch {
    Node(TreeNode),
    Error(BranchError),
}

impl TreeBranch {
    pub fn as_node(&self) -> Option<&TreeNode> {
        match self {
            TreeBranch::Node(n) => Some(n),
            TreeBranch::Error(_) => None,
        }
    }
}

/// Inline marker standing in for a branch that failed to build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchError {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub error: String,
}

/// Result of building one branch. `Pruned` means "leave it out", not failure.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Found(TreeNode),
    Pruned,
    Error(BranchError),
}

impl BuildOutcome {
    pub fn into_branch(self) -> Option<TreeBranch> {
        match self {
            BuildOutcome::Found(node) => Some(TreeBranch::Node(node)),
            BuildOutcome::Pruned => None,
            BuildOutcome::Error(e) => Some(TreeBranch::Error(e)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildrenData {
    pub children: Vec<EntityView>,
    pub child_type: EntityType,
    pub parent: EntityView,
}

/// Root-to-item ancestors. `complete` is false when the walk hit a missing parent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParentChain {
    pub chain: Vec<EntityView>,
    pub complete: bool,
}
