//! Cross-type tree assembly over the catalog chain.

pub mod domain;
pub mod service;

pub use domain::{
    AccessOptions, BranchError, BuildOutcome, ChildrenData, HierarchyOptions, ParentChain, TreeBranch, TreeNode,
};
pub use service::HierarchyService;
