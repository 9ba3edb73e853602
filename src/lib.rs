//! # Arbor
//!
//! An element-addressed branching core: a forest of nestable branches whose
//! contents are identified by stable element ids (EIDs) rather than paths.
//!
//! ## Core Concepts
//!
//! - **Elements**: Nodes addressed by EID, stable across renames and moves
//! - **Branches**: EID-indexed trees that can nest inside one another
//! - **Transactions**: The mutable branch set being prepared as a revision
//! - **Revisions**: Frozen, append-only snapshots of the whole forest
//!
//! ## Example
//!
//! ```ignore
//! use arbor::{Bid, BranchTxn, Eid, ElRevRef, Payload, Repository, Revnum};
//!
//! let repos = Repository::new();
//!
//! // Revision 0: a root branch with one element.
//! let mut txn = repos.begin_initial_txn()?;
//! let b0 = Bid::root("B0")?;
//! txn.add_new_branch(b0.clone(), None, Eid(0))?;
//! txn.alter_one(&b0, Eid(1), Some(Eid(0)), "docs", Payload::dir())?;
//! txn.complete()?;
//!
//! // Revision 1: branch the "docs" subtree into its own nested branch.
//! let mut txn = repos.begin_txn(Revnum(0))?;
//! txn.branch(&ElRevRef::current(b0.clone(), Eid(1)), b0.nest(Eid(1)))?;
//! txn.sequence_point()?;
//! txn.complete()?;
//! ```

pub mod branch;
pub mod error;
pub mod repos;
pub mod tree;
pub mod txn;
pub mod types;

// Re-exports
pub use branch::{
    find_nested_branch_element_by_relpath, flat_subtree, get_subtree, instantiate_elements_r,
    outer_branch_and_eid, root_rrpath, rrpath_by_eid, BranchLookup, BranchState, Subtree,
};
pub use error::{BranchError, Result};
pub use repos::{Repository, Revision};
pub use tree::ElementTree;
pub use txn::{BranchTxn, FlatTxn, NestedTxn};
pub use types::*;
