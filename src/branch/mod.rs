//! Branch state, subtree snapshots, and nested-branch resolution.

mod locate;
mod state;
mod subtree;

pub use locate::{
    find_nested_branch_element_by_relpath, outer_branch_and_eid, root_rrpath, rrpath_by_eid,
    BranchLookup,
};
pub use state::BranchState;
pub(crate) use subtree::instantiate_subbranches;
pub use subtree::{flat_subtree, get_subtree, instantiate_elements_r, Subtree};
