//! Resolution of a branch's place within its containing branches.
//!
//! A branch's id encodes its nesting ancestry, so its outer branch is
//! recovered purely by parsing the id and looking the outer id up in the
//! same transaction or revision. All recursion here is bounded by nesting
//! depth: every step strips one id segment or descends into a branch with a
//! strictly longer id.

use crate::branch::state::BranchState;
use crate::types::{Bid, Eid};

/// Branch lookup within one transaction or one frozen revision.
pub trait BranchLookup {
    fn lookup_branch(&self, bid: &Bid) -> Option<&BranchState>;
}

/// The containing branch of `branch`, and the EID it nests under.
///
/// Returns `None` for a top-level branch. `Some((None, eid))` means the id
/// says the branch nests under `eid` of an outer branch that is not present
/// in `ctx`, which is the orphaned state a sequence point purges.
pub fn outer_branch_and_eid<'a, L: BranchLookup + ?Sized>(
    ctx: &'a L,
    branch: &BranchState,
) -> Option<(Option<&'a BranchState>, Eid)> {
    let (outer_bid, outer_eid) = branch.bid().unnest()?;
    Some((ctx.lookup_branch(&outer_bid), outer_eid))
}

/// Repository-root-relative path of this branch's root element.
///
/// Empty for a top-level branch; `None` if the nesting chain is broken.
pub fn root_rrpath<L: BranchLookup + ?Sized>(ctx: &L, branch: &BranchState) -> Option<String> {
    match outer_branch_and_eid(ctx, branch) {
        None => Some(String::new()),
        Some((Some(outer), outer_eid)) => rrpath_by_eid(ctx, outer, outer_eid),
        Some((None, _)) => None,
    }
}

/// Repository-root-relative path of `eid` within `branch`.
pub fn rrpath_by_eid<L: BranchLookup + ?Sized>(
    ctx: &L,
    branch: &BranchState,
    eid: Eid,
) -> Option<String> {
    let root = root_rrpath(ctx, branch)?;
    let local = branch.path_by_eid(eid)?;
    Some(join_relpath(&root, &local))
}

/// Descend from `root_branch` into whichever nested branch owns `relpath`.
///
/// At each level, the deepest subbranch mount that is an ancestor of the
/// remaining path wins. The walk stops at the deepest branch containing a
/// prefix match and resolves the remainder there; an unresolvable remainder
/// yields `(branch, None)` rather than an error.
pub fn find_nested_branch_element_by_relpath<'a, L: BranchLookup + ?Sized>(
    ctx: &'a L,
    root_branch: &'a BranchState,
    relpath: &str,
) -> (&'a BranchState, Option<Eid>) {
    let mut branch = root_branch;
    let mut remaining = relpath.to_string();

    loop {
        let mut next: Option<(&BranchState, String)> = None;
        let mut best_mount_len = 0;

        for sub_eid in branch.immediate_subbranch_eids() {
            let Some(mount) = branch.path_by_eid(sub_eid) else {
                continue;
            };
            let Some(rest) = skip_ancestor(&mount, &remaining) else {
                continue;
            };
            let Some(sub) = ctx.lookup_branch(&branch.bid().nest(sub_eid)) else {
                continue;
            };
            if next.is_none() || mount.len() > best_mount_len {
                best_mount_len = mount.len();
                next = Some((sub, rest.to_string()));
            }
        }

        match next {
            Some((sub, rest)) => {
                branch = sub;
                remaining = rest;
            }
            None => break,
        }
    }

    let eid = branch.eid_by_path(&remaining);
    (branch, eid)
}

fn join_relpath(a: &str, b: &str) -> String {
    if a.is_empty() {
        b.to_string()
    } else if b.is_empty() {
        a.to_string()
    } else {
        format!("{}/{}", a, b)
    }
}

/// The remainder of `path` below `ancestor`, if `ancestor` is a path prefix.
fn skip_ancestor<'a>(ancestor: &str, path: &'a str) -> Option<&'a str> {
    if ancestor.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(ancestor)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix('/')
    }
}
