//! Deep, self-contained snapshots of branch subtrees.
//!
//! A [`Subtree`] bundles everything reachable at or below one element,
//! including the full content of any branches nested pathwise underneath,
//! so it can outlive its source and be replayed into a fresh location.
//! Extraction and instantiation are the mechanism underneath the recursive
//! branch and copy operations.

use crate::branch::locate::BranchLookup;
use crate::branch::state::BranchState;
use crate::error::Result;
use crate::tree::ElementTree;
use crate::txn::BranchTxn;
use crate::types::{Bid, Eid, ElRevRef};
use std::collections::BTreeMap;

/// A deep snapshot of one branch subtree.
///
/// `subbranches` maps the outer EID a nested branch mounts at to that
/// branch's own full subtree. Everything here is an owned deep copy.
#[derive(Clone, Debug)]
pub struct Subtree {
    pub tree: ElementTree,
    pub predecessor: Option<ElRevRef>,
    pub subbranches: BTreeMap<Eid, Subtree>,
}

impl Subtree {
    /// The nested subtree mounted at `eid`, if any.
    pub fn subbranch_at_eid(&self, eid: Eid) -> Option<&Subtree> {
        self.subbranches.get(&eid)
    }
}

/// Extract the elements of `branch` at or below `eid`, without recursing
/// into nested branches.
///
/// The extracted root element is re-rooted (parent cleared, name emptied) so
/// that instantiation lands it as a branch root.
pub fn flat_subtree(branch: &BranchState, eid: Eid) -> Result<Subtree> {
    let eids = branch.tree().subtree_eids(eid)?;
    let mut elements = BTreeMap::new();
    for e in eids {
        if let Some(el) = branch.get_element(e) {
            let mut el = el.clone();
            if e == eid {
                el.parent = None;
                el.name = String::new();
            }
            elements.insert(e, el);
        }
    }

    Ok(Subtree {
        tree: ElementTree::from_parts(eid, elements)?,
        predecessor: branch.predecessor().cloned(),
        subbranches: BTreeMap::new(),
    })
}

/// Extract a full subtree rooted at `eid`, recursing into every nested
/// branch mounted pathwise at or below it.
///
/// Recursion terminates because each level descends into a branch whose id
/// nests strictly deeper, and `ctx` holds finitely many branches. A mount
/// whose branch is absent from `ctx` is simply not bundled.
pub fn get_subtree<L: BranchLookup + ?Sized>(
    ctx: &L,
    branch: &BranchState,
    eid: Eid,
) -> Result<Subtree> {
    let mut subtree = flat_subtree(branch, eid)?;

    for sub_eid in branch.immediate_subbranch_eids() {
        if !subtree.tree.contains(sub_eid) {
            continue;
        }
        if let Some(sub) = ctx.lookup_branch(&branch.bid().nest(sub_eid)) {
            let nested = get_subtree(ctx, sub, sub.root_eid())?;
            subtree.subbranches.insert(sub_eid, nested);
        }
    }

    Ok(subtree)
}

/// Replay `subtree` into `to_bid`: all elements at matching EIDs, then every
/// bundled subbranch as a fresh branch nested under the equivalent EID.
///
/// On failure the transaction may hold partial structure; the transaction's
/// own abort is the recovery mechanism.
pub fn instantiate_elements_r<T: BranchTxn + ?Sized>(
    txn: &mut T,
    to_bid: &Bid,
    subtree: &Subtree,
) -> Result<()> {
    for eid in subtree.tree.top_down_eids() {
        if let Some(el) = subtree.tree.get(eid) {
            txn.alter_one(to_bid, eid, el.parent, &el.name, el.payload.clone())?;
        }
    }
    instantiate_subbranches(txn, to_bid, subtree)
}

/// Create a fresh nested branch for each bundled subbranch of `subtree`,
/// with ids derived from `to_bid`, and recurse into each.
pub(crate) fn instantiate_subbranches<T: BranchTxn + ?Sized>(
    txn: &mut T,
    to_bid: &Bid,
    subtree: &Subtree,
) -> Result<()> {
    for (outer_eid, sub) in &subtree.subbranches {
        let new_bid = to_bid.nest(*outer_eid);
        txn.add_new_branch(new_bid.clone(), sub.predecessor.clone(), sub.tree.root_eid())?;
        instantiate_elements_r(txn, &new_bid, sub)?;
    }
    Ok(())
}
