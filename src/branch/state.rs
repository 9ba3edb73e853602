//! One branch's mutable state.

use crate::tree::ElementTree;
use crate::types::{Bid, Eid, ElRevRef, Element, Payload};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One branch: its id, where it was branched from, and its element tree.
///
/// A branch is owned by exactly one transaction (or, once frozen, one
/// revision). The predecessor is a lookup key for history traversal, not an
/// ownership relation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchState {
    bid: Bid,
    predecessor: Option<ElRevRef>,
    tree: ElementTree,
}

impl BranchState {
    /// A fresh branch: empty except for a root directory element.
    pub fn new(bid: Bid, predecessor: Option<ElRevRef>, root_eid: Eid) -> Self {
        Self {
            bid,
            predecessor,
            tree: ElementTree::new(root_eid, Payload::dir()),
        }
    }

    /// A branch whose content is an already-built tree.
    pub(crate) fn from_tree(bid: Bid, predecessor: Option<ElRevRef>, tree: ElementTree) -> Self {
        Self {
            bid,
            predecessor,
            tree,
        }
    }

    pub fn bid(&self) -> &Bid {
        &self.bid
    }

    pub fn predecessor(&self) -> Option<&ElRevRef> {
        self.predecessor.as_ref()
    }

    pub fn root_eid(&self) -> Eid {
        self.tree.root_eid()
    }

    pub fn tree(&self) -> &ElementTree {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut ElementTree {
        &mut self.tree
    }

    /// Read-only element lookup; `None` if the EID is absent.
    pub fn get_element(&self, eid: Eid) -> Option<&Element> {
        self.tree.get(eid)
    }

    /// Full element snapshot for iteration.
    pub fn elements(&self) -> &BTreeMap<Eid, Element> {
        self.tree.elements()
    }

    /// Branch-root-relative path of `eid`.
    pub fn path_by_eid(&self, eid: Eid) -> Option<String> {
        self.tree.path_by_eid(eid)
    }

    /// EID at a branch-root-relative path.
    pub fn eid_by_path(&self, path: &str) -> Option<Eid> {
        self.tree.eid_by_path(path)
    }

    /// EIDs of elements marked as subbranch roots, in EID order.
    pub fn immediate_subbranch_eids(&self) -> Vec<Eid> {
        self.tree
            .elements()
            .iter()
            .filter(|(_, el)| el.payload.is_subbranch_root())
            .map(|(eid, _)| *eid)
            .collect()
    }
}
