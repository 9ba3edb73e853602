//! The flat (non-nesting-aware) branch transaction.

use crate::branch::{flat_subtree, BranchLookup, BranchState};
use crate::error::{BranchError, Result};
use crate::repos::{Repository, Revision};
use crate::txn::BranchTxn;
use crate::types::{Bid, Eid, ElRevRef, Element, Payload, Revnum};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::{debug, trace};

/// Magic bytes for a serialized transaction.
const TXN_MAGIC: &[u8; 4] = b"ABTX";

/// Current serialized-transaction format version.
const TXN_VERSION: u8 = 1;

/// Serialized form of a transaction's branch forest.
#[derive(Serialize, Deserialize)]
struct TxnEnvelope {
    revnum: Revnum,
    base: Option<Revnum>,
    next_eid: i32,
    branches: Vec<BranchState>,
}

/// A transaction over a flat set of branches.
///
/// Branches here are independent records; the textual nesting their ids may
/// encode is interpreted by the [`NestedTxn`](crate::txn::NestedTxn)
/// decorator, not by this layer.
pub struct FlatTxn {
    repos: Arc<Repository>,
    revnum: Revnum,
    base: Option<Revnum>,
    branches: BTreeMap<Bid, BranchState>,
    next_eid: i32,
    num_new_eids: usize,
}

impl FlatTxn {
    /// Begin a transaction on top of `base`, carrying the base revision's
    /// branch forest forward.
    pub fn begin(repos: Arc<Repository>, base: Revnum) -> Result<Self> {
        let base_rev = repos.get_revision(base)?;
        let branches = base_rev.branches().clone();
        let next_eid = branches
            .values()
            .flat_map(|b| b.elements().keys())
            .map(|eid| eid.0)
            .max()
            .map_or(0, |max| max + 1);

        Ok(Self {
            revnum: Revnum(repos.num_revisions()),
            repos,
            base: Some(base),
            branches,
            next_eid,
            num_new_eids: 0,
        })
    }

    /// Begin the first transaction of an empty repository.
    pub fn begin_empty(repos: Arc<Repository>) -> Self {
        Self {
            revnum: Revnum(repos.num_revisions()),
            repos,
            base: None,
            branches: BTreeMap::new(),
            next_eid: 0,
            num_new_eids: 0,
        }
    }

    /// Reconstruct a transaction from bytes written by `serialize`.
    pub fn deserialize(repos: Arc<Repository>, r: &mut dyn Read) -> Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != TXN_MAGIC {
            return Err(BranchError::InvalidFormat("bad transaction magic".into()));
        }

        let mut version = [0u8; 1];
        r.read_exact(&mut version)?;
        if version[0] != TXN_VERSION {
            return Err(BranchError::InvalidFormat(format!(
                "unsupported transaction format version: {}",
                version[0]
            )));
        }

        let mut len_bytes = [0u8; 8];
        r.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes) as usize;

        let mut encoded = vec![0u8; len];
        r.read_exact(&mut encoded)?;
        let envelope: TxnEnvelope = rmp_serde::from_slice(&encoded)?;

        let mut branches = BTreeMap::new();
        for branch in envelope.branches {
            branch.tree().validate()?;
            let bid = branch.bid().clone();
            if branches.insert(bid.clone(), branch).is_some() {
                return Err(BranchError::InvalidFormat(format!(
                    "duplicate branch id {} in stream",
                    bid
                )));
            }
        }

        Ok(Self {
            repos,
            revnum: envelope.revnum,
            base: envelope.base,
            branches,
            next_eid: envelope.next_eid,
            num_new_eids: 0,
        })
    }

    fn branch_mut(&mut self, bid: &Bid) -> Result<&mut BranchState> {
        self.branches
            .get_mut(bid)
            .ok_or_else(|| BranchError::BranchNotFound(bid.clone()))
    }

    /// Keep the allocation counter above any EID introduced explicitly.
    fn note_eid(&mut self, eid: Eid) {
        if eid.0 >= self.next_eid {
            self.next_eid = eid.0 + 1;
        }
    }
}

impl BranchLookup for FlatTxn {
    fn lookup_branch(&self, bid: &Bid) -> Option<&BranchState> {
        self.branches.get(bid)
    }
}

impl BranchTxn for FlatTxn {
    fn revnum(&self) -> Revnum {
        self.revnum
    }

    fn base_revnum(&self) -> Option<Revnum> {
        self.base
    }

    fn repository(&self) -> &Arc<Repository> {
        &self.repos
    }

    fn branch_ids(&self) -> Vec<Bid> {
        self.branches.keys().cloned().collect()
    }

    fn add_branch(&mut self, branch: BranchState) -> Result<()> {
        let bid = branch.bid().clone();
        if self.branches.contains_key(&bid) {
            return Err(BranchError::BranchExists(bid));
        }
        for eid in branch.elements().keys() {
            self.note_eid(*eid);
        }
        debug!(branch = %bid, "added branch");
        self.branches.insert(bid, branch);
        Ok(())
    }

    fn add_new_branch(
        &mut self,
        bid: Bid,
        predecessor: Option<ElRevRef>,
        root_eid: Eid,
    ) -> Result<()> {
        if self.branches.contains_key(&bid) {
            return Err(BranchError::BranchExists(bid));
        }
        self.note_eid(root_eid);
        debug!(branch = %bid, root = %root_eid, "created branch");
        self.branches
            .insert(bid.clone(), BranchState::new(bid, predecessor, root_eid));
        Ok(())
    }

    fn open_branch(
        &mut self,
        bid: Bid,
        predecessor: Option<ElRevRef>,
        root_eid: Eid,
    ) -> Result<()> {
        if self.branches.contains_key(&bid) {
            return Ok(());
        }
        self.add_new_branch(bid, predecessor, root_eid)
    }

    fn delete_branch(&mut self, bid: &Bid) -> Result<()> {
        self.branches
            .remove(bid)
            .ok_or_else(|| BranchError::BranchNotFound(bid.clone()))?;
        debug!(branch = %bid, "deleted branch");
        Ok(())
    }

    fn num_new_eids(&self) -> usize {
        self.num_new_eids
    }

    fn new_eid(&mut self) -> Eid {
        let eid = Eid(self.next_eid);
        self.next_eid += 1;
        self.num_new_eids += 1;
        eid
    }

    fn finalize_eids(&self) -> Result<()> {
        for branch in self.branches.values() {
            branch.tree().validate()?;
        }
        Ok(())
    }

    fn alter_one(
        &mut self,
        bid: &Bid,
        eid: Eid,
        parent: Option<Eid>,
        name: &str,
        payload: Payload,
    ) -> Result<()> {
        self.note_eid(eid);
        let branch = self.branch_mut(bid)?;
        let element = match parent {
            Some(parent) => Element::new(parent, name, payload),
            None => Element::root(payload),
        };
        trace!(branch = %bid, eid = %eid, name, "alter element");
        branch.tree_mut().set_element(eid, element)
    }

    fn copy_one(
        &mut self,
        from: &ElRevRef,
        to_bid: &Bid,
        parent: Eid,
        name: &str,
        payload: Option<Payload>,
    ) -> Result<Eid> {
        let src = self.resolve_branch(from.rev, &from.bid)?;
        let src_el = src
            .get_element(from.eid)
            .ok_or(BranchError::ElementNotFound(from.eid))?;
        let payload = payload.unwrap_or_else(|| src_el.payload.clone());

        let eid = self.new_eid();
        self.alter_one(to_bid, eid, Some(parent), name, payload)?;
        Ok(eid)
    }

    fn copy_tree(
        &mut self,
        from: &ElRevRef,
        to_bid: &Bid,
        parent: Eid,
        name: &str,
    ) -> Result<Eid> {
        let src = self.resolve_branch(from.rev, &from.bid)?;
        let sub = flat_subtree(&src, from.eid)?;

        let order = sub.tree.top_down_eids();
        let mut eid_map = BTreeMap::new();
        for old in &order {
            eid_map.insert(*old, self.new_eid());
        }
        let mapped = |map: &BTreeMap<Eid, Eid>, eid: Eid| -> Result<Eid> {
            map.get(&eid).copied().ok_or_else(|| {
                BranchError::Corruption(format!("copy source lost element {}", eid))
            })
        };

        for old in order {
            let Some(el) = sub.tree.get(old) else {
                continue;
            };
            let new_eid = mapped(&eid_map, old)?;
            if old == sub.tree.root_eid() {
                self.alter_one(to_bid, new_eid, Some(parent), name, el.payload.clone())?;
            } else {
                let old_parent = el
                    .parent
                    .ok_or_else(|| BranchError::Corruption(format!("{} has no parent", old)))?;
                let new_parent = mapped(&eid_map, old_parent)?;
                self.alter_one(to_bid, new_eid, Some(new_parent), &el.name, el.payload.clone())?;
            }
        }

        mapped(&eid_map, sub.tree.root_eid())
    }

    fn delete_one(&mut self, bid: &Bid, eid: Eid) -> Result<()> {
        let branch = self.branch_mut(bid)?;
        branch.tree_mut().remove(eid)?;
        trace!(branch = %bid, eid = %eid, "deleted element");
        Ok(())
    }

    fn branch(&mut self, from: &ElRevRef, new_bid: Bid) -> Result<()> {
        if self.branches.contains_key(&new_bid) {
            return Err(BranchError::BranchExists(new_bid));
        }
        let src = self.resolve_branch(from.rev, &from.bid)?;
        let sub = flat_subtree(&src, from.eid)?;
        for eid in sub.tree.elements().keys() {
            self.note_eid(*eid);
        }
        debug!(branch = %new_bid, from = %from.bid, eid = %from.eid, "branched subtree");
        self.branches.insert(
            new_bid.clone(),
            BranchState::from_tree(new_bid, Some(from.clone()), sub.tree),
        );
        Ok(())
    }

    fn sequence_point(&mut self) -> Result<()> {
        for (bid, branch) in &mut self.branches {
            let purged = branch.tree_mut().purge_unreachable();
            if !purged.is_empty() {
                debug!(branch = %bid, count = purged.len(), "purged unreachable elements");
            }
        }
        Ok(())
    }

    fn serialize(&self, w: &mut dyn Write) -> Result<()> {
        w.write_all(TXN_MAGIC)?;
        w.write_all(&[TXN_VERSION])?;

        let envelope = TxnEnvelope {
            revnum: self.revnum,
            base: self.base,
            next_eid: self.next_eid,
            branches: self.branches.values().cloned().collect(),
        };
        let encoded = rmp_serde::to_vec(&envelope)?;

        w.write_all(&(encoded.len() as u64).to_le_bytes())?;
        w.write_all(&encoded)?;
        Ok(())
    }

    fn resolve_branch(&self, rev: Option<Revnum>, bid: &Bid) -> Result<BranchState> {
        match rev {
            Some(rev) => self.repos.get_branch_by_id(rev, bid),
            None => self
                .branches
                .get(bid)
                .cloned()
                .ok_or_else(|| BranchError::BranchNotFound(bid.clone())),
        }
    }

    fn complete(self) -> Result<Arc<Revision>> {
        self.finalize_eids()?;
        debug!(rev = %self.revnum, branches = self.branches.len(), "completing transaction");
        self.repos
            .add_revision(Revision::new(self.revnum, self.base, self.branches))
    }

    fn abort(self) {
        debug!(rev = %self.revnum, "aborted transaction");
    }
}
