//! The nesting-aware transaction decorator.

use crate::branch::{
    get_subtree, instantiate_subbranches, outer_branch_and_eid, BranchLookup, BranchState,
};
use crate::error::{BranchError, Result};
use crate::repos::{Repository, Revision};
use crate::txn::{BranchTxn, FlatTxn};
use crate::types::{Bid, Eid, ElRevRef, Payload, Revnum};
use std::io::Write;
use std::sync::Arc;
use tracing::debug;

/// Wraps a flat transaction and keeps branches nested inside other branches
/// consistent with their containing branch's topology.
///
/// Everything the flat layer can answer alone is forwarded unchanged. Two
/// operations gain behavior: [`branch`](BranchTxn::branch) reproduces the
/// source subtree's nested branches under the new location, and
/// [`sequence_point`](BranchTxn::sequence_point) purges branches whose
/// containing element has been deleted.
pub struct NestedTxn<T: BranchTxn = FlatTxn> {
    inner: T,
}

impl NestedTxn<FlatTxn> {
    /// Begin a nested transaction on top of `base`.
    pub fn begin(repos: Arc<Repository>, base: Revnum) -> Result<Self> {
        Ok(Self {
            inner: FlatTxn::begin(repos, base)?,
        })
    }

    /// Begin the first transaction of an empty repository.
    pub fn begin_empty(repos: Arc<Repository>) -> Self {
        Self {
            inner: FlatTxn::begin_empty(repos),
        }
    }
}

impl<T: BranchTxn> NestedTxn<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

impl<T: BranchTxn> BranchLookup for NestedTxn<T> {
    fn lookup_branch(&self, bid: &Bid) -> Option<&BranchState> {
        self.inner.lookup_branch(bid)
    }
}

impl<T: BranchTxn> BranchTxn for NestedTxn<T> {
    fn revnum(&self) -> Revnum {
        self.inner.revnum()
    }

    fn base_revnum(&self) -> Option<Revnum> {
        self.inner.base_revnum()
    }

    fn repository(&self) -> &Arc<Repository> {
        self.inner.repository()
    }

    fn branch_ids(&self) -> Vec<Bid> {
        self.inner.branch_ids()
    }

    fn add_branch(&mut self, branch: BranchState) -> Result<()> {
        self.inner.add_branch(branch)
    }

    fn add_new_branch(
        &mut self,
        bid: Bid,
        predecessor: Option<ElRevRef>,
        root_eid: Eid,
    ) -> Result<()> {
        self.inner.add_new_branch(bid, predecessor, root_eid)
    }

    fn open_branch(
        &mut self,
        bid: Bid,
        predecessor: Option<ElRevRef>,
        root_eid: Eid,
    ) -> Result<()> {
        self.inner.open_branch(bid, predecessor, root_eid)
    }

    fn delete_branch(&mut self, bid: &Bid) -> Result<()> {
        self.inner.delete_branch(bid)
    }

    fn num_new_eids(&self) -> usize {
        self.inner.num_new_eids()
    }

    fn new_eid(&mut self) -> Eid {
        self.inner.new_eid()
    }

    fn finalize_eids(&self) -> Result<()> {
        self.inner.finalize_eids()
    }

    fn alter_one(
        &mut self,
        bid: &Bid,
        eid: Eid,
        parent: Option<Eid>,
        name: &str,
        payload: Payload,
    ) -> Result<()> {
        self.inner.alter_one(bid, eid, parent, name, payload)
    }

    fn copy_one(
        &mut self,
        from: &ElRevRef,
        to_bid: &Bid,
        parent: Eid,
        name: &str,
        payload: Option<Payload>,
    ) -> Result<Eid> {
        self.inner.copy_one(from, to_bid, parent, name, payload)
    }

    fn copy_tree(
        &mut self,
        from: &ElRevRef,
        to_bid: &Bid,
        parent: Eid,
        name: &str,
    ) -> Result<Eid> {
        self.inner.copy_tree(from, to_bid, parent, name)
    }

    fn delete_one(&mut self, bid: &Bid, eid: Eid) -> Result<()> {
        self.inner.delete_one(bid, eid)
    }

    /// Branch a subtree, then reproduce every branch nested within it under
    /// the new location.
    ///
    /// The source subtree is extracted before the flat branch is created, so
    /// branching at an element of the same transaction never observes the
    /// branch being created (nest creation reproduces no content).
    fn branch(&mut self, from: &ElRevRef, new_bid: Bid) -> Result<()> {
        let subtree = match from.rev {
            Some(rev) => {
                let revision = self.inner.repository().get_revision(rev)?;
                let src = revision.get_branch(&from.bid).ok_or_else(|| {
                    BranchError::BranchNotFoundInRev {
                        bid: from.bid.clone(),
                        rev,
                    }
                })?;
                get_subtree(&*revision, src, from.eid)?
            }
            None => {
                let src = self
                    .inner
                    .lookup_branch(&from.bid)
                    .cloned()
                    .ok_or_else(|| BranchError::BranchNotFound(from.bid.clone()))?;
                get_subtree(&self.inner, &src, from.eid)?
            }
        };

        self.inner.branch(from, new_bid.clone())?;
        instantiate_subbranches(&mut self.inner, &new_bid, &subtree)
    }

    /// Checkpoint: let the flat layer purge unreachable elements, then
    /// delete every branch whose containing element no longer exists.
    ///
    /// Deleting an orphaned branch orphans the branches nested inside it,
    /// so the purge repeats until a pass deletes nothing; one call leaves no
    /// orphan behind, which also makes back-to-back calls idempotent.
    fn sequence_point(&mut self) -> Result<()> {
        self.inner.sequence_point()?;

        loop {
            let mut doomed = Vec::new();
            for bid in self.inner.branch_ids() {
                let Some(branch) = self.inner.lookup_branch(&bid) else {
                    continue;
                };
                match outer_branch_and_eid(&self.inner, branch) {
                    None => {}
                    Some((Some(outer), outer_eid)) => {
                        if outer.get_element(outer_eid).is_none() {
                            doomed.push(bid);
                        }
                    }
                    Some((None, _)) => doomed.push(bid),
                }
            }

            if doomed.is_empty() {
                return Ok(());
            }
            for bid in doomed {
                debug!(branch = %bid, "purging orphaned branch");
                self.inner.delete_branch(&bid)?;
            }
        }
    }

    fn serialize(&self, w: &mut dyn Write) -> Result<()> {
        self.inner.serialize(w)
    }

    fn resolve_branch(&self, rev: Option<Revnum>, bid: &Bid) -> Result<BranchState> {
        self.inner.resolve_branch(rev, bid)
    }

    fn complete(self) -> Result<Arc<Revision>> {
        self.inner.complete()
    }

    fn abort(self) {
        self.inner.abort()
    }
}
