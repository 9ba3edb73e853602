//! The append-only, revision-indexed history of branch transactions.

use crate::branch::{find_nested_branch_element_by_relpath, BranchLookup, BranchState};
use crate::error::{BranchError, Result};
use crate::txn::{BranchTxn, FlatTxn, NestedTxn};
use crate::types::{Bid, Eid, ElRevId, Revnum};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// One committed revision: a frozen snapshot of every branch that existed
/// at that point. Carries no mutators.
#[derive(Debug)]
pub struct Revision {
    revnum: Revnum,
    base: Option<Revnum>,
    branches: BTreeMap<Bid, BranchState>,
}

impl Revision {
    pub(crate) fn new(
        revnum: Revnum,
        base: Option<Revnum>,
        branches: BTreeMap<Bid, BranchState>,
    ) -> Self {
        Self {
            revnum,
            base,
            branches,
        }
    }

    pub fn revnum(&self) -> Revnum {
        self.revnum
    }

    /// The revision this one was built from, if any.
    pub fn base_revnum(&self) -> Option<Revnum> {
        self.base
    }

    pub fn branch_ids(&self) -> Vec<Bid> {
        self.branches.keys().cloned().collect()
    }

    pub fn get_branch(&self, bid: &Bid) -> Option<&BranchState> {
        self.branches.get(bid)
    }

    pub fn branches(&self) -> &BTreeMap<Bid, BranchState> {
        &self.branches
    }

    pub fn num_branches(&self) -> usize {
        self.branches.len()
    }
}

impl BranchLookup for Revision {
    fn lookup_branch(&self, bid: &Bid) -> Option<&BranchState> {
        self.branches.get(bid)
    }
}

/// The ordered history of revisions.
///
/// Append-only: a revision becomes visible through `get_revision` only once
/// it is complete and immutable, so readers never observe a transaction in
/// progress. The lock guards nothing finer than the array append.
pub struct Repository {
    revisions: RwLock<Vec<Arc<Revision>>>,
}

impl Repository {
    /// An empty repository with zero revisions.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            revisions: RwLock::new(Vec::new()),
        })
    }

    pub fn num_revisions(&self) -> u64 {
        self.revisions.read().len() as u64
    }

    /// Append a completed revision. Revision numbers must be contiguous.
    pub fn add_revision(&self, revision: Revision) -> Result<Arc<Revision>> {
        let mut revisions = self.revisions.write();
        let expected = Revnum(revisions.len() as u64);
        if revision.revnum() != expected {
            return Err(BranchError::RevisionOutOfOrder {
                expected,
                got: revision.revnum(),
            });
        }
        debug!(rev = %revision.revnum(), branches = revision.num_branches(), "added revision");
        let revision = Arc::new(revision);
        revisions.push(Arc::clone(&revision));
        Ok(revision)
    }

    pub fn get_revision(&self, rev: Revnum) -> Result<Arc<Revision>> {
        self.revisions
            .read()
            .get(rev.0 as usize)
            .cloned()
            .ok_or(BranchError::NoSuchRevision(rev))
    }

    /// The revision a transaction was built from.
    pub fn get_base_revision_root(&self, txn: &impl BranchTxn) -> Result<Arc<Revision>> {
        let base = txn.base_revnum().ok_or_else(|| {
            BranchError::InvalidOperation("transaction has no base revision".into())
        })?;
        self.get_revision(base)
    }

    /// A branch's state in a committed revision, as an owned snapshot.
    pub fn get_branch_by_id(&self, rev: Revnum, bid: &Bid) -> Result<BranchState> {
        let revision = self.get_revision(rev)?;
        revision
            .get_branch(bid)
            .cloned()
            .ok_or_else(|| BranchError::BranchNotFoundInRev {
                bid: bid.clone(),
                rev,
            })
    }

    /// Resolve `(branch, eid)` in a revision. The branch must exist; a
    /// missing element is reported as `eid: None` rather than an error (the
    /// branch is valid even if that element was since deleted).
    pub fn find_el_rev_by_id(&self, rev: Revnum, bid: &Bid, eid: Eid) -> Result<ElRevId> {
        let branch = self.get_branch_by_id(rev, bid)?;
        Ok(ElRevId {
            rev,
            bid: bid.clone(),
            eid: branch.get_element(eid).map(|_| eid),
        })
    }

    /// Resolve a path in a revision, descending into whichever nested
    /// branch actually owns it. The named branch must resolve.
    pub fn find_el_rev_by_path_rev(
        &self,
        rev: Revnum,
        bid: &Bid,
        relpath: &str,
    ) -> Result<ElRevId> {
        let revision = self.get_revision(rev)?;
        let root_branch =
            revision
                .get_branch(bid)
                .ok_or_else(|| BranchError::BranchNotFoundInRev {
                    bid: bid.clone(),
                    rev,
                })?;

        let (branch, eid) = find_nested_branch_element_by_relpath(&*revision, root_branch, relpath);
        Ok(ElRevId {
            rev,
            bid: branch.bid().clone(),
            eid,
        })
    }

    /// Begin a transaction for the next revision, based on `base`.
    pub fn begin_txn(self: &Arc<Self>, base: Revnum) -> Result<NestedTxn<FlatTxn>> {
        NestedTxn::begin(Arc::clone(self), base)
    }

    /// Begin the transaction that will become revision 0.
    pub fn begin_initial_txn(self: &Arc<Self>) -> Result<NestedTxn<FlatTxn>> {
        if self.num_revisions() > 0 {
            return Err(BranchError::InvalidOperation(
                "repository already has revisions".into(),
            ));
        }
        Ok(NestedTxn::begin_empty(Arc::clone(self)))
    }
}
