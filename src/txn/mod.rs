//! Branch transactions.
//!
//! A transaction is the mutable set of branches being prepared as the next
//! revision. [`FlatTxn`] implements the branch set itself; [`NestedTxn`]
//! decorates any inner transaction with awareness of branches nested inside
//! other branches (recursive branching, orphan purge at sequence points).
//! Completing or aborting consumes the transaction, so a frozen revision can
//! never be mutated through a stale handle.

mod flat;
mod nested;

pub use flat::FlatTxn;
pub use nested::NestedTxn;

use crate::branch::{BranchLookup, BranchState};
use crate::error::Result;
use crate::repos::{Repository, Revision};
use crate::types::{Bid, Eid, ElRevRef, Payload, Revnum};
use std::io::Write;
use std::sync::Arc;

/// The operations of one revision-in-progress.
///
/// Lookups that merely miss return `None` through [`BranchLookup`]; mutators
/// that violate structural invariants fail with a branch-domain error. All
/// operations apply in call order.
pub trait BranchTxn: BranchLookup {
    /// The revision number this transaction will commit as.
    fn revnum(&self) -> Revnum;

    /// The revision this transaction was built from, if any.
    fn base_revnum(&self) -> Option<Revnum>;

    fn repository(&self) -> &Arc<Repository>;

    /// Ids of all branches active in this transaction.
    fn branch_ids(&self) -> Vec<Bid>;

    /// Add a fully-built branch state. Fails on id collision.
    fn add_branch(&mut self, branch: BranchState) -> Result<()>;

    /// Create a fresh branch (root element only). Fails on id collision.
    ///
    /// Creating the record does not by itself establish nesting; nesting
    /// exists once some element elsewhere is a subbranch root and this id
    /// nests under it.
    fn add_new_branch(
        &mut self,
        bid: Bid,
        predecessor: Option<ElRevRef>,
        root_eid: Eid,
    ) -> Result<()>;

    /// Continue an existing lineage: reuse the branch if present, otherwise
    /// create it fresh. No content is copied.
    fn open_branch(
        &mut self,
        bid: Bid,
        predecessor: Option<ElRevRef>,
        root_eid: Eid,
    ) -> Result<()>;

    fn delete_branch(&mut self, bid: &Bid) -> Result<()>;

    /// How many EIDs this transaction has allocated.
    fn num_new_eids(&self) -> usize;

    /// Allocate a new EID, unique across the transaction and every prior
    /// revision it was built from.
    fn new_eid(&mut self) -> Eid;

    /// Pre-commit integrity sweep over every branch tree.
    fn finalize_eids(&self) -> Result<()>;

    /// Create or update one element of `bid`.
    fn alter_one(
        &mut self,
        bid: &Bid,
        eid: Eid,
        parent: Option<Eid>,
        name: &str,
        payload: Payload,
    ) -> Result<()>;

    /// Copy a single element to a new EID under `parent`/`name`. A payload
    /// of `None` keeps the source payload.
    fn copy_one(
        &mut self,
        from: &ElRevRef,
        to_bid: &Bid,
        parent: Eid,
        name: &str,
        payload: Option<Payload>,
    ) -> Result<Eid>;

    /// Copy a whole subtree under `parent`/`name`, assigning fresh EIDs
    /// throughout (a copy is a new identity; a branch keeps its EIDs).
    /// Returns the copy's root EID.
    fn copy_tree(&mut self, from: &ElRevRef, to_bid: &Bid, parent: Eid, name: &str)
        -> Result<Eid>;

    /// Delete one element. Its descendants linger unreachable until the
    /// next sequence point.
    fn delete_one(&mut self, bid: &Bid, eid: Eid) -> Result<()>;

    /// Branch the subtree at `from` into a new branch `new_bid`, preserving
    /// EIDs. The nested layer additionally reproduces branches nested in
    /// the source subtree.
    fn branch(&mut self, from: &ElRevRef, new_bid: Bid) -> Result<()>;

    /// Consistency checkpoint: purge unreachable elements, and (in the
    /// nested layer) branches whose containing element is gone.
    fn sequence_point(&mut self) -> Result<()>;

    /// Write this transaction's branches to an opaque byte stream.
    fn serialize(&self, w: &mut dyn Write) -> Result<()>;

    /// Resolve a branch from a committed revision (`rev: Some`) or from
    /// this transaction (`rev: None`), as an owned snapshot.
    fn resolve_branch(&self, rev: Option<Revnum>, bid: &Bid) -> Result<BranchState>;

    /// Freeze this transaction as the next revision of its repository.
    fn complete(self) -> Result<Arc<Revision>>
    where
        Self: Sized;

    /// Discard this transaction. No revision is created.
    fn abort(self)
    where
        Self: Sized;
}
