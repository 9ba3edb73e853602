//! Integration tests for the branching core.

use arbor::{
    get_subtree, instantiate_elements_r, Bid, BranchError, BranchLookup, BranchTxn, Eid, ElRevRef,
    FlatTxn, NestedTxn, Payload, Repository, Revnum,
};
use std::fs::File;
use std::sync::Arc;
use tempfile::TempDir;

fn b0() -> Bid {
    Bid::root("B0").unwrap()
}

/// Repository with revision 0 holding an empty root branch "B0".
fn initial_repo() -> Arc<Repository> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let repos = Repository::new();
    let mut txn = repos.begin_initial_txn().unwrap();
    txn.add_new_branch(b0(), None, Eid(0)).unwrap();
    txn.complete().unwrap();
    repos
}

/// Build B0 -> B0.5 ("docs", with "readme.txt") -> B0.5.9 ("deep", with
/// "leaf") inside `txn`.
fn build_three_levels(txn: &mut NestedTxn<FlatTxn>) {
    txn.alter_one(&b0(), Eid(5), Some(Eid(0)), "docs", Payload::SubbranchRoot)
        .unwrap();
    let b05 = b0().nest(Eid(5));
    txn.add_new_branch(b05.clone(), None, Eid(5)).unwrap();
    txn.alter_one(&b05, Eid(7), Some(Eid(5)), "readme.txt", Payload::file("hello"))
        .unwrap();
    txn.alter_one(&b05, Eid(9), Some(Eid(5)), "deep", Payload::SubbranchRoot)
        .unwrap();

    let b059 = b05.nest(Eid(9));
    txn.add_new_branch(b059.clone(), None, Eid(9)).unwrap();
    txn.alter_one(&b059, Eid(11), Some(Eid(9)), "leaf", Payload::dir())
        .unwrap();
}

#[test]
fn test_initial_revision_and_branch_lookup() {
    let repos = initial_repo();

    assert!(repos.get_branch_by_id(Revnum(0), &b0()).is_ok());

    let missing = Bid::root("B1").unwrap();
    let err = repos.get_branch_by_id(Revnum(0), &missing).unwrap_err();
    assert!(matches!(err, BranchError::BranchNotFoundInRev { .. }));
    assert_eq!(err.to_string(), "Branch not found: B1 in r0");
}

#[test]
fn test_nest_creation() {
    let repos = initial_repo();
    let mut txn = repos.begin_txn(Revnum(0)).unwrap();

    let eid = txn.new_eid();
    txn.alter_one(&b0(), eid, Some(Eid(0)), "docs", Payload::SubbranchRoot)
        .unwrap();

    let nested_bid = b0().nest(eid);
    txn.branch(&ElRevRef::current(b0(), eid), nested_bid.clone())
        .unwrap();

    let nested = txn.lookup_branch(&nested_bid).unwrap();
    assert_eq!(nested.root_eid(), eid);
    // The new branch's root carries exactly what was extracted from the
    // mount element; there was no prior nested content to copy.
    assert_eq!(nested.elements().len(), 1);
    assert!(nested.get_element(eid).unwrap().payload.is_subbranch_root());
    assert!(txn.lookup_branch(&nested_bid.nest(eid)).is_none());
}

#[test]
fn test_orphan_purge_on_sequence_point() {
    let repos = initial_repo();
    let mut txn = repos.begin_txn(Revnum(0)).unwrap();

    let eid = txn.new_eid();
    txn.alter_one(&b0(), eid, Some(Eid(0)), "docs", Payload::SubbranchRoot)
        .unwrap();
    let nested_bid = b0().nest(eid);
    txn.branch(&ElRevRef::current(b0(), eid), nested_bid.clone())
        .unwrap();
    assert!(txn.lookup_branch(&nested_bid).is_some());

    txn.delete_one(&b0(), eid).unwrap();
    txn.sequence_point().unwrap();

    assert!(!txn.branch_ids().contains(&nested_bid));
    assert!(txn.lookup_branch(&b0()).is_some());
}

#[test]
fn test_extract_and_instantiate_three_levels() {
    let repos = initial_repo();
    let mut txn = repos.begin_txn(Revnum(0)).unwrap();
    build_three_levels(&mut txn);

    let src = txn.lookup_branch(&b0()).unwrap();
    let subtree = get_subtree(&txn, src, Eid(0)).unwrap();

    // Extraction recursed through exactly two levels of nesting.
    let at_5 = subtree.subbranch_at_eid(Eid(5)).unwrap();
    let at_9 = at_5.subbranch_at_eid(Eid(9)).unwrap();
    assert!(at_9.subbranches.is_empty());
    assert!(at_5.tree.contains(Eid(7)));
    assert!(at_9.tree.contains(Eid(11)));

    let c0 = Bid::root("C0").unwrap();
    txn.add_new_branch(c0.clone(), None, subtree.tree.root_eid())
        .unwrap();
    instantiate_elements_r(&mut txn, &c0, &subtree).unwrap();

    let c05 = c0.nest(Eid(5));
    let c059 = c05.nest(Eid(9));
    assert_eq!(
        txn.lookup_branch(&c05).unwrap().elements(),
        txn.lookup_branch(&b0().nest(Eid(5))).unwrap().elements()
    );
    assert_eq!(
        txn.lookup_branch(&c059).unwrap().elements(),
        txn.lookup_branch(&b0().nest(Eid(5)).nest(Eid(9)))
            .unwrap()
            .elements()
    );
}

#[test]
fn test_path_resolution_across_nested_branches() {
    let repos = initial_repo();
    let mut txn = repos.begin_txn(Revnum(0)).unwrap();
    build_three_levels(&mut txn);
    txn.complete().unwrap();

    let found = repos
        .find_el_rev_by_path_rev(Revnum(1), &b0(), "docs/readme.txt")
        .unwrap();
    assert_eq!(found.bid, b0().nest(Eid(5)));
    assert_eq!(found.eid, Some(Eid(7)));

    let found = repos
        .find_el_rev_by_path_rev(Revnum(1), &b0(), "docs/deep/leaf")
        .unwrap();
    assert_eq!(found.bid, b0().nest(Eid(5)).nest(Eid(9)));
    assert_eq!(found.eid, Some(Eid(11)));

    // A path that resolves nowhere still names the deepest owning branch.
    let found = repos
        .find_el_rev_by_path_rev(Revnum(1), &b0(), "docs/ghost")
        .unwrap();
    assert_eq!(found.bid, b0().nest(Eid(5)));
    assert_eq!(found.eid, None);
}

#[test]
fn test_revision_bounds() {
    let repos = initial_repo();
    let mut txn = repos.begin_txn(Revnum(0)).unwrap();
    txn.alter_one(&b0(), Eid(1), Some(Eid(0)), "src", Payload::dir())
        .unwrap();
    txn.complete().unwrap();

    let count = repos.num_revisions();
    assert_eq!(count, 2);
    for rev in 0..count {
        assert!(repos.get_revision(Revnum(rev)).is_ok());
    }
    assert!(matches!(
        repos.get_revision(Revnum(count)),
        Err(BranchError::NoSuchRevision(_))
    ));
}

#[test]
fn test_branch_from_committed_revision() {
    let repos = initial_repo();
    let mut txn = repos.begin_txn(Revnum(0)).unwrap();
    build_three_levels(&mut txn);
    txn.complete().unwrap();

    // Branch the whole of B0@r1 into a new top-level branch.
    let mut txn = repos.begin_txn(Revnum(1)).unwrap();
    let c0 = Bid::root("C0").unwrap();
    txn.branch(&ElRevRef::at(Revnum(1), b0(), Eid(0)), c0.clone())
        .unwrap();
    let rev = txn.complete().unwrap();

    let c05 = c0.nest(Eid(5));
    let copied = rev.get_branch(&c05).unwrap();
    assert_eq!(copied.eid_by_path("readme.txt"), Some(Eid(7)));
    assert!(rev.get_branch(&c05.nest(Eid(9))).is_some());

    // The copy records where it came from.
    let top = rev.get_branch(&c0).unwrap();
    assert_eq!(
        top.predecessor(),
        Some(&ElRevRef::at(Revnum(1), b0(), Eid(0)))
    );
}

#[test]
fn test_branching_preserves_eids_across_revisions() {
    let repos = initial_repo();
    let mut txn = repos.begin_txn(Revnum(0)).unwrap();
    txn.alter_one(&b0(), Eid(1), Some(Eid(0)), "docs", Payload::dir())
        .unwrap();
    txn.alter_one(&b0(), Eid(2), Some(Eid(1)), "readme.txt", Payload::file("v1"))
        .unwrap();
    txn.complete().unwrap();

    // Rename and move in a later revision; the EID stays put.
    let mut txn = repos.begin_txn(Revnum(1)).unwrap();
    txn.alter_one(&b0(), Eid(2), Some(Eid(0)), "README", Payload::file("v1"))
        .unwrap();
    txn.complete().unwrap();

    let before = repos.find_el_rev_by_path_rev(Revnum(1), &b0(), "docs/readme.txt").unwrap();
    let after = repos.find_el_rev_by_path_rev(Revnum(2), &b0(), "README").unwrap();
    assert_eq!(before.eid, Some(Eid(2)));
    assert_eq!(after.eid, Some(Eid(2)));
}

#[test]
fn test_abort_leaves_no_revision() {
    let repos = initial_repo();
    let mut txn = repos.begin_txn(Revnum(0)).unwrap();
    txn.alter_one(&b0(), Eid(1), Some(Eid(0)), "scratch", Payload::dir())
        .unwrap();
    txn.abort();

    assert_eq!(repos.num_revisions(), 1);
    let found = repos.find_el_rev_by_path_rev(Revnum(0), &b0(), "scratch").unwrap();
    assert_eq!(found.eid, None);
}

#[test]
fn test_serialize_roundtrip_through_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("txn.bin");

    let repos = initial_repo();
    let mut txn = repos.begin_txn(Revnum(0)).unwrap();
    build_three_levels(&mut txn);

    {
        let mut file = File::create(&path).unwrap();
        txn.serialize(&mut file).unwrap();
    }

    let mut file = File::open(&path).unwrap();
    let restored = FlatTxn::deserialize(Arc::clone(&repos), &mut file).unwrap();

    assert_eq!(restored.branch_ids(), txn.branch_ids());
    for bid in txn.branch_ids() {
        assert_eq!(
            restored.lookup_branch(&bid).unwrap().elements(),
            txn.lookup_branch(&bid).unwrap().elements()
        );
    }
}
