//! Performance benchmarks for the branching core.

use arbor::{
    get_subtree, Bid, BranchLookup, BranchTxn, Eid, ElRevRef, FlatTxn, NestedTxn, Payload,
    Repository,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// A transaction holding a chain of nested branches, `depth` levels deep.
fn chain_txn(depth: usize) -> (Bid, NestedTxn<FlatTxn>) {
    let repos = Repository::new();
    let mut txn = repos.begin_initial_txn().unwrap();
    let b0 = Bid::root("B0").unwrap();
    txn.add_new_branch(b0.clone(), None, Eid(0)).unwrap();

    let mut bid = b0.clone();
    let mut root = Eid(0);
    for _ in 0..depth {
        let eid = txn.new_eid();
        txn.alter_one(&bid, eid, Some(root), "nested", Payload::SubbranchRoot)
            .unwrap();
        let child = bid.nest(eid);
        txn.branch(&ElRevRef::current(bid.clone(), eid), child.clone())
            .unwrap();
        bid = child;
        root = eid;
    }
    (b0, txn)
}

/// A transaction with `count` sibling subbranches mounted on the root branch.
fn wide_txn(count: usize) -> NestedTxn<FlatTxn> {
    let repos = Repository::new();
    let mut txn = repos.begin_initial_txn().unwrap();
    let b0 = Bid::root("B0").unwrap();
    txn.add_new_branch(b0.clone(), None, Eid(0)).unwrap();

    for i in 0..count {
        let eid = txn.new_eid();
        txn.alter_one(&b0, eid, Some(Eid(0)), &format!("sub{}", i), Payload::SubbranchRoot)
            .unwrap();
        txn.branch(&ElRevRef::current(b0.clone(), eid), b0.nest(eid))
            .unwrap();
    }
    txn
}

/// Benchmark subtree extraction across deepening nesting chains.
fn bench_subtree_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("subtree_extraction");

    for depth in [2, 4, 8, 16] {
        group.bench_with_input(BenchmarkId::new("nesting_depth", depth), &depth, |b, &depth| {
            let (b0, txn) = chain_txn(depth);

            b.iter(|| {
                let src = txn.lookup_branch(&b0).unwrap();
                black_box(get_subtree(&txn, src, Eid(0)).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark recursive branching of a deep chain.
fn bench_recursive_branch(c: &mut Criterion) {
    let mut group = c.benchmark_group("recursive_branch");

    for depth in [2, 4, 8] {
        group.bench_with_input(BenchmarkId::new("nesting_depth", depth), &depth, |b, &depth| {
            let (b0, mut txn) = chain_txn(depth);

            let mut next = 0u64;
            b.iter(|| {
                let target = Bid::root(format!("C{}", next)).unwrap();
                next += 1;
                txn.branch(&ElRevRef::current(b0.clone(), Eid(0)), target)
                    .unwrap();
            });
        });
    }

    group.finish();
}

/// Benchmark the sequence-point walk as the branch count grows.
fn bench_sequence_point(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequence_point");

    for count in [10, 100, 500] {
        group.bench_with_input(BenchmarkId::new("branches", count), &count, |b, &count| {
            let mut txn = wide_txn(count);

            b.iter(|| {
                txn.sequence_point().unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_subtree_extraction,
    bench_recursive_branch,
    bench_sequence_point
);
criterion_main!(benches);
