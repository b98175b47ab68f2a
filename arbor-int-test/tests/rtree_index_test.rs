//! End-to-end scenarios for incremental insertion, splitting, deletion and
//! search against the full store stack.

use std::sync::Arc;

use arbor::NodeId;
use arbor_spatial::{
    Envelope, NullListener, SearchIntersects, GREENES_SPLIT, KEY_SPLIT, RTREE_CHILD,
    RTREE_REFERENCE,
};
use arbor_int_test::test_util::{
    check_tree_invariants, collect_sorted, create_test_context, unit_square, RecordingMonitor,
};

#[test]
fn lattice_inserts_split_once_and_query_window() {
    let ctx = create_test_context(4);

    // unit squares along the x axis; the fifth insert overflows the root
    let squares: Vec<NodeId> = (0..5)
        .map(|i| unit_square(&ctx.store, i as f64, 0.0))
        .collect();
    for square in &squares {
        ctx.index.add(*square).unwrap();
    }

    let root = ctx
        .store
        .single_outgoing(ctx.layer, arbor_spatial::RTREE_ROOT)
        .unwrap()
        .unwrap()
        .end;
    assert_eq!(ctx.store.outgoing(root, RTREE_CHILD).unwrap().len(), 2);
    for child in ctx.store.outgoing(root, RTREE_CHILD).unwrap() {
        assert!(ctx.store.outgoing(child.end, RTREE_REFERENCE).unwrap().len() <= 4);
    }
    assert_eq!(ctx.index.count().unwrap(), 5);

    // a window over the squares at x=2 and x=3 returns exactly those two
    let decoder = ctx.index.envelope_decoder();
    let query = Envelope::new(2.5, -0.5, 3.5, 0.5);
    let found = collect_sorted(
        ctx.index
            .search_index(SearchIntersects::new(decoder, query))
            .unwrap(),
    );
    let mut expected = vec![squares[2], squares[3]];
    expected.sort();
    assert_eq!(found, expected);

    check_tree_invariants(&ctx);
}

#[test]
fn greene_split_of_collinear_squares() {
    let ctx = create_test_context(4);
    ctx.index.configure([(KEY_SPLIT, GREENES_SPLIT)]).unwrap();

    let monitor = Arc::new(RecordingMonitor::default());
    ctx.index.add_monitor(monitor.clone());

    let squares: Vec<NodeId> = (0..9)
        .map(|i| unit_square(&ctx.store, i as f64, 0.0))
        .collect();

    for square in &squares[0..4] {
        ctx.index.add(*square).unwrap();
    }
    assert_eq!(monitor.splits(), 0);

    // the fifth insert triggers the first split
    ctx.index.add(squares[4]).unwrap();
    assert_eq!(monitor.splits(), 1);

    // Greene's split sorts by center x and cuts after floor(5/2) entries
    let root = ctx
        .store
        .single_outgoing(ctx.layer, arbor_spatial::RTREE_ROOT)
        .unwrap()
        .unwrap()
        .end;
    let mut groups: Vec<Vec<NodeId>> = ctx
        .store
        .outgoing(root, RTREE_CHILD)
        .unwrap()
        .into_iter()
        .map(|edge| {
            let mut members: Vec<NodeId> = ctx
                .store
                .outgoing(edge.end, RTREE_REFERENCE)
                .unwrap()
                .into_iter()
                .map(|reference| reference.end)
                .collect();
            members.sort();
            members
        })
        .collect();
    groups.sort();
    let mut left = squares[0..2].to_vec();
    left.sort();
    let mut right = squares[2..5].to_vec();
    right.sort();
    let mut expected = vec![left, right];
    expected.sort();
    assert_eq!(groups, expected);

    // the remaining inserts keep the tree consistent
    for square in &squares[5..] {
        ctx.index.add(*square).unwrap();
    }
    assert_eq!(ctx.index.count().unwrap(), 9);
    check_tree_invariants(&ctx);
}

#[test]
fn draining_leaves_compacts_up_to_the_root() {
    let ctx = create_test_context(4);
    let left: Vec<NodeId> = (0..3)
        .map(|i| unit_square(&ctx.store, i as f64, 0.0))
        .collect();
    let right: Vec<NodeId> = (0..3)
        .map(|i| unit_square(&ctx.store, 100.0 + i as f64, 0.0))
        .collect();
    for square in left.iter().chain(right.iter()) {
        ctx.index.add(*square).unwrap();
    }

    let root = ctx
        .store
        .single_outgoing(ctx.layer, arbor_spatial::RTREE_ROOT)
        .unwrap()
        .unwrap()
        .end;
    assert_eq!(ctx.store.outgoing(root, RTREE_CHILD).unwrap().len(), 2);

    // removing the right cluster one by one deletes its emptied leaf and
    // re-tightens the root box around the remaining cluster
    for square in &right {
        ctx.index.remove(*square, false).unwrap();
    }
    assert_eq!(ctx.store.outgoing(root, RTREE_CHILD).unwrap().len(), 1);
    let bbox = ctx.index.get_bounding_box().unwrap().unwrap();
    assert!(bbox.max_x <= 3.0);
    check_tree_invariants(&ctx);

    // draining the rest never deletes the root, but its box is gone
    for square in &left {
        ctx.index.remove(*square, false).unwrap();
    }
    assert!(ctx.index.is_empty().unwrap());
    assert_eq!(ctx.index.get_bounding_box().unwrap(), None);
    let same_root = ctx
        .store
        .single_outgoing(ctx.layer, arbor_spatial::RTREE_ROOT)
        .unwrap()
        .unwrap()
        .end;
    assert_eq!(same_root, root);
}

#[test]
fn mixed_inserts_and_removes_keep_count_exact() {
    let ctx = create_test_context(10);
    let squares: Vec<NodeId> = (0..200)
        .map(|i| unit_square(&ctx.store, (i % 20) as f64, (i / 20) as f64))
        .collect();
    for square in &squares {
        ctx.index.add(*square).unwrap();
    }

    // every fourth record goes away again
    for square in squares.iter().step_by(4) {
        ctx.index.remove(*square, false).unwrap();
    }

    assert_eq!(ctx.index.count().unwrap(), 150);
    let live: Vec<NodeId> = ctx
        .index
        .get_all_indexed_nodes()
        .unwrap()
        .collect::<arbor_spatial::SpatialResult<Vec<_>>>()
        .unwrap();
    assert_eq!(live.len(), 150);
    for (i, square) in squares.iter().enumerate() {
        assert_eq!(ctx.index.is_node_indexed(*square).unwrap(), i % 4 != 0);
    }
    check_tree_invariants(&ctx);
}

#[test]
fn clear_is_idempotent_and_leaves_a_usable_index() {
    let ctx = create_test_context(4);
    for i in 0..10 {
        ctx.index.add(unit_square(&ctx.store, i as f64, 0.0)).unwrap();
    }

    ctx.index.clear(&NullListener).unwrap();
    ctx.index.clear(&NullListener).unwrap();
    assert!(ctx.index.is_empty().unwrap());
    assert_eq!(ctx.index.count().unwrap(), 0);

    let square = unit_square(&ctx.store, 3.0, 3.0);
    ctx.index.add(square).unwrap();
    assert_eq!(ctx.index.count().unwrap(), 1);
    assert!(ctx.index.is_node_indexed(square).unwrap());
    check_tree_invariants(&ctx);
}

#[test]
fn remove_of_absent_record_is_silent_when_not_strict() {
    let ctx = create_test_context(4);
    for i in 0..5 {
        ctx.index.add(unit_square(&ctx.store, i as f64, 0.0)).unwrap();
    }

    ctx.index
        .remove_with_options(NodeId(1_000_000), false, false)
        .unwrap();
    assert_eq!(ctx.index.count().unwrap(), 5);
}

#[test]
fn height_follows_the_level_convention() {
    let ctx = create_test_context(4);
    assert_eq!(ctx.index.height().unwrap(), 1);

    ctx.index.add(unit_square(&ctx.store, 0.0, 0.0)).unwrap();
    assert_eq!(ctx.index.height().unwrap(), 1);

    for i in 1..=4 {
        ctx.index.add(unit_square(&ctx.store, i as f64, 0.0)).unwrap();
    }
    assert_eq!(ctx.index.height().unwrap(), 2);

    for i in 5..60 {
        ctx.index.add(unit_square(&ctx.store, i as f64, 0.0)).unwrap();
    }
    assert!(ctx.index.height().unwrap() >= 3);
    check_tree_invariants(&ctx);
}

#[test]
fn search_can_stop_early() {
    let ctx = create_test_context(4);
    for i in 0..50 {
        ctx.index.add(unit_square(&ctx.store, i as f64, 0.0)).unwrap();
    }

    let mut results = ctx.index.search_index(arbor_spatial::SearchAll).unwrap();
    assert!(results.next().unwrap().is_ok());
    assert!(results.next().unwrap().is_ok());
    // dropping the stream here must not disturb the tree
    drop(results);
    assert_eq!(ctx.index.count().unwrap(), 50);
    check_tree_invariants(&ctx);
}

#[test]
fn warm_up_after_reopen() {
    let ctx = create_test_context(4);
    for i in 0..20 {
        ctx.index.add(unit_square(&ctx.store, i as f64, 0.0)).unwrap();
    }
    drop(ctx.index);

    let reopened = arbor_int_test::test_util::open_index(&ctx.store, ctx.layer, 4);
    reopened.warm_up().unwrap();
    assert_eq!(reopened.count().unwrap(), 20);
}
