use std::{collections::BTreeMap, ops::Range, prelude::v1::*, vec};

use proptest::prelude::*;
use simplelog::{Config, LevelFilter, TestLogger};

use crate::model;

use super::*;

fn init_logger() {
    let _ = TestLogger::init(LevelFilter::Debug, Config::default());
}

fn keys(tree: &RbTree) -> Vec<Key> {
    tree.iter().map(Node::key).collect()
}

fn build(keys: &[Key]) -> RbTree {
    let mut tree = RbTree::new();

    for &key in keys {
        tree.insert(key);
        tree.assert_invariants();
    }

    tree
}

// A small deterministic permutation of `0..n`, so round-trip tests don't insert sorted input.
fn scrambled(n: Key, stride: Key) -> Vec<Key> {
    (0..n).map(|i| (i * stride) % n).collect()
}

// Counts black nodes, including the nil link, along the rightmost path below `node`.
fn right_spine_black_height(tree: &RbTree, node: &Node) -> usize {
    let mut count = 1;
    let mut opt_cur = unsafe { tree.links(NonNull::from(node)).right() };

    while let Some(cur) = opt_cur {
        if unsafe { cur.as_ref().color() } == Color::Black {
            count += 1;
        }
        opt_cur = unsafe { tree.links(cur).right() };
    }

    count
}

// Every ordering of `keys`, by Heap's algorithm.
fn permutations(keys: &[Key]) -> Vec<Vec<Key>> {
    fn permute(k: usize, keys: &mut Vec<Key>, out: &mut Vec<Vec<Key>>) {
        if k <= 1 {
            out.push(keys.clone());
            return;
        }

        for i in 0..k - 1 {
            permute(k - 1, keys, out);
            let swap_with = if k % 2 == 0 { i } else { 0 };
            keys.swap(swap_with, k - 1);
        }
        permute(k - 1, keys, out);
    }

    let mut keys = keys.to_vec();
    let mut out = Vec::new();
    permute(keys.len(), &mut keys, &mut out);
    out
}

fn insert_find_all(keys: &[Key]) {
    let tree = build(keys);

    for &key in keys {
        let node = tree.search(key).expect("item not found");
        assert_eq!(node.key(), key);
    }
}

// Removes every key by node pointer, first in insertion order and then, after
// reinserting, in reverse.
fn insert_remove_all(keys: &[Key]) {
    let mut tree = build(keys);

    for &key in keys {
        let node = tree.search_raw(key).expect("item not found");
        let removed = unsafe { tree.delete(node) };
        assert_eq!(removed.key(), key);
        tree.assert_invariants();
    }

    assert!(tree.is_empty());

    tree.extend(keys.iter().copied());
    tree.assert_invariants();

    for &key in keys.iter().rev() {
        let node = tree.search_raw(key).expect("item not found");
        let removed = unsafe { tree.delete(node) };
        assert_eq!(removed.key(), key);
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
}

#[test]
fn permutations_are_complete() {
    assert_eq!(permutations(&[]).len(), 1);
    assert_eq!(permutations(&[0, 1, 2]).len(), 6);

    let mut all = permutations(&[0, 1, 2, 3]);
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 24);
}

#[test]
fn find_after_inserting_every_order() {
    for n in 0..=6 {
        let keys: Vec<Key> = (0..n).collect();
        for order in permutations(&keys) {
            insert_find_all(&order);
        }
    }
}

#[test]
fn remove_after_inserting_every_order() {
    for n in 1..=6 {
        let keys: Vec<Key> = (0..n).collect();
        for order in permutations(&keys) {
            insert_remove_all(&order);
        }
    }
}

#[test]
fn remove_duplicates_in_every_order() {
    for order in permutations(&[0, 1, 1, 2, 2, 2]) {
        insert_remove_all(&order);
    }
}

#[test]
fn empty_tree() {
    let mut tree = RbTree::new();

    assert!(tree.is_empty());
    assert!(tree.root().is_none());
    assert!(tree.first().is_none());
    assert!(tree.last().is_none());
    assert!(tree.search(7).is_none());
    assert_eq!(tree.black_height(), 0);
    assert_eq!(tree.depth(), 0);
    assert_eq!(tree.max_key_by_color(Color::Red), None);
    assert_eq!(tree.max_key_by_color(Color::Black), None);
    assert!(tree.iter().next().is_none());
    assert!(tree.pop_first().is_none());
    assert!(tree.pop_last().is_none());
    assert!(tree.remove(7).is_none());
    assert_eq!(tree.check_invariants(), Ok(()));
}

#[test]
fn sentinel_is_black() {
    assert_eq!(color_of(NIL), Color::Black);
}

#[test]
fn new_node_is_red() {
    let node = Node::new(3);
    assert_eq!(node.key(), 3);
    assert_eq!(node.color(), Color::Red);
}

#[test]
fn ascending_inserts_black_height() {
    init_logger();

    let tree = build(&[10, 20, 30, 40, 50, 60, 70]);

    let root = tree.root().expect("tree is not empty");
    assert_eq!(root.key(), 20);
    assert_eq!(root.color(), Color::Black);

    assert_eq!(
        tree.colored_keys().collect::<Vec<_>>(),
        vec![
            (10, Color::Black),
            (20, Color::Black),
            (30, Color::Black),
            (40, Color::Red),
            (50, Color::Red),
            (60, Color::Black),
            (70, Color::Red),
        ]
    );

    assert_eq!(tree.black_height(), 2);
    assert_eq!(tree.black_height(), right_spine_black_height(&tree, root));
    assert_eq!(tree.depth(), 4);

    // No red node has a red child.
    let forty = tree.search(40).expect("40 was inserted");
    assert_eq!(forty.color(), Color::Red);
    assert!(tree
        .iter()
        .filter(|node| node.color() == Color::Red)
        .all(|node| {
            let links = unsafe { tree.links(NonNull::from(node)) };
            color_of(links.left()) == Color::Black && color_of(links.right()) == Color::Black
        }));
}

#[test]
fn black_height_of_subtrees() {
    let tree = build(&[10, 20, 30, 40, 50, 60, 70]);

    let forty = tree.search(40).expect("40 was inserted");
    assert_eq!(tree.black_height_of(forty), 2);
    assert_eq!(tree.black_height_of(forty), right_spine_black_height(&tree, forty));

    let seventy = tree.search(70).expect("70 was inserted");
    assert_eq!(tree.black_height_of(seventy), 1);

    let single = build(&[1]);
    assert_eq!(single.black_height(), 1);
    assert_eq!(single.depth(), 1);
}

#[test]
fn max_key_by_color() {
    init_logger();

    let tree = build(&[5, 3, 8, 1, 4, 7, 9]);

    assert_eq!(
        tree.colored_keys().collect::<Vec<_>>(),
        vec![
            (1, Color::Red),
            (3, Color::Black),
            (4, Color::Red),
            (5, Color::Black),
            (7, Color::Red),
            (8, Color::Black),
            (9, Color::Red),
        ]
    );

    for color in [Color::Red, Color::Black] {
        let scanned = tree
            .iter()
            .filter(|node| node.color() == color)
            .map(Node::key)
            .max();
        assert_eq!(tree.max_key_by_color(color), scanned);
    }

    assert_eq!(tree.max_key_by_color(Color::Red), Some(9));
    assert_eq!(tree.max_key_by_color(Color::Black), Some(8));
    assert_eq!(tree.black_height(), 2);
    assert_eq!(tree.depth(), 3);
}

#[test]
fn max_key_by_color_absent() {
    let tree = build(&[42]);

    assert_eq!(tree.max_key_by_color(Color::Red), None);
    assert_eq!(tree.max_key_by_color(Color::Black), Some(42));
}

#[test]
fn delete_two_child_node() {
    init_logger();

    let mut tree = build(&[5, 3, 8, 1, 4, 7, 9]);

    let three = tree.search_raw(3).expect("3 was inserted");
    let removed = unsafe { tree.delete(three) };
    tree.assert_invariants();

    // The successor was spliced out; the node that held 3 now holds 4.
    assert_eq!(removed.key(), 3);
    assert_eq!(removed.color(), Color::Red);
    assert_eq!(tree.search_raw(4), Some(three));
    assert_eq!(tree.search(3).map(Node::key), None);
    assert_eq!(keys(&tree), vec![1, 4, 5, 7, 8, 9]);
    assert_eq!(tree.len(), 6);
}

#[test]
fn delete_root_with_two_children() {
    let mut tree = build(&[5, 3, 8, 1, 4, 7, 9]);

    let removed = tree.remove(5).expect("5 was inserted");
    tree.assert_invariants();

    assert_eq!(removed.key(), 5);
    assert_eq!(tree.root().map(Node::key), Some(7));
    assert_eq!(keys(&tree), vec![1, 3, 4, 7, 8, 9]);
}

#[test]
fn delete_black_leaf_rebalances() {
    init_logger();

    let mut tree = build(&[10, 20, 30, 40, 50, 60, 70]);

    // 10 is a black leaf: its removal leaves a doubly black nil.
    let removed = tree.remove(10).expect("10 was inserted");
    assert_eq!(removed.key(), 10);
    tree.assert_invariants();
    assert_eq!(keys(&tree), vec![20, 30, 40, 50, 60, 70]);

    for key in [30, 20, 60, 40] {
        assert_eq!(tree.remove(key).map(|node| node.key()), Some(key));
        tree.assert_invariants();
    }

    assert_eq!(keys(&tree), vec![50, 70]);
}

#[test]
fn detached_node_can_be_reinserted() {
    let mut tree = build(&[2, 1, 3]);

    let node = tree.remove(1).expect("1 was inserted");
    assert_eq!(node.color(), Color::Red);

    let mut other = RbTree::new();
    let ptr = other.insert_node(node);
    other.assert_invariants();

    assert_eq!(other.search_raw(1), Some(ptr));
    assert_eq!(unsafe { ptr.as_ref().color() }, Color::Black);
}

#[test]
fn duplicates_descend_right() {
    let mut tree = build(&[5, 5, 5, 3, 5]);

    assert_eq!(tree.len(), 5);
    assert_eq!(keys(&tree), vec![3, 5, 5, 5, 5]);

    let mut removed = 0;
    while let Some(node) = tree.remove(5) {
        assert_eq!(node.key(), 5);
        removed += 1;
        tree.assert_invariants();
    }

    assert_eq!(removed, 4);
    assert_eq!(keys(&tree), vec![3]);
}

#[test]
fn delete_duplicate_by_identity() {
    let mut tree = RbTree::new();
    let a = tree.insert(1);
    let _b = tree.insert(1);
    let _c = tree.insert(1);

    let removed = unsafe { tree.delete(a) };
    tree.assert_invariants();

    assert_eq!(removed.key(), 1);
    assert_eq!(keys(&tree), vec![1, 1]);
}

#[test]
fn round_trip_to_empty() {
    let inserted = scrambled(200, 37);
    let mut tree: RbTree = inserted.iter().copied().collect();
    tree.assert_invariants();
    assert_eq!(tree.len(), 200);

    for key in scrambled(200, 91) {
        assert_eq!(tree.remove(key).map(|node| node.key()), Some(key));
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
    assert!(tree.root().is_none());
    assert_eq!(tree.depth(), 0);
}

#[test]
fn search_misses() {
    let tree: RbTree = scrambled(50, 7).into_iter().map(|k| k * 2).collect();

    for key in 0..50 {
        assert!(tree.contains(key * 2));
        assert!(!tree.contains(key * 2 + 1));
        assert!(tree.search(key * 2 + 1).is_none());
    }
}

#[test]
fn successor_predecessor_consistency() {
    let mut tree: RbTree = scrambled(101, 13).into_iter().map(|k| k % 40).collect();

    for key in [0, 17, 39, 5, 5] {
        tree.remove(key);
    }
    tree.assert_invariants();

    let nodes: Vec<&Node> = tree.iter().collect();
    assert_eq!(nodes.len(), tree.len());

    for pair in nodes.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        assert!(a.key() <= b.key());
        assert!(core::ptr::eq(tree.successor(a).expect("a is not the maximum"), b));
        assert!(core::ptr::eq(tree.predecessor(b).expect("b is not the minimum"), a));
    }

    let first = tree.first().expect("tree is not empty");
    let last = tree.last().expect("tree is not empty");
    assert!(tree.predecessor(first).is_none());
    assert!(tree.successor(last).is_none());
}

#[test]
fn subtree_navigation() {
    let tree = build(&[10, 20, 30, 40, 50, 60, 70]);

    let root = tree.root().expect("tree is not empty");
    let forty = tree.search(40).expect("40 was inserted");

    assert_eq!(tree.minimum(root).key(), 10);
    assert_eq!(tree.maximum(root).key(), 70);
    assert_eq!(tree.minimum(forty).key(), 30);
    assert_eq!(tree.maximum(forty).key(), 70);

    assert_eq!(tree.search_from(forty, 50).map(Node::key), Some(50));
    assert!(tree.search_from(forty, 10).is_none());
    assert_eq!(tree.search_from(root, 10).map(Node::key), Some(10));
}

#[test]
fn pop_first_and_last() {
    let mut tree: RbTree = scrambled(30, 11).into_iter().collect();

    let mut front = Vec::new();
    let mut back = Vec::new();

    while let Some(node) = tree.pop_first() {
        front.push(node.key());
        tree.assert_invariants();

        if let Some(node) = tree.pop_last() {
            back.push(node.key());
            tree.assert_invariants();
        }
    }

    assert_eq!(front, (0..15).collect::<Vec<_>>());
    assert_eq!(back, (15..30).rev().collect::<Vec<_>>());
}

#[test]
fn remove_missing_key() {
    let mut tree = build(&[1, 2, 3]);

    assert!(tree.remove(4).is_none());
    assert_eq!(tree.len(), 3);
    tree.assert_invariants();
}

#[test]
fn iter_is_double_ended_and_restartable() {
    let tree: RbTree = scrambled(20, 3).into_iter().collect();

    let iter = tree.iter();
    assert_eq!(iter.len(), 20);

    let forward: Vec<Key> = iter.clone().map(Node::key).collect();
    let backward: Vec<Key> = iter.rev().map(Node::key).collect();
    assert_eq!(forward, (0..20).collect::<Vec<_>>());
    assert_eq!(backward, (0..20).rev().collect::<Vec<_>>());
    assert_eq!(keys(&tree), forward);

    // The two ends meet without yielding an element twice.
    let mut iter = tree.iter();
    let mut seen = Vec::new();
    while let (Some(a), b) = (iter.next(), iter.next_back()) {
        seen.push(a.key());
        seen.extend(b.map(Node::key));
    }
    seen.sort_unstable();
    assert_eq!(seen, forward);
    assert!(iter.next().is_none());

    let mut count = 0;
    for _node in &tree {
        count += 1;
    }
    assert_eq!(count, 20);
}

#[test]
fn cursor_walks_through_ghost() {
    let tree = build(&[2, 1, 3]);

    let mut curs = tree.cursor_first();
    assert_eq!(curs.get().map(Node::key), Some(1));
    assert_eq!(curs.peek_prev().map(Node::key), None);

    curs.move_next();
    curs.move_next();
    assert_eq!(curs.get().map(Node::key), Some(3));
    assert_eq!(curs.peek_next().map(Node::key), None);

    curs.move_next();
    assert!(curs.get().is_none());
    assert_eq!(curs.peek_next().map(Node::key), Some(1));
    assert_eq!(curs.peek_prev().map(Node::key), Some(3));

    curs.move_next();
    assert_eq!(curs.get().map(Node::key), Some(1));

    let mut curs = tree.cursor_last();
    assert_eq!(curs.get().map(Node::key), Some(3));
    curs.move_prev();
    assert_eq!(curs.get().map(Node::key), Some(2));
}

#[test]
fn cursor_remove_two_child_node() {
    let mut tree = build(&[5, 3, 8, 1, 4, 7, 9]);

    {
        let mut curs = tree.cursor_first_mut();
        curs.move_next();
        assert_eq!(curs.get().map(Node::key), Some(3));

        let removed = curs.remove_current().expect("cursor is on an element");
        assert_eq!(removed.key(), 3);
        assert_eq!(curs.get().map(Node::key), Some(4));
        assert_eq!(curs.as_cursor().peek_prev().map(Node::key), Some(1));

        curs.move_next();
        let removed = curs
            .remove_current_and_move_prev()
            .expect("cursor is on an element");
        assert_eq!(removed.key(), 5);
        assert_eq!(curs.get().map(Node::key), Some(4));
    }

    tree.assert_invariants();
    assert_eq!(keys(&tree), vec![1, 4, 7, 8, 9]);
}

#[test]
fn rotation_preserves_order() {
    let mut tree = build(&[5, 3, 8, 1, 4, 7, 9]);
    let before = keys(&tree);

    let root = tree.root.expect("tree is not empty");
    unsafe { tree.rotate(root, Dir::Left) };
    assert_eq!(tree.root().map(Node::key), Some(8));
    assert_eq!(keys(&tree), before);

    let root = tree.root.expect("tree is not empty");
    unsafe { tree.rotate(root, Dir::Right) };
    assert_eq!(tree.root().map(Node::key), Some(5));
    assert_eq!(keys(&tree), before);
    tree.assert_invariants();
}

#[test]
#[should_panic(expected = "rotation requires a child")]
fn rotation_without_child_panics() {
    let mut tree = build(&[5, 3]);
    let leaf = tree.search_raw(3).expect("3 was inserted");
    unsafe { tree.rotate(leaf, Dir::Left) };
}

#[test]
#[should_panic(expected = "node does not belong to this tree")]
fn delete_foreign_node_panics() {
    let mut a = build(&[1, 2, 3]);
    let b = build(&[1, 2, 3]);

    let foreign = b.search_raw(2).expect("2 was inserted");
    unsafe { a.delete(foreign) };
}

#[test]
fn check_invariants_reports_red_root() {
    let mut tree = build(&[2, 1, 3]);

    let root = tree.root.expect("tree is not empty");
    unsafe { tree.set_color(root, Color::Red) };

    assert_eq!(
        tree.check_invariants(),
        Err(InvariantViolation::RedRoot { key: 2 })
    );
}

#[test]
fn check_invariants_reports_double_red() {
    let mut tree = build(&[2, 1, 3, 4]);

    let three = tree.search_raw(3).expect("3 was inserted");
    unsafe { tree.set_color(three, Color::Red) };

    assert_eq!(
        tree.check_invariants(),
        Err(InvariantViolation::DoubleRed {
            parent: 3,
            child: 4
        })
    );
}

#[test]
fn check_invariants_reports_order() {
    let tree = build(&[2, 1, 3]);

    let one = tree.search_raw(1).expect("1 was inserted");
    unsafe { (*one.as_ptr()).key = 9 };

    assert_eq!(
        tree.check_invariants(),
        Err(InvariantViolation::OrderViolation {
            key: 9,
            ancestor: 2
        })
    );
}

#[test]
fn clear_and_reuse() {
    let mut tree: RbTree = scrambled(64, 5).into_iter().collect();

    tree.clear();
    assert!(tree.is_empty());
    assert_eq!(tree.check_invariants(), Ok(()));

    tree.extend([3, 1, 2]);
    tree.assert_invariants();
    assert_eq!(keys(&tree), vec![1, 2, 3]);
}

#[test]
fn large_tree_stays_shallow() {
    const N: Key = 100_000;

    let mut tree = RbTree::new();
    tree.extend(0..N);
    assert_eq!(tree.len(), N as usize);

    // Height is bounded by 2 * log2(n + 1).
    let bound = 2 * (usize::BITS - (N as usize + 1).leading_zeros()) as usize;
    assert!(tree.depth() <= bound, "depth {} > {bound}", tree.depth());
    tree.assert_invariants();

    for key in (0..N).step_by(2) {
        tree.remove(key);
    }
    tree.assert_invariants();
    assert_eq!(tree.len(), N as usize / 2);

    drop(tree);
}

// Marsaglia's xorshift64; enough to scatter keys and choices deterministically.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

#[cfg(miri)]
const STRESS_STEPS: usize = 200;

#[cfg(not(miri))]
const STRESS_STEPS: usize = 20_000;

#[test]
fn random_pointer_deletes_match_multiset() {
    let mut rng = XorShift(0x9e37_79b9_7f4a_7c15);
    let mut tree = RbTree::new();
    let mut counts = BTreeMap::<Key, usize>::new();

    for _ in 0..STRESS_STEPS {
        let key = (rng.next() % 50) as Key;

        if rng.next() % 2 == 0 {
            tree.insert(key);
            *counts.entry(key).or_default() += 1;
        } else if let Some(node) = tree.search_raw(key) {
            let removed = unsafe { tree.delete(node) };
            assert_eq!(removed.key(), key);

            let count = counts.get_mut(&key).expect("tree and model agree on membership");
            *count -= 1;
            if *count == 0 {
                counts.remove(&key);
            }
        } else {
            assert!(!counts.contains_key(&key));
        }

        tree.assert_invariants();

        if let Some(root) = tree.root() {
            assert_eq!(tree.black_height(), right_spine_black_height(&tree, root));
        }
    }

    let expected: Vec<Key> = counts
        .iter()
        .flat_map(|(&key, &count)| core::iter::repeat(key).take(count))
        .collect();
    assert_eq!(keys(&tree), expected);
}

#[test]
fn extreme_keys() {
    let mut tree = build(&[Key::MAX, Key::MIN, 0, Key::MAX, Key::MIN, -1, 1]);

    assert_eq!(tree.first().map(Node::key), Some(Key::MIN));
    assert_eq!(tree.last().map(Node::key), Some(Key::MAX));
    assert_eq!(keys(&tree), vec![Key::MIN, Key::MIN, -1, 0, 1, Key::MAX, Key::MAX]);

    for key in [Key::MIN, Key::MAX, Key::MIN, Key::MAX] {
        assert_eq!(tree.remove(key).map(|node| node.key()), Some(key));
        tree.assert_invariants();
    }

    assert!(!tree.contains(Key::MIN));
    assert!(!tree.contains(Key::MAX));
    assert_eq!(keys(&tree), vec![-1, 0, 1]);
}

#[test]
fn ops_decoded_from_bytes() {
    let bytes: Vec<u8> = (0..4096u32)
        .map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8)
        .collect();

    let mut u = ::arbitrary::Unstructured::new(&bytes);
    let ops = <Vec<model::Op> as ::arbitrary::Arbitrary>::arbitrary(&mut u)
        .expect("bytes decode into ops");
    model::run_btree_equivalence(ops);

    let mut u = ::arbitrary::Unstructured::new(&bytes);
    let input = <model::CursorEquivalenceInput as ::arbitrary::Arbitrary>::arbitrary(&mut u)
        .expect("bytes decode into a cursor run");
    model::run_cursor_equivalence(input.values, input.ops);
}

#[test]
fn present_pick_on_empty_tree_stays_in_key_space() {
    for idx in [0, 63, 64, usize::MAX] {
        let key = model::KeyPick::Present(idx).resolve(&[]);
        assert!((0..model::KEY_SPACE).contains(&key), "{idx} resolved to {key}");
    }
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }

    #[test]
    fn cursor_equivalence(
        values in proptest::collection::vec(0..64 as Key, 0..100),
        ops in proptest::collection::vec(model::cursor_op_strategy(), FUZZ_RANGE),
    ) {
        model::run_cursor_equivalence(values, ops);
    }
}
