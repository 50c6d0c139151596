use std::{collections::BTreeMap, prelude::v1::*};

use arbitrary::{Arbitrary, Unstructured};
use proptest::{
    prop_oneof,
    strategy::{Just, Strategy},
};

use crate::{Key, Node, RbTree};

/// Upper bound (exclusive) of generated keys. Small, so that duplicates show up often.
pub(crate) const KEY_SPACE: Key = 64;

/// How an operation chooses its key.
#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum KeyPick {
    /// The key at this index (modulo) among the distinct keys currently stored.
    Present(usize),
    /// This key, whether or not it is stored.
    Fresh(Key),
}

impl KeyPick {
    pub(crate) fn resolve(self, present: &[Key]) -> Key {
        match self {
            KeyPick::Present(idx) if present.is_empty() => (idx % KEY_SPACE as usize) as Key,
            KeyPick::Present(idx) => present[idx % present.len()],
            KeyPick::Fresh(key) => key,
        }
    }
}

fn key_pick_strategy() -> impl Strategy<Value = KeyPick> {
    prop_oneof![
        (0usize..1000).prop_map(KeyPick::Present),
        (0..KEY_SPACE).prop_map(KeyPick::Fresh),
    ]
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Insert(KeyPick),
    Search(KeyPick),
    Remove(KeyPick),
    First,
    PopFirst,
    Last,
    PopLast,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        key_pick_strategy().prop_map(Op::Insert),
        key_pick_strategy().prop_map(Op::Search),
        key_pick_strategy().prop_map(Op::Remove),
        Just(Op::First),
        Just(Op::PopFirst),
        Just(Op::Last),
        Just(Op::PopLast),
    ]
}

// Reference multiset: each key maps to the number of copies stored.
#[derive(Default)]
struct Multiset {
    counts: BTreeMap<Key, usize>,
    len: usize,
}

impl Multiset {
    fn insert(&mut self, key: Key) {
        *self.counts.entry(key).or_default() += 1;
        self.len += 1;
    }

    fn remove(&mut self, key: Key) -> Option<Key> {
        let count = self.counts.get_mut(&key)?;
        *count -= 1;
        if *count == 0 {
            self.counts.remove(&key);
        }
        self.len -= 1;
        Some(key)
    }

    fn contains(&self, key: Key) -> bool {
        self.counts.contains_key(&key)
    }

    fn first(&self) -> Option<Key> {
        self.counts.keys().next().copied()
    }

    fn last(&self) -> Option<Key> {
        self.counts.keys().next_back().copied()
    }

    fn distinct(&self) -> Vec<Key> {
        self.counts.keys().copied().collect()
    }

    fn expanded(&self) -> impl Iterator<Item = Key> + '_ {
        self.counts
            .iter()
            .flat_map(|(&key, &count)| core::iter::repeat(key).take(count))
    }
}

#[allow(clippy::boxed_local)]
fn detached_key(node: Box<Node>) -> Key {
    node.key()
}

/// Applies `ops` to an [`RbTree`] and to a `BTreeMap`-backed multiset, panicking on the first
/// divergence or broken invariant.
pub fn run_btree_equivalence(ops: Vec<Op>) {
    let mut expected = Multiset::default();
    let mut tree = RbTree::new();

    for (step, op) in ops.into_iter().enumerate() {
        let present = expected.distinct();
        log::trace!("step {step}: {op:?} over {} keys", expected.len);

        let (want, got) = match op {
            Op::Insert(pick) => {
                let key = pick.resolve(&present);
                expected.insert(key);
                let node = tree.insert(key);
                (Some(key), Some(unsafe { node.as_ref() }.key()))
            }
            Op::Search(pick) => {
                let key = pick.resolve(&present);
                (
                    expected.contains(key).then_some(key),
                    tree.search(key).map(Node::key),
                )
            }
            Op::Remove(pick) => {
                let key = pick.resolve(&present);
                (expected.remove(key), tree.remove(key).map(detached_key))
            }
            Op::First => (expected.first(), tree.first().map(Node::key)),
            Op::Last => (expected.last(), tree.last().map(Node::key)),
            Op::PopFirst => (
                expected.first().and_then(|key| expected.remove(key)),
                tree.pop_first().map(detached_key),
            ),
            Op::PopLast => (
                expected.last().and_then(|key| expected.remove(key)),
                tree.pop_last().map(detached_key),
            ),
        };

        assert_eq!(want, got, "step {step}: {op:?}");
        tree.assert_invariants();
        assert_eq!(expected.len, tree.len(), "step {step}: {op:?}");
        assert!(
            expected.expanded().eq(tree.iter().map(Node::key)),
            "step {step}: {op:?}"
        );
    }
}

/// A cursor action. Reading the current element happens after every action.
#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum CursorOp {
    MovePrev,
    MoveNext,
    PeekNext,
    PeekPrev,
    RemoveCurrent,
    RemoveCurrentMovePrev,
}

pub fn cursor_op_strategy() -> impl Strategy<Value = CursorOp> {
    prop_oneof![
        Just(CursorOp::MovePrev),
        Just(CursorOp::MoveNext),
        Just(CursorOp::PeekNext),
        Just(CursorOp::PeekPrev),
        Just(CursorOp::RemoveCurrent),
        Just(CursorOp::RemoveCurrentMovePrev),
    ]
}

/// Fuzzer input for [`run_cursor_equivalence`].
#[derive(Clone, Debug)]
pub struct CursorEquivalenceInput {
    pub values: Vec<Key>,
    pub ops: Vec<CursorOp>,
}

impl<'a> Arbitrary<'a> for CursorEquivalenceInput {
    fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
        let value_count = usize::from(u8::arbitrary(u)? % 100);
        let op_count = usize::from(u16::arbitrary(u)? % 1000);

        let mut values = Vec::with_capacity(value_count);
        for _ in 0..value_count {
            values.push(Key::from(u8::arbitrary(u).unwrap_or(0)) % KEY_SPACE);
        }

        let mut ops = Vec::with_capacity(op_count);
        for _ in 0..op_count {
            ops.push(CursorOp::arbitrary(u).unwrap_or(CursorOp::MoveNext));
        }

        Ok(CursorEquivalenceInput { values, ops })
    }
}

// A cursor over a sorted vector, where `None` plays the ghost position.
struct SortedCursor {
    keys: Vec<Key>,
    pos: Option<usize>,
}

impl SortedCursor {
    fn next_pos(&self) -> Option<usize> {
        match self.pos {
            Some(i) => Some(i + 1).filter(|&next| next < self.keys.len()),
            None => (!self.keys.is_empty()).then_some(0),
        }
    }

    fn prev_pos(&self) -> Option<usize> {
        match self.pos {
            Some(i) => i.checked_sub(1),
            None => self.keys.len().checked_sub(1),
        }
    }

    fn key_at(&self, pos: Option<usize>) -> Option<Key> {
        pos.map(|i| self.keys[i])
    }

    fn current(&self) -> Option<Key> {
        self.key_at(self.pos)
    }

    // Elements after the removed one shift down, so the index now names the next key.
    fn remove(&mut self) -> Option<Key> {
        let i = self.pos?;
        let key = self.keys.remove(i);
        if i == self.keys.len() {
            self.pos = None;
        }
        Some(key)
    }

    fn remove_and_move_prev(&mut self) -> Option<Key> {
        let i = self.pos?;
        self.pos = i.checked_sub(1);
        Some(self.keys.remove(i))
    }
}

/// Drives a [`CursorMut`](crate::CursorMut) over a tree built from `values` alongside a cursor
/// over the same keys in a sorted `Vec`, panicking on the first divergence.
pub fn run_cursor_equivalence(mut values: Vec<Key>, ops: Vec<CursorOp>) {
    let mut tree: RbTree = values.iter().copied().collect();

    // Duplicates stay: both sides are multisets.
    values.sort_unstable();
    let mut expected = SortedCursor {
        keys: values,
        pos: None,
    };
    expected.pos = expected.next_pos();

    let mut cursor = tree.cursor_first_mut();
    assert_eq!(expected.current(), cursor.get().map(Node::key));

    for (step, op) in ops.into_iter().enumerate() {
        match op {
            CursorOp::MoveNext => {
                expected.pos = expected.next_pos();
                cursor.move_next();
            }
            CursorOp::MovePrev => {
                expected.pos = expected.prev_pos();
                cursor.move_prev();
            }
            CursorOp::PeekNext => assert_eq!(
                expected.key_at(expected.next_pos()),
                cursor.peek_next().map(Node::key),
                "step {step}: {op:?}"
            ),
            CursorOp::PeekPrev => assert_eq!(
                expected.key_at(expected.prev_pos()),
                cursor.peek_prev().map(Node::key),
                "step {step}: {op:?}"
            ),
            CursorOp::RemoveCurrent => assert_eq!(
                expected.remove(),
                cursor.remove_current().map(detached_key),
                "step {step}: {op:?}"
            ),
            CursorOp::RemoveCurrentMovePrev => assert_eq!(
                expected.remove_and_move_prev(),
                cursor.remove_current_and_move_prev().map(detached_key),
                "step {step}: {op:?}"
            ),
        }

        assert_eq!(
            expected.current(),
            cursor.get().map(Node::key),
            "step {step}: {op:?}"
        );
    }

    drop(cursor);
    tree.assert_invariants();
    assert!(expected.keys.iter().copied().eq(tree.iter().map(Node::key)));
}
