use core::iter::FusedIterator;

use crate::{Color, Dir, Key, Link, Node, RbTree};

/// An in-order iterator over the elements of an [`RbTree`].
///
/// Created by [`RbTree::iter`].
#[derive(Clone)]
pub struct Iter<'tree> {
    tree: &'tree RbTree,

    front: Link,
    back: Link,

    len: usize,
}

impl<'tree> Iter<'tree> {
    pub(crate) fn new(tree: &'tree RbTree) -> Self {
        let (front, back) = match tree.root {
            Some(root) => unsafe {
                (
                    Some(tree.extreme_raw(root, Dir::Left)),
                    Some(tree.extreme_raw(root, Dir::Right)),
                )
            },
            None => (None, None),
        };

        Iter {
            tree,
            front,
            back,
            len: tree.len(),
        }
    }
}

impl<'tree> Iterator for Iter<'tree> {
    type Item = &'tree Node;

    fn next(&mut self) -> Option<Self::Item> {
        // The front and back ends meet once every element has been yielded.
        if self.len == 0 {
            return None;
        }

        let cur = self.front?;
        self.len -= 1;
        self.front = unsafe { self.tree.successor_raw(cur) };

        Some(unsafe { cur.as_ref() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<'tree> DoubleEndedIterator for Iter<'tree> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        let cur = self.back?;
        self.len -= 1;
        self.back = unsafe { self.tree.predecessor_raw(cur) };

        Some(unsafe { cur.as_ref() })
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl FusedIterator for Iter<'_> {}

/// An in-order iterator over the `(key, color)` pairs of an [`RbTree`].
///
/// Created by [`RbTree::colored_keys`].
#[derive(Clone)]
pub struct ColoredKeys<'tree> {
    inner: Iter<'tree>,
}

impl<'tree> ColoredKeys<'tree> {
    pub(crate) fn new(inner: Iter<'tree>) -> Self {
        ColoredKeys { inner }
    }
}

impl Iterator for ColoredKeys<'_> {
    type Item = (Key, Color);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|node| (node.key(), node.color()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for ColoredKeys<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|node| (node.key(), node.color()))
    }
}

impl ExactSizeIterator for ColoredKeys<'_> {}

impl FusedIterator for ColoredKeys<'_> {}
