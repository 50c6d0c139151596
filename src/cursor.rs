use alloc::boxed::Box;
use core::{marker::PhantomData, ptr::NonNull};

use crate::{Dir, Link, Node, RbTree};

/// A read-only position in an [`RbTree`].
///
/// Besides the elements themselves, a cursor can rest on the "ghost": a position that sits after
/// the maximum and before the minimum, so that moving past either end wraps around through it.
pub struct Cursor<'tree> {
    raw: RawCursor,
    _tree: PhantomData<&'tree RbTree>,
}

impl<'tree> Cursor<'tree> {
    pub(crate) fn new(tree: &'tree RbTree, start: Dir) -> Cursor<'tree> {
        Cursor {
            raw: RawCursor::at_end(NonNull::from(tree), start),
            _tree: PhantomData,
        }
    }

    /// Advances to the next element in ascending order.
    ///
    /// From the ghost this lands on the minimum; from the maximum it lands on the ghost.
    pub fn move_next(&mut self) {
        unsafe { self.raw.step(Dir::Right) }
    }

    /// Steps back to the previous element in ascending order.
    ///
    /// From the ghost this lands on the maximum; from the minimum it lands on the ghost.
    pub fn move_prev(&mut self) {
        unsafe { self.raw.step(Dir::Left) }
    }

    /// Returns the node under the cursor, or `None` on the ghost.
    pub fn get(&self) -> Option<&'tree Node> {
        unsafe { deref(self.raw.pos) }
    }

    /// Returns the node [`move_next`](Self::move_next) would land on, without moving.
    pub fn peek_next(&self) -> Option<&'tree Node> {
        unsafe { deref(self.raw.look(Dir::Right)) }
    }

    /// Returns the node [`move_prev`](Self::move_prev) would land on, without moving.
    pub fn peek_prev(&self) -> Option<&'tree Node> {
        unsafe { deref(self.raw.look(Dir::Left)) }
    }
}

/// A position in an [`RbTree`] that can also remove the element under it.
///
/// Moves through the "ghost" position exactly like [`Cursor`].
pub struct CursorMut<'tree> {
    raw: RawCursor,
    _tree: PhantomData<&'tree mut RbTree>,
}

impl<'tree> CursorMut<'tree> {
    pub(crate) fn new(tree: &'tree mut RbTree, start: Dir) -> CursorMut<'tree> {
        CursorMut {
            raw: RawCursor::at_end(NonNull::from(tree), start),
            _tree: PhantomData,
        }
    }

    /// Borrows this cursor as a read-only [`Cursor`] at the same position.
    pub fn as_cursor(&self) -> Cursor<'_> {
        Cursor {
            raw: self.raw,
            _tree: PhantomData,
        }
    }

    /// Advances to the next element in ascending order.
    ///
    /// From the ghost this lands on the minimum; from the maximum it lands on the ghost.
    pub fn move_next(&mut self) {
        unsafe { self.raw.step(Dir::Right) }
    }

    /// Steps back to the previous element in ascending order.
    ///
    /// From the ghost this lands on the maximum; from the minimum it lands on the ghost.
    pub fn move_prev(&mut self) {
        unsafe { self.raw.step(Dir::Left) }
    }

    /// Returns the node under the cursor, or `None` on the ghost.
    pub fn get(&self) -> Option<&Node> {
        unsafe { deref(self.raw.pos) }
    }

    /// Returns the node [`move_next`](Self::move_next) would land on, without moving.
    pub fn peek_next(&self) -> Option<&Node> {
        unsafe { deref(self.raw.look(Dir::Right)) }
    }

    /// Returns the node [`move_prev`](Self::move_prev) would land on, without moving.
    pub fn peek_prev(&self) -> Option<&Node> {
        unsafe { deref(self.raw.look(Dir::Left)) }
    }

    /// Removes the key under the cursor and returns the detached node carrying it.
    ///
    /// Afterwards the cursor rests on the next larger key, or on the ghost if the removed key was
    /// the maximum. When the current node has two children it stays in the tree with its
    /// successor's key, so the cursor does not move. Does nothing on the ghost.
    pub fn remove_current(&mut self) -> Option<Box<Node>> {
        unsafe { self.raw.remove(Dir::Right) }
    }

    /// Like [`remove_current`](Self::remove_current), but leaves the cursor on the next smaller
    /// key (or the ghost) instead.
    pub fn remove_current_and_move_prev(&mut self) -> Option<Box<Node>> {
        unsafe { self.raw.remove(Dir::Left) }
    }
}

unsafe fn deref<'a>(link: Link) -> Option<&'a Node> {
    link.map(|node| unsafe { node.as_ref() })
}

// A tree pointer plus a position in it; `pos == None` is the ghost.
#[derive(Copy, Clone)]
struct RawCursor {
    tree: NonNull<RbTree>,
    pos: Link,
}

impl RawCursor {
    // Starts on the extreme element at the `end` side, or the ghost if the tree is empty.
    fn at_end(tree: NonNull<RbTree>, end: Dir) -> RawCursor {
        let pos = unsafe { tree.as_ref() }
            .root
            .map(|root| unsafe { tree.as_ref().extreme_raw(root, end) });

        RawCursor { tree, pos }
    }

    // The position one step in `dir`, wrapping through the ghost.
    unsafe fn look(&self, dir: Dir) -> Link {
        let tree = unsafe { self.tree.as_ref() };

        match self.pos {
            Some(node) => unsafe { tree.neighbor_raw(node, dir) },
            None => tree
                .root
                .map(|root| unsafe { tree.extreme_raw(root, !dir) }),
        }
    }

    unsafe fn step(&mut self, dir: Dir) {
        self.pos = unsafe { self.look(dir) };
    }

    // Deletes the current node and moves to its neighbor in `dir`.
    unsafe fn remove(&mut self, dir: Dir) -> Option<Box<Node>> {
        let node = self.pos?;
        let tree = unsafe { self.tree.as_mut() };

        // A two-child node stays linked and takes over its successor's key, so the successor's
        // position is the node itself. The predecessor is never spliced out.
        let next = unsafe {
            match dir {
                Dir::Right if tree.has_two_children(node) => Some(node),
                _ => tree.neighbor_raw(node, dir),
            }
        };

        let removed = unsafe { tree.delete(node) };
        self.pos = next;

        Some(removed)
    }
}
