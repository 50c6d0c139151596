//! An intrusive red-black tree.
#![no_std]

// Conventions used in comments are from Cormen, Leiserson, Rivest and Stein:
// - The parent of a node `x` is denoted `p(x)`.
// - The black-height `bh(x)` of a node `x` is the number of black nodes on any path from `x` down
//   to a nil link, not counting `x` itself but counting the nil link.
// - Missing children and the parent of the root are all the same sentinel, `NIL`.
//
// The red-black invariants:
// 1. The root is black.
// 2. Every nil link is black.
// 3. A red node never has a red child.
// 4. All paths from a node down to its nil links contain the same number of black nodes.
// 5. An in-order walk yields keys in non-descending order. Equal keys descend to the right on
//    insertion, so the tree behaves as a multiset.
//
// Corollary: no path from the root to a nil link is more than twice as long as any other, so
// the height of a tree with `n` nodes is at most `2 * log2(n + 1)`.

extern crate alloc;
#[cfg(any(test, feature = "model"))]
extern crate std;

use alloc::boxed::Box;
use core::{
    cell::UnsafeCell, fmt, marker::PhantomPinned, mem, ops::Not, ptr::NonNull,
};

use cordyceps::Linked;
use log::{debug, trace};

mod cursor;
mod iter;
mod validate;

#[cfg(any(test, feature = "model"))]
pub mod model;

#[cfg(test)]
mod tests;

pub use cursor::{Cursor, CursorMut};
pub use iter::{ColoredKeys, Iter};
pub use validate::InvariantViolation;

/// The key type stored in an [`RbTree`].
pub type Key = i64;

/// The color tag carried by every node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Black,
}

/// A red-black tree of [`Key`]s.
///
/// The tree owns every [`Node`] linked into it. Nodes enter the tree as `Box<Node>` handles and
/// leave it the same way, so a removed node can be inspected, reused or dropped by the caller.
///
/// Duplicate keys are permitted; each insertion adds a distinct node.
pub struct RbTree {
    root: Link,
    len: usize,
}

/// A single key stored in an [`RbTree`], along with its tree links.
#[repr(C)]
pub struct Node {
    links: Links,
    key: Key,
}

/// The parent, child and color fields every [`Node`] carries.
pub struct Links {
    inner: UnsafeCell<LinksInner>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner {
    parent: Link,
    children: [Link; 2],
    color: Color,
    _unpin: PhantomPinned,
}

type Link = Option<NonNull<Node>>;

/// The shared sentinel. It stands in for every missing child and for the parent of the root.
const NIL: Link = None;

/// Returns the color of `link`. The sentinel is always black.
#[inline]
fn color_of(link: Link) -> Color {
    match link {
        Some(node) => unsafe { Node::links(node).as_ref().color() },
        None => Color::Black,
    }
}

// SAFETY: the tree exclusively owns its nodes, and node links are only written through
// `&mut RbTree`.
unsafe impl Send for RbTree {}
unsafe impl Sync for RbTree {}

impl RbTree {
    /// Returns a new empty tree.
    pub const fn new() -> RbTree {
        RbTree { root: NIL, len: 0 }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the root node, or `None` if the tree is empty.
    pub fn root(&self) -> Option<&Node> {
        self.root.map(|root| unsafe { root.as_ref() })
    }

    // Navigation =============================================================

    /// Returns a node holding `key`, or `None` if no such node exists.
    ///
    /// If the tree holds several nodes with this key, the one closest to the root is returned.
    pub fn search(&self, key: Key) -> Option<&Node> {
        self.search_raw(key).map(|node| unsafe { node.as_ref() })
    }

    /// Like [`search`](Self::search), but only looks in the subtree rooted at `start`.
    pub fn search_from<'a>(&'a self, start: &'a Node, key: Key) -> Option<&'a Node> {
        self.search_below(Some(NonNull::from(start)), key)
            .map(|node| unsafe { node.as_ref() })
    }

    /// Returns a pointer to a node holding `key`, suitable for passing to
    /// [`delete`](Self::delete).
    pub fn search_raw(&self, key: Key) -> Option<NonNull<Node>> {
        self.search_below(self.root, key)
    }

    fn search_below(&self, mut opt_cur: Link, key: Key) -> Link {
        loop {
            let cur = opt_cur?;
            let cur_key = unsafe { cur.as_ref().key };

            if key == cur_key {
                return Some(cur);
            }

            let dir = if key < cur_key { Dir::Left } else { Dir::Right };
            opt_cur = unsafe { self.links(cur).child(dir) };
        }
    }

    /// Returns `true` if the tree contains at least one node holding `key`.
    pub fn contains(&self, key: Key) -> bool {
        self.search_raw(key).is_some()
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<&Node> {
        self.first_raw().map(|node| unsafe { node.as_ref() })
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<&Node> {
        self.last_raw().map(|node| unsafe { node.as_ref() })
    }

    /// Returns the minimum element of the subtree rooted at `start`.
    pub fn minimum<'a>(&'a self, start: &'a Node) -> &'a Node {
        unsafe { self.extreme_raw(NonNull::from(start), Dir::Left).as_ref() }
    }

    /// Returns the maximum element of the subtree rooted at `start`.
    pub fn maximum<'a>(&'a self, start: &'a Node) -> &'a Node {
        unsafe { self.extreme_raw(NonNull::from(start), Dir::Right).as_ref() }
    }

    /// Returns the next element in ascending order after `node`, or `None` if `node` is the
    /// maximum.
    pub fn successor<'a>(&'a self, node: &'a Node) -> Option<&'a Node> {
        unsafe {
            self.successor_raw(NonNull::from(node))
                .map(|next| next.as_ref())
        }
    }

    /// Returns the previous element in ascending order before `node`, or `None` if `node` is
    /// the minimum.
    pub fn predecessor<'a>(&'a self, node: &'a Node) -> Option<&'a Node> {
        unsafe {
            self.predecessor_raw(NonNull::from(node))
                .map(|prev| prev.as_ref())
        }
    }

    fn first_raw(&self) -> Link {
        self.root
            .map(|root| unsafe { self.extreme_raw(root, Dir::Left) })
    }

    fn last_raw(&self) -> Link {
        self.root
            .map(|root| unsafe { self.extreme_raw(root, Dir::Right) })
    }

    // Follows `dir` links from `node` until they run out.
    #[inline]
    unsafe fn extreme_raw(&self, node: NonNull<Node>, dir: Dir) -> NonNull<Node> {
        let mut cur = node;

        while let Some(next) = unsafe { self.links(cur).child(dir) } {
            cur = next;
        }

        cur
    }

    // Returns the in-order neighbor of `node` in direction `dir`.
    //
    // `Dir::Right` gives the successor and `Dir::Left` the predecessor.
    unsafe fn neighbor_raw(&self, node: NonNull<Node>, dir: Dir) -> Link {
        unsafe {
            if let Some(child) = self.links(node).child(dir) {
                return Some(self.extreme_raw(child, !dir));
            }

            // Climb until `cur` is a `!dir` child; its parent is the neighbor.
            let mut cur = node;
            let mut opt_parent = self.links(cur).parent();

            while let Some(parent) = opt_parent {
                if self.links(parent).child(dir) != Some(cur) {
                    break;
                }

                cur = parent;
                opt_parent = self.links(cur).parent();
            }

            opt_parent
        }
    }

    #[inline]
    unsafe fn successor_raw(&self, node: NonNull<Node>) -> Link {
        unsafe { self.neighbor_raw(node, Dir::Right) }
    }

    #[inline]
    unsafe fn predecessor_raw(&self, node: NonNull<Node>) -> Link {
        unsafe { self.neighbor_raw(node, Dir::Left) }
    }

    // Rotations ==============================================================

    // Moves `node` down in direction `dir` and lifts its `!dir` child into its place.
    //
    // `Dir::Left` is a left rotation and `Dir::Right` a right rotation. Colors are not changed.
    //
    // Panics if `node` has no `!dir` child.
    unsafe fn rotate(&mut self, node: NonNull<Node>, dir: Dir) {
        unsafe {
            let up = self
                .links(node)
                .child(!dir)
                .expect("rotation requires a child on the side being lifted");

            trace!("rotate {:?} at {}", dir, node.as_ref().key);

            // `across` moves from the `dir` side of `up` to the `!dir` side of `node`.
            let across = self.links(up).child(dir);
            self.links_mut(node).set_child(!dir, across);
            if let Some(across) = across {
                self.links_mut(across).set_parent(Some(node));
            }

            let parent = self.links_mut(node).set_parent(Some(up));
            self.links_mut(up).set_parent(parent);
            self.replace_child_or_set_root(parent, node, Some(up));

            self.links_mut(up).set_child(dir, Some(node));
        }
    }

    // Replaces the child pointer of `parent` that points at `old_child` with `new_child`, or
    // makes `new_child` the root if `parent` is nil.
    //
    // `new_child`'s parent pointer is not updated.
    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link,
        old_child: NonNull<Node>,
        new_child: Link,
    ) {
        match parent {
            Some(parent) => unsafe {
                let dir = self.which_child(parent, old_child);
                self.links_mut(parent).set_child(dir, new_child);
            },
            None => self.root = new_child,
        }
    }

    // Insertion ==============================================================

    /// Inserts `key` into the tree.
    ///
    /// Returns a pointer to the new node, which stays valid until the node is removed.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, key: Key) -> NonNull<Node> {
        self.insert_node(Node::new(key))
    }

    /// Links a boxed node into the tree, taking ownership of it.
    ///
    /// Any color or link state left on `node` is discarded. This makes it possible to reinsert
    /// a node returned by [`delete`](Self::delete).
    pub fn insert_node(&mut self, node: Box<Node>) -> NonNull<Node> {
        let ptr = Node::into_ptr(node);

        unsafe {
            let key = ptr.as_ref().key;
            self.links_mut(ptr).clear();

            // Descend the tree, looking for a nil link to replace. Ties go right.
            let mut parent = NIL;
            let mut dir = Dir::Left;
            let mut opt_cur = self.root;

            while let Some(cur) = opt_cur {
                parent = Some(cur);
                dir = if key < cur.as_ref().key {
                    Dir::Left
                } else {
                    Dir::Right
                };
                opt_cur = self.links(cur).child(dir);
            }

            self.links_mut(ptr).set_parent(parent);
            match parent {
                Some(parent) => {
                    self.links_mut(parent).set_child(dir, Some(ptr));
                }
                None => self.root = Some(ptr),
            }

            self.len += 1;
            self.rebalance_inserted(ptr);
        }

        ptr
    }

    // Restores the invariants after the insertion of the red node `node`.
    //
    // Loop invariant: `z` is red. The only invariant that may be broken is (3), and only
    // between `z` and `p(z)`.
    unsafe fn rebalance_inserted(&mut self, node: NonNull<Node>) {
        let mut z = node;

        unsafe {
            loop {
                let mut parent = match self.links(z).parent() {
                    Some(parent) if self.color(parent) == Color::Red => parent,
                    _ => break,
                };

                let grandparent = self
                    .links(parent)
                    .parent()
                    .expect("a red node is never the root");

                let side = self.which_child(grandparent, parent);
                let uncle = self.links(grandparent).child(!side);

                if let Some(uncle) = uncle.filter(|&u| self.color(u) == Color::Red) {
                    // Case A: push the grandparent's blackness down and continue from there.
                    trace!("insert fixup: red uncle {}", uncle.as_ref().key);
                    self.set_color(parent, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(grandparent, Color::Red);
                    z = grandparent;
                    continue;
                }

                if self.which_child(parent, z) == !side {
                    // Case B: `z` is an inner child. Rotate it to the outside.
                    trace!("insert fixup: inner child {}", z.as_ref().key);
                    z = parent;
                    self.rotate(z, side);
                    parent = self.links(z).parent().expect("rotated node has a parent");
                }

                // Case C: `z` is an outer child. One rotation at the grandparent finishes.
                trace!("insert fixup: outer child {}", z.as_ref().key);
                self.set_color(parent, Color::Black);
                self.set_color(grandparent, Color::Red);
                self.rotate(grandparent, !side);
            }

            if let Some(root) = self.root {
                self.set_color(root, Color::Black);
            }
        }
    }

    // Removal ================================================================

    /// Removes `node` from the tree and returns the node that was physically detached.
    ///
    /// If `node` has two children, its in-order successor is unlinked instead, and the two
    /// nodes swap keys. `node` stays in the tree holding the successor's key. The returned node
    /// always holds the removed key, but it is not always `node`. The keys are swapped rather
    /// than copied, so the detached node never ends up holding the successor's key.
    ///
    /// This operation completes in _O(log(n))_ time.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `node` points to a live node. The pointer must come from
    /// [`insert`](Self::insert), [`insert_node`](Self::insert_node) or
    /// [`search_raw`](Self::search_raw).
    ///
    /// # Panics
    ///
    /// Panics if `node` is not an element of `self`.
    pub unsafe fn delete(&mut self, node: NonNull<Node>) -> Box<Node> {
        assert!(
            unsafe { self.owns(node) },
            "node does not belong to this tree"
        );

        unsafe {
            let spliced = match (self.links(node).left(), self.links(node).right()) {
                (Some(_), Some(right)) => self.extreme_raw(right, Dir::Left),
                _ => node,
            };

            // `spliced` has at most one child; elevate it.
            let child = self.links(spliced).left().or(self.links(spliced).right());
            let parent = self.links(spliced).parent();

            if let Some(child) = child {
                self.links_mut(child).set_parent(parent);
            }
            self.replace_child_or_set_root(parent, spliced, child);

            if spliced != node {
                mem::swap(&mut (*node.as_ptr()).key, &mut (*spliced.as_ptr()).key);
            }

            if self.color(spliced) == Color::Black {
                self.rebalance_removed(child, parent);
            }

            self.links_mut(spliced).clear();
            self.len -= 1;

            Node::from_ptr(spliced)
        }
    }

    // Restores the invariants after a black node was spliced out above `x`.
    //
    // The nil position `x` is located by `parent`, since the sentinel carries no parent link.
    //
    // Loop invariant: the subtree at `x` is one black short of its sibling's.
    unsafe fn rebalance_removed(&mut self, mut x: Link, mut parent: Link) {
        unsafe {
            while x != self.root && color_of(x) == Color::Black {
                let p = parent.expect("a non-root position has a parent");
                let side = if self.links(p).left() == x {
                    Dir::Left
                } else {
                    Dir::Right
                };

                let mut sibling = self
                    .links(p)
                    .child(!side)
                    .expect("a doubly black position has a sibling");

                if self.color(sibling) == Color::Red {
                    // Case 1: make the sibling black by rotating it above the parent.
                    trace!("delete fixup: red sibling {}", sibling.as_ref().key);
                    self.set_color(sibling, Color::Black);
                    self.set_color(p, Color::Red);
                    self.rotate(p, side);
                    sibling = self
                        .links(p)
                        .child(!side)
                        .expect("a doubly black position has a sibling");
                }

                let near = self.links(sibling).child(side);
                let far = self.links(sibling).child(!side);

                if color_of(near) == Color::Black && color_of(far) == Color::Black {
                    // Case 2: move the deficiency up to the parent.
                    trace!("delete fixup: black nephews under {}", sibling.as_ref().key);
                    self.set_color(sibling, Color::Red);
                    x = Some(p);
                    parent = self.links(p).parent();
                    continue;
                }

                if color_of(far) == Color::Black {
                    // Case 3: only the near nephew is red. Rotate it into the far position.
                    let near = near.expect("a red nephew is not nil");
                    trace!("delete fixup: red near nephew {}", near.as_ref().key);
                    self.set_color(near, Color::Black);
                    self.set_color(sibling, Color::Red);
                    self.rotate(sibling, !side);
                    sibling = self
                        .links(p)
                        .child(!side)
                        .expect("a doubly black position has a sibling");
                }

                // Case 4: the far nephew is red. One rotation at the parent finishes.
                trace!("delete fixup: red far nephew under {}", sibling.as_ref().key);
                let parent_color = self.color(p);
                self.set_color(sibling, parent_color);
                self.set_color(p, Color::Black);
                let far = self
                    .links(sibling)
                    .child(!side)
                    .expect("a red nephew is not nil");
                self.set_color(far, Color::Black);
                self.rotate(p, side);

                x = self.root;
                parent = NIL;
            }

            if let Some(x) = x {
                self.set_color(x, Color::Black);
            }
        }
    }

    /// Removes a node holding `key` from the tree.
    ///
    /// Returns `None` if no node holds `key`.
    pub fn remove(&mut self, key: Key) -> Option<Box<Node>> {
        let node = self.search_raw(key)?;
        Some(unsafe { self.delete(node) })
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<Box<Node>> {
        let first = self.first_raw()?;
        Some(unsafe { self.delete(first) })
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<Box<Node>> {
        let last = self.last_raw()?;
        Some(unsafe { self.delete(last) })
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        if self.len > 0 {
            debug!("clearing red-black tree of {} nodes", self.len);
        }

        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let cur = self.extreme_raw(cur, Dir::Left);
                let parent = self.links(cur).parent();
                let right = self.links(cur).right();

                // Elevate the node's right child (which may be nil).
                self.replace_child_or_set_root(parent, cur, right);
                if let Some(right) = right {
                    self.links_mut(right).set_parent(parent);
                }

                // Drop the node.
                drop(Node::from_ptr(cur));
                self.len -= 1;

                // If the node had no right child, climb to the parent. If the node had no
                // parent, the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    // Structural queries =====================================================

    /// Returns the black-height of the root: the number of black nodes on any path from the
    /// root down to a nil link, counting the nil link but not the root.
    ///
    /// Returns 0 for an empty tree.
    pub fn black_height(&self) -> usize {
        self.root
            .map(|root| unsafe { self.count_blacks_below(root) })
            .unwrap_or(0)
    }

    /// Returns the black-height of `node`, measured the same way as
    /// [`black_height`](Self::black_height).
    pub fn black_height_of(&self, node: &Node) -> usize {
        unsafe { self.count_blacks_below(NonNull::from(node)) }
    }

    // Any path gives the same count by invariant (4); this follows the left spine.
    unsafe fn count_blacks_below(&self, node: NonNull<Node>) -> usize {
        let mut count = 1;
        let mut opt_cur = unsafe { self.links(node).left() };

        while let Some(cur) = opt_cur {
            if unsafe { self.color(cur) } == Color::Black {
                count += 1;
            }
            opt_cur = unsafe { self.links(cur).left() };
        }

        count
    }

    /// Returns the number of nodes on the longest path from the root down to a nil link.
    ///
    /// Returns 0 for an empty tree.
    pub fn depth(&self) -> usize {
        unsafe { self.depth_below(self.root) }
    }

    unsafe fn depth_below(&self, link: Link) -> usize {
        match link {
            None => 0,
            Some(node) => unsafe {
                let left = self.depth_below(self.links(node).left());
                let right = self.depth_below(self.links(node).right());
                1 + left.max(right)
            },
        }
    }

    /// Returns the maximum key among nodes of the given color.
    ///
    /// Returns `None` if the tree is empty or holds no node of that color.
    pub fn max_key_by_color(&self, color: Color) -> Option<Key> {
        self.iter()
            .rev()
            .find(|node| node.color() == color)
            .map(Node::key)
    }

    // Traversal ==============================================================

    /// Returns an iterator over the elements of the tree in ascending key order.
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self)
    }

    /// Returns an iterator over the `(key, color)` pairs of the tree in ascending key order.
    pub fn colored_keys(&self) -> ColoredKeys<'_> {
        ColoredKeys::new(self.iter())
    }

    /// Returns a cursor pointing to the first element of the tree.
    pub fn cursor_first(&self) -> Cursor<'_> {
        Cursor::new(self, Dir::Left)
    }

    /// Returns a cursor pointing to the last element of the tree.
    pub fn cursor_last(&self) -> Cursor<'_> {
        Cursor::new(self, Dir::Right)
    }

    /// Returns a mutable cursor pointing to the first element of the tree.
    pub fn cursor_first_mut(&mut self) -> CursorMut<'_> {
        CursorMut::new(self, Dir::Left)
    }

    /// Returns a mutable cursor pointing to the last element of the tree.
    pub fn cursor_last_mut(&mut self) -> CursorMut<'_> {
        CursorMut::new(self, Dir::Right)
    }

    // Support methods ========================================================

    #[inline]
    unsafe fn links<'a>(&self, node: NonNull<Node>) -> &'a Links {
        unsafe { Node::links(node).as_ref() }
    }

    #[inline]
    unsafe fn links_mut<'a>(&mut self, node: NonNull<Node>) -> &'a mut Links {
        unsafe { Node::links(node).as_mut() }
    }

    #[inline]
    unsafe fn color(&self, node: NonNull<Node>) -> Color {
        unsafe { self.links(node).color() }
    }

    #[inline]
    unsafe fn set_color(&mut self, node: NonNull<Node>, color: Color) {
        unsafe { self.links_mut(node).set_color(color) };
    }

    unsafe fn which_child(&self, parent: NonNull<Node>, child: NonNull<Node>) -> Dir {
        unsafe {
            if self.links(parent).left() == Some(child) {
                Dir::Left
            } else {
                debug_assert_eq!(
                    self.links(parent).right(),
                    Some(child),
                    "`child` must be a child of `parent`"
                );
                Dir::Right
            }
        }
    }

    unsafe fn has_two_children(&self, node: NonNull<Node>) -> bool {
        unsafe {
            let links = self.links(node);
            links.left().is_some() && links.right().is_some()
        }
    }

    // Returns `true` if climbing from `node` ends at this tree's root.
    unsafe fn owns(&self, node: NonNull<Node>) -> bool {
        let mut cur = node;

        while let Some(parent) = unsafe { self.links(cur).parent() } {
            cur = parent;
        }

        self.root == Some(cur)
    }
}

impl Default for RbTree {
    fn default() -> Self {
        RbTree::new()
    }
}

impl Drop for RbTree {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for RbTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl Extend<Key> for RbTree {
    fn extend<I: IntoIterator<Item = Key>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl FromIterator<Key> for RbTree {
    fn from_iter<I: IntoIterator<Item = Key>>(iter: I) -> Self {
        let mut tree = RbTree::new();
        tree.extend(iter);
        tree
    }
}

impl<'tree> IntoIterator for &'tree RbTree {
    type Item = &'tree Node;
    type IntoIter = Iter<'tree>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Node {
    /// Returns a new unlinked red node holding `key`.
    pub fn new(key: Key) -> Box<Node> {
        Box::new(Node {
            links: Links::new(),
            key,
        })
    }

    /// Returns the key held by this node.
    #[inline]
    pub fn key(&self) -> Key {
        self.key
    }

    /// Returns the color of this node.
    #[inline]
    pub fn color(&self) -> Color {
        self.links.color()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("key", &self.key)
            .field("color", &self.color())
            .finish()
    }
}

unsafe impl Linked<Links> for Node {
    type Handle = Box<Node>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::from(Box::leak(r))
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl Links {
    /// Returns links for an unlinked red node.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: NIL,
                children: [NIL; 2],
                color: Color::Red,
                _unpin: PhantomPinned,
            }),
        }
    }

    #[inline]
    fn color(&self) -> Color {
        unsafe { (*self.inner.get()).color }
    }

    #[inline]
    fn parent(&self) -> Link {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link) -> Link {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link) -> Link {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_color(&mut self, color: Color) {
        self.inner.get_mut().color = color;
    }

    // Resets the links to those of a fresh, unlinked red node.
    #[inline]
    fn clear(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = NIL;
        inner.children = [NIL; 2];
        inner.color = Color::Red;
    }
}

impl Default for Links {
    fn default() -> Self {
        Links::new()
    }
}
