use core::ptr::NonNull;

use thiserror::Error;

use crate::{Color, Dir, Key, Node, RbTree};

/// A broken red-black tree invariant, as reported by [`RbTree::check_invariants`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("root node {key} is red")]
    RedRoot { key: Key },

    #[error("root node {key} has a parent link")]
    RootHasParent { key: Key },

    #[error("red node {parent} has red child {child}")]
    DoubleRed { parent: Key, child: Key },

    #[error("node {key} has black-height {left} on its left and {right} on its right")]
    BlackHeightMismatch { key: Key, left: usize, right: usize },

    #[error("node {key} is out of order relative to ancestor {ancestor}")]
    OrderViolation { key: Key, ancestor: Key },

    #[error("child {child} of node {parent} does not link back to it")]
    BrokenParentLink { parent: Key, child: Key },

    #[error("tree records a length of {expected} but holds {actual} nodes")]
    LenMismatch { expected: usize, actual: usize },
}

// Keys of the nearest ancestors bounding a subtree from below and above.
#[derive(Copy, Clone)]
struct Bounds {
    low: Option<Key>,
    high: Option<Key>,
}

impl RbTree {
    /// Checks every red-black invariant, along with parent links and the recorded length.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let Some(root) = self.root else {
            return match self.len {
                0 => Ok(()),
                expected => Err(InvariantViolation::LenMismatch {
                    expected,
                    actual: 0,
                }),
            };
        };

        let mut actual = 0;

        unsafe {
            let key = root.as_ref().key;

            if self.links(root).parent().is_some() {
                return Err(InvariantViolation::RootHasParent { key });
            }

            if self.color(root) == Color::Red {
                return Err(InvariantViolation::RedRoot { key });
            }

            let bounds = Bounds {
                low: None,
                high: None,
            };
            self.check_subtree(root, bounds, &mut actual)?;
        }

        if actual != self.len {
            return Err(InvariantViolation::LenMismatch {
                expected: self.len,
                actual,
            });
        }

        Ok(())
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        if let Err(violation) = self.check_invariants() {
            panic!("red-black tree invariant violated: {violation}");
        }
    }

    // Checks the subtree rooted at `node` and returns its black count, which includes `node`
    // and the nil links below it.
    unsafe fn check_subtree(
        &self,
        node: NonNull<Node>,
        bounds: Bounds,
        count: &mut usize,
    ) -> Result<usize, InvariantViolation> {
        *count += 1;

        let key = unsafe { node.as_ref().key };
        let color = unsafe { self.color(node) };

        // Equal keys may sit on either side once rotations have moved them.
        if let Some(low) = bounds.low.filter(|&low| key < low) {
            return Err(InvariantViolation::OrderViolation { key, ancestor: low });
        }
        if let Some(high) = bounds.high.filter(|&high| key > high) {
            return Err(InvariantViolation::OrderViolation {
                key,
                ancestor: high,
            });
        }

        let mut heights = [1; 2];

        for dir in [Dir::Left, Dir::Right] {
            let Some(child) = (unsafe { self.links(node).child(dir) }) else {
                continue;
            };

            let child_key = unsafe { child.as_ref().key };

            if unsafe { self.links(child).parent() } != Some(node) {
                return Err(InvariantViolation::BrokenParentLink {
                    parent: key,
                    child: child_key,
                });
            }

            if color == Color::Red && unsafe { self.color(child) } == Color::Red {
                return Err(InvariantViolation::DoubleRed {
                    parent: key,
                    child: child_key,
                });
            }

            let child_bounds = match dir {
                Dir::Left => Bounds {
                    high: Some(key),
                    ..bounds
                },
                Dir::Right => Bounds {
                    low: Some(key),
                    ..bounds
                },
            };

            heights[dir as usize] = unsafe { self.check_subtree(child, child_bounds, count)? };
        }

        let [left, right] = heights;
        if left != right {
            return Err(InvariantViolation::BlackHeightMismatch { key, left, right });
        }

        Ok(left + usize::from(color == Color::Black))
    }
}
