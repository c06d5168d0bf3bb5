//! Depth-first tree enumeration.
//!
//! [`enumerate`] visits a node, then each populated fixed argument in
//! ascending slot order, then each entry of the variable-argument list in
//! forward order, recursing into every child before moving to the next. The
//! callback decides after each visit whether the walk goes on; returning
//! `false` anywhere unwinds the whole walk and makes the outermost call
//! return `false`.
//!
//! The order is the AML byte-stream order, so serialisers and fix-up passes
//! can rely on it.
//!
//! # Caller obligations
//!
//! The tree is borrowed shared for the whole walk and cannot change shape.
//! Walking the same tree from several threads is sound as long as each
//! callback only reads shared state; contexts are owned by their caller.
//!
//! Recursion depth equals tree depth. Callers on small stacks should pick
//! [`Strategy::WorkList`] or bound the depth with [`EnumConfig::max_depth`].

use alloc::vec::Vec;

use log::{trace, warn};

use crate::AmlTree;
use crate::error::{AmlError, EnumStatus};
use crate::node::{ListLink, NodeHandle};

/// Enumeration callback as a plain function pointer.
///
/// Handy to name the callback type when passing `None`.
pub type EnumCallback<C> = fn(&AmlTree, NodeHandle, &mut C, Option<&mut EnumStatus>) -> bool;

/// How the enumerator keeps track of pending children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Native recursion, one stack frame per tree level.
    #[default]
    Recursive,
    /// An explicit heap-allocated stack of frames.
    WorkList,
}

/// Enumeration settings.
///
/// The default is recursive and unbounded, which is what [`enumerate`] uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnumConfig {
    /// Traversal strategy. Both visit nodes in the same order.
    pub strategy: Strategy,
    /// Deepest level that may be visited, the start node being level 0.
    ///
    /// Reaching a deeper node stores [`AmlError::DepthLimitExceeded`] in the
    /// status slot and stops the walk.
    pub max_depth: Option<usize>,
}

/// Enumerates the subtree under `node`, calling `callback` once per node in
/// pre-order.
///
/// Returns `true` if every callback returned `true`, `false` if one of
/// them stopped the walk or a precondition failed.
///
/// If `node` fails [`AmlTree::is_valid`] or `callback` is `None`, the
/// callback is never invoked, `status` (if given) receives
/// [`AmlError::InvalidParameter`] and `false` is returned. The same applies
/// to any child reached through a broken link. The enumerator writes
/// `status` in no other case; it belongs to the callback otherwise.
///
/// Empty fixed-argument slots hold nothing to visit and are skipped.
pub fn enumerate<C, F>(
    tree: &AmlTree,
    node: Option<NodeHandle>,
    callback: Option<&mut F>,
    context: &mut C,
    status: Option<&mut EnumStatus>,
) -> bool
where
    F: FnMut(&AmlTree, NodeHandle, &mut C, Option<&mut EnumStatus>) -> bool,
{
    enumerate_with(&EnumConfig::default(), tree, node, callback, context, status)
}

/// [`enumerate`] with explicit settings.
pub fn enumerate_with<C, F>(
    config: &EnumConfig,
    tree: &AmlTree,
    node: Option<NodeHandle>,
    callback: Option<&mut F>,
    context: &mut C,
    status: Option<&mut EnumStatus>,
) -> bool
where
    F: FnMut(&AmlTree, NodeHandle, &mut C, Option<&mut EnumStatus>) -> bool,
{
    let Some(callback) = callback else {
        warn!("aml: enumerate called without a callback");
        return reject(status, AmlError::InvalidParameter);
    };
    let mut walk = Walk {
        tree,
        callback,
        context,
        status,
        max_depth: config.max_depth,
    };
    match config.strategy {
        Strategy::Recursive => walk.recurse(node, 0),
        Strategy::WorkList => walk.iterate(node),
    }
}

fn reject(status: Option<&mut EnumStatus>, error: AmlError) -> bool {
    if let Some(status) = status {
        *status = Err(error);
    }
    false
}

/// State shared by every level of one enumeration.
struct Walk<'t, 'f, 'c, 's, C, F> {
    tree: &'t AmlTree,
    callback: &'f mut F,
    context: &'c mut C,
    status: Option<&'s mut EnumStatus>,
    max_depth: Option<usize>,
}

/// Progress through a node's list in the work-list walker.
#[derive(Debug, Clone, Copy)]
enum ListCursor {
    /// The list has not been entered yet.
    Pending,
    /// The next position to visit, `None` if the previous entry had no
    /// forward link.
    At(Option<ListLink>),
    Done,
}

/// One pending node in the work-list walker.
#[derive(Debug, Clone, Copy)]
struct Frame {
    node: NodeHandle,
    depth: usize,
    next_fixed: usize,
    cursor: ListCursor,
}

/// What a frame yields next.
enum Step {
    Child(NodeHandle),
    Exhausted,
    Broken,
}

impl<C, F> Walk<'_, '_, '_, '_, C, F>
where
    F: FnMut(&AmlTree, NodeHandle, &mut C, Option<&mut EnumStatus>) -> bool,
{
    /// Checks entry preconditions for `node` and runs the callback on it.
    fn visit(&mut self, node: Option<NodeHandle>, depth: usize) -> Option<NodeHandle> {
        let Some(node) = node.filter(|&n| self.tree.is_valid(Some(n))) else {
            warn!("aml: refusing to enumerate invalid node {node:?}");
            reject(self.status.as_deref_mut(), AmlError::InvalidParameter);
            return None;
        };
        if self.max_depth.is_some_and(|max| depth > max) {
            warn!("aml: {node:?} at depth {depth} exceeds the enumeration limit");
            reject(self.status.as_deref_mut(), AmlError::DepthLimitExceeded);
            return None;
        }
        (self.callback)(self.tree, node, &mut *self.context, self.status.as_deref_mut()).then_some(node)
    }

    fn recurse(&mut self, node: Option<NodeHandle>, depth: usize) -> bool {
        let Some(node) = self.visit(node, depth) else {
            return false;
        };

        for index in 0..self.tree.fixed_argument_count(node) {
            if let Ok(Some(child)) = self.tree.fixed_argument(node, index) {
                if !self.recurse(Some(child), depth + 1) {
                    return false;
                }
            }
        }

        let Some(head) = self.tree.variable_argument_list_head(node) else {
            return true;
        };
        let mut cursor = self.tree.next_link(head);
        loop {
            match cursor {
                Some(link) if link == head => return true,
                Some(ListLink::Node(entry)) => {
                    if !self.recurse(Some(entry), depth + 1) {
                        return false;
                    }
                    cursor = self.tree.next_link(ListLink::Node(entry));
                }
                // A link into another list or to nowhere.
                _ => return self.recurse(None, depth + 1),
            }
        }
    }

    fn iterate(&mut self, node: Option<NodeHandle>) -> bool {
        let Some(node) = self.visit(node, 0) else {
            return false;
        };
        let mut stack = Vec::new();
        stack.push(Frame::new(node, 0));

        while let Some(frame) = stack.last_mut() {
            let depth = frame.depth + 1;
            match frame.step(self.tree) {
                Step::Child(child) => {
                    trace!("aml: work-list descends into {child:?} at depth {depth}");
                    if self.visit(Some(child), depth).is_none() {
                        return false;
                    }
                    stack.push(Frame::new(child, depth));
                }
                Step::Exhausted => {
                    stack.pop();
                }
                Step::Broken => return self.visit(None, depth).is_some(),
            }
        }
        true
    }
}

impl Frame {
    const fn new(node: NodeHandle, depth: usize) -> Self {
        Self {
            node,
            depth,
            next_fixed: 0,
            cursor: ListCursor::Pending,
        }
    }

    /// Advances to the next child of this frame's node.
    fn step(&mut self, tree: &AmlTree) -> Step {
        while self.next_fixed < tree.fixed_argument_count(self.node) {
            let index = self.next_fixed;
            self.next_fixed += 1;
            if let Ok(Some(child)) = tree.fixed_argument(self.node, index) {
                return Step::Child(child);
            }
        }

        let Some(head) = tree.variable_argument_list_head(self.node) else {
            return Step::Exhausted;
        };
        let position = match self.cursor {
            ListCursor::Pending => tree.next_link(head),
            ListCursor::At(link) => link,
            ListCursor::Done => return Step::Exhausted,
        };
        match position {
            Some(link) if link == head => {
                self.cursor = ListCursor::Done;
                Step::Exhausted
            }
            Some(ListLink::Node(entry)) => {
                // The tree is frozen during the walk, so stepping past the
                // entry before descending into it is safe.
                self.cursor = ListCursor::At(tree.next_link(ListLink::Node(entry)));
                Step::Child(entry)
            }
            _ => Step::Broken,
        }
    }
}
