//! Variable-argument lists.
//!
//! Each list is circular and doubly linked through a sentinel that lives in
//! the owning node. An empty list is a sentinel pointing at itself. Walks
//! compare against the sentinel to find the end, which keeps insertion and
//! removal O(1) with no head or tail special cases.

use log::debug;

use crate::AmlTree;
use crate::error::AmlError;
use crate::node::{Links, ListLink, NodeHandle};

impl AmlTree {
    /// Returns the sentinel of `node`'s variable-argument list, or `None` if
    /// the node's kind has no list or the handle is invalid.
    #[must_use]
    pub fn variable_argument_list_head(&self, node: NodeHandle) -> Option<ListLink> {
        self.get(node)?.var_list().map(|_| ListLink::Sentinel(node))
    }

    fn links(&self, link: ListLink) -> Option<Links> {
        match link {
            ListLink::Sentinel(owner) => self.get(owner)?.var_list().copied(),
            ListLink::Node(entry) => self.get(entry)?.links,
        }
    }

    fn links_mut(&mut self, link: ListLink) -> Option<&mut Links> {
        match link {
            ListLink::Sentinel(owner) => self.get_mut(owner)?.var_list_mut(),
            ListLink::Node(entry) => self.get_mut(entry)?.links.as_mut(),
        }
    }

    /// Follows the forward link of a sentinel or list entry.
    ///
    /// Returns `None` if `link` does not name a live sentinel or a node that
    /// is currently a list entry.
    #[must_use]
    pub fn next_link(&self, link: ListLink) -> Option<ListLink> {
        self.links(link).map(|links| links.fwd)
    }

    /// Follows the backward link of a sentinel or list entry.
    #[must_use]
    pub fn previous_link(&self, link: ListLink) -> Option<ListLink> {
        self.links(link).map(|links| links.back)
    }

    /// Returns the entry after `node` in its parent's list.
    #[must_use]
    pub fn next_sibling(&self, node: NodeHandle) -> Option<NodeHandle> {
        match self.next_link(ListLink::Node(node))? {
            ListLink::Node(next) => Some(next),
            ListLink::Sentinel(_) => None,
        }
    }

    /// Returns the entry before `node` in its parent's list.
    #[must_use]
    pub fn previous_sibling(&self, node: NodeHandle) -> Option<NodeHandle> {
        match self.previous_link(ListLink::Node(node))? {
            ListLink::Node(previous) => Some(previous),
            ListLink::Sentinel(_) => None,
        }
    }

    /// Returns the entries of `node`'s list, front to back.
    ///
    /// The iterator is empty for nodes without a list.
    #[must_use]
    pub fn var_args(&self, node: NodeHandle) -> VarArgs<'_> {
        VarArgs::new(self, node)
    }

    /// Returns the `index`-th entry of `node`'s list.
    #[must_use]
    pub fn variable_argument(&self, node: NodeHandle, index: usize) -> Option<NodeHandle> {
        self.var_args(node).nth(index)
    }

    /// Returns the number of entries in `node`'s list.
    #[must_use]
    pub fn var_list_len(&self, node: NodeHandle) -> usize {
        self.var_args(node).count()
    }

    /// Links detached `child` between two adjacent positions of `owner`'s list.
    fn link_between(
        &mut self,
        owner: NodeHandle,
        back: ListLink,
        fwd: ListLink,
        child: NodeHandle,
    ) -> Result<(), AmlError> {
        self.check_attachable(owner, child)?;
        self.splice(owner, back, fwd, child)
    }

    /// Links `child` between `back` and `fwd` in `owner`'s list without
    /// checking that `child` is detached or outside `owner`'s ancestry.
    pub(crate) fn splice(
        &mut self,
        owner: NodeHandle,
        back: ListLink,
        fwd: ListLink,
        child: NodeHandle,
    ) -> Result<(), AmlError> {
        // Resolve both neighbours before touching anything.
        if self.links(back).is_none() || self.links(fwd).is_none() {
            return Err(AmlError::CorruptTree);
        }
        if let Some(links) = self.links_mut(back) {
            links.fwd = ListLink::Node(child);
        }
        if let Some(links) = self.links_mut(fwd) {
            links.back = ListLink::Node(child);
        }
        let node = self.get_mut(child).ok_or(AmlError::InvalidParameter)?;
        node.links = Some(Links { fwd, back });
        node.parent = Some(owner);
        Ok(())
    }

    pub(crate) fn head_of(&self, owner: NodeHandle) -> Result<(ListLink, Links), AmlError> {
        if !self.is_valid(Some(owner)) {
            return Err(AmlError::InvalidParameter);
        }
        let head = self
            .variable_argument_list_head(owner)
            .ok_or(AmlError::NoVariableList)?;
        let links = self.links(head).ok_or(AmlError::CorruptTree)?;
        Ok((head, links))
    }

    fn entry_of(&self, anchor: NodeHandle) -> Result<(NodeHandle, Links), AmlError> {
        let node = self.get(anchor).ok_or(AmlError::InvalidParameter)?;
        match (node.parent, node.links) {
            (Some(owner), Some(links)) => Ok((owner, links)),
            _ => Err(AmlError::NotFound),
        }
    }

    /// Appends detached `child` to the end of `parent`'s list.
    ///
    /// # Errors
    ///
    /// - [`AmlError::InvalidParameter`] for invalid handles, a root child, or
    ///   a child that is an ancestor of `parent`.
    /// - [`AmlError::NoVariableList`] if `parent` has no list.
    /// - [`AmlError::AlreadyAttached`] if `child` already has an owner.
    pub fn var_list_add_tail(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<(), AmlError> {
        let (head, links) = self.head_of(parent)?;
        self.link_between(parent, links.back, head, child)
    }

    /// Inserts detached `child` at the front of `parent`'s list.
    ///
    /// # Errors
    ///
    /// Same as [`var_list_add_tail`](Self::var_list_add_tail).
    pub fn var_list_add_head(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<(), AmlError> {
        let (head, links) = self.head_of(parent)?;
        self.link_between(parent, head, links.fwd, child)
    }

    /// Inserts detached `child` right after the list entry `anchor`.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::NotFound`] if `anchor` is not a list entry, or
    /// any error of [`var_list_add_tail`](Self::var_list_add_tail).
    pub fn var_list_insert_after(&mut self, anchor: NodeHandle, child: NodeHandle) -> Result<(), AmlError> {
        let (owner, links) = self.entry_of(anchor)?;
        self.link_between(owner, ListLink::Node(anchor), links.fwd, child)
    }

    /// Inserts detached `child` right before the list entry `anchor`.
    ///
    /// # Errors
    ///
    /// Same as [`var_list_insert_after`](Self::var_list_insert_after).
    pub fn var_list_insert_before(&mut self, anchor: NodeHandle, child: NodeHandle) -> Result<(), AmlError> {
        let (owner, links) = self.entry_of(anchor)?;
        self.link_between(owner, links.back, ListLink::Node(anchor), child)
    }

    /// Unlinks `child` from its parent's list. The child keeps its subtree.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidParameter`] for an invalid handle,
    /// [`AmlError::NotFound`] if `child` is not a list entry and
    /// [`AmlError::CorruptTree`] if a neighbour link is broken.
    pub fn var_list_remove(&mut self, child: NodeHandle) -> Result<(), AmlError> {
        let (owner, links) = self.entry_of(child)?;
        if self.links(links.back).is_none() || self.links(links.fwd).is_none() {
            debug!("aml: broken neighbour links around {child:?} in list of {owner:?}");
            return Err(AmlError::CorruptTree);
        }
        if let Some(back) = self.links_mut(links.back) {
            back.fwd = links.fwd;
        }
        if let Some(fwd) = self.links_mut(links.fwd) {
            fwd.back = links.back;
        }
        if let Some(node) = self.get_mut(child) {
            node.links = None;
            node.parent = None;
        }
        Ok(())
    }
}

/// Double-ended iterator over the entries of a variable-argument list.
///
/// Created by [`AmlTree::var_args`].
#[derive(Debug, Clone)]
pub struct VarArgs<'a> {
    tree: &'a AmlTree,
    front: ListLink,
    back: ListLink,
    done: bool,
}

impl<'a> VarArgs<'a> {
    fn new(tree: &'a AmlTree, owner: NodeHandle) -> Self {
        let sentinel = ListLink::Sentinel(owner);
        match tree.links(sentinel) {
            Some(links) => Self {
                tree,
                front: links.fwd,
                back: links.back,
                done: links.fwd == sentinel,
            },
            None => Self {
                tree,
                front: sentinel,
                back: sentinel,
                done: true,
            },
        }
    }
}

impl Iterator for VarArgs<'_> {
    type Item = NodeHandle;

    fn next(&mut self) -> Option<NodeHandle> {
        if self.done {
            return None;
        }
        let ListLink::Node(entry) = self.front else {
            self.done = true;
            return None;
        };
        if self.front == self.back {
            self.done = true;
        } else {
            match self.tree.next_link(self.front) {
                Some(next) => self.front = next,
                None => self.done = true,
            }
        }
        Some(entry)
    }
}

impl DoubleEndedIterator for VarArgs<'_> {
    fn next_back(&mut self) -> Option<NodeHandle> {
        if self.done {
            return None;
        }
        let ListLink::Node(entry) = self.back else {
            self.done = true;
            return None;
        };
        if self.front == self.back {
            self.done = true;
        } else {
            match self.tree.previous_link(self.back) {
                Some(previous) => self.back = previous,
                None => self.done = true,
            }
        }
        Some(entry)
    }
}
