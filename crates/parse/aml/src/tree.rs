//! Arena-backed AML object tree.
//!
//! [`AmlTree`] owns every node. Ownership runs strictly downward: a parent
//! owns the children in its fixed-argument slots and in its
//! variable-argument list. Parent references are plain [`NodeHandle`]s used
//! for navigation only, so no reference cycles exist.
//!
//! Nodes are created detached and become part of a tree once attached to a
//! slot or a list. A node is never owned through two paths at once.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use log::debug;

use crate::enumerate::{EnumConfig, Strategy, enumerate_with};
use crate::error::{AmlError, EnumStatus};
use crate::node::{DataType, Links, MAX_FIXED_ARGS, Node, NodeBody, NodeHandle, NodeKind, ObjectSpec};

/// One arena slot. The generation is bumped every time the slot is freed.
#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// An AML object tree.
///
/// The tree is read-only while it is enumerated: enumeration borrows it
/// shared, so a callback cannot reshape it mid-walk.
#[derive(Debug, Clone, Default)]
pub struct AmlTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl AmlTree {
    /// Creates an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Creates an empty arena with room for `capacity` nodes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Returns the number of live nodes, attached or not.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if the arena holds no live node.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    // ---- Allocation ---------------------------------------------------------

    fn alloc(&mut self, make: impl FnOnce(NodeHandle) -> NodeBody) -> Result<NodeHandle, AmlError> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len()).map_err(|_| AmlError::OutOfResources)?;
                self.slots.push(Slot {
                    generation: 0,
                    node: None,
                });
                index
            }
        };
        let slot = &mut self.slots[index as usize];
        let handle = NodeHandle::new(index, slot.generation);
        slot.node = Some(Node::new(make(handle)));
        self.live += 1;
        Ok(handle)
    }

    fn release(&mut self, handle: NodeHandle) {
        let Some(slot) = self.slots.get_mut(handle.index()) else {
            return;
        };
        if slot.generation == handle.generation() && slot.node.take().is_some() {
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(handle.raw_index());
            self.live -= 1;
        }
    }

    /// Creates a detached root node with an empty variable-argument list.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::OutOfResources`] if the arena is full.
    pub fn create_root(&mut self) -> Result<NodeHandle, AmlError> {
        self.alloc(|handle| NodeBody::Root {
            var_list: Links::empty(handle),
        })
    }

    /// Creates a detached object node with empty fixed-argument slots.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::OutOfResources`] if the arena is full.
    pub fn create_object(&mut self, spec: ObjectSpec) -> Result<NodeHandle, AmlError> {
        self.alloc(|handle| NodeBody::Object {
            spec,
            fixed: [None; MAX_FIXED_ARGS],
            var_list: spec.has_var_list().then(|| Links::empty(handle)),
        })
    }

    /// Creates a detached data node holding a copy of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::OutOfResources`] if the arena is full.
    pub fn create_data(&mut self, data_type: DataType, data: &[u8]) -> Result<NodeHandle, AmlError> {
        let buffer = data.to_vec();
        self.alloc(|_| NodeBody::Data { data_type, buffer })
    }

    // ---- Validity and header accessors -------------------------------------

    pub(crate) fn get(&self, handle: NodeHandle) -> Option<&Node> {
        let slot = self.slots.get(handle.index())?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.node.as_ref()
    }

    pub(crate) fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        let slot = self.slots.get_mut(handle.index())?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.node.as_mut()
    }

    /// Returns `true` if `node` designates a live node of this tree.
    ///
    /// Checks only the handle and the node's own header, never its children.
    /// `None` stands for a null reference and is never valid. A list entry's
    /// links are stored as a pair, so a live entry always has both.
    #[must_use]
    pub fn is_valid(&self, node: Option<NodeHandle>) -> bool {
        node.and_then(|handle| self.get(handle)).is_some()
    }

    /// Returns the kind of `node`, or `None` if the handle is invalid.
    #[must_use]
    pub fn kind(&self, node: NodeHandle) -> Option<NodeKind> {
        self.get(node).map(Node::kind)
    }

    /// Returns the opcode of an object node.
    #[must_use]
    pub fn opcode(&self, node: NodeHandle) -> Option<u32> {
        match self.get(node)?.body {
            NodeBody::Object { spec, .. } => Some(spec.opcode()),
            _ => None,
        }
    }

    /// Returns the shape of an object node.
    #[must_use]
    pub fn object_spec(&self, node: NodeHandle) -> Option<ObjectSpec> {
        match self.get(node)?.body {
            NodeBody::Object { spec, .. } => Some(spec),
            _ => None,
        }
    }

    /// Returns the data type of a data node.
    #[must_use]
    pub fn data_type(&self, node: NodeHandle) -> Option<DataType> {
        match self.get(node)?.body {
            NodeBody::Data { data_type, .. } => Some(data_type),
            _ => None,
        }
    }

    /// Returns the bytes held by a data node.
    #[must_use]
    pub fn data(&self, node: NodeHandle) -> Option<&[u8]> {
        match &self.get(node)?.body {
            NodeBody::Data { buffer, .. } => Some(buffer.as_slice()),
            _ => None,
        }
    }

    /// Replaces the bytes held by a data node.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidParameter`] if `node` is not a live data node.
    pub fn set_data(&mut self, node: NodeHandle, data: &[u8]) -> Result<(), AmlError> {
        match self.get_mut(node).map(|n| &mut n.body) {
            Some(NodeBody::Data { buffer, .. }) => {
                buffer.clear();
                buffer.extend_from_slice(data);
                Ok(())
            }
            _ => Err(AmlError::InvalidParameter),
        }
    }

    // ---- Navigation ---------------------------------------------------------

    /// Returns the node that owns `node`, if it is attached.
    #[must_use]
    pub fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.get(node)?.parent
    }

    /// Follows parent references up to the topmost ancestor of `node`.
    ///
    /// This is a root node for attached subtrees and the subtree top for
    /// detached ones.
    #[must_use]
    pub fn root_of(&self, node: NodeHandle) -> Option<NodeHandle> {
        let mut current = node;
        let mut node = self.get(current)?;
        while let Some(parent) = node.parent {
            current = parent;
            node = self.get(parent)?;
        }
        Some(current)
    }

    /// Returns the number of parent hops between `node` and its topmost
    /// ancestor.
    #[must_use]
    pub fn depth(&self, node: NodeHandle) -> Option<usize> {
        let mut depth = 0;
        let mut current = self.get(node)?;
        while let Some(parent) = current.parent {
            depth += 1;
            current = self.get(parent)?;
        }
        Some(depth)
    }

    /// Returns `true` if `ancestor` is `node` or one of its ancestors.
    fn is_ancestor_or_self(&self, ancestor: NodeHandle, node: NodeHandle) -> bool {
        let mut current = Some(node);
        while let Some(handle) = current {
            if handle == ancestor {
                return true;
            }
            current = self.parent(handle);
        }
        false
    }

    // ---- Fixed arguments ----------------------------------------------------

    /// Returns the number of fixed-argument slots of `node`.
    ///
    /// Zero for roots, data nodes and invalid handles.
    #[must_use]
    pub fn fixed_argument_count(&self, node: NodeHandle) -> usize {
        self.get(node).map_or(0, |n| n.fixed_slots().len())
    }

    /// Returns the child in fixed slot `index`, or `None` if the slot was
    /// never populated.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidParameter`] for an invalid handle and
    /// [`AmlError::IndexOutOfRange`] if `index` is not below
    /// [`fixed_argument_count`](Self::fixed_argument_count).
    pub fn fixed_argument(&self, node: NodeHandle, index: usize) -> Result<Option<NodeHandle>, AmlError> {
        let node = self.get(node).ok_or(AmlError::InvalidParameter)?;
        node.fixed_slots()
            .get(index)
            .copied()
            .ok_or(AmlError::IndexOutOfRange)
    }

    /// Checks that `child` may be given to `parent`.
    pub(crate) fn check_attachable(&self, parent: NodeHandle, child: NodeHandle) -> Result<(), AmlError> {
        if !self.is_valid(Some(parent)) {
            return Err(AmlError::InvalidParameter);
        }
        let node = self.get(child).ok_or(AmlError::InvalidParameter)?;
        if node.kind() == NodeKind::Root {
            return Err(AmlError::InvalidParameter);
        }
        if node.parent.is_some() || node.links.is_some() {
            return Err(AmlError::AlreadyAttached);
        }
        // Attaching a subtree below one of its own nodes would close a cycle.
        if self.is_ancestor_or_self(child, parent) {
            return Err(AmlError::InvalidParameter);
        }
        Ok(())
    }

    fn fixed_slot_mut(&mut self, parent: NodeHandle, index: usize) -> Result<&mut Option<NodeHandle>, AmlError> {
        let node = self.get_mut(parent).ok_or(AmlError::InvalidParameter)?;
        match &mut node.body {
            NodeBody::Object { spec, fixed, .. } if index < spec.fixed_args() => Ok(&mut fixed[index]),
            _ => Err(AmlError::IndexOutOfRange),
        }
    }

    /// Places the detached node `child` into fixed slot `index` of `parent`.
    ///
    /// # Errors
    ///
    /// - [`AmlError::InvalidParameter`] for invalid handles, a root child, or
    ///   a child that is an ancestor of `parent`.
    /// - [`AmlError::AlreadyAttached`] if `child` already has an owner.
    /// - [`AmlError::IndexOutOfRange`] if `parent` has no such slot.
    /// - [`AmlError::SlotOccupied`] if the slot is populated.
    pub fn set_fixed_argument(&mut self, parent: NodeHandle, index: usize, child: NodeHandle) -> Result<(), AmlError> {
        self.check_attachable(parent, child)?;
        let slot = self.fixed_slot_mut(parent, index)?;
        if slot.is_some() {
            return Err(AmlError::SlotOccupied);
        }
        *slot = Some(child);
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
        Ok(())
    }

    /// Swaps the content of fixed slot `index` of `parent` for `child` and
    /// returns the previous occupant, now detached.
    ///
    /// # Errors
    ///
    /// Same as [`set_fixed_argument`](Self::set_fixed_argument), except that
    /// an occupied slot is not an error.
    pub fn replace_fixed_argument(
        &mut self,
        parent: NodeHandle,
        index: usize,
        child: Option<NodeHandle>,
    ) -> Result<Option<NodeHandle>, AmlError> {
        if let Some(child) = child {
            self.check_attachable(parent, child)?;
        }
        let slot = self.fixed_slot_mut(parent, index)?;
        let previous = core::mem::replace(slot, child);
        if let Some(old) = previous.and_then(|old| self.get_mut(old)) {
            old.parent = None;
        }
        if let Some(new) = child.and_then(|new| self.get_mut(new)) {
            new.parent = Some(parent);
        }
        Ok(previous)
    }

    /// Empties fixed slot `index` of `parent` and returns its detached
    /// occupant.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidParameter`] for an invalid handle and
    /// [`AmlError::IndexOutOfRange`] if `parent` has no such slot.
    pub fn take_fixed_argument(&mut self, parent: NodeHandle, index: usize) -> Result<Option<NodeHandle>, AmlError> {
        self.replace_fixed_argument(parent, index, None)
    }

    // ---- Detach, delete, clone ----------------------------------------------

    /// Unlinks `node` from whichever slot or list owns it.
    ///
    /// Detaching a node that has no owner does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidParameter`] for an invalid handle and
    /// [`AmlError::CorruptTree`] if the recorded parent does not own `node`.
    pub fn detach(&mut self, node: NodeHandle) -> Result<(), AmlError> {
        let entry = self.get(node).ok_or(AmlError::InvalidParameter)?;
        let Some(parent) = entry.parent else {
            return Ok(());
        };
        if entry.links.is_some() {
            return self.var_list_remove(node);
        }
        let index = self
            .get(parent)
            .and_then(|p| p.slot_of(node))
            .ok_or(AmlError::CorruptTree)?;
        self.take_fixed_argument(parent, index).map(|_| ())
    }

    /// Detaches `node` and frees it together with its whole subtree.
    ///
    /// Children are freed before their parents. Handles into the deleted
    /// subtree become invalid. Returns the number of nodes freed.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidParameter`] for an invalid handle, or any
    /// error from [`detach`](Self::detach) or the subtree walk.
    pub fn delete_tree(&mut self, node: NodeHandle) -> Result<usize, AmlError> {
        let order = self.subtree(node)?;
        self.detach(node)?;
        // Pre-order lists every node after its ancestors.
        for &handle in order.iter().rev() {
            self.release(handle);
        }
        debug!("aml: deleted {} node(s) under {node:?}", order.len());
        Ok(order.len())
    }

    /// Deep-copies the subtree under `node`. The copy is returned detached.
    ///
    /// On failure every node copied so far is freed again.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidParameter`] for an invalid handle,
    /// [`AmlError::OutOfResources`] if the arena fills up, or
    /// [`AmlError::CorruptTree`] if the source is inconsistent.
    pub fn clone_tree(&mut self, node: NodeHandle) -> Result<NodeHandle, AmlError> {
        let order = self.subtree(node)?;
        let mut copies: BTreeMap<NodeHandle, NodeHandle> = BTreeMap::new();
        let result = self.copy_nodes(node, &order, &mut copies);
        if result.is_err() {
            for &copy in copies.values() {
                self.release(copy);
            }
            debug!("aml: dropping {} partial copies of {node:?}", copies.len());
        }
        result
    }

    fn copy_nodes(
        &mut self,
        node: NodeHandle,
        order: &[NodeHandle],
        copies: &mut BTreeMap<NodeHandle, NodeHandle>,
    ) -> Result<NodeHandle, AmlError> {
        for &source in order {
            let body = self.get(source).ok_or(AmlError::CorruptTree)?.body.clone();
            let copy = match body {
                NodeBody::Root { .. } => self.create_root()?,
                NodeBody::Object { spec, .. } => self.create_object(spec)?,
                NodeBody::Data { data_type, buffer } => self.create_data(data_type, &buffer)?,
            };
            copies.insert(source, copy);

            if source == node {
                continue;
            }
            let parent = self.parent(source).ok_or(AmlError::CorruptTree)?;
            let parent_copy = *copies.get(&parent).ok_or(AmlError::CorruptTree)?;
            let slot = self.get(parent).and_then(|p| p.slot_of(source));
            self.attach_copy(parent_copy, slot, copy)?;
        }

        copies.get(&node).copied().ok_or(AmlError::InvalidParameter)
    }

    /// Gives the fresh node `copy` to `parent`, in fixed slot `slot` or at
    /// the tail of its list. `copy` has no owner and no children yet, so the
    /// attachability checks are skipped.
    fn attach_copy(&mut self, parent: NodeHandle, slot: Option<usize>, copy: NodeHandle) -> Result<(), AmlError> {
        let Some(index) = slot else {
            // Pre-order yields list entries front to back.
            let (head, links) = self.head_of(parent)?;
            return self.splice(parent, links.back, head, copy);
        };
        let slot = self.fixed_slot_mut(parent, index)?;
        if slot.is_some() {
            return Err(AmlError::CorruptTree);
        }
        *slot = Some(copy);
        let node = self.get_mut(copy).ok_or(AmlError::CorruptTree)?;
        node.parent = Some(parent);
        Ok(())
    }

    /// Collects the subtree under `node` in pre-order without recursion.
    fn subtree(&self, node: NodeHandle) -> Result<Vec<NodeHandle>, AmlError> {
        let config = EnumConfig {
            strategy: Strategy::WorkList,
            max_depth: None,
        };
        let mut order = Vec::new();
        let mut status: EnumStatus = Ok(());
        let mut collect = |_: &Self, handle: NodeHandle, order: &mut Vec<NodeHandle>, _: Option<&mut EnumStatus>| {
            order.push(handle);
            true
        };
        if enumerate_with(&config, self, Some(node), Some(&mut collect), &mut order, Some(&mut status)) {
            Ok(order)
        } else {
            status.and(Err(AmlError::CorruptTree))
        }
    }
}
