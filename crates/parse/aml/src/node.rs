//! Node model for the AML object tree.
//!
//! A tree is made of three kinds of node. The root owns the top-level term
//! list. Object nodes stand for an AML opcode: they own a fixed number of
//! argument slots, decided by the opcode, and optionally a variable-argument
//! list. Data nodes are leaves holding raw bytes.

use alloc::vec::Vec;
use core::fmt;

use crate::error::AmlError;

/// Largest number of fixed arguments any object node can carry.
pub const MAX_FIXED_ARGS: usize = 6;

/// Kind discriminator of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Root of a tree. No fixed arguments, always a variable-argument list.
    Root,
    /// An opcode object with fixed arguments and an optional list.
    Object,
    /// A data leaf.
    Data,
}

/// Non-owning reference to a node stored in an [`AmlTree`](crate::AmlTree).
///
/// Handles stay cheap to copy and never keep a node alive. The generation
/// counter makes a handle to a deleted node fail validation instead of
/// aliasing whatever reuses its slot.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeHandle {
    index: u32,
    generation: u32,
}

impl NodeHandle {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub(crate) const fn index(self) -> usize {
        self.index as usize
    }

    pub(crate) const fn raw_index(self) -> u32 {
        self.index
    }

    pub(crate) const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHandle({}v{})", self.index, self.generation)
    }
}

/// Encoding of the bytes held by a data node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// An encoded NameString.
    NameString,
    /// A NUL-terminated ASCII string.
    String,
    /// A little-endian integer of 1, 2, 4 or 8 bytes.
    UInt,
    /// Uninterpreted bytes.
    Raw,
    /// One resource descriptor of a resource template.
    ResourceData,
    /// The PkgLength of a field element.
    FieldPkgLen,
}

/// Shape of an object node, fixed at construction.
///
/// The opcode is opaque to the tree; callers pick the encoding. Only the
/// slot count and list support affect structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectSpec {
    opcode: u32,
    fixed_args: u8,
    has_var_list: bool,
}

impl ObjectSpec {
    /// Describes an opcode with `fixed_args` argument slots.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidParameter`] if `fixed_args` exceeds
    /// [`MAX_FIXED_ARGS`].
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(opcode: u32, fixed_args: usize, has_var_list: bool) -> Result<Self, AmlError> {
        if fixed_args > MAX_FIXED_ARGS {
            return Err(AmlError::InvalidParameter);
        }
        Ok(Self {
            opcode,
            fixed_args: fixed_args as u8,
            has_var_list,
        })
    }

    /// Returns the opaque opcode tag.
    #[must_use]
    pub const fn opcode(self) -> u32 {
        self.opcode
    }

    /// Returns the number of fixed-argument slots.
    #[must_use]
    pub const fn fixed_args(self) -> usize {
        self.fixed_args as usize
    }

    /// Returns whether nodes of this shape own a variable-argument list.
    #[must_use]
    pub const fn has_var_list(self) -> bool {
        self.has_var_list
    }
}

/// A position in a circular variable-argument list.
///
/// Every list has one sentinel, named after the node that owns the list.
/// Walks stop when they come back to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListLink {
    /// The list head of the given owner.
    Sentinel(NodeHandle),
    /// A list entry.
    Node(NodeHandle),
}

/// Forward and backward links of a list entry or sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Links {
    pub(crate) fwd: ListLink,
    pub(crate) back: ListLink,
}

impl Links {
    /// Links of an empty list: the sentinel points at itself both ways.
    pub(crate) const fn empty(owner: NodeHandle) -> Self {
        Self {
            fwd: ListLink::Sentinel(owner),
            back: ListLink::Sentinel(owner),
        }
    }
}

/// Kind-specific payload of a node.
#[derive(Debug, Clone)]
pub(crate) enum NodeBody {
    Root {
        var_list: Links,
    },
    Object {
        spec: ObjectSpec,
        fixed: [Option<NodeHandle>; MAX_FIXED_ARGS],
        var_list: Option<Links>,
    },
    Data {
        data_type: DataType,
        buffer: Vec<u8>,
    },
}

/// A node as stored in the arena.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    /// Owner of this node. Navigation only.
    pub(crate) parent: Option<NodeHandle>,
    /// Set while the node is an entry of its parent's list.
    pub(crate) links: Option<Links>,
    pub(crate) body: NodeBody,
}

impl Node {
    pub(crate) const fn new(body: NodeBody) -> Self {
        Self {
            parent: None,
            links: None,
            body,
        }
    }

    pub(crate) const fn kind(&self) -> NodeKind {
        match self.body {
            NodeBody::Root { .. } => NodeKind::Root,
            NodeBody::Object { .. } => NodeKind::Object,
            NodeBody::Data { .. } => NodeKind::Data,
        }
    }

    pub(crate) fn fixed_slots(&self) -> &[Option<NodeHandle>] {
        match &self.body {
            NodeBody::Object { spec, fixed, .. } => &fixed[..spec.fixed_args()],
            _ => &[],
        }
    }

    pub(crate) const fn var_list(&self) -> Option<&Links> {
        match &self.body {
            NodeBody::Root { var_list } => Some(var_list),
            NodeBody::Object { var_list, .. } => var_list.as_ref(),
            NodeBody::Data { .. } => None,
        }
    }

    pub(crate) fn var_list_mut(&mut self) -> Option<&mut Links> {
        match &mut self.body {
            NodeBody::Root { var_list } => Some(var_list),
            NodeBody::Object { var_list, .. } => var_list.as_mut(),
            NodeBody::Data { .. } => None,
        }
    }

    /// Index of the fixed slot holding `child`, if any.
    pub(crate) fn slot_of(&self, child: NodeHandle) -> Option<usize> {
        self.fixed_slots().iter().position(|slot| *slot == Some(child))
    }
}
