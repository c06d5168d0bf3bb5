//! `hadron-aml` --- a standalone, `no_std` AML object tree.
//!
//! This crate models a parsed ACPI Machine Language stream as a typed tree
//! and enumerates it in byte-stream order. It is the layer table fix-up
//! passes, consistency checkers and serialisers sit on: they build or
//! receive a tree, then walk it with a callback.
//!
//! - [`AmlTree`] is an arena owning every node. Nodes are roots, opcode
//!   objects with fixed-argument slots and an optional variable-argument
//!   list, or data leaves. Parents own children; parent references are
//!   navigation-only [`NodeHandle`]s.
//! - [`enumerate`] is the depth-first, pre-order walk with callback-driven
//!   early termination and an optional status side channel.
//! - [`AmlVisitor`] and [`walk`] offer the same walk behind a typed trait.
//! - The [`walk`](mod@walk) module holds ready-made consumers: search,
//!   counting, serialisation, consistency checks and debug dumps.
//!
//! Opcodes are opaque `u32` tags; the crate does not decode AML bytecode.
//!
//! # Usage
//!
//! ```ignore
//! let mut tree = AmlTree::new();
//! let root = tree.create_root()?;
//! let scope = tree.create_object(ObjectSpec::new(0x10, 1, true)?)?;
//! tree.var_list_add_tail(root, scope)?;
//!
//! let mut seen = Vec::new();
//! let mut status = Ok(());
//! let mut record = |_: &AmlTree, node, seen: &mut Vec<NodeHandle>, _: Option<&mut EnumStatus>| {
//!     seen.push(node);
//!     true
//! };
//! enumerate(&tree, Some(root), Some(&mut record), &mut seen, Some(&mut status));
//! ```

#![no_std]
#![warn(missing_docs)]

extern crate alloc;

pub mod enumerate;
pub mod error;
pub mod node;
pub mod tree;
pub mod varlist;
pub mod visitor;
pub mod walk;

pub use enumerate::{EnumCallback, EnumConfig, Strategy, enumerate, enumerate_with};
pub use error::{AmlError, EnumStatus};
pub use node::{DataType, ListLink, MAX_FIXED_ARGS, NodeHandle, NodeKind, ObjectSpec};
pub use tree::AmlTree;
pub use varlist::VarArgs;
pub use visitor::{AmlVisitor, walk};
