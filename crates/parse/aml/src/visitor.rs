//! Typed visitor over an AML object tree.
//!
//! Callers implement [`AmlVisitor`] and override only the callbacks they
//! need. All methods default to "continue". [`walk`] drives a visitor with
//! [`enumerate`](crate::enumerate()) and folds the status slot into a
//! `Result`, for callers that prefer `?` to out-parameters.

use crate::AmlTree;
use crate::enumerate::enumerate;
use crate::error::{AmlError, EnumStatus};
use crate::node::{DataType, NodeHandle, NodeKind};

/// Visitor trait for walking an AML object tree in byte-stream order.
///
/// Each method returns `Ok(true)` to continue, `Ok(false)` to stop
/// quietly, or an error to stop and report it.
#[allow(unused_variables)]
pub trait AmlVisitor {
    /// Called for a root node.
    fn root(&mut self, tree: &AmlTree, node: NodeHandle) -> Result<bool, AmlError> {
        Ok(true)
    }

    /// Called for an object node, before any of its arguments.
    fn object(&mut self, tree: &AmlTree, node: NodeHandle, opcode: u32) -> Result<bool, AmlError> {
        Ok(true)
    }

    /// Called for a data node.
    fn data(&mut self, tree: &AmlTree, node: NodeHandle, data_type: DataType, data: &[u8]) -> Result<bool, AmlError> {
        Ok(true)
    }
}

fn dispatch<V: AmlVisitor>(tree: &AmlTree, node: NodeHandle, visitor: &mut V) -> Result<bool, AmlError> {
    match tree.kind(node) {
        Some(NodeKind::Root) => visitor.root(tree, node),
        Some(NodeKind::Object) => {
            let opcode = tree.opcode(node).ok_or(AmlError::CorruptTree)?;
            visitor.object(tree, node, opcode)
        }
        Some(NodeKind::Data) => match (tree.data_type(node), tree.data(node)) {
            (Some(data_type), Some(data)) => visitor.data(tree, node, data_type, data),
            _ => Err(AmlError::CorruptTree),
        },
        None => Err(AmlError::InvalidParameter),
    }
}

/// Walks the subtree under `node` with `visitor`.
///
/// Returns `Ok(true)` if the whole subtree was visited and `Ok(false)` if
/// the visitor stopped early without an error.
///
/// # Errors
///
/// Returns [`AmlError::InvalidParameter`] if `node` is invalid, or the
/// first error a visitor method returned.
pub fn walk<V: AmlVisitor>(tree: &AmlTree, node: NodeHandle, visitor: &mut V) -> Result<bool, AmlError> {
    let mut status: EnumStatus = Ok(());
    let mut callback = |tree: &AmlTree, node: NodeHandle, visitor: &mut V, status: Option<&mut EnumStatus>| {
        match dispatch(tree, node, visitor) {
            Ok(proceed) => proceed,
            Err(error) => {
                if let Some(status) = status {
                    *status = Err(error);
                }
                false
            }
        }
    };
    let completed = enumerate(tree, Some(node), Some(&mut callback), visitor, Some(&mut status));
    status.map(|()| completed)
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use crate::node::ObjectSpec;
    use std::vec::Vec;

    #[derive(Default)]
    struct Opcodes {
        seen: Vec<u32>,
        stop_after: Option<u32>,
    }

    impl AmlVisitor for Opcodes {
        fn object(&mut self, _: &AmlTree, _: NodeHandle, opcode: u32) -> Result<bool, AmlError> {
            self.seen.push(opcode);
            Ok(self.stop_after != Some(opcode))
        }
    }

    struct RejectData;

    impl AmlVisitor for RejectData {
        fn data(&mut self, _: &AmlTree, _: NodeHandle, _: DataType, data: &[u8]) -> Result<bool, AmlError> {
            Err(AmlError::Callback(u32::from(data[0])))
        }
    }

    fn sample() -> (AmlTree, NodeHandle) {
        let mut tree = AmlTree::new();
        let root = tree.create_root().unwrap();
        for opcode in [0x10, 0x14, 0x08] {
            let obj = tree.create_object(ObjectSpec::new(opcode, 1, false).unwrap()).unwrap();
            let data = tree.create_data(DataType::UInt, &[opcode as u8]).unwrap();
            tree.set_fixed_argument(obj, 0, data).unwrap();
            tree.var_list_add_tail(root, obj).unwrap();
        }
        (tree, root)
    }

    #[test]
    fn walk_reports_objects_in_order() {
        let (tree, root) = sample();
        let mut visitor = Opcodes::default();
        assert_eq!(walk(&tree, root, &mut visitor), Ok(true));
        assert_eq!(visitor.seen, [0x10, 0x14, 0x08]);
    }

    #[test]
    fn walk_stops_quietly() {
        let (tree, root) = sample();
        let mut visitor = Opcodes {
            stop_after: Some(0x14),
            ..Opcodes::default()
        };
        assert_eq!(walk(&tree, root, &mut visitor), Ok(false));
        assert_eq!(visitor.seen, [0x10, 0x14]);
    }

    #[test]
    fn walk_surfaces_visitor_errors() {
        let (tree, root) = sample();
        assert_eq!(walk(&tree, root, &mut RejectData), Err(AmlError::Callback(0x10)));
    }

    #[test]
    fn walk_rejects_stale_handles() {
        let (mut tree, root) = sample();
        tree.delete_tree(root).unwrap();
        assert_eq!(walk(&tree, root, &mut RejectData), Err(AmlError::InvalidParameter));
    }
}
