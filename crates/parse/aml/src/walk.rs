//! Tree services built on the enumerator: search, counting, serialisation,
//! consistency checking and debug dumps.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use log::{Level, debug, log_enabled};

use crate::AmlTree;
use crate::enumerate::enumerate;
use crate::error::{AmlError, EnumStatus};
use crate::node::{DataType, ListLink, NodeHandle, NodeKind};
use crate::visitor::{AmlVisitor, walk};

/// Folds a finished enumeration into a `Result`.
fn finish<T>(completed: bool, status: EnumStatus, value: T) -> Result<T, AmlError> {
    match status {
        Err(error) => Err(error),
        Ok(()) if completed => Ok(value),
        // Only callbacks stop a walk without an error, and ours never do.
        Ok(()) => Err(AmlError::CorruptTree),
    }
}

/// Returns every node under `node` in enumeration order.
///
/// # Errors
///
/// Returns [`AmlError::InvalidParameter`] if `node` is invalid.
pub fn collect_preorder(tree: &AmlTree, node: NodeHandle) -> Result<Vec<NodeHandle>, AmlError> {
    let mut order = Vec::new();
    let mut status = Ok(());
    let mut push = |_: &AmlTree, handle: NodeHandle, order: &mut Vec<NodeHandle>, _: Option<&mut EnumStatus>| {
        order.push(handle);
        true
    };
    let completed = enumerate(tree, Some(node), Some(&mut push), &mut order, Some(&mut status));
    finish(completed, status, order)
}

/// Counts the nodes under `node`, itself included.
///
/// # Errors
///
/// Returns [`AmlError::InvalidParameter`] if `node` is invalid.
pub fn count_nodes(tree: &AmlTree, node: NodeHandle) -> Result<usize, AmlError> {
    let mut count = 0usize;
    let mut status = Ok(());
    let mut tally = |_: &AmlTree, _: NodeHandle, count: &mut usize, _: Option<&mut EnumStatus>| {
        *count += 1;
        true
    };
    let completed = enumerate(tree, Some(node), Some(&mut tally), &mut count, Some(&mut status));
    finish(completed, status, count)
}

/// Returns the first node under `node`, in enumeration order, that matches
/// `predicate`. The walk stops at the first hit.
pub fn find_first<P>(tree: &AmlTree, node: NodeHandle, mut predicate: P) -> Option<NodeHandle>
where
    P: FnMut(&AmlTree, NodeHandle) -> bool,
{
    let mut found = None;
    let mut probe = |tree: &AmlTree, handle: NodeHandle, found: &mut Option<NodeHandle>, _: Option<&mut EnumStatus>| {
        if predicate(tree, handle) {
            *found = Some(handle);
            return false;
        }
        true
    };
    enumerate(tree, Some(node), Some(&mut probe), &mut found, None);
    found
}

/// Returns the first object node under `node` carrying `opcode`.
#[must_use]
pub fn find_object(tree: &AmlTree, node: NodeHandle, opcode: u32) -> Option<NodeHandle> {
    find_first(tree, node, |tree, handle| tree.opcode(handle) == Some(opcode))
}

struct SizeCounter(usize);

impl AmlVisitor for SizeCounter {
    fn data(&mut self, _: &AmlTree, _: NodeHandle, _: DataType, data: &[u8]) -> Result<bool, AmlError> {
        self.0 += data.len();
        Ok(true)
    }
}

struct DataWriter<'a>(&'a mut Vec<u8>);

impl AmlVisitor for DataWriter<'_> {
    fn data(&mut self, _: &AmlTree, _: NodeHandle, _: DataType, data: &[u8]) -> Result<bool, AmlError> {
        self.0.extend_from_slice(data);
        Ok(true)
    }
}

/// Returns the number of bytes [`serialize_data`] would write for `node`.
///
/// # Errors
///
/// Returns [`AmlError::InvalidParameter`] if `node` is invalid.
pub fn serialized_size(tree: &AmlTree, node: NodeHandle) -> Result<usize, AmlError> {
    let mut counter = SizeCounter(0);
    walk(tree, node, &mut counter)?;
    Ok(counter.0)
}

/// Linearises the subtree under `node` by appending the bytes of every data
/// node to `out`, in byte-stream order. Returns the number of bytes written.
///
/// # Errors
///
/// Returns [`AmlError::InvalidParameter`] if `node` is invalid. Bytes
/// written before an error stay in `out`.
pub fn serialize_data(tree: &AmlTree, node: NodeHandle, out: &mut Vec<u8>) -> Result<usize, AmlError> {
    let start = out.len();
    walk(tree, node, &mut DataWriter(&mut *out))?;
    Ok(out.len() - start)
}

/// Verifies the local structure of one node: each child's parent reference
/// names it and its list is a well-formed ring.
fn node_is_consistent(tree: &AmlTree, node: NodeHandle) -> bool {
    for index in 0..tree.fixed_argument_count(node) {
        if let Ok(Some(child)) = tree.fixed_argument(node, index) {
            // A slot child is never also a list entry.
            if tree.parent(child) != Some(node) || tree.next_link(ListLink::Node(child)).is_some() {
                return false;
            }
        }
    }

    let Some(head) = tree.variable_argument_list_head(node) else {
        return true;
    };
    let mut previous = head;
    // A ring cannot hold more entries than the arena has nodes.
    for _ in 0..=tree.len() {
        let Some(next) = tree.next_link(previous) else {
            return false;
        };
        if tree.previous_link(next) != Some(previous) {
            return false;
        }
        match next {
            link if link == head => return true,
            ListLink::Node(entry) if tree.parent(entry) == Some(node) => previous = next,
            _ => return false,
        }
    }
    false
}

/// Checks parent back-references and list links across the subtree under
/// `node`, and that no node is reachable twice.
///
/// # Errors
///
/// Returns [`AmlError::InvalidParameter`] if `node` is invalid and
/// [`AmlError::CorruptTree`] on the first inconsistency.
pub fn check_tree(tree: &AmlTree, node: NodeHandle) -> Result<(), AmlError> {
    let mut seen = BTreeSet::new();
    let mut status = Ok(());
    let mut check = |tree: &AmlTree, handle: NodeHandle, seen: &mut BTreeSet<NodeHandle>, status: Option<&mut EnumStatus>| {
        if seen.insert(handle) && node_is_consistent(tree, handle) {
            return true;
        }
        debug!("aml: inconsistent links at {handle:?}");
        if let Some(status) = status {
            *status = Err(AmlError::CorruptTree);
        }
        false
    };
    let completed = enumerate(tree, Some(node), Some(&mut check), &mut seen, Some(&mut status));
    finish(completed, status, ())
}

/// Logs the subtree under `node` at debug level, one line per node,
/// indented by depth.
///
/// # Errors
///
/// Returns [`AmlError::InvalidParameter`] if `node` is invalid.
pub fn dump_tree(tree: &AmlTree, node: NodeHandle) -> Result<(), AmlError> {
    if !log_enabled!(Level::Debug) {
        return if tree.is_valid(Some(node)) {
            Ok(())
        } else {
            Err(AmlError::InvalidParameter)
        };
    }
    let base = tree.depth(node).ok_or(AmlError::InvalidParameter)?;
    let mut status = Ok(());
    let mut print = |tree: &AmlTree, handle: NodeHandle, base: &mut usize, _: Option<&mut EnumStatus>| {
        let indent = 2 * tree.depth(handle).unwrap_or(*base).saturating_sub(*base);
        match tree.kind(handle) {
            Some(NodeKind::Root) => debug!("{:indent$}Root ({} entries)", "", tree.var_list_len(handle)),
            Some(NodeKind::Object) => debug!(
                "{:indent$}Object {:#x} ({} fixed, {} variable)",
                "",
                tree.opcode(handle).unwrap_or_default(),
                tree.fixed_argument_count(handle),
                tree.var_list_len(handle),
            ),
            Some(NodeKind::Data) => debug!(
                "{:indent$}Data {:?} {:02x?}",
                "",
                tree.data_type(handle).unwrap_or(DataType::Raw),
                tree.data(handle).unwrap_or_default(),
            ),
            None => {}
        }
        true
    };
    let mut depth = base;
    let completed = enumerate(tree, Some(node), Some(&mut print), &mut depth, Some(&mut status));
    finish(completed, status, ())
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use crate::node::ObjectSpec;
    use std::vec;

    /// `Name(_HID, "PNP0A03")` style tree under a scope.
    fn sample() -> (AmlTree, NodeHandle, NodeHandle) {
        let mut tree = AmlTree::new();
        let root = tree.create_root().unwrap();
        let scope = tree.create_object(ObjectSpec::new(0x10, 1, true).unwrap()).unwrap();
        let scope_name = tree.create_data(DataType::NameString, b"_SB_").unwrap();
        let name = tree.create_object(ObjectSpec::new(0x08, 2, false).unwrap()).unwrap();
        let hid = tree.create_data(DataType::NameString, b"_HID").unwrap();
        let value = tree.create_data(DataType::String, b"PNP0A03\0").unwrap();

        tree.var_list_add_tail(root, scope).unwrap();
        tree.set_fixed_argument(scope, 0, scope_name).unwrap();
        tree.var_list_add_tail(scope, name).unwrap();
        tree.set_fixed_argument(name, 0, hid).unwrap();
        tree.set_fixed_argument(name, 1, value).unwrap();
        (tree, root, name)
    }

    #[test]
    fn counts_and_collects() {
        let (tree, root, name) = sample();
        assert_eq!(count_nodes(&tree, root), Ok(6));
        let order = collect_preorder(&tree, root).unwrap();
        assert_eq!(order.len(), 6);
        assert_eq!(order[0], root);
        assert_eq!(order[3], name);
        assert_eq!(count_nodes(&tree, name), Ok(3));
    }

    #[test]
    fn finds_first_match_in_order() {
        let (tree, root, name) = sample();
        assert_eq!(find_object(&tree, root, 0x08), Some(name));
        assert_eq!(find_object(&tree, root, 0x14), None);
        let first_string = find_first(&tree, root, |tree, n| tree.data_type(n) == Some(DataType::NameString));
        assert_eq!(tree.data(first_string.unwrap()), Some(&b"_SB_"[..]));
    }

    #[test]
    fn serializes_in_byte_stream_order() {
        let (tree, root, _) = sample();
        let mut out = vec![0xff];
        assert_eq!(serialize_data(&tree, root, &mut out), Ok(16));
        assert_eq!(&out[1..], b"_SB__HIDPNP0A03\0");
        assert_eq!(serialized_size(&tree, root), Ok(16));
    }

    #[test]
    fn check_accepts_api_built_trees() {
        let (mut tree, root, name) = sample();
        assert_eq!(check_tree(&tree, root), Ok(()));
        tree.detach(name).unwrap();
        assert_eq!(check_tree(&tree, root), Ok(()));
        assert_eq!(check_tree(&tree, name), Ok(()));
    }

    #[test]
    fn check_flags_wrong_parent() {
        let (mut tree, root, name) = sample();
        let hid = tree.fixed_argument(name, 0).unwrap().unwrap();
        tree.get_mut(hid).unwrap().parent = Some(root);
        assert_eq!(check_tree(&tree, root), Err(AmlError::CorruptTree));
    }

    #[test]
    fn check_flags_broken_back_link() {
        let (mut tree, root, _) = sample();
        let extra = tree.create_object(ObjectSpec::new(0x14, 0, false).unwrap()).unwrap();
        tree.var_list_add_tail(root, extra).unwrap();
        tree.get_mut(extra).unwrap().links.as_mut().unwrap().back = ListLink::Sentinel(root);
        assert_eq!(check_tree(&tree, root), Err(AmlError::CorruptTree));
    }

    #[test]
    fn services_reject_invalid_nodes() {
        let (mut tree, root, _) = sample();
        tree.delete_tree(root).unwrap();
        assert_eq!(count_nodes(&tree, root), Err(AmlError::InvalidParameter));
        assert_eq!(check_tree(&tree, root), Err(AmlError::InvalidParameter));
        assert_eq!(dump_tree(&tree, root), Err(AmlError::InvalidParameter));
        assert_eq!(find_first(&tree, root, |_, _| true), None);
    }
}
