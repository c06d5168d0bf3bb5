//! Ordering and short-circuit properties of tree enumeration over randomly
//! shaped trees.

use std::collections::VecDeque;

use hadron_aml::walk::{check_tree, collect_preorder, count_nodes};
use hadron_aml::{
    AmlError, AmlTree, DataType, EnumConfig, EnumStatus, NodeHandle, ObjectSpec, Strategy as WalkStrategy,
    enumerate, enumerate_with,
};
use proptest::prelude::*;

const SLOTS: usize = 2;

/// How a generated node is attached to its parent.
#[derive(Debug, Clone, Copy)]
enum Attach {
    Fixed,
    Tail,
    Head,
}

/// A tree plus a plain model of the order its children were given in.
struct Built {
    tree: AmlTree,
    handles: Vec<NodeHandle>,
    parents: Vec<Option<usize>>,
    fixed: Vec<[Option<usize>; SLOTS]>,
    list: Vec<VecDeque<usize>>,
}

impl Built {
    fn expected_order(&self) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        self.push_preorder(0, &mut out);
        out
    }

    fn push_preorder(&self, index: usize, out: &mut Vec<NodeHandle>) {
        out.push(self.handles[index]);
        for child in self.fixed[index].iter().flatten() {
            self.push_preorder(*child, out);
        }
        for child in &self.list[index] {
            self.push_preorder(*child, out);
        }
    }
}

fn build(plan: &[(usize, Attach, bool)]) -> Built {
    let mut tree = AmlTree::new();
    let root = tree.create_root().unwrap();
    let mut built = Built {
        handles: vec![root],
        parents: vec![None],
        fixed: vec![[None; SLOTS]],
        list: vec![VecDeque::new()],
        tree: AmlTree::new(),
    };
    let mut containers = vec![0usize];

    for (i, &(pick, attach, leaf)) in plan.iter().enumerate() {
        let index = i + 1;
        let node = if leaf {
            tree.create_data(DataType::Raw, &[index as u8]).unwrap()
        } else {
            tree.create_object(ObjectSpec::new(0x1000 + index as u32, SLOTS, true).unwrap())
                .unwrap()
        };
        let parent = containers[pick % containers.len()];
        let free_slot = built.fixed[parent].iter().position(Option::is_none);
        let parent_handle = built.handles[parent];

        match (attach, free_slot) {
            (Attach::Fixed, Some(slot)) if parent != 0 => {
                tree.set_fixed_argument(parent_handle, slot, node).unwrap();
                built.fixed[parent][slot] = Some(index);
            }
            (Attach::Head, _) => {
                tree.var_list_add_head(parent_handle, node).unwrap();
                built.list[parent].push_front(index);
            }
            _ => {
                tree.var_list_add_tail(parent_handle, node).unwrap();
                built.list[parent].push_back(index);
            }
        }

        built.handles.push(node);
        built.parents.push(Some(parent));
        built.fixed.push([None; SLOTS]);
        built.list.push(VecDeque::new());
        if !leaf {
            containers.push(index);
        }
    }

    built.tree = tree;
    built
}

fn plan_strategy() -> impl Strategy<Value = Vec<(usize, Attach, bool)>> {
    let attach = prop_oneof![Just(Attach::Fixed), Just(Attach::Tail), Just(Attach::Head)];
    prop::collection::vec((any::<usize>(), attach, any::<bool>()), 0..48)
}

fn walk(built: &Built, strategy: WalkStrategy, stop_at: Option<usize>) -> (bool, Vec<NodeHandle>) {
    let config = EnumConfig {
        strategy,
        max_depth: None,
    };
    let stop = stop_at.map(|i| built.handles[i]);
    let mut seen = Vec::new();
    let mut callback = |_: &AmlTree, node: NodeHandle, seen: &mut Vec<NodeHandle>, _: Option<&mut EnumStatus>| {
        seen.push(node);
        Some(node) != stop
    };
    let done = enumerate_with(
        &config,
        &built.tree,
        Some(built.handles[0]),
        Some(&mut callback),
        &mut seen,
        None,
    );
    (done, seen)
}

proptest! {
    #[test]
    fn full_walk_matches_model(plan in plan_strategy()) {
        let built = build(&plan);
        let expected = built.expected_order();
        prop_assert_eq!(expected.len(), plan.len() + 1);

        for strategy in [WalkStrategy::Recursive, WalkStrategy::WorkList] {
            let (done, seen) = walk(&built, strategy, None);
            prop_assert!(done);
            prop_assert_eq!(&seen, &expected);
        }
    }

    #[test]
    fn ancestors_come_first(plan in plan_strategy()) {
        let built = build(&plan);
        let (_, seen) = walk(&built, WalkStrategy::Recursive, None);
        let position = |h: NodeHandle| seen.iter().position(|&s| s == h).unwrap();
        for (index, parent) in built.parents.iter().enumerate() {
            if let Some(parent) = parent {
                prop_assert!(position(built.handles[*parent]) < position(built.handles[index]));
            }
        }
    }

    #[test]
    fn stop_truncates_at_the_cancelling_node(plan in plan_strategy(), k in any::<usize>()) {
        let built = build(&plan);
        let expected = built.expected_order();
        let k = k % expected.len();
        let stop_index = built.handles.iter().position(|&h| h == expected[k]).unwrap();

        for strategy in [WalkStrategy::Recursive, WalkStrategy::WorkList] {
            let (done, seen) = walk(&built, strategy, Some(stop_index));
            prop_assert!(!done);
            prop_assert_eq!(&seen[..], &expected[..=k]);
        }
    }

    #[test]
    fn api_built_trees_are_consistent(plan in plan_strategy()) {
        let built = build(&plan);
        let root = built.handles[0];
        prop_assert_eq!(check_tree(&built.tree, root), Ok(()));
        prop_assert_eq!(count_nodes(&built.tree, root), Ok(plan.len() + 1));
    }

    #[test]
    fn clone_preserves_order(plan in plan_strategy()) {
        let mut built = build(&plan);
        let root = built.handles[0];
        let copy = built.tree.clone_tree(root).unwrap();
        let original: Vec<_> = collect_preorder(&built.tree, root)
            .unwrap()
            .into_iter()
            .map(|h| (built.tree.kind(h), built.tree.opcode(h), built.tree.data(h).map(<[u8]>::to_vec)))
            .collect();
        let cloned: Vec<_> = collect_preorder(&built.tree, copy)
            .unwrap()
            .into_iter()
            .map(|h| (built.tree.kind(h), built.tree.opcode(h), built.tree.data(h).map(<[u8]>::to_vec)))
            .collect();
        prop_assert_eq!(original, cloned);
        prop_assert_eq!(check_tree(&built.tree, copy), Ok(()));
    }
}

#[test]
fn scenario_r_a_b_c() {
    let mut tree = AmlTree::new();
    let r = tree.create_root().unwrap();
    let holder = tree
        .create_object(ObjectSpec::new(0x10, 1, true).unwrap())
        .unwrap();
    let a = tree.create_data(DataType::NameString, b"A___").unwrap();
    let b = tree
        .create_object(ObjectSpec::new(0x12, 0, true).unwrap())
        .unwrap();
    let c = tree.create_data(DataType::UInt, &[0x0c]).unwrap();
    tree.var_list_add_tail(r, holder).unwrap();
    tree.set_fixed_argument(holder, 0, a).unwrap();
    tree.var_list_add_tail(holder, b).unwrap();
    tree.var_list_add_tail(b, c).unwrap();

    let mut seen = Vec::new();
    let mut record = |_: &AmlTree, node: NodeHandle, seen: &mut Vec<NodeHandle>, _: Option<&mut EnumStatus>| {
        seen.push(node);
        node != b
    };
    let mut status = Ok(());
    assert!(!enumerate(&tree, Some(holder), Some(&mut record), &mut seen, Some(&mut status)));
    assert_eq!(seen, [holder, a, b]);
    assert_eq!(status, Ok(()));

    tree.delete_tree(r).unwrap();
    let mut status = Ok(());
    assert!(!enumerate(&tree, Some(holder), Some(&mut record), &mut seen, Some(&mut status)));
    assert_eq!(status, Err(AmlError::InvalidParameter));
    assert_eq!(seen.len(), 3);
}

/// Builds a chain `depth` objects deep over one data leaf, alternating fixed
/// slot and list attachment. Attaching bottom-up keeps each step O(1).
fn deep_chain(tree: &mut AmlTree, depth: usize) -> NodeHandle {
    let mut top = tree.create_data(DataType::UInt, &[0]).unwrap();
    for level in 0..depth {
        let obj = tree.create_object(ObjectSpec::new(0x5b82, 1, true).unwrap()).unwrap();
        if level % 2 == 0 {
            tree.set_fixed_argument(obj, 0, top).unwrap();
        } else {
            tree.var_list_add_tail(obj, top).unwrap();
        }
        top = obj;
    }
    top
}

fn count_with_work_list(tree: &AmlTree, node: NodeHandle) -> (bool, usize) {
    let config = EnumConfig {
        strategy: WalkStrategy::WorkList,
        max_depth: None,
    };
    let mut count = 0usize;
    let mut tally = |_: &AmlTree, _: NodeHandle, count: &mut usize, _: Option<&mut EnumStatus>| {
        *count += 1;
        true
    };
    let done = enumerate_with(&config, tree, Some(node), Some(&mut tally), &mut count, None);
    (done, count)
}

#[test]
fn work_list_handles_very_deep_trees() {
    const DEPTH: usize = 100_000;
    let mut tree = AmlTree::with_capacity(2 * (DEPTH + 1));
    let top = deep_chain(&mut tree, DEPTH);

    assert_eq!(count_with_work_list(&tree, top), (true, DEPTH + 1));

    let copy = tree.clone_tree(top).unwrap();
    assert_eq!(tree.len(), 2 * (DEPTH + 1));
    assert_eq!(count_with_work_list(&tree, copy), (true, DEPTH + 1));

    assert_eq!(tree.delete_tree(copy), Ok(DEPTH + 1));
    assert_eq!(tree.delete_tree(top), Ok(DEPTH + 1));
    assert!(tree.is_empty());
}
