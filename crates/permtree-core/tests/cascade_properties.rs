//! Cascade property tests
//!
//! Random trees and toggle sequences against the selection invariants.

use permtree_core::{
    Coverage, DescendantIndex, FlatNodeSpec, NodeId, SelectionState, TreeLimits, TreeModel,
    TreeSpec,
};
use proptest::prelude::*;
use proptest::sample::Index;
use std::collections::HashSet;
use std::sync::Arc;

/// Flat trees where node `i` hangs under some node `< i`, or is a root
fn tree_strategy() -> impl Strategy<Value = TreeSpec> {
    proptest::collection::vec(proptest::option::of(any::<Index>()), 1..40).prop_map(|parents| {
        let records = parents
            .iter()
            .enumerate()
            .map(|(i, parent)| {
                let parent = match parent {
                    Some(pick) if i > 0 => Some(format!("n{}", pick.index(i))),
                    _ => None,
                };
                FlatNodeSpec::new(format!("n{i}"), parent.as_deref())
            })
            .collect();
        TreeSpec::Flat(records)
    })
}

fn load(spec: &TreeSpec) -> (Arc<TreeModel>, Arc<DescendantIndex>) {
    let tree = Arc::new(TreeModel::build(spec, TreeLimits::unlimited()).unwrap());
    let index = Arc::new(DescendantIndex::build(&tree));
    (tree, index)
}

fn pick(tree: &TreeModel, at: &Index) -> NodeId {
    tree.iter().nth(at.index(tree.len())).unwrap().id().clone()
}

fn subtree(index: &DescendantIndex, id: &NodeId) -> HashSet<NodeId> {
    index.descendants(id.as_str()).unwrap().iter().cloned().collect()
}

proptest! {
    #[test]
    fn prop_cascade_grant_from_empty(spec in tree_strategy(), at in any::<Index>()) {
        let (tree, index) = load(&spec);
        let node = pick(&tree, &at);
        let mut selection = SelectionState::empty(Arc::clone(&tree), Arc::clone(&index));

        let change = selection.toggle(node.as_str()).unwrap();

        prop_assert!(change.is_granted());
        prop_assert_eq!(selection.granted(), &subtree(&index, &node));
    }

    #[test]
    fn prop_cascade_revoke_from_full(spec in tree_strategy(), at in any::<Index>()) {
        let (tree, index) = load(&spec);
        let node = pick(&tree, &at);
        let all: Vec<NodeId> = tree.ids().cloned().collect();
        let (mut selection, _) = SelectionState::new(Arc::clone(&tree), Arc::clone(&index), all.clone());

        selection.toggle(node.as_str()).unwrap();

        let expected: HashSet<NodeId> = all
            .into_iter()
            .filter(|id| !index.is_descendant(node.as_str(), id.as_str()))
            .collect();
        prop_assert_eq!(selection.granted(), &expected);
    }

    #[test]
    fn prop_toggle_only_touches_subtree(
        spec in tree_strategy(),
        history in proptest::collection::vec(any::<Index>(), 0..20),
        at in any::<Index>(),
    ) {
        let (tree, index) = load(&spec);
        let mut selection = SelectionState::empty(Arc::clone(&tree), Arc::clone(&index));
        for step in &history {
            selection.toggle(pick(&tree, step).as_str()).unwrap();
        }

        let node = pick(&tree, &at);
        let before = selection.granted().clone();
        let change = selection.toggle(node.as_str()).unwrap();
        let members = subtree(&index, &node);

        for id in tree.ids() {
            if members.contains(id) {
                prop_assert_eq!(selection.is_granted(id.as_str()), change.is_granted());
            } else {
                prop_assert_eq!(selection.is_granted(id.as_str()), before.contains(id));
            }
        }
    }

    #[test]
    fn prop_double_toggle_restores_uniform_subtree(
        spec in tree_strategy(),
        history in proptest::collection::vec(any::<Index>(), 0..20),
        at in any::<Index>(),
    ) {
        let (tree, index) = load(&spec);
        let mut selection = SelectionState::empty(Arc::clone(&tree), Arc::clone(&index));
        for step in &history {
            selection.toggle(pick(&tree, step).as_str()).unwrap();
        }

        let node = pick(&tree, &at);
        let coverage = selection.coverage(node.as_str()).unwrap();
        let before = selection.granted().clone();

        selection.toggle(node.as_str()).unwrap();
        selection.toggle(node.as_str()).unwrap();

        if coverage == Coverage::Partial {
            // A mixed subtree comes back uniform, matching the node's own bit.
            let after = selection.coverage(node.as_str()).unwrap();
            prop_assert_ne!(after, Coverage::Partial);
            prop_assert_eq!(after == Coverage::Full, before.contains(&node));
        } else {
            prop_assert_eq!(selection.granted(), &before);
        }
    }

    #[test]
    fn prop_leaf_toggle_is_independent(
        spec in tree_strategy(),
        history in proptest::collection::vec(any::<Index>(), 0..10),
        at in any::<Index>(),
    ) {
        let (tree, index) = load(&spec);
        let leaves: Vec<NodeId> = tree.iter().filter(|n| n.is_leaf()).map(|n| n.id().clone()).collect();
        let leaf = &leaves[at.index(leaves.len())];

        let mut selection = SelectionState::empty(Arc::clone(&tree), Arc::clone(&index));
        for step in &history {
            selection.toggle(pick(&tree, step).as_str()).unwrap();
        }
        let mut before = selection.granted().clone();

        selection.toggle(leaf.as_str()).unwrap();

        if !before.remove(leaf) {
            before.insert(leaf.clone());
        }
        prop_assert_eq!(selection.granted(), &before);
    }

    #[test]
    fn prop_encode_is_deterministic(
        (spec, seed) in tree_strategy().prop_flat_map(|spec| {
            let ids: Vec<String> = match &spec {
                TreeSpec::Flat(records) => records.iter().map(|r| r.id.to_string()).collect(),
                TreeSpec::Nested(_) => Vec::new(),
            };
            let n = ids.len();
            (Just(spec), proptest::sample::subsequence(ids, 0..=n).prop_shuffle())
        }),
    ) {
        let (tree, index) = load(&spec);
        let shuffled: Vec<NodeId> = seed.iter().map(|s| NodeId::from(s.as_str())).collect();
        let mut sorted = shuffled.clone();
        sorted.sort();

        let (first, _) = SelectionState::new(Arc::clone(&tree), Arc::clone(&index), shuffled);
        let (second, _) = SelectionState::new(Arc::clone(&tree), Arc::clone(&index), sorted);

        prop_assert_eq!(first.encode(), first.encode());
        prop_assert_eq!(first.encode(), second.encode());

        let preorder: Vec<NodeId> = tree.ids().filter(|id| first.is_granted(id.as_str())).cloned().collect();
        prop_assert_eq!(first.encode(), preorder);
    }
}

#[test]
fn weak_consistency_scenario() {
    let spec = permtree_test_utils::abcd_tree();
    let (tree, index) = load(&spec);
    let mut selection = SelectionState::empty(tree, index);

    selection.toggle("C").unwrap();
    assert!(selection.contains_all(["C", "D"]));

    selection.toggle("D").unwrap();
    assert_eq!(selection.encode(), permtree_test_utils::ids(&["C"]));
    assert_eq!(selection.coverage("C").unwrap(), Coverage::Partial);
}
