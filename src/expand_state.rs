use indextree::NodeId;
use tracing::debug;

use crate::tree::{FileTree, NodeKind};

/// Result of clicking a node marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    /// Children were shelved.
    Collapsed(usize),
    /// Shelved children were restored.
    Expanded(usize),
    /// Leaf, or a branch with nothing to shelve.
    Ignored,
}

/// Drives expand/collapse of branches.
///
/// The wide-node auto-collapse runs at most once per tree; later toggles are
/// purely user driven.
pub struct CollapseController {
    threshold: usize,
    auto_applied: bool,
}

impl CollapseController {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            auto_applied: false,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Shelve every child (recursively) of any branch whose active child
    /// count exceeds the threshold. Returns the number of nodes collapsed;
    /// subsequent calls do nothing.
    pub fn apply_initial(&mut self, tree: &mut FileTree) -> usize {
        if self.auto_applied {
            return 0;
        }
        self.auto_applied = true;

        let mut collapsed = 0;
        let mut stack = vec![tree.get_root()];
        while let Some(id) = stack.pop() {
            let children: Vec<NodeId> = tree.children(id).collect();
            if children.len() > self.threshold {
                debug!(
                    node = %tree.stable_key(id),
                    children = children.len(),
                    "auto-collapsing wide folder"
                );
                for child in children {
                    collapsed += collapse_recursive(tree, child);
                }
            } else {
                stack.extend(children.into_iter().rev());
            }
        }
        collapsed
    }

    /// Swap a branch between its expanded and collapsed state. Only the
    /// node's own subtree is touched.
    pub fn toggle(&self, tree: &mut FileTree, id: NodeId) -> Toggle {
        let Some(node) = tree.node(id) else {
            return Toggle::Ignored;
        };
        if node.kind == NodeKind::Leaf {
            return Toggle::Ignored;
        }

        let outcome = if node.is_collapsed() {
            Toggle::Expanded(tree.restore_children(id))
        } else {
            match tree.shelve_children(id) {
                0 => Toggle::Ignored,
                n => Toggle::Collapsed(n),
            }
        };
        debug!(node = %tree.stable_key(id), ?outcome, "toggled node");
        outcome
    }
}

/// Shelve a node's children, then each shelved child's children, all the
/// way down. Returns the number of nodes collapsed.
pub fn collapse_recursive(tree: &mut FileTree, id: NodeId) -> usize {
    let mut collapsed = 0;
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        if tree.shelve_children(current) > 0 {
            collapsed += 1;
        }
        if let Some(node) = tree.node(current) {
            stack.extend(node.shelved_children().iter().copied());
        }
    }
    collapsed
}

/// Collapse everything below the root, leaving its direct children visible.
pub fn collapse_all(tree: &mut FileTree) -> usize {
    let root = tree.get_root();
    let children: Vec<NodeId> = tree.children(root).collect();
    children
        .into_iter()
        .map(|child| collapse_recursive(tree, child))
        .sum()
}

/// Restore every shelved list in the tree.
pub fn expand_all(tree: &mut FileTree) -> usize {
    let mut expanded = 0;
    let mut stack = vec![tree.get_root()];
    while let Some(id) = stack.pop() {
        if tree.restore_children(id) > 0 {
            expanded += 1;
        }
        stack.extend(tree.children(id));
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PathRecord;

    fn wide_tree(width: usize) -> FileTree {
        let mut records = Vec::new();
        for i in 0..width {
            records.push(PathRecord::blob(format!("dir{i}/file.rs")));
            records.push(PathRecord::blob(format!("dir{i}/nested/deep.rs")));
        }
        records.push(PathRecord::blob("top.md"));
        FileTree::from_records(&records)
    }

    #[test]
    fn test_toggle_round_trip_restores_order_and_identity() {
        let records = vec![
            PathRecord::blob("src/a.rs"),
            PathRecord::blob("src/b.rs"),
            PathRecord::blob("src/c.rs"),
        ];
        let mut tree = FileTree::from_records(&records);
        let controller = CollapseController::new(20);
        let src = tree.get_node("src").unwrap();
        let before: Vec<NodeId> = tree.children(src).collect();

        assert_eq!(controller.toggle(&mut tree, src), Toggle::Collapsed(3));
        assert_eq!(tree.children(src).count(), 0);
        assert_eq!(tree.node(src).unwrap().shelved_children(), before.as_slice());

        assert_eq!(controller.toggle(&mut tree, src), Toggle::Expanded(3));
        let after: Vec<NodeId> = tree.children(src).collect();
        assert_eq!(before, after);
        assert!(!tree.node(src).unwrap().is_collapsed());
    }

    #[test]
    fn test_leaf_toggle_is_noop() {
        let mut tree = FileTree::from_records(&[PathRecord::blob("a.rs")]);
        let controller = CollapseController::new(20);
        let leaf = tree.get_node("a.rs").unwrap();
        assert_eq!(controller.toggle(&mut tree, leaf), Toggle::Ignored);
        assert!(!tree.node(leaf).unwrap().is_collapsed());
    }

    #[test]
    fn test_empty_branch_toggle_is_noop() {
        let mut tree = FileTree::from_records(&[PathRecord::tree("empty")]);
        let controller = CollapseController::new(20);
        let empty = tree.get_node("empty").unwrap();
        assert_eq!(controller.toggle(&mut tree, empty), Toggle::Ignored);
    }

    #[test]
    fn test_toggle_leaves_siblings_and_ancestors_alone() {
        let records = vec![
            PathRecord::blob("a/x/1.rs"),
            PathRecord::blob("a/y/2.rs"),
            PathRecord::blob("b/3.rs"),
        ];
        let mut tree = FileTree::from_records(&records);
        let controller = CollapseController::new(20);
        let x = tree.get_node("a/x").unwrap();
        let a = tree.get_node("a").unwrap();
        let y = tree.get_node("a/y").unwrap();

        controller.toggle(&mut tree, x);

        assert_eq!(tree.children(a).count(), 2);
        assert_eq!(tree.children(y).count(), 1);
        assert_eq!(tree.children(tree.get_root()).count(), 2);
        assert!(!tree.node(a).unwrap().is_collapsed());
    }

    #[test]
    fn test_auto_collapse_wide_root() {
        let mut tree = wide_tree(25);
        let mut controller = CollapseController::new(20);
        let collapsed = controller.apply_initial(&mut tree);

        let root = tree.get_root();
        let children: Vec<NodeId> = tree.children(root).collect();
        assert_eq!(children.len(), 26);
        for child in children {
            let node = tree.node(child).unwrap();
            assert_eq!(tree.children(child).count(), 0);
            if node.is_branch() {
                assert!(!node.shelved_children().is_empty());
            }
        }
        // each dirN and each dirN/nested
        assert_eq!(collapsed, 50);

        // nested folders are collapsed too, even though they are narrow
        let nested = tree.get_node("dir0/nested").unwrap();
        assert!(tree.node(nested).unwrap().is_collapsed());
    }

    #[test]
    fn test_auto_collapse_fires_once() {
        let mut tree = wide_tree(25);
        let mut controller = CollapseController::new(20);
        controller.apply_initial(&mut tree);

        let dir0 = tree.get_node("dir0").unwrap();
        controller.toggle(&mut tree, dir0);
        assert_eq!(controller.apply_initial(&mut tree), 0);
        assert_eq!(tree.children(dir0).count(), 2);
    }

    #[test]
    fn test_narrow_tree_untouched() {
        let mut tree = wide_tree(3);
        let mut controller = CollapseController::new(20);
        assert_eq!(controller.apply_initial(&mut tree), 0);
        let dir0 = tree.get_node("dir0").unwrap();
        assert_eq!(tree.children(dir0).count(), 2);
    }

    #[test]
    fn test_collapse_all_then_expand_all() {
        let mut tree = wide_tree(3);
        let total_before = tree.node_count();
        collapse_all(&mut tree);
        assert_eq!(tree.children(tree.get_root()).count(), 4);
        assert!(tree.node(tree.get_node("dir1").unwrap()).unwrap().is_collapsed());

        expand_all(&mut tree);
        assert!(!tree.node(tree.get_node("dir1/nested").unwrap()).unwrap().is_collapsed());
        assert_eq!(tree.node_count(), total_before);
        assert_eq!(tree.children(tree.get_node("dir1/nested").unwrap()).count(), 1);
    }
}
