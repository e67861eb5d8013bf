use indextree::{Arena, NodeId};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::category::NodeCategory;
use crate::record::{EntryKind, PathRecord};

/// Name of the synthetic root node.
pub const ROOT_NAME: &str = "root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A file. Never has children.
    Leaf,
    /// A directory.
    Branch,
}

impl From<EntryKind> for NodeKind {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::Blob => NodeKind::Leaf,
            EntryKind::Tree => NodeKind::Branch,
        }
    }
}

/// Expand/collapse state of a branch.
///
/// A child is either attached under its parent in the arena (active) or
/// listed in `Collapsed`, never both.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Expansion {
    #[default]
    Expanded,
    /// Children detached from the arena, in their original order.
    Collapsed(Vec<NodeId>),
}

/// Represents a file or folder in the repository tree
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub name: String,
    pub kind: NodeKind,
    pub category: NodeCategory,
    pub content_hash: Option<String>,
    pub mode: Option<String>,
    expansion: Expansion,
}

impl TreeNode {
    fn new(name: &str, kind: NodeKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            category: NodeCategory::classify(name, kind == NodeKind::Branch),
            content_hash: None,
            mode: None,
            expansion: Expansion::Expanded,
        }
    }

    pub fn is_branch(&self) -> bool {
        self.kind == NodeKind::Branch
    }

    pub fn expansion(&self) -> &Expansion {
        &self.expansion
    }

    pub fn is_collapsed(&self) -> bool {
        matches!(self.expansion, Expansion::Collapsed(_))
    }

    /// Children set aside by a collapse, empty when expanded.
    pub fn shelved_children(&self) -> &[NodeId] {
        match &self.expansion {
            Expansion::Expanded => &[],
            Expansion::Collapsed(children) => children,
        }
    }
}

/// Two records named the same path with different kinds. The first one wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameConflict {
    pub path: String,
    pub existing: NodeKind,
    pub incoming: NodeKind,
}

/// Repository hierarchy stored in an arena.
///
/// Active children are the arena children of a node; shelved children are
/// detached and owned by the parent's `Expansion::Collapsed` list.
pub struct FileTree {
    arena: Arena<TreeNode>,
    root: NodeId,
    path_to_node: HashMap<String, NodeId>,
    conflicts: Vec<NameConflict>,
    skipped_records: usize,
}

impl Default for FileTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTree {
    /// Create an empty tree holding only the synthetic root
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(TreeNode::new(ROOT_NAME, NodeKind::Branch));
        Self {
            arena,
            root,
            path_to_node: HashMap::new(),
            conflicts: Vec::new(),
            skipped_records: 0,
        }
    }

    /// Fold a flat record list into a rooted hierarchy.
    pub fn from_records(records: &[PathRecord]) -> Self {
        let mut tree = Self::new();
        for record in records {
            tree.insert(record);
        }
        debug!(
            records = records.len(),
            nodes = tree.node_count(),
            conflicts = tree.conflicts.len(),
            skipped = tree.skipped_records,
            "built file tree"
        );
        tree
    }

    /// Insert one record, creating intermediate folders on demand.
    pub fn insert(&mut self, record: &PathRecord) {
        let segments: Vec<&str> = record.segments().collect();
        if segments.is_empty() {
            self.skipped_records += 1;
            debug!(path = %record.path, "skipping record without path segments");
            return;
        }

        let last = segments.len() - 1;
        let mut parent = self.root;
        let mut prefix = String::new();

        for (i, segment) in segments.iter().enumerate() {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);

            let wanted = if i == last {
                NodeKind::from(record.kind)
            } else {
                NodeKind::Branch
            };

            if let Some(&existing) = self.path_to_node.get(&prefix) {
                let existing_kind = self.arena[existing].get().kind;
                if existing_kind != wanted {
                    warn!(
                        path = %prefix,
                        existing = ?existing_kind,
                        incoming = ?wanted,
                        "name conflict between file and folder, keeping the first"
                    );
                    self.conflicts.push(NameConflict {
                        path: prefix,
                        existing: existing_kind,
                        incoming: wanted,
                    });
                    return;
                }
                parent = existing;
                continue;
            }

            let mut node = TreeNode::new(segment, wanted);
            if i == last {
                node.content_hash = record.content_hash.clone();
                node.mode = record.mode.clone();
            }
            let node_id = self.arena.new_node(node);
            parent.append(node_id, &mut self.arena);
            self.path_to_node.insert(prefix.clone(), node_id);
            parent = node_id;
        }
    }

    pub fn get_root(&self) -> NodeId {
        self.root
    }

    pub fn get_arena(&self) -> &Arena<TreeNode> {
        &self.arena
    }

    /// Look up a node by its slash-delimited path.
    pub fn get_node(&self, path: &str) -> Option<NodeId> {
        let normalized: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if normalized.is_empty() {
            return Some(self.root);
        }
        self.path_to_node.get(&normalized.join("/")).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.arena.get(id).map(|node| node.get())
    }

    /// Active (non-shelved) children in order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    pub fn active_child_count(&self, id: NodeId) -> usize {
        id.children(&self.arena).count()
    }

    /// Parent through active links only; `None` for the root and for the top
    /// of a shelved subtree.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id).and_then(|node| node.parent())
    }

    /// Reconciliation identity: the root's own name, otherwise the parent's
    /// name joined with the node's name.
    pub fn stable_key(&self, id: NodeId) -> String {
        let name = self.node(id).map(|n| n.name.as_str()).unwrap_or_default();
        match self.parent(id).and_then(|parent| self.node(parent)) {
            Some(parent) => format!("{}/{}", parent.name, name),
            None => name.to_string(),
        }
    }

    /// Nodes excluding the synthetic root, active and shelved.
    pub fn node_count(&self) -> usize {
        self.arena.iter().filter(|node| !node.is_removed()).count() - 1
    }

    /// Leaves, active and shelved.
    pub fn leaf_count(&self) -> usize {
        self.arena
            .iter()
            .filter(|node| !node.is_removed() && node.get().kind == NodeKind::Leaf)
            .count()
    }

    pub fn conflicts(&self) -> &[NameConflict] {
        &self.conflicts
    }

    pub fn skipped_records(&self) -> usize {
        self.skipped_records
    }

    /// Detach all active children and remember them. Returns how many were shelved.
    pub(crate) fn shelve_children(&mut self, id: NodeId) -> usize {
        let children: Vec<NodeId> = id.children(&self.arena).collect();
        if children.is_empty() {
            return 0;
        }
        for child in &children {
            child.detach(&mut self.arena);
        }
        let count = children.len();
        if let Some(node) = self.arena.get_mut(id) {
            node.get_mut().expansion = Expansion::Collapsed(children);
        }
        count
    }

    /// Re-attach shelved children in their original order.
    pub(crate) fn restore_children(&mut self, id: NodeId) -> usize {
        let shelved = match self.arena.get_mut(id) {
            Some(node) => std::mem::take(&mut node.get_mut().expansion),
            None => return 0,
        };
        let Expansion::Collapsed(children) = shelved else {
            return 0;
        };
        let count = children.len();
        for child in children {
            id.append(child, &mut self.arena);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<PathRecord> {
        vec![
            PathRecord::blob("src/index.ts"),
            PathRecord::blob("src/utils/helper.ts"),
            PathRecord::blob("README.md"),
        ]
    }

    fn names(tree: &FileTree, id: NodeId) -> Vec<String> {
        tree.children(id)
            .map(|child| tree.node(child).unwrap().name.clone())
            .collect()
    }

    /// (depth, name, kind, category) in pre-order over active children.
    fn structure(tree: &FileTree) -> Vec<(usize, String, NodeKind, NodeCategory)> {
        let mut out = Vec::new();
        let mut stack = vec![(tree.get_root(), 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let node = tree.node(id).unwrap();
            out.push((depth, node.name.clone(), node.kind, node.category));
            let children: Vec<_> = tree.children(id).collect();
            for child in children.into_iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        out
    }

    #[test]
    fn test_tree_basic() {
        let tree = FileTree::from_records(&sample_records());
        let root = tree.get_root();

        assert_eq!(names(&tree, root), vec!["src", "README.md"]);

        let src = tree.get_node("src").unwrap();
        assert_eq!(tree.node(src).unwrap().kind, NodeKind::Branch);
        assert_eq!(names(&tree, src), vec!["index.ts", "utils"]);

        let index = tree.node(tree.get_node("src/index.ts").unwrap()).unwrap();
        assert_eq!(index.kind, NodeKind::Leaf);
        assert_eq!(index.category, NodeCategory::Build);

        let helper = tree.node(tree.get_node("src/utils/helper.ts").unwrap()).unwrap();
        assert_eq!(helper.category, NodeCategory::Build);

        let readme = tree.node(tree.get_node("README.md").unwrap()).unwrap();
        assert_eq!(readme.category, NodeCategory::Config);

        assert_eq!(tree.node_count(), 5);
        assert_eq!(tree.leaf_count(), 3);
    }

    #[test]
    fn test_counts_match_records() {
        let records = vec![
            PathRecord::tree("src"),
            PathRecord::blob("src/main.rs"),
            PathRecord::tree("src/bin"),
            PathRecord::blob("src/bin/tool.rs"),
            PathRecord::blob("docs/guide/intro.md"),
            PathRecord::blob("Cargo.toml"),
        ];
        let tree = FileTree::from_records(&records);

        let blobs = records.iter().filter(|r| r.kind == EntryKind::Blob).count();
        assert_eq!(tree.leaf_count(), blobs);
        // src, src/main.rs, src/bin, src/bin/tool.rs, docs, docs/guide,
        // docs/guide/intro.md, Cargo.toml
        assert_eq!(tree.node_count(), 8);
    }

    #[test]
    fn test_tree_record_reuses_existing_folder() {
        let records = vec![PathRecord::blob("src/lib.rs"), PathRecord::tree("src")];
        let tree = FileTree::from_records(&records);
        assert_eq!(names(&tree, tree.get_root()), vec!["src"]);
        assert!(tree.conflicts().is_empty());
    }

    #[test]
    fn test_build_is_idempotent() {
        let a = FileTree::from_records(&sample_records());
        let b = FileTree::from_records(&sample_records());
        assert_eq!(structure(&a), structure(&b));
    }

    #[test]
    fn test_empty_segments_are_skipped() {
        let records = vec![
            PathRecord::blob(""),
            PathRecord::blob("//"),
            PathRecord::blob("a//b.txt"),
        ];
        let tree = FileTree::from_records(&records);
        assert_eq!(tree.skipped_records(), 2);
        assert!(tree.get_node("a/b.txt").is_some());
        assert_eq!(tree.node_count(), 2);
    }

    #[test]
    fn test_conflict_first_writer_wins() {
        let records = vec![
            PathRecord::blob("x"),
            PathRecord::blob("x/inner.rs"),
            PathRecord::tree("x"),
        ];
        let tree = FileTree::from_records(&records);

        let x = tree.get_node("x").unwrap();
        assert_eq!(tree.node(x).unwrap().kind, NodeKind::Leaf);
        assert_eq!(tree.children(x).count(), 0);
        assert_eq!(tree.conflicts().len(), 2);
        assert_eq!(
            tree.conflicts()[0],
            NameConflict {
                path: "x".to_string(),
                existing: NodeKind::Leaf,
                incoming: NodeKind::Branch,
            }
        );
    }

    #[test]
    fn test_stable_keys() {
        let tree = FileTree::from_records(&sample_records());
        assert_eq!(tree.stable_key(tree.get_root()), "root");
        assert_eq!(tree.stable_key(tree.get_node("src").unwrap()), "root/src");
        assert_eq!(
            tree.stable_key(tree.get_node("src/utils/helper.ts").unwrap()),
            "utils/helper.ts"
        );
    }

    #[test]
    fn test_record_metadata_lands_on_leaf() {
        let records = vec![PathRecord::blob("bin/run.sh").with_hash("deadbeef").with_mode("100755")];
        let tree = FileTree::from_records(&records);

        let leaf = tree.node(tree.get_node("bin/run.sh").unwrap()).unwrap();
        assert_eq!(leaf.content_hash.as_deref(), Some("deadbeef"));
        assert_eq!(leaf.mode.as_deref(), Some("100755"));

        let folder = tree.node(tree.get_node("bin").unwrap()).unwrap();
        assert!(folder.content_hash.is_none());
    }

    #[test]
    fn test_empty_tree() {
        let tree = FileTree::from_records(&[]);
        assert_eq!(tree.node_count(), 0);
        assert_eq!(tree.children(tree.get_root()).count(), 0);
        assert_eq!(tree.get_node(""), Some(tree.get_root()));
    }
}
