use glam::Vec2;
use indextree::NodeId;
use std::collections::HashMap;
use std::f32::consts::TAU;
use tracing::debug;

use crate::config::{LayoutConfig, RadiusMode};
use crate::tree::FileTree;

/// A laid-out node. Regenerated on every pass.
#[derive(Debug, Clone)]
pub struct PositionedNode {
    pub id: NodeId,
    /// Reconciliation identity, see [`FileTree::stable_key`].
    pub key: String,
    /// Radians in [0, 2π).
    pub angle: f32,
    /// Distance from the centre, monotonic with depth.
    pub radius: f32,
    pub depth: usize,
}

impl PositionedNode {
    pub fn position(&self) -> Vec2 {
        polar_to_cartesian(self.angle, self.radius)
    }
}

/// Parent → child connection, by index into [`RadialLayout::nodes`].
#[derive(Debug, Clone)]
pub struct Link {
    pub source: usize,
    pub target: usize,
    pub key: String,
}

/// Output of one layout pass over the active tree.
#[derive(Debug, Clone, Default)]
pub struct RadialLayout {
    /// Breadth-first, root first.
    pub nodes: Vec<PositionedNode>,
    pub links: Vec<Link>,
    index: HashMap<NodeId, usize>,
}

impl RadialLayout {
    pub fn get(&self, id: NodeId) -> Option<&PositionedNode> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Cartesian projection of every node.
    pub fn positions(&self) -> HashMap<NodeId, Vec2> {
        self.nodes.iter().map(|n| (n.id, n.position())).collect()
    }

    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// Largest distance from the centre.
    pub fn extent(&self) -> f32 {
        self.nodes.iter().map(|n| n.radius).fold(0.0, f32::max)
    }

    pub fn link_endpoints(&self, link: &Link) -> (&PositionedNode, &PositionedNode) {
        (&self.nodes[link.source], &self.nodes[link.target])
    }
}

/// `x = r·cos(θ)`, `y = r·sin(θ)`.
pub fn polar_to_cartesian(angle: f32, radius: f32) -> Vec2 {
    Vec2::new(angle.cos() * radius, angle.sin() * radius)
}

/// Scratch state for the tidy-tree walk (Reingold–Tilford with Buchheim's
/// linear-time apportioning). Indices point into the walk vector.
#[derive(Debug)]
struct WalkNode {
    id: NodeId,
    parent: Option<usize>,
    children: Vec<usize>,
    depth: usize,
    /// Position among siblings.
    number: usize,
    prelim: f32,
    modifier: f32,
    change: f32,
    shift: f32,
    thread: Option<usize>,
    ancestor: usize,
    /// Default ancestor for apportioning this node's children.
    default_ancestor: Option<usize>,
}

impl WalkNode {
    fn new(id: NodeId, parent: Option<usize>, depth: usize, number: usize, index: usize) -> Self {
        Self {
            id,
            parent,
            children: Vec::new(),
            depth,
            number,
            prelim: 0.0,
            modifier: 0.0,
            change: 0.0,
            shift: 0.0,
            thread: None,
            ancestor: index,
            default_ancestor: None,
        }
    }
}

struct TidyWalk<'a> {
    nodes: Vec<WalkNode>,
    options: &'a LayoutConfig,
}

impl<'a> TidyWalk<'a> {
    /// Breadth-first copy of the active tree, so every parent precedes its
    /// children.
    fn new(tree: &FileTree, options: &'a LayoutConfig) -> Self {
        let mut nodes = vec![WalkNode::new(tree.get_root(), None, 0, 0, 0)];
        let mut i = 0;
        while i < nodes.len() {
            let id = nodes[i].id;
            let depth = nodes[i].depth;
            for (number, child) in tree.children(id).enumerate() {
                let index = nodes.len();
                nodes.push(WalkNode::new(child, Some(i), depth + 1, number, index));
                nodes[i].children.push(index);
            }
            i += 1;
        }
        Self { nodes, options }
    }

    /// Sibling gap is tighter than the gap between cousins; both shrink
    /// with depth.
    fn separation(&self, a: usize, b: usize) -> f32 {
        let base = if self.nodes[a].parent == self.nodes[b].parent {
            self.options.sibling_separation
        } else {
            self.options.cousin_separation
        };
        base / self.nodes[a].depth.max(1) as f32
    }

    fn next_left(&self, v: usize) -> Option<usize> {
        self.nodes[v].children.first().copied().or(self.nodes[v].thread)
    }

    fn next_right(&self, v: usize) -> Option<usize> {
        self.nodes[v].children.last().copied().or(self.nodes[v].thread)
    }

    fn left_sibling(&self, v: usize) -> Option<usize> {
        let node = &self.nodes[v];
        let parent = node.parent?;
        if node.number == 0 {
            None
        } else {
            Some(self.nodes[parent].children[node.number - 1])
        }
    }

    /// Children before parents, left to right.
    fn post_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![0];
        while let Some(v) = stack.pop() {
            order.push(v);
            stack.extend(self.nodes[v].children.iter().copied());
        }
        order.reverse();
        order
    }

    fn first_walk(&mut self, v: usize) {
        let left = self.left_sibling(v);

        if let (Some(&first), Some(&last)) =
            (self.nodes[v].children.first(), self.nodes[v].children.last())
        {
            self.execute_shifts(v);
            let midpoint = (self.nodes[first].prelim + self.nodes[last].prelim) / 2.0;
            match left {
                Some(w) => {
                    let prelim = self.nodes[w].prelim + self.separation(v, w);
                    self.nodes[v].prelim = prelim;
                    self.nodes[v].modifier = prelim - midpoint;
                }
                None => self.nodes[v].prelim = midpoint,
            }
        } else if let Some(w) = left {
            self.nodes[v].prelim = self.nodes[w].prelim + self.separation(v, w);
        }

        if let Some(parent) = self.nodes[v].parent {
            let default = self.nodes[parent]
                .default_ancestor
                .unwrap_or(self.nodes[parent].children[0]);
            let ancestor = self.apportion(v, left, default);
            self.nodes[parent].default_ancestor = Some(ancestor);
        }
    }

    /// Push `v`'s subtree right until its left contour clears the right
    /// contour of the subtrees to its left.
    fn apportion(&mut self, v: usize, left: Option<usize>, mut ancestor: usize) -> usize {
        let Some(w) = left else {
            return ancestor;
        };
        let Some(parent) = self.nodes[v].parent else {
            return ancestor;
        };

        let mut vop = v;
        let mut vom = self.nodes[parent].children[0];
        let mut sip = self.nodes[v].modifier;
        let mut sop = self.nodes[v].modifier;
        let mut sim = self.nodes[w].modifier;
        let mut som = self.nodes[vom].modifier;

        let mut vim_next = self.next_right(w);
        let mut vip_next = self.next_left(v);

        while let (Some(vim), Some(vip)) = (vim_next, vip_next) {
            let (Some(next_vom), Some(next_vop)) = (self.next_left(vom), self.next_right(vop))
            else {
                break;
            };
            vom = next_vom;
            vop = next_vop;
            self.nodes[vop].ancestor = v;

            let shift = self.nodes[vim].prelim + sim - self.nodes[vip].prelim - sip
                + self.separation(vim, vip);
            if shift > 0.0 {
                let wm = self.next_ancestor(vim, v, ancestor);
                self.move_subtree(wm, v, shift);
                sip += shift;
                sop += shift;
            }

            sim += self.nodes[vim].modifier;
            sip += self.nodes[vip].modifier;
            som += self.nodes[vom].modifier;
            sop += self.nodes[vop].modifier;

            vim_next = self.next_right(vim);
            vip_next = self.next_left(vip);
        }

        if let Some(vim) = vim_next {
            if self.next_right(vop).is_none() {
                self.nodes[vop].thread = Some(vim);
                self.nodes[vop].modifier += sim - sop;
            }
        }
        if let Some(vip) = vip_next {
            if self.next_left(vom).is_none() {
                self.nodes[vom].thread = Some(vip);
                self.nodes[vom].modifier += sip - som;
                ancestor = v;
            }
        }
        ancestor
    }

    fn next_ancestor(&self, vim: usize, v: usize, ancestor: usize) -> usize {
        let candidate = self.nodes[vim].ancestor;
        if self.nodes[candidate].parent == self.nodes[v].parent {
            candidate
        } else {
            ancestor
        }
    }

    fn move_subtree(&mut self, wm: usize, wp: usize, shift: f32) {
        let subtrees = self.nodes[wp].number.saturating_sub(self.nodes[wm].number).max(1);
        let change = shift / subtrees as f32;
        self.nodes[wp].change -= change;
        self.nodes[wp].shift += shift;
        self.nodes[wm].change += change;
        self.nodes[wp].prelim += shift;
        self.nodes[wp].modifier += shift;
    }

    fn execute_shifts(&mut self, v: usize) {
        let mut shift = 0.0;
        let mut change = 0.0;
        for k in (0..self.nodes[v].children.len()).rev() {
            let w = self.nodes[v].children[k];
            self.nodes[w].prelim += shift;
            self.nodes[w].modifier += shift;
            change += self.nodes[w].change;
            shift += self.nodes[w].shift + change;
        }
    }

    /// Run both walks and return each node's unscaled horizontal position.
    fn solve(&mut self) -> Vec<f32> {
        for v in self.post_order() {
            self.first_walk(v);
        }

        let mut x = vec![0.0; self.nodes.len()];
        let root_shift = -self.nodes[0].prelim;
        x[0] = self.nodes[0].prelim + root_shift;
        self.nodes[0].modifier += root_shift;
        for v in 1..self.nodes.len() {
            let Some(parent) = self.nodes[v].parent else {
                continue;
            };
            let parent_modifier = self.nodes[parent].modifier;
            x[v] = self.nodes[v].prelim + parent_modifier;
            self.nodes[v].modifier += parent_modifier;
        }
        x
    }
}

/// Lay out the active tree on a radial grid.
///
/// Collapsed subtrees contribute no nodes or links. A root with no active
/// children sits at angle 0, distance 0.
pub fn layout(tree: &FileTree, canvas_radius: f32, options: &LayoutConfig) -> RadialLayout {
    let mut walk = TidyWalk::new(tree, options);

    if walk.nodes.len() == 1 {
        let root = tree.get_root();
        let mut index = HashMap::new();
        index.insert(root, 0);
        return RadialLayout {
            nodes: vec![PositionedNode {
                id: root,
                key: tree.stable_key(root),
                angle: 0.0,
                radius: 0.0,
                depth: 0,
            }],
            links: Vec::new(),
            index,
        };
    }

    let x = walk.solve();

    let mut left = 0;
    let mut right = 0;
    let mut bottom_depth = 0;
    for (v, node) in walk.nodes.iter().enumerate() {
        if x[v] < x[left] {
            left = v;
        }
        if x[v] > x[right] {
            right = v;
        }
        bottom_depth = bottom_depth.max(node.depth);
    }

    // Half a gap on either side of the extremes, so the seam between the
    // last and first node looks like any other gap.
    let padding = if left == right {
        1.0
    } else {
        walk.separation(left, right) / 2.0
    };
    let tx = padding - x[left];
    let kx = TAU / (x[right] + padding + tx);
    let ky = match options.radius {
        RadiusMode::Fixed => options.level_spacing,
        RadiusMode::Normalized => canvas_radius / bottom_depth.max(1) as f32,
    };

    let mut nodes = Vec::with_capacity(walk.nodes.len());
    let mut index = HashMap::with_capacity(walk.nodes.len());
    for (v, walk_node) in walk.nodes.iter().enumerate() {
        index.insert(walk_node.id, v);
        nodes.push(PositionedNode {
            id: walk_node.id,
            key: tree.stable_key(walk_node.id),
            angle: ((x[v] + tx) * kx).rem_euclid(TAU),
            radius: walk_node.depth as f32 * ky,
            depth: walk_node.depth,
        });
    }

    let links = walk
        .nodes
        .iter()
        .enumerate()
        .filter_map(|(target, walk_node)| {
            let source = walk_node.parent?;
            Some(Link {
                source,
                target,
                key: format!("{}_{}", nodes[source].key, nodes[target].key),
            })
        })
        .collect::<Vec<_>>();

    debug!(
        nodes = nodes.len(),
        links = links.len(),
        depth = bottom_depth,
        "radial layout pass"
    );

    RadialLayout {
        nodes,
        links,
        index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand_state::CollapseController;
    use crate::record::PathRecord;

    fn options(sibling: f32, cousin: f32) -> LayoutConfig {
        LayoutConfig {
            sibling_separation: sibling,
            cousin_separation: cousin,
            ..LayoutConfig::default()
        }
    }

    fn angle_of(tree: &FileTree, layout: &RadialLayout, path: &str) -> f32 {
        layout.get(tree.get_node(path).unwrap()).unwrap().angle
    }

    #[test]
    fn test_single_node_tree() {
        let tree = FileTree::from_records(&[]);
        let layout = layout(&tree, 400.0, &LayoutConfig::default());

        assert_eq!(layout.nodes.len(), 1);
        assert!(layout.links.is_empty());
        assert_eq!(layout.nodes[0].angle, 0.0);
        assert_eq!(layout.nodes[0].radius, 0.0);
        assert_eq!(layout.nodes[0].depth, 0);
    }

    #[test]
    fn test_scenario_node_and_link_counts() {
        let records = vec![
            PathRecord::blob("src/index.ts"),
            PathRecord::blob("src/utils/helper.ts"),
            PathRecord::blob("README.md"),
        ];
        let tree = FileTree::from_records(&records);
        let layout = layout(&tree, 400.0, &LayoutConfig::default());

        assert_eq!(layout.nodes.len(), 6);
        assert_eq!(layout.links.len(), 5);
        assert_eq!(layout.nodes[0].id, tree.get_root());
        for link in &layout.links {
            let (source, target) = layout.link_endpoints(link);
            assert_eq!(source.depth + 1, target.depth);
            assert_eq!(tree.parent(target.id), Some(source.id));
        }
    }

    #[test]
    fn test_siblings_tighter_than_cousins() {
        let records = vec![
            PathRecord::blob("p/a.rs"),
            PathRecord::blob("p/b.rs"),
            PathRecord::blob("q/c.rs"),
        ];
        let tree = FileTree::from_records(&records);
        let layout = layout(&tree, 400.0, &options(2.0, 15.0));

        let a = angle_of(&tree, &layout, "p/a.rs");
        let b = angle_of(&tree, &layout, "p/b.rs");
        let c = angle_of(&tree, &layout, "q/c.rs");

        let sibling_gap = b - a;
        let cousin_gap = c - b;
        assert!(sibling_gap > 0.0);
        assert!(sibling_gap < cousin_gap, "{sibling_gap} !< {cousin_gap}");
        assert!((cousin_gap / sibling_gap - 7.5).abs() < 1e-3);
    }

    #[test]
    fn test_parent_centred_over_children() {
        let records = vec![
            PathRecord::blob("p/a.rs"),
            PathRecord::blob("p/b.rs"),
            PathRecord::blob("p/c.rs"),
            PathRecord::blob("q/d.rs"),
            PathRecord::blob("q/e/f.rs"),
        ];
        let tree = FileTree::from_records(&records);
        let layout = layout(&tree, 400.0, &LayoutConfig::default());

        let p = angle_of(&tree, &layout, "p");
        let a = angle_of(&tree, &layout, "p/a.rs");
        let c = angle_of(&tree, &layout, "p/c.rs");
        assert!((p - (a + c) / 2.0).abs() < 1e-4);

        let q = angle_of(&tree, &layout, "q");
        let d = angle_of(&tree, &layout, "q/d.rs");
        let e = angle_of(&tree, &layout, "q/e");
        assert!((q - (d + e) / 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_no_overlap_within_a_ring() {
        let mut records = Vec::new();
        for dir in 0..6 {
            for file in 0..(dir + 1) {
                records.push(PathRecord::blob(format!("d{dir}/s{file}/f.rs")));
            }
        }
        let tree = FileTree::from_records(&records);
        let layout = layout(&tree, 400.0, &LayoutConfig::default());

        for depth in 1..=layout.max_depth() {
            let mut angles: Vec<f32> = layout
                .nodes
                .iter()
                .filter(|n| n.depth == depth)
                .map(|n| n.angle)
                .collect();
            angles.sort_by(|a, b| a.partial_cmp(b).unwrap());
            for pair in angles.windows(2) {
                assert!(pair[1] - pair[0] > 1e-4, "overlap at depth {depth}");
            }
        }
        assert!(layout.nodes.iter().all(|n| n.angle >= 0.0 && n.angle < TAU));
    }

    #[test]
    fn test_radius_modes() {
        let records = vec![PathRecord::blob("a/b/c.rs"), PathRecord::blob("x.rs")];
        let tree = FileTree::from_records(&records);

        let fixed = layout(&tree, 400.0, &LayoutConfig::default());
        let leaf = fixed.get(tree.get_node("a/b/c.rs").unwrap()).unwrap();
        assert_eq!(leaf.radius, 3.0 * LayoutConfig::default().level_spacing);

        let normalized_options = LayoutConfig {
            radius: RadiusMode::Normalized,
            ..LayoutConfig::default()
        };
        let normalized = layout(&tree, 300.0, &normalized_options);
        let leaf = normalized.get(tree.get_node("a/b/c.rs").unwrap()).unwrap();
        assert!((leaf.radius - 300.0).abs() < 1e-3);
        let x = normalized.get(tree.get_node("x.rs").unwrap()).unwrap();
        assert!((x.radius - 100.0).abs() < 1e-3);
        assert!((normalized.extent() - 300.0).abs() < 1e-3);
    }

    #[test]
    fn test_collapsed_subtree_is_excluded() {
        let records = vec![
            PathRecord::blob("src/a.rs"),
            PathRecord::blob("src/b.rs"),
            PathRecord::blob("README.md"),
        ];
        let mut tree = FileTree::from_records(&records);
        let src = tree.get_node("src").unwrap();
        CollapseController::new(20).toggle(&mut tree, src);

        let layout = layout(&tree, 400.0, &LayoutConfig::default());
        assert_eq!(layout.nodes.len(), 3);
        assert_eq!(layout.links.len(), 2);
        assert!(layout.get(tree.get_node("src/a.rs").unwrap()).is_none());
    }

    #[test]
    fn test_link_keys_join_stable_keys() {
        let tree = FileTree::from_records(&[PathRecord::blob("src/main.rs")]);
        let layout = layout(&tree, 400.0, &LayoutConfig::default());
        let keys: Vec<&str> = layout.links.iter().map(|l| l.key.as_str()).collect();
        assert_eq!(keys, vec!["root_root/src", "root/src_src/main.rs"]);
    }

    #[test]
    fn test_polar_projection() {
        let p = polar_to_cartesian(std::f32::consts::FRAC_PI_2, 10.0);
        assert!(p.x.abs() < 1e-4);
        assert!((p.y - 10.0).abs() < 1e-4);
    }
}
