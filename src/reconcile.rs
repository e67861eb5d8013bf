use indextree::NodeId;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

use crate::animation::{AnimationTier, Polar, PolarTween};
use crate::category::NodeCategory;
use crate::radial_layout::RadialLayout;
use crate::tree::{FileTree, NodeKind};

/// Keys sorted into the three reconciliation buckets, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDiff {
    pub entering: Vec<String>,
    pub updating: Vec<String>,
    pub exiting: Vec<String>,
}

impl KeyDiff {
    pub fn between<'a, P, C>(previous: P, current: C) -> Self
    where
        P: IntoIterator<Item = &'a str>,
        C: IntoIterator<Item = &'a str>,
    {
        let previous: Vec<&str> = previous.into_iter().collect();
        let current: Vec<&str> = current.into_iter().collect();
        let previous_set: HashSet<&str> = previous.iter().copied().collect();
        let current_set: HashSet<&str> = current.iter().copied().collect();

        let mut diff = KeyDiff::default();
        let mut seen = HashSet::new();
        for key in &current {
            if !seen.insert(*key) {
                continue;
            }
            if previous_set.contains(key) {
                diff.updating.push(key.to_string());
            } else {
                diff.entering.push(key.to_string());
            }
        }
        let mut seen = HashSet::new();
        for key in previous {
            if !current_set.contains(key) && seen.insert(key) {
                diff.exiting.push(key.to_string());
            }
        }
        diff
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub nodes: KeyDiff,
    pub links: KeyDiff,
}

/// Visual element for a node marker.
#[derive(Debug, Clone)]
pub struct NodeSprite {
    pub key: String,
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub category: NodeCategory,
    pub collapsed: bool,
    pub depth: usize,
    pub tween: PolarTween,
}

/// Visual element for a parent → child connection.
#[derive(Debug, Clone)]
pub struct LinkSprite {
    pub key: String,
    pub source: PolarTween,
    pub target: PolarTween,
}

/// Keeps the drawn elements in step with successive layouts.
///
/// Exits are removed before entering elements are inserted, and a key seen
/// twice in one layout overwrites the earlier element.
pub struct DiagramReconciler {
    nodes: HashMap<String, NodeSprite>,
    node_order: Vec<String>,
    links: HashMap<String, LinkSprite>,
    link_order: Vec<String>,
    skip_above: usize,
}

impl DiagramReconciler {
    pub fn new(skip_above: usize) -> Self {
        Self {
            nodes: HashMap::new(),
            node_order: Vec::new(),
            links: HashMap::new(),
            link_order: Vec::new(),
            skip_above,
        }
    }

    /// Match the current elements against `layout`. A zero `duration`
    /// places everything at its target immediately.
    pub fn reconcile(
        &mut self,
        tree: &FileTree,
        layout: &RadialLayout,
        duration: Duration,
    ) -> ReconcileReport {
        let duration = match AnimationTier::from_item_count(layout.nodes.len(), self.skip_above) {
            AnimationTier::Full => duration,
            AnimationTier::Skip => Duration::ZERO,
        };

        let node_diff = KeyDiff::between(
            self.node_order.iter().map(String::as_str),
            layout.nodes.iter().map(|n| n.key.as_str()),
        );
        for key in &node_diff.exiting {
            self.nodes.remove(key);
        }

        for node in &layout.nodes {
            let target = Polar::new(node.angle, node.radius);
            let Some(data) = tree.node(node.id) else {
                continue;
            };
            match self.nodes.get_mut(&node.key) {
                Some(sprite) => {
                    sprite.id = node.id;
                    sprite.name.clone_from(&data.name);
                    sprite.kind = data.kind;
                    sprite.category = data.category;
                    sprite.collapsed = data.is_collapsed();
                    sprite.depth = node.depth;
                    sprite.tween.retarget(target, duration);
                }
                None => {
                    let sprite = NodeSprite {
                        key: node.key.clone(),
                        id: node.id,
                        name: data.name.clone(),
                        kind: data.kind,
                        category: data.category,
                        collapsed: data.is_collapsed(),
                        depth: node.depth,
                        tween: PolarTween::new(Polar::new(node.angle, 0.0), target, duration),
                    };
                    self.nodes.insert(node.key.clone(), sprite);
                }
            }
        }
        self.node_order = layout.nodes.iter().map(|n| n.key.clone()).collect();

        let link_diff = KeyDiff::between(
            self.link_order.iter().map(String::as_str),
            layout.links.iter().map(|l| l.key.as_str()),
        );
        for key in &link_diff.exiting {
            self.links.remove(key);
        }

        for link in &layout.links {
            let (source, target) = layout.link_endpoints(link);
            let source_at = Polar::new(source.angle, source.radius);
            let target_at = Polar::new(target.angle, target.radius);
            match self.links.get_mut(&link.key) {
                Some(sprite) => {
                    sprite.source.retarget(source_at, duration);
                    sprite.target.retarget(target_at, duration);
                }
                None => {
                    // grows out of the centre
                    let sprite = LinkSprite {
                        key: link.key.clone(),
                        source: PolarTween::new(Polar::new(source.angle, 0.0), source_at, duration),
                        target: PolarTween::new(Polar::new(target.angle, 0.0), target_at, duration),
                    };
                    self.links.insert(link.key.clone(), sprite);
                }
            }
        }
        self.link_order = layout.links.iter().map(|l| l.key.clone()).collect();

        debug!(
            entering = node_diff.entering.len(),
            updating = node_diff.updating.len(),
            exiting = node_diff.exiting.len(),
            "reconciled diagram"
        );

        ReconcileReport {
            nodes: node_diff,
            links: link_diff,
        }
    }

    /// Advance all transitions. Returns true while anything is still moving.
    pub fn tick(&mut self, dt: f32) -> bool {
        let mut moving = false;
        for sprite in self.nodes.values_mut() {
            moving |= sprite.tween.advance(dt);
        }
        for sprite in self.links.values_mut() {
            moving |= sprite.source.advance(dt);
            moving |= sprite.target.advance(dt);
        }
        moving
    }

    pub fn is_animating(&self) -> bool {
        self.nodes.values().any(|s| !s.tween.is_settled())
            || self
                .links
                .values()
                .any(|s| !s.source.is_settled() || !s.target.is_settled())
    }

    /// Snap everything to its target (e.g. when the user interacts mid-transition).
    pub fn finish_immediately(&mut self) {
        for sprite in self.nodes.values_mut() {
            sprite.tween.finish();
        }
        for sprite in self.links.values_mut() {
            sprite.source.finish();
            sprite.target.finish();
        }
    }

    /// Node sprites in layout order, root first.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeSprite> {
        self.node_order.iter().filter_map(|key| self.nodes.get(key))
    }

    pub fn links(&self) -> impl Iterator<Item = &LinkSprite> {
        self.link_order.iter().filter_map(|key| self.links.get(key))
    }

    pub fn node(&self, key: &str) -> Option<&NodeSprite> {
        self.nodes.get(key)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}
