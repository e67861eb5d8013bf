//! Folder "territory" overlays.
//!
//! Every branch gets an axis-aligned envelope over the Cartesian projections
//! of its active descendant leaves. The renderer draws it as a closed curve
//! behind the folder's subtree.

use glam::Vec2;
use indextree::NodeId;
use std::collections::HashMap;

use crate::radial_layout::RadialLayout;
use crate::tree::{FileTree, NodeKind};

/// Extremal corners of a subtree's rendered leaves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayEnvelope {
    pub min: Vec2,
    pub max: Vec2,
}

impl OverlayEnvelope {
    /// All four corners at one point.
    pub fn degenerate(at: Vec2) -> Self {
        Self { min: at, max: at }
    }

    pub fn from_points<I: IntoIterator<Item = Vec2>>(points: I) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::degenerate(first), |env, p| Self {
            min: env.min.min(p),
            max: env.max.max(p),
        }))
    }

    /// Top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> [Vec2; 4] {
        [
            self.min,
            Vec2::new(self.max.x, self.min.y),
            self.max,
            Vec2::new(self.min.x, self.max.y),
        ]
    }

    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn padded(&self, pad: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(pad),
            max: self.max + Vec2::splat(pad),
        }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Closed Catmull-Rom curve through the four corners, `samples` points
    /// per edge. A degenerate envelope yields its single point.
    pub fn outline(&self, samples: usize) -> Vec<Vec2> {
        if self.is_degenerate() {
            return vec![self.min];
        }
        closed_catmull_rom(&self.corners(), samples.max(1))
    }
}

/// What a subtree contributes to its parent's envelope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extent {
    Point(Vec2),
    Envelope(OverlayEnvelope),
}

impl Extent {
    fn points(&self) -> Vec<Vec2> {
        match self {
            Extent::Point(p) => vec![*p],
            Extent::Envelope(env) => env.corners().to_vec(),
        }
    }
}

/// Post-order envelope of one node.
///
/// A leaf yields its own projection. A branch reduces its active children's
/// extents to a min/max box; with no active children it yields a degenerate
/// envelope at its own position.
pub fn compute_envelope(tree: &FileTree, id: NodeId, positions: &HashMap<NodeId, Vec2>) -> Extent {
    let own = positions.get(&id).copied().unwrap_or(Vec2::ZERO);
    match tree.node(id).map(|n| n.kind) {
        Some(NodeKind::Leaf) | None => Extent::Point(own),
        Some(NodeKind::Branch) => {
            let points: Vec<Vec2> = tree
                .children(id)
                .flat_map(|child| compute_envelope(tree, child, positions).points())
                .collect();
            let envelope =
                OverlayEnvelope::from_points(points).unwrap_or(OverlayEnvelope::degenerate(own));
            Extent::Envelope(envelope)
        }
    }
}

/// Envelopes for every branch in a layout, in one bottom-up pass.
pub fn compute_overlays(tree: &FileTree, layout: &RadialLayout) -> HashMap<NodeId, OverlayEnvelope> {
    compute_overlays_at(tree, layout, &HashMap::new())
}

/// Like [`compute_overlays`], but nodes found in `positions` are placed
/// there instead of at their layout target.
pub fn compute_overlays_at(
    tree: &FileTree,
    layout: &RadialLayout,
    positions: &HashMap<NodeId, Vec2>,
) -> HashMap<NodeId, OverlayEnvelope> {
    let mut boxes: HashMap<NodeId, OverlayEnvelope> = HashMap::with_capacity(layout.nodes.len());
    let mut overlays = HashMap::new();

    // layout.nodes is breadth-first, so reversed it visits children first
    for node in layout.nodes.iter().rev() {
        let own = positions.get(&node.id).copied().unwrap_or_else(|| node.position());
        let is_branch = tree.node(node.id).map(|n| n.is_branch()).unwrap_or(false);
        if !is_branch {
            boxes.insert(node.id, OverlayEnvelope::degenerate(own));
            continue;
        }

        let envelope = tree
            .children(node.id)
            .filter_map(|child| boxes.get(&child))
            .fold(None, |acc: Option<OverlayEnvelope>, child| {
                Some(match acc {
                    None => *child,
                    Some(env) => OverlayEnvelope {
                        min: env.min.min(child.min),
                        max: env.max.max(child.max),
                    },
                })
            })
            .unwrap_or(OverlayEnvelope::degenerate(own));

        boxes.insert(node.id, envelope);
        overlays.insert(node.id, envelope);
    }
    overlays
}

fn closed_catmull_rom(points: &[Vec2], samples: usize) -> Vec<Vec2> {
    let n = points.len();
    let mut out = Vec::with_capacity(n * samples);
    for i in 0..n {
        let p0 = points[(i + n - 1) % n];
        let p1 = points[i];
        let p2 = points[(i + 1) % n];
        let p3 = points[(i + 2) % n];
        for s in 0..samples {
            let t = s as f32 / samples as f32;
            let t2 = t * t;
            let t3 = t2 * t;
            out.push(
                0.5 * (2.0 * p1
                    + (p2 - p0) * t
                    + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
                    + (3.0 * p1 - p0 - 3.0 * p2 + p3) * t3),
            );
        }
    }
    out
}
