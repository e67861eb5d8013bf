//! The diagram a view layer renders: owns the current tree, its layout and
//! overlays, and the reconciled visual elements. Every interaction funnels
//! through here and ends in a re-layout plus reconciliation.

use glam::Vec2;
use indextree::NodeId;
use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::category::FOLDER_RGB;
use crate::config::{Config, LayoutConfig};
use crate::expand_state::{self, CollapseController, Toggle};
use crate::overlay::{compute_overlays, compute_overlays_at, OverlayEnvelope};
use crate::radial_layout::{layout, RadialLayout};
use crate::reconcile::{DiagramReconciler, LinkSprite, NodeSprite};
use crate::tree::{FileTree, NodeKind};

pub const MARKER_RADIUS: f32 = 5.0;
pub const HOVER_MARKER_RADIUS: f32 = 10.0;
pub const LABEL_OFFSET: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelAnchor {
    /// Text starts at the anchor and runs away from the centre line.
    Start,
    /// Text ends at the anchor.
    End,
}

#[derive(Debug, Clone)]
pub struct Label {
    pub key: String,
    pub text: String,
    /// World position of the node the label belongs to.
    pub position: Vec2,
    /// Horizontal screen-space offset from the marker.
    pub offset: f32,
    pub anchor: LabelAnchor,
}

pub struct RadialDiagram {
    tree: FileTree,
    controller: CollapseController,
    layout_options: LayoutConfig,
    duration: Duration,
    canvas_radius: f32,
    layout: RadialLayout,
    overlays: HashMap<NodeId, OverlayEnvelope>,
    reconciler: DiagramReconciler,
    hovered: Option<NodeId>,
}

impl RadialDiagram {
    /// Lay out a freshly built tree for a `width` x `height` surface.
    ///
    /// Wide folders are auto-collapsed after the first layout and the first
    /// paint is not animated.
    pub fn render(tree: FileTree, width: f32, height: f32, config: &Config) -> Self {
        let canvas_radius = width.min(height).max(0.0) / 2.0;
        let layout_options = config.layout.clone();

        let mut diagram = Self {
            layout: layout(&tree, canvas_radius, &layout_options),
            tree,
            controller: CollapseController::new(config.collapse.auto_collapse_threshold),
            layout_options,
            duration: Duration::from_millis(config.animation.duration_ms),
            canvas_radius,
            overlays: HashMap::new(),
            reconciler: DiagramReconciler::new(config.animation.skip_above),
            hovered: None,
        };

        let collapsed = diagram.controller.apply_initial(&mut diagram.tree);
        info!(
            nodes = diagram.tree.node_count(),
            leaves = diagram.tree.leaf_count(),
            collapsed,
            "rendering diagram"
        );
        diagram.relayout(Duration::ZERO);
        diagram
    }

    fn relayout(&mut self, duration: Duration) {
        self.layout = layout(&self.tree, self.canvas_radius, &self.layout_options);
        self.overlays = compute_overlays(&self.tree, &self.layout);
        self.reconciler.reconcile(&self.tree, &self.layout, duration);
        if let Some(id) = self.hovered {
            if self.layout.get(id).is_none() {
                self.hovered = None;
            }
        }
    }

    /// Toggle a folder between expanded and collapsed and animate to the
    /// new layout. Leaves are ignored.
    pub fn click(&mut self, id: NodeId) -> Toggle {
        let outcome = self.controller.toggle(&mut self.tree, id);
        if outcome != Toggle::Ignored {
            self.relayout(self.duration);
        }
        outcome
    }

    /// Click whatever marker lies under `world`, if any.
    pub fn click_at(&mut self, world: Vec2, tolerance: f32) -> Toggle {
        match self.hit_test(world, tolerance) {
            Some(id) => self.click(id),
            None => Toggle::Ignored,
        }
    }

    pub fn hover(&mut self, id: Option<NodeId>) {
        if self.hovered != id {
            debug!(hovered = ?id.map(|id| self.tree.stable_key(id)), "hover changed");
        }
        self.hovered = id;
    }

    pub fn hovered(&self) -> Option<NodeId> {
        self.hovered
    }

    pub fn marker_radius(&self, id: NodeId) -> f32 {
        if self.hovered == Some(id) {
            HOVER_MARKER_RADIUS
        } else {
            MARKER_RADIUS
        }
    }

    /// New surface size. Re-lays out with animation.
    pub fn resize(&mut self, width: f32, height: f32) {
        let canvas_radius = width.min(height).max(0.0) / 2.0;
        if (canvas_radius - self.canvas_radius).abs() < f32::EPSILON {
            return;
        }
        self.canvas_radius = canvas_radius;
        self.relayout(self.duration);
    }

    pub fn collapse_all(&mut self) -> usize {
        let collapsed = expand_state::collapse_all(&mut self.tree);
        if collapsed > 0 {
            self.relayout(self.duration);
        }
        collapsed
    }

    pub fn expand_all(&mut self) -> usize {
        let expanded = expand_state::expand_all(&mut self.tree);
        if expanded > 0 {
            self.relayout(self.duration);
        }
        expanded
    }

    /// Advance transitions by `dt` seconds. Returns true while animating.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.reconciler.tick(dt)
    }

    pub fn is_animating(&self) -> bool {
        self.reconciler.is_animating()
    }

    pub fn finish_animation(&mut self) {
        self.reconciler.finish_immediately();
    }

    /// Nearest marker to `world` within `tolerance`, using the positions
    /// currently on screen.
    pub fn hit_test(&self, world: Vec2, tolerance: f32) -> Option<NodeId> {
        self.reconciler
            .nodes()
            .map(|sprite| (sprite.id, sprite.tween.current().to_cartesian().distance(world)))
            .filter(|(_, distance)| *distance <= tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    pub fn tree(&self) -> &FileTree {
        &self.tree
    }

    pub fn layout(&self) -> &RadialLayout {
        &self.layout
    }

    pub fn canvas_radius(&self) -> f32 {
        self.canvas_radius
    }

    pub fn overlays(&self) -> &HashMap<NodeId, OverlayEnvelope> {
        &self.overlays
    }

    pub fn overlay(&self, id: NodeId) -> Option<&OverlayEnvelope> {
        self.overlays.get(&id)
    }

    /// Overlays around the markers as currently drawn. Equal to
    /// [`Self::overlays`] once transitions have settled.
    pub fn live_overlays(&self) -> Cow<'_, HashMap<NodeId, OverlayEnvelope>> {
        if !self.is_animating() {
            return Cow::Borrowed(&self.overlays);
        }
        let positions: HashMap<NodeId, Vec2> = self
            .reconciler
            .nodes()
            .map(|sprite| (sprite.id, sprite.tween.current().to_cartesian()))
            .collect();
        Cow::Owned(compute_overlays_at(&self.tree, &self.layout, &positions))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeSprite> {
        self.reconciler.nodes()
    }

    pub fn links(&self) -> impl Iterator<Item = &LinkSprite> {
        self.reconciler.links()
    }

    /// Fill colour of a marker: grey for folders, category colour for files.
    pub fn marker_color(sprite: &NodeSprite) -> (u8, u8, u8) {
        match sprite.kind {
            NodeKind::Branch => FOLDER_RGB,
            NodeKind::Leaf => sprite.category.rgb(),
        }
    }

    /// Labels at the current on-screen positions.
    ///
    /// Nodes without visible children label outward on the right half and
    /// inward on the left; expanded folders do the opposite so their text
    /// stays clear of their own subtree.
    pub fn labels(&self) -> Vec<Label> {
        self.reconciler
            .nodes()
            .map(|sprite| {
                let position = sprite.tween.current().to_cartesian();
                let has_children = self.tree.active_child_count(sprite.id) > 0;
                let right_half = position.x >= 0.0;
                let (anchor, offset) = if right_half != has_children {
                    (LabelAnchor::Start, LABEL_OFFSET)
                } else {
                    (LabelAnchor::End, -LABEL_OFFSET)
                };
                Label {
                    key: sprite.key.clone(),
                    text: sprite.name.clone(),
                    position,
                    offset,
                    anchor,
                }
            })
            .collect()
    }
}
