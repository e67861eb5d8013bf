use glam::Vec2;

pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 32.0;

/// Pan and zoom applied to the diagram group.
///
/// World space has the diagram root at the origin; screen space has it at the
/// viewport centre when no pan is applied.
#[derive(Debug, Clone)]
pub struct ViewTransform {
    /// World point shown at the viewport centre
    pub pan_offset: Vec2,
    /// Scale factor, clamped to [MIN_ZOOM, MAX_ZOOM]
    pub zoom_level: f32,
    /// Surface size in screen units
    pub viewport: Vec2,
}

impl ViewTransform {
    pub fn new(viewport_width: f32, viewport_height: f32) -> Self {
        Self {
            pan_offset: Vec2::ZERO,
            zoom_level: MIN_ZOOM,
            viewport: Vec2::new(viewport_width, viewport_height),
        }
    }

    pub fn update_viewport(&mut self, width: f32, height: f32) {
        self.viewport = Vec2::new(width, height);
    }

    /// Drag by a screen-space delta.
    pub fn pan(&mut self, screen_delta: Vec2) {
        self.pan_offset -= screen_delta / self.zoom_level;
    }

    /// Multiply the zoom by `factor`, keeping the world point under `pivot`
    /// fixed on screen.
    pub fn zoom(&mut self, factor: f32, pivot: Vec2) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let world_pivot = self.screen_to_world(pivot);
        self.zoom_level = (self.zoom_level * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan_offset = world_pivot - (pivot - self.viewport_center()) / self.zoom_level;
    }

    pub fn reset(&mut self) {
        self.pan_offset = Vec2::ZERO;
        self.zoom_level = MIN_ZOOM;
    }

    pub fn viewport_center(&self) -> Vec2 {
        self.viewport * 0.5
    }

    pub fn world_to_screen(&self, world_pos: Vec2) -> Vec2 {
        (world_pos - self.pan_offset) * self.zoom_level + self.viewport_center()
    }

    pub fn screen_to_world(&self, screen_pos: Vec2) -> Vec2 {
        (screen_pos - self.viewport_center()) / self.zoom_level + self.pan_offset
    }

    /// Whether a world point lands on the surface, allowing `margin` screen
    /// units of overhang.
    pub fn is_in_viewport(&self, world_pos: Vec2, margin: f32) -> bool {
        let screen = self.world_to_screen(world_pos);
        screen.cmpge(Vec2::splat(-margin)).all() && screen.cmple(self.viewport + margin).all()
    }
}
