use glam::Vec2;
use std::time::Duration;

use crate::radial_layout::polar_to_cartesian;

/// A point on the radial grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Polar {
    pub angle: f32,
    pub radius: f32,
}

impl Polar {
    pub fn new(angle: f32, radius: f32) -> Self {
        Self { angle, radius }
    }

    pub fn to_cartesian(&self) -> Vec2 {
        polar_to_cartesian(self.angle, self.radius)
    }

    /// Component-wise linear blend; angles are not wrapped, so a node swings
    /// through the same arc a rotate transform would.
    pub fn lerp(self, other: Polar, t: f32) -> Polar {
        Polar {
            angle: self.angle + (other.angle - self.angle) * t,
            radius: self.radius + (other.radius - self.radius) * t,
        }
    }
}

/// Whether a pass animates at all, based on element count
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationTier {
    Full,
    /// Too many elements: snap to targets.
    Skip,
}

impl AnimationTier {
    pub fn from_item_count(count: usize, skip_above: usize) -> Self {
        if count > skip_above {
            Self::Skip
        } else {
            Self::Full
        }
    }
}

/// Linear transition between two polar positions.
#[derive(Debug, Clone)]
pub struct PolarTween {
    from: Polar,
    to: Polar,
    elapsed: f32,
    duration: f32,
}

impl PolarTween {
    pub fn settled(at: Polar) -> Self {
        Self {
            from: at,
            to: at,
            elapsed: 0.0,
            duration: 0.0,
        }
    }

    pub fn new(from: Polar, to: Polar, duration: Duration) -> Self {
        let mut tween = Self::settled(from);
        tween.retarget(to, duration);
        tween
    }

    /// Start a new transition from wherever the tween currently is.
    pub fn retarget(&mut self, to: Polar, duration: Duration) {
        self.from = self.current();
        self.to = to;
        self.elapsed = 0.0;
        self.duration = duration.as_secs_f32();
        if self.duration <= 0.0 {
            self.from = to;
        }
    }

    pub fn current(&self) -> Polar {
        if self.is_settled() {
            return self.to;
        }
        self.from.lerp(self.to, self.elapsed / self.duration)
    }

    pub fn target(&self) -> Polar {
        self.to
    }

    pub fn is_settled(&self) -> bool {
        self.duration <= 0.0 || self.elapsed >= self.duration
    }

    /// Advance by `dt` seconds. Returns true while still moving.
    pub fn advance(&mut self, dt: f32) -> bool {
        if self.is_settled() {
            return false;
        }
        self.elapsed = (self.elapsed + dt).min(self.duration);
        !self.is_settled()
    }

    pub fn finish(&mut self) {
        self.from = self.to;
        self.elapsed = self.duration;
    }
}
