/*
 * World Module
 *
 * The read-only context every vehicle steers against: the rectangular
 * park bounds, the obstacle registry and the terrain used to ground-snap
 * vehicles. A `World` is injected into the simulation at construction
 * instead of living in global state.
 */

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::math::sanitize_non_negative;

/// Source of ground elevation for grounded vehicles.
pub trait Terrain {
    /// Returns the ground height below the horizontal part of `position`.
    fn sample_height(&self, position: Vec3) -> f32;
}

// Perfectly flat ground at a fixed height
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlatTerrain {
    pub height: f32,
}

impl FlatTerrain {
    pub const fn new(height: f32) -> Self {
        Self { height }
    }
}

impl Terrain for FlatTerrain {
    fn sample_height(&self, _position: Vec3) -> f32 {
        self.height
    }
}

impl<F> Terrain for F
where
    F: Fn(Vec3) -> f32,
{
    fn sample_height(&self, position: Vec3) -> f32 {
        self(position)
    }
}

/// Horizontal extents of the park plus the inward buffer vehicles keep.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
    pub buffer: f32,
    pub base_height: f32,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: Vec3::new(-50.0, 0.0, -50.0),
            max: Vec3::new(50.0, 0.0, 50.0),
            buffer: 1.5,
            base_height: 0.01,
        }
    }
}

impl Bounds {
    pub fn new(min: Vec3, max: Vec3, buffer: f32) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
            buffer: sanitize_non_negative(buffer),
            ..Self::default()
        }
    }

    // Midpoint of the park at the base height
    pub fn center(&self) -> Vec3 {
        let mid = (self.min + self.max) * 0.5;
        Vec3::new(mid.x, self.base_height, mid.z)
    }

    // True once a position is inside the buffer zone or beyond the edge
    pub fn breached(&self, position: Vec3) -> bool {
        position.x > self.max.x - self.buffer
            || position.x < self.min.x + self.buffer
            || position.z > self.max.z - self.buffer
            || position.z < self.min.z + self.buffer
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn depth(&self) -> f32 {
        self.max.z - self.min.z
    }

    fn sanitized(mut self) -> Self {
        let (min, max) = (self.min.min(self.max), self.min.max(self.max));
        self.min = min;
        self.max = max;
        self.buffer = sanitize_non_negative(self.buffer);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub position: Vec3,
    pub radius: f32,
}

impl Obstacle {
    pub fn new(position: Vec3, radius: f32) -> Self {
        Self {
            position,
            radius: sanitize_non_negative(radius),
        }
    }
}

pub struct World {
    pub bounds: Bounds,
    pub obstacles: Vec<Obstacle>,
    pub terrain: Box<dyn Terrain>,
}

impl Default for World {
    fn default() -> Self {
        Self::new(Bounds::default(), Vec::new(), FlatTerrain::default())
    }
}

impl World {
    pub fn new(bounds: Bounds, obstacles: Vec<Obstacle>, terrain: impl Terrain + 'static) -> Self {
        Self {
            bounds: bounds.sanitized(),
            obstacles: obstacles
                .into_iter()
                .map(|o| Obstacle::new(o.position, o.radius))
                .collect(),
            terrain: Box::new(terrain),
        }
    }

    pub fn add_obstacle(&mut self, obstacle: Obstacle) {
        self.obstacles.push(Obstacle::new(obstacle.position, obstacle.radius));
    }

    pub fn ground_height(&self, position: Vec3) -> f32 {
        self.terrain.sample_height(position)
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("bounds", &self.bounds)
            .field("obstacles", &self.obstacles)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_sits_at_base_height() {
        let bounds = Bounds::new(Vec3::new(0.0, 5.0, 0.0), Vec3::new(10.0, 9.0, 20.0), 1.0);
        let center = bounds.center();
        assert_eq!(center, Vec3::new(5.0, bounds.base_height, 10.0));
    }

    #[test]
    fn breach_includes_buffer_zone() {
        let bounds = Bounds::new(Vec3::new(-10.0, 0.0, -10.0), Vec3::new(10.0, 0.0, 10.0), 2.0);
        assert!(!bounds.breached(Vec3::ZERO));
        assert!(bounds.breached(Vec3::new(8.5, 0.0, 0.0)));
        assert!(bounds.breached(Vec3::new(0.0, 0.0, -9.0)));
        assert!(!bounds.breached(Vec3::new(7.9, 100.0, 7.9)));
    }

    #[test]
    fn swapped_extents_and_negative_values_are_sanitized() {
        let bounds = Bounds::new(Vec3::splat(4.0), Vec3::splat(-4.0), -1.0);
        assert_eq!(bounds.min, Vec3::splat(-4.0));
        assert_eq!(bounds.buffer, 1.0);
        assert_eq!(Obstacle::new(Vec3::ZERO, -2.0).radius, 2.0);
    }

    #[test]
    fn closures_act_as_terrain() {
        let world = World::new(Bounds::default(), Vec::new(), |p: Vec3| p.x * 0.5);
        assert_eq!(world.ground_height(Vec3::new(4.0, 0.0, 0.0)), 2.0);
    }
}
