/*
 * Path Module
 *
 * A path is an ordered list of node positions treated as a closed loop:
 * every index is taken modulo the node count, so the last node connects
 * back to the first. Segment `i` runs from node `i` to node `i + 1`.
 *
 * Two completion styles are supported:
 * - point based: a node is reached once a vehicle is within `node_proximity`
 * - proximity based: the target segment is re-picked every tick and a node
 *   counts as reached within `radius` or once its segment is overrun
 */

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::math::{sanitize_non_negative, sanitize_non_zero};

// Default precision radius around a path node
pub const DEFAULT_NODE_PROXIMITY: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathId(pub usize);

#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    nodes: Vec<Vec3>,
    radius: f32,
    node_proximity: f32,
    pub point_based: bool,
}

impl Default for Path {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            radius: 0.0,
            node_proximity: DEFAULT_NODE_PROXIMITY,
            point_based: false,
        }
    }
}

impl Path {
    pub fn new(nodes: Vec<Vec3>, radius: f32, node_proximity: f32, point_based: bool) -> Self {
        Self {
            nodes,
            radius: sanitize_non_negative(radius),
            node_proximity: sanitize_non_zero(node_proximity, DEFAULT_NODE_PROXIMITY),
            point_based,
        }
    }

    pub fn count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Vec3] {
        &self.nodes
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    // Negative radii are clamped to zero
    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius.max(0.0);
    }

    pub fn node_proximity(&self) -> f32 {
        self.node_proximity
    }

    pub fn set_node_proximity(&mut self, proximity: f32) {
        self.node_proximity = sanitize_non_zero(proximity, DEFAULT_NODE_PROXIMITY);
    }

    // Position of a node, wrapping the index around the loop
    pub fn node(&self, index: usize) -> Vec3 {
        if self.nodes.is_empty() {
            return Vec3::ZERO;
        }
        self.nodes[index % self.nodes.len()]
    }

    // Move an existing node; out-of-range indices are ignored
    pub fn set_node(&mut self, index: usize, position: Vec3) {
        if let Some(node) = self.nodes.get_mut(index) {
            *node = position;
        }
    }

    pub fn add_node(&mut self, position: Vec3) {
        self.nodes.push(position);
    }

    /// Returns the segment vector leaving node `index`.
    ///
    /// Paths with fewer than two nodes have no segments; the zero vector is
    /// returned instead.
    pub fn segment(&self, index: usize) -> Vec3 {
        let count = self.nodes.len();
        if count < 2 {
            return Vec3::ZERO;
        }
        let start = index % count;
        self.nodes[(start + 1) % count] - self.nodes[start]
    }

    // Index of the node preceding `index` on the loop
    pub fn previous_index(&self, index: usize) -> usize {
        let count = self.nodes.len().max(1);
        (index % count + count - 1) % count
    }

    // Index of the node following `index` on the loop
    pub fn next_index(&self, index: usize) -> usize {
        let count = self.nodes.len().max(1);
        (index + 1) % count
    }

    // Closest point on segment `index` to a position, clamped to the segment span
    pub fn closest_point_on_segment(&self, index: usize, position: Vec3) -> Vec3 {
        let origin = self.node(index);
        let segment = self.segment(index);
        let length_sq = segment.length_squared();
        if length_sq <= f32::EPSILON {
            return origin;
        }
        let t = ((position - origin).dot(segment) / length_sq).clamp(0.0, 1.0);
        origin + segment * t
    }

    /// Finds the segment whose span passes closest to `position`.
    ///
    /// Returns `None` for an empty path and `Some(0)` whenever there is at
    /// most one segment. On exact ties the lowest index wins.
    pub fn closest_segment_index(&self, position: Vec3) -> Option<usize> {
        match self.nodes.len() {
            0 => None,
            1 | 2 => Some(0),
            count => {
                let mut closest = 0;
                let mut shortest = (self.closest_point_on_segment(0, position) - position).length_squared();
                for index in 1..count {
                    let distance = (self.closest_point_on_segment(index, position) - position).length_squared();
                    if distance < shortest {
                        shortest = distance;
                        closest = index;
                    }
                }
                Some(closest)
            }
        }
    }

    // Segment vector closest to a position (zero for degenerate paths)
    pub fn closest_segment(&self, position: Vec3) -> Vec3 {
        self.closest_segment_index(position)
            .map_or(Vec3::ZERO, |index| self.segment(index))
    }

    // Closest point on the whole loop to a position
    pub fn closest_point(&self, position: Vec3) -> Option<Vec3> {
        self.closest_segment_index(position)
            .map(|index| self.closest_point_on_segment(index, position))
    }
}
