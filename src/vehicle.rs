/*
 * Vehicle Module
 *
 * This module defines the Vehicle struct: the kinematic core every agent
 * shares, plus the library of primitive steering forces behaviours are
 * built from. Each primitive returns a force in the Reynolds style:
 *
 *     steering = desired velocity - current velocity
 *
 * A tick of the kinematic core:
 * 1. Clamp the composed behaviour force to `max_force`
 * 2. Add the stay-in-bounds correction (never clamped or weighted)
 * 3. Drop vertical force for grounded vehicles
 * 4. Integrate acceleration into velocity, clamp to `max_speed`
 * 5. Integrate velocity into position and refresh the heading
 * 6. Snap grounded vehicles onto the terrain
 */

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::math::{
    limit_vertical_heading, right_of, rotate_y_degrees, sanitize_non_negative, sanitize_non_zero,
    wrap_wander_angle,
};
use crate::path::{Path, PathId};
use crate::world::{Bounds, Obstacle, World};

// Distance ahead of the vehicle that the wander circle is projected
pub const WANDER_DISTANCE: f32 = 1.3;
// Largest change of the wander angle per tick, in degrees
pub const WANDER_JITTER: f32 = 6.0;
// Arrive stops steering once the squared distance ratio drops below this
pub const ARRIVE_DEADBAND: f32 = 0.1;
// Default look-ahead used when following a path, in seconds
pub const PATH_LOOK_AHEAD: f32 = 0.5;
// Look-ahead used to pick the first path node when a path is attached
pub const PATH_ATTACH_LOOK_AHEAD: f32 = 1.5;

/// Tunable physical limits of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleSettings {
    pub mass: f32,
    pub max_speed: f32,
    pub max_force: f32,
    pub max_wander_speed: f32,
    pub radius: f32,
    pub grounded: bool,
    pub float_distance: f32,
}

impl Default for VehicleSettings {
    fn default() -> Self {
        Self {
            mass: 1.0,
            max_speed: 5.0,
            max_force: 10.0,
            max_wander_speed: 4.0,
            radius: 1.0,
            grounded: true,
            float_distance: 2.5,
        }
    }
}

/// Read-only motion state of a vehicle, as seen by its neighbours.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Kinematics {
    pub position: Vec3,
    pub velocity: Vec3,
    pub direction: Vec3,
}

impl Kinematics {
    pub fn right(&self) -> Vec3 {
        right_of(self.direction)
    }

    // Where this vehicle will be after `dt` seconds at its current velocity
    pub fn future_location(&self, dt: f32) -> Vec3 {
        self.position + self.velocity * dt
    }
}

// Projections of a vehicle onto the path segment it is currently following
#[derive(Clone, Copy, Debug)]
struct PathLeg {
    start: Vec3,
    segment: Vec3,
    direction: Vec3,
    current_projection: Vec3,
    future_position: Vec3,
    future_projection: Vec3,
}

#[derive(Clone, Debug)]
pub struct Vehicle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub acceleration: Vec3,
    pub direction: Vec3,
    mass: f32,
    pub max_speed: f32,
    pub max_force: f32,
    pub max_wander_speed: f32,
    pub radius: f32,
    pub grounded: bool,
    pub float_distance: f32,
    pub wander_angle: f32,
    path: Option<PathId>,
    target_node_index: usize,
    back_tracking: bool,
}

impl Default for Vehicle {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::Z, VehicleSettings::default())
    }
}

impl Vehicle {
    pub fn new(position: Vec3, direction: Vec3, settings: VehicleSettings) -> Self {
        let direction = direction.normalize_or_zero();
        Self {
            position,
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            direction: if direction == Vec3::ZERO { Vec3::Z } else { direction },
            mass: sanitize_non_zero(settings.mass, 1.0),
            max_speed: sanitize_non_negative(settings.max_speed),
            max_force: sanitize_non_negative(settings.max_force),
            max_wander_speed: sanitize_non_negative(settings.max_wander_speed),
            radius: sanitize_non_negative(settings.radius),
            grounded: settings.grounded,
            float_distance: settings.float_distance,
            wander_angle: 0.0,
            path: None,
            target_node_index: 0,
            back_tracking: false,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity.clamp_length_max(self.max_speed);
        if let Some(direction) = velocity.try_normalize() {
            self.direction = direction;
        }
        self
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    // Zero mass falls back to 1, negative mass is sign-flipped
    pub fn set_mass(&mut self, mass: f32) {
        self.mass = sanitize_non_zero(mass, 1.0);
    }

    pub fn kinematics(&self) -> Kinematics {
        Kinematics {
            position: self.position,
            velocity: self.velocity,
            direction: self.direction,
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.direction
    }

    pub fn right(&self) -> Vec3 {
        right_of(self.direction)
    }

    // Apply a force to the vehicle (a = F / m)
    pub fn apply_force(&mut self, force: Vec3) {
        self.acceleration += force / self.mass;
    }

    /// Advances the vehicle by one tick under a composed behaviour force.
    ///
    /// The behaviour force is clamped to `max_force`; the stay-in-bounds
    /// correction is added afterwards so that containment wins regardless
    /// of how weak the vehicle is.
    pub fn integrate(&mut self, steering: Vec3, dt: f32, world: &World) {
        let mut force = steering.clamp_length_max(self.max_force);
        force += self.stay_in_bounds(&world.bounds);
        if self.grounded {
            force.y = 0.0;
        }
        self.apply_force(force);

        self.velocity += self.acceleration * dt;
        if self.grounded {
            self.velocity.y = 0.0;
        }
        self.velocity = self.velocity.clamp_length_max(self.max_speed);

        self.position += self.velocity * dt;
        if let Some(direction) = self.velocity.try_normalize() {
            self.direction = if self.grounded {
                direction
            } else {
                limit_vertical_heading(direction)
            };
        }

        if self.grounded {
            self.position.y = world.ground_height(self.position) + self.float_distance;
        }

        self.acceleration = Vec3::ZERO;
    }

    // Seek: full speed towards a target
    pub fn seek(&self, target: Vec3) -> Vec3 {
        (target - self.position).normalize_or_zero() * self.max_speed - self.velocity
    }

    // Flee: full speed directly away from a target
    pub fn flee(&self, target: Vec3) -> Vec3 {
        (self.position - target).normalize_or_zero() * self.max_speed - self.velocity
    }

    pub fn pursue(&self, other: &Kinematics, dt: f32) -> Vec3 {
        self.seek(other.future_location(dt))
    }

    pub fn evade(&self, other: &Kinematics, dt: f32) -> Vec3 {
        self.flee(other.future_location(dt))
    }

    /// Seek that slows down inside `sqr_arrive_distance` of the target.
    ///
    /// The seek force is scaled by the squared distance ratio and dropped
    /// entirely once that ratio falls under [`ARRIVE_DEADBAND`].
    pub fn arrive(&self, target: Vec3, sqr_arrive_distance: f32) -> Vec3 {
        let distance_sq = (target - self.position).length_squared();
        if sqr_arrive_distance != 0.0 && distance_sq <= sqr_arrive_distance {
            let ratio = distance_sq / sqr_arrive_distance;
            if ratio > ARRIVE_DEADBAND {
                return self.seek(target) * ratio;
            }
            return Vec3::ZERO;
        }
        self.seek(target)
    }

    // Wander: seek a jittered point projected ahead of the vehicle.
    // The angle accumulates across ticks for smooth, correlated turns.
    pub fn wander<R: Rng>(&mut self, rng: &mut R) -> Vec3 {
        let forward = self.direction;
        self.wander_angle =
            wrap_wander_angle(self.wander_angle + rng.gen_range(-WANDER_JITTER..WANDER_JITTER));

        let displacement =
            self.position + forward * WANDER_DISTANCE + rotate_y_degrees(forward, self.wander_angle);
        (displacement - self.position).normalize_or_zero() * self.max_wander_speed - self.velocity
    }

    /// Steers sideways away from the first obstacle in the way.
    ///
    /// Obstacles are checked in registry order and the first one that is
    /// within the speed-scaled look-ahead, in front of the vehicle and
    /// overlapping its lane decides the result. Later obstacles, even
    /// nearer ones, are not considered.
    pub fn avoid_obstacles(&self, obstacles: &[Obstacle]) -> Vec3 {
        let forward = self.direction;
        let right = self.right();
        let speed_sq = self.velocity.length_squared();

        for obstacle in obstacles {
            let offset = obstacle.position - self.position;
            let distance_sq = offset.length_squared();

            // Outside the look-ahead window
            if distance_sq - obstacle.radius * obstacle.radius - self.radius * self.radius >= speed_sq {
                continue;
            }

            // Behind us
            if offset.dot(forward) <= 0.0 {
                continue;
            }

            // Clear of our lane
            let lateral = offset.dot(right);
            if lateral.abs() > obstacle.radius + self.radius {
                continue;
            }

            let falloff = speed_sq / distance_sq;
            let away = if lateral >= 0.0 { -right } else { right };
            return (away * self.max_speed - self.velocity) * falloff;
        }

        Vec3::ZERO
    }

    // Steer back to the centre once inside the border buffer
    pub fn stay_in_bounds(&self, bounds: &Bounds) -> Vec3 {
        if bounds.breached(self.position) {
            return (bounds.center() - self.position).normalize_or_zero()
                * self.max_speed
                * self.max_speed;
        }
        Vec3::ZERO
    }

    pub fn path(&self) -> Option<PathId> {
        self.path
    }

    pub fn target_node_index(&self) -> usize {
        self.target_node_index
    }

    pub fn set_target_node_index(&mut self, index: usize) {
        self.target_node_index = index;
    }

    pub fn is_back_tracking(&self) -> bool {
        self.back_tracking
    }

    // Attach a path and target the end of the segment we are heading onto
    pub fn attach_path(&mut self, id: PathId, path: &Path) {
        self.path = Some(id);
        self.back_tracking = false;
        let ahead = self.position + self.velocity * PATH_ATTACH_LOOK_AHEAD;
        self.target_node_index = path
            .closest_segment_index(ahead)
            .map_or(0, |index| path.next_index(index));
        log::debug!(
            "vehicle at {:?} attached to path {:?}, targeting node {}",
            self.position,
            id,
            self.target_node_index
        );
    }

    pub fn detach_path(&mut self) {
        self.path = None;
        self.back_tracking = false;
    }

    // Start targeting the next node on the loop
    pub fn advance_path_node(&mut self, path: &Path) {
        self.target_node_index = path.next_index(self.target_node_index);
        log::trace!("advanced to path node {}", self.target_node_index);
    }

    // Grounded vehicles ride above the ground, so they measure the path at
    // their own height instead of at the height the nodes were laid out
    fn path_point(&self, point: Vec3) -> Vec3 {
        if self.grounded {
            Vec3::new(point.x, self.position.y, point.z)
        } else {
            point
        }
    }

    fn path_leg(&self, path: &Path, look_ahead: f32) -> PathLeg {
        let start_index = path.previous_index(self.target_node_index);
        let start = self.path_point(path.node(start_index));
        let segment = self.path_point(path.node(path.next_index(start_index))) - start;
        let direction = segment.normalize_or_zero();
        let future_position = self.position + self.velocity * look_ahead;
        let project = |point: Vec3| start + (point - start).dot(direction) * direction;

        PathLeg {
            start,
            segment,
            direction,
            current_projection: project(self.position),
            future_position,
            future_projection: project(future_position),
        }
    }

    fn path_node_reached(&self, path: &Path, leg: &PathLeg) -> bool {
        let to_target_sq = (self.path_point(path.node(self.target_node_index)) - self.position).length_squared();
        if path.point_based {
            let proximity = path.node_proximity();
            return to_target_sq <= proximity * proximity;
        }
        let radius = path.radius();
        to_target_sq <= radius * radius
            || (leg.current_projection - leg.start).length_squared() >= leg.segment.length_squared()
    }

    /// Steering force that keeps the vehicle on `path` and moves it from
    /// node to node.
    ///
    /// `look_ahead` is how far into the future, in seconds, the vehicle's
    /// position is predicted when checking whether it will stay within the
    /// path radius. Paths with fewer than two nodes produce no force.
    pub fn follow_path(&mut self, path: &Path, look_ahead: f32) -> Vec3 {
        let count = path.count();
        if count < 2 {
            self.back_tracking = false;
            return Vec3::ZERO;
        }

        let future_position = self.position + self.velocity * look_ahead;
        if !path.point_based {
            if let Some(closest) = path.closest_segment_index(future_position) {
                self.target_node_index = path.next_index(closest);
            }
        }
        self.target_node_index %= count;

        let mut leg = self.path_leg(path, look_ahead);
        if self.path_node_reached(path, &leg) {
            self.advance_path_node(path);
            // Re-project immediately so closely spaced nodes are handled this tick
            leg = self.path_leg(path, look_ahead);
        }

        let target = self.path_point(path.node(self.target_node_index));
        let to_target_sq = (target - self.position).length_squared();
        let radius_sq = path.radius() * path.radius();
        let proximity_sq = path.node_proximity() * path.node_proximity();
        let along = leg.current_projection - leg.start;

        self.back_tracking = path.point_based
            && ((to_target_sq <= radius_sq && to_target_sq > proximity_sq)
                || (along.length_squared() >= leg.segment.length_squared() + radius_sq
                    && along.dot(leg.direction) > 0.0));

        let mut force = Vec3::ZERO;
        if self.back_tracking {
            // Fight the flow of the path to reach an overshot node
            force += self.seek(target);
        }

        let off_path = (leg.future_projection - leg.future_position).length_squared() > radius_sq;
        if off_path {
            // Segment start lies behind the predicted projection
            let heading_past_start = (leg.start - leg.future_projection).dot(leg.direction) < 0.0;
            let goal = if heading_past_start {
                leg.current_projection * 2.0 - leg.future_projection
            } else {
                leg.future_projection
            };
            force += self.seek(goal);
        } else if !self.back_tracking {
            force += leg.direction * self.max_speed - self.velocity;
        }

        force
    }
}
