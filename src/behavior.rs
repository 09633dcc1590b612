/*
 * Behavior Module
 *
 * Per-vehicle steering policies. Every member of a flock carries a
 * `Behavior`: its awareness settings plus a `Role` deciding which
 * primitives it blends on top of the generic flocker rules.
 *
 * Roles:
 * - Flocker: wander + align + cohere + separate, follow the leader, or
 *   follow the path, depending on the flock's mode
 * - Evader: a flocker that flees members of threat flocks and reports the
 *   threat so its flock can switch to the escape posture
 * - Pursuer: a flocker that, while leading, arrives at a stand-off point
 *   in front of a tracked target instead of wandering
 *
 * Policies only read neighbour state through `FlockSnapshot`s taken at the
 * start of the tick, so every member steers against the same settled
 * positions.
 */

use glam::Vec3;
use rand::Rng;

use crate::flock::{BehaviorMode, Flock, FlockId, FlockWeights};
use crate::math::sanitize_non_negative;
use crate::path::Path;
use crate::spatial_grid::SpatialGrid;
use crate::vehicle::{Kinematics, Vehicle, PATH_LOOK_AHEAD};
use crate::world::{Bounds, World};

pub const DEFAULT_AWARE_RADIUS: f32 = 3.0;
pub const DEFAULT_DIST_FROM_LEADER: f32 = 3.0;
pub const DEFAULT_EVADE_WEIGHT: f32 = 10.0;
pub const DEFAULT_DIST_FROM_TARGET: f32 = 1.0;
pub const DEFAULT_PURSUIT_SEEK_WEIGHT: f32 = 1.5;
// Exponent applied to the follow weight for the scramble-out-of-the-way force
pub const SCRAMBLE_WEIGHT_EXPONENT: i32 = 10;
// Squared distance to the stand-off point at which a pursuer stops chasing
const PURSUIT_SETTLE_DISTANCE_SQ: f32 = 1.0;

/// Position and facing of something a pursuer chases.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrackedTarget {
    pub position: Vec3,
    pub forward: Vec3,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Role {
    #[default]
    Flocker,
    Evader {
        threats: Vec<FlockId>,
        evade_weight: f32,
    },
    Pursuer {
        target: Option<TrackedTarget>,
        dist_from_target: f32,
        seek_weight: f32,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Behavior {
    pub role: Role,
    aware_radius: f32,
    pub dist_from_leader: f32,
}

impl Default for Behavior {
    fn default() -> Self {
        Self::flocker()
    }
}

// Member state as seen by the rest of the world during a tick
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MemberSnapshot {
    pub kinematics: Kinematics,
    pub dist_from_leader: f32,
}

/// Frozen view of a flock, taken once per tick before anyone steers.
#[derive(Clone, Debug)]
pub struct FlockSnapshot {
    pub members: Vec<MemberSnapshot>,
    pub leader: Option<usize>,
    pub mode: BehaviorMode,
    pub average_direction: Vec3,
    pub average_position: Vec3,
    pub grid: SpatialGrid,
}

impl FlockSnapshot {
    pub fn capture(flock: &Flock, bounds: &Bounds) -> Self {
        let members: Vec<MemberSnapshot> = flock
            .members
            .iter()
            .map(|member| MemberSnapshot {
                kinematics: member.vehicle.kinematics(),
                dist_from_leader: member.behavior.dist_from_leader,
            })
            .collect();

        let widest_radius = flock
            .members
            .iter()
            .map(|member| member.behavior.aware_radius())
            .fold(0.0_f32, f32::max);
        let grid = SpatialGrid::build(
            widest_radius,
            bounds,
            members.iter().map(|member| member.kinematics.position),
        );

        Self {
            members,
            leader: flock.leader(),
            mode: flock.mode,
            average_direction: flock.average_direction(),
            average_position: flock.average_position(),
            grid,
        }
    }

    pub fn leader(&self) -> Option<&MemberSnapshot> {
        self.leader.and_then(|index| self.members.get(index))
    }
}

/// Everything a member may read while composing its steering force.
#[derive(Clone, Copy, Debug)]
pub struct SteeringContext<'a> {
    pub world: &'a World,
    pub flocks: &'a [FlockSnapshot],
    pub flock: FlockId,
    pub member: usize,
    pub weights: FlockWeights,
    pub path: Option<&'a Path>,
}

impl<'a> SteeringContext<'a> {
    pub fn own_flock(&self) -> &'a FlockSnapshot {
        &self.flocks[self.flock.0]
    }

    pub fn is_leader(&self) -> bool {
        self.own_flock().leader == Some(self.member)
    }
}

/// A vehicle's force-composition policy.
///
/// The simulation only talks to members through this trait, so the
/// kinematic core never needs to know which role a member plays.
pub trait SteeringPolicy {
    // Whether this member sees a threat this tick (pre-pass, read only)
    fn senses_threat(&self, vehicle: &Vehicle, ctx: &SteeringContext<'_>) -> bool;

    // Combined, weighted steering force for this tick
    fn steering_force<R: Rng>(
        &self,
        vehicle: &mut Vehicle,
        ctx: &SteeringContext<'_>,
        rng: &mut R,
    ) -> Vec3;
}

impl Behavior {
    pub fn flocker() -> Self {
        Self {
            role: Role::Flocker,
            aware_radius: DEFAULT_AWARE_RADIUS,
            dist_from_leader: DEFAULT_DIST_FROM_LEADER,
        }
    }

    pub fn evader(threats: Vec<FlockId>) -> Self {
        Self {
            role: Role::Evader {
                threats,
                evade_weight: DEFAULT_EVADE_WEIGHT,
            },
            ..Self::flocker()
        }
    }

    pub fn pursuer(target: Option<TrackedTarget>) -> Self {
        Self {
            role: Role::Pursuer {
                target,
                dist_from_target: DEFAULT_DIST_FROM_TARGET,
                seek_weight: DEFAULT_PURSUIT_SEEK_WEIGHT,
            },
            ..Self::flocker()
        }
    }

    pub fn with_aware_radius(mut self, radius: f32) -> Self {
        self.set_aware_radius(radius);
        self
    }

    pub fn with_dist_from_leader(mut self, distance: f32) -> Self {
        self.dist_from_leader = sanitize_non_negative(distance);
        self
    }

    pub fn aware_radius(&self) -> f32 {
        self.aware_radius
    }

    pub fn set_aware_radius(&mut self, radius: f32) {
        self.aware_radius = sanitize_non_negative(radius);
    }

    pub fn aware_radius_sq(&self) -> f32 {
        self.aware_radius * self.aware_radius
    }

    pub fn is_pursuer(&self) -> bool {
        matches!(self.role, Role::Pursuer { .. })
    }

    // Point a pursuer at a new target; other roles ignore it
    pub fn set_pursuit_target(&mut self, new_target: Option<TrackedTarget>) -> bool {
        match &mut self.role {
            Role::Pursuer { target, .. } => {
                *target = new_target;
                true
            }
            _ => false,
        }
    }

    // Seek the average heading of the flock
    pub fn align(&self, vehicle: &Vehicle, ctx: &SteeringContext<'_>) -> Vec3 {
        ctx.own_flock().average_direction * vehicle.max_speed - vehicle.velocity
    }

    // Seek the centroid of the flock
    pub fn cohere(&self, vehicle: &Vehicle, ctx: &SteeringContext<'_>) -> Vec3 {
        vehicle.seek(ctx.own_flock().average_position)
    }

    /// Sum of flee forces from every other flock member inside the
    /// awareness radius. Exactly zero when nobody is that close.
    pub fn separate(&self, vehicle: &Vehicle, ctx: &SteeringContext<'_>) -> Vec3 {
        let flock = ctx.own_flock();
        let aware_sq = self.aware_radius_sq();

        flock
            .grid
            .nearby_indices(vehicle.position)
            .into_iter()
            .filter(|&index| index != ctx.member)
            .filter_map(|index| flock.members.get(index))
            .map(|other| other.kinematics.position)
            .filter(|position| (*position - vehicle.position).length_squared() <= aware_sq)
            .fold(Vec3::ZERO, |force, position| force + vehicle.flee(position))
    }

    // Arrive behind the leader; scramble sideways when too close to it
    pub fn follow_leader(&self, vehicle: &Vehicle, leader: &MemberSnapshot, follow_weight: f32) -> Vec3 {
        let lead = &leader.kinematics;
        let behind = lead.position - lead.direction * self.dist_from_leader;
        let mut force = vehicle.arrive(behind, self.aware_radius_sq());

        let to_leader = lead.position - vehicle.position;
        if to_leader.length_squared() < leader.dist_from_leader * leader.dist_from_leader {
            let right = lead.right();
            let sidestep = if to_leader.dot(right) > 0.0 { -right } else { right };
            force += vehicle.seek(vehicle.position + sidestep * self.dist_from_leader)
                * follow_weight.powi(SCRAMBLE_WEIGHT_EXPONENT);
        }

        force
    }

    // Flee every threat-flock member inside the awareness radius
    fn evade_threats(
        &self,
        vehicle: &Vehicle,
        ctx: &SteeringContext<'_>,
        threats: &[FlockId],
        evade_weight: f32,
    ) -> (Vec3, bool) {
        let aware_sq = self.aware_radius_sq();
        let mut force = Vec3::ZERO;
        let mut threatened = false;

        for threat in threats.iter().filter_map(|id| ctx.flocks.get(id.0)) {
            for member in &threat.members {
                let position = member.kinematics.position;
                if (position - vehicle.position).length_squared() < aware_sq {
                    force += vehicle.flee(position) * evade_weight;
                    threatened = true;
                }
            }
        }

        (force, threatened)
    }

    fn pursue_target(&self, vehicle: &Vehicle, ctx: &SteeringContext<'_>) -> Vec3 {
        let Role::Pursuer {
            target: Some(target),
            dist_from_target,
            seek_weight,
        } = &self.role
        else {
            return Vec3::ZERO;
        };

        if ctx.own_flock().mode != BehaviorMode::LeaderFollowing || !ctx.is_leader() {
            return Vec3::ZERO;
        }

        let goal = target.position + target.forward * *dist_from_target;
        if (vehicle.position - goal).length_squared() > PURSUIT_SETTLE_DISTANCE_SQ {
            return vehicle.arrive(goal, *dist_from_target) * *seek_weight;
        }
        Vec3::ZERO
    }

    // Generic flocker composition for the flock's current mode
    fn mode_forces<R: Rng>(&self, vehicle: &mut Vehicle, ctx: &SteeringContext<'_>, rng: &mut R) -> Vec3 {
        let flock = ctx.own_flock();
        let weights = ctx.weights;

        match flock.mode {
            BehaviorMode::Flocking => {
                vehicle.wander(rng)
                    + self.align(vehicle, ctx) * weights.alignment
                    + self.cohere(vehicle, ctx) * weights.cohesion
                    + self.separate(vehicle, ctx) * weights.separation
            }
            BehaviorMode::LeaderFollowing => match flock.leader() {
                None => Vec3::ZERO,
                Some(_) if ctx.is_leader() => {
                    if self.is_pursuer() {
                        Vec3::ZERO
                    } else {
                        vehicle.wander(rng)
                    }
                }
                Some(leader) => {
                    self.follow_leader(vehicle, leader, weights.follow) * weights.follow
                        + self.separate(vehicle, ctx) * weights.separation
                }
            },
            BehaviorMode::PathFollowing => match ctx.path {
                None => Vec3::ZERO,
                Some(path) => {
                    vehicle.follow_path(path, PATH_LOOK_AHEAD) * weights.path
                        + self.separate(vehicle, ctx) * weights.separation
                }
            },
        }
    }
}

impl SteeringPolicy for Behavior {
    fn senses_threat(&self, vehicle: &Vehicle, ctx: &SteeringContext<'_>) -> bool {
        match &self.role {
            Role::Evader { threats, evade_weight } if ctx.own_flock().mode == BehaviorMode::Flocking => {
                self.evade_threats(vehicle, ctx, threats, *evade_weight).1
            }
            _ => false,
        }
    }

    fn steering_force<R: Rng>(
        &self,
        vehicle: &mut Vehicle,
        ctx: &SteeringContext<'_>,
        rng: &mut R,
    ) -> Vec3 {
        let mut force = match &self.role {
            Role::Flocker => Vec3::ZERO,
            Role::Evader { threats, evade_weight } => {
                if ctx.own_flock().mode == BehaviorMode::Flocking {
                    self.evade_threats(vehicle, ctx, threats, *evade_weight).0
                } else {
                    Vec3::ZERO
                }
            }
            Role::Pursuer { .. } => self.pursue_target(vehicle, ctx),
        };

        force += self.mode_forces(vehicle, ctx, rng);
        force += vehicle.avoid_obstacles(&ctx.world.obstacles) * ctx.weights.avoidance;
        force
    }
}
