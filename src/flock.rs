/*
 * Flock Module
 *
 * A flock owns its member vehicles, the behaviour mode they share, an
 * optional leader and the weights used to blend steering forces. Once per
 * tick, before any member steers, the flock recomputes its aggregates:
 * - average direction: normalized sum of member headings
 * - average position: centroid of member positions
 *
 * Members never write to the flock. A threat seen by an evading member is
 * reported to the simulation, which decides the flock's posture for the
 * tick through `resolve_posture`.
 */

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::behavior::Behavior;
use crate::vehicle::Vehicle;

// Panic rescaling of the flocking weights
pub const PANIC_ALIGNMENT_SCALE: f32 = 0.2;
pub const PANIC_COHESION_SCALE: f32 = 0.7;
pub const PANIC_SEPARATION_SCALE: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlockId(pub usize);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorMode {
    #[default]
    Flocking,
    LeaderFollowing,
    PathFollowing,
}

impl std::str::FromStr for BehaviorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "flocking" => Ok(Self::Flocking),
            "leader_following" | "leader" => Ok(Self::LeaderFollowing),
            "path_following" | "path" => Ok(Self::PathFollowing),
            other => Err(format!("unknown behaviour mode `{other}`")),
        }
    }
}

/// Blend weights for the steering forces a flock combines.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlockWeights {
    pub alignment: f32,
    pub cohesion: f32,
    pub separation: f32,
    pub follow: f32,
    pub path: f32,
    pub avoidance: f32,
}

impl Default for FlockWeights {
    fn default() -> Self {
        Self {
            alignment: 1.0,
            cohesion: 1.0,
            separation: 1.0,
            follow: 1.1,
            path: 1.0,
            avoidance: 50.0,
        }
    }
}

impl FlockWeights {
    // Escape posture: loosen the group, push members apart
    pub fn panicked(self) -> Self {
        Self {
            alignment: self.alignment * PANIC_ALIGNMENT_SCALE,
            cohesion: self.cohesion * PANIC_COHESION_SCALE,
            separation: self.separation * PANIC_SEPARATION_SCALE,
            ..self
        }
    }
}

#[derive(Clone, Debug)]
pub struct Member {
    pub vehicle: Vehicle,
    pub behavior: Behavior,
}

impl Member {
    pub fn new(vehicle: Vehicle, behavior: Behavior) -> Self {
        Self { vehicle, behavior }
    }
}

#[derive(Clone, Debug)]
pub struct Flock {
    pub name: String,
    pub members: Vec<Member>,
    leader: Option<usize>,
    pub mode: BehaviorMode,
    pub weights: FlockWeights,
    // Fallback heading for an empty flock
    pub heading: Vec3,
    average_direction: Vec3,
    average_position: Vec3,
    effective_weights: FlockWeights,
    panicked: bool,
}

impl Flock {
    pub fn new(name: impl Into<String>, origin: Vec3, heading: Vec3) -> Self {
        let heading = heading.try_normalize().unwrap_or(Vec3::Z);
        let weights = FlockWeights::default();
        Self {
            name: name.into(),
            members: Vec::new(),
            leader: None,
            mode: BehaviorMode::default(),
            weights,
            heading,
            average_direction: heading,
            average_position: origin,
            effective_weights: weights,
            panicked: false,
        }
    }

    pub fn with_mode(mut self, mode: BehaviorMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_weights(mut self, weights: FlockWeights) -> Self {
        self.weights = weights;
        self.effective_weights = weights;
        self
    }

    // Add a member and return its index
    pub fn spawn(&mut self, vehicle: Vehicle, behavior: Behavior) -> usize {
        self.members.push(Member::new(vehicle, behavior));
        self.members.len() - 1
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn leader(&self) -> Option<usize> {
        self.leader
    }

    pub fn leader_member(&self) -> Option<&Member> {
        self.leader.and_then(|index| self.members.get(index))
    }

    // Designate a member as leader; indices outside the flock clear it
    pub fn set_leader(&mut self, leader: Option<usize>) {
        self.leader = leader.filter(|&index| index < self.members.len());
    }

    pub fn average_direction(&self) -> Vec3 {
        self.average_direction
    }

    pub fn average_position(&self) -> Vec3 {
        self.average_position
    }

    // Weights in force for the current tick, after any panic rescaling
    pub fn effective_weights(&self) -> FlockWeights {
        self.effective_weights
    }

    pub fn is_panicked(&self) -> bool {
        self.panicked
    }

    /// Recomputes the average heading and centroid from the settled member
    /// state of the previous tick.
    ///
    /// An empty flock faces along its own `heading` and keeps its last
    /// known centroid.
    pub fn update_aggregates(&mut self) {
        if self.members.is_empty() {
            self.average_direction = self.heading;
            return;
        }

        let (direction_sum, position_sum) = self.members.iter().fold(
            (Vec3::ZERO, Vec3::ZERO),
            |(directions, positions), member| {
                (
                    directions + member.vehicle.direction,
                    positions + member.vehicle.position,
                )
            },
        );

        self.average_direction = direction_sum.normalize_or_zero();
        self.average_position = position_sum / self.members.len() as f32;
    }

    /// Decides this tick's weights from the threat reports of its members.
    ///
    /// Any report puts the whole flock into the escape posture; a tick with
    /// none restores the configured weights exactly.
    pub fn resolve_posture(&mut self, threatened: bool) {
        if threatened != self.panicked {
            log::debug!(
                "flock `{}` {} panic",
                self.name,
                if threatened { "entered" } else { "left" }
            );
        }
        self.panicked = threatened;
        self.effective_weights = if threatened {
            self.weights.panicked()
        } else {
            self.weights
        };
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.members.iter().map(|member| member.vehicle.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::VehicleSettings;

    fn vehicle_at(position: Vec3, direction: Vec3) -> Vehicle {
        Vehicle::new(position, direction, VehicleSettings::default())
    }

    #[test]
    fn empty_flock_keeps_heading_and_last_centroid() {
        let mut flock = Flock::new("empty", Vec3::new(1.0, 0.0, 2.0), Vec3::X);
        flock.update_aggregates();
        assert_eq!(flock.average_direction(), Vec3::X);
        assert_eq!(flock.average_position(), Vec3::new(1.0, 0.0, 2.0));
    }

    #[test]
    fn aggregates_are_mean_heading_and_centroid() {
        let mut flock = Flock::new("pair", Vec3::ZERO, Vec3::Z);
        flock.spawn(vehicle_at(Vec3::new(0.0, 0.0, 0.0), Vec3::X), Behavior::default());
        flock.spawn(vehicle_at(Vec3::new(4.0, 0.0, 2.0), Vec3::Z), Behavior::default());
        flock.update_aggregates();

        let expected = Vec3::new(1.0, 0.0, 1.0).normalize();
        assert!((flock.average_direction() - expected).length() < 1e-6);
        assert_eq!(flock.average_position(), Vec3::new(2.0, 0.0, 1.0));
    }

    #[test]
    fn opposing_headings_average_to_zero() {
        let mut flock = Flock::new("split", Vec3::ZERO, Vec3::Z);
        flock.spawn(vehicle_at(Vec3::ZERO, Vec3::X), Behavior::default());
        flock.spawn(vehicle_at(Vec3::ZERO, -Vec3::X), Behavior::default());
        flock.update_aggregates();
        assert_eq!(flock.average_direction(), Vec3::ZERO);
    }

    #[test]
    fn panic_rescales_then_restores_weights() {
        let mut flock = Flock::new("deer", Vec3::ZERO, Vec3::Z);
        flock.resolve_posture(true);
        let panicked = flock.effective_weights();
        assert_eq!(panicked.alignment, 0.2);
        assert_eq!(panicked.cohesion, 0.7);
        assert_eq!(panicked.separation, 2.0);
        assert_eq!(panicked.follow, flock.weights.follow);
        assert!(flock.is_panicked());

        flock.resolve_posture(false);
        assert_eq!(flock.effective_weights(), FlockWeights::default());
        assert!(!flock.is_panicked());
    }

    #[test]
    fn leader_must_be_a_member() {
        let mut flock = Flock::new("wolves", Vec3::ZERO, Vec3::Z);
        flock.set_leader(Some(0));
        assert_eq!(flock.leader(), None);
        let index = flock.spawn(vehicle_at(Vec3::ZERO, Vec3::Z), Behavior::default());
        flock.set_leader(Some(index));
        assert_eq!(flock.leader(), Some(0));
    }

    #[test]
    fn modes_parse_from_cli_names() {
        assert_eq!("leader-following".parse(), Ok(BehaviorMode::LeaderFollowing));
        assert_eq!("PATH".parse(), Ok(BehaviorMode::PathFollowing));
        assert!("swarming".parse::<BehaviorMode>().is_err());
    }
}
