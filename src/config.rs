/*
 * Scenario Configuration Module
 *
 * Declarative description of a park: bounds, obstacles, named paths and
 * named flocks with their spawn rules. Scenarios are read from JSON and
 * turned into a ready-to-run `Simulation`. Every field has a default so a
 * scenario file only needs to spell out what differs.
 *
 * Flocks and paths refer to each other by name; `build` resolves the names
 * and reports dangling or duplicated ones instead of guessing.
 */

use std::collections::HashMap;
use std::path::{Path as FsPath, PathBuf};

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::behavior::{
    Behavior, Role, TrackedTarget, DEFAULT_AWARE_RADIUS, DEFAULT_DIST_FROM_LEADER,
    DEFAULT_DIST_FROM_TARGET, DEFAULT_EVADE_WEIGHT, DEFAULT_PURSUIT_SEEK_WEIGHT,
};
use crate::clock::{FixedTimestep, DEFAULT_MAX_STEPS_PER_ADVANCE, DEFAULT_STEPS_PER_SECOND};
use crate::flock::{BehaviorMode, Flock, FlockId, FlockWeights};
use crate::math::sanitize_non_negative;
use crate::path::{Path, PathId, DEFAULT_NODE_PROXIMITY};
use crate::simulation::Simulation;
use crate::vehicle::{Vehicle, VehicleSettings};
use crate::world::{Bounds, FlatTerrain, Obstacle, World};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read scenario `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid scenario: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown flock `{0}`")]
    UnknownFlock(String),
    #[error("unknown path `{0}`")]
    UnknownPath(String),
    #[error("flock `{0}` is defined more than once")]
    DuplicateFlock(String),
    #[error("path `{0}` is defined more than once")]
    DuplicatePath(String),
}

fn default_evade_weight() -> f32 {
    DEFAULT_EVADE_WEIGHT
}

fn default_dist_from_target() -> f32 {
    DEFAULT_DIST_FROM_TARGET
}

fn default_seek_weight() -> f32 {
    DEFAULT_PURSUIT_SEEK_WEIGHT
}

/// Role of a spawned vehicle, with threats referenced by flock name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoleConfig {
    #[default]
    Flocker,
    Evader {
        #[serde(default)]
        threats: Vec<String>,
        #[serde(default = "default_evade_weight")]
        evade_weight: f32,
    },
    Pursuer {
        #[serde(default)]
        target: Option<TrackedTarget>,
        #[serde(default = "default_dist_from_target")]
        dist_from_target: f32,
        #[serde(default = "default_seek_weight")]
        seek_weight: f32,
    },
}

impl RoleConfig {
    fn resolve(&self, flocks: &HashMap<&str, FlockId>) -> Result<Role, ConfigError> {
        Ok(match self {
            Self::Flocker => Role::Flocker,
            Self::Evader {
                threats,
                evade_weight,
            } => Role::Evader {
                threats: threats
                    .iter()
                    .map(|name| {
                        flocks
                            .get(name.as_str())
                            .copied()
                            .ok_or_else(|| ConfigError::UnknownFlock(name.clone()))
                    })
                    .collect::<Result<_, _>>()?,
                evade_weight: sanitize_non_negative(*evade_weight),
            },
            Self::Pursuer {
                target,
                dist_from_target,
                seek_weight,
            } => Role::Pursuer {
                target: *target,
                dist_from_target: sanitize_non_negative(*dist_from_target),
                seek_weight: sanitize_non_negative(*seek_weight),
            },
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub name: String,
    pub nodes: Vec<Vec3>,
    pub radius: f32,
    pub node_proximity: f32,
    pub point_based: bool,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            nodes: Vec::new(),
            radius: 1.0,
            node_proximity: DEFAULT_NODE_PROXIMITY,
            point_based: false,
        }
    }
}

/// A distinguished member spawned at the flock origin and made its leader.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderConfig {
    pub role: RoleConfig,
    pub vehicle: VehicleSettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlockConfig {
    pub name: String,
    pub mode: BehaviorMode,
    pub weights: FlockWeights,
    pub origin: Vec3,
    pub heading: Vec3,
    pub count: usize,
    // Members spawn uniformly within origin ± spread on x and z
    pub spread: f32,
    pub vehicle: VehicleSettings,
    pub role: RoleConfig,
    pub aware_radius: f32,
    pub dist_from_leader: f32,
    pub leader: Option<LeaderConfig>,
    pub path: Option<String>,
}

impl Default for FlockConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            mode: BehaviorMode::default(),
            weights: FlockWeights::default(),
            origin: Vec3::ZERO,
            heading: Vec3::Z,
            count: 10,
            spread: 5.0,
            vehicle: VehicleSettings::default(),
            role: RoleConfig::default(),
            aware_radius: DEFAULT_AWARE_RADIUS,
            dist_from_leader: DEFAULT_DIST_FROM_LEADER,
            leader: None,
            path: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub seed: u64,
    pub steps_per_second: f32,
    pub max_steps_per_advance: usize,
    pub bounds: Bounds,
    pub terrain_height: f32,
    pub obstacles: Vec<Obstacle>,
    pub paths: Vec<PathConfig>,
    pub flocks: Vec<FlockConfig>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            seed: 0,
            steps_per_second: DEFAULT_STEPS_PER_SECOND,
            max_steps_per_advance: DEFAULT_MAX_STEPS_PER_ADVANCE,
            bounds: Bounds::default(),
            terrain_height: 0.0,
            obstacles: Vec::new(),
            paths: Vec::new(),
            flocks: Vec::new(),
        }
    }
}

impl Scenario {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<FsPath>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let scenario = Self::from_json(&text)?;
        log::info!(
            "loaded scenario `{}`: {} flocks, {} paths, {} obstacles",
            path.display(),
            scenario.flocks.len(),
            scenario.paths.len(),
            scenario.obstacles.len()
        );
        Ok(scenario)
    }

    // Force every flock into the same behaviour mode
    pub fn override_mode(&mut self, mode: BehaviorMode) {
        for flock in &mut self.flocks {
            flock.mode = mode;
        }
    }

    /// Resolves every name reference and spawns all vehicles.
    ///
    /// Spawn positions are drawn from an RNG seeded with `seed`, so a
    /// scenario always produces the same starting layout.
    pub fn build(&self) -> Result<Simulation, ConfigError> {
        let path_ids = index_names(self.paths.iter().map(|p| p.name.as_str()), ConfigError::DuplicatePath)?;
        let flock_ids = index_names(self.flocks.iter().map(|f| f.name.as_str()), ConfigError::DuplicateFlock)?;
        let flock_ids: HashMap<&str, FlockId> =
            flock_ids.into_iter().map(|(name, index)| (name, FlockId(index))).collect();

        let world = World::new(
            self.bounds,
            self.obstacles.clone(),
            FlatTerrain::new(self.terrain_height),
        );
        let clock = FixedTimestep::from_hz(self.steps_per_second).with_max_steps(self.max_steps_per_advance);
        let mut sim = Simulation::new(world, self.seed).with_clock(clock);

        for path in &self.paths {
            sim.add_path(Path::new(
                path.nodes.clone(),
                path.radius,
                path.node_proximity,
                path.point_based,
            ));
        }

        // Offset from the simulation stream so layout and wander draws differ
        let mut spawn_rng = StdRng::seed_from_u64(self.seed.wrapping_add(1));
        for config in &self.flocks {
            let flock = self.spawn_flock(config, &flock_ids, sim.world(), &mut spawn_rng)?;
            let id = sim.add_flock(flock);

            if let Some(name) = &config.path {
                let path = path_ids
                    .get(name.as_str())
                    .copied()
                    .ok_or_else(|| ConfigError::UnknownPath(name.clone()))?;
                sim.attach_flock_to_path(id, PathId(path));
            }
        }

        Ok(sim)
    }

    fn spawn_flock(
        &self,
        config: &FlockConfig,
        flock_ids: &HashMap<&str, FlockId>,
        world: &World,
        rng: &mut StdRng,
    ) -> Result<Flock, ConfigError> {
        let mut flock = Flock::new(config.name.clone(), config.origin, config.heading)
            .with_mode(config.mode)
            .with_weights(config.weights);
        let heading = flock.heading;

        let behavior = |role: &RoleConfig| -> Result<Behavior, ConfigError> {
            let mut behavior = Behavior::flocker()
                .with_aware_radius(config.aware_radius)
                .with_dist_from_leader(config.dist_from_leader);
            behavior.role = role.resolve(flock_ids)?;
            Ok(behavior)
        };

        if let Some(leader) = &config.leader {
            let mut origin = config.origin;
            origin.y = world.ground_height(origin);
            let index = flock.spawn(Vehicle::new(origin, heading, leader.vehicle), behavior(&leader.role)?);
            flock.set_leader(Some(index));
        }

        // Nobody spawns further out than the park is wide
        let park_extent = self.bounds.width().max(self.bounds.depth());
        let spread = sanitize_non_negative(config.spread).min(park_extent);
        for _ in 0..config.count {
            let mut position = config.origin;
            if spread > 0.0 && (spread * 2.0).is_finite() {
                position.x += rng.gen_range(-spread..spread);
                position.z += rng.gen_range(-spread..spread);
            }
            position.y = world.ground_height(position);
            flock.spawn(Vehicle::new(position, heading, config.vehicle), behavior(&config.role)?);
        }

        flock.update_aggregates();
        log::debug!(
            "spawned flock `{}` with {} members in {:?} mode",
            flock.name,
            flock.len(),
            flock.mode
        );
        Ok(flock)
    }
}

// Map each name to its position, rejecting repeats
fn index_names<'a>(
    names: impl Iterator<Item = &'a str>,
    duplicate: fn(String) -> ConfigError,
) -> Result<HashMap<&'a str, usize>, ConfigError> {
    let mut indices = HashMap::new();
    for (index, name) in names.enumerate() {
        if indices.insert(name, index).is_some() {
            return Err(duplicate(name.to_owned()));
        }
    }
    Ok(indices)
}
