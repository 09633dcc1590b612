/*
 * Boid Steering - Module Definitions
 *
 * Steering-behaviour vehicles grouped into flocks. Vehicles integrate
 * weighted steering forces (seek, flee, arrive, wander, avoidance, path
 * following); flocks blend them into flocking, leader following or path
 * following. The `Simulation` drives everything one fixed tick at a time
 * against an injected `World`.
 */

// Re-export key components for easier access
pub use behavior::{Behavior, FlockSnapshot, Role, SteeringContext, SteeringPolicy, TrackedTarget};
pub use clock::FixedTimestep;
pub use config::{ConfigError, Scenario};
pub use flock::{BehaviorMode, Flock, FlockId, FlockWeights, Member};
pub use path::{Path, PathId};
pub use simulation::{Simulation, TickReport};
pub use spatial_grid::SpatialGrid;
pub use vehicle::{Kinematics, Vehicle, VehicleSettings};
pub use world::{Bounds, FlatTerrain, Obstacle, Terrain, World};

// Define modules
pub mod behavior;
pub mod clock;
pub mod config;
pub mod flock;
pub mod logging;
pub mod math;
pub mod path;
pub mod simulation;
pub mod spatial_grid;
pub mod vehicle;
pub mod world;
