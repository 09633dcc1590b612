/*
 * Simulation Module
 *
 * Owns the world, the paths and the flocks, and drives one tick at a time.
 * Tick ordering:
 * 1. Every flock recomputes its aggregates from last tick's positions
 * 2. Every flock is frozen into a snapshot (kinematics, leader, grid)
 * 3. Threat pre-pass: evading members report threats, and each flock
 *    settles its weights for the tick
 * 4. Every member composes its steering force from the snapshots and
 *    integrates
 *
 * Aggregates and neighbour state are therefore stale but consistent: no
 * member ever sees another member's half-updated state.
 */

use std::time::Duration;

use glam::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::behavior::{FlockSnapshot, SteeringContext, SteeringPolicy, TrackedTarget};
use crate::clock::FixedTimestep;
use crate::flock::{BehaviorMode, Flock, FlockId, Member};
use crate::path::{Path, PathId};
use crate::world::World;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub vehicles: usize,
    pub panicked_flocks: usize,
}

pub struct Simulation {
    world: World,
    paths: Vec<Path>,
    flocks: Vec<Flock>,
    rng: StdRng,
    clock: FixedTimestep,
    ticks: u64,
}

impl Simulation {
    pub fn new(world: World, seed: u64) -> Self {
        Self {
            world,
            paths: Vec::new(),
            flocks: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
            clock: FixedTimestep::default(),
            ticks: 0,
        }
    }

    pub fn with_clock(mut self, clock: FixedTimestep) -> Self {
        self.clock = clock;
        self
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn add_path(&mut self, path: Path) -> PathId {
        self.paths.push(path);
        PathId(self.paths.len() - 1)
    }

    pub fn path(&self, id: PathId) -> Option<&Path> {
        self.paths.get(id.0)
    }

    pub fn path_mut(&mut self, id: PathId) -> Option<&mut Path> {
        self.paths.get_mut(id.0)
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    pub fn add_flock(&mut self, flock: Flock) -> FlockId {
        self.flocks.push(flock);
        FlockId(self.flocks.len() - 1)
    }

    pub fn flock(&self, id: FlockId) -> Option<&Flock> {
        self.flocks.get(id.0)
    }

    pub fn flock_mut(&mut self, id: FlockId) -> Option<&mut Flock> {
        self.flocks.get_mut(id.0)
    }

    pub fn flocks(&self) -> &[Flock] {
        &self.flocks
    }

    pub fn flock_by_name(&self, name: &str) -> Option<FlockId> {
        self.flocks.iter().position(|flock| flock.name == name).map(FlockId)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn clock(&self) -> &FixedTimestep {
        &self.clock
    }

    pub fn set_mode(&mut self, id: FlockId, mode: BehaviorMode) -> bool {
        match self.flocks.get_mut(id.0) {
            Some(flock) => {
                flock.mode = mode;
                true
            }
            None => false,
        }
    }

    // Put one member on a path, picking its first target node
    pub fn attach_path(&mut self, flock: FlockId, member: usize, path: PathId) -> bool {
        let Some(route) = self.paths.get(path.0) else {
            return false;
        };
        match self
            .flocks
            .get_mut(flock.0)
            .and_then(|flock| flock.members.get_mut(member))
        {
            Some(member) => {
                member.vehicle.attach_path(path, route);
                true
            }
            None => false,
        }
    }

    // Put every member of a flock on a path; returns how many were attached
    pub fn attach_flock_to_path(&mut self, flock: FlockId, path: PathId) -> usize {
        let Some(route) = self.paths.get(path.0) else {
            return 0;
        };
        let Some(flock) = self.flocks.get_mut(flock.0) else {
            return 0;
        };
        for member in &mut flock.members {
            member.vehicle.attach_path(path, route);
        }
        flock.members.len()
    }

    pub fn set_pursuit_target(
        &mut self,
        flock: FlockId,
        member: usize,
        target: Option<TrackedTarget>,
    ) -> bool {
        self.flocks
            .get_mut(flock.0)
            .and_then(|flock| flock.members.get_mut(member))
            .is_some_and(|member| member.behavior.set_pursuit_target(target))
    }

    // Current position and heading of every member, flock by flock
    pub fn placements(&self) -> impl Iterator<Item = (FlockId, Vec3, Vec3)> + '_ {
        self.flocks.iter().enumerate().flat_map(|(index, flock)| {
            flock
                .members
                .iter()
                .map(move |member| (FlockId(index), member.vehicle.position, member.vehicle.direction))
        })
    }

    /// Runs every fixed step that `elapsed` wall-clock time makes due.
    /// Returns the number of steps taken.
    pub fn advance(&mut self, elapsed: Duration) -> usize {
        let steps = self.clock.accumulate(elapsed);
        let dt = self.clock.step_secs();
        for _ in 0..steps {
            self.tick(dt);
        }
        steps
    }

    /// Advances the whole simulation by `dt` seconds.
    pub fn tick(&mut self, dt: f32) -> TickReport {
        let mut report = TickReport::default();
        if !(dt.is_finite() && dt > 0.0) {
            return report;
        }

        let Self {
            world,
            paths,
            flocks,
            rng,
            ..
        } = self;
        let world: &World = world;

        for flock in flocks.iter_mut() {
            flock.update_aggregates();
        }

        let snapshots: Vec<FlockSnapshot> = flocks
            .iter()
            .map(|flock| FlockSnapshot::capture(flock, &world.bounds))
            .collect();

        for (index, flock) in flocks.iter_mut().enumerate() {
            let threatened = flock.members.iter().enumerate().any(|(member, entry)| {
                let ctx = SteeringContext {
                    world,
                    flocks: &snapshots,
                    flock: FlockId(index),
                    member,
                    weights: flock.weights,
                    path: None,
                };
                entry.behavior.senses_threat(&entry.vehicle, &ctx)
            });
            flock.resolve_posture(threatened);
        }

        for (index, flock) in flocks.iter_mut().enumerate() {
            let weights = flock.effective_weights();
            for (member_index, Member { vehicle, behavior }) in flock.members.iter_mut().enumerate() {
                let ctx = SteeringContext {
                    world,
                    flocks: &snapshots,
                    flock: FlockId(index),
                    member: member_index,
                    weights,
                    path: vehicle.path().and_then(|id| paths.get(id.0)),
                };
                let steering = behavior.steering_force(vehicle, &ctx, &mut *rng);
                vehicle.integrate(steering, dt, world);
                report.vehicles += 1;
            }
            if flock.is_panicked() {
                report.panicked_flocks += 1;
            }
        }

        self.ticks += 1;
        log::trace!("tick {} done: {:?}", self.ticks, report);
        report
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("world", &self.world)
            .field("paths", &self.paths.len())
            .field("flocks", &self.flocks.len())
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::Behavior;
    use crate::vehicle::{Vehicle, VehicleSettings};
    use crate::world::{Bounds, FlatTerrain};

    fn park() -> World {
        World::new(
            Bounds::new(Vec3::new(-50.0, 0.0, -50.0), Vec3::new(50.0, 0.0, 50.0), 1.5),
            Vec::new(),
            FlatTerrain::new(0.0),
        )
    }

    fn herd(count: usize) -> Flock {
        let mut flock = Flock::new("herd", Vec3::ZERO, Vec3::Z);
        for i in 0..count {
            let offset = Vec3::new(i as f32 * 1.5 - 3.0, 0.0, (i % 3) as f32);
            flock.spawn(
                Vehicle::new(offset, Vec3::Z, VehicleSettings::default()),
                Behavior::flocker(),
            );
        }
        flock
    }

    #[test]
    fn tick_updates_every_vehicle() {
        let mut sim = Simulation::new(park(), 1);
        sim.add_flock(herd(5));
        let report = sim.tick(0.05);
        assert_eq!(report.vehicles, 5);
        assert_eq!(sim.ticks(), 1);
    }

    #[test]
    fn non_positive_dt_is_ignored() {
        let mut sim = Simulation::new(park(), 1);
        let id = sim.add_flock(herd(2));
        let before: Vec<Vec3> = sim.flock(id).map(|f| f.positions().collect()).unwrap_or_default();
        assert_eq!(sim.tick(0.0), TickReport::default());
        assert_eq!(sim.tick(f32::NAN), TickReport::default());
        let after: Vec<Vec3> = sim.flock(id).map(|f| f.positions().collect()).unwrap_or_default();
        assert_eq!(before, after);
    }

    #[test]
    fn advance_runs_whole_fixed_steps() {
        let mut sim = Simulation::new(park(), 1)
            .with_clock(FixedTimestep::new(Duration::from_millis(20)));
        sim.add_flock(herd(1));
        assert_eq!(sim.advance(Duration::from_millis(50)), 2);
        assert_eq!(sim.ticks(), 2);
    }

    #[test]
    fn attaching_unknown_path_or_member_fails() {
        let mut sim = Simulation::new(park(), 1);
        let flock = sim.add_flock(herd(1));
        assert!(!sim.attach_path(flock, 0, PathId(0)));
        let path = sim.add_path(Path::new(vec![Vec3::ZERO, Vec3::X * 10.0], 1.0, 2.0, false));
        assert!(!sim.attach_path(flock, 4, path));
        assert!(sim.attach_path(flock, 0, path));
        assert_eq!(sim.attach_flock_to_path(FlockId(9), path), 0);
    }

    #[test]
    fn placements_cover_all_members() {
        let mut sim = Simulation::new(park(), 1);
        sim.add_flock(herd(3));
        sim.add_flock(herd(2));
        assert_eq!(sim.placements().count(), 5);
        assert_eq!(sim.flock_by_name("herd"), Some(FlockId(0)));
    }
}
