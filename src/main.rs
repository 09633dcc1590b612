/*
 * Boid Steering - Headless Host
 *
 * Loads a scenario (the built-in park unless a file is given), drives it
 * through the fixed timestep clock frame by frame and logs each flock's
 * aggregate state every few frames. Nothing is rendered.
 */

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use boid_steering::{logging, BehaviorMode, Scenario, Simulation};
use clap::Parser;
use log::info;

const BUILT_IN_PARK: &str = include_str!("../scenarios/park.json");

/// Headless steering-behaviour simulation
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scenario JSON file; the built-in park is used when omitted
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Number of host frames to simulate
    #[arg(short, long, default_value_t = 600)]
    frames: u32,

    /// Wall-clock duration of one host frame in milliseconds
    #[arg(long, default_value_t = 16)]
    frame_ms: u64,

    /// Override every flock's mode (flocking, leader-following, path-following)
    #[arg(short, long)]
    mode: Option<BehaviorMode>,

    /// Seed for spawning and wandering
    #[arg(long)]
    seed: Option<u64>,

    /// Log flock aggregates every this many frames
    #[arg(long, default_value_t = 60)]
    report_every: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_scenario(args: &Args) -> Result<Scenario> {
    let mut scenario = match &args.scenario {
        Some(path) => Scenario::from_path(path)
            .with_context(|| format!("could not load scenario {}", path.display()))?,
        None => Scenario::from_json(BUILT_IN_PARK).context("built-in park scenario is invalid")?,
    };

    if let Some(seed) = args.seed {
        scenario.seed = seed;
    }
    if let Some(mode) = args.mode {
        scenario.override_mode(mode);
    }
    Ok(scenario)
}

fn report(sim: &Simulation, frame: u32) {
    for flock in sim.flocks() {
        let centre = flock.average_position();
        let heading = flock.average_direction();
        info!(
            "frame {frame:>5} tick {:>6} | {:<10} {:>3} members {:?} centre ({:>7.2}, {:>7.2}) heading ({:>5.2}, {:>5.2}){}",
            sim.ticks(),
            flock.name,
            flock.len(),
            flock.mode,
            centre.x,
            centre.z,
            heading.x,
            heading.z,
            if flock.is_panicked() { " PANIC" } else { "" }
        );
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let scenario = load_scenario(&args)?;
    let mut sim = scenario.build().context("could not build simulation")?;
    info!(
        "simulating {} flocks for {} frames of {} ms (step {:?})",
        sim.flocks().len(),
        args.frames,
        args.frame_ms,
        sim.clock().step()
    );

    let frame_time = Duration::from_millis(args.frame_ms);
    let report_every = args.report_every.max(1);
    for frame in 1..=args.frames {
        sim.advance(frame_time);
        if frame % report_every == 0 {
            report(&sim, frame);
        }
    }

    info!("finished after {} ticks", sim.ticks());
    Ok(())
}
