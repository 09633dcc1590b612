//! Steering primitive and path geometry behaviour as seen from outside the
//! crate.
use approx::assert_relative_eq;
use boid_steering::{Bounds, Obstacle, Path, PathId, Vehicle, VehicleSettings};
use glam::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rstest::rstest;

fn airborne(position: Vec3, velocity: Vec3) -> Vehicle {
    Vehicle::new(
        position,
        Vec3::Z,
        VehicleSettings {
            grounded: false,
            ..VehicleSettings::default()
        },
    )
    .with_velocity(velocity)
}

fn corner_path() -> Path {
    Path::new(
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 10.0),
        ],
        1.0,
        2.0,
        true,
    )
}

#[rstest]
#[case::at_rest(Vec3::ZERO)]
#[case::moving(Vec3::new(1.0, 0.0, 2.0))]
fn seek_and_flee_cancel_out(#[case] velocity: Vec3) {
    let vehicle = airborne(Vec3::ZERO, velocity);
    let target = Vec3::new(3.0, 0.0, -4.0);
    let sum = vehicle.seek(target) + vehicle.flee(target);
    assert_relative_eq!(sum.x, -2.0 * velocity.x, epsilon = 1e-5);
    assert_relative_eq!(sum.z, -2.0 * velocity.z, epsilon = 1e-5);
}

#[rstest]
#[case::just_inside(3.999)]
#[case::on_boundary(4.0)]
#[case::just_outside(4.001)]
fn arrive_is_continuous_at_the_slowing_radius(#[case] distance_sq: f32) {
    let vehicle = airborne(Vec3::ZERO, Vec3::ZERO);
    let target = Vec3::new(distance_sq.sqrt(), 0.0, 0.0);
    let arrive = vehicle.arrive(target, 4.0);
    assert_relative_eq!(arrive.length(), vehicle.max_speed, epsilon = 2e-3);
}

#[test]
fn arrive_stops_inside_the_deadband() {
    let vehicle = airborne(Vec3::ZERO, Vec3::ZERO);
    assert_eq!(vehicle.arrive(Vec3::new(0.5, 0.0, 0.0), 4.0), Vec3::ZERO);
}

#[test]
fn wander_angle_stays_within_a_quarter_turn() {
    let mut vehicle = airborne(Vec3::ZERO, Vec3::Z);
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..10_000 {
        vehicle.wander(&mut rng);
        assert!((-90.0..=90.0).contains(&vehicle.wander_angle));
    }
}

#[rstest]
#[case::first_on_the_right(
    vec![Obstacle::new(Vec3::new(0.5, 0.0, 3.0), 1.0), Obstacle::new(Vec3::new(-0.5, 0.0, 2.0), 1.0)],
    -1.0
)]
#[case::first_on_the_left(
    vec![Obstacle::new(Vec3::new(-0.5, 0.0, 2.0), 1.0), Obstacle::new(Vec3::new(0.5, 0.0, 3.0), 1.0)],
    1.0
)]
fn avoidance_follows_the_first_matching_obstacle(#[case] obstacles: Vec<Obstacle>, #[case] side: f32) {
    let vehicle = airborne(Vec3::ZERO, Vec3::new(0.0, 0.0, 5.0));
    let force = vehicle.avoid_obstacles(&obstacles);
    assert_eq!(force.x.signum(), side);
}

#[test]
fn avoidance_ignores_obstacles_behind() {
    let vehicle = airborne(Vec3::ZERO, Vec3::new(0.0, 0.0, 5.0));
    let behind = [Obstacle::new(Vec3::new(0.0, 0.0, -2.0), 1.0)];
    assert_eq!(vehicle.avoid_obstacles(&behind), Vec3::ZERO);
}

#[rstest]
#[case::east(Vec3::new(49.0, 0.0, 0.0))]
#[case::north_west(Vec3::new(-49.0, 0.0, 49.0))]
fn bounds_force_points_to_the_centre(#[case] position: Vec3) {
    let bounds = Bounds::new(Vec3::new(-50.0, 0.0, -50.0), Vec3::new(50.0, 0.0, 50.0), 1.5);
    let vehicle = airborne(position, Vec3::ZERO);
    let force = vehicle.stay_in_bounds(&bounds);
    let expected = (bounds.center() - position).normalize() * vehicle.max_speed * vehicle.max_speed;
    assert_relative_eq!(force.x, expected.x, epsilon = 1e-4);
    assert_relative_eq!(force.z, expected.z, epsilon = 1e-4);
}

#[test]
fn bounds_force_is_zero_inside_the_buffer() {
    let bounds = Bounds::new(Vec3::new(-50.0, 0.0, -50.0), Vec3::new(50.0, 0.0, 50.0), 1.5);
    let vehicle = airborne(Vec3::new(48.0, 0.0, 0.0), Vec3::ZERO);
    assert_eq!(vehicle.stay_in_bounds(&bounds), Vec3::ZERO);
}

#[rstest]
#[case::short_of_the_node(Vec3::new(7.0, 0.0, 0.0), 1)]
#[case::within_proximity(Vec3::new(9.0, 0.0, 0.0), 2)]
fn point_based_node_advancement(#[case] position: Vec3, #[case] expected_target: usize) {
    let path = corner_path();
    let mut vehicle = airborne(position, Vec3::ZERO);
    vehicle.attach_path(PathId(0), &path);
    assert_eq!(vehicle.target_node_index(), 1);

    vehicle.follow_path(&path, 0.5);
    assert_eq!(vehicle.target_node_index(), expected_target);
}

#[rstest]
#[case::first_edge(Vec3::new(5.0, 0.0, -0.5), 0)]
#[case::second_edge(Vec3::new(10.5, 0.0, 5.0), 1)]
#[case::closing_edge(Vec3::new(4.0, 0.0, 5.0), 2)]
fn closest_segment_of_a_triangle(#[case] query: Vec3, #[case] expected: usize) {
    assert_eq!(corner_path().closest_segment_index(query), Some(expected));
}

#[test]
fn degenerate_paths_never_panic() {
    let empty = Path::default();
    assert_eq!(empty.closest_segment_index(Vec3::ONE), None);
    assert_eq!(empty.segment(0), Vec3::ZERO);

    let single = Path::new(vec![Vec3::ONE], 1.0, 2.0, false);
    assert_eq!(single.closest_segment_index(Vec3::ZERO), Some(0));
    assert_eq!(single.segment(0), Vec3::ZERO);

    let mut vehicle = airborne(Vec3::ZERO, Vec3::X);
    vehicle.attach_path(PathId(0), &single);
    assert_eq!(vehicle.follow_path(&single, 0.5), Vec3::ZERO);
}
