/*
 * Steering Module
 *
 * Pure functions for the five flocking rules. Each takes the boid's own state,
 * the neighbour states captured at the start of the tick and a weight, and
 * returns an already-weighted force:
 * 1. Cohesion: steer towards the average position of neighbours
 * 2. Alignment: match the average velocity of neighbours
 * 3. Separation: push away from neighbours that are too close
 * 4. Avoidance: steer off a detected obstacle lying on the projected path
 * 5. Reposition: pull back towards the interior of the swarm bounds
 *
 * None of these ever fail; degenerate input produces the zero vector or a
 * deterministic fallback direction.
 */

use nannou::prelude::*;

use crate::params::{Bounds, Obstacle};
use crate::SEPARATION_SOFTENING;

/// The part of a boid other boids are allowed to see during a tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Kinematics {
    pub id: usize,
    pub position: Point3,
    pub velocity: Vec3,
}

pub fn cohesion(position: Point3, neighbours: &[Kinematics], weight: i32) -> Vec3 {
    if neighbours.is_empty() {
        return Vec3::ZERO;
    }

    let mut centre = Vec3::ZERO;
    for other in neighbours {
        centre += other.position;
    }
    centre /= neighbours.len() as f32;

    (centre - position) * weight as f32
}

pub fn alignment(velocity: Vec3, neighbours: &[Kinematics], weight: i32) -> Vec3 {
    if neighbours.is_empty() {
        return Vec3::ZERO;
    }

    let mut heading = Vec3::ZERO;
    for other in neighbours {
        heading += other.velocity;
    }
    heading /= neighbours.len() as f32;

    (heading - velocity) * weight as f32
}

/// Sum of repulsions from every neighbour closer than `threshold`.
///
/// A neighbour at distance `d` contributes a unit vector pointing away from it
/// scaled by `1 / (d + SEPARATION_SOFTENING)`, so the push grows as neighbours
/// close in but stays finite when they coincide.
pub fn separation(own: &Kinematics, neighbours: &[Kinematics], threshold: f32, weight: i32) -> Vec3 {
    let mut push = Vec3::ZERO;

    for other in neighbours {
        let offset = own.position - other.position;
        let d = offset.length();
        if !(d < threshold) {
            continue;
        }

        let away = if d > f32::EPSILON {
            offset / d
        } else {
            tracing::trace!(boid = own.id, other = other.id, "coincident neighbour");
            coincident_escape(own.id, other.id)
        };

        push += away / (d + SEPARATION_SOFTENING);
    }

    push * weight as f32
}

// Two boids sharing a position split along x, lower id going negative.
// Equal ids (a self reference) resolve the same way every time.
fn coincident_escape(own_id: usize, other_id: usize) -> Vec3 {
    if own_id <= other_id {
        vec3(-1.0, 0.0, 0.0)
    } else {
        vec3(1.0, 0.0, 0.0)
    }
}

/// Force away from `obstacle` when the boid's look-ahead path hits it.
///
/// The path runs from `position` along the heading for `view_range` units and
/// is swept by the boid's bounding radius. The force grows with how deeply the
/// path cuts into the obstacle.
pub fn avoidance(
    position: Point3,
    velocity: Vec3,
    bound_radius: f32,
    view_range: f32,
    obstacle: Option<Obstacle>,
    weight: i32,
) -> Vec3 {
    let obstacle = match obstacle {
        Some(obstacle) => obstacle,
        None => return Vec3::ZERO,
    };

    let heading = velocity.normalize_or_zero();
    let reach = view_range.max(0.0);

    // Closest point of the look-ahead segment to the obstacle centre
    let along = (obstacle.centre - position).dot(heading).clamp(0.0, reach);
    let closest = position + heading * along;
    let miss_distance = closest.distance(obstacle.centre);

    let clearance = obstacle.radius.max(0.0) + bound_radius.max(0.0);
    let penetration = clearance - miss_distance;
    if penetration <= 0.0 {
        return Vec3::ZERO;
    }

    let offset = position - obstacle.centre;
    let away = if offset.length_squared() > f32::EPSILON {
        offset.normalize()
    } else if heading != Vec3::ZERO {
        -heading
    } else {
        vec3(0.0, 1.0, 0.0)
    };

    away * penetration * weight as f32
}

/// Pull towards `interior` proportional to how far outside the bounds the boid is.
pub fn reposition_towards(position: Point3, interior: Point3, overshoot: f32, weight: i32) -> Vec3 {
    if overshoot <= 0.0 {
        return Vec3::ZERO;
    }
    (interior - position).normalize_or_zero() * overshoot * weight as f32
}

/// Boundary force: zero inside the bounds, towards the bounds centre outside.
pub fn reposition(position: Point3, bounds: Option<&Bounds>, weight: i32) -> Vec3 {
    match bounds {
        Some(bounds) => {
            reposition_towards(position, bounds.centre(), bounds.distance_outside(position), weight)
        }
        None => Vec3::ZERO,
    }
}

/// Weighted direction: plain sum, each force already carries its weight.
pub fn blend(forces: &[Vec3]) -> Vec3 {
    forces.iter().fold(Vec3::ZERO, |acc, &force| acc + force)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(id: usize, x: f32, y: f32, z: f32) -> Kinematics {
        Kinematics {
            id,
            position: pt3(x, y, z),
            velocity: Vec3::ZERO,
        }
    }

    #[test]
    fn empty_neighbourhood_has_no_cohesion_or_alignment() {
        let position = pt3(3.0, -2.0, 7.0);
        let velocity = vec3(1.0, 2.0, 3.0);
        assert_eq!(cohesion(position, &[], 5), Vec3::ZERO);
        assert_eq!(alignment(velocity, &[], 5), Vec3::ZERO);
    }

    #[test]
    fn cohesion_points_at_centroid_scaled_by_weight() {
        let neighbours = [at(1, 2.0, 0.0, 0.0), at(2, 4.0, 0.0, 0.0)];
        let force = cohesion(Point3::ZERO, &neighbours, 2);
        assert_eq!(force, vec3(6.0, 0.0, 0.0));
    }

    #[test]
    fn alignment_matches_mean_velocity() {
        let mut a = at(1, 0.0, 0.0, 0.0);
        let mut b = at(2, 0.0, 0.0, 0.0);
        a.velocity = vec3(2.0, 0.0, 0.0);
        b.velocity = vec3(0.0, 2.0, 0.0);
        let force = alignment(vec3(1.0, 1.0, 0.0), &[a, b], 1);
        assert_eq!(force, Vec3::ZERO);
    }

    #[test]
    fn separation_ignores_neighbours_at_or_beyond_threshold() {
        let own = at(0, 0.0, 0.0, 0.0);
        let neighbours = [at(1, 2.0, 0.0, 0.0), at(2, 0.0, 3.0, 0.0)];
        assert_eq!(separation(&own, &neighbours, 2.0, 10), Vec3::ZERO);
    }

    #[test]
    fn separation_weakens_with_distance() {
        let own = at(0, 0.0, 0.0, 0.0);
        let mut last = f32::INFINITY;
        for step in 0..40 {
            let d = step as f32 * 0.1;
            let force = separation(&own, &[at(1, d, 0.0, 0.0)], 4.0, 1);
            let magnitude = force.length();
            assert!(magnitude < last, "d = {} gave {} after {}", d, magnitude, last);
            last = magnitude;
        }
    }

    #[test]
    fn separation_pushes_away_from_neighbour() {
        let own = at(0, 0.0, 0.0, 0.0);
        let force = separation(&own, &[at(1, 0.0, 0.0, 1.0)], 4.0, 3);
        assert!(force.z < 0.0);
        assert_eq!(force.x, 0.0);
    }

    #[test]
    fn coincident_boids_split_in_opposite_directions() {
        let a = at(4, 1.0, 1.0, 1.0);
        let b = at(9, 1.0, 1.0, 1.0);
        let fa = separation(&a, &[b], 2.0, 5);
        let fb = separation(&b, &[a], 2.0, 5);
        assert!(fa.is_finite() && fb.is_finite());
        assert!(fa.length() > 0.0);
        assert_eq!(fa, -fb);
    }

    #[test]
    fn avoidance_needs_a_recorded_obstacle() {
        let force = avoidance(Point3::ZERO, vec3(1.0, 0.0, 0.0), 1.0, 10.0, None, 10);
        assert_eq!(force, Vec3::ZERO);
    }

    #[test]
    fn avoidance_ignores_obstacles_off_the_path() {
        let obstacle = Obstacle::new(pt3(5.0, 8.0, 0.0), 1.0);
        let force = avoidance(Point3::ZERO, vec3(1.0, 0.0, 0.0), 1.0, 10.0, Some(obstacle), 10);
        assert_eq!(force, Vec3::ZERO);
    }

    #[test]
    fn avoidance_ignores_obstacles_beyond_view_range() {
        let obstacle = Obstacle::new(pt3(30.0, 0.0, 0.0), 2.0);
        let force = avoidance(Point3::ZERO, vec3(1.0, 0.0, 0.0), 1.0, 10.0, Some(obstacle), 10);
        assert_eq!(force, Vec3::ZERO);
    }

    #[test]
    fn avoidance_pushes_away_from_obstacle_ahead() {
        let obstacle = Obstacle::new(pt3(5.0, 0.5, 0.0), 2.0);
        let force = avoidance(Point3::ZERO, vec3(1.0, 0.0, 0.0), 1.0, 10.0, Some(obstacle), 10);
        assert!(force.x < 0.0);
        assert!(force.y < 0.0);
    }

    #[test]
    fn resting_boid_inside_obstacle_is_pushed_out() {
        let obstacle = Obstacle::new(pt3(0.0, -1.0, 0.0), 2.0);
        let force = avoidance(Point3::ZERO, Vec3::ZERO, 0.5, 10.0, Some(obstacle), 1);
        assert!(force.y > 0.0);
    }

    #[test]
    fn reposition_is_zero_inside_bounds() {
        let bounds = Bounds::cube(10.0);
        assert_eq!(reposition(pt3(9.0, -9.0, 0.0), Some(&bounds), 3), Vec3::ZERO);
        assert_eq!(reposition(pt3(90.0, 0.0, 0.0), None, 3), Vec3::ZERO);
    }

    #[test]
    fn reposition_grows_with_overshoot_and_points_inward() {
        let bounds = Bounds::cube(10.0);
        let near = reposition(pt3(12.0, 0.0, 0.0), Some(&bounds), 1);
        let far = reposition(pt3(20.0, 0.0, 0.0), Some(&bounds), 1);
        assert!(near.x < 0.0 && far.x < 0.0);
        assert!(far.length() > near.length());
        assert!((near.length() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn blend_is_an_unnormalised_sum() {
        let direction = blend(&[vec3(1.0, 0.0, 0.0), vec3(0.0, 2.0, 0.0), vec3(0.0, 0.0, -3.0)]);
        assert_eq!(direction, vec3(1.0, 2.0, -3.0));
    }
}
