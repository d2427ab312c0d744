/*
 * Physics Module
 *
 * This module turns a blended direction into motion:
 * - steering: the change of velocity towards the direction, damped by mass
 * - integration: velocity and position update with the base speed floor
 * - orientation: yaw and pitch derived from the velocity
 *
 * Everything here is a pure function so the boid pipeline can call the steps
 * in a fixed order on values captured at the start of the tick.
 */

use nannou::prelude::*;

use crate::TIME_STEP;

// Result of one integration step
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Motion {
    pub position: Point3,
    pub velocity: Vec3,
    pub speed: f32,
}

// Steering = (Desired - Velocity) / mass. A zero mass is treated as one.
pub fn steering(direction: Vec3, velocity: Vec3, mass: f32) -> Vec3 {
    let mass = if mass == 0.0 || !mass.is_finite() { 1.0 } else { mass };
    (direction - velocity) / mass
}

// Apply the steering to the velocity, keep the speed within [floor, cap], then
// advance the position by one tick.
pub fn integrate(
    position: Point3,
    velocity: Vec3,
    steering: Vec3,
    speed_floor: f32,
    max_speed: Option<f32>,
) -> Motion {
    let floor = if speed_floor.is_finite() { speed_floor.max(0.0) } else { 0.0 };

    let mut new_velocity = velocity + steering;
    if !new_velocity.is_finite() {
        new_velocity = velocity;
    }

    // Limit speed
    if let Some(cap) = max_speed {
        if cap.is_finite() && cap > floor && new_velocity.length() > cap {
            new_velocity = new_velocity.normalize() * cap;
        }
    }

    // The floor wins over the cap
    let speed = new_velocity.length();
    if speed < floor {
        let heading = if speed > f32::EPSILON {
            new_velocity / speed
        } else {
            fallback_heading(velocity)
        };
        new_velocity = heading * floor;
    }

    Motion {
        position: position + new_velocity * TIME_STEP,
        velocity: new_velocity,
        speed: new_velocity.length(),
    }
}

// A stalled boid keeps going the way it was heading, or along +x from rest
fn fallback_heading(previous: Vec3) -> Vec3 {
    let heading = previous.normalize_or_zero();
    if heading == Vec3::ZERO || !heading.is_finite() {
        vec3(1.0, 0.0, 0.0)
    } else {
        heading
    }
}

// (pitch, yaw) in degrees. Yaw turns about +y from +z towards +x, pitch
// lifts the nose towards +y.
pub fn orientation(velocity: Vec3) -> (f32, f32) {
    let horizontal = (velocity.x * velocity.x + velocity.z * velocity.z).sqrt();
    let yaw = velocity.x.atan2(velocity.z).to_degrees();
    let pitch = velocity.y.atan2(horizontal).to_degrees();
    (pitch, yaw)
}
