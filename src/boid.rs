/*
 * Boid Module
 *
 * This module defines the Boid struct: one autonomous agent of the swarm.
 * Each tick the coordinator hands the boid its neighbours (as indices into the
 * swarm registry) and calls `flock`, which runs a fixed pipeline:
 * 1. Cohesion, alignment and separation from the neighbour snapshot
 * 2. Avoidance from the collision recorded this tick
 * 3. Reposition back inside the swarm bounds
 * 4. Blend, steer, integrate, and derive the orientation from the new velocity
 */

use nannou::prelude::*;

use crate::params::{BoidParams, Bounds, Obstacle};
use crate::physics;
use crate::steering::{self, Kinematics};

#[derive(Clone, Debug)]
pub struct Boid {
    id: usize,
    position: Point3,
    velocity: Vec3,
    speed: f32,
    yaw: f32,
    pitch: f32,
    params: BoidParams,
    bounds: Option<Bounds>,

    // Transient, rebuilt every tick
    neighbours: Vec<usize>,
    cohesion: Vec3,
    alignment: Vec3,
    separation: Vec3,
    avoid: Vec3,
    reposition: Vec3,
    direction: Vec3,
    steering: Vec3,
    collision: Option<Obstacle>,
}

impl Boid {
    pub fn new(id: usize) -> Self {
        Self::with_params(id, BoidParams::default())
    }

    pub fn with_params(id: usize, params: BoidParams) -> Self {
        Self {
            id,
            position: Point3::ZERO,
            velocity: Vec3::ZERO,
            speed: 0.0,
            yaw: 0.0,
            pitch: 0.0,
            params,
            bounds: None,
            neighbours: Vec::new(),
            cohesion: Vec3::ZERO,
            alignment: Vec3::ZERO,
            separation: Vec3::ZERO,
            avoid: Vec3::ZERO,
            reposition: Vec3::ZERO,
            direction: Vec3::ZERO,
            steering: Vec3::ZERO,
            collision: None,
        }
    }

    // ---- configuration ----

    pub fn set_pos(&mut self, x: f32, y: f32, z: f32) {
        self.position = pt3(x, y, z);
    }

    // Resets the orientation as well, since it is derived from velocity
    pub fn set_velocity(&mut self, x: f32, y: f32, z: f32) {
        self.velocity = vec3(x, y, z);
        self.speed = self.velocity.length();
        self.set_rotate();
    }

    pub fn set_params(&mut self, params: BoidParams) {
        self.params = params;
    }

    pub fn set_bounds(&mut self, bounds: Option<Bounds>) {
        self.bounds = bounds;
    }

    pub fn set_separation_weight(&mut self, weight: i32) {
        self.params.separation_weight = weight;
    }

    pub fn set_cohesion_weight(&mut self, weight: i32) {
        self.params.cohesion_weight = weight;
    }

    pub fn set_alignment_weight(&mut self, weight: i32) {
        self.params.alignment_weight = weight;
    }

    pub fn set_avoid_weight(&mut self, weight: i32) {
        self.params.avoid_weight = weight;
    }

    pub fn set_reposition_weight(&mut self, weight: i32) {
        self.params.reposition_weight = weight;
    }

    pub fn set_mass(&mut self, mass: i32) {
        self.params.mass = mass;
    }

    // Sets the base speed; the next update lifts the velocity up to it
    pub fn set_speed(&mut self, speed: f32) {
        self.params.set_speed = speed;
    }

    pub fn set_max_speed(&mut self, max_speed: Option<f32>) {
        self.params.max_speed = max_speed;
    }

    pub fn set_separation_distance(&mut self, distance: f32) {
        self.params.separation_distance = distance;
    }

    pub fn set_view_range(&mut self, range: f32) {
        self.params.view_range = range;
    }

    pub fn set_search_radius(&mut self, radius: f32) {
        self.params.search_radius = radius;
    }

    pub fn set_bound_radius(&mut self, radius: f32) {
        self.params.bound_radius = radius;
    }

    // ---- neighbours ----

    // No dedup or filtering; the coordinator decides who qualifies
    pub fn set_neighbour(&mut self, index: usize) {
        self.neighbours.push(index);
    }

    pub fn clear_neighbours(&mut self) {
        self.neighbours.clear();
    }

    pub fn neighbour_count(&self) -> usize {
        self.neighbours.len()
    }

    pub fn neighbours(&self) -> &[usize] {
        &self.neighbours
    }

    // ---- queries ----

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn position(&self) -> Point3 {
        self.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// (pitch, yaw, 0) in degrees.
    pub fn rotation(&self) -> Vec3 {
        vec3(self.pitch, self.yaw, 0.0)
    }

    pub fn radius(&self) -> f32 {
        self.params.bound_radius
    }

    pub fn search_radius(&self) -> f32 {
        self.params.search_radius
    }

    pub fn params(&self) -> &BoidParams {
        &self.params
    }

    pub fn bounds(&self) -> Option<&Bounds> {
        self.bounds.as_ref()
    }

    pub fn kinematics(&self) -> Kinematics {
        Kinematics {
            id: self.id,
            position: self.position,
            velocity: self.velocity,
        }
    }

    pub fn cohesion(&self) -> Vec3 {
        self.cohesion
    }

    pub fn alignment(&self) -> Vec3 {
        self.alignment
    }

    pub fn separation(&self) -> Vec3 {
        self.separation
    }

    pub fn avoid(&self) -> Vec3 {
        self.avoid
    }

    pub fn reposition(&self) -> Vec3 {
        self.reposition
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn steering(&self) -> Vec3 {
        self.steering
    }

    pub fn collision_position(&self) -> Option<Point3> {
        self.collision.map(|obstacle| obstacle.centre)
    }

    // ---- collisions ----

    /// Sphere test against the boid's bounding sphere.
    ///
    /// An overlap is recorded for the next `flock`; when several spheres
    /// overlap within one tick the nearest one is kept. Returns whether the
    /// spheres overlap.
    pub fn collision(&mut self, pos: Point3, radius: f32) -> bool {
        let distance = self.position.distance(pos);
        if !(distance < self.params.bound_radius + radius) {
            return false;
        }

        let nearer = match self.collision {
            Some(recorded) => distance < self.position.distance(recorded.centre),
            None => true,
        };
        if nearer {
            self.collision = Some(Obstacle::new(pos, radius));
        }
        true
    }

    pub fn clear_collision(&mut self) {
        self.collision = None;
    }

    // ---- pipeline steps ----

    // Resolve neighbour indices against the tick snapshot. Out-of-range
    // indices are a coordinator bug and are skipped.
    fn gather(&self, snapshot: &[Kinematics]) -> Vec<Kinematics> {
        let mut gathered = Vec::with_capacity(self.neighbours.len());
        for &index in &self.neighbours {
            match snapshot.get(index) {
                Some(other) => gathered.push(*other),
                None => tracing::warn!(boid = self.id, index, "neighbour index outside snapshot"),
            }
        }
        gathered
    }

    pub fn compute_cohesion(&mut self, neighbours: &[Kinematics]) {
        self.cohesion = steering::cohesion(self.position, neighbours, self.params.cohesion_weight);
    }

    pub fn compute_alignment(&mut self, neighbours: &[Kinematics]) {
        self.alignment = steering::alignment(self.velocity, neighbours, self.params.alignment_weight);
    }

    pub fn compute_separation(&mut self, neighbours: &[Kinematics]) {
        self.separation = steering::separation(
            &self.kinematics(),
            neighbours,
            self.params.separation_distance,
            self.params.separation_weight,
        );
    }

    pub fn compute_avoid(&mut self) {
        self.avoid = steering::avoidance(
            self.position,
            self.velocity,
            self.params.bound_radius,
            self.params.view_range,
            self.collision,
            self.params.avoid_weight,
        );
    }

    // Pull towards `interior` by `overshoot`, the distance outside the bounds
    pub fn set_reposition(&mut self, interior: Point3, overshoot: f32) {
        self.reposition = steering::reposition_towards(
            self.position,
            interior,
            overshoot,
            self.params.reposition_weight,
        );
    }

    pub fn reposition_bounds(&mut self) {
        self.reposition = steering::reposition(
            self.position,
            self.bounds.as_ref(),
            self.params.reposition_weight,
        );
    }

    pub fn set_direction(&mut self) {
        self.direction = steering::blend(&[
            self.cohesion,
            self.alignment,
            self.separation,
            self.avoid,
            self.reposition,
        ]);
    }

    pub fn set_steering(&mut self) {
        if self.params.mass == 0 {
            tracing::trace!(boid = self.id, "zero mass, steering with unit mass");
        }
        self.steering = physics::steering(self.direction, self.velocity, self.params.effective_mass());
    }

    pub fn update_position(&mut self) {
        let motion = physics::integrate(
            self.position,
            self.velocity,
            self.steering,
            self.params.speed_floor(),
            self.params.max_speed,
        );
        self.position = motion.position;
        self.velocity = motion.velocity;
        self.speed = motion.speed;
    }

    pub fn set_rotate(&mut self) {
        let (pitch, yaw) = physics::orientation(self.velocity);
        self.pitch = pitch;
        self.yaw = yaw;
    }

    /// Runs one tick of the flocking pipeline against `snapshot`, the state
    /// of every boid captured before any boid moved this tick.
    pub fn flock(&mut self, snapshot: &[Kinematics]) {
        let neighbours = self.gather(snapshot);

        self.compute_cohesion(&neighbours);
        self.compute_alignment(&neighbours);
        self.compute_separation(&neighbours);
        self.compute_avoid();
        self.reposition_bounds();
        self.set_direction();
        self.set_steering();
        self.update_position();
        self.set_rotate();

        // Collisions are reported afresh every tick
        self.collision = None;
    }
}
