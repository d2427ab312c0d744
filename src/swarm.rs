/*
 * Swarm Module
 *
 * The Swarm owns every boid and drives the per-tick pipeline:
 * 1. Read phase: snapshot every boid, rebuild the spatial grid, rebuild each
 *    boid's neighbour list and report obstacle (and optionally peer) collisions
 * 2. Write phase: every boid runs `flock` against the snapshot
 *
 * Boids only ever read the snapshot, so both phases may run in parallel across
 * boids. The phases themselves never overlap.
 */

use nannou::prelude::*;
use rand::Rng;
use rayon::prelude::*;
use std::time::Instant;

use crate::boid::Boid;
use crate::error::{Result, SwarmError};
use crate::params::{BoidParams, Bounds, Obstacle, SwarmParams};
use crate::spatial_grid::SpatialGrid;
use crate::stats::TickStats;
use crate::steering::Kinematics;

pub struct Swarm {
    boids: Vec<Boid>,
    params: SwarmParams,
    spatial_grid: SpatialGrid,
    next_id: usize,
    ticks: u64,
    stats: TickStats,
}

// Shared, read-only inputs of the read phase
struct ReadPhase<'a> {
    snapshot: &'a [Kinematics],
    radii: &'a [f32],
    grid: Option<&'a SpatialGrid>,
    obstacles: &'a [Obstacle],
    fov_cos: f32,
    all_round: bool,
    peer_collisions: bool,
}

impl ReadPhase<'_> {
    // Rebuild one boid's neighbour list and report its collisions.
    // Returns (neighbours found, collisions reported).
    fn discover(&self, slot: usize, boid: &mut Boid) -> (usize, usize) {
        boid.clear_neighbours();
        boid.clear_collision();

        let own = match self.snapshot.get(slot) {
            Some(own) => *own,
            None => {
                tracing::warn!(boid = boid.id(), slot, "slot outside the snapshot, skipping discovery");
                return (0, 0);
            }
        };
        let radius = boid.search_radius();
        let heading = own.velocity.normalize_or_zero();

        let candidates: Vec<usize> = match self.grid {
            Some(grid) => grid.nearby(own.position, radius),
            None => (0..self.snapshot.len()).collect(),
        };

        let mut collisions = 0;
        for other_slot in candidates {
            if other_slot == slot {
                continue;
            }
            let other = match self.snapshot.get(other_slot) {
                Some(other) => other,
                None => continue,
            };
            let offset = other.position - own.position;
            let distance = offset.length();
            if !(distance < radius) || !self.in_view(heading, offset, distance) {
                continue;
            }

            boid.set_neighbour(other_slot);
            let other_radius = self.radii.get(other_slot).copied().unwrap_or(0.0);
            if self.peer_collisions && boid.collision(other.position, other_radius) {
                collisions += 1;
            }
        }

        for obstacle in self.obstacles {
            if boid.collision(obstacle.centre, obstacle.radius) {
                collisions += 1;
            }
        }

        (boid.neighbour_count(), collisions)
    }

    fn in_view(&self, heading: Vec3, offset: Vec3, distance: f32) -> bool {
        if self.all_round || heading == Vec3::ZERO || distance <= f32::EPSILON {
            return true;
        }
        heading.dot(offset / distance) >= self.fov_cos
    }
}

impl Swarm {
    pub fn new(params: SwarmParams) -> Result<Self> {
        params.validate()?;

        let cell_size = params.boid.search_radius * params.cell_size_factor;
        let spatial_grid = SpatialGrid::new(cell_size, &params.bounds);
        tracing::info!(
            cell_size = spatial_grid.cell_size,
            cells = spatial_grid.cell_count(),
            obstacles = params.obstacles.len(),
            "swarm created"
        );

        Ok(Self {
            boids: Vec::with_capacity(params.num_boids),
            params,
            spatial_grid,
            next_id: 0,
            ticks: 0,
            stats: TickStats::default(),
        })
    }

    // Create a swarm already populated with `num_boids` random boids
    pub fn populated<R: Rng>(params: SwarmParams, rng: &mut R) -> Result<Self> {
        let mut swarm = Self::new(params)?;
        swarm.reset(rng);
        Ok(swarm)
    }

    // Resize the swarm to `num_boids`, scattering new boids inside the bounds
    // with a random heading at base speed
    pub fn reset<R: Rng>(&mut self, rng: &mut R) {
        let target = self.params.num_boids;
        if self.boids.len() > target {
            self.boids.truncate(target);
            self.forget_neighbours();
        }

        let bounds = self.params.bounds;
        let speed = self.params.boid.speed_floor();
        while self.boids.len() < target {
            let position = pt3(
                random_axis(rng, bounds.min.x, bounds.max.x),
                random_axis(rng, bounds.min.y, bounds.max.y),
                random_axis(rng, bounds.min.z, bounds.max.z),
            );
            let heading = vec3(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            )
            .normalize_or_zero();
            self.spawn(position, heading * speed);
        }

        tracing::info!(boids = self.boids.len(), "swarm reset");
    }

    // Add a boid configured with the swarm's boid parameters; returns its id
    pub fn spawn(&mut self, position: Point3, velocity: Vec3) -> usize {
        let id = self.next_id;
        self.next_id += 1;

        let mut boid = Boid::with_params(id, self.params.boid);
        boid.set_bounds(Some(self.params.bounds));
        boid.set_pos(position.x, position.y, position.z);
        boid.set_velocity(velocity.x, velocity.y, velocity.z);
        self.boids.push(boid);
        id
    }

    pub fn remove(&mut self, id: usize) -> Result<Boid> {
        let slot = self.slot_of(id).ok_or(SwarmError::UnknownBoid(id))?;
        let boid = self.boids.remove(slot);
        // Slots shifted, every list is stale until the next read phase
        self.forget_neighbours();
        tracing::debug!(id, "boid removed");
        Ok(boid)
    }

    fn forget_neighbours(&mut self) {
        for boid in &mut self.boids {
            boid.clear_neighbours();
        }
    }

    fn slot_of(&self, id: usize) -> Option<usize> {
        self.boids.iter().position(|boid| boid.id() == id)
    }

    pub fn boid(&self, id: usize) -> Option<&Boid> {
        self.slot_of(id).map(|slot| &self.boids[slot])
    }

    pub fn boid_mut(&mut self, id: usize) -> Option<&mut Boid> {
        let slot = self.slot_of(id)?;
        Some(&mut self.boids[slot])
    }

    pub fn boids(&self) -> &[Boid] {
        &self.boids
    }

    pub fn len(&self) -> usize {
        self.boids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boids.is_empty()
    }

    pub fn params(&self) -> &SwarmParams {
        &self.params
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    // Live tuning: apply `params` to every boid. Returns whether anything changed.
    pub fn set_boid_params(&mut self, params: BoidParams) -> Result<bool> {
        params.validate()?;
        if params == self.params.boid {
            return Ok(false);
        }

        let radius_changed = params.search_radius != self.params.boid.search_radius;
        self.params.boid = params;
        for boid in &mut self.boids {
            boid.set_params(params);
        }
        if radius_changed {
            self.rebuild_grid();
        }

        tracing::debug!(?params, "boid parameters updated");
        Ok(true)
    }

    pub fn set_bounds(&mut self, bounds: Bounds) -> Result<()> {
        bounds.validate()?;
        self.params.bounds = bounds;
        for boid in &mut self.boids {
            boid.set_bounds(Some(bounds));
        }
        self.rebuild_grid();
        Ok(())
    }

    pub fn add_obstacle(&mut self, obstacle: Obstacle) -> Result<()> {
        if !obstacle.centre.is_finite() || !obstacle.radius.is_finite() || obstacle.radius < 0.0 {
            return Err(SwarmError::InvalidParams(format!(
                "obstacle at {:?} has invalid radius {}",
                obstacle.centre.to_array(),
                obstacle.radius
            )));
        }
        self.params.obstacles.push(obstacle);
        Ok(())
    }

    pub fn clear_obstacles(&mut self) {
        self.params.obstacles.clear();
    }

    pub fn set_parallel(&mut self, enabled: bool) {
        self.params.enable_parallel = enabled;
    }

    // Cell size must cover the largest search radius in the swarm
    fn rebuild_grid(&mut self) {
        let max_radius = self
            .boids
            .iter()
            .map(Boid::search_radius)
            .fold(self.params.boid.search_radius, f32::max);
        let cell_size = max_radius * self.params.cell_size_factor;
        self.spatial_grid = SpatialGrid::new(cell_size, &self.params.bounds);
    }

    pub fn snapshot(&self) -> Vec<Kinematics> {
        self.boids.iter().map(Boid::kinematics).collect()
    }

    // Read phase. Returns (neighbour links, collisions).
    fn build_neighbours(&mut self, snapshot: &[Kinematics], chunk_size: Option<usize>) -> (usize, usize) {
        let use_grid = self.params.enable_spatial_grid;
        if use_grid {
            // Per-boid radii may have been tuned individually
            let needed = self.boids.iter().map(Boid::search_radius).fold(0.0, f32::max)
                * self.params.cell_size_factor;
            if needed > self.spatial_grid.cell_size + f32::EPSILON {
                self.rebuild_grid();
            }

            self.spatial_grid.clear();
            for (slot, kinematics) in snapshot.iter().enumerate() {
                self.spatial_grid.insert(slot, kinematics.position);
            }
        }

        let radii: Vec<f32> = self.boids.iter().map(Boid::radius).collect();
        let phase = ReadPhase {
            snapshot,
            radii: &radii,
            grid: if use_grid { Some(&self.spatial_grid) } else { None },
            obstacles: &self.params.obstacles,
            fov_cos: self.params.fov_cos(),
            all_round: self.params.view_angle_deg >= 360.0,
            peer_collisions: self.params.peer_collisions,
        };

        let sum = |a: (usize, usize), b: (usize, usize)| (a.0 + b.0, a.1 + b.1);
        match chunk_size {
            Some(chunk_size) => self
                .boids
                .par_chunks_mut(chunk_size)
                .enumerate()
                .map(|(chunk_idx, boid_chunk)| {
                    boid_chunk
                        .iter_mut()
                        .enumerate()
                        .map(|(i_in_chunk, boid)| phase.discover(chunk_idx * chunk_size + i_in_chunk, boid))
                        .fold((0, 0), sum)
                })
                .reduce(|| (0, 0), sum),
            None => self
                .boids
                .iter_mut()
                .enumerate()
                .map(|(slot, boid)| phase.discover(slot, boid))
                .fold((0, 0), sum),
        }
    }

    /// Advance the whole swarm by one tick.
    ///
    /// Neighbour lists and collisions are rebuilt from a snapshot taken before
    /// any boid moves; only then does every boid run its pipeline.
    pub fn tick(&mut self) -> &TickStats {
        let started = Instant::now();
        let snapshot = self.snapshot();

        let chunk_size = if self.params.enable_parallel && !self.boids.is_empty() {
            Some(std::cmp::max(self.boids.len() / rayon::current_num_threads(), 1))
        } else {
            None
        };

        let (neighbour_links, collisions) = self.build_neighbours(&snapshot, chunk_size);

        // Write phase
        match chunk_size {
            Some(chunk_size) => {
                self.boids.par_chunks_mut(chunk_size).for_each(|boid_chunk| {
                    for boid in boid_chunk {
                        boid.flock(&snapshot);
                    }
                });
            }
            None => {
                for boid in &mut self.boids {
                    boid.flock(&snapshot);
                }
            }
        }

        self.ticks += 1;
        let bounds = self.params.bounds;
        let total_speed: f32 = self.boids.iter().map(Boid::speed).sum();
        self.stats = TickStats {
            tick: self.ticks,
            boids: self.boids.len(),
            neighbour_links,
            collisions,
            mean_speed: if self.boids.is_empty() {
                0.0
            } else {
                total_speed / self.boids.len() as f32
            },
            outside_bounds: self
                .boids
                .iter()
                .filter(|boid| !bounds.contains(boid.position()))
                .count(),
            chunk_size,
            duration: started.elapsed(),
        };

        tracing::debug!(
            tick = self.stats.tick,
            boids = self.stats.boids,
            neighbours = self.stats.neighbour_links,
            collisions = self.stats.collisions,
            mean_speed = self.stats.mean_speed,
            outside = self.stats.outside_bounds,
            "tick complete"
        );
        &self.stats
    }

    pub fn run(&mut self, ticks: u64) -> &TickStats {
        for _ in 0..ticks {
            self.tick();
        }
        &self.stats
    }
}

fn random_axis<R: Rng>(rng: &mut R, min: f32, max: f32) -> f32 {
    if min < max {
        rng.gen_range(min..max)
    } else {
        min
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn quiet_params() -> SwarmParams {
        SwarmParams {
            num_boids: 0,
            bounds: Bounds::cube(50.0),
            boid: BoidParams {
                search_radius: 5.0,
                ..BoidParams::default()
            },
            enable_parallel: false,
            ..SwarmParams::default()
        }
    }

    #[test]
    fn populated_swarm_starts_inside_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let params = SwarmParams {
            num_boids: 64,
            ..quiet_params()
        };
        let swarm = Swarm::populated(params, &mut rng).unwrap();

        assert_eq!(swarm.len(), 64);
        assert!(swarm.boids().iter().all(|b| swarm.params().bounds.contains(b.position())));
        let ids: std::collections::HashSet<_> = swarm.boids().iter().map(Boid::id).collect();
        assert_eq!(ids.len(), 64);
    }

    #[test]
    fn neighbours_respect_search_radius() {
        let mut swarm = Swarm::new(quiet_params()).unwrap();
        let a = swarm.spawn(Point3::ZERO, vec3(1.0, 0.0, 0.0));
        let b = swarm.spawn(pt3(3.0, 0.0, 0.0), vec3(1.0, 0.0, 0.0));
        let c = swarm.spawn(pt3(30.0, 0.0, 0.0), vec3(1.0, 0.0, 0.0));

        swarm.tick();

        assert_eq!(swarm.boid(a).unwrap().neighbour_count(), 1);
        assert_eq!(swarm.boid(b).unwrap().neighbour_count(), 1);
        assert_eq!(swarm.boid(c).unwrap().neighbour_count(), 0);
        assert_eq!(swarm.stats().neighbour_links, 2);
    }

    #[test]
    fn grid_and_brute_force_agree() {
        let mut rng = StdRng::seed_from_u64(3);
        let params = SwarmParams {
            num_boids: 200,
            bounds: Bounds::cube(20.0),
            ..quiet_params()
        };
        let mut grid = Swarm::populated(params.clone(), &mut rng).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let mut brute = Swarm::populated(
            SwarmParams {
                enable_spatial_grid: false,
                ..params
            },
            &mut rng,
        )
        .unwrap();

        for _ in 0..3 {
            let a = grid.tick().clone();
            let b = brute.tick().clone();
            assert_eq!(a.neighbour_links, b.neighbour_links);
        }
        // Neighbour order differs, so sums may differ in the last bits
        for (x, y) in grid.boids().iter().zip(brute.boids()) {
            assert!(x.position().distance(y.position()) < 1e-3);
        }
    }

    #[test]
    fn parallel_and_sequential_ticks_agree() {
        let mut rng = StdRng::seed_from_u64(11);
        let params = SwarmParams {
            num_boids: 150,
            bounds: Bounds::cube(15.0),
            ..quiet_params()
        };
        let mut sequential = Swarm::populated(params.clone(), &mut rng).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let mut parallel = Swarm::populated(params, &mut rng).unwrap();
        parallel.set_parallel(true);

        sequential.run(10);
        parallel.run(10);

        for (x, y) in sequential.boids().iter().zip(parallel.boids()) {
            assert_eq!(x.position(), y.position());
            assert_eq!(x.velocity(), y.velocity());
        }
    }

    #[test]
    fn narrow_field_of_view_ignores_boids_behind() {
        let params = SwarmParams {
            view_angle_deg: 90.0,
            ..quiet_params()
        };
        let mut swarm = Swarm::new(params).unwrap();
        let a = swarm.spawn(Point3::ZERO, vec3(1.0, 0.0, 0.0));
        swarm.spawn(pt3(2.0, 0.0, 0.0), vec3(1.0, 0.0, 0.0));
        swarm.spawn(pt3(-2.0, 0.0, 0.0), vec3(1.0, 0.0, 0.0));

        swarm.tick();
        assert_eq!(swarm.boid(a).unwrap().neighbour_count(), 1);
    }

    #[test]
    fn obstacles_are_reported_as_collisions() {
        let mut swarm = Swarm::new(quiet_params()).unwrap();
        swarm.add_obstacle(Obstacle::new(pt3(1.0, 0.0, 0.0), 1.0)).unwrap();
        swarm.spawn(Point3::ZERO, vec3(1.0, 0.0, 0.0));
        swarm.spawn(pt3(40.0, 40.0, 40.0), vec3(1.0, 0.0, 0.0));

        let stats = swarm.tick();
        assert_eq!(stats.collisions, 1);
    }

    #[test]
    fn discovery_outside_the_snapshot_finds_nothing() {
        let snapshot = [Kinematics {
            id: 0,
            position: Point3::ZERO,
            velocity: vec3(1.0, 0.0, 0.0),
        }];
        let obstacles = [Obstacle::new(Point3::ZERO, 5.0)];
        let read = ReadPhase {
            snapshot: &snapshot,
            radii: &[1.0],
            grid: None,
            obstacles: &obstacles,
            fov_cos: -1.0,
            all_round: true,
            peer_collisions: true,
        };

        let mut boid = Boid::new(7);
        boid.set_neighbour(0);
        assert_eq!(read.discover(3, &mut boid), (0, 0));
        assert_eq!(boid.neighbour_count(), 0);
        assert_eq!(boid.collision_position(), None);

        // The same boid in a valid slot still sees the obstacle
        assert_eq!(read.discover(0, &mut boid), (0, 1));
    }

    #[test]
    fn removing_unknown_boid_is_an_error() {
        let mut swarm = Swarm::new(quiet_params()).unwrap();
        let id = swarm.spawn(Point3::ZERO, Vec3::ZERO);
        assert!(swarm.remove(id).is_ok());
        assert!(matches!(swarm.remove(id), Err(SwarmError::UnknownBoid(_))));
        assert!(swarm.is_empty());
    }

    #[test]
    fn removal_keeps_remaining_boids_consistent() {
        let mut swarm = Swarm::new(quiet_params()).unwrap();
        let a = swarm.spawn(Point3::ZERO, vec3(1.0, 0.0, 0.0));
        let b = swarm.spawn(pt3(1.0, 0.0, 0.0), vec3(1.0, 0.0, 0.0));
        let c = swarm.spawn(pt3(2.0, 0.0, 0.0), vec3(1.0, 0.0, 0.0));
        swarm.tick();

        swarm.remove(a).unwrap();
        assert_eq!(swarm.boid(c).unwrap().neighbour_count(), 0);
        swarm.tick();
        assert_eq!(swarm.boid(b).unwrap().neighbour_count(), 1);
        assert_eq!(swarm.boid(c).unwrap().neighbour_count(), 1);
    }

    #[test]
    fn live_tuning_reports_changes() {
        let mut swarm = Swarm::new(quiet_params()).unwrap();
        let id = swarm.spawn(Point3::ZERO, Vec3::ZERO);

        let same = swarm.params().boid;
        assert!(!swarm.set_boid_params(same).unwrap());

        let tuned = BoidParams {
            cohesion_weight: 9,
            search_radius: 20.0,
            ..same
        };
        assert!(swarm.set_boid_params(tuned).unwrap());
        assert_eq!(swarm.boid(id).unwrap().params().cohesion_weight, 9);
        assert_eq!(swarm.boid(id).unwrap().search_radius(), 20.0);

        let broken = BoidParams {
            search_radius: -1.0,
            ..tuned
        };
        assert!(swarm.set_boid_params(broken).is_err());
    }

    #[test]
    fn invalid_params_are_rejected_at_construction() {
        let params = SwarmParams {
            cell_size_factor: 0.0,
            ..quiet_params()
        };
        assert!(matches!(Swarm::new(params), Err(SwarmError::InvalidParams(_))));
    }
}
