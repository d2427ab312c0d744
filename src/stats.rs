/*
 * Tick Statistics Module
 *
 * Diagnostics gathered by the swarm coordinator on every tick:
 * - neighbour links and reported collisions from the read phase
 * - mean speed and boids outside the bounds after the write phase
 * - the rayon chunk size when the tick ran in parallel
 */

use std::time::Duration;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickStats {
    pub tick: u64,
    pub boids: usize,
    pub neighbour_links: usize,
    pub collisions: usize,
    pub mean_speed: f32,
    pub outside_bounds: usize,
    pub chunk_size: Option<usize>,
    pub duration: Duration,
}

impl TickStats {
    pub fn mean_neighbours(&self) -> f32 {
        if self.boids == 0 {
            0.0
        } else {
            self.neighbour_links as f32 / self.boids as f32
        }
    }
}
