/*
 * Boid Flocking Engine - Module Definitions
 *
 * This file defines the module structure of the flocking engine.
 * - boid: the agent and its per-tick pipeline
 * - steering / physics: the pure functions the pipeline is built from
 * - swarm / spatial_grid / stats: the reference coordinator
 * - params / error: configuration and coordinator errors
 */

// Re-export key components for easier access
pub use boid::Boid;
pub use error::{Result, SwarmError};
pub use params::{BoidParams, Bounds, Obstacle, SwarmParams};
pub use spatial_grid::SpatialGrid;
pub use stats::TickStats;
pub use steering::Kinematics;
pub use swarm::Swarm;

// Define modules
pub mod boid;
pub mod error;
pub mod params;
pub mod physics;
pub mod spatial_grid;
pub mod stats;
pub mod steering;
pub mod swarm;

// Constants
pub const WORLD_SIZE: f32 = 200.0;
// Implicit integration step, one unit of time per tick
pub const TIME_STEP: f32 = 1.0;
// Keeps separation finite for coincident boids
pub const SEPARATION_SOFTENING: f32 = 0.01;
pub const MAX_CELLS_PER_AXIS: usize = 64;
