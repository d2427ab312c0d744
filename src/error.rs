/*
 * Error Module
 *
 * Errors raised by the swarm coordinator and the configuration layer.
 * The per-boid pipeline never fails; degenerate numeric input is resolved
 * to fallback values inside the steering and physics modules instead.
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SwarmError {
    #[error("no boid with id {0} in the swarm")]
    UnknownBoid(usize),

    #[error("invalid bounds: min {min:?} must not exceed max {max:?} on any axis")]
    InvalidBounds { min: [f32; 3], max: [f32; 3] },

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("failed to parse swarm parameters: {0}")]
    Config(#[from] serde_json::Error),

    #[error("failed to read swarm parameters: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SwarmError>;
