/*
 * Parameters Module
 *
 * This module defines the configuration structs for the flocking engine:
 * - BoidParams: per-boid behavioural weights and physical properties
 * - SwarmParams: coordinator settings (bounds, obstacles, neighbour search)
 * - Bounds / Obstacle: the global geometry supplied to every boid
 *
 * Both parameter structs can be loaded from JSON and are validated before use.
 */

use nannou::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, SwarmError};
use crate::WORLD_SIZE;

// Per-boid configuration, attached at construction and live-tunable afterwards.
// Weights are signed on purpose: zero disables a rule, negative values invert it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoidParams {
    pub cohesion_weight: i32,
    pub alignment_weight: i32,
    pub separation_weight: i32,
    pub avoid_weight: i32,
    pub reposition_weight: i32,
    // Neighbours closer than this push the boid away
    pub separation_distance: f32,
    // How far ahead the boid looks for obstacles
    pub view_range: f32,
    // Neighbour eligibility distance used by the coordinator
    pub search_radius: f32,
    // Steering damping; zero is treated as one
    pub mass: i32,
    pub bound_radius: f32,
    // Base speed, acts as a floor
    pub set_speed: f32,
    pub max_speed: Option<f32>,
}

impl Default for BoidParams {
    fn default() -> Self {
        Self {
            cohesion_weight: 1,
            alignment_weight: 4,
            separation_weight: 30,
            avoid_weight: 40,
            reposition_weight: 2,
            separation_distance: 4.0,
            view_range: 10.0,
            search_radius: 12.0,
            mass: 20,
            bound_radius: 1.0,
            set_speed: 0.5,
            max_speed: None,
        }
    }
}

impl BoidParams {
    // Mass used for steering; a zero mass would divide by zero
    pub fn effective_mass(&self) -> f32 {
        if self.mass == 0 {
            1.0
        } else {
            self.mass as f32
        }
    }

    // Base speed clamped so the floor is never negative
    pub fn speed_floor(&self) -> f32 {
        if self.set_speed.is_finite() {
            self.set_speed.max(0.0)
        } else {
            0.0
        }
    }

    pub fn validate(&self) -> Result<()> {
        let distances = [
            ("separation_distance", self.separation_distance),
            ("view_range", self.view_range),
            ("search_radius", self.search_radius),
            ("bound_radius", self.bound_radius),
            ("set_speed", self.set_speed),
        ];
        for (name, value) in distances {
            if !value.is_finite() || value < 0.0 {
                return Err(SwarmError::InvalidParams(format!(
                    "{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }

        if let Some(max_speed) = self.max_speed {
            if !max_speed.is_finite() || max_speed <= 0.0 {
                return Err(SwarmError::InvalidParams(format!(
                    "max_speed must be finite and positive, got {}",
                    max_speed
                )));
            }
        }

        Ok(())
    }
}

// Axis-aligned box the swarm is meant to stay inside
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    #[serde(with = "point3")]
    pub min: Point3,
    #[serde(with = "point3")]
    pub max: Point3,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::cube(WORLD_SIZE / 2.0)
    }
}

impl Bounds {
    pub fn new(min: Point3, max: Point3) -> Result<Self> {
        let bounds = Self { min, max };
        bounds.validate()?;
        Ok(bounds)
    }

    // Cube centred on the origin
    pub fn cube(half_size: f32) -> Self {
        let half = half_size.abs();
        Self {
            min: pt3(-half, -half, -half),
            max: pt3(half, half, half),
        }
    }

    pub fn centre(&self) -> Point3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn contains(&self, point: Point3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    // Nearest point inside the box
    pub fn clamp(&self, point: Point3) -> Point3 {
        point.max(self.min).min(self.max)
    }

    // Zero inside, Euclidean distance to the box otherwise
    pub fn distance_outside(&self, point: Point3) -> f32 {
        (point - self.clamp(point)).length()
    }

    pub fn validate(&self) -> Result<()> {
        let finite = self.min.is_finite() && self.max.is_finite();
        let ordered =
            self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z;
        if finite && ordered {
            Ok(())
        } else {
            Err(SwarmError::InvalidBounds {
                min: self.min.to_array(),
                max: self.max.to_array(),
            })
        }
    }
}

// A spherical obstacle, also used to describe a peer during collision checks
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    #[serde(with = "point3")]
    pub centre: Point3,
    pub radius: f32,
}

impl Obstacle {
    pub fn new(centre: Point3, radius: f32) -> Self {
        Self { centre, radius }
    }
}

// Coordinator configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmParams {
    pub num_boids: usize,
    pub bounds: Bounds,
    // Applied to every boid spawned by the swarm
    pub boid: BoidParams,
    pub obstacles: Vec<Obstacle>,
    // Neighbour field of view, 360 sees all round
    pub view_angle_deg: f32,
    // Report overlapping neighbours to each boid as collisions
    pub peer_collisions: bool,
    // Performance settings
    pub enable_parallel: bool,
    pub enable_spatial_grid: bool,
    pub cell_size_factor: f32, // Multiplier for cell size relative to search radius
}

impl Default for SwarmParams {
    fn default() -> Self {
        Self {
            num_boids: 500,
            bounds: Bounds::default(),
            boid: BoidParams::default(),
            obstacles: Vec::new(),
            view_angle_deg: 360.0,
            peer_collisions: false,
            enable_parallel: true,
            enable_spatial_grid: true,
            cell_size_factor: 1.0,
        }
    }
}

impl SwarmParams {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let params: SwarmParams = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    // Cosine of half the field of view, compared against heading dot direction
    pub fn fov_cos(&self) -> f32 {
        (self.view_angle_deg * 0.5).to_radians().cos()
    }

    pub fn validate(&self) -> Result<()> {
        self.bounds.validate()?;
        self.boid.validate()?;

        if !(self.view_angle_deg > 0.0 && self.view_angle_deg <= 360.0) {
            return Err(SwarmError::InvalidParams(format!(
                "view_angle_deg must be in (0, 360], got {}",
                self.view_angle_deg
            )));
        }

        if !self.cell_size_factor.is_finite() || self.cell_size_factor <= 0.0 {
            return Err(SwarmError::InvalidParams(format!(
                "cell_size_factor must be positive, got {}",
                self.cell_size_factor
            )));
        }

        if let Some(obstacle) = self
            .obstacles
            .iter()
            .find(|o| !o.centre.is_finite() || !o.radius.is_finite() || o.radius < 0.0)
        {
            return Err(SwarmError::InvalidParams(format!(
                "obstacle at {:?} has invalid radius {}",
                obstacle.centre.to_array(),
                obstacle.radius
            )));
        }

        Ok(())
    }
}

// Points are stored as [x, y, z] arrays in parameter files
mod point3 {
    use nannou::prelude::Point3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(point: &Point3, s: S) -> Result<S::Ok, S::Error> {
        point.to_array().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Point3, D::Error> {
        <[f32; 3]>::deserialize(d).map(Point3::from)
    }
}
