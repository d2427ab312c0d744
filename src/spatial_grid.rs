/*
 * Spatial Grid Module
 *
 * This module defines the SpatialGrid struct the swarm coordinator uses to
 * find neighbour candidates. It divides the swarm bounds into a uniform 3D
 * grid of cells so a query only visits the cells around a position instead of
 * every boid.
 *
 * - Positions outside the bounds are clamped into the edge cells, so boids
 *   that wander out are still found by their neighbours
 * - The number of cells per axis is capped; the cell size grows instead
 * - Queries visit as many rings of cells as the search radius needs
 */

use nannou::prelude::*;

use crate::params::Bounds;
use crate::MAX_CELLS_PER_AXIS;

pub struct SpatialGrid {
    pub cell_size: f32,
    origin: Point3,
    dims: [usize; 3],
    grid: Vec<Vec<usize>>,
}

impl SpatialGrid {
    pub fn new(cell_size: f32, bounds: &Bounds) -> Self {
        let size = bounds.size();
        let largest = size.max_element().max(f32::EPSILON);

        let mut cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            largest
        };
        if largest / cell_size > MAX_CELLS_PER_AXIS as f32 {
            cell_size = largest / MAX_CELLS_PER_AXIS as f32;
        }

        let axis_cells = |extent: f32| ((extent / cell_size).ceil() as usize).max(1);
        let dims = [axis_cells(size.x), axis_cells(size.y), axis_cells(size.z)];

        Self {
            cell_size,
            origin: bounds.min,
            dims,
            grid: vec![Vec::new(); dims[0] * dims[1] * dims[2]],
        }
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn cell_count(&self) -> usize {
        self.grid.len()
    }

    // Convert world coordinates to (clamped) cell coordinates
    #[inline]
    fn cell_coords(&self, pos: Point3) -> [usize; 3] {
        let mut coords = [0; 3];
        for axis in 0..3 {
            let cell = ((pos[axis] - self.origin[axis]) / self.cell_size).floor();
            coords[axis] = cell.clamp(0.0, (self.dims[axis] - 1) as f32) as usize;
        }
        coords
    }

    #[inline]
    fn cell_index(&self, [x, y, z]: [usize; 3]) -> usize {
        (z * self.dims[1] + y) * self.dims[0] + x
    }

    // Clear the grid
    pub fn clear(&mut self) {
        for cell in &mut self.grid {
            cell.clear();
        }
    }

    // Insert a boid into the grid
    #[inline]
    pub fn insert(&mut self, boid_index: usize, position: Point3) {
        let cell_index = self.cell_index(self.cell_coords(position));
        self.grid[cell_index].push(boid_index);
    }

    // Boid indices in every cell that may hold a boid within `radius` of `position`
    pub fn nearby(&self, position: Point3, radius: f32) -> Vec<usize> {
        let centre = self.cell_coords(position);
        let rings = if radius.is_finite() && radius > 0.0 {
            ((radius / self.cell_size).ceil() as usize).max(1)
        } else {
            1
        };

        let range = |axis: usize| {
            let low = centre[axis].saturating_sub(rings);
            let high = (centre[axis] + rings).min(self.dims[axis] - 1);
            low..=high
        };

        let mut result = Vec::new();
        for z in range(2) {
            for y in range(1) {
                for x in range(0) {
                    result.extend_from_slice(&self.grid[self.cell_index([x, y, z])]);
                }
            }
        }
        result
    }
}
