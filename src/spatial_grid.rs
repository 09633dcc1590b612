/*
 * Spatial Grid Module
 *
 * This module defines the SpatialGrid struct for neighbour lookups among
 * the members of a flock. It divides the park's ground plane (XZ) into a
 * grid of square cells no smaller than the largest awareness radius, so a
 * vehicle only needs to look at its own cell and the eight around it.
 *
 * Positions outside the park are clamped into the border cells. Clamping
 * never moves two points further apart in cell space, so a neighbour within
 * one cell size is always found in the 3x3 block around the query.
 */

use glam::Vec3;

use crate::world::Bounds;

// Upper bound on cells per axis, keeps tiny radii from allocating huge grids
const MAX_CELLS_PER_AXIS: usize = 128;

#[derive(Clone, Debug)]
pub struct SpatialGrid {
    pub cell_size: f32,
    pub cells_x: usize,
    pub cells_z: usize,
    origin_x: f32,
    origin_z: f32,
    grid: Vec<Vec<usize>>,
}

impl SpatialGrid {
    pub fn new(min_cell_size: f32, bounds: &Bounds) -> Self {
        let width = bounds.width().max(f32::EPSILON);
        let depth = bounds.depth().max(f32::EPSILON);
        let longest = width.max(depth);

        // Cells must cover the radius and stay within the per-axis budget
        let cell_size = min_cell_size
            .max(longest / MAX_CELLS_PER_AXIS as f32)
            .max(f32::EPSILON);

        let cells_x = ((width / cell_size).ceil() as usize).clamp(1, MAX_CELLS_PER_AXIS);
        let cells_z = ((depth / cell_size).ceil() as usize).clamp(1, MAX_CELLS_PER_AXIS);

        Self {
            cell_size,
            cells_x,
            cells_z,
            origin_x: bounds.min.x,
            origin_z: bounds.min.z,
            grid: vec![Vec::new(); cells_x * cells_z],
        }
    }

    // Build a grid holding every position, indexed by its slice position
    pub fn build(min_cell_size: f32, bounds: &Bounds, positions: impl IntoIterator<Item = Vec3>) -> Self {
        let mut grid = Self::new(min_cell_size, bounds);
        for (index, position) in positions.into_iter().enumerate() {
            grid.insert(index, position);
        }
        grid
    }

    #[inline]
    fn cell_coords(&self, position: Vec3) -> (usize, usize) {
        let grid_x = ((position.x - self.origin_x) / self.cell_size)
            .floor()
            .clamp(0.0, (self.cells_x - 1) as f32) as usize;
        let grid_z = ((position.z - self.origin_z) / self.cell_size)
            .floor()
            .clamp(0.0, (self.cells_z - 1) as f32) as usize;
        (grid_x, grid_z)
    }

    // Convert a world position to a flat cell index
    #[inline]
    pub fn cell_index(&self, position: Vec3) -> usize {
        let (grid_x, grid_z) = self.cell_coords(position);
        grid_z * self.cells_x + grid_x
    }

    pub fn clear(&mut self) {
        for cell in &mut self.grid {
            cell.clear();
        }
    }

    #[inline]
    pub fn insert(&mut self, index: usize, position: Vec3) {
        let cell = self.cell_index(position);
        self.grid[cell].push(index);
    }

    // Indices stored in the cell containing `position` and its neighbours
    pub fn nearby_indices(&self, position: Vec3) -> Vec<usize> {
        let (grid_x, grid_z) = self.cell_coords(position);
        let mut result = Vec::new();

        let z_range = grid_z.saturating_sub(1)..=(grid_z + 1).min(self.cells_z - 1);
        for check_z in z_range {
            let row = check_z * self.cells_x;
            let x_range = grid_x.saturating_sub(1)..=(grid_x + 1).min(self.cells_x - 1);
            for check_x in x_range {
                result.extend_from_slice(&self.grid[row + check_x]);
            }
        }

        result
    }
}
