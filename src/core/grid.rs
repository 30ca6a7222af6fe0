//! Dense row-major 2D grids shared by the height, colour and normal fields.

use serde::{Deserialize, Serialize};

/// A `width x height` grid addressed as `(x, y)`, stored row-major.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T: Clone> Grid<T> {
    /// Create a grid with every cell set to `value`.
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            cells: vec![value; width * height],
        }
    }
}

impl<T> Grid<T> {
    /// Build a grid by evaluating `f(x, y)` for every cell.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut cells = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                cells.push(f(x, y));
            }
        }
        Self { width, height, cells }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> &T {
        &self.cells[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        self.cells[y * self.width + x] = value;
    }

    /// Cells in row-major order.
    pub fn as_slice(&self) -> &[T] {
        &self.cells
    }

    /// True if `(x, y)` lies on the outermost ring of the grid.
    #[inline]
    pub fn is_border(&self, x: usize, y: usize) -> bool {
        x == 0 || y == 0 || x + 1 >= self.width || y + 1 >= self.height
    }

    /// Iterate `(x, y, &value)` in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, v)| (i % width, i / width, v))
    }
}

impl Grid<f32> {
    /// Smallest and largest value, or `None` for an empty grid.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        if self.cells.is_empty() {
            return None;
        }
        Some(self.cells.iter().fold((f32::MAX, f32::MIN), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        }))
    }
}
