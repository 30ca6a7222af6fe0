//! Square falloff masks used to sink chunk edges below sea level.
//!
//! The mask depends only on its size and shape parameters, never on the
//! chunk it is applied to, so one mask is shared by every chunk.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::core::Grid;

/// Shape parameters of the falloff curve.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FalloffParams {
    /// Steepness of the transition.
    pub a: f32,
    /// Position of the transition; larger values push it towards the edge.
    pub b: f32,
}

impl Default for FalloffParams {
    fn default() -> Self {
        Self { a: 3.0, b: 2.2 }
    }
}

/// A `size x size` falloff field with values in [0, 1], 1 at the edges.
#[derive(Clone, Debug, PartialEq)]
pub struct FalloffMask {
    values: Grid<f32>,
}

impl FalloffMask {
    /// Generate the mask for a square grid.
    pub fn generate(size: usize, params: FalloffParams) -> Self {
        let values = Grid::from_fn(size, size, |i, j| {
            let x = i as f32 / size as f32 * 2.0 - 1.0;
            let y = j as f32 / size as f32 * 2.0 - 1.0;
            evaluate(x.abs().max(y.abs()), params.a, params.b)
        });
        Self { values }
    }

    pub fn size(&self) -> usize {
        self.values.width()
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        *self.values.get(x, y)
    }

    pub fn values(&self) -> &Grid<f32> {
        &self.values
    }
}

/// Sigmoid-like falloff curve `v^a / (v^a + (b - b*v)^a)`.
///
/// Maps 0 to 0 and 1 to 1 and is nondecreasing on [0, 1] for positive `a`, `b`.
pub fn evaluate(value: f32, a: f32, b: f32) -> f32 {
    let num = value.powf(a);
    let denom = num + (b - b * value).powf(a);
    if denom <= 0.0 || !denom.is_finite() {
        return if value >= 1.0 { 1.0 } else { 0.0 };
    }
    num / denom
}

/// Memoizes one mask per distinct size and shape.
#[derive(Debug, Default)]
pub struct FalloffCache {
    masks: Mutex<HashMap<(usize, u32, u32), Arc<FalloffMask>>>,
}

impl FalloffCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the mask for `size`, generating it on first use.
    pub fn get_or_generate(&self, size: usize, params: FalloffParams) -> Arc<FalloffMask> {
        let key = (size, params.a.to_bits(), params.b.to_bits());
        let mut masks = self.masks.lock().unwrap_or_else(|e| e.into_inner());
        masks
            .entry(key)
            .or_insert_with(|| {
                log::debug!("Generating {}x{} falloff mask (a={}, b={})", size, size, params.a, params.b);
                Arc::new(FalloffMask::generate(size, params))
            })
            .clone()
    }

    /// Number of cached masks.
    pub fn len(&self) -> usize {
        self.masks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
