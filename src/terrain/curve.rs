//! Height response curves.
//!
//! [`HeightCurve`] remaps normalized heights before they are scaled into
//! world units, e.g. to flatten water and exaggerate peaks. Keys are
//! `(input, output)` pairs; sampling is piecewise linear and clamps to the
//! first/last key outside the keyed range.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq)]
pub struct HeightCurve {
    keys: Vec<(f32, f32)>,
}

impl HeightCurve {
    /// Create a curve from unsorted keys. An empty key list gives the identity.
    pub fn new(mut keys: Vec<(f32, f32)>) -> Self {
        if keys.is_empty() {
            return Self::linear();
        }
        keys.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        Self { keys }
    }

    /// Identity mapping over [0, 1].
    pub fn linear() -> Self {
        Self {
            keys: vec![(0.0, 0.0), (1.0, 1.0)],
        }
    }

    /// Always returns `value`.
    pub fn constant(value: f32) -> Self {
        Self {
            keys: vec![(0.0, value)],
        }
    }

    pub fn keys(&self) -> &[(f32, f32)] {
        &self.keys
    }

    /// Evaluate the curve at `t`. NaN maps to the first key's value.
    pub fn evaluate(&self, t: f32) -> f32 {
        let first = self.keys[0];
        let last = self.keys[self.keys.len() - 1];
        if t.is_nan() || t <= first.0 {
            return first.1;
        }
        if t >= last.0 {
            return last.1;
        }

        // First key strictly past t; guaranteed to exist and be > 0 here.
        let upper = self.keys.partition_point(|k| k.0 <= t);
        let (t_a, v_a) = self.keys[upper - 1];
        let (t_b, v_b) = self.keys[upper];
        let span = t_b - t_a;
        if span < 1e-6 {
            return v_a;
        }
        v_a + (v_b - v_a) * ((t - t_a) / span)
    }
}

impl Default for HeightCurve {
    fn default() -> Self {
        Self::linear()
    }
}

impl Serialize for HeightCurve {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.keys.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for HeightCurve {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let keys = Vec::<(f32, f32)>::deserialize(deserializer)?;
        Ok(Self::new(keys))
    }
}
