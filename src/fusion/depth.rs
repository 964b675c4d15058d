//! Metric depth lookup that never propagates invalid readings.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::config::FusionConfig;

/// Row-major depth buffer in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDepthMap")]
pub struct DepthMap {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

/// Unchecked wire form; validated through [`DepthMap::new`].
#[derive(Deserialize)]
struct RawDepthMap {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl TryFrom<RawDepthMap> for DepthMap {
    type Error = anyhow::Error;

    fn try_from(raw: RawDepthMap) -> Result<Self> {
        Self::new(raw.width, raw.height, raw.data)
    }
}

impl DepthMap {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        let expected = width.checked_mul(height);
        if expected != Some(data.len()) {
            bail!(
                "depth map is {}x{} but carries {} values",
                width,
                height,
                data.len()
            );
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Every pixel at the same depth.
    pub fn filled(width: usize, height: usize, depth: f32) -> Self {
        Self {
            width,
            height,
            data: vec![depth; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn set(&mut self, x: usize, y: usize, depth: f32) {
        if x < self.width && y < self.height {
            if let Some(v) = self.data.get_mut(y * self.width + x) {
                *v = depth;
            }
        }
    }

    /// Raw value, unvalidated.
    pub fn raw(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.width + x).copied()
    }
}

/// Bounds-checked sampler with a sentinel default.
#[derive(Debug, Clone, Copy)]
pub struct DepthSampler {
    default_depth: f32,
    max_valid_depth: f32,
}

impl DepthSampler {
    pub const DEFAULT_DEPTH: f32 = 1.5;
    pub const MAX_VALID_DEPTH: f32 = 10.0;

    pub fn new(default_depth: f32, max_valid_depth: f32) -> Self {
        Self {
            default_depth,
            max_valid_depth,
        }
    }

    pub fn from_config(config: &FusionConfig) -> Self {
        Self::new(config.default_depth, config.max_valid_depth)
    }

    pub fn default_depth(&self) -> f32 {
        self.default_depth
    }

    /// Depth at pixel `(x, y)` of a `width`×`height` map.
    ///
    /// Out-of-bounds coordinates, a missing map, and NaN / non-positive /
    /// beyond-ceiling readings all resolve to the default depth.
    pub fn sample(
        &self,
        depth_map: Option<&DepthMap>,
        x: i64,
        y: i64,
        width: usize,
        height: usize,
    ) -> f32 {
        let Some(map) = depth_map else {
            return self.default_depth;
        };
        if x < 0 || y < 0 || x as u64 >= width as u64 || y as u64 >= height as u64 {
            return self.default_depth;
        }
        let value = match map.raw(x as usize, y as usize) {
            Some(v) => v,
            None => return self.default_depth,
        };
        if value.is_nan() || value <= 0.0 || value > self.max_valid_depth {
            return self.default_depth;
        }
        value
    }
}

impl Default for DepthSampler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DEPTH, Self::MAX_VALID_DEPTH)
    }
}
