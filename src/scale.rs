//! Value normalization and the colour/radius scales built on top of it.
//!
//! Scales are plain values holding their domain and output range. They are
//! rebuilt for every render pass from the current dataset extrema.

use crate::error::{Result, RiskMapError};
use crate::types::Color;

pub const DEFAULT_MIN_RADIUS: f64 = 1.0;
pub const DEFAULT_MAX_RADIUS: f64 = 20.0;

/// Maps `value` linearly onto `[0, 1]`. A degenerate domain maps everything to 0.5.
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if max == min {
        return 0.5;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

/// Continuous colour ramp over equally spaced anchor colours.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientScale {
    min: f64,
    max: f64,
    colors: Vec<Color>,
}

impl GradientScale {
    pub fn new(min: f64, max: f64, colors: &[Color]) -> Result<Self> {
        if colors.len() < 2 {
            return Err(RiskMapError::TooFewColors(colors.len()));
        }
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Ok(GradientScale {
            min,
            max,
            colors: colors.to_vec(),
        })
    }

    pub fn evaluate(&self, value: f64) -> Color {
        let t = normalize(value, self.min, self.max);
        let segments = (self.colors.len() - 1) as f64;
        let position = t * segments;
        let index = (position.floor() as usize).min(self.colors.len() - 2);
        let local = position - index as f64;

        let from = self.colors[index];
        let to = self.colors[index + 1];
        Color::rgb(
            lerp_channel(from.r, to.r, local),
            lerp_channel(from.g, to.g, local),
            lerp_channel(from.b, to.b, local),
        )
    }
}

fn lerp_channel(from: u8, to: u8, t: f64) -> u8 {
    let value = from as f64 + (to as f64 - from as f64) * t;
    value.round().clamp(0.0, 255.0) as u8
}

/// Linear radius scale for proportional markers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeScale {
    min: f64,
    max: f64,
    min_radius: f64,
    max_radius: f64,
}

impl SizeScale {
    pub fn new(min: f64, max: f64) -> Self {
        Self::with_radius(min, max, DEFAULT_MIN_RADIUS, DEFAULT_MAX_RADIUS)
    }

    pub fn with_radius(min: f64, max: f64, min_radius: f64, max_radius: f64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let (min_radius, max_radius) = if min_radius <= max_radius {
            (min_radius, max_radius)
        } else {
            (max_radius, min_radius)
        };
        SizeScale {
            min,
            max,
            min_radius,
            max_radius,
        }
    }

    pub fn evaluate(&self, value: f64) -> f64 {
        if self.max == self.min {
            return (self.min_radius + self.max_radius) / 2.0;
        }
        let radius = self.min_radius
            + (value - self.min) * (self.max_radius - self.min_radius) / (self.max - self.min);
        radius.clamp(self.min_radius, self.max_radius)
    }
}
