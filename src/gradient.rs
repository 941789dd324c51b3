//! Heat-map color ramps.

use crate::error::{NavError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Light green, the low end of the default ramp
pub const DEFAULT_START_COLOR: HexColor = HexColor::new(0x8e, 0xc8, 0x43);
/// Medium red, the high end of the default ramp
pub const DEFAULT_END_COLOR: HexColor = HexColor::new(0xff, 0x66, 0x66);

/// An RGB color, displayed as lower-case `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Accepts `#rrggbb`, `rrggbb` and `#rgb`, case-insensitive.
    pub fn parse(value: &str) -> Result<Self> {
        let hex = value.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(NavError::invalid_color(value, "non-hex character"));
        }

        let channel = |s: &str| u8::from_str_radix(s, 16);
        let parsed = match hex.len() {
            6 => (channel(&hex[0..2]), channel(&hex[2..4]), channel(&hex[4..6])),
            3 => {
                // #abc is shorthand for #aabbcc
                let doubled: String = hex.chars().flat_map(|c| [c, c]).collect();
                return Self::parse(&doubled);
            }
            n => {
                return Err(NavError::invalid_color(
                    value,
                    format!("expected 3 or 6 hex digits, got {}", n),
                ))
            }
        };

        match parsed {
            (Ok(r), Ok(g), Ok(b)) => Ok(Self { r, g, b }),
            _ => Err(NavError::invalid_color(value, "unparseable channel")),
        }
    }

    fn lerp(self, other: Self, t: f64) -> Self {
        let mix = |a: u8, b: u8| -> u8 {
            let v = f64::from(a) + (f64::from(b) - f64::from(a)) * t;
            v.round().clamp(0.0, 255.0) as u8
        };
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for HexColor {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for HexColor {
    type Error = NavError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.to_string()
    }
}

/// Linear RGB interpolation over `steps` evenly spaced samples, both endpoints included.
///
/// `steps` of 0 is treated as 1; a single step is just `start`.
pub fn generate(start: HexColor, end: HexColor, steps: usize) -> Vec<HexColor> {
    let steps = steps.max(1);
    if steps == 1 {
        return vec![start];
    }

    let last = (steps - 1) as f64;
    (0..steps)
        .map(|i| start.lerp(end, i as f64 / last))
        .collect()
}

/// Navigator `gradient` block: one color per achievable score 1..=max_value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradientSpec {
    pub colors: Vec<HexColor>,
    pub min_value: u32,
    pub max_value: u32,
}

impl GradientSpec {
    /// Gradient for a run whose highest score is `max_frequency`.
    ///
    /// A run with no observations degenerates to a single color and range 1..=1.
    pub fn for_max_frequency(start: HexColor, end: HexColor, max_frequency: u32) -> Self {
        let max_value = max_frequency.max(1);
        Self {
            colors: generate(start, end, max_value as usize),
            min_value: 1,
            max_value,
        }
    }

    /// Color assigned to a score, clamped into the gradient range
    pub fn color_for(&self, score: u32) -> Option<HexColor> {
        if self.colors.is_empty() {
            return None;
        }
        let idx = score.clamp(self.min_value, self.max_value) - self.min_value;
        self.colors.get(idx as usize).copied()
    }
}
